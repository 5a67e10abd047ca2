use anyhow::{anyhow, ensure, Result};
use image::{ImageBuffer, Luma, Pixel, Primitive, Rgba};
use num_traits::AsPrimitive;

use crate::imageops_ai::get_max_value;

/// Replaces the alpha channel of an RGBA buffer with a luma mask, rescaling
/// the mask's range to the image's subpixel range.
pub trait PutAlpha<SI>
where
    SI: Primitive + AsPrimitive<f32> + 'static,
{
    fn put_alpha<SM>(
        self,
        mask: &ImageBuffer<Luma<SM>, Vec<SM>>,
    ) -> Result<ImageBuffer<Rgba<SI>, Vec<SI>>>
    where
        Rgba<SI>: Pixel<Subpixel = SI>,
        SM: Primitive + AsPrimitive<f32> + 'static;
}

impl<SI> PutAlpha<SI> for ImageBuffer<Rgba<SI>, Vec<SI>>
where
    Rgba<SI>: Pixel<Subpixel = SI>,
    SI: Primitive + AsPrimitive<f32> + 'static,
    f32: AsPrimitive<SI>,
{
    fn put_alpha<SM>(
        self,
        mask: &ImageBuffer<Luma<SM>, Vec<SM>>,
    ) -> Result<ImageBuffer<Rgba<SI>, Vec<SI>>>
    where
        Rgba<SI>: Pixel<Subpixel = SI>,
        SM: Primitive + AsPrimitive<f32> + 'static,
    {
        ensure!(
            self.dimensions() == mask.dimensions(),
            "Image and mask dimensions do not match: image {:?}, mask {:?}",
            self.dimensions(),
            mask.dimensions()
        );

        let si_max: f32 = get_max_value::<SI>().as_();
        let sm_max: f32 = get_max_value::<SM>().as_();

        let processed_pixels = self
            .pixels()
            .zip(mask.pixels())
            .flat_map(|(&image_pixel, &mask_pixel)| {
                let Rgba([red, green, blue, _]) = image_pixel;
                let Luma([alpha]) = mask_pixel;
                let alpha = (alpha.as_() / sm_max * si_max).round().as_();
                [red, green, blue, alpha]
            })
            .collect::<Vec<SI>>();

        ImageBuffer::from_raw(self.width(), self.height(), processed_pixels)
            .ok_or_else(|| anyhow!("Failed to create ImageBuffer from processed pixels"))
    }
}
