use anyhow::{anyhow, ensure, Result};
use image::{ImageBuffer, Pixel, Primitive, Rgba};
use num_traits::AsPrimitive;

use crate::imageops_ai::get_max_value;

/// Porter-Duff "over": composites `top` onto `bottom`, both straight
/// (non-premultiplied) alpha.
pub fn alpha_composite<S>(
    bottom: &ImageBuffer<Rgba<S>, Vec<S>>,
    top: &ImageBuffer<Rgba<S>, Vec<S>>,
) -> Result<ImageBuffer<Rgba<S>, Vec<S>>>
where
    Rgba<S>: Pixel<Subpixel = S>,
    S: Primitive + AsPrimitive<f32> + 'static,
    f32: AsPrimitive<S>,
{
    ensure!(
        bottom.dimensions() == top.dimensions(),
        "Composite layers differ in size: bottom {:?}, top {:?}",
        bottom.dimensions(),
        top.dimensions()
    );

    let max: f32 = get_max_value::<S>().as_();
    let processed_pixels = bottom
        .pixels()
        .zip(top.pixels())
        .flat_map(|(&Rgba(dst), &Rgba(src))| {
            let src_a = src[3].as_() / max;
            let dst_a = dst[3].as_() / max;
            let dst_weight = dst_a * (1.0 - src_a);
            let out_a = src_a + dst_weight;

            let blend = |s: S, d: S| -> S {
                if out_a <= 0.0 {
                    return S::zero();
                }
                let value = (s.as_() * src_a + d.as_() * dst_weight) / out_a;
                value.round().clamp(0.0, max).as_()
            };

            [
                blend(src[0], dst[0]),
                blend(src[1], dst[1]),
                blend(src[2], dst[2]),
                (out_a * max).round().clamp(0.0, max).as_(),
            ]
        })
        .collect::<Vec<S>>();

    ImageBuffer::from_raw(bottom.width(), bottom.height(), processed_pixels)
        .ok_or_else(|| anyhow!("Failed to create ImageBuffer from composited pixels"))
}
