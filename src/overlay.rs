use image::{buffer::ConvertBuffer, GrayImage, RgbImage, Rgba, RgbaImage};

use crate::{
    errors::{Result, SegError},
    imageops_ai::{alpha_composite, PutAlpha},
};

/// Color of the highlight layer.
pub const OVERLAY_COLOR: [u8; 3] = [255, 0, 0];

/// Uniform alpha of the highlight layer before the mask replaces it.
pub const OVERLAY_ALPHA: u8 = 120;

/// Highlights the masked region of `image` in red.
///
/// The mask becomes the layer's alpha channel outright: 255 renders opaque
/// red, 0 leaves the original pixel untouched.
pub fn overlay(image: &RgbImage, mask: &GrayImage) -> Result<RgbaImage> {
    let [red, green, blue] = OVERLAY_COLOR;
    let layer = RgbaImage::from_pixel(
        image.width(),
        image.height(),
        Rgba([red, green, blue, OVERLAY_ALPHA]),
    )
    .put_alpha(mask)
    .map_err(|e| SegError::encode("mask application", e))?;

    let base: RgbaImage = image.convert();
    alpha_composite(&base, &layer).map_err(|e| SegError::encode("alpha compositing", e))
}
