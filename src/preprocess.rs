use image::{imageops, imageops::FilterType, RgbImage};
use ndarray::prelude::*;
use nshare::AsNdarray3;

/// Resolution used when the model does not declare a static input shape.
pub const FALLBACK_INPUT_SIZE: u32 = 256;

const DEFAULT_CHANNELS: u32 = 3;

/// Static per-call input resolution a loaded model expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSpec {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
}

/// Reads a declared NHWC input shape `(batch, H, W, C)`.
///
/// ONNX reports dynamic axes as non-positive values, so any such `H` or `W`
/// (or a rank other than 4) leaves the spec unresolved.
pub fn resolve_input_spec(dims: &[i64]) -> Option<InputSpec> {
    let &[_, height, width, channels] = dims else {
        return None;
    };
    let height = u32::try_from(height).ok().filter(|&h| h > 0)?;
    let width = u32::try_from(width).ok().filter(|&w| w > 0)?;
    let channels = u32::try_from(channels)
        .ok()
        .filter(|&c| c > 0)
        .unwrap_or(DEFAULT_CHANNELS);

    Some(InputSpec {
        width,
        height,
        channels,
    })
}

/// Target `(width, height)` for a resolved spec, or the square fallback.
pub fn target_size(spec: Option<InputSpec>) -> (u32, u32) {
    spec.map_or((FALLBACK_INPUT_SIZE, FALLBACK_INPUT_SIZE), |s| {
        (s.width, s.height)
    })
}

/// Resizes (bilinear) and normalizes an RGB image into a `[1, H, W, 3]`
/// tensor with values in `[0, 1]`.
pub fn prepare(image: &RgbImage, spec: Option<InputSpec>) -> Array4<f32> {
    let (width, height) = target_size(spec);
    let resized = imageops::resize(image, width, height, FilterType::Triangle);

    // nshare exposes the buffer as (C, H, W)
    resized
        .as_ndarray3()
        .permuted_axes([1, 2, 0])
        .insert_axis(Axis(0))
        .mapv(|v| f32::from(v) / 255.0)
        .as_standard_layout()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_resolve_static_shape() {
        let spec = resolve_input_spec(&[-1, 128, 64, 3]);
        assert_eq!(
            spec,
            Some(InputSpec {
                width: 64,
                height: 128,
                channels: 3
            })
        );
    }

    #[test]
    fn test_resolve_rejects_dynamic_or_wrong_rank() {
        assert_eq!(resolve_input_spec(&[1, -1, 256, 3]), None);
        assert_eq!(resolve_input_spec(&[1, 256, 0, 3]), None);
        assert_eq!(resolve_input_spec(&[256, 256, 3]), None);
        assert_eq!(resolve_input_spec(&[]), None);
    }

    #[test]
    fn test_dynamic_channels_default_to_rgb() {
        let spec = resolve_input_spec(&[1, 32, 32, -1]).unwrap();
        assert_eq!(spec.channels, 3);
    }

    #[test]
    fn test_prepare_uses_spec_resolution() {
        let image = RgbImage::from_pixel(10, 20, Rgb([255, 0, 51]));
        let spec = InputSpec {
            width: 4,
            height: 6,
            channels: 3,
        };
        let tensor = prepare(&image, Some(spec));
        assert_eq!(tensor.shape(), &[1, 6, 4, 3]);
        assert!((tensor[[0, 5, 3, 0]] - 1.0).abs() < 1e-6);
        assert!(tensor[[0, 0, 0, 1]].abs() < 1e-6);
        assert!((tensor[[0, 2, 1, 2]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_prepare_falls_back_to_default_size() {
        let image = RgbImage::from_pixel(3, 3, Rgb([128, 128, 128]));
        let tensor = prepare(&image, None);
        assert_eq!(tensor.shape(), &[1, 256, 256, 3]);
        assert!(tensor.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }
}
