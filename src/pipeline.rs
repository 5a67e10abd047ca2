//! The per-request segmentation pipeline.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::{
    codec, overlay,
    errors::Result,
    postprocess,
    preprocess::{self, InputSpec},
    traits::SegmentationModel,
};

/// Process-wide state, built once before serving and never mutated.
pub struct SegmentationContext {
    model: Arc<dyn SegmentationModel>,
    input_spec: Option<InputSpec>,
}

impl SegmentationContext {
    /// Resolves the model's declared input spec up front.
    pub fn new(model: Arc<dyn SegmentationModel>) -> Self {
        let input_spec = model
            .input_dims()
            .as_deref()
            .and_then(preprocess::resolve_input_spec);
        Self { model, input_spec }
    }

    pub const fn input_spec(&self) -> Option<InputSpec> {
        self.input_spec
    }

    /// Runs the full pipeline over the `image` field of a request.
    #[instrument(skip_all)]
    pub fn segment(&self, image_field: &Value) -> Result<Segmented> {
        let bytes = codec::decode_image(image_field)?;
        let image = codec::decode_raster(&bytes)?;
        let (width, height) = image.dimensions();
        debug!(width, height, "decoded image");

        let tensor = preprocess::prepare(&image, self.input_spec);
        debug!(shape = ?tensor.shape(), "prepared input tensor");

        let output = self.model.predict(tensor.view())?;
        debug!(shape = ?output.shape(), "model output");

        let mask = postprocess::canonicalize(output);
        let alpha = postprocess::upsample(&mask, width, height);
        let composite = overlay::overlay(&image, &alpha)?;

        let png = codec::encode_png(&composite)?;
        Ok(Segmented {
            image: codec::to_data_uri(&png),
            width,
            height,
        })
    }
}

/// Successful `/segment` response body.
#[derive(Debug, Clone, Serialize)]
pub struct Segmented {
    pub image: String,
    pub width: u32,
    pub height: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{FailingModel, MockSegmentationModel};
    use crate::traits::ModelOutput;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use ndarray::{ArrayD, IxDyn};
    use serde_json::json;
    use std::io::Cursor;

    fn encoded_png(image: RgbImage) -> String {
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(image)
            .write_to(&mut buffer, ImageFormat::Png)
            .unwrap();
        STANDARD.encode(buffer.into_inner())
    }

    #[test]
    fn test_context_resolves_spec_once() {
        let model = MockSegmentationModel::constant(Some(vec![1, 2, 2, 3]), 0.9);
        let context = SegmentationContext::new(Arc::new(model));
        assert_eq!(
            context.input_spec(),
            Some(InputSpec {
                width: 2,
                height: 2,
                channels: 3
            })
        );

        let dynamic = MockSegmentationModel::constant(Some(vec![-1, -1, -1, 3]), 0.9);
        assert_eq!(SegmentationContext::new(Arc::new(dynamic)).input_spec(), None);
    }

    #[test]
    fn test_reports_original_dimensions() -> Result<()> {
        let model = MockSegmentationModel::constant(Some(vec![1, 4, 4, 3]), 0.1);
        let context = SegmentationContext::new(Arc::new(model));
        let input = encoded_png(RgbImage::from_pixel(13, 5, Rgb([1, 2, 3])));

        let result = context.segment(&json!(input))?;
        assert_eq!((result.width, result.height), (13, 5));

        let png = codec::decode_image(&json!(result.image))?;
        let decoded = codec::decode_raster(&png)?;
        assert_eq!(decoded.dimensions(), (13, 5));
        // nothing above threshold, so the image is unchanged
        assert!(decoded.pixels().all(|p| p.0 == [1, 2, 3]));
        Ok(())
    }

    #[test]
    fn test_model_sees_fallback_resolution() -> Result<()> {
        let output = ModelOutput::Labels(ArrayD::from_elem(IxDyn(&[1, 8, 8]), 1));
        let model = Arc::new(MockSegmentationModel::new(None, output));
        let context = SegmentationContext::new(model.clone());

        context.segment(&json!(encoded_png(RgbImage::new(3, 3))))?;
        assert_eq!(model.last_input_shape(), Some(vec![1, 256, 256, 3]));
        Ok(())
    }

    #[test]
    fn test_inference_failure_propagates() {
        let context = SegmentationContext::new(Arc::new(FailingModel));
        let err = context
            .segment(&json!(encoded_png(RgbImage::new(2, 2))))
            .unwrap_err();
        assert_eq!(err.kind(), "inference_error");
    }
}
