use std::path::Path;

use ndarray::prelude::*;
use ort::{
    execution_providers::{CUDAExecutionProvider, TensorRTExecutionProvider},
    session::{builder::SessionBuilder, Session},
    value::TensorRef,
};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::{
    errors::{Result, SegError},
    preprocess::{resolve_input_spec, target_size},
    traits::{ModelOutput, SegmentationModel},
};

/// Segmentation model executed by ONNX Runtime.
///
/// `Session::run` needs exclusive access, so concurrent requests are
/// serialized on the session lock.
pub struct OnnxModel {
    input_name: String,
    output_name: String,
    input_dims: Option<Vec<i64>>,
    session: Mutex<Session>,
}

impl OnnxModel {
    pub fn new(model_path: &Path, device_id: i32) -> Result<Self> {
        let mut session = SessionBuilder::new()
            .map_err(|e| SegError::model("session builder initialization", e))?
            .with_execution_providers([
                TensorRTExecutionProvider::default()
                    .with_device_id(device_id)
                    .build(),
                CUDAExecutionProvider::default()
                    .with_device_id(device_id)
                    .build(),
            ])
            .map_err(|e| SegError::model("execution provider registration", e))?
            .with_memory_pattern(true)
            .map_err(|e| SegError::model("memory pattern configuration", e))?
            .commit_from_file(model_path)
            .map_err(|e| {
                SegError::model(format!("model load: {}", model_path.display()), e)
            })?;

        let input = session.inputs.first().ok_or_else(|| SegError::Configuration {
            message: "model declares no inputs".to_string(),
        })?;
        let input_name = input.name.clone();
        let input_dims = input.input_type.tensor_shape().map(|shape| shape.to_vec());
        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| SegError::Configuration {
                message: "model declares no outputs".to_string(),
            })?;

        info!(
            path = %model_path.display(),
            input = %input_name,
            output = %output_name,
            dims = ?input_dims,
            "model loaded"
        );

        // initialize model
        let (width, height) = target_size(input_dims.as_deref().and_then(resolve_input_spec));
        let data = Array4::<f32>::zeros((1, height as usize, width as usize, 3));
        session
            .run(ort::inputs![input_name.as_str() => TensorRef::from_array_view(&data)
                .map_err(|e| SegError::model("warm-up tensor creation", e))?])
            .map_err(|e| SegError::model("warm-up run", e))?;

        Ok(Self {
            input_name,
            output_name,
            input_dims,
            session: Mutex::new(session),
        })
    }
}

impl SegmentationModel for OnnxModel {
    fn input_dims(&self) -> Option<Vec<i64>> {
        self.input_dims.clone()
    }

    fn predict(&self, tensor: ArrayView4<f32>) -> Result<ModelOutput> {
        let standard = tensor.as_standard_layout();
        let mut binding = self.session.lock();
        let outputs = binding.run(
            ort::inputs![self.input_name.as_str() => TensorRef::from_array_view(&standard)?],
        )?;
        let output = &outputs[self.output_name.as_str()];

        if let Ok(array) = output.try_extract_array::<f32>() {
            debug!(shape = ?array.shape(), "float model output");
            return Ok(ModelOutput::Probabilities(array.to_owned()));
        }
        if let Ok(array) = output.try_extract_array::<i64>() {
            debug!(shape = ?array.shape(), "label model output");
            return Ok(ModelOutput::Labels(array.to_owned()));
        }
        let array = output
            .try_extract_array::<i32>()
            .map_err(|e| SegError::inference("output extraction", e))?;
        debug!(shape = ?array.shape(), "label model output");
        Ok(ModelOutput::Labels(array.mapv(i64::from)))
    }
}
