use crate::errors::Result;
use ndarray::prelude::*;

/// Raw tensor returned by a segmentation model.
///
/// The value range is not enforced here: probabilities may be any float and
/// labels any integer class id.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutput {
    Probabilities(ArrayD<f32>),
    Labels(ArrayD<i64>),
}

impl ModelOutput {
    pub fn shape(&self) -> &[usize] {
        match self {
            Self::Probabilities(array) => array.shape(),
            Self::Labels(array) => array.shape(),
        }
    }
}

/// Abstraction over the segmentation model.
///
/// The service depends on this trait rather than the ONNX session, so tests
/// can inject deterministic fixtures.
pub trait SegmentationModel: Send + Sync {
    /// Declared input shape, with dynamic axes as non-positive values.
    /// `None` when the model does not expose a tensor input shape.
    fn input_dims(&self) -> Option<Vec<i64>>;

    /// Runs the model on a `[1, H, W, 3]` batch.
    fn predict(&self, tensor: ArrayView4<f32>) -> Result<ModelOutput>;
}
