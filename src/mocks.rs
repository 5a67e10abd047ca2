use crate::errors::{Result, SegError};
use crate::traits::{ModelOutput, SegmentationModel};
use ndarray::prelude::*;
use parking_lot::Mutex;

#[derive(Debug, Clone)]
enum MockOutput {
    Fixed(ModelOutput),
    /// `[N, H, W, 1]` following the input, filled with one probability
    Constant(f32),
}

/// テスト用のモックセグメンテーションモデル
#[derive(Debug)]
pub struct MockSegmentationModel {
    input_dims: Option<Vec<i64>>,
    output: MockOutput,
    last_input_shape: Mutex<Option<Vec<usize>>>,
}

impl MockSegmentationModel {
    /// 常に同じ出力テンソルを返すモデル
    pub fn new(input_dims: Option<Vec<i64>>, output: ModelOutput) -> Self {
        Self {
            input_dims,
            output: MockOutput::Fixed(output),
            last_input_shape: Mutex::new(None),
        }
    }

    /// 入力と同じ空間サイズの一定確率マップを返すモデル
    pub fn constant(input_dims: Option<Vec<i64>>, probability: f32) -> Self {
        Self {
            input_dims,
            output: MockOutput::Constant(probability),
            last_input_shape: Mutex::new(None),
        }
    }

    /// 直近の predict 呼び出しで受け取ったテンソル形状
    pub fn last_input_shape(&self) -> Option<Vec<usize>> {
        self.last_input_shape.lock().clone()
    }
}

impl SegmentationModel for MockSegmentationModel {
    fn input_dims(&self) -> Option<Vec<i64>> {
        self.input_dims.clone()
    }

    fn predict(&self, tensor: ArrayView4<f32>) -> Result<ModelOutput> {
        *self.last_input_shape.lock() = Some(tensor.shape().to_vec());

        match &self.output {
            MockOutput::Fixed(output) => Ok(output.clone()),
            MockOutput::Constant(probability) => {
                let (batch, height, width, _) = tensor.dim();
                Ok(ModelOutput::Probabilities(ArrayD::from_elem(
                    IxDyn(&[batch, height, width, 1]),
                    *probability,
                )))
            }
        }
    }
}

/// 推論が常に失敗するモデル
#[derive(Debug, Clone, Copy)]
pub struct FailingModel;

impl SegmentationModel for FailingModel {
    fn input_dims(&self) -> Option<Vec<i64>> {
        Some(vec![1, 8, 8, 3])
    }

    fn predict(&self, _tensor: ArrayView4<f32>) -> Result<ModelOutput> {
        Err(SegError::inference(
            "model run",
            "mock backend rejected the batch",
        ))
    }
}
