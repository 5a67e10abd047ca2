//! Canonicalizes raw model output into a binary foreground mask.

use image::{imageops, imageops::FilterType, GrayImage, Luma};
use ndarray::prelude::*;
use tracing::debug;

use crate::traits::ModelOutput;

/// Probabilities at or above this value are foreground.
pub const FOREGROUND_THRESHOLD: f32 = 0.5;

/// Class id treated as background; every other label is foreground.
pub const BACKGROUND_LABEL: i64 = 0;

pub const MASK_ON: u8 = 255;
pub const MASK_OFF: u8 = 0;

/// Foreground/background per cell at model resolution, indexed `[y, x]`.
pub type Mask = Array2<bool>;

/// How a squeezed output tensor is reduced to a 2-D map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLayout {
    /// `[H, W]`, used directly.
    Dense,
    /// `[H, W, 1]`, trailing axis dropped.
    SingleChannel,
    /// `[H, W, C]` with `C > 1`, argmax over classes.
    MultiClass { classes: usize },
    /// Anything else. Values are kept and folded into two dimensions.
    Passthrough,
}

pub fn classify(shape: &[usize]) -> OutputLayout {
    match *shape {
        [_, _] => OutputLayout::Dense,
        [_, _, 1] => OutputLayout::SingleChannel,
        [_, _, classes] if classes > 1 => OutputLayout::MultiClass { classes },
        _ => OutputLayout::Passthrough,
    }
}

trait Foreground: Copy + PartialOrd {
    fn is_foreground(self) -> bool;
}

impl Foreground for f32 {
    fn is_foreground(self) -> bool {
        self >= FOREGROUND_THRESHOLD
    }
}

impl Foreground for i64 {
    fn is_foreground(self) -> bool {
        self > BACKGROUND_LABEL
    }
}

/// Drops the batch dimension and a leading single channel.
///
/// Ranks above 3 lose leading size-1 axes until three remain. A leading 1 on
/// the rank-3 result is then either the batch of `[1, H, W]` or the channel of
/// a channel-first `[1, 1, H, W]`, and is dropped as well. Trailing and inner
/// size-1 axes are kept, so `[1, H, 1, C]` stays an `[H, 1, C]` class map.
fn squeeze_batch<T>(mut array: ArrayD<T>) -> ArrayD<T> {
    while array.ndim() > 3 && array.shape()[0] == 1 {
        array = array.index_axis_move(Axis(0), 0);
    }
    if array.ndim() == 3 && array.shape()[0] == 1 {
        array = array.index_axis_move(Axis(0), 0);
    }
    array
}

/// Folds an array of any rank into `[rows, cols]`.
///
/// Rank 0 becomes `[1, 1]` and rank 1 becomes `[1, N]`. Higher ranks keep the
/// first two axes and read the first element of each trailing sub-array, so
/// `[H, W, 1]` reduces to its only channel.
fn fold_to_2d(array: ArrayViewD<'_, bool>) -> Mask {
    match array.ndim() {
        0 => Array2::from_elem((1, 1), array.iter().next().copied().unwrap_or(false)),
        1 => Array1::from_iter(array.iter().copied()).insert_axis(Axis(0)),
        _ => {
            let rows = array.len_of(Axis(0));
            let cols = array.len_of(Axis(1));
            Array2::from_shape_fn((rows, cols), |(y, x)| {
                array
                    .index_axis(Axis(0), y)
                    .index_axis(Axis(0), x)
                    .iter()
                    .next()
                    .copied()
                    .unwrap_or(false)
            })
        }
    }
}

/// Index of the first maximum; `None` for an empty or all-NaN lane.
fn argmax<'a, T: Foreground + 'a>(lane: impl IntoIterator<Item = &'a T>) -> Option<usize> {
    let mut best: Option<(usize, T)> = None;
    for (index, &value) in lane.into_iter().enumerate() {
        let better = match best {
            Some((_, current)) => value > current,
            // NaN is unordered even against itself
            None => value.partial_cmp(&value).is_some(),
        };
        if better {
            best = Some((index, value));
        }
    }
    best.map(|(index, _)| index)
}

fn canonicalize_array<T: Foreground>(array: ArrayD<T>) -> Mask {
    let array = squeeze_batch(array);
    let layout = classify(array.shape());
    debug!(shape = ?array.shape(), ?layout, "canonicalizing model output");

    match layout {
        OutputLayout::MultiClass { .. } => {
            let rows = array.len_of(Axis(0));
            let cols = array.len_of(Axis(1));
            Array2::from_shape_fn((rows, cols), |(y, x)| {
                let lane = array.index_axis(Axis(0), y);
                argmax(lane.index_axis(Axis(0), x).iter())
                    .and_then(|class| i64::try_from(class).ok())
                    .is_some_and(Foreground::is_foreground)
            })
        }
        OutputLayout::Dense | OutputLayout::SingleChannel | OutputLayout::Passthrough => {
            fold_to_2d(array.mapv(Foreground::is_foreground).view())
        }
    }
}

/// Reduces a raw model output to a binary mask at model resolution.
pub fn canonicalize(output: ModelOutput) -> Mask {
    match output {
        ModelOutput::Probabilities(array) => canonicalize_array(array),
        ModelOutput::Labels(array) => canonicalize_array(array),
    }
}

/// Nearest-neighbor resize of a mask to `width x height`, as 0/255 alpha.
pub fn upsample(mask: &Mask, width: u32, height: u32) -> GrayImage {
    let (rows, cols) = mask.dim();
    let (Ok(mask_width), Ok(mask_height)) = (u32::try_from(cols), u32::try_from(rows)) else {
        return GrayImage::new(width, height);
    };
    if mask_width == 0 || mask_height == 0 {
        return GrayImage::new(width, height);
    }

    let small = GrayImage::from_fn(mask_width, mask_height, |x, y| {
        if mask[[y as usize, x as usize]] {
            Luma([MASK_ON])
        } else {
            Luma([MASK_OFF])
        }
    });
    imageops::resize(&small, width, height, FilterType::Nearest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probabilities(shape: &[usize], values: Vec<f32>) -> ModelOutput {
        ModelOutput::Probabilities(ArrayD::from_shape_vec(IxDyn(shape), values).unwrap())
    }

    #[test]
    fn test_classify_covers_every_layout() {
        assert_eq!(classify(&[4, 5]), OutputLayout::Dense);
        assert_eq!(classify(&[4, 5, 1]), OutputLayout::SingleChannel);
        assert_eq!(
            classify(&[4, 5, 3]),
            OutputLayout::MultiClass { classes: 3 }
        );
        assert_eq!(classify(&[4, 5, 0]), OutputLayout::Passthrough);
        assert_eq!(classify(&[7]), OutputLayout::Passthrough);
        assert_eq!(classify(&[2, 2, 2, 2]), OutputLayout::Passthrough);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let mask = canonicalize(probabilities(&[1, 3], vec![0.49, 0.5, 0.51]));
        assert_eq!(mask, array![[false, true, true]]);
    }

    #[test]
    fn test_labels_nonzero_are_foreground() {
        let labels = ArrayD::from_shape_vec(IxDyn(&[1, 2, 2, 1]), vec![0, 1, 2, -1]).unwrap();
        let mask = canonicalize(ModelOutput::Labels(labels));
        assert_eq!(mask, array![[false, true], [true, false]]);
    }

    #[test]
    fn test_single_channel_matches_dense() {
        let values = vec![0.1, 0.9, 0.6, 0.2, 0.5, 0.0];
        let with_channel = canonicalize(probabilities(&[1, 2, 3, 1], values.clone()));
        let dense = canonicalize(probabilities(&[2, 3], values));
        assert_eq!(with_channel, dense);
        assert_eq!(dense.dim(), (2, 3));
    }

    #[test]
    fn test_multiclass_argmax_against_background_class() {
        // class 0 is background
        let values = vec![
            0.9, 0.05, 0.05, // y0 x0 -> 0
            0.1, 0.8, 0.1, // y0 x1 -> 1
            0.2, 0.2, 0.6, // y1 x0 -> 2
            0.4, 0.4, 0.2, // y1 x1 -> tie, first wins -> 0
        ];
        let output = probabilities(&[1, 2, 2, 3], values.clone());
        let mask = canonicalize(output);

        let raw = Array3::from_shape_vec((2, 2, 3), values).unwrap();
        for ((y, x), &fg) in mask.indexed_iter() {
            let lane = raw.slice(s![y, x, ..]);
            let best = (0..3)
                .reduce(|a, b| if lane[b] > lane[a] { b } else { a })
                .unwrap();
            assert_eq!(fg, best > 0, "at ({y}, {x})");
        }
        assert_eq!(mask, array![[false, true], [true, false]]);
    }

    #[test]
    fn test_multiclass_probabilities_below_threshold_still_foreground() {
        let mask = canonicalize(probabilities(
            &[1, 2, 1, 3],
            vec![0.3, 0.35, 0.35, 0.2, 0.2, 0.6],
        ));
        assert_eq!(mask, array![[true], [true]]);
    }

    #[test]
    fn test_channel_first_single_channel_output() {
        let mask = canonicalize(probabilities(&[1, 1, 4, 5], vec![0.9; 20]));
        assert_eq!(mask, Array2::from_elem((4, 5), true));

        let values = (0..6).map(|i| if i % 2 == 0 { 0.8 } else { 0.1 }).collect();
        let mask = canonicalize(probabilities(&[1, 1, 2, 3], values));
        assert_eq!(mask, array![[true, false, true], [false, true, false]]);
    }

    #[test]
    fn test_single_row_class_map_reads_as_dense_row() {
        // [1, 1, 1, C] cannot be told apart from channel-first [1, 1, 1, W]
        let mask = canonicalize(probabilities(&[1, 1, 1, 3], vec![0.3, 0.6, 0.5]));
        assert_eq!(mask, array![[false, true, true]]);
    }

    #[test]
    fn test_passthrough_never_panics() {
        assert_eq!(
            canonicalize(probabilities(&[4], vec![0.9, 0.1, 0.7, 0.0])),
            array![[true, false, true, false]]
        );
        assert_eq!(canonicalize(probabilities(&[], vec![0.8])), array![[true]]);
        assert_eq!(
            canonicalize(probabilities(&[2, 2, 0], vec![])),
            Array2::from_elem((2, 2), false)
        );
        let mask = canonicalize(probabilities(&[2, 1, 2, 2], vec![0.9; 8]));
        assert_eq!(mask.dim(), (2, 1));
    }

    #[test]
    fn test_upsample_preserves_cells_without_blur() {
        let mask = array![[true, false], [false, true]];
        let up = upsample(&mask, 4, 6);
        assert_eq!(up.dimensions(), (4, 6));
        for (x, y, pixel) in up.enumerate_pixels() {
            let expected = mask[[(y / 3) as usize, (x / 2) as usize]];
            assert_eq!(pixel.0[0], if expected { MASK_ON } else { MASK_OFF });
        }
    }

    #[test]
    fn test_upsample_of_empty_mask_is_background() {
        let mask = Array2::from_elem((0, 3), true);
        let up = upsample(&mask, 5, 5);
        assert!(up.pixels().all(|p| p.0[0] == MASK_OFF));
    }
}
