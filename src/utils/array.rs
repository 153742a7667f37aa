use ndarray::{Array2, Axis};

/// Normalize a 2D array along an axis.
///
/// `axis == 0` normalizes every column, `axis == 1` every row.
pub fn normalize_2d(x: &Array2<f32>, norm: NormType, axis: usize) -> Array2<f32> {
    let mut result = x.clone();
    let lanes = if axis == 0 { Axis(1) } else { Axis(0) };
    for mut lane in result.axis_iter_mut(lanes) {
        let norm_val = norm.of(lane.iter().copied());
        if norm_val > 1e-10 {
            lane.mapv_inplace(|v| v / norm_val);
        }
    }
    result
}

#[derive(Debug, Clone, Copy)]
pub enum NormType {
    L2,
    /// Maximum absolute value.
    Max,
}

impl NormType {
    fn of(self, values: impl Iterator<Item = f32>) -> f32 {
        match self {
            NormType::L2 => values.map(|v| v * v).sum::<f32>().sqrt(),
            NormType::Max => values.map(f32::abs).fold(0.0f32, f32::max),
        }
    }
}
