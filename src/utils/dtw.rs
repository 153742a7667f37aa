use ndarray::{Array2, ArrayView1};
use std::fmt;
use std::str::FromStr;

/// Local distance between two feature columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Metric {
    #[default]
    Euclidean,
    Manhattan,
    Cosine,
}

impl Metric {
    fn distance(self, a: ArrayView1<f32>, b: ArrayView1<f32>) -> f32 {
        let pairs = a.iter().zip(b.iter()).map(|(&x, &y)| (x as f64, y as f64));
        let d = match self {
            Metric::Euclidean => pairs.map(|(x, y)| (x - y) * (x - y)).sum::<f64>().sqrt(),
            Metric::Manhattan => pairs.map(|(x, y)| (x - y).abs()).sum(),
            Metric::Cosine => {
                let (mut dot, mut norm_x, mut norm_y) = (0.0f64, 0.0f64, 0.0f64);
                for (x, y) in pairs {
                    dot += x * y;
                    norm_x += x * x;
                    norm_y += y * y;
                }
                let norm_prod = (norm_x * norm_y).sqrt();
                if norm_prod > 1e-10 {
                    1.0 - dot / norm_prod
                } else {
                    1.0
                }
            }
        };
        d as f32
    }
}

impl FromStr for Metric {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "euclidean" => Ok(Metric::Euclidean),
            "manhattan" | "cityblock" => Ok(Metric::Manhattan),
            "cosine" => Ok(Metric::Cosine),
            _ => Err(crate::Error::InvalidParameter {
                name: "metric",
                value: s.to_string(),
                reason: "expected euclidean, manhattan or cosine".into(),
            }),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Metric::Euclidean => "euclidean",
            Metric::Manhattan => "manhattan",
            Metric::Cosine => "cosine",
        })
    }
}

/// Compute Dynamic Time Warping (DTW) distance and path.
///
/// Steps are (1,1), (0,1) and (1,0); on equal accumulated cost the
/// diagonal step wins, then the step along `y`.
///
/// # Arguments
/// * `x` - First feature matrix (n_features x n_frames_x)
/// * `y` - Second feature matrix (n_features x n_frames_y)
/// * `metric` - Local distance between columns
///
/// # Returns
/// Tuple of (distance, path) where path is Vec<(i, j)> of aligned frame
/// indices from (0, 0) to (n_x - 1, n_y - 1). Mismatched feature counts or
/// empty inputs give `(f32::INFINITY, vec![])`.
///
/// # Example
/// ```
/// use scoresync::utils::{dtw, Metric};
/// use ndarray::Array2;
///
/// let x = Array2::from_shape_vec((2, 3), vec![1.0, 2.0, 3.0, 1.0, 2.0, 3.0]).unwrap();
/// let y = Array2::from_shape_vec((2, 4), vec![1.0, 2.0, 2.5, 3.0, 1.0, 2.0, 2.5, 3.0]).unwrap();
/// let (distance, path) = dtw(&x, &y, Metric::Euclidean);
/// assert!(distance >= 0.0);
/// assert_eq!(path.first(), Some(&(0, 0)));
/// assert_eq!(path.last(), Some(&(2, 3)));
/// ```
pub fn dtw(x: &Array2<f32>, y: &Array2<f32>, metric: Metric) -> (f32, Vec<(usize, usize)>) {
    let n_x = x.shape()[1];
    let n_y = y.shape()[1];

    if x.shape()[0] != y.shape()[0] || n_x == 0 || n_y == 0 {
        return (f32::INFINITY, Vec::new());
    }

    // Accumulated cost, filled in place from local distances
    let mut cost = Array2::<f32>::zeros((n_x, n_y));
    for i in 0..n_x {
        let xi = x.column(i);
        for j in 0..n_y {
            let d = metric.distance(xi, y.column(j));
            let best_prev = match (i, j) {
                (0, 0) => 0.0,
                (0, _) => cost[(0, j - 1)],
                (_, 0) => cost[(i - 1, 0)],
                _ => cost[(i - 1, j - 1)]
                    .min(cost[(i, j - 1)])
                    .min(cost[(i - 1, j)]),
            };
            cost[(i, j)] = d + best_prev;
        }
    }

    let mut path = Vec::with_capacity(n_x + n_y);
    let (mut i, mut j) = (n_x - 1, n_y - 1);
    path.push((i, j));

    while i > 0 || j > 0 {
        if i == 0 {
            j -= 1;
        } else if j == 0 {
            i -= 1;
        } else {
            let diag = cost[(i - 1, j - 1)];
            let left = cost[(i, j - 1)];
            let down = cost[(i - 1, j)];

            if diag <= left && diag <= down {
                i -= 1;
                j -= 1;
            } else if left <= down {
                j -= 1;
            } else {
                i -= 1;
            }
        }
        path.push((i, j));
    }

    path.reverse();
    (cost[(n_x - 1, n_y - 1)], path)
}
