use log::{debug, info};
use ndarray::Array2;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::utils::{Metric, dtw};
use crate::{Error, Result};

/// Which audio column a score column keeps when the warp path visits it
/// more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicateColumns {
    /// Earliest audio column paired with the score column.
    First,
    /// Latest audio column paired with the score column.
    #[default]
    Last,
}

impl FromStr for DuplicateColumns {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "first" => Ok(DuplicateColumns::First),
            "last" => Ok(DuplicateColumns::Last),
            _ => Err(Error::InvalidParameter {
                name: "duplicates",
                value: s.to_string(),
                reason: "expected first or last".into(),
            }),
        }
    }
}

impl fmt::Display for DuplicateColumns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DuplicateColumns::First => "first",
            DuplicateColumns::Last => "last",
        })
    }
}

/// Optimal warp path between a score and an audio chromagram, from
/// `(0, 0)` to the last column of each.
#[derive(Debug, Clone)]
pub struct WarpPath {
    pairs: Vec<(usize, usize)>,
    cost: f32,
}

impl WarpPath {
    /// Run DTW over the columns of both matrices.
    ///
    /// # Errors
    /// [`Error::AlignmentFailed`] if either matrix has no columns or the
    /// two disagree on the number of rows.
    pub fn compute(score: &Array2<f32>, audio: &Array2<f32>, metric: Metric) -> Result<Self> {
        let (score_rows, score_cols) = score.dim();
        let (audio_rows, audio_cols) = audio.dim();
        if score_cols == 0 || audio_cols == 0 {
            return Err(Error::AlignmentFailed(format!(
                "cannot warp {score_cols} score columns against {audio_cols} audio columns"
            )));
        }
        if score_rows != audio_rows {
            return Err(Error::AlignmentFailed(format!(
                "score has {score_rows} chroma bins, audio has {audio_rows}"
            )));
        }

        let (cost, pairs) = dtw(score, audio, metric);
        if pairs.is_empty() {
            return Err(Error::AlignmentFailed("empty warp path".into()));
        }
        info!(
            "warp path: {} steps, {metric} cost {cost:.4}",
            pairs.len()
        );
        Ok(Self { pairs, cost })
    }

    /// Path pairs `(score_column, audio_column)`, in order.
    pub fn pairs(&self) -> &[(usize, usize)] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Accumulated local distance along the path.
    pub fn cost(&self) -> f32 {
        self.cost
    }

    pub fn column_map(&self, policy: DuplicateColumns) -> ColumnMap {
        ColumnMap::from_pairs(&self.pairs, policy)
    }
}

/// Score column to audio column lookup folded from a warp path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    columns: BTreeMap<usize, usize>,
}

impl ColumnMap {
    pub fn from_pairs(pairs: &[(usize, usize)], policy: DuplicateColumns) -> Self {
        let mut columns = BTreeMap::new();
        for &(score_col, audio_col) in pairs {
            match policy {
                DuplicateColumns::Last => {
                    columns.insert(score_col, audio_col);
                }
                DuplicateColumns::First => {
                    columns.entry(score_col).or_insert(audio_col);
                }
            }
        }
        debug!(
            "column map covers {} score columns ({policy} duplicate kept)",
            columns.len()
        );
        Self { columns }
    }

    pub fn get(&self, score_column: usize) -> Option<usize> {
        self.columns.get(&score_column).copied()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_policy_picks_first_or_last() {
        let pairs = [(0, 0), (0, 1), (0, 2), (1, 3), (2, 3)];
        let last = ColumnMap::from_pairs(&pairs, DuplicateColumns::Last);
        let first = ColumnMap::from_pairs(&pairs, DuplicateColumns::First);
        assert_eq!(last.get(0), Some(2));
        assert_eq!(first.get(0), Some(0));
        assert_eq!(last.get(2), Some(3));
        assert_eq!(first.get(3), None);
        assert_eq!(last.len(), 3);
    }

    #[test]
    fn policy_parsing() {
        assert_eq!("FIRST".parse::<DuplicateColumns>().unwrap(), DuplicateColumns::First);
        assert_eq!(DuplicateColumns::default().to_string(), "last");
        assert!("middle".parse::<DuplicateColumns>().is_err());
    }

    #[test]
    fn compute_rejects_degenerate_matrices() {
        let score = Array2::<f32>::zeros((12, 0));
        let audio = Array2::<f32>::zeros((12, 5));
        assert!(matches!(
            WarpPath::compute(&score, &audio, Metric::Euclidean),
            Err(Error::AlignmentFailed(_))
        ));
        let audio = Array2::<f32>::zeros((6, 5));
        let score = Array2::<f32>::zeros((12, 2));
        assert!(matches!(
            WarpPath::compute(&score, &audio, Metric::Euclidean),
            Err(Error::AlignmentFailed(_))
        ));
    }

    #[test]
    fn compute_spans_both_matrices() {
        let score = Array2::from_shape_fn((12, 3), |(r, c)| if r == c { 1.0 } else { 0.0 });
        let audio = Array2::from_shape_fn((12, 6), |(r, c)| if r == c / 2 { 1.0 } else { 0.0 });
        let path = WarpPath::compute(&score, &audio, Metric::Euclidean).unwrap();
        assert_eq!(path.pairs().first(), Some(&(0, 0)));
        assert_eq!(path.pairs().last(), Some(&(2, 5)));
        assert!(path.cost().abs() < 1e-6);
        let map = path.column_map(DuplicateColumns::First);
        assert_eq!(map.get(1), Some(2));
    }
}
