//! Chromagram of a timing-annotated score.

use log::{info, warn};
use ndarray::Array2;
use std::collections::BTreeMap;

use super::element::{ScoreElement, Tick};
use crate::feature::chroma::N_CHROMA;
use crate::utils::{NormType, normalize_2d};
use crate::{Error, Result};

/// Identifier of every duration-bearing element, mapped to the score column
/// its onset falls in.
pub type IdentifierIndexMap = BTreeMap<String, usize>;

#[derive(Debug, Clone)]
pub struct ScoreChroma {
    /// Shape (12, W); row `k` is pitch class `k`, each row max-normalized.
    pub matrix: Array2<f32>,
    pub index: IdentifierIndexMap,
    /// Ticks per column: the shortest positive duration in the score.
    pub grid_ticks: Tick,
    /// Latest `onset + duration` over all elements.
    pub highest_end: Tick,
}

impl ScoreChroma {
    pub fn columns(&self) -> usize {
        self.matrix.shape()[1]
    }
}

/// Build the score chromagram on a grid of the shortest duration.
///
/// Every note adds 1.0 to its pitch class over the columns it sounds in;
/// rests only claim an index entry. Elements without a duration are left
/// out entirely, and zero durations never define the grid.
///
/// # Errors
/// [`Error::EmptyScore`] when no element has a positive duration.
///
/// # Example
/// ```
/// use scoresync::score::{ScoreElement, score_chroma};
///
/// let elements = [
///     ScoreElement::note("c", 60, 0, 480),
///     ScoreElement::note("g", 67, 480, 480),
/// ];
/// let chroma = score_chroma(&elements).unwrap();
/// assert_eq!(chroma.matrix.shape(), &[12, 2]);
/// assert_eq!(chroma.index["g"], 1);
/// ```
pub fn score_chroma(elements: &[ScoreElement]) -> Result<ScoreChroma> {
    let timed: Vec<(&ScoreElement, Tick)> = elements
        .iter()
        .filter_map(|e| e.duration.map(|d| (e, d)))
        .collect();

    let grid_ticks = timed
        .iter()
        .map(|&(_, d)| d)
        .filter(|&d| d > 0)
        .min()
        .ok_or(Error::EmptyScore)?;
    let highest_end = timed
        .iter()
        .map(|&(e, d)| e.onset + d)
        .fold(grid_ticks, Tick::max);

    let width = highest_end.div_ceil(grid_ticks) as usize;
    let mut matrix = Array2::<f32>::zeros((N_CHROMA, width));
    let mut index = IdentifierIndexMap::new();

    for (element, duration) in timed {
        let start = (element.onset / grid_ticks) as usize;
        if index
            .insert(element.identifier.clone(), start.min(width - 1))
            .is_some()
        {
            warn!("duplicate score identifier `{}`", element.identifier);
        }
        if let Some(class) = element.pitch_class() {
            let end = ((element.onset + duration).div_ceil(grid_ticks) as usize).min(width);
            matrix
                .row_mut(class)
                .iter_mut()
                .take(end)
                .skip(start)
                .for_each(|v| *v += 1.0);
        }
    }

    let matrix = normalize_2d(&matrix, NormType::Max, 1);
    info!(
        "score chroma shape: {:?} ({} ticks per column, {} indexed elements)",
        matrix.shape(),
        grid_ticks,
        index.len()
    );

    Ok(ScoreChroma {
        matrix,
        index,
        grid_ticks,
        highest_end,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_notes_fill_their_columns() {
        let elements = [
            ScoreElement::note("c", 60, 0, 480),
            ScoreElement::note("g", 67, 480, 480),
        ];
        let chroma = score_chroma(&elements).unwrap();
        assert_eq!(chroma.grid_ticks, 480);
        assert_eq!(chroma.highest_end, 960);
        assert_eq!(chroma.matrix.row(0).to_vec(), vec![1.0, 0.0]);
        assert_eq!(chroma.matrix.row(7).to_vec(), vec![0.0, 1.0]);
        assert_eq!(chroma.index["c"], 0);
        assert_eq!(chroma.index["g"], 1);
    }

    #[test]
    fn rests_are_indexed_but_silent() {
        let elements = [
            ScoreElement::rest("r", 0, 240),
            ScoreElement::note("e", 64, 240, 720),
        ];
        let chroma = score_chroma(&elements).unwrap();
        assert_eq!(chroma.columns(), 4);
        assert_eq!(chroma.index["r"], 0);
        assert_eq!(chroma.matrix.column(0).sum(), 0.0);
        assert_eq!(chroma.matrix.row(4).to_vec(), vec![0.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn fill_stops_at_the_note_end() {
        let elements = [
            ScoreElement::note("pad", 62, 0, 1920),
            ScoreElement::note("mid", 67, 480, 960),
        ];
        let chroma = score_chroma(&elements).unwrap();
        assert_eq!(chroma.columns(), 4);
        assert_eq!(chroma.matrix.row(7).to_vec(), vec![0.0, 1.0, 1.0, 0.0]);
        assert_eq!(chroma.matrix.row(2).to_vec(), vec![1.0; 4]);
    }

    #[test]
    fn overlapping_notes_accumulate_before_normalizing() {
        let elements = [
            ScoreElement::note("long", 48, 0, 960),
            ScoreElement::note("short", 60, 480, 480),
        ];
        let chroma = score_chroma(&elements).unwrap();
        assert_eq!(chroma.matrix.row(0).to_vec(), vec![0.5, 1.0]);
    }

    #[test]
    fn undurated_elements_are_excluded() {
        let elements = [
            ScoreElement::note("grace", 62, 0, 1).without_duration(),
            ScoreElement::note("main", 60, 0, 720),
        ];
        let chroma = score_chroma(&elements).unwrap();
        assert_eq!(chroma.grid_ticks, 720);
        assert!(!chroma.index.contains_key("grace"));
        assert_eq!(chroma.index.len(), 1);
    }

    #[test]
    fn zero_durations_do_not_define_the_grid() {
        let elements = [
            ScoreElement::note("zero", 60, 960, 0),
            ScoreElement::note("a", 69, 0, 960),
        ];
        let chroma = score_chroma(&elements).unwrap();
        assert_eq!(chroma.grid_ticks, 960);
        assert_eq!(chroma.columns(), 1);
        assert_eq!(chroma.index["zero"], 0);
        assert_eq!(chroma.matrix.row(0).sum(), 0.0);
    }

    #[test]
    fn empty_scores_are_rejected() {
        assert!(matches!(score_chroma(&[]), Err(Error::EmptyScore)));
        let only_zero = [ScoreElement::rest("r", 0, 0)];
        assert!(matches!(score_chroma(&only_zero), Err(Error::EmptyScore)));
        let undurated = [ScoreElement::note("n", 60, 0, 1).without_duration()];
        assert!(matches!(score_chroma(&undurated), Err(Error::EmptyScore)));
    }
}
