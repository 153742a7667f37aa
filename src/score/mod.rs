//! Score side of the alignment: timing expansion, the score chromagram and
//! measure lookup.

mod chroma;
mod element;
mod expander;
mod measure;
pub mod mei;
mod native;

pub use chroma::{IdentifierIndexMap, ScoreChroma, score_chroma};
pub use element::{ElementKind, ScoreElement, Tick};
pub use expander::{AnnotatedExpander, ExpanderHandle, NativeExpander, TimingExpander};
pub use measure::{
    MeasureEntry, MeasureIndex, MeasureLookup, MeasureWarning, aggregate_measures,
    filter_measures_by_earliest, measure_timestamps,
};
