//! Alignment of score and audio chromagrams, and translation of score
//! columns into seconds of the recording.

mod path;
mod timestamps;

pub use path::{ColumnMap, DuplicateColumns, WarpPath};
pub use timestamps::{AudioTiming, TimestampMap, map_timestamps};
