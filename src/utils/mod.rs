mod array;
mod dtw;
mod validation;

// Array operations
pub use array::{NormType, normalize_2d};

// Dynamic Time Warping
pub use dtw::{Metric, dtw};

// Validation operations
pub use validation::valid_audio;
