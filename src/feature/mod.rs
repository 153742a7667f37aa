//! Feature extraction.

pub mod chroma;
