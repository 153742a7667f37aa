//! Signal effects applied before analysis.

pub mod trim;
