//! Utility Module
//!
//! - [`sampling`]: low-discrepancy sequences, identity hashing and color
//!   conversion used by sample kernels and the random-color material mode.

pub mod sampling;
