//! Committee consensus computation.
//!
//! Pure functions over a completed job's committee data.

pub mod aggregator;

pub use aggregator::*;
