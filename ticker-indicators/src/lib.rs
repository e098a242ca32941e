//! Indicator Engine: pure computation of the ~40-field technical indicator
//! vector from an ascending daily bar series. No I/O.

pub mod accumulators;
mod compute;

pub use compute::compute;
