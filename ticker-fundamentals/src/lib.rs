//! Fundamentals Processor and Ratio/Score Calculator: trigger policy, TTM
//! aggregation, the 27-field Ratio vector, and the three Investor Score
//! profiles. Pure computation; no I/O.

pub mod ratios;
pub mod scores;
pub mod thresholds;
pub mod trigger;
pub mod ttm;

pub use ratios::{calculate as calculate_ratios, AltmanZone, RatioInputs};
pub use scores::calculate as calculate_scores;
pub use thresholds::{default_table, RatioThreshold, ThresholdTable};
pub use trigger::needs_refresh;
pub use ttm::{compute_ttm, TtmFigures};
