//! Batch Price Processor and Pipeline Orchestrator: the daily six-phase run
//! that ties the router, calendar, indicator engine, fundamentals
//! processor, and store together (spec.md §4.3, §4.7).

pub mod batch;
pub mod budget;
pub mod config;
pub mod logging;
pub mod orchestrator;
pub mod phases;
pub mod worker;

pub use batch::{BatchPriceProcessor, FillOutcome, PriceRefreshReport, TickerOutcome};
pub use budget::Budget;
pub use orchestrator::{Orchestrator, OrchestratorBuilder, RunReport};
pub use phases::PhaseReport;
