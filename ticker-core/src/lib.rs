//! Core provider seams shared by the router, middleware, mock, and
//! fundamentals/indicator crates: the unified error type, the capability
//! role traits and `DataProvider` master trait, and the `Middleware` seam.

pub mod connector;
pub mod error;
pub mod middleware;

pub use connector::{
    AnalystRecommendationsProvider, DataProvider, EarningsCalendarProvider, FundamentalsProvider,
    HistoricalRangeProvider, QuoteBatchProvider,
};
pub use error::PipelineError;
pub use middleware::{CallContext, CallOrigin, Middleware, MiddlewareDescriptor, ValidationContext};
