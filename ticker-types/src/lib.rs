//! Shared types for the ticker pipeline workspace: capability labels, the
//! canonical data-model records, request/response payload shapes, and
//! configuration structs. No other workspace crate should re-declare these.

pub mod capability;
pub mod config;
pub mod records;
pub mod requests;

pub use capability::Capability;
pub use config::{BackoffConfig, PipelineConfig, ProviderConfig};
pub use records::{
    ApiUsage, DailyBar, DataQuality, EarningsCalendarRow, Fundamentals, IndicatorVector,
    InvestorScores, PeriodType, Ratios, RiskLevel, RunStatus, Ticker, TickerNeedTag, UpdateLog,
};
pub use requests::{
    AnalystRecommendationsRequest, AnalystRecommendationsResponse, EarningsCalendarRequest,
    EarningsCalendarResponse, FundamentalsRequest, FundamentalsResponse, HistoricalRangeRequest,
    HistoricalRangeResponse, QuoteBatchRequest, QuoteBatchResponse,
};
