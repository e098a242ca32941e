//! Request/response payload shapes for each router capability. These are the
//! canonical shapes providers are normalized into at the router boundary
//! (spec.md §9, "Dynamic attribute growth on result dicts").

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::records::{DailyBar, EarningsCalendarRow, Fundamentals};

/// One symbol's quote for `quote_batch` (a single day's OHLCV).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteBatchRequest {
    pub symbols: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuoteBatchResponse {
    pub bars: HashMap<String, DailyBar>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRangeRequest {
    pub symbol: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRangeResponse {
    pub bars: Vec<DailyBar>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundamentalsRequest {
    pub symbol: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FundamentalsResponse {
    pub statements: Vec<Fundamentals>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarningsCalendarRequest {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EarningsCalendarResponse {
    pub rows: Vec<EarningsCalendarRow>,
}

/// Plumbing-only payload for the deferred analyst-recommendation feature
/// (see DESIGN.md Open Question 2): the capability and wire shape exist so
/// the router dispatches it like any other, but no phase of the Orchestrator
/// calls it and no scoring logic consumes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalystRecommendationsRequest {
    pub symbol: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalystRecommendationsResponse {
    pub buy: i32,
    pub hold: i32,
    pub sell: i32,
}
