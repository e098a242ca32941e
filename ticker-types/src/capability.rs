use core::fmt;
use serde::{Deserialize, Serialize};

/// Router capability labels. One-to-one with provider role traits and
/// routing/error telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Capability {
    /// Batched same-day quotes for up to 100 symbols per call.
    QuoteBatch,
    /// Historical OHLCV range for a single symbol.
    HistoricalRange,
    /// Income statement / balance sheet / cashflow statement pack.
    Fundamentals,
    /// Earnings calendar entries over a date range.
    EarningsCalendar,
    /// Analyst recommendation rows (plumbing only, see DESIGN.md).
    AnalystRecommendations,
}

impl Capability {
    /// Stable identifier used in logs, errors, and config files.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::QuoteBatch => "quote_batch",
            Self::HistoricalRange => "historical_range",
            Self::Fundamentals => "fundamentals",
            Self::EarningsCalendar => "earnings_calendar",
            Self::AnalystRecommendations => "analyst_recommendations",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
