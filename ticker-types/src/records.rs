//! Canonical data-model records. Every provider response is normalized into
//! one of these shapes at the router boundary; downstream code never sees a
//! provider-specific payload.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A covered ticker and its bookkeeping metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: String,
    pub active: bool,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub market_cap_category: Option<String>,
    pub next_earnings_date: Option<NaiveDate>,
    pub fundamentals_last_update: Option<NaiveDateTime>,
    pub data_priority: i32,
}

/// The ~40-field technical indicator vector computed for one bar.
///
/// Every field is `None` until its minimum bar-window requirement is
/// satisfied; see `ticker-indicators` for the per-field window table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorVector {
    pub rsi_14: Option<Decimal>,

    pub ema_20: Option<Decimal>,
    pub ema_50: Option<Decimal>,
    pub ema_100: Option<Decimal>,
    pub ema_200: Option<Decimal>,

    pub macd_line: Option<Decimal>,
    pub macd_signal: Option<Decimal>,
    pub macd_histogram: Option<Decimal>,

    pub bb_upper: Option<Decimal>,
    pub bb_middle: Option<Decimal>,
    pub bb_lower: Option<Decimal>,

    pub stoch_k: Option<Decimal>,
    pub stoch_d: Option<Decimal>,

    pub cci_20: Option<Decimal>,
    pub atr_14: Option<Decimal>,

    pub di_plus_14: Option<Decimal>,
    pub di_minus_14: Option<Decimal>,
    pub dx_14: Option<Decimal>,
    pub adx_14: Option<Decimal>,

    pub vwap_20: Option<Decimal>,
    pub obv: Option<Decimal>,

    pub fib_236: Option<Decimal>,
    pub fib_382: Option<Decimal>,
    pub fib_500: Option<Decimal>,
    pub fib_618: Option<Decimal>,
    pub fib_786: Option<Decimal>,

    pub pivot: Option<Decimal>,
    pub r1: Option<Decimal>,
    pub r2: Option<Decimal>,
    pub r3: Option<Decimal>,
    pub s1: Option<Decimal>,
    pub s2: Option<Decimal>,
    pub s3: Option<Decimal>,
    pub swing_high: Option<Decimal>,
    pub swing_low: Option<Decimal>,
}

impl IndicatorVector {
    /// True when every field is still `None` (e.g. insufficient history).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// One OHLCV bar for one ticker on one trading day, plus its indicator vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub ticker: String,
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: i64,
    pub indicators: IndicatorVector,
}

impl DailyBar {
    /// Bar-validity invariant from the data model: `low <= min(open, close)`,
    /// `high >= max(open, close)`, `volume >= 0`.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.low <= self.open.min(self.close)
            && self.high >= self.open.max(self.close)
            && self.volume >= 0
    }
}

/// Reporting period granularity for a fundamentals row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeriodType {
    Annual,
    Quarterly,
}

/// Data-quality flag surfaced when TTM figures fall back to an annual row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataQuality {
    #[default]
    Normal,
    Low,
}

/// One reported fundamentals statement (income + balance + cashflow, flattened).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fundamentals {
    pub ticker: String,
    pub report_date: NaiveDate,
    pub period_type: PeriodType,
    pub fiscal_year: i32,
    pub fiscal_quarter: Option<i32>,
    pub revenue: Option<Decimal>,
    pub gross_profit: Option<Decimal>,
    pub operating_income: Option<Decimal>,
    pub net_income: Option<Decimal>,
    pub ebitda: Option<Decimal>,
    pub eps_diluted: Option<Decimal>,
    pub book_value_per_share: Option<Decimal>,
    pub total_assets: Option<Decimal>,
    pub total_debt: Option<Decimal>,
    pub total_equity: Option<Decimal>,
    pub cash: Option<Decimal>,
    pub operating_cash_flow: Option<Decimal>,
    pub free_cash_flow: Option<Decimal>,
    pub capex: Option<Decimal>,
    pub shares_outstanding: Option<Decimal>,
    pub shares_float: Option<Decimal>,
    pub data_source: String,
    pub last_updated: NaiveDateTime,
}

/// The 27-field financial ratio vector, grouped per spec into 8 categories.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ratios {
    pub ticker: String,
    pub calculation_date: NaiveDate,

    // Valuation (5)
    pub pe: Option<Decimal>,
    pub pb: Option<Decimal>,
    pub ps: Option<Decimal>,
    pub ev_ebitda: Option<Decimal>,
    pub peg: Option<Decimal>,

    // Profitability (6)
    pub roe: Option<Decimal>,
    pub roa: Option<Decimal>,
    pub roic: Option<Decimal>,
    pub gross_margin: Option<Decimal>,
    pub operating_margin: Option<Decimal>,
    pub net_margin: Option<Decimal>,

    // Financial Health (5)
    pub debt_to_equity: Option<Decimal>,
    pub current_ratio: Option<Decimal>,
    pub quick_ratio: Option<Decimal>,
    pub interest_coverage: Option<Decimal>,
    pub altman_z_score: Option<Decimal>,

    // Efficiency (3)
    pub asset_turnover: Option<Decimal>,
    pub inventory_turnover: Option<Decimal>,
    pub receivables_turnover: Option<Decimal>,

    // Growth (3)
    pub revenue_growth_yoy: Option<Decimal>,
    pub earnings_growth_yoy: Option<Decimal>,
    pub fcf_growth_yoy: Option<Decimal>,

    // Quality (2)
    pub fcf_to_net_income: Option<Decimal>,
    pub cash_conversion_cycle: Option<Decimal>,

    // Market (2)
    pub market_cap: Option<Decimal>,
    pub enterprise_value: Option<Decimal>,

    // Intrinsic (1)
    pub graham_number: Option<Decimal>,

    /// Explanation strings for `None` ratios (e.g. "N/A — negative book value").
    pub explanations: Vec<String>,
}

/// Coarse risk classification driving the investor-score dampening multipliers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Normal,
    Caution,
    Warning,
    HighRisk,
}

impl RiskLevel {
    /// Multiplier applied to a raw composite score (spec.md §4.6).
    #[must_use]
    pub fn multiplier(self) -> Decimal {
        match self {
            Self::Normal => Decimal::ONE,
            Self::Caution => Decimal::new(95, 2),
            Self::Warning => Decimal::new(85, 2),
            Self::HighRisk => Decimal::new(70, 2),
        }
    }
}

/// The three investor-score profiles and their component breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestorScores {
    pub ticker: String,
    pub calculation_date: NaiveDate,
    pub conservative_score: Option<Decimal>,
    pub garp_score: Option<Decimal>,
    pub deep_value_score: Option<Decimal>,
    pub valuation_component: Option<Decimal>,
    pub quality_component: Option<Decimal>,
    pub financial_health_component: Option<Decimal>,
    pub profitability_component: Option<Decimal>,
    pub growth_component: Option<Decimal>,
    pub management_component: Option<Decimal>,
    pub risk_level: RiskLevel,
    pub risk_factors: Vec<String>,
    pub explanation: String,
}

/// One upcoming or recently confirmed earnings date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarningsCalendarRow {
    pub ticker: String,
    pub earnings_date: NaiveDate,
    pub confirmed: bool,
    pub eps_estimate: Option<Decimal>,
    pub revenue_estimate: Option<Decimal>,
    pub priority_level: i32,
    pub data_updated: bool,
}

/// Append-only per-(provider, date) API call ledger row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiUsage {
    pub provider: String,
    pub date: NaiveDate,
    pub endpoint: String,
    pub calls_made: i64,
    pub calls_limit: i64,
    pub reset_time: NaiveDateTime,
}

/// Outcome of one phase's (or one run's) execution, for audit and resumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Success,
    Partial,
    Failed,
    Aborted,
    Skipped,
}

/// Append-only row recording one phase's or one run's outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateLog {
    pub update_type: String,
    pub ticker: Option<String>,
    pub status: RunStatus,
    pub error_message: Option<String>,
    pub records_processed: i64,
    pub execution_time_ms: i64,
    pub started_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
}

/// Per-ticker bookkeeping tag used to drive `Store::tickers_needing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TickerNeedTag {
    PriceToday,
    HistoryBelow(u32),
    FundamentalsStale,
    RatiosStale,
    DelistedSuspects,
}
