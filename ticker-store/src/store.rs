//! The `Store` trait: spec.md §4.2's "thin, synchronous transactional
//! abstraction", lifted to `async` for the tokio-based pipeline. Every
//! mutation documented here runs within a single transaction per logical
//! unit; a failure rolls back that unit without affecting others in the
//! same batch.

use async_trait::async_trait;
use chrono::NaiveDate;
use ticker_core::PipelineError;
use ticker_types::{
    ApiUsage, DailyBar, EarningsCalendarRow, Fundamentals, IndicatorVector, InvestorScores,
    Ratios, Ticker, TickerNeedTag, UpdateLog,
};

/// Persistence seam consumed by the Batch Price Processor, the Indicator
/// Engine's write path, the Fundamentals Processor, and the Orchestrator.
///
/// Object-safe so the Orchestrator can hold it as `Arc<dyn Store>`, matching
/// the `Arc<dyn DataProvider>` pattern `ticker-router` already uses.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert on unique `(ticker, date)`; on conflict, only the price/volume
    /// columns are overwritten. Indicator columns already present survive
    /// the upsert untouched. Rejects a bar that fails `DailyBar::is_valid`.
    async fn upsert_daily_bar(&self, bar: &DailyBar) -> Result<(), PipelineError>;

    /// Partial update: only the `Some` fields of `indicators` are written.
    async fn update_indicators(
        &self,
        ticker: &str,
        date: NaiveDate,
        indicators: &IndicatorVector,
    ) -> Result<(), PipelineError>;

    /// Up to `days` most recent bars for `ticker`, ascending by date.
    async fn read_price_series(&self, ticker: &str, days: u32) -> Result<Vec<DailyBar>, PipelineError>;

    /// Idempotent upsert keyed on `(ticker, report_date, period_type)`.
    async fn upsert_fundamentals(&self, row: &Fundamentals) -> Result<(), PipelineError>;

    /// Idempotent upsert keyed on `(ticker, calculation_date)`.
    async fn upsert_ratios(&self, row: &Ratios) -> Result<(), PipelineError>;

    /// Idempotent upsert keyed on `(ticker, calculation_date)`.
    async fn upsert_scores(&self, row: &InvestorScores) -> Result<(), PipelineError>;

    /// The ticker set needing work of the given kind, as the Orchestrator's
    /// phases use to build their worklists. `as_of` is the run date staleness
    /// and "has today's bar" checks are measured against, not the wall clock,
    /// so a run for a past date stays self-consistent.
    async fn tickers_needing(&self, tag: TickerNeedTag, as_of: NaiveDate) -> Result<Vec<String>, PipelineError>;

    /// Register or update a ticker's bookkeeping row (`stocks` table).
    /// Not one of spec.md §4.2's seven named operations, but required by the
    /// same schema (spec.md §6) for the universe the other operations act on.
    async fn upsert_ticker(&self, ticker: &Ticker) -> Result<(), PipelineError>;

    /// Fetch one ticker's bookkeeping row, if it is registered.
    async fn get_ticker(&self, ticker: &str) -> Result<Option<Ticker>, PipelineError>;

    /// Phase 6 delisting outcome: sets `stocks.active = false`. Existing
    /// `daily_charts` rows for the ticker are left untouched (scenario 3).
    async fn mark_delisted(&self, ticker: &str) -> Result<(), PipelineError>;

    /// Idempotent upsert keyed on `(ticker, earnings_date)`.
    async fn upsert_earnings_calendar(&self, row: &EarningsCalendarRow) -> Result<(), PipelineError>;

    /// Earnings rows with `earnings_date` in `[from, to]`, used by Phase 3
    /// to find tickers whose fundamentals need an earnings-triggered refresh.
    async fn earnings_calendar_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<EarningsCalendarRow>, PipelineError>;

    /// Appends one call to the daily API usage ledger.
    async fn record_api_usage(&self, usage: &ApiUsage) -> Result<(), PipelineError>;

    /// Total calls already recorded for `(provider, date)`, used by the
    /// Orchestrator's budget-safety accounting.
    async fn api_calls_used(&self, provider: &str, date: NaiveDate) -> Result<i64, PipelineError>;

    /// Appends one row to the append-only run/phase audit log.
    async fn record_update_log(&self, entry: &UpdateLog) -> Result<(), PipelineError>;

    /// Every fundamentals row on file for `ticker`, in no particular order.
    /// Backs Phase 4's ratio/score computation, which reads back what Phase 3
    /// already upserted instead of issuing its own provider call.
    async fn fundamentals_for_ticker(&self, ticker: &str) -> Result<Vec<Fundamentals>, PipelineError>;

    /// Whether `update_type` already has a `Success` or `Skipped` entry for
    /// `run_date` in the audit log, i.e. whether the Orchestrator can skip
    /// that phase on a re-run rather than repeating it.
    async fn update_log_completed(&self, update_type: &str, run_date: NaiveDate) -> Result<bool, PipelineError>;
}
