//! Batch Price Processor: brings every ticker's `DailyBar` row for today up
//! to date via the provider router's batched quote endpoint, and backfills
//! history for tickers below the minimum window (spec.md §4.3).

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use ticker_core::PipelineError;
use ticker_router::ProviderRouter;
use ticker_store::Store;
use ticker_types::{ApiUsage, DailyBar, HistoricalRangeRequest, QuoteBatchRequest};
use tracing::{info, warn};

use crate::budget::Budget;

/// Per-ticker disposition of one price-refresh attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickerOutcome {
    Stored,
    Rejected,
    Missing,
}

/// Aggregate result of one `refresh_prices` call.
#[derive(Debug, Default)]
pub struct PriceRefreshReport {
    pub stored: Vec<String>,
    pub rejected: Vec<String>,
    pub missing: Vec<String>,
    pub calls_used: u64,
}

impl PriceRefreshReport {
    #[must_use]
    pub fn outcome_of(&self, ticker: &str) -> Option<TickerOutcome> {
        if self.stored.iter().any(|t| t == ticker) {
            Some(TickerOutcome::Stored)
        } else if self.rejected.iter().any(|t| t == ticker) {
            Some(TickerOutcome::Rejected)
        } else if self.missing.iter().any(|t| t == ticker) {
            Some(TickerOutcome::Missing)
        } else {
            None
        }
    }
}

/// One history-backfill call's outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FillOutcome {
    pub bars_added: usize,
}

#[derive(Clone)]
pub struct BatchPriceProcessor {
    router: Arc<ProviderRouter>,
    store: Arc<dyn Store>,
    batch_size: usize,
    inter_batch_delay: Duration,
    daily_api_budget: u64,
}

impl BatchPriceProcessor {
    #[must_use]
    pub fn new(
        router: Arc<ProviderRouter>,
        store: Arc<dyn Store>,
        batch_size: usize,
        inter_batch_delay: Duration,
        daily_api_budget: u64,
    ) -> Self {
        Self {
            router,
            store,
            batch_size,
            inter_batch_delay,
            daily_api_budget,
        }
    }

    /// Appends one call to the `ApiUsage` ledger before it is issued, so the
    /// charge is on file even if the call itself then fails or times out.
    async fn record_usage(&self, today: NaiveDate, endpoint: &str) -> Result<(), PipelineError> {
        let reset_time = (today + chrono::Duration::days(1)).and_hms_opt(0, 0, 0).expect("valid time");
        self.store
            .record_api_usage(&ApiUsage {
                provider: "router".to_string(),
                date: today,
                endpoint: endpoint.to_string(),
                calls_made: 1,
                calls_limit: self.daily_api_budget as i64,
                reset_time,
            })
            .await
    }

    /// Bring `tickers` up to date for `today`. One provider call per
    /// `batch_size` tickers, charged against `budget` before it is issued.
    /// Stops issuing further batches once the budget is exhausted, leaving
    /// the remaining tickers absent from every outcome list (the caller
    /// re-queues them on a later run since their `price_today` need
    /// persists).
    pub async fn refresh_prices(
        &self,
        tickers: &[String],
        today: NaiveDate,
        budget: &Budget,
    ) -> Result<PriceRefreshReport, PipelineError> {
        let mut report = PriceRefreshReport::default();
        let chunks: Vec<&[String]> = tickers.chunks(self.batch_size.max(1)).collect();
        let last = chunks.len().saturating_sub(1);

        for (idx, chunk) in chunks.into_iter().enumerate() {
            if !budget.try_consume(1) {
                warn!(remaining_tickers = chunk.len(), "price batch budget exhausted, deferring rest");
                break;
            }
            report.calls_used += 1;
            self.record_usage(today, "quote_batch").await?;

            let resp = self
                .router
                .quote_batch(QuoteBatchRequest {
                    symbols: chunk.to_vec(),
                })
                .await?;

            for symbol in chunk {
                match resp.bars.get(symbol) {
                    Some(bar) if bar.date == today && bar.is_valid() => {
                        self.store.upsert_daily_bar(bar).await?;
                        report.stored.push(symbol.clone());
                    }
                    Some(_) => {
                        info!(ticker = %symbol, "rejected bar: stale date or invariant violation");
                        report.rejected.push(symbol.clone());
                    }
                    None => {
                        report.missing.push(symbol.clone());
                    }
                }
            }

            if idx != last {
                tokio::time::sleep(self.inter_batch_delay).await;
            }
        }

        Ok(report)
    }

    /// Fetch and store enough history for `ticker` to reach `min_days` bars,
    /// charging exactly one call against `budget`. A ticker already at or
    /// above `min_days` is a no-op that does not touch the budget.
    pub async fn fill_to_minimum(
        &self,
        ticker: &str,
        min_days: u32,
        today: NaiveDate,
        budget: &Budget,
    ) -> Result<FillOutcome, PipelineError> {
        let existing = self.store.read_price_series(ticker, min_days).await?;
        if existing.len() as u32 >= min_days {
            return Ok(FillOutcome::default());
        }
        if !budget.try_consume(1) {
            return Err(PipelineError::RateExceeded {
                provider: "budget".to_string(),
                retry_after_ms: 0,
            });
        }

        let gap = min_days.saturating_sub(existing.len() as u32);
        let from = today - chrono::Duration::days(i64::from(gap) * 2 + i64::from(min_days));
        self.record_usage(today, "historical_range").await?;
        let resp = self
            .router
            .historical_range(HistoricalRangeRequest {
                symbol: ticker.to_string(),
                from,
                to: today,
            })
            .await?;

        let mut added = 0usize;
        for bar in valid_bars(resp.bars, ticker) {
            self.store.upsert_daily_bar(&bar).await?;
            added += 1;
        }
        Ok(FillOutcome { bars_added: added })
    }
}

fn valid_bars(bars: Vec<DailyBar>, ticker: &str) -> Vec<DailyBar> {
    bars.into_iter()
        .filter(|b| {
            let ok = b.is_valid();
            if !ok {
                warn!(ticker, date = %b.date, "dropping invalid historical bar");
            }
            ok
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use ticker_store::InMemoryStore;
    use ticker_types::BackoffConfig;

    fn processor() -> BatchPriceProcessor {
        let primary: Arc<dyn ticker_core::DataProvider> = Arc::new(ticker_mock::MockProvider::new("primary"));
        let router = Arc::new(ProviderRouter::new(vec![primary], BackoffConfig::default()));
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        BatchPriceProcessor::new(router, store, 100, Duration::from_millis(0), 1_000)
    }

    #[tokio::test]
    async fn refresh_prices_stores_bars_reported_for_today() {
        let bpp = processor();
        let today = ticker_mock::fixtures::anchor_date();
        let budget = Budget::new(10);
        let report = bpp
            .refresh_prices(&["AAA".to_string(), "BBB".to_string()], today, &budget)
            .await
            .expect("refresh succeeds");
        assert_eq!(report.stored.len(), 2);
        assert_eq!(report.calls_used, 1);
    }

    #[tokio::test]
    async fn refresh_prices_marks_delisted_ticker_missing() {
        let bpp = processor();
        let today = ticker_mock::fixtures::anchor_date();
        let budget = Budget::new(10);
        let report = bpp
            .refresh_prices(&["AAA".to_string(), "XYZ".to_string()], today, &budget)
            .await
            .expect("refresh succeeds");
        assert!(report.missing.contains(&"XYZ".to_string()));
        assert!(report.stored.contains(&"AAA".to_string()));
    }

    #[tokio::test]
    async fn refresh_prices_records_api_usage_before_each_batch() {
        let primary: Arc<dyn ticker_core::DataProvider> = Arc::new(ticker_mock::MockProvider::new("primary"));
        let router = Arc::new(ProviderRouter::new(vec![primary], BackoffConfig::default()));
        let store = Arc::new(InMemoryStore::new());
        let bpp = BatchPriceProcessor::new(router, Arc::clone(&store) as Arc<dyn Store>, 100, Duration::from_millis(0), 1_000);
        let today = ticker_mock::fixtures::anchor_date();
        let budget = Budget::new(10);
        bpp.refresh_prices(&["AAA".to_string()], today, &budget).await.expect("refresh succeeds");
        assert_eq!(store.api_calls_used("router", today).await.expect("query"), 1);
    }

    #[tokio::test]
    async fn refresh_prices_stops_issuing_batches_once_budget_is_exhausted() {
        let bpp = processor();
        let today = ticker_mock::fixtures::anchor_date();
        let budget = Budget::new(1);
        let tickers: Vec<String> = (0..250).map(|i| format!("T{i}")).collect();
        let report = bpp.refresh_prices(&tickers, today, &budget).await.expect("refresh succeeds");
        assert_eq!(report.calls_used, 1);
        assert!(report.stored.len() + report.rejected.len() + report.missing.len() <= 100);
    }

    #[tokio::test]
    async fn fill_to_minimum_is_noop_when_history_already_sufficient() {
        let store = InMemoryStore::new();
        for bar in ticker_mock::fixtures::generate_bars("AAA", 100, rust_decimal_macros::dec!(50)) {
            store.upsert_daily_bar(&bar).await.expect("seed bar");
        }
        let bpp = BatchPriceProcessor::new(
            Arc::new(ProviderRouter::new(
                vec![Arc::new(ticker_mock::MockProvider::new("primary"))],
                BackoffConfig::default(),
            )),
            Arc::new(store),
            100,
            Duration::from_millis(0),
            1_000,
        );
        let budget = Budget::new(5);
        let today = ticker_mock::fixtures::anchor_date();
        let outcome = bpp.fill_to_minimum("AAA", 100, today, &budget).await.expect("fill succeeds");
        assert_eq!(outcome.bars_added, 0);
        assert_eq!(budget.remaining(), 5);
    }
}
