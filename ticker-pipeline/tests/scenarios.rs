//! End-to-end daily-run scenarios against `InMemoryStore` and deterministic
//! fixture data, exercising the full `Orchestrator` rather than one phase in
//! isolation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal_macros::dec;
use ticker_core::connector::{HistoricalRangeProvider, QuoteBatchProvider};
use ticker_core::{DataProvider, PipelineError};
use ticker_middleware::ProviderBuilder;
use ticker_mock::{fixtures, MockProvider};
use ticker_pipeline::{Orchestrator, RunReport};
use ticker_router::ProviderRouter;
use ticker_store::{InMemoryStore, Store};
use ticker_types::{
    BackoffConfig, DailyBar, HistoricalRangeRequest, HistoricalRangeResponse,
    IndicatorVector, PipelineConfig, QuoteBatchRequest, QuoteBatchResponse, RunStatus, Ticker,
};

fn today() -> NaiveDate {
    fixtures::anchor_date()
}

fn ticker_row(symbol: &str, fundamentals_last_update: Option<chrono::NaiveDateTime>) -> Ticker {
    Ticker {
        symbol: symbol.to_string(),
        active: true,
        sector: None,
        industry: None,
        market_cap_category: None,
        next_earnings_date: None,
        fundamentals_last_update,
        data_priority: 0,
    }
}

fn recent_update() -> chrono::NaiveDateTime {
    (today() - chrono::Duration::days(1)).and_hms_opt(21, 0, 0).expect("valid time")
}

fn stale_update(days_ago: i64) -> chrono::NaiveDateTime {
    (today() - chrono::Duration::days(days_ago)).and_hms_opt(21, 0, 0).expect("valid time")
}

async fn seed_bars_all_but_today(store: &InMemoryStore, symbol: &str) {
    let bars = fixtures::bars_for(symbol).expect("fixture series");
    for bar in &bars[..bars.len() - 1] {
        store.upsert_daily_bar(bar).await.expect("seed bar");
    }
}

async fn seed_bars_full(store: &InMemoryStore, symbol: &str) {
    for bar in fixtures::bars_for(symbol).expect("fixture series") {
        store.upsert_daily_bar(&bar).await.expect("seed bar");
    }
}

fn find_phase<'a>(report: &'a RunReport, update_type: &str) -> &'a ticker_pipeline::PhaseReport {
    report
        .phases
        .iter()
        .find(|p| p.update_type == update_type)
        .unwrap_or_else(|| panic!("no {update_type} phase in report"))
}

fn single_provider_router() -> Arc<ProviderRouter> {
    let primary: Arc<dyn DataProvider> = Arc::new(MockProvider::new("primary"));
    Arc::new(ProviderRouter::new(vec![primary], BackoffConfig::default()))
}

#[tokio::test]
async fn scenario_1_happy_daily_run_prices_indicators_and_skips_the_rest() {
    let store = Arc::new(InMemoryStore::new());
    for symbol in ["AAA", "BBB", "CCC"] {
        store.upsert_ticker(&ticker_row(symbol, Some(recent_update()))).await.expect("register");
        seed_bars_all_but_today(&store, symbol).await;
    }

    let orchestrator = Orchestrator::builder()
        .store(Arc::clone(&store) as Arc<dyn Store>)
        .router(single_provider_router())
        .build()
        .expect("orchestrator builds");

    let report = orchestrator.run_once(today()).await.expect("run succeeds");

    assert_eq!(report.status, RunStatus::Success);
    let price = find_phase(&report, "price_refresh");
    assert_eq!(price.status, RunStatus::Success);
    assert_eq!(price.calls_used, 1);
    assert_eq!(price.records_processed, 3);

    let indicators = find_phase(&report, "indicator_update");
    assert_eq!(indicators.status, RunStatus::Success);
    assert_eq!(indicators.records_processed, 3);

    assert_eq!(find_phase(&report, "fundamentals_refresh").status, RunStatus::Skipped);
    assert_eq!(find_phase(&report, "history_backfill").status, RunStatus::Skipped);
    assert_eq!(find_phase(&report, "delisting_sweep").status, RunStatus::Skipped);

    // Phase 1's single batch call is charged against the persisted ledger,
    // not just the in-memory run budget.
    assert_eq!(store.api_calls_used("router", today()).await.expect("query"), 1);
}

/// Serves a synthetic, valid bar dated `today()` for any requested symbol —
/// `ticker-mock`'s fixtures only cover 6 named symbols, too few for a
/// 250-ticker fan-out.
struct AnyQuoteProvider {
    name: &'static str,
}

#[async_trait]
impl DataProvider for AnyQuoteProvider {
    fn name(&self) -> &'static str {
        self.name
    }
    fn as_quote_batch_provider(&self) -> Option<&dyn QuoteBatchProvider> {
        Some(self)
    }
}

#[async_trait]
impl QuoteBatchProvider for AnyQuoteProvider {
    async fn quote_batch(&self, req: QuoteBatchRequest) -> Result<QuoteBatchResponse, PipelineError> {
        let mut bars = HashMap::new();
        for symbol in &req.symbols {
            bars.insert(
                symbol.clone(),
                DailyBar {
                    ticker: symbol.clone(),
                    date: today(),
                    open: dec!(10.00),
                    high: dec!(10.50),
                    low: dec!(9.50),
                    close: dec!(10.20),
                    volume: 500_000,
                    indicators: IndicatorVector::default(),
                },
            );
        }
        Ok(QuoteBatchResponse { bars })
    }
}

#[tokio::test]
async fn scenario_2_rate_limited_primary_falls_back_to_secondary_mid_run() {
    let store = Arc::new(InMemoryStore::new());
    let tickers: Vec<String> = (0..250).map(|i| format!("T{i:04}")).collect();
    for symbol in &tickers {
        store.upsert_ticker(&ticker_row(symbol, Some(recent_update()))).await.expect("register");
    }

    let p1_raw: Arc<dyn DataProvider> = Arc::new(AnyQuoteProvider { name: "p1" });
    let p1 = ProviderBuilder::new(p1_raw).with_rate_limit(1_000, 1).build().expect("p1 builds");
    let p2_raw: Arc<dyn DataProvider> = Arc::new(AnyQuoteProvider { name: "p2" });
    let p2 = ProviderBuilder::new(p2_raw).with_rate_limit(1_000, 1_000).build().expect("p2 builds");
    let router = Arc::new(ProviderRouter::new(vec![p1, p2], BackoffConfig::default()));

    let orchestrator = Orchestrator::builder()
        .store(Arc::clone(&store) as Arc<dyn Store>)
        .router(router)
        .build()
        .expect("orchestrator builds");

    let report = orchestrator.run_once(today()).await.expect("run succeeds");

    let price = find_phase(&report, "price_refresh");
    assert_eq!(price.calls_used, 3, "100 + 100 + 50 ticker batches");
    assert_eq!(price.records_processed, 250);
    for symbol in &tickers {
        let series = store.read_price_series(symbol, 1).await.expect("read");
        assert_eq!(series.len(), 1, "{symbol} should have been stored via fallback");
    }
}

#[tokio::test]
async fn scenario_3_delisted_ticker_is_detected_and_marked_inactive() {
    let store = Arc::new(InMemoryStore::new());
    store.upsert_ticker(&ticker_row("AAA", Some(recent_update()))).await.expect("register");
    store.upsert_ticker(&ticker_row("XYZ", Some(recent_update()))).await.expect("register");
    seed_bars_all_but_today(&store, "AAA").await;
    seed_bars_all_but_today(&store, "XYZ").await;
    let xyz_bars_before = store.read_price_series("XYZ", 300).await.expect("read").len();

    let orchestrator = Orchestrator::builder()
        .store(Arc::clone(&store) as Arc<dyn Store>)
        .router(single_provider_router())
        .build()
        .expect("orchestrator builds");

    let report = orchestrator.run_once(today()).await.expect("run succeeds");

    assert_eq!(report.delisted, vec!["XYZ".to_string()]);
    let xyz = store.get_ticker("XYZ").await.expect("query").expect("row exists");
    assert!(!xyz.active);
    let xyz_bars_after = store.read_price_series("XYZ", 300).await.expect("read").len();
    assert_eq!(xyz_bars_after, xyz_bars_before, "existing bars are left untouched");

    let aaa = store.get_ticker("AAA").await.expect("query").expect("row exists");
    assert!(aaa.active);
}

#[tokio::test]
async fn scenario_4_new_ticker_with_insufficient_history_triggers_backfill() {
    let store = Arc::new(InMemoryStore::new());
    store.upsert_ticker(&ticker_row("NEW", Some(recent_update()))).await.expect("register");
    seed_bars_all_but_today(&store, "NEW").await;

    let orchestrator = Orchestrator::builder()
        .store(Arc::clone(&store) as Arc<dyn Store>)
        .router(single_provider_router())
        .build()
        .expect("orchestrator builds");

    let report = orchestrator.run_once(today()).await.expect("run succeeds");

    let indicators = find_phase(&report, "indicator_update");
    assert_eq!(indicators.records_processed, 0, "below the 50-bar minimum, no indicator vector is written");

    let backfill = find_phase(&report, "history_backfill");
    assert_eq!(backfill.calls_used, 1);
    assert_eq!(backfill.records_processed, 1);

    let series = store.read_price_series("NEW", 200).await.expect("read");
    assert_eq!(series.len(), 12, "fixture series length, still below the minimum window");
}

#[tokio::test]
async fn scenario_5_earnings_day_refresh_updates_fundamentals_and_calendar_flag() {
    let store = Arc::new(InMemoryStore::new());
    store.upsert_ticker(&ticker_row("EARN", Some(stale_update(180)))).await.expect("register");
    seed_bars_full(&store, "EARN").await;
    let calendar_row = fixtures::earnings_calendar_for("EARN").expect("fixture row");
    assert!(!calendar_row.data_updated);
    store.upsert_earnings_calendar(&calendar_row).await.expect("seed earnings row");

    let orchestrator = Orchestrator::builder()
        .store(Arc::clone(&store) as Arc<dyn Store>)
        .router(single_provider_router())
        .build()
        .expect("orchestrator builds");

    let report = orchestrator.run_once(today()).await.expect("run succeeds");

    let fundamentals = find_phase(&report, "fundamentals_refresh");
    assert_eq!(fundamentals.status, RunStatus::Success);
    assert_eq!(fundamentals.calls_used, 1);
    assert_eq!(fundamentals.records_processed, 1);

    let scores = find_phase(&report, "ratios_and_scores");
    assert_eq!(scores.status, RunStatus::Success);
    assert_eq!(scores.records_processed, 1);

    let earn = store.get_ticker("EARN").await.expect("query").expect("row exists");
    assert_eq!(earn.fundamentals_last_update, Some(today().and_hms_opt(21, 0, 0).expect("valid time")));

    let rows = store
        .earnings_calendar_between(today() - chrono::Duration::days(1), today() + chrono::Duration::days(1))
        .await
        .expect("read earnings rows");
    let row = rows.iter().find(|r| r.ticker == "EARN").expect("row present");
    assert!(row.data_updated, "Phase 3 should flip data_updated once the ticker is refreshed");
}

/// Serves a fixed per-call delay before returning an empty historical range,
/// simulating a slow provider so a small `run_deadline_seconds` can expire
/// mid-Phase-5 under a paused tokio clock.
struct SlowHistoricalProvider {
    delay: Duration,
}

#[async_trait]
impl DataProvider for SlowHistoricalProvider {
    fn name(&self) -> &'static str {
        "slow-historical"
    }
    fn as_historical_range_provider(&self) -> Option<&dyn HistoricalRangeProvider> {
        Some(self)
    }
}

#[async_trait]
impl HistoricalRangeProvider for SlowHistoricalProvider {
    async fn historical_range(&self, _req: HistoricalRangeRequest) -> Result<HistoricalRangeResponse, PipelineError> {
        tokio::time::sleep(self.delay).await;
        Ok(HistoricalRangeResponse { bars: Vec::new() })
    }
}

#[tokio::test(start_paused = true)]
async fn scenario_6_global_deadline_defers_the_tail_of_a_backfill_queue() {
    let store = Arc::new(InMemoryStore::new());
    let tickers: Vec<String> = (0..400).map(|i| format!("B{i:04}")).collect();
    for symbol in &tickers {
        store.upsert_ticker(&ticker_row(symbol, Some(recent_update()))).await.expect("register");
        // 30 bars each: below the 100-bar minimum (queues for Phase 5) but
        // enough to carry today's bar so Phase 1 has nothing to do.
        for bar in fixtures::generate_bars(symbol, 30, dec!(20.00)) {
            store.upsert_daily_bar(&bar).await.expect("seed bar");
        }
    }

    let slow: Arc<dyn DataProvider> = Arc::new(SlowHistoricalProvider { delay: Duration::from_millis(50) });
    let router = Arc::new(ProviderRouter::new(vec![slow], BackoffConfig::default()));

    let config = PipelineConfig {
        run_deadline_seconds: 2,
        ..PipelineConfig::default()
    };

    let orchestrator = Orchestrator::builder()
        .store(Arc::clone(&store) as Arc<dyn Store>)
        .router(router)
        .config(config)
        .build()
        .expect("orchestrator builds");

    let report = orchestrator.run_once(today()).await.expect("run succeeds");

    assert_eq!(report.status, RunStatus::Partial);
    let backfill = find_phase(&report, "history_backfill");
    assert_eq!(backfill.status, RunStatus::Partial);
    assert!(backfill.records_processed > 0, "some tickers complete before the deadline");
    assert!(
        (backfill.records_processed as usize) < tickers.len(),
        "the tail of the queue is deferred, not silently dropped or all completed"
    );
}
