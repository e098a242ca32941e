//! The six phases of a trading-day run (spec.md §4.7). Each function takes
//! the shared dependency bundle plus whatever the previous phase produced,
//! and returns a `PhaseReport` the Orchestrator logs via `UpdateLog`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use ticker_core::PipelineError;
use ticker_fundamentals::{calculate_ratios, calculate_scores, compute_ttm, default_table, needs_refresh, RatioInputs};
use ticker_indicators::compute as compute_indicators;
use ticker_router::ProviderRouter;
use ticker_store::Store;
use ticker_types::{
    EarningsCalendarRow, Fundamentals, FundamentalsRequest, PipelineConfig, QuoteBatchRequest,
    RunStatus, TickerNeedTag,
};
use tokio::time::Instant;
use tracing::{info, warn};

use crate::batch::BatchPriceProcessor;
use crate::budget::Budget;
use crate::worker::run_bounded;

/// Dependencies shared by every phase of one run.
pub struct PhaseContext {
    pub store: Arc<dyn Store>,
    pub router: Arc<ProviderRouter>,
    pub config: PipelineConfig,
    pub bpp: BatchPriceProcessor,
}

impl PhaseContext {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, router: Arc<ProviderRouter>, config: PipelineConfig) -> Self {
        let bpp = BatchPriceProcessor::new(
            Arc::clone(&router),
            Arc::clone(&store),
            config.price_batch_size,
            Duration::from_millis(config.inter_batch_delay_ms),
            config.daily_api_budget,
        );
        Self {
            store,
            router,
            config,
            bpp,
        }
    }
}

/// One phase's outcome, ready to become an `UpdateLog` row.
#[derive(Debug, Clone)]
pub struct PhaseReport {
    pub update_type: &'static str,
    pub status: RunStatus,
    pub records_processed: i64,
    pub calls_used: u64,
    pub started_at: NaiveDateTime,
    pub completed_at: NaiveDateTime,
    pub error_message: Option<String>,
}

fn now_naive(today: NaiveDate) -> NaiveDateTime {
    today.and_hms_opt(21, 0, 0).expect("valid time")
}

/// Appends one call to the `ApiUsage` ledger before it is issued, so a
/// failed or timed-out provider call still shows up in the charge history.
async fn record_api_usage(ctx: &PhaseContext, today: NaiveDate, endpoint: &str) -> Result<(), PipelineError> {
    let reset_time = (today + chrono::Duration::days(1)).and_hms_opt(0, 0, 0).expect("valid time");
    ctx.store
        .record_api_usage(&ticker_types::ApiUsage {
            provider: "router".to_string(),
            date: today,
            endpoint: endpoint.to_string(),
            calls_made: 1,
            calls_limit: ctx.config.daily_api_budget as i64,
            reset_time,
        })
        .await
}

pub struct Phase1Output {
    pub priced: Vec<String>,
    pub missing_or_unknown: Vec<String>,
}

/// Phase 1 — price refresh over every ticker needing today's bar.
pub async fn phase1_price_refresh(
    ctx: &PhaseContext,
    today: NaiveDate,
    budget: &Budget,
) -> Result<(PhaseReport, Phase1Output), PipelineError> {
    let started = now_naive(today);
    let needing = ctx.store.tickers_needing(TickerNeedTag::PriceToday, today).await?;
    if needing.is_empty() {
        let report = PhaseReport {
            update_type: "price_refresh",
            status: RunStatus::Skipped,
            records_processed: 0,
            calls_used: 0,
            started_at: started,
            completed_at: started,
            error_message: None,
        };
        return Ok((
            report,
            Phase1Output {
                priced: Vec::new(),
                missing_or_unknown: Vec::new(),
            },
        ));
    }

    let result = ctx.bpp.refresh_prices(&needing, today, budget).await;
    let completed = now_naive(today);
    match result {
        Ok(r) => {
            let status = if r.stored.len() + r.rejected.len() + r.missing.len() < needing.len() {
                RunStatus::Partial
            } else {
                RunStatus::Success
            };
            let output = Phase1Output {
                priced: r.stored.clone(),
                missing_or_unknown: r.missing.clone(),
            };
            let report = PhaseReport {
                update_type: "price_refresh",
                status,
                records_processed: r.stored.len() as i64,
                calls_used: r.calls_used,
                started_at: started,
                completed_at: completed,
                error_message: None,
            };
            Ok((report, output))
        }
        Err(err) => {
            warn!(error = %err, completed_at = %completed, "phase 1 aborted");
            Err(err)
        }
    }
}

pub struct Phase2Output {
    pub insufficient_history: Vec<String>,
}

/// Phase 2 — indicator computation for every ticker Phase 1 just priced.
/// Pure CPU work aside from the `Store` round-trips; no API calls.
pub async fn phase2_indicators(
    ctx: &PhaseContext,
    today: NaiveDate,
    priced: &[String],
    deadline: Instant,
) -> Result<(PhaseReport, Phase2Output), PipelineError> {
    let started = now_naive(today);
    let store = Arc::clone(&ctx.store);

    let outcome = run_bounded(
        priced.to_vec(),
        ctx.config.worker_count,
        ctx.config.defer_threshold(),
        deadline,
        move |ticker| {
            let store = Arc::clone(&store);
            async move { indicator_unit(&store, &ticker).await }
        },
    )
    .await;

    let mut written = 0i64;
    let mut insufficient = Vec::new();
    for unit in outcome.completed {
        match unit? {
            IndicatorUnit::Written => written += 1,
            IndicatorUnit::InsufficientHistory(ticker) => insufficient.push(ticker),
        }
    }

    let completed = now_naive(today);
    let status = if outcome.hit_deadline || !outcome.deferred.is_empty() {
        RunStatus::Partial
    } else {
        RunStatus::Success
    };
    let report = PhaseReport {
        update_type: "indicator_update",
        status,
        records_processed: written,
        calls_used: 0,
        started_at: started,
        completed_at: completed,
        error_message: None,
    };
    Ok((report, Phase2Output { insufficient_history: insufficient }))
}

enum IndicatorUnit {
    Written,
    InsufficientHistory(String),
}

async fn indicator_unit(store: &Arc<dyn Store>, ticker: &str) -> Result<IndicatorUnit, PipelineError> {
    let bars = store.read_price_series(ticker, 250).await?;
    if bars.len() < 50 {
        return Ok(IndicatorUnit::InsufficientHistory(ticker.to_string()));
    }
    let Some(latest) = bars.last() else {
        return Ok(IndicatorUnit::InsufficientHistory(ticker.to_string()));
    };
    let vector = compute_indicators(&bars)?;
    store.update_indicators(ticker, latest.date, &vector).await?;
    Ok(IndicatorUnit::Written)
}

pub struct Phase3Output {
    pub touched: Vec<String>,
}

/// Priority tier for a fundamentals refresh candidate (spec.md §4.7). The
/// more-specific staleness threshold (90 days) is checked before the less
/// specific one (30 days) so both tiers are reachable.
fn fundamentals_priority(
    today: NaiveDate,
    last_update: Option<NaiveDateTime>,
    earnings_row: Option<&EarningsCalendarRow>,
) -> u8 {
    if let Some(row) = earnings_row {
        if (row.earnings_date - today).num_days().abs() <= 7 {
            return 5;
        }
    }
    let Some(last) = last_update else {
        return 4;
    };
    let days_stale = (today - last.date()).num_days();
    if days_stale > 90 {
        2
    } else if days_stale > 30 {
        3
    } else {
        1
    }
}

/// Phase 3 — earnings-driven fundamentals refresh, priority-ordered,
/// stopping once the remaining budget drops below the reserve floor.
pub async fn phase3_fundamentals(
    ctx: &PhaseContext,
    today: NaiveDate,
    budget: &Budget,
) -> Result<(PhaseReport, Phase3Output), PipelineError> {
    let started = now_naive(today);
    let candidates = ctx.store.tickers_needing(TickerNeedTag::FundamentalsStale, today).await?;
    let earnings_window_from = today - chrono::Duration::days(7);
    let earnings_window_to = today + chrono::Duration::days(7);
    let earnings_rows = ctx
        .store
        .earnings_calendar_between(earnings_window_from, earnings_window_to)
        .await?;

    let mut ranked: Vec<(u8, String, Option<EarningsCalendarRow>)> = Vec::with_capacity(candidates.len());
    for ticker in candidates {
        let info = ctx.store.get_ticker(&ticker).await?;
        let last_update = info.and_then(|t| t.fundamentals_last_update);
        let earnings_row = earnings_rows.iter().find(|r| r.ticker == ticker);
        let priority = fundamentals_priority(today, last_update, earnings_row);
        ranked.push((priority, ticker, earnings_row.cloned()));
    }
    ranked.sort_by(|a, b| b.0.cmp(&a.0));

    let reserve_floor = ctx.config.reserve_floor();
    let mut touched = Vec::new();
    let mut calls_used = 0u64;

    for (_, ticker, earnings_row) in ranked {
        if budget.below(reserve_floor) {
            break;
        }
        if !budget.try_consume(1) {
            break;
        }
        calls_used += 1;
        record_api_usage(ctx, today, "fundamentals").await?;
        match refresh_one_ticker_fundamentals(ctx, &ticker, today).await {
            Ok(()) => {
                if let Some(mut row) = earnings_row {
                    row.data_updated = true;
                    ctx.store.upsert_earnings_calendar(&row).await?;
                }
                touched.push(ticker);
            }
            Err(err) => {
                warn!(ticker = %ticker, error = %err, "fundamentals refresh failed, skipping ticker");
            }
        }
    }

    let completed = now_naive(today);
    let status = if touched.is_empty() && calls_used == 0 {
        RunStatus::Skipped
    } else {
        RunStatus::Success
    };
    let report = PhaseReport {
        update_type: "fundamentals_refresh",
        status,
        records_processed: touched.len() as i64,
        calls_used,
        started_at: started,
        completed_at: completed,
        error_message: None,
    };
    Ok((report, Phase3Output { touched }))
}

async fn refresh_one_ticker_fundamentals(
    ctx: &PhaseContext,
    ticker: &str,
    today: NaiveDate,
) -> Result<(), PipelineError> {
    let resp = ctx
        .router
        .fundamentals(FundamentalsRequest {
            symbol: ticker.to_string(),
        })
        .await?;
    for statement in &resp.statements {
        ctx.store.upsert_fundamentals(statement).await?;
    }
    if let Some(mut ticker_row) = ctx.store.get_ticker(ticker).await? {
        ticker_row.fundamentals_last_update = Some(now_naive(today));
        ctx.store.upsert_ticker(&ticker_row).await?;
    }
    Ok(())
}

/// Phase 4 — ratios and scores for every ticker Phase 3 touched. Pure
/// computation; no API calls.
pub async fn phase4_ratios_and_scores(
    ctx: &PhaseContext,
    today: NaiveDate,
    touched: &[String],
) -> Result<PhaseReport, PipelineError> {
    let started = now_naive(today);
    let mut written = 0i64;

    for ticker in touched {
        match ratios_and_scores_unit(ctx, ticker, today).await {
            Ok(true) => written += 1,
            Ok(false) => {}
            Err(err) => warn!(ticker = %ticker, error = %err, "ratio/score computation failed"),
        }
    }

    let completed = now_naive(today);
    let status = if touched.is_empty() { RunStatus::Skipped } else { RunStatus::Success };
    Ok(PhaseReport {
        update_type: "ratios_and_scores",
        status,
        records_processed: written,
        calls_used: 0,
        started_at: started,
        completed_at: completed,
        error_message: None,
    })
}

async fn ratios_and_scores_unit(ctx: &PhaseContext, ticker: &str, today: NaiveDate) -> Result<bool, PipelineError> {
    let bars = ctx.store.read_price_series(ticker, 1).await?;
    let Some(latest_bar) = bars.last() else {
        return Ok(false);
    };
    let statements = fundamentals_history(ctx, ticker).await?;
    let Some(latest) = statements.iter().max_by_key(|s| s.report_date) else {
        return Ok(false);
    };
    let ttm = compute_ttm(&statements);
    let prior_year = statements.iter().find(|s| {
        s.fiscal_quarter == latest.fiscal_quarter && s.fiscal_year == latest.fiscal_year - 1
    });

    let inputs = RatioInputs {
        ticker,
        calculation_date: today,
        latest,
        ttm: &ttm,
        prior_year,
        close_price: latest_bar.close,
    };
    let ratios = calculate_ratios(&inputs);
    ctx.store.upsert_ratios(&ratios).await?;

    let table = default_table();
    let scores = calculate_scores(ticker, today, &ratios, &table);
    ctx.store.upsert_scores(&scores).await?;

    Ok(true)
}

/// Reads back whatever Phase 3 (or an earlier run) already upserted for
/// `ticker`, rather than issuing a second provider call. Phase 4 is pure
/// computation over what is already on file.
async fn fundamentals_history(ctx: &PhaseContext, ticker: &str) -> Result<Vec<Fundamentals>, PipelineError> {
    ctx.store.fundamentals_for_ticker(ticker).await
}

/// Phase 5 — history backfill for tickers below the minimum window, using
/// whatever budget remains after Phases 1-3 (the reserve floor exists
/// precisely to guarantee this phase has calls available). Runs through the
/// same bounded worker pool as Phase 2 so the global deadline is honored
/// mid-phase: tickers not yet started once `deadline` passes are deferred
/// and re-queued by the next day's `tickers_needing` scan.
pub async fn phase5_backfill(
    ctx: &PhaseContext,
    today: NaiveDate,
    budget: Arc<Budget>,
    deadline: Instant,
    extra_insufficient: &[String],
) -> Result<PhaseReport, PipelineError> {
    let started = now_naive(today);
    let min_days = ctx.config.minimum_history_days;

    let mut below_min = ctx
        .store
        .tickers_needing(TickerNeedTag::HistoryBelow(min_days), today)
        .await?;
    for ticker in extra_insufficient {
        if !below_min.contains(ticker) {
            below_min.push(ticker.clone());
        }
    }

    let mut counts = Vec::with_capacity(below_min.len());
    for ticker in &below_min {
        let bars = ctx.store.read_price_series(ticker, min_days).await?;
        counts.push((bars.len(), ticker.clone()));
    }
    counts.sort_by_key(|(count, _)| *count);
    let queue: Vec<String> = counts.into_iter().map(|(_, t)| t).collect();
    let queued = queue.len();

    let bpp = ctx.bpp.clone();
    let worker_count = ctx.config.worker_count;
    let defer_threshold = ctx.config.defer_threshold();

    let outcome = run_bounded(queue, worker_count, defer_threshold, deadline, move |ticker: String| {
        let bpp = bpp.clone();
        let budget = Arc::clone(&budget);
        async move {
            if budget.remaining() <= 0 {
                return (
                    ticker.clone(),
                    Err(PipelineError::RateExceeded {
                        provider: "budget".to_string(),
                        retry_after_ms: 0,
                    }),
                );
            }
            let res = bpp.fill_to_minimum(&ticker, min_days, today, &budget).await;
            (ticker, res)
        }
    })
    .await;

    let mut filled = 0i64;
    let mut calls_used = 0u64;
    for (ticker, res) in outcome.completed {
        match res {
            Ok(o) if o.bars_added > 0 => {
                filled += 1;
                calls_used += 1;
            }
            Ok(_) => {}
            Err(err) => warn!(ticker = %ticker, error = %err, "backfill failed"),
        }
    }

    let completed = now_naive(today);
    let status = if outcome.hit_deadline || !outcome.deferred.is_empty() {
        RunStatus::Partial
    } else if filled == 0 && queued == 0 {
        RunStatus::Skipped
    } else {
        RunStatus::Success
    };
    Ok(PhaseReport {
        update_type: "history_backfill",
        status,
        records_processed: filled,
        calls_used,
        started_at: started,
        completed_at: completed,
        error_message: None,
    })
}

pub struct Phase6Output {
    pub delisted: Vec<String>,
}

/// Phase 6 — delisting sweep: re-probe every ticker Phase 1 reported as
/// missing or unknown via a single-symbol call; mark still-unknown tickers
/// inactive. Existing rows for the ticker are left untouched.
pub async fn phase6_delisting_sweep(
    ctx: &PhaseContext,
    today: NaiveDate,
    suspects: &[String],
    budget: &Budget,
) -> Result<(PhaseReport, Phase6Output), PipelineError> {
    let started = now_naive(today);
    let mut delisted = Vec::new();
    let mut probed = 0u64;

    for ticker in suspects {
        if !budget.try_consume(1) {
            warn!(ticker = %ticker, "delisting probe skipped: budget exhausted");
            break;
        }
        probed += 1;
        record_api_usage(ctx, today, "quote_batch").await?;
        let probe = ctx
            .router
            .quote_batch(QuoteBatchRequest {
                symbols: vec![ticker.clone()],
            })
            .await;
        match probe {
            Err(PipelineError::TickerUnknown { .. }) => {
                ctx.store.mark_delisted(ticker).await?;
                delisted.push(ticker.clone());
                info!(ticker = %ticker, "marked delisted");
            }
            Err(err) => {
                warn!(ticker = %ticker, error = %err, "delisting probe failed, leaving ticker active");
            }
            Ok(resp) if !resp.bars.contains_key(ticker) => {
                ctx.store.mark_delisted(ticker).await?;
                delisted.push(ticker.clone());
            }
            Ok(_) => {}
        }
    }

    let completed = now_naive(today);
    let status = if suspects.is_empty() { RunStatus::Skipped } else { RunStatus::Success };
    let report = PhaseReport {
        update_type: "delisting_sweep",
        status,
        records_processed: delisted.len() as i64,
        calls_used: probed,
        started_at: started,
        completed_at: completed,
        error_message: None,
    };
    Ok((report, Phase6Output { delisted }))
}
