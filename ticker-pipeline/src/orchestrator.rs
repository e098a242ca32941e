//! Pipeline Orchestrator: the six-phase daily run state machine (spec.md
//! §4.7). Owns the dependency graph for one run via an explicit builder,
//! grounded on `BorsaBuilder`/`Borsa::builder()` (SPEC_FULL.md §4.7.1).

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use ticker_calendar::MarketCalendar;
use ticker_core::PipelineError;
use ticker_router::ProviderRouter;
use ticker_store::Store;
use ticker_types::{PipelineConfig, RunStatus, TickerNeedTag, UpdateLog};
use tokio::time::Instant;
use tracing::{info, warn};

use crate::budget::Budget;
use crate::phases::{
    phase1_price_refresh, phase2_indicators, phase3_fundamentals, phase4_ratios_and_scores,
    phase5_backfill, phase6_delisting_sweep, PhaseContext, PhaseReport,
};

/// Outcome of one `run_once` call: every phase's report plus the run's
/// overall status.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_date: NaiveDate,
    pub was_trading_day: bool,
    pub status: RunStatus,
    pub phases: Vec<PhaseReport>,
    pub delisted: Vec<String>,
}

impl RunReport {
    #[must_use]
    pub fn total_calls_used(&self) -> u64 {
        self.phases.iter().map(|p| p.calls_used).sum()
    }
}

pub struct Orchestrator {
    store: Arc<dyn Store>,
    router: Arc<ProviderRouter>,
    calendar: MarketCalendar,
    config: PipelineConfig,
}

impl Orchestrator {
    #[must_use]
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    /// Run one full daily cycle for `today`.
    ///
    /// # Errors
    /// Returns `PipelineError::StoreUnavailable` (the only fatal kind) if
    /// the Store becomes unreachable mid-run; every other per-ticker or
    /// per-phase failure is absorbed into the phase's report.
    pub async fn run_once(&self, today: NaiveDate) -> Result<RunReport, PipelineError> {
        let trading_info = self.calendar.trading_day_info(today);
        let deadline = Instant::now() + self.config.run_deadline();
        let budget = Arc::new(Budget::new(self.config.daily_api_budget));
        let ctx = PhaseContext::new(Arc::clone(&self.store), Arc::clone(&self.router), self.config.clone());

        info!(run_date = %today, was_trading_day = trading_info.was_trading_day, "starting pipeline run");

        let mut phases = Vec::new();
        let mut delisted = Vec::new();
        let mut overall_status = RunStatus::Success;

        if !trading_info.was_trading_day {
            let p5_done = self.store.update_log_completed("history_backfill", today).await?;
            let backfill_report = if p5_done {
                skipped_report("history_backfill", today)
            } else {
                let report = phase5_backfill(&ctx, today, Arc::clone(&budget), deadline, &[]).await?;
                overall_status = worse(overall_status, report.status);
                report
            };
            phases.push(backfill_report);

            let p6_done = self.store.update_log_completed("delisting_sweep", today).await?;
            let sweep_report = if p6_done {
                skipped_report("delisting_sweep", today)
            } else {
                let suspects = self.store.tickers_needing(TickerNeedTag::DelistedSuspects, today).await?;
                let (report, out) = phase6_delisting_sweep(&ctx, today, &suspects, &budget).await?;
                overall_status = worse(overall_status, report.status);
                delisted = out.delisted;
                report
            };
            phases.push(sweep_report);

            let report = self.finish(today, trading_info.was_trading_day, phases, delisted, overall_status).await?;
            return Ok(report);
        }

        let p1_done = self.store.update_log_completed("price_refresh", today).await?;
        let (p1_report, p1_out) = if p1_done {
            (skipped_report("price_refresh", today), crate::phases::Phase1Output {
                priced: Vec::new(),
                missing_or_unknown: Vec::new(),
            })
        } else {
            match phase1_price_refresh(&ctx, today, &budget).await {
                Ok(pair) => {
                    overall_status = worse(overall_status, pair.0.status);
                    pair
                }
                Err(PipelineError::StoreUnavailable(msg)) => {
                    return self.abort(today, trading_info.was_trading_day, phases, msg).await;
                }
                Err(err) => {
                    warn!(error = %err, "phase 1 failed, continuing with no priced tickers");
                    let report = failed_report("price_refresh", today, &err);
                    overall_status = worse(overall_status, report.status);
                    (
                        report,
                        crate::phases::Phase1Output {
                            priced: Vec::new(),
                            missing_or_unknown: Vec::new(),
                        },
                    )
                }
            }
        };
        phases.push(p1_report);

        if Instant::now() >= deadline {
            overall_status = RunStatus::Partial;
            let report = self.finish(today, trading_info.was_trading_day, phases, delisted, overall_status).await?;
            return Ok(report);
        }

        let p2_done = self.store.update_log_completed("indicator_update", today).await?;
        let (p2_report, p2_out) = if p2_done {
            (skipped_report("indicator_update", today), crate::phases::Phase2Output { insufficient_history: Vec::new() })
        } else {
            let (report, out) = phase2_indicators(&ctx, today, &p1_out.priced, deadline).await?;
            overall_status = worse(overall_status, report.status);
            (report, out)
        };
        phases.push(p2_report);

        let p3_done = self.store.update_log_completed("fundamentals_refresh", today).await?;
        let (p3_report, p3_out) = if p3_done {
            (skipped_report("fundamentals_refresh", today), crate::phases::Phase3Output { touched: Vec::new() })
        } else {
            let (report, out) = phase3_fundamentals(&ctx, today, &budget).await?;
            overall_status = worse(overall_status, report.status);
            (report, out)
        };
        phases.push(p3_report);

        let p4_done = self.store.update_log_completed("ratios_and_scores", today).await?;
        let p4_report = if p4_done {
            skipped_report("ratios_and_scores", today)
        } else {
            let report = phase4_ratios_and_scores(&ctx, today, &p3_out.touched).await?;
            overall_status = worse(overall_status, report.status);
            report
        };
        phases.push(p4_report);

        let p5_done = self.store.update_log_completed("history_backfill", today).await?;
        let p5_report = if p5_done {
            skipped_report("history_backfill", today)
        } else {
            let report =
                phase5_backfill(&ctx, today, Arc::clone(&budget), deadline, &p2_out.insufficient_history).await?;
            overall_status = worse(overall_status, report.status);
            report
        };
        phases.push(p5_report);

        let p6_done = self.store.update_log_completed("delisting_sweep", today).await?;
        let p6_report = if p6_done {
            skipped_report("delisting_sweep", today)
        } else {
            let (report, out) = phase6_delisting_sweep(&ctx, today, &p1_out.missing_or_unknown, &budget).await?;
            overall_status = worse(overall_status, report.status);
            delisted = out.delisted;
            report
        };
        phases.push(p6_report);

        if Instant::now() >= deadline && overall_status == RunStatus::Success {
            overall_status = RunStatus::Partial;
        }

        self.finish(today, trading_info.was_trading_day, phases, delisted, overall_status).await
    }

    async fn finish(
        &self,
        run_date: NaiveDate,
        was_trading_day: bool,
        phases: Vec<PhaseReport>,
        delisted: Vec<String>,
        status: RunStatus,
    ) -> Result<RunReport, PipelineError> {
        for phase in &phases {
            self.store
                .record_update_log(&UpdateLog {
                    update_type: phase.update_type.to_string(),
                    ticker: None,
                    status: phase.status,
                    error_message: phase.error_message.clone(),
                    records_processed: phase.records_processed,
                    execution_time_ms: ms_between(phase.started_at, phase.completed_at),
                    started_at: phase.started_at,
                    completed_at: Some(phase.completed_at),
                })
                .await?;
        }
        let run_started = phases.first().map_or_else(|| run_date.and_hms_opt(21, 0, 0).expect("valid time"), |p| p.started_at);
        let run_completed = phases.last().map_or(run_started, |p| p.completed_at);
        self.store
            .record_update_log(&UpdateLog {
                update_type: "run_summary".to_string(),
                ticker: None,
                status,
                error_message: None,
                records_processed: phases.iter().map(|p| p.records_processed).sum(),
                execution_time_ms: ms_between(run_started, run_completed),
                started_at: run_started,
                completed_at: Some(run_completed),
            })
            .await?;
        info!(run_date = %run_date, status = ?status, "pipeline run finished");
        Ok(RunReport {
            run_date,
            was_trading_day,
            status,
            phases,
            delisted,
        })
    }

    async fn abort(
        &self,
        run_date: NaiveDate,
        was_trading_day: bool,
        phases: Vec<PhaseReport>,
        reason: String,
    ) -> Result<RunReport, PipelineError> {
        warn!(run_date = %run_date, reason, "pipeline run aborted: store unavailable");
        Ok(RunReport {
            run_date,
            was_trading_day,
            status: RunStatus::Aborted,
            phases,
            delisted: Vec::new(),
        })
    }
}

/// Stand-in report for a phase whose `UpdateLog` already shows it completed
/// for `today`, so `run_once` can resume at the first phase not yet done
/// instead of repeating work a prior invocation already finished.
fn skipped_report(update_type: &'static str, today: NaiveDate) -> PhaseReport {
    let at = today.and_hms_opt(21, 0, 0).expect("valid time");
    PhaseReport {
        update_type,
        status: RunStatus::Skipped,
        records_processed: 0,
        calls_used: 0,
        started_at: at,
        completed_at: at,
        error_message: None,
    }
}

fn failed_report(update_type: &'static str, today: NaiveDate, err: &PipelineError) -> PhaseReport {
    let at = today.and_hms_opt(21, 0, 0).expect("valid time");
    PhaseReport {
        update_type,
        status: RunStatus::Failed,
        records_processed: 0,
        calls_used: 0,
        started_at: at,
        completed_at: at,
        error_message: Some(err.to_string()),
    }
}

fn worse(a: RunStatus, b: RunStatus) -> RunStatus {
    fn rank(s: RunStatus) -> u8 {
        match s {
            RunStatus::Success | RunStatus::Skipped => 0,
            RunStatus::Partial => 1,
            RunStatus::Failed => 2,
            RunStatus::Aborted => 3,
        }
    }
    if rank(b) > rank(a) {
        b
    } else {
        a
    }
}

fn ms_between(start: NaiveDateTime, end: NaiveDateTime) -> i64 {
    (end - start).num_milliseconds().max(0)
}

/// Consuming builder for `Orchestrator`, mirroring `BorsaBuilder`'s
/// eager-validation-at-`build()` style.
#[derive(Default)]
pub struct OrchestratorBuilder {
    store: Option<Arc<dyn Store>>,
    router: Option<Arc<ProviderRouter>>,
    calendar: Option<MarketCalendar>,
    config: Option<PipelineConfig>,
}

impl OrchestratorBuilder {
    #[must_use]
    pub fn store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn router(mut self, router: Arc<ProviderRouter>) -> Self {
        self.router = Some(router);
        self
    }

    #[must_use]
    pub fn calendar(mut self, calendar: MarketCalendar) -> Self {
        self.calendar = Some(calendar);
        self
    }

    #[must_use]
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// # Errors
    /// Returns `PipelineError::InvalidArg` if `store` or `router` were never
    /// supplied.
    pub fn build(self) -> Result<Orchestrator, PipelineError> {
        let store = self
            .store
            .ok_or_else(|| PipelineError::InvalidArg("orchestrator requires a store".to_string()))?;
        let router = self
            .router
            .ok_or_else(|| PipelineError::InvalidArg("orchestrator requires a provider router".to_string()))?;
        Ok(Orchestrator {
            store,
            router,
            calendar: self.calendar.unwrap_or_default(),
            config: self.config.unwrap_or_default(),
        })
    }
}
