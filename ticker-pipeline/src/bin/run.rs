//! CLI entry point: loads a TOML config, wires the Store and Provider
//! Router, and runs one pipeline cycle. This is the process-scheduler/cron
//! host's counterpart — the host invokes this binary once per day; the
//! binary itself does no scheduling (spec.md §1, out-of-scope collaborator).

use std::process::ExitCode;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::Parser;
use ticker_calendar::MarketCalendar;
use ticker_core::DataProvider;
use ticker_mock::MockProvider;
use ticker_pipeline::Orchestrator;
use ticker_router::ProviderRouter;
use ticker_store::{PgStore, Store};
use ticker_types::ProviderConfig;
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "ticker-pipeline", about = "Daily ticker ingestion and computation run")]
struct Cli {
    /// Path to the pipeline TOML config.
    #[arg(long, default_value = "config/pipeline.toml")]
    config: String,

    /// Postgres connection string; falls back to DATABASE_URL.
    #[arg(long)]
    database_url: Option<String>,

    /// Run date (defaults to today, UTC).
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Directory for the rotating per-run log file.
    #[arg(long, default_value = "logs")]
    log_dir: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let run_date = cli.date.unwrap_or_else(|| chrono::Utc::now().date_naive());
    let stamp = run_date.format("%Y%m%d-000000").to_string();
    let _guard = ticker_pipeline::logging::init(&cli.log_dir, &stamp);

    match run(cli, run_date).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "pipeline run failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, run_date: NaiveDate) -> Result<(), ticker_core::PipelineError> {
    let config = ticker_pipeline::config::load(&cli.config)?;

    let database_url = cli
        .database_url
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .ok_or_else(|| ticker_core::PipelineError::InvalidArg("no database_url provided".to_string()))?;
    let store: Arc<dyn Store> = Arc::new(PgStore::connect(&database_url).await?);

    let router = Arc::new(build_router(&config.providers, config.backoff)?);

    let orchestrator = Orchestrator::builder()
        .store(store)
        .router(router)
        .calendar(MarketCalendar::new())
        .config(config)
        .build()?;

    let report = orchestrator.run_once(run_date).await?;
    tracing::info!(
        status = ?report.status,
        calls_used = report.total_calls_used(),
        delisted = report.delisted.len(),
        "run complete"
    );
    Ok(())
}

/// Build the provider list in priority order. Real vendor HTTP connectors
/// are an external collaborator outside this system's scope (spec.md §1);
/// each configured provider is wired to the deterministic mock connector,
/// wrapped with the same rate-limiter/circuit-breaker stack a real
/// connector would get.
fn build_router(
    providers: &[ProviderConfig],
    backoff: ticker_types::BackoffConfig,
) -> Result<ProviderRouter, ticker_core::PipelineError> {
    let mut ordered = providers.to_vec();
    ordered.sort_by_key(|p| p.priority);

    let mut wrapped: Vec<Arc<dyn DataProvider>> = Vec::with_capacity(ordered.len());
    for p in ordered {
        let name: &'static str = Box::leak(p.name.into_boxed_str());
        let raw: Arc<dyn DataProvider> = Arc::new(MockProvider::new(name));
        let provider = ticker_middleware::ProviderBuilder::new(raw)
            .with_rate_limit(p.rate_per_minute, p.rate_per_day)
            .with_circuit_breaker()
            .build()?;
        wrapped.push(provider);
    }

    Ok(ProviderRouter::new(wrapped, backoff))
}
