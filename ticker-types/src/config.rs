//! Configuration types, mirroring `BorsaConfig`'s struct-of-options style with
//! `Default` impls carrying the defaults spec.md §6 names explicitly.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::capability::Capability;

/// Exponential backoff configuration for `ErrTransient` retries (spec.md §4.1).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BackoffConfig {
    pub min_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub factor: u32,
    pub max_retries: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            min_backoff_ms: 2_000,
            max_backoff_ms: 16_000,
            factor: 2,
            max_retries: 3,
        }
    }
}

/// Declared rate limits for one provider (spec.md §4.1, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    /// Lower number = tried first for a given capability.
    pub priority: u32,
    pub rate_per_minute: u64,
    pub rate_per_day: u64,
    pub capabilities: Vec<Capability>,
}

/// Top-level pipeline configuration, loaded from TOML (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub daily_api_budget: u64,
    pub api_budget_reserve_pct: f64,
    pub price_batch_size: usize,
    pub inter_batch_delay_ms: u64,
    pub worker_count: usize,
    pub run_deadline_seconds: u64,
    pub minimum_history_days: u32,
    pub providers: Vec<ProviderConfig>,
    pub market_close_utc: String,
    pub backoff: BackoffConfig,
    /// Per-phase backpressure threshold: a worker blocked on the rate limiter
    /// longer than this defers its ticker and exits (spec.md §5).
    pub defer_threshold_seconds: u64,
}

impl PipelineConfig {
    #[must_use]
    pub fn run_deadline(&self) -> Duration {
        Duration::from_secs(self.run_deadline_seconds)
    }

    #[must_use]
    pub fn defer_threshold(&self) -> Duration {
        Duration::from_secs(self.defer_threshold_seconds)
    }

    /// Call budget held in reserve for Phase 5 (history backfill).
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn reserve_floor(&self) -> u64 {
        (self.daily_api_budget as f64 * self.api_budget_reserve_pct).floor() as u64
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            daily_api_budget: 1_000,
            api_budget_reserve_pct: 0.2,
            price_batch_size: 100,
            inter_batch_delay_ms: 1_000,
            worker_count: 5,
            run_deadline_seconds: 3_600,
            minimum_history_days: 100,
            providers: Vec::new(),
            market_close_utc: "21:00".to_string(),
            backoff: BackoffConfig::default(),
            defer_threshold_seconds: 300,
        }
    }
}
