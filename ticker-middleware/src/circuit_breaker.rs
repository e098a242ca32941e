//! Circuit breaker middleware.
//!
//! Generalizes `BlacklistConnector`'s binary cooldown gate into the full
//! three-state machine spec.md §4.1 requires: `Closed -> Open` on >=5
//! consecutive failures or >=3 failures within 60s, `Open -> HalfOpen` after
//! a 60s cooldown, `HalfOpen -> Closed` on the first success or back to
//! `Open` on the first failure. An open breaker skips the call entirely
//! without consuming rate-limit budget.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use ticker_core::connector::{
    AnalystRecommendationsProvider, EarningsCalendarProvider, FundamentalsProvider,
    HistoricalRangeProvider, QuoteBatchProvider,
};
use ticker_core::middleware::{CallContext, CallOrigin, Middleware, ValidationContext};
use ticker_core::{DataProvider, PipelineError};
use ticker_types::{
    AnalystRecommendationsRequest, AnalystRecommendationsResponse, Capability,
    EarningsCalendarRequest, EarningsCalendarResponse, FundamentalsRequest, FundamentalsResponse,
    HistoricalRangeRequest, HistoricalRangeResponse, QuoteBatchRequest, QuoteBatchResponse,
};

const CONSECUTIVE_FAILURE_THRESHOLD: u32 = 5;
const WINDOWED_FAILURE_THRESHOLD: u32 = 3;
const WINDOW: Duration = Duration::from_secs(60);
const COOLDOWN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open { since: Instant },
    HalfOpen,
}

struct Breaker {
    state: State,
    consecutive_failures: u32,
    window_failures: u32,
    window_start: Instant,
}

impl Breaker {
    fn new() -> Self {
        Self {
            state: State::Closed,
            consecutive_failures: 0,
            window_failures: 0,
            window_start: Instant::now(),
        }
    }

    fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.window_failures = 0;
        self.state = State::Closed;
    }

    fn record_failure(&mut self) {
        let now = Instant::now();
        if now.duration_since(self.window_start) >= WINDOW {
            self.window_start = now;
            self.window_failures = 0;
        }
        self.consecutive_failures += 1;
        self.window_failures += 1;

        let should_open = matches!(self.state, State::HalfOpen)
            || self.consecutive_failures >= CONSECUTIVE_FAILURE_THRESHOLD
            || self.window_failures >= WINDOWED_FAILURE_THRESHOLD;
        if should_open {
            self.state = State::Open { since: now };
        }
    }

    /// Transition `Open -> HalfOpen` once the cooldown has elapsed, and
    /// report whether the call may proceed.
    fn gate(&mut self) -> Result<(), Duration> {
        match self.state {
            State::Closed | State::HalfOpen => Ok(()),
            State::Open { since } => {
                let elapsed = Instant::now().duration_since(since);
                if elapsed >= COOLDOWN {
                    self.state = State::HalfOpen;
                    Ok(())
                } else {
                    Err(COOLDOWN - elapsed)
                }
            }
        }
    }
}

/// Wrapper gating calls to its inner provider per the three-state breaker.
pub struct CircuitBreakerConnector {
    inner: Arc<dyn DataProvider>,
    breaker: Mutex<Breaker>,
}

impl CircuitBreakerConnector {
    #[must_use]
    pub fn new(inner: Arc<dyn DataProvider>) -> Self {
        Self {
            inner,
            breaker: Mutex::new(Breaker::new()),
        }
    }

    #[must_use]
    pub fn inner(&self) -> &Arc<dyn DataProvider> {
        &self.inner
    }

    fn pre_gate(&self, ctx: &CallContext) -> Result<(), PipelineError> {
        if matches!(ctx.origin(), CallOrigin::Internal { .. }) {
            return Ok(());
        }
        let mut b = self.breaker.lock().expect("mutex poisoned");
        b.gate().map_err(|_remaining| PipelineError::CircuitOpen {
            provider: self.inner.name().to_string(),
        })
    }

    fn note_outcome(&self, ctx: &CallContext, ok: bool) {
        if matches!(ctx.origin(), CallOrigin::Internal { .. }) {
            return;
        }
        let mut b = self.breaker.lock().expect("mutex poisoned");
        if ok {
            b.record_success();
        } else {
            b.record_failure();
        }
    }

    async fn guarded<T, F>(&self, capability: Capability, call: F) -> Result<T, PipelineError>
    where
        F: core::future::Future<Output = Result<T, PipelineError>> + Send,
    {
        let ctx = CallContext::external(capability);
        self.pre_gate(&ctx)?;
        match call.await {
            Ok(v) => {
                self.note_outcome(&ctx, true);
                Ok(v)
            }
            Err(e) => {
                self.note_outcome(&ctx, false);
                Err(e)
            }
        }
    }
}

#[async_trait]
impl DataProvider for CircuitBreakerConnector {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    ticker_core::provider_accessors!(inner);
}

#[async_trait]
impl QuoteBatchProvider for CircuitBreakerConnector {
    async fn quote_batch(
        &self,
        req: QuoteBatchRequest,
    ) -> Result<QuoteBatchResponse, PipelineError> {
        let inner = self
            .inner
            .as_quote_batch_provider()
            .ok_or_else(|| PipelineError::unsupported("quote_batch"))?;
        self.guarded(Capability::QuoteBatch, inner.quote_batch(req))
            .await
    }
}

#[async_trait]
impl HistoricalRangeProvider for CircuitBreakerConnector {
    async fn historical_range(
        &self,
        req: HistoricalRangeRequest,
    ) -> Result<HistoricalRangeResponse, PipelineError> {
        let inner = self
            .inner
            .as_historical_range_provider()
            .ok_or_else(|| PipelineError::unsupported("historical_range"))?;
        self.guarded(Capability::HistoricalRange, inner.historical_range(req))
            .await
    }
}

#[async_trait]
impl FundamentalsProvider for CircuitBreakerConnector {
    async fn fundamentals(
        &self,
        req: FundamentalsRequest,
    ) -> Result<FundamentalsResponse, PipelineError> {
        let inner = self
            .inner
            .as_fundamentals_provider()
            .ok_or_else(|| PipelineError::unsupported("fundamentals"))?;
        self.guarded(Capability::Fundamentals, inner.fundamentals(req))
            .await
    }
}

#[async_trait]
impl EarningsCalendarProvider for CircuitBreakerConnector {
    async fn earnings_calendar(
        &self,
        req: EarningsCalendarRequest,
    ) -> Result<EarningsCalendarResponse, PipelineError> {
        let inner = self
            .inner
            .as_earnings_calendar_provider()
            .ok_or_else(|| PipelineError::unsupported("earnings_calendar"))?;
        self.guarded(Capability::EarningsCalendar, inner.earnings_calendar(req))
            .await
    }
}

#[async_trait]
impl AnalystRecommendationsProvider for CircuitBreakerConnector {
    async fn analyst_recommendations(
        &self,
        req: AnalystRecommendationsRequest,
    ) -> Result<AnalystRecommendationsResponse, PipelineError> {
        let inner = self
            .inner
            .as_analyst_recommendations_provider()
            .ok_or_else(|| PipelineError::unsupported("analyst_recommendations"))?;
        self.guarded(
            Capability::AnalystRecommendations,
            inner.analyst_recommendations(req),
        )
        .await
    }
}

/// Middleware config for constructing a [`CircuitBreakerConnector`].
pub struct CircuitBreakerMiddleware;

impl CircuitBreakerMiddleware {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Default for CircuitBreakerMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for CircuitBreakerMiddleware {
    fn apply(self: Box<Self>, inner: Arc<dyn DataProvider>) -> Arc<dyn DataProvider> {
        Arc::new(CircuitBreakerConnector::new(inner))
    }

    fn name(&self) -> &'static str {
        "CircuitBreakerConnector"
    }

    fn config_json(&self) -> serde_json::Value {
        serde_json::json!({
            "consecutive_failure_threshold": CONSECUTIVE_FAILURE_THRESHOLD,
            "windowed_failure_threshold": WINDOWED_FAILURE_THRESHOLD,
            "window_secs": WINDOW.as_secs(),
            "cooldown_secs": COOLDOWN.as_secs(),
        })
    }

    fn validate(&self, _ctx: &ValidationContext<'_>) -> Result<(), PipelineError> {
        Ok(())
    }
}
