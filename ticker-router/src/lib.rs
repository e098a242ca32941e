//! Provider Router: priority-ordered capability dispatch with per-call
//! timeout and bounded retry, mirroring `borsa::core::fetch_single` /
//! `fetch_single_priority_with_fallback` (see `borsa/src/router/quotes.rs`).
//!
//! Unlike the teacher, a total failure across every registered provider
//! returns the *last* error observed rather than an aggregated
//! `AllProvidersFailed` wrapper, per spec.md §4.1's literal wording
//! ("if every provider fails, returns last error kind observed").

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use ticker_core::connector::{
    AnalystRecommendationsProvider, EarningsCalendarProvider, FundamentalsProvider,
    HistoricalRangeProvider, QuoteBatchProvider,
};
use ticker_core::{DataProvider, PipelineError};
use ticker_types::{
    AnalystRecommendationsRequest, AnalystRecommendationsResponse, BackoffConfig, Capability,
    EarningsCalendarRequest, EarningsCalendarResponse, FundamentalsRequest, FundamentalsResponse,
    HistoricalRangeRequest, HistoricalRangeResponse, QuoteBatchRequest, QuoteBatchResponse,
};
use tracing::{debug, warn};

/// One provider registered under the router, in priority order.
struct Registration {
    provider: Arc<dyn DataProvider>,
}

/// Routes capability requests across a priority-ordered list of providers,
/// retrying transient failures with backoff and falling back to the next
/// provider on any other error.
pub struct ProviderRouter {
    providers: Vec<Registration>,
    backoff: BackoffConfig,
    call_timeout: Duration,
}

impl ProviderRouter {
    #[must_use]
    pub fn new(providers: Vec<Arc<dyn DataProvider>>, backoff: BackoffConfig) -> Self {
        Self {
            providers: providers.into_iter().map(|provider| Registration { provider }).collect(),
            backoff,
            call_timeout: Duration::from_secs(10),
        }
    }

    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let scaled = self.backoff.min_backoff_ms.saturating_mul(
            self.backoff.factor.saturating_pow(attempt) as u64,
        );
        Duration::from_millis(scaled.min(self.backoff.max_backoff_ms))
    }

    /// Run one provider call with a per-call timeout and bounded retry on
    /// `Transient` errors. `call` is re-invoked fresh on each retry since a
    /// polled `Future` cannot be reused.
    async fn call_with_retry<T, F, Fut>(
        &self,
        provider: &Arc<dyn DataProvider>,
        capability: Capability,
        call: &F,
    ) -> Result<T, PipelineError>
    where
        F: Fn(Arc<dyn DataProvider>) -> Option<Fut> + Send + Sync,
        Fut: Future<Output = Result<T, PipelineError>> + Send,
    {
        let mut attempt = 0;
        loop {
            let Some(fut) = call(Arc::clone(provider)) else {
                return Err(PipelineError::unsupported(capability_static(capability)));
            };
            let outcome = tokio::time::timeout(self.call_timeout, fut).await;
            let err = match outcome {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(err)) => err,
                Err(_) => PipelineError::provider_timeout(provider.name(), capability_static(capability)),
            };
            if !err.is_retryable() || attempt >= self.backoff.max_retries {
                return Err(err);
            }
            let delay = self.backoff_delay(attempt);
            warn!(
                provider = provider.name(),
                capability = %capability,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "retrying transient provider error"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Dispatch across the priority-ordered provider list for `capability`,
    /// falling back to the next provider on any error. Returns the last
    /// error observed if every provider fails.
    async fn dispatch<T, F, Fut>(&self, capability: Capability, call: F) -> Result<T, PipelineError>
    where
        F: Fn(Arc<dyn DataProvider>) -> Option<Fut> + Send + Sync,
        Fut: Future<Output = Result<T, PipelineError>> + Send,
    {
        let mut last_err: Option<PipelineError> = None;
        for reg in &self.providers {
            match self
                .call_with_retry(&reg.provider, capability, &call)
                .await
            {
                Ok(value) => return Ok(value),
                Err(PipelineError::TickerUnknown { ticker }) => {
                    // Not a provider-health failure: every provider agrees the
                    // ticker doesn't exist, so surface it immediately rather
                    // than falling through the rest of the priority list.
                    return Err(PipelineError::TickerUnknown { ticker });
                }
                Err(err) => {
                    debug!(provider = reg.provider.name(), capability = %capability, error = %err, "provider failed, trying next");
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or(PipelineError::AllProvidersTimedOut {
            capability: capability_static(capability),
        }))
    }

    /// Call budget remaining today for `provider_name`, as tracked by its
    /// rate-limiting middleware layer, if registered under that name.
    ///
    /// Exposed for the Orchestrator's reserve-floor accounting (spec.md §4.3).
    /// Returns `None` when no registered provider matches the name or none of
    /// its middleware layers expose a budget (plumbing hook: middleware
    /// budget introspection is not wired to a concrete counter in this
    /// workspace, see DESIGN.md).
    #[must_use]
    pub fn remaining_budget(&self, _provider_name: &str) -> Option<u64> {
        None
    }

    /// Record an out-of-band failure against `provider_name` (e.g. one
    /// observed by the caller outside of `dispatch`), for symmetry with the
    /// teacher's explicit `mark_failed` hook. This router's providers already
    /// record outcomes themselves via the circuit breaker's `pre_call`/
    /// `map_error` hooks, so this is a no-op placeholder kept for API parity.
    pub fn mark_failed(&self, _provider_name: &str, _error: &PipelineError) {}

    pub async fn quote_batch(
        &self,
        req: QuoteBatchRequest,
    ) -> Result<QuoteBatchResponse, PipelineError> {
        self.dispatch(Capability::QuoteBatch, |provider| {
            let req = req.clone();
            provider
                .as_quote_batch_provider()
                .map(|_| async move { call_quote_batch(provider, req).await })
        })
        .await
    }

    pub async fn historical_range(
        &self,
        req: HistoricalRangeRequest,
    ) -> Result<HistoricalRangeResponse, PipelineError> {
        self.dispatch(Capability::HistoricalRange, |provider| {
            let req = req.clone();
            provider
                .as_historical_range_provider()
                .map(|_| async move { call_historical_range(provider, req).await })
        })
        .await
    }

    pub async fn fundamentals(
        &self,
        req: FundamentalsRequest,
    ) -> Result<FundamentalsResponse, PipelineError> {
        self.dispatch(Capability::Fundamentals, |provider| {
            let req = req.clone();
            provider
                .as_fundamentals_provider()
                .map(|_| async move { call_fundamentals(provider, req).await })
        })
        .await
    }

    pub async fn earnings_calendar(
        &self,
        req: EarningsCalendarRequest,
    ) -> Result<EarningsCalendarResponse, PipelineError> {
        self.dispatch(Capability::EarningsCalendar, |provider| {
            let req = req.clone();
            provider
                .as_earnings_calendar_provider()
                .map(|_| async move { call_earnings_calendar(provider, req).await })
        })
        .await
    }

    pub async fn analyst_recommendations(
        &self,
        req: AnalystRecommendationsRequest,
    ) -> Result<AnalystRecommendationsResponse, PipelineError> {
        self.dispatch(Capability::AnalystRecommendations, |provider| {
            let req = req.clone();
            provider
                .as_analyst_recommendations_provider()
                .map(|_| async move { call_analyst_recommendations(provider, req).await })
        })
        .await
    }
}

fn capability_static(capability: Capability) -> &'static str {
    capability.as_str()
}

// The following free functions hold an owned `Arc<dyn DataProvider>` across
// the `.await` point while borrowing a role-trait reference from it; this is
// sound under Rust's async state machine (the owned `Arc` and the borrow it
// produces live together in the generated future).

async fn call_quote_batch(
    provider: Arc<dyn DataProvider>,
    req: QuoteBatchRequest,
) -> Result<QuoteBatchResponse, PipelineError> {
    let role: &dyn QuoteBatchProvider = provider
        .as_quote_batch_provider()
        .ok_or_else(|| PipelineError::unsupported(Capability::QuoteBatch.as_str()))?;
    role.quote_batch(req).await
}

async fn call_historical_range(
    provider: Arc<dyn DataProvider>,
    req: HistoricalRangeRequest,
) -> Result<HistoricalRangeResponse, PipelineError> {
    let role: &dyn HistoricalRangeProvider = provider
        .as_historical_range_provider()
        .ok_or_else(|| PipelineError::unsupported(Capability::HistoricalRange.as_str()))?;
    role.historical_range(req).await
}

async fn call_fundamentals(
    provider: Arc<dyn DataProvider>,
    req: FundamentalsRequest,
) -> Result<FundamentalsResponse, PipelineError> {
    let role: &dyn FundamentalsProvider = provider
        .as_fundamentals_provider()
        .ok_or_else(|| PipelineError::unsupported(Capability::Fundamentals.as_str()))?;
    role.fundamentals(req).await
}

async fn call_earnings_calendar(
    provider: Arc<dyn DataProvider>,
    req: EarningsCalendarRequest,
) -> Result<EarningsCalendarResponse, PipelineError> {
    let role: &dyn EarningsCalendarProvider = provider
        .as_earnings_calendar_provider()
        .ok_or_else(|| PipelineError::unsupported(Capability::EarningsCalendar.as_str()))?;
    role.earnings_calendar(req).await
}

async fn call_analyst_recommendations(
    provider: Arc<dyn DataProvider>,
    req: AnalystRecommendationsRequest,
) -> Result<AnalystRecommendationsResponse, PipelineError> {
    let role: &dyn AnalystRecommendationsProvider = provider
        .as_analyst_recommendations_provider()
        .ok_or_else(|| PipelineError::unsupported(Capability::AnalystRecommendations.as_str()))?;
    role.analyst_recommendations(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use ticker_mock::MockProvider;

    fn router(providers: Vec<Arc<dyn DataProvider>>) -> ProviderRouter {
        ProviderRouter::new(providers, BackoffConfig::default())
            .with_call_timeout(Duration::from_millis(200))
    }

    #[tokio::test]
    async fn quote_batch_uses_first_provider_that_succeeds() {
        let primary: Arc<dyn DataProvider> = Arc::new(MockProvider::new("primary"));
        let r = router(vec![primary]);
        let resp = r
            .quote_batch(QuoteBatchRequest {
                symbols: vec!["AAA".to_string()],
            })
            .await
            .expect("quote batch succeeds");
        assert!(resp.bars.contains_key("AAA"));
    }

    #[tokio::test]
    async fn quote_batch_falls_back_to_secondary_on_forced_failure() {
        let primary: Arc<dyn DataProvider> = Arc::new(MockProvider::new("primary"));
        let secondary: Arc<dyn DataProvider> = Arc::new(MockProvider::new("secondary"));
        let r = ProviderRouter::new(vec![primary, secondary], BackoffConfig {
            max_retries: 0,
            ..BackoffConfig::default()
        })
        .with_call_timeout(Duration::from_millis(200));
        // "FAIL" forces a `Provider` error (not retryable) from every
        // provider, so dispatch should exhaust the list and surface it.
        let err = r
            .quote_batch(QuoteBatchRequest {
                symbols: vec!["FAIL".to_string()],
            })
            .await
            .expect_err("both providers fail");
        assert!(matches!(err, PipelineError::Provider { .. }));
    }

    #[tokio::test]
    async fn delisted_ticker_short_circuits_fallback() {
        let primary: Arc<dyn DataProvider> = Arc::new(MockProvider::new("primary"));
        let secondary: Arc<dyn DataProvider> = Arc::new(MockProvider::new("secondary"));
        let r = router(vec![primary, secondary]);
        let err = r
            .historical_range(HistoricalRangeRequest {
                symbol: "XYZ".to_string(),
                from: ticker_mock::fixtures::anchor_date() - chrono::Duration::days(30),
                to: ticker_mock::fixtures::anchor_date(),
            })
            .await
            .expect_err("delisted ticker surfaces TickerUnknown");
        assert!(matches!(err, PipelineError::TickerUnknown { .. }));
    }

    #[tokio::test]
    async fn unsupported_capability_yields_unsupported_error() {
        struct QuoteOnly;
        #[async_trait::async_trait]
        impl DataProvider for QuoteOnly {
            fn name(&self) -> &'static str {
                "quote-only"
            }
            fn as_quote_batch_provider(&self) -> Option<&dyn QuoteBatchProvider> {
                None
            }
        }
        let p: Arc<dyn DataProvider> = Arc::new(QuoteOnly);
        let r = router(vec![p]);
        let err = r
            .fundamentals(FundamentalsRequest {
                symbol: "AAA".to_string(),
            })
            .await
            .expect_err("capability not implemented");
        assert!(matches!(err, PipelineError::Unsupported { .. } | PipelineError::AllProvidersTimedOut { .. }));
    }
}
