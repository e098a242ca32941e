//! Token-bucket rate limiting middleware.
//!
//! Generalizes `QuotaAwareConnector`'s single-bucket accounting into the two
//! simultaneous buckets spec.md §4.1 requires per provider: a per-minute
//! bucket and a per-day bucket. A call blocks (bounded, up to one minute
//! window) when the minute bucket is exhausted but the day bucket still has
//! room, and fails immediately with `RateExceeded` when the day bucket is
//! empty.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use ticker_core::connector::{
    AnalystRecommendationsProvider, EarningsCalendarProvider, FundamentalsProvider,
    HistoricalRangeProvider, QuoteBatchProvider,
};
use ticker_core::middleware::{Middleware, ValidationContext};
use ticker_core::{DataProvider, PipelineError};
use ticker_types::{
    AnalystRecommendationsRequest, AnalystRecommendationsResponse, EarningsCalendarRequest,
    EarningsCalendarResponse, FundamentalsRequest, FundamentalsResponse, HistoricalRangeRequest,
    HistoricalRangeResponse, QuoteBatchRequest, QuoteBatchResponse,
};

struct Bucket {
    limit: u64,
    made: u64,
    window: Duration,
    window_start: Instant,
}

impl Bucket {
    fn new(limit: u64, window: Duration) -> Self {
        Self {
            limit,
            made: 0,
            window,
            window_start: Instant::now(),
        }
    }

    fn reset_if_elapsed(&mut self, now: Instant) {
        if now.duration_since(self.window_start) >= self.window {
            self.made = 0;
            self.window_start = now;
        }
    }

    fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.made)
    }

    fn reset_in(&self, now: Instant) -> Duration {
        self.window.saturating_sub(now.duration_since(self.window_start))
    }
}

struct Buckets {
    per_minute: Bucket,
    per_day: Bucket,
}

/// Wrapper enforcing per-minute and per-day quotas on the wrapped provider.
pub struct RateLimiterConnector {
    inner: Arc<dyn DataProvider>,
    buckets: Mutex<Buckets>,
    /// Maximum time to wait for the minute bucket to refill before giving up.
    max_wait: Duration,
}

impl RateLimiterConnector {
    #[must_use]
    pub fn new(inner: Arc<dyn DataProvider>, rate_per_minute: u64, rate_per_day: u64) -> Self {
        Self {
            inner,
            buckets: Mutex::new(Buckets {
                per_minute: Bucket::new(rate_per_minute, Duration::from_secs(60)),
                per_day: Bucket::new(rate_per_day, Duration::from_secs(86_400)),
            }),
            max_wait: Duration::from_secs(60),
        }
    }

    #[must_use]
    pub fn inner(&self) -> &Arc<dyn DataProvider> {
        &self.inner
    }

    /// Acquire one unit from both buckets, waiting out a minute-bucket
    /// refill if needed. Fails immediately if the day bucket is exhausted.
    ///
    /// # Errors
    /// Returns `PipelineError::RateExceeded` when the day bucket is empty, or
    /// when the minute bucket does not refill within `max_wait`.
    pub async fn acquire(&self) -> Result<(), PipelineError> {
        loop {
            let wait = {
                let mut b = self.buckets.lock().expect("mutex poisoned");
                let now = Instant::now();
                b.per_minute.reset_if_elapsed(now);
                b.per_day.reset_if_elapsed(now);

                if b.per_day.remaining() == 0 {
                    let retry_after_ms =
                        u64::try_from(b.per_day.reset_in(now).as_millis()).unwrap_or(u64::MAX);
                    return Err(PipelineError::RateExceeded {
                        provider: self.inner.name().to_string(),
                        retry_after_ms,
                    });
                }

                if b.per_minute.remaining() == 0 {
                    Some(b.per_minute.reset_in(now))
                } else {
                    b.per_minute.made += 1;
                    b.per_day.made += 1;
                    None
                }
            };

            match wait {
                None => return Ok(()),
                Some(delay) if delay <= self.max_wait => {
                    tokio::time::sleep(delay).await;
                }
                Some(delay) => {
                    return Err(PipelineError::RateExceeded {
                        provider: self.inner.name().to_string(),
                        retry_after_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    });
                }
            }
        }
    }

    /// Calls remaining in the current day window.
    #[must_use]
    pub fn remaining_daily(&self) -> u64 {
        let mut b = self.buckets.lock().expect("mutex poisoned");
        b.per_day.reset_if_elapsed(Instant::now());
        b.per_day.remaining()
    }
}

#[async_trait]
impl DataProvider for RateLimiterConnector {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    ticker_core::provider_accessors!(inner);
}

#[async_trait]
impl QuoteBatchProvider for RateLimiterConnector {
    async fn quote_batch(
        &self,
        req: QuoteBatchRequest,
    ) -> Result<QuoteBatchResponse, PipelineError> {
        self.acquire().await?;
        let inner = self
            .inner
            .as_quote_batch_provider()
            .ok_or_else(|| PipelineError::unsupported("quote_batch"))?;
        inner.quote_batch(req).await
    }
}

#[async_trait]
impl HistoricalRangeProvider for RateLimiterConnector {
    async fn historical_range(
        &self,
        req: HistoricalRangeRequest,
    ) -> Result<HistoricalRangeResponse, PipelineError> {
        self.acquire().await?;
        let inner = self
            .inner
            .as_historical_range_provider()
            .ok_or_else(|| PipelineError::unsupported("historical_range"))?;
        inner.historical_range(req).await
    }
}

#[async_trait]
impl FundamentalsProvider for RateLimiterConnector {
    async fn fundamentals(
        &self,
        req: FundamentalsRequest,
    ) -> Result<FundamentalsResponse, PipelineError> {
        self.acquire().await?;
        let inner = self
            .inner
            .as_fundamentals_provider()
            .ok_or_else(|| PipelineError::unsupported("fundamentals"))?;
        inner.fundamentals(req).await
    }
}

#[async_trait]
impl EarningsCalendarProvider for RateLimiterConnector {
    async fn earnings_calendar(
        &self,
        req: EarningsCalendarRequest,
    ) -> Result<EarningsCalendarResponse, PipelineError> {
        self.acquire().await?;
        let inner = self
            .inner
            .as_earnings_calendar_provider()
            .ok_or_else(|| PipelineError::unsupported("earnings_calendar"))?;
        inner.earnings_calendar(req).await
    }
}

#[async_trait]
impl AnalystRecommendationsProvider for RateLimiterConnector {
    async fn analyst_recommendations(
        &self,
        req: AnalystRecommendationsRequest,
    ) -> Result<AnalystRecommendationsResponse, PipelineError> {
        self.acquire().await?;
        let inner = self
            .inner
            .as_analyst_recommendations_provider()
            .ok_or_else(|| PipelineError::unsupported("analyst_recommendations"))?;
        inner.analyst_recommendations(req).await
    }
}

/// Middleware config for constructing a [`RateLimiterConnector`].
pub struct RateLimiterMiddleware {
    pub rate_per_minute: u64,
    pub rate_per_day: u64,
}

impl RateLimiterMiddleware {
    #[must_use]
    pub const fn new(rate_per_minute: u64, rate_per_day: u64) -> Self {
        Self {
            rate_per_minute,
            rate_per_day,
        }
    }
}

impl Middleware for RateLimiterMiddleware {
    fn apply(self: Box<Self>, inner: Arc<dyn DataProvider>) -> Arc<dyn DataProvider> {
        Arc::new(RateLimiterConnector::new(
            inner,
            self.rate_per_minute,
            self.rate_per_day,
        ))
    }

    fn name(&self) -> &'static str {
        "RateLimiterConnector"
    }

    fn config_json(&self) -> serde_json::Value {
        serde_json::json!({
            "rate_per_minute": self.rate_per_minute,
            "rate_per_day": self.rate_per_day,
        })
    }

    fn validate(&self, _ctx: &ValidationContext<'_>) -> Result<(), PipelineError> {
        Ok(())
    }
}
