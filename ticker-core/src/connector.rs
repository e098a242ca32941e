//! Provider role traits and the `DataProvider` master trait.
//!
//! Each capability gets one focused async trait. `DataProvider` is the trait
//! implemented by provider crates and middleware wrappers alike; its
//! `as_*_provider()` accessors default to `None` so a provider only needs to
//! implement the role traits it actually supports (spec.md §4.1 capability
//! matrix).

use async_trait::async_trait;

use ticker_types::{
    AnalystRecommendationsRequest, AnalystRecommendationsResponse, EarningsCalendarRequest,
    EarningsCalendarResponse, FundamentalsRequest, FundamentalsResponse, HistoricalRangeRequest,
    HistoricalRangeResponse, QuoteBatchRequest, QuoteBatchResponse,
};

use crate::error::PipelineError;

/// Focused role trait for providers serving batched same-day quotes.
#[async_trait]
pub trait QuoteBatchProvider: Send + Sync {
    async fn quote_batch(
        &self,
        req: QuoteBatchRequest,
    ) -> Result<QuoteBatchResponse, PipelineError>;
}

/// Focused role trait for providers serving historical OHLCV ranges.
#[async_trait]
pub trait HistoricalRangeProvider: Send + Sync {
    async fn historical_range(
        &self,
        req: HistoricalRangeRequest,
    ) -> Result<HistoricalRangeResponse, PipelineError>;
}

/// Focused role trait for providers serving fundamentals statement packs.
#[async_trait]
pub trait FundamentalsProvider: Send + Sync {
    async fn fundamentals(
        &self,
        req: FundamentalsRequest,
    ) -> Result<FundamentalsResponse, PipelineError>;
}

/// Focused role trait for providers serving an earnings calendar.
#[async_trait]
pub trait EarningsCalendarProvider: Send + Sync {
    async fn earnings_calendar(
        &self,
        req: EarningsCalendarRequest,
    ) -> Result<EarningsCalendarResponse, PipelineError>;
}

/// Focused role trait for providers serving analyst recommendation rows.
///
/// Plumbing only: no Orchestrator phase calls this today (DESIGN.md Open
/// Question 2).
#[async_trait]
pub trait AnalystRecommendationsProvider: Send + Sync {
    async fn analyst_recommendations(
        &self,
        req: AnalystRecommendationsRequest,
    ) -> Result<AnalystRecommendationsResponse, PipelineError>;
}

/// Main provider trait implemented by raw connectors and by middleware
/// wrappers. Exposes capability discovery via `as_*_provider()` accessors
/// that default to `None`.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Stable identifier used in priority lists, quotas, and logs.
    fn name(&self) -> &'static str;

    fn as_quote_batch_provider(&self) -> Option<&dyn QuoteBatchProvider> {
        None
    }
    fn as_historical_range_provider(&self) -> Option<&dyn HistoricalRangeProvider> {
        None
    }
    fn as_fundamentals_provider(&self) -> Option<&dyn FundamentalsProvider> {
        None
    }
    fn as_earnings_calendar_provider(&self) -> Option<&dyn EarningsCalendarProvider> {
        None
    }
    fn as_analyst_recommendations_provider(&self) -> Option<&dyn AnalystRecommendationsProvider> {
        None
    }
}

/// Generate `as_*_provider` accessors for a wrapper that implements
/// `DataProvider` by delegating capability discovery to an inner field.
///
/// Mirrors `borsa_connector_accessors!`, scaled down to this system's five
/// capabilities. Unlike the teacher, this is an ordinary `macro_rules!`
/// rather than a proc-macro, since the capability surface is small enough
/// that a declarative macro is simpler (see DESIGN.md, dropped `borsa-macros`).
#[macro_export]
macro_rules! provider_accessors {
    ($inner:ident) => {
        fn as_quote_batch_provider(&self) -> Option<&dyn $crate::connector::QuoteBatchProvider> {
            if self.$inner.as_quote_batch_provider().is_some() {
                Some(self as &dyn $crate::connector::QuoteBatchProvider)
            } else {
                None
            }
        }
        fn as_historical_range_provider(
            &self,
        ) -> Option<&dyn $crate::connector::HistoricalRangeProvider> {
            if self.$inner.as_historical_range_provider().is_some() {
                Some(self as &dyn $crate::connector::HistoricalRangeProvider)
            } else {
                None
            }
        }
        fn as_fundamentals_provider(&self) -> Option<&dyn $crate::connector::FundamentalsProvider> {
            if self.$inner.as_fundamentals_provider().is_some() {
                Some(self as &dyn $crate::connector::FundamentalsProvider)
            } else {
                None
            }
        }
        fn as_earnings_calendar_provider(
            &self,
        ) -> Option<&dyn $crate::connector::EarningsCalendarProvider> {
            if self.$inner.as_earnings_calendar_provider().is_some() {
                Some(self as &dyn $crate::connector::EarningsCalendarProvider)
            } else {
                None
            }
        }
        fn as_analyst_recommendations_provider(
            &self,
        ) -> Option<&dyn $crate::connector::AnalystRecommendationsProvider> {
            if self.$inner.as_analyst_recommendations_provider().is_some() {
                Some(self as &dyn $crate::connector::AnalystRecommendationsProvider)
            } else {
                None
            }
        }
    };
}

/// Generate pass-through `DataProvider` role-trait impls for a wrapper that
/// delegates every call straight to an inner field without adding behavior.
/// Wrappers that do add behavior (rate limiting, circuit breaking) implement
/// the role traits by hand instead of using this macro.
#[macro_export]
macro_rules! delegate_provider_impls {
    ($wrapper:ty, $inner:ident) => {
        #[async_trait::async_trait]
        impl $crate::connector::QuoteBatchProvider for $wrapper {
            async fn quote_batch(
                &self,
                req: ticker_types::QuoteBatchRequest,
            ) -> Result<ticker_types::QuoteBatchResponse, $crate::error::PipelineError> {
                let inner = self
                    .$inner
                    .as_quote_batch_provider()
                    .ok_or_else(|| $crate::error::PipelineError::unsupported("quote_batch"))?;
                inner.quote_batch(req).await
            }
        }

        #[async_trait::async_trait]
        impl $crate::connector::HistoricalRangeProvider for $wrapper {
            async fn historical_range(
                &self,
                req: ticker_types::HistoricalRangeRequest,
            ) -> Result<ticker_types::HistoricalRangeResponse, $crate::error::PipelineError> {
                let inner = self
                    .$inner
                    .as_historical_range_provider()
                    .ok_or_else(|| $crate::error::PipelineError::unsupported("historical_range"))?;
                inner.historical_range(req).await
            }
        }

        #[async_trait::async_trait]
        impl $crate::connector::FundamentalsProvider for $wrapper {
            async fn fundamentals(
                &self,
                req: ticker_types::FundamentalsRequest,
            ) -> Result<ticker_types::FundamentalsResponse, $crate::error::PipelineError> {
                let inner = self
                    .$inner
                    .as_fundamentals_provider()
                    .ok_or_else(|| $crate::error::PipelineError::unsupported("fundamentals"))?;
                inner.fundamentals(req).await
            }
        }

        #[async_trait::async_trait]
        impl $crate::connector::EarningsCalendarProvider for $wrapper {
            async fn earnings_calendar(
                &self,
                req: ticker_types::EarningsCalendarRequest,
            ) -> Result<ticker_types::EarningsCalendarResponse, $crate::error::PipelineError> {
                let inner = self
                    .$inner
                    .as_earnings_calendar_provider()
                    .ok_or_else(|| $crate::error::PipelineError::unsupported("earnings_calendar"))?;
                inner.earnings_calendar(req).await
            }
        }

        #[async_trait::async_trait]
        impl $crate::connector::AnalystRecommendationsProvider for $wrapper {
            async fn analyst_recommendations(
                &self,
                req: ticker_types::AnalystRecommendationsRequest,
            ) -> Result<ticker_types::AnalystRecommendationsResponse, $crate::error::PipelineError>
            {
                let inner = self.$inner.as_analyst_recommendations_provider().ok_or_else(
                    || $crate::error::PipelineError::unsupported("analyst_recommendations"),
                )?;
                inner.analyst_recommendations(req).await
            }
        }
    };
}
