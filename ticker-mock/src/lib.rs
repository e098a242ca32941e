//! Mock connector for CI-safe pipeline tests. Provides deterministic data
//! from static fixtures, plus sentinel symbols (`FAIL`, `TIMEOUT`) for
//! forcing specific provider error kinds in tests, mirroring
//! `borsa-mock::MockConnector::maybe_fail_or_timeout`.

pub mod fixtures;

use std::collections::HashMap;

use async_trait::async_trait;
use ticker_core::connector::{
    AnalystRecommendationsProvider, EarningsCalendarProvider, FundamentalsProvider,
    HistoricalRangeProvider, QuoteBatchProvider,
};
use ticker_core::{DataProvider, PipelineError};
use ticker_types::{
    AnalystRecommendationsRequest, AnalystRecommendationsResponse, EarningsCalendarRequest,
    EarningsCalendarResponse, FundamentalsRequest, FundamentalsResponse, HistoricalRangeRequest,
    HistoricalRangeResponse, QuoteBatchRequest, QuoteBatchResponse,
};

/// Mock provider serving deterministic fixture data for pipeline tests.
pub struct MockProvider {
    name: &'static str,
}

impl MockProvider {
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self { name }
    }

    async fn maybe_fail_or_timeout(&self, symbol: &str, capability: &'static str) -> Result<(), PipelineError> {
        match symbol {
            "FAIL" => Err(PipelineError::provider(
                self.name,
                format!("forced failure: {capability}"),
            )),
            "TIMEOUT" => {
                tokio::time::sleep(std::time::Duration::from_secs(2)).await;
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl DataProvider for MockProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn as_quote_batch_provider(&self) -> Option<&dyn QuoteBatchProvider> {
        Some(self as &dyn QuoteBatchProvider)
    }
    fn as_historical_range_provider(&self) -> Option<&dyn HistoricalRangeProvider> {
        Some(self as &dyn HistoricalRangeProvider)
    }
    fn as_fundamentals_provider(&self) -> Option<&dyn FundamentalsProvider> {
        Some(self as &dyn FundamentalsProvider)
    }
    fn as_earnings_calendar_provider(&self) -> Option<&dyn EarningsCalendarProvider> {
        Some(self as &dyn EarningsCalendarProvider)
    }
    fn as_analyst_recommendations_provider(&self) -> Option<&dyn AnalystRecommendationsProvider> {
        Some(self as &dyn AnalystRecommendationsProvider)
    }
}

#[async_trait]
impl QuoteBatchProvider for MockProvider {
    async fn quote_batch(
        &self,
        req: QuoteBatchRequest,
    ) -> Result<QuoteBatchResponse, PipelineError> {
        // A single-symbol batch targeting a known-delisted ticker is treated
        // as an explicit probe (Phase 6) and surfaces `TickerUnknown`.
        if req.symbols.len() == 1 && fixtures::is_delisted(&req.symbols[0]) {
            return Err(PipelineError::TickerUnknown {
                ticker: req.symbols[0].clone(),
            });
        }

        let mut bars = HashMap::new();
        for symbol in &req.symbols {
            self.maybe_fail_or_timeout(symbol, "quote_batch").await?;
            if fixtures::is_delisted(symbol) {
                // Omitted from the map: Batch Price Processor records "missing".
                continue;
            }
            if let Some(series) = fixtures::bars_for(symbol) {
                if let Some(latest) = series.into_iter().next_back() {
                    bars.insert(symbol.clone(), latest);
                }
            }
        }
        Ok(QuoteBatchResponse { bars })
    }
}

#[async_trait]
impl HistoricalRangeProvider for MockProvider {
    async fn historical_range(
        &self,
        req: HistoricalRangeRequest,
    ) -> Result<HistoricalRangeResponse, PipelineError> {
        self.maybe_fail_or_timeout(&req.symbol, "historical_range")
            .await?;
        if fixtures::is_delisted(&req.symbol) {
            return Err(PipelineError::TickerUnknown {
                ticker: req.symbol.clone(),
            });
        }
        let bars = fixtures::bars_for(&req.symbol)
            .map(|series| {
                series
                    .into_iter()
                    .filter(|b| b.date >= req.from && b.date <= req.to)
                    .collect()
            })
            .unwrap_or_default();
        Ok(HistoricalRangeResponse { bars })
    }
}

#[async_trait]
impl FundamentalsProvider for MockProvider {
    async fn fundamentals(
        &self,
        req: FundamentalsRequest,
    ) -> Result<FundamentalsResponse, PipelineError> {
        self.maybe_fail_or_timeout(&req.symbol, "fundamentals")
            .await?;
        let statements = fixtures::fundamentals_for(&req.symbol).unwrap_or_default();
        Ok(FundamentalsResponse { statements })
    }
}

#[async_trait]
impl EarningsCalendarProvider for MockProvider {
    async fn earnings_calendar(
        &self,
        req: EarningsCalendarRequest,
    ) -> Result<EarningsCalendarResponse, PipelineError> {
        let rows = ["EARN"]
            .into_iter()
            .filter_map(fixtures::earnings_calendar_for)
            .filter(|row| row.earnings_date >= req.from && row.earnings_date <= req.to)
            .collect();
        Ok(EarningsCalendarResponse { rows })
    }
}

#[async_trait]
impl AnalystRecommendationsProvider for MockProvider {
    async fn analyst_recommendations(
        &self,
        _req: AnalystRecommendationsRequest,
    ) -> Result<AnalystRecommendationsResponse, PipelineError> {
        Ok(AnalystRecommendationsResponse::default())
    }
}
