//! Builder for composing a raw provider with middleware layers.
//!
//! # Middleware Ordering Convention
//!
//! ```text
//! User Request
//!     v
//! CircuitBreaker (checks first: an open breaker must skip the call before
//!                 any rate-limit budget is consumed, per spec.md §4.1)
//!     v
//! RateLimiter (enforces per-minute/per-day quotas)
//!     v
//! Raw provider
//! ```
//!
//! `layers` stores middleware outermost-first for intuitive builder
//! semantics (last added = outermost) but `build()` applies them in reverse
//! to construct the correct nesting, mirroring `ConnectorBuilder`.

use std::sync::Arc;

use ticker_core::middleware::{Middleware, MiddlewareDescriptor, ValidationContext};
use ticker_core::{DataProvider, PipelineError};

use crate::circuit_breaker::CircuitBreakerMiddleware;
use crate::rate_limiter::RateLimiterMiddleware;

pub struct ProviderBuilder {
    raw: Arc<dyn DataProvider>,
    layers: Vec<MiddlewareDescriptor>,
}

impl ProviderBuilder {
    #[must_use]
    pub fn new(raw: Arc<dyn DataProvider>) -> Self {
        Self {
            raw,
            layers: Vec::new(),
        }
    }

    fn enforce_ordering(&mut self) {
        self.layers.sort_by_key(|d| match d.name() {
            "CircuitBreakerConnector" => 0,
            "RateLimiterConnector" => 1,
            _ => 2,
        });
    }

    #[must_use]
    pub fn with_rate_limit(mut self, rate_per_minute: u64, rate_per_day: u64) -> Self {
        self.layers.retain(|d| d.name() != "RateLimiterConnector");
        self.layers.push(MiddlewareDescriptor::new(
            RateLimiterMiddleware::new(rate_per_minute, rate_per_day),
        ));
        self.enforce_ordering();
        self
    }

    #[must_use]
    pub fn with_circuit_breaker(mut self) -> Self {
        self.layers
            .retain(|d| d.name() != "CircuitBreakerConnector");
        self.layers
            .push(MiddlewareDescriptor::new(CircuitBreakerMiddleware::new()));
        self.enforce_ordering();
        self
    }

    /// Validate the middleware stack without building.
    ///
    /// # Errors
    /// Returns an error if any middleware fails validation.
    pub fn validate(&self) -> Result<(), PipelineError> {
        for (idx, desc) in self.layers.iter().enumerate().rev() {
            let ctx = ValidationContext::new(&self.layers, idx);
            desc.middleware().validate(&ctx)?;
        }
        Ok(())
    }

    /// Build the wrapped provider according to the captured stack.
    ///
    /// # Errors
    /// Returns an error if validation fails.
    pub fn build(self) -> Result<Arc<dyn DataProvider>, PipelineError> {
        self.validate()?;
        let mut acc: Arc<dyn DataProvider> = Arc::clone(&self.raw);
        for desc in self.layers.into_iter().rev() {
            acc = desc.into_middleware().apply(acc);
        }
        Ok(acc)
    }
}
