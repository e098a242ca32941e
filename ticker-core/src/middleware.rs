//! Middleware trait for wrapping `DataProvider` implementations, plus the
//! call-context types middleware use to distinguish user-triggered calls from
//! the Orchestrator's own internal fan-out (e.g. the Phase 6 delisting
//! probe, which must not be blocked by a blacklist tripped by Phase 1).

use std::any::{Any, TypeId};
use std::sync::Arc;

use ticker_types::Capability;

use crate::connector::DataProvider;
use crate::error::PipelineError;

/// Who triggered a provider call, for middleware that special-cases internal
/// orchestrator-driven probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOrigin {
    /// A normal phase-driven fetch against the ticker's primary provider chain.
    External,
    /// An orchestrator-internal probe (e.g. Phase 6's delisting confirmation)
    /// that should bypass ordinary blacklist/circuit-breaker gating.
    Internal { reason: &'static str },
}

/// Context passed to `Middleware::pre_call`/`map_error` for one provider call.
#[derive(Debug, Clone, Copy)]
pub struct CallContext {
    capability: Capability,
    origin: CallOrigin,
}

impl CallContext {
    #[must_use]
    pub const fn new(capability: Capability, origin: CallOrigin) -> Self {
        Self { capability, origin }
    }

    #[must_use]
    pub const fn external(capability: Capability) -> Self {
        Self::new(capability, CallOrigin::External)
    }

    #[must_use]
    pub const fn capability(&self) -> Capability {
        self.capability
    }

    #[must_use]
    pub const fn origin(&self) -> CallOrigin {
        self.origin
    }
}

/// Internal descriptor for tracking middleware in the builder.
pub struct MiddlewareDescriptor {
    middleware: Box<dyn Middleware>,
    type_id: TypeId,
    name: &'static str,
}

impl MiddlewareDescriptor {
    pub fn new<M: Middleware + 'static>(middleware: M) -> Self {
        let name = middleware.name();
        Self {
            middleware: Box::new(middleware),
            type_id: TypeId::of::<M>(),
            name,
        }
    }

    #[must_use]
    pub const fn type_id(&self) -> TypeId {
        self.type_id
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn middleware(&self) -> &dyn Middleware {
        &*self.middleware
    }

    #[must_use]
    pub fn into_middleware(self) -> Box<dyn Middleware> {
        self.middleware
    }
}

/// Validation context passed to middleware during stack validation.
pub struct ValidationContext<'a> {
    stack: &'a [MiddlewareDescriptor],
    current_index: usize,
}

impl<'a> ValidationContext<'a> {
    #[must_use]
    pub const fn new(stack: &'a [MiddlewareDescriptor], current_index: usize) -> Self {
        Self {
            stack,
            current_index,
        }
    }

    #[must_use]
    pub fn has_middleware(&self, type_id: TypeId) -> bool {
        self.stack.iter().any(|m| m.type_id() == type_id)
    }

    #[must_use]
    pub fn has_middleware_outer(&self, type_id: TypeId) -> bool {
        self.stack[..self.current_index]
            .iter()
            .any(|m| m.type_id() == type_id)
    }
}

/// Trait implemented by provider middleware layers (rate limiting, circuit
/// breaking). A middleware wraps an inner `DataProvider` and can gate a call
/// before it happens (`pre_call`) and remap its error after it happens
/// (`map_error`).
#[async_trait::async_trait]
pub trait Middleware: Send + Sync {
    /// Apply this middleware to wrap an inner provider and return the wrapped provider.
    fn apply(self: Box<Self>, inner: Arc<dyn DataProvider>) -> Arc<dyn DataProvider>;

    /// Human-readable middleware name for introspection/logging.
    fn name(&self) -> &'static str;

    /// Opaque configuration snapshot for serialization/inspection.
    fn config_json(&self) -> serde_json::Value;

    /// Validate this middleware's position and dependencies in the stack.
    ///
    /// # Errors
    /// Returns an error if validation fails.
    fn validate(&self, _ctx: &ValidationContext<'_>) -> Result<(), PipelineError> {
        Ok(())
    }

    /// Called before the wrapped call executes. Return `Err` to short-circuit
    /// without consuming provider budget (e.g. circuit open).
    ///
    /// # Errors
    /// Returns an error when the call should be gated.
    async fn pre_call(&self, _ctx: &CallContext) -> Result<(), PipelineError> {
        Ok(())
    }

    /// Remap an error returned by the inner provider, and update any internal
    /// state that depends on the call's outcome (e.g. circuit breaker
    /// failure counters).
    fn map_error(&self, err: PipelineError, _ctx: &CallContext) -> PipelineError {
        err
    }

    /// Record a successful call, for middleware that tracks consecutive
    /// failures (e.g. the circuit breaker's half-open -> closed transition).
    fn on_success(&self, _ctx: &CallContext) {}

    fn as_any(&self) -> Option<&dyn Any> {
        None
    }
}
