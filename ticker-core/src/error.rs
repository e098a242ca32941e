use thiserror::Error;

/// Unified error type for the ticker pipeline workspace.
///
/// Variants map directly onto the error-kind/locus/policy table in spec.md
/// §7: `Transient`/`RateExceeded`/`CircuitOpen` drive router retry and
/// fallback, `TickerUnknown` routes a ticker to the Phase 6 delisting probe,
/// `Data`/`InvalidArg` cause a per-ticker drop without aborting the batch,
/// and `StoreUnavailable` is the only variant that aborts a whole run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The requested capability is not implemented by the target provider.
    #[error("unsupported capability: {capability}")]
    Unsupported { capability: &'static str },

    /// Issues with the returned or expected data (missing fields, schema
    /// mismatch, unparseable payload).
    #[error("data issue: {0}")]
    Data(String),

    /// Invalid input argument.
    #[error("invalid argument: {0}")]
    InvalidArg(String),

    /// An individual provider call failed for a reason that is not one of
    /// the other structured error kinds below.
    #[error("{provider} failed: {msg}")]
    Provider { provider: String, msg: String },

    /// A resource or symbol could not be found.
    #[error("not found: {what}")]
    NotFound { what: String },

    /// All selected providers failed for this capability; carries the
    /// individual per-provider failures in priority order.
    #[error("all providers failed: {0:?}")]
    AllProvidersFailed(Vec<PipelineError>),

    /// All attempted providers timed out for the requested capability.
    #[error("all providers timed out: {capability}")]
    AllProvidersTimedOut { capability: &'static str },

    /// An individual provider call exceeded the per-call timeout.
    #[error("provider timed out: {capability} via {provider}")]
    ProviderTimeout {
        provider: String,
        capability: &'static str,
    },

    /// The provider's rate-limit bucket is exhausted.
    #[error("rate exceeded for {provider}, retry after {retry_after_ms}ms")]
    RateExceeded { provider: String, retry_after_ms: u64 },

    /// The circuit breaker for this provider is open.
    #[error("circuit open for {provider}")]
    CircuitOpen { provider: String },

    /// A transient/network/5xx error; eligible for retry with backoff.
    #[error("transient error from {provider}: {msg}")]
    Transient { provider: String, msg: String },

    /// The ticker is unknown to the provider, i.e. likely delisted.
    #[error("ticker unknown: {ticker}")]
    TickerUnknown { ticker: String },

    /// The Store is unreachable. Fatal: aborts the whole run.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// The global run deadline was reached mid-phase.
    #[error("run deadline reached")]
    Deadline,
}

impl PipelineError {
    #[must_use]
    pub const fn unsupported(capability: &'static str) -> Self {
        Self::Unsupported { capability }
    }

    pub fn provider(provider: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            msg: msg.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn provider_timeout(provider: impl Into<String>, capability: &'static str) -> Self {
        Self::ProviderTimeout {
            provider: provider.into(),
            capability,
        }
    }

    #[must_use]
    pub const fn request_timeout_capability(capability: &'static str) -> Self {
        Self::AllProvidersTimedOut { capability }
    }

    /// Whether this error kind should trigger the router's retry-with-backoff
    /// path (spec.md §4.1) rather than immediate fallback to the next provider.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

