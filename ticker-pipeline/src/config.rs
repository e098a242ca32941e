//! TOML config loading for `PipelineConfig` (spec.md §6.1), following
//! `borsa_types::BorsaConfig`'s load-then-validate style.

use std::path::Path;

use ticker_core::PipelineError;
use ticker_types::PipelineConfig;

/// Load a `PipelineConfig` from a TOML file. Every field is required; a
/// missing key surfaces as `PipelineError::InvalidArg` rather than silently
/// falling back to `PipelineConfig::default()`.
pub fn load(path: impl AsRef<Path>) -> Result<PipelineConfig, PipelineError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .map_err(|e| PipelineError::InvalidArg(format!("reading {}: {e}", path.display())))?;
    parse(&raw)
}

fn parse(raw: &str) -> Result<PipelineConfig, PipelineError> {
    toml::from_str(raw).map_err(|e| PipelineError::InvalidArg(format!("invalid pipeline config: {e}")))
}
