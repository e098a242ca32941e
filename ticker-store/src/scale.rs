//! Fixed-point conversion between `Decimal` domain values and the ×100
//! scaled integers the schema stores (spec.md §6: "Indicator columns are
//! stored as INT (price × 100)"). Rounding is half-to-even, matching the
//! convention spec.md §4.2 states for callers scaling floats before a write.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use ticker_core::PipelineError;

const SCALE: i64 = 100;

/// Scale a `Decimal` by 100, rounding half-to-even, and narrow to the `i32`
/// column width the schema uses for prices and indicators.
pub fn to_scaled(value: Decimal) -> Result<i32, PipelineError> {
    let scaled = (value * Decimal::from(SCALE)).round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven);
    let as_i64 = scaled.to_i64().ok_or_else(|| PipelineError::Data(format!("value {value} does not fit i64 after scaling")))?;
    i32::try_from(as_i64).map_err(|_| PipelineError::Data(format!("scaled value {as_i64} overflows i32 column")))
}

pub fn to_scaled_opt(value: Option<Decimal>) -> Result<Option<i32>, PipelineError> {
    value.map(to_scaled).transpose()
}

/// Inverse of [`to_scaled`]: divide an `i32` column value back down to a
/// domain `Decimal`.
#[must_use]
pub fn from_scaled(value: i32) -> Decimal {
    Decimal::from(value) / Decimal::from(SCALE)
}

#[must_use]
pub fn from_scaled_opt(value: Option<i32>) -> Option<Decimal> {
    value.map(from_scaled)
}

/// Same as [`to_scaled`] but widened to `i64` for the OBV column, whose
/// cumulative volume magnitude can exceed `i32`.
pub fn to_scaled_wide(value: Decimal) -> Result<i64, PipelineError> {
    let scaled = (value * Decimal::from(SCALE)).round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven);
    scaled.to_i64().ok_or_else(|| PipelineError::Data(format!("value {value} does not fit i64 after scaling")))
}

pub fn to_scaled_wide_opt(value: Option<Decimal>) -> Result<Option<i64>, PipelineError> {
    value.map(to_scaled_wide).transpose()
}

#[must_use]
pub fn from_scaled_wide(value: i64) -> Decimal {
    Decimal::from(value) / Decimal::from(SCALE)
}

#[must_use]
pub fn from_scaled_wide_opt(value: Option<i64>) -> Option<Decimal> {
    value.map(from_scaled_wide)
}
