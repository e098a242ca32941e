//! Piecewise-linear ratio-to-score thresholds (spec.md §4.6: "each component
//! mapped from the ratio vector to a 0-100 score by piecewise-linear
//! thresholds (per-industry table; defaults apply when industry benchmarks
//! are unavailable)"). DESIGN.md Open Question 1: this workspace ships one
//! default table, plus an optional caller-supplied per-industry override —
//! sector-level benchmarking is not built, since spec.md does not specify
//! its construction.

use std::collections::HashMap;

use rust_decimal::Decimal;

/// A single ratio's scoring band: `bad` maps to score 0, `good` maps to
/// score 100, linearly interpolated and clamped in between. `higher_is_better
/// = false` inverts the direction (e.g. pe, debt_to_equity).
#[derive(Debug, Clone, Copy)]
pub struct RatioThreshold {
    pub bad: Decimal,
    pub good: Decimal,
    pub higher_is_better: bool,
}

impl RatioThreshold {
    #[must_use]
    pub fn score(self, value: Decimal) -> Decimal {
        let (lo, hi) = if self.higher_is_better {
            (self.bad, self.good)
        } else {
            (self.good, self.bad)
        };
        if lo == hi {
            return Decimal::from(50u32);
        }
        let clamped = value.max(lo.min(hi)).min(lo.max(hi));
        let fraction = (clamped - lo) / (hi - lo);
        let normalized = if self.higher_is_better { fraction } else { Decimal::ONE - fraction };
        (normalized * Decimal::from(100u32)).max(Decimal::ZERO).min(Decimal::from(100u32))
    }
}

/// Maps ratio field names to their scoring thresholds.
pub type ThresholdTable = HashMap<&'static str, RatioThreshold>;

fn t(bad: i64, good: i64, higher_is_better: bool) -> RatioThreshold {
    RatioThreshold {
        bad: Decimal::from(bad),
        good: Decimal::from(good),
        higher_is_better,
    }
}

/// Default threshold table, used when no industry-specific table is supplied.
#[must_use]
pub fn default_table() -> ThresholdTable {
    HashMap::from([
        ("pe", t(40, 10, false)),
        ("pb", t(6, 1, false)),
        ("ps", t(10, 1, false)),
        ("ev_ebitda", t(25, 6, false)),
        ("peg", t(3, 1, false)),
        ("roe", t(0, 25, true)),
        ("roa", t(0, 15, true)),
        ("roic", t(0, 15, true)),
        ("gross_margin", t(0, 1, true)),
        ("operating_margin", t(0, 1, true)),
        ("net_margin", t(0, 1, true)),
        ("debt_to_equity", t(3, 0, false)),
        ("altman_z_score", t(1, 3, true)),
        ("asset_turnover", t(0, 2, true)),
        ("revenue_growth_yoy", t(0, 1, true)),
        ("earnings_growth_yoy", t(0, 1, true)),
        ("fcf_growth_yoy", t(0, 1, true)),
        ("fcf_to_net_income", t(0, 2, true)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn higher_is_better_scores_monotonically() {
        let threshold = t(0, 25, true);
        assert_eq!(threshold.score(dec!(0)), dec!(0));
        assert_eq!(threshold.score(dec!(25)), dec!(100));
        assert_eq!(threshold.score(dec!(12.5)), dec!(50));
    }

    #[test]
    fn lower_is_better_inverts_direction() {
        let threshold = t(40, 10, false);
        assert_eq!(threshold.score(dec!(40)), dec!(0));
        assert_eq!(threshold.score(dec!(10)), dec!(100));
    }

    #[test]
    fn out_of_range_values_clamp() {
        let threshold = t(0, 25, true);
        assert_eq!(threshold.score(dec!(-5)), dec!(0));
        assert_eq!(threshold.score(dec!(100)), dec!(100));
    }
}
