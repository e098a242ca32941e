//! Investor Score profiles: Conservative, GARP, Deep Value (spec.md §4.6).

use chrono::NaiveDate;
use rust_decimal::Decimal;
use ticker_types::{InvestorScores, Ratios, RiskLevel};

use crate::ratios::{altman_zone, AltmanZone};
use crate::thresholds::ThresholdTable;

/// The six scoring components, each a 0-100 value when its backing ratios
/// were available.
#[derive(Debug, Clone, Copy, Default)]
struct Components {
    valuation: Option<Decimal>,
    quality: Option<Decimal>,
    financial_health: Option<Decimal>,
    profitability: Option<Decimal>,
    growth: Option<Decimal>,
    management: Option<Decimal>,
}

/// Weights for one investor profile, in the same component order as
/// `Components`.
#[derive(Debug, Clone, Copy)]
struct Weights {
    valuation: Decimal,
    quality: Decimal,
    financial_health: Decimal,
    profitability: Decimal,
    growth: Decimal,
    management: Decimal,
}

fn w(valuation: i64, quality: i64, financial_health: i64, profitability: i64, growth: i64, management: i64) -> Weights {
    Weights {
        valuation: Decimal::new(valuation, 2),
        quality: Decimal::new(quality, 2),
        financial_health: Decimal::new(financial_health, 2),
        profitability: Decimal::new(profitability, 2),
        growth: Decimal::new(growth, 2),
        management: Decimal::new(management, 2),
    }
}

fn conservative_weights() -> Weights {
    w(25, 20, 30, 15, 5, 5)
}

fn garp_weights() -> Weights {
    w(25, 20, 10, 15, 25, 5)
}

fn deep_value_weights() -> Weights {
    w(40, 15, 25, 10, 5, 5)
}

fn mean(values: &[Option<Decimal>]) -> Option<Decimal> {
    let present: Vec<Decimal> = values.iter().filter_map(|v| *v).collect();
    if present.is_empty() {
        None
    } else {
        Some(present.iter().sum::<Decimal>() / Decimal::from(present.len() as u64))
    }
}

fn score_component(table: &ThresholdTable, fields: &[(&str, Option<Decimal>)]) -> Option<Decimal> {
    let scored: Vec<Option<Decimal>> = fields
        .iter()
        .map(|(name, value)| {
            let threshold = table.get(name)?;
            value.map(|v| threshold.score(v))
        })
        .collect();
    mean(&scored)
}

fn components(ratios: &Ratios, table: &ThresholdTable) -> Components {
    Components {
        valuation: score_component(
            table,
            &[
                ("pe", ratios.pe),
                ("pb", ratios.pb),
                ("ps", ratios.ps),
                ("ev_ebitda", ratios.ev_ebitda),
                ("peg", ratios.peg),
            ],
        ),
        quality: score_component(
            table,
            &[
                ("fcf_to_net_income", ratios.fcf_to_net_income),
                ("gross_margin", ratios.gross_margin),
            ],
        ),
        financial_health: score_component(
            table,
            &[
                ("debt_to_equity", ratios.debt_to_equity),
                ("altman_z_score", ratios.altman_z_score),
            ],
        ),
        profitability: score_component(
            table,
            &[
                ("roe", ratios.roe),
                ("roa", ratios.roa),
                ("roic", ratios.roic),
                ("net_margin", ratios.net_margin),
            ],
        ),
        growth: score_component(
            table,
            &[
                ("revenue_growth_yoy", ratios.revenue_growth_yoy),
                ("earnings_growth_yoy", ratios.earnings_growth_yoy),
                ("fcf_growth_yoy", ratios.fcf_growth_yoy),
            ],
        ),
        // Management has no dedicated ratio group in spec.md §4.6; used as an
        // operational-efficiency proxy from ROIC and asset turnover.
        management: score_component(table, &[("roic", ratios.roic), ("asset_turnover", ratios.asset_turnover)]),
    }
}

/// Weighted sum with proportional redistribution among present components
/// (spec.md §4.6: "Missing components redistribute proportionally among
/// present components (renormalise weights to sum to 1)").
fn weighted_score(components: Components, weights: Weights) -> Option<Decimal> {
    let pairs = [
        (components.valuation, weights.valuation),
        (components.quality, weights.quality),
        (components.financial_health, weights.financial_health),
        (components.profitability, weights.profitability),
        (components.growth, weights.growth),
        (components.management, weights.management),
    ];
    let present: Vec<(Decimal, Decimal)> = pairs
        .into_iter()
        .filter_map(|(value, weight)| value.map(|v| (v, weight)))
        .collect();
    if present.is_empty() {
        return None;
    }
    let weight_sum: Decimal = present.iter().map(|(_, w)| *w).sum();
    if weight_sum == Decimal::ZERO {
        return None;
    }
    Some(present.iter().map(|(v, w)| v * w).sum::<Decimal>() / weight_sum)
}

/// Risk level derived from Altman Z (spec.md §4.6: "Altman Z < 1.8 ->
/// high_risk"); `Gray` zone maps to `Warning`, `Safe` to `Normal`. Missing Z
/// score is treated as `Caution` (not enough signal to call it safe).
#[must_use]
fn risk_level(altman_z: Option<Decimal>) -> (RiskLevel, Vec<String>) {
    match altman_z {
        None => (RiskLevel::Caution, vec!["no Altman Z score available".to_string()]),
        Some(z) => match altman_zone(z) {
            AltmanZone::Safe => (RiskLevel::Normal, Vec::new()),
            AltmanZone::Gray => (RiskLevel::Warning, vec!["Altman Z in gray zone".to_string()]),
            AltmanZone::Distress => (RiskLevel::HighRisk, vec!["Altman Z below distress threshold".to_string()]),
        },
    }
}

/// Compute the three investor-score profiles for one ticker.
#[must_use]
pub fn calculate(
    ticker: &str,
    calculation_date: NaiveDate,
    ratios: &Ratios,
    table: &ThresholdTable,
) -> InvestorScores {
    let comp = components(ratios, table);
    let (risk, risk_factors) = risk_level(ratios.altman_z_score);
    let multiplier = risk.multiplier();

    let conservative = weighted_score(comp, conservative_weights()).map(|s| s * multiplier);
    let garp = weighted_score(comp, garp_weights()).map(|s| s * multiplier);
    let deep_value = weighted_score(comp, deep_value_weights()).map(|s| s * multiplier);

    InvestorScores {
        ticker: ticker.to_string(),
        calculation_date,
        conservative_score: conservative,
        garp_score: garp,
        deep_value_score: deep_value,
        valuation_component: comp.valuation,
        quality_component: comp.quality,
        financial_health_component: comp.financial_health,
        profitability_component: comp.profitability,
        growth_component: comp.growth,
        management_component: comp.management,
        risk_level: risk,
        risk_factors,
        explanation: ratios.explanations.join("; "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thresholds::default_table;
    use rust_decimal_macros::dec;

    fn sample_ratios() -> Ratios {
        Ratios {
            ticker: "AAA".to_string(),
            calculation_date: NaiveDate::from_ymd_opt(2026, 7, 24).expect("valid date"),
            pe: Some(dec!(15)),
            pb: Some(dec!(2)),
            ps: Some(dec!(3)),
            ev_ebitda: Some(dec!(10)),
            peg: None,
            roe: Some(dec!(0.18)),
            roa: Some(dec!(0.10)),
            roic: Some(dec!(0.12)),
            gross_margin: Some(dec!(0.5)),
            operating_margin: Some(dec!(0.2)),
            net_margin: Some(dec!(0.1)),
            debt_to_equity: Some(dec!(0.5)),
            current_ratio: None,
            quick_ratio: None,
            interest_coverage: None,
            altman_z_score: Some(dec!(3.2)),
            asset_turnover: Some(dec!(0.8)),
            inventory_turnover: None,
            receivables_turnover: None,
            revenue_growth_yoy: Some(dec!(0.08)),
            earnings_growth_yoy: Some(dec!(0.1)),
            fcf_growth_yoy: Some(dec!(0.05)),
            fcf_to_net_income: Some(dec!(1.1)),
            cash_conversion_cycle: None,
            market_cap: Some(dec!(4000)),
            enterprise_value: Some(dec!(4500)),
            graham_number: Some(dec!(25)),
            explanations: vec!["N/A — current assets/liabilities not in fundamentals schema".to_string()],
        }
    }

    #[test]
    fn all_three_profiles_compute_when_components_present() {
        let table = default_table();
        let ratios = sample_ratios();
        let scores = calculate("AAA", ratios.calculation_date, &ratios, &table);
        assert!(scores.conservative_score.is_some());
        assert!(scores.garp_score.is_some());
        assert!(scores.deep_value_score.is_some());
        assert_eq!(scores.risk_level, RiskLevel::Normal);
    }

    #[test]
    fn safe_altman_z_yields_normal_risk_with_no_dampening() {
        let table = default_table();
        let ratios = sample_ratios();
        let scores = calculate("AAA", ratios.calculation_date, &ratios, &table);
        assert_eq!(scores.risk_level, RiskLevel::Normal);
        assert_eq!(RiskLevel::Normal.multiplier(), Decimal::ONE);
    }

    #[test]
    fn distressed_altman_z_dampens_score_and_flags_high_risk() {
        let table = default_table();
        let mut ratios = sample_ratios();
        ratios.altman_z_score = Some(dec!(1.0));
        let scores = calculate("AAA", ratios.calculation_date, &ratios, &table);
        assert_eq!(scores.risk_level, RiskLevel::HighRisk);
        assert!(!scores.risk_factors.is_empty());
    }

    #[test]
    fn missing_growth_component_redistributes_weight() {
        let table = default_table();
        let mut ratios = sample_ratios();
        ratios.revenue_growth_yoy = None;
        ratios.earnings_growth_yoy = None;
        ratios.fcf_growth_yoy = None;
        let scores = calculate("AAA", ratios.calculation_date, &ratios, &table);
        assert!(scores.growth_component.is_none());
        // Score is still computed from the remaining five components.
        assert!(scores.garp_score.is_some());
    }

    #[test]
    fn no_ratios_available_yields_no_scores() {
        let table = default_table();
        let ratios = Ratios {
            ticker: "AAA".to_string(),
            calculation_date: NaiveDate::from_ymd_opt(2026, 7, 24).expect("valid date"),
            ..Ratios::default()
        };
        let scores = calculate("AAA", ratios.calculation_date, &ratios, &table);
        assert!(scores.conservative_score.is_none());
        assert!(scores.garp_score.is_none());
        assert!(scores.deep_value_score.is_none());
    }
}
