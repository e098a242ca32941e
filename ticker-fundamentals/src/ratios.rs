//! The 27-field Ratio vector (spec.md §4.6).

use chrono::NaiveDate;
use rust_decimal::{Decimal, MathematicalOps as _};
use ticker_types::{Fundamentals, Ratios};

use crate::ttm::TtmFigures;

const PE_CAP: i64 = 999;
const MULTIPLE_CAP: i64 = 50;
const ALTMAN_SAFE: i64 = 299;
const ALTMAN_DISTRESS: i64 = 181;

/// Inputs the Ratio Calculator needs beyond the latest fundamentals row and
/// the TTM aggregate: today's close, shares outstanding (redundant with the
/// fundamentals row but explicit here since it gates `market_cap`), and the
/// same-quarter-prior-year row for YoY growth.
pub struct RatioInputs<'a> {
    pub ticker: &'a str,
    pub calculation_date: NaiveDate,
    pub latest: &'a Fundamentals,
    pub ttm: &'a TtmFigures,
    pub prior_year: Option<&'a Fundamentals>,
    pub close_price: Decimal,
}

/// Compute the full 27-field Ratio vector from `inputs`.
#[must_use]
pub fn calculate(inputs: &RatioInputs<'_>) -> Ratios {
    let mut out = Ratios {
        ticker: inputs.ticker.to_string(),
        calculation_date: inputs.calculation_date,
        ..Ratios::default()
    };
    let mut explain = |msg: String| out.explanations.push(msg);

    let shares = positive(inputs.latest.shares_outstanding);
    let market_cap = match shares {
        Some(shares) => Some(inputs.close_price * shares),
        None => {
            explain("N/A — missing shares outstanding".to_string());
            None
        }
    };
    out.market_cap = market_cap;

    let total_debt = inputs.latest.total_debt.unwrap_or(Decimal::ZERO);
    let cash = inputs.latest.cash.unwrap_or(Decimal::ZERO);
    out.enterprise_value = market_cap.map(|mc| mc + total_debt - cash);

    // Valuation (5)
    out.pe = ratio_capped(
        Some(inputs.close_price),
        positive(inputs.latest.eps_diluted),
        PE_CAP,
        &mut explain,
        "eps_diluted",
    );
    out.pb = ratio(
        Some(inputs.close_price),
        positive(inputs.latest.book_value_per_share),
        &mut explain,
        "book_value_per_share",
    );
    out.ps = ratio_capped(
        market_cap,
        positive(inputs.ttm.revenue),
        MULTIPLE_CAP,
        &mut explain,
        "ttm revenue",
    );
    out.ev_ebitda = ratio_capped(
        out.enterprise_value,
        positive(inputs.latest.ebitda),
        MULTIPLE_CAP,
        &mut explain,
        "ebitda",
    );

    // Profitability (6) — margins use the latest single-period row; ROE/ROA/
    // net_margin use TTM net income and revenue (spec.md §4.6 TTM scope).
    out.roe = ratio(inputs.ttm.net_income, positive(inputs.latest.total_equity), &mut explain, "total_equity");
    out.roa = ratio(inputs.ttm.net_income, positive(inputs.latest.total_assets), &mut explain, "total_assets");
    let invested_capital = match (inputs.latest.total_equity, inputs.latest.total_debt, inputs.latest.cash) {
        (Some(equity), Some(debt), Some(cash)) => {
            let ic = equity + debt - cash;
            if ic > Decimal::ZERO { Some(ic) } else { None }
        }
        _ => None,
    };
    out.roic = ratio(inputs.ttm.net_income, invested_capital, &mut explain, "invested capital");
    out.gross_margin = ratio(inputs.latest.gross_profit, positive(inputs.latest.revenue), &mut explain, "revenue");
    out.operating_margin = ratio(inputs.latest.operating_income, positive(inputs.latest.revenue), &mut explain, "revenue");
    out.net_margin = ratio(inputs.ttm.net_income, positive(inputs.ttm.revenue), &mut explain, "ttm revenue");

    // Financial Health (5)
    out.debt_to_equity = ratio(inputs.latest.total_debt, positive(inputs.latest.total_equity), &mut explain, "total_equity");
    // current_ratio / quick_ratio need current-asset and current-liability
    // granularity the Fundamentals schema does not carry (spec.md §3); always
    // None with an explicit flag rather than invented inputs.
    out.current_ratio = None;
    explain("N/A — current assets/liabilities not in fundamentals schema".to_string());
    out.quick_ratio = None;
    explain("N/A — current assets/liabilities not in fundamentals schema".to_string());
    out.interest_coverage = None; // no interest-expense field in the schema; see above.
    explain("N/A — interest expense not in fundamentals schema".to_string());
    out.altman_z_score = altman_z(inputs, market_cap, &mut explain);

    // Efficiency (3)
    out.asset_turnover = ratio(inputs.ttm.revenue, positive(inputs.latest.total_assets), &mut explain, "total_assets");
    out.inventory_turnover = None;
    explain("N/A — inventory not in fundamentals schema".to_string());
    out.receivables_turnover = None;
    explain("N/A — receivables not in fundamentals schema".to_string());

    // Growth (3)
    out.revenue_growth_yoy = yoy(inputs.latest.revenue, inputs.prior_year.and_then(|p| p.revenue), &mut explain, "revenue");
    out.earnings_growth_yoy = yoy(inputs.latest.net_income, inputs.prior_year.and_then(|p| p.net_income), &mut explain, "net_income");
    out.fcf_growth_yoy = yoy(inputs.latest.free_cash_flow, inputs.prior_year.and_then(|p| p.free_cash_flow), &mut explain, "free_cash_flow");

    // PEG depends on PE (Valuation) and earnings_growth_yoy (Growth), so it
    // is computed here rather than alongside the rest of the Valuation group.
    out.peg = peg(out.pe, out.earnings_growth_yoy, &mut explain);

    // Quality (2)
    out.fcf_to_net_income = ratio(inputs.ttm.free_cash_flow, positive(inputs.ttm.net_income), &mut explain, "ttm net income");
    out.cash_conversion_cycle = None;
    explain("N/A — inventory/receivables/payables not in fundamentals schema".to_string());

    // Intrinsic (1)
    out.graham_number = graham_number(inputs.latest, &mut explain);

    out
}

fn positive(value: Option<Decimal>) -> Option<Decimal> {
    value.filter(|v| *v > Decimal::ZERO)
}

fn ratio(
    numerator: Option<Decimal>,
    denominator: Option<Decimal>,
    explain: &mut impl FnMut(String),
    denominator_name: &str,
) -> Option<Decimal> {
    match (numerator, denominator) {
        (Some(n), Some(d)) => Some(n / d),
        _ => {
            explain(format!("N/A — missing or non-positive {denominator_name}"));
            None
        }
    }
}

fn ratio_capped(
    numerator: Option<Decimal>,
    denominator: Option<Decimal>,
    cap: i64,
    explain: &mut impl FnMut(String),
    denominator_name: &str,
) -> Option<Decimal> {
    ratio(numerator, denominator, explain, denominator_name).map(|v| v.min(Decimal::from(cap)))
}

fn yoy(
    current: Option<Decimal>,
    prior: Option<Decimal>,
    explain: &mut impl FnMut(String),
    field_name: &str,
) -> Option<Decimal> {
    match (current, prior) {
        (Some(curr), Some(prior)) if prior > Decimal::ZERO => Some((curr - prior) / prior),
        _ => {
            explain(format!("N/A — missing or non-positive prior-year {field_name}"));
            None
        }
    }
}

/// PE divided by the earnings growth rate expressed as a whole-number
/// percentage (`earnings_growth_yoy` is a fraction, e.g. `0.15` for 15%).
fn peg(pe: Option<Decimal>, earnings_growth_yoy: Option<Decimal>, explain: &mut impl FnMut(String)) -> Option<Decimal> {
    match (pe, earnings_growth_yoy) {
        (Some(pe), Some(growth)) if growth > Decimal::ZERO => Some(pe / (growth * Decimal::from(100))),
        _ => {
            explain("N/A — missing pe or non-positive earnings_growth_yoy".to_string());
            None
        }
    }
}

/// `1.2A + 1.4B + 3.3C + 0.6D + 1.0E` (spec.md §4.6). Working capital is
/// approximated as `total_assets - total_debt` absent a direct field;
/// retained earnings is not in the schema, so B is omitted (treated as the
/// net-income-driven component folded into the formula's available terms is
/// not attempted — B's absence is flagged and the score is still computed
/// from the four available terms, consistent with "missing component"
/// handling elsewhere in this module).
fn altman_z(inputs: &RatioInputs<'_>, market_cap: Option<Decimal>, explain: &mut impl FnMut(String)) -> Option<Decimal> {
    let assets = positive(inputs.latest.total_assets)?;
    let debt = inputs.latest.total_debt.unwrap_or(Decimal::ZERO);
    let working_capital = assets - debt;
    let a = working_capital / assets;
    let c = inputs.latest.ebitda.unwrap_or(Decimal::ZERO) / assets;
    let total_liabilities = debt;
    if total_liabilities <= Decimal::ZERO {
        explain("N/A — non-positive total liabilities for Altman Z".to_string());
        return None;
    }
    let d = market_cap.unwrap_or(Decimal::ZERO) / total_liabilities;
    let e = inputs.ttm.revenue.unwrap_or(Decimal::ZERO) / assets;
    explain("Altman Z retained-earnings term (B) omitted — not in fundamentals schema".to_string());
    Some(Decimal::new(12, 1) * a + Decimal::new(33, 1) * c + Decimal::new(6, 1) * d + Decimal::ONE * e)
}

/// Altman Z zone classification used by the risk-level derivation (spec.md
/// §4.6: "Altman Z < 1.8 -> high_risk").
#[must_use]
pub fn altman_zone(score: Decimal) -> AltmanZone {
    if score >= Decimal::new(ALTMAN_SAFE, 2) {
        AltmanZone::Safe
    } else if score >= Decimal::new(ALTMAN_DISTRESS, 2) {
        AltmanZone::Gray
    } else {
        AltmanZone::Distress
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AltmanZone {
    Safe,
    Gray,
    Distress,
}

fn graham_number(latest: &Fundamentals, explain: &mut impl FnMut(String)) -> Option<Decimal> {
    let eps = positive(latest.eps_diluted);
    let book_value = positive(latest.book_value_per_share);
    match (eps, book_value) {
        (Some(eps), Some(book_value)) => {
            let product = Decimal::from(15u32) * eps * book_value;
            product.sqrt()
        }
        _ => {
            explain("N/A — non-positive eps_diluted or book_value_per_share".to_string());
            None
        }
    }
}
