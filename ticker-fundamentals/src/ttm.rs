//! Trailing-twelve-month aggregation (spec.md §4.6).

use rust_decimal::Decimal;
use ticker_types::{DataQuality, Fundamentals, PeriodType};

/// TTM revenue, net income, and free cash flow, with the data-quality flag
/// the Ratio Calculator must carry when only an annual fallback was available.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TtmFigures {
    pub revenue: Option<Decimal>,
    pub net_income: Option<Decimal>,
    pub free_cash_flow: Option<Decimal>,
    pub quality: DataQuality,
}

/// Aggregate TTM revenue/net income/FCF from `statements` (any period mix,
/// any order). Sums the four most recent quarterly rows; falls back to the
/// single most recent annual row (flagged `Low`) when fewer than four
/// quarterly rows exist.
#[must_use]
pub fn compute_ttm(statements: &[Fundamentals]) -> TtmFigures {
    let mut quarterly: Vec<&Fundamentals> = statements
        .iter()
        .filter(|s| s.period_type == PeriodType::Quarterly)
        .collect();
    quarterly.sort_by(|a, b| b.report_date.cmp(&a.report_date));

    if quarterly.len() >= 4 {
        let last_four = &quarterly[..4];
        return TtmFigures {
            revenue: sum_if_all_present(last_four, |s| s.revenue),
            net_income: sum_if_all_present(last_four, |s| s.net_income),
            free_cash_flow: sum_if_all_present(last_four, |s| s.free_cash_flow),
            quality: DataQuality::Normal,
        };
    }

    let latest_annual = statements
        .iter()
        .filter(|s| s.period_type == PeriodType::Annual)
        .max_by_key(|s| s.report_date);

    match latest_annual {
        Some(annual) => TtmFigures {
            revenue: annual.revenue,
            net_income: annual.net_income,
            free_cash_flow: annual.free_cash_flow,
            quality: DataQuality::Low,
        },
        None => TtmFigures::default(),
    }
}

fn sum_if_all_present(
    rows: &[&Fundamentals],
    field: impl Fn(&Fundamentals) -> Option<Decimal>,
) -> Option<Decimal> {
    let values: Option<Vec<Decimal>> = rows.iter().map(|r| field(r)).collect();
    values.map(|v| v.into_iter().sum())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn quarter(ticker: &str, year: i32, quarter: i32, revenue: Decimal) -> Fundamentals {
        Fundamentals {
            ticker: ticker.to_string(),
            report_date: NaiveDate::from_ymd_opt(year, quarter * 3, 28).expect("valid date"),
            period_type: PeriodType::Quarterly,
            fiscal_year: year,
            fiscal_quarter: Some(quarter),
            revenue: Some(revenue),
            gross_profit: None,
            operating_income: None,
            net_income: Some(revenue / dec!(10)),
            ebitda: None,
            eps_diluted: None,
            book_value_per_share: None,
            total_assets: None,
            total_debt: None,
            total_equity: None,
            cash: None,
            operating_cash_flow: None,
            free_cash_flow: Some(revenue / dec!(20)),
            capex: None,
            shares_outstanding: None,
            shares_float: None,
            data_source: "test".to_string(),
            last_updated: NaiveDate::from_ymd_opt(year, quarter * 3, 28)
                .expect("valid date")
                .and_hms_opt(0, 0, 0)
                .expect("valid time"),
        }
    }

    #[test]
    fn four_quarters_sum_to_ttm() {
        let statements = vec![
            quarter("AAA", 2025, 3, dec!(100)),
            quarter("AAA", 2025, 4, dec!(110)),
            quarter("AAA", 2026, 1, dec!(120)),
            quarter("AAA", 2026, 2, dec!(130)),
        ];
        let ttm = compute_ttm(&statements);
        assert_eq!(ttm.revenue, Some(dec!(460)));
        assert_eq!(ttm.quality, DataQuality::Normal);
    }

    #[test]
    fn fewer_than_four_quarters_falls_back_to_annual_with_low_quality() {
        let mut annual = quarter("AAA", 2025, 4, dec!(400));
        annual.period_type = PeriodType::Annual;
        annual.fiscal_quarter = None;
        let statements = vec![quarter("AAA", 2026, 1, dec!(120)), annual];
        let ttm = compute_ttm(&statements);
        assert_eq!(ttm.revenue, Some(dec!(400)));
        assert_eq!(ttm.quality, DataQuality::Low);
    }

    #[test]
    fn no_statements_yields_all_none() {
        let ttm = compute_ttm(&[]);
        assert_eq!(ttm.revenue, None);
        assert_eq!(ttm.quality, DataQuality::Normal);
    }
}
