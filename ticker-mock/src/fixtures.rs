//! Static, deterministic fixture data for the six end-to-end scenarios in
//! spec.md §8. Bar generation uses a simple deterministic walk (no RNG) so
//! fixtures are reproducible across runs, the same CI-safe goal
//! `borsa-mock`'s static-fixture-by-symbol style serves.

use chrono::{Duration as ChronoDuration, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use ticker_types::{DailyBar, EarningsCalendarRow, Fundamentals, IndicatorVector, PeriodType};

/// Deterministic "today" used by fixtures; scenarios supply their own dates
/// through the pipeline config rather than relying on wall-clock time.
pub fn anchor_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 7, 24).expect("valid date")
}

fn walk(base: Decimal, i: i64, amplitude: Decimal) -> Decimal {
    let phase = i % 10;
    let offset = Decimal::from(phase - 5) * amplitude / dec!(5);
    base + offset + Decimal::from(i) / dec!(50)
}

/// Generate `count` ascending daily bars ending at `anchor_date()` for a
/// synthetic ticker with no invariant violations.
#[must_use]
pub fn generate_bars(ticker: &str, count: i64, base_price: Decimal) -> Vec<DailyBar> {
    let end = anchor_date();
    (0..count)
        .map(|i| {
            let date = end - ChronoDuration::days(count - 1 - i);
            let close = walk(base_price, i, dec!(2));
            let open = close - dec!(0.30);
            let high = close.max(open) + dec!(0.50);
            let low = close.min(open) - dec!(0.50);
            DailyBar {
                ticker: ticker.to_string(),
                date,
                open,
                high,
                low,
                close,
                volume: 1_000_000 + i * 1_000,
                indicators: IndicatorVector::default(),
            }
        })
        .collect()
}

/// Tickers with a full 200-bar history (Scenario 1: happy daily run).
#[must_use]
pub fn bars_for(symbol: &str) -> Option<Vec<DailyBar>> {
    match symbol {
        "AAA" => Some(generate_bars("AAA", 200, dec!(50.00))),
        "BBB" => Some(generate_bars("BBB", 200, dec!(120.00))),
        "CCC" => Some(generate_bars("CCC", 200, dec!(8.00))),
        // Scenario 3: delisted ticker with 187 pre-existing bars.
        "XYZ" => Some(generate_bars("XYZ", 187, dec!(15.00))),
        // Scenario 4: brand-new ticker with insufficient history.
        "NEW" => Some(generate_bars("NEW", 12, dec!(30.00))),
        // Scenario 5: earnings-day fundamentals refresh target.
        "EARN" => Some(generate_bars("EARN", 120, dec!(45.00))),
        _ => None,
    }
}

/// Symbols that the primary and secondary providers both report as unknown,
/// simulating a delisting (Scenario 3).
#[must_use]
pub fn is_delisted(symbol: &str) -> bool {
    symbol == "XYZ"
}

#[must_use]
pub fn fundamentals_for(symbol: &str) -> Option<Vec<Fundamentals>> {
    match symbol {
        "EARN" => Some(vec![Fundamentals {
            ticker: "EARN".to_string(),
            report_date: anchor_date(),
            period_type: PeriodType::Quarterly,
            fiscal_year: 2026,
            fiscal_quarter: Some(2),
            revenue: Some(dec!(1000)),
            gross_profit: Some(dec!(600)),
            operating_income: Some(dec!(180)),
            net_income: Some(dec!(100)),
            ebitda: Some(dec!(220)),
            eps_diluted: Some(dec!(1.00)),
            book_value_per_share: Some(dec!(20.00)),
            total_assets: Some(dec!(5000)),
            total_debt: Some(dec!(800)),
            total_equity: Some(dec!(2000)),
            cash: Some(dec!(400)),
            operating_cash_flow: Some(dec!(150)),
            free_cash_flow: Some(dec!(120)),
            capex: Some(dec!(30)),
            shares_outstanding: Some(dec!(100)),
            shares_float: Some(dec!(95)),
            data_source: "mock-primary".to_string(),
            last_updated: anchor_date().and_hms_opt(21, 0, 0).expect("valid time"),
        }]),
        _ => None,
    }
}

#[must_use]
pub fn earnings_calendar_for(symbol: &str) -> Option<EarningsCalendarRow> {
    match symbol {
        "EARN" => Some(EarningsCalendarRow {
            ticker: "EARN".to_string(),
            earnings_date: anchor_date(),
            confirmed: true,
            eps_estimate: Some(dec!(0.95)),
            revenue_estimate: Some(dec!(980)),
            priority_level: 5,
            data_updated: false,
        }),
        _ => None,
    }
}
