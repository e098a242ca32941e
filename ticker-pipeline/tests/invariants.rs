//! Property-based tests for the six universal invariants the daily run must
//! hold (spec.md §8): idempotence, budget safety, bar validity, indicator
//! determinism, ratio monotonicity, and investor-score redistribution.

use std::sync::Arc;

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use ticker_core::DataProvider;
use ticker_fundamentals::{calculate_ratios, calculate_scores, default_table, RatioInputs};
use ticker_fundamentals::TtmFigures;
use ticker_indicators::compute;
use ticker_mock::{fixtures, MockProvider};
use ticker_pipeline::{Budget, Orchestrator};
use ticker_router::ProviderRouter;
use ticker_store::{InMemoryStore, Store};
use ticker_types::{BackoffConfig, DailyBar, Fundamentals, PeriodType, Ratios};

fn today() -> NaiveDate {
    fixtures::anchor_date()
}

fn router() -> Arc<ProviderRouter> {
    let primary: Arc<dyn DataProvider> = Arc::new(MockProvider::new("primary"));
    Arc::new(ProviderRouter::new(vec![primary], BackoffConfig::default()))
}

fn ticker_row(symbol: &str, fundamentals_last_update: Option<chrono::NaiveDateTime>) -> ticker_types::Ticker {
    ticker_types::Ticker {
        symbol: symbol.to_string(),
        active: true,
        sector: None,
        industry: None,
        market_cap_category: None,
        next_earnings_date: None,
        fundamentals_last_update,
        data_priority: 0,
    }
}

fn stale_update() -> chrono::NaiveDateTime {
    (today() - chrono::Duration::days(180)).and_hms_opt(21, 0, 0).expect("valid time")
}

async fn seed_bars_all_but_today(store: &InMemoryStore, symbol: &str) {
    let bars = fixtures::bars_for(symbol).expect("fixture series");
    for bar in &bars[..bars.len() - 1] {
        store.upsert_daily_bar(bar).await.expect("seed bar");
    }
}

fn arb_ticker_subset() -> impl Strategy<Value = Vec<&'static str>> {
    (any::<bool>(), any::<bool>(), any::<bool>()).prop_filter_map("at least one ticker", |(a, b, c)| {
        let mut out = Vec::new();
        if a {
            out.push("AAA");
        }
        if b {
            out.push("BBB");
        }
        if c {
            out.push("CCC");
        }
        (!out.is_empty()).then_some(out)
    })
}

proptest! {
    /// Invariant 1 — idempotence: running the pipeline twice on the same
    /// day with no new upstream data leaves price series and ticker
    /// bookkeeping unchanged after the second run.
    #[test]
    fn idempotence_prop(symbols in arb_ticker_subset()) {
        let rt = tokio::runtime::Runtime::new().expect("runtime");
        rt.block_on(async {
            let store = Arc::new(InMemoryStore::new());
            for symbol in &symbols {
                store.upsert_ticker(&ticker_row(symbol, Some(stale_update()))).await.expect("register");
                seed_bars_all_but_today(&store, symbol).await;
            }

            let orchestrator = Orchestrator::builder()
                .store(Arc::clone(&store) as Arc<dyn Store>)
                .router(router())
                .build()
                .expect("orchestrator builds");

            orchestrator.run_once(today()).await.expect("first run succeeds");

            let mut snapshot_after_first = Vec::new();
            for symbol in &symbols {
                snapshot_after_first.push((
                    store.read_price_series(symbol, 300).await.expect("read"),
                    store.get_ticker(symbol).await.expect("read").expect("row exists"),
                ));
            }

            orchestrator.run_once(today()).await.expect("second run succeeds");

            for (symbol, (bars_before, ticker_before)) in symbols.iter().zip(snapshot_after_first) {
                let bars_after = store.read_price_series(symbol, 300).await.expect("read");
                let ticker_after = store.get_ticker(symbol).await.expect("read").expect("row exists");
                prop_assert_eq!(bars_after, bars_before);
                prop_assert_eq!(ticker_after, ticker_before);
            }
        });
    }

    /// Invariant 2 — budget safety: no sequence of `try_consume` calls ever
    /// drives the counter negative or lets recorded consumption exceed the
    /// configured daily limit.
    #[test]
    fn budget_safety_prop(limit in 0u64..10_000, draws in proptest::collection::vec(0u64..500, 0..200)) {
        let budget = Budget::new(limit);
        let mut spent = 0u64;
        for draw in draws {
            if budget.try_consume(draw) {
                spent += draw;
            }
            prop_assert!(spent <= limit);
            prop_assert!(budget.remaining() >= 0);
            prop_assert_eq!(budget.remaining() as u64, limit - spent);
        }
    }

    /// Invariant 3 — bar validity: `DailyBar::is_valid` accepts exactly the
    /// rows satisfying `low <= min(open, close)`, `high >= max(open,
    /// close)`, `volume >= 0`, and the store enforces the same rule.
    #[test]
    fn bar_validity_prop(
        open_cents in 1i64..100_000,
        close_cents in 1i64..100_000,
        spread_cents in 0i64..10_000,
        volume in -10i64..10_000_000,
    ) {
        let open = Decimal::new(open_cents, 2);
        let close = Decimal::new(close_cents, 2);
        let spread = Decimal::new(spread_cents, 2);
        let low = open.min(close) - spread;
        let high = open.max(close) + spread;

        let bar = DailyBar {
            ticker: "PROP".to_string(),
            date: today(),
            open,
            high,
            low,
            close,
            volume,
            indicators: ticker_types::IndicatorVector::default(),
        };

        let should_be_valid = volume >= 0;
        prop_assert_eq!(bar.is_valid(), should_be_valid);

        let rt = tokio::runtime::Runtime::new().expect("runtime");
        let result = rt.block_on(async {
            let store = InMemoryStore::new();
            store.upsert_daily_bar(&bar).await
        });
        prop_assert_eq!(result.is_ok(), should_be_valid);
    }

    /// Invariant 4 — indicator determinism: the Indicator Engine is pure;
    /// the same ascending bar series always yields the same vector.
    #[test]
    fn indicator_determinism_prop(count in 1i64..250, base_cents in 100i64..50_000) {
        let base = Decimal::new(base_cents, 2);
        let bars = fixtures::generate_bars("PROP", count, base);
        let first = compute(&bars).expect("valid series");
        let second = compute(&bars).expect("valid series");
        prop_assert_eq!(first, second);
    }

    /// Invariant 5 — ratio monotonicity: scaling every income-statement
    /// field by a constant `k > 0` leaves margin ratios (which divide one
    /// income-statement field by another) unchanged.
    #[test]
    fn ratio_monotonicity_prop(k in 1i64..50) {
        let k = Decimal::from(k);
        let date = today();
        let base = Fundamentals {
            ticker: "PROP".to_string(),
            report_date: date,
            period_type: PeriodType::Quarterly,
            fiscal_year: 2026,
            fiscal_quarter: Some(2),
            revenue: Some(dec!(1000)),
            gross_profit: Some(dec!(600)),
            operating_income: Some(dec!(200)),
            net_income: Some(dec!(100)),
            ebitda: Some(dec!(250)),
            eps_diluted: Some(dec!(2.00)),
            book_value_per_share: Some(dec!(20.00)),
            total_assets: Some(dec!(5000)),
            total_debt: Some(dec!(1000)),
            total_equity: Some(dec!(3000)),
            cash: Some(dec!(500)),
            operating_cash_flow: Some(dec!(150)),
            free_cash_flow: Some(dec!(120)),
            capex: Some(dec!(30)),
            shares_outstanding: Some(dec!(100)),
            shares_float: Some(dec!(95)),
            data_source: "prop".to_string(),
            last_updated: date.and_hms_opt(0, 0, 0).expect("valid time"),
        };

        let scaled = Fundamentals {
            revenue: base.revenue.map(|v| v * k),
            gross_profit: base.gross_profit.map(|v| v * k),
            operating_income: base.operating_income.map(|v| v * k),
            net_income: base.net_income.map(|v| v * k),
            ..base.clone()
        };

        let ttm_base = TtmFigures {
            revenue: base.revenue,
            net_income: base.net_income,
            free_cash_flow: base.free_cash_flow,
            quality: ticker_types::DataQuality::Normal,
        };
        let ttm_scaled = TtmFigures {
            revenue: ttm_base.revenue.map(|v| v * k),
            net_income: ttm_base.net_income.map(|v| v * k),
            free_cash_flow: ttm_base.free_cash_flow,
            quality: ticker_types::DataQuality::Normal,
        };

        let before = calculate_ratios(&RatioInputs {
            ticker: "PROP",
            calculation_date: date,
            latest: &base,
            ttm: &ttm_base,
            prior_year: None,
            close_price: dec!(40.00),
        });
        let after = calculate_ratios(&RatioInputs {
            ticker: "PROP",
            calculation_date: date,
            latest: &scaled,
            ttm: &ttm_scaled,
            prior_year: None,
            close_price: dec!(40.00),
        });

        prop_assert_eq!(before.gross_margin, after.gross_margin);
        prop_assert_eq!(before.operating_margin, after.operating_margin);
        prop_assert_eq!(before.net_margin, after.net_margin);
    }

    /// Invariant 6 — score redistribution: a missing component's weight is
    /// redistributed proportionally among the remaining present components,
    /// rather than silently treating it as zero.
    #[test]
    fn score_redistribution_prop(blank_valuation in any::<bool>(), blank_quality in any::<bool>(), blank_growth in any::<bool>()) {
        let table = default_table();
        let mut ratios = Ratios {
            ticker: "PROP".to_string(),
            calculation_date: today(),
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
            explanations: Vec::new(),
        };

        if blank_valuation {
            ratios.pe = None;
            ratios.pb = None;
            ratios.ps = None;
            ratios.ev_ebitda = None;
            ratios.peg = None;
        }
        if blank_quality {
            ratios.fcf_to_net_income = None;
            ratios.gross_margin = None;
        }
        if blank_growth {
            ratios.revenue_growth_yoy = None;
            ratios.earnings_growth_yoy = None;
            ratios.fcf_growth_yoy = None;
        }

        let scores = calculate_scores("PROP", today(), &ratios, &table);
        prop_assert_eq!(scores.risk_level, ticker_types::RiskLevel::Normal, "altman z 3.2 stays in the safe zone");

        let pairs = [
            (scores.valuation_component, dec!(0.25), dec!(0.25), dec!(0.40)),
            (scores.quality_component, dec!(0.20), dec!(0.20), dec!(0.15)),
            (scores.financial_health_component, dec!(0.30), dec!(0.10), dec!(0.25)),
            (scores.profitability_component, dec!(0.15), dec!(0.15), dec!(0.10)),
            (scores.growth_component, dec!(0.05), dec!(0.25), dec!(0.05)),
            (scores.management_component, dec!(0.05), dec!(0.05), dec!(0.05)),
        ];

        for (profile_idx, actual) in [scores.conservative_score, scores.garp_score, scores.deep_value_score].into_iter().enumerate() {
            let present: Vec<(Decimal, Decimal)> = pairs
                .iter()
                .filter_map(|(value, cons, garp, deep)| {
                    let weight = [*cons, *garp, *deep][profile_idx];
                    value.map(|v| (v, weight))
                })
                .collect();
            let expected = if present.is_empty() {
                None
            } else {
                let weight_sum: Decimal = present.iter().map(|(_, w)| *w).sum();
                Some(present.iter().map(|(v, w)| v * w).sum::<Decimal>() / weight_sum)
            };
            prop_assert_eq!(actual, expected);
        }
    }
}
