//! `InMemoryStore`: a `Store` test double backing unit tests and the
//! property-based invariants without a live database, grounded on
//! `borsa-mock`'s style of serving deterministic fixture data from plain
//! in-process state instead of a network call.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use ticker_core::PipelineError;
use ticker_types::{
    ApiUsage, DailyBar, EarningsCalendarRow, Fundamentals, IndicatorVector, InvestorScores,
    Ratios, RunStatus, Ticker, TickerNeedTag, UpdateLog,
};

use crate::store::Store;

const DELISTED_GAP_DAYS: i64 = 5;
const FUNDAMENTALS_STALE_DAYS: i64 = 90;

#[derive(Default)]
struct Tables {
    tickers: HashMap<String, Ticker>,
    bars: HashMap<(String, NaiveDate), DailyBar>,
    fundamentals: HashMap<(String, NaiveDate, String), Fundamentals>,
    ratios: HashMap<(String, NaiveDate), Ratios>,
    scores: HashMap<(String, NaiveDate), InvestorScores>,
    earnings: HashMap<(String, NaiveDate), EarningsCalendarRow>,
    api_usage: Vec<ApiUsage>,
    update_log: Vec<UpdateLog>,
}

/// An in-process `Store` double. All state lives behind a `Mutex` so it can
/// be shared across the worker pool the same way a connection pool is.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn period_key(p: ticker_types::PeriodType) -> String {
    match p {
        ticker_types::PeriodType::Annual => "annual".to_string(),
        ticker_types::PeriodType::Quarterly => "quarterly".to_string(),
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn upsert_daily_bar(&self, bar: &DailyBar) -> Result<(), PipelineError> {
        if !bar.is_valid() {
            return Err(PipelineError::Data(format!("invalid bar for {} on {}", bar.ticker, bar.date)));
        }
        let mut tables = self.tables.lock().expect("store mutex poisoned");
        let key = (bar.ticker.clone(), bar.date);
        let entry = tables.bars.entry(key).or_insert_with(|| DailyBar {
            ticker: bar.ticker.clone(),
            date: bar.date,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            indicators: IndicatorVector::default(),
        });
        // Only price/volume columns are overwritten; indicators persist.
        entry.open = bar.open;
        entry.high = bar.high;
        entry.low = bar.low;
        entry.close = bar.close;
        entry.volume = bar.volume;
        Ok(())
    }

    async fn update_indicators(
        &self,
        ticker: &str,
        date: NaiveDate,
        indicators: &IndicatorVector,
    ) -> Result<(), PipelineError> {
        let mut tables = self.tables.lock().expect("store mutex poisoned");
        let Some(bar) = tables.bars.get_mut(&(ticker.to_string(), date)) else {
            return Err(PipelineError::not_found(format!("no bar for {ticker} on {date}")));
        };
        macro_rules! merge {
            ($field:ident) => {
                if indicators.$field.is_some() {
                    bar.indicators.$field = indicators.$field;
                }
            };
        }
        merge!(rsi_14);
        merge!(ema_20);
        merge!(ema_50);
        merge!(ema_100);
        merge!(ema_200);
        merge!(macd_line);
        merge!(macd_signal);
        merge!(macd_histogram);
        merge!(bb_upper);
        merge!(bb_middle);
        merge!(bb_lower);
        merge!(stoch_k);
        merge!(stoch_d);
        merge!(cci_20);
        merge!(atr_14);
        merge!(di_plus_14);
        merge!(di_minus_14);
        merge!(dx_14);
        merge!(adx_14);
        merge!(vwap_20);
        merge!(obv);
        merge!(fib_236);
        merge!(fib_382);
        merge!(fib_500);
        merge!(fib_618);
        merge!(fib_786);
        merge!(pivot);
        merge!(r1);
        merge!(r2);
        merge!(r3);
        merge!(s1);
        merge!(s2);
        merge!(s3);
        merge!(swing_high);
        merge!(swing_low);
        Ok(())
    }

    async fn read_price_series(&self, ticker: &str, days: u32) -> Result<Vec<DailyBar>, PipelineError> {
        let tables = self.tables.lock().expect("store mutex poisoned");
        let mut bars: Vec<DailyBar> = tables
            .bars
            .values()
            .filter(|b| b.ticker == ticker)
            .cloned()
            .collect();
        bars.sort_by_key(|b| b.date);
        if bars.len() > days as usize {
            let start = bars.len() - days as usize;
            bars = bars.split_off(start);
        }
        Ok(bars)
    }

    async fn upsert_fundamentals(&self, row: &Fundamentals) -> Result<(), PipelineError> {
        let mut tables = self.tables.lock().expect("store mutex poisoned");
        let key = (row.ticker.clone(), row.report_date, period_key(row.period_type));
        tables.fundamentals.insert(key, row.clone());
        Ok(())
    }

    async fn upsert_ratios(&self, row: &Ratios) -> Result<(), PipelineError> {
        let mut tables = self.tables.lock().expect("store mutex poisoned");
        let key = (row.ticker.clone(), row.calculation_date);
        tables.ratios.insert(key, row.clone());
        Ok(())
    }

    async fn upsert_scores(&self, row: &InvestorScores) -> Result<(), PipelineError> {
        let mut tables = self.tables.lock().expect("store mutex poisoned");
        let key = (row.ticker.clone(), row.calculation_date);
        tables.scores.insert(key, row.clone());
        Ok(())
    }

    async fn tickers_needing(&self, tag: TickerNeedTag, as_of: NaiveDate) -> Result<Vec<String>, PipelineError> {
        let tables = self.tables.lock().expect("store mutex poisoned");
        let today = as_of;
        let active: Vec<&Ticker> = tables.tickers.values().filter(|t| t.active).collect();

        let result = match tag {
            TickerNeedTag::PriceToday => active
                .into_iter()
                .filter(|t| !tables.bars.contains_key(&(t.symbol.clone(), today)))
                .map(|t| t.symbol.clone())
                .collect(),

            TickerNeedTag::HistoryBelow(min_days) => active
                .into_iter()
                .filter(|t| {
                    let count = tables.bars.keys().filter(|(sym, _)| sym == &t.symbol).count();
                    count < min_days as usize
                })
                .map(|t| t.symbol.clone())
                .collect(),

            TickerNeedTag::FundamentalsStale => active
                .into_iter()
                .filter(|t| match t.fundamentals_last_update {
                    None => true,
                    Some(last) => (today - last.date()).num_days() >= FUNDAMENTALS_STALE_DAYS,
                })
                .map(|t| t.symbol.clone())
                .collect(),

            TickerNeedTag::RatiosStale => active
                .into_iter()
                .filter(|t| {
                    let latest_fundamentals = tables
                        .fundamentals
                        .keys()
                        .filter(|(sym, _, _)| sym == &t.symbol)
                        .map(|(_, date, _)| *date)
                        .max();
                    let Some(latest_fundamentals) = latest_fundamentals else {
                        return false;
                    };
                    let latest_ratios = tables
                        .ratios
                        .keys()
                        .filter(|(sym, _)| sym == &t.symbol)
                        .map(|(_, date)| *date)
                        .max();
                    latest_ratios.is_none_or(|r| r < latest_fundamentals)
                })
                .map(|t| t.symbol.clone())
                .collect(),

            TickerNeedTag::DelistedSuspects => active
                .into_iter()
                .filter(|t| {
                    let latest_bar = tables
                        .bars
                        .keys()
                        .filter(|(sym, _)| sym == &t.symbol)
                        .map(|(_, date)| *date)
                        .max();
                    match latest_bar {
                        None => true,
                        Some(date) => (today - date).num_days() >= DELISTED_GAP_DAYS,
                    }
                })
                .map(|t| t.symbol.clone())
                .collect(),
        };
        Ok(result)
    }

    async fn upsert_ticker(&self, ticker: &Ticker) -> Result<(), PipelineError> {
        let mut tables = self.tables.lock().expect("store mutex poisoned");
        tables.tickers.insert(ticker.symbol.clone(), ticker.clone());
        Ok(())
    }

    async fn get_ticker(&self, ticker: &str) -> Result<Option<Ticker>, PipelineError> {
        let tables = self.tables.lock().expect("store mutex poisoned");
        Ok(tables.tickers.get(ticker).cloned())
    }

    async fn mark_delisted(&self, ticker: &str) -> Result<(), PipelineError> {
        let mut tables = self.tables.lock().expect("store mutex poisoned");
        let Some(row) = tables.tickers.get_mut(ticker) else {
            return Err(PipelineError::not_found(format!("ticker {ticker}")));
        };
        row.active = false;
        Ok(())
    }

    async fn upsert_earnings_calendar(&self, row: &EarningsCalendarRow) -> Result<(), PipelineError> {
        let mut tables = self.tables.lock().expect("store mutex poisoned");
        let key = (row.ticker.clone(), row.earnings_date);
        tables.earnings.insert(key, row.clone());
        Ok(())
    }

    async fn earnings_calendar_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<EarningsCalendarRow>, PipelineError> {
        let tables = self.tables.lock().expect("store mutex poisoned");
        let mut rows: Vec<EarningsCalendarRow> = tables
            .earnings
            .values()
            .filter(|r| r.earnings_date >= from && r.earnings_date <= to)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.earnings_date);
        Ok(rows)
    }

    async fn record_api_usage(&self, usage: &ApiUsage) -> Result<(), PipelineError> {
        let mut tables = self.tables.lock().expect("store mutex poisoned");
        tables.api_usage.push(usage.clone());
        Ok(())
    }

    async fn api_calls_used(&self, provider: &str, date: NaiveDate) -> Result<i64, PipelineError> {
        let tables = self.tables.lock().expect("store mutex poisoned");
        Ok(tables
            .api_usage
            .iter()
            .filter(|u| u.provider == provider && u.date == date)
            .map(|u| u.calls_made)
            .sum())
    }

    async fn record_update_log(&self, entry: &UpdateLog) -> Result<(), PipelineError> {
        let mut tables = self.tables.lock().expect("store mutex poisoned");
        tables.update_log.push(entry.clone());
        Ok(())
    }

    async fn fundamentals_for_ticker(&self, ticker: &str) -> Result<Vec<Fundamentals>, PipelineError> {
        let tables = self.tables.lock().expect("store mutex poisoned");
        Ok(tables
            .fundamentals
            .iter()
            .filter(|((sym, _, _), _)| sym == ticker)
            .map(|(_, row)| row.clone())
            .collect())
    }

    async fn update_log_completed(&self, update_type: &str, run_date: NaiveDate) -> Result<bool, PipelineError> {
        let tables = self.tables.lock().expect("store mutex poisoned");
        Ok(tables.update_log.iter().any(|entry| {
            entry.update_type == update_type
                && entry.started_at.date() == run_date
                && matches!(entry.status, RunStatus::Success | RunStatus::Skipped)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use rust_decimal_macros::dec;

    fn bar(ticker: &str, date: NaiveDate, close: rust_decimal::Decimal) -> DailyBar {
        DailyBar {
            ticker: ticker.to_string(),
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume: 1_000,
            indicators: IndicatorVector::default(),
        }
    }

    fn ticker(symbol: &str) -> Ticker {
        Ticker {
            symbol: symbol.to_string(),
            active: true,
            sector: None,
            industry: None,
            market_cap_category: None,
            next_earnings_date: None,
            fundamentals_last_update: None,
            data_priority: 0,
        }
    }

    #[tokio::test]
    async fn upsert_preserves_indicators_on_price_overwrite() {
        let store = InMemoryStore::new();
        let date = NaiveDate::from_ymd_opt(2026, 7, 24).expect("valid date");
        store.upsert_daily_bar(&bar("AAA", date, dec!(10))).await.expect("upsert");
        let mut indicators = IndicatorVector::default();
        indicators.rsi_14 = Some(dec!(55));
        store.update_indicators("AAA", date, &indicators).await.expect("indicators");

        store.upsert_daily_bar(&bar("AAA", date, dec!(11))).await.expect("re-upsert");
        let series = store.read_price_series("AAA", 10).await.expect("read");
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].close, dec!(11));
        assert_eq!(series[0].indicators.rsi_14, Some(dec!(55)));
    }

    #[tokio::test]
    async fn read_price_series_returns_ascending_and_capped() {
        let store = InMemoryStore::new();
        for day in 1..=5 {
            let date = NaiveDate::from_ymd_opt(2026, 7, day).expect("valid date");
            store.upsert_daily_bar(&bar("AAA", date, dec!(10))).await.expect("upsert");
        }
        let series = store.read_price_series("AAA", 3).await.expect("read");
        assert_eq!(series.len(), 3);
        assert!(series.windows(2).all(|w| w[0].date < w[1].date));
        assert_eq!(series.last().expect("non-empty").date, NaiveDate::from_ymd_opt(2026, 7, 5).expect("valid date"));
    }

    #[tokio::test]
    async fn tickers_needing_price_today_excludes_tickers_with_a_bar_today() {
        let store = InMemoryStore::new();
        store.upsert_ticker(&ticker("AAA")).await.expect("register");
        store.upsert_ticker(&ticker("BBB")).await.expect("register");
        let today = Utc::now().date_naive();
        store.upsert_daily_bar(&bar("AAA", today, dec!(10))).await.expect("upsert");

        let needing = store.tickers_needing(TickerNeedTag::PriceToday, today).await.expect("query");
        assert_eq!(needing, vec!["BBB".to_string()]);
    }

    #[tokio::test]
    async fn mark_delisted_flips_active_without_touching_bars() {
        let store = InMemoryStore::new();
        store.upsert_ticker(&ticker("XYZ")).await.expect("register");
        let date = NaiveDate::from_ymd_opt(2026, 7, 1).expect("valid date");
        store.upsert_daily_bar(&bar("XYZ", date, dec!(10))).await.expect("upsert");

        store.mark_delisted("XYZ").await.expect("mark");
        let row = store.get_ticker("XYZ").await.expect("query").expect("present");
        assert!(!row.active);
        assert_eq!(store.read_price_series("XYZ", 10).await.expect("read").len(), 1);
    }

    #[tokio::test]
    async fn api_calls_used_sums_recorded_usage() {
        let store = InMemoryStore::new();
        let date = NaiveDate::from_ymd_opt(2026, 7, 24).expect("valid date");
        let usage = ApiUsage {
            provider: "P1".to_string(),
            date,
            endpoint: "quote_batch".to_string(),
            calls_made: 3,
            calls_limit: 1000,
            reset_time: NaiveDateTime::parse_from_str("2026-07-25 00:00:00", "%Y-%m-%d %H:%M:%S").expect("valid"),
        };
        store.record_api_usage(&usage).await.expect("record");
        store.record_api_usage(&usage).await.expect("record");
        assert_eq!(store.api_calls_used("P1", date).await.expect("query"), 6);
    }

    fn fundamentals_row(ticker: &str, report_date: NaiveDate) -> Fundamentals {
        Fundamentals {
            ticker: ticker.to_string(),
            report_date,
            period_type: ticker_types::PeriodType::Quarterly,
            fiscal_year: 2026,
            fiscal_quarter: Some(2),
            revenue: Some(dec!(100)),
            gross_profit: None,
            operating_income: None,
            net_income: None,
            ebitda: None,
            eps_diluted: None,
            book_value_per_share: None,
            total_assets: None,
            total_debt: None,
            total_equity: None,
            cash: None,
            operating_cash_flow: None,
            free_cash_flow: None,
            capex: None,
            shares_outstanding: None,
            shares_float: None,
            data_source: "test".to_string(),
            last_updated: NaiveDateTime::parse_from_str("2026-07-24 00:00:00", "%Y-%m-%d %H:%M:%S").expect("valid"),
        }
    }

    #[tokio::test]
    async fn fundamentals_for_ticker_only_returns_that_tickers_rows() {
        let store = InMemoryStore::new();
        let d1 = NaiveDate::from_ymd_opt(2026, 1, 1).expect("valid date");
        let d2 = NaiveDate::from_ymd_opt(2026, 4, 1).expect("valid date");
        store.upsert_fundamentals(&fundamentals_row("AAA", d1)).await.expect("upsert");
        store.upsert_fundamentals(&fundamentals_row("AAA", d2)).await.expect("upsert");
        store.upsert_fundamentals(&fundamentals_row("BBB", d1)).await.expect("upsert");

        let rows = store.fundamentals_for_ticker("AAA").await.expect("read");
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.ticker == "AAA"));
    }

    #[tokio::test]
    async fn update_log_completed_true_only_for_success_or_skipped_on_that_date() {
        let store = InMemoryStore::new();
        let date = NaiveDate::from_ymd_opt(2026, 7, 24).expect("valid date");
        let entry = UpdateLog {
            update_type: "price_refresh".to_string(),
            ticker: None,
            status: RunStatus::Failed,
            error_message: None,
            records_processed: 0,
            execution_time_ms: 0,
            started_at: date.and_hms_opt(21, 0, 0).expect("valid time"),
            completed_at: None,
        };
        store.record_update_log(&entry).await.expect("record");
        assert!(!store.update_log_completed("price_refresh", date).await.expect("query"));

        let mut success = entry.clone();
        success.status = RunStatus::Success;
        store.record_update_log(&success).await.expect("record");
        assert!(store.update_log_completed("price_refresh", date).await.expect("query"));
        assert!(!store.update_log_completed("indicator_update", date).await.expect("query"));
    }
}
