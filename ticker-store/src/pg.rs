//! `PgStore`: the `Store` trait backed by `sqlx::PgPool`, realizing the
//! schema in `migrations/0001_init.sql` (spec.md §6). Every method opens its
//! own transaction and commits once, so a mid-write failure rolls back that
//! ticker's logical unit without touching the rest of a batch.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};
use ticker_core::PipelineError;
use ticker_types::{
    ApiUsage, DailyBar, EarningsCalendarRow, Fundamentals, IndicatorVector, InvestorScores,
    PeriodType, Ratios, RiskLevel, Ticker, TickerNeedTag, UpdateLog,
};

use crate::scale::{from_scaled, from_scaled_opt, from_scaled_wide_opt, to_scaled, to_scaled_opt, to_scaled_wide_opt};
use crate::store::Store;

/// Days of gap in `daily_charts` beyond which an active ticker is treated as
/// a delisting suspect for Phase 6's probe.
const DELISTED_GAP_DAYS: i32 = 5;
const FUNDAMENTALS_STALE_DAYS: i32 = 90;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connects and runs pending migrations.
    pub async fn connect(database_url: &str) -> Result<Self, PipelineError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| PipelineError::StoreUnavailable(e.to_string()))?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| PipelineError::StoreUnavailable(e.to_string()))?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_db_err(e: sqlx::Error) -> PipelineError {
        match &e {
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => PipelineError::StoreUnavailable(e.to_string()),
            _ => PipelineError::Data(e.to_string()),
        }
    }
}

fn period_type_str(p: PeriodType) -> &'static str {
    match p {
        PeriodType::Annual => "annual",
        PeriodType::Quarterly => "quarterly",
    }
}

fn str_to_period_type(s: &str) -> PeriodType {
    match s {
        "quarterly" => PeriodType::Quarterly,
        _ => PeriodType::Annual,
    }
}

fn risk_level_str(r: RiskLevel) -> &'static str {
    match r {
        RiskLevel::Normal => "normal",
        RiskLevel::Caution => "caution",
        RiskLevel::Warning => "warning",
        RiskLevel::HighRisk => "high_risk",
    }
}

#[async_trait]
impl Store for PgStore {
    async fn upsert_daily_bar(&self, bar: &DailyBar) -> Result<(), PipelineError> {
        if !bar.is_valid() {
            return Err(PipelineError::Data(format!("invalid bar for {} on {}", bar.ticker, bar.date)));
        }
        let open = to_scaled(bar.open)?;
        let high = to_scaled(bar.high)?;
        let low = to_scaled(bar.low)?;
        let close = to_scaled(bar.close)?;

        let mut tx = self.pool.begin().await.map_err(Self::map_db_err)?;
        sqlx::query(
            "INSERT INTO daily_charts (ticker, date, open, high, low, close, volume)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (ticker, date) DO UPDATE SET
                open = excluded.open, high = excluded.high, low = excluded.low,
                close = excluded.close, volume = excluded.volume",
        )
        .bind(&bar.ticker)
        .bind(bar.date)
        .bind(open)
        .bind(high)
        .bind(low)
        .bind(close)
        .bind(bar.volume)
        .execute(&mut *tx)
        .await
        .map_err(Self::map_db_err)?;
        tx.commit().await.map_err(Self::map_db_err)?;
        Ok(())
    }

    async fn update_indicators(
        &self,
        ticker: &str,
        date: NaiveDate,
        indicators: &IndicatorVector,
    ) -> Result<(), PipelineError> {
        let i = indicators;
        let mut tx = self.pool.begin().await.map_err(Self::map_db_err)?;
        sqlx::query(
            "UPDATE daily_charts SET
                rsi_14 = COALESCE($3, rsi_14),
                ema_20 = COALESCE($4, ema_20),
                ema_50 = COALESCE($5, ema_50),
                ema_100 = COALESCE($6, ema_100),
                ema_200 = COALESCE($7, ema_200),
                macd_line = COALESCE($8, macd_line),
                macd_signal = COALESCE($9, macd_signal),
                macd_histogram = COALESCE($10, macd_histogram),
                bb_upper = COALESCE($11, bb_upper),
                bb_middle = COALESCE($12, bb_middle),
                bb_lower = COALESCE($13, bb_lower),
                stoch_k = COALESCE($14, stoch_k),
                stoch_d = COALESCE($15, stoch_d),
                cci_20 = COALESCE($16, cci_20),
                atr_14 = COALESCE($17, atr_14),
                di_plus_14 = COALESCE($18, di_plus_14),
                di_minus_14 = COALESCE($19, di_minus_14),
                dx_14 = COALESCE($20, dx_14),
                adx_14 = COALESCE($21, adx_14),
                vwap_20 = COALESCE($22, vwap_20),
                obv = COALESCE($23, obv),
                fib_236 = COALESCE($24, fib_236),
                fib_382 = COALESCE($25, fib_382),
                fib_500 = COALESCE($26, fib_500),
                fib_618 = COALESCE($27, fib_618),
                fib_786 = COALESCE($28, fib_786),
                pivot = COALESCE($29, pivot),
                r1 = COALESCE($30, r1),
                r2 = COALESCE($31, r2),
                r3 = COALESCE($32, r3),
                s1 = COALESCE($33, s1),
                s2 = COALESCE($34, s2),
                s3 = COALESCE($35, s3),
                swing_high = COALESCE($36, swing_high),
                swing_low = COALESCE($37, swing_low)
             WHERE ticker = $1 AND date = $2",
        )
        .bind(ticker)
        .bind(date)
        .bind(to_scaled_opt(i.rsi_14)?)
        .bind(to_scaled_opt(i.ema_20)?)
        .bind(to_scaled_opt(i.ema_50)?)
        .bind(to_scaled_opt(i.ema_100)?)
        .bind(to_scaled_opt(i.ema_200)?)
        .bind(to_scaled_opt(i.macd_line)?)
        .bind(to_scaled_opt(i.macd_signal)?)
        .bind(to_scaled_opt(i.macd_histogram)?)
        .bind(to_scaled_opt(i.bb_upper)?)
        .bind(to_scaled_opt(i.bb_middle)?)
        .bind(to_scaled_opt(i.bb_lower)?)
        .bind(to_scaled_opt(i.stoch_k)?)
        .bind(to_scaled_opt(i.stoch_d)?)
        .bind(to_scaled_opt(i.cci_20)?)
        .bind(to_scaled_opt(i.atr_14)?)
        .bind(to_scaled_opt(i.di_plus_14)?)
        .bind(to_scaled_opt(i.di_minus_14)?)
        .bind(to_scaled_opt(i.dx_14)?)
        .bind(to_scaled_opt(i.adx_14)?)
        .bind(to_scaled_opt(i.vwap_20)?)
        .bind(to_scaled_wide_opt(i.obv)?)
        .bind(to_scaled_opt(i.fib_236)?)
        .bind(to_scaled_opt(i.fib_382)?)
        .bind(to_scaled_opt(i.fib_500)?)
        .bind(to_scaled_opt(i.fib_618)?)
        .bind(to_scaled_opt(i.fib_786)?)
        .bind(to_scaled_opt(i.pivot)?)
        .bind(to_scaled_opt(i.r1)?)
        .bind(to_scaled_opt(i.r2)?)
        .bind(to_scaled_opt(i.r3)?)
        .bind(to_scaled_opt(i.s1)?)
        .bind(to_scaled_opt(i.s2)?)
        .bind(to_scaled_opt(i.s3)?)
        .bind(to_scaled_opt(i.swing_high)?)
        .bind(to_scaled_opt(i.swing_low)?)
        .execute(&mut *tx)
        .await
        .map_err(Self::map_db_err)?;
        tx.commit().await.map_err(Self::map_db_err)?;
        Ok(())
    }

    async fn read_price_series(&self, ticker: &str, days: u32) -> Result<Vec<DailyBar>, PipelineError> {
        let rows = sqlx::query(
            "SELECT * FROM daily_charts WHERE ticker = $1 ORDER BY date DESC LIMIT $2",
        )
        .bind(ticker)
        .bind(i64::from(days))
        .fetch_all(&self.pool)
        .await
        .map_err(Self::map_db_err)?;

        let mut bars: Vec<DailyBar> = rows.into_iter().map(row_to_bar).collect::<Result<_, _>>()?;
        bars.reverse();
        Ok(bars)
    }

    async fn upsert_fundamentals(&self, row: &Fundamentals) -> Result<(), PipelineError> {
        let mut tx = self.pool.begin().await.map_err(Self::map_db_err)?;
        sqlx::query(
            "INSERT INTO company_fundamentals
                (ticker, report_date, period_type, fiscal_year, fiscal_quarter, revenue,
                 gross_profit, operating_income, net_income, ebitda, eps_diluted,
                 book_value_per_share, total_assets, total_debt, total_equity, cash,
                 operating_cash_flow, free_cash_flow, capex, shares_outstanding,
                 shares_float, data_source, last_updated)
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20,$21,$22,$23)
             ON CONFLICT (ticker, report_date, period_type) DO UPDATE SET
                fiscal_year = excluded.fiscal_year, fiscal_quarter = excluded.fiscal_quarter,
                revenue = excluded.revenue, gross_profit = excluded.gross_profit,
                operating_income = excluded.operating_income, net_income = excluded.net_income,
                ebitda = excluded.ebitda, eps_diluted = excluded.eps_diluted,
                book_value_per_share = excluded.book_value_per_share,
                total_assets = excluded.total_assets, total_debt = excluded.total_debt,
                total_equity = excluded.total_equity, cash = excluded.cash,
                operating_cash_flow = excluded.operating_cash_flow,
                free_cash_flow = excluded.free_cash_flow, capex = excluded.capex,
                shares_outstanding = excluded.shares_outstanding,
                shares_float = excluded.shares_float, data_source = excluded.data_source,
                last_updated = excluded.last_updated",
        )
        .bind(&row.ticker)
        .bind(row.report_date)
        .bind(period_type_str(row.period_type))
        .bind(row.fiscal_year)
        .bind(row.fiscal_quarter)
        .bind(row.revenue)
        .bind(row.gross_profit)
        .bind(row.operating_income)
        .bind(row.net_income)
        .bind(row.ebitda)
        .bind(row.eps_diluted)
        .bind(row.book_value_per_share)
        .bind(row.total_assets)
        .bind(row.total_debt)
        .bind(row.total_equity)
        .bind(row.cash)
        .bind(row.operating_cash_flow)
        .bind(row.free_cash_flow)
        .bind(row.capex)
        .bind(row.shares_outstanding)
        .bind(row.shares_float)
        .bind(&row.data_source)
        .bind(row.last_updated)
        .execute(&mut *tx)
        .await
        .map_err(Self::map_db_err)?;
        tx.commit().await.map_err(Self::map_db_err)?;
        Ok(())
    }

    async fn upsert_ratios(&self, row: &Ratios) -> Result<(), PipelineError> {
        let mut tx = self.pool.begin().await.map_err(Self::map_db_err)?;
        sqlx::query(
            "INSERT INTO financial_ratios
                (ticker, calculation_date, pe, pb, ps, ev_ebitda, peg, roe, roa, roic,
                 gross_margin, operating_margin, net_margin, debt_to_equity, current_ratio,
                 quick_ratio, interest_coverage, altman_z_score, asset_turnover,
                 inventory_turnover, receivables_turnover, revenue_growth_yoy,
                 earnings_growth_yoy, fcf_growth_yoy, fcf_to_net_income,
                 cash_conversion_cycle, market_cap, enterprise_value, graham_number, explanations)
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20,
                     $21,$22,$23,$24,$25,$26,$27,$28,$29,$30)
             ON CONFLICT (ticker, calculation_date) DO UPDATE SET
                pe = excluded.pe, pb = excluded.pb, ps = excluded.ps,
                ev_ebitda = excluded.ev_ebitda, peg = excluded.peg, roe = excluded.roe,
                roa = excluded.roa, roic = excluded.roic, gross_margin = excluded.gross_margin,
                operating_margin = excluded.operating_margin, net_margin = excluded.net_margin,
                debt_to_equity = excluded.debt_to_equity, current_ratio = excluded.current_ratio,
                quick_ratio = excluded.quick_ratio, interest_coverage = excluded.interest_coverage,
                altman_z_score = excluded.altman_z_score, asset_turnover = excluded.asset_turnover,
                inventory_turnover = excluded.inventory_turnover,
                receivables_turnover = excluded.receivables_turnover,
                revenue_growth_yoy = excluded.revenue_growth_yoy,
                earnings_growth_yoy = excluded.earnings_growth_yoy,
                fcf_growth_yoy = excluded.fcf_growth_yoy,
                fcf_to_net_income = excluded.fcf_to_net_income,
                cash_conversion_cycle = excluded.cash_conversion_cycle,
                market_cap = excluded.market_cap, enterprise_value = excluded.enterprise_value,
                graham_number = excluded.graham_number, explanations = excluded.explanations",
        )
        .bind(&row.ticker)
        .bind(row.calculation_date)
        .bind(row.pe)
        .bind(row.pb)
        .bind(row.ps)
        .bind(row.ev_ebitda)
        .bind(row.peg)
        .bind(row.roe)
        .bind(row.roa)
        .bind(row.roic)
        .bind(row.gross_margin)
        .bind(row.operating_margin)
        .bind(row.net_margin)
        .bind(row.debt_to_equity)
        .bind(row.current_ratio)
        .bind(row.quick_ratio)
        .bind(row.interest_coverage)
        .bind(row.altman_z_score)
        .bind(row.asset_turnover)
        .bind(row.inventory_turnover)
        .bind(row.receivables_turnover)
        .bind(row.revenue_growth_yoy)
        .bind(row.earnings_growth_yoy)
        .bind(row.fcf_growth_yoy)
        .bind(row.fcf_to_net_income)
        .bind(row.cash_conversion_cycle)
        .bind(row.market_cap)
        .bind(row.enterprise_value)
        .bind(row.graham_number)
        .bind(row.explanations.join("; "))
        .execute(&mut *tx)
        .await
        .map_err(Self::map_db_err)?;
        tx.commit().await.map_err(Self::map_db_err)?;
        Ok(())
    }

    async fn upsert_scores(&self, row: &InvestorScores) -> Result<(), PipelineError> {
        let mut tx = self.pool.begin().await.map_err(Self::map_db_err)?;
        sqlx::query(
            "INSERT INTO investor_scores
                (ticker, calculation_date, conservative_score, garp_score, deep_value_score,
                 valuation_component, quality_component, financial_health_component,
                 profitability_component, growth_component, management_component,
                 risk_level, risk_factors, explanation)
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14)
             ON CONFLICT (ticker, calculation_date) DO UPDATE SET
                conservative_score = excluded.conservative_score,
                garp_score = excluded.garp_score, deep_value_score = excluded.deep_value_score,
                valuation_component = excluded.valuation_component,
                quality_component = excluded.quality_component,
                financial_health_component = excluded.financial_health_component,
                profitability_component = excluded.profitability_component,
                growth_component = excluded.growth_component,
                management_component = excluded.management_component,
                risk_level = excluded.risk_level, risk_factors = excluded.risk_factors,
                explanation = excluded.explanation",
        )
        .bind(&row.ticker)
        .bind(row.calculation_date)
        .bind(row.conservative_score)
        .bind(row.garp_score)
        .bind(row.deep_value_score)
        .bind(row.valuation_component)
        .bind(row.quality_component)
        .bind(row.financial_health_component)
        .bind(row.profitability_component)
        .bind(row.growth_component)
        .bind(row.management_component)
        .bind(risk_level_str(row.risk_level))
        .bind(row.risk_factors.join("; "))
        .bind(&row.explanation)
        .execute(&mut *tx)
        .await
        .map_err(Self::map_db_err)?;
        tx.commit().await.map_err(Self::map_db_err)?;
        Ok(())
    }

    async fn tickers_needing(&self, tag: TickerNeedTag, as_of: NaiveDate) -> Result<Vec<String>, PipelineError> {
        let today = as_of;
        let rows = match tag {
            TickerNeedTag::PriceToday => sqlx::query(
                "SELECT s.ticker FROM stocks s
                 WHERE s.active
                   AND NOT EXISTS (
                       SELECT 1 FROM daily_charts d WHERE d.ticker = s.ticker AND d.date = $1
                   )",
            )
            .bind(today)
            .fetch_all(&self.pool)
            .await
            .map_err(Self::map_db_err)?,

            TickerNeedTag::HistoryBelow(min_days) => sqlx::query(
                "SELECT s.ticker FROM stocks s
                 WHERE s.active
                   AND (SELECT COUNT(*) FROM daily_charts d WHERE d.ticker = s.ticker) < $1",
            )
            .bind(i64::from(min_days))
            .fetch_all(&self.pool)
            .await
            .map_err(Self::map_db_err)?,

            TickerNeedTag::FundamentalsStale => sqlx::query(
                "SELECT ticker FROM stocks
                 WHERE active
                   AND (fundamentals_last_update IS NULL
                        OR fundamentals_last_update < $1 - make_interval(days => $2))",
            )
            .bind(today)
            .bind(FUNDAMENTALS_STALE_DAYS)
            .fetch_all(&self.pool)
            .await
            .map_err(Self::map_db_err)?,

            TickerNeedTag::RatiosStale => sqlx::query(
                "SELECT s.ticker FROM stocks s
                 WHERE s.active
                   AND EXISTS (SELECT 1 FROM company_fundamentals f WHERE f.ticker = s.ticker)
                   AND (
                       NOT EXISTS (SELECT 1 FROM financial_ratios r WHERE r.ticker = s.ticker)
                       OR (SELECT MAX(r.calculation_date) FROM financial_ratios r WHERE r.ticker = s.ticker)
                          < (SELECT MAX(f.report_date) FROM company_fundamentals f WHERE f.ticker = s.ticker)
                   )",
            )
            .fetch_all(&self.pool)
            .await
            .map_err(Self::map_db_err)?,

            TickerNeedTag::DelistedSuspects => sqlx::query(
                "SELECT s.ticker FROM stocks s
                 WHERE s.active
                   AND COALESCE(
                       (SELECT MAX(d.date) FROM daily_charts d WHERE d.ticker = s.ticker),
                       $1 - make_interval(days => $2 + 1)
                   ) < $1 - make_interval(days => $2)",
            )
            .bind(today)
            .bind(DELISTED_GAP_DAYS)
            .fetch_all(&self.pool)
            .await
            .map_err(Self::map_db_err)?,
        };

        rows.into_iter().map(|r| r.try_get::<String, _>("ticker").map_err(Self::map_db_err)).collect()
    }

    async fn upsert_ticker(&self, ticker: &Ticker) -> Result<(), PipelineError> {
        let mut tx = self.pool.begin().await.map_err(Self::map_db_err)?;
        sqlx::query(
            "INSERT INTO stocks
                (ticker, active, sector, industry, market_cap_category, next_earnings_date,
                 fundamentals_last_update, data_priority)
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
             ON CONFLICT (ticker) DO UPDATE SET
                active = excluded.active, sector = excluded.sector, industry = excluded.industry,
                market_cap_category = excluded.market_cap_category,
                next_earnings_date = excluded.next_earnings_date,
                fundamentals_last_update = excluded.fundamentals_last_update,
                data_priority = excluded.data_priority",
        )
        .bind(&ticker.symbol)
        .bind(ticker.active)
        .bind(&ticker.sector)
        .bind(&ticker.industry)
        .bind(&ticker.market_cap_category)
        .bind(ticker.next_earnings_date)
        .bind(ticker.fundamentals_last_update)
        .bind(ticker.data_priority)
        .execute(&mut *tx)
        .await
        .map_err(Self::map_db_err)?;
        tx.commit().await.map_err(Self::map_db_err)?;
        Ok(())
    }

    async fn get_ticker(&self, ticker: &str) -> Result<Option<Ticker>, PipelineError> {
        let row = sqlx::query("SELECT * FROM stocks WHERE ticker = $1")
            .bind(ticker)
            .fetch_optional(&self.pool)
            .await
            .map_err(Self::map_db_err)?;
        row.map(row_to_ticker).transpose()
    }

    async fn mark_delisted(&self, ticker: &str) -> Result<(), PipelineError> {
        let mut tx = self.pool.begin().await.map_err(Self::map_db_err)?;
        sqlx::query("UPDATE stocks SET active = false WHERE ticker = $1")
            .bind(ticker)
            .execute(&mut *tx)
            .await
            .map_err(Self::map_db_err)?;
        tx.commit().await.map_err(Self::map_db_err)?;
        Ok(())
    }

    async fn upsert_earnings_calendar(&self, row: &EarningsCalendarRow) -> Result<(), PipelineError> {
        let mut tx = self.pool.begin().await.map_err(Self::map_db_err)?;
        sqlx::query(
            "INSERT INTO earnings_calendar
                (ticker, earnings_date, confirmed, eps_estimate, revenue_estimate,
                 priority_level, data_updated)
             VALUES ($1,$2,$3,$4,$5,$6,$7)
             ON CONFLICT (ticker, earnings_date) DO UPDATE SET
                confirmed = excluded.confirmed, eps_estimate = excluded.eps_estimate,
                revenue_estimate = excluded.revenue_estimate,
                priority_level = excluded.priority_level, data_updated = excluded.data_updated",
        )
        .bind(&row.ticker)
        .bind(row.earnings_date)
        .bind(row.confirmed)
        .bind(row.eps_estimate)
        .bind(row.revenue_estimate)
        .bind(row.priority_level)
        .bind(row.data_updated)
        .execute(&mut *tx)
        .await
        .map_err(Self::map_db_err)?;
        tx.commit().await.map_err(Self::map_db_err)?;
        Ok(())
    }

    async fn earnings_calendar_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<EarningsCalendarRow>, PipelineError> {
        let rows = sqlx::query(
            "SELECT * FROM earnings_calendar WHERE earnings_date BETWEEN $1 AND $2 ORDER BY earnings_date",
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(Self::map_db_err)?;
        rows.into_iter().map(row_to_earnings).collect()
    }

    async fn record_api_usage(&self, usage: &ApiUsage) -> Result<(), PipelineError> {
        sqlx::query(
            "INSERT INTO api_usage_tracking (provider, date, endpoint, calls_made, calls_limit, reset_time)
             VALUES ($1,$2,$3,$4,$5,$6)",
        )
        .bind(&usage.provider)
        .bind(usage.date)
        .bind(&usage.endpoint)
        .bind(usage.calls_made)
        .bind(usage.calls_limit)
        .bind(usage.reset_time)
        .execute(&self.pool)
        .await
        .map_err(Self::map_db_err)?;
        Ok(())
    }

    async fn api_calls_used(&self, provider: &str, date: NaiveDate) -> Result<i64, PipelineError> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(calls_made), 0) AS total FROM api_usage_tracking WHERE provider = $1 AND date = $2",
        )
        .bind(provider)
        .bind(date)
        .fetch_one(&self.pool)
        .await
        .map_err(Self::map_db_err)?;
        row.try_get::<i64, _>("total").map_err(Self::map_db_err)
    }

    async fn record_update_log(&self, entry: &UpdateLog) -> Result<(), PipelineError> {
        sqlx::query(
            "INSERT INTO update_log
                (update_type, ticker, status, error_message, records_processed,
                 execution_time_ms, started_at, completed_at)
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8)",
        )
        .bind(&entry.update_type)
        .bind(&entry.ticker)
        .bind(run_status_str(entry.status))
        .bind(&entry.error_message)
        .bind(entry.records_processed)
        .bind(entry.execution_time_ms)
        .bind(entry.started_at)
        .bind(entry.completed_at)
        .execute(&self.pool)
        .await
        .map_err(Self::map_db_err)?;
        Ok(())
    }

    async fn fundamentals_for_ticker(&self, ticker: &str) -> Result<Vec<Fundamentals>, PipelineError> {
        let rows = sqlx::query("SELECT * FROM company_fundamentals WHERE ticker = $1")
            .bind(ticker)
            .fetch_all(&self.pool)
            .await
            .map_err(Self::map_db_err)?;
        rows.into_iter().map(row_to_fundamentals).collect()
    }

    async fn update_log_completed(&self, update_type: &str, run_date: NaiveDate) -> Result<bool, PipelineError> {
        let row = sqlx::query(
            "SELECT EXISTS (
                 SELECT 1 FROM update_log
                 WHERE update_type = $1 AND started_at::date = $2
                   AND status IN ('success', 'skipped')
             ) AS present",
        )
        .bind(update_type)
        .bind(run_date)
        .fetch_one(&self.pool)
        .await
        .map_err(Self::map_db_err)?;
        row.try_get::<bool, _>("present").map_err(Self::map_db_err)
    }
}

fn run_status_str(status: ticker_types::RunStatus) -> &'static str {
    use ticker_types::RunStatus;
    match status {
        RunStatus::Success => "success",
        RunStatus::Partial => "partial",
        RunStatus::Failed => "failed",
        RunStatus::Aborted => "aborted",
        RunStatus::Skipped => "skipped",
    }
}

fn row_to_bar(row: sqlx::postgres::PgRow) -> Result<DailyBar, PipelineError> {
    let get_i32 = |name: &str| -> Result<i32, PipelineError> { row.try_get(name).map_err(PgStore::map_db_err) };
    let get_opt_i32 = |name: &str| -> Result<Option<i32>, PipelineError> { row.try_get(name).map_err(PgStore::map_db_err) };
    let get_opt_i64 = |name: &str| -> Result<Option<i64>, PipelineError> { row.try_get(name).map_err(PgStore::map_db_err) };

    let indicators = IndicatorVector {
        rsi_14: from_scaled_opt(get_opt_i32("rsi_14")?),
        ema_20: from_scaled_opt(get_opt_i32("ema_20")?),
        ema_50: from_scaled_opt(get_opt_i32("ema_50")?),
        ema_100: from_scaled_opt(get_opt_i32("ema_100")?),
        ema_200: from_scaled_opt(get_opt_i32("ema_200")?),
        macd_line: from_scaled_opt(get_opt_i32("macd_line")?),
        macd_signal: from_scaled_opt(get_opt_i32("macd_signal")?),
        macd_histogram: from_scaled_opt(get_opt_i32("macd_histogram")?),
        bb_upper: from_scaled_opt(get_opt_i32("bb_upper")?),
        bb_middle: from_scaled_opt(get_opt_i32("bb_middle")?),
        bb_lower: from_scaled_opt(get_opt_i32("bb_lower")?),
        stoch_k: from_scaled_opt(get_opt_i32("stoch_k")?),
        stoch_d: from_scaled_opt(get_opt_i32("stoch_d")?),
        cci_20: from_scaled_opt(get_opt_i32("cci_20")?),
        atr_14: from_scaled_opt(get_opt_i32("atr_14")?),
        di_plus_14: from_scaled_opt(get_opt_i32("di_plus_14")?),
        di_minus_14: from_scaled_opt(get_opt_i32("di_minus_14")?),
        dx_14: from_scaled_opt(get_opt_i32("dx_14")?),
        adx_14: from_scaled_opt(get_opt_i32("adx_14")?),
        vwap_20: from_scaled_opt(get_opt_i32("vwap_20")?),
        obv: from_scaled_wide_opt(get_opt_i64("obv")?),
        fib_236: from_scaled_opt(get_opt_i32("fib_236")?),
        fib_382: from_scaled_opt(get_opt_i32("fib_382")?),
        fib_500: from_scaled_opt(get_opt_i32("fib_500")?),
        fib_618: from_scaled_opt(get_opt_i32("fib_618")?),
        fib_786: from_scaled_opt(get_opt_i32("fib_786")?),
        pivot: from_scaled_opt(get_opt_i32("pivot")?),
        r1: from_scaled_opt(get_opt_i32("r1")?),
        r2: from_scaled_opt(get_opt_i32("r2")?),
        r3: from_scaled_opt(get_opt_i32("r3")?),
        s1: from_scaled_opt(get_opt_i32("s1")?),
        s2: from_scaled_opt(get_opt_i32("s2")?),
        s3: from_scaled_opt(get_opt_i32("s3")?),
        swing_high: from_scaled_opt(get_opt_i32("swing_high")?),
        swing_low: from_scaled_opt(get_opt_i32("swing_low")?),
    };

    Ok(DailyBar {
        ticker: row.try_get("ticker").map_err(PgStore::map_db_err)?,
        date: row.try_get("date").map_err(PgStore::map_db_err)?,
        open: from_scaled(get_i32("open")?),
        high: from_scaled(get_i32("high")?),
        low: from_scaled(get_i32("low")?),
        close: from_scaled(get_i32("close")?),
        volume: row.try_get("volume").map_err(PgStore::map_db_err)?,
        indicators,
    })
}

fn row_to_ticker(row: sqlx::postgres::PgRow) -> Result<Ticker, PipelineError> {
    Ok(Ticker {
        symbol: row.try_get("ticker").map_err(PgStore::map_db_err)?,
        active: row.try_get("active").map_err(PgStore::map_db_err)?,
        sector: row.try_get("sector").map_err(PgStore::map_db_err)?,
        industry: row.try_get("industry").map_err(PgStore::map_db_err)?,
        market_cap_category: row.try_get("market_cap_category").map_err(PgStore::map_db_err)?,
        next_earnings_date: row.try_get("next_earnings_date").map_err(PgStore::map_db_err)?,
        fundamentals_last_update: row.try_get("fundamentals_last_update").map_err(PgStore::map_db_err)?,
        data_priority: row.try_get("data_priority").map_err(PgStore::map_db_err)?,
    })
}

fn row_to_fundamentals(row: sqlx::postgres::PgRow) -> Result<Fundamentals, PipelineError> {
    Ok(Fundamentals {
        ticker: row.try_get("ticker").map_err(PgStore::map_db_err)?,
        report_date: row.try_get("report_date").map_err(PgStore::map_db_err)?,
        period_type: str_to_period_type(row.try_get::<String, _>("period_type").map_err(PgStore::map_db_err)?.as_str()),
        fiscal_year: row.try_get("fiscal_year").map_err(PgStore::map_db_err)?,
        fiscal_quarter: row.try_get("fiscal_quarter").map_err(PgStore::map_db_err)?,
        revenue: row.try_get("revenue").map_err(PgStore::map_db_err)?,
        gross_profit: row.try_get("gross_profit").map_err(PgStore::map_db_err)?,
        operating_income: row.try_get("operating_income").map_err(PgStore::map_db_err)?,
        net_income: row.try_get("net_income").map_err(PgStore::map_db_err)?,
        ebitda: row.try_get("ebitda").map_err(PgStore::map_db_err)?,
        eps_diluted: row.try_get("eps_diluted").map_err(PgStore::map_db_err)?,
        book_value_per_share: row.try_get("book_value_per_share").map_err(PgStore::map_db_err)?,
        total_assets: row.try_get("total_assets").map_err(PgStore::map_db_err)?,
        total_debt: row.try_get("total_debt").map_err(PgStore::map_db_err)?,
        total_equity: row.try_get("total_equity").map_err(PgStore::map_db_err)?,
        cash: row.try_get("cash").map_err(PgStore::map_db_err)?,
        operating_cash_flow: row.try_get("operating_cash_flow").map_err(PgStore::map_db_err)?,
        free_cash_flow: row.try_get("free_cash_flow").map_err(PgStore::map_db_err)?,
        capex: row.try_get("capex").map_err(PgStore::map_db_err)?,
        shares_outstanding: row.try_get("shares_outstanding").map_err(PgStore::map_db_err)?,
        shares_float: row.try_get("shares_float").map_err(PgStore::map_db_err)?,
        data_source: row.try_get("data_source").map_err(PgStore::map_db_err)?,
        last_updated: row.try_get("last_updated").map_err(PgStore::map_db_err)?,
    })
}

fn row_to_earnings(row: sqlx::postgres::PgRow) -> Result<EarningsCalendarRow, PipelineError> {
    Ok(EarningsCalendarRow {
        ticker: row.try_get("ticker").map_err(PgStore::map_db_err)?,
        earnings_date: row.try_get("earnings_date").map_err(PgStore::map_db_err)?,
        confirmed: row.try_get("confirmed").map_err(PgStore::map_db_err)?,
        eps_estimate: row.try_get::<Option<Decimal>, _>("eps_estimate").map_err(PgStore::map_db_err)?,
        revenue_estimate: row.try_get::<Option<Decimal>, _>("revenue_estimate").map_err(PgStore::map_db_err)?,
        priority_level: row.try_get("priority_level").map_err(PgStore::map_db_err)?,
        data_updated: row.try_get("data_updated").map_err(PgStore::map_db_err)?,
    })
}
