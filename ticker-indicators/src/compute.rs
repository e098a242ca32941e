//! The full indicator computation entry point: given an ascending bar
//! series for one ticker, produce the `IndicatorVector` for the latest bar.

use rust_decimal::{Decimal, MathematicalOps};
use ticker_core::PipelineError;
use ticker_types::{DailyBar, IndicatorVector};

use crate::accumulators::{ema_trajectory, SimpleMovingAverage, WilderSmoother};

const RSI_PERIOD: usize = 14;
const ATR_PERIOD: usize = 14;
const ADX_PERIOD: usize = 14;
const BOLLINGER_PERIOD: usize = 20;
const STOCH_K_PERIOD: usize = 14;
const STOCH_D_PERIOD: usize = 3;
const CCI_PERIOD: usize = 20;
const VWAP_PERIOD: usize = 20;
const FIB_PERIOD: usize = 20;
const PIVOT_PERIOD: usize = 20;

/// Compute the latest-bar indicator vector from an ascending `bars` series.
///
/// # Errors
/// Returns `PipelineError::Data` if `bars` contains duplicate dates (an
/// invariant violation the caller must de-duplicate upstream) or a negative
/// volume.
pub fn compute(bars: &[DailyBar]) -> Result<IndicatorVector, PipelineError> {
    validate(bars)?;
    if bars.is_empty() {
        return Ok(IndicatorVector::default());
    }

    let closes: Vec<Decimal> = bars.iter().map(|b| b.close).collect();
    let n = bars.len();

    let mut vector = IndicatorVector::default();
    compute_rsi(&closes, &mut vector);
    compute_emas(&closes, &mut vector);
    compute_macd(&closes, &mut vector);
    compute_bollinger(&closes, &mut vector);
    compute_stochastic(bars, &mut vector);
    compute_cci(bars, &mut vector);
    compute_atr(bars, &mut vector);
    compute_adx(bars, &mut vector);
    compute_vwap(bars, &mut vector);
    compute_obv(bars, &mut vector);
    if n >= FIB_PERIOD {
        compute_fibonacci(bars, &mut vector);
    }
    if n >= PIVOT_PERIOD {
        compute_pivot(bars, &mut vector);
    }
    Ok(vector)
}

fn validate(bars: &[DailyBar]) -> Result<(), PipelineError> {
    for bar in bars {
        if bar.volume < 0 {
            return Err(PipelineError::Data(format!(
                "negative volume for {} on {}",
                bar.ticker, bar.date
            )));
        }
    }
    for window in bars.windows(2) {
        if window[0].date == window[1].date {
            return Err(PipelineError::Data(format!(
                "duplicate date {} in bar series for {}",
                window[0].date, window[0].ticker
            )));
        }
    }
    Ok(())
}

fn typical_price(bar: &DailyBar) -> Decimal {
    (bar.high + bar.low + bar.close) / Decimal::from(3u32)
}

fn true_range(curr: &DailyBar, prev: &DailyBar) -> Decimal {
    let a = curr.high - curr.low;
    let b = (curr.high - prev.close).abs();
    let c = (curr.low - prev.close).abs();
    a.max(b).max(c)
}

fn compute_rsi(closes: &[Decimal], out: &mut IndicatorVector) {
    if closes.len() < RSI_PERIOD + 1 {
        return;
    }
    let mut gains = WilderSmoother::new(RSI_PERIOD);
    let mut losses = WilderSmoother::new(RSI_PERIOD);
    let mut avg_gain = None;
    let mut avg_loss = None;
    for w in closes.windows(2) {
        let delta = w[1] - w[0];
        let gain = delta.max(Decimal::ZERO);
        let loss = (-delta).max(Decimal::ZERO);
        avg_gain = gains.update(gain);
        avg_loss = losses.update(loss);
    }
    if let (Some(_), Some(_)) = (avg_gain, avg_loss) {
        let avg_gain = gains.average().unwrap_or(Decimal::ZERO);
        let avg_loss = losses.average().unwrap_or(Decimal::ZERO);
        if avg_loss == Decimal::ZERO {
            out.rsi_14 = Some(Decimal::from(100u32));
        } else {
            let rs = avg_gain / avg_loss;
            out.rsi_14 = Some(Decimal::from(100u32) - Decimal::from(100u32) / (Decimal::ONE + rs));
        }
    }
}

fn compute_emas(closes: &[Decimal], out: &mut IndicatorVector) {
    out.ema_20 = ema_trajectory(closes, 20).last().copied().flatten();
    out.ema_50 = ema_trajectory(closes, 50).last().copied().flatten();
    out.ema_100 = ema_trajectory(closes, 100).last().copied().flatten();
    out.ema_200 = ema_trajectory(closes, 200).last().copied().flatten();
}

fn compute_macd(closes: &[Decimal], out: &mut IndicatorVector) {
    let ema12 = ema_trajectory(closes, 12);
    let ema26 = ema_trajectory(closes, 26);
    let macd_line: Vec<Decimal> = ema12
        .iter()
        .zip(ema26.iter())
        .filter_map(|(a, b)| match (a, b) {
            (Some(a), Some(b)) => Some(*a - *b),
            _ => None,
        })
        .collect();
    let Some(&macd_final) = macd_line.last() else {
        return;
    };
    out.macd_line = Some(macd_final);
    let signal_traj = ema_trajectory(&macd_line, 9);
    if let Some(Some(signal_final)) = signal_traj.last() {
        out.macd_signal = Some(*signal_final);
        out.macd_histogram = Some(macd_final - *signal_final);
    }
}

fn compute_bollinger(closes: &[Decimal], out: &mut IndicatorVector) {
    if closes.len() < BOLLINGER_PERIOD {
        return;
    }
    let window = &closes[closes.len() - BOLLINGER_PERIOD..];
    let mean = window.iter().sum::<Decimal>() / Decimal::from(BOLLINGER_PERIOD as u64);
    let variance = window.iter().map(|v| (*v - mean) * (*v - mean)).sum::<Decimal>()
        / Decimal::from(BOLLINGER_PERIOD as u64);
    let Some(stddev) = variance.sqrt() else {
        return;
    };
    out.bb_middle = Some(mean);
    out.bb_upper = Some(mean + Decimal::from(2u32) * stddev);
    out.bb_lower = Some(mean - Decimal::from(2u32) * stddev);
}

fn compute_stochastic(bars: &[DailyBar], out: &mut IndicatorVector) {
    let n = bars.len();
    if n < STOCH_K_PERIOD {
        return;
    }
    // %D needs three full %K readings, i.e. three 14-bar windows ending at
    // the last three bars.
    let readings = STOCH_D_PERIOD.min(n - STOCH_K_PERIOD + 1);
    let mut k_values = Vec::with_capacity(readings);
    for end in (n - readings)..n {
        let start = end + 1 - STOCH_K_PERIOD;
        let window = &bars[start..=end];
        let high14 = window.iter().map(|b| b.high).fold(Decimal::MIN, |a, b| a.max(b));
        let low14 = window.iter().map(|b| b.low).fold(Decimal::MAX, |a, b| a.min(b));
        if high14 == low14 {
            continue;
        }
        let k = Decimal::from(100u32) * (bars[end].close - low14) / (high14 - low14);
        k_values.push(k);
    }
    if let Some(&last_k) = k_values.last() {
        out.stoch_k = Some(last_k);
    }
    if k_values.len() == STOCH_D_PERIOD {
        let d = k_values.iter().sum::<Decimal>() / Decimal::from(k_values.len() as u64);
        out.stoch_d = Some(d);
    }
}

fn compute_cci(bars: &[DailyBar], out: &mut IndicatorVector) {
    let n = bars.len();
    if n < CCI_PERIOD {
        return;
    }
    let window = &bars[n - CCI_PERIOD..];
    let tps: Vec<Decimal> = window.iter().map(typical_price).collect();
    let sma_tp = tps.iter().sum::<Decimal>() / Decimal::from(CCI_PERIOD as u64);
    let mean_abs_dev =
        tps.iter().map(|tp| (*tp - sma_tp).abs()).sum::<Decimal>() / Decimal::from(CCI_PERIOD as u64);
    if mean_abs_dev == Decimal::ZERO {
        return;
    }
    let latest_tp = *tps.last().expect("non-empty window");
    out.cci_20 = Some((latest_tp - sma_tp) / (Decimal::new(15, 3) * mean_abs_dev));
}

fn compute_atr(bars: &[DailyBar], out: &mut IndicatorVector) {
    if bars.len() < ATR_PERIOD + 1 {
        return;
    }
    let mut atr = WilderSmoother::new(ATR_PERIOD);
    for w in bars.windows(2) {
        atr.update(true_range(&w[1], &w[0]));
    }
    out.atr_14 = atr.average();
}

fn compute_adx(bars: &[DailyBar], out: &mut IndicatorVector) {
    if bars.len() < 2 * ADX_PERIOD {
        return;
    }
    let mut dm_plus = WilderSmoother::new(ADX_PERIOD);
    let mut dm_minus = WilderSmoother::new(ADX_PERIOD);
    let mut tr = WilderSmoother::new(ADX_PERIOD);
    let mut dx_smoother = WilderSmoother::new(ADX_PERIOD);
    let mut last_adx = None;

    for w in bars.windows(2) {
        let (prev, curr) = (&w[0], &w[1]);
        let up_move = curr.high - prev.high;
        let down_move = prev.low - curr.low;
        let plus = if up_move > down_move && up_move > Decimal::ZERO {
            up_move
        } else {
            Decimal::ZERO
        };
        let minus = if down_move > up_move && down_move > Decimal::ZERO {
            down_move
        } else {
            Decimal::ZERO
        };
        let plus_sum = dm_plus.update(plus);
        let minus_sum = dm_minus.update(minus);
        let tr_sum = tr.update(true_range(curr, prev));

        if let (Some(plus_sum), Some(minus_sum), Some(tr_sum)) = (plus_sum, minus_sum, tr_sum) {
            if tr_sum == Decimal::ZERO {
                continue;
            }
            let di_plus = Decimal::from(100u32) * plus_sum / tr_sum;
            let di_minus = Decimal::from(100u32) * minus_sum / tr_sum;
            out.di_plus_14 = Some(di_plus);
            out.di_minus_14 = Some(di_minus);
            let di_sum = di_plus + di_minus;
            if di_sum == Decimal::ZERO {
                continue;
            }
            let dx = Decimal::from(100u32) * (di_plus - di_minus).abs() / di_sum;
            out.dx_14 = Some(dx);
            last_adx = dx_smoother.update(dx);
        }
    }
    if last_adx.is_some() {
        out.adx_14 = dx_smoother.average();
    }
}

fn compute_vwap(bars: &[DailyBar], out: &mut IndicatorVector) {
    let n = bars.len();
    if n < VWAP_PERIOD {
        return;
    }
    let window = &bars[n - VWAP_PERIOD..];
    let volume_sum: Decimal = window.iter().map(|b| Decimal::from(b.volume)).sum();
    if volume_sum == Decimal::ZERO {
        return;
    }
    let weighted: Decimal = window
        .iter()
        .map(|b| typical_price(b) * Decimal::from(b.volume))
        .sum();
    out.vwap_20 = Some(weighted / volume_sum);
}

fn compute_obv(bars: &[DailyBar], out: &mut IndicatorVector) {
    if bars.len() < 2 {
        return;
    }
    let mut obv = Decimal::ZERO;
    for w in bars.windows(2) {
        match w[1].close.cmp(&w[0].close) {
            std::cmp::Ordering::Greater => obv += Decimal::from(w[1].volume),
            std::cmp::Ordering::Less => obv -= Decimal::from(w[1].volume),
            std::cmp::Ordering::Equal => {}
        }
    }
    out.obv = Some(obv);
}

fn swing_high_low(window: &[DailyBar]) -> (Decimal, Decimal) {
    let high = window.iter().map(|b| b.high).fold(Decimal::MIN, |a, b| a.max(b));
    let low = window.iter().map(|b| b.low).fold(Decimal::MAX, |a, b| a.min(b));
    (high, low)
}

fn compute_fibonacci(bars: &[DailyBar], out: &mut IndicatorVector) {
    let window = &bars[bars.len() - FIB_PERIOD..];
    let (high, low) = swing_high_low(window);
    let range = high - low;
    if range <= Decimal::ZERO {
        return;
    }
    out.fib_236 = Some(high - range * Decimal::new(236, 3));
    out.fib_382 = Some(high - range * Decimal::new(382, 3));
    out.fib_500 = Some(high - range * Decimal::new(5, 1));
    out.fib_618 = Some(high - range * Decimal::new(618, 3));
    out.fib_786 = Some(high - range * Decimal::new(786, 3));
}

fn compute_pivot(bars: &[DailyBar], out: &mut IndicatorVector) {
    let prior = &bars[bars.len() - 2];
    let (h, l, c) = (prior.high, prior.low, prior.close);
    let pivot = (h + l + c) / Decimal::from(3u32);
    out.pivot = Some(pivot);
    out.r1 = Some(Decimal::from(2u32) * pivot - l);
    out.s1 = Some(Decimal::from(2u32) * pivot - h);
    out.r2 = Some(pivot + (h - l));
    out.s2 = Some(pivot - (h - l));
    out.r3 = Some(h + Decimal::from(2u32) * (pivot - l));
    out.s3 = Some(l - Decimal::from(2u32) * (h - pivot));

    let window = &bars[bars.len() - FIB_PERIOD..];
    let (swing_high, swing_low) = swing_high_low(window);
    out.swing_high = Some(swing_high);
    out.swing_low = Some(swing_low);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn bar(ticker: &str, day: u32, close: Decimal) -> DailyBar {
        DailyBar {
            ticker: ticker.to_string(),
            date: NaiveDate::from_ymd_opt(2026, 1, 1).expect("valid date") + chrono::Duration::days(i64::from(day)),
            open: close - dec!(0.1),
            high: close + dec!(0.5),
            low: close - dec!(0.5),
            close,
            volume: 1_000_000,
            indicators: IndicatorVector::default(),
        }
    }

    fn series(count: u32) -> Vec<DailyBar> {
        (0..count)
            .map(|i| bar("AAA", i, dec!(100) + Decimal::from(i)))
            .collect()
    }

    #[test]
    fn empty_series_yields_empty_vector() {
        let vector = compute(&[]).expect("empty series is valid");
        assert!(vector.is_empty());
    }

    #[test]
    fn insufficient_history_leaves_fields_none() {
        let bars = series(5);
        let vector = compute(&bars).expect("valid series");
        assert!(vector.rsi_14.is_none());
        assert!(vector.ema_20.is_none());
        assert!(vector.bb_upper.is_none());
    }

    #[test]
    fn duplicate_dates_are_rejected() {
        let mut bars = series(5);
        bars[1].date = bars[0].date;
        let err = compute(&bars).expect_err("duplicate dates must raise");
        assert!(matches!(err, PipelineError::Data(_)));
    }

    #[test]
    fn negative_volume_is_rejected() {
        let mut bars = series(5);
        bars[0].volume = -1;
        let err = compute(&bars).expect_err("negative volume must raise");
        assert!(matches!(err, PipelineError::Data(_)));
    }

    #[test]
    fn sufficient_history_populates_core_indicators() {
        let bars = series(250);
        let vector = compute(&bars).expect("valid series");
        assert!(vector.rsi_14.is_some());
        assert!(vector.ema_200.is_some());
        assert!(vector.macd_histogram.is_some());
        assert!(vector.bb_upper.is_some());
        assert!(vector.atr_14.is_some());
        assert!(vector.adx_14.is_some());
        assert!(vector.pivot.is_some());
        assert!(vector.fib_500.is_some());
    }

    #[test]
    fn constant_price_series_yields_none_cci_due_to_zero_deviation() {
        let bars: Vec<DailyBar> = (0..25).map(|i| bar("FLAT", i, dec!(50))).collect();
        let vector = compute(&bars).expect("valid series");
        assert!(vector.cci_20.is_none());
    }
}
