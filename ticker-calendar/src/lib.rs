//! NYSE trading-day calendar: pure date arithmetic, no I/O.
//!
//! Consulted by the Orchestrator to decide whether a run is a full
//! trading-day run (six phases) or a non-trading-day run (backfill and
//! delisting sweep only).

use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// Result of a trading-day lookup for a single date (spec.md §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradingDayInfo {
    pub was_trading_day: bool,
    pub had_early_close: bool,
    pub previous_trading_day: NaiveDate,
    pub next_trading_day: NaiveDate,
}

/// NYSE holiday/half-day calendar. Stateless; holidays are computed
/// algorithmically per year rather than tabulated, so any year is supported.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarketCalendar;

impl MarketCalendar {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Full trading-day lookup for `date`.
    #[must_use]
    pub fn trading_day_info(&self, date: NaiveDate) -> TradingDayInfo {
        TradingDayInfo {
            was_trading_day: self.is_trading_day(date),
            had_early_close: self.is_half_day(date),
            previous_trading_day: self.previous_trading_day(date),
            next_trading_day: self.next_trading_day(date),
        }
    }

    #[must_use]
    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        !is_weekend(date) && !is_holiday(date)
    }

    #[must_use]
    pub fn is_half_day(&self, date: NaiveDate) -> bool {
        self.is_trading_day(date) && is_half_day_date(date)
    }

    #[must_use]
    pub fn previous_trading_day(&self, date: NaiveDate) -> NaiveDate {
        let mut cursor = date - Duration::days(1);
        while !self.is_trading_day(cursor) {
            cursor -= Duration::days(1);
        }
        cursor
    }

    #[must_use]
    pub fn next_trading_day(&self, date: NaiveDate) -> NaiveDate {
        let mut cursor = date + Duration::days(1);
        while !self.is_trading_day(cursor) {
            cursor += Duration::days(1);
        }
        cursor
    }
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Shift a holiday observed on a weekend to its NYSE-observed weekday:
/// Saturday holidays are observed the preceding Friday, Sunday holidays the
/// following Monday.
fn observed(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date - Duration::days(1),
        Weekday::Sun => date + Duration::days(1),
        _ => date,
    }
}

/// The `n`th occurrence of `weekday` in `year`-`month` (1-indexed).
fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: u32) -> NaiveDate {
    let first = NaiveDate::from_ymd_opt(year, month, 1).expect("valid month");
    let offset = (7 + weekday.num_days_from_sunday() - first.weekday().num_days_from_sunday()) % 7;
    first + Duration::days(i64::from(offset) + 7 * i64::from(n - 1))
}

/// The last occurrence of `weekday` in `year`-`month`.
fn last_weekday(year: i32, month: u32, weekday: Weekday) -> NaiveDate {
    let next_month_first = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .expect("valid month");
    let mut cursor = next_month_first - Duration::days(1);
    while cursor.weekday() != weekday {
        cursor -= Duration::days(1);
    }
    cursor
}

/// Easter Sunday via the anonymous Gregorian algorithm.
fn easter_sunday(year: i32) -> NaiveDate {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    NaiveDate::from_ymd_opt(year, month as u32, day as u32).expect("valid Easter date")
}

fn good_friday(year: i32) -> NaiveDate {
    easter_sunday(year) - Duration::days(2)
}

fn is_holiday(date: NaiveDate) -> bool {
    let year = date.year();
    let fixed = [
        observed(NaiveDate::from_ymd_opt(year, 1, 1).expect("valid date")), // New Year's Day
        nth_weekday(year, 1, Weekday::Mon, 3),                              // MLK Day
        nth_weekday(year, 2, Weekday::Mon, 3),                              // Washington's Birthday
        good_friday(year),
        last_weekday(year, 5, Weekday::Mon),                                // Memorial Day
        observed(NaiveDate::from_ymd_opt(year, 6, 19).expect("valid date")), // Juneteenth
        observed(NaiveDate::from_ymd_opt(year, 7, 4).expect("valid date")), // Independence Day
        nth_weekday(year, 9, Weekday::Mon, 1),                              // Labor Day
        nth_weekday(year, 11, Weekday::Thu, 4),                             // Thanksgiving
        observed(NaiveDate::from_ymd_opt(year, 12, 25).expect("valid date")), // Christmas
    ];
    fixed.contains(&date)
}

/// NYSE early-close (1:00pm ET) sessions: the day after Thanksgiving, and
/// Christmas Eve when it falls on a weekday.
fn is_half_day_date(date: NaiveDate) -> bool {
    let year = date.year();
    let day_after_thanksgiving = nth_weekday(year, 11, Weekday::Thu, 4) + Duration::days(1);
    if date == day_after_thanksgiving {
        return true;
    }
    let christmas_eve = NaiveDate::from_ymd_opt(year, 12, 24).expect("valid date");
    !is_weekend(christmas_eve) && date == christmas_eve
}
