//! Fundamentals refresh trigger policy (spec.md §4.6).

use chrono::{Duration, NaiveDateTime};
use ticker_types::EarningsCalendarRow;

const STALE_AFTER_DAYS: i64 = 90;
const EARNINGS_WINDOW_DAYS: i64 = 7;

/// Whether a Fundamentals refresh is warranted for a ticker right now.
#[must_use]
pub fn needs_refresh(
    fundamentals_last_update: Option<NaiveDateTime>,
    now: NaiveDateTime,
    earnings_row: Option<&EarningsCalendarRow>,
    explicitly_prioritized: bool,
) -> bool {
    let Some(last_update) = fundamentals_last_update else {
        return true;
    };
    if now - last_update > Duration::days(STALE_AFTER_DAYS) {
        return true;
    }
    if let Some(row) = earnings_row {
        let days_since_earnings = (now.date() - row.earnings_date).num_days();
        if (0..=EARNINGS_WINDOW_DAYS).contains(&days_since_earnings) && !row.data_updated {
            return true;
        }
    }
    explicitly_prioritized
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .expect("valid date")
            .and_hms_opt(0, 0, 0)
            .expect("valid time")
    }

    #[test]
    fn no_prior_row_always_refreshes() {
        assert!(needs_refresh(None, dt(2026, 1, 1), None, false));
    }

    #[test]
    fn stale_after_ninety_days_refreshes() {
        let last = dt(2025, 1, 1);
        let now = dt(2025, 4, 15);
        assert!(needs_refresh(Some(last), now, None, false));
    }

    #[test]
    fn fresh_row_with_no_trigger_does_not_refresh() {
        let last = dt(2026, 1, 1);
        let now = dt(2026, 1, 10);
        assert!(!needs_refresh(Some(last), now, None, false));
    }

    #[test]
    fn recent_earnings_with_stale_flag_refreshes() {
        let last = dt(2026, 1, 1);
        let now = dt(2026, 1, 10);
        let row = EarningsCalendarRow {
            ticker: "AAA".to_string(),
            earnings_date: now.date() - chrono::Duration::days(2),
            confirmed: true,
            eps_estimate: None,
            revenue_estimate: None,
            priority_level: 5,
            data_updated: false,
        };
        assert!(needs_refresh(Some(last), now, Some(&row), false));
    }

    #[test]
    fn recent_earnings_already_updated_does_not_refresh() {
        let last = dt(2026, 1, 1);
        let now = dt(2026, 1, 10);
        let row = EarningsCalendarRow {
            ticker: "AAA".to_string(),
            earnings_date: now.date() - chrono::Duration::days(2),
            confirmed: true,
            eps_estimate: None,
            revenue_estimate: None,
            priority_level: 5,
            data_updated: true,
        };
        assert!(!needs_refresh(Some(last), now, Some(&row), false));
    }

    #[test]
    fn explicit_prioritisation_overrides_everything_else() {
        let last = dt(2026, 1, 1);
        let now = dt(2026, 1, 10);
        assert!(needs_refresh(Some(last), now, None, true));
    }
}
