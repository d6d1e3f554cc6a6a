//! Rolling per-agent call tallies over calendar windows.
//!
//! Each granularity resets on its own calendar boundary (local day, ISO week
//! starting Monday, calendar month, calendar year). Reset-then-increment is
//! one atomic statement per call: the CASE expressions read the old reset
//! markers, so two calls for the same agent landing in the same instant both
//! count and neither clobbers the other.

use chrono::{Datelike, Duration, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::CallDirection;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Granularity {
    Day,
    Week,
    Month,
    Year,
}

/// First date of the window containing `date` for the granularity.
/// A stored reset marker older than this means the boundary was crossed.
pub fn window_start(granularity: Granularity, date: NaiveDate) -> NaiveDate {
    match granularity {
        Granularity::Day => date,
        Granularity::Week => {
            date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
        }
        Granularity::Month => date.with_day(1).expect("first of month is valid"),
        Granularity::Year => {
            NaiveDate::from_ymd_opt(date.year(), 1, 1).expect("january first is valid")
        }
    }
}

const INBOUND_SQL: &str = r#"
    UPDATE voip_users SET
        today_inbound_calls   = CASE WHEN last_count_reset_date < $2 THEN 1 ELSE today_inbound_calls + 1 END,
        weekly_inbound_calls  = CASE WHEN last_week_reset_date  < $3 THEN 1 ELSE weekly_inbound_calls + 1 END,
        monthly_inbound_calls = CASE WHEN last_month_reset_date < $4 THEN 1 ELSE monthly_inbound_calls + 1 END,
        yearly_inbound_calls  = CASE WHEN last_year_reset_date  < $5 THEN 1 ELSE yearly_inbound_calls + 1 END,
        last_count_reset_date = GREATEST(last_count_reset_date, $2),
        last_week_reset_date  = GREATEST(last_week_reset_date, $3),
        last_month_reset_date = GREATEST(last_month_reset_date, $4),
        last_year_reset_date  = GREATEST(last_year_reset_date, $5)
    WHERE id = $1
"#;

const OUTBOUND_SQL: &str = r#"
    UPDATE voip_users SET
        today_outbound_calls   = CASE WHEN last_count_reset_date < $2 THEN 1 ELSE today_outbound_calls + 1 END,
        weekly_outbound_calls  = CASE WHEN last_week_reset_date  < $3 THEN 1 ELSE weekly_outbound_calls + 1 END,
        monthly_outbound_calls = CASE WHEN last_month_reset_date < $4 THEN 1 ELSE monthly_outbound_calls + 1 END,
        yearly_outbound_calls  = CASE WHEN last_year_reset_date  < $5 THEN 1 ELSE yearly_outbound_calls + 1 END,
        last_count_reset_date = GREATEST(last_count_reset_date, $2),
        last_week_reset_date  = GREATEST(last_week_reset_date, $3),
        last_month_reset_date = GREATEST(last_month_reset_date, $4),
        last_year_reset_date  = GREATEST(last_year_reset_date, $5)
    WHERE id = $1
"#;

/// Counts one call for the agent across all four windows, rolling any
/// window whose boundary has been crossed since its last reset.
pub async fn record_call(
    pool: &PgPool,
    agent_id: Uuid,
    direction: CallDirection,
) -> Result<(), sqlx::Error> {
    record_call_on(pool, agent_id, direction, Utc::now().date_naive()).await
}

pub async fn record_call_on(
    pool: &PgPool,
    agent_id: Uuid,
    direction: CallDirection,
    today: NaiveDate,
) -> Result<(), sqlx::Error> {
    let sql = match direction {
        CallDirection::Inbound => INBOUND_SQL,
        CallDirection::Outbound => OUTBOUND_SQL,
    };

    sqlx::query(sql)
        .bind(agent_id)
        .bind(window_start(Granularity::Day, today))
        .bind(window_start(Granularity::Week, today))
        .bind(window_start(Granularity::Month, today))
        .bind(window_start(Granularity::Year, today))
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn day_window_is_the_date_itself() {
        assert_eq!(window_start(Granularity::Day, date(2026, 8, 5)), date(2026, 8, 5));
    }

    #[test]
    fn week_window_starts_monday() {
        // 2026-08-03 is a Monday.
        assert_eq!(window_start(Granularity::Week, date(2026, 8, 3)), date(2026, 8, 3));
        assert_eq!(window_start(Granularity::Week, date(2026, 8, 5)), date(2026, 8, 3));
        assert_eq!(window_start(Granularity::Week, date(2026, 8, 9)), date(2026, 8, 3));
    }

    #[test]
    fn month_and_year_windows_start_on_the_first() {
        assert_eq!(window_start(Granularity::Month, date(2026, 8, 31)), date(2026, 8, 1));
        assert_eq!(window_start(Granularity::Year, date(2026, 8, 5)), date(2026, 1, 1));
    }

    /// A reset marker from yesterday means the daily window rolls over while
    /// the coarser windows keep accumulating.
    #[test]
    fn midweek_day_boundary_only_resets_the_daily_counter() {
        let yesterday = date(2026, 8, 4); // Tuesday
        let today = date(2026, 8, 5); // Wednesday

        assert!(yesterday < window_start(Granularity::Day, today));
        assert!(yesterday >= window_start(Granularity::Week, today));
        assert!(yesterday >= window_start(Granularity::Month, today));
        assert!(yesterday >= window_start(Granularity::Year, today));
    }

    #[test]
    fn sunday_to_monday_crosses_day_and_week_but_not_month() {
        let sunday = date(2026, 8, 9);
        let monday = date(2026, 8, 10);

        assert!(sunday < window_start(Granularity::Day, monday));
        assert!(sunday < window_start(Granularity::Week, monday));
        assert!(sunday >= window_start(Granularity::Month, monday));
    }

    #[test]
    fn new_year_crosses_every_window() {
        // 2024-01-01 is a Monday, so even the ISO week rolls over.
        let old_years_eve = date(2023, 12, 31);
        let new_year = date(2024, 1, 1);

        for granularity in [
            Granularity::Day,
            Granularity::Week,
            Granularity::Month,
            Granularity::Year,
        ] {
            assert!(
                old_years_eve < window_start(granularity, new_year),
                "{granularity:?} should roll over at the new year"
            );
        }
    }
}
