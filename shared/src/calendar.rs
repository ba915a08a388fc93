//! Calendar helpers for the sales week and monthly reporting.
//!
//! The working week runs Saturday through Thursday; Friday is not a
//! sales day and belongs to the week that started the Saturday before.

use chrono::{Datelike, Duration, NaiveDate};

/// Number of sales days shown per week
pub const WEEK_DAYS: usize = 6;

/// Saturday that opens the sales week containing `date`
pub fn week_start(date: NaiveDate) -> NaiveDate {
    // Monday = 0 .. Sunday = 6
    let weekday = i64::from(date.weekday().num_days_from_monday());
    let back = match weekday {
        5 => 0,
        6 => 1,
        d => d + 2,
    };
    date - Duration::days(back)
}

/// The six sales days of the week containing `date`
pub fn week_dates(date: NaiveDate) -> [NaiveDate; WEEK_DAYS] {
    let start = week_start(date);
    let mut days = [start; WEEK_DAYS];
    for (i, day) in days.iter_mut().enumerate() {
        *day = start + Duration::days(i as i64);
    }
    days
}

/// First day of the month containing `date`
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_saturday_starts_its_own_week() {
        let sat = d(2024, 6, 1);
        assert_eq!(sat.weekday(), Weekday::Sat);
        assert_eq!(week_start(sat), sat);
    }

    #[test]
    fn test_sunday_goes_back_one_day() {
        assert_eq!(week_start(d(2024, 6, 2)), d(2024, 6, 1));
    }

    #[test]
    fn test_weekdays_go_back_to_saturday() {
        // Mon 3 June .. Fri 7 June 2024
        for day in 3..=7 {
            assert_eq!(week_start(d(2024, 6, day)), d(2024, 6, 1));
        }
    }

    #[test]
    fn test_week_dates_span_saturday_to_thursday() {
        let days = week_dates(d(2024, 6, 5));
        assert_eq!(days[0], d(2024, 6, 1));
        assert_eq!(days[5], d(2024, 6, 6));
        assert_eq!(days[5].weekday(), Weekday::Thu);
    }

    #[test]
    fn test_month_start() {
        assert_eq!(month_start(d(2024, 2, 29)), d(2024, 2, 1));
    }
}
