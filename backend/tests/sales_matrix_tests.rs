//! Weekly sales matrix tests
//!
//! Covers the sales week calendar, single cell edits and the pricing of
//! sale totals:
//! - every date maps into a Saturday-to-Thursday week
//! - cell edits move stock only on complete sales
//! - totals follow the vendor's price tier

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::calendar::{month_start, week_dates, week_start, WEEK_DAYS};
use shared::stock::cell_delta;
use shared::{line_total, merge_lines, LineItem, ProductPrices, TransactionKind, TransactionStatus, VendorType};
use uuid::Uuid;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn prices() -> ProductPrices {
    ProductPrices {
        factory: Decimal::new(9500, 2),
        wholesale: Decimal::new(11000, 2),
        retail: Decimal::new(12500, 2),
        supermarket: Decimal::new(12000, 2),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod calendar_tests {
    use super::*;

    #[test]
    fn test_friday_belongs_to_the_week_before() {
        let friday = date(2024, 3, 8);
        assert_eq!(friday.weekday(), Weekday::Fri);
        assert_eq!(week_start(friday), date(2024, 3, 2));
    }

    #[test]
    fn test_week_across_month_boundary() {
        let days = week_dates(date(2024, 3, 2));
        assert_eq!(days[0], date(2024, 3, 2));
        assert_eq!(days[5], date(2024, 3, 7));

        let days = week_dates(date(2024, 2, 1));
        assert_eq!(days[0], date(2024, 1, 27));
        assert_eq!(days[5], date(2024, 2, 1));
    }

    #[test]
    fn test_week_across_year_boundary() {
        let days = week_dates(date(2025, 1, 1));
        assert_eq!(days[0], date(2024, 12, 28));
        assert!(days.contains(&date(2025, 1, 1)));
    }

    #[test]
    fn test_month_start_for_dashboard() {
        assert_eq!(month_start(date(2024, 12, 31)), date(2024, 12, 1));
        assert_eq!(month_start(date(2024, 1, 1)), date(2024, 1, 1));
    }
}

#[cfg(test)]
mod cell_tests {
    use super::*;

    #[test]
    fn test_cell_edit_on_complete_sale() {
        // 0 → 10 takes ten out, 10 → 4 gives six back, 4 → 0 gives the rest back
        assert_eq!(cell_delta(TransactionKind::Sale, TransactionStatus::Complete, 0, 10), -10);
        assert_eq!(cell_delta(TransactionKind::Sale, TransactionStatus::Complete, 10, 4), 6);
        assert_eq!(cell_delta(TransactionKind::Sale, TransactionStatus::Complete, 4, 0), 4);
    }

    #[test]
    fn test_cell_edit_on_draft_or_cancelled_sale() {
        for status in [TransactionStatus::EnCours, TransactionStatus::Annule] {
            assert_eq!(cell_delta(TransactionKind::Sale, status, 3, 9), 0);
        }
    }

    #[test]
    fn test_merge_lines_drops_zero_cells() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let merged = merge_lines(&[
            LineItem::new(a, 2),
            LineItem::new(b, 0),
            LineItem::new(a, 5),
        ]);
        assert_eq!(merged, vec![LineItem::new(a, 7)]);
    }
}

#[cfg(test)]
mod pricing_tests {
    use super::*;

    #[test]
    fn test_vendor_tiers() {
        let p = prices();
        assert_eq!(p.for_vendor(VendorType::Gros), p.wholesale);
        assert_eq!(p.for_vendor(VendorType::Detail), p.retail);
        assert_eq!(p.for_vendor(VendorType::Superette), p.supermarket);
    }

    #[test]
    fn test_sale_total() {
        let p = prices();
        let total = line_total([
            (p.for_vendor(VendorType::Detail), 4),
            (p.for_vendor(VendorType::Detail), 2),
        ]);
        assert_eq!(total, Decimal::new(75000, 2));
    }

    #[test]
    fn test_default_vendor_type_is_detail() {
        assert_eq!(VendorType::default(), VendorType::Detail);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

fn date_strategy() -> impl Strategy<Value = NaiveDate> {
    (0i64..3650).prop_map(|offset| date(2020, 1, 1) + Duration::days(offset))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// The week always opens on a Saturday no more than six days back
    #[test]
    fn prop_week_start_is_recent_saturday(d in date_strategy()) {
        let start = week_start(d);
        prop_assert_eq!(start.weekday(), Weekday::Sat);
        prop_assert!(start <= d);
        prop_assert!((d - start).num_days() <= 6);
    }

    /// Six consecutive days, none of them a Friday
    #[test]
    fn prop_week_dates_skip_friday(d in date_strategy()) {
        let days = week_dates(d);
        prop_assert_eq!(days.len(), WEEK_DAYS);
        for pair in days.windows(2) {
            prop_assert_eq!((pair[1] - pair[0]).num_days(), 1);
        }
        prop_assert!(days.iter().all(|day| day.weekday() != Weekday::Fri));
        if d.weekday() != Weekday::Fri {
            prop_assert!(days.contains(&d));
        }
    }

    /// Every date of a week maps back to the same week
    #[test]
    fn prop_week_is_stable(d in date_strategy()) {
        let days = week_dates(d);
        for day in days {
            prop_assert_eq!(week_start(day), days[0]);
        }
    }

    /// A chain of cell edits nets to the difference between first and last value
    #[test]
    fn prop_cell_edits_telescope(values in prop::collection::vec(0i32..1000, 2..10)) {
        let total: i64 = values
            .windows(2)
            .map(|w| cell_delta(TransactionKind::Sale, TransactionStatus::Complete, w[0], w[1]))
            .sum();
        let first = i64::from(values[0]);
        let last = i64::from(values[values.len() - 1]);
        prop_assert_eq!(total, first - last);
    }

    /// Totals scale linearly with quantity
    #[test]
    fn prop_line_total_linear(qty in 0i32..10_000) {
        let unit = prices().retail;
        prop_assert_eq!(line_total([(unit, qty)]), unit * Decimal::from(qty));
    }
}
