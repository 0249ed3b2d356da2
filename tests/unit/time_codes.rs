//! Unit tests for time code parsing

use statfin_ingest::normalize::{parse_time_code, NormalizeError, TimePeriod};

fn period(code: &str) -> TimePeriod {
    parse_time_code(code).unwrap().period
}

#[test]
fn test_annual() {
    assert_eq!(period("1990"), TimePeriod::year(1990));
    assert!(!parse_time_code("1990").unwrap().partial);
}

#[test]
fn test_quarterly() {
    for q in 1..=4u8 {
        let p = period(&format!("2024Q{q}"));
        assert_eq!((p.year, p.quarter, p.month), (2024, Some(q), None));
    }
}

#[test]
fn test_monthly_forms() {
    assert_eq!(period("2024M01").month, Some(1));
    assert_eq!(period("2024M12").month, Some(12));
    assert_eq!(period("2024-03").month, Some(3));
    assert_eq!(period("2024-03").quarter, None);
}

#[test]
fn test_month_out_of_range_is_partial() {
    let parsed = parse_time_code("2024M00").unwrap();
    assert!(parsed.partial);
    assert_eq!(parsed.period, TimePeriod::year(2024));
}

#[test]
fn test_embedded_year_is_partial() {
    let parsed = parse_time_code("2015-2017").unwrap();
    assert!(parsed.partial);
    assert_eq!(parsed.period.year, 2015);
}

#[test]
fn test_no_year() {
    assert_eq!(
        parse_time_code("Q1"),
        Err(NormalizeError::UnresolvableTimeCode("Q1".to_string()))
    );
}

#[test]
fn test_periods_order_chronologically_within_granularity() {
    assert!(period("2023Q4") < period("2024Q1"));
    assert!(period("2024M02") < period("2024M10"));
}
