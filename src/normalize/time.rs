//! Time code parsing

use once_cell::sync::Lazy;
use regex::Regex;

use super::{NormalizeError, NormalizeResult};

static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([0-9]{4})$").unwrap());
static QUARTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([0-9]{4})Q([1-4])$").unwrap());
static MONTH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([0-9]{4})M([0-9]{1,2})$").unwrap());
static YEAR_MONTH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([0-9]{4})-([0-9]{2})$").unwrap());
static ANY_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]{4}").unwrap());

/// Year with optional quarter or month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimePeriod {
    /// Calendar year
    pub year: i32,
    /// Quarter 1-4
    pub quarter: Option<u8>,
    /// Month 1-12
    pub month: Option<u8>,
}

impl TimePeriod {
    /// Annual period.
    pub fn year(year: i32) -> Self {
        Self {
            year,
            quarter: None,
            month: None,
        }
    }
}

/// Outcome of [`parse_time_code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedTime {
    /// Resolved period
    pub period: TimePeriod,
    /// Only the year was recovered from an unrecognized format
    pub partial: bool,
}

/// Parse a PxWeb time code.
///
/// Recognized forms, tried in order: `2023`, `2023Q2`, `2023M06`, `2023-06`.
/// Anything else falls back to the first four-digit run as the year and is
/// marked `partial`. Month forms outside 1-12 also take the fallback.
///
/// ```
/// use statfin_ingest::normalize::parse_time_code;
///
/// let parsed = parse_time_code("2023Q2").unwrap();
/// assert_eq!((parsed.period.year, parsed.period.quarter), (2023, Some(2)));
/// assert!(parse_time_code("abc").is_err());
/// ```
pub fn parse_time_code(code: &str) -> NormalizeResult<ParsedTime> {
    if let Some(caps) = YEAR.captures(code) {
        return Ok(exact(TimePeriod::year(number(&caps[1]))));
    }

    if let Some(caps) = QUARTER.captures(code) {
        return Ok(exact(TimePeriod {
            quarter: Some(number(&caps[2])),
            ..TimePeriod::year(number(&caps[1]))
        }));
    }

    for pattern in [&*MONTH, &*YEAR_MONTH] {
        if let Some(caps) = pattern.captures(code) {
            let month: u8 = number(&caps[2]);
            if (1..=12).contains(&month) {
                return Ok(exact(TimePeriod {
                    month: Some(month),
                    ..TimePeriod::year(number(&caps[1]))
                }));
            }
        }
    }

    ANY_YEAR
        .find(code)
        .map(|m| ParsedTime {
            period: TimePeriod::year(number(m.as_str())),
            partial: true,
        })
        .ok_or_else(|| NormalizeError::UnresolvableTimeCode(code.to_string()))
}

fn exact(period: TimePeriod) -> ParsedTime {
    ParsedTime {
        period,
        partial: false,
    }
}

/// Digits already matched by a regex; at most four, so they always fit.
fn number<T: std::str::FromStr + Default>(digits: &str) -> T {
    digits.parse().unwrap_or_default()
}
