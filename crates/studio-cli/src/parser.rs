use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use chrono_english::{parse_date_string, Dialect};
use chrono_tz::Tz;

const DATE_TIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S"];

/// Parses a wall-clock time in the studio's timezone.
///
/// Accepts `YYYY-MM-DD HH:MM`, a bare `YYYY-MM-DD` (midnight) or a phrase
/// such as `tomorrow 9am`, resolved relative to `now`.
pub fn parse_datetime(input: &str, now: DateTime<Tz>) -> Result<NaiveDateTime> {
    let input = input.trim();
    for format in DATE_TIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(input, format) {
            return Ok(parsed);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN));
    }

    parse_date_string(input, now, Dialect::Uk)
        .map(|parsed| parsed.naive_local())
        .map_err(|e| anyhow!("Failed to parse date '{}': {}", input, e))
}

/// Parses a calendar day; any time of day in the input is dropped.
pub fn parse_date(input: &str, now: DateTime<Tz>) -> Result<NaiveDate> {
    parse_datetime(input, now).map(|parsed| parsed.date())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn monday_noon() -> DateTime<Tz> {
        chrono_tz::UTC.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[rstest]
    #[case("2024-03-04 18:30", at(2024, 3, 4, 18, 30))]
    #[case("2024-03-04T18:30", at(2024, 3, 4, 18, 30))]
    #[case(" 2024-03-04 ", at(2024, 3, 4, 0, 0))]
    fn test_explicit_formats(#[case] input: &str, #[case] expected: NaiveDateTime) {
        assert_eq!(parse_datetime(input, monday_noon()).unwrap(), expected);
    }

    #[test]
    fn test_natural_language_is_relative_to_now() {
        let parsed = parse_date("tomorrow", monday_noon()).unwrap();
        assert_eq!(parsed, NaiveDate::from_ymd_opt(2024, 1, 16).unwrap());
    }

    #[test]
    fn test_garbage_is_an_error() {
        let err = parse_datetime("whenever", monday_noon()).unwrap_err();
        assert!(err.to_string().contains("whenever"));
    }
}
