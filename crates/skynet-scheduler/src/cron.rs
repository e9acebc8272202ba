//! Hand-rolled 5-field cron evaluator (minute hour day-of-month month day-of-week).
//!
//! Supports `*`, `*/N` steps, comma lists, and `N-M` ranges per field, with an
//! optional IANA timezone that falls back to UTC when absent or unrecognised.

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};

/// Parse an IANA timezone name, falling back to UTC for anything unknown.
pub fn parse_tz(tz: Option<&str>) -> chrono_tz::Tz {
    tz.and_then(|s| s.parse::<chrono_tz::Tz>().ok())
        .unwrap_or(chrono_tz::UTC)
}

fn field_matches(field: &str, value: u32) -> bool {
    if field == "*" {
        return true;
    }
    if let Some(step) = field.strip_prefix("*/") {
        return match step.parse::<u32>() {
            Ok(n) if n > 0 => value % n == 0,
            _ => false,
        };
    }
    for part in field.split(',') {
        if let Some((start, end)) = part.split_once('-') {
            if let (Ok(start), Ok(end)) = (start.parse::<u32>(), end.parse::<u32>()) {
                if value >= start && value <= end {
                    return true;
                }
            }
        } else if part.parse::<u32>() == Ok(value) {
            return true;
        }
    }
    false
}

fn naive_matches(expr: &str, dt: &chrono::NaiveDateTime) -> Option<bool> {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() != 5 {
        return None;
    }
    Some(
        field_matches(fields[0], dt.minute())
            && field_matches(fields[1], dt.hour())
            && field_matches(fields[2], dt.day())
            && field_matches(fields[3], dt.month())
            && field_matches(fields[4], dt.weekday().num_days_from_sunday()),
    )
}

/// Compute the next UTC fire time after `after` for `expr`, evaluated in `tz`.
///
/// Returns `None` if `expr` is malformed or no match is found within a year.
///
/// DST handling: a local time that falls in a spring-forward gap is skipped;
/// a time that occurs twice during fall-back resolves to the earlier instant.
pub fn next_fire(expr: &str, after: DateTime<Utc>, tz: chrono_tz::Tz) -> Option<DateTime<Utc>> {
    let local_after = after.with_timezone(&tz).naive_local();
    let mut candidate = (local_after + chrono::Duration::seconds(60 - local_after.second() as i64))
        .with_second(0)
        .unwrap_or(local_after);

    for _ in 0..(366 * 24 * 60) {
        match naive_matches(expr, &candidate)? {
            true => match tz.from_local_datetime(&candidate) {
                chrono::LocalResult::Single(dt) => return Some(dt.with_timezone(&Utc)),
                chrono::LocalResult::Ambiguous(earliest, _) => return Some(earliest.with_timezone(&Utc)),
                chrono::LocalResult::None => {}
            },
            false => {}
        }
        candidate += chrono::Duration::minutes(1);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn every_five_minutes() {
        let after = Utc.with_ymd_and_hms(2026, 1, 5, 10, 0, 0).unwrap();
        let next = next_fire("*/5 * * * *", after, chrono_tz::UTC).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 5, 10, 5, 0).unwrap());
    }

    #[test]
    fn specific_time() {
        let after = Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).unwrap();
        let next = next_fire("30 9 * * *", after, chrono_tz::UTC).unwrap();
        assert_eq!(next.hour(), 9);
        assert_eq!(next.minute(), 30);
    }

    #[test]
    fn comma_and_range_lists() {
        let after = Utc.with_ymd_and_hms(2026, 1, 5, 10, 16, 0).unwrap();
        let next = next_fire("0,15,30,45 9-17 * * *", after, chrono_tz::UTC).unwrap();
        assert_eq!(next.hour(), 10);
        assert_eq!(next.minute(), 30);
    }

    #[test]
    fn malformed_expression_returns_none() {
        let after = Utc.with_ymd_and_hms(2026, 1, 5, 10, 0, 0).unwrap();
        assert!(next_fire("not a cron", after, chrono_tz::UTC).is_none());
    }

    #[test]
    fn unknown_timezone_falls_back_to_utc() {
        assert_eq!(parse_tz(Some("Not/Real")), chrono_tz::UTC);
        assert_eq!(parse_tz(None), chrono_tz::UTC);
    }

    #[test]
    fn timezone_conversion() {
        let after = Utc.with_ymd_and_hms(2026, 1, 5, 12, 0, 0).unwrap();
        let tz = parse_tz(Some("Europe/Tbilisi"));
        let next = next_fire("0 9 * * *", after, tz).unwrap();
        // Tbilisi is UTC+4 year-round.
        assert_eq!(next.hour(), 5);
        assert_eq!(next.minute(), 0);
    }

    #[test]
    fn spring_forward_gap_is_skipped() {
        let after = Utc.with_ymd_and_hms(2026, 3, 8, 6, 0, 0).unwrap();
        let tz = parse_tz(Some("America/New_York"));
        let next = next_fire("30 2 * * *", after, tz).unwrap();
        // 2:30 AM doesn't exist on the spring-forward date; next real fire is the following day.
        assert_eq!(next.day(), 9);
    }
}
