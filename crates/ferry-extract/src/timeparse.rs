//! Timestamp parsing.
//!
//! Bare 10, 13, 16 and 19 digit numbers (optionally signed) are Unix epochs
//! in seconds, milliseconds, microseconds and nanoseconds. Anything else is
//! tried against a fixed list of layouts, first match wins:
//!
//! | Layout | Example |
//! |--------|---------|
//! | RFC 3339 (with or without fraction) | `2024-01-02T03:04:05.5Z` |
//! | space separated with offset | `2024-01-02 03:04:05.5+09:00` |
//! | space separated, UTC assumed | `2024-01-02 03:04:05` |
//! | slash separated, UTC assumed | `2024/01/02 03:04:05` |
//! | day month year with zone name | `02 Jan 2024 03:04:05 UTC` |
//! | RFC 1123 / RFC 2822 | `Tue, 02 Jan 2024 03:04:05 -0700` |
//! | RFC 850 | `Tuesday, 02-Jan-24 03:04:05 UTC` |
//! | ANSI C | `Tue Jan  2 03:04:05 2024` |
//! | Unix date | `Tue Jan  2 03:04:05 UTC 2024` |
//! | Ruby date | `Tue Jan 02 03:04:05 -0700 2024` |
//!
//! Zone abbreviations carry no offset information here and are read as UTC.

use chrono::{DateTime, NaiveDateTime, Utc};

const NANOS_PER_SECOND: i128 = 1_000_000_000;

type LayoutParser = fn(&str) -> Option<DateTime<Utc>>;

const LAYOUTS: &[LayoutParser] = &[
    rfc3339,
    space_with_offset,
    space_naive,
    slash_naive,
    day_month_zone,
    rfc2822,
    rfc850,
    ansic,
    unix_date,
    ruby_date,
];

/// Parses `input` with the epoch fast path and then the layout chain.
pub fn parse_timestamp(input: &str) -> Option<DateTime<Utc>> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }
    parse_epoch(s).or_else(|| LAYOUTS.iter().find_map(|layout| layout(s)))
}

/// Parses a bare 10/13/16/19 digit epoch, honouring a leading `+` or `-`.
pub fn parse_epoch(s: &str) -> Option<DateTime<Utc>> {
    let (negative, digits) = match s.as_bytes().first()? {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let nanos_per_unit: i128 = match digits.len() {
        10 => NANOS_PER_SECOND,
        13 => 1_000_000,
        16 => 1_000,
        19 => 1,
        _ => return None,
    };

    let value: i64 = digits.parse().ok()?;
    let value = if negative { -value } else { value };
    let nanos = i128::from(value) * nanos_per_unit;

    let secs = i64::try_from(nanos.div_euclid(NANOS_PER_SECOND)).ok()?;
    let subsec = u32::try_from(nanos.rem_euclid(NANOS_PER_SECOND)).ok()?;
    DateTime::from_timestamp(secs, subsec)
}

fn naive_utc(s: &str, fmt: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, fmt)
        .ok()
        .map(|naive| naive.and_utc())
}

fn with_offset(s: &str, fmt: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(s, fmt)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn is_zone_name(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_alphabetic())
}

/// Splits a trailing zone abbreviation off `s`.
fn strip_trailing_zone(s: &str) -> Option<&str> {
    let (head, zone) = s.rsplit_once(' ')?;
    is_zone_name(zone).then_some(head)
}

fn rfc3339(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn space_with_offset(s: &str) -> Option<DateTime<Utc>> {
    const FMT: &str = "%Y-%m-%d %H:%M:%S%.f%:z";
    match s.strip_suffix('Z') {
        Some(head) => naive_utc(head, "%Y-%m-%d %H:%M:%S%.f"),
        None => with_offset(s, FMT),
    }
}

fn space_naive(s: &str) -> Option<DateTime<Utc>> {
    naive_utc(s, "%Y-%m-%d %H:%M:%S%.f")
}

fn slash_naive(s: &str) -> Option<DateTime<Utc>> {
    naive_utc(s, "%Y/%m/%d %H:%M:%S")
}

fn day_month_zone(s: &str) -> Option<DateTime<Utc>> {
    naive_utc(strip_trailing_zone(s)?, "%d %b %Y %H:%M:%S")
}

fn rfc2822(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(s)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn rfc850(s: &str) -> Option<DateTime<Utc>> {
    naive_utc(strip_trailing_zone(s)?, "%A, %d-%b-%y %H:%M:%S")
}

fn ansic(s: &str) -> Option<DateTime<Utc>> {
    naive_utc(s, "%a %b %e %H:%M:%S %Y")
}

fn unix_date(s: &str) -> Option<DateTime<Utc>> {
    let tokens: Vec<&str> = s.split_whitespace().collect();
    match tokens.as_slice() {
        [weekday, month, day, time, zone, year] if is_zone_name(zone) => {
            ansic(&format!("{weekday} {month} {day} {time} {year}"))
        }
        _ => None,
    }
}

fn ruby_date(s: &str) -> Option<DateTime<Utc>> {
    with_offset(s, "%a %b %d %H:%M:%S %z %Y")
}
