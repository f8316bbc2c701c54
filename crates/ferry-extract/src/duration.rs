//! Duration literals: a signed sequence of `<decimal><unit>` terms such as
//! `1h12m`, `-1.5s` or `300ms`.
//!
//! Units are `ns`, `us` (`µs`, `μs`), `ms`, `s`, `m` and `h`. A bare `0` is
//! accepted; any other number needs a unit.

use thiserror::Error;

const NANOS_PER_MICRO: u64 = 1_000;
const NANOS_PER_MILLI: u64 = 1_000_000;
const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Duration literal failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationError {
    /// Not a duration literal at all.
    #[error("invalid duration {0:?}")]
    Invalid(String),

    /// A number without a unit.
    #[error("missing unit in duration {0:?}")]
    MissingUnit(String),

    /// A unit outside the supported set.
    #[error("unknown unit {unit:?} in duration {input:?}")]
    UnknownUnit {
        /// The offending unit.
        unit: String,
        /// The whole literal.
        input: String,
    },

    /// Value outside the signed 64-bit nanosecond range.
    #[error("duration {0:?} out of range")]
    Overflow(String),
}

fn unit_scale(unit: &str) -> Option<u64> {
    Some(match unit {
        "ns" => 1,
        "us" | "\u{b5}s" | "\u{3bc}s" => NANOS_PER_MICRO,
        "ms" => NANOS_PER_MILLI,
        "s" => NANOS_PER_SECOND,
        "m" => 60 * NANOS_PER_SECOND,
        "h" => 3_600 * NANOS_PER_SECOND,
        _ => return None,
    })
}

fn split_digits(s: &str) -> (&str, &str) {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    s.split_at(end)
}

/// Parses a duration literal into signed nanoseconds.
///
/// # Errors
///
/// Returns [`DurationError`] for malformed literals, missing or unknown
/// units and values outside the `i64` nanosecond range.
pub fn parse_duration(input: &str) -> Result<i64, DurationError> {
    let invalid = || DurationError::Invalid(input.to_string());
    let overflow = || DurationError::Overflow(input.to_string());

    let (negative, mut rest) = match input.as_bytes().first() {
        Some(b'-') => (true, &input[1..]),
        Some(b'+') => (false, &input[1..]),
        _ => (false, input),
    };

    if rest == "0" {
        return Ok(0);
    }
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total: u64 = 0;
    while !rest.is_empty() {
        let (whole, tail) = split_digits(rest);
        let (fraction, tail) = match tail.strip_prefix('.') {
            Some(after_dot) => split_digits(after_dot),
            None => ("", tail),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }

        let unit_end = tail
            .find(|c: char| c == '.' || c.is_ascii_digit())
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_end);
        if unit.is_empty() {
            return Err(DurationError::MissingUnit(input.to_string()));
        }
        let scale = unit_scale(unit).ok_or_else(|| DurationError::UnknownUnit {
            unit: unit.to_string(),
            input: input.to_string(),
        })?;

        let whole: u64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| overflow())?
        };
        let mut term = whole.checked_mul(scale).ok_or_else(overflow)?;

        if !fraction.is_empty() {
            // Digits past nanosecond precision of the largest unit do not
            // change the result.
            let digits = &fraction[..fraction.len().min(18)];
            let numerator: u128 = digits.parse().map_err(|_| invalid())?;
            let denominator = 10_u128.pow(u32::try_from(digits.len()).map_err(|_| invalid())?);
            let nanos = numerator * u128::from(scale) / denominator;
            term = term
                .checked_add(u64::try_from(nanos).map_err(|_| overflow())?)
                .ok_or_else(overflow)?;
        }

        total = total.checked_add(term).ok_or_else(overflow)?;
        rest = tail;
    }

    let signed = if negative {
        -i128::from(total)
    } else {
        i128::from(total)
    };
    i64::try_from(signed).map_err(|_| overflow())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const MINUTE: i64 = 60 * 1_000_000_000;

    #[test]
    fn test_compound_duration() {
        assert_eq!(parse_duration("1h12m"), Ok(72 * MINUTE));
        assert_eq!(parse_duration("2h45m30.5s"), Ok(165 * MINUTE + 30_500_000_000));
    }

    #[test]
    fn test_units() {
        assert_eq!(parse_duration("15ns"), Ok(15));
        assert_eq!(parse_duration("15us"), Ok(15_000));
        assert_eq!(parse_duration("15µs"), Ok(15_000));
        assert_eq!(parse_duration("15μs"), Ok(15_000));
        assert_eq!(parse_duration("15ms"), Ok(15_000_000));
        assert_eq!(parse_duration("15s"), Ok(15_000_000_000));
    }

    #[test]
    fn test_sign_and_fractions() {
        assert_eq!(parse_duration("-1.5s"), Ok(-1_500_000_000));
        assert_eq!(parse_duration("+.5s"), Ok(500_000_000));
        assert_eq!(parse_duration("1.s"), Ok(1_000_000_000));
        assert_eq!(parse_duration("0.000000001s"), Ok(1));
    }

    #[test]
    fn test_zero() {
        assert_eq!(parse_duration("0"), Ok(0));
        assert_eq!(parse_duration("-0"), Ok(0));
        assert_eq!(parse_duration("0s"), Ok(0));
    }

    #[test]
    fn test_rejections() {
        assert!(matches!(parse_duration(""), Err(DurationError::Invalid(_))));
        assert!(matches!(parse_duration("-"), Err(DurationError::Invalid(_))));
        assert!(matches!(parse_duration(".s"), Err(DurationError::Invalid(_))));
        assert!(matches!(parse_duration("15"), Err(DurationError::MissingUnit(_))));
        assert!(matches!(parse_duration("1h30"), Err(DurationError::MissingUnit(_))));
        assert!(matches!(
            parse_duration("3d"),
            Err(DurationError::UnknownUnit { .. })
        ));
        assert!(matches!(
            parse_duration("9999999999h"),
            Err(DurationError::Overflow(_))
        ));
    }

    proptest! {
        #[test]
        fn test_whole_seconds_round_trip(secs in -1_000_000_i64..1_000_000) {
            let text = format!("{secs}s");
            prop_assert_eq!(parse_duration(&text), Ok(secs * 1_000_000_000));
        }

        #[test]
        fn test_hours_minutes_round_trip(h in 0_i64..10_000, m in 0_i64..60) {
            let text = format!("{h}h{m}m");
            prop_assert_eq!(parse_duration(&text), Ok((h * 60 + m) * MINUTE));
        }
    }
}
