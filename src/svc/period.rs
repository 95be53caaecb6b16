//! # Period module
//!
//! This module provide a parser for ISO-8601 periods (e.g. `PT1S`, `P1DT2H`,
//! `PT0.2S`) and a formatter that renders durations the way the receive
//! adapter reads them back (`1s`, `200ms`, `1m30s`).

use std::str::FromStr;

// -----------------------------------------------------------------------------
// Constants

/// number of fixed point units in one period field
const FIELD_SCALE: i64 = 1_000_000;
const FRACTION_DIGITS: usize = 6;

const NANOS_PER_SECOND: u64 = 1_000_000_000;

// A year is 365.2425 days and a month the twelfth of it.
const SECONDS_PER_YEAR: i128 = 31_556_952;
const SECONDS_PER_MONTH: i128 = 2_629_746;
const SECONDS_PER_WEEK: i128 = 604_800;
const SECONDS_PER_DAY: i128 = 86_400;
const SECONDS_PER_HOUR: i128 = 3_600;
const SECONDS_PER_MINUTE: i128 = 60;

const DATE_DESIGNATORS: [char; 4] = ['Y', 'M', 'W', 'D'];
const TIME_DESIGNATORS: [char; 3] = ['H', 'M', 'S'];

// -----------------------------------------------------------------------------
// Error enumeration

#[derive(thiserror::Error, PartialEq, Eq, Clone, Debug)]
pub enum Error {
    #[error("failed to parse period '{0}', it must start with 'P'")]
    Designator(String),
    #[error("failed to parse period '{0}', it does not contain any component")]
    Empty(String),
    #[error("failed to parse period '{0}', number '{1}' is invalid")]
    Number(String, String),
    #[error("failed to parse period '{0}', number is not followed by a designator")]
    MissingDesignator(String),
    #[error("failed to parse period '{0}', designator '{1}' is unknown at this position")]
    UnknownDesignator(String, char),
    #[error("failed to parse period '{0}', components are not in descending order")]
    Order(String),
    #[error("failed to parse period '{0}', value is too large")]
    Overflow(String),
}

// -----------------------------------------------------------------------------
// Period structure

/// an ISO-8601 period, each field is a fixed point number with six decimals
#[derive(PartialEq, Eq, Clone, Copy, Debug, Default)]
pub struct Period {
    pub negative: bool,
    pub years: i64,
    pub months: i64,
    pub weeks: i64,
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

impl FromStr for Period {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (negative, rest) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };

        let rest = rest
            .strip_prefix('P')
            .ok_or_else(|| Error::Designator(s.to_string()))?;

        let (date, time) = match rest.split_once('T') {
            Some((_, time)) if time.is_empty() => return Err(Error::Empty(s.to_string())),
            Some((date, time)) => (date, time),
            None => (rest, ""),
        };

        let mut period = Self {
            negative,
            ..Default::default()
        };

        let count = section(
            s,
            date,
            &DATE_DESIGNATORS,
            &mut [
                &mut period.years,
                &mut period.months,
                &mut period.weeks,
                &mut period.days,
            ],
        )? + section(
            s,
            time,
            &TIME_DESIGNATORS,
            &mut [&mut period.hours, &mut period.minutes, &mut period.seconds],
        )?;

        if count == 0 {
            return Err(Error::Empty(s.to_string()));
        }

        Ok(period)
    }
}

impl Period {
    /// returns the approximate length of the period in nanoseconds, years
    /// and months are converted using their average length. The result
    /// saturates at the bounds of an `i64`.
    pub fn duration_approx(&self) -> i64 {
        let seconds_e6 = i128::from(self.years) * SECONDS_PER_YEAR
            + i128::from(self.months) * SECONDS_PER_MONTH
            + i128::from(self.weeks) * SECONDS_PER_WEEK
            + i128::from(self.days) * SECONDS_PER_DAY
            + i128::from(self.hours) * SECONDS_PER_HOUR
            + i128::from(self.minutes) * SECONDS_PER_MINUTE
            + i128::from(self.seconds);

        let nanos = seconds_e6 * 1_000;
        let nanos = if self.negative { -nanos } else { nanos };

        nanos.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
    }
}

// -----------------------------------------------------------------------------
// Helpers

/// parse the components of one side of the 'T' separator and store them in
/// the slot matching their designator, returns the number of components
fn section(
    input: &str,
    mut remaining: &str,
    designators: &[char],
    slots: &mut [&mut i64],
) -> Result<usize, Error> {
    let mut next = 0;
    let mut count = 0;

    while !remaining.is_empty() {
        let end = remaining
            .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == ','))
            .ok_or_else(|| Error::MissingDesignator(input.to_string()))?;

        let (number, tail) = remaining.split_at(end);
        let mut chars = tail.chars();
        let designator = chars
            .next()
            .ok_or_else(|| Error::MissingDesignator(input.to_string()))?;

        let index = designators
            .iter()
            .position(|d| *d == designator)
            .ok_or_else(|| Error::UnknownDesignator(input.to_string(), designator))?;

        if index < next {
            return Err(Error::Order(input.to_string()));
        }

        *slots[index] = decimal(input, number)?;
        next = index + 1;
        count += 1;
        remaining = chars.as_str();
    }

    Ok(count)
}

/// parse a decimal number into a fixed point value, extra decimals are
/// truncated
fn decimal(input: &str, number: &str) -> Result<i64, Error> {
    let invalid = || Error::Number(input.to_string(), number.to_string());
    let (integer, fraction) = match number.split_once(['.', ',']) {
        Some((integer, fraction)) => (integer, fraction),
        None => (number, ""),
    };

    if integer.is_empty()
        || !integer.bytes().all(|b| b.is_ascii_digit())
        || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(invalid());
    }

    let integer = integer
        .parse::<i64>()
        .map_err(|_| Error::Overflow(input.to_string()))?
        .checked_mul(FIELD_SCALE)
        .ok_or_else(|| Error::Overflow(input.to_string()))?;

    let mut digits: String = fraction.chars().take(FRACTION_DIGITS).collect();
    while digits.len() < FRACTION_DIGITS {
        digits.push('0');
    }

    let fraction = digits.parse::<i64>().map_err(|_| invalid())?;

    integer
        .checked_add(fraction)
        .ok_or_else(|| Error::Overflow(input.to_string()))
}

/// returns the duration, given in nanoseconds, formatted as `72h3m0.5s`,
/// durations under one second use the smaller units `ms`, `µs` and `ns`
pub fn format_duration(nanos: i64) -> String {
    if nanos == 0 {
        return "0s".to_string();
    }

    let sign = if nanos < 0 { "-" } else { "" };
    let value = nanos.unsigned_abs();

    if value < NANOS_PER_SECOND {
        let (divisor, digits, unit) = if value < 1_000 {
            (1, 0, "ns")
        } else if value < 1_000_000 {
            (1_000, 3, "µs")
        } else {
            (1_000_000, 6, "ms")
        };

        return format!(
            "{}{}{}",
            sign,
            fraction(value / divisor, value % divisor, digits),
            unit
        );
    }

    let total = value / NANOS_PER_SECOND;
    let (hours, minutes, seconds) = (total / 3_600, total / 60 % 60, total % 60);

    let mut out = sign.to_string();
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }

    if hours > 0 || minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }

    out.push_str(&fraction(seconds, value % NANOS_PER_SECOND, 9));
    out.push('s');
    out
}

fn fraction(integer: u64, remainder: u64, digits: usize) -> String {
    if remainder == 0 {
        return integer.to_string();
    }

    let decimals = format!("{:0width$}", remainder, width = digits);
    format!("{}.{}", integer, decimals.trim_end_matches('0'))
}
