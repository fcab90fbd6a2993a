//! Points in time as Wikidata writes them.
//!
//! Wikidata time values are proleptic Gregorian (or Julian) timestamps with
//! a signed year of any width, and a month or day of `00` when the
//! precision stops above it (`+13798000000-00-00T00:00:00Z` is the age of
//! the universe, `-0043-03-15T00:00:00Z` a date BCE). chrono covers
//! neither, so [`Instant`] keeps the fields as written and converts to
//! `DateTime<Utc>` only where the value fits.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};

use crate::error::TermError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Instant {
    pub year: i64,
    /// `1..=12`, or `0` below month precision.
    pub month: u8,
    /// `1..=31`, or `0` below day precision.
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl Instant {
    /// Midnight UTC on the given date.
    pub fn new(year: i64, month: u8, day: u8) -> Self {
        Self {
            year,
            month,
            day,
            hour: 0,
            minute: 0,
            second: 0,
        }
    }

    pub fn with_time(mut self, hour: u8, minute: u8, second: u8) -> Self {
        self.hour = hour;
        self.minute = minute;
        self.second = second;
        self
    }

    /// The same instant as a chrono timestamp; `None` for zero months or
    /// days and for years chrono cannot represent.
    pub fn to_date_time(&self) -> Option<DateTime<Utc>> {
        let year = i32::try_from(self.year).ok()?;
        let date = NaiveDate::from_ymd_opt(year, u32::from(self.month), u32::from(self.day))?;
        let time = date.and_hms_opt(
            u32::from(self.hour),
            u32::from(self.minute),
            u32::from(self.second),
        )?;
        Some(Utc.from_utc_datetime(&time))
    }
}

impl From<DateTime<Utc>> for Instant {
    fn from(value: DateTime<Utc>) -> Self {
        // chrono keeps every calendar and clock field within u8 range.
        Instant::new(i64::from(value.year()), value.month() as u8, value.day() as u8).with_time(
            value.hour() as u8,
            value.minute() as u8,
            value.second() as u8,
        )
    }
}

/// Parses the `xsd:dateTime` lexical form: an optional sign, a year of at
/// least one digit, `-MM-DDThh:mm:ss`, optional fractional seconds
/// (dropped) and an optional `Z` or `±hh:mm` offset.
impl FromStr for Instant {
    type Err = TermError;

    fn from_str(s: &str) -> Result<Self, TermError> {
        let invalid = || TermError::InvalidLiteral {
            what: "xsd:dateTime",
            value: s.to_owned(),
        };
        let (negative, unsigned) = match s.as_bytes().first() {
            Some(b'-') => (true, &s[1..]),
            Some(b'+') => (false, &s[1..]),
            _ => (false, s),
        };
        let (date, time) = unsigned.split_once('T').ok_or_else(invalid)?;

        let mut fields = date.splitn(3, '-');
        let year: i64 = number(fields.next(), None).ok_or_else(invalid)?;
        let month = number(fields.next(), Some(2)).filter(|m| *m <= 12).ok_or_else(invalid)?;
        let day = number(fields.next(), Some(2)).filter(|d| *d <= 31).ok_or_else(invalid)?;

        let (clock, offset) = split_offset(time).ok_or_else(invalid)?;
        let (clock, _fraction) = clock.split_once('.').unwrap_or((clock, ""));
        let mut fields = clock.splitn(3, ':');
        let hour = number(fields.next(), Some(2)).filter(|h| *h < 24).ok_or_else(invalid)?;
        let minute = number(fields.next(), Some(2)).filter(|m| *m < 60).ok_or_else(invalid)?;
        let second = number(fields.next(), Some(2)).filter(|sec| *sec <= 60).ok_or_else(invalid)?;

        let local = Instant::new(if negative { -year } else { year }, month, day)
            .with_time(hour, minute, second);
        if offset == 0 {
            return Ok(local);
        }
        // Shifting across a day boundary needs a real calendar.
        local
            .to_date_time()
            .and_then(|t| t.checked_sub_signed(Duration::minutes(offset)))
            .map(Instant::from)
            .ok_or_else(invalid)
    }
}

/// An unsigned decimal field, optionally of an exact width.
fn number<T: FromStr>(field: Option<&str>, width: Option<usize>) -> Option<T> {
    let field = field?;
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if width.is_some_and(|w| field.len() != w) {
        return None;
    }
    field.parse().ok()
}

/// Split a time of day from its zone; the offset is in minutes east of UTC.
fn split_offset(time: &str) -> Option<(&str, i64)> {
    if let Some(clock) = time.strip_suffix('Z') {
        return Some((clock, 0));
    }
    let Some(at) = time.rfind(|c: char| c == '+' || c == '-') else {
        return Some((time, 0));
    };
    let (clock, zone) = time.split_at(at);
    let sign = if zone.starts_with('-') { -1 } else { 1 };
    let (hours, minutes) = zone[1..].split_once(':')?;
    let hours: i64 = number(Some(hours), Some(2)).filter(|h| *h <= 14)?;
    let minutes: i64 = number(Some(minutes), Some(2)).filter(|m| *m < 60)?;
    Some((clock, sign * (hours * 60 + minutes)))
}

/// `xsd:dateTime` in UTC, with at least four year digits and no `+`.
impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.year < 0 {
            write!(f, "-{:04}", self.year.unsigned_abs())?;
        } else {
            write!(f, "{:04}", self.year)?;
        }
        write!(
            f,
            "-{:02}-{:02}T{:02}:{:02}:{:02}Z",
            self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn years_before_the_common_era_keep_their_sign() {
        let ides: Instant = "-0043-03-15T00:00:00Z".parse().unwrap();
        assert_eq!(ides, Instant::new(-43, 3, 15));
        assert_eq!(ides.to_string(), "-0043-03-15T00:00:00Z");
        assert!(ides < Instant::new(1, 1, 1));
    }

    #[test]
    fn wide_years_and_zero_fields_are_kept() {
        let universe: Instant = "+13798000000-00-00T00:00:00Z".parse().unwrap();
        assert_eq!(universe, Instant::new(13_798_000_000, 0, 0));
        assert_eq!(universe.to_string(), "13798000000-00-00T00:00:00Z");
        assert_eq!(universe.to_date_time(), None);
    }

    #[test]
    fn offsets_are_folded_into_utc() {
        let t: Instant = "2020-01-01T01:30:00.250+02:00".parse().unwrap();
        assert_eq!(t, Instant::new(2019, 12, 31).with_time(23, 30, 0));
        let plain: Instant = "2020-01-01T01:30:00".parse().unwrap();
        assert_eq!(plain, Instant::new(2020, 1, 1).with_time(1, 30, 0));
    }

    #[test]
    fn chrono_timestamps_convert_both_ways() {
        let t = DateTime::parse_from_rfc3339("2001-09-09T01:46:40Z")
            .unwrap()
            .with_timezone(&Utc);
        let instant = Instant::from(t);
        assert_eq!(instant.to_string(), "2001-09-09T01:46:40Z");
        assert_eq!(instant.to_date_time(), Some(t));
    }

    #[test]
    fn malformed_literals_are_rejected() {
        for bad in [
            "",
            "2020-01-01",
            "2020-13-01T00:00:00Z",
            "2020-1-01T00:00:00Z",
            "20x0-01-01T00:00:00Z",
            "2020-01-01T24:00:00Z",
            "2020-01-01T00:00:00+2:00",
        ] {
            assert!(
                matches!(bad.parse::<Instant>(), Err(TermError::InvalidLiteral { .. })),
                "{bad:?} parsed"
            );
        }
    }
}
