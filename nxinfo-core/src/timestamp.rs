//! Acquisition timestamps.

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDateTime, Timelike};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const DISPLAY_FORMAT: &str = "%d %b %Y %H:%M:%S";

/// Seconds since the UNIX epoch plus an optional millisecond fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Timestamp {
    pub epoch_seconds: i64,
    pub millis: Option<u16>,
}

impl Timestamp {
    /// Parses `YYYY-MM-DDTHH:MM:SS[.ffffff]`.
    ///
    /// Anything after the seconds field (zone designators, offsets) is
    /// ignored and the value is taken as UTC.
    ///
    /// # Errors
    /// Returns [`Error::InvalidTimestamp`] if the text does not start with a
    /// date and time in that layout.
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        let (naive, _rest) = NaiveDateTime::parse_and_remainder(trimmed, DATE_FORMAT)
            .map_err(|_| Error::InvalidTimestamp(text.to_string()))?;

        let seconds = naive.and_utc().timestamp();
        if trimmed.as_bytes().get(19) != Some(&b'.') {
            return Ok(Self {
                epoch_seconds: seconds,
                millis: None,
            });
        }

        // A fraction rounding up to 1000 ms carries into the next second.
        #[allow(clippy::cast_possible_truncation)]
        let rounded = (f64::from(naive.nanosecond()) / 1.0e6).round() as i64;
        let total_ms = seconds * 1000 + rounded;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let millis = total_ms.rem_euclid(1000) as u16;
        Ok(Self {
            epoch_seconds: total_ms.div_euclid(1000),
            millis: Some(millis),
        })
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match DateTime::from_timestamp(self.epoch_seconds, 0) {
            Some(dt) => write!(f, "{}", dt.format(DISPLAY_FORMAT))?,
            None => write!(f, "@{}", self.epoch_seconds)?,
        }
        if let Some(ms) = self.millis {
            write!(f, ".{ms:03}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_microseconds() {
        let ts = Timestamp::parse("2015-11-10T17:17:02.057611").unwrap();
        assert_eq!(ts.epoch_seconds, 1_447_175_822);
        assert_eq!(ts.millis, Some(58));
        assert_eq!(ts.to_string(), "10 Nov 2015 17:17:02.058");
    }

    #[test]
    fn test_millisecond_rounding_carries_into_seconds() {
        let ts = Timestamp::parse("2015-11-10T17:17:02.9996").unwrap();
        assert_eq!(ts.epoch_seconds, 1_447_175_823);
        assert_eq!(ts.millis, Some(0));
        assert_eq!(ts.to_string(), "10 Nov 2015 17:17:03.000");

        let ts = Timestamp::parse("2015-12-31T23:59:59.9999").unwrap();
        assert_eq!(ts.to_string(), "01 Jan 2016 00:00:00.000");
    }

    #[test]
    fn test_parse_without_fraction() {
        let ts = Timestamp::parse("2021-06-19T06:17:00").unwrap();
        assert_eq!(ts.millis, None);
        assert_eq!(ts.to_string(), "19 Jun 2021 06:17:00");
    }

    #[test]
    fn test_parse_ignores_zone_suffix() {
        let ts = Timestamp::parse("2018-11-05T12:56:00Z").unwrap();
        let plain = Timestamp::parse("2018-11-05T12:56:00").unwrap();
        assert_eq!(ts, plain);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            Timestamp::parse("yesterday"),
            Err(Error::InvalidTimestamp(_))
        ));
        assert!(Timestamp::parse("").is_err());
    }
}
