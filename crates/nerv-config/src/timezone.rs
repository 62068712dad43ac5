//! Fixed-offset timezone used for the request clock.
//!
//! Accepted spellings are `UTC`, `Z`, or a signed offset in `±HH`, `±HHMM`
//! or `±HH:MM` form. Region names are not resolved; deployments pick the
//! offset their handlers should observe.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::UtcOffset;

/// Timezone applied to timestamps handed to request handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timezone {
    offset: UtcOffset,
}

impl Timezone {
    /// Coordinated Universal Time.
    #[must_use]
    pub const fn utc() -> Self {
        Self {
            offset: UtcOffset::UTC,
        }
    }

    /// Returns the offset from UTC.
    #[must_use]
    pub const fn offset(&self) -> UtcOffset {
        self.offset
    }
}

impl Default for Timezone {
    fn default() -> Self {
        Self::utc()
    }
}

/// Errors raised while parsing a [`Timezone`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimezoneParseError {
    /// The value does not follow any accepted spelling.
    #[error("unrecognised timezone '{value}': expected UTC or an offset such as +08:00")]
    Format {
        /// Raw value supplied by the configuration.
        value: String,
    },
    /// The offset components are out of range.
    #[error("timezone offset '{value}' is out of range")]
    Range {
        /// Raw value supplied by the configuration.
        value: String,
    },
}

impl FromStr for Timezone {
    type Err = TimezoneParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case("utc") || trimmed.eq_ignore_ascii_case("z") {
            return Ok(Self::utc());
        }

        let format_error = || TimezoneParseError::Format {
            value: value.to_owned(),
        };

        let mut chars = trimmed.chars();
        let sign: i8 = match chars.next() {
            Some('+') => 1,
            Some('-') => -1,
            _ => return Err(format_error()),
        };
        let digits: String = chars.filter(|ch| *ch != ':').collect();
        if !digits.chars().all(|ch| ch.is_ascii_digit()) {
            return Err(format_error());
        }
        let (hours, minutes) = match digits.len() {
            2 => (digits.as_str(), "00"),
            4 => digits.split_at(2),
            _ => return Err(format_error()),
        };
        let hours: i8 = hours.parse().map_err(|_| format_error())?;
        let minutes: i8 = minutes.parse().map_err(|_| format_error())?;
        if minutes >= 60 {
            return Err(TimezoneParseError::Range {
                value: value.to_owned(),
            });
        }

        UtcOffset::from_hms(sign * hours, sign * minutes, 0)
            .map(|offset| Self { offset })
            .map_err(|_| TimezoneParseError::Range {
                value: value.to_owned(),
            })
    }
}

impl TryFrom<String> for Timezone {
    type Error = TimezoneParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Timezone> for String {
    fn from(value: Timezone) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Timezone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.offset.is_utc() {
            return f.write_str("UTC");
        }
        let (hours, minutes, _) = self.offset.as_hms();
        let sign = if self.offset.is_negative() { '-' } else { '+' };
        write!(f, "{sign}{:02}:{:02}", hours.unsigned_abs(), minutes.unsigned_abs())
    }
}
