//! Capture and receipt time stamping.
//!
//! Envelopes carry time as a `seconds` / `nanoseconds` pair. Two encodings are
//! supported:
//!
//! - [`TimestampMode::Epoch`] (default): seconds since the Unix epoch plus the
//!   nanosecond-of-second. Values from two hosts can be subtracted.
//! - [`TimestampMode::SecondOfMinute`]: only the second-of-minute (0-59) plus
//!   the nanosecond-of-second. Matches the values emitted by earlier fleet
//!   simulators byte for byte, but loses the minute, hour and date.

use super::error::ConfigError;
use core::fmt;
use core::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TimestampMode {
    #[default]
    Epoch,
    SecondOfMinute,
}

impl TimestampMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Epoch => "epoch",
            Self::SecondOfMinute => "second-of-minute",
        }
    }
}

impl fmt::Display for TimestampMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimestampMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "epoch" => Ok(Self::Epoch),
            "second-of-minute" | "second_of_minute" => Ok(Self::SecondOfMinute),
            _ => Err(ConfigError::UnknownTimestampMode(s.to_owned())),
        }
    }
}

/// A `seconds` / `nanoseconds` pair as it appears on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanoseconds: i64,
}

impl Timestamp {
    pub const fn new(seconds: i64, nanoseconds: i64) -> Self {
        Self {
            seconds,
            nanoseconds,
        }
    }

    /// Stamps the current wall-clock time.
    pub fn now(mode: TimestampMode) -> Self {
        Self::from_system_time(SystemTime::now(), mode)
    }

    /// Encodes `time` using `mode`. Times before the Unix epoch encode as zero.
    pub fn from_system_time(time: SystemTime, mode: TimestampMode) -> Self {
        let since_epoch = time.duration_since(UNIX_EPOCH).unwrap_or_default();
        let secs = since_epoch.as_secs();
        let seconds = match mode {
            TimestampMode::Epoch => i64::try_from(secs).unwrap_or(i64::MAX),
            TimestampMode::SecondOfMinute => (secs % 60) as i64,
        };

        Self {
            seconds,
            nanoseconds: i64::from(since_epoch.subsec_nanos()),
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanoseconds)
    }
}
