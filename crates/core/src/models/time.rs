use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::{SyncError, SyncResult};

pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// A wall-clock time as minutes since midnight.
///
/// Always in `0..1440`. Parsed from and formatted as zero-padded `"HH:MM"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    pub fn from_minutes(minutes: u32) -> SyncResult<Self> {
        if minutes >= MINUTES_PER_DAY {
            return Err(SyncError::validation(format!(
                "{minutes} minutes is past the end of the day"
            )));
        }
        Ok(Self(minutes as u16))
    }

    pub fn from_hm(hours: u32, minutes: u32) -> SyncResult<Self> {
        if hours > 23 || minutes > 59 {
            return Err(SyncError::validation(format!(
                "{hours}:{minutes:02} is not a valid time of day"
            )));
        }
        Self::from_minutes(hours * 60 + minutes)
    }

    pub fn minutes(self) -> u32 {
        u32::from(self.0)
    }

    pub fn hours_part(self) -> u32 {
        self.minutes() / 60
    }

    pub fn minutes_part(self) -> u32 {
        self.minutes() % 60
    }
}

impl FromStr for TimeOfDay {
    type Err = SyncError;

    /// Accepts `H:MM` or `HH:MM`. Anything else is rejected, never defaulted.
    fn from_str(s: &str) -> SyncResult<Self> {
        let invalid = || SyncError::validation(format!("'{s}' is not a valid HH:MM time"));

        let (hours, minutes) = s.trim().split_once(':').ok_or_else(invalid)?;
        let all_digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(hours) || hours.len() > 2 || !all_digits(minutes) || minutes.len() != 2 {
            return Err(invalid());
        }

        let hours: u32 = hours.parse().map_err(|_| invalid())?;
        let minutes: u32 = minutes.parse().map_err(|_| invalid())?;
        Self::from_hm(hours, minutes).map_err(|_| invalid())
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hours_part(), self.minutes_part())
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A half-open range `[start, end)` of the day, used for working windows and breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkInterval {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

impl WorkInterval {
    pub fn new(start: TimeOfDay, end: TimeOfDay) -> SyncResult<Self> {
        if start >= end {
            return Err(SyncError::validation(format!(
                "interval {start}-{end} must end after it starts"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn parse(start: &str, end: &str) -> SyncResult<Self> {
        Self::new(start.parse()?, end.parse()?)
    }

    /// Half-open overlap: touching ranges do not overlap.
    pub fn overlaps(&self, start: u32, end: u32) -> bool {
        start < self.end.minutes() && end > self.start.minutes()
    }

    pub fn len_minutes(&self) -> u32 {
        self.end.minutes() - self.start.minutes()
    }
}
