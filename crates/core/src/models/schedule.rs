use std::collections::HashMap;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::errors::SyncResult;
use crate::models::time::{TimeOfDay, WorkInterval};

/// A break window exactly as the backend sends it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakHours {
    pub start: String,
    pub end: String,
}

/// One weekday's working hours exactly as the backend sends them.
///
/// Times stay as strings until [`DayHours::parse`] so that a malformed value
/// surfaces as a validation error from the calculator instead of a decode error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayHours {
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub breaks: Vec<BreakHours>,
}

impl DayHours {
    pub fn new(start: &str, end: &str) -> Self {
        Self {
            start: start.to_string(),
            end: end.to_string(),
            breaks: Vec::new(),
        }
    }

    pub fn with_break(mut self, start: &str, end: &str) -> Self {
        self.breaks.push(BreakHours {
            start: start.to_string(),
            end: end.to_string(),
        });
        self
    }

    pub fn parse(&self) -> SyncResult<DaySchedule> {
        let window = WorkInterval::parse(&self.start, &self.end)?;
        let breaks = self
            .breaks
            .iter()
            .map(|b| WorkInterval::parse(&b.start, &b.end))
            .collect::<SyncResult<Vec<_>>>()?;
        Ok(DaySchedule { window, breaks })
    }
}

/// Validated working hours for a single day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySchedule {
    pub window: WorkInterval,
    pub breaks: Vec<WorkInterval>,
}

impl DaySchedule {
    pub fn start(&self) -> TimeOfDay {
        self.window.start
    }

    pub fn end(&self) -> TimeOfDay {
        self.window.end
    }
}

/// Working hours of a business keyed by lowercase weekday name.
///
/// A weekday with no entry is closed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeeklyHours(pub HashMap<String, DayHours>);

impl WeeklyHours {
    pub fn insert(&mut self, day: Weekday, hours: DayHours) {
        self.0.insert(weekday_key(day).to_string(), hours);
    }

    pub fn for_weekday(&self, day: Weekday) -> Option<&DayHours> {
        let key = weekday_key(day);
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, hours)| hours)
    }

    pub fn for_date(&self, date: NaiveDate) -> Option<&DayHours> {
        self.for_weekday(date.weekday())
    }
}

pub fn weekday_key(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}
