//! # Availability Calculator
//!
//! Turns a day's working hours into the start times a service can be booked at.
//!
//! Slots sit on a fixed grid: the first one starts at the opening time and each
//! following one starts `duration` minutes later. A candidate `[start, start + duration)`
//! is offered when it ends by closing time, overlaps no break, and is not already
//! booked. The grid never realigns after a break, so a free stretch that starts
//! off-grid (say 10:30 on a 30 minute grid anchored at 09:15) is not offered.
//!
//! All arithmetic is in whole minutes. Times are only rendered as `"HH:MM"` when
//! they leave this module.

use std::collections::HashSet;

use crate::errors::{SyncError, SyncResult};
use crate::models::schedule::{DayHours, DaySchedule};
use crate::models::time::TimeOfDay;

/// Computes the bookable slots for one day.
///
/// # Arguments
///
/// * `day` - Working hours for the day, `None` when the business is closed
/// * `duration_minutes` - Length of the service, must be positive
/// * `booked_times` - `"HH:MM"` start times already reserved for the day
///
/// # Errors
///
/// * `SyncError::Validation` - non-positive duration or any unparsable time
///
/// A closed day or a duration longer than the working window is not an error;
/// both yield an empty list.
pub fn compute_slots(
    day: Option<&DayHours>,
    duration_minutes: i64,
    booked_times: &[String],
) -> SyncResult<Vec<TimeOfDay>> {
    let duration = validate_duration(duration_minutes)?;
    let booked = parse_booked_times(booked_times)?;

    let Some(day) = day else {
        return Ok(Vec::new());
    };
    let schedule = day.parse()?;

    Ok(generate_slots(&schedule, duration)
        .into_iter()
        .filter(|slot| !booked.contains(slot))
        .collect())
}

/// Every grid slot that fits the working window and avoids all breaks.
///
/// Breaks are checked one by one, so they may overlap each other or come in any order.
pub fn generate_slots(schedule: &DaySchedule, duration: u32) -> Vec<TimeOfDay> {
    let mut slots = Vec::new();
    if duration == 0 || duration > schedule.window.len_minutes() {
        return slots;
    }

    let close = schedule.end().minutes();
    let mut start = schedule.start().minutes();
    while let Some(end) = start.checked_add(duration).filter(|end| *end <= close) {
        let in_break = schedule.breaks.iter().any(|b| b.overlaps(start, end));
        if !in_break {
            // start < close <= 1439 so this cannot fail
            if let Ok(slot) = TimeOfDay::from_minutes(start) {
                slots.push(slot);
            }
        }
        start = end;
    }

    slots
}

pub fn validate_duration(duration_minutes: i64) -> SyncResult<u32> {
    if duration_minutes <= 0 {
        return Err(SyncError::validation(format!(
            "service duration must be positive, got {duration_minutes}"
        )));
    }
    // Anything past u32 is longer than any day and yields no slots anyway
    Ok(u32::try_from(duration_minutes).unwrap_or(u32::MAX))
}

pub fn parse_booked_times(booked_times: &[String]) -> SyncResult<HashSet<TimeOfDay>> {
    booked_times.iter().map(|raw| raw.parse()).collect()
}

/// Renders slots for the wire.
pub fn format_slots(slots: &[TimeOfDay]) -> Vec<String> {
    slots.iter().map(ToString::to_string).collect()
}
