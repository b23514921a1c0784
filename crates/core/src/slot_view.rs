//! # Slot View
//!
//! State of one displayed slot list, changed only through [`SlotView::apply`].
//!
//! Every fetch the view asks for is stamped with a generation from a monotonic
//! counter. A result is applied only when its generation is the latest one
//! issued; anything older was superseded and is dropped without error.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::availability::{compute_slots, validate_duration};
use crate::errors::SyncResult;
use crate::models::schedule::WeeklyHours;
use crate::models::time::TimeOfDay;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "lowercase")]
pub enum ViewStatus {
    Idle,
    Loading,
    Ready,
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotAction {
    /// Show a new (business, date, duration). Fetches schedule and booked times.
    Select {
        business_id: String,
        date: NaiveDate,
        duration_minutes: i64,
    },
    /// Someone booked or cancelled. Fetches booked times only.
    Invalidate,
    /// Full fetch finished.
    Loaded {
        generation: u64,
        hours: WeeklyHours,
        booked_times: Vec<String>,
    },
    /// Booked-times fetch finished.
    BookedLoaded {
        generation: u64,
        booked_times: Vec<String>,
    },
    /// A fetch failed at the transport.
    Failed { generation: u64, reason: String },
    ChannelDown,
    ChannelUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// A fetch should be issued under this generation.
    Requested(u64),
    Changed,
    Unchanged,
    /// The result belonged to a superseded request.
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotView {
    pub business_id: Option<String>,
    pub date: Option<NaiveDate>,
    pub duration_minutes: u32,
    pub slots: Vec<TimeOfDay>,
    pub booked_times: Vec<String>,
    pub status: ViewStatus,
    pub offline: bool,
    pub generation: u64,
    #[serde(skip)]
    hours: Option<WeeklyHours>,
}

impl Default for SlotView {
    fn default() -> Self {
        Self {
            business_id: None,
            date: None,
            duration_minutes: 0,
            slots: Vec::new(),
            booked_times: Vec::new(),
            status: ViewStatus::Idle,
            offline: false,
            generation: 0,
            hours: None,
        }
    }
}

impl SlotView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hours(&self) -> Option<&WeeklyHours> {
        self.hours.as_ref()
    }

    pub fn is_offered(&self, time: TimeOfDay) -> bool {
        self.slots.contains(&time)
    }

    /// The reducer. Calculator errors for the current generation are recorded
    /// on the view and also returned.
    pub fn apply(&mut self, action: SlotAction) -> SyncResult<Applied> {
        match action {
            SlotAction::Select {
                business_id,
                date,
                duration_minutes,
            } => {
                let duration = validate_duration(duration_minutes)?;
                if self.business_id.as_deref() != Some(business_id.as_str()) {
                    self.hours = None;
                }
                self.business_id = Some(business_id);
                self.date = Some(date);
                self.duration_minutes = duration;
                self.status = ViewStatus::Loading;
                Ok(Applied::Requested(self.bump()))
            }
            SlotAction::Invalidate => {
                if self.business_id.is_none() {
                    return Ok(Applied::Unchanged);
                }
                Ok(Applied::Requested(self.bump()))
            }
            SlotAction::Loaded {
                generation,
                hours,
                booked_times,
            } => {
                if self.is_stale(generation) {
                    return Ok(Applied::Stale);
                }
                self.hours = Some(hours);
                self.booked_times = booked_times;
                self.recompute()
            }
            SlotAction::BookedLoaded {
                generation,
                booked_times,
            } => {
                if self.is_stale(generation) {
                    return Ok(Applied::Stale);
                }
                self.booked_times = booked_times;
                self.recompute()
            }
            SlotAction::Failed { generation, reason } => {
                if self.is_stale(generation) {
                    return Ok(Applied::Stale);
                }
                self.slots.clear();
                self.status = ViewStatus::Error(reason);
                Ok(Applied::Changed)
            }
            SlotAction::ChannelDown => Ok(self.set_offline(true)),
            SlotAction::ChannelUp => Ok(self.set_offline(false)),
        }
    }

    fn bump(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    fn is_stale(&self, generation: u64) -> bool {
        if generation != self.generation {
            debug!(generation, latest = self.generation, "dropping stale slot response");
            return true;
        }
        false
    }

    fn set_offline(&mut self, offline: bool) -> Applied {
        if self.offline == offline {
            return Applied::Unchanged;
        }
        self.offline = offline;
        Applied::Changed
    }

    fn recompute(&mut self) -> SyncResult<Applied> {
        let day = match (&self.hours, self.date) {
            (Some(hours), Some(date)) => hours.for_date(date),
            _ => None,
        };
        match compute_slots(day, i64::from(self.duration_minutes), &self.booked_times) {
            Ok(slots) => {
                self.slots = slots;
                self.status = ViewStatus::Ready;
                Ok(Applied::Changed)
            }
            Err(e) => {
                self.slots.clear();
                self.status = ViewStatus::Error(e.to_string());
                Err(e)
            }
        }
    }
}
