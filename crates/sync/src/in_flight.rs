//! Registry of outbound requests that have started but not yet completed.
//!
//! Entries are added when a request starts and removed when its
//! [`InFlightGuard`] is dropped, whatever the outcome. A request future that is
//! cancelled part way (timeout, client gone) releases its id the same way.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use slotsync_core::errors::{SyncError, SyncResult};
use tracing::debug;

use crate::lock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    SendMessage,
    BookAppointment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InFlight {
    pub kind: RequestKind,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct InFlightRegistry {
    entries: Mutex<HashMap<String, InFlight>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `id` until the returned guard is dropped. Fails with
    /// `Conflict` if it is already in flight.
    pub fn begin(&self, id: &str, kind: RequestKind) -> SyncResult<InFlightGuard<'_>> {
        let mut entries = lock(&self.entries);
        if entries.contains_key(id) {
            return Err(SyncError::Conflict(format!("request {id} is already in flight")));
        }
        entries.insert(
            id.to_string(),
            InFlight {
                kind,
                started_at: Utc::now(),
            },
        );
        debug!(request_id = id, ?kind, "request started");
        Ok(InFlightGuard {
            registry: self,
            id: id.to_string(),
        })
    }

    pub fn complete(&self, id: &str) -> Option<InFlight> {
        let done = lock(&self.entries).remove(id);
        if done.is_some() {
            debug!(request_id = id, "request completed");
        }
        done
    }

    pub fn contains(&self, id: &str) -> bool {
        lock(&self.entries).contains_key(id)
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn of_kind(&self, kind: RequestKind) -> Vec<String> {
        let mut ids: Vec<String> = lock(&self.entries)
            .iter()
            .filter(|(_, entry)| entry.kind == kind)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }
}

/// Keeps a request id registered while alive.
#[must_use = "the request is completed as soon as the guard is dropped"]
#[derive(Debug)]
pub struct InFlightGuard<'a> {
    registry: &'a InFlightRegistry,
    id: String,
}

impl InFlightGuard<'_> {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.registry.complete(&self.id);
    }
}
