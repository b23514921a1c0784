#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use slotsync_core::{
    errors::{SyncError, SyncResult},
    models::{
        appointment::{Appointment, BookAppointmentRequest, RescheduleAppointmentRequest},
        message::{Message, MessageStatus, SendMessageRequest},
        schedule::{DayHours, WeeklyHours},
    },
};
use slotsync_sync::{backend::BackendApi, channel::LocalPushHub, context::SyncContext};
use tokio::sync::watch;

pub fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 6).unwrap()
}

pub fn tuesday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 7).unwrap()
}

pub fn at(minute: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 6, 9, 0, 0).unwrap() + chrono::Duration::minutes(minute)
}

pub fn week() -> WeeklyHours {
    let mut hours = WeeklyHours::default();
    hours.insert(
        chrono::Weekday::Mon,
        DayHours::new("09:00", "12:00").with_break("10:00", "10:30"),
    );
    hours.insert(chrono::Weekday::Tue, DayHours::new("13:00", "14:00"));
    hours
}

pub fn history_message(id: &str, from: &str, to: &str, minute: i64) -> Message {
    Message {
        id: id.to_string(),
        temp_id: None,
        conversation_id: "c1".to_string(),
        from: from.to_string(),
        to: to.to_string(),
        text: format!("message {id}"),
        file_ref: None,
        timestamp: at(minute),
        status: MessageStatus::Sent,
    }
}

/// Holds every caller while closed. Open by default.
#[derive(Default)]
pub struct Gate(Mutex<Option<watch::Sender<bool>>>);

impl Gate {
    pub fn close(&self) {
        let (gate, _) = watch::channel(false);
        *self.0.lock().unwrap() = Some(gate);
    }

    pub fn open(&self) {
        if let Some(gate) = self.0.lock().unwrap().as_ref() {
            gate.send_replace(true);
        }
    }

    /// Callers currently held at the gate.
    pub fn waiting(&self) -> usize {
        self.0
            .lock()
            .unwrap()
            .as_ref()
            .map_or(0, |gate| gate.receiver_count())
    }

    /// Yield until `count` callers are held.
    pub async fn until_waiting(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(1), async {
            while self.waiting() < count {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("callers never reached the gate");
    }

    async fn pass(&self) {
        let gate = self.0.lock().unwrap().as_ref().map(watch::Sender::subscribe);
        if let Some(mut gate) = gate {
            let _ = gate.wait_for(|open| *open).await;
        }
    }
}

/// In-memory backend whose booked-times calls can be held back per date.
#[derive(Default)]
pub struct ScriptedBackend {
    pub hours: Mutex<WeeklyHours>,
    pub booked: Mutex<HashMap<NaiveDate, Vec<String>>>,
    pub history: Mutex<Vec<Message>>,
    pub sent: Mutex<Vec<SendMessageRequest>>,
    pub fail_fetches: AtomicBool,
    pub fail_sends: AtomicBool,
    pub booked_calls: AtomicUsize,
    pub sends: Gate,
    pub bookings: Gate,
    pub history_fetches: Gate,
    gates: Mutex<HashMap<NaiveDate, watch::Sender<bool>>>,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        let backend = Self::default();
        *backend.hours.lock().unwrap() = week();
        Arc::new(backend)
    }

    pub fn set_booked(&self, date: NaiveDate, times: &[&str]) {
        self.booked
            .lock()
            .unwrap()
            .insert(date, times.iter().map(|t| t.to_string()).collect());
    }

    /// Hold booked-times responses for `date` until [`ScriptedBackend::release`].
    pub fn hold(&self, date: NaiveDate) {
        let (gate, _) = watch::channel(false);
        self.gates.lock().unwrap().insert(date, gate);
    }

    pub fn release(&self, date: NaiveDate) {
        if let Some(gate) = self.gates.lock().unwrap().get(&date) {
            gate.send_replace(true);
        }
    }

    async fn wait_gate(&self, date: NaiveDate) {
        let gate = self
            .gates
            .lock()
            .unwrap()
            .get(&date)
            .map(watch::Sender::subscribe);
        if let Some(mut gate) = gate {
            let _ = gate.wait_for(|open| *open).await;
        }
    }

    fn down(&self) -> SyncResult<()> {
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(eyre::eyre!("connection refused").into());
        }
        Ok(())
    }
}

#[async_trait]
impl BackendApi for ScriptedBackend {
    async fn working_hours(&self, _business_id: &str, _date: NaiveDate) -> SyncResult<WeeklyHours> {
        self.down()?;
        Ok(self.hours.lock().unwrap().clone())
    }

    async fn booked_times(&self, _business_id: &str, date: NaiveDate) -> SyncResult<Vec<String>> {
        self.booked_calls.fetch_add(1, Ordering::SeqCst);
        self.wait_gate(date).await;
        self.down()?;
        Ok(self
            .booked
            .lock()
            .unwrap()
            .get(&date)
            .cloned()
            .unwrap_or_default())
    }

    async fn message_history(
        &self,
        _conversation_id: &str,
        page: u32,
        limit: u32,
    ) -> SyncResult<Vec<Message>> {
        self.history_fetches.pass().await;
        self.down()?;
        let history = self.history.lock().unwrap();
        let skip = ((page.saturating_sub(1)) * limit) as usize;
        let end = history.len().saturating_sub(skip);
        let start = end.saturating_sub(limit as usize);
        Ok(history[start..end].to_vec())
    }

    async fn send_message(&self, request: SendMessageRequest) -> SyncResult<Message> {
        self.sends.pass().await;
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(SyncError::Transport(eyre::eyre!("backend returned 500")));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(request.clone());
        Ok(Message {
            id: format!("srv-{}", sent.len()),
            temp_id: Some(request.temp_id),
            conversation_id: request.conversation_id,
            from: request.from,
            to: request.to,
            text: request.text,
            file_ref: request.file_ref,
            timestamp: Utc::now(),
            status: MessageStatus::Sent,
        })
    }

    async fn book_appointment(
        &self,
        business_id: &str,
        request: BookAppointmentRequest,
    ) -> SyncResult<Appointment> {
        self.bookings.pass().await;
        self.booked
            .lock()
            .unwrap()
            .entry(request.date)
            .or_default()
            .push(request.time.to_string());
        Ok(Appointment {
            id: "appt-1".to_string(),
            business_id: business_id.to_string(),
            date: request.date,
            time: request.time,
            duration_minutes: request.duration_minutes,
            service_id: request.service_id,
            customer_id: request.customer_id,
        })
    }

    async fn reschedule_appointment(
        &self,
        appointment_id: &str,
        _request: RescheduleAppointmentRequest,
    ) -> SyncResult<Appointment> {
        Err(SyncError::NotFound(format!("appointment {appointment_id}")))
    }

    async fn cancel_appointment(&self, _appointment_id: &str) -> SyncResult<()> {
        Ok(())
    }
}

pub fn context(backend: Arc<ScriptedBackend>, hub: &LocalPushHub) -> SyncContext {
    SyncContext::new(backend, Arc::new(hub.clone()))
}

/// Wait until `ready` holds for the watched value, failing the test after a second.
pub async fn eventually<T, F>(rx: &mut watch::Receiver<T>, ready: F)
where
    F: FnMut(&T) -> bool,
{
    tokio::time::timeout(Duration::from_secs(1), rx.wait_for(ready))
        .await
        .expect("condition not reached in time")
        .expect("sender dropped");
}
