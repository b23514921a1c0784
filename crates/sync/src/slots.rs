//! # Slot Synchronizer
//!
//! Keeps the slot list for the displayed (business, date) current while other
//! clients book and cancel. The push channel only signals that something
//! changed; the backend stays the source of truth and is re-fetched.
//!
//! - Selecting a new (business, date, duration) fetches working hours and
//!   booked times together.
//! - An appointment event for the business re-fetches booked times only.
//! - A reconnect is handled like a fresh selection.
//!
//! Superseded fetches are not aborted. Their results come back with an old
//! generation and [`SlotView::apply`] drops them.

use std::sync::{Arc, Mutex, Weak};

use chrono::NaiveDate;
use serde::Serialize;
use slotsync_core::{
    errors::{SyncError, SyncResult},
    models::{
        appointment::{Appointment, BookAppointmentRequest, RescheduleAppointmentRequest},
        events::{Delivery, Topic},
        time::TimeOfDay,
    },
    slot_view::{Applied, SlotAction, SlotView, ViewStatus},
};
use tokio::{runtime::Handle, sync::watch};
use tracing::{debug, info, warn};

use crate::{
    channel::{Handler, Subscription},
    context::SyncContext,
    in_flight::RequestKind,
    lock,
};

/// How a fetch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Refresh {
    Applied,
    /// A newer request superseded this one.
    Stale,
    /// The backend could not be reached; the view shows an error state.
    Failed,
    /// Nothing is selected yet.
    Skipped,
}

struct SlotInner {
    ctx: SyncContext,
    view: Mutex<SlotView>,
    updates: watch::Sender<SlotView>,
    subscription: Mutex<Option<Subscription>>,
}

/// One displayed slot list. Cloning shares the same view.
#[derive(Clone)]
pub struct SlotSynchronizer {
    inner: Arc<SlotInner>,
}

impl SlotSynchronizer {
    pub fn new(ctx: SyncContext) -> Self {
        let (updates, _) = watch::channel(SlotView::new());
        Self {
            inner: Arc::new(SlotInner {
                ctx,
                view: Mutex::new(SlotView::new()),
                updates,
                subscription: Mutex::new(None),
            }),
        }
    }

    pub fn view(&self) -> SlotView {
        lock(&self.inner.view).clone()
    }

    /// Receives every published state of the view.
    pub fn watch(&self) -> watch::Receiver<SlotView> {
        self.inner.updates.subscribe()
    }

    /// Show slots for a (business, date, duration), superseding any fetch in flight.
    ///
    /// # Errors
    ///
    /// * `SyncError::Validation` - non-positive duration, or the fetched hours
    ///   or booked times contain malformed times
    ///
    /// Transport failures are not errors here; they leave the view in its
    /// error state and return [`Refresh::Failed`].
    pub async fn select(
        &self,
        business_id: &str,
        date: NaiveDate,
        duration_minutes: i64,
    ) -> SyncResult<Refresh> {
        let generation = self.inner.request(SlotAction::Select {
            business_id: business_id.to_string(),
            date,
            duration_minutes,
        })?;
        let Some(generation) = generation else {
            return Ok(Refresh::Skipped);
        };
        SlotInner::ensure_subscribed(&self.inner, business_id, false);
        self.inner.fetch_all(generation).await
    }

    /// Re-fetch booked times for the current selection.
    pub async fn refresh(&self) -> SyncResult<Refresh> {
        self.inner.refresh_booked().await
    }

    /// Book one of the currently offered slots, then refresh.
    pub async fn book(
        &self,
        time: TimeOfDay,
        service_id: Option<String>,
        customer_id: Option<String>,
    ) -> SyncResult<Appointment> {
        let (business_id, date, duration_minutes) = {
            let view = lock(&self.inner.view);
            let (Some(business_id), Some(date)) = (view.business_id.clone(), view.date) else {
                return Err(SyncError::validation("no business and date selected"));
            };
            if view.status != ViewStatus::Ready || !view.is_offered(time) {
                return Err(SyncError::validation(format!(
                    "{time} is not an offered slot on {date}"
                )));
            }
            (business_id, date, view.duration_minutes)
        };

        let request_id = format!("book:{business_id}:{date}:{time}");
        let request = self
            .inner
            .ctx
            .in_flight
            .begin(&request_id, RequestKind::BookAppointment)?;
        let booked = self
            .inner
            .ctx
            .backend
            .book_appointment(
                &business_id,
                BookAppointmentRequest {
                    date,
                    time,
                    duration_minutes,
                    service_id,
                    customer_id,
                },
            )
            .await;
        drop(request);

        let appointment = booked?;
        info!(business_id = %business_id, %date, %time, appointment_id = %appointment.id, "appointment booked");
        self.inner.refresh_booked().await?;
        Ok(appointment)
    }

    pub async fn reschedule(
        &self,
        appointment_id: &str,
        date: NaiveDate,
        time: TimeOfDay,
    ) -> SyncResult<Appointment> {
        let appointment = self
            .inner
            .ctx
            .backend
            .reschedule_appointment(appointment_id, RescheduleAppointmentRequest { date, time })
            .await?;
        info!(appointment_id, %date, %time, "appointment rescheduled");
        self.inner.refresh_booked().await?;
        Ok(appointment)
    }

    pub async fn cancel(&self, appointment_id: &str) -> SyncResult<()> {
        self.inner.ctx.backend.cancel_appointment(appointment_id).await?;
        info!(appointment_id, "appointment cancelled");
        self.inner.refresh_booked().await?;
        Ok(())
    }

    /// Stop listening to the push channel.
    pub fn close(&self) {
        lock(&self.inner.subscription).take();
    }
}

impl SlotInner {
    /// Run a request action and return the generation to fetch under.
    fn request(&self, action: SlotAction) -> SyncResult<Option<u64>> {
        let mut view = lock(&self.view);
        let applied = view.apply(action)?;
        self.updates.send_replace(view.clone());
        Ok(match applied {
            Applied::Requested(generation) => Some(generation),
            _ => None,
        })
    }

    /// Apply a result action and publish. Stale results change nothing.
    fn settle(&self, action: SlotAction) -> SyncResult<Refresh> {
        let mut view = lock(&self.view);
        let outcome = view.apply(action);
        if !matches!(outcome, Ok(Applied::Stale)) {
            self.updates.send_replace(view.clone());
        }
        match outcome? {
            Applied::Stale => Ok(Refresh::Stale),
            _ if matches!(view.status, ViewStatus::Error(_)) => Ok(Refresh::Failed),
            _ => Ok(Refresh::Applied),
        }
    }

    fn selection(&self) -> Option<(String, NaiveDate)> {
        let view = lock(&self.view);
        Some((view.business_id.clone()?, view.date?))
    }

    async fn fetch_all(&self, generation: u64) -> SyncResult<Refresh> {
        let Some((business_id, date)) = self.selection() else {
            return Ok(Refresh::Skipped);
        };
        let backend = &self.ctx.backend;
        let fetched = tokio::try_join!(
            backend.working_hours(&business_id, date),
            backend.booked_times(&business_id, date),
        );
        match fetched {
            Ok((hours, booked_times)) => self.settle(SlotAction::Loaded {
                generation,
                hours,
                booked_times,
            }),
            Err(e) => self.fail(generation, &business_id, e),
        }
    }

    async fn fetch_booked(&self, generation: u64) -> SyncResult<Refresh> {
        let Some((business_id, date)) = self.selection() else {
            return Ok(Refresh::Skipped);
        };
        match self.ctx.backend.booked_times(&business_id, date).await {
            Ok(booked_times) => self.settle(SlotAction::BookedLoaded {
                generation,
                booked_times,
            }),
            Err(e) => self.fail(generation, &business_id, e),
        }
    }

    fn fail(&self, generation: u64, business_id: &str, error: SyncError) -> SyncResult<Refresh> {
        warn!(business_id, generation, error = %error, "slot fetch failed");
        self.settle(SlotAction::Failed {
            generation,
            reason: error.to_string(),
        })
    }

    async fn refresh_booked(&self) -> SyncResult<Refresh> {
        let Some(generation) = self.request(SlotAction::Invalidate)? else {
            return Ok(Refresh::Skipped);
        };
        // Hours not cached yet: the first load was superseded, so load both.
        let has_hours = lock(&self.view).hours().is_some();
        if has_hours {
            self.fetch_booked(generation).await
        } else {
            self.fetch_all(generation).await
        }
    }

    /// Fresh-mount reload after the channel comes back.
    async fn reload(&self) -> SyncResult<Refresh> {
        let (business_id, date, duration_minutes) = {
            let view = lock(&self.view);
            match (view.business_id.clone(), view.date) {
                (Some(business_id), Some(date)) => (business_id, date, view.duration_minutes),
                _ => return Ok(Refresh::Skipped),
            }
        };
        let Some(generation) = self.request(SlotAction::Select {
            business_id,
            date,
            duration_minutes: i64::from(duration_minutes),
        })?
        else {
            return Ok(Refresh::Skipped);
        };
        self.fetch_all(generation).await
    }

    fn ensure_subscribed(this: &Arc<Self>, business_id: &str, force: bool) {
        let topic = Topic::Business(business_id.to_string());
        let mut subscription = lock(&this.subscription);
        if !force && subscription.as_ref().is_some_and(|s| s.topic() == &topic) {
            return;
        }
        let Ok(runtime) = Handle::try_current() else {
            warn!(business_id, "no async runtime; live slot updates disabled");
            return;
        };
        // Replace first so the old handler is gone before the new one exists.
        subscription.take();
        let handler = Self::handler(Arc::downgrade(this), business_id.to_string(), runtime);
        *subscription = Some(this.ctx.channel.subscribe(topic, handler));
    }

    fn handler(weak: Weak<Self>, business_id: String, runtime: Handle) -> Handler {
        Arc::new(move |delivery: &Delivery| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            match delivery {
                Delivery::Event(event) => {
                    let Some(change) = event.appointment_change() else {
                        return;
                    };
                    if change.business_id != business_id {
                        return;
                    }
                    debug!(business_id = %business_id, event = event.name(), "appointments changed");
                    runtime.spawn(async move {
                        if let Err(e) = inner.refresh_booked().await {
                            warn!(error = %e, "slot refresh after push failed");
                        }
                    });
                }
                Delivery::Disconnected => {
                    if let Err(e) = inner.settle(SlotAction::ChannelDown) {
                        warn!(error = %e, "failed to mark slot view offline");
                    }
                }
                Delivery::Reconnected => {
                    let business_id = business_id.clone();
                    runtime.spawn(async move {
                        let _ = inner.settle(SlotAction::ChannelUp);
                        SlotInner::ensure_subscribed(&inner, &business_id, true);
                        if let Err(e) = inner.reload().await {
                            warn!(error = %e, "slot reload after reconnect failed");
                        }
                    });
                }
            }
        })
    }
}
