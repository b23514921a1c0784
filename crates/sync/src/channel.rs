//! # Push Channel
//!
//! Room-scoped publish/subscribe. The transport itself lives outside this
//! crate; [`LocalPushHub`] is the in-process fan-out that a transport feeds
//! (see the API crate's upstream WebSocket) and that sessions subscribe to.
//!
//! A [`Subscription`] is the unsubscribe handle: dropping it removes the handler.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use slotsync_core::{
    errors::{SyncError, SyncResult},
    models::events::{Delivery, PushEnvelope, PushEvent, Topic},
};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::lock;

pub type Handler = Arc<dyn Fn(&Delivery) + Send + Sync>;

pub trait PushChannel: Send + Sync {
    /// Start delivering events for `topic` to `handler`.
    fn subscribe(&self, topic: Topic, handler: Handler) -> Subscription;

    /// Send an event to everyone in `topic`. Fails with `SyncUnavailable`
    /// while the channel is disconnected.
    fn emit(&self, topic: &Topic, event: PushEvent) -> SyncResult<()>;

    fn is_connected(&self) -> bool;
}

trait Unsubscribe: Send + Sync {
    fn unsubscribe(&self, topic: &Topic, id: u64);
}

/// Handle for one registered handler.
pub struct Subscription {
    id: u64,
    topic: Topic,
    owner: Weak<dyn Unsubscribe>,
}

impl Subscription {
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    pub fn unsubscribe(self) {
        // Drop does the work
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(owner) = self.owner.upgrade() {
            owner.unsubscribe(&self.topic, self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .finish()
    }
}

struct HubInner {
    handlers: Mutex<HashMap<Topic, Vec<(u64, Handler)>>>,
    next_id: AtomicU64,
    connected: AtomicBool,
    outbound: broadcast::Sender<PushEnvelope>,
}

impl Unsubscribe for HubInner {
    fn unsubscribe(&self, topic: &Topic, id: u64) {
        let mut handlers = lock(&self.handlers);
        if let Some(list) = handlers.get_mut(topic) {
            list.retain(|(handler_id, _)| *handler_id != id);
            if list.is_empty() {
                handlers.remove(topic);
            }
        }
        debug!(%topic, id, "unsubscribed");
    }
}

impl HubInner {
    fn deliver(&self, topic: &Topic, delivery: &Delivery) -> usize {
        // Handlers run without the lock held so they may (un)subscribe.
        let targets: Vec<Handler> = lock(&self.handlers)
            .get(topic)
            .map(|list| list.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default();
        for handler in &targets {
            handler(delivery);
        }
        targets.len()
    }

    fn deliver_all(&self, delivery: &Delivery) {
        let targets: Vec<Handler> = lock(&self.handlers)
            .values()
            .flat_map(|list| list.iter().map(|(_, h)| h.clone()))
            .collect();
        for handler in &targets {
            handler(delivery);
        }
    }
}

/// In-process hub. Cloning shares the same rooms.
#[derive(Clone)]
pub struct LocalPushHub {
    inner: Arc<HubInner>,
}

impl Default for LocalPushHub {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalPushHub {
    pub fn new() -> Self {
        let (outbound, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(HubInner {
                handlers: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                connected: AtomicBool::new(true),
                outbound,
            }),
        }
    }

    /// Hand an event received from the transport to the room's subscribers.
    /// Returns how many handlers saw it.
    pub fn publish(&self, envelope: &PushEnvelope) -> usize {
        let delivered = self
            .inner
            .deliver(&envelope.room, &Delivery::Event(envelope.event.clone()));
        debug!(room = %envelope.room, event = envelope.event.name(), delivered, "push event");
        delivered
    }

    /// Record a transport state change. Subscribers hear `Disconnected` on the
    /// way down and `Reconnected` on the way back up.
    pub fn set_connected(&self, connected: bool) {
        let was = self.inner.connected.swap(connected, Ordering::SeqCst);
        if was == connected {
            return;
        }
        if connected {
            info!("push channel reconnected");
            self.inner.deliver_all(&Delivery::Reconnected);
        } else {
            info!("push channel disconnected");
            self.inner.deliver_all(&Delivery::Disconnected);
        }
    }

    /// Events emitted by local sessions, for the transport to forward upstream.
    pub fn outbound(&self) -> broadcast::Receiver<PushEnvelope> {
        self.inner.outbound.subscribe()
    }

    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        lock(&self.inner.handlers).get(topic).map_or(0, Vec::len)
    }
}

impl PushChannel for LocalPushHub {
    fn subscribe(&self, topic: Topic, handler: Handler) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.inner.handlers)
            .entry(topic.clone())
            .or_default()
            .push((id, handler));
        debug!(%topic, id, "subscribed");

        let owner: Arc<dyn Unsubscribe> = self.inner.clone();
        Subscription {
            id,
            topic,
            owner: Arc::downgrade(&owner),
        }
    }

    fn emit(&self, topic: &Topic, event: PushEvent) -> SyncResult<()> {
        if !self.is_connected() {
            return Err(SyncError::SyncUnavailable(format!(
                "cannot emit {} to {topic} while disconnected",
                event.name()
            )));
        }
        let envelope = PushEnvelope {
            room: topic.clone(),
            event,
        };
        // No upstream listener is fine; local rooms still hear it.
        let _ = self.inner.outbound.send(envelope.clone());
        self.publish(&envelope);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }
}
