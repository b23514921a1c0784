//! # Conversation Session
//!
//! One open chat view. Local sends show up immediately as pending placeholders
//! and settle when the backend acknowledges them; pushed messages, typing
//! notices and read receipts are folded in as they arrive. Every arrival goes
//! through the reconciler, so an acknowledgement and a broadcast of the same
//! message leave a single entry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use slotsync_core::{
    errors::{SyncError, SyncResult},
    models::{
        events::{Delivery, PushEvent, Topic, TypingEvent},
        message::{Message, MessageDraft, MessageStatus, StatusChange},
    },
    reconcile::{Conversation, Reconciled},
};
use tokio::{runtime::Handle, sync::watch, time::Instant};
use tracing::{debug, info, warn};

use crate::{
    channel::{Handler, Subscription},
    context::SyncContext,
    in_flight::RequestKind,
    lock,
};

/// Who is talking in which conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationKey {
    pub conversation_id: String,
    pub user_id: String,
    pub peer_id: String,
}

#[derive(Default)]
struct ConversationState {
    transcript: Conversation,
    typing_until: HashMap<String, Instant>,
    last_typing_sent: Option<Instant>,
    next_page: u32,
    reload_generation: u64,
    offline: bool,
    load_error: Option<String>,
}

struct SessionInner {
    ctx: SyncContext,
    key: ConversationKey,
    state: Mutex<ConversationState>,
    revision: watch::Sender<u64>,
    subscription: Mutex<Option<Subscription>>,
}

#[derive(Clone)]
pub struct ConversationSession {
    inner: Arc<SessionInner>,
}

impl ConversationSession {
    /// Subscribe to the conversation's room and load the first history page.
    ///
    /// A failed history load does not fail the session; it is reported by
    /// [`ConversationSession::load_error`].
    pub async fn open(ctx: SyncContext, key: ConversationKey) -> Self {
        let (revision, _) = watch::channel(0);
        let session = Self {
            inner: Arc::new(SessionInner {
                ctx,
                key,
                state: Mutex::new(ConversationState {
                    next_page: 1,
                    ..Default::default()
                }),
                revision,
                subscription: Mutex::new(None),
            }),
        };
        SessionInner::subscribe(&session.inner);
        session.inner.reload().await;
        info!(
            conversation_id = %session.inner.key.conversation_id,
            messages = session.messages().len(),
            "conversation opened"
        );
        session
    }

    pub fn key(&self) -> &ConversationKey {
        &self.inner.key
    }

    pub fn messages(&self) -> Vec<Message> {
        lock(&self.inner.state).transcript.messages().to_vec()
    }

    /// Look up by server id or temp id.
    pub fn get(&self, id: &str) -> Option<Message> {
        lock(&self.inner.state).transcript.get(id).cloned()
    }

    /// Peers that typed within the typing timeout.
    pub fn typing_peers(&self) -> Vec<String> {
        let now = Instant::now();
        let mut peers: Vec<String> = lock(&self.inner.state)
            .typing_until
            .iter()
            .filter(|(_, until)| **until > now)
            .map(|(user, _)| user.clone())
            .collect();
        peers.sort();
        peers
    }

    pub fn is_offline(&self) -> bool {
        lock(&self.inner.state).offline
    }

    pub fn load_error(&self) -> Option<String> {
        lock(&self.inner.state).load_error.clone()
    }

    /// Bumped after every change to the session.
    pub fn watch(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    /// Show `draft` immediately as a pending message. Call
    /// [`ConversationSession::deliver`] to actually send it.
    pub fn stage(&self, draft: &MessageDraft) -> SyncResult<Message> {
        if draft.text.trim().is_empty() && draft.file_ref.is_none() {
            return Err(SyncError::validation("message has neither text nor file"));
        }
        let key = &self.inner.key;
        let placeholder =
            Message::optimistic(&key.conversation_id, &key.user_id, &key.peer_id, draft);
        self.inner.merge(placeholder.clone());
        debug!(temp_id = %placeholder.id, "message staged");
        Ok(placeholder)
    }

    /// Send a staged message and settle it with the acknowledgement.
    ///
    /// # Errors
    ///
    /// * `SyncError::NotFound` - no message with this id
    /// * `SyncError::Validation` - the message is not pending
    /// * `SyncError::Conflict` - the message is already being sent
    /// * `SyncError::SendFailed` - the backend rejected it; the entry is now failed
    pub async fn deliver(&self, id: &str) -> SyncResult<Message> {
        let placeholder = self
            .get(id)
            .ok_or_else(|| SyncError::NotFound(format!("message {id}")))?;
        if placeholder.status != MessageStatus::Pending {
            return Err(SyncError::validation(format!(
                "message {id} is {:?}, not pending",
                placeholder.status
            )));
        }
        let request_id = placeholder
            .temp_id
            .clone()
            .unwrap_or_else(|| placeholder.id.clone());

        let _request = self
            .inner
            .ctx
            .in_flight
            .begin(&request_id, RequestKind::SendMessage)?;
        let pending = PendingSend {
            inner: &self.inner,
            temp_id: request_id.clone(),
            acknowledged: false,
        };
        let sent = self
            .inner
            .ctx
            .backend
            .send_message((&placeholder).into())
            .await;

        match sent {
            Ok(mut ack) => {
                pending.acknowledge();
                // The ack must carry the temp id to find the placeholder.
                ack.temp_id.get_or_insert_with(|| request_id.clone());
                ack.status = ack.status.merge(MessageStatus::Sent);
                debug!(temp_id = %request_id, "message acknowledged");
                Ok(self.inner.merge(ack))
            }
            Err(e) => {
                warn!(temp_id = %request_id, error = %e, "message send failed");
                drop(pending);
                Err(SyncError::SendFailed(e.to_string()))
            }
        }
    }

    /// Stage and deliver in one step.
    pub async fn send(&self, draft: &MessageDraft) -> SyncResult<Message> {
        let placeholder = self.stage(draft)?;
        self.deliver(&placeholder.id).await
    }

    /// Resend a failed message as a new message. The failed entry stays.
    pub async fn retry(&self, id: &str) -> SyncResult<Message> {
        let failed = self
            .get(id)
            .ok_or_else(|| SyncError::NotFound(format!("message {id}")))?;
        if failed.status != MessageStatus::Failed {
            return Err(SyncError::validation(format!(
                "only failed messages can be retried, {id} is {:?}",
                failed.status
            )));
        }
        self.send(&MessageDraft {
            text: failed.text,
            file_ref: failed.file_ref,
        })
        .await
    }

    /// Fetch the next older page and merge it. Returns how many entries were new.
    pub async fn load_older(&self) -> usize {
        self.inner.load_older().await
    }

    /// Tell the peer we are typing. At most one event per typing timeout is
    /// emitted; returns whether this call emitted one.
    pub fn notify_typing(&self) -> SyncResult<bool> {
        let now = Instant::now();
        let timeout = self.inner.ctx.settings.typing_timeout;
        {
            let state = lock(&self.inner.state);
            if state
                .last_typing_sent
                .is_some_and(|sent| now.duration_since(sent) < timeout)
            {
                debug!("typing notice coalesced");
                return Ok(false);
            }
        }
        let key = &self.inner.key;
        self.inner.ctx.channel.emit(
            &Topic::Conversation(key.conversation_id.clone()),
            PushEvent::Typing(TypingEvent {
                conversation_id: key.conversation_id.clone(),
                user_id: key.user_id.clone(),
            }),
        )?;
        lock(&self.inner.state).last_typing_sent = Some(now);
        Ok(true)
    }

    /// Stop listening to the push channel.
    pub fn close(&self) {
        lock(&self.inner.subscription).take();
    }
}

/// Marks a staged message failed if dropped before its acknowledgement,
/// including when the delivering future is cancelled mid-request.
struct PendingSend<'a> {
    inner: &'a SessionInner,
    temp_id: String,
    acknowledged: bool,
}

impl PendingSend<'_> {
    fn acknowledge(mut self) {
        self.acknowledged = true;
    }
}

impl Drop for PendingSend<'_> {
    fn drop(&mut self) {
        if !self.acknowledged {
            self.inner.reject(&self.temp_id);
        }
    }
}

impl SessionInner {
    fn bump(&self) {
        self.revision.send_modify(|r| *r += 1);
    }

    /// Reconcile `message` and return the entry it ended up in.
    fn merge(&self, message: Message) -> Message {
        let (outcome, merged) = {
            let mut state = lock(&self.state);
            let outcome = state.transcript.append_or_merge(message);
            // The index stays valid while the lock is held
            let merged = state.transcript.messages()[outcome.index()].clone();
            (outcome, merged)
        };
        if !matches!(outcome, Reconciled::Unchanged(_)) {
            self.bump();
        }
        merged
    }

    /// Move a pending message to failed. Settled entries are left alone.
    fn reject(&self, key: &str) {
        let moved = lock(&self.state)
            .transcript
            .change_status(key, StatusChange::Rejected);
        if moved {
            debug!(temp_id = key, "message marked failed");
            self.bump();
        }
    }

    /// Fresh mount: install the first page, then put back local entries the
    /// server does not know about yet and anything that arrived while the
    /// page was in flight. Only the newest reload is applied.
    async fn reload(&self) {
        let (generation, before) = {
            let mut state = lock(&self.state);
            state.reload_generation += 1;
            let before: HashMap<String, Message> = state
                .transcript
                .messages()
                .iter()
                .map(|m| (m.id.clone(), m.clone()))
                .collect();
            (state.reload_generation, before)
        };
        let limit = self.ctx.settings.history_page_size;
        let fetched = self
            .ctx
            .backend
            .message_history(&self.key.conversation_id, 1, limit)
            .await;
        {
            let mut state = lock(&self.state);
            if state.reload_generation != generation {
                debug!(conversation_id = %self.key.conversation_id, generation, "superseded history reload dropped");
                return;
            }
            match fetched {
                Ok(history) => {
                    let local = state.transcript.messages().to_vec();
                    state.transcript.set_all(history);
                    for message in local.into_iter().filter(|m| {
                        !m.status.is_settled() || before.get(&m.id) != Some(m)
                    }) {
                        state.transcript.append_or_merge(message);
                    }
                    state.next_page = 2;
                    state.load_error = None;
                }
                Err(e) => {
                    warn!(conversation_id = %self.key.conversation_id, error = %e, "history load failed");
                    state.load_error = Some(e.to_string());
                }
            }
        }
        self.bump();
    }

    async fn load_older(&self) -> usize {
        let (page, limit) = (
            lock(&self.state).next_page,
            self.ctx.settings.history_page_size,
        );
        let fetched = self
            .ctx
            .backend
            .message_history(&self.key.conversation_id, page, limit)
            .await;
        let added = {
            let mut state = lock(&self.state);
            match fetched {
                Ok(older) => {
                    if !older.is_empty() {
                        state.next_page = page + 1;
                    }
                    state.load_error = None;
                    older
                        .into_iter()
                        .map(|m| state.transcript.append_or_merge(m))
                        .filter(|outcome| matches!(outcome, Reconciled::Inserted(_)))
                        .count()
                }
                Err(e) => {
                    warn!(conversation_id = %self.key.conversation_id, page, error = %e, "older history load failed");
                    state.load_error = Some(e.to_string());
                    0
                }
            }
        };
        self.bump();
        added
    }

    /// Fold one push event in. Returns the deadline of a typing notice so the
    /// caller can schedule its expiry.
    fn on_event(&self, event: &PushEvent) -> Option<Instant> {
        let key = &self.key;
        match event {
            PushEvent::NewMessage(message) if message.conversation_id == key.conversation_id => {
                lock(&self.state).typing_until.remove(&message.from);
                self.merge(message.clone());
            }
            PushEvent::Typing(typing)
                if typing.conversation_id == key.conversation_id && typing.user_id != key.user_id =>
            {
                let until = Instant::now() + self.ctx.settings.typing_timeout;
                lock(&self.state)
                    .typing_until
                    .insert(typing.user_id.clone(), until);
                self.bump();
                return Some(until);
            }
            PushEvent::MarkMessagesRead(receipt)
                if receipt.conversation_id == key.conversation_id
                    && receipt.reader_id != key.user_id =>
            {
                let moved = lock(&self.state)
                    .transcript
                    .mark_read(&key.user_id, &receipt.reader_id);
                if moved > 0 {
                    self.bump();
                }
            }
            _ => {}
        }
        None
    }

    /// Drop typing flags whose deadline passed.
    fn expire_typing(&self) {
        let now = Instant::now();
        let expired = {
            let mut state = lock(&self.state);
            let before = state.typing_until.len();
            state.typing_until.retain(|_, until| *until > now);
            before != state.typing_until.len()
        };
        if expired {
            self.bump();
        }
    }

    fn subscribe(this: &Arc<Self>) {
        let Ok(runtime) = Handle::try_current() else {
            warn!(conversation_id = %this.key.conversation_id, "no async runtime; live messages disabled");
            return;
        };
        let topic = Topic::Conversation(this.key.conversation_id.clone());
        let handler = Self::handler(Arc::downgrade(this), runtime);
        let mut subscription = lock(&this.subscription);
        subscription.take();
        *subscription = Some(this.ctx.channel.subscribe(topic, handler));
    }

    fn handler(weak: Weak<Self>, runtime: Handle) -> Handler {
        Arc::new(move |delivery: &Delivery| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            match delivery {
                Delivery::Event(event) => {
                    if let Some(until) = inner.on_event(event) {
                        let weak = Arc::downgrade(&inner);
                        runtime.spawn(async move {
                            tokio::time::sleep_until(until).await;
                            if let Some(inner) = weak.upgrade() {
                                inner.expire_typing();
                            }
                        });
                    }
                }
                Delivery::Disconnected => {
                    lock(&inner.state).offline = true;
                    inner.bump();
                }
                Delivery::Reconnected => {
                    runtime.spawn(async move {
                        lock(&inner.state).offline = false;
                        SessionInner::subscribe(&inner);
                        inner.reload().await;
                    });
                }
            }
        })
    }
}
