//! # Message Reconciler
//!
//! Keeps one conversation's transcript free of duplicates while optimistic local
//! sends, send acknowledgements and pushed messages arrive in any order.
//!
//! Two messages are the same logical message when their ids match, when one's id
//! is the other's temp id, or when their temp ids match. A matching arrival is
//! merged into the existing entry where it stands; only new messages are placed
//! by timestamp.

use std::collections::HashMap;

use crate::models::message::{Message, StatusChange};

/// What [`append_or_merge`] did with an incoming message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    Inserted(usize),
    Merged(usize),
    Unchanged(usize),
}

impl Reconciled {
    pub fn index(self) -> usize {
        match self {
            Reconciled::Inserted(i) | Reconciled::Merged(i) | Reconciled::Unchanged(i) => i,
        }
    }
}

/// Merge `incoming` into the entry it matches, or insert it in timestamp order.
///
/// Applying the same message twice leaves the list as the first application did.
pub fn append_or_merge(list: &mut Vec<Message>, incoming: Message) -> Reconciled {
    if let Some(pos) = list.iter().position(|m| m.same_logical(&incoming)) {
        return merge_at(list, pos, &incoming);
    }
    let pos = insertion_point(list, &incoming);
    list.insert(pos, incoming);
    Reconciled::Inserted(pos)
}

/// Replace the whole list with a history batch, dropping later duplicates.
pub fn set_all(list: &mut Vec<Message>, batch: Vec<Message>) {
    *list = dedup_batch(batch);
}

/// First-seen wins; the survivors are ordered by timestamp (stable).
pub fn dedup_batch(batch: Vec<Message>) -> Vec<Message> {
    let mut unique: Vec<Message> = Vec::with_capacity(batch.len());
    for message in batch {
        if !unique.iter().any(|m| m.same_logical(&message)) {
            unique.push(message);
        }
    }
    unique.sort_by_key(|m| m.timestamp);
    unique
}

fn merge_at(list: &mut [Message], pos: usize, incoming: &Message) -> Reconciled {
    let mut merged = list[pos].clone();
    merged.merge_from(incoming);
    if merged == list[pos] {
        Reconciled::Unchanged(pos)
    } else {
        list[pos] = merged;
        Reconciled::Merged(pos)
    }
}

/// After the last entry not newer than `incoming`, so equal timestamps keep arrival order.
fn insertion_point(list: &[Message], incoming: &Message) -> usize {
    list.iter()
        .rposition(|m| m.timestamp <= incoming.timestamp)
        .map_or(0, |i| i + 1)
}

/// A conversation transcript with an id/temp-id index for constant-time matching.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    index: HashMap<String, usize>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_history(batch: Vec<Message>) -> Self {
        let mut conversation = Self::new();
        conversation.set_all(batch);
        conversation
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Look up by server id or temp id.
    pub fn get(&self, key: &str) -> Option<&Message> {
        self.index.get(key).map(|&i| &self.messages[i])
    }

    pub fn append_or_merge(&mut self, incoming: Message) -> Reconciled {
        match self.find(&incoming) {
            Some(pos) => {
                let old_keys: Vec<String> = self.messages[pos].keys().map(str::to_string).collect();
                let outcome = merge_at(&mut self.messages, pos, &incoming);
                if let Reconciled::Merged(pos) = outcome {
                    for key in old_keys {
                        self.index.remove(&key);
                    }
                    self.index_entry(pos);
                }
                outcome
            }
            None => {
                let pos = insertion_point(&self.messages, &incoming);
                self.messages.insert(pos, incoming);
                if pos + 1 == self.messages.len() {
                    self.index_entry(pos);
                } else {
                    self.reindex();
                }
                Reconciled::Inserted(pos)
            }
        }
    }

    pub fn set_all(&mut self, batch: Vec<Message>) {
        self.messages = dedup_batch(batch);
        self.reindex();
    }

    /// Apply a lifecycle change to one entry. Returns whether its status moved.
    pub fn change_status(&mut self, key: &str, change: StatusChange) -> bool {
        let Some(&pos) = self.index.get(key) else {
            return false;
        };
        let entry = &mut self.messages[pos];
        match entry.status.apply(change) {
            Some(next) => {
                entry.status = next;
                true
            }
            None => false,
        }
    }

    /// Mark everything `sender` sent to `reader` as read. Returns how many moved.
    pub fn mark_read(&mut self, sender: &str, reader: &str) -> usize {
        let mut moved = 0;
        for entry in self
            .messages
            .iter_mut()
            .filter(|m| m.from == sender && m.to == reader)
        {
            if let Some(next) = entry.status.apply(StatusChange::Read) {
                entry.status = next;
                moved += 1;
            }
        }
        moved
    }

    /// Entries still waiting on, or failed at, the server.
    pub fn unsettled(&self) -> Vec<Message> {
        self.messages
            .iter()
            .filter(|m| !m.status.is_settled())
            .cloned()
            .collect()
    }

    fn find(&self, incoming: &Message) -> Option<usize> {
        incoming
            .keys()
            .find_map(|key| self.index.get(key).copied())
    }

    fn index_entry(&mut self, pos: usize) {
        let keys: Vec<String> = self.messages[pos].keys().map(str::to_string).collect();
        for key in keys {
            self.index.insert(key, pos);
        }
    }

    fn reindex(&mut self) {
        self.index.clear();
        for pos in 0..self.messages.len() {
            self.index_entry(pos);
        }
    }
}
