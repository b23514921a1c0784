//! # SlotSync Sync
//!
//! Wires the pure core to its two external collaborators: the backend HTTP API
//! ([`backend::BackendApi`]) and the push channel ([`channel::PushChannel`]).
//!
//! - [`slots::SlotSynchronizer`] keeps one displayed slot list current
//! - [`conversation::ConversationSession`] keeps one chat transcript current
//!
//! Both own their channel subscription and drop it when closed or dropped.

pub mod backend;
pub mod channel;
pub mod context;
pub mod conversation;
pub mod in_flight;
pub mod mock;
pub mod slots;

use std::sync::{Mutex, MutexGuard};

/// Lock a std mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
