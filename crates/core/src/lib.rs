//! # SlotSync Core
//!
//! Pure building blocks for appointment availability and chat reconciliation.
//! Nothing in this crate performs I/O: the synchronizer crate feeds it data
//! fetched from the backend and events received from the push channel.
//!
//! - [`availability`]: turns a day's working hours into bookable slots
//! - [`reconcile`]: keeps a conversation free of duplicate messages
//! - [`slot_view`]: generation-guarded state of a displayed slot list

pub mod availability;
pub mod errors;
pub mod models;
pub mod reconcile;
pub mod slot_view;
