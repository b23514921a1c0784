pub mod appointment;
pub mod events;
pub mod message;
pub mod schedule;
pub mod time;
