use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::SyncError;
use crate::models::message::Message;

/// A room on the push channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topic {
    Business(String),
    Conversation(String),
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Business(id) => write!(f, "business:{id}"),
            Topic::Conversation(id) => write!(f, "conversation:{id}"),
        }
    }
}

impl FromStr for Topic {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some(("business", id)) if !id.is_empty() => Ok(Topic::Business(id.to_string())),
            Some(("conversation", id)) if !id.is_empty() => Ok(Topic::Conversation(id.to_string())),
            _ => Err(SyncError::validation(format!("unknown room '{s}'"))),
        }
    }
}

impl Serialize for Topic {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Topic {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentChange {
    pub business_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appointment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingEvent {
    pub conversation_id: String,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt {
    pub conversation_id: String,
    pub reader_id: String,
}

/// Named events carried by the push channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum PushEvent {
    AppointmentCreated(AppointmentChange),
    AppointmentUpdated(AppointmentChange),
    AppointmentDeleted(AppointmentChange),
    NewMessage(Message),
    Typing(TypingEvent),
    MarkMessagesRead(ReadReceipt),
}

impl PushEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PushEvent::AppointmentCreated(_) => "appointmentCreated",
            PushEvent::AppointmentUpdated(_) => "appointmentUpdated",
            PushEvent::AppointmentDeleted(_) => "appointmentDeleted",
            PushEvent::NewMessage(_) => "newMessage",
            PushEvent::Typing(_) => "typing",
            PushEvent::MarkMessagesRead(_) => "markMessagesRead",
        }
    }

    pub fn appointment_change(&self) -> Option<&AppointmentChange> {
        match self {
            PushEvent::AppointmentCreated(change)
            | PushEvent::AppointmentUpdated(change)
            | PushEvent::AppointmentDeleted(change) => Some(change),
            _ => None,
        }
    }
}

/// An event addressed to a room: `{"room": "...", "event": "...", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushEnvelope {
    pub room: Topic,
    #[serde(flatten)]
    pub event: PushEvent,
}

/// What a subscriber receives: either an event or a change in channel connectivity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Event(PushEvent),
    Disconnected,
    Reconnected,
}
