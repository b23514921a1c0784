use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a chat message as seen by the sender.
///
/// `Pending -> Sent -> Delivered -> Read`, or `Pending -> Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Failed,
    #[default]
    Sent,
    Delivered,
    Read,
}

/// Something that happened to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    Acknowledged,
    Rejected,
    Delivered,
    Read,
}

impl MessageStatus {
    /// Checked lifecycle transition. `None` means the change does not apply
    /// from this state and the message keeps its current status.
    pub fn apply(self, change: StatusChange) -> Option<MessageStatus> {
        use MessageStatus::*;
        match (self, change) {
            (Pending, StatusChange::Acknowledged) => Some(Sent),
            (Pending, StatusChange::Rejected) => Some(Failed),
            (Sent, StatusChange::Delivered) => Some(Delivered),
            (Sent | Delivered, StatusChange::Read) => Some(Read),
            _ => None,
        }
    }

    fn rank(self) -> u8 {
        match self {
            MessageStatus::Pending => 0,
            MessageStatus::Failed => 1,
            MessageStatus::Sent => 2,
            MessageStatus::Delivered => 3,
            MessageStatus::Read => 4,
        }
    }

    /// Combine two observations of the same message. The further-along status
    /// wins, so a stale placeholder never drags a settled entry back.
    pub fn merge(self, other: MessageStatus) -> MessageStatus {
        if other.rank() > self.rank() { other } else { self }
    }

    pub fn is_settled(self) -> bool {
        !matches!(self, MessageStatus::Pending | MessageStatus::Failed)
    }
}

/// A chat message, either server-confirmed or an optimistic local placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_id: Option<String>,
    pub conversation_id: String,
    pub from: String,
    pub to: String,
    pub text: String,
    #[serde(rename = "fileUrl", default, skip_serializing_if = "Option::is_none")]
    pub file_ref: Option<String>,
    #[serde(rename = "createdAt")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub status: MessageStatus,
}

impl Message {
    /// Build an optimistic placeholder whose id is its own temp id.
    pub fn optimistic(conversation_id: &str, from: &str, to: &str, draft: &MessageDraft) -> Self {
        let temp_id = format!("tmp-{}", Uuid::new_v4());
        Self {
            id: temp_id.clone(),
            temp_id: Some(temp_id),
            conversation_id: conversation_id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            text: draft.text.clone(),
            file_ref: draft.file_ref.clone(),
            timestamp: Utc::now(),
            status: MessageStatus::Pending,
        }
    }

    /// True while the entry still carries the locally generated id.
    pub fn is_placeholder(&self) -> bool {
        self.temp_id.as_deref() == Some(self.id.as_str())
    }

    /// Symmetric match on either identifier.
    pub fn same_logical(&self, other: &Message) -> bool {
        self.id == other.id
            || other.temp_id.as_deref() == Some(self.id.as_str())
            || self.temp_id.as_deref() == Some(other.id.as_str())
            || matches!((&self.temp_id, &other.temp_id), (Some(a), Some(b)) if a == b)
    }

    /// Fold `incoming` onto this entry. Server-assigned id and timestamp win
    /// over a placeholder's; status only moves forward.
    pub fn merge_from(&mut self, incoming: &Message) {
        if !(incoming.is_placeholder() && !self.is_placeholder()) {
            self.id = incoming.id.clone();
            self.timestamp = incoming.timestamp;
        }
        if incoming.temp_id.is_some() {
            self.temp_id = incoming.temp_id.clone();
        }
        if incoming.file_ref.is_some() {
            self.file_ref = incoming.file_ref.clone();
        }
        self.conversation_id = incoming.conversation_id.clone();
        self.from = incoming.from.clone();
        self.to = incoming.to.clone();
        self.text = incoming.text.clone();
        self.status = self.status.merge(incoming.status);
    }

    /// Identifiers this entry can be looked up by.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.id.as_str()).chain(self.temp_id.as_deref())
    }
}

/// What the user typed, before it becomes a [`Message`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDraft {
    pub text: String,
    #[serde(rename = "fileUrl", default, skip_serializing_if = "Option::is_none")]
    pub file_ref: Option<String>,
}

impl MessageDraft {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            file_ref: None,
        }
    }
}

/// Body of the backend's send-message call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub temp_id: String,
    pub conversation_id: String,
    pub from: String,
    pub to: String,
    pub text: String,
    #[serde(rename = "fileUrl", default, skip_serializing_if = "Option::is_none")]
    pub file_ref: Option<String>,
}

impl From<&Message> for SendMessageRequest {
    fn from(message: &Message) -> Self {
        Self {
            temp_id: message
                .temp_id
                .clone()
                .unwrap_or_else(|| message.id.clone()),
            conversation_id: message.conversation_id.clone(),
            from: message.from.clone(),
            to: message.to.clone(),
            text: message.text.clone(),
            file_ref: message.file_ref.clone(),
        }
    }
}
