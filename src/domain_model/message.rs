use crate::domain_model::*;
use chrono::{DateTime, Utc};
use nanoid::nanoid;
use serde::{Deserialize, Serialize};

const TEMP_PREFIX: &str = "temp-";

/// Message identifier. Server-assigned ids are opaque; ids minted locally
/// for optimistic sends carry the `temp-` prefix until the ack replaces them.
#[derive(Debug, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn temporary() -> Self {
        MessageId(format!("{}{}", TEMP_PREFIX, nanoid!(12)))
    }

    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(TEMP_PREFIX)
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One chat message as the backend serializes it. The id field travels as
/// `_id`, everything else as camelCase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(rename = "_id")]
    pub id: MessageId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
}

/// Local delivery status of one list entry. History and live entries are
/// `Confirmed`; optimistic sends start `Pending` and end `Confirmed` or
/// `Failed`, never silently stuck.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum DeliveryState {
    Confirmed,
    Pending,
    Failed,
}

/// One row of a conversation list: the message plus its delivery status.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatEntry {
    pub message: Message,
    pub delivery: DeliveryState,
}

impl ChatEntry {
    pub fn confirmed(message: Message) -> Self {
        Self {
            message,
            delivery: DeliveryState::Confirmed,
        }
    }

    pub fn pending(message: Message) -> Self {
        Self {
            message,
            delivery: DeliveryState::Pending,
        }
    }
}
