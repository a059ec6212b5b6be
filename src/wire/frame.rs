use crate::application_port::{AckResponse, SendRequest};
use crate::domain_model::Message;
use serde::{Deserialize, Serialize};

/// Frames emitted by this client over the realtime channel.
#[derive(Debug, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "payload",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientFrame {
    SendMessage {
        ack_id: String,
        #[serde(flatten)]
        request: SendRequest,
    },
}

/// Frames the backend pushes down the channel. Anything that does not
/// parse into one of these is dropped at the boundary.
#[derive(Debug, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "payload",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerFrame {
    ReceiveMessage(Message),
    SendAck {
        ack_id: String,
        #[serde(flatten)]
        ack: AckResponse,
    },
}
