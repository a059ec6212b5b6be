use crate::domain_model::*;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedReceiver;

/// Outbound send payload as emitted over the realtime channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub text: String,
}

/// Best-effort acknowledgment for a send. `message` carries the
/// server-confirmed record when the backend supplies one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AckResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
}

/// Events fanned out to every subscriber. The channel is shared across all
/// conversations; filtering by pair is the subscriber's job.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    Message(Message),
    /// The underlying transport dropped and came back. Subscribers decide
    /// how to close the gap (the session re-fetches history).
    Reconnected,
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct SubscriptionId(pub String);

/// A registered handler slot on the shared channel. Hold the receiver to
/// get events; pass the id back to `unsubscribe` on teardown.
pub struct Subscription {
    id: SubscriptionId,
    receiver: UnboundedReceiver<ChannelEvent>,
}

impl Subscription {
    pub fn new(id: SubscriptionId, receiver: UnboundedReceiver<ChannelEvent>) -> Self {
        Self { id, receiver }
    }

    pub fn id(&self) -> &SubscriptionId {
        &self.id
    }

    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        self.receiver.recv().await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("channel disconnected")]
    Disconnected,
    #[error("acknowledgment timed out")]
    AckTimeout,
    #[error("transport error: {0}")]
    Transport(String),
}

/// Process-wide realtime bus. One connection multiplexes every
/// conversation; subscribers never own or close it.
#[async_trait::async_trait]
pub trait RealtimeChannel: Send + Sync {
    fn subscribe(&self) -> Subscription;
    fn unsubscribe(&self, id: &SubscriptionId);
    async fn send_message(&self, request: SendRequest) -> Result<AckResponse, ChannelError>;
}
