use crate::domain_model::*;

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("malformed history payload: {0}")]
    Malformed(String),
}

/// Durable message store, read once per conversation: given a pair, return
/// all prior messages between them, oldest first.
#[async_trait::async_trait]
pub trait HistoryApi: Send + Sync {
    async fn conversation_history(
        &self,
        current: &UserId,
        other: &UserId,
    ) -> Result<Vec<Message>, HistoryError>;
}
