use crate::domain_model::*;

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("no counterpart assigned")]
    NoPeer,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected status {0}")]
    Status(u16),
}

/// Resolves the counterpart of the logged-in user before a conversation
/// can start (a client chats with their assigned freelancer).
#[async_trait::async_trait]
pub trait PeerDirectory: Send + Sync {
    async fn resolve_peer(&self) -> Result<UserId, DirectoryError>;
}
