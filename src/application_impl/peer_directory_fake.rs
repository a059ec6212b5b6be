use crate::application_port::*;
use crate::domain_model::*;
use std::sync::Mutex;

#[derive(Debug)]
pub struct FakePeerDirectory {
    peer: Mutex<Option<UserId>>,
}

impl FakePeerDirectory {
    pub fn new(peer: Option<UserId>) -> Self {
        Self {
            peer: Mutex::new(peer),
        }
    }

    pub fn set_peer(&self, peer: UserId) {
        if let Ok(mut lock) = self.peer.lock() {
            *lock = Some(peer);
        }
    }
}

#[async_trait::async_trait]
impl PeerDirectory for FakePeerDirectory {
    async fn resolve_peer(&self) -> Result<UserId, DirectoryError> {
        self.peer
            .lock()
            .ok()
            .and_then(|lock| lock.clone())
            .ok_or(DirectoryError::NoPeer)
    }
}
