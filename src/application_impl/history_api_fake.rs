use crate::application_port::*;
use crate::domain_model::*;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// In-memory history store. `hold` gates a pair's response until the test
/// releases it, for exercising in-flight pair changes.
pub struct FakeHistoryApi {
    histories: DashMap<UserPair, Vec<Message>>,
    gates: DashMap<UserPair, Arc<Notify>>,
    failing: AtomicBool,
}

impl FakeHistoryApi {
    pub fn new() -> Self {
        Self {
            histories: DashMap::new(),
            gates: DashMap::new(),
            failing: AtomicBool::new(false),
        }
    }

    pub fn seed(&self, a: &UserId, b: &UserId, messages: Vec<Message>) {
        self.histories
            .insert(UserPair::new(a.clone(), b.clone()), messages);
    }

    /// Makes the next fetch for the pair wait until the returned handle is
    /// notified.
    pub fn hold(&self, a: &UserId, b: &UserId) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates
            .insert(UserPair::new(a.clone(), b.clone()), gate.clone());
        gate
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }
}

impl Default for FakeHistoryApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl HistoryApi for FakeHistoryApi {
    async fn conversation_history(
        &self,
        current: &UserId,
        other: &UserId,
    ) -> Result<Vec<Message>, HistoryError> {
        let pair = UserPair::new(current.clone(), other.clone());

        let gate = self.gates.get(&pair).map(|g| g.value().clone());
        if let Some(gate) = gate {
            gate.notified().await;
            self.gates.remove(&pair);
        }

        if self.failing.load(Ordering::Relaxed) {
            return Err(HistoryError::Transport("simulated outage".to_owned()));
        }

        Ok(self
            .histories
            .get(&pair)
            .map(|h| h.value().clone())
            .unwrap_or_default())
    }
}
