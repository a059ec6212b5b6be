use crate::application_port::*;
use crate::domain_model::*;
use crate::logger::*;
use chrono::Utc;
use dashmap::DashMap;
use nanoid::nanoid;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};

/// How the fake answers sends. `Accept` assigns a server id and acks with
/// the confirmed record.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FakeAckMode {
    Accept,
    Reject,
    Timeout,
}

/// In-process stand-in for the realtime bus: loops sends back as acks and
/// lets tests (and the demo binary) inject inbound traffic directly.
pub struct FakeRealtimeChannel {
    subscribers: DashMap<SubscriptionId, UnboundedSender<ChannelEvent>>,
    ack_mode: Mutex<FakeAckMode>,
    /// When set, accepted sends are also delivered back to every
    /// subscriber, the way a bus that echoes to the sender would.
    echo_to_sender: AtomicBool,
    next_id: AtomicU64,
}

impl FakeRealtimeChannel {
    pub fn new() -> Self {
        Self {
            subscribers: DashMap::new(),
            ack_mode: Mutex::new(FakeAckMode::Accept),
            echo_to_sender: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn set_ack_mode(&self, mode: FakeAckMode) {
        if let Ok(mut lock) = self.ack_mode.lock() {
            *lock = mode;
        }
    }

    pub fn set_echo_to_sender(&self, echo: bool) {
        self.echo_to_sender.store(echo, Ordering::Relaxed);
    }

    /// Delivers a message to every subscriber, as the backend would on
    /// `receiveMessage`.
    pub fn push_inbound(&self, message: Message) {
        self.fan_out(ChannelEvent::Message(message));
    }

    /// Simulates the transport dropping and coming back.
    pub fn emit_reconnected(&self) {
        self.fan_out(ChannelEvent::Reconnected);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    fn fan_out(&self, event: ChannelEvent) {
        self.subscribers
            .retain(|_, sender| sender.send(event.clone()).is_ok());
    }

    fn next_server_id(&self) -> MessageId {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        MessageId(format!("srv-{}", n))
    }
}

impl Default for FakeRealtimeChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RealtimeChannel for FakeRealtimeChannel {
    fn subscribe(&self) -> Subscription {
        let id = SubscriptionId(nanoid!(8));
        let (sender, receiver) = unbounded_channel();
        self.subscribers.insert(id.clone(), sender);
        Subscription::new(id, receiver)
    }

    fn unsubscribe(&self, id: &SubscriptionId) {
        self.subscribers.remove(id);
    }

    async fn send_message(&self, request: SendRequest) -> Result<AckResponse, ChannelError> {
        let mode = self
            .ack_mode
            .lock()
            .map(|m| *m)
            .unwrap_or(FakeAckMode::Accept);
        match mode {
            FakeAckMode::Accept => {
                let confirmed = Message {
                    id: self.next_server_id(),
                    sender_id: request.sender_id,
                    receiver_id: request.receiver_id,
                    text: request.text,
                    sent_at: Some(Utc::now()),
                };
                if self.echo_to_sender.load(Ordering::Relaxed) {
                    self.push_inbound(confirmed.clone());
                }
                Ok(AckResponse {
                    success: true,
                    message: Some(confirmed),
                })
            }
            FakeAckMode::Reject => {
                debug!("fake channel rejecting send from [{}]", request.sender_id);
                Ok(AckResponse {
                    success: false,
                    message: None,
                })
            }
            FakeAckMode::Timeout => Err(ChannelError::AckTimeout),
        }
    }
}
