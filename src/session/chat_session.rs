use crate::application_port::*;
use crate::domain_model::*;
use crate::logger::*;
use crate::session::{ConfirmOutcome, ConversationLog};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Lifecycle of one conversation. `LoadFailed` is terminal for that load
/// attempt; a peer change or a manual retry starts a new one.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SessionState {
    Uninitialized,
    Loading,
    Ready,
    LoadFailed,
}

#[derive(Debug)]
pub enum SessionCommand {
    SetPeer(UserId),
    SendText(String),
    RetrySend(MessageId),
    RetryLoad,
    Snapshot(oneshot::Sender<SessionSnapshot>),
}

/// Notifications for the owning view. `Appended` fires on every list
/// growth so the view can follow the newest entry.
#[derive(Debug)]
pub enum SessionEvent {
    LoadStarted,
    HistoryLoaded { count: usize },
    LoadFailed(HistoryError),
    Appended(Message),
    Confirmed { temp_id: MessageId, message: Message },
    SendFailed { temp_id: MessageId },
}

#[derive(Debug)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub entries: Vec<ChatEntry>,
}

enum Internal {
    HistoryResult {
        epoch: u64,
        result: Result<Vec<Message>, HistoryError>,
    },
    AckResult {
        temp_id: MessageId,
        result: Result<AckResponse, ChannelError>,
    },
    Channel {
        generation: u64,
        event: ChannelEvent,
    },
}

/// Owner of one running chat session actor. Dropping the handle leaves the
/// actor running; call `shutdown` to tear it down and release the channel
/// subscription.
pub struct ChatSessionHandle {
    commands: UnboundedSender<SessionCommand>,
    cancel: CancellationToken,
    actor_handle: Mutex<Option<JoinHandle<()>>>,
}

impl ChatSessionHandle {
    /// Spawns a session for `current_user` with no peer yet. The session
    /// performs no work until `set_peer` supplies the counterpart.
    pub fn spawn(
        current_user: UserId,
        channel: Arc<dyn RealtimeChannel>,
        history: Arc<dyn HistoryApi>,
    ) -> (Self, UnboundedReceiver<SessionEvent>) {
        let (command_tx, command_rx) = unbounded_channel();
        let (event_tx, event_rx) = unbounded_channel();
        let (internal_tx, internal_rx) = unbounded_channel();
        let cancel = CancellationToken::new();

        let actor = SessionActor {
            current_user,
            peer: None,
            channel,
            history,
            log: None,
            state: SessionState::Uninitialized,
            load_epoch: 0,
            sub_generation: 0,
            active_subscription: None,
            buffered_live: Vec::new(),
            events: event_tx,
            internal_tx,
        };
        let actor_handle = tokio::spawn(actor.run(command_rx, internal_rx, cancel.clone()));

        let handle = Self {
            commands: command_tx,
            cancel,
            actor_handle: Mutex::new(Some(actor_handle)),
        };
        (handle, event_rx)
    }

    pub fn set_peer(&self, peer: UserId) {
        self.send(SessionCommand::SetPeer(peer));
    }

    pub fn send_text(&self, text: impl Into<String>) {
        self.send(SessionCommand::SendText(text.into()));
    }

    pub fn retry_send(&self, id: MessageId) {
        self.send(SessionCommand::RetrySend(id));
    }

    pub fn retry_load(&self) {
        self.send(SessionCommand::RetryLoad);
    }

    /// Current state and list contents, fetched through the actor mailbox.
    pub async fn snapshot(&self) -> Option<SessionSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Snapshot(tx));
        rx.await.ok()
    }

    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handle = match self.actor_handle.lock() {
            Ok(mut lock) => lock.take(),
            Err(_) => None,
        };
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    fn send(&self, command: SessionCommand) {
        if self.commands.send(command).is_err() {
            warn!("chat session is gone, command dropped");
        }
    }
}

struct SessionActor {
    current_user: UserId,
    peer: Option<UserId>,
    channel: Arc<dyn RealtimeChannel>,
    history: Arc<dyn HistoryApi>,
    log: Option<ConversationLog>,
    state: SessionState,
    load_epoch: u64,
    sub_generation: u64,
    active_subscription: Option<SubscriptionId>,
    /// Live messages that arrived while the baseline load was in flight.
    buffered_live: Vec<Message>,
    events: UnboundedSender<SessionEvent>,
    internal_tx: UnboundedSender<Internal>,
}

impl SessionActor {
    async fn run(
        mut self,
        mut commands: UnboundedReceiver<SessionCommand>,
        mut internal_rx: UnboundedReceiver<Internal>,
        cancel: CancellationToken,
    ) {
        debug!("chat session for [{}] starting", self.current_user);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                Some(command) = commands.recv() => self.handle_command(command),
                Some(internal) = internal_rx.recv() => self.handle_internal(internal),
            }
        }
        self.drop_subscription();
        debug!("chat session for [{}] shut down", self.current_user);
    }

    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::SetPeer(peer) => self.set_peer(peer),
            SessionCommand::SendText(text) => self.send_text(text),
            SessionCommand::RetrySend(id) => self.retry_send(id),
            SessionCommand::RetryLoad => self.begin_load(),
            SessionCommand::Snapshot(reply) => {
                let snapshot = SessionSnapshot {
                    state: self.state,
                    entries: self
                        .log
                        .as_ref()
                        .map(|l| l.entries().to_vec())
                        .unwrap_or_default(),
                };
                let _ = reply.send(snapshot);
            }
        }
    }

    fn handle_internal(&mut self, internal: Internal) {
        match internal {
            Internal::HistoryResult { epoch, result } => self.apply_history(epoch, result),
            Internal::AckResult { temp_id, result } => self.apply_ack(temp_id, result),
            Internal::Channel { generation, event } => {
                if generation != self.sub_generation {
                    return; // a subscription we already tore down
                }
                self.handle_channel_event(event);
            }
        }
    }

    fn set_peer(&mut self, peer: UserId) {
        if self.peer.as_ref() == Some(&peer) {
            return;
        }
        if peer == self.current_user {
            warn!("refusing a conversation of [{}] with itself", peer);
            return;
        }
        self.drop_subscription();
        self.buffered_live.clear();
        self.state = SessionState::Uninitialized;

        let pair = UserPair::new(self.current_user.clone(), peer.clone());
        self.log = Some(ConversationLog::new(pair));
        self.peer = Some(peer);

        self.sub_generation += 1;
        let subscription = self.channel.subscribe();
        self.active_subscription = Some(subscription.id().clone());
        tokio::spawn(forward_channel(
            subscription,
            self.sub_generation,
            self.internal_tx.clone(),
        ));

        self.begin_load();
    }

    fn begin_load(&mut self) {
        let Some(peer) = self.peer.clone() else {
            warn!("history load requested before a peer was set");
            return;
        };
        self.load_epoch += 1;
        let epoch = self.load_epoch;
        if self.state != SessionState::Ready {
            self.state = SessionState::Loading;
        }
        self.emit(SessionEvent::LoadStarted);

        let history = self.history.clone();
        let current = self.current_user.clone();
        let internal_tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let result = history.conversation_history(&current, &peer).await;
            let _ = internal_tx.send(Internal::HistoryResult { epoch, result });
        });
    }

    fn apply_history(&mut self, epoch: u64, result: Result<Vec<Message>, HistoryError>) {
        if epoch != self.load_epoch {
            debug!("discarding history response from a superseded load");
            return;
        }
        match result {
            Ok(messages) => {
                let buffered = std::mem::take(&mut self.buffered_live);
                let Some(log) = self.log.as_mut() else {
                    return;
                };
                log.rebaseline(messages);
                for message in buffered {
                    log.append_remote(message);
                }
                let count = log.len();
                self.state = SessionState::Ready;
                self.emit(SessionEvent::HistoryLoaded { count });
            }
            Err(e) => {
                // list untouched, no automatic retry
                warn!("history load failed: {}", e);
                if self.state == SessionState::Loading {
                    self.state = SessionState::LoadFailed;
                }
                self.emit(SessionEvent::LoadFailed(e));
            }
        }
    }

    fn handle_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Message(message) => self.apply_live(message),
            ChannelEvent::Reconnected => {
                if self.peer.is_some() {
                    info!("channel reconnected, refreshing history");
                    self.begin_load();
                }
            }
        }
    }

    fn apply_live(&mut self, message: Message) {
        let Some(log) = self.log.as_mut() else {
            return;
        };
        if !log.accepts(&message) {
            return;
        }
        match self.state {
            SessionState::Loading => {
                // baseline not established yet; applied after it lands
                self.buffered_live.push(message);
            }
            SessionState::Ready => {
                if log.append_remote(message.clone()) {
                    self.emit(SessionEvent::Appended(message));
                }
            }
            SessionState::Uninitialized | SessionState::LoadFailed => {}
        }
    }

    fn send_text(&mut self, text: String) {
        let text = text.trim().to_owned();
        if text.is_empty() {
            return;
        }
        let Some(peer) = self.peer.clone() else {
            warn!("send requested before a peer was set");
            return;
        };
        if self.state != SessionState::Ready {
            warn!("send requested before history was loaded, ignoring");
            return;
        }

        let temp_id = MessageId::temporary();
        let message = Message {
            id: temp_id.clone(),
            sender_id: self.current_user.clone(),
            receiver_id: peer,
            text,
            sent_at: None,
        };
        if let Some(log) = self.log.as_mut() {
            log.append_pending(message.clone());
        }
        self.emit(SessionEvent::Appended(message.clone()));
        self.dispatch_send(temp_id, message);
    }

    fn retry_send(&mut self, id: MessageId) {
        let Some(log) = self.log.as_mut() else {
            return;
        };
        let message = match log.entry(&id) {
            Some(entry) if entry.delivery == DeliveryState::Failed => entry.message.clone(),
            _ => {
                warn!("retry requested for [{}], which is not a failed send", id);
                return;
            }
        };
        log.mark_pending(&id);
        self.dispatch_send(id, message);
    }

    fn dispatch_send(&self, temp_id: MessageId, message: Message) {
        let request = SendRequest {
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            text: message.text,
        };
        let channel = self.channel.clone();
        let internal_tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let result = channel.send_message(request).await;
            let _ = internal_tx.send(Internal::AckResult { temp_id, result });
        });
    }

    fn apply_ack(&mut self, temp_id: MessageId, result: Result<AckResponse, ChannelError>) {
        let Some(log) = self.log.as_mut() else {
            return;
        };
        if !log.contains(&temp_id) {
            // pair changed while the send was in flight
            return;
        }
        match result {
            Ok(AckResponse {
                success: true,
                message: Some(confirmed),
            }) => match log.confirm(&temp_id, confirmed.clone()) {
                ConfirmOutcome::Replaced | ConfirmOutcome::Collapsed => {
                    self.emit(SessionEvent::Confirmed {
                        temp_id,
                        message: confirmed,
                    });
                }
                ConfirmOutcome::Missing => {}
            },
            Ok(AckResponse {
                success: true,
                message: None,
            }) => {
                // best-effort ack without a record; the temporary id stays
                debug!("ack for [{}] carried no message body", temp_id);
                if log.mark_confirmed(&temp_id) {
                    if let Some(entry) = log.entry(&temp_id) {
                        let message = entry.message.clone();
                        self.emit(SessionEvent::Confirmed { temp_id, message });
                    }
                }
            }
            Ok(AckResponse { success: false, .. }) => {
                warn!("send [{}] rejected by the backend", temp_id);
                log.mark_failed(&temp_id);
                self.emit(SessionEvent::SendFailed { temp_id });
            }
            Err(e) => {
                warn!("send [{}] failed: {}", temp_id, e);
                log.mark_failed(&temp_id);
                self.emit(SessionEvent::SendFailed { temp_id });
            }
        }
    }

    fn drop_subscription(&mut self) {
        if let Some(id) = self.active_subscription.take() {
            self.channel.unsubscribe(&id);
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}

async fn forward_channel(
    mut subscription: Subscription,
    generation: u64,
    internal_tx: UnboundedSender<Internal>,
) {
    while let Some(event) = subscription.recv().await {
        if internal_tx
            .send(Internal::Channel { generation, event })
            .is_err()
        {
            break;
        }
    }
}
