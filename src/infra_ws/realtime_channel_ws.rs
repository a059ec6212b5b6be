use crate::application_port::*;
use crate::logger::*;
use crate::wire::*;
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use nanoid::nanoid;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone)]
pub struct WsChannelConfig {
    pub url: String,
    pub reconnect_delay: Duration,
    pub ack_timeout: Duration,
}

/// The process-wide realtime connection. One websocket multiplexes every
/// conversation; sessions subscribe for fan-out and emit sends with ack
/// correlation. The connection task reconnects forever with a fixed delay
/// and announces each recovery so subscribers can close the gap.
pub struct WsRealtimeChannel {
    subscribers: Arc<DashMap<SubscriptionId, UnboundedSender<ChannelEvent>>>,
    pending_acks: Arc<DashMap<String, oneshot::Sender<AckResponse>>>,
    outbound: UnboundedSender<ClientFrame>,
    ack_timeout: Duration,
    cancel: CancellationToken,
    conn_handle: Mutex<Option<JoinHandle<()>>>,
}

impl WsRealtimeChannel {
    pub fn connect(config: WsChannelConfig) -> anyhow::Result<Arc<Self>> {
        let url = Url::parse(&config.url)?;
        let subscribers = Arc::new(DashMap::new());
        let pending_acks = Arc::new(DashMap::new());
        let (outbound_tx, outbound_rx) = unbounded_channel();
        let cancel = CancellationToken::new();

        let task = ConnectionTask {
            url,
            reconnect_delay: config.reconnect_delay,
            subscribers: subscribers.clone(),
            pending_acks: pending_acks.clone(),
            cancel: cancel.clone(),
        };
        let conn_handle = tokio::spawn(task.run(outbound_rx));

        Ok(Arc::new(Self {
            subscribers,
            pending_acks,
            outbound: outbound_tx,
            ack_timeout: config.ack_timeout,
            cancel,
            conn_handle: Mutex::new(Some(conn_handle)),
        }))
    }

    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handle = match self.conn_handle.lock() {
            Ok(mut lock) => lock.take(),
            Err(_) => None,
        };
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

#[async_trait::async_trait]
impl RealtimeChannel for WsRealtimeChannel {
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
        let ack_id = nanoid!(12);
        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending_acks.insert(ack_id.clone(), reply_tx);

        let frame = ClientFrame::SendMessage {
            ack_id: ack_id.clone(),
            request,
        };
        if self.outbound.send(frame).is_err() {
            self.pending_acks.remove(&ack_id);
            return Err(ChannelError::Disconnected);
        }

        match tokio::time::timeout(self.ack_timeout, reply_rx).await {
            Ok(Ok(ack)) => Ok(ack),
            // the connection dropped with the ack outstanding
            Ok(Err(_)) => Err(ChannelError::Disconnected),
            Err(_) => {
                self.pending_acks.remove(&ack_id);
                Err(ChannelError::AckTimeout)
            }
        }
    }
}

struct ConnectionTask {
    url: Url,
    reconnect_delay: Duration,
    subscribers: Arc<DashMap<SubscriptionId, UnboundedSender<ChannelEvent>>>,
    pending_acks: Arc<DashMap<String, oneshot::Sender<AckResponse>>>,
    cancel: CancellationToken,
}

impl ConnectionTask {
    async fn run(self, mut outbound_rx: UnboundedReceiver<ClientFrame>) {
        let mut connected_before = false;
        loop {
            let stream = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return,
                result = connect_async(self.url.as_str()) => match result {
                    Ok((stream, _)) => stream,
                    Err(e) => {
                        warn!("channel connect to {} failed: {}", self.url, e);
                        if !self.wait_before_retry().await {
                            return;
                        }
                        continue;
                    }
                },
            };

            if connected_before {
                info!("channel reconnected");
                self.fan_out(ChannelEvent::Reconnected);
            } else {
                info!("channel connected");
                connected_before = true;
            }

            self.drive(stream, &mut outbound_rx).await;
            if self.cancel.is_cancelled() {
                return;
            }

            // drop the reply slots so in-flight sends fail fast
            self.pending_acks.clear();

            if !self.wait_before_retry().await {
                return;
            }
        }
    }

    async fn drive(&self, stream: WsStream, outbound_rx: &mut UnboundedReceiver<ClientFrame>) {
        let (mut sink, mut stream) = stream.split();
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    let _ = sink.send(WsMessage::Close(None)).await;
                    return;
                }
                Some(frame) = outbound_rx.recv() => {
                    let text = match serde_json::to_string(&frame) {
                        Ok(text) => text,
                        Err(e) => {
                            error!("failed to serialize outbound frame: {}", e);
                            continue;
                        }
                    };
                    if sink.send(WsMessage::Text(text)).await.is_err() {
                        warn!("channel write failed");
                        return;
                    }
                }
                maybe_message = stream.next() => {
                    let message = match maybe_message {
                        Some(Ok(message)) => message,
                        Some(Err(e)) => {
                            warn!("channel read error: {}", e);
                            return;
                        }
                        None => {
                            warn!("channel closed by server");
                            return;
                        }
                    };
                    match message {
                        WsMessage::Text(text) => self.handle_frame(&text),
                        WsMessage::Ping(payload) => {
                            let _ = sink.send(WsMessage::Pong(payload)).await;
                        }
                        WsMessage::Close(_) => return,
                        _ => {}
                    }
                }
            }
        }
    }

    fn handle_frame(&self, text: &str) {
        match serde_json::from_str::<ServerFrame>(text) {
            Ok(ServerFrame::ReceiveMessage(message)) => {
                self.fan_out(ChannelEvent::Message(message));
            }
            Ok(ServerFrame::SendAck { ack_id, ack }) => {
                match self.pending_acks.remove(&ack_id) {
                    Some((_, reply)) => {
                        let _ = reply.send(ack);
                    }
                    None => debug!("ack [{}] arrived after its sender gave up", ack_id),
                }
            }
            // the channel carries traffic for the whole application;
            // anything we do not recognize is not ours
            Err(_) => debug!("dropping unrecognized frame"),
        }
    }

    fn fan_out(&self, event: ChannelEvent) {
        self.subscribers
            .retain(|_, sender| sender.send(event.clone()).is_ok());
    }

    async fn wait_before_retry(&self) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(self.reconnect_delay) => true,
        }
    }
}
