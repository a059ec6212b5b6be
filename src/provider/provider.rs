use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_model::*;
use crate::infra_http::*;
use crate::infra_ws::*;
use crate::logger::*;
use crate::session::{ChatSessionHandle, SessionEvent};
use crate::settings::Settings;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

/// Application-level owner of the realtime channel and the REST clients.
/// Sessions borrow the channel through subscriptions and never own it;
/// the provider is the only place the connection is opened or closed.
pub struct ChatProvider {
    channel: Arc<dyn RealtimeChannel>,
    history: Arc<dyn HistoryApi>,
    directory: Arc<dyn PeerDirectory>,
    ws_channel: Option<Arc<WsRealtimeChannel>>,
}

impl ChatProvider {
    pub fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let mut ws_channel = None;
        let channel: Arc<dyn RealtimeChannel> = match settings.channel.backend.as_str() {
            "fake" => {
                let fake = Arc::new(FakeRealtimeChannel::new());
                // loopback so a lone demo client sees its own traffic
                fake.set_echo_to_sender(true);
                fake
            }
            "ws" => {
                let channel = WsRealtimeChannel::connect(WsChannelConfig {
                    url: settings.channel.url.clone(),
                    reconnect_delay: Duration::from_millis(settings.channel.reconnect_delay_ms),
                    ack_timeout: Duration::from_millis(settings.channel.ack_timeout_ms),
                })?;
                ws_channel = Some(channel.clone());
                channel
            }
            other => return Err(anyhow::anyhow!("Unknown channel backend: {}", other)),
        };

        let (history, directory): (Arc<dyn HistoryApi>, Arc<dyn PeerDirectory>) =
            match settings.api.backend.as_str() {
                "fake" => (
                    Arc::new(FakeHistoryApi::new()),
                    Arc::new(FakePeerDirectory::new(None)),
                ),
                "http" => {
                    let client = RestClient::new(RestConfig {
                        base_url: settings.api.base_url.clone(),
                        token: settings.api.token.clone(),
                    });
                    (
                        Arc::new(HttpHistoryApi::new(client.clone())),
                        Arc::new(HttpPeerDirectory::new(client)),
                    )
                }
                other => return Err(anyhow::anyhow!("Unknown api backend: {}", other)),
            };

        info!("chat provider started");

        Ok(Self {
            channel,
            history,
            directory,
            ws_channel,
        })
    }

    pub fn directory(&self) -> Arc<dyn PeerDirectory> {
        self.directory.clone()
    }

    /// Spawns a session for the logged-in user over the shared channel.
    pub fn open_session(
        &self,
        current_user: UserId,
    ) -> (ChatSessionHandle, UnboundedReceiver<SessionEvent>) {
        ChatSessionHandle::spawn(current_user, self.channel.clone(), self.history.clone())
    }

    pub async fn shutdown(&self) {
        info!("chat provider shutting down...");
        if let Some(ws) = &self.ws_channel {
            ws.shutdown().await;
        }
    }
}
