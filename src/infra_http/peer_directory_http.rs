use crate::application_port::*;
use crate::domain_model::*;
use crate::infra_http::RestClient;
use serde_json::Value;

/// Counterpart lookup over the CRM backend: `POST /getFreelancer` with the
/// bearer token identifies the caller; the response carries the assigned
/// freelancer's record.
pub struct HttpPeerDirectory {
    client: RestClient,
}

impl HttpPeerDirectory {
    pub fn new(client: RestClient) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl PeerDirectory for HttpPeerDirectory {
    async fn resolve_peer(&self) -> Result<UserId, DirectoryError> {
        let endpoint = self.client.endpoint("getFreelancer");
        let response = self
            .client
            .post(&endpoint)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| DirectoryError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DirectoryError::Status(status.as_u16()));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| DirectoryError::Transport(e.to_string()))?;
        body.get("_id")
            .and_then(|v| v.as_str())
            .map(UserId::from)
            .ok_or(DirectoryError::NoPeer)
    }
}
