use crate::application_port::*;
use crate::domain_model::*;
use crate::infra_http::RestClient;

/// History over the CRM backend: `GET /chat-history/{current}/{other}`,
/// returning the pair's messages oldest first.
pub struct HttpHistoryApi {
    client: RestClient,
}

impl HttpHistoryApi {
    pub fn new(client: RestClient) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl HistoryApi for HttpHistoryApi {
    async fn conversation_history(
        &self,
        current: &UserId,
        other: &UserId,
    ) -> Result<Vec<Message>, HistoryError> {
        let endpoint = self
            .client
            .endpoint(&format!("chat-history/{}/{}", current, other));
        let response = self
            .client
            .get(&endpoint)
            .send()
            .await
            .map_err(|e| HistoryError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HistoryError::Status(status.as_u16()));
        }

        response
            .json::<Vec<Message>>()
            .await
            .map_err(|e| HistoryError::Malformed(e.to_string()))
    }
}
