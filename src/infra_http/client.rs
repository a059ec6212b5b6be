use reqwest::Client as HttpClient;
use reqwest::RequestBuilder;

#[derive(Debug, Clone)]
pub struct RestConfig {
    pub base_url: String,
    pub token: Option<String>,
}

/// Thin wrapper over a shared reqwest client: base-url joining plus the
/// bearer header every CRM endpoint expects.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: HttpClient,
    config: RestConfig,
}

impl RestClient {
    pub fn new(config: RestConfig) -> Self {
        Self {
            http: HttpClient::new(),
            config,
        }
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn get(&self, endpoint: &str) -> RequestBuilder {
        self.with_auth(self.http.get(endpoint))
    }

    pub fn post(&self, endpoint: &str) -> RequestBuilder {
        self.with_auth(self.http.post(endpoint))
    }

    fn with_auth(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}
