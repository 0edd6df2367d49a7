use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, USER_AGENT};

use crate::http::{ApiClient, ApiConfig, ApiError};

/// Produces configured API clients.
///
/// Implementors supply [`config`](Self::config) and
/// [`create_client`](Self::create_client); the provided
/// [`http_client`](Self::http_client) builds the shared transport.
pub trait ApiFactory {
    type Client;

    fn config(&self) -> &ApiConfig;

    fn create_client(&self) -> Result<Self::Client, ApiError>;

    /// Transport with JSON content type, the configured user agent and, if
    /// set, identical request / connect / read timeouts.
    fn http_client(&self) -> Result<reqwest::Client, ApiError> {
        let cfg = self.config();
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let agent = HeaderValue::from_str(&cfg.user_agent)
            .map_err(|e| ApiError::new(format!("invalid user agent: {e}")))?;
        headers.insert(USER_AGENT, agent);

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(ms) = cfg.timeout_ms {
            let t = Duration::from_millis(ms);
            builder = builder.timeout(t).connect_timeout(t).read_timeout(t);
        }
        Ok(builder.build()?)
    }
}

/// Factory for plain [`ApiClient`]s.
#[derive(Debug, Clone)]
pub struct JsonApiFactory {
    config: ApiConfig,
}

impl JsonApiFactory {
    pub fn new(config: ApiConfig) -> Self {
        Self { config }
    }
}

impl ApiFactory for JsonApiFactory {
    type Client = ApiClient;

    fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn create_client(&self) -> Result<ApiClient, ApiError> {
        Ok(ApiClient::new(self.http_client()?, self.config.clone()))
    }
}
