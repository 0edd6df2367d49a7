//! JSON REST client with structured errors.
//!
//! ```text
//! get/post/put/delete(path, body?)
//!   └─ url = base_url + path ─► send
//!        ├─ transport error        → ApiError(transport message)
//!        ├─ 2xx                    → decode JSON (empty body decodes as null)
//!        └─ non-2xx                → ApiError from { "message": .. }
//!                                    or "<METHOD> <url>: <status>" if unparsable
//! ```

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, trace};

use crate::http::{ApiConfig, ApiError};

/// Client produced by an [`ApiFactory`](crate::http::ApiFactory).
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: ApiConfig,
}

impl ApiClient {
    /// Wraps a prepared transport (see [`ApiFactory::http_client`](crate::http::ApiFactory::http_client)).
    pub fn new(http: reqwest::Client, config: ApiConfig) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub async fn get<R: DeserializeOwned>(&self, path: &str) -> Result<R, ApiError> {
        self.execute::<(), R>(Method::GET, path, None).await
    }

    pub async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, ApiError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.execute(Method::POST, path, Some(body)).await
    }

    pub async fn put<B, R>(&self, path: &str, body: &B) -> Result<R, ApiError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.execute(Method::PUT, path, Some(body)).await
    }

    pub async fn delete<R: DeserializeOwned>(&self, path: &str) -> Result<R, ApiError> {
        self.execute::<(), R>(Method::DELETE, path, None).await
    }

    async fn execute<B, R>(&self, method: Method, path: &str, body: Option<&B>) -> Result<R, ApiError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let level = self.config.log_level;
        let url = self.config.url(path);

        let mut req = self.http.request(method.clone(), &url);
        if let Some(body) = body {
            let payload = serde_json::to_vec(body)
                .map_err(|e| ApiError::new(format!("request encoding: {e}")))?;
            if level.logs_body() {
                debug!(%method, %url, body = %String::from_utf8_lossy(&payload), "request body");
            }
            req = req.body(payload);
        }
        let req = req.build()?;
        if level.logs_info() {
            info!(%method, %url, "request");
        }
        if level.logs_headers() {
            debug!(%method, %url, headers = ?req.headers(), "request headers");
        }

        let resp = self.http.execute(req).await.map_err(|e| {
            if level.logs_info() {
                info!(%method, %url, error = %e, "transport failure");
            }
            ApiError::from(e)
        })?;

        let status = resp.status();
        if level.logs_info() {
            info!(%method, %url, status = status.as_u16(), "response");
        }
        if level.logs_headers() {
            debug!(%method, %url, headers = ?resp.headers(), "response headers");
        }
        let bytes = resp.bytes().await?;
        if level.logs_body() {
            debug!(%method, %url, body = %String::from_utf8_lossy(&bytes), "response body");
        }

        if !status.is_success() {
            let text = String::from_utf8_lossy(&bytes);
            return Err(ApiError::from_error_body(&text, || {
                status_message(&method, &url, status)
            }));
        }
        decode(&bytes)
    }
}

fn status_message(method: &Method, url: &str, status: StatusCode) -> String {
    format!("{method} {url}: {status}")
}

fn decode<R: DeserializeOwned>(bytes: &[u8]) -> Result<R, ApiError> {
    let bytes: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) {
        b"null"
    } else {
        bytes
    };
    serde_json::from_slice(bytes).map_err(|e| {
        trace!(error = %e, "response decoding failed");
        ApiError::new(format!("response decoding: {e}"))
    })
}
