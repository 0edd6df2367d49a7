use serde::Deserialize;

/// How much of each exchange [`ApiClient`](crate::http::ApiClient) logs.
///
/// Levels are cumulative: `Body` also logs what `Headers` and `Info` log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Nothing.
    None,
    /// Method, URL and status.
    Info,
    /// Plus request and response headers.
    Headers,
    /// Plus request and response bodies.
    #[default]
    Body,
}

impl LogLevel {
    pub fn logs_info(self) -> bool {
        self >= LogLevel::Info
    }

    pub fn logs_headers(self) -> bool {
        self >= LogLevel::Headers
    }

    pub fn logs_body(self) -> bool {
        self >= LogLevel::Body
    }
}

/// Construction inputs of an API client.
///
/// ```rust
/// use scopekit::http::{ApiConfig, LogLevel};
///
/// let cfg: ApiConfig = serde_json::from_str(
///     r#"{ "base_url": "https://api.example.com/v1", "user_agent": "demo/1.0" }"#,
/// )
/// .unwrap();
/// assert_eq!(cfg.timeout_ms, None);
/// assert_eq!(cfg.log_level, LogLevel::Body);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiConfig {
    /// Prefix of every request path.
    pub base_url: String,
    /// Sent as `User-Agent` on every request.
    pub user_agent: String,
    /// Request, connect and read timeout in milliseconds. `None` = no timeout.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub log_level: LogLevel,
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            user_agent: user_agent.into(),
            timeout_ms: None,
            log_level: LogLevel::default(),
        }
    }

    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = Some(ms);
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    /// Joins `path` onto the base URL with exactly one slash between them.
    pub(crate) fn url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            base.to_string()
        } else {
            format!("{base}/{path}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_levels_are_cumulative() {
        assert!(!LogLevel::None.logs_info());
        assert!(LogLevel::Info.logs_info() && !LogLevel::Info.logs_headers());
        assert!(LogLevel::Headers.logs_headers() && !LogLevel::Headers.logs_body());
        assert!(LogLevel::Body.logs_info() && LogLevel::Body.logs_body());
    }

    #[test]
    fn url_joins_with_single_slash() {
        let cfg = ApiConfig::new("http://host/api/", "ua");
        assert_eq!(cfg.url("/users"), "http://host/api/users");
        assert_eq!(cfg.url("users/1"), "http://host/api/users/1");
        assert_eq!(cfg.url(""), "http://host/api");
    }

    #[test]
    fn deserializes_explicit_fields() {
        let cfg: ApiConfig = serde_json::from_str(
            r#"{"base_url":"http://h","user_agent":"ua","timeout_ms":1500,"log_level":"headers"}"#,
        )
        .unwrap();
        assert_eq!(cfg.timeout_ms, Some(1500));
        assert_eq!(cfg.log_level, LogLevel::Headers);
    }
}
