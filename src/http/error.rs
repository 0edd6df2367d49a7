use serde::Deserialize;
use thiserror::Error;

/// Structured error surfaced by [`ApiClient`](crate::http::ApiClient).
///
/// Decoded from non-2xx response bodies of the form `{ "message": "..." }`
/// (unknown keys ignored); synthesized from the status or transport failure
/// otherwise.
#[derive(Error, Debug, Clone, PartialEq, Eq, Deserialize)]
#[error("{message}")]
pub struct ApiError {
    pub message: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Parses an error response body, falling back to `fallback()` when the
    /// body is not a JSON object with a string `message`.
    pub fn from_error_body(body: &str, fallback: impl FnOnce() -> String) -> Self {
        serde_json::from_str(body).unwrap_or_else(|_| Self::new(fallback()))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        Self::new(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_message_and_ignores_unknown_keys() {
        let err = ApiError::from_error_body(r#"{"message":"quota exceeded","code":429}"#, || {
            unreachable!()
        });
        assert_eq!(err, ApiError::new("quota exceeded"));
        assert_eq!(err.to_string(), "quota exceeded");
    }

    #[test]
    fn falls_back_on_unparsable_body() {
        let err = ApiError::from_error_body("<html>502</html>", || "GET /x: 502".into());
        assert_eq!(err.message, "GET /x: 502");
        let err = ApiError::from_error_body(r#"{"error":"no message key"}"#, || "fallback".into());
        assert_eq!(err.message, "fallback");
    }
}
