//! Provider-agnostic error types shared by translation sources.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tran_types::ErrorCode;

/// Standard User-Agent header for tran API requests.
pub const USER_AGENT: &str = concat!("tran/", env!("CARGO_PKG_VERSION"));

/// Categories of provider errors for consistent error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    /// No credential was configured
    MissingCredential,
    /// The endpoint rejected the credential (401/403)
    Auth,
    /// The endpoint is throttling us (429)
    RateLimited,
    /// Any other HTTP status error (4xx, 5xx)
    HttpStatus,
    /// Connection timeout or request timeout
    Timeout,
    /// Connection refused, reset, or body read failure
    Network,
    /// Failed to parse response (JSON parse error, invalid SSE, etc.)
    Parse,
    /// API-level error returned mid-stream
    ApiError,
}

impl ProviderErrorKind {
    /// Maps the kind onto the stable wire code.
    pub fn code(self) -> ErrorCode {
        match self {
            ProviderErrorKind::MissingCredential => ErrorCode::NoApiKey,
            ProviderErrorKind::Auth => ErrorCode::InvalidApiKey,
            ProviderErrorKind::Timeout => ErrorCode::Timeout,
            ProviderErrorKind::Network => ErrorCode::Network,
            ProviderErrorKind::RateLimited
            | ProviderErrorKind::HttpStatus
            | ProviderErrorKind::Parse
            | ProviderErrorKind::ApiError => ErrorCode::Unknown,
        }
    }
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderErrorKind::MissingCredential => write!(f, "missing_credential"),
            ProviderErrorKind::Auth => write!(f, "auth"),
            ProviderErrorKind::RateLimited => write!(f, "rate_limited"),
            ProviderErrorKind::HttpStatus => write!(f, "http_status"),
            ProviderErrorKind::Timeout => write!(f, "timeout"),
            ProviderErrorKind::Network => write!(f, "network"),
            ProviderErrorKind::Parse => write!(f, "parse"),
            ProviderErrorKind::ApiError => write!(f, "api_error"),
        }
    }
}

/// Structured error from the provider with kind and details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderError {
    /// Error category
    pub kind: ProviderErrorKind,
    /// One-line summary suitable for display
    pub message: String,
    /// Optional additional details (e.g., raw error body)
    pub details: Option<String>,
}

impl ProviderError {
    /// Creates a new provider error.
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    pub fn missing_credential() -> Self {
        Self::new(
            ProviderErrorKind::MissingCredential,
            "API key is not configured, open the settings to add one",
        )
    }

    /// Creates an HTTP status error with a user-facing summary.
    pub fn http_status(status: u16, body: &str) -> Self {
        let (kind, message) = match status {
            401 | 403 => (
                ProviderErrorKind::Auth,
                "API key is invalid, check your settings".to_string(),
            ),
            429 => (
                ProviderErrorKind::RateLimited,
                "Too many requests, try again later".to_string(),
            ),
            _ => (
                ProviderErrorKind::HttpStatus,
                format!("API request failed ({status})"),
            ),
        };

        let details = if body.is_empty() {
            None
        } else if let Ok(json) = serde_json::from_str::<Value>(body)
            && let Some(msg) = json
                .get("error")
                .and_then(|error| error.get("message"))
                .and_then(Value::as_str)
        {
            Some(msg.to_string())
        } else {
            Some(body.to_string())
        };

        Self {
            kind,
            message,
            details,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Timeout, message)
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Network, message)
    }

    /// Creates an API error (from mid-stream error event).
    pub fn api_error(error_type: &str, message: &str) -> Self {
        Self {
            kind: ProviderErrorKind::ApiError,
            message: format!("{error_type}: {message}"),
            details: None,
        }
    }

    /// Stable wire code for this error.
    pub fn code(&self) -> ErrorCode {
        self.kind.code()
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ProviderError {}

/// Result type for provider operations.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Classifies a transport-level reqwest failure.
pub(crate) fn classify_reqwest_error(e: &reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::timeout(format!("Request timed out: {e}"))
    } else if e.is_connect() {
        ProviderError::network(format!("Connection failed: {e}"))
    } else {
        ProviderError::network(format!("Network error: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_maps_to_invalid_api_key() {
        let err = ProviderError::http_status(401, r#"{"error":{"message":"bad key"}}"#);
        assert_eq!(err.kind, ProviderErrorKind::Auth);
        assert_eq!(err.code(), ErrorCode::InvalidApiKey);
        assert_eq!(err.details.as_deref(), Some("bad key"));
        assert_eq!(err.to_string(), "API key is invalid, check your settings");
    }

    #[test]
    fn test_rate_limit_and_server_errors_are_unknown() {
        let limited = ProviderError::http_status(429, "");
        assert_eq!(limited.kind, ProviderErrorKind::RateLimited);
        assert_eq!(limited.code(), ErrorCode::Unknown);
        assert_eq!(limited.details, None);

        let server = ProviderError::http_status(502, "bad gateway");
        assert_eq!(server.message, "API request failed (502)");
        assert_eq!(server.details.as_deref(), Some("bad gateway"));
        assert_eq!(server.code(), ErrorCode::Unknown);
    }

    #[test]
    fn test_transport_kinds_keep_their_codes() {
        assert_eq!(ProviderError::timeout("t").code(), ErrorCode::Timeout);
        assert_eq!(ProviderError::network("n").code(), ErrorCode::Network);
        assert_eq!(
            ProviderError::missing_credential().code(),
            ErrorCode::NoApiKey
        );
        assert_eq!(
            ProviderError::api_error("overloaded", "busy").message,
            "overloaded: busy"
        );
    }
}
