//! Errors returned by the commerce backend client.

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Maximum number of body characters kept in error values and logs.
const BODY_EXCERPT_CHARS: usize = 200;

/// Errors that can occur when talking to the commerce backend.
#[derive(Debug, Error)]
pub enum CommerceError {
    /// Transport failure (connect, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The bearer token was missing, expired or revoked (HTTP 401).
    #[error("Unauthorized")]
    Unauthorized,

    /// The caller is authenticated but lacks permission (HTTP 403).
    #[error("Forbidden")]
    Forbidden,

    /// Resource not found (HTTP 404).
    #[error("Not found: {0}")]
    NotFound(String),

    /// The request conflicts with current state (HTTP 409).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The backend refused the input (HTTP 400/422).
    #[error("Rejected: {0}")]
    Rejected(String),

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Any other non-success status.
    #[error("Unexpected status {status}: {body}")]
    Status {
        /// HTTP status returned.
        status: StatusCode,
        /// Leading excerpt of the response body.
        body: String,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The configured base URL cannot be joined with a request path.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl CommerceError {
    /// Whether the error means the caller's session is no longer valid.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }

    /// Message safe to show next to a form field.
    ///
    /// Only validation-style failures carry the backend's explanation.
    #[must_use]
    pub fn user_message(&self) -> Option<&str> {
        match self {
            Self::Rejected(msg) | Self::Conflict(msg) => Some(msg),
            _ => None,
        }
    }
}

/// Error body shape used by the backend.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(alias = "error")]
    message: String,
}

/// Extract a human-readable message from an error response body.
fn extract_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body).map_or_else(
        |_| body.chars().take(BODY_EXCERPT_CHARS).collect(),
        |parsed| parsed.message,
    )
}

/// Map a non-success response to a [`CommerceError`].
pub(crate) fn error_for_status(
    status: StatusCode,
    retry_after: Option<u64>,
    body: &str,
    path: &str,
) -> CommerceError {
    match status {
        StatusCode::UNAUTHORIZED => CommerceError::Unauthorized,
        StatusCode::FORBIDDEN => CommerceError::Forbidden,
        StatusCode::NOT_FOUND => CommerceError::NotFound(path.to_string()),
        StatusCode::CONFLICT => CommerceError::Conflict(extract_message(body)),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            CommerceError::Rejected(extract_message(body))
        }
        StatusCode::TOO_MANY_REQUESTS => CommerceError::RateLimited(retry_after.unwrap_or(1)),
        _ => CommerceError::Status {
            status,
            body: body.chars().take(BODY_EXCERPT_CHARS).collect(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(
            error_for_status(StatusCode::UNAUTHORIZED, None, "", "/carts/1").is_unauthorized()
        );
        assert!(matches!(
            error_for_status(StatusCode::FORBIDDEN, None, "", "/orders"),
            CommerceError::Forbidden
        ));
        assert!(matches!(
            error_for_status(StatusCode::NOT_FOUND, None, "", "/products/X"),
            CommerceError::NotFound(path) if path == "/products/X"
        ));
        assert!(matches!(
            error_for_status(StatusCode::TOO_MANY_REQUESTS, Some(30), "", "/"),
            CommerceError::RateLimited(30)
        ));
        assert!(matches!(
            error_for_status(StatusCode::BAD_GATEWAY, None, "upstream down", "/"),
            CommerceError::Status { status, .. } if status == StatusCode::BAD_GATEWAY
        ));
    }

    #[test]
    fn test_rejected_uses_backend_message() {
        let err = error_for_status(
            StatusCode::BAD_REQUEST,
            None,
            r#"{"message":"quantity exceeds stock"}"#,
            "/carts/1/addItem",
        );
        assert_eq!(err.user_message(), Some("quantity exceeds stock"));
    }

    #[test]
    fn test_rejected_falls_back_to_raw_body() {
        let err = error_for_status(StatusCode::CONFLICT, None, "code exists", "/promotion/codes");
        assert_eq!(err.to_string(), "Conflict: code exists");
    }

    #[test]
    fn test_server_errors_have_no_user_message() {
        let err = error_for_status(StatusCode::INTERNAL_SERVER_ERROR, None, "boom", "/");
        assert_eq!(err.user_message(), None);
    }
}
