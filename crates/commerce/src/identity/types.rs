//! Identity provider request, response and error types.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use harbor_core::{TokenClaims, TokenError};

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur when talking to the identity provider.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Username or password was refused at login.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Registration collided with an existing account.
    #[error("User already exists")]
    UserExists,

    /// The provider refused the request (e.g. an expired or revoked refresh
    /// token, or a weak password at sign-up).
    #[error("Rejected ({status}): {message}")]
    Rejected {
        /// HTTP status returned.
        status: StatusCode,
        /// Provider-supplied explanation.
        message: String,
    },

    /// The provider could not be reached.
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// The provider answered with a server error.
    #[error("Identity provider unavailable ({0})")]
    Unavailable(StatusCode),

    /// The provider's response could not be parsed.
    #[error("Malformed identity response: {0}")]
    Parse(String),

    /// The issued id token could not be decoded.
    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    /// An endpoint URL could not be derived from the base URL.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl IdentityError {
    /// Whether retrying later may succeed (the provider was unreachable).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Unavailable(_))
    }
}

/// Raw outcome of a token endpoint call, before the caller decides what a
/// refusal means (bad password at login, dead refresh token at refresh).
#[derive(Debug)]
pub(super) enum TokenEndpointFailure {
    Network(reqwest::Error),
    Unavailable(StatusCode),
    Parse(String),
    Refused {
        status: StatusCode,
        error: Option<String>,
        description: Option<String>,
    },
}

impl From<TokenEndpointFailure> for IdentityError {
    fn from(failure: TokenEndpointFailure) -> Self {
        match failure {
            TokenEndpointFailure::Network(e) => Self::Network(e),
            TokenEndpointFailure::Unavailable(status) => Self::Unavailable(status),
            TokenEndpointFailure::Parse(msg) => Self::Parse(msg),
            TokenEndpointFailure::Refused {
                status,
                error,
                description,
            } => Self::Rejected {
                status,
                message: description
                    .or(error)
                    .unwrap_or_else(|| "request refused".to_string()),
            },
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tokens
// ─────────────────────────────────────────────────────────────────────────────

/// The token triple issued at login or refresh, with the decoded id-token
/// claims.
///
/// Implements `Debug` manually so tokens never reach logs.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenSet {
    /// `OpenID` Connect id token (carries the claims).
    pub id_token: String,
    /// Bearer token for backend calls.
    pub access_token: String,
    /// Token for obtaining a new pair once these expire.
    pub refresh_token: Option<String>,
    /// Claims decoded from `id_token`.
    pub claims: TokenClaims,
}

impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSet")
            .field("id_token", &"[REDACTED]")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("claims", &self.claims)
            .finish()
    }
}

/// Raw token response from the OAuth endpoint.
#[derive(Debug, Deserialize)]
pub(super) struct TokenResponse {
    pub id_token: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    #[allow(dead_code)]
    pub expires_in: Option<i64>,
}

/// OAuth-style error body.
#[derive(Debug, Default, Deserialize)]
pub(super) struct OAuthErrorBody {
    pub error: Option<String>,
    pub error_description: Option<String>,
    #[serde(alias = "msg")]
    pub message: Option<String>,
}

impl OAuthErrorBody {
    pub(super) fn message(&self) -> Option<&str> {
        self.message
            .as_deref()
            .or(self.error_description.as_deref())
            .or(self.error.as_deref())
    }
}

/// Sign-up request body.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SignUpRequest<'a> {
    pub client_id: &'a str,
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_refused_prefers_description() {
        let err: IdentityError = TokenEndpointFailure::Refused {
            status: StatusCode::BAD_REQUEST,
            error: Some("invalid_grant".to_string()),
            description: Some("Refresh Token has expired".to_string()),
        }
        .into();

        assert!(!err.is_transient());
        assert_eq!(
            err.to_string(),
            "Rejected (400 Bad Request): Refresh Token has expired"
        );
    }

    #[test]
    fn test_unavailable_is_transient() {
        let err: IdentityError =
            TokenEndpointFailure::Unavailable(StatusCode::SERVICE_UNAVAILABLE).into();
        assert!(err.is_transient());
    }

    #[test]
    fn test_error_body_message_precedence() {
        let body: OAuthErrorBody =
            serde_json::from_str(r#"{"error":"invalid_request","msg":"Password too short"}"#)
                .unwrap();
        assert_eq!(body.message(), Some("Password too short"));
    }

    #[test]
    fn test_token_set_debug_redacts_tokens() {
        let claims = TokenClaims {
            subject: None,
            username: "ada".to_string(),
            email: None,
            expires_at: chrono::DateTime::from_timestamp(1_900_000_000, 0).unwrap(),
            role: harbor_core::Role::Customer,
        };
        let tokens = TokenSet {
            id_token: "id.secret.value".to_string(),
            access_token: "access-secret".to_string(),
            refresh_token: Some("refresh-secret".to_string()),
            claims,
        };

        let debug_output = format!("{tokens:?}");
        assert!(debug_output.contains("ada"));
        assert!(!debug_output.contains("access-secret"));
        assert!(!debug_output.contains("refresh-secret"));
    }
}
