//! Bearer token claims decoding.
//!
//! The identity provider issues a token triple (id, access, refresh). The id
//! token is a JWT whose payload carries the user's name, email, groups and
//! expiry. Signatures are **not** verified here: the storefront trusts the
//! token endpoint it fetched the token from over TLS, and every backend call
//! is re-authorized by the commerce API itself.
//!
//! Decoding failures are categorized so callers can tell a corrupted token
//! from an expired one.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Role;

/// Allowed clock skew when checking expiry.
pub const EXPIRY_SKEW_SECONDS: i64 = 30;

/// Errors produced while decoding or validating a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// Not three dot-separated segments.
    #[error("token must have 3 segments, found {0}")]
    Malformed(usize),

    /// The payload segment is not valid base64url.
    #[error("token payload is not valid base64url: {0}")]
    Encoding(String),

    /// The payload is not a JSON object of the expected shape.
    #[error("token payload is not valid JSON: {0}")]
    Payload(String),

    /// A required claim is absent.
    #[error("token is missing the `{0}` claim")]
    MissingClaim(&'static str),

    /// The `exp` claim is outside the representable range.
    #[error("token `exp` claim is out of range: {0}")]
    InvalidExpiry(i64),

    /// The token has expired.
    #[error("token expired at {0}")]
    Expired(DateTime<Utc>),
}

#[derive(Debug, Deserialize)]
struct RawClaims {
    sub: Option<String>,
    #[serde(rename = "cognito:username", alias = "username")]
    username: Option<String>,
    email: Option<String>,
    exp: Option<i64>,
    #[serde(rename = "cognito:groups", alias = "groups", default)]
    groups: Vec<String>,
}

/// Claims extracted from an id token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (stable user identifier).
    pub subject: Option<String>,
    /// Display username.
    pub username: String,
    /// Email address, when the provider includes it.
    pub email: Option<String>,
    /// Expiry instant.
    pub expires_at: DateTime<Utc>,
    /// Storefront role derived from the group claim.
    pub role: Role,
}

impl TokenClaims {
    /// Decode the claims of a JWT without verifying its signature.
    ///
    /// # Errors
    ///
    /// Returns a [`TokenError`] describing why the token could not be read.
    /// Expiry is **not** checked here; see [`TokenClaims::ensure_valid_at`].
    pub fn decode(token: &str) -> Result<Self, TokenError> {
        let segments: Vec<&str> = token.split('.').collect();
        let [_, payload, _] = segments.as_slice() else {
            return Err(TokenError::Malformed(segments.len()));
        };

        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| TokenError::Encoding(e.to_string()))?;

        let raw: RawClaims =
            serde_json::from_slice(&bytes).map_err(|e| TokenError::Payload(e.to_string()))?;

        let exp = raw.exp.ok_or(TokenError::MissingClaim("exp"))?;
        let expires_at =
            DateTime::<Utc>::from_timestamp(exp, 0).ok_or(TokenError::InvalidExpiry(exp))?;

        let username = raw
            .username
            .or_else(|| raw.email.clone())
            .or_else(|| raw.sub.clone())
            .ok_or(TokenError::MissingClaim("username"))?;

        Ok(Self {
            subject: raw.sub,
            username,
            email: raw.email,
            expires_at,
            role: Role::from_groups(&raw.groups),
        })
    }

    /// Whether the token is expired at `now`, allowing for clock skew.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at + Duration::seconds(EXPIRY_SKEW_SECONDS)
    }

    /// Return `Ok(())` if the token is still valid at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Expired`] once the expiry (plus skew) has passed.
    pub fn ensure_valid_at(&self, now: DateTime<Utc>) -> Result<(), TokenError> {
        if self.is_expired_at(now) {
            Err(TokenError::Expired(self.expires_at))
        } else {
            Ok(())
        }
    }

    /// Whether the holder may use the admin pages.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn token_with(payload: &serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{header}.{body}.c2lnbmF0dXJl")
    }

    #[test]
    fn test_decode_cognito_style_claims() {
        let token = token_with(&serde_json::json!({
            "sub": "8d1c",
            "cognito:username": "ada",
            "email": "ada@example.com",
            "exp": 1_900_000_000,
            "cognito:groups": ["admin"],
        }));

        let claims = TokenClaims::decode(&token).unwrap();
        assert_eq!(claims.username, "ada");
        assert_eq!(claims.email.as_deref(), Some("ada@example.com"));
        assert_eq!(claims.expires_at.timestamp(), 1_900_000_000);
        assert_eq!(claims.role, Role::Admin);
        assert!(claims.is_admin());
    }

    #[test]
    fn test_decode_plain_claims_default_to_customer() {
        let token = token_with(&serde_json::json!({
            "username": "bob",
            "exp": 1_900_000_000,
        }));

        let claims = TokenClaims::decode(&token).unwrap();
        assert_eq!(claims.username, "bob");
        assert_eq!(claims.role, Role::Customer);
        assert_eq!(claims.email, None);
    }

    #[test]
    fn test_username_falls_back_to_email() {
        let token = token_with(&serde_json::json!({
            "email": "c@example.com",
            "exp": 1_900_000_000,
        }));
        assert_eq!(TokenClaims::decode(&token).unwrap().username, "c@example.com");
    }

    #[test]
    fn test_decode_error_categories() {
        assert_eq!(
            TokenClaims::decode("only.two"),
            Err(TokenError::Malformed(2))
        );
        assert!(matches!(
            TokenClaims::decode("a.!!!.c"),
            Err(TokenError::Encoding(_))
        ));

        let not_json = format!("a.{}.c", URL_SAFE_NO_PAD.encode("not json"));
        assert!(matches!(
            TokenClaims::decode(&not_json),
            Err(TokenError::Payload(_))
        ));

        let no_exp = token_with(&serde_json::json!({ "username": "ada" }));
        assert_eq!(
            TokenClaims::decode(&no_exp),
            Err(TokenError::MissingClaim("exp"))
        );
    }

    #[test]
    fn test_expiry_allows_skew() {
        let token = token_with(&serde_json::json!({
            "username": "ada",
            "exp": 1_000,
        }));
        let claims = TokenClaims::decode(&token).unwrap();

        let just_after = DateTime::<Utc>::from_timestamp(1_010, 0).unwrap();
        let well_after = DateTime::<Utc>::from_timestamp(1_031, 0).unwrap();

        assert!(!claims.is_expired_at(just_after));
        assert!(claims.ensure_valid_at(just_after).is_ok());
        assert!(claims.is_expired_at(well_after));
        assert!(matches!(
            claims.ensure_valid_at(well_after),
            Err(TokenError::Expired(_))
        ));
    }
}
