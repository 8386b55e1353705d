//! Session token lifecycle.
//!
//! Tokens are issued at login and kept in the server-side session. Before a
//! token is used, [`ensure_fresh`] checks its expiry and, if needed, trades
//! the refresh token for a new set:
//!
//! - refresh accepted: the session is updated in place and the request
//!   continues
//! - refresh rejected, or no refresh token: the session is flushed and the
//!   caller gets [`AppError::SessionExpired`]
//! - identity provider unreachable: the session is kept and the caller gets
//!   [`AppError::Unavailable`]
//!
//! A refresh token is exchanged at most once; concurrent requests carrying
//! it share the result.

use chrono::{DateTime, Utc};
use tower_sessions::Session;
use tracing::instrument;

use harbor_commerce::{IdentityError, TokenSet};

use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::models::session_keys;
use crate::state::AppState;

/// What has to happen before a stored token set can be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    /// Tokens are within their lifetime.
    Valid,
    /// Tokens expired; this refresh token may renew them.
    NeedsRefresh(String),
    /// Tokens expired and cannot be renewed.
    Expired(DateTime<Utc>),
}

/// Classify a token set at `now`.
#[must_use]
pub fn freshness(tokens: &TokenSet, now: DateTime<Utc>) -> Freshness {
    if !tokens.claims.is_expired_at(now) {
        return Freshness::Valid;
    }
    match &tokens.refresh_token {
        Some(refresh) => Freshness::NeedsRefresh(refresh.clone()),
        None => Freshness::Expired(tokens.claims.expires_at),
    }
}

/// Store a freshly issued token set, cycling the session id.
///
/// # Errors
///
/// Returns an error if the session store cannot be written.
pub async fn establish(session: &Session, tokens: &TokenSet) -> Result<()> {
    session.cycle_id().await?;
    session.insert(session_keys::TOKENS, tokens).await?;
    set_sentry_user(&tokens.claims.username, tokens.claims.email.as_deref());
    tracing::info!(username = %tokens.claims.username, role = %tokens.claims.role, "Session established");
    Ok(())
}

/// The stored token set, if any, without checking expiry.
///
/// An entry that no longer deserializes is treated as absent.
pub async fn stored_tokens(session: &Session) -> Option<TokenSet> {
    match session.get::<TokenSet>(session_keys::TOKENS).await {
        Ok(tokens) => tokens,
        Err(e) => {
            tracing::warn!(error = %e, "Unreadable tokens in session");
            None
        }
    }
}

/// Return a usable token set, refreshing it if it expired.
///
/// `Ok(None)` means nobody is signed in.
///
/// # Errors
///
/// - [`AppError::SessionExpired`] when the tokens cannot be renewed; the
///   session has already been flushed
/// - [`AppError::Unavailable`] when the identity provider could not be
///   reached; the session is left untouched
#[instrument(skip_all)]
pub async fn ensure_fresh(
    state: &AppState,
    session: &Session,
    now: DateTime<Utc>,
) -> Result<Option<TokenSet>> {
    let Some(tokens) = stored_tokens(session).await else {
        return Ok(None);
    };

    match freshness(&tokens, now) {
        Freshness::Valid => Ok(Some(tokens)),
        Freshness::Expired(at) => {
            clear(session).await?;
            Err(AppError::SessionExpired(format!(
                "token expired at {at} and no refresh token is stored"
            )))
        }
        Freshness::NeedsRefresh(refresh_token) => {
            let renewed = refresh(state, session, refresh_token).await?;
            session.insert(session_keys::TOKENS, &renewed).await?;
            Ok(Some(renewed))
        }
    }
}

/// Trade a refresh token for a new set, once per token.
///
/// Concurrent requests of one session hold the same refresh token. The
/// first exchanges it; the rest wait and receive the set it produced, so a
/// provider that rotates refresh tokens never sees the spent one again.
async fn refresh(state: &AppState, session: &Session, refresh_token: String) -> Result<TokenSet> {
    let lock = state.refresh_lock(&refresh_token).await;
    let _guard = lock.lock().await;

    if let Some(renewed) = state.renewed_tokens(&refresh_token).await {
        tracing::debug!(username = %renewed.claims.username, "Reusing tokens renewed by a concurrent request");
        return Ok(renewed);
    }

    match state.identity().refresh(&refresh_token).await {
        Ok(renewed) => {
            state.remember_renewal(refresh_token, renewed.clone()).await;
            tracing::info!(username = %renewed.claims.username, "Session refreshed");
            Ok(renewed)
        }
        Err(err) if err.is_transient() => {
            tracing::warn!(error = %err, "Token refresh failed, identity provider unreachable");
            Err(AppError::Unavailable(err.to_string()))
        }
        Err(err) => {
            tracing::info!(error = %err, "Token refresh rejected");
            clear(session).await?;
            Err(session_expired(&err))
        }
    }
}

fn session_expired(err: &IdentityError) -> AppError {
    AppError::SessionExpired(format!("refresh rejected: {err}"))
}

/// Remove everything the session holds.
///
/// # Errors
///
/// Returns an error if the session store cannot be written.
pub async fn clear(session: &Session) -> Result<()> {
    session.flush().await?;
    clear_sentry_user();
    Ok(())
}

/// Sign out: revoke the refresh token (best effort) and flush the session.
///
/// # Errors
///
/// Returns an error if the session store cannot be written. Revocation
/// failures are only logged.
#[instrument(skip_all)]
pub async fn logout(state: &AppState, session: &Session) -> Result<()> {
    if let Some(refresh_token) = stored_tokens(session)
        .await
        .and_then(|tokens| tokens.refresh_token)
    {
        if let Err(e) = state.identity().revoke(&refresh_token).await {
            tracing::warn!(error = %e, "Failed to revoke refresh token");
        }
    }
    clear(session).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use harbor_core::{Role, TokenClaims};

    fn tokens(expires_at: DateTime<Utc>, refresh: Option<&str>) -> TokenSet {
        TokenSet {
            id_token: "header.payload.signature".to_string(),
            access_token: "access".to_string(),
            refresh_token: refresh.map(str::to_owned),
            claims: TokenClaims {
                subject: Some("sub-1".to_string()),
                username: "ada".to_string(),
                email: Some("ada@example.com".to_string()),
                expires_at,
                role: Role::Customer,
            },
        }
    }

    fn at(ts: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(ts, 0).unwrap()
    }

    #[test]
    fn test_unexpired_tokens_are_valid() {
        let set = tokens(at(1_000), Some("r"));
        assert_eq!(freshness(&set, at(900)), Freshness::Valid);
    }

    #[test]
    fn test_skew_keeps_recently_expired_tokens_valid() {
        let set = tokens(at(1_000), None);
        assert_eq!(freshness(&set, at(1_010)), Freshness::Valid);
    }

    #[test]
    fn test_expired_tokens_with_refresh_need_refresh() {
        let set = tokens(at(1_000), Some("refresh-abc"));
        assert_eq!(
            freshness(&set, at(2_000)),
            Freshness::NeedsRefresh("refresh-abc".to_string())
        );
    }

    #[test]
    fn test_expired_tokens_without_refresh_are_expired() {
        let set = tokens(at(1_000), None);
        assert_eq!(freshness(&set, at(2_000)), Freshness::Expired(at(1_000)));
    }
}
