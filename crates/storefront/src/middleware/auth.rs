//! Authentication extractors.
//!
//! Every extractor that hands out a token runs it through
//! [`session::ensure_fresh`], so handlers never see an expired bearer.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tower_sessions::Session;

use harbor_commerce::{CommerceClient, TokenSet};
use harbor_core::TokenClaims;

use crate::error::AppError;
use crate::models::CurrentUser;
use crate::services::session;
use crate::state::AppState;

/// A signed-in user with usable tokens.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    tokens: TokenSet,
}

impl AuthenticatedUser {
    /// Claims decoded from the id token.
    #[must_use]
    pub const fn claims(&self) -> &TokenClaims {
        &self.tokens.claims
    }

    /// A commerce client that sends this user's access token.
    #[must_use]
    pub fn client(&self, state: &AppState) -> CommerceClient {
        state.commerce().authorized(&self.tokens.access_token)
    }
}

fn session_from_parts(parts: &Parts) -> Result<Session, AppError> {
    parts
        .extensions
        .get::<Session>()
        .cloned()
        .ok_or_else(|| AppError::Internal("session layer missing".to_string()))
}

async fn fresh_user(parts: &Parts, state: &AppState) -> Result<Option<AuthenticatedUser>, AppError> {
    let session = session_from_parts(parts)?;
    let tokens = session::ensure_fresh(state, &session, chrono::Utc::now()).await?;
    Ok(tokens.map(|tokens| AuthenticatedUser { tokens }))
}

/// Extractor for pages that work signed in or out.
///
/// Yields `None` for anonymous visitors; a signed-in visitor's tokens are
/// refreshed as needed.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(State(state): State<AppState>, MaybeUser(user): MaybeUser) -> impl IntoResponse {
///     let client = user.map_or_else(|| state.commerce().clone(), |u| u.client(&state));
///     // ...
/// }
/// ```
pub struct MaybeUser(pub Option<AuthenticatedUser>);

impl MaybeUser {
    /// Commerce client for this visitor: authorized when signed in.
    #[must_use]
    pub fn client(&self, state: &AppState) -> CommerceClient {
        self.0
            .as_ref()
            .map_or_else(|| state.commerce().clone(), |user| user.client(state))
    }
}

impl<S> FromRequestParts<S> for MaybeUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        Ok(Self(fresh_user(parts, &state).await?))
    }
}

/// Extractor that requires a signed-in customer (any role).
///
/// Anonymous visitors are redirected to the login page.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireCustomer(user): RequireCustomer) -> impl IntoResponse {
///     format!("Hello, {}!", user.claims().username)
/// }
/// ```
pub struct RequireCustomer(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for RequireCustomer
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        fresh_user(parts, &state)
            .await?
            .map(Self)
            .ok_or(AppError::SignInRequired)
    }
}

/// Extractor that requires a signed-in admin.
///
/// Anonymous visitors are redirected to login; signed-in customers get
/// 403 Forbidden.
pub struct RequireAdmin(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for RequireAdmin
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireCustomer(user) = RequireCustomer::from_request_parts(parts, state).await?;
        if !user.claims().is_admin() {
            tracing::warn!(
                username = %user.claims().username,
                path = %parts.uri.path(),
                "Non-admin attempted admin access"
            );
            return Err(AppError::Forbidden);
        }
        Ok(Self(user))
    }
}

/// Identity for page chrome, read without refreshing.
pub async fn current_user(session: &Session) -> Option<CurrentUser> {
    session::stored_tokens(session)
        .await
        .map(|tokens| CurrentUser::from(&tokens))
}
