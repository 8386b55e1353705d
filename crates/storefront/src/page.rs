//! Per-page chrome: who is signed in, how many items are in the cart, and
//! any flash message left by the previous request.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use crate::error::AppError;
use crate::middleware::current_user;
use crate::models::{CurrentUser, Flash, session_keys};
use crate::services::cart;

/// Layout data every full-page template receives.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub user: Option<CurrentUser>,
    pub cart_count: u32,
    pub flash: Option<Flash>,
}

impl Page {
    /// Whether to show the admin link.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(CurrentUser::is_admin)
    }
}

impl<S> FromRequestParts<S> for Page
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(session) = parts.extensions.get::<Session>().cloned() else {
            return Ok(Self::default());
        };

        let flash = take_flash(&session).await;
        Ok(Self {
            user: current_user(&session).await,
            cart_count: cart::snapshot(&session)
                .await
                .map_or(0, |snapshot| snapshot.item_count()),
            flash,
        })
    }
}

/// Leave a message for the next page the visitor sees.
///
/// # Errors
///
/// Returns an error if the session store cannot be written.
pub async fn set_flash(session: &Session, flash: Flash) -> Result<(), AppError> {
    session.insert(session_keys::FLASH, flash).await?;
    Ok(())
}

async fn take_flash(session: &Session) -> Option<Flash> {
    session
        .remove::<Flash>(session_keys::FLASH)
        .await
        .ok()
        .flatten()
}
