//! Admin route handlers.
//!
//! Every handler takes [`RequireAdmin`](crate::middleware::RequireAdmin):
//! anonymous visitors are sent to login, customers get 403. Backend calls
//! use the admin's own bearer token so the backend can enforce the role too.

pub mod dashboard;
pub mod inventory;
pub mod orders;
pub mod products;
pub mod promotions;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use harbor_commerce::CommerceError;

use crate::error::AppError;

/// Turn a backend failure on a form post into either an inline message
/// (validation-style failures) or an error response.
///
/// `rerender` builds the form page carrying the message.
pub(crate) fn form_error<F>(err: CommerceError, rerender: F) -> Response
where
    F: FnOnce(String) -> Response,
{
    match err.user_message() {
        Some(message) => {
            let message = message.to_string();
            let mut response = rerender(message);
            *response.status_mut() = StatusCode::BAD_REQUEST;
            response
        }
        None => AppError::Commerce(err).into_response(),
    }
}
