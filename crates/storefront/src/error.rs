//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.

use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};
use thiserror::Error;

use harbor_commerce::{CommerceError, IdentityError};
use harbor_core::TokenError;

/// Where signed-out users are sent.
pub const LOGIN_PATH: &str = "/auth/login";

/// Response extension telling the session middleware to flush the session.
///
/// Set on any response produced from a revoked or unusable session so the
/// stored tokens and cart mirror never outlive the rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevokeSession;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Commerce backend operation failed.
    #[error("Commerce error: {0}")]
    Commerce(#[from] CommerceError),

    /// Identity provider operation failed.
    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    /// Session store read or write failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Stored tokens cannot be used any more (expired without refresh,
    /// refresh rejected, undecodable).
    #[error("Session expired: {0}")]
    SessionExpired(String),

    /// The page needs a signed-in user and there is none.
    #[error("Sign-in required")]
    SignInRequired,

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Signed in, but not allowed.
    #[error("Forbidden")]
    Forbidden,

    /// A dependency is temporarily unreachable; the session is kept.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited(Option<u64>),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        Self::SessionExpired(err.to_string())
    }
}

impl AppError {
    /// Whether the response should flush the session and send the user to
    /// the login page.
    #[must_use]
    pub const fn revokes_session(&self) -> bool {
        match self {
            Self::SessionExpired(_) => true,
            Self::Commerce(err) => err.is_unauthorized(),
            Self::Identity(err) => matches!(
                err,
                IdentityError::Rejected { .. } | IdentityError::Token(_)
            ),
            _ => false,
        }
    }

    /// HTTP status for the error (redirects excluded).
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Commerce(err) => match err {
                CommerceError::Unauthorized => StatusCode::UNAUTHORIZED,
                CommerceError::Forbidden => StatusCode::FORBIDDEN,
                CommerceError::NotFound(_) => StatusCode::NOT_FOUND,
                CommerceError::Conflict(_) => StatusCode::CONFLICT,
                CommerceError::Rejected(_) => StatusCode::BAD_REQUEST,
                CommerceError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
                _ => StatusCode::BAD_GATEWAY,
            },
            Self::Identity(err) if err.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
            Self::Identity(IdentityError::InvalidCredentials)
            | Self::SessionExpired(_)
            | Self::SignInRequired => StatusCode::UNAUTHORIZED,
            Self::Identity(IdentityError::UserExists) => StatusCode::CONFLICT,
            Self::Identity(IdentityError::Rejected { .. }) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Identity(_) | Self::Session(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    /// Message safe to show the client.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::Commerce(err) => match err {
                CommerceError::NotFound(_) => "Not found".to_string(),
                CommerceError::Forbidden => "You do not have access to this page".to_string(),
                CommerceError::RateLimited(_) => "Too many requests, please slow down".to_string(),
                other => other
                    .user_message()
                    .map_or_else(|| "The store is having trouble right now".to_string(), str::to_owned),
            },
            Self::Identity(err) if err.is_transient() => {
                "Sign-in is temporarily unavailable, please try again".to_string()
            }
            Self::Identity(IdentityError::InvalidCredentials) => "Invalid credentials".to_string(),
            Self::Identity(IdentityError::UserExists) => {
                "An account with this username or email already exists".to_string()
            }
            Self::Identity(IdentityError::Rejected { message, .. }) => message.clone(),
            Self::Identity(_) | Self::Session(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
            Self::SessionExpired(_) => "Your session has expired, please sign in again".to_string(),
            Self::SignInRequired => "Please sign in".to_string(),
            Self::Forbidden => "You do not have access to this page".to_string(),
            Self::Unavailable(_) => "Service temporarily unavailable, please retry".to_string(),
            Self::RateLimited(_) => "Too many requests, please slow down".to_string(),
            Self::NotFound(_) | Self::BadRequest(_) => self.to_string(),
        }
    }

    const fn is_server_error(&self) -> bool {
        match self {
            Self::Commerce(err) => !matches!(
                err,
                CommerceError::Unauthorized
                    | CommerceError::Forbidden
                    | CommerceError::NotFound(_)
                    | CommerceError::Conflict(_)
                    | CommerceError::Rejected(_)
                    | CommerceError::RateLimited(_)
            ),
            Self::Identity(err) => matches!(
                err,
                IdentityError::Parse(_) | IdentityError::Url(_) | IdentityError::Network(_)
                    | IdentityError::Unavailable(_)
            ),
            Self::Session(_) | Self::Internal(_) | Self::Unavailable(_) => true,
            _ => false,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        if self.revokes_session() {
            tracing::info!(error = %self, "Session revoked");
            let mut response = Redirect::to(LOGIN_PATH).into_response();
            response.extensions_mut().insert(RevokeSession);
            return response;
        }
        if matches!(self, Self::SignInRequired) {
            return Redirect::to(LOGIN_PATH).into_response();
        }

        let retry_after = match &self {
            Self::RateLimited(secs) => *secs,
            Self::Commerce(CommerceError::RateLimited(secs)) => Some(*secs),
            _ => None,
        };

        let mut response = (self.status(), self.client_message()).into_response();
        if let Some(secs) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(username: &str, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            username: Some(username.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added item", Some(&[("sku", "MUG-01")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product MUG-01".to_string());
        assert_eq!(err.to_string(), "Not found: product MUG-01");

        let err = AppError::BadRequest("invalid quantity".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid quantity");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(get_status(AppError::Forbidden), StatusCode::FORBIDDEN);
        assert_eq!(
            get_status(AppError::RateLimited(None)),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(AppError::Unavailable("identity".to_string())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(AppError::Commerce(CommerceError::Status {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: String::new(),
            })),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_backend_unauthorized_redirects_and_marks_revocation() {
        let response = AppError::Commerce(CommerceError::Unauthorized).into_response();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            LOGIN_PATH
        );
        assert!(response.extensions().get::<RevokeSession>().is_some());
    }

    #[test]
    fn test_sign_in_required_redirects_without_revocation() {
        let response = AppError::SignInRequired.into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(response.extensions().get::<RevokeSession>().is_none());
    }

    #[test]
    fn test_token_error_revokes_session() {
        let err = AppError::from(TokenError::Malformed(2));
        assert!(err.revokes_session());
    }

    #[test]
    fn test_transient_identity_failure_keeps_session() {
        let err = AppError::Identity(IdentityError::Unavailable(StatusCode::BAD_GATEWAY));
        assert!(!err.revokes_session());

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.extensions().get::<RevokeSession>().is_none());
    }

    #[test]
    fn test_backend_rate_limit_forwards_retry_after() {
        let response = AppError::Commerce(CommerceError::RateLimited(12)).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "12");
    }

    #[test]
    fn test_backend_body_is_not_exposed() {
        let err = AppError::Commerce(CommerceError::Status {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: "stack trace at db.rs:42".to_string(),
        });
        assert!(!err.client_message().contains("db.rs"));
    }
}
