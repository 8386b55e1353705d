//! Authentication route handlers.
//!
//! Login, registration and logout against the identity provider. Tokens
//! are held in the server-side session; the browser only sees the session
//! cookie.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use secrecy::SecretString;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use harbor_commerce::IdentityError;
use harbor_core::Email;

use crate::error::{AppError, Result};
use crate::filters;
use crate::models::Flash;
use crate::page::{Page, set_flash};
use crate::services::session;
use crate::state::AppState;

/// Minimum password length accepted at registration.
const MIN_PASSWORD_LENGTH: usize = 8;

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub next: Option<String>,
}

/// Registration form data.
#[derive(Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

/// Query parameters for the login page.
#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub next: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub page: Page,
    pub error: Option<String>,
    pub username: String,
    pub next: String,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub page: Page,
    pub error: Option<String>,
    pub username: String,
    pub email: String,
}

/// Only same-site absolute paths are followed after login.
fn safe_next(next: Option<&str>) -> String {
    next.filter(|path| {
        path.starts_with('/') && !path.starts_with("//") && !path.starts_with("/\\")
    })
    .unwrap_or("/account")
    .to_string()
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
pub async fn login_page(page: Page, Query(query): Query<LoginQuery>) -> impl IntoResponse {
    LoginTemplate {
        page,
        error: None,
        username: String::new(),
        next: safe_next(query.next.as_deref()),
    }
}

/// Handle login form submission.
///
/// Refused credentials and an unreachable provider re-render the form with
/// a message; anything else is an error page.
#[instrument(skip_all, fields(username = %form.username))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    page: Page,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let next = safe_next(form.next.as_deref());
    let username = form.username.trim().to_string();
    let password = SecretString::from(form.password);

    let rerender = |status: StatusCode, error: String, page: Page| {
        (
            status,
            LoginTemplate {
                page,
                error: Some(error),
                username: username.clone(),
                next: next.clone(),
            },
        )
            .into_response()
    };

    if username.is_empty() {
        return Ok(rerender(
            StatusCode::BAD_REQUEST,
            "Enter your username".to_string(),
            page,
        ));
    }

    match state.identity().login(&username, &password).await {
        Ok(tokens) => {
            session::establish(&session, &tokens).await?;
            Ok(Redirect::to(&next).into_response())
        }
        Err(IdentityError::InvalidCredentials) => Ok(rerender(
            StatusCode::UNAUTHORIZED,
            "Invalid username or password".to_string(),
            page,
        )),
        Err(e) if e.is_transient() => {
            tracing::warn!(error = %e, "Identity provider unavailable during login");
            Ok(rerender(
                StatusCode::SERVICE_UNAVAILABLE,
                "Sign-in is temporarily unavailable, please try again".to_string(),
                page,
            ))
        }
        Err(e) => Err(AppError::Identity(e)),
    }
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page.
pub async fn register_page(page: Page) -> impl IntoResponse {
    RegisterTemplate {
        page,
        error: None,
        username: String::new(),
        email: String::new(),
    }
}

/// Check the registration form before calling the provider.
fn validate_registration(form: &RegisterForm) -> std::result::Result<Email, String> {
    if form.username.trim().is_empty() {
        return Err("Choose a username".to_string());
    }
    let email = Email::parse(&form.email).map_err(|e| format!("Invalid email: {e}"))?;
    if form.password.len() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        ));
    }
    if form.password != form.password_confirm {
        return Err("Passwords do not match".to_string());
    }
    Ok(email)
}

/// Handle registration form submission.
#[instrument(skip_all, fields(username = %form.username))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    page: Page,
    Form(form): Form<RegisterForm>,
) -> Result<Response> {
    let rerender = |status: StatusCode, error: String, page: Page, form: &RegisterForm| {
        (
            status,
            RegisterTemplate {
                page,
                error: Some(error),
                username: form.username.clone(),
                email: form.email.clone(),
            },
        )
            .into_response()
    };

    let email = match validate_registration(&form) {
        Ok(email) => email,
        Err(message) => return Ok(rerender(StatusCode::BAD_REQUEST, message, page, &form)),
    };

    let username = form.username.trim();
    let password = SecretString::from(form.password.clone());

    match state.identity().register(username, &email, &password).await {
        Ok(()) => {
            tracing::info!(username, "Account registered");
            set_flash(&session, Flash::notice("Account created. Please sign in.")).await?;
            Ok(Redirect::to("/auth/login").into_response())
        }
        Err(e @ (IdentityError::UserExists | IdentityError::Rejected { .. })) => {
            let err = AppError::Identity(e);
            Ok(rerender(err.status(), err.client_message(), page, &form))
        }
        Err(e) if e.is_transient() => Ok(rerender(
            StatusCode::SERVICE_UNAVAILABLE,
            "Registration is temporarily unavailable, please try again".to_string(),
            page,
            &form,
        )),
        Err(e) => Err(AppError::Identity(e)),
    }
}

// =============================================================================
// Logout
// =============================================================================

/// Handle logout.
#[instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, session: Session) -> Result<Redirect> {
    session::logout(&state, &session).await?;
    Ok(Redirect::to("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(username: &str, email: &str, password: &str, confirm: &str) -> RegisterForm {
        RegisterForm {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            password_confirm: confirm.to_string(),
        }
    }

    #[test]
    fn test_safe_next_rejects_offsite_targets() {
        assert_eq!(safe_next(Some("/cart")), "/cart");
        assert_eq!(safe_next(Some("//evil.example")), "/account");
        assert_eq!(safe_next(Some("https://evil.example")), "/account");
        assert_eq!(safe_next(Some("/\\evil.example")), "/account");
        assert_eq!(safe_next(None), "/account");
    }

    #[test]
    fn test_validate_registration() {
        assert!(validate_registration(&form("ada", "ada@example.com", "hunter22", "hunter22")).is_ok());
        assert_eq!(
            validate_registration(&form("ada", "ada@example.com", "short", "short")),
            Err("Password must be at least 8 characters".to_string())
        );
        assert_eq!(
            validate_registration(&form("ada", "ada@example.com", "hunter22", "hunter23")),
            Err("Passwords do not match".to_string())
        );
        assert!(validate_registration(&form("", "ada@example.com", "hunter22", "hunter22")).is_err());
        assert!(validate_registration(&form("ada", "not-an-email", "hunter22", "hunter22")).is_err());
    }
}
