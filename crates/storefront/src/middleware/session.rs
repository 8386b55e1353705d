//! Session middleware configuration.
//!
//! Sets up in-memory sessions using tower-sessions. The session holds the
//! bearer tokens and cart mirror, so nothing sensitive reaches the browser
//! beyond the opaque cookie. The cookie is signed with a key derived from
//! `STOREFRONT_SESSION_SECRET`; an id without a valid signature starts a
//! new session.

use axum::{extract::Request, middleware::Next, response::Response};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha512};
use tower_sessions::cookie::Key;
use tower_sessions::service::SignedCookie;
use tower_sessions::{Expiry, MemoryStore, Session, SessionManagerLayer};

use crate::config::StorefrontConfig;
use crate::error::RevokeSession;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "harbor_session";

/// Session expiry time in seconds (7 days).
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Cookie signing key for a session secret.
///
/// The secret is stretched to the 64 bytes [`Key`] requires.
fn signing_key(secret: &SecretString) -> Key {
    Key::from(Sha512::digest(secret.expose_secret().as_bytes()).as_slice())
}

/// Create the session layer with an in-memory store and signed cookies.
#[must_use]
pub fn create_session_layer(config: &StorefrontConfig) -> SessionManagerLayer<MemoryStore, SignedCookie> {
    SessionManagerLayer::new(MemoryStore::default())
        .with_signed(signing_key(&config.session_secret))
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.is_secure())
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}

/// Flush the session when a handler marked its response with
/// [`RevokeSession`].
///
/// Must sit inside the session layer so the flush is persisted.
pub async fn revoke_session_middleware(session: Session, request: Request, next: Next) -> Response {
    let response = next.run(request).await;

    if response.extensions().get::<RevokeSession>().is_some() {
        if let Err(e) = session.flush().await {
            tracing::error!(error = %e, "Failed to flush revoked session");
        }
        crate::error::clear_sentry_user();
    }

    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::header,
        routing::get,
    };
    use tower::ServiceExt;

    use super::*;
    use crate::config::tests::test_config;

    /// Length of a session id as it appears after the cookie's signature.
    const SESSION_ID_LEN: usize = 22;

    async fn visits(session: Session) -> String {
        let count = session.get::<u32>("visits").await.unwrap().unwrap_or(0) + 1;
        session.insert("visits", count).await.unwrap();
        count.to_string()
    }

    fn app() -> Router {
        let config = test_config("http://127.0.0.1:9/", "http://127.0.0.1:9/");
        Router::new()
            .route("/", get(visits))
            .layer(create_session_layer(&config))
    }

    async fn visit(app: &Router, cookie: Option<&str>) -> (String, Option<String>) {
        let mut request = axum::http::Request::builder().uri("/");
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, format!("{SESSION_COOKIE_NAME}={cookie}"));
        }
        let response = app
            .clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();

        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .map(|value| value.to_str().unwrap().to_string());
        let value = set_cookie.and_then(|header| {
            header
                .split(';')
                .next()
                .and_then(|pair| pair.strip_prefix(&format!("{SESSION_COOKIE_NAME}=")))
                .map(str::to_owned)
        });
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (String::from_utf8(body.to_vec()).unwrap(), value)
    }

    #[test]
    fn test_signing_key_depends_on_secret() {
        let a = signing_key(&SecretString::from("a".repeat(32)));
        let b = signing_key(&SecretString::from("b".repeat(32)));
        assert_eq!(a.master(), signing_key(&SecretString::from("a".repeat(32))).master());
        assert_ne!(a.master(), b.master());
    }

    #[tokio::test]
    async fn test_signed_cookie_resumes_session() {
        let app = app();
        let (first, cookie) = visit(&app, None).await;
        let cookie = cookie.unwrap();
        assert_eq!(first, "1");

        let (second, _) = visit(&app, Some(&cookie)).await;
        assert_eq!(second, "2");
    }

    #[tokio::test]
    async fn test_unsigned_session_id_is_ignored() {
        let app = app();
        let (_, cookie) = visit(&app, None).await;
        let cookie = cookie.unwrap();
        assert!(cookie.len() > SESSION_ID_LEN);

        // The bare id names a live session but carries no signature.
        let bare_id = &cookie[cookie.len() - SESSION_ID_LEN..];
        let (visits, _) = visit(&app, Some(bare_id)).await;
        assert_eq!(visits, "1");
    }
}
