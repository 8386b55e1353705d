//! Session lifecycle: sign-in, token refresh, and revocation.

use harbor_integration_tests::{Harness, RefreshMode, location};

/// Issue login tokens that are already past their expiry skew.
const EXPIRED_TTL_SECS: i64 = -120;

#[tokio::test]
async fn test_login_lands_on_account_page() {
    let harness = Harness::start().await;
    harness.login("ada").await;

    let response = harness.get("/account").await;
    assert_eq!(response.status(), 200);
    let body = response.text().await.unwrap();
    assert!(body.contains("ada@example.com"));
    assert_eq!(harness.backend.calls("login"), 1);
}

#[tokio::test]
async fn test_wrong_password_rerenders_login() {
    let harness = Harness::start().await;
    let response = harness
        .post_form(
            "/auth/login",
            &[("username", "ada"), ("password", "not it at all")],
        )
        .await;

    assert_eq!(response.status(), 401);
    assert!(harness.get("/account").await.status().is_redirection());
}

#[tokio::test]
async fn test_backend_unauthorized_revokes_session() {
    let harness = Harness::start().await;
    harness.login("ada").await;
    harness.backend.revoke_all_tokens();

    let response = harness.get("/account/orders").await;
    assert_eq!(response.status(), 303);
    assert_eq!(location(&response), "/auth/login");

    // The flushed session no longer holds tokens.
    let response = harness.get("/account").await;
    assert_eq!(response.status(), 303);
    assert_eq!(location(&response), "/auth/login");
}

#[tokio::test]
async fn test_expired_token_is_refreshed_once() {
    let harness = Harness::start().await;
    harness.backend.set_login_token_ttl(EXPIRED_TTL_SECS);
    harness.login("ada").await;

    assert_eq!(harness.get("/account").await.status(), 200);
    assert_eq!(harness.get("/account").await.status(), 200);
    assert_eq!(harness.backend.calls("refresh"), 1);
}

#[tokio::test]
async fn test_concurrent_requests_share_one_refresh() {
    let harness = Harness::start().await;
    harness.backend.set_login_token_ttl(EXPIRED_TTL_SECS);
    harness.login("ada").await;

    let (first, second) = tokio::join!(harness.get("/account"), harness.get("/account"));
    assert_eq!(first.status(), 200);
    assert_eq!(second.status(), 200);
    assert_eq!(harness.backend.calls("refresh"), 1);

    assert_eq!(harness.get("/account").await.status(), 200);
}

#[tokio::test]
async fn test_rejected_refresh_signs_the_user_out() {
    let harness = Harness::start().await;
    harness.backend.set_login_token_ttl(EXPIRED_TTL_SECS);
    harness.backend.set_refresh_mode(RefreshMode::Reject);
    harness.login("ada").await;

    let response = harness.get("/account").await;
    assert_eq!(response.status(), 303);
    assert_eq!(location(&response), "/auth/login");

    let response = harness.get("/account").await;
    assert_eq!(location(&response), "/auth/login");
    assert_eq!(harness.backend.calls("refresh"), 1);
}

#[tokio::test]
async fn test_unreachable_identity_provider_keeps_session() {
    let harness = Harness::start().await;
    harness.backend.set_login_token_ttl(EXPIRED_TTL_SECS);
    harness.backend.set_refresh_mode(RefreshMode::Unavailable);
    harness.login("ada").await;

    assert_eq!(harness.get("/account").await.status(), 503);
    assert_eq!(harness.get("/account").await.status(), 503);
    assert_eq!(harness.backend.calls("refresh"), 2);

    harness.backend.set_refresh_mode(RefreshMode::Accept);
    assert_eq!(harness.get("/account").await.status(), 200);
}

#[tokio::test]
async fn test_logout_revokes_refresh_token() {
    let harness = Harness::start().await;
    harness.login("ada").await;

    let response = harness.post_form("/auth/logout", &[]).await;
    assert_eq!(response.status(), 303);
    assert_eq!(harness.backend.calls("revoke"), 1);
    assert!(harness.get("/account").await.status().is_redirection());
}

#[tokio::test]
async fn test_register_then_login() {
    let harness = Harness::start().await;
    let response = harness
        .post_form(
            "/auth/register",
            &[
                ("username", "linus"),
                ("email", "linus@example.com"),
                ("password", harbor_integration_tests::PASSWORD),
                ("password_confirm", harbor_integration_tests::PASSWORD),
            ],
        )
        .await;
    assert_eq!(response.status(), 303);
    assert_eq!(location(&response), "/auth/login");
    assert_eq!(harness.backend.calls("signup"), 1);

    harness.login("linus").await;
}
