//! End-to-end test support for Harbor.
//!
//! Each test starts its own pair of servers on ephemeral ports:
//!
//! - a fake commerce backend and identity provider ([`FakeBackend`]) that
//!   keeps everything in memory and counts calls per endpoint
//! - the real storefront router, configured to talk to the fake
//!
//! Tests drive the storefront with a cookie-keeping `reqwest` client that
//! does not follow redirects, so redirect targets can be asserted.
//!
//! # Example
//!
//! ```rust,ignore
//! let harness = Harness::start().await;
//! harness.login("ada").await;
//! let response = harness.get("/account").await;
//! assert_eq!(response.status(), 200);
//! ```

#![allow(clippy::missing_panics_doc)]
#![allow(clippy::unwrap_used)]

mod fake;

pub use fake::{FakeBackend, RefreshMode, mint_id_token};

use std::net::SocketAddr;
use std::time::Duration;

use reqwest::{Client, Response, redirect};
use secrecy::SecretString;
use url::Url;

use harbor_commerce::{CommerceConfig, IdentityConfig};
use harbor_core::CurrencyCode;
use harbor_storefront::config::{LogFormat, StorefrontConfig};
use harbor_storefront::state::AppState;

/// Password every seeded user signs in with.
pub const PASSWORD: &str = "correct horse battery";

/// A running storefront wired to a fake backend.
pub struct Harness {
    pub backend: FakeBackend,
    pub base_url: String,
    pub client: Client,
}

impl Harness {
    /// Start the fake backend and a storefront in front of it.
    pub async fn start() -> Self {
        let backend = FakeBackend::start().await;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{addr}");

        let state = AppState::new(storefront_config(&backend, &base_url)).unwrap();
        let app = harbor_storefront::app(state);
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });

        let client = Client::builder()
            .cookie_store(true)
            .redirect(redirect::Policy::none())
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap();

        Self {
            backend,
            base_url,
            client,
        }
    }

    /// Absolute storefront URL for `path`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// GET a storefront page.
    pub async fn get(&self, path: &str) -> Response {
        self.client.get(self.url(path)).send().await.unwrap()
    }

    /// POST a form to the storefront.
    pub async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> Response {
        self.client
            .post(self.url(path))
            .form(form)
            .send()
            .await
            .unwrap()
    }

    /// Sign in as a seeded user and assert the login succeeded.
    pub async fn login(&self, username: &str) {
        let response = self
            .post_form(
                "/auth/login",
                &[
                    ("username", username),
                    ("password", PASSWORD),
                    ("next", "/account"),
                ],
            )
            .await;
        assert_eq!(response.status(), 303, "login as {username} failed");
        assert_eq!(location(&response), "/account");
    }

    /// Add `quantity` of `sku` to the cart using `key` as the idempotency key.
    pub async fn add_to_cart(&self, sku: &str, quantity: u32, key: &str) -> Response {
        let quantity = quantity.to_string();
        self.post_form(
            "/cart/add",
            &[
                ("sku", sku),
                ("quantity", quantity.as_str()),
                ("idempotency_key", key),
            ],
        )
        .await
    }
}

/// The `Location` header of a redirect.
#[must_use]
pub fn location(response: &Response) -> String {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn storefront_config(backend: &FakeBackend, base_url: &str) -> StorefrontConfig {
    let mut commerce = CommerceConfig::new(Url::parse(&backend.url("/api")).unwrap());
    commerce.timeout = Duration::from_secs(5);

    let mut identity =
        IdentityConfig::new(Url::parse(&backend.url("/identity")).unwrap(), "harbor-test");
    identity.timeout = Duration::from_secs(5);

    StorefrontConfig {
        host: "127.0.0.1".parse().unwrap(),
        port: 0,
        base_url: base_url.to_string(),
        session_secret: SecretString::from("q7Vt-2mLx9#Rw4pZ!kN8sB3yF6hJ0cD5"),
        commerce,
        identity,
        currency: CurrencyCode::USD,
        sentry_dsn: None,
        sentry_environment: None,
        log_format: LogFormat::Text,
    }
}
