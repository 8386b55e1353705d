//! Connection settings for the backend clients.
//!
//! Loading from the environment is the binaries' job; these structs only
//! carry the validated values.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

/// Default timeout for backend calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Commerce backend connection settings.
#[derive(Debug, Clone)]
pub struct CommerceConfig {
    /// Base URL of the REST API, e.g. `https://api.example.com/v1/`.
    pub base_url: Url,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl CommerceConfig {
    /// Settings with the default timeout.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url: with_trailing_slash(base_url),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Identity provider settings.
///
/// Implements `Debug` manually to redact the client secret.
#[derive(Clone)]
pub struct IdentityConfig {
    /// Base URL of the identity provider (token, sign-up and revoke
    /// endpoints are resolved against it).
    pub base_url: Url,
    /// OAuth client ID.
    pub client_id: String,
    /// OAuth client secret, for confidential clients.
    pub client_secret: Option<SecretString>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl IdentityConfig {
    /// Settings for a public client with the default timeout.
    #[must_use]
    pub fn new(base_url: Url, client_id: impl Into<String>) -> Self {
        Self {
            base_url: with_trailing_slash(base_url),
            client_id: client_id.into(),
            client_secret: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl std::fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("base_url", &self.base_url.as_str())
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Ensure relative joins keep the last path segment of the base URL.
#[must_use]
pub fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_keeps_prefix_on_join() {
        let base = with_trailing_slash(Url::parse("https://api.example.com/v1").unwrap());
        assert_eq!(
            base.join("carts/abc").unwrap().as_str(),
            "https://api.example.com/v1/carts/abc"
        );
    }

    #[test]
    fn test_identity_debug_redacts_secret() {
        let mut config = IdentityConfig::new(
            Url::parse("https://auth.example.com").unwrap(),
            "client-123",
        );
        config.client_secret = Some(SecretString::from("hunter2-very-secret"));

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("client-123"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("hunter2-very-secret"));
    }
}
