//! Identity provider client.
//!
//! Talks to the managed identity service over its OAuth 2.0 token endpoint
//! rather than through a vendor SDK:
//!
//! 1. `login()` exchanges a username and password for a token triple
//! 2. `refresh()` trades the refresh token for a fresh id/access pair
//! 3. `register()` creates an account
//! 4. `revoke()` invalidates the refresh token at logout
//!
//! Failures are categorized (see [`IdentityError`]) so callers can tell a
//! rejected credential from an unreachable provider.

mod types;

pub use types::*;

use std::sync::Arc;

use reqwest::{RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use tracing::instrument;
use url::Url;

use harbor_core::{Email, TokenClaims};

use crate::config::IdentityConfig;

/// Client for the identity provider.
#[derive(Clone)]
pub struct IdentityClient {
    inner: Arc<IdentityClientInner>,
}

struct IdentityClientInner {
    client: reqwest::Client,
    token_url: Url,
    signup_url: Url,
    revoke_url: Url,
    client_id: String,
    client_secret: Option<SecretString>,
}

impl IdentityClient {
    /// Create a new identity client.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint URLs cannot be derived from the base
    /// URL or the HTTP client cannot be constructed.
    pub fn new(config: &IdentityConfig) -> Result<Self, IdentityError> {
        let base = crate::config::with_trailing_slash(config.base_url.clone());
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(IdentityError::Network)?;

        Ok(Self {
            inner: Arc::new(IdentityClientInner {
                client,
                token_url: base.join("oauth2/token")?,
                signup_url: base.join("signup")?,
                revoke_url: base.join("oauth2/revoke")?,
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.clone(),
            }),
        })
    }

    /// Get the OAuth client ID.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.inner.client_id
    }

    /// Attach client authentication for confidential clients.
    fn with_client_auth(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.inner.client_secret {
            Some(secret) => {
                builder.basic_auth(&self.inner.client_id, Some(secret.expose_secret()))
            }
            None => builder,
        }
    }

    /// Post a form to the token endpoint and parse the token response.
    async fn token_request(
        &self,
        params: &[(&str, &str)],
    ) -> Result<TokenResponse, TokenEndpointFailure> {
        let builder = self
            .with_client_auth(self.inner.client.post(self.inner.token_url.clone()))
            .form(params);

        let response = builder.send().await.map_err(TokenEndpointFailure::Network)?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(TokenEndpointFailure::Network)?;

        if status.is_server_error() {
            tracing::error!(status = %status, "Identity provider returned server error");
            return Err(TokenEndpointFailure::Unavailable(status));
        }
        if !status.is_success() {
            let parsed: OAuthErrorBody = serde_json::from_str(&body).unwrap_or_default();
            return Err(TokenEndpointFailure::Refused {
                status,
                error: parsed.error,
                description: parsed.error_description,
            });
        }

        serde_json::from_str(&body).map_err(|e| TokenEndpointFailure::Parse(e.to_string()))
    }

    /// Exchange credentials for a token set.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::InvalidCredentials`] if the provider refuses
    /// the credentials, [`IdentityError::Network`] or
    /// [`IdentityError::Unavailable`] if it cannot be reached, and
    /// [`IdentityError::Token`] if the issued id token cannot be decoded.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &SecretString) -> Result<TokenSet, IdentityError> {
        let params = [
            ("grant_type", "password"),
            ("client_id", self.inner.client_id.as_str()),
            ("username", username),
            ("password", password.expose_secret()),
            ("scope", "openid email profile"),
        ];

        let response = self.token_request(&params).await.map_err(|failure| match failure {
            TokenEndpointFailure::Refused { error, description, .. } => {
                tracing::info!(error = ?error, description = ?description, "Login refused");
                IdentityError::InvalidCredentials
            }
            other => other.into(),
        })?;

        TokenSet::from_response(response, None)
    }

    /// Trade a refresh token for a new token set.
    ///
    /// Providers that do not rotate refresh tokens omit it from the response;
    /// the previous refresh token is carried over in that case.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Rejected`] if the refresh token is no longer
    /// accepted, [`IdentityError::Network`] or [`IdentityError::Unavailable`]
    /// if the provider cannot be reached.
    #[instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, IdentityError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", self.inner.client_id.as_str()),
            ("refresh_token", refresh_token),
        ];

        let response = self.token_request(&params).await?;
        TokenSet::from_response(response, Some(refresh_token))
    }

    /// Create an account.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::UserExists`] if the username or email is taken,
    /// [`IdentityError::Rejected`] with the provider's message for invalid
    /// input (e.g. a weak password).
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn register(
        &self,
        username: &str,
        email: &Email,
        password: &SecretString,
    ) -> Result<(), IdentityError> {
        let body = SignUpRequest {
            client_id: &self.inner.client_id,
            username,
            email: email.as_str(),
            password: password.expose_secret(),
        };

        let response = self
            .with_client_auth(self.inner.client.post(self.inner.signup_url.clone()))
            .json(&body)
            .send()
            .await
            .map_err(IdentityError::Network)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        if status.is_server_error() {
            return Err(IdentityError::Unavailable(status));
        }
        if status == StatusCode::CONFLICT {
            return Err(IdentityError::UserExists);
        }

        let parsed: OAuthErrorBody = serde_json::from_str(&text).unwrap_or_default();
        Err(IdentityError::Rejected {
            status,
            message: parsed
                .message()
                .unwrap_or("Registration was not accepted")
                .to_string(),
        })
    }

    /// Revoke a refresh token.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot be reached or refuses the token.
    #[instrument(skip_all)]
    pub async fn revoke(&self, refresh_token: &str) -> Result<(), IdentityError> {
        let params = [
            ("token", refresh_token),
            ("client_id", self.inner.client_id.as_str()),
        ];

        let response = self
            .with_client_auth(self.inner.client.post(self.inner.revoke_url.clone()))
            .form(&params)
            .send()
            .await
            .map_err(IdentityError::Network)?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else if status.is_server_error() {
            Err(IdentityError::Unavailable(status))
        } else {
            Err(IdentityError::Rejected {
                status,
                message: "revocation refused".to_string(),
            })
        }
    }
}

impl TokenSet {
    fn from_response(
        response: TokenResponse,
        previous_refresh: Option<&str>,
    ) -> Result<Self, IdentityError> {
        let claims = TokenClaims::decode(&response.id_token)?;
        Ok(Self {
            id_token: response.id_token,
            access_token: response.access_token,
            refresh_token: response
                .refresh_token
                .or_else(|| previous_refresh.map(str::to_owned)),
            claims,
        })
    }
}
