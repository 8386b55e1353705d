//! Command implementations.
//!
//! # Environment Variables
//!
//! - `COMMERCE_API_URL` - Base URL of the commerce REST API
//! - `IDENTITY_URL`, `IDENTITY_CLIENT_ID`, `IDENTITY_CLIENT_SECRET` - only
//!   needed when signing in with `HARBOR_USERNAME` / `HARBOR_PASSWORD`
//! - `CURRENCY` - Currency used to print prices (default: USD)

pub mod catalog;
pub mod orders;
pub mod promo;
pub mod token;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use harbor_commerce::{
    CommerceClient, CommerceConfig, CommerceError, IdentityClient, IdentityConfig, IdentityError,
};
use harbor_core::{CurrencyCode, TokenError};

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Environment variable could not be parsed.
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(&'static str, String),

    /// Neither a token nor credentials were supplied.
    #[error("No credentials: pass --token or set HARBOR_USERNAME and HARBOR_PASSWORD")]
    NoCredentials,

    /// An argument was rejected before reaching the backend.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Commerce backend error.
    #[error(transparent)]
    Commerce(#[from] CommerceError),

    /// Identity provider error.
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// Token decoding error.
    #[error(transparent)]
    Token(#[from] TokenError),
}

/// An authorized commerce client plus display settings.
pub struct Connection {
    pub client: CommerceClient,
    pub currency: CurrencyCode,
}

impl Connection {
    /// Build a connection from the environment.
    ///
    /// Uses `token` when given; otherwise signs in with `HARBOR_USERNAME` and
    /// `HARBOR_PASSWORD`.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is missing or sign-in fails.
    pub async fn from_env(token: Option<String>) -> Result<Self, CliError> {
        let commerce_url = required_url("COMMERCE_API_URL")?;
        let currency = std::env::var("CURRENCY")
            .unwrap_or_else(|_| "USD".to_string())
            .parse::<CurrencyCode>()
            .map_err(|e| CliError::InvalidEnvVar("CURRENCY", e))?;

        let token = match token.filter(|t| !t.is_empty()) {
            Some(token) => token,
            None => sign_in().await?,
        };

        let client = CommerceClient::new(&CommerceConfig::new(commerce_url))?.authorized(&token);
        Ok(Self { client, currency })
    }
}

/// Sign in with operator credentials and return the bearer token.
async fn sign_in() -> Result<String, CliError> {
    let (Ok(username), Ok(password)) = (
        std::env::var("HARBOR_USERNAME"),
        std::env::var("HARBOR_PASSWORD"),
    ) else {
        return Err(CliError::NoCredentials);
    };

    let mut config = IdentityConfig::new(
        required_url("IDENTITY_URL")?,
        required_env("IDENTITY_CLIENT_ID")?,
    );
    config.client_secret = std::env::var("IDENTITY_CLIENT_SECRET")
        .ok()
        .filter(|s| !s.is_empty())
        .map(SecretString::from);

    let identity = IdentityClient::new(&config)?;
    let tokens = identity
        .login(&username, &SecretString::from(password))
        .await?;

    if !tokens.claims.is_admin() {
        tracing::warn!(
            username = %tokens.claims.username,
            "Signed in without the admin role; backend calls will likely be refused"
        );
    }
    tracing::info!(username = %tokens.claims.username, "Signed in");
    Ok(tokens.access_token)
}

fn required_env(key: &'static str) -> Result<String, CliError> {
    std::env::var(key).map_err(|_| CliError::MissingEnvVar(key))
}

fn required_url(key: &'static str) -> Result<Url, CliError> {
    let value = required_env(key)?;
    Url::parse(&value).map_err(|e| CliError::InvalidEnvVar(key, e.to_string()))
}
