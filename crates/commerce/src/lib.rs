//! Harbor Commerce - clients for the remote services the storefront fronts.
//!
//! # Architecture
//!
//! - The commerce backend is the source of truth - NO local persistence,
//!   direct REST calls
//! - The identity provider is reached through its OAuth token endpoint
//! - In-memory caching via `moka` for catalog reads (5 minute TTL)
//!
//! # Example
//!
//! ```rust,ignore
//! use harbor_commerce::{CommerceClient, CommerceConfig, CartMutation};
//!
//! let client = CommerceClient::new(&CommerceConfig::new(base_url))?;
//!
//! // Browse anonymously
//! let product = client.get_product(&sku).await?;
//!
//! // Mutate a cart on behalf of a signed-in user
//! let cart = client
//!     .authorized(&tokens.access_token)
//!     .mutate_cart(&cart_id, &CartMutation::AddItem { sku, quantity: 1 }, &key)
//!     .await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

mod client;
pub mod config;
pub mod error;
pub mod identity;
pub mod types;

pub use client::{CommerceClient, IDEMPOTENCY_KEY_HEADER};
pub use config::{CommerceConfig, IdentityConfig};
pub use error::CommerceError;
pub use identity::{IdentityClient, IdentityError, TokenSet};
pub use types::*;
