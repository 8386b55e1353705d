//! Harbor Core - Shared types library.
//!
//! This crate provides common types used across all Harbor components:
//! - `commerce` - HTTP clients for the commerce backend and identity provider
//! - `storefront` - Customer and admin web application
//! - `cli` - Operator command-line tools
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, SKUs, prices, emails, and statuses
//! - [`token`] - Bearer token claims decoding and expiry checks

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod token;
pub mod types;

pub use token::{TokenClaims, TokenError};
pub use types::*;
