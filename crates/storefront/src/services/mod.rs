//! Business logic services for storefront.
//!
//! # Services
//!
//! - `session` - Token lifecycle (establish, refresh, revoke)
//! - `cart` - Cart synchronization against the commerce backend

pub mod cart;
pub mod session;
