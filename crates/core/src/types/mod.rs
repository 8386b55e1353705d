//! Core types for Harbor.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod price;
pub mod sku;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use price::{CurrencyCode, Price};
pub use sku::{PromotionCode, PromotionCodeError, Sku, SkuError};
pub use status::*;
