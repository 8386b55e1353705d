//! Session-held models for the storefront.

pub mod session;

pub use session::{CartSnapshot, CurrentUser, Flash, FlashKind, PendingOrder, keys as session_keys};
