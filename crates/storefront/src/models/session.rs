//! Session-related types.
//!
//! The browser only carries the session cookie. Tokens, the decoded claims
//! and the cart mirror live server-side under the keys below.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use harbor_commerce::{Cart, CartItem, TokenSet, total_of};
use harbor_core::{CartId, OrderId, PromotionCode, Role, TokenClaims};

/// Session keys for storefront data.
pub mod keys {
    /// Key for the identity provider token set.
    pub const TOKENS: &str = "tokens";

    /// Key for the mirrored cart.
    pub const CART: &str = "cart";

    /// Key for the order awaiting payment confirmation.
    pub const PENDING_ORDER: &str = "pending_order";

    /// Key for the one-shot notice shown on the next page.
    pub const FLASH: &str = "flash";
}

/// Identity shown in page chrome.
///
/// Built from stored claims without refreshing, so it is for display only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub username: String,
    pub email: Option<String>,
    pub role: Role,
}

impl CurrentUser {
    /// Whether the admin link should be shown.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<&TokenClaims> for CurrentUser {
    fn from(claims: &TokenClaims) -> Self {
        Self {
            username: claims.username.clone(),
            email: claims.email.clone(),
            role: claims.role,
        }
    }
}

impl From<&TokenSet> for CurrentUser {
    fn from(tokens: &TokenSet) -> Self {
        Self::from(&tokens.claims)
    }
}

/// Session mirror of the last cart the backend returned.
///
/// Replaced wholesale after every mutation; never edited locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub cart_id: CartId,
    pub items: Vec<CartItem>,
    pub promotion_code: Option<PromotionCode>,
}

impl CartSnapshot {
    /// Sum of price × quantity, recomputed from the mirrored items.
    #[must_use]
    pub fn total(&self) -> Decimal {
        total_of(&self.items)
    }

    /// Units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl From<Cart> for CartSnapshot {
    fn from(cart: Cart) -> Self {
        Self {
            cart_id: cart.id,
            items: cart.items,
            promotion_code: cart.promotion_code,
        }
    }
}

/// Order created at checkout, kept until the payment page sends the
/// customer back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOrder {
    pub order_id: OrderId,
}

/// Severity of a flash message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashKind {
    Notice,
    Error,
}

/// A one-shot message carried across a redirect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

impl Flash {
    pub fn notice(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Notice,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Error,
            message: message.into(),
        }
    }

    /// CSS modifier for the banner.
    #[must_use]
    pub const fn css_class(&self) -> &'static str {
        match self.kind {
            FlashKind::Notice => "flash-notice",
            FlashKind::Error => "flash-error",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use harbor_core::Sku;

    fn item(sku: &str, price: &str, quantity: u32) -> CartItem {
        CartItem {
            sku: Sku::parse(sku).unwrap(),
            name: format!("Product {sku}"),
            price: price.parse().unwrap(),
            quantity,
        }
    }

    #[test]
    fn test_snapshot_mirrors_cart_verbatim() {
        let cart = Cart {
            id: CartId::new("cart-1"),
            items: vec![item("B-2", "3.50", 2), item("A-1", "10.00", 1)],
            promotion_code: None,
        };

        let snapshot = CartSnapshot::from(cart.clone());

        assert_eq!(snapshot.cart_id, cart.id);
        assert_eq!(snapshot.items, cart.items);
        assert_eq!(snapshot.total(), "17.00".parse::<Decimal>().unwrap());
        assert_eq!(snapshot.item_count(), 3);
    }

    #[test]
    fn test_empty_snapshot_total_is_zero() {
        let snapshot = CartSnapshot {
            cart_id: CartId::new("cart-2"),
            items: vec![],
            promotion_code: None,
        };
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.total(), Decimal::ZERO);
    }

    #[test]
    fn test_flash_round_trips_through_json() {
        let flash = Flash::error("Checkout was cancelled");
        let json = serde_json::to_string(&flash).unwrap();
        assert!(json.contains("\"error\""));
        let back: Flash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, flash);
        assert_eq!(back.css_class(), "flash-error");
    }
}
