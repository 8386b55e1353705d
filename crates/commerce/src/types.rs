//! Wire types for the commerce backend.
//!
//! Field names follow the backend's camelCase JSON. Records are plain data;
//! the only derived values are cart and order totals.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use harbor_core::{CartId, OrderId, OrderStatus, PromotionCode, Sku};

// =============================================================================
// Catalog
// =============================================================================

/// A product as listed in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub sku: Sku,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

const fn default_true() -> bool {
    true
}

/// Body for creating or replacing a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    pub sku: Sku,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub active: bool,
}

// =============================================================================
// Cart
// =============================================================================

/// One line of a cart or order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub sku: Sku,
    pub name: String,
    pub price: Decimal,
    pub quantity: u32,
}

impl CartItem {
    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// A shopping cart. The backend is authoritative for its contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub id: CartId,
    #[serde(default)]
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub promotion_code: Option<PromotionCode>,
}

impl Cart {
    /// Sum of price × quantity over all items.
    #[must_use]
    pub fn total(&self) -> Decimal {
        total_of(&self.items)
    }

    /// Number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Sum of price × quantity over `items`.
#[must_use]
pub fn total_of(items: &[CartItem]) -> Decimal {
    items.iter().map(CartItem::line_total).sum()
}

/// A single change to a cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartMutation {
    /// Add `quantity` units of `sku` (merging with an existing line).
    AddItem { sku: Sku, quantity: u32 },
    /// Set the quantity of an existing line.
    UpdateItem { sku: Sku, quantity: u32 },
    /// Remove a line entirely.
    RemoveItem { sku: Sku },
    /// Attach a promotion code.
    ApplyPromotion { code: PromotionCode },
    /// Detach the promotion code.
    ClearPromotion,
}

impl CartMutation {
    /// Short name for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::AddItem { .. } => "add_item",
            Self::UpdateItem { .. } => "update_item",
            Self::RemoveItem { .. } => "remove_item",
            Self::ApplyPromotion { .. } => "apply_promotion",
            Self::ClearPromotion => "clear_promotion",
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ItemBody<'a> {
    pub sku: &'a Sku,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PromotionBody<'a> {
    pub code: &'a PromotionCode,
}

// =============================================================================
// Orders
// =============================================================================

/// An order placed from a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub status: OrderStatus,
    #[serde(default)]
    pub items: Vec<CartItem>,
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
    /// Hosted payment page for a pending order.
    #[serde(default)]
    pub checkout_url: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub promotion_code: Option<PromotionCode>,
}

/// Body for `POST /orders`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrder {
    pub cart_id: CartId,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct StatusBody {
    pub status: OrderStatus,
}

/// Filters for order listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderFilter {
    /// Only orders with this status.
    pub status: Option<OrderStatus>,
    /// Only the caller's own orders.
    pub mine: bool,
}

// =============================================================================
// Promotions
// =============================================================================

/// A promotion code as stored by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Promotion {
    pub code: PromotionCode,
    pub discount_percent: u8,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub max_uses: Option<u32>,
    #[serde(default)]
    pub uses: u32,
    #[serde(default = "default_true")]
    pub active: bool,
}

/// Body for `POST /promotion/codes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionInput {
    pub code: PromotionCode,
    pub discount_percent: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_uses: Option<u32>,
}

// =============================================================================
// Inventory
// =============================================================================

/// Stock level for one SKU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inventory {
    pub sku: Sku,
    pub quantity: i64,
    #[serde(default)]
    pub reserved: i64,
}

impl Inventory {
    /// Units that can still be sold.
    #[must_use]
    pub fn available(&self) -> i64 {
        (self.quantity - self.reserved).max(0)
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct QuantityBody {
    pub quantity: i64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn item(sku: &str, price: &str, quantity: u32) -> CartItem {
        CartItem {
            sku: Sku::parse(sku).unwrap(),
            name: sku.to_lowercase(),
            price: price.parse().unwrap(),
            quantity,
        }
    }

    #[test]
    fn test_cart_total_is_sum_of_lines() {
        let cart = Cart {
            id: CartId::new("c1"),
            items: vec![item("MUG", "12.50", 2), item("TEE", "20", 1)],
            promotion_code: None,
        };
        assert_eq!(cart.total(), "45.00".parse::<Decimal>().unwrap());
        assert_eq!(cart.item_count(), 3);
    }

    #[test]
    fn test_empty_cart_total_is_zero() {
        let cart = Cart {
            id: CartId::new("c1"),
            items: vec![],
            promotion_code: None,
        };
        assert_eq!(cart.total(), Decimal::ZERO);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_cart_deserializes_backend_shape() {
        let json = r#"{
            "id": "cart-9",
            "items": [{"sku": "MUG", "name": "Mug", "price": "9.99", "quantity": 3}],
            "promotionCode": "SPRING"
        }"#;
        let cart: Cart = serde_json::from_str(json).unwrap();
        assert_eq!(cart.id.as_str(), "cart-9");
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.total(), "29.97".parse::<Decimal>().unwrap());
        assert_eq!(cart.promotion_code.unwrap().as_str(), "SPRING");
    }

    #[test]
    fn test_inventory_available_never_negative() {
        let inv = Inventory {
            sku: Sku::parse("MUG").unwrap(),
            quantity: 2,
            reserved: 5,
        };
        assert_eq!(inv.available(), 0);
    }
}
