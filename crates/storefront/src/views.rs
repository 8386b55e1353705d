//! Display models for templates.
//!
//! Backend records are converted here so templates only deal in
//! preformatted strings.

use rust_decimal::Decimal;

use harbor_commerce::{CartItem, Inventory, Order, Product, Promotion};
use harbor_core::{CurrencyCode, OrderStatus, Price};

use crate::models::CartSnapshot;

/// Format an amount in the storefront currency.
#[must_use]
pub fn money(amount: Decimal, currency: CurrencyCode) -> String {
    Price::new(amount, currency).display()
}

/// Product display data for templates.
#[derive(Debug, Clone)]
pub struct ProductView {
    pub sku: String,
    pub name: String,
    pub description: String,
    pub price: String,
    pub image_url: Option<String>,
    pub active: bool,
}

impl ProductView {
    #[must_use]
    pub fn new(product: &Product, currency: CurrencyCode) -> Self {
        Self {
            sku: product.sku.to_string(),
            name: product.name.clone(),
            description: product.description.clone(),
            price: money(product.price, currency),
            image_url: product.image_url.clone(),
            active: product.active,
        }
    }
}

/// Cart or order line display data.
#[derive(Debug, Clone)]
pub struct LineView {
    pub sku: String,
    pub name: String,
    pub quantity: u32,
    pub price: String,
    pub line_total: String,
}

impl LineView {
    #[must_use]
    pub fn new(item: &CartItem, currency: CurrencyCode) -> Self {
        Self {
            sku: item.sku.to_string(),
            name: item.name.clone(),
            quantity: item.quantity,
            price: money(item.price, currency),
            line_total: money(item.line_total(), currency),
        }
    }
}

/// Cart display data for templates.
#[derive(Debug, Clone)]
pub struct CartView {
    pub items: Vec<LineView>,
    pub total: String,
    pub item_count: u32,
    pub promotion_code: Option<String>,
}

impl CartView {
    /// Create an empty cart.
    #[must_use]
    pub fn empty(currency: CurrencyCode) -> Self {
        Self {
            items: Vec::new(),
            total: money(Decimal::ZERO, currency),
            item_count: 0,
            promotion_code: None,
        }
    }

    #[must_use]
    pub fn new(snapshot: &CartSnapshot, currency: CurrencyCode) -> Self {
        Self {
            items: snapshot
                .items
                .iter()
                .map(|item| LineView::new(item, currency))
                .collect(),
            total: money(snapshot.total(), currency),
            item_count: snapshot.item_count(),
            promotion_code: snapshot.promotion_code.as_ref().map(ToString::to_string),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Order display data for templates.
#[derive(Debug, Clone)]
pub struct OrderView {
    pub id: String,
    pub status: OrderStatus,
    pub items: Vec<LineView>,
    pub total: String,
    pub created_at: String,
    pub customer_email: Option<String>,
    pub promotion_code: Option<String>,
    /// Statuses an admin may move this order to.
    pub next_statuses: Vec<OrderStatus>,
}

impl OrderView {
    #[must_use]
    pub fn new(order: &Order, currency: CurrencyCode) -> Self {
        Self {
            id: order.id.to_string(),
            status: order.status,
            items: order
                .items
                .iter()
                .map(|item| LineView::new(item, currency))
                .collect(),
            total: money(order.total, currency),
            created_at: order.created_at.format("%Y-%m-%d %H:%M UTC").to_string(),
            customer_email: order.customer_email.clone(),
            promotion_code: order.promotion_code.as_ref().map(ToString::to_string),
            next_statuses: OrderStatus::ALL
                .into_iter()
                .filter(|next| order.status.can_transition_to(*next))
                .collect(),
        }
    }
}

/// Promotion code display data.
#[derive(Debug, Clone)]
pub struct PromotionView {
    pub code: String,
    pub discount_percent: u8,
    pub expires_at: Option<String>,
    pub uses: String,
    pub active: bool,
}

impl From<&Promotion> for PromotionView {
    fn from(promotion: &Promotion) -> Self {
        Self {
            code: promotion.code.to_string(),
            discount_percent: promotion.discount_percent,
            expires_at: promotion
                .expires_at
                .map(|at| at.format("%Y-%m-%d").to_string()),
            uses: promotion.max_uses.map_or_else(
                || promotion.uses.to_string(),
                |max| format!("{} / {max}", promotion.uses),
            ),
            active: promotion.active,
        }
    }
}

/// Inventory row display data.
#[derive(Debug, Clone)]
pub struct InventoryView {
    pub sku: String,
    pub quantity: i64,
    pub reserved: i64,
    pub available: i64,
}

impl From<&Inventory> for InventoryView {
    fn from(inventory: &Inventory) -> Self {
        Self {
            sku: inventory.sku.to_string(),
            quantity: inventory.quantity,
            reserved: inventory.reserved,
            available: inventory.available(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use harbor_core::{OrderId, Sku};

    fn item(sku: &str, price: &str, quantity: u32) -> CartItem {
        CartItem {
            sku: Sku::parse(sku).unwrap(),
            name: sku.to_lowercase(),
            price: price.parse().unwrap(),
            quantity,
        }
    }

    #[test]
    fn test_cart_view_formats_totals() {
        let snapshot = CartSnapshot {
            cart_id: harbor_core::CartId::new("c"),
            items: vec![item("MUG", "12.5", 2), item("TEE", "20", 1)],
            promotion_code: None,
        };

        let view = CartView::new(&snapshot, CurrencyCode::USD);

        assert_eq!(view.total, "$45.00");
        assert_eq!(view.item_count, 3);
        assert_eq!(view.items[0].line_total, "$25.00");
        assert_eq!(view.items[0].price, "$12.50");
    }

    #[test]
    fn test_order_view_lists_allowed_transitions() {
        let order = Order {
            id: OrderId::new("o-1"),
            status: OrderStatus::Paid,
            items: vec![item("MUG", "12.50", 1)],
            total: "12.50".parse().unwrap(),
            created_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            checkout_url: None,
            customer_email: None,
            promotion_code: None,
        };

        let view = OrderView::new(&order, CurrencyCode::USD);

        assert_eq!(
            view.next_statuses,
            vec![
                OrderStatus::Shipped,
                OrderStatus::Cancelled,
                OrderStatus::Refunded
            ]
        );
        assert_eq!(view.created_at, "2023-11-14 22:13 UTC");
    }

    #[test]
    fn test_promotion_view_shows_usage_cap() {
        let promotion = Promotion {
            code: harbor_core::PromotionCode::parse("spring").unwrap(),
            discount_percent: 15,
            expires_at: None,
            max_uses: Some(100),
            uses: 7,
            active: true,
        };
        let view = PromotionView::from(&promotion);
        assert_eq!(view.code, "SPRING");
        assert_eq!(view.uses, "7 / 100");
    }
}
