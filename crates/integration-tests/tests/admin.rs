//! Admin access control and back-office actions.

use harbor_core::OrderStatus;
use harbor_integration_tests::{Harness, location};

#[tokio::test]
async fn test_anonymous_admin_redirects_to_login() {
    let harness = Harness::start().await;
    let response = harness.get("/admin").await;
    assert_eq!(response.status(), 303);
    assert_eq!(location(&response), "/auth/login");
}

#[tokio::test]
async fn test_customer_is_forbidden() {
    let harness = Harness::start().await;
    harness.login("ada").await;

    assert_eq!(harness.get("/admin").await.status(), 403);
    assert_eq!(harness.get("/admin/orders").await.status(), 403);
    assert_eq!(harness.backend.calls("listOrders"), 0);
}

#[tokio::test]
async fn test_admin_sees_dashboard() {
    let harness = Harness::start().await;
    harness.login("grace").await;

    let response = harness.get("/admin").await;
    assert_eq!(response.status(), 200);
    assert_eq!(harness.backend.calls("listInventory"), 1);

    let body = harness.get("/products").await.text().await.unwrap();
    assert!(body.contains(r#"href="/admin""#));
}

#[tokio::test]
async fn test_admin_catalog_bypasses_shopper_cache() {
    let harness = Harness::start().await;
    let body = harness.get("/products").await.text().await.unwrap();
    assert!(!body.contains("OLD-01"));

    harness.login("grace").await;
    let body = harness.get("/admin/products").await.text().await.unwrap();
    assert!(body.contains("OLD-01"));
    assert_eq!(harness.backend.calls("listProducts"), 2);

    // The shopper listing is still served from its own cache entry.
    let body = harness.get("/products").await.text().await.unwrap();
    assert!(!body.contains("OLD-01"));
    assert_eq!(harness.backend.calls("listProducts"), 2);
}

/// Place an order as a customer, then switch to the admin.
async fn order_then_switch_to_admin(harness: &Harness) {
    harness.login("ada").await;
    harness.add_to_cart("MUG-01", 1, "k1").await;
    harness.post_form("/checkout", &[]).await;
    harness.post_form("/auth/logout", &[]).await;
    harness.login("grace").await;
}

#[tokio::test]
async fn test_illegal_status_change_never_reaches_backend() {
    let harness = Harness::start().await;
    order_then_switch_to_admin(&harness).await;

    let response = harness
        .post_form("/admin/orders/ord-1/status", &[("status", "delivered")])
        .await;
    assert_eq!(response.status(), 400);
    assert!(
        response
            .text()
            .await
            .unwrap()
            .contains("cannot become delivered")
    );
    assert_eq!(harness.backend.calls("updateOrderStatus"), 0);

    let body = harness.get("/admin/orders/ord-1").await.text().await.unwrap();
    assert!(body.contains("pending"));
}

#[tokio::test]
async fn test_legal_status_change_is_applied() {
    let harness = Harness::start().await;
    order_then_switch_to_admin(&harness).await;

    let response = harness
        .post_form("/admin/orders/ord-1/status", &[("status", "paid")])
        .await;
    assert_eq!(location(&response), "/admin/orders/ord-1");
    assert_eq!(harness.backend.calls("updateOrderStatus"), 1);
    assert_eq!(harness.backend.orders()[0].status, OrderStatus::Paid);

    let body = harness
        .get("/admin/orders?status=paid")
        .await
        .text()
        .await
        .unwrap();
    assert!(body.contains("ord-1"));
}

#[tokio::test]
async fn test_set_inventory_quantity() {
    let harness = Harness::start().await;
    harness.login("grace").await;

    let response = harness
        .post_form("/admin/inventory/MUG-01", &[("quantity", "7")])
        .await;
    assert_eq!(location(&response), "/admin/inventory");
    assert_eq!(harness.backend.inventory("MUG-01").unwrap().quantity, 7);

    harness
        .post_form("/admin/inventory/MUG-01", &[("quantity", "-3")])
        .await;
    assert_eq!(harness.backend.calls("setInventory"), 1);
}

#[tokio::test]
async fn test_create_and_deactivate_promotion() {
    let harness = Harness::start().await;
    harness.login("grace").await;

    let response = harness
        .post_form(
            "/admin/promotions",
            &[
                ("code", "summer-25"),
                ("discount_percent", "25"),
                ("expires_at", ""),
                ("max_uses", "100"),
            ],
        )
        .await;
    assert_eq!(location(&response), "/admin/promotions");
    let promotion = harness.backend.promotion("SUMMER-25").unwrap();
    assert_eq!(promotion.discount_percent, 25);
    assert_eq!(promotion.max_uses, Some(100));

    let response = harness
        .post_form("/admin/promotions/SUMMER-25/deactivate", &[])
        .await;
    assert_eq!(location(&response), "/admin/promotions");
    assert!(!harness.backend.promotion("SUMMER-25").unwrap().active);
}

#[tokio::test]
async fn test_duplicate_promotion_rerenders_form() {
    let harness = Harness::start().await;
    harness.login("grace").await;

    let response = harness
        .post_form(
            "/admin/promotions",
            &[
                ("code", "WELCOME10"),
                ("discount_percent", "10"),
                ("expires_at", ""),
                ("max_uses", ""),
            ],
        )
        .await;
    assert_eq!(response.status(), 400);
    assert!(response.text().await.unwrap().contains("That code already exists"));
}
