//! Cart mirroring, totals, and idempotent mutations.

use harbor_integration_tests::{Harness, location};

fn only_cart(harness: &Harness) -> harbor_commerce::Cart {
    let carts = harness.backend.carts();
    assert_eq!(carts.len(), 1, "expected exactly one backend cart");
    carts.into_iter().next().unwrap()
}

#[tokio::test]
async fn test_add_mirrors_backend_cart() {
    let harness = Harness::start().await;

    let response = harness.add_to_cart("MUG-01", 2, "add-mug").await;
    assert_eq!(response.status(), 303);
    assert_eq!(location(&response), "/cart");
    harness.add_to_cart("CARD-01", 1, "add-card").await;

    let cart = only_cart(&harness);
    let lines: Vec<(&str, u32)> = cart
        .items
        .iter()
        .map(|item| (item.sku.as_str(), item.quantity))
        .collect();
    assert_eq!(lines, vec![("MUG-01", 2), ("CARD-01", 1)]);

    // The nav count comes from the session mirror, not a backend read.
    let before = harness.backend.calls("getCart");
    let body = harness.get("/products").await.text().await.unwrap();
    assert!(body.contains(r#"<span class="count">3</span>"#));
    assert_eq!(harness.backend.calls("getCart"), before);
}

#[tokio::test]
async fn test_cart_page_recomputes_total() {
    let harness = Harness::start().await;
    harness.add_to_cart("MUG-01", 2, "k1").await;
    harness.add_to_cart("CARD-01", 1, "k2").await;

    let response = harness.get("/cart").await;
    assert_eq!(response.status(), 200);
    let body = response.text().await.unwrap();
    assert!(body.contains("$29.00"));
    assert!(body.contains("$25.00"));
    assert!(body.contains("Stoneware Mug"));
}

#[tokio::test]
async fn test_resubmitted_form_applies_once() {
    let harness = Harness::start().await;
    harness.add_to_cart("MUG-01", 2, "double-click").await;
    let response = harness.add_to_cart("MUG-01", 2, "double-click").await;
    assert_eq!(response.status(), 303);

    assert_eq!(harness.backend.calls("addItem"), 1);
    assert_eq!(only_cart(&harness).items[0].quantity, 2);

    harness.add_to_cart("MUG-01", 1, "another-click").await;
    assert_eq!(harness.backend.calls("addItem"), 2);
    assert_eq!(only_cart(&harness).items[0].quantity, 3);
}

#[tokio::test]
async fn test_concurrent_first_adds_share_one_cart() {
    let harness = Harness::start().await;
    harness.login("ada").await;

    let (first, second) = tokio::join!(
        harness.add_to_cart("MUG-01", 1, "same-key"),
        harness.add_to_cart("MUG-01", 1, "same-key"),
    );
    assert_eq!(first.status(), 303);
    assert_eq!(second.status(), 303);

    assert_eq!(harness.backend.calls("createCart"), 1);
    assert_eq!(harness.backend.calls("addItem"), 1);
    assert_eq!(only_cart(&harness).items[0].quantity, 1);
}

#[tokio::test]
async fn test_concurrent_first_adds_with_distinct_keys_keep_both_lines() {
    let harness = Harness::start().await;
    harness.login("ada").await;

    tokio::join!(
        harness.add_to_cart("MUG-01", 1, "mug"),
        harness.add_to_cart("CARD-01", 2, "card"),
    );

    assert_eq!(harness.backend.calls("createCart"), 1);
    let mut lines: Vec<(String, u32)> = only_cart(&harness)
        .items
        .iter()
        .map(|item| (item.sku.as_str().to_owned(), item.quantity))
        .collect();
    lines.sort();
    assert_eq!(
        lines,
        vec![("CARD-01".to_string(), 2), ("MUG-01".to_string(), 1)]
    );
}

#[tokio::test]
async fn test_update_to_zero_removes_line() {
    let harness = Harness::start().await;
    harness.add_to_cart("MUG-01", 1, "k1").await;
    harness.add_to_cart("CARD-01", 1, "k2").await;

    let response = harness
        .post_form(
            "/cart/update",
            &[("sku", "MUG-01"), ("quantity", "0"), ("idempotency_key", "k3")],
        )
        .await;
    assert_eq!(response.status(), 303);
    assert_eq!(harness.backend.calls("removeItem"), 1);

    let cart = only_cart(&harness);
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].sku.as_str(), "CARD-01");
}

#[tokio::test]
async fn test_backend_rejection_becomes_flash() {
    let harness = Harness::start().await;
    let response = harness.add_to_cart("OLD-01", 1, "k1").await;
    assert_eq!(response.status(), 303);
    assert_eq!(location(&response), "/cart");

    let body = harness.get("/cart").await.text().await.unwrap();
    assert!(body.contains("That product is not for sale"));
}

#[tokio::test]
async fn test_unknown_sku_becomes_flash() {
    let harness = Harness::start().await;
    let response = harness.add_to_cart("GHOST-01", 1, "k1").await;
    assert_eq!(response.status(), 303);
    assert_eq!(location(&response), "/cart");

    let body = harness.get("/cart").await.text().await.unwrap();
    assert!(body.contains("That item is no longer available"));
}

#[tokio::test]
async fn test_promotion_apply_and_remove() {
    let harness = Harness::start().await;
    harness.add_to_cart("MUG-01", 1, "k1").await;

    harness
        .post_form("/cart/promotion", &[("code", "welcome10"), ("idempotency_key", "k2")])
        .await;
    let cart = only_cart(&harness);
    assert_eq!(
        cart.promotion_code.as_ref().map(harbor_core::PromotionCode::as_str),
        Some("WELCOME10")
    );

    harness
        .post_form("/cart/promotion", &[("code", "NOPE42"), ("idempotency_key", "k3")])
        .await;
    let body = harness.get("/cart").await.text().await.unwrap();
    assert!(body.contains("That promotion code is not valid"));

    harness
        .post_form("/cart/promotion/remove", &[("idempotency_key", "k4")])
        .await;
    assert!(only_cart(&harness).promotion_code.is_none());
}

#[tokio::test]
async fn test_vanished_cart_is_replaced() {
    let harness = Harness::start().await;
    harness.add_to_cart("MUG-01", 1, "k1").await;
    let first = only_cart(&harness);
    harness.backend.expire_cart(first.id.as_str());

    let response = harness.add_to_cart("CARD-01", 1, "k2").await;
    assert_eq!(response.status(), 303);
    assert_eq!(harness.backend.calls("createCart"), 2);

    let second = only_cart(&harness);
    assert_ne!(second.id, first.id);
    assert_eq!(second.items.len(), 1);
    assert_eq!(second.items[0].sku.as_str(), "CARD-01");
}

#[tokio::test]
async fn test_vanished_cart_shows_empty() {
    let harness = Harness::start().await;
    harness.add_to_cart("MUG-01", 1, "k1").await;
    harness.backend.expire_cart(only_cart(&harness).id.as_str());

    let response = harness.get("/cart").await;
    assert_eq!(response.status(), 200);
    let body = harness.get("/products").await.text().await.unwrap();
    assert!(!body.contains(r#"class="count""#));
}
