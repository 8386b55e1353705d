//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                          - Home page
//! GET  /health                    - Liveness check
//! GET  /health/ready              - Readiness check (commerce backend reachable)
//!
//! # Products
//! GET  /products                  - Product listing
//! GET  /products/{sku}            - Product detail
//!
//! # Cart
//! GET  /cart                      - Cart page
//! POST /cart/add                  - Add item (creates the cart on first use)
//! POST /cart/update               - Set quantity (0 removes the line)
//! POST /cart/remove               - Remove item
//! POST /cart/promotion            - Apply promotion code
//! POST /cart/promotion/remove     - Clear promotion code
//!
//! # Checkout (requires sign-in)
//! POST /checkout                  - Create order, redirect to hosted payment
//! GET  /checkout/complete         - Payment return page
//! GET  /checkout/cancel           - Payment abandoned
//!
//! # Auth (rate limited)
//! GET  /auth/login                - Login page
//! POST /auth/login                - Login action
//! GET  /auth/register             - Register page
//! POST /auth/register             - Register action
//! POST /auth/logout               - Logout action
//!
//! # Account (requires sign-in)
//! GET  /account                   - Account overview
//! GET  /account/orders            - Order history
//!
//! # Admin (requires admin role)
//! GET  /admin                                 - Dashboard
//! GET  /admin/products                        - Product list
//! GET  /admin/products/new                    - New product form
//! POST /admin/products                        - Create product
//! GET  /admin/products/{sku}/edit             - Edit product form
//! POST /admin/products/{sku}                  - Update product
//! POST /admin/products/{sku}/delete           - Delete product
//! GET  /admin/inventory                       - Stock levels
//! POST /admin/inventory/{sku}                 - Set on-hand quantity
//! GET  /admin/orders                          - Order list (?status=)
//! GET  /admin/orders/{id}                     - Order detail
//! POST /admin/orders/{id}/status              - Change order status
//! GET  /admin/promotions                      - Promotion codes
//! GET  /admin/promotions/new                  - New promotion form
//! POST /admin/promotions                      - Create promotion
//! POST /admin/promotions/{code}/deactivate    - Deactivate promotion
//! ```

pub mod account;
pub mod admin;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod home;
pub mod products;

use axum::{
    Router,
    routing::{get, post},
};

use crate::middleware::auth_rate_limiter;
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/logout", post(auth::logout))
        .layer(auth_rate_limiter())
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{sku}", get(products::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/promotion", post(cart::apply_promotion))
        .route("/promotion/remove", post(cart::remove_promotion))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(checkout::start))
        .route("/complete", get(checkout::complete))
        .route("/cancel", get(checkout::cancel))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(account::index))
        .route("/orders", get(account::orders))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(admin::dashboard::index))
        .route(
            "/products",
            get(admin::products::index).post(admin::products::create),
        )
        .route("/products/new", get(admin::products::new_product))
        .route("/products/{sku}", post(admin::products::update))
        .route("/products/{sku}/edit", get(admin::products::edit))
        .route("/products/{sku}/delete", post(admin::products::delete))
        .route("/inventory", get(admin::inventory::index))
        .route("/inventory/{sku}", post(admin::inventory::update))
        .route("/orders", get(admin::orders::index))
        .route("/orders/{id}", get(admin::orders::show))
        .route("/orders/{id}/status", post(admin::orders::update_status))
        .route(
            "/promotions",
            get(admin::promotions::index).post(admin::promotions::create),
        )
        .route("/promotions/new", get(admin::promotions::new_promotion))
        .route(
            "/promotions/{code}/deactivate",
            post(admin::promotions::deactivate),
        )
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
        .nest("/account", account_routes())
        .nest("/auth", auth_routes())
        .nest("/admin", admin_routes())
}
