//! In-memory stand-in for the commerce backend and the identity provider.
//!
//! Serves the commerce REST API under `/api` and the identity endpoints
//! under `/identity` from one axum server. Every handled request is counted
//! by endpoint name so tests can assert how often the storefront called out.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    Form, Json, Router,
    extract::{Path, Query, Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use harbor_commerce::{Cart, CartItem, Inventory, Order, Product, Promotion};
use harbor_core::{CartId, OrderId, OrderStatus, PromotionCode, Sku};

use crate::PASSWORD;

/// How the identity provider answers refresh requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshMode {
    /// Issue a fresh token set.
    #[default]
    Accept,
    /// Refuse the refresh token (`invalid_grant`).
    Reject,
    /// Answer 503.
    Unavailable,
}

struct FakeUser {
    email: String,
    admin: bool,
}

struct StoredOrder {
    owner: Option<String>,
    order: Order,
}

struct FakeState {
    users: HashMap<String, FakeUser>,
    products: Vec<Product>,
    inventory: Vec<Inventory>,
    promotions: Vec<Promotion>,
    carts: HashMap<String, Cart>,
    orders: Vec<StoredOrder>,
    calls: HashMap<&'static str, usize>,
    login_token_ttl_secs: i64,
    refresh_mode: RefreshMode,
    reject_bearer: bool,
    issued: u64,
}

/// Handle to a running fake backend.
#[derive(Clone)]
pub struct FakeBackend {
    addr: SocketAddr,
    state: Arc<Mutex<FakeState>>,
}

/// Mint an unsigned id token carrying the claims the storefront reads.
#[must_use]
pub fn mint_id_token(username: &str, email: &str, admin: bool, exp: i64) -> String {
    let groups: Vec<&str> = if admin { vec!["admin"] } else { Vec::new() };
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(
        json!({
            "sub": format!("sub-{username}"),
            "cognito:username": username,
            "email": email,
            "exp": exp,
            "cognito:groups": groups,
        })
        .to_string(),
    );
    format!("{header}.{payload}.unsigned")
}

fn money(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

fn product(sku: &str, name: &str, cents: i64, active: bool) -> Product {
    Product {
        sku: Sku::parse(sku).unwrap(),
        name: name.to_string(),
        description: format!("{name} from the Harbor workshop."),
        price: money(cents),
        image_url: None,
        active,
    }
}

fn seed() -> FakeState {
    let mut users = HashMap::new();
    users.insert(
        "ada".to_string(),
        FakeUser {
            email: "ada@example.com".to_string(),
            admin: false,
        },
    );
    users.insert(
        "grace".to_string(),
        FakeUser {
            email: "grace@example.com".to_string(),
            admin: true,
        },
    );

    let products = vec![
        product("MUG-01", "Stoneware Mug", 1250, true),
        product("CARD-01", "Harbor Postcard", 400, true),
        product("OLD-01", "Retired Tote", 2000, false),
    ];
    let inventory = products
        .iter()
        .map(|p| Inventory {
            sku: p.sku.clone(),
            quantity: 20,
            reserved: 0,
        })
        .collect();

    FakeState {
        users,
        products,
        inventory,
        promotions: vec![Promotion {
            code: PromotionCode::parse("WELCOME10").unwrap(),
            discount_percent: 10,
            expires_at: None,
            max_uses: None,
            uses: 0,
            active: true,
        }],
        carts: HashMap::new(),
        orders: Vec::new(),
        calls: HashMap::new(),
        login_token_ttl_secs: 3600,
        refresh_mode: RefreshMode::Accept,
        reject_bearer: false,
        issued: 0,
    }
}

impl FakeBackend {
    /// Seed the fake and serve it on an ephemeral port.
    pub async fn start() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let backend = Self {
            addr: listener.local_addr().unwrap(),
            state: Arc::new(Mutex::new(seed())),
        };

        let app = backend.router();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        backend
    }

    /// Absolute URL on the fake for `path`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    fn record(&self, endpoint: &'static str) -> MutexGuard<'_, FakeState> {
        let mut state = self.lock();
        *state.calls.entry(endpoint).or_default() += 1;
        state
    }

    /// How many times `endpoint` was called.
    #[must_use]
    pub fn calls(&self, endpoint: &str) -> usize {
        self.lock().calls.get(endpoint).copied().unwrap_or_default()
    }

    /// Lifetime of id tokens issued at login; negative issues expired tokens.
    pub fn set_login_token_ttl(&self, seconds: i64) {
        self.lock().login_token_ttl_secs = seconds;
    }

    /// Choose how refresh requests are answered.
    pub fn set_refresh_mode(&self, mode: RefreshMode) {
        self.lock().refresh_mode = mode;
    }

    /// Answer 401 to every commerce request that carries a bearer token.
    pub fn revoke_all_tokens(&self) {
        self.lock().reject_bearer = true;
    }

    /// The backend's copy of a cart.
    #[must_use]
    pub fn cart(&self, id: &str) -> Option<Cart> {
        self.lock().carts.get(id).cloned()
    }

    /// Every cart the backend holds.
    #[must_use]
    pub fn carts(&self) -> Vec<Cart> {
        self.lock().carts.values().cloned().collect()
    }

    /// Stock record for `sku`.
    #[must_use]
    pub fn inventory(&self, sku: &str) -> Option<Inventory> {
        self.lock()
            .inventory
            .iter()
            .find(|record| record.sku.as_str() == sku)
            .cloned()
    }

    /// Promotion stored under `code`.
    #[must_use]
    pub fn promotion(&self, code: &str) -> Option<Promotion> {
        self.lock()
            .promotions
            .iter()
            .find(|promotion| promotion.code.as_str() == code)
            .cloned()
    }

    /// Drop a cart as if it had expired on the backend.
    pub fn expire_cart(&self, id: &str) {
        self.lock().carts.remove(id);
    }

    /// All orders, oldest first.
    #[must_use]
    pub fn orders(&self) -> Vec<Order> {
        self.lock().orders.iter().map(|o| o.order.clone()).collect()
    }

    /// Mark an order paid, as the payment provider's webhook would.
    pub fn mark_paid(&self, order_id: &str) {
        let mut state = self.lock();
        if let Some(stored) = state
            .orders
            .iter_mut()
            .find(|o| o.order.id.as_str() == order_id)
        {
            stored.order.status = OrderStatus::Paid;
        }
    }

    fn router(&self) -> Router {
        let api = Router::new()
            .route("/health", get(health))
            .route("/products", get(list_products))
            .route("/products/{sku}", get(get_product))
            .route("/carts", post(create_cart))
            .route("/carts/{id}", get(get_cart))
            .route("/carts/{id}/addItem", post(add_item))
            .route("/carts/{id}/updateItem", post(update_item))
            .route("/carts/{id}/removeItem", post(remove_item))
            .route(
                "/carts/{id}/promotion",
                post(apply_promotion).delete(clear_promotion),
            )
            .route("/orders", get(list_orders).post(create_order))
            .route("/orders/{id}", get(get_order))
            .route("/orders/{id}/status", put(update_order_status))
            .route("/promotion/codes", get(list_promotions).post(create_promotion))
            .route("/promotion/codes/{code}", delete(deactivate_promotion))
            .route("/inventories", get(list_inventory))
            .route("/inventories/{sku}", get(get_inventory).put(set_inventory))
            .layer(middleware::from_fn_with_state(self.clone(), bearer_gate));

        let identity = Router::new()
            .route("/oauth2/token", post(token))
            .route("/signup", post(signup))
            .route("/oauth2/revoke", post(revoke));

        Router::new()
            .nest("/api", api)
            .nest("/identity", identity)
            .with_state(self.clone())
    }

    fn issue_tokens(&self, username: &str, ttl_secs: i64) -> Option<serde_json::Value> {
        let mut state = self.lock();
        state.issued += 1;
        let n = state.issued;
        let user = state.users.get(username)?;
        let exp = Utc::now().timestamp() + ttl_secs;

        Some(json!({
            "id_token": mint_id_token(username, &user.email, user.admin, exp),
            "access_token": format!("access:{username}:{n}"),
            "refresh_token": format!("refresh:{username}:{n}"),
            "expires_in": ttl_secs,
        }))
    }
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

fn bearer_user(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?;
    token
        .strip_prefix("access:")?
        .split(':')
        .next()
        .map(str::to_owned)
}

async fn bearer_gate(State(fake): State<FakeBackend>, request: Request, next: Next) -> Response {
    let revoked = fake.lock().reject_bearer;
    if revoked && request.headers().contains_key(header::AUTHORIZATION) {
        return error(StatusCode::UNAUTHORIZED, "token revoked");
    }
    next.run(request).await
}

// ─────────────────────────────────────────────────────────────────────────────
// Identity
// ─────────────────────────────────────────────────────────────────────────────

async fn token(State(fake): State<FakeBackend>, Form(form): Form<HashMap<String, String>>) -> Response {
    let field = |name: &str| form.get(name).map(String::as_str).unwrap_or_default();

    match field("grant_type") {
        "password" => {
            let ttl = fake.record("login").login_token_ttl_secs;
            if field("password") != PASSWORD {
                return invalid_grant("Incorrect username or password.");
            }
            fake.issue_tokens(field("username"), ttl).map_or_else(
                || invalid_grant("Incorrect username or password."),
                |body| Json(body).into_response(),
            )
        }
        "refresh_token" => {
            let mode = fake.record("refresh").refresh_mode;
            match mode {
                RefreshMode::Accept => {
                    let username = field("refresh_token")
                        .strip_prefix("refresh:")
                        .and_then(|rest| rest.split(':').next())
                        .unwrap_or_default()
                        .to_string();
                    fake.issue_tokens(&username, 3600).map_or_else(
                        || invalid_grant("Invalid Refresh Token"),
                        |body| Json(body).into_response(),
                    )
                }
                RefreshMode::Reject => invalid_grant("Refresh Token has expired"),
                RefreshMode::Unavailable => {
                    StatusCode::SERVICE_UNAVAILABLE.into_response()
                }
            }
        }
        _ => invalid_grant("unsupported grant_type"),
    }
}

fn invalid_grant(description: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "invalid_grant", "error_description": description })),
    )
        .into_response()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignUpRequest {
    #[allow(dead_code)]
    client_id: String,
    username: String,
    email: String,
    password: String,
}

async fn signup(State(fake): State<FakeBackend>, Json(body): Json<SignUpRequest>) -> Response {
    let mut state = fake.record("signup");
    if state.users.contains_key(&body.username) {
        return error(StatusCode::CONFLICT, "User already exists");
    }
    if body.password.len() < 8 {
        return error(StatusCode::BAD_REQUEST, "Password did not conform with policy");
    }
    state.users.insert(
        body.username,
        FakeUser {
            email: body.email,
            admin: false,
        },
    );
    StatusCode::OK.into_response()
}

async fn revoke(State(fake): State<FakeBackend>) -> StatusCode {
    drop(fake.record("revoke"));
    StatusCode::OK
}

// ─────────────────────────────────────────────────────────────────────────────
// Catalog
// ─────────────────────────────────────────────────────────────────────────────

async fn health() -> &'static str {
    "ok"
}

/// Admins see the whole catalog; everyone else only what is for sale.
async fn list_products(State(fake): State<FakeBackend>, headers: HeaderMap) -> Json<Vec<Product>> {
    let state = fake.record("listProducts");
    let admin = bearer_user(&headers)
        .and_then(|username| state.users.get(&username).map(|user| user.admin))
        .unwrap_or(false);
    Json(
        state
            .products
            .iter()
            .filter(|p| admin || p.active)
            .cloned()
            .collect(),
    )
}

async fn get_product(State(fake): State<FakeBackend>, Path(sku): Path<String>) -> Response {
    let state = fake.record("getProduct");
    state
        .products
        .iter()
        .find(|p| p.sku.as_str() == sku)
        .map_or_else(
            || error(StatusCode::NOT_FOUND, "no such product"),
            |p| Json(p.clone()).into_response(),
        )
}

async fn list_promotions(State(fake): State<FakeBackend>) -> Json<Vec<Promotion>> {
    Json(fake.record("listPromotions").promotions.clone())
}

async fn list_inventory(State(fake): State<FakeBackend>) -> Json<Vec<Inventory>> {
    Json(fake.record("listInventory").inventory.clone())
}

async fn get_inventory(State(fake): State<FakeBackend>, Path(sku): Path<String>) -> Response {
    let state = fake.record("getInventory");
    state
        .inventory
        .iter()
        .find(|record| record.sku.as_str() == sku)
        .map_or_else(
            || error(StatusCode::NOT_FOUND, "no inventory for SKU"),
            |record| Json(record.clone()).into_response(),
        )
}

#[derive(Deserialize)]
struct QuantityRequest {
    quantity: i64,
}

async fn set_inventory(
    State(fake): State<FakeBackend>,
    Path(sku): Path<String>,
    Json(body): Json<QuantityRequest>,
) -> Response {
    let mut state = fake.record("setInventory");
    if body.quantity < 0 {
        return error(StatusCode::UNPROCESSABLE_ENTITY, "Quantity cannot be negative");
    }
    let Some(record) = state
        .inventory
        .iter_mut()
        .find(|record| record.sku.as_str() == sku)
    else {
        return error(StatusCode::NOT_FOUND, "no inventory for SKU");
    };
    record.quantity = body.quantity;
    Json(record.clone()).into_response()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromotionInputRequest {
    code: PromotionCode,
    discount_percent: u8,
    expires_at: Option<chrono::DateTime<Utc>>,
    max_uses: Option<u32>,
}

async fn create_promotion(
    State(fake): State<FakeBackend>,
    Json(body): Json<PromotionInputRequest>,
) -> Response {
    let mut state = fake.record("createPromotion");
    if state.promotions.iter().any(|p| p.code == body.code) {
        return error(StatusCode::CONFLICT, "That code already exists");
    }
    let promotion = Promotion {
        code: body.code,
        discount_percent: body.discount_percent,
        expires_at: body.expires_at,
        max_uses: body.max_uses,
        uses: 0,
        active: true,
    };
    state.promotions.push(promotion.clone());
    (StatusCode::CREATED, Json(promotion)).into_response()
}

async fn deactivate_promotion(State(fake): State<FakeBackend>, Path(code): Path<String>) -> Response {
    let mut state = fake.record("deactivatePromotion");
    match state.promotions.iter_mut().find(|p| p.code.as_str() == code) {
        Some(promotion) => {
            promotion.active = false;
            StatusCode::NO_CONTENT.into_response()
        }
        None => error(StatusCode::NOT_FOUND, "no such promotion"),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Carts
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ItemRequest {
    sku: String,
    quantity: Option<u32>,
}

#[derive(Deserialize)]
struct PromotionRequest {
    code: String,
}

async fn create_cart(State(fake): State<FakeBackend>) -> (StatusCode, Json<Cart>) {
    let mut state = fake.record("createCart");
    let cart = Cart {
        id: CartId::new(format!("cart-{}", uuid::Uuid::new_v4())),
        items: Vec::new(),
        promotion_code: None,
    };
    state.carts.insert(cart.id.as_str().to_owned(), cart.clone());
    (StatusCode::CREATED, Json(cart))
}

async fn get_cart(State(fake): State<FakeBackend>, Path(id): Path<String>) -> Response {
    let state = fake.record("getCart");
    state.carts.get(&id).map_or_else(
        || error(StatusCode::NOT_FOUND, "no such cart"),
        |cart| Json(cart.clone()).into_response(),
    )
}

/// Apply `change` to a cart and answer with the result.
fn edit_cart<F>(state: &mut FakeState, id: &str, change: F) -> Response
where
    F: FnOnce(&mut Cart, &[Product]) -> Result<(), Response>,
{
    let products = state.products.clone();
    let Some(cart) = state.carts.get_mut(id) else {
        return error(StatusCode::NOT_FOUND, "no such cart");
    };
    match change(cart, &products) {
        Ok(()) => Json(cart.clone()).into_response(),
        Err(response) => response,
    }
}

async fn add_item(
    State(fake): State<FakeBackend>,
    Path(id): Path<String>,
    Json(body): Json<ItemRequest>,
) -> Response {
    let mut state = fake.record("addItem");
    edit_cart(&mut state, &id, |cart, products| {
        let product = products
            .iter()
            .find(|p| p.sku.as_str() == body.sku)
            .ok_or_else(|| error(StatusCode::NOT_FOUND, "no such product"))?;
        if !product.active {
            return Err(error(StatusCode::UNPROCESSABLE_ENTITY, "That product is not for sale"));
        }
        let quantity = body.quantity.unwrap_or(1);
        match cart.items.iter_mut().find(|item| item.sku == product.sku) {
            Some(item) => item.quantity += quantity,
            None => cart.items.push(CartItem {
                sku: product.sku.clone(),
                name: product.name.clone(),
                price: product.price,
                quantity,
            }),
        }
        Ok(())
    })
}

async fn update_item(
    State(fake): State<FakeBackend>,
    Path(id): Path<String>,
    Json(body): Json<ItemRequest>,
) -> Response {
    let mut state = fake.record("updateItem");
    edit_cart(&mut state, &id, |cart, _| {
        let item = cart
            .items
            .iter_mut()
            .find(|item| item.sku.as_str() == body.sku)
            .ok_or_else(|| error(StatusCode::UNPROCESSABLE_ENTITY, "That item is not in the cart"))?;
        item.quantity = body.quantity.unwrap_or(item.quantity);
        Ok(())
    })
}

async fn remove_item(
    State(fake): State<FakeBackend>,
    Path(id): Path<String>,
    Json(body): Json<ItemRequest>,
) -> Response {
    let mut state = fake.record("removeItem");
    edit_cart(&mut state, &id, |cart, _| {
        cart.items.retain(|item| item.sku.as_str() != body.sku);
        Ok(())
    })
}

async fn apply_promotion(
    State(fake): State<FakeBackend>,
    Path(id): Path<String>,
    Json(body): Json<PromotionRequest>,
) -> Response {
    let mut state = fake.record("applyPromotion");
    let known = state
        .promotions
        .iter()
        .find(|p| p.code.as_str() == body.code && p.active)
        .map(|p| p.code.clone());
    edit_cart(&mut state, &id, |cart, _| {
        let code = known.ok_or_else(|| {
            error(StatusCode::UNPROCESSABLE_ENTITY, "That promotion code is not valid")
        })?;
        cart.promotion_code = Some(code);
        Ok(())
    })
}

async fn clear_promotion(State(fake): State<FakeBackend>, Path(id): Path<String>) -> Response {
    let mut state = fake.record("clearPromotion");
    edit_cart(&mut state, &id, |cart, _| {
        cart.promotion_code = None;
        Ok(())
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Orders
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderRequest {
    cart_id: String,
    #[allow(dead_code)]
    success_url: String,
    #[allow(dead_code)]
    cancel_url: String,
}

#[derive(Deserialize)]
struct OrdersQuery {
    status: Option<OrderStatus>,
    #[serde(default)]
    mine: bool,
}

#[derive(Deserialize)]
struct StatusRequest {
    status: OrderStatus,
}

async fn create_order(
    State(fake): State<FakeBackend>,
    headers: HeaderMap,
    Json(body): Json<OrderRequest>,
) -> Response {
    let owner = bearer_user(&headers);
    let mut state = fake.record("createOrder");

    let Some(cart) = state.carts.get(&body.cart_id).cloned() else {
        return error(StatusCode::NOT_FOUND, "no such cart");
    };
    if cart.items.is_empty() {
        return error(StatusCode::UNPROCESSABLE_ENTITY, "Cart is empty");
    }

    let discount = cart
        .promotion_code
        .as_ref()
        .and_then(|code| state.promotions.iter().find(|p| &p.code == code))
        .map_or(Decimal::ZERO, |p| Decimal::from(p.discount_percent));
    let subtotal = cart.total();
    let total = (subtotal - subtotal * discount / Decimal::from(100)).round_dp(2);

    let id = format!("ord-{}", state.orders.len() + 1);
    let order = Order {
        id: OrderId::new(id.clone()),
        status: OrderStatus::Pending,
        items: cart.items,
        total,
        created_at: Utc::now(),
        checkout_url: Some(format!("https://pay.example.test/session/{id}")),
        customer_email: owner
            .as_ref()
            .and_then(|name| state.users.get(name))
            .map(|user| user.email.clone()),
        promotion_code: cart.promotion_code,
    };
    state.orders.push(StoredOrder {
        owner,
        order: order.clone(),
    });
    (StatusCode::CREATED, Json(order)).into_response()
}

async fn list_orders(
    State(fake): State<FakeBackend>,
    headers: HeaderMap,
    Query(query): Query<OrdersQuery>,
) -> Json<Vec<Order>> {
    let caller = bearer_user(&headers);
    let state = fake.record("listOrders");
    Json(
        state
            .orders
            .iter()
            .filter(|stored| !query.mine || stored.owner == caller)
            .filter(|stored| query.status.is_none_or(|s| stored.order.status == s))
            .map(|stored| stored.order.clone())
            .collect(),
    )
}

async fn get_order(State(fake): State<FakeBackend>, Path(id): Path<String>) -> Response {
    let state = fake.record("getOrder");
    state
        .orders
        .iter()
        .find(|stored| stored.order.id.as_str() == id)
        .map_or_else(
            || error(StatusCode::NOT_FOUND, "no such order"),
            |stored| Json(stored.order.clone()).into_response(),
        )
}

async fn update_order_status(
    State(fake): State<FakeBackend>,
    Path(id): Path<String>,
    Json(body): Json<StatusRequest>,
) -> Response {
    let mut state = fake.record("updateOrderStatus");
    let Some(stored) = state
        .orders
        .iter_mut()
        .find(|stored| stored.order.id.as_str() == id)
    else {
        return error(StatusCode::NOT_FOUND, "no such order");
    };
    if !stored.order.status.can_transition_to(body.status) {
        return error(StatusCode::CONFLICT, "Illegal status change");
    }
    stored.order.status = body.status;
    Json(stored.order.clone()).into_response()
}
