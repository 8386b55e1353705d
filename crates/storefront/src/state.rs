//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tokio::sync::Mutex;
use tower_sessions::session::Id;

use harbor_commerce::{Cart, CommerceClient, CommerceError, IdentityClient, IdentityError, TokenSet};
use harbor_core::CartId;

use crate::config::StorefrontConfig;

/// How long a mutation result is remembered under its idempotency key.
const IDEMPOTENCY_TTL: Duration = Duration::from_secs(10 * 60);
const IDEMPOTENCY_CAPACITY: u64 = 10_000;

/// Idle time after which a cart's lock is dropped.
const CART_LOCK_IDLE: Duration = Duration::from_secs(30 * 60);
const CART_LOCK_CAPACITY: u64 = 10_000;

/// How long a renewed token set is handed to requests still holding the
/// refresh token it replaced.
const RENEWAL_TTL: Duration = Duration::from_secs(60);
const RENEWAL_CAPACITY: u64 = 10_000;

type LockMap<K> = Cache<K, Arc<Mutex<()>>>;

fn lock_map<K>(idle: Duration) -> LockMap<K>
where
    K: std::hash::Hash + Eq + Send + Sync + 'static,
{
    Cache::builder()
        .max_capacity(CART_LOCK_CAPACITY)
        .time_to_idle(idle)
        .build()
}

/// Error creating application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("commerce client: {0}")]
    Commerce(#[from] CommerceError),
    #[error("identity client: {0}")]
    Identity(#[from] IdentityError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the backend clients and the in-process cart coordination maps.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    commerce: CommerceClient,
    identity: IdentityClient,
    cart_locks: LockMap<CartId>,
    idempotency: Cache<String, Cart>,
    session_locks: LockMap<Id>,
    started_carts: Cache<Id, CartId>,
    refresh_locks: LockMap<String>,
    renewals: Cache<String, TokenSet>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if either HTTP client cannot be constructed.
    pub fn new(config: StorefrontConfig) -> Result<Self, StateError> {
        let commerce = CommerceClient::new(&config.commerce)?;
        let identity = IdentityClient::new(&config.identity)?;

        let idempotency = Cache::builder()
            .max_capacity(IDEMPOTENCY_CAPACITY)
            .time_to_live(IDEMPOTENCY_TTL)
            .build();

        // A session's first cart outlives any resubmission of the form that made it.
        let started_carts = Cache::builder()
            .max_capacity(IDEMPOTENCY_CAPACITY)
            .time_to_live(IDEMPOTENCY_TTL)
            .build();

        let renewals = Cache::builder()
            .max_capacity(RENEWAL_CAPACITY)
            .time_to_live(RENEWAL_TTL)
            .build();

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                commerce,
                identity,
                cart_locks: lock_map(CART_LOCK_IDLE),
                idempotency,
                session_locks: lock_map(CART_LOCK_IDLE),
                started_carts,
                refresh_locks: lock_map(RENEWAL_TTL),
                renewals,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Anonymous commerce backend client.
    #[must_use]
    pub fn commerce(&self) -> &CommerceClient {
        &self.inner.commerce
    }

    /// Get a reference to the identity provider client.
    #[must_use]
    pub fn identity(&self) -> &IdentityClient {
        &self.inner.identity
    }

    /// The lock serializing mutations of one cart.
    pub async fn cart_lock(&self, cart_id: &CartId) -> Arc<Mutex<()>> {
        self.inner
            .cart_locks
            .get_with(cart_id.clone(), async { Arc::new(Mutex::new(())) })
            .await
    }

    /// Cart previously returned for an idempotency key.
    pub async fn remembered_mutation(&self, key: &str) -> Option<Cart> {
        self.inner.idempotency.get(key).await
    }

    /// Remember the cart a mutation produced under its idempotency key.
    pub async fn remember_mutation(&self, key: String, cart: Cart) {
        self.inner.idempotency.insert(key, cart).await;
    }

    /// The lock serializing cart creation for one session.
    pub async fn session_lock(&self, session_id: Id) -> Arc<Mutex<()>> {
        self.inner
            .session_locks
            .get_with(session_id, async { Arc::new(Mutex::new(())) })
            .await
    }

    /// Cart recently created on behalf of a session.
    ///
    /// Concurrent requests may carry a session copy loaded before the cart
    /// was mirrored into it; this is what they consult instead.
    pub async fn started_cart(&self, session_id: Id) -> Option<CartId> {
        self.inner.started_carts.get(&session_id).await
    }

    /// Record the cart created for a session.
    pub async fn record_started_cart(&self, session_id: Id, cart_id: CartId) {
        self.inner.started_carts.insert(session_id, cart_id).await;
    }

    /// Drop the record of a session's cart once it is checked out or gone.
    pub async fn forget_started_cart(&self, session_id: Id) {
        self.inner.started_carts.invalidate(&session_id).await;
    }

    /// The lock serializing refreshes of one refresh token.
    pub async fn refresh_lock(&self, refresh_token: &str) -> Arc<Mutex<()>> {
        self.inner
            .refresh_locks
            .get_with(refresh_token.to_owned(), async { Arc::new(Mutex::new(())) })
            .await
    }

    /// Token set recently issued in exchange for `refresh_token`.
    pub async fn renewed_tokens(&self, refresh_token: &str) -> Option<TokenSet> {
        self.inner.renewals.get(refresh_token).await
    }

    /// Remember the token set issued for a refresh token.
    pub async fn remember_renewal(&self, refresh_token: String, renewed: TokenSet) {
        self.inner.renewals.insert(refresh_token, renewed).await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::tests::test_config;

    fn state() -> AppState {
        AppState::new(test_config("http://127.0.0.1:9/", "http://127.0.0.1:9/")).unwrap()
    }

    #[tokio::test]
    async fn test_cart_lock_is_shared_per_cart() {
        let state = state();
        let cart = CartId::new("cart-1");

        let first = state.cart_lock(&cart).await;
        let second = state.cart_lock(&cart).await;
        let other = state.cart_lock(&CartId::new("cart-2")).await;

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
    }

    #[tokio::test]
    async fn test_remembered_mutation_round_trip() {
        let state = state();
        let cart = Cart {
            id: CartId::new("cart-1"),
            items: vec![],
            promotion_code: None,
        };

        assert!(state.remembered_mutation("cart-1:key").await.is_none());
        state.remember_mutation("cart-1:key".to_string(), cart.clone()).await;
        assert_eq!(state.remembered_mutation("cart-1:key").await, Some(cart));
    }

    #[tokio::test]
    async fn test_started_cart_is_per_session() {
        let state = state();
        let (first, second) = (Id::default(), Id::default());

        let lock = state.session_lock(first).await;
        assert!(Arc::ptr_eq(&lock, &state.session_lock(first).await));
        assert!(!Arc::ptr_eq(&lock, &state.session_lock(second).await));

        state.record_started_cart(first, CartId::new("cart-1")).await;
        assert_eq!(state.started_cart(first).await, Some(CartId::new("cart-1")));
        assert_eq!(state.started_cart(second).await, None);

        state.forget_started_cart(first).await;
        assert_eq!(state.started_cart(first).await, None);
    }
}
