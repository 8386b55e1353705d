//! Commerce backend REST client.
//!
//! All durable state (catalog, carts, orders, promotions, inventory) lives
//! in the backend; this client is a typed wrapper over its JSON endpoints.
//! Catalog reads are cached using `moka` (5-minute TTL) and invalidated by
//! the client's own catalog writes.

mod cache;

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest::{Method, RequestBuilder, header};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use harbor_core::{CartId, OrderId, OrderStatus, PromotionCode, Sku};

use crate::config::CommerceConfig;
use crate::error::{CommerceError, error_for_status};
use crate::types::{
    Cart, CartMutation, CreateOrder, Inventory, ItemBody, Order, OrderFilter, Product,
    ProductInput, Promotion, PromotionBody, PromotionInput, QuantityBody, StatusBody,
};

use cache::{CacheKey, CacheValue};

/// Header carrying the client-chosen key that makes a mutation idempotent.
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

const CATALOG_CACHE_TTL: Duration = Duration::from_secs(300);
const CATALOG_CACHE_CAPACITY: u64 = 1000;

// =============================================================================
// CommerceClient
// =============================================================================

/// Client for the commerce backend.
///
/// Cheap to clone. [`CommerceClient::authorized`] returns a clone that sends
/// the caller's bearer token and shares the HTTP pool. The catalog cache
/// holds what anonymous visitors see, so only anonymous clients read or
/// fill it; an authorized caller may be shown a different catalog.
#[derive(Clone)]
pub struct CommerceClient {
    inner: Arc<CommerceClientInner>,
    bearer: Option<Arc<SecretString>>,
}

struct CommerceClientInner {
    client: reqwest::Client,
    base_url: Url,
    cache: Cache<CacheKey, CacheValue>,
}

impl CommerceClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &CommerceConfig) -> Result<Self, CommerceError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("harbor-storefront/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let cache = Cache::builder()
            .max_capacity(CATALOG_CACHE_CAPACITY)
            .time_to_live(CATALOG_CACHE_TTL)
            .build();

        Ok(Self {
            inner: Arc::new(CommerceClientInner {
                client,
                base_url: crate::config::with_trailing_slash(config.base_url.clone()),
                cache,
            }),
            bearer: None,
        })
    }

    /// A clone of this client that authenticates as the holder of `token`.
    #[must_use]
    pub fn authorized(&self, token: &str) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            bearer: Some(Arc::new(SecretString::from(token.to_owned()))),
        }
    }

    /// Whether requests carry a bearer token.
    #[must_use]
    pub const fn is_authorized(&self) -> bool {
        self.bearer.is_some()
    }

    /// The catalog cache, for anonymous clients only.
    fn catalog_cache(&self) -> Option<&Cache<CacheKey, CacheValue>> {
        self.bearer.is_none().then_some(&self.inner.cache)
    }

    // =========================================================================
    // Request plumbing
    // =========================================================================

    /// Resolve path segments against the base URL, percent-encoding each.
    fn url(&self, segments: &[&str]) -> Result<Url, CommerceError> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| CommerceError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self
            .inner
            .client
            .request(method, url)
            .header(header::ACCEPT, "application/json");

        match &self.bearer {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }

    /// Send a request and return the body of a successful response.
    async fn send_raw(&self, builder: RequestBuilder, path: &str) -> Result<String, CommerceError> {
        let response = builder.send().await?;
        let status = response.status();

        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());

        let body = response.text().await?;

        if !status.is_success() {
            if status.is_server_error() {
                tracing::error!(
                    status = %status,
                    path,
                    body = %body.chars().take(500).collect::<String>(),
                    "Commerce API returned server error"
                );
            } else {
                debug!(status = %status, path, "Commerce API returned client error");
            }
            return Err(error_for_status(status, retry_after, &body, path));
        }

        Ok(body)
    }

    /// Send a request and parse the JSON response.
    async fn send<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        path: &str,
    ) -> Result<T, CommerceError> {
        let body = self.send_raw(builder, path).await?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                path,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse commerce API response"
            );
            CommerceError::Parse(e)
        })
    }

    // =========================================================================
    // Health
    // =========================================================================

    /// Check that the backend answers.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable or unhealthy.
    pub async fn ping(&self) -> Result<(), CommerceError> {
        let url = self.url(&["health"])?;
        self.send_raw(self.request(Method::GET, url), "/health")
            .await
            .map(|_| ())
    }

    // =========================================================================
    // Product Methods
    // =========================================================================

    /// List the catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Arc<Vec<Product>>, CommerceError> {
        let cache = self.catalog_cache();
        let cached = match cache {
            Some(cache) => cache.get(&CacheKey::Products).await,
            None => None,
        };
        if let Some(CacheValue::Products(products)) = cached {
            debug!("Cache hit for products");
            return Ok(products);
        }

        let url = self.url(&["products"])?;
        let products: Vec<Product> = self.send(self.request(Method::GET, url), "/products").await?;
        let products = Arc::new(products);

        if let Some(cache) = cache {
            cache
                .insert(CacheKey::Products, CacheValue::Products(Arc::clone(&products)))
                .await;
        }

        Ok(products)
    }

    /// Get a product by SKU.
    ///
    /// # Errors
    ///
    /// Returns an error if the product is not found or the API request fails.
    #[instrument(skip(self), fields(sku = %sku))]
    pub async fn get_product(&self, sku: &Sku) -> Result<Product, CommerceError> {
        let cache = self.catalog_cache();
        let key = CacheKey::Product(sku.clone());
        let cached = match cache {
            Some(cache) => cache.get(&key).await,
            None => None,
        };
        if let Some(CacheValue::Product(product)) = cached {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let path = format!("/products/{sku}");
        let url = self.url(&["products", sku.as_str()])?;
        let product: Product = self.send(self.request(Method::GET, url), &path).await?;

        if let Some(cache) = cache {
            cache
                .insert(key, CacheValue::Product(Box::new(product.clone())))
                .await;
        }

        Ok(product)
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the product or the request fails.
    #[instrument(skip(self, input), fields(sku = %input.sku))]
    pub async fn create_product(&self, input: &ProductInput) -> Result<Product, CommerceError> {
        let url = self.url(&["products"])?;
        let product: Product = self
            .send(self.request(Method::POST, url).json(input), "/products")
            .await?;
        self.invalidate_product(&input.sku).await;
        Ok(product)
    }

    /// Replace a product's fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the product does not exist or the request fails.
    #[instrument(skip(self, input), fields(sku = %sku))]
    pub async fn update_product(
        &self,
        sku: &Sku,
        input: &ProductInput,
    ) -> Result<Product, CommerceError> {
        let path = format!("/products/{sku}");
        let url = self.url(&["products", sku.as_str()])?;
        let product: Product = self
            .send(self.request(Method::PUT, url).json(input), &path)
            .await?;
        self.invalidate_product(sku).await;
        Ok(product)
    }

    /// Delete a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the product does not exist or the request fails.
    #[instrument(skip(self), fields(sku = %sku))]
    pub async fn delete_product(&self, sku: &Sku) -> Result<(), CommerceError> {
        let path = format!("/products/{sku}");
        let url = self.url(&["products", sku.as_str()])?;
        self.send_raw(self.request(Method::DELETE, url), &path)
            .await?;
        self.invalidate_product(sku).await;
        Ok(())
    }

    /// Drop a product and the catalog listing from the cache.
    pub async fn invalidate_product(&self, sku: &Sku) {
        self.inner
            .cache
            .invalidate(&CacheKey::Product(sku.clone()))
            .await;
        self.inner.cache.invalidate(&CacheKey::Products).await;
    }

    // =========================================================================
    // Cart Methods
    // =========================================================================

    /// Create an empty cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn create_cart(&self) -> Result<Cart, CommerceError> {
        let url = self.url(&["carts"])?;
        self.send(self.request(Method::POST, url), "/carts").await
    }

    /// Fetch a cart.
    ///
    /// # Errors
    ///
    /// Returns [`CommerceError::NotFound`] if the cart no longer exists.
    #[instrument(skip(self), fields(cart_id = %cart_id))]
    pub async fn get_cart(&self, cart_id: &CartId) -> Result<Cart, CommerceError> {
        let path = format!("/carts/{cart_id}");
        let url = self.url(&["carts", cart_id.as_str()])?;
        self.send(self.request(Method::GET, url), &path).await
    }

    /// Apply one mutation to a cart and return the backend's resulting cart.
    ///
    /// `idempotency_key` is forwarded so a retried submission is applied once.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the change or the request fails.
    #[instrument(skip(self, mutation), fields(cart_id = %cart_id, mutation = mutation.kind()))]
    pub async fn mutate_cart(
        &self,
        cart_id: &CartId,
        mutation: &CartMutation,
        idempotency_key: &str,
    ) -> Result<Cart, CommerceError> {
        let id = cart_id.as_str();
        let (method, segments, path): (Method, [&str; 3], String) = match mutation {
            CartMutation::AddItem { .. } => (
                Method::POST,
                ["carts", id, "addItem"],
                format!("/carts/{id}/addItem"),
            ),
            CartMutation::UpdateItem { .. } => (
                Method::POST,
                ["carts", id, "updateItem"],
                format!("/carts/{id}/updateItem"),
            ),
            CartMutation::RemoveItem { .. } => (
                Method::POST,
                ["carts", id, "removeItem"],
                format!("/carts/{id}/removeItem"),
            ),
            CartMutation::ApplyPromotion { .. } => (
                Method::POST,
                ["carts", id, "promotion"],
                format!("/carts/{id}/promotion"),
            ),
            CartMutation::ClearPromotion => (
                Method::DELETE,
                ["carts", id, "promotion"],
                format!("/carts/{id}/promotion"),
            ),
        };

        let url = self.url(&segments)?;
        let builder = self
            .request(method, url)
            .header(IDEMPOTENCY_KEY_HEADER, idempotency_key);

        let builder = match mutation {
            CartMutation::AddItem { sku, quantity } | CartMutation::UpdateItem { sku, quantity } => {
                builder.json(&ItemBody {
                    sku,
                    quantity: Some(*quantity),
                })
            }
            CartMutation::RemoveItem { sku } => builder.json(&ItemBody {
                sku,
                quantity: None,
            }),
            CartMutation::ApplyPromotion { code } => builder.json(&PromotionBody { code }),
            CartMutation::ClearPromotion => builder,
        };

        self.send(builder, &path).await
    }

    // =========================================================================
    // Order Methods
    // =========================================================================

    /// Place an order for a cart. The returned order carries the hosted
    /// payment page URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend refuses the order or the request fails.
    #[instrument(skip(self, input), fields(cart_id = %input.cart_id))]
    pub async fn create_order(&self, input: &CreateOrder) -> Result<Order, CommerceError> {
        let url = self.url(&["orders"])?;
        self.send(self.request(Method::POST, url).json(input), "/orders")
            .await
    }

    /// Fetch an order.
    ///
    /// # Errors
    ///
    /// Returns [`CommerceError::NotFound`] if the order does not exist.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(&self, order_id: &OrderId) -> Result<Order, CommerceError> {
        let path = format!("/orders/{order_id}");
        let url = self.url(&["orders", order_id.as_str()])?;
        self.send(self.request(Method::GET, url), &path).await
    }

    /// List orders, optionally filtered.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_orders(&self, filter: OrderFilter) -> Result<Vec<Order>, CommerceError> {
        let mut url = self.url(&["orders"])?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(status) = filter.status {
                query.append_pair("status", status.as_str());
            }
            if filter.mine {
                query.append_pair("mine", "true");
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }
        self.send(self.request(Method::GET, url), "/orders").await
    }

    /// Set an order's status.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend refuses the transition or the request fails.
    #[instrument(skip(self), fields(order_id = %order_id, status = %status))]
    pub async fn update_order_status(
        &self,
        order_id: &OrderId,
        status: OrderStatus,
    ) -> Result<Order, CommerceError> {
        let path = format!("/orders/{order_id}/status");
        let url = self.url(&["orders", order_id.as_str(), "status"])?;
        self.send(
            self.request(Method::PUT, url).json(&StatusBody { status }),
            &path,
        )
        .await
    }

    // =========================================================================
    // Promotion Methods
    // =========================================================================

    /// List promotion codes.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_promotions(&self) -> Result<Vec<Promotion>, CommerceError> {
        let url = self.url(&["promotion", "codes"])?;
        self.send(self.request(Method::GET, url), "/promotion/codes")
            .await
    }

    /// Create a promotion code.
    ///
    /// # Errors
    ///
    /// Returns [`CommerceError::Conflict`] if the code already exists.
    #[instrument(skip(self, input), fields(code = %input.code))]
    pub async fn create_promotion(&self, input: &PromotionInput) -> Result<Promotion, CommerceError> {
        let url = self.url(&["promotion", "codes"])?;
        self.send(
            self.request(Method::POST, url).json(input),
            "/promotion/codes",
        )
        .await
    }

    /// Deactivate a promotion code.
    ///
    /// # Errors
    ///
    /// Returns an error if the code does not exist or the request fails.
    #[instrument(skip(self), fields(code = %code))]
    pub async fn deactivate_promotion(&self, code: &PromotionCode) -> Result<(), CommerceError> {
        let path = format!("/promotion/codes/{code}");
        let url = self.url(&["promotion", "codes", code.as_str()])?;
        self.send_raw(self.request(Method::DELETE, url), &path)
            .await
            .map(|_| ())
    }

    // =========================================================================
    // Inventory Methods
    // =========================================================================

    /// List stock levels.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_inventory(&self) -> Result<Vec<Inventory>, CommerceError> {
        let url = self.url(&["inventories"])?;
        self.send(self.request(Method::GET, url), "/inventories")
            .await
    }

    /// Stock level for one SKU.
    ///
    /// # Errors
    ///
    /// Returns [`CommerceError::NotFound`] if the SKU has no inventory record.
    #[instrument(skip(self), fields(sku = %sku))]
    pub async fn get_inventory(&self, sku: &Sku) -> Result<Inventory, CommerceError> {
        let path = format!("/inventories/{sku}");
        let url = self.url(&["inventories", sku.as_str()])?;
        self.send(self.request(Method::GET, url), &path).await
    }

    /// Set the on-hand quantity for a SKU.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the quantity or the request fails.
    #[instrument(skip(self), fields(sku = %sku))]
    pub async fn set_inventory(&self, sku: &Sku, quantity: i64) -> Result<Inventory, CommerceError> {
        let path = format!("/inventories/{sku}");
        let url = self.url(&["inventories", sku.as_str()])?;
        self.send(
            self.request(Method::PUT, url).json(&QuantityBody { quantity }),
            &path,
        )
        .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(base: &str) -> CommerceClient {
        CommerceClient::new(&CommerceConfig::new(Url::parse(base).unwrap())).unwrap()
    }

    #[test]
    fn test_url_keeps_base_path_and_encodes_segments() {
        let client = client("https://api.example.com/v1");
        let url = client.url(&["carts", "a b/c", "addItem"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example.com/v1/carts/a%20b%2Fc/addItem"
        );
    }

    #[test]
    fn test_authorized_shares_inner_state() {
        let anonymous = client("https://api.example.com/");
        let user = anonymous.authorized("token-abc");
        assert!(!anonymous.is_authorized());
        assert!(user.is_authorized());
        assert!(Arc::ptr_eq(&anonymous.inner, &user.inner));
    }

    #[tokio::test]
    async fn test_invalidate_product_clears_listing() {
        let client = client("https://api.example.com/");
        let sku = Sku::parse("MUG").unwrap();
        client
            .inner
            .cache
            .insert(CacheKey::Products, CacheValue::Products(Arc::new(vec![])))
            .await;

        client.invalidate_product(&sku).await;

        assert!(client.inner.cache.get(&CacheKey::Products).await.is_none());
    }

    #[tokio::test]
    async fn test_authorized_listing_bypasses_catalog_cache() {
        // Nothing listens on the discard port, so only a cache hit succeeds.
        let anonymous = client("http://127.0.0.1:9/");
        anonymous
            .inner
            .cache
            .insert(CacheKey::Products, CacheValue::Products(Arc::new(vec![])))
            .await;

        assert!(anonymous.list_products().await.unwrap().is_empty());
        assert!(anonymous.authorized("token-abc").list_products().await.is_err());
    }
}
