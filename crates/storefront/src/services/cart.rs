//! Cart synchronization.
//!
//! The commerce backend owns the cart. The session keeps a mirror of the
//! last cart it returned, replaced wholesale after each mutation. Mutations
//! of one cart run one at a time behind a per-cart lock, and each carries an
//! idempotency key so a resubmitted form is applied once. A session starts
//! at most one cart at a time, so a double-submitted first add lands in the
//! same cart and is deduplicated there.

use tower_sessions::Session;
use tracing::instrument;
use uuid::Uuid;

use harbor_commerce::{Cart, CartMutation, CommerceClient, CommerceError};
use harbor_core::CartId;

use crate::error::{AppError, Result};
use crate::models::{CartSnapshot, session_keys};
use crate::state::AppState;

/// Longest client-supplied idempotency key accepted.
const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;

/// The mirrored cart, if the session has one.
pub async fn snapshot(session: &Session) -> Option<CartSnapshot> {
    match session.get::<CartSnapshot>(session_keys::CART).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            tracing::warn!(error = %e, "Unreadable cart mirror in session");
            None
        }
    }
}

/// Replace the mirror with exactly what the backend returned.
///
/// # Errors
///
/// Returns an error if the session store cannot be written.
pub async fn store(session: &Session, cart: Cart) -> Result<CartSnapshot> {
    let snapshot = CartSnapshot::from(cart);
    session.insert(session_keys::CART, &snapshot).await?;
    Ok(snapshot)
}

/// Forget the cart (after checkout, or once the backend no longer has it).
///
/// # Errors
///
/// Returns an error if the session store cannot be written.
pub async fn forget(state: &AppState, session: &Session) -> Result<()> {
    if let Some(session_id) = session.id() {
        state.forget_started_cart(session_id).await;
    }
    session.remove::<CartSnapshot>(session_keys::CART).await?;
    Ok(())
}

/// Use the client's key when it looks sane, otherwise mint one.
#[must_use]
pub fn idempotency_key(submitted: Option<&str>) -> String {
    submitted
        .map(str::trim)
        .filter(|key| !key.is_empty() && key.len() <= MAX_IDEMPOTENCY_KEY_LEN)
        .map_or_else(|| Uuid::new_v4().to_string(), str::to_owned)
}

/// Fetch the current cart from the backend and refresh the mirror.
///
/// A cart the backend no longer knows is forgotten and `None` returned.
///
/// # Errors
///
/// Returns an error if the backend call fails for any other reason.
#[instrument(skip_all)]
pub async fn current(
    state: &AppState,
    session: &Session,
    client: &CommerceClient,
) -> Result<Option<CartSnapshot>> {
    let Some(mirror) = snapshot(session).await else {
        return Ok(None);
    };

    match client.get_cart(&mirror.cart_id).await {
        Ok(cart) => Ok(Some(store(session, cart).await?)),
        Err(CommerceError::NotFound(_)) => {
            tracing::info!(cart_id = %mirror.cart_id, "Cart no longer exists, clearing");
            forget(state, session).await?;
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Whether a mutation may start a new cart when none exists.
const fn creates_cart(mutation: &CartMutation) -> bool {
    matches!(
        mutation,
        CartMutation::AddItem { .. } | CartMutation::ApplyPromotion { .. }
    )
}

/// Apply a mutation and mirror the backend's resulting cart.
///
/// # Errors
///
/// Returns [`AppError::BadRequest`] when changing a cart that does not
/// exist, or the backend's error otherwise.
#[instrument(skip(state, session, client, key), fields(mutation = mutation.kind()))]
pub async fn mutate(
    state: &AppState,
    session: &Session,
    client: &CommerceClient,
    mutation: &CartMutation,
    key: &str,
) -> Result<CartSnapshot> {
    let cart_id = match snapshot(session).await {
        Some(mirror) => mirror.cart_id,
        None if creates_cart(mutation) => start_cart(state, session, client, None).await?,
        None => return Err(AppError::BadRequest("Your cart is empty".to_string())),
    };

    let lock = state.cart_lock(&cart_id).await;
    let guard = lock.lock().await;

    match apply(state, client, &cart_id, mutation, key).await {
        Ok(cart) => store(session, cart).await,
        Err(CommerceError::NotFound(what)) => {
            // Either the SKU or the cart is unknown; only a missing cart is recoverable.
            if !matches!(client.get_cart(&cart_id).await, Err(CommerceError::NotFound(_))) {
                return Err(AppError::NotFound(what));
            }
            tracing::info!(cart_id = %cart_id, "Cart vanished mid-session, starting a new one");
            forget(state, session).await?;
            drop(guard);
            if !creates_cart(mutation) {
                return Err(AppError::BadRequest("Your cart has expired".to_string()));
            }

            let fresh = start_cart(state, session, client, Some(&cart_id)).await?;
            let lock = state.cart_lock(&fresh).await;
            let _guard = lock.lock().await;
            let cart = apply(state, client, &fresh, mutation, key).await?;
            store(session, cart).await
        }
        Err(e) => Err(e.into()),
    }
}

/// The cart this session started, creating one if it has none.
///
/// Runs under the session's lock so concurrent first mutations share one
/// cart. `vanished` is a cart the backend no longer has and must not be
/// handed out again.
async fn start_cart(
    state: &AppState,
    session: &Session,
    client: &CommerceClient,
    vanished: Option<&CartId>,
) -> Result<CartId> {
    // A session without an id has never been saved, so no other request shares it.
    let Some(session_id) = session.id() else {
        return Ok(client.create_cart().await?.id);
    };

    let lock = state.session_lock(session_id).await;
    let _guard = lock.lock().await;

    if let Some(cart_id) = state
        .started_cart(session_id)
        .await
        .filter(|started| Some(started) != vanished)
    {
        tracing::debug!(cart_id = %cart_id, "Joining cart started by a concurrent request");
        return Ok(cart_id);
    }

    let cart_id = client.create_cart().await?.id;
    state.record_started_cart(session_id, cart_id.clone()).await;
    Ok(cart_id)
}

/// One deduplicated backend mutation. Callers hold the cart's lock.
async fn apply(
    state: &AppState,
    client: &CommerceClient,
    cart_id: &CartId,
    mutation: &CartMutation,
    key: &str,
) -> std::result::Result<Cart, CommerceError> {
    let scoped_key = format!("{cart_id}:{key}");
    if let Some(cart) = state.remembered_mutation(&scoped_key).await {
        tracing::debug!(cart_id = %cart_id, "Replaying remembered cart mutation");
        return Ok(cart);
    }

    let cart = client.mutate_cart(cart_id, mutation, key).await?;
    state.remember_mutation(scoped_key, cart.clone()).await;
    Ok(cart)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use harbor_core::{PromotionCode, Sku};

    #[test]
    fn test_idempotency_key_keeps_submitted_value() {
        assert_eq!(idempotency_key(Some(" form-key-1 ")), "form-key-1");
    }

    #[test]
    fn test_idempotency_key_replaces_empty_or_oversized() {
        let minted = idempotency_key(Some(""));
        assert_eq!(minted.len(), 36);

        let oversized = "k".repeat(MAX_IDEMPOTENCY_KEY_LEN + 1);
        assert_ne!(idempotency_key(Some(&oversized)), oversized);

        assert_ne!(idempotency_key(None), idempotency_key(None));
    }

    #[test]
    fn test_only_adds_and_promotions_create_carts() {
        let sku = Sku::parse("MUG-01").unwrap();
        assert!(creates_cart(&CartMutation::AddItem {
            sku: sku.clone(),
            quantity: 1
        }));
        assert!(creates_cart(&CartMutation::ApplyPromotion {
            code: PromotionCode::parse("SPRING").unwrap(),
        }));
        assert!(!creates_cart(&CartMutation::RemoveItem { sku }));
        assert!(!creates_cart(&CartMutation::ClearPromotion));
    }
}
