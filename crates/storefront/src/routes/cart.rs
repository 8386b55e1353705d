//! Cart route handlers.
//!
//! The cart id and the mirrored contents live in the session. Every form
//! carries an idempotency key so a double-submitted form changes the cart
//! once.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;
use uuid::Uuid;

use harbor_commerce::CartMutation;
use harbor_core::{PromotionCode, Sku};

use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::middleware::MaybeUser;
use crate::models::Flash;
use crate::page::{Page, set_flash};
use crate::services::cart;
use crate::state::AppState;
use crate::views::CartView;

/// Largest quantity accepted for one line.
pub const MAX_QUANTITY: u32 = 99;

// =============================================================================
// Form Types
// =============================================================================

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub sku: String,
    pub quantity: Option<u32>,
    pub idempotency_key: Option<String>,
}

/// Update cart form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub sku: String,
    pub quantity: u32,
    pub idempotency_key: Option<String>,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub sku: String,
    pub idempotency_key: Option<String>,
}

/// Promotion code form data.
#[derive(Debug, Deserialize)]
pub struct PromotionForm {
    pub code: String,
    pub idempotency_key: Option<String>,
}

/// Form data for actions with no other fields.
#[derive(Debug, Deserialize)]
pub struct KeyOnlyForm {
    pub idempotency_key: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub page: Page,
    pub cart: CartView,
    /// Fresh idempotency key per rendered form.
    pub form_keys: FormKeys,
}

/// Mints one idempotency key per form on the cart page.
pub struct FormKeys;

impl FormKeys {
    /// Mint a key for the next form.
    #[must_use]
    pub fn mint(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

// =============================================================================
// Validation
// =============================================================================

fn parse_sku(raw: &str) -> Result<Sku> {
    Sku::parse(raw).map_err(|e| AppError::BadRequest(format!("Invalid SKU: {e}")))
}

fn check_quantity(quantity: u32) -> Result<u32> {
    if (1..=MAX_QUANTITY).contains(&quantity) {
        Ok(quantity)
    } else {
        Err(AppError::BadRequest(format!(
            "Quantity must be between 1 and {MAX_QUANTITY}"
        )))
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Display cart page.
///
/// Refreshes the mirror from the backend; a cart the backend lost is shown
/// as empty.
#[instrument(skip_all)]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    user: MaybeUser,
    mut page: Page,
) -> Result<CartShowTemplate> {
    let currency = state.config().currency;
    let client = user.client(&state);

    let cart = match cart::current(&state, &session, &client).await? {
        Some(snapshot) => {
            page.cart_count = snapshot.item_count();
            CartView::new(&snapshot, currency)
        }
        None => {
            page.cart_count = 0;
            CartView::empty(currency)
        }
    };

    Ok(CartShowTemplate {
        page,
        cart,
        form_keys: FormKeys,
    })
}

/// Apply a mutation and send the visitor back to the cart.
async fn mutate_and_redirect(
    state: &AppState,
    session: &Session,
    user: &MaybeUser,
    mutation: CartMutation,
    submitted_key: Option<&str>,
) -> Result<Response> {
    let key = cart::idempotency_key(submitted_key);
    let client = user.client(state);

    match cart::mutate(state, session, &client, &mutation, &key).await {
        Ok(snapshot) => {
            add_breadcrumb(
                "cart",
                mutation.kind(),
                Some(&[("cart_id", snapshot.cart_id.as_str())]),
            );
            Ok(Redirect::to("/cart").into_response())
        }
        Err(AppError::Commerce(e)) if e.user_message().is_some() => {
            let message = e.user_message().unwrap_or_default().to_string();
            set_flash(session, Flash::error(message)).await?;
            Ok(Redirect::to("/cart").into_response())
        }
        Err(AppError::BadRequest(message)) => {
            set_flash(session, Flash::error(message)).await?;
            Ok(Redirect::to("/cart").into_response())
        }
        Err(AppError::NotFound(what)) => {
            tracing::info!(what = %what, "Cart mutation named something the backend does not have");
            set_flash(session, Flash::error("That item is no longer available")).await?;
            Ok(Redirect::to("/cart").into_response())
        }
        Err(e) => Err(e),
    }
}

/// Add item to cart.
///
/// Creates a new cart if one doesn't exist.
#[instrument(skip(state, session, user))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    user: MaybeUser,
    Form(form): Form<AddToCartForm>,
) -> Result<Response> {
    let mutation = CartMutation::AddItem {
        sku: parse_sku(&form.sku)?,
        quantity: check_quantity(form.quantity.unwrap_or(1))?,
    };
    mutate_and_redirect(&state, &session, &user, mutation, form.idempotency_key.as_deref()).await
}

/// Update cart item quantity. A quantity of zero removes the line.
#[instrument(skip(state, session, user))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    user: MaybeUser,
    Form(form): Form<UpdateCartForm>,
) -> Result<Response> {
    let sku = parse_sku(&form.sku)?;
    let mutation = if form.quantity == 0 {
        CartMutation::RemoveItem { sku }
    } else {
        CartMutation::UpdateItem {
            sku,
            quantity: check_quantity(form.quantity)?,
        }
    };
    mutate_and_redirect(&state, &session, &user, mutation, form.idempotency_key.as_deref()).await
}

/// Remove item from cart.
#[instrument(skip(state, session, user))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    user: MaybeUser,
    Form(form): Form<RemoveFromCartForm>,
) -> Result<Response> {
    let mutation = CartMutation::RemoveItem {
        sku: parse_sku(&form.sku)?,
    };
    mutate_and_redirect(&state, &session, &user, mutation, form.idempotency_key.as_deref()).await
}

/// Apply a promotion code.
#[instrument(skip(state, session, user))]
pub async fn apply_promotion(
    State(state): State<AppState>,
    session: Session,
    user: MaybeUser,
    Form(form): Form<PromotionForm>,
) -> Result<Response> {
    let code = match PromotionCode::parse(&form.code) {
        Ok(code) => code,
        Err(e) => {
            set_flash(&session, Flash::error(format!("Invalid promotion code: {e}"))).await?;
            return Ok(Redirect::to("/cart").into_response());
        }
    };
    let mutation = CartMutation::ApplyPromotion { code };
    mutate_and_redirect(&state, &session, &user, mutation, form.idempotency_key.as_deref()).await
}

/// Remove the promotion code.
#[instrument(skip(state, session, user))]
pub async fn remove_promotion(
    State(state): State<AppState>,
    session: Session,
    user: MaybeUser,
    Form(form): Form<KeyOnlyForm>,
) -> Result<Response> {
    mutate_and_redirect(
        &state,
        &session,
        &user,
        CartMutation::ClearPromotion,
        form.idempotency_key.as_deref(),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_quantity_bounds() {
        assert!(check_quantity(0).is_err());
        assert!(check_quantity(1).is_ok());
        assert!(check_quantity(MAX_QUANTITY).is_ok());
        assert!(check_quantity(MAX_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_parse_sku_rejects_garbage() {
        assert!(matches!(parse_sku("bad sku!"), Err(AppError::BadRequest(_))));
        assert!(parse_sku("MUG-01").is_ok());
    }

    #[test]
    fn test_form_keys_are_distinct() {
        assert_ne!(FormKeys.mint(), FormKeys.mint());
    }
}
