//! Checkout route handlers.
//!
//! Payment happens entirely on the provider's hosted page. The storefront
//! places the order, redirects there, and on return looks the order up to
//! decide whether the cart is finished.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use harbor_commerce::CreateOrder;
use harbor_core::OrderId;

use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::middleware::RequireCustomer;
use crate::models::{Flash, PendingOrder, session_keys};
use crate::page::{Page, set_flash};
use crate::services::cart;
use crate::state::AppState;
use crate::views::OrderView;

/// Query parameters on the payment provider's return URL.
#[derive(Debug, Deserialize)]
pub struct CompleteQuery {
    pub order: Option<String>,
}

/// Order confirmation template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/complete.html")]
pub struct CheckoutCompleteTemplate {
    pub page: Page,
    pub order: OrderView,
    pub paid: bool,
}

/// Place an order for the session's cart and redirect to the payment page.
#[instrument(skip_all)]
pub async fn start(
    State(state): State<AppState>,
    session: Session,
    RequireCustomer(user): RequireCustomer,
) -> Result<Response> {
    let client = user.client(&state);

    let Some(snapshot) = cart::current(&state, &session, &client).await? else {
        set_flash(&session, Flash::error("Your cart is empty")).await?;
        return Ok(Redirect::to("/cart").into_response());
    };
    if snapshot.is_empty() {
        set_flash(&session, Flash::error("Your cart is empty")).await?;
        return Ok(Redirect::to("/cart").into_response());
    }

    let config = state.config();
    let order = client
        .create_order(&CreateOrder {
            cart_id: snapshot.cart_id.clone(),
            success_url: config.absolute_url("/checkout/complete"),
            cancel_url: config.absolute_url("/checkout/cancel"),
        })
        .await?;

    let Some(checkout_url) = order.checkout_url.clone() else {
        return Err(AppError::Internal(format!(
            "order {} has no checkout URL",
            order.id
        )));
    };

    session
        .insert(
            session_keys::PENDING_ORDER,
            PendingOrder {
                order_id: order.id.clone(),
            },
        )
        .await?;

    add_breadcrumb("checkout", "Order placed", Some(&[("order_id", order.id.as_str())]));
    tracing::info!(order_id = %order.id, cart_id = %snapshot.cart_id, "Redirecting to payment page");

    Ok(Redirect::to(&checkout_url).into_response())
}

/// Return page after payment.
///
/// The order comes from `?order=` or, failing that, the order placed in this
/// session. Once it is paid, the cart is cleared.
#[instrument(skip(state, session, user, page))]
pub async fn complete(
    State(state): State<AppState>,
    session: Session,
    RequireCustomer(user): RequireCustomer,
    mut page: Page,
    Query(query): Query<CompleteQuery>,
) -> Result<Response> {
    let pending = session
        .get::<PendingOrder>(session_keys::PENDING_ORDER)
        .await?;

    let order_id = match (query.order.filter(|id| !id.is_empty()), pending) {
        (Some(id), _) => OrderId::new(id),
        (None, Some(pending)) => pending.order_id,
        (None, None) => return Ok(Redirect::to("/account/orders").into_response()),
    };

    let order = user.client(&state).get_order(&order_id).await?;
    let paid = order.status.is_paid();

    if paid {
        cart::forget(&state, &session).await?;
        session
            .remove::<PendingOrder>(session_keys::PENDING_ORDER)
            .await?;
        page.cart_count = 0;
        tracing::info!(order_id = %order.id, "Order paid, cart cleared");
    }

    Ok(CheckoutCompleteTemplate {
        page,
        order: OrderView::new(&order, state.config().currency),
        paid,
    }
    .into_response())
}

/// The customer backed out of the payment page.
#[instrument(skip_all)]
pub async fn cancel(session: Session) -> Result<Redirect> {
    set_flash(
        &session,
        Flash::notice("Checkout was cancelled. Your cart is still here."),
    )
    .await?;
    Ok(Redirect::to("/cart"))
}
