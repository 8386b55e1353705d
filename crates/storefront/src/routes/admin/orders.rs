//! Order management route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::Redirect,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use harbor_commerce::{CommerceError, OrderFilter};
use harbor_core::{OrderId, OrderStatus};

use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::middleware::RequireAdmin;
use crate::models::Flash;
use crate::page::{Page, set_flash};
use crate::state::AppState;
use crate::views::OrderView;

/// Orders list page template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/orders/index.html")]
pub struct OrdersIndexTemplate {
    pub page: Page,
    pub current_path: &'static str,
    pub orders: Vec<OrderView>,
    pub statuses: [OrderStatus; 6],
    /// Name of the status being filtered on, empty for all.
    pub selected: &'static str,
}

/// Order detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/orders/show.html")]
pub struct OrderShowTemplate {
    pub page: Page,
    pub current_path: &'static str,
    pub order: OrderView,
}

/// Listing filter.
#[derive(Debug, Default, Deserialize)]
pub struct OrdersQuery {
    pub status: Option<String>,
}

/// Status change form data.
#[derive(Debug, Deserialize)]
pub struct StatusForm {
    pub status: String,
}

/// Parse the listing filter; blank means all orders.
fn parse_filter(raw: Option<&str>) -> Result<Option<OrderStatus>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => s.parse().map(Some).map_err(AppError::BadRequest),
    }
}

/// Check a requested transition against the order's current status.
fn check_transition(current: OrderStatus, next: OrderStatus) -> Result<()> {
    if current.can_transition_to(next) {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!(
            "An order that is {current} cannot become {next}"
        )))
    }
}

/// Orders list page handler.
#[instrument(skip(admin, state, page))]
pub async fn index(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    page: Page,
    Query(query): Query<OrdersQuery>,
) -> Result<OrdersIndexTemplate> {
    let currency = state.config().currency;
    let selected = parse_filter(query.status.as_deref())?;

    let mut orders = admin
        .client(&state)
        .list_orders(OrderFilter {
            status: selected,
            mine: false,
        })
        .await?;
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Ok(OrdersIndexTemplate {
        page,
        current_path: "/admin/orders",
        orders: orders
            .iter()
            .map(|order| OrderView::new(order, currency))
            .collect(),
        statuses: OrderStatus::ALL,
        selected: selected.map_or("", OrderStatus::as_str),
    })
}

/// Order detail page handler.
#[instrument(skip(admin, state, page))]
pub async fn show(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    page: Page,
    Path(id): Path<String>,
) -> Result<OrderShowTemplate> {
    let currency = state.config().currency;
    let order = admin.client(&state).get_order(&OrderId::new(id)).await?;

    Ok(OrderShowTemplate {
        page,
        current_path: "/admin/orders",
        order: OrderView::new(&order, currency),
    })
}

/// Move an order to a new status.
///
/// The transition is checked against the order's current status; an illegal
/// one is answered with 400 and the backend is never asked to change it.
#[instrument(skip(admin, state, session))]
pub async fn update_status(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    Form(form): Form<StatusForm>,
) -> Result<Redirect> {
    let next: OrderStatus = form.status.parse().map_err(AppError::BadRequest)?;
    let order_id = OrderId::new(id);
    let client = admin.client(&state);
    let back = Redirect::to(&format!("/admin/orders/{order_id}"));

    let order = client.get_order(&order_id).await?;
    check_transition(order.status, next)?;

    match client.update_order_status(&order_id, next).await {
        Ok(updated) => {
            add_breadcrumb(
                "admin",
                "order status changed",
                Some(&[("order_id", order_id.as_str()), ("status", updated.status.as_str())]),
            );
            tracing::info!(
                order_id = %order_id,
                from = %order.status,
                to = %updated.status,
                "Order status updated"
            );
            set_flash(
                &session,
                Flash::notice(format!("Order marked {}", updated.status)),
            )
            .await?;
        }
        Err(e @ (CommerceError::Rejected(_) | CommerceError::Conflict(_))) => {
            let message = e.user_message().unwrap_or_default().to_string();
            set_flash(&session, Flash::error(message)).await?;
        }
        Err(e) => return Err(e.into()),
    }

    Ok(back)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_filter() {
        assert!(matches!(parse_filter(None), Ok(None)));
        assert!(matches!(parse_filter(Some("  ")), Ok(None)));
        assert!(matches!(
            parse_filter(Some("paid")),
            Ok(Some(OrderStatus::Paid))
        ));
        assert!(matches!(
            parse_filter(Some("lost")),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_check_transition() {
        assert!(check_transition(OrderStatus::Paid, OrderStatus::Shipped).is_ok());
        assert!(matches!(
            check_transition(OrderStatus::Delivered, OrderStatus::Pending),
            Err(AppError::BadRequest(_))
        ));
    }
}
