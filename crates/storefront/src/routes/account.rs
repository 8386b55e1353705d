//! Account route handlers.
//!
//! These routes require a signed-in customer.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::State;
use tracing::instrument;

use harbor_commerce::OrderFilter;

use crate::error::Result;
use crate::filters;
use crate::middleware::RequireCustomer;
use crate::page::Page;
use crate::state::AppState;
use crate::views::OrderView;

/// Claims shown on the account page.
#[derive(Debug, Clone)]
pub struct AccountView {
    pub username: String,
    pub email: Option<String>,
    pub role: String,
    pub session_expires_at: String,
}

/// Account overview page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/index.html")]
pub struct AccountIndexTemplate {
    pub page: Page,
    pub account: AccountView,
}

/// Order history page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/orders.html")]
pub struct AccountOrdersTemplate {
    pub page: Page,
    pub orders: Vec<OrderView>,
}

/// Display account overview page.
#[instrument(skip_all)]
pub async fn index(RequireCustomer(user): RequireCustomer, page: Page) -> AccountIndexTemplate {
    let claims = user.claims();
    AccountIndexTemplate {
        page,
        account: AccountView {
            username: claims.username.clone(),
            email: claims.email.clone(),
            role: claims.role.to_string(),
            session_expires_at: claims.expires_at.format("%Y-%m-%d %H:%M UTC").to_string(),
        },
    }
}

/// Display the customer's order history.
#[instrument(skip_all)]
pub async fn orders(
    State(state): State<AppState>,
    RequireCustomer(user): RequireCustomer,
    page: Page,
) -> Result<AccountOrdersTemplate> {
    let currency = state.config().currency;
    let orders = user
        .client(&state)
        .list_orders(OrderFilter {
            status: None,
            mine: true,
        })
        .await?;

    Ok(AccountOrdersTemplate {
        page,
        orders: orders
            .iter()
            .map(|order| OrderView::new(order, currency))
            .collect(),
    })
}
