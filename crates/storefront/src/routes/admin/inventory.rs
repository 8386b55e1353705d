//! Inventory management route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    response::Redirect,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use harbor_core::Sku;

use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::RequireAdmin;
use crate::models::Flash;
use crate::page::{Page, set_flash};
use crate::state::AppState;
use crate::views::InventoryView;

/// Inventory list page template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/inventory/index.html")]
pub struct InventoryIndexTemplate {
    pub page: Page,
    pub current_path: &'static str,
    pub records: Vec<InventoryView>,
}

/// Set-quantity form data.
#[derive(Debug, Deserialize)]
pub struct SetQuantityForm {
    pub quantity: String,
}

fn parse_quantity(raw: &str) -> std::result::Result<i64, String> {
    match raw.trim().parse::<i64>() {
        Ok(quantity) if quantity >= 0 => Ok(quantity),
        Ok(_) => Err("Quantity cannot be negative".to_string()),
        Err(_) => Err("Quantity must be a whole number".to_string()),
    }
}

/// Inventory list page handler.
#[instrument(skip_all)]
pub async fn index(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    page: Page,
) -> Result<InventoryIndexTemplate> {
    let mut records = admin.client(&state).list_inventory().await?;
    records.sort_by(|a, b| a.sku.as_str().cmp(b.sku.as_str()));

    Ok(InventoryIndexTemplate {
        page,
        current_path: "/admin/inventory",
        records: records.iter().map(InventoryView::from).collect(),
    })
}

/// Set the on-hand quantity for a SKU.
#[instrument(skip(admin, state, session))]
pub async fn update(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    Path(sku): Path<String>,
    Form(form): Form<SetQuantityForm>,
) -> Result<Redirect> {
    let sku = Sku::parse(&sku).map_err(|_| AppError::NotFound(format!("inventory {sku}")))?;

    let quantity = match parse_quantity(&form.quantity) {
        Ok(quantity) => quantity,
        Err(message) => {
            set_flash(&session, Flash::error(format!("{sku}: {message}"))).await?;
            return Ok(Redirect::to("/admin/inventory"));
        }
    };

    match admin.client(&state).set_inventory(&sku, quantity).await {
        Ok(record) => {
            tracing::info!(sku = %record.sku, quantity = record.quantity, "Inventory updated");
            set_flash(
                &session,
                Flash::notice(format!("{} now has {} on hand", record.sku, record.quantity)),
            )
            .await?;
        }
        Err(e) => match e.user_message() {
            Some(message) => {
                set_flash(&session, Flash::error(format!("{sku}: {message}"))).await?;
            }
            None => return Err(e.into()),
        },
    }

    Ok(Redirect::to("/admin/inventory"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity(" 12 "), Ok(12));
        assert_eq!(parse_quantity("0"), Ok(0));
        assert!(parse_quantity("-3").is_err());
        assert!(parse_quantity("lots").is_err());
    }
}
