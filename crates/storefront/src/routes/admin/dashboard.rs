//! Admin dashboard.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::State;
use tracing::instrument;

use harbor_commerce::OrderFilter;
use harbor_core::OrderStatus;

use crate::error::Result;
use crate::filters;
use crate::middleware::RequireAdmin;
use crate::page::Page;
use crate::state::AppState;

/// Stock at or below this level is flagged on the dashboard.
const LOW_STOCK_THRESHOLD: i64 = 5;

/// Headline numbers for the dashboard.
#[derive(Debug, Clone, Default)]
pub struct DashboardStats {
    pub product_count: usize,
    pub pending_orders: usize,
    pub paid_orders: usize,
    pub active_promotions: usize,
    pub low_stock: Vec<String>,
}

/// Dashboard page template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/dashboard.html")]
pub struct DashboardTemplate {
    pub page: Page,
    pub current_path: &'static str,
    pub stats: DashboardStats,
}

/// Dashboard page handler.
#[instrument(skip_all)]
pub async fn index(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    page: Page,
) -> Result<DashboardTemplate> {
    let client = admin.client(&state);

    let (products, orders, promotions, inventory) = tokio::try_join!(
        client.list_products(),
        client.list_orders(OrderFilter::default()),
        client.list_promotions(),
        client.list_inventory(),
    )?;

    let count_status = |status: OrderStatus| orders.iter().filter(|o| o.status == status).count();

    let stats = DashboardStats {
        product_count: products.len(),
        pending_orders: count_status(OrderStatus::Pending),
        paid_orders: count_status(OrderStatus::Paid),
        active_promotions: promotions.iter().filter(|p| p.active).count(),
        low_stock: inventory
            .iter()
            .filter(|record| record.available() <= LOW_STOCK_THRESHOLD)
            .map(|record| record.sku.to_string())
            .collect(),
    };

    Ok(DashboardTemplate {
        page,
        current_path: "/admin",
        stats,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_dashboard_renders_inside_site_and_admin_layouts() {
        let html = DashboardTemplate {
            page: Page::default(),
            current_path: "/admin",
            stats: DashboardStats {
                low_stock: vec!["MUG-01".to_string()],
                ..DashboardStats::default()
            },
        }
        .render()
        .unwrap();

        assert!(html.contains(r#"<header class="site-header">"#));
        assert!(html.contains(r#"<nav class="admin-nav">"#));
        assert!(html.contains(r#"<a href="/admin" class="active">Dashboard</a>"#));
        assert!(html.contains("/admin/inventory#MUG-01"));
    }
}
