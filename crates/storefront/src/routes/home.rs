//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::State;
use tracing::instrument;

use crate::error::Result;
use crate::filters;
use crate::page::Page;
use crate::state::AppState;
use crate::views::ProductView;

/// Number of products featured on the home page.
const FEATURED_COUNT: usize = 8;

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub page: Page,
    pub featured: Vec<ProductView>,
}

/// Display the home page.
///
/// A catalog outage degrades to an empty featured list rather than an error
/// page.
#[instrument(skip_all)]
pub async fn home(State(state): State<AppState>, page: Page) -> Result<HomeTemplate> {
    let currency = state.config().currency;
    let featured = match state.commerce().list_products().await {
        Ok(products) => products
            .iter()
            .filter(|product| product.active)
            .take(FEATURED_COUNT)
            .map(|product| ProductView::new(product, currency))
            .collect(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load featured products");
            Vec::new()
        }
    };

    Ok(HomeTemplate { page, featured })
}
