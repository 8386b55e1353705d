//! Product route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::{Path, State};
use tracing::instrument;
use uuid::Uuid;

use harbor_commerce::CommerceError;
use harbor_core::Sku;

use crate::error::{AppError, Result};
use crate::filters;
use crate::page::Page;
use crate::state::AppState;
use crate::views::ProductView;

/// Product listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub page: Page,
    pub products: Vec<ProductView>,
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub page: Page,
    pub product: ProductView,
    /// Idempotency key for the add-to-cart form.
    pub form_key: String,
}

/// Display product listing page.
#[instrument(skip_all)]
pub async fn index(State(state): State<AppState>, page: Page) -> Result<ProductsIndexTemplate> {
    let currency = state.config().currency;
    let products = state.commerce().list_products().await?;

    Ok(ProductsIndexTemplate {
        page,
        products: products
            .iter()
            .filter(|product| product.active)
            .map(|product| ProductView::new(product, currency))
            .collect(),
    })
}

/// Display product detail page.
///
/// Unknown, malformed and inactive SKUs all answer 404.
#[instrument(skip(state, page))]
pub async fn show(
    State(state): State<AppState>,
    page: Page,
    Path(sku): Path<String>,
) -> Result<ProductShowTemplate> {
    let not_found = || AppError::NotFound(format!("product {sku}"));
    let parsed = Sku::parse(&sku).map_err(|_| not_found())?;

    let product = match state.commerce().get_product(&parsed).await {
        Ok(product) if product.active => product,
        Ok(_) | Err(CommerceError::NotFound(_)) => return Err(not_found()),
        Err(e) => return Err(e.into()),
    };

    Ok(ProductShowTemplate {
        page,
        product: ProductView::new(&product, state.config().currency),
        form_key: Uuid::new_v4().to_string(),
    })
}
