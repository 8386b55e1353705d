//! Product management route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use harbor_commerce::{CommerceError, Product, ProductInput};
use harbor_core::Sku;

use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::RequireAdmin;
use crate::models::Flash;
use crate::page::{Page, set_flash};
use crate::state::AppState;
use crate::views::ProductView;

use super::form_error;

/// Values shown in the product form.
#[derive(Debug, Clone, Default)]
pub struct ProductFormView {
    pub sku: String,
    pub name: String,
    pub description: String,
    pub price: String,
    pub image_url: String,
    pub active: bool,
}

impl From<&Product> for ProductFormView {
    fn from(product: &Product) -> Self {
        Self {
            sku: product.sku.to_string(),
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price.to_string(),
            image_url: product.image_url.clone().unwrap_or_default(),
            active: product.active,
        }
    }
}

impl From<&ProductFormInput> for ProductFormView {
    fn from(input: &ProductFormInput) -> Self {
        Self {
            sku: input.sku.clone().unwrap_or_default(),
            name: input.name.clone(),
            description: input.description.clone(),
            price: input.price.clone(),
            image_url: input.image_url.clone().unwrap_or_default(),
            active: input.active.is_some(),
        }
    }
}

/// Products list page template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/products/index.html")]
pub struct ProductsIndexTemplate {
    pub page: Page,
    pub current_path: &'static str,
    pub products: Vec<ProductView>,
}

/// Product create/edit form template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/products/form.html")]
pub struct ProductFormTemplate {
    pub page: Page,
    pub current_path: &'static str,
    /// `None` when creating.
    pub editing: Option<String>,
    pub product: ProductFormView,
    pub error: Option<String>,
}

/// Form input for creating/updating products.
#[derive(Debug, Deserialize)]
pub struct ProductFormInput {
    /// Absent on edit; the SKU comes from the path.
    pub sku: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: String,
    pub image_url: Option<String>,
    /// Checkbox: present when ticked.
    pub active: Option<String>,
}

impl ProductFormInput {
    /// Validate the form into a backend payload.
    fn to_input(&self, sku: Sku) -> std::result::Result<ProductInput, String> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err("Name is required".to_string());
        }
        let price = self
            .price
            .trim()
            .trim_start_matches('$')
            .parse::<Decimal>()
            .map_err(|_| "Price must be a number".to_string())?;
        if price.is_sign_negative() {
            return Err("Price cannot be negative".to_string());
        }
        let image_url = self
            .image_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_owned);
        if let Some(url) = &image_url {
            url::Url::parse(url).map_err(|_| "Image URL is not a valid URL".to_string())?;
        }

        Ok(ProductInput {
            sku,
            name: name.to_string(),
            description: self.description.trim().to_string(),
            price: price.round_dp(2),
            image_url,
            active: self.active.is_some(),
        })
    }
}

fn form_page(
    page: Page,
    editing: Option<String>,
    product: ProductFormView,
    error: Option<String>,
) -> ProductFormTemplate {
    ProductFormTemplate {
        page,
        current_path: "/admin/products",
        editing,
        product,
        error,
    }
}

fn path_sku(raw: &str) -> Result<Sku> {
    Sku::parse(raw).map_err(|_| AppError::NotFound(format!("product {raw}")))
}

/// Products list page handler.
#[instrument(skip_all)]
pub async fn index(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    page: Page,
) -> Result<ProductsIndexTemplate> {
    let currency = state.config().currency;
    let products = admin.client(&state).list_products().await?;

    Ok(ProductsIndexTemplate {
        page,
        current_path: "/admin/products",
        products: products
            .iter()
            .map(|product| ProductView::new(product, currency))
            .collect(),
    })
}

/// New product form handler.
#[instrument(skip_all)]
pub async fn new_product(RequireAdmin(_admin): RequireAdmin, page: Page) -> ProductFormTemplate {
    form_page(
        page,
        None,
        ProductFormView {
            active: true,
            ..ProductFormView::default()
        },
        None,
    )
}

/// Create product handler.
#[instrument(skip(admin, state, session, page))]
pub async fn create(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    page: Page,
    Form(input): Form<ProductFormInput>,
) -> Result<Response> {
    let view = ProductFormView::from(&input);
    let invalid = |message: String, page: Page, view: ProductFormView| {
        (StatusCode::BAD_REQUEST, form_page(page, None, view, Some(message))).into_response()
    };

    let sku = match Sku::parse(input.sku.as_deref().unwrap_or_default()) {
        Ok(sku) => sku,
        Err(e) => return Ok(invalid(format!("Invalid SKU: {e}"), page, view)),
    };
    let payload = match input.to_input(sku) {
        Ok(payload) => payload,
        Err(message) => return Ok(invalid(message, page, view)),
    };

    match admin.client(&state).create_product(&payload).await {
        Ok(product) => {
            tracing::info!(sku = %product.sku, "Product created");
            set_flash(&session, Flash::notice(format!("Created {}", product.name))).await?;
            Ok(Redirect::to("/admin/products").into_response())
        }
        Err(e) => Ok(form_error(e, |message| {
            form_page(page, None, view, Some(message)).into_response()
        })),
    }
}

/// Edit product form handler.
#[instrument(skip(admin, state, page))]
pub async fn edit(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    page: Page,
    Path(sku): Path<String>,
) -> Result<ProductFormTemplate> {
    let sku = path_sku(&sku)?;
    let product = admin.client(&state).get_product(&sku).await?;

    Ok(form_page(
        page,
        Some(sku.to_string()),
        ProductFormView::from(&product),
        None,
    ))
}

/// Update product handler.
#[instrument(skip(admin, state, session, page))]
pub async fn update(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    page: Page,
    Path(sku): Path<String>,
    Form(input): Form<ProductFormInput>,
) -> Result<Response> {
    let sku = path_sku(&sku)?;
    let editing = Some(sku.to_string());
    let mut view = ProductFormView::from(&input);
    view.sku = sku.to_string();

    let payload = match input.to_input(sku.clone()) {
        Ok(payload) => payload,
        Err(message) => {
            return Ok((
                StatusCode::BAD_REQUEST,
                form_page(page, editing, view, Some(message)),
            )
                .into_response());
        }
    };

    match admin.client(&state).update_product(&sku, &payload).await {
        Ok(product) => {
            tracing::info!(sku = %product.sku, "Product updated");
            set_flash(&session, Flash::notice(format!("Saved {}", product.name))).await?;
            Ok(Redirect::to("/admin/products").into_response())
        }
        Err(CommerceError::NotFound(what)) => Err(AppError::NotFound(what)),
        Err(e) => Ok(form_error(e, |message| {
            form_page(page, editing, view, Some(message)).into_response()
        })),
    }
}

/// Delete product handler.
#[instrument(skip(admin, state, session))]
pub async fn delete(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    Path(sku): Path<String>,
) -> Result<Redirect> {
    let sku = path_sku(&sku)?;
    admin.client(&state).delete_product(&sku).await?;
    tracing::info!(sku = %sku, "Product deleted");
    set_flash(&session, Flash::notice(format!("Deleted {sku}"))).await?;
    Ok(Redirect::to("/admin/products"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn input(name: &str, price: &str, image_url: Option<&str>) -> ProductFormInput {
        ProductFormInput {
            sku: Some("MUG-01".to_string()),
            name: name.to_string(),
            description: " Stoneware ".to_string(),
            price: price.to_string(),
            image_url: image_url.map(str::to_owned),
            active: Some("on".to_string()),
        }
    }

    #[test]
    fn test_to_input_normalizes_fields() {
        let payload = input("Mug", "$12.499", Some(""))
            .to_input(Sku::parse("MUG-01").unwrap())
            .unwrap();

        assert_eq!(payload.price, "12.50".parse::<Decimal>().unwrap());
        assert_eq!(payload.description, "Stoneware");
        assert_eq!(payload.image_url, None);
        assert!(payload.active);
    }

    #[test]
    fn test_to_input_rejects_bad_values() {
        let sku = Sku::parse("MUG-01").unwrap();
        assert!(input("", "1.00", None).to_input(sku.clone()).is_err());
        assert!(input("Mug", "free", None).to_input(sku.clone()).is_err());
        assert!(input("Mug", "-1", None).to_input(sku.clone()).is_err());
        assert!(input("Mug", "1", Some("not a url")).to_input(sku).is_err());
    }
}
