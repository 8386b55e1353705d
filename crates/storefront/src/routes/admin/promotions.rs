//! Promotion code management route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use harbor_commerce::PromotionInput;
use harbor_core::PromotionCode;

use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::RequireAdmin;
use crate::models::Flash;
use crate::page::{Page, set_flash};
use crate::state::AppState;
use crate::views::PromotionView;

use super::form_error;

/// Promotions list page template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/promotions/index.html")]
pub struct PromotionsIndexTemplate {
    pub page: Page,
    pub current_path: &'static str,
    pub promotions: Vec<PromotionView>,
}

/// New promotion form template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/promotions/form.html")]
pub struct PromotionFormTemplate {
    pub page: Page,
    pub current_path: &'static str,
    pub form: PromotionFormInput,
    pub error: Option<String>,
}

/// Form input for creating a promotion code. Fields are kept as text so a
/// rejected form can be shown again as typed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PromotionFormInput {
    pub code: String,
    pub discount_percent: String,
    /// `YYYY-MM-DD`; the code stays valid through the end of that day (UTC).
    #[serde(default)]
    pub expires_at: String,
    #[serde(default)]
    pub max_uses: String,
}

impl PromotionFormInput {
    /// Validate the form into a backend payload.
    fn to_input(&self, now: DateTime<Utc>) -> std::result::Result<PromotionInput, String> {
        let code = PromotionCode::parse(&self.code).map_err(|e| e.to_string())?;

        let discount_percent = match self.discount_percent.trim().parse::<u8>() {
            Ok(percent) if (1..=100).contains(&percent) => percent,
            _ => return Err("Discount must be a whole number from 1 to 100".to_string()),
        };

        let expires_at = match self.expires_at.trim() {
            "" => None,
            raw => {
                let day = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .map_err(|_| "Expiry must be a date like 2025-12-31".to_string())?;
                let at = day
                    .and_hms_opt(23, 59, 59)
                    .map(|at| at.and_utc())
                    .ok_or_else(|| "Expiry must be a date like 2025-12-31".to_string())?;
                if at <= now {
                    return Err("Expiry must be in the future".to_string());
                }
                Some(at)
            }
        };

        let max_uses = match self.max_uses.trim() {
            "" => None,
            raw => match raw.parse::<u32>() {
                Ok(uses) if uses > 0 => Some(uses),
                _ => return Err("Max uses must be a positive whole number".to_string()),
            },
        };

        Ok(PromotionInput {
            code,
            discount_percent,
            expires_at,
            max_uses,
        })
    }
}

fn form_page(page: Page, form: PromotionFormInput, error: Option<String>) -> PromotionFormTemplate {
    PromotionFormTemplate {
        page,
        current_path: "/admin/promotions",
        form,
        error,
    }
}

/// Promotions list page handler.
#[instrument(skip_all)]
pub async fn index(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    page: Page,
) -> Result<PromotionsIndexTemplate> {
    let promotions = admin.client(&state).list_promotions().await?;

    Ok(PromotionsIndexTemplate {
        page,
        current_path: "/admin/promotions",
        promotions: promotions.iter().map(PromotionView::from).collect(),
    })
}

/// New promotion form handler.
#[instrument(skip_all)]
pub async fn new_promotion(RequireAdmin(_admin): RequireAdmin, page: Page) -> PromotionFormTemplate {
    form_page(page, PromotionFormInput::default(), None)
}

/// Create promotion handler.
#[instrument(skip(admin, state, session, page))]
pub async fn create(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    page: Page,
    Form(form): Form<PromotionFormInput>,
) -> Result<Response> {
    let payload = match form.to_input(Utc::now()) {
        Ok(payload) => payload,
        Err(message) => {
            return Ok((StatusCode::BAD_REQUEST, form_page(page, form, Some(message))).into_response());
        }
    };

    match admin.client(&state).create_promotion(&payload).await {
        Ok(promotion) => {
            tracing::info!(code = %promotion.code, "Promotion created");
            set_flash(
                &session,
                Flash::notice(format!("Created promotion {}", promotion.code)),
            )
            .await?;
            Ok(Redirect::to("/admin/promotions").into_response())
        }
        Err(e) => Ok(form_error(e, |message| {
            form_page(page, form, Some(message)).into_response()
        })),
    }
}

/// Deactivate promotion handler.
#[instrument(skip(admin, state, session))]
pub async fn deactivate(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    Path(code): Path<String>,
) -> Result<Redirect> {
    let code =
        PromotionCode::parse(&code).map_err(|_| AppError::NotFound(format!("promotion {code}")))?;

    admin.client(&state).deactivate_promotion(&code).await?;
    tracing::info!(code = %code, "Promotion deactivated");
    set_flash(&session, Flash::notice(format!("Deactivated {code}"))).await?;
    Ok(Redirect::to("/admin/promotions"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn form(code: &str, percent: &str, expires: &str, max_uses: &str) -> PromotionFormInput {
        PromotionFormInput {
            code: code.to_string(),
            discount_percent: percent.to_string(),
            expires_at: expires.to_string(),
            max_uses: max_uses.to_string(),
        }
    }

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_750_000_000, 0).unwrap()
    }

    #[test]
    fn test_to_input_end_of_day_expiry() {
        let input = form("summer-10", "10", "2030-06-30", "50")
            .to_input(now())
            .unwrap();

        assert_eq!(input.code.as_str(), "SUMMER-10");
        assert_eq!(input.discount_percent, 10);
        assert_eq!(
            input.expires_at.unwrap().to_rfc3339(),
            "2030-06-30T23:59:59+00:00"
        );
        assert_eq!(input.max_uses, Some(50));
    }

    #[test]
    fn test_to_input_optional_fields_blank() {
        let input = form("WELCOME", "100", "", " ").to_input(now()).unwrap();
        assert_eq!(input.expires_at, None);
        assert_eq!(input.max_uses, None);
    }

    #[test]
    fn test_to_input_rejects_bad_values() {
        assert!(form("WELCOME", "0", "", "").to_input(now()).is_err());
        assert!(form("WELCOME", "101", "", "").to_input(now()).is_err());
        assert!(form("WELCOME", "10", "2001-01-01", "").to_input(now()).is_err());
        assert!(form("WELCOME", "10", "31/12/2030", "").to_input(now()).is_err());
        assert!(form("WELCOME", "10", "", "0").to_input(now()).is_err());
        assert!(form("no spaces!", "10", "", "").to_input(now()).is_err());
    }
}
