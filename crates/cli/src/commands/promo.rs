//! Promotion code commands.

use chrono::{DateTime, NaiveDate, Utc};

use harbor_commerce::PromotionInput;
use harbor_core::PromotionCode;

use super::{CliError, Connection};

/// Print every promotion code.
///
/// # Errors
///
/// Returns an error if the backend request fails.
pub async fn list(conn: &Connection) -> Result<(), CliError> {
    let promotions = conn.client.list_promotions().await?;

    println!(
        "{:<16} {:>8} {:<12} {:>10}  ACTIVE",
        "CODE", "DISCOUNT", "EXPIRES", "USES"
    );
    for promotion in &promotions {
        let uses = promotion.max_uses.map_or_else(
            || promotion.uses.to_string(),
            |max| format!("{}/{max}", promotion.uses),
        );
        println!(
            "{:<16} {:>7}% {:<12} {:>10}  {}",
            promotion.code.as_str(),
            promotion.discount_percent,
            promotion
                .expires_at
                .map_or_else(|| "never".to_string(), |at| at.format("%Y-%m-%d").to_string()),
            uses,
            if promotion.active { "yes" } else { "no" }
        );
    }
    Ok(())
}

/// Create a promotion code.
///
/// # Errors
///
/// Returns an error if an argument is invalid or the backend refuses the code.
pub async fn create(
    conn: &Connection,
    code: &str,
    discount_percent: u8,
    expires: Option<&str>,
    max_uses: Option<u32>,
) -> Result<(), CliError> {
    let input = build_input(code, discount_percent, expires, max_uses)?;
    let promotion = conn.client.create_promotion(&input).await?;

    tracing::info!(code = %promotion.code, "Promotion created");
    println!(
        "Created {} ({}% off)",
        promotion.code, promotion.discount_percent
    );
    Ok(())
}

/// Deactivate a promotion code.
///
/// # Errors
///
/// Returns an error if the code is invalid or the backend request fails.
pub async fn deactivate(conn: &Connection, code: &str) -> Result<(), CliError> {
    let code = PromotionCode::parse(code).map_err(|e| CliError::InvalidArgument(e.to_string()))?;
    conn.client.deactivate_promotion(&code).await?;

    tracing::info!(code = %code, "Promotion deactivated");
    println!("Deactivated {code}");
    Ok(())
}

fn build_input(
    code: &str,
    discount_percent: u8,
    expires: Option<&str>,
    max_uses: Option<u32>,
) -> Result<PromotionInput, CliError> {
    let code = PromotionCode::parse(code).map_err(|e| CliError::InvalidArgument(e.to_string()))?;
    if !(1..=100).contains(&discount_percent) {
        return Err(CliError::InvalidArgument(
            "discount must be between 1 and 100".to_string(),
        ));
    }
    if max_uses == Some(0) {
        return Err(CliError::InvalidArgument(
            "max uses must be positive".to_string(),
        ));
    }

    Ok(PromotionInput {
        code,
        discount_percent,
        expires_at: expires.map(end_of_day).transpose()?,
        max_uses,
    })
}

/// Last second of `day` (`YYYY-MM-DD`) in UTC.
fn end_of_day(day: &str) -> Result<DateTime<Utc>, CliError> {
    NaiveDate::parse_from_str(day.trim(), "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(23, 59, 59))
        .map(|at| at.and_utc())
        .ok_or_else(|| CliError::InvalidArgument(format!("expected YYYY-MM-DD, got {day}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_build_input() {
        let input = build_input("summer-10", 10, Some("2030-08-31"), Some(500)).unwrap();
        assert_eq!(input.code.as_str(), "SUMMER-10");
        assert_eq!(
            input.expires_at.unwrap().to_rfc3339(),
            "2030-08-31T23:59:59+00:00"
        );
    }

    #[test]
    fn test_build_input_rejects_bad_arguments() {
        assert!(build_input("SUMMER", 0, None, None).is_err());
        assert!(build_input("SUMMER", 101, None, None).is_err());
        assert!(build_input("SUMMER", 10, Some("next week"), None).is_err());
        assert!(build_input("SUMMER", 10, None, Some(0)).is_err());
        assert!(build_input("x", 10, None, None).is_err());
    }
}
