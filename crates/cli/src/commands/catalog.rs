//! Catalog and inventory commands.

use harbor_core::{Price, Sku};

use super::{CliError, Connection};

/// Print every product.
///
/// # Errors
///
/// Returns an error if the backend request fails.
pub async fn list_products(conn: &Connection) -> Result<(), CliError> {
    let products = conn.client.list_products().await?;

    println!("{:<24} {:<32} {:>12}  ACTIVE", "SKU", "NAME", "PRICE");
    for product in products.iter() {
        println!(
            "{:<24} {:<32} {:>12}  {}",
            product.sku.as_str(),
            truncate(&product.name, 32),
            Price::new(product.price, conn.currency).display(),
            if product.active { "yes" } else { "no" }
        );
    }
    tracing::info!(count = products.len(), "Listed products");
    Ok(())
}

/// Print stock levels.
///
/// # Errors
///
/// Returns an error if the backend request fails.
pub async fn list_inventory(conn: &Connection) -> Result<(), CliError> {
    let mut records = conn.client.list_inventory().await?;
    records.sort_by(|a, b| a.sku.as_str().cmp(b.sku.as_str()));

    println!("{:<24} {:>8} {:>8} {:>9}", "SKU", "ON HAND", "RESERVED", "AVAILABLE");
    for record in &records {
        println!(
            "{:<24} {:>8} {:>8} {:>9}",
            record.sku.as_str(),
            record.quantity,
            record.reserved,
            record.available()
        );
    }
    Ok(())
}

/// Set the on-hand quantity for a SKU.
///
/// # Errors
///
/// Returns an error if the SKU or quantity is invalid or the backend refuses it.
pub async fn set_inventory(conn: &Connection, sku: &str, quantity: i64) -> Result<(), CliError> {
    let sku = Sku::parse(sku).map_err(|e| CliError::InvalidArgument(e.to_string()))?;
    if quantity < 0 {
        return Err(CliError::InvalidArgument(
            "quantity cannot be negative".to_string(),
        ));
    }

    let record = conn.client.set_inventory(&sku, quantity).await?;
    tracing::info!(sku = %record.sku, quantity = record.quantity, "Inventory updated");
    println!("{} now has {} on hand", record.sku, record.quantity);
    Ok(())
}

/// Cut `s` to at most `max` characters for column output.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Mug", 32), "Mug");
        assert_eq!(truncate("Stoneware mug", 5), "Ston…");
    }
}
