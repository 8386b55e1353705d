//! Order commands.

use harbor_commerce::OrderFilter;
use harbor_core::{OrderStatus, Price};

use super::{CliError, Connection};

/// Print orders, newest first.
///
/// # Errors
///
/// Returns an error if the status is unknown or the backend request fails.
pub async fn list(conn: &Connection, status: Option<&str>) -> Result<(), CliError> {
    let status = status
        .map(str::parse::<OrderStatus>)
        .transpose()
        .map_err(CliError::InvalidArgument)?;

    let mut orders = conn
        .client
        .list_orders(OrderFilter {
            status,
            mine: false,
        })
        .await?;
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    println!(
        "{:<28} {:<17} {:<10} {:>12}  CUSTOMER",
        "ORDER", "PLACED", "STATUS", "TOTAL"
    );
    for order in &orders {
        println!(
            "{:<28} {:<17} {:<10} {:>12}  {}",
            order.id.as_str(),
            order.created_at.format("%Y-%m-%d %H:%M").to_string(),
            order.status.as_str(),
            Price::new(order.total, conn.currency).display(),
            order.customer_email.as_deref().unwrap_or("-")
        );
    }
    tracing::info!(count = orders.len(), "Listed orders");
    Ok(())
}
