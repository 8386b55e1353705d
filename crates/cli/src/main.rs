//! Harbor CLI - operator tools over the commerce backend.
//!
//! # Usage
//!
//! ```bash
//! # Decode an id token without verifying it
//! harbor-cli token inspect eyJhbGciOi...
//!
//! # List the catalog
//! harbor-cli products list
//!
//! # Manage promotion codes
//! harbor-cli promo list
//! harbor-cli promo create SUMMER-10 --discount 10 --expires 2030-08-31 --max-uses 500
//! harbor-cli promo deactivate SUMMER-10
//!
//! # Set stock on hand
//! harbor-cli inventory set MUG-01 40
//!
//! # List orders awaiting shipment
//! harbor-cli orders list --status paid
//! ```
//!
//! # Authentication
//!
//! Commands that reach the backend need an admin bearer token: pass
//! `--token`, or set `HARBOR_USERNAME` and `HARBOR_PASSWORD` to sign in
//! through the identity provider.

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::print_stdout)]

use clap::{Parser, Subcommand};

mod commands;

use commands::{CliError, Connection};

#[derive(Parser)]
#[command(name = "harbor-cli")]
#[command(author, version, about = "Harbor operator tools")]
struct Cli {
    /// Bearer token to use instead of signing in
    #[arg(long, global = true, env = "HARBOR_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect identity tokens
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
    /// Browse the catalog
    Products {
        #[command(subcommand)]
        action: ProductsAction,
    },
    /// Manage promotion codes
    Promo {
        #[command(subcommand)]
        action: PromoAction,
    },
    /// Manage stock levels
    Inventory {
        #[command(subcommand)]
        action: InventoryAction,
    },
    /// Browse orders
    Orders {
        #[command(subcommand)]
        action: OrdersAction,
    },
}

#[derive(Subcommand)]
enum TokenAction {
    /// Print the claims carried by an id token (no signature check)
    Inspect {
        /// The id token
        id_token: String,
    },
}

#[derive(Subcommand)]
enum ProductsAction {
    /// List all products
    List,
}

#[derive(Subcommand)]
enum PromoAction {
    /// List promotion codes
    List,
    /// Create a promotion code
    Create {
        /// The code customers type
        code: String,

        /// Percentage off (1-100)
        #[arg(short, long)]
        discount: u8,

        /// Last valid day, `YYYY-MM-DD` (UTC)
        #[arg(short, long)]
        expires: Option<String>,

        /// Redemption cap
        #[arg(short, long)]
        max_uses: Option<u32>,
    },
    /// Deactivate a promotion code
    Deactivate {
        /// The code to deactivate
        code: String,
    },
}

#[derive(Subcommand)]
enum InventoryAction {
    /// List stock levels
    List,
    /// Set the on-hand quantity for a SKU
    Set {
        /// Product SKU
        sku: String,
        /// New on-hand quantity
        quantity: i64,
    },
}

#[derive(Subcommand)]
enum OrdersAction {
    /// List orders
    List {
        /// Only orders with this status
        #[arg(short, long)]
        status: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "harbor_cli=info,harbor_commerce=warn".into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    if let Commands::Token {
        action: TokenAction::Inspect { id_token },
    } = &cli.command
    {
        return commands::token::inspect(id_token);
    }

    let conn = Connection::from_env(cli.token).await?;

    match cli.command {
        Commands::Token { .. } => {}
        Commands::Products {
            action: ProductsAction::List,
        } => commands::catalog::list_products(&conn).await?,
        Commands::Promo { action } => match action {
            PromoAction::List => commands::promo::list(&conn).await?,
            PromoAction::Create {
                code,
                discount,
                expires,
                max_uses,
            } => {
                commands::promo::create(&conn, &code, discount, expires.as_deref(), max_uses)
                    .await?;
            }
            PromoAction::Deactivate { code } => commands::promo::deactivate(&conn, &code).await?,
        },
        Commands::Inventory { action } => match action {
            InventoryAction::List => commands::catalog::list_inventory(&conn).await?,
            InventoryAction::Set { sku, quantity } => {
                commands::catalog::set_inventory(&conn, &sku, quantity).await?;
            }
        },
        Commands::Orders {
            action: OrdersAction::List { status },
        } => commands::orders::list(&conn, status.as_deref()).await?,
    }
    Ok(())
}
