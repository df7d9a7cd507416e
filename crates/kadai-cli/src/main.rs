use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "kadai")]
#[command(about = "namma-kadai storefront operator CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> site -> local ...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Catalog maintenance
    Products {
        #[command(subcommand)]
        cmd: ProductsCmd,
    },

    /// Order review and admin actions
    Orders {
        #[command(subcommand)]
        cmd: OrdersCmd,
    },

    /// Relay delivery positions read from stdin ("lat,lng" per line) to the daemon
    Relay {
        /// Order id to relay for
        #[arg(long)]
        order_id: String,

        /// Daemon base URL (defaults to http://<server.addr>)
        #[arg(long)]
        url: Option<String>,
    },

    /// Audit trail utilities
    Audit {
        #[command(subcommand)]
        cmd: AuditCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,
    /// Apply SQL migrations.
    Migrate,
}

#[derive(Subcommand)]
enum ProductsCmd {
    /// List products, newest first
    List,

    /// Create a product (uploads the image through the configured object store)
    Add {
        #[arg(long)]
        name: String,

        #[arg(long)]
        description: String,

        /// Price in rupees, e.g. 120.50
        #[arg(long)]
        price: f64,

        /// Path to the product image
        #[arg(long)]
        image: String,
    },

    /// Delete a product record (the stored image is kept)
    Delete {
        #[arg(long)]
        id: String,
    },
}

#[derive(Subcommand)]
enum OrdersCmd {
    /// List orders in a review queue
    List {
        /// payments | fulfillment | all
        #[arg(long, default_value = "all")]
        queue: String,
    },

    /// Print the actions an order's current status offers
    Actions {
        #[arg(long)]
        id: String,
    },

    /// Apply one admin action (approve_payment, reject_payment, approve, reject,
    /// dispatch, mark_delivered)
    Apply {
        #[arg(long)]
        id: String,

        #[arg(long)]
        action: String,

        /// Recorded in the audit trail
        #[arg(long, default_value = "cli")]
        actor: String,
    },
}

#[derive(Subcommand)]
enum AuditCmd {
    /// Verify the transition log hash chain
    Verify {
        /// Log path (defaults to audit.path from config)
        #[arg(long)]
        path: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let pool = commands::connect_db().await?;
            match cmd {
                DbCmd::Status => {
                    let s = kadai_db::status(&pool).await?;
                    println!(
                        "db_ok={} has_products_table={} has_orders_table={}",
                        s.ok, s.has_products_table, s.has_orders_table
                    );
                }
                DbCmd::Migrate => {
                    kadai_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = kadai_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Products { cmd } => match cmd {
            ProductsCmd::List => commands::catalog::list().await?,
            ProductsCmd::Add {
                name,
                description,
                price,
                image,
            } => commands::catalog::add(name, description, price, image).await?,
            ProductsCmd::Delete { id } => commands::catalog::delete(&id).await?,
        },

        Commands::Orders { cmd } => match cmd {
            OrdersCmd::List { queue } => commands::orders::list(&queue).await?,
            OrdersCmd::Actions { id } => commands::orders::actions(&id).await?,
            OrdersCmd::Apply { id, action, actor } => {
                commands::orders::apply(&id, &action, &actor).await?
            }
        },

        Commands::Relay { order_id, url } => commands::relay::run(order_id, url).await?,

        Commands::Audit { cmd } => match cmd {
            AuditCmd::Verify { path } => commands::audit_verify(path)?,
        },
    }

    Ok(())
}

/// Logs go to stderr so stdout stays `key=value` lines.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();
}
