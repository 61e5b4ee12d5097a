use anyhow::Result;
use clap::{Parser, Subcommand};
use olc_schemas::OrderId;

mod commands;

#[derive(Parser)]
#[command(name = "olc")]
#[command(about = "Order lookup cache operator CLI", long_about = None)]
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
        /// Paths in merge order (base -> overlays)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Persisted cache state
    Cache {
        #[command(subcommand)]
        cmd: CacheCmd,
    },

    /// Order lookups straight from the store (never through a cache)
    Order {
        #[command(subcommand)]
        cmd: OrderCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,

    /// Apply SQL migrations.
    Migrate,
}

#[derive(Subcommand)]
enum CacheCmd {
    /// Print the snapshot the daemon would restore on its next start.
    Inspect {
        /// Capacity to restore into (defaults to the configured cache size)
        #[arg(long)]
        capacity: Option<usize>,
    },

    /// Delete all persisted cache membership. The next daemon start is cold.
    Clear {
        /// Acknowledge that the next start loses its warm cache.
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum OrderCmd {
    /// Print one order as the lookup API would render it.
    Get {
        id: OrderId,

        /// Print the full stored record instead of the public view
        #[arg(long, default_value_t = false)]
        raw: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let (_cfg, pool) = commands::connect().await?;
            match cmd {
                DbCmd::Status => {
                    let s = olc_db::status(&pool).await?;
                    println!(
                        "db_ok={} has_orders_table={} has_cache_membership_table={}",
                        s.ok, s.has_orders_table, s.has_cache_membership_table
                    );
                }
                DbCmd::Migrate => {
                    olc_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = olc_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Cache { cmd } => match cmd {
            CacheCmd::Inspect { capacity } => commands::cache::inspect(capacity).await?,
            CacheCmd::Clear { yes } => commands::cache::clear(yes).await?,
        },

        Commands::Order { cmd } => match cmd {
            OrderCmd::Get { id, raw } => commands::order::get(id, raw).await?,
        },
    }

    Ok(())
}
