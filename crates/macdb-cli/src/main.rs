mod categories;
mod jobs;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use crate::categories::CategoryCommands;
use crate::jobs::JobCommands;

#[derive(Debug, Parser)]
#[command(name = "macdb-cli")]
#[command(about = "Mac app catalog ingestion command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Manage the owner imported apps are attributed to
    Owner {
        #[command(subcommand)]
        command: OwnerCommands,
    },
    /// Import apps from the listing into the catalog
    Import {
        /// Number of listing entries to import (default 100)
        #[arg(long)]
        limit: Option<usize>,

        /// Walk every listing page until an empty one
        #[arg(long, conflicts_with = "limit")]
        all: bool,
    },
    /// Import apps from the first listing pages that are not yet in the catalog
    SyncNewApps {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Reconcile local categories with the source taxonomy
    Categories {
        #[command(subcommand)]
        command: CategoryCommands,
    },
    /// Inspect import and sync jobs
    Jobs {
        #[command(subcommand)]
        command: JobCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check database connectivity
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[derive(Debug, Subcommand)]
enum OwnerCommands {
    /// Create the owner if missing, or update its role
    Ensure {
        #[arg(long)]
        email: String,

        #[arg(long, value_enum, default_value_t = OwnerRole::System)]
        role: OwnerRole,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OwnerRole {
    System,
    Admin,
}

impl OwnerRole {
    fn as_str(self) -> &'static str {
        match self {
            OwnerRole::System => "system",
            OwnerRole::Admin => "admin",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("macdb-cli: no command given; run with --help for usage");
        return Ok(());
    };

    let config = macdb_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool = macdb_db::connect_pool_from_config(&config).await?;
    tracing::debug!(env = %config.env, "connected to database");

    match command {
        Commands::Db { command } => run_db(&pool, command).await,
        Commands::Owner {
            command: OwnerCommands::Ensure { email, role },
        } => {
            let owner = macdb_db::ensure_owner(&pool, &email, role.as_str()).await?;
            println!("owner {} ({}) id={}", owner.email, owner.role, owner.id);
            Ok(())
        }
        Commands::Import { limit, all } => jobs::run_import(pool, &config, limit, all).await,
        Commands::SyncNewApps { limit } => jobs::run_sync_new_apps(pool, &config, limit).await,
        Commands::Categories { command } => categories::run(pool, &config, command).await,
        Commands::Jobs { command } => jobs::run_job_command(&pool, command).await,
    }
}

async fn run_db(pool: &sqlx::PgPool, command: DbCommands) -> anyhow::Result<()> {
    match command {
        DbCommands::Ping => {
            macdb_db::health_check(pool).await?;
            println!("database ok");
        }
        DbCommands::Migrate => {
            let applied = macdb_db::run_migrations(pool).await?;
            println!("applied {applied} migration(s)");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests;
