mod api;
mod middleware;
mod scheduler;

use std::sync::Arc;

use macdb_ingest::{Catalog, LocalImageStore, PgCatalog};
use macdb_scraper::PageFetcher;
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, AppState},
    middleware::AuthState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = macdb_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool = macdb_db::connect_pool_from_config(&config).await?;
    let applied = macdb_db::run_migrations(&pool).await?;
    tracing::info!(applied, "migrations up to date");

    let catalog: Arc<dyn Catalog> = Arc::new(PgCatalog::new(pool));
    let fetcher = Arc::new(PageFetcher::from_config(&config)?);
    let images = Arc::new(LocalImageStore::from_config(&config)?);
    let state = AppState::new(catalog, fetcher, images, &config);

    let _scheduler = scheduler::build_scheduler(state.clone(), config.sync_cron.as_deref()).await?;

    let auth = AuthState::from_env(matches!(config.env, macdb_core::Environment::Development))?;
    let app = build_app(state, auth);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, env = %config.env, "macdb-server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
