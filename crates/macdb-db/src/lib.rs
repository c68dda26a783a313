use macdb_core::AppConfig;
use sqlx::{postgres::PgPoolOptions, Connection, PgPool};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_MIN_CONNECTIONS: u32 = 1;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

/// SQLSTATE codes treated as conflicts worth a retry: unique violation,
/// duplicate prepared statement, serialization failure.
const CONFLICT_CODES: &[&str] = &["23505", "42P05", "40001"];

// Path relative to crates/macdb-db/Cargo.toml; resolves to <workspace-root>/migrations/
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            acquire_timeout_secs: config.db_acquire_timeout_secs,
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("record not found")]
    NotFound,
    #[error("job {id} is not in expected status '{expected_status}'")]
    InvalidJobTransition {
        id: Uuid,
        expected_status: &'static str,
    },
    #[error("unexpected value '{value}' in column {column}")]
    InvalidColumnValue { column: &'static str, value: String },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl DbError {
    /// `true` for unique violations, duplicate prepared statements, and
    /// serialization failures: errors a short delay and one retry can clear.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        match self {
            DbError::Sqlx(sqlx::Error::Database(db)) => db
                .code()
                .is_some_and(|code| CONFLICT_CODES.iter().any(|c| *c == code)),
            _ => false,
        }
    }
}

/// Connect to a Postgres pool using explicit URL and config.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the connection cannot be established.
pub async fn connect_pool(database_url: &str, config: PoolConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(database_url)
        .await
}

/// Connect using `DATABASE_URL` and the pool settings of `config`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the connection cannot be established.
pub async fn connect_pool_from_config(config: &AppConfig) -> Result<PgPool, DbError> {
    connect_pool(&config.database_url, PoolConfig::from_app_config(config))
        .await
        .map_err(DbError::from)
}

/// Run all pending migrations against the pool.
///
/// Returns the number of migrations that were applied.
///
/// # Errors
///
/// Returns [`sqlx::migrate::MigrateError`] if any migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<usize, sqlx::migrate::MigrateError> {
    // _sqlx_migrations does not exist on a fresh database; treat as zero.
    let applied_before: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    MIGRATOR.run(pool).await?;

    let applied_after: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    let delta = (applied_after - applied_before).max(0);
    Ok(usize::try_from(delta).unwrap_or(0))
}

/// Send a `SELECT 1` to verify the pool has a live connection.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await?;
    Ok(())
}

/// Run a full health check: ping the pool and return a typed error on failure.
///
/// # Errors
///
/// Returns [`DbError`] if the ping fails.
pub async fn health_check(pool: &PgPool) -> Result<(), DbError> {
    ping(pool).await?;
    Ok(())
}

/// Drops every prepared statement on one pooled connection.
///
/// Used before creating a job to clear statements left behind by a
/// connection pooler. The driver's own statement cache is cleared first so
/// it never refers to a deallocated statement. Failures are logged, never
/// returned.
pub async fn deallocate_prepared_statements(pool: &PgPool) {
    let result = async {
        let mut conn = pool.acquire().await?;
        conn.clear_cached_statements().await?;
        sqlx::Executor::execute(&mut *conn, "DEALLOCATE ALL").await?;
        Ok::<_, sqlx::Error>(())
    }
    .await;
    if let Err(e) = result {
        tracing::debug!(error = %e, "statement cleanup failed, continuing");
    }
}


pub mod apps;
pub mod categories;
pub mod jobs;
pub mod owners;
pub mod vendors;

pub use apps::{app_exists, create_app, create_app_with_version, create_version, AppPlacement};
pub use categories::{
    count_categories, create_category, find_category_by_external_id, find_category_by_name,
    get_category, list_categories, update_category, CategoryRow, CategoryUpdate, NewCategory,
};
pub use jobs::{
    complete_job, create_job, fail_job, get_job, list_jobs, start_job, update_job_progress,
    JobRow,
};
pub use owners::{ensure_owner, find_system_owner, OwnerRow};
pub use vendors::{upsert_vendor, VendorRow};
