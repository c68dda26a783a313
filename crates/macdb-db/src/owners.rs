//! Database operations for `catalog_owners`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `catalog_owners` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OwnerRow {
    pub id: i64,
    pub email: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

/// The account imported apps are attributed to: the first `system` owner,
/// else the first `admin`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_system_owner(pool: &PgPool) -> Result<Option<OwnerRow>, DbError> {
    let row = sqlx::query_as::<_, OwnerRow>(
        "SELECT id, email, role, created_at \
         FROM catalog_owners \
         WHERE role IN ('system', 'admin') \
         ORDER BY CASE role WHEN 'system' THEN 0 ELSE 1 END, id \
         LIMIT 1",
    )
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Creates an owner, or returns the existing one with the same email.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn ensure_owner(pool: &PgPool, email: &str, role: &str) -> Result<OwnerRow, DbError> {
    let row = sqlx::query_as::<_, OwnerRow>(
        "INSERT INTO catalog_owners (email, role) VALUES ($1, $2) \
         ON CONFLICT (email) DO UPDATE SET email = EXCLUDED.email \
         RETURNING id, email, role, created_at",
    )
    .bind(email)
    .bind(role)
    .fetch_one(pool)
    .await?;

    Ok(row)
}
