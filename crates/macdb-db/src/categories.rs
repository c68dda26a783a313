//! Database operations for the two-level `categories` taxonomy.
//!
//! Functions take a `&mut PgConnection` so they run equally on a pooled
//! connection or inside a transaction (`&mut *tx`).

use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use crate::DbError;

const CATEGORY_COLUMNS: &str =
    "id, name, parent_id, external_id, description, created_at, updated_at";

/// A row from the `categories` table.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct CategoryRow {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    pub external_id: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
pub struct NewCategory<'a> {
    pub name: &'a str,
    pub parent_id: Option<i64>,
    pub external_id: Option<&'a str>,
    pub description: Option<&'a str>,
}

/// New values for the fields category sync reconciles.
#[derive(Debug, Clone, Copy)]
pub struct CategoryUpdate<'a> {
    pub parent_id: Option<i64>,
    pub external_id: Option<&'a str>,
    pub description: Option<&'a str>,
}

/// Finds a category by source-site id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_category_by_external_id(
    conn: &mut PgConnection,
    external_id: &str,
) -> Result<Option<CategoryRow>, DbError> {
    let row = sqlx::query_as::<_, CategoryRow>(&format!(
        "SELECT {CATEGORY_COLUMNS} FROM categories WHERE external_id = $1"
    ))
    .bind(external_id)
    .fetch_optional(conn)
    .await?;

    Ok(row)
}

/// Finds a category by exact name under `parent_id` (`None` for top level).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_category_by_name(
    conn: &mut PgConnection,
    name: &str,
    parent_id: Option<i64>,
) -> Result<Option<CategoryRow>, DbError> {
    let row = sqlx::query_as::<_, CategoryRow>(&format!(
        "SELECT {CATEGORY_COLUMNS} FROM categories \
         WHERE name = $1 AND parent_id IS NOT DISTINCT FROM $2 \
         ORDER BY id LIMIT 1"
    ))
    .bind(name)
    .bind(parent_id)
    .fetch_optional(conn)
    .await?;

    Ok(row)
}

/// Fetches a category by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_category(
    conn: &mut PgConnection,
    id: i64,
) -> Result<Option<CategoryRow>, DbError> {
    let row = sqlx::query_as::<_, CategoryRow>(&format!(
        "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;

    Ok(row)
}

/// Returns every category, parents before children.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_categories(conn: &mut PgConnection) -> Result<Vec<CategoryRow>, DbError> {
    let rows = sqlx::query_as::<_, CategoryRow>(&format!(
        "SELECT {CATEGORY_COLUMNS} FROM categories \
         ORDER BY parent_id NULLS FIRST, name"
    ))
    .fetch_all(conn)
    .await?;

    Ok(rows)
}

/// Number of stored categories.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_categories(conn: &mut PgConnection) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM categories")
        .fetch_one(conn)
        .await?;
    Ok(count)
}

/// Inserts a category, or returns the existing row when a concurrent writer
/// created the same `(name, parent_id)` or `external_id` first.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the insert conflicted but the winning
/// row cannot be read back, or [`DbError::Sqlx`] if a query fails
/// (including the two-level check on `parent_id`).
pub async fn create_category(
    conn: &mut PgConnection,
    new: NewCategory<'_>,
) -> Result<CategoryRow, DbError> {
    let inserted = sqlx::query_as::<_, CategoryRow>(&format!(
        "INSERT INTO categories (name, parent_id, external_id, description) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT DO NOTHING \
         RETURNING {CATEGORY_COLUMNS}"
    ))
    .bind(new.name)
    .bind(new.parent_id)
    .bind(new.external_id)
    .bind(new.description)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(row) = inserted {
        return Ok(row);
    }

    tracing::debug!(name = new.name, "category insert conflicted, reading existing row");
    if let Some(external_id) = new.external_id {
        if let Some(row) = find_category_by_external_id(&mut *conn, external_id).await? {
            return Ok(row);
        }
    }
    find_category_by_name(conn, new.name, new.parent_id)
        .await?
        .ok_or(DbError::NotFound)
}

/// Overwrites `parent_id`, `external_id`, and `description` of a category.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no category has `id`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn update_category(
    conn: &mut PgConnection,
    id: i64,
    update: CategoryUpdate<'_>,
) -> Result<CategoryRow, DbError> {
    let row = sqlx::query_as::<_, CategoryRow>(&format!(
        "UPDATE categories \
         SET parent_id = $1, external_id = $2, description = $3, updated_at = NOW() \
         WHERE id = $4 \
         RETURNING {CATEGORY_COLUMNS}"
    ))
    .bind(update.parent_id)
    .bind(update.external_id)
    .bind(update.description)
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}
