//! Database operations for the `vendors` table.

use chrono::{DateTime, Utc};
use macdb_core::VendorData;
use sqlx::PgPool;

use crate::DbError;

/// A row from the `vendors` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VendorRow {
    pub id: i64,
    pub external_id: String,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub logo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Inserts or updates a vendor keyed on `external_id`, returning its id.
///
/// An existing logo is kept when the new data has none. `slug` falls back to
/// the external id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_vendor(pool: &PgPool, vendor: &VendorData) -> Result<i64, DbError> {
    let slug = vendor
        .slug
        .as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or(&vendor.external_id);

    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO vendors (external_id, slug, title, description, logo_url) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (external_id) DO UPDATE \
         SET slug = EXCLUDED.slug, \
             title = EXCLUDED.title, \
             description = EXCLUDED.description, \
             logo_url = COALESCE(EXCLUDED.logo_url, vendors.logo_url), \
             updated_at = NOW() \
         RETURNING id",
    )
    .bind(&vendor.external_id)
    .bind(slug)
    .bind(&vendor.title)
    .bind(&vendor.description)
    .bind(vendor.logo_url.as_deref())
    .fetch_one(pool)
    .await?;

    Ok(id)
}
