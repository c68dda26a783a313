//! Database operations for `apps` and their `versions`.

use chrono::{DateTime, Utc};
use macdb_core::ImportRecord;
use sqlx::{PgConnection, PgPool};

use crate::DbError;

/// Resolved foreign keys for a new app row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppPlacement {
    pub owner_id: i64,
    pub vendor_id: Option<i64>,
    pub category_id: Option<i64>,
    pub subcategory_id: Option<i64>,
}

/// Whether `owner_id` already has an app called `name`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn app_exists(pool: &PgPool, name: &str, owner_id: i64) -> Result<bool, DbError> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM apps WHERE name = $1 AND owner_id = $2)",
    )
    .bind(name)
    .bind(owner_id)
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

/// Inserts the app from `record` and, when it carries a non-blank version,
/// its initial version row, in one transaction.
///
/// Returns `Ok(None)` when the owner already has an app with this name, so
/// two concurrent imports of the same app create exactly one row. A failed
/// version insert leaves no app row behind.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if either insert or the commit fails.
pub async fn create_app_with_version(
    pool: &PgPool,
    record: &ImportRecord,
    placement: AppPlacement,
) -> Result<Option<i64>, DbError> {
    let mut tx = pool.begin().await?;

    let Some(app_id) = create_app(&mut *tx, record, placement).await? else {
        tx.rollback().await?;
        return Ok(None);
    };
    if let Some(version) = record.version.as_deref().filter(|v| !v.trim().is_empty()) {
        create_version(
            &mut *tx,
            app_id,
            version,
            record.release_notes.as_deref(),
            record.release_date,
        )
        .await?;
    }

    tx.commit().await?;
    Ok(Some(app_id))
}

/// Inserts an app from `record`, returning its id, or `None` on a name
/// conflict within the owner.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_app(
    conn: &mut PgConnection,
    record: &ImportRecord,
    placement: AppPlacement,
) -> Result<Option<i64>, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO apps ( \
             name, owner_id, vendor_id, vendor_name, category_id, subcategory_id, \
             description, short_description, full_content, website, icon, screenshots, \
             requirements, other_requirements, license, file_size, bundle_ids, price, \
             download_count, is_beta, monetization, is_supported, download_url, \
             purchase_url, release_date, last_scan_date \
         ) VALUES ( \
             $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, \
             $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26 \
         ) \
         ON CONFLICT (owner_id, name) DO NOTHING \
         RETURNING id",
    )
    .bind(&record.name)
    .bind(placement.owner_id)
    .bind(placement.vendor_id)
    .bind(record.vendor.as_deref())
    .bind(placement.category_id)
    .bind(placement.subcategory_id)
    .bind(&record.description)
    .bind(record.short_description.as_deref())
    .bind(&record.full_content)
    .bind(&record.website)
    .bind(record.icon.as_deref())
    .bind(&record.screenshots)
    .bind(record.requirements.as_deref())
    .bind(record.other_requirements.as_deref())
    .bind(record.license.as_deref())
    .bind(record.file_size.as_deref())
    .bind(&record.bundle_ids)
    .bind(record.price.as_deref())
    .bind(record.download_count)
    .bind(record.is_beta)
    .bind(record.monetization.as_deref())
    .bind(record.is_supported)
    .bind(record.download_url.as_deref())
    .bind(record.purchase_url.as_deref())
    .bind(record.release_date)
    .bind(record.last_scan_date)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(id)
}

/// Adds a version row under `app_id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_version(
    conn: &mut PgConnection,
    app_id: i64,
    version: &str,
    release_notes: Option<&str>,
    release_date: Option<DateTime<Utc>>,
) -> Result<i64, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO versions (app_id, version, release_notes, release_date) \
         VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(app_id)
    .bind(version)
    .bind(release_notes)
    .bind(release_date)
    .fetch_one(&mut *conn)
    .await?;
    Ok(id)
}
