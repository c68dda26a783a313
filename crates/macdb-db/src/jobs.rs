//! Database operations for the `jobs` table.
//!
//! Status transitions are guarded in SQL so that a terminal job is never
//! moved again: `pending -> processing -> completed | failed`.

use chrono::{DateTime, Utc};
use macdb_core::{Job, JobStatus, JobType};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

const JOB_COLUMNS: &str =
    "id, job_type, status, progress, total, error, created_at, updated_at";

/// A row from the `jobs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub job_type: String,
    pub status: String,
    pub progress: i32,
    pub total: i32,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for Job {
    type Error = DbError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let job_type = JobType::parse(&row.job_type).ok_or(DbError::InvalidColumnValue {
            column: "jobs.job_type",
            value: row.job_type.clone(),
        })?;
        let status = JobStatus::parse(&row.status).ok_or(DbError::InvalidColumnValue {
            column: "jobs.status",
            value: row.status.clone(),
        })?;
        Ok(Job {
            id: row.id,
            job_type,
            status,
            progress: row.progress,
            total: row.total,
            error: row.error,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Creates a new job in `pending` status with a fresh UUID.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_job(pool: &PgPool, job_type: JobType) -> Result<JobRow, DbError> {
    let row = sqlx::query_as::<_, JobRow>(&format!(
        "INSERT INTO jobs (id, job_type, status) VALUES ($1, $2, 'pending') RETURNING {JOB_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(job_type.as_str())
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Fetches a job by id, or `None` if it does not exist.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_job(pool: &PgPool, id: Uuid) -> Result<Option<JobRow>, DbError> {
    let row = sqlx::query_as::<_, JobRow>(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Returns the most recent `limit` jobs, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_jobs(pool: &PgPool, limit: i64) -> Result<Vec<JobRow>, DbError> {
    let rows = sqlx::query_as::<_, JobRow>(&format!(
        "SELECT {JOB_COLUMNS} FROM jobs ORDER BY created_at DESC LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Moves a job from `pending` to `processing`.
///
/// # Errors
///
/// Returns [`DbError::InvalidJobTransition`] if the job is not pending, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn start_job(pool: &PgPool, id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE jobs SET status = 'processing', updated_at = NOW() \
         WHERE id = $1 AND status = 'pending'",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidJobTransition {
            id,
            expected_status: "pending",
        });
    }
    Ok(())
}

/// Records progress of a processing job. Last write wins.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn update_job_progress(
    pool: &PgPool,
    id: Uuid,
    progress: i32,
    total: i32,
) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE jobs SET progress = $1, total = $2, updated_at = NOW() \
         WHERE id = $3 AND status = 'processing'",
    )
    .bind(progress)
    .bind(total)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Marks a processing job `completed`, optionally with a per-record error
/// summary.
///
/// # Errors
///
/// Returns [`DbError::InvalidJobTransition`] if the job is not processing,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn complete_job(pool: &PgPool, id: Uuid, error: Option<&str>) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE jobs SET status = 'completed', error = $1, updated_at = NOW() \
         WHERE id = $2 AND status = 'processing'",
    )
    .bind(error)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidJobTransition {
            id,
            expected_status: "processing",
        });
    }
    Ok(())
}

/// Marks a non-terminal job `failed` with `message`.
///
/// # Errors
///
/// Returns [`DbError::InvalidJobTransition`] if the job is already
/// terminal, or [`DbError::Sqlx`] if the update fails.
pub async fn fail_job(pool: &PgPool, id: Uuid, message: &str) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE jobs SET status = 'failed', error = $1, updated_at = NOW() \
         WHERE id = $2 AND status IN ('pending', 'processing')",
    )
    .bind(message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidJobTransition {
            id,
            expected_status: "pending or processing",
        });
    }
    Ok(())
}
