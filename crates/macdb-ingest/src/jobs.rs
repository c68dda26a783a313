use std::time::Duration;

use macdb_core::{Job, JobType};

use crate::error::StoreError;
use crate::store::JobStore;

/// Pause before the single retry of a conflicting job insert.
pub const JOB_CREATE_RETRY_DELAY: Duration = Duration::from_millis(250);

/// Creates a pending job, clearing stale prepared statements first and
/// retrying once after `retry_delay` when the insert hits a conflict.
///
/// # Errors
///
/// Returns [`StoreError`] if the insert fails for any other reason, or if the
/// retry fails too.
pub async fn create_job_with_retry<S: JobStore + ?Sized>(
    store: &S,
    job_type: JobType,
    retry_delay: Duration,
) -> Result<Job, StoreError> {
    store.reset_statements().await;
    match store.create_job(job_type).await {
        Ok(job) => Ok(job),
        Err(e) if e.is_conflict() => {
            tracing::warn!(error = %e, job_type = job_type.as_str(), "job insert conflicted, retrying once");
            tokio::time::sleep(retry_delay).await;
            store.create_job(job_type).await
        }
        Err(e) => Err(e),
    }
}
