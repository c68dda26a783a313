//! Background job scheduler.
//!
//! When `MACDB_SYNC_CRON` is set, a sync-new-apps job is created and run on
//! that schedule, exactly as if it had been triggered over HTTP.

use std::sync::Arc;

use macdb_core::JobType;
use macdb_ingest::{create_job_with_retry, JOB_CREATE_RETRY_DELAY};
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::api::AppState;

/// Builds and starts the scheduler.
///
/// Returns `None` when no cron expression is configured. The returned
/// handle must be kept alive for as long as jobs should fire.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot start or the cron
/// expression is rejected.
pub async fn build_scheduler(
    state: AppState,
    cron: Option<&str>,
) -> Result<Option<JobScheduler>, JobSchedulerError> {
    let Some(cron) = cron else {
        tracing::info!("MACDB_SYNC_CRON not set; scheduled sync-new-apps disabled");
        return Ok(None);
    };

    let scheduler = JobScheduler::new().await?;
    register_sync_new_apps_job(&scheduler, state, cron).await?;
    scheduler.start().await?;
    tracing::info!(cron, "scheduler started");
    Ok(Some(scheduler))
}

async fn register_sync_new_apps_job(
    scheduler: &JobScheduler,
    state: AppState,
    cron: &str,
) -> Result<(), JobSchedulerError> {
    let state = Arc::new(state);

    let job = Job::new_async(cron, move |_uuid, _lock| {
        let state = Arc::clone(&state);
        Box::pin(async move {
            run_sync_new_apps(&state).await;
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

async fn run_sync_new_apps(state: &AppState) {
    let job = match create_job_with_retry(state.catalog.as_ref(), JobType::Sync, JOB_CREATE_RETRY_DELAY).await {
        Ok(job) => job,
        Err(e) => {
            tracing::error!(error = %e, "scheduler: could not create sync-new-apps job");
            return;
        }
    };

    tracing::info!(job_id = %job.id, "scheduler: starting sync-new-apps run");
    if state.runner.run_sync_new_apps(job.id, None).await.is_ok() {
        tracing::info!(job_id = %job.id, "scheduler: sync-new-apps run complete");
    }
}
