//! Import and sync-new-apps job endpoints.
//!
//! Both triggers create a pending job, hand it to the runner on a spawned
//! task, and answer `202` with the job id straight away. Clients poll
//! `GET /api/v1/import?jobId=` for progress.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    Extension, Json,
};
use macdb_core::{Job, JobType};
use macdb_ingest::{create_job_with_retry, ImportOptions, JobStore, JOB_CREATE_RETRY_DELAY};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_store_error, parse_body, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Default, Deserialize)]
pub(super) struct SyncNewAppsRequest {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct JobStatusQuery {
    pub job_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct JobStarted {
    pub job_id: Uuid,
}

type Accepted = (StatusCode, Json<ApiResponse<JobStarted>>);

fn validate_limit(req_id: &str, limit: Option<usize>) -> Result<(), ApiError> {
    if limit == Some(0) {
        return Err(ApiError::new(
            req_id,
            "validation_error",
            "limit must be at least 1",
        ));
    }
    Ok(())
}

async fn create_job(state: &AppState, req_id: &str, job_type: JobType) -> Result<Job, ApiError> {
    create_job_with_retry(state.catalog.as_ref(), job_type, JOB_CREATE_RETRY_DELAY)
        .await
        .map_err(|e| map_store_error(req_id, &e))
}

fn accepted(req_id: RequestId, job_id: Uuid) -> Accepted {
    (
        StatusCode::ACCEPTED,
        Json(ApiResponse {
            data: JobStarted { job_id },
            meta: ResponseMeta::new(req_id.0),
        }),
    )
}

/// POST /api/v1/import
pub(super) async fn start_import(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    body: Bytes,
) -> Result<Accepted, ApiError> {
    let options: ImportOptions = parse_body(&req_id.0, &body)?;
    validate_limit(&req_id.0, options.limit)?;

    let job = create_job(&state, &req_id.0, JobType::Import).await?;
    tracing::info!(job_id = %job.id, limit = ?options.limit, import_all = options.import_all, "import job queued");

    let runner = Arc::clone(&state.runner);
    let job_id = job.id;
    // The outcome is recorded on the job row.
    tokio::spawn(async move {
        let _ = runner.run(job_id, options).await;
    });

    Ok(accepted(req_id, job_id))
}

/// POST /api/v1/import/sync
pub(super) async fn start_sync_new_apps(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    body: Bytes,
) -> Result<Accepted, ApiError> {
    let request: SyncNewAppsRequest = parse_body(&req_id.0, &body)?;
    validate_limit(&req_id.0, request.limit)?;

    let job = create_job(&state, &req_id.0, JobType::Sync).await?;
    tracing::info!(job_id = %job.id, limit = ?request.limit, "sync-new-apps job queued");

    let runner = Arc::clone(&state.runner);
    let job_id = job.id;
    tokio::spawn(async move {
        let _ = runner.run_sync_new_apps(job_id, request.limit).await;
    });

    Ok(accepted(req_id, job_id))
}

/// GET /api/v1/import?jobId=
pub(super) async fn get_import_status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<JobStatusQuery>,
) -> Result<Json<ApiResponse<Job>>, ApiError> {
    let rid = &req_id.0;
    let raw = query
        .job_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::new(rid, "validation_error", "jobId is required"))?;
    let job_id = Uuid::parse_str(raw).map_err(|_| {
        ApiError::new(
            rid,
            "validation_error",
            format!("jobId must be a UUID, got '{raw}'"),
        )
    })?;

    let job = state
        .catalog
        .get_job(job_id)
        .await
        .map_err(|e| map_store_error(rid, &e))?
        .ok_or_else(|| ApiError::new(rid, "not_found", format!("job {job_id} not found")))?;

    Ok(Json(ApiResponse {
        data: job,
        meta: ResponseMeta::new(req_id.0),
    }))
}
