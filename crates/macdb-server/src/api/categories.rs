use axum::{body::Bytes, extract::State, Extension, Json};
use macdb_core::SyncReport;
use macdb_ingest::SyncError;
use serde::Deserialize;

use crate::middleware::RequestId;

use super::{map_store_error, parse_body, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CategorySyncRequest {
    pub source_url: Option<String>,
}

fn map_sync_error(req_id: &str, error: &SyncError) -> ApiError {
    match error {
        SyncError::Store(e) => map_store_error(req_id, e),
        e if e.is_client_error() => ApiError::new(req_id, "validation_error", e.to_string()),
        SyncError::Scraper(e) => {
            tracing::warn!(error = %e, "taxonomy fetch failed");
            ApiError::new(req_id, "upstream_error", e.to_string())
        }
    }
}

fn source_url(req_id: &str, body: &Bytes) -> Result<String, ApiError> {
    let request: CategorySyncRequest = parse_body(req_id, body)?;
    request
        .source_url
        .map(|u| u.trim().to_owned())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::new(req_id, "validation_error", "sourceUrl is required"))
}

/// POST /api/v1/categories/sync/preview
pub(super) async fn preview_category_sync(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    body: Bytes,
) -> Result<Json<ApiResponse<SyncReport>>, ApiError> {
    let url = source_url(&req_id.0, &body)?;
    let report = state
        .categories
        .preview_sync(&url)
        .await
        .map_err(|e| map_sync_error(&req_id.0, &e))?;

    Ok(Json(ApiResponse {
        data: report,
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// POST /api/v1/categories/sync
pub(super) async fn apply_category_sync(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    body: Bytes,
) -> Result<Json<ApiResponse<SyncReport>>, ApiError> {
    let url = source_url(&req_id.0, &body)?;
    let report = state
        .categories
        .sync(&url)
        .await
        .map_err(|e| map_sync_error(&req_id.0, &e))?;

    tracing::info!(
        source_url = %url,
        created = report.summary.create,
        updated = report.summary.update,
        "categories synced"
    );
    Ok(Json(ApiResponse {
        data: report,
        meta: ResponseMeta::new(req_id.0),
    }))
}
