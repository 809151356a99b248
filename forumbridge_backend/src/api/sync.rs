use super::{ApiError, ApiResult, AppState};
use crate::mirror::{PassError, PassSummary};
use axum::extract::State;
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub(crate) struct SyncResponse {
    success: bool,
    #[serde(flatten)]
    summary: PassSummary,
}

/// Runs one mirror pass on demand. Not coordinated with the scheduler.
pub(crate) async fn sync_handler(State(state): State<AppState>) -> ApiResult<SyncResponse> {
    let summary = state.engine.run_pass().await.map_err(|err| match err {
        PassError::Fetch(_) => ApiError::BadGateway(err.to_string()),
    })?;
    tracing::info!(
        pass_id = %summary.pass_id,
        success = summary.is_success(),
        "manual mirror pass completed"
    );
    Ok(Json(SyncResponse {
        success: summary.is_success(),
        summary,
    }))
}
