use super::{ApiError, ApiResult, AppState};
use crate::database::models::LedgerEntry;
use crate::database::repositories::LedgerRepository;
use crate::ledger::{REPLY_PREFIX, TOPIC_PREFIX};
use axum::extract::State;
use axum::Json;
use serde::Serialize;

const RECENT_TOPIC_LIMIT: usize = 10;

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
pub(crate) struct StatusResponse {
    mirrored_topics: usize,
    mirrored_replies: usize,
    recent_topics: Vec<LedgerEntry>,
}

pub(crate) async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub(crate) async fn status_handler(State(state): State<AppState>) -> ApiResult<StatusResponse> {
    let response = state
        .database
        .with_repositories(|repos| {
            let ledger = repos.ledger();
            Ok(StatusResponse {
                mirrored_topics: ledger.count_with_prefix(TOPIC_PREFIX)?,
                mirrored_replies: ledger.count_with_prefix(REPLY_PREFIX)?,
                recent_topics: ledger.list_recent(TOPIC_PREFIX, RECENT_TOPIC_LIMIT)?,
            })
        })
        .map_err(ApiError::Internal)?;
    Ok(Json(response))
}
