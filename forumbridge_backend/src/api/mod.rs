mod status;
mod sync;

use crate::database::Database;
use crate::mirror::MirrorEngine;
use anyhow::{Context, Result};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub engine: MirrorEngine,
    pub database: Database,
}

pub(crate) type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    BadGateway(String),
    Internal(anyhow::Error),
}

impl ApiError {
    fn into_response_parts(self) -> (StatusCode, ErrorResponse) {
        match self {
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, ErrorResponse { message: msg }),
            ApiError::Internal(err) => {
                tracing::error!(error = ?err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        message: "internal server error".into(),
                    },
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.into_response_parts();
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    message: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(status::health_handler))
        .route("/status", get(status::status_handler))
        .route("/sync", post(sync::sync_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve_http(state: AppState, api_port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], api_port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind HTTP listener on {addr}"))?;
    serve_on(listener, state).await
}

/// Serves the API on an already-bound listener until the server stops.
pub async fn serve_on(listener: TcpListener, state: AppState) -> Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(?addr, "HTTP server listening");
    axum::serve(listener, router(state).into_make_service()).await?;
    Ok(())
}
