//! HTTP request handlers

use crate::api::server::AppContext;
use crate::error::SupervisorError;
use crate::supervisor::PlayRequest;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use rfmp_common::api::{ErrorKind, ErrorResponse, PlayCommand, PlayResponse, StatusResponse};
use serde::Serialize;
use tracing::info;

type ApiError = (StatusCode, Json<ErrorResponse>);

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
    player_available: bool,
    music_root_accessible: bool,
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    let supervisor = &ctx.supervisor;
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "rfmp-ph".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        player_available: program_available(&supervisor.player_config().program),
        music_root_accessible: supervisor.music_root().is_dir(),
    })
}

/// True if `program` is an executable path or an executable found on PATH
pub fn program_available(program: &str) -> bool {
    which::which(program).is_ok()
}

// ============================================================================
// Playback Endpoints
// ============================================================================

/// GET /status - current session state, never blocks on transitions
pub async fn get_status(State(ctx): State<AppContext>) -> Json<StatusResponse> {
    Json(ctx.supervisor.query_status())
}

/// POST /play - RequestPlay
pub async fn play(
    State(ctx): State<AppContext>,
    payload: Result<Json<PlayCommand>, JsonRejection>,
) -> Result<Json<PlayResponse>, ApiError> {
    let Json(cmd) = payload.map_err(|rejection| {
        error_response(SupervisorError::BadRequest(rejection.body_text()))
    })?;

    info!(card_id = %cmd.card_id, directory = %cmd.directory, "Play request received");

    let outcome = ctx
        .supervisor
        .request_play(PlayRequest::from(cmd))
        .await
        .map_err(error_response)?;

    Ok(Json(PlayResponse {
        outcome,
        status: ctx.supervisor.query_status(),
    }))
}

/// POST /stop - stop the current session
pub async fn stop(State(ctx): State<AppContext>) -> Result<Json<StatusResponse>, ApiError> {
    info!("Stop request received");
    ctx.supervisor.stop().await.map(Json).map_err(error_response)
}

/// Map supervisor errors to status codes
pub fn error_response(err: SupervisorError) -> ApiError {
    let (status, kind) = match &err {
        SupervisorError::DirectoryInvalid { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, ErrorKind::DirectoryInvalid)
        }
        SupervisorError::BadRequest(_) => (StatusCode::BAD_REQUEST, ErrorKind::BadRequest),
        SupervisorError::LaunchFailed(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, ErrorKind::LaunchFailed)
        }
        SupervisorError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorKind::Internal),
    };

    (
        status,
        Json(ErrorResponse {
            kind,
            error: err.to_string(),
        }),
    )
}
