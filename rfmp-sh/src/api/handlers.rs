//! HTTP request handlers

use crate::api::server::AppContext;
use crate::input::ScanEvent;
use crate::pipeline::{PendingCard, ScanReport};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use rfmp_common::api::{ErrorKind, ErrorResponse};
use serde::{Deserialize, Serialize};
use tracing::info;

type ApiError = (StatusCode, Json<ErrorResponse>);

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
    dispatch_url: String,
}

/// POST /scan body
#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    pub card_id: String,
}

/// GET /health - Health check endpoint
pub async fn health(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "rfmp-sh".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        dispatch_url: ctx.pipeline.dispatcher().play_url().to_string(),
    })
}

/// POST /scan - process a card as if it had just been scanned
///
/// Bypasses the cooldown: this is a deliberate manual trigger.
pub async fn scan(
    State(ctx): State<AppContext>,
    payload: Result<Json<ScanRequest>, JsonRejection>,
) -> Result<Json<ScanReport>, ApiError> {
    let Json(request) = payload.map_err(|rejection| bad_request(rejection.body_text()))?;

    let card_id = request.card_id.trim();
    if card_id.is_empty() {
        return Err(bad_request("card_id is empty".to_string()));
    }
    if !card_id.chars().all(|c| c.is_ascii_digit()) {
        return Err(bad_request(format!("card_id must be digits: {:?}", card_id)));
    }

    info!(card_id, "Manual scan received");
    let report = ctx.pipeline.process(&ScanEvent::new(card_id)).await;
    Ok(Json(report))
}

/// GET /pending - unassigned cards, most recent first
pub async fn list_pending(State(ctx): State<AppContext>) -> Json<Vec<PendingCard>> {
    Json(ctx.pipeline.pending().list())
}

/// DELETE /pending/:card_id - card has been assigned
pub async fn remove_pending(
    State(ctx): State<AppContext>,
    Path(card_id): Path<String>,
) -> StatusCode {
    if ctx.pipeline.pending().remove(&card_id) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

fn bad_request(error: String) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            kind: ErrorKind::BadRequest,
            error,
        }),
    )
}
