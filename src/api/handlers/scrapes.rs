use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{ScrapePreview, ScrapeProgress, ScrapeSession};
use crate::scrape::{self, site::SiteProfile};
use crate::session::commit;
use crate::AppState;

use super::ApiResponse;

#[derive(Deserialize)]
pub struct CreateScrapeRequest {
    pub account_name: String,
    pub broker_id: String,
}

#[derive(Serialize)]
pub struct CreateScrapeResponse {
    pub session_id: Uuid,
}

/// POST /api/scrapes — queue a scrape for an account and return its session
/// id. The job runs detached; callers poll the status endpoint.
pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreateScrapeRequest>,
) -> Result<Json<ApiResponse<CreateScrapeResponse>>, AppError> {
    if SiteProfile::for_broker(&req.broker_id).is_none() {
        return Err(AppError::BadRequest(format!(
            "unknown broker: {}",
            req.broker_id
        )));
    }

    let session = state
        .sessions
        .create(&req.account_name, &req.broker_id)
        .await?;
    scrape::spawn_scrape(state.clone(), session.id);

    Ok(ApiResponse::ok(CreateScrapeResponse {
        session_id: session.id,
    }))
}

/// GET /api/scrapes/:id — the full session record.
pub async fn detail(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ScrapeSession>>, AppError> {
    Ok(ApiResponse::ok(state.sessions.get(id).await?))
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(flatten)]
    pub progress: ScrapeProgress,
    pub error: Option<String>,
}

/// GET /api/scrapes/:id/status — what the UI polls.
pub async fn status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<StatusResponse>>, AppError> {
    let session = state.sessions.get(id).await?;
    Ok(ApiResponse::ok(StatusResponse {
        status: session.status.to_string(),
        progress: session.progress,
        error: session.error,
    }))
}

/// GET /api/scrapes/:id/preview — raw + mapped holdings awaiting
/// confirmation.
pub async fn preview(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ScrapePreview>>, AppError> {
    let session = state.sessions.get(id).await?;
    let preview = session
        .preview
        .ok_or_else(|| AppError::NotFound(format!("session {id} has no preview yet")))?;
    Ok(ApiResponse::ok(preview))
}

/// POST /api/scrapes/:id/confirm — commit the preview into the account and
/// cascade into its views.
pub async fn confirm(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<crate::models::Account>>, AppError> {
    let account = commit::confirm_session(&state.store, &state.sessions, id).await?;
    Ok(ApiResponse::ok(account))
}

/// POST /api/scrapes/:id/cancel — terminal, user-initiated. The in-flight
/// driver aborts at its next suspension point.
pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    state.sessions.mark_cancelled(id).await?;
    Ok(ApiResponse::ok(json!({ "status": "cancelled" })))
}

#[derive(Deserialize)]
pub struct ProvideOtpRequest {
    pub otp: String,
}

/// POST /api/scrapes/:id/otp — hand a one-time code to the in-flight run.
pub async fn provide_otp(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ProvideOtpRequest>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    if req.otp.trim().is_empty() {
        return Err(AppError::BadRequest("otp must not be empty".into()));
    }
    // Verifies the session exists before touching the channel.
    state.sessions.get(id).await?;
    let accepted = state.otp.provide_value(id, req.otp.trim().to_string()).await;
    Ok(ApiResponse::ok(json!({ "accepted": accepted })))
}
