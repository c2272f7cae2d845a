use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{account_repo, view_repo};
use crate::errors::AppError;
use crate::models::{View, ViewStock};
use crate::session::commit;
use crate::AppState;

use super::ApiResponse;

pub async fn list(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<View>>>, AppError> {
    Ok(ApiResponse::ok(view_repo::list(&state.store).await?))
}

#[derive(Deserialize)]
pub struct CreateViewRequest {
    pub name: String,
    pub account_ids: Vec<Uuid>,
}

/// POST /api/views — create a view over member accounts. The initial
/// aggregation runs immediately so the view never reads back empty.
pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreateViewRequest>,
) -> Result<Json<ApiResponse<View>>, AppError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("view name must not be empty".into()));
    }
    if req.account_ids.is_empty() {
        return Err(AppError::BadRequest(
            "a view needs at least one account".into(),
        ));
    }
    for &account_id in &req.account_ids {
        if account_repo::get(&state.store, account_id).await?.is_none() {
            return Err(AppError::BadRequest(format!(
                "unknown account: {account_id}"
            )));
        }
    }

    let view = view_repo::create(&state.store, name, &req.account_ids).await?;
    commit::rebuild_view(&state.store, view.id).await?;

    let view = view_repo::get(&state.store, view.id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("view {}", view.id)))?;
    Ok(ApiResponse::ok(view))
}

#[derive(Serialize)]
pub struct ViewDetail {
    #[serde(flatten)]
    pub view: View,
    pub account_ids: Vec<Uuid>,
}

/// GET /api/views/:id — the view plus its member account ids.
pub async fn detail(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ViewDetail>>, AppError> {
    let view = view_repo::get(&state.store, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("view {id}")))?;
    let account_ids = view_repo::member_account_ids(&state.store, id).await?;
    Ok(ApiResponse::ok(ViewDetail { view, account_ids }))
}

/// GET /api/views/:id/stocks — the view's merged positions.
pub async fn stocks(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<ViewStock>>>, AppError> {
    if view_repo::get(&state.store, id).await?.is_none() {
        return Err(AppError::NotFound(format!("view {id}")));
    }
    Ok(ApiResponse::ok(
        view_repo::list_view_stocks(&state.store, id).await?,
    ))
}
