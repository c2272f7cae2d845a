use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::{account_repo, credential_repo, stock_repo};
use crate::errors::AppError;
use crate::models::{Account, ScrapeCredential, Stock};
use crate::AppState;

use super::ApiResponse;

pub async fn list(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Account>>>, AppError> {
    Ok(ApiResponse::ok(account_repo::list(&state.store).await?))
}

#[derive(Deserialize)]
pub struct CreateAccountRequest {
    pub name: String,
}

/// POST /api/accounts — create an empty account. Duplicate names
/// (case-insensitive) are rejected before any write.
pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreateAccountRequest>,
) -> Result<Json<ApiResponse<Account>>, AppError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("account name must not be empty".into()));
    }
    let account = account_repo::create(&state.store, name).await?;
    Ok(ApiResponse::ok(account))
}

#[derive(Deserialize)]
pub struct UpsertCredentialRequest {
    pub username: String,
    pub password: String,
    pub pin: Option<String>,
}

/// PUT /api/accounts/:id/credentials — store broker login material so future
/// scrapes of this account run automated instead of manual. The response
/// never echoes the secrets back.
pub async fn put_credentials(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpsertCredentialRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let Some(account) = account_repo::get(&state.store, id).await? else {
        return Err(AppError::NotFound(format!("account {id}")));
    };
    if req.username.trim().is_empty() || req.password.is_empty() {
        return Err(AppError::BadRequest(
            "username and password must not be empty".into(),
        ));
    }

    credential_repo::upsert(
        &state.store,
        &ScrapeCredential {
            account_name: account.name,
            username: req.username.trim().to_string(),
            password: req.password,
            pin: req.pin,
        },
    )
    .await?;
    Ok(ApiResponse::ok(serde_json::json!({ "status": "stored" })))
}

/// GET /api/accounts/:id/stocks — the account's current holdings.
pub async fn stocks(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<Stock>>>, AppError> {
    if account_repo::get(&state.store, id).await?.is_none() {
        return Err(AppError::NotFound(format!("account {id}")));
    }
    Ok(ApiResponse::ok(
        stock_repo::list_for_account(&state.store, id).await?,
    ))
}
