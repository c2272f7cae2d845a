use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::db::account_repo::AccountRepoError;
use crate::db::view_repo::ViewRepoError;
use crate::db::StoreError;
use crate::session::commit::CommitError;
use crate::session::SessionError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".into())
            }
        };

        (
            status,
            Json(ErrorBody {
                success: false,
                error: message,
            }),
        )
            .into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::Internal(e.into())
    }
}

impl From<AccountRepoError> for AppError {
    fn from(e: AccountRepoError) -> Self {
        match e {
            AccountRepoError::DuplicateName(_) => AppError::BadRequest(e.to_string()),
            AccountRepoError::Store(inner) => inner.into(),
        }
    }
}

impl From<ViewRepoError> for AppError {
    fn from(e: ViewRepoError) -> Self {
        match e {
            ViewRepoError::DuplicateName(_) => AppError::BadRequest(e.to_string()),
            ViewRepoError::Store(inner) => inner.into(),
        }
    }
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NotFound(id) => AppError::NotFound(format!("session {id}")),
            SessionError::MissingAccountName | SessionError::IllegalTransition { .. } => {
                AppError::BadRequest(e.to_string())
            }
            SessionError::Store(inner) => inner.into(),
        }
    }
}

impl From<CommitError> for AppError {
    fn from(e: CommitError) -> Self {
        match e {
            CommitError::NotCompleted(_) | CommitError::NoPreview => {
                AppError::BadRequest(e.to_string())
            }
            CommitError::Session(inner) => inner.into(),
            CommitError::Store(inner) => inner.into(),
        }
    }
}
