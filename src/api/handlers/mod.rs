pub mod accounts;
pub mod health;
pub mod metrics;
pub mod scrapes;
pub mod views;

use serde::Serialize;

/// Uniform success envelope for API responses.
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> axum::Json<Self> {
        axum::Json(Self {
            success: true,
            data,
        })
    }
}
