use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::AppState;

use super::handlers;

pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        // Scrape sessions
        .route("/api/scrapes", post(handlers::scrapes::create))
        .route("/api/scrapes/:id", get(handlers::scrapes::detail))
        .route("/api/scrapes/:id/status", get(handlers::scrapes::status))
        .route("/api/scrapes/:id/preview", get(handlers::scrapes::preview))
        .route("/api/scrapes/:id/confirm", post(handlers::scrapes::confirm))
        .route("/api/scrapes/:id/cancel", post(handlers::scrapes::cancel))
        .route("/api/scrapes/:id/otp", post(handlers::scrapes::provide_otp))
        // Accounts
        .route(
            "/api/accounts",
            get(handlers::accounts::list).post(handlers::accounts::create),
        )
        .route("/api/accounts/:id/stocks", get(handlers::accounts::stocks))
        .route(
            "/api/accounts/:id/credentials",
            put(handlers::accounts::put_credentials),
        )
        // Views
        .route(
            "/api/views",
            get(handlers::views::list).post(handlers::views::create),
        )
        .route("/api/views/:id", get(handlers::views::detail))
        .route("/api/views/:id/stocks", get(handlers::views::stocks))
        // Operational
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::render));

    // CORS: the dashboard is served from the same origin in production;
    // open access keeps local development simple.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    api.layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
