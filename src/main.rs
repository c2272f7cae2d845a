use std::sync::Arc;

use foliobot::api::router::create_router;
use foliobot::config::AppConfig;
use foliobot::scrape::OtpChannel;
use foliobot::session::SessionRegistry;
use foliobot::{db, metrics, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    let addr = format!("{}:{}", config.host, config.port);

    tracing::info!(data_dir = %config.data_dir, "Opening record store...");
    let store = db::init_store(&config.data_dir).await?;
    tracing::info!("Record store ready");

    if let Some(dir) = &config.screenshot_dir {
        tokio::fs::create_dir_all(dir).await?;
    }

    let metrics_handle = metrics::init_metrics();
    let sessions = Arc::new(SessionRegistry::new(store.clone()));
    let otp = Arc::new(OtpChannel::new());

    let state = AppState {
        store,
        config,
        sessions,
        otp,
        metrics_handle,
    };
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {addr}");
    axum::serve(listener, router).await?;

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();
}
