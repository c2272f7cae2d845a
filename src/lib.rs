pub mod api;
pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod portfolio;
pub mod scrape;
pub mod session;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::JsonStore;
use crate::scrape::OtpChannel;
use crate::session::SessionRegistry;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<JsonStore>,
    pub config: AppConfig,
    pub sessions: Arc<SessionRegistry>,
    pub otp: Arc<OtpChannel>,
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
}
