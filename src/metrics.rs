use metrics::{counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus exporter and register all application metrics.
/// Returns a `PrometheusHandle` whose `render()` method produces the
/// text/plain Prometheus scrape payload.
pub fn init_metrics() -> PrometheusHandle {
    let builder = PrometheusBuilder::new();
    let handle = builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // Pre-register counters so they appear even before the first increment.
    counter!("scrape_sessions_started").absolute(0);
    counter!("scrape_sessions_completed").absolute(0);
    counter!("scrape_sessions_failed").absolute(0);
    counter!("scrape_otp_timeouts").absolute(0);
    counter!("scrape_commits_total").absolute(0);

    gauge!("scrape_sessions_active").set(0.0);

    handle
}
