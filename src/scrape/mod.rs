pub mod cdp;
pub mod credentials;
pub mod driver;
pub mod extract;
pub mod otp;
pub mod site;

pub use otp::{OtpChannel, OtpError};

use uuid::Uuid;

use crate::session::commit;
use crate::AppState;

use cdp::CdpBrowser;
use driver::{ScrapeContext, ScrapeError};
use site::SiteProfile;

/// Spawn the detached scrape job for a pending session. The caller gets the
/// session id back immediately and polls status over the API; the task
/// reports through the session registry.
pub fn spawn_scrape(state: AppState, session_id: Uuid) {
    tokio::spawn(async move {
        metrics::counter!("scrape_sessions_started").increment(1);
        metrics::gauge!("scrape_sessions_active").increment(1.0);

        run_session(&state, session_id).await;

        state.otp.clear(session_id).await;
        state.sessions.release_cancel_flag(session_id).await;
        metrics::gauge!("scrape_sessions_active").decrement(1.0);
    });
}

async fn run_session(state: &AppState, session_id: Uuid) {
    let fail = |message: String| async move {
        metrics::counter!("scrape_sessions_failed").increment(1);
        if let Err(e) = state.sessions.mark_failed(session_id, &message).await {
            tracing::error!(session_id = %session_id, error = %e, "could not record failure");
        }
    };

    let session = match state.sessions.get(session_id).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(session_id = %session_id, error = %e, "scrape task lost its session");
            return;
        }
    };

    let Some(profile) = SiteProfile::for_broker(&session.broker_id) else {
        fail(format!("no site profile for broker '{}'", session.broker_id)).await;
        return;
    };

    let creds = match credentials::get_credentials_for_scraping(&state.store, &session.account_name)
        .await
    {
        Ok(c) => c,
        Err(e) => {
            fail(format!("could not load credentials: {e}")).await;
            return;
        }
    };
    if creds.is_none() {
        tracing::info!(
            session_id = %session_id,
            account = %session.account_name,
            "no stored credentials — running in manual-login mode"
        );
    }

    if let Err(e) = state.sessions.mark_running(session_id).await {
        tracing::error!(session_id = %session_id, error = %e, "could not mark session running");
        return;
    }

    // Progress flows driver → channel → registry so the driver never talks
    // to storage directly.
    let (progress_tx, mut progress_rx) = tokio::sync::mpsc::channel::<driver::ProgressUpdate>(32);
    let progress_sessions = state.sessions.clone();
    let progress_task = tokio::spawn(async move {
        while let Some(update) = progress_rx.recv().await {
            if let Err(e) = progress_sessions
                .advance_progress(session_id, update.percent, &update.stage)
                .await
            {
                tracing::warn!(session_id = %session_id, error = %e, "progress update dropped");
            }
        }
    });

    let browser = match CdpBrowser::connect(&state.config.devtools_url).await {
        Ok(b) => b,
        Err(e) => {
            fail(format!("could not reach the browser: {e}")).await;
            return;
        }
    };
    let mut page = match browser.new_page().await {
        Ok(p) => p,
        Err(e) => {
            fail(format!("could not open a browser page: {e}")).await;
            return;
        }
    };

    let cancel = state.sessions.cancel_flag(session_id).await;
    let ctx = ScrapeContext {
        session_id,
        otp: &state.otp,
        cancel: &cancel,
        progress: progress_tx,
        otp_timeout: state.config.otp_timeout,
        manual_login_timeout: state.config.manual_login_timeout,
        screenshot_dir: state.config.screenshot_dir.clone(),
    };

    // The whole login+extraction run is time-boxed. On expiry the scrape
    // future is dropped and the page released here instead.
    let result = match tokio::time::timeout(
        state.config.scrape_timeout,
        driver::scrape(&mut page, &profile, creds.as_ref(), &ctx),
    )
    .await
    {
        Ok(result) => result,
        Err(_elapsed) => {
            use crate::scrape::site::SitePage;
            page.close().await;
            fail(format!(
                "scrape timed out after {}s",
                state.config.scrape_timeout.as_secs()
            ))
            .await;
            progress_task.abort();
            return;
        }
    };
    drop(ctx);
    progress_task.abort();

    match result {
        Ok(raw) => {
            let mapped = commit::map_preview_stocks(&raw, &session.account_name);
            let preview = crate::models::ScrapePreview { raw, mapped };
            if let Err(e) = state.sessions.attach_preview(session_id, preview).await {
                fail(format!("could not store preview: {e}")).await;
                return;
            }
            if let Err(e) = state.sessions.mark_completed(session_id).await {
                tracing::error!(session_id = %session_id, error = %e, "could not mark completed");
                return;
            }
            metrics::counter!("scrape_sessions_completed").increment(1);
            tracing::info!(session_id = %session_id, "scrape completed, awaiting confirmation");
        }
        Err(ScrapeError::Cancelled) => {
            // The registry already holds the cancelled record; the preview
            // (if any) is simply discarded.
            tracing::info!(session_id = %session_id, "scrape aborted after cancellation");
        }
        Err(ScrapeError::OtpTimeout) => {
            metrics::counter!("scrape_otp_timeouts").increment(1);
            fail("OTP not provided in time".into()).await;
        }
        Err(e) => fail(e.to_string()).await,
    }
}
