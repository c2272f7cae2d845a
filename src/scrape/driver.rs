use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::sleep;
use uuid::Uuid;

use crate::models::RawHolding;

use super::credentials::ScrapeCredentials;
use super::extract;
use super::otp::{OtpChannel, OtpError};
use super::site::{PageError, SitePage, SiteProfile};

const NAV_MAX_ATTEMPTS: u32 = 3;
const NAV_BASE_DELAY: Duration = Duration::from_secs(2);
const NAV_MAX_DELAY: Duration = Duration::from_secs(20);
/// Hostile sites re-render after each login step; give them a beat before
/// probing for the next challenge.
const CHALLENGE_SETTLE: Duration = Duration::from_secs(2);
const DASHBOARD_VERIFY_ATTEMPTS: u32 = 10;
const DASHBOARD_VERIFY_INTERVAL: Duration = Duration::from_secs(2);
const MANUAL_LOGIN_POLL: Duration = Duration::from_secs(3);

#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("navigation to {url} failed after {attempts} attempts: {last}")]
    Navigation {
        url: String,
        attempts: u32,
        last: String,
    },

    #[error("login failed: {0}")]
    LoginFailed(String),

    /// Distinct from generic automation failure so the UI can say "OTP not
    /// provided in time".
    #[error("OTP not provided in time")]
    OtpTimeout,

    #[error("scrape cancelled")]
    Cancelled,

    #[error("no holdings could be extracted from the holdings page")]
    NoHoldings,

    #[error(transparent)]
    Page(#[from] PageError),
}

#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub percent: u8,
    pub stage: String,
}

/// Everything one scrape run needs beyond the page itself.
pub struct ScrapeContext<'a> {
    pub session_id: Uuid,
    pub otp: &'a OtpChannel,
    /// Polled at every suspension point; set by the session registry when
    /// the user cancels, so in-flight browser work actually aborts.
    pub cancel: &'a AtomicBool,
    pub progress: mpsc::Sender<ProgressUpdate>,
    pub otp_timeout: Duration,
    /// How long a pure-manual run waits for the human to finish logging in.
    pub manual_login_timeout: Duration,
    /// Where to drop a diagnostic screenshot on failure. Best-effort.
    pub screenshot_dir: Option<PathBuf>,
}

impl ScrapeContext<'_> {
    fn ensure_live(&self) -> Result<(), ScrapeError> {
        if self.cancel.load(Ordering::Relaxed) {
            Err(ScrapeError::Cancelled)
        } else {
            Ok(())
        }
    }

    async fn report(&self, percent: u8, stage: &str) {
        tracing::debug!(session_id = %self.session_id, percent, stage, "scrape progress");
        let _ = self
            .progress
            .send(ProgressUpdate {
                percent,
                stage: stage.to_string(),
            })
            .await;
    }
}

/// Run a full scrape against the given page. The page is released on every
/// exit path; failures (except cancellation) leave a diagnostic screenshot
/// behind when a screenshot dir is configured.
pub async fn scrape(
    page: &mut dyn SitePage,
    profile: &SiteProfile,
    creds: Option<&ScrapeCredentials>,
    ctx: &ScrapeContext<'_>,
) -> Result<Vec<RawHolding>, ScrapeError> {
    let result = run(page, profile, creds, ctx).await;

    if let Err(e) = &result {
        if !matches!(e, ScrapeError::Cancelled) {
            capture_failure_screenshot(page, ctx).await;
        }
    }
    page.close().await;
    result
}

async fn run(
    page: &mut dyn SitePage,
    profile: &SiteProfile,
    creds: Option<&ScrapeCredentials>,
    ctx: &ScrapeContext<'_>,
) -> Result<Vec<RawHolding>, ScrapeError> {
    ctx.report(5, "connecting to broker site").await;
    goto_with_retries(page, &profile.home_url, ctx).await?;
    ctx.report(10, "home page loaded").await;

    match creds {
        Some(creds) => automated_login(page, profile, creds, ctx).await?,
        None => manual_login(page, profile, ctx).await?,
    }
    ctx.report(70, "login verified").await;

    ctx.report(80, "opening holdings page").await;
    goto_with_retries(page, &profile.holdings_url, ctx).await?;

    ctx.report(90, "extracting holdings").await;
    let holdings = extract_holdings(page, profile, ctx).await?;

    ctx.report(100, "holdings extracted").await;
    Ok(holdings)
}

// ---------------------------------------------------------------------------
// Login
// ---------------------------------------------------------------------------

async fn automated_login(
    page: &mut dyn SitePage,
    profile: &SiteProfile,
    creds: &ScrapeCredentials,
    ctx: &ScrapeContext<'_>,
) -> Result<(), ScrapeError> {
    ctx.ensure_live()?;
    ctx.report(15, "opening login form").await;

    // Some sessions land directly on the login form; a missing login button
    // is not fatal.
    if let Err(e) = page.click(&profile.selectors.login_button).await {
        tracing::debug!(error = %e, "login button not found, assuming login form is open");
    }
    sleep(CHALLENGE_SETTLE).await;
    ctx.ensure_live()?;

    page.fill(&profile.selectors.username_input, &creds.username)
        .await?;
    page.fill(&profile.selectors.password_input, &creds.password)
        .await?;
    page.click(&profile.selectors.submit_button).await?;
    ctx.report(25, "credentials submitted").await;

    sleep(CHALLENGE_SETTLE).await;
    ctx.ensure_live()?;

    // OTP challenge is heuristic, re-verified every run: input probe first,
    // keyword match over page text second.
    let has_otp_input = page.has_element(&profile.selectors.otp_input).await?;
    let body = page.body_text().await?;
    if profile.wants_otp(has_otp_input, &body) {
        ctx.report(40, "waiting for OTP").await;
        let otp = ctx
            .otp
            .await_value(ctx.session_id, ctx.otp_timeout)
            .await
            .map_err(|e| match e {
                OtpError::Timeout(_) => ScrapeError::OtpTimeout,
                OtpError::Cancelled => ScrapeError::Cancelled,
            })?;
        ctx.ensure_live()?;

        page.fill(&profile.selectors.otp_input, &otp).await?;
        if let Err(e) = page.click(&profile.selectors.submit_button).await {
            tracing::debug!(error = %e, "no OTP submit button, relying on auto-submit");
        }
        ctx.report(50, "OTP submitted").await;
        sleep(CHALLENGE_SETTLE).await;
        ctx.ensure_live()?;
    }

    let has_pin_input = page.has_element(&profile.selectors.pin_input).await?;
    let body = page.body_text().await?;
    if profile.wants_pin(has_pin_input, &body) {
        let pin = creds
            .pin
            .as_deref()
            .ok_or_else(|| ScrapeError::LoginFailed("site asked for a PIN but none is stored".into()))?;
        page.fill(&profile.selectors.pin_input, pin).await?;
        if let Err(e) = page.click(&profile.selectors.submit_button).await {
            tracing::debug!(error = %e, "no PIN submit button, relying on auto-submit");
        }
        ctx.report(60, "PIN submitted").await;
        sleep(CHALLENGE_SETTLE).await;
        ctx.ensure_live()?;
    }

    verify_dashboard(page, profile, ctx).await
}

async fn verify_dashboard(
    page: &mut dyn SitePage,
    profile: &SiteProfile,
    ctx: &ScrapeContext<'_>,
) -> Result<(), ScrapeError> {
    for _ in 0..DASHBOARD_VERIFY_ATTEMPTS {
        ctx.ensure_live()?;
        let url = page.current_url().await?;
        let body = page.body_text().await?;
        if profile.on_dashboard(&url, &body) {
            return Ok(());
        }
        sleep(DASHBOARD_VERIFY_INTERVAL).await;
    }
    Err(ScrapeError::LoginFailed(
        "could not verify dashboard after login".into(),
    ))
}

/// Pure-manual mode: the human drives the visible browser through login; we
/// poll for the dashboard until it appears or the window closes.
async fn manual_login(
    page: &mut dyn SitePage,
    profile: &SiteProfile,
    ctx: &ScrapeContext<'_>,
) -> Result<(), ScrapeError> {
    ctx.report(20, "waiting for manual login").await;

    let deadline = tokio::time::Instant::now() + ctx.manual_login_timeout;
    while tokio::time::Instant::now() < deadline {
        ctx.ensure_live()?;
        let url = page.current_url().await?;
        let body = page.body_text().await?;
        if profile.on_dashboard(&url, &body) {
            return Ok(());
        }
        sleep(MANUAL_LOGIN_POLL).await;
    }
    Err(ScrapeError::LoginFailed(
        "manual login not completed in time".into(),
    ))
}

// ---------------------------------------------------------------------------
// Navigation & extraction
// ---------------------------------------------------------------------------

/// Navigate with bounded exponential backoff. Network-shaped failures get
/// retried; the last error is surfaced when attempts run out.
async fn goto_with_retries(
    page: &mut dyn SitePage,
    url: &str,
    ctx: &ScrapeContext<'_>,
) -> Result<(), ScrapeError> {
    let mut last = String::new();
    for attempt in 0..NAV_MAX_ATTEMPTS {
        ctx.ensure_live()?;
        if attempt > 0 {
            let delay = (NAV_BASE_DELAY * 2u32.pow(attempt - 1)).min(NAV_MAX_DELAY);
            tracing::warn!(url, attempt, delay_secs = delay.as_secs(), "retrying navigation");
            sleep(delay).await;
            ctx.ensure_live()?;
        }
        match page.goto(url).await {
            Ok(()) => return Ok(()),
            Err(e) => last = e.to_string(),
        }
    }
    Err(ScrapeError::Navigation {
        url: url.to_string(),
        attempts: NAV_MAX_ATTEMPTS,
        last,
    })
}

/// Merge DOM table rows with intercepted JSON responses, deduplicated by
/// lowercased stock name (DOM wins ties).
async fn extract_holdings(
    page: &mut dyn SitePage,
    profile: &SiteProfile,
    ctx: &ScrapeContext<'_>,
) -> Result<Vec<RawHolding>, ScrapeError> {
    ctx.ensure_live()?;

    let dom_rows = match page.eval_json(&profile.holdings_rows_js).await {
        Ok(value) => extract::parse_dom_rows(&value),
        Err(e) => {
            tracing::warn!(error = %e, "DOM extraction failed, relying on network capture");
            Vec::new()
        }
    };

    let mut network_rows = Vec::new();
    match page.json_responses().await {
        Ok(bodies) => {
            for body in &bodies {
                network_rows.extend(extract::extract_candidates(body));
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "network capture failed, relying on DOM rows");
        }
    }

    tracing::info!(
        session_id = %ctx.session_id,
        dom_rows = dom_rows.len(),
        network_rows = network_rows.len(),
        "holdings extracted"
    );

    let merged = extract::merge_sources(dom_rows, network_rows);
    if merged.is_empty() {
        return Err(ScrapeError::NoHoldings);
    }
    Ok(merged)
}

async fn capture_failure_screenshot(page: &mut dyn SitePage, ctx: &ScrapeContext<'_>) {
    let Some(dir) = &ctx.screenshot_dir else {
        return;
    };
    match page.screenshot_png().await {
        Ok(png) => {
            let path = dir.join(format!("scrape-failure-{}.png", ctx.session_id));
            if let Err(e) = tokio::fs::write(&path, &png).await {
                tracing::warn!(error = %e, path = %path.display(), "could not write failure screenshot");
            } else {
                tracing::info!(path = %path.display(), "failure screenshot saved");
            }
        }
        Err(e) => tracing::warn!(error = %e, "could not capture failure screenshot"),
    }
}
