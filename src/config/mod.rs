use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_DEVTOOLS_URL: &str = "http://127.0.0.1:9222";
const DEFAULT_SCRAPE_TIMEOUT_SECS: u64 = 300;
const DEFAULT_OTP_TIMEOUT_SECS: u64 = 120;
const DEFAULT_MANUAL_LOGIN_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,

    /// Directory holding the JSON table files.
    pub data_dir: String,

    /// Chrome DevTools HTTP endpoint (`chrome --remote-debugging-port=9222`).
    pub devtools_url: String,

    /// Time box for a whole scrape run, login through extraction. Keep it
    /// well under any automation-hosting budget: interception needs a full
    /// holdings-page load on top of the login flow.
    pub scrape_timeout: Duration,
    pub otp_timeout: Duration,
    pub manual_login_timeout: Duration,

    /// Where failure screenshots land. Unset disables them.
    pub screenshot_dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let secs = |key: &str, default: u64| -> Duration {
            Duration::from_secs(
                env::var(key)
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(default),
            )
        };

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()?,
            data_dir: env::var("DATA_DIR").unwrap_or_else(|_| "data".into()),
            devtools_url: env::var("DEVTOOLS_URL")
                .unwrap_or_else(|_| DEFAULT_DEVTOOLS_URL.into()),
            scrape_timeout: secs("SCRAPE_TIMEOUT_SECS", DEFAULT_SCRAPE_TIMEOUT_SECS),
            otp_timeout: secs("OTP_TIMEOUT_SECS", DEFAULT_OTP_TIMEOUT_SECS),
            manual_login_timeout: secs(
                "MANUAL_LOGIN_TIMEOUT_SECS",
                DEFAULT_MANUAL_LOGIN_TIMEOUT_SECS,
            ),
            screenshot_dir: env::var("SCREENSHOT_DIR").ok().map(PathBuf::from),
        })
    }
}
