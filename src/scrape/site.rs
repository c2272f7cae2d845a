use async_trait::async_trait;
use serde_json::Value;

// ---------------------------------------------------------------------------
// Page abstraction
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("script evaluation failed: {0}")]
    Eval(String),

    #[error("browser protocol error: {0}")]
    Protocol(String),
}

/// The page-level operations the login/extraction state machine needs.
///
/// Production pages speak the Chrome DevTools Protocol (`cdp::CdpPage`);
/// tests drive the state machine with a scripted mock. The handle is owned
/// exclusively by one in-flight scrape — never shared across sessions.
#[async_trait]
pub trait SitePage: Send {
    async fn goto(&mut self, url: &str) -> Result<(), PageError>;
    async fn click(&mut self, selector: &str) -> Result<(), PageError>;
    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), PageError>;
    async fn has_element(&mut self, selector: &str) -> Result<bool, PageError>;
    async fn body_text(&mut self) -> Result<String, PageError>;
    async fn current_url(&mut self) -> Result<String, PageError>;
    /// Evaluate a JS expression and return its JSON value.
    async fn eval_json(&mut self, expression: &str) -> Result<Value, PageError>;
    /// JSON bodies of network responses intercepted since the last
    /// navigation.
    async fn json_responses(&mut self) -> Result<Vec<Value>, PageError>;
    async fn screenshot_png(&mut self) -> Result<Vec<u8>, PageError>;
    /// Release the page. Must be called on every exit path.
    async fn close(&mut self);
}

// ---------------------------------------------------------------------------
// Site profile — pluggable selector/keyword sets per broker
// ---------------------------------------------------------------------------

/// CSS selectors for one broker's login flow.
#[derive(Debug, Clone)]
pub struct SiteSelectors {
    pub login_button: String,
    pub username_input: String,
    pub password_input: String,
    pub submit_button: String,
    pub otp_input: String,
    pub pin_input: String,
}

/// Everything brittle about one broker site, isolated behind a swappable
/// profile: URLs, selectors, detection keywords and the holdings-row
/// extraction script. The third-party site guarantees none of this, so every
/// check built on a profile is best-effort pattern matching re-verified on
/// each run.
#[derive(Debug, Clone)]
pub struct SiteProfile {
    pub broker_id: String,
    pub home_url: String,
    pub holdings_url: String,
    pub selectors: SiteSelectors,
    /// Keywords whose presence in page text indicates an OTP challenge.
    pub otp_keywords: Vec<String>,
    /// Keywords whose presence in page text indicates a PIN challenge.
    pub pin_keywords: Vec<String>,
    /// URL fragments that indicate a successful login landed on the
    /// dashboard.
    pub dashboard_url_markers: Vec<String>,
    /// Page-text fallbacks for the same.
    pub dashboard_text_markers: Vec<String>,
    /// JS expression producing an array of `{name, quantity, avg_price,
    /// market_price}` objects from the holdings table DOM.
    pub holdings_rows_js: String,
}

impl SiteProfile {
    /// Look up the profile for a broker id. Only Groww is maintained; the
    /// registry exists so new brokers are a profile away, not a driver
    /// change.
    pub fn for_broker(broker_id: &str) -> Option<SiteProfile> {
        match broker_id.trim().to_lowercase().as_str() {
            "groww" => Some(Self::groww()),
            _ => None,
        }
    }

    pub fn groww() -> SiteProfile {
        SiteProfile {
            broker_id: "groww".into(),
            home_url: "https://groww.in".into(),
            holdings_url: "https://groww.in/stocks/user/holdings".into(),
            selectors: SiteSelectors {
                login_button: "a[href*='login']".into(),
                username_input: "input[type='email']".into(),
                password_input: "input[type='password']".into(),
                submit_button: "button[type='submit']".into(),
                otp_input: "input[autocomplete='one-time-code'], input[name*='otp']".into(),
                pin_input: "input[type='password'][maxlength='4'], input[name*='pin']".into(),
            },
            otp_keywords: vec![
                "otp".into(),
                "one time password".into(),
                "verification code".into(),
            ],
            pin_keywords: vec!["enter your pin".into(), "groww pin".into()],
            dashboard_url_markers: vec!["/dashboard".into(), "/stocks/user".into()],
            dashboard_text_markers: vec!["your investments".into(), "holdings".into()],
            holdings_rows_js: r#"
                Array.from(document.querySelectorAll("table tr[class*='holdingRow'], table tbody tr")).map(function (tr) {
                    var cells = tr.querySelectorAll('td');
                    if (cells.length < 3) return null;
                    var num = function (el) {
                        return el ? el.innerText.replace(/[₹,\s]/g, '') : null;
                    };
                    return {
                        name: cells[0].innerText.trim().split('\n')[0],
                        quantity: num(cells[1]),
                        avg_price: num(cells[2]),
                        market_price: num(cells[3])
                    };
                }).filter(function (r) { return r && r.name; })
            "#
            .into(),
        }
    }

    /// Heuristic: does the current page present an OTP challenge? The input
    /// probe is checked first; keyword matching over page text is the
    /// fallback.
    pub fn wants_otp(&self, has_otp_input: bool, body_text: &str) -> bool {
        if has_otp_input {
            return true;
        }
        let text = body_text.to_lowercase();
        self.otp_keywords.iter().any(|kw| text.contains(kw.as_str()))
    }

    /// Heuristic: does the current page present a PIN challenge?
    pub fn wants_pin(&self, has_pin_input: bool, body_text: &str) -> bool {
        if has_pin_input {
            return true;
        }
        let text = body_text.to_lowercase();
        self.pin_keywords.iter().any(|kw| text.contains(kw.as_str()))
    }

    /// Heuristic: did login land on the dashboard? URL markers win; page
    /// text is the fallback.
    pub fn on_dashboard(&self, url: &str, body_text: &str) -> bool {
        if self
            .dashboard_url_markers
            .iter()
            .any(|m| url.contains(m.as_str()))
        {
            return true;
        }
        let text = body_text.to_lowercase();
        self.dashboard_text_markers
            .iter()
            .any(|m| text.contains(m.as_str()))
    }
}
