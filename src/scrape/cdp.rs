use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::site::{PageError, SitePage};

const CALL_TIMEOUT: Duration = Duration::from_secs(20);
const NAV_SETTLE_TIMEOUT: Duration = Duration::from_secs(30);
const NAV_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, thiserror::Error)]
pub enum CdpError {
    #[error("DevTools HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("DevTools WebSocket error: {0}")]
    Ws(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("DevTools protocol error: {0}")]
    Protocol(String),

    #[error("DevTools connection closed")]
    Closed,

    #[error("DevTools call timed out: {0}")]
    Timeout(String),
}

impl From<CdpError> for PageError {
    fn from(e: CdpError) -> Self {
        match e {
            CdpError::Timeout(m) => PageError::Navigation(m),
            other => PageError::Protocol(other.to_string()),
        }
    }
}

/// Handle to a running Chrome/Chromium exposing its DevTools HTTP endpoint
/// (`chrome --remote-debugging-port=...`).
#[derive(Debug, Clone)]
pub struct CdpBrowser {
    http: reqwest::Client,
    base_url: String,
}

#[derive(serde::Deserialize)]
struct TargetInfo {
    id: String,
    #[serde(rename = "webSocketDebuggerUrl")]
    ws_url: String,
}

impl CdpBrowser {
    /// Connect to the DevTools endpoint and verify it is alive.
    pub async fn connect(base_url: &str) -> Result<Self, CdpError> {
        let http = reqwest::Client::new();
        let base_url = base_url.trim_end_matches('/').to_string();
        http.get(format!("{base_url}/json/version"))
            .send()
            .await?
            .error_for_status()?;
        Ok(Self { http, base_url })
    }

    /// Open a fresh browser tab and attach a protocol session to it.
    pub async fn new_page(&self) -> Result<CdpPage, CdpError> {
        let target: TargetInfo = self
            .http
            .put(format!("{}/json/new?about:blank", self.base_url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let (ws, _response) = connect_async(&target.ws_url).await?;
        let (write, mut read) = ws.split();

        let shared = Arc::new(Shared::default());
        let reader_shared = shared.clone();
        let reader = tokio::spawn(async move {
            while let Some(msg) = read.next().await {
                match msg {
                    Ok(Message::Text(text)) => reader_shared.route_message(&text).await,
                    Ok(Message::Close(_)) | Err(_) => break,
                    _ => {}
                }
            }
            reader_shared.fail_pending().await;
        });

        let mut page = CdpPage {
            target_id: target.id,
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            write,
            shared,
            next_id: 1,
            reader,
        };

        // Response interception needs the Network domain up before the first
        // navigation.
        page.call("Network.enable", json!({})).await?;
        page.call("Page.enable", json!({})).await?;
        Ok(page)
    }
}

#[derive(Default)]
struct Shared {
    pending: Mutex<HashMap<u64, oneshot::Sender<Result<Value, String>>>>,
    /// Request ids of JSON-typed responses seen since the last navigation,
    /// fetched lazily via Network.getResponseBody.
    json_request_ids: Mutex<Vec<String>>,
}

impl Shared {
    async fn route_message(&self, text: &str) {
        let Ok(value) = serde_json::from_str::<Value>(text) else {
            return;
        };

        if let Some(id) = value.get("id").and_then(Value::as_u64) {
            if let Some(tx) = self.pending.lock().await.remove(&id) {
                let result = match value.get("error") {
                    Some(err) => Err(err
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown protocol error")
                        .to_string()),
                    None => Ok(value.get("result").cloned().unwrap_or(Value::Null)),
                };
                let _ = tx.send(result);
            }
            return;
        }

        if value.get("method").and_then(Value::as_str) == Some("Network.responseReceived") {
            let mime = value["params"]["response"]["mimeType"]
                .as_str()
                .unwrap_or_default();
            if mime.contains("json") {
                if let Some(request_id) = value["params"]["requestId"].as_str() {
                    self.json_request_ids
                        .lock()
                        .await
                        .push(request_id.to_string());
                }
            }
        }
    }

    async fn fail_pending(&self) {
        let mut pending = self.pending.lock().await;
        for (_, tx) in pending.drain() {
            let _ = tx.send(Err("connection closed".into()));
        }
    }
}

/// One DevTools tab session. Owned exclusively by a single scrape run.
pub struct CdpPage {
    target_id: String,
    http: reqwest::Client,
    base_url: String,
    write: SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>,
    shared: Arc<Shared>,
    next_id: u64,
    reader: tokio::task::JoinHandle<()>,
}

/// Quote a Rust string as a JS string literal.
fn js_string(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

impl CdpPage {
    /// Issue one protocol call and await its response.
    async fn call(&mut self, method: &str, params: Value) -> Result<Value, CdpError> {
        let id = self.next_id;
        self.next_id += 1;

        let (tx, rx) = oneshot::channel();
        self.shared.pending.lock().await.insert(id, tx);

        let msg = json!({ "id": id, "method": method, "params": params });
        self.write.send(Message::Text(msg.to_string())).await?;

        match tokio::time::timeout(CALL_TIMEOUT, rx).await {
            Ok(Ok(Ok(result))) => Ok(result),
            Ok(Ok(Err(message))) => Err(CdpError::Protocol(format!("{method}: {message}"))),
            Ok(Err(_)) => Err(CdpError::Closed),
            Err(_) => {
                self.shared.pending.lock().await.remove(&id);
                Err(CdpError::Timeout(method.to_string()))
            }
        }
    }

    /// Evaluate a JS expression in the page and return its JSON value.
    async fn evaluate(&mut self, expression: &str) -> Result<Value, CdpError> {
        let result = self
            .call(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;

        if let Some(details) = result.get("exceptionDetails") {
            let text = details
                .get("exception")
                .and_then(|e| e.get("description"))
                .and_then(Value::as_str)
                .unwrap_or("script threw");
            return Err(CdpError::Protocol(text.to_string()));
        }
        Ok(result["result"]["value"].clone())
    }

    /// Navigate and wait for the document to settle. New navigations reset
    /// the intercepted-response buffer.
    async fn navigate(&mut self, url: &str) -> Result<(), CdpError> {
        self.shared.json_request_ids.lock().await.clear();
        self.call("Page.navigate", json!({ "url": url })).await?;

        let deadline = tokio::time::Instant::now() + NAV_SETTLE_TIMEOUT;
        loop {
            tokio::time::sleep(NAV_POLL_INTERVAL).await;
            match self.evaluate("document.readyState").await {
                Ok(Value::String(state)) if state == "complete" => return Ok(()),
                // Transient failures mid-navigation are expected; keep
                // polling until the deadline.
                Ok(_) | Err(_) if tokio::time::Instant::now() < deadline => continue,
                Ok(_) => return Err(CdpError::Timeout(format!("navigate {url}"))),
                Err(e) => return Err(e),
            }
        }
    }

    /// Fetch the bodies of intercepted JSON responses.
    async fn collect_json_bodies(&mut self) -> Result<Vec<Value>, CdpError> {
        let request_ids: Vec<String> = {
            let ids = self.shared.json_request_ids.lock().await;
            ids.clone()
        };

        let mut bodies = Vec::new();
        for request_id in request_ids {
            // Bodies can be evicted by the browser; skip what's gone.
            let Ok(result) = self
                .call("Network.getResponseBody", json!({ "requestId": request_id }))
                .await
            else {
                continue;
            };
            let Some(raw) = result.get("body").and_then(Value::as_str) else {
                continue;
            };
            let text = if result["base64Encoded"].as_bool().unwrap_or(false) {
                match base64::engine::general_purpose::STANDARD.decode(raw) {
                    Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                    Err(_) => continue,
                }
            } else {
                raw.to_string()
            };
            if let Ok(parsed) = serde_json::from_str::<Value>(&text) {
                bodies.push(parsed);
            }
        }
        Ok(bodies)
    }
}

#[async_trait]
impl SitePage for CdpPage {
    async fn goto(&mut self, url: &str) -> Result<(), PageError> {
        self.navigate(url)
            .await
            .map_err(|e| PageError::Navigation(e.to_string()))
    }

    async fn click(&mut self, selector: &str) -> Result<(), PageError> {
        let sel = js_string(selector);
        let expr = format!(
            "(function() {{ var el = document.querySelector({sel}); if (!el) return false; el.click(); return true; }})()"
        );
        match self.evaluate(&expr).await.map_err(PageError::from)? {
            Value::Bool(true) => Ok(()),
            _ => Err(PageError::ElementNotFound(selector.to_string())),
        }
    }

    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), PageError> {
        let sel = js_string(selector);
        let val = js_string(value);
        // Set the value natively and fire input/change so framework-bound
        // inputs pick it up.
        let expr = format!(
            "(function() {{ \
                var el = document.querySelector({sel}); \
                if (!el) return false; \
                var setter = Object.getOwnPropertyDescriptor(window.HTMLInputElement.prototype, 'value').set; \
                setter.call(el, {val}); \
                el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
                el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
                return true; \
            }})()"
        );
        match self.evaluate(&expr).await.map_err(PageError::from)? {
            Value::Bool(true) => Ok(()),
            _ => Err(PageError::ElementNotFound(selector.to_string())),
        }
    }

    async fn has_element(&mut self, selector: &str) -> Result<bool, PageError> {
        let sel = js_string(selector);
        let expr = format!("!!document.querySelector({sel})");
        Ok(matches!(
            self.evaluate(&expr).await.map_err(PageError::from)?,
            Value::Bool(true)
        ))
    }

    async fn body_text(&mut self) -> Result<String, PageError> {
        let value = self
            .evaluate("document.body ? document.body.innerText : ''")
            .await
            .map_err(PageError::from)?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn current_url(&mut self) -> Result<String, PageError> {
        let value = self
            .evaluate("window.location.href")
            .await
            .map_err(PageError::from)?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn eval_json(&mut self, expression: &str) -> Result<Value, PageError> {
        self.evaluate(expression).await.map_err(PageError::from)
    }

    async fn json_responses(&mut self) -> Result<Vec<Value>, PageError> {
        self.collect_json_bodies().await.map_err(PageError::from)
    }

    async fn screenshot_png(&mut self) -> Result<Vec<u8>, PageError> {
        let result = self
            .call("Page.captureScreenshot", json!({ "format": "png" }))
            .await
            .map_err(PageError::from)?;
        let data = result
            .get("data")
            .and_then(Value::as_str)
            .ok_or_else(|| PageError::Protocol("screenshot payload missing".into()))?;
        base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| PageError::Protocol(format!("screenshot decode: {e}")))
    }

    async fn close(&mut self) {
        // Best-effort: close the tab through the HTTP endpoint and tear the
        // socket down regardless of the outcome.
        let _ = self
            .http
            .get(format!("{}/json/close/{}", self.base_url, self.target_id))
            .send()
            .await;
        let _ = self.write.close().await;
        self.reader.abort();
    }
}
