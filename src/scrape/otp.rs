use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use uuid::Uuid;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum OtpError {
    /// No value arrived within the window. Distinct from generic automation
    /// failure so the caller can surface "OTP not received in time".
    #[error("OTP not provided within {0:?}")]
    Timeout(Duration),

    #[error("OTP wait was cancelled")]
    Cancelled,
}

enum Slot {
    /// Value supplied before any wait started; satisfies the next wait.
    Held(String),
    /// An automation run is suspended on this sender.
    Waiting(oneshot::Sender<String>),
}

/// Per-session rendezvous joining an asynchronous human action (reading an
/// OTP off a phone) back into the automation pipeline.
///
/// One slot per session id. A second `await_value` for the same session
/// replaces the first waiter, which then resolves as cancelled — a session
/// has at most one in-flight scrape, so that only happens on caller bugs.
#[derive(Default)]
pub struct OtpChannel {
    slots: Mutex<HashMap<Uuid, Slot>>,
}

impl OtpChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Suspend until a value is provided for `session_id` or `timeout`
    /// elapses, whichever first.
    pub async fn await_value(
        &self,
        session_id: Uuid,
        timeout: Duration,
    ) -> Result<String, OtpError> {
        let rx = {
            let mut slots = self.slots.lock().await;
            match slots.remove(&session_id) {
                Some(Slot::Held(value)) => return Ok(value),
                _ => {
                    let (tx, rx) = oneshot::channel();
                    slots.insert(session_id, Slot::Waiting(tx));
                    rx
                }
            }
        };

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(OtpError::Cancelled),
            Err(_) => {
                let mut slots = self.slots.lock().await;
                if matches!(slots.get(&session_id), Some(Slot::Waiting(_))) {
                    slots.remove(&session_id);
                }
                Err(OtpError::Timeout(timeout))
            }
        }
    }

    /// Hand a value to the session's pending wait. Returns whether the value
    /// was accepted: delivered to a live waiter, or held for the next wait.
    pub async fn provide_value(&self, session_id: Uuid, value: String) -> bool {
        let mut slots = self.slots.lock().await;
        match slots.remove(&session_id) {
            Some(Slot::Waiting(tx)) => tx.send(value).is_ok(),
            _ => {
                slots.insert(session_id, Slot::Held(value));
                true
            }
        }
    }

    /// Drop any held value or pending waiter for a finished session.
    pub async fn clear(&self, session_id: Uuid) {
        self.slots.lock().await.remove(&session_id);
    }
}
