use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::{RawHolding, Stock};

// ---------------------------------------------------------------------------
// SessionStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    Confirmed,
}

impl SessionStatus {
    /// Terminal states are sinks: no transition ever leaves them.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionStatus::Failed | SessionStatus::Cancelled | SessionStatus::Confirmed
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Running => "running",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
            SessionStatus::Cancelled => "cancelled",
            SessionStatus::Confirmed => "confirmed",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// ScrapeSession
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScrapeProgress {
    pub percent: u8,
    pub stage: String,
}

/// Intermediate scrape output held for human review before commit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScrapePreview {
    pub raw: Vec<RawHolding>,
    /// Raw holdings mapped to stock rows with temporary ids. These become
    /// real rows only when the session is confirmed.
    pub mapped: Vec<Stock>,
}

/// One run of the scrape pipeline for one account, from queued to
/// confirmed/failed/cancelled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeSession {
    pub id: Uuid,
    pub account_name: String,
    pub broker_id: String,
    pub status: SessionStatus,
    pub progress: ScrapeProgress,
    pub preview: Option<ScrapePreview>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScrapeSession {
    pub fn new(account_name: &str, broker_id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            account_name: account_name.to_string(),
            broker_id: broker_id.to_string(),
            status: SessionStatus::Pending,
            progress: ScrapeProgress {
                percent: 0,
                stage: "queued".into(),
            },
            preview: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}
