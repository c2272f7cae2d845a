use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::db::{session_repo, JsonStore, StoreError};
use crate::models::{ScrapePreview, ScrapeSession, SessionStatus};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(Uuid),

    #[error("illegal transition: session {id} is {status}")]
    IllegalTransition { id: Uuid, status: SessionStatus },

    #[error("account name must not be empty")]
    MissingAccountName,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Owns every scrape session's lifecycle. One registry per process, held in
/// `AppState` and injected into the pieces that need it — session state is
/// never reached for globally.
///
/// Every transition persists the session row; concurrent readers observe a
/// session mid-transition only at record-store granularity. Terminal states
/// (`failed`, `cancelled`, `confirmed`) are sinks: transitions arriving
/// after them — a detached scrape task finishing after the user cancelled —
/// are ignored, not errors.
pub struct SessionRegistry {
    store: Arc<JsonStore>,
    /// Cancellation flags for in-flight scrapes, polled by the driver at
    /// every suspension point.
    cancel_flags: Mutex<HashMap<Uuid, Arc<AtomicBool>>>,
}

impl SessionRegistry {
    pub fn new(store: Arc<JsonStore>) -> Self {
        Self {
            store,
            cancel_flags: Mutex::new(HashMap::new()),
        }
    }

    /// Create a new pending session. Rejects an empty account name before
    /// any state change.
    pub async fn create(
        &self,
        account_name: &str,
        broker_id: &str,
    ) -> Result<ScrapeSession, SessionError> {
        if account_name.trim().is_empty() {
            return Err(SessionError::MissingAccountName);
        }
        let session = ScrapeSession::new(account_name.trim(), broker_id);
        session_repo::upsert(&self.store, &session).await?;
        tracing::info!(
            session_id = %session.id,
            account = %session.account_name,
            broker = %session.broker_id,
            "scrape session created"
        );
        Ok(session)
    }

    pub async fn get(&self, id: Uuid) -> Result<ScrapeSession, SessionError> {
        session_repo::get(&self.store, id)
            .await?
            .ok_or(SessionError::NotFound(id))
    }

    /// The cancellation flag for a session, created on first use.
    pub async fn cancel_flag(&self, id: Uuid) -> Arc<AtomicBool> {
        let mut flags = self.cancel_flags.lock().await;
        flags
            .entry(id)
            .or_insert_with(|| Arc::new(AtomicBool::new(false)))
            .clone()
    }

    /// Drop the cancellation flag once a scrape task has finished.
    pub async fn release_cancel_flag(&self, id: Uuid) {
        self.cancel_flags.lock().await.remove(&id);
    }

    /// Read-modify-write one session under the table lock.
    async fn update<F>(&self, id: Uuid, apply: F) -> Result<ScrapeSession, SessionError>
    where
        F: FnOnce(&mut ScrapeSession) -> Result<(), SessionError>,
    {
        let txn = self.store.lock_tables(&[session_repo::TABLE]).await;
        let mut sessions: Vec<ScrapeSession> = txn.list_rows(session_repo::TABLE).await?;
        let session = sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(SessionError::NotFound(id))?;

        apply(session)?;
        session.updated_at = Utc::now();
        let updated = session.clone();
        txn.replace_rows(session_repo::TABLE, &sessions).await?;
        Ok(updated)
    }

    pub async fn mark_running(&self, id: Uuid) -> Result<(), SessionError> {
        self.update(id, |s| {
            if s.status != SessionStatus::Pending {
                return Err(SessionError::IllegalTransition {
                    id: s.id,
                    status: s.status,
                });
            }
            s.status = SessionStatus::Running;
            Ok(())
        })
        .await?;
        Ok(())
    }

    /// Record progress. Percent is enforced non-decreasing: a stale lower
    /// value is dropped so pollers always see monotonic progress. Updates
    /// arriving after a terminal transition are ignored.
    pub async fn advance_progress(
        &self,
        id: Uuid,
        percent: u8,
        stage: &str,
    ) -> Result<(), SessionError> {
        self.update(id, |s| {
            if s.status.is_terminal() {
                tracing::debug!(session_id = %id, "progress after terminal state ignored");
                return Ok(());
            }
            if percent < s.progress.percent {
                tracing::debug!(
                    session_id = %id,
                    current = s.progress.percent,
                    offered = percent,
                    "non-monotonic progress ignored"
                );
                return Ok(());
            }
            s.progress.percent = percent.min(100);
            s.progress.stage = stage.to_string();
            Ok(())
        })
        .await?;
        Ok(())
    }

    /// Store intermediate scrape output without changing status. Ignored
    /// after a terminal transition — a cancelled session's late preview is
    /// simply discarded.
    pub async fn attach_preview(
        &self,
        id: Uuid,
        preview: ScrapePreview,
    ) -> Result<(), SessionError> {
        self.update(id, |s| {
            if s.status.is_terminal() {
                tracing::debug!(session_id = %id, "preview after terminal state ignored");
                return Ok(());
            }
            s.preview = Some(preview);
            Ok(())
        })
        .await?;
        Ok(())
    }

    /// Terminal-adjacent transition from the scrape task. A session already
    /// in a terminal state (e.g. cancelled while the task was finishing)
    /// stays there.
    pub async fn mark_completed(&self, id: Uuid) -> Result<(), SessionError> {
        self.update(id, |s| {
            if s.status.is_terminal() {
                return Ok(());
            }
            s.status = SessionStatus::Completed;
            s.progress.percent = 100;
            Ok(())
        })
        .await?;
        Ok(())
    }

    /// Terminal transition with a human-readable error message.
    pub async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), SessionError> {
        self.update(id, |s| {
            if s.status.is_terminal() {
                return Ok(());
            }
            s.status = SessionStatus::Failed;
            s.error = Some(error.to_string());
            Ok(())
        })
        .await?;
        tracing::warn!(session_id = %id, error, "scrape session failed");
        Ok(())
    }

    /// User-initiated terminal transition. Idempotent; also raises the
    /// cancellation flag so an in-flight driver aborts at its next
    /// suspension point.
    pub async fn mark_cancelled(&self, id: Uuid) -> Result<(), SessionError> {
        self.cancel_flag(id).await.store(true, Ordering::Relaxed);
        self.update(id, |s| {
            if s.status.is_terminal() {
                return Ok(());
            }
            s.status = SessionStatus::Cancelled;
            Ok(())
        })
        .await?;
        tracing::info!(session_id = %id, "scrape session cancelled");
        Ok(())
    }

    /// Human-gated transition, only legal from `completed`. The commit
    /// workflow calls this as its final step.
    pub async fn mark_confirmed(&self, id: Uuid) -> Result<(), SessionError> {
        self.update(id, |s| {
            if s.status != SessionStatus::Completed {
                return Err(SessionError::IllegalTransition {
                    id: s.id,
                    status: s.status,
                });
            }
            s.status = SessionStatus::Confirmed;
            Ok(())
        })
        .await?;
        Ok(())
    }
}
