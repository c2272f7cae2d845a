use uuid::Uuid;

use super::{JsonStore, StoreError};
use crate::models::ScrapeSession;

pub const TABLE: &str = "scrape_sessions";

pub async fn list(store: &JsonStore) -> Result<Vec<ScrapeSession>, StoreError> {
    store.list_rows(TABLE).await
}

pub async fn get(store: &JsonStore, id: Uuid) -> Result<Option<ScrapeSession>, StoreError> {
    let sessions = list(store).await?;
    Ok(sessions.into_iter().find(|s| s.id == id))
}

/// Insert or replace a session row by id.
pub async fn upsert(store: &JsonStore, session: &ScrapeSession) -> Result<(), StoreError> {
    let txn = store.lock_tables(&[TABLE]).await;
    let mut sessions: Vec<ScrapeSession> = txn.list_rows(TABLE).await?;
    match sessions.iter_mut().find(|s| s.id == session.id) {
        Some(existing) => *existing = session.clone(),
        None => sessions.push(session.clone()),
    }
    txn.replace_rows(TABLE, &sessions).await
}
