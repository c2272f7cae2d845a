use super::{JsonStore, StoreError};
use crate::models::ScrapeCredential;

pub const TABLE: &str = "credentials";

pub async fn find_for_account(
    store: &JsonStore,
    account_name: &str,
) -> Result<Option<ScrapeCredential>, StoreError> {
    let rows: Vec<ScrapeCredential> = store.list_rows(TABLE).await?;
    Ok(rows
        .into_iter()
        .find(|c| c.account_name.eq_ignore_ascii_case(account_name)))
}

/// Insert or replace the stored credential for an account.
pub async fn upsert(store: &JsonStore, credential: &ScrapeCredential) -> Result<(), StoreError> {
    let txn = store.lock_tables(&[TABLE]).await;
    let mut rows: Vec<ScrapeCredential> = txn.list_rows(TABLE).await?;
    match rows
        .iter_mut()
        .find(|c| c.account_name.eq_ignore_ascii_case(&credential.account_name))
    {
        Some(existing) => *existing = credential.clone(),
        None => rows.push(credential.clone()),
    }
    txn.replace_rows(TABLE, &rows).await
}
