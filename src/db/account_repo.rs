use uuid::Uuid;

use super::{JsonStore, StoreError};
use crate::models::Account;

pub const TABLE: &str = "accounts";

#[derive(Debug, thiserror::Error)]
pub enum AccountRepoError {
    #[error("account name already exists: {0}")]
    DuplicateName(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub async fn list(store: &JsonStore) -> Result<Vec<Account>, StoreError> {
    store.list_rows(TABLE).await
}

pub async fn get(store: &JsonStore, id: Uuid) -> Result<Option<Account>, StoreError> {
    let accounts = list(store).await?;
    Ok(accounts.into_iter().find(|a| a.id == id))
}

pub async fn find_by_name(store: &JsonStore, name: &str) -> Result<Option<Account>, StoreError> {
    let accounts = list(store).await?;
    Ok(accounts
        .into_iter()
        .find(|a| a.name.eq_ignore_ascii_case(name)))
}

/// Create an account, rejecting case-insensitive duplicate names before any
/// write. The duplicate check and the insert run under one table lock.
pub async fn create(store: &JsonStore, name: &str) -> Result<Account, AccountRepoError> {
    let txn = store.lock_tables(&[TABLE]).await;
    let mut accounts: Vec<Account> = txn.list_rows(TABLE).await?;

    if accounts.iter().any(|a| a.name.eq_ignore_ascii_case(name)) {
        return Err(AccountRepoError::DuplicateName(name.to_string()));
    }

    let account = Account::new(name);
    accounts.push(account.clone());
    txn.replace_rows(TABLE, &accounts).await?;
    Ok(account)
}
