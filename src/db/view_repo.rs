use uuid::Uuid;

use super::{JsonStore, StoreError};
use crate::models::{View, ViewAccount, ViewStock, ViewSummary};

pub const TABLE: &str = "views";
pub const ACCOUNTS_TABLE: &str = "view_accounts";
pub const STOCKS_TABLE: &str = "view_stocks";

#[derive(Debug, thiserror::Error)]
pub enum ViewRepoError {
    #[error("view name already exists: {0}")]
    DuplicateName(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub async fn list(store: &JsonStore) -> Result<Vec<View>, StoreError> {
    store.list_rows(TABLE).await
}

pub async fn get(store: &JsonStore, id: Uuid) -> Result<Option<View>, StoreError> {
    let views = list(store).await?;
    Ok(views.into_iter().find(|v| v.id == id))
}

pub async fn member_account_ids(
    store: &JsonStore,
    view_id: Uuid,
) -> Result<Vec<Uuid>, StoreError> {
    let memberships: Vec<ViewAccount> = store.list_rows(ACCOUNTS_TABLE).await?;
    Ok(memberships
        .into_iter()
        .filter(|m| m.view_id == view_id)
        .map(|m| m.account_id)
        .collect())
}

pub async fn list_view_stocks(
    store: &JsonStore,
    view_id: Uuid,
) -> Result<Vec<ViewStock>, StoreError> {
    let rows: Vec<ViewStock> = store.list_rows(STOCKS_TABLE).await?;
    Ok(rows.into_iter().filter(|r| r.view_id == view_id).collect())
}

/// Create a view over a set of member accounts, rejecting case-insensitive
/// duplicate names before any write. Its ViewStock set starts empty; the
/// caller runs the aggregation rebuild afterwards.
pub async fn create(
    store: &JsonStore,
    name: &str,
    account_ids: &[Uuid],
) -> Result<View, ViewRepoError> {
    let txn = store.lock_tables(&[TABLE, ACCOUNTS_TABLE]).await;
    let mut views: Vec<View> = txn.list_rows(TABLE).await?;

    if views.iter().any(|v| v.name.eq_ignore_ascii_case(name)) {
        return Err(ViewRepoError::DuplicateName(name.to_string()));
    }

    let now = chrono::Utc::now();
    let view = View {
        id: Uuid::new_v4(),
        name: name.to_string(),
        summary: ViewSummary::default(),
        created_at: now,
        updated_at: now,
    };
    views.push(view.clone());

    let mut memberships: Vec<ViewAccount> = txn.list_rows(ACCOUNTS_TABLE).await?;
    for &account_id in account_ids {
        memberships.push(ViewAccount {
            view_id: view.id,
            account_id,
        });
    }

    txn.replace_rows(TABLE, &views).await?;
    txn.replace_rows(ACCOUNTS_TABLE, &memberships).await?;
    Ok(view)
}
