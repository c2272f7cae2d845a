use uuid::Uuid;

use super::{JsonStore, StoreError};
use crate::models::Stock;

pub const TABLE: &str = "stocks";

pub async fn list(store: &JsonStore) -> Result<Vec<Stock>, StoreError> {
    store.list_rows(TABLE).await
}

pub async fn list_for_account(
    store: &JsonStore,
    account_id: Uuid,
) -> Result<Vec<Stock>, StoreError> {
    let stocks = list(store).await?;
    Ok(stocks
        .into_iter()
        .filter(|s| s.account_id == account_id)
        .collect())
}
