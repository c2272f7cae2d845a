use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::{account_repo, stock_repo, view_repo, JsonStore, StoreError, TableTxn};
use crate::models::{
    Account, RawHolding, ScrapeSession, SessionStatus, Stock, View, ViewStock,
};
use crate::portfolio::{aggregate, enrich, math};
use crate::session::{SessionError, SessionRegistry};

#[derive(Debug, thiserror::Error)]
pub enum CommitError {
    #[error("session is {0}; only completed sessions can be confirmed")]
    NotCompleted(SessionStatus),

    #[error("session has no scraped preview to commit")]
    NoPreview,

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Map raw scraped holdings to stock rows for the preview. Ids are
/// temporary and the account id is a placeholder — real identities are
/// resolved at commit time. Derived fields are recomputed here, never
/// trusted from the scrape.
pub fn map_preview_stocks(raw: &[RawHolding], account_name: &str) -> Vec<Stock> {
    let now = Utc::now();
    raw.iter()
        .map(|h| {
            let avg_price = h.avg_price.unwrap_or_default();
            let market_price = h.market_price.or(h.avg_price).unwrap_or_default();
            let d = math::derived_fields(h.quantity, avg_price, market_price);
            let classified = enrich::lookup(&h.stock_name);
            Stock {
                id: Uuid::new_v4(),
                account_id: Uuid::nil(),
                account_name: account_name.to_string(),
                stock_name: h.stock_name.clone(),
                avg_price,
                market_price,
                quantity: h.quantity,
                invested_value: d.invested_value,
                current_value: d.current_value,
                pnl: d.pnl,
                pnl_percent: d.pnl_percent,
                sector: h
                    .sector
                    .clone()
                    .or_else(|| classified.as_ref().map(|c| c.sector.to_string())),
                subsector: h
                    .subsector
                    .clone()
                    .or_else(|| classified.as_ref().map(|c| c.subsector.to_string())),
                cap_category: None,
                created_at: now,
                updated_at: now,
            }
        })
        .collect()
}

/// Commit a completed session's preview: upsert the account's stock set,
/// recompute its summary, cascade re-aggregation into every view containing
/// it, then mark the session confirmed.
///
/// At-least-once contract: the writes are sequential replace-alls under
/// sorted table locks with no rollback. If anything fails before the final
/// transition the session stays `completed`, and re-running `confirm` is
/// safe because the stock-set replace is idempotent by name.
pub async fn confirm_session(
    store: &JsonStore,
    registry: &SessionRegistry,
    session_id: Uuid,
) -> Result<Account, CommitError> {
    let session = registry.get(session_id).await?;
    if session.status != SessionStatus::Completed {
        return Err(CommitError::NotCompleted(session.status));
    }
    let preview = session.preview.as_ref().ok_or(CommitError::NoPreview)?;
    if preview.mapped.is_empty() {
        return Err(CommitError::NoPreview);
    }

    let txn = store
        .lock_tables(&[
            account_repo::TABLE,
            stock_repo::TABLE,
            view_repo::TABLE,
            view_repo::ACCOUNTS_TABLE,
            view_repo::STOCKS_TABLE,
        ])
        .await;

    let now = Utc::now();
    let account = apply_commit(&txn, &session, preview.mapped.clone(), now).await?;

    registry.mark_confirmed(session_id).await?;
    metrics::counter!("scrape_commits_total").increment(1);
    tracing::info!(
        session_id = %session_id,
        account = %account.name,
        stocks = preview.mapped.len(),
        "scrape session confirmed and committed"
    );
    Ok(account)
}

async fn apply_commit(
    txn: &TableTxn<'_>,
    session: &ScrapeSession,
    mapped: Vec<Stock>,
    now: DateTime<Utc>,
) -> Result<Account, CommitError> {
    // 1. Resolve or create the account by case-insensitive name.
    let mut accounts: Vec<Account> = txn.list_rows(account_repo::TABLE).await?;
    let account_id = match accounts
        .iter()
        .find(|a| a.name.eq_ignore_ascii_case(&session.account_name))
    {
        Some(a) => a.id,
        None => {
            let account = Account::new(&session.account_name);
            let id = account.id;
            accounts.push(account);
            id
        }
    };

    // 2. Replace this account's entire stock set. The scrape result is
    // authoritative: a stock absent from it is dropped. Upserted rows keep
    // `created_at` from any prior row with the same name.
    let all_stocks: Vec<Stock> = txn.list_rows(stock_repo::TABLE).await?;
    let (old_rows, mut new_stocks): (Vec<Stock>, Vec<Stock>) = all_stocks
        .into_iter()
        .partition(|s| s.account_id == account_id);

    let account_name = accounts
        .iter()
        .find(|a| a.id == account_id)
        .map(|a| a.name.clone())
        .unwrap_or_else(|| session.account_name.clone());

    let mut account_rows = Vec::with_capacity(mapped.len());
    for mut row in mapped {
        let prior = old_rows.iter().find(|s| s.stock_name == row.stock_name);
        row.id = prior.map(|s| s.id).unwrap_or_else(Uuid::new_v4);
        row.created_at = prior.map(|s| s.created_at).unwrap_or(now);
        row.updated_at = now;
        row.account_id = account_id;
        row.account_name = account_name.clone();

        // 3. Enrich rows the scrape left unclassified.
        if row.sector.is_none() || row.subsector.is_none() {
            if let Some(info) = enrich::lookup(&row.stock_name) {
                row.sector.get_or_insert_with(|| info.sector.to_string());
                row.subsector
                    .get_or_insert_with(|| info.subsector.to_string());
            }
        }
        account_rows.push(row);
    }

    // 4. Recompute the account summary from the new stock set.
    let summary = math::summarize_stocks(&account_rows);
    if let Some(account) = accounts.iter_mut().find(|a| a.id == account_id) {
        account.invested_value = summary.invested_value;
        account.current_value = summary.current_value;
        account.pnl = summary.pnl;
        account.pnl_percent = summary.pnl_percent;
        account.updated_at = now;
    }

    new_stocks.extend(account_rows);
    txn.replace_rows(stock_repo::TABLE, &new_stocks).await?;
    txn.replace_rows(account_repo::TABLE, &accounts).await?;

    // 5. Cascade: regenerate every view containing this account.
    rebuild_views_containing(txn, account_id, &new_stocks, now).await?;

    let account = accounts
        .into_iter()
        .find(|a| a.id == account_id)
        .expect("account was resolved or created above");
    Ok(account)
}

/// Regenerate the ViewStock set and summary of every view containing the
/// given account, from the union of all member accounts' stocks.
async fn rebuild_views_containing(
    txn: &TableTxn<'_>,
    account_id: Uuid,
    all_stocks: &[Stock],
    now: DateTime<Utc>,
) -> Result<(), CommitError> {
    let memberships: Vec<crate::models::ViewAccount> =
        txn.list_rows(view_repo::ACCOUNTS_TABLE).await?;
    let affected: Vec<Uuid> = memberships
        .iter()
        .filter(|m| m.account_id == account_id)
        .map(|m| m.view_id)
        .collect();
    if affected.is_empty() {
        return Ok(());
    }

    let mut views: Vec<View> = txn.list_rows(view_repo::TABLE).await?;
    let mut view_stocks: Vec<ViewStock> = txn.list_rows(view_repo::STOCKS_TABLE).await?;

    for view_id in affected {
        let member_ids: Vec<Uuid> = memberships
            .iter()
            .filter(|m| m.view_id == view_id)
            .map(|m| m.account_id)
            .collect();
        if let Some(view) = views.iter_mut().find(|v| v.id == view_id) {
            regenerate_view(view, &member_ids, all_stocks, &mut view_stocks, now);
        }
    }

    txn.replace_rows(view_repo::STOCKS_TABLE, &view_stocks).await?;
    txn.replace_rows(view_repo::TABLE, &views).await?;
    Ok(())
}

/// Delete-all-then-insert of one view's ViewStock rows plus its summary,
/// aggregated over the union of its member accounts' holdings.
fn regenerate_view(
    view: &mut View,
    member_ids: &[Uuid],
    all_stocks: &[Stock],
    view_stocks: &mut Vec<ViewStock>,
    now: DateTime<Utc>,
) {
    let union: Vec<Stock> = all_stocks
        .iter()
        .filter(|s| member_ids.contains(&s.account_id))
        .cloned()
        .collect();

    view_stocks.retain(|vs| vs.view_id != view.id);
    let mut own_rows = Vec::new();
    for merged in aggregate::aggregate_stocks_for_view(&union) {
        own_rows.push(ViewStock {
            id: Uuid::new_v4(),
            view_id: view.id,
            stock_name: merged.stock_name,
            account_name: merged.account_name,
            avg_price: merged.avg_price,
            market_price: merged.market_price,
            quantity: merged.quantity,
            invested_value: merged.invested_value,
            current_value: merged.current_value,
            pnl: merged.pnl,
            pnl_percent: merged.pnl_percent,
            sector: merged.sector,
            subsector: merged.subsector,
            updated_at: now,
        });
    }

    // The summary aggregates the view's own (merged) rows, not the raw union.
    view.summary = math::summarize_view_stocks(&own_rows);
    view.updated_at = now;
    view_stocks.extend(own_rows);
}

/// Rebuild a single view from scratch — used right after view creation so a
/// new view starts with its aggregation populated.
pub async fn rebuild_view(store: &JsonStore, view_id: Uuid) -> Result<(), CommitError> {
    let txn = store
        .lock_tables(&[
            stock_repo::TABLE,
            view_repo::TABLE,
            view_repo::ACCOUNTS_TABLE,
            view_repo::STOCKS_TABLE,
        ])
        .await;

    let memberships: Vec<crate::models::ViewAccount> =
        txn.list_rows(view_repo::ACCOUNTS_TABLE).await?;
    let member_ids: Vec<Uuid> = memberships
        .iter()
        .filter(|m| m.view_id == view_id)
        .map(|m| m.account_id)
        .collect();

    let all_stocks: Vec<Stock> = txn.list_rows(stock_repo::TABLE).await?;
    let mut views: Vec<View> = txn.list_rows(view_repo::TABLE).await?;
    let mut view_stocks: Vec<ViewStock> = txn.list_rows(view_repo::STOCKS_TABLE).await?;

    if let Some(view) = views.iter_mut().find(|v| v.id == view_id) {
        regenerate_view(view, &member_ids, &all_stocks, &mut view_stocks, Utc::now());
    }

    txn.replace_rows(view_repo::STOCKS_TABLE, &view_stocks).await?;
    txn.replace_rows(view_repo::TABLE, &views).await?;
    Ok(())
}
