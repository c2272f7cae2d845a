use crate::db::{credential_repo, JsonStore, StoreError};

/// Broker login material resolved for one scrape run.
#[derive(Debug, Clone)]
pub struct ScrapeCredentials {
    pub username: String,
    pub password: String,
    pub pin: Option<String>,
}

/// Resolve stored credentials for an account name. `None` means the run
/// falls back to pure-manual mode: the human performs the login in the
/// visible browser while the driver waits for the dashboard.
pub async fn get_credentials_for_scraping(
    store: &JsonStore,
    account_name: &str,
) -> Result<Option<ScrapeCredentials>, StoreError> {
    let row = credential_repo::find_for_account(store, account_name).await?;
    Ok(row.map(|c| ScrapeCredentials {
        username: c.username,
        password: c.password,
        pin: c.pin,
    }))
}
