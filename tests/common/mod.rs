#![allow(dead_code)]

use std::sync::Arc;

use rust_decimal::Decimal;
use tempfile::TempDir;
use uuid::Uuid;

use foliobot::db::JsonStore;
use foliobot::models::{RawHolding, ScrapePreview};
use foliobot::session::commit;
use foliobot::session::SessionRegistry;

pub struct TestEnv {
    pub store: Arc<JsonStore>,
    pub sessions: Arc<SessionRegistry>,
    // Keeps the data dir alive for the duration of the test.
    _dir: TempDir,
}

pub async fn setup() -> TestEnv {
    let dir = TempDir::new().expect("temp dir");
    let store = Arc::new(
        JsonStore::open(dir.path())
            .await
            .expect("store should open"),
    );
    let sessions = Arc::new(SessionRegistry::new(store.clone()));
    TestEnv {
        store,
        sessions,
        _dir: dir,
    }
}

pub fn raw_holding(name: &str, quantity: i64, avg_price: i64, market_price: i64) -> RawHolding {
    RawHolding {
        stock_name: name.into(),
        quantity: Decimal::from(quantity),
        avg_price: Some(Decimal::from(avg_price)),
        market_price: Some(Decimal::from(market_price)),
        sector: None,
        subsector: None,
    }
}

/// Drive a session through create → running → preview → completed, as the
/// scrape task would, so commit tests can start from a confirmable state.
pub async fn completed_session(env: &TestEnv, account: &str, raw: Vec<RawHolding>) -> Uuid {
    let session = env
        .sessions
        .create(account, "groww")
        .await
        .expect("session should be created");
    env.sessions
        .mark_running(session.id)
        .await
        .expect("pending → running");

    let mapped = commit::map_preview_stocks(&raw, account);
    env.sessions
        .attach_preview(session.id, ScrapePreview { raw, mapped })
        .await
        .expect("preview should attach");
    env.sessions
        .mark_completed(session.id)
        .await
        .expect("running → completed");
    session.id
}
