mod common;

use rust_decimal::Decimal;

use foliobot::db::{account_repo, stock_repo, view_repo};
use foliobot::models::SessionStatus;
use foliobot::session::commit;

#[tokio::test]
async fn test_confirm_creates_account_with_recomputed_summary() {
    let env = common::setup().await;
    let sid = common::completed_session(
        &env,
        "zerodha-main",
        vec![
            common::raw_holding("TCS", 10, 3000, 3300),
            common::raw_holding("INFY", 20, 1500, 1400),
        ],
    )
    .await;

    let account = commit::confirm_session(&env.store, &env.sessions, sid)
        .await
        .expect("confirm should succeed");

    // invested = 10*3000 + 20*1500 = 60000; current = 33000 + 28000 = 61000
    assert_eq!(account.invested_value, Decimal::from(60_000));
    assert_eq!(account.current_value, Decimal::from(61_000));
    assert_eq!(account.pnl, Decimal::from(1_000));

    let stocks = stock_repo::list_for_account(&env.store, account.id)
        .await
        .unwrap();
    assert_eq!(stocks.len(), 2);
    // Derived fields come from our math, not from the scrape.
    let tcs = stocks.iter().find(|s| s.stock_name == "TCS").unwrap();
    assert_eq!(tcs.invested_value, Decimal::from(30_000));
    // Known names are enriched when the scrape omitted classification.
    assert_eq!(tcs.sector.as_deref(), Some("Information Technology"));

    let session = env.sessions.get(sid).await.unwrap();
    assert_eq!(session.status, SessionStatus::Confirmed);
}

#[tokio::test]
async fn test_confirm_is_only_legal_from_completed() {
    let env = common::setup().await;
    let session = env.sessions.create("acct", "groww").await.unwrap();

    // Still pending — no preview, not completed.
    let err = commit::confirm_session(&env.store, &env.sessions, session.id)
        .await
        .expect_err("pending session must not confirm");
    assert!(err.to_string().contains("pending"));

    // And a confirmed session is a sink.
    let sid = common::completed_session(&env, "acct2", vec![common::raw_holding("TCS", 1, 10, 10)])
        .await;
    commit::confirm_session(&env.store, &env.sessions, sid)
        .await
        .unwrap();
    let err = commit::confirm_session(&env.store, &env.sessions, sid)
        .await
        .expect_err("confirmed session must not confirm again");
    assert!(err.to_string().contains("confirmed"));
}

#[tokio::test]
async fn test_recommit_identical_preview_is_idempotent() {
    let env = common::setup().await;
    let holdings = vec![
        common::raw_holding("TCS", 10, 3000, 3300),
        common::raw_holding("INFY", 20, 1500, 1400),
    ];

    let first = common::completed_session(&env, "acct", holdings.clone()).await;
    commit::confirm_session(&env.store, &env.sessions, first)
        .await
        .unwrap();
    let account = account_repo::find_by_name(&env.store, "acct")
        .await
        .unwrap()
        .unwrap();
    let before = stock_repo::list_for_account(&env.store, account.id)
        .await
        .unwrap();

    // A second scrape with the same result commits onto the same rows.
    let second = common::completed_session(&env, "acct", holdings).await;
    commit::confirm_session(&env.store, &env.sessions, second)
        .await
        .unwrap();
    let after = stock_repo::list_for_account(&env.store, account.id)
        .await
        .unwrap();

    assert_eq!(before.len(), after.len(), "no duplicate rows");
    for row in &after {
        let prior = before
            .iter()
            .find(|s| s.stock_name == row.stock_name)
            .expect("same stock set");
        assert_eq!(prior.id, row.id, "upsert keeps row identity");
        assert_eq!(prior.created_at, row.created_at, "created_at preserved");
        assert_eq!(prior.quantity, row.quantity);
    }
}

#[tokio::test]
async fn test_rescrape_drops_absent_stocks() {
    let env = common::setup().await;

    let first = common::completed_session(
        &env,
        "acct",
        vec![
            common::raw_holding("X", 5, 100, 110),
            common::raw_holding("Y", 5, 200, 210),
        ],
    )
    .await;
    commit::confirm_session(&env.store, &env.sessions, first)
        .await
        .unwrap();

    // The new scrape only contains X — Y must be removed.
    let second =
        common::completed_session(&env, "acct", vec![common::raw_holding("X", 7, 100, 120)]).await;
    let account = commit::confirm_session(&env.store, &env.sessions, second)
        .await
        .unwrap();

    let stocks = stock_repo::list_for_account(&env.store, account.id)
        .await
        .unwrap();
    assert_eq!(stocks.len(), 1);
    assert_eq!(stocks[0].stock_name, "X");
    assert_eq!(stocks[0].quantity, Decimal::from(7));
}

#[tokio::test]
async fn test_rescrape_leaves_other_accounts_untouched() {
    let env = common::setup().await;

    let a = common::completed_session(&env, "acct-a", vec![common::raw_holding("X", 5, 100, 110)])
        .await;
    commit::confirm_session(&env.store, &env.sessions, a).await.unwrap();
    let b = common::completed_session(&env, "acct-b", vec![common::raw_holding("X", 9, 90, 110)])
        .await;
    commit::confirm_session(&env.store, &env.sessions, b).await.unwrap();

    let a2 =
        common::completed_session(&env, "acct-a", vec![common::raw_holding("Z", 1, 10, 10)]).await;
    commit::confirm_session(&env.store, &env.sessions, a2)
        .await
        .unwrap();

    let account_b = account_repo::find_by_name(&env.store, "acct-b")
        .await
        .unwrap()
        .unwrap();
    let stocks_b = stock_repo::list_for_account(&env.store, account_b.id)
        .await
        .unwrap();
    assert_eq!(stocks_b.len(), 1);
    assert_eq!(stocks_b[0].stock_name, "X");
    assert_eq!(stocks_b[0].quantity, Decimal::from(9));
}

#[tokio::test]
async fn test_view_cascade_on_rescrape() {
    let env = common::setup().await;

    // Account A holds 10 @ 100 of ABC, account B holds 5 @ 130.
    let a = common::completed_session(&env, "acct-a", vec![common::raw_holding("ABC", 10, 100, 120)])
        .await;
    commit::confirm_session(&env.store, &env.sessions, a).await.unwrap();
    let b = common::completed_session(&env, "acct-b", vec![common::raw_holding("ABC", 5, 130, 120)])
        .await;
    commit::confirm_session(&env.store, &env.sessions, b).await.unwrap();

    let account_a = account_repo::find_by_name(&env.store, "acct-a").await.unwrap().unwrap();
    let account_b = account_repo::find_by_name(&env.store, "acct-b").await.unwrap().unwrap();

    let view = view_repo::create(&env.store, "combined", &[account_a.id, account_b.id])
        .await
        .unwrap();
    commit::rebuild_view(&env.store, view.id).await.unwrap();

    // Weighted average: (10*100 + 5*130) / 15 = 110, exactly.
    let merged = view_repo::list_view_stocks(&env.store, view.id).await.unwrap();
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].quantity, Decimal::from(15));
    assert_eq!(merged[0].avg_price, Decimal::from(110));

    let summary_before = view_repo::get(&env.store, view.id).await.unwrap().unwrap().summary;

    // Re-scraping A must cascade into the view without touching it directly.
    let a2 = common::completed_session(&env, "acct-a", vec![common::raw_holding("ABC", 20, 105, 120)])
        .await;
    commit::confirm_session(&env.store, &env.sessions, a2)
        .await
        .unwrap();

    let merged = view_repo::list_view_stocks(&env.store, view.id).await.unwrap();
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].quantity, Decimal::from(25));
    // (20*105 + 5*130) / 25 = 2750 / 25 = 110
    assert_eq!(merged[0].avg_price, Decimal::from(110));

    let summary_after = view_repo::get(&env.store, view.id).await.unwrap().unwrap().summary;
    assert_ne!(summary_before, summary_after, "view summary must move");
    assert_eq!(summary_after.quantity, Decimal::from(25));
}

#[tokio::test]
async fn test_account_name_uniqueness_is_case_insensitive() {
    let env = common::setup().await;

    account_repo::create(&env.store, "Zerodha").await.unwrap();
    let err = account_repo::create(&env.store, "zerodha")
        .await
        .expect_err("case-insensitive duplicate must be rejected");
    assert!(err.to_string().contains("already exists"));

    // The failed create must not have mutated stored state.
    let accounts = account_repo::list(&env.store).await.unwrap();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].name, "Zerodha");
}

#[tokio::test]
async fn test_view_name_uniqueness_is_case_insensitive() {
    let env = common::setup().await;
    let account = account_repo::create(&env.store, "acct").await.unwrap();

    view_repo::create(&env.store, "Family", &[account.id]).await.unwrap();
    let err = view_repo::create(&env.store, "FAMILY", &[account.id])
        .await
        .expect_err("case-insensitive duplicate must be rejected");
    assert!(err.to_string().contains("already exists"));
    assert_eq!(view_repo::list(&env.store).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_concurrent_commits_for_different_accounts() {
    let env = common::setup().await;

    let a = common::completed_session(&env, "acct-a", vec![common::raw_holding("X", 1, 10, 10)])
        .await;
    let b = common::completed_session(&env, "acct-b", vec![common::raw_holding("Y", 2, 20, 20)])
        .await;

    let (ra, rb) = tokio::join!(
        commit::confirm_session(&env.store, &env.sessions, a),
        commit::confirm_session(&env.store, &env.sessions, b),
    );
    let account_a = ra.expect("commit A should succeed");
    let account_b = rb.expect("commit B should succeed");

    // Neither commit may clobber the other's replace-all write.
    let stocks_a = stock_repo::list_for_account(&env.store, account_a.id).await.unwrap();
    let stocks_b = stock_repo::list_for_account(&env.store, account_b.id).await.unwrap();
    assert_eq!(stocks_a.len(), 1);
    assert_eq!(stocks_b.len(), 1);
    assert_eq!(stocks_a[0].stock_name, "X");
    assert_eq!(stocks_b[0].stock_name, "Y");
}
