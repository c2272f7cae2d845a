mod common;

use std::sync::atomic::Ordering;

use foliobot::models::SessionStatus;

#[tokio::test]
async fn test_create_rejects_empty_account_name() {
    let env = common::setup().await;
    let err = env
        .sessions
        .create("   ", "groww")
        .await
        .expect_err("blank account name must be rejected");
    assert!(err.to_string().contains("account name"));
}

#[tokio::test]
async fn test_lifecycle_happy_path() {
    let env = common::setup().await;
    let session = env.sessions.create("acct", "groww").await.unwrap();
    assert_eq!(session.status, SessionStatus::Pending);
    assert_eq!(session.progress.percent, 0);

    env.sessions.mark_running(session.id).await.unwrap();
    env.sessions
        .advance_progress(session.id, 40, "logging in")
        .await
        .unwrap();
    env.sessions.mark_completed(session.id).await.unwrap();

    let session = env.sessions.get(session.id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.progress.percent, 100);
}

#[tokio::test]
async fn test_mark_running_requires_pending() {
    let env = common::setup().await;
    let session = env.sessions.create("acct", "groww").await.unwrap();
    env.sessions.mark_running(session.id).await.unwrap();

    let err = env
        .sessions
        .mark_running(session.id)
        .await
        .expect_err("running → running is illegal");
    assert!(err.to_string().contains("illegal transition"));
}

#[tokio::test]
async fn test_progress_is_monotonic() {
    let env = common::setup().await;
    let session = env.sessions.create("acct", "groww").await.unwrap();
    env.sessions.mark_running(session.id).await.unwrap();

    env.sessions
        .advance_progress(session.id, 60, "dashboard")
        .await
        .unwrap();
    // A stale lower update is dropped, not an error.
    env.sessions
        .advance_progress(session.id, 25, "login")
        .await
        .unwrap();

    let session = env.sessions.get(session.id).await.unwrap();
    assert_eq!(session.progress.percent, 60);
    assert_eq!(session.progress.stage, "dashboard");
}

#[tokio::test]
async fn test_progress_is_clamped_to_100() {
    let env = common::setup().await;
    let session = env.sessions.create("acct", "groww").await.unwrap();
    env.sessions.mark_running(session.id).await.unwrap();
    env.sessions
        .advance_progress(session.id, 150, "overshoot")
        .await
        .unwrap();
    let session = env.sessions.get(session.id).await.unwrap();
    assert_eq!(session.progress.percent, 100);
}

#[tokio::test]
async fn test_terminal_states_are_sinks() {
    let env = common::setup().await;
    let session = env.sessions.create("acct", "groww").await.unwrap();
    env.sessions.mark_running(session.id).await.unwrap();
    env.sessions.mark_cancelled(session.id).await.unwrap();

    // A detached scrape task finishing after the cancel must not resurrect
    // the session.
    env.sessions.mark_completed(session.id).await.unwrap();
    env.sessions.mark_failed(session.id, "late failure").await.unwrap();
    env.sessions
        .advance_progress(session.id, 90, "late progress")
        .await
        .unwrap();

    let session = env.sessions.get(session.id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Cancelled);
    assert_eq!(session.progress.percent, 0);
    assert!(session.error.is_none());
}

#[tokio::test]
async fn test_cancel_is_idempotent_and_raises_flag() {
    let env = common::setup().await;
    let session = env.sessions.create("acct", "groww").await.unwrap();
    env.sessions.mark_running(session.id).await.unwrap();

    let flag = env.sessions.cancel_flag(session.id).await;
    assert!(!flag.load(Ordering::Relaxed));

    env.sessions.mark_cancelled(session.id).await.unwrap();
    env.sessions.mark_cancelled(session.id).await.unwrap();

    assert!(flag.load(Ordering::Relaxed), "driver-visible flag raised");
    let session = env.sessions.get(session.id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Cancelled);
}

#[tokio::test]
async fn test_confirm_only_from_completed() {
    let env = common::setup().await;
    let session = env.sessions.create("acct", "groww").await.unwrap();
    env.sessions.mark_running(session.id).await.unwrap();

    let err = env
        .sessions
        .mark_confirmed(session.id)
        .await
        .expect_err("running → confirmed is illegal");
    assert!(err.to_string().contains("illegal transition"));

    env.sessions.mark_completed(session.id).await.unwrap();
    env.sessions.mark_confirmed(session.id).await.unwrap();
    let session = env.sessions.get(session.id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Confirmed);
}

#[tokio::test]
async fn test_failure_records_error_message() {
    let env = common::setup().await;
    let session = env.sessions.create("acct", "groww").await.unwrap();
    env.sessions.mark_running(session.id).await.unwrap();
    env.sessions
        .mark_failed(session.id, "dashboard never loaded")
        .await
        .unwrap();

    let session = env.sessions.get(session.id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Failed);
    assert_eq!(session.error.as_deref(), Some("dashboard never loaded"));
}

#[tokio::test]
async fn test_sessions_survive_registry_restart() {
    let env = common::setup().await;
    let session = env.sessions.create("acct", "groww").await.unwrap();
    env.sessions.mark_running(session.id).await.unwrap();

    // A fresh registry over the same store sees the persisted state.
    let reopened = foliobot::session::SessionRegistry::new(env.store.clone());
    let loaded = reopened.get(session.id).await.unwrap();
    assert_eq!(loaded.status, SessionStatus::Running);
    assert_eq!(loaded.account_name, "acct");
}
