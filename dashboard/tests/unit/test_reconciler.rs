//! GitHub run reconciliation tests

use std::sync::Arc;
use std::time::Duration;

use tokio_test::{assert_err, assert_ok};

use deploylog::models::deployment::{DeploymentStatus, SYNCED_PROJECT_NAME};
use deploylog::storage::store::{DeploymentStore, JsonStore};
use deploylog::sync::reconciler::{
    http_failure_logs, Reconciler, SyncReport, FETCHING_LOGS, FETCH_ERROR_LOGS,
    MAX_STORED_LOG_CHARS, NO_JOBS_LOGS,
};
use deploylog::sync::syncer::{SyncOutcome, Syncer};
use deploylog::utils::CooldownOptions;

use crate::fakes::{job, run, Failure, FakeRunSource, FlakyStore};

fn reconciler(store: Arc<dyn DeploymentStore>, source: Arc<FakeRunSource>) -> Reconciler {
    Reconciler::new(store, source, 10)
}

#[tokio::test]
async fn test_completed_run_is_mirrored_with_logs() {
    let store = Arc::new(JsonStore::in_memory());
    let source = FakeRunSource::new();
    let mut completed = run(101, "completed", Some("success"), 0);
    completed.head_commit = None;
    completed.head_branch = None;
    source.set_runs(vec![completed.clone()]);
    source.set_jobs(101, Ok(job(9001, &[("Build", "completed")])));
    source.set_log(9001, Ok("2025-03-01T10:00:00Z Build succeeded"));

    let report = assert_ok!(reconciler(store.clone(), source).sync_pass().await);
    assert_eq!(
        report,
        SyncReport {
            fetched: 1,
            created: 1,
            updated: 0,
            failed: 0
        }
    );

    let dep = store.get("101").await.unwrap().unwrap();
    assert_eq!(dep.project_name, SYNCED_PROJECT_NAME);
    assert_eq!(dep.status, DeploymentStatus::Success);
    assert_eq!(dep.branch, "main");
    assert_eq!(dep.commit_hash, "sha101");
    assert_eq!(dep.commit_message.as_deref(), Some("GitHub Run"));
    assert_eq!(dep.logs.as_deref(), Some("2025-03-01T10:00:00Z Build succeeded"));
    assert_eq!(dep.created_at, completed.created_at);
    assert_eq!(dep.updated_at, completed.updated_at);
    assert_eq!(dep.ended_at, Some(completed.updated_at));
}

#[tokio::test]
async fn test_sync_is_idempotent() {
    let store = Arc::new(JsonStore::in_memory());
    let source = FakeRunSource::new();
    source.set_runs(vec![
        run(1, "completed", Some("failure"), 0),
        run(2, "in_progress", None, 1),
        run(3, "queued", None, 2),
    ]);
    source.set_jobs(1, Ok(job(11, &[("Test", "completed")])));
    source.set_log(11, Ok("STDERR: Tests failed."));
    source.set_jobs(2, Ok(job(22, &[("Lint", "in_progress")])));

    let reconciler = reconciler(store.clone(), source);

    let first = reconciler.sync_pass().await.unwrap();
    let after_first = store.list_recent(100).await.unwrap();
    let second = reconciler.sync_pass().await.unwrap();
    let after_second = store.list_recent(100).await.unwrap();

    assert_eq!(first.created, 3);
    assert_eq!(second.created, 0);
    assert_eq!(second.updated, 3);
    assert_eq!(after_first, after_second);
}

#[tokio::test]
async fn test_failed_log_fetch_never_blanks_real_logs() {
    let store = Arc::new(JsonStore::in_memory());
    let source = FakeRunSource::new();
    source.set_runs(vec![run(7, "completed", Some("failure"), 0)]);
    source.set_jobs(7, Ok(job(70, &[("Build", "completed")])));
    source.set_log(70, Ok("STDERR: Build failed."));

    let reconciler = reconciler(store.clone(), source.clone());
    reconciler.sync_pass().await.unwrap();

    source.set_log(70, Err(Failure::Status(403)));
    reconciler.sync_pass().await.unwrap();
    source.set_jobs(7, Err(Failure::Transport));
    reconciler.sync_pass().await.unwrap();

    let dep = store.get("7").await.unwrap().unwrap();
    assert_eq!(dep.logs.as_deref(), Some("STDERR: Build failed."));
}

#[tokio::test]
async fn test_placeholder_replaces_pending_logs() {
    let store = Arc::new(JsonStore::in_memory());
    let source = FakeRunSource::new();
    source.set_runs(vec![run(8, "queued", None, 0)]);

    let reconciler = reconciler(store.clone(), source.clone());
    reconciler.sync_pass().await.unwrap();
    let dep = store.get("8").await.unwrap().unwrap();
    assert_eq!(dep.logs.as_deref(), Some(FETCHING_LOGS));
    assert_eq!(dep.status, DeploymentStatus::Queued);

    source.set_runs(vec![run(8, "completed", Some("failure"), 0)]);
    source.set_jobs(8, Ok(job(80, &[])));
    source.set_log(80, Err(Failure::Status(404)));
    reconciler.sync_pass().await.unwrap();

    let dep = store.get("8").await.unwrap().unwrap();
    assert_eq!(dep.logs, Some(http_failure_logs(404)));
    assert_eq!(dep.status, DeploymentStatus::Failed);
}

#[tokio::test]
async fn test_log_fetch_outcomes_on_create() {
    let store = Arc::new(JsonStore::in_memory());
    let source = FakeRunSource::new();
    source.set_runs(vec![
        run(1, "completed", Some("success"), 0),
        run(2, "completed", Some("success"), 1),
        run(3, "completed", Some("success"), 2),
    ]);
    // run 1 reports no jobs
    source.set_jobs(2, Err(Failure::Transport));
    source.set_jobs(3, Ok(job(30, &[])));
    source.set_log(30, Err(Failure::Status(410)));

    reconciler(store.clone(), source).sync_pass().await.unwrap();

    let logs = |dep: Option<deploylog::models::deployment::Deployment>| dep.unwrap().logs.unwrap();
    assert_eq!(logs(store.get("1").await.unwrap()), NO_JOBS_LOGS);
    assert_eq!(logs(store.get("2").await.unwrap()), FETCH_ERROR_LOGS);
    assert_eq!(logs(store.get("3").await.unwrap()), http_failure_logs(410));
}

#[tokio::test]
async fn test_empty_log_body_leaves_pending_placeholder() {
    let store = Arc::new(JsonStore::in_memory());
    let source = FakeRunSource::new();
    source.set_runs(vec![run(5, "completed", Some("success"), 0)]);
    source.set_jobs(5, Ok(job(50, &[("Build", "completed")])));
    source.set_log(50, Ok(""));

    let reconciler = reconciler(store.clone(), source.clone());
    reconciler.sync_pass().await.unwrap();
    let dep = store.get("5").await.unwrap().unwrap();
    assert_eq!(dep.logs.as_deref(), Some(FETCHING_LOGS));

    // The next pass that gets real text fills it in
    source.set_log(50, Ok("STDOUT: Build passed."));
    reconciler.sync_pass().await.unwrap();
    let dep = store.get("5").await.unwrap().unwrap();
    assert_eq!(dep.logs.as_deref(), Some("STDOUT: Build passed."));
}

#[tokio::test]
async fn test_oversized_logs_keep_their_tail() {
    let store = Arc::new(JsonStore::in_memory());
    let source = FakeRunSource::new();
    let log = format!("{}\nSTDERR: Build failed.", "x".repeat(MAX_STORED_LOG_CHARS));
    source.set_runs(vec![run(6, "completed", Some("failure"), 0)]);
    source.set_jobs(6, Ok(job(60, &[("Build", "completed")])));
    source.set_log(60, Ok(&log));

    reconciler(store.clone(), source).sync_pass().await.unwrap();

    let logs = store.get("6").await.unwrap().unwrap().logs.unwrap();
    assert_eq!(logs.chars().count(), MAX_STORED_LOG_CHARS);
    assert!(logs.ends_with("STDERR: Build failed."));
}

#[tokio::test]
async fn test_batch_fetch_failure_writes_nothing() {
    let store = Arc::new(JsonStore::in_memory());
    let source = FakeRunSource::new();
    source.set_runs(vec![run(1, "completed", Some("success"), 0)]);
    source.fail_listing(Some(Failure::Status(500)));

    assert_err!(reconciler(store.clone(), source).sync_pass().await);
    assert!(store.list_recent(100).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_one_failing_run_does_not_stop_the_batch() {
    let store = FlakyStore::new();
    store.fail_writes_for("2");
    let source = FakeRunSource::new();
    source.set_runs(vec![
        run(1, "queued", None, 0),
        run(2, "queued", None, 1),
        run(3, "queued", None, 2),
    ]);

    let report = reconciler(store.clone(), source).sync_pass().await.unwrap();

    assert_eq!(report.created, 2);
    assert_eq!(report.failed, 1);
    assert!(store.get("1").await.unwrap().is_some());
    assert!(store.get("2").await.unwrap().is_none());
    assert!(store.get("3").await.unwrap().is_some());
}

#[tokio::test]
async fn test_in_progress_run_is_refined_from_steps() {
    let store = Arc::new(JsonStore::in_memory());
    let source = FakeRunSource::new();
    source.set_runs(vec![
        run(1, "in_progress", None, 0),
        run(2, "in_progress", None, 1),
        run(3, "in_progress", None, 2),
        run(4, "in_progress", None, 3),
    ]);
    source.set_jobs(
        1,
        Ok(job(10, &[("Checkout", "completed"), ("Run unit tests", "in_progress")])),
    );
    source.set_jobs(2, Ok(job(20, &[("docker push", "in_progress")])));
    source.set_jobs(3, Ok(job(30, &[("Deploy", "in_progress")])));
    source.set_jobs(4, Err(Failure::RateLimited));

    reconciler(store.clone(), source).sync_pass().await.unwrap();

    let status = |id: &'static str| {
        let store = store.clone();
        async move { store.get(id).await.unwrap().unwrap().status }
    };
    assert_eq!(status("1").await, DeploymentStatus::Testing);
    assert_eq!(status("2").await, DeploymentStatus::Building);
    assert_eq!(status("3").await, DeploymentStatus::Running);
    assert_eq!(status("4").await, DeploymentStatus::Running);
}

#[tokio::test]
async fn test_terminal_state_tracks_ended_at() {
    let store = Arc::new(JsonStore::in_memory());
    let source = FakeRunSource::new();
    source.set_runs(vec![
        run(1, "completed", Some("neutral"), 0),
        run(2, "completed", Some("cancelled"), 1),
        run(3, "completed", None, 2),
    ]);

    let reconciler = reconciler(store.clone(), source.clone());
    reconciler.sync_pass().await.unwrap();

    for dep in store.list_recent(10).await.unwrap() {
        assert!(dep.status.is_terminal(), "{} is {}", dep.id, dep.status);
        assert_eq!(dep.ended_at, Some(dep.updated_at));
    }
    assert_eq!(
        store.get("1").await.unwrap().unwrap().status,
        DeploymentStatus::Success
    );
    assert_eq!(
        store.get("3").await.unwrap().unwrap().status,
        DeploymentStatus::Failed
    );

    // Re-run of a finished workflow
    source.set_runs(vec![run(2, "in_progress", None, 1)]);
    reconciler.sync_pass().await.unwrap();
    let rerun = store.get("2").await.unwrap().unwrap();
    assert_eq!(rerun.status, DeploymentStatus::Running);
    assert!(rerun.ended_at.is_none());
}

#[tokio::test]
async fn test_run_window_is_requested() {
    let store = Arc::new(JsonStore::in_memory());
    let source = FakeRunSource::new();
    source.set_runs((1..=15).map(|i| run(i, "queued", None, i as i64)).collect());

    let report = Reconciler::new(store.clone(), source.clone(), 10)
        .sync_pass()
        .await
        .unwrap();

    assert_eq!(report.fetched, 10);
    assert_eq!(source.requested_limits.lock().unwrap().as_slice(), [10]);
    assert_eq!(store.list_recent(100).await.unwrap().len(), 10);
}

#[tokio::test]
async fn test_failed_pass_puts_scheduled_syncs_in_cooldown() {
    let store = Arc::new(JsonStore::in_memory());
    let source = FakeRunSource::new();
    source.fail_listing(Some(Failure::Status(502)));
    let syncer = Syncer::with_cooldown(
        reconciler(store.clone(), source.clone()),
        CooldownOptions {
            base_delay: Duration::from_secs(60),
            ..Default::default()
        },
    );

    assert_err!(syncer.trigger_sync().await);
    assert_eq!(syncer.get_state().await.err_streak, 1);
    assert_eq!(
        assert_ok!(syncer.trigger_sync().await),
        SyncOutcome::CoolingDown
    );

    // A user-requested sync ignores the cooldown and clears it on success
    source.fail_listing(None);
    source.set_runs(vec![run(1, "queued", None, 0)]);
    let report = assert_ok!(syncer.sync_now().await);
    assert_eq!(report.created, 1);

    let state = syncer.get_state().await;
    assert_eq!(state.err_streak, 0);
    assert!(!state.is_in_cooldown());
    assert_eq!(state.last_report, Some(report));
}
