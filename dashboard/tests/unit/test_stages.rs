//! Stage inference tests

use deploylog::pipeline::stages::{infer_stages, Stage, StageState};

use StageState::{Failed as F, Pending as P, Running as R, Skipped as K, Success as S};

fn states(status: &str, logs: &str) -> Vec<StageState> {
    infer_stages(status, logs).iter().map(|v| v.state).collect()
}

#[test]
fn test_stage_order_is_fixed() {
    let stages: Vec<Stage> = infer_stages("queued", "").iter().map(|v| v.stage).collect();
    assert_eq!(stages, Stage::ALL);
}

#[test]
fn test_unrecognized_statuses_are_all_pending() {
    for status in ["", "   ", "paused", "cancelled", "running", "unknown", " queued", "success "] {
        assert_eq!(states(status, "Build failed"), [P, P, P, P, P], "{status:?}");
    }
}

#[test]
fn test_success_ignores_logs() {
    for logs in ["", "STDERR: Linting failed.", "tests failed and build failed"] {
        assert_eq!(states("success", logs), [S, S, S, S, S]);
    }
    assert_eq!(states("SUCCESS", ""), [S, S, S, S, S]);
}

#[test]
fn test_failure_stage_from_markers() {
    assert_eq!(states("failed", "STDERR: Linting failed."), [S, F, K, K, K]);
    assert_eq!(states("failed", "STDERR: Tests failed."), [S, S, F, K, K]);
    assert_eq!(states("failed", "STDERR: Build failed."), [S, S, S, F, K]);
    assert_eq!(states("error", "BUILD FAILED"), [S, S, S, F, K]);
}

#[test]
fn test_failure_defaults_to_build() {
    assert_eq!(states("failed", ""), [S, S, S, F, K]);
    assert_eq!(states("failed", "segfault"), [S, S, S, F, K]);
}

#[test]
fn test_first_marker_in_table_order_wins() {
    assert_eq!(
        states("failed", "build failed after linting failed"),
        [S, F, K, K, K]
    );
}

#[test]
fn test_in_flight_statuses() {
    assert_eq!(states("queued", ""), [R, P, P, P, P]);
    assert_eq!(states("linting", ""), [S, R, P, P, P]);
    assert_eq!(states("testing", ""), [S, S, R, P, P]);
    assert_eq!(states("building", ""), [S, S, S, R, P]);
    assert_eq!(states("deploying", ""), [S, S, S, R, P]);
}
