//! Status transition tests

use deploylog::errors::DashboardError;
use deploylog::models::deployment::DeploymentStatus::{self, *};
use deploylog::pipeline::transitions::validate_transition;

fn allowed(from: DeploymentStatus, to: DeploymentStatus) -> bool {
    validate_transition(&from, &to).is_ok()
}

#[test]
fn test_forward_progress() {
    assert!(allowed(Queued, Running));
    assert!(allowed(Queued, Building));
    assert!(allowed(Linting, Testing));
    assert!(allowed(Building, Deploying));
}

#[test]
fn test_backward_progress_is_rejected() {
    assert!(!allowed(Testing, Linting));
    assert!(!allowed(Deploying, Queued));
}

#[test]
fn test_any_in_flight_status_can_finish() {
    for from in [Queued, Running, Linting, Testing, Building, Deploying] {
        for to in [Success, Failed, Error] {
            assert!(allowed(from.clone(), to.clone()), "{from} -> {to}");
        }
    }
}

#[test]
fn test_finished_deployments_can_only_be_requeued() {
    for from in [Success, Failed, Error] {
        assert!(allowed(from.clone(), Queued));
        assert!(allowed(from.clone(), from.clone()));
        assert!(!allowed(from.clone(), Linting));
    }
    assert!(!allowed(Success, Failed));
}

#[test]
fn test_unrecognized_target_is_rejected() {
    let err = validate_transition(&Queued, &DeploymentStatus::parse("paused")).unwrap_err();
    assert!(matches!(err, DashboardError::InvalidTransition { .. }));
}

#[test]
fn test_unrecognized_source_may_move_anywhere() {
    assert!(allowed(DeploymentStatus::parse("cancelled"), Linting));
}
