//! Scripted pipeline runs for demos and end-to-end checks
//!
//! Each scenario creates a deployment and walks it through the pipeline with
//! the same create/update operations the REST API uses.

use std::future::Future;
use std::time::Duration;

use tracing::info;

use crate::errors::DashboardError;
use crate::models::deployment::Deployment;
use crate::pipeline::lifecycle::{create_deployment, update_deployment, CreateInput};
use crate::storage::store::DeploymentStore;

/// A scripted pipeline outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    Success,
    FailAtLint,
    FailAtTest,
    FailAtBuild,
}

impl Scenario {
    /// Parse the CLI spelling: `success`, `lint`, `test` or `build`
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "success" => Some(Scenario::Success),
            "lint" => Some(Scenario::FailAtLint),
            "test" => Some(Scenario::FailAtTest),
            "build" => Some(Scenario::FailAtBuild),
            _ => None,
        }
    }

    fn input(&self) -> CreateInput {
        match self {
            Scenario::Success => CreateInput {
                project_name: Some("DeployLog-Simulation".into()),
                status: Some("queued".into()),
                branch: Some("feature/observability".into()),
                commit_hash: Some("a1b2c3d".into()),
                commit_message: Some("Testing status updates".into()),
            },
            _ => CreateInput {
                project_name: Some("DeployLog-Failure-Test".into()),
                status: Some("queued".into()),
                branch: Some("bugfix/login-issue".into()),
                commit_hash: Some("bad1dead".into()),
                commit_message: Some("Fixing login bug (fingers crossed)".into()),
            },
        }
    }
}

/// One pipeline step: the status it enters, the log lines it appends on
/// success and the lines that end the run when it fails
struct Step {
    status: &'static str,
    passed: &'static str,
    failed: &'static str,
    fails_in: Scenario,
}

const STEPS: [Step; 3] = [
    Step {
        status: "linting",
        passed: "STDOUT: Linting passed.\n",
        failed: "STDOUT: Running ESlint...\n\
                 STDERR: Error: Unexpected token in auth.ts:5\n\
                 STDERR: Linting failed.\n",
        fails_in: Scenario::FailAtLint,
    },
    Step {
        status: "testing",
        passed: "STDOUT: Tests passed (23/23).\n",
        failed: "STDOUT: Running Jest suite...\n\
                 STDERR: FAIL app/auth.test.ts\n\
                 STDERR: Expected 200, got 500.\n\
                 STDERR: Tests failed.\n",
        fails_in: Scenario::FailAtTest,
    },
    Step {
        status: "building",
        passed: "STDOUT: Build successful.\n",
        failed: "STDOUT: Docker build -t app:latest .\n\
                 STDERR: COPY failed: file not found: package-lock.json\n\
                 STDERR: Build failed.\n",
        fails_in: Scenario::FailAtBuild,
    },
];

/// Run `scenario` against `store`, pausing `step_delay` between steps
pub async fn simulate<S, F>(
    store: &dyn DeploymentStore,
    scenario: Scenario,
    step_delay: Duration,
    sleep_fn: S,
) -> Result<Deployment, DashboardError>
where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    let deployment = create_deployment(store, scenario.input()).await?;
    let id = deployment.id;
    info!("Simulating {:?} on deployment {}", scenario, id);

    let mut logs = String::from("STDOUT: Starting pipeline...\n");

    for step in &STEPS {
        sleep_fn(step_delay).await;
        update_deployment(store, &id, Some(step.status), None).await?;

        if step.fails_in == scenario {
            logs.push_str(step.failed);
            sleep_fn(step_delay).await;
            return update_deployment(store, &id, Some("failed"), Some(logs)).await;
        }
        logs.push_str(step.passed);
    }

    sleep_fn(step_delay).await;
    logs.push_str("STDOUT: Deploying to staging...\nSTDOUT: Success.\n");
    update_deployment(store, &id, Some("success"), Some(logs)).await
}
