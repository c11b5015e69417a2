//! Configuration and connectivity checklist printed by `--diagnostic`

use std::fmt;

use colored::Colorize;

use crate::http::github::{GithubRunSource, RunSource};
use crate::storage::layout::StorageLayout;
use crate::storage::settings::{Credentials, Settings};
use crate::storage::store::{DeploymentStore, JsonStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// Result of a single diagnostic check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    pub name: &'static str,
    pub status: CheckStatus,
    pub detail: String,
}

impl Check {
    fn new(name: &'static str, status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            name,
            status,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = match self.status {
            CheckStatus::Pass => "[ OK ]".green().bold(),
            CheckStatus::Warn => "[WARN]".yellow().bold(),
            CheckStatus::Fail => "[FAIL]".red().bold(),
        };
        write!(f, "{} {:<18} {}", mark, self.name, self.detail)
    }
}

/// Check that the run source answers a minimal listing
pub async fn check_github(source: &dyn RunSource) -> Check {
    match source.list_recent_runs(1).await {
        Ok(runs) => Check::new(
            "GitHub API",
            CheckStatus::Pass,
            format!("reachable ({} run(s) visible)", runs.len()),
        ),
        Err(e) if e.is_rate_limited() => Check::new(
            "GitHub API",
            CheckStatus::Warn,
            format!("rate limited: {e}"),
        ),
        Err(e) => Check::new("GitHub API", CheckStatus::Fail, e.to_string()),
    }
}

/// Check which credentials are present
pub fn check_credentials(credentials: &Credentials) -> Vec<Check> {
    let github = match credentials.github_token {
        Some(_) => Check::new("GITHUB_TOKEN", CheckStatus::Pass, "present"),
        None => Check::new(
            "GITHUB_TOKEN",
            CheckStatus::Warn,
            "not set; unauthenticated requests are rate limited and private logs are hidden",
        ),
    };
    let gemini = match credentials.gemini_api_key {
        Some(_) => Check::new("GEMINI_API_KEY", CheckStatus::Pass, "present"),
        None => Check::new(
            "GEMINI_API_KEY",
            CheckStatus::Fail,
            "not set; log analysis is unavailable",
        ),
    };
    vec![github, gemini]
}

/// Run every check against `layout` and the environment
pub async fn collect_checks(layout: &StorageLayout, credentials: &Credentials) -> Vec<Check> {
    let mut checks = Vec::new();

    let settings_file = layout.settings_file();
    let mut settings = match Settings::load(&settings_file).await {
        Ok(settings) => {
            let detail = if settings_file.exists().await {
                format!("loaded from {}", settings_file.path().display())
            } else {
                "defaults (no settings file)".to_string()
            };
            checks.push(Check::new("Settings", CheckStatus::Pass, detail));
            settings
        }
        Err(e) => {
            checks.push(Check::new("Settings", CheckStatus::Fail, e.to_string()));
            Settings::default()
        }
    };
    settings.apply_env_overrides();

    let data_file = layout.deployments_file();
    if data_file.exists().await {
        let check = match JsonStore::open(data_file.into()).await {
            Ok(store) => match store.list_recent(usize::MAX).await {
                Ok(all) => Check::new(
                    "Deployment data",
                    CheckStatus::Pass,
                    format!("{} deployment(s)", all.len()),
                ),
                Err(e) => Check::new("Deployment data", CheckStatus::Fail, e.to_string()),
            },
            Err(e) => Check::new("Deployment data", CheckStatus::Fail, e.to_string()),
        };
        checks.push(check);
    } else {
        checks.push(Check::new(
            "Deployment data",
            CheckStatus::Warn,
            "no data file yet; it is created on first write",
        ));
    }

    checks.extend(check_credentials(credentials));

    match GithubRunSource::new(&settings.github, credentials.github_token.as_ref()) {
        Ok(source) => checks.push(check_github(&source).await),
        Err(e) => checks.push(Check::new("GitHub API", CheckStatus::Fail, e.to_string())),
    }

    checks
}

/// Print the checklist, returning `true` when nothing failed
pub async fn run_diagnostic(layout: &StorageLayout, credentials: &Credentials) -> bool {
    println!("{}", "DeployLog diagnostics".bold());
    println!("data directory: {}", layout.base_dir.display());
    println!();

    let checks = collect_checks(layout, credentials).await;
    for check in &checks {
        println!("{check}");
    }

    let failed = checks
        .iter()
        .filter(|c| c.status == CheckStatus::Fail)
        .count();
    println!();
    if failed == 0 {
        println!("{}", "All checks passed".green());
    } else {
        println!("{}", format!("{failed} check(s) failed").red());
    }
    failed == 0
}
