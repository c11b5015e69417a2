//! DeployLog - Entry Point
//!
//! CI/CD observability dashboard: mirrors GitHub Actions runs into a local
//! deployment store and serves them, with inferred pipeline stages and AI log
//! analysis, over a JSON API.

use std::collections::HashMap;
use std::env;
use std::process::ExitCode;

use deploylog::app::options::AppOptions;
use deploylog::app::run::{run, sync_once};
use deploylog::diagnostic::run_diagnostic;
use deploylog::logs::{init_logging, LogOptions};
use deploylog::pipeline::simulate::Scenario;
use deploylog::storage::layout::StorageLayout;
use deploylog::storage::settings::{Credentials, Settings};
use deploylog::utils::version_info;

use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    let version = version_info();
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version) {
            Ok(json) => println!("{json}"),
            Err(_) => println!("{}", version.version),
        }
        return ExitCode::SUCCESS;
    }

    let layout = cli_args
        .get("data-dir")
        .map(StorageLayout::new)
        .unwrap_or_default();
    let credentials = Credentials::from_env();

    // Run diagnostics
    if cli_args.contains_key("diagnostic") || cli_args.contains_key("diag") {
        return if run_diagnostic(&layout, &credentials).await {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        };
    }

    // Retrieve the settings file
    let mut settings = match Settings::load(&layout.settings_file()).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    settings.apply_env_overrides();
    if let Some(port) = cli_args.get("port") {
        match port.parse() {
            Ok(port) => settings.server.port = port,
            Err(_) => {
                eprintln!("Invalid --port value: {port}");
                return ExitCode::FAILURE;
            }
        }
    }

    let scenario = match cli_args.get("simulate") {
        Some(raw) => match Scenario::parse(raw) {
            Some(scenario) => Some(scenario),
            None => {
                eprintln!("Unknown --simulate scenario '{raw}', expected success|lint|test|build");
                return ExitCode::FAILURE;
            }
        },
        None => None,
    };

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        json_format: settings.log_json,
        log_dir: settings
            .log_to_file
            .then(|| layout.logs_dir().path().to_path_buf()),
        ..Default::default()
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    let options = AppOptions::from_settings(layout, settings);

    // One sync pass and exit
    if cli_args.contains_key("sync-once") {
        return match sync_once(&options, &credentials).await {
            Ok(report) => {
                info!(
                    "Synced {} runs: {} created, {} updated, {} failed",
                    report.fetched, report.created, report.updated, report.failed
                );
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("Sync failed: {e}");
                ExitCode::FAILURE
            }
        };
    }

    info!(
        "Running DeployLog {} on {}:{}",
        version.version, options.server.host, options.server.port
    );
    match run(options, credentials, scenario, await_shutdown_signal()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Failed to run DeployLog: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                _ => {
                    error!("Failed to install signal handlers, falling back to Ctrl+C");
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
        info!("Ctrl+C received, shutting down...");
    }
}
