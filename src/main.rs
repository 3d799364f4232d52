//! Harvester binary: load a config, walk the plan, print the report.

use dashboard_harvest::{Config, run_with_shutdown};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("dashboard_harvest=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.json"));

    let config = if path.is_file() {
        match Config::load(&path) {
            Ok(config) => config,
            Err(e) => {
                error!(path = %path.display(), error = %e, "could not load config");
                return ExitCode::FAILURE;
            }
        }
    } else {
        info!(path = %path.display(), "no config file, using defaults");
        Config::default()
    };

    let report = match run_with_shutdown(config).await {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "run aborted");
            return ExitCode::FAILURE;
        }
    };

    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{json}"),
        Err(e) => error!(error = %e, "could not serialize the report"),
    }

    if report.any_region_failed_wholesale() {
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
