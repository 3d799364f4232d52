//! # dashboard-harvest
//!
//! Resilient export harvester for session-stateful web dashboards.
//!
//! ## Design Philosophy
//!
//! dashboard-harvest is designed to be:
//! - **Session-aware** - dashboard state is cached and only re-established when it drifts
//! - **Outage-tolerant** - upstream failures cool down and recover instead of killing the run
//! - **Deterministic on disk** - every export lands at `base_dir/year/region/subregion.xlsx`
//! - **Library-first** - the binary is a thin wrapper, everything is embeddable
//!
//! ## Quick Start
//!
//! ```no_run
//! use dashboard_harvest::{Config, run_with_shutdown};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config
//!         .plan
//!         .years
//!         .insert(2025, vec!["Uttar Pradesh(77)".to_string()]);
//!
//!     let report = run_with_shutdown(config).await?;
//!     println!(
//!         "completed: {}, failed: {}",
//!         report.completed_count(),
//!         report.failed_count()
//!     );
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Download completion watching and staging
pub mod download_watcher;
/// Error types
pub mod error;
/// Session establishment against the dashboard
pub mod navigation;
/// Run orchestration
pub mod pipeline;
/// Outage detection and recovery
pub mod recovery;
/// Object-storage upload of staged exports
pub mod storage;
/// The remote-UI seam and its Chromium implementation
pub mod target;
/// Core types and run reports
pub mod types;
/// Filesystem utilities
pub mod utils;
/// Per-unit export processing
pub mod worker;

// Re-export commonly used types
pub use config::{Config, PlanConfig, SelectorConfig, StorageConfig, TunableConfig};
pub use download_watcher::DownloadWatcher;
pub use error::{Error, Result};
pub use navigation::NavigationSession;
pub use pipeline::PipelineController;
pub use recovery::RecoveryPolicy;
pub use storage::StorageUploader;
pub use target::RemoteUITarget;
pub use target::chromium::ChromiumTarget;
pub use types::{
    AttemptOutcome, CompletedUnit, FailureRecord, RegionReport, RunReport, SessionState, WorkUnit,
};
pub use worker::UnitWorker;

/// Run the full harvest plan with graceful signal handling.
///
/// Launches a browser, walks the plan, closes the browser, and returns the
/// report. SIGTERM and SIGINT stop the run after the unit currently in
/// flight; the partial report is still returned.
///
/// # Example
///
/// ```no_run
/// use dashboard_harvest::{Config, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let report = run_with_shutdown(Config::default()).await?;
///     for region in &report.regions {
///         println!(
///             "{} {}: {} completed",
///             region.year,
///             region.region,
///             region.completed.len()
///         );
///     }
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(config: Config) -> Result<RunReport> {
    let config = std::sync::Arc::new(config);
    let target = ChromiumTarget::launch(&config).await?;
    let mut controller = PipelineController::new(std::sync::Arc::clone(&config), target)?;

    let cancel = controller.cancellation_token();
    let signal_task = tokio::spawn(async move {
        wait_for_signal().await;
        cancel.cancel();
    });

    let report = controller.run().await;
    signal_task.abort();

    if let Err(e) = controller.into_target().close().await {
        tracing::warn!(error = %e, "browser did not close cleanly");
    }
    Ok(report)
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("received SIGTERM");
                }
                _ = sigint.recv() => {
                    tracing::info!("received SIGINT");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("received SIGINT");
            } else {
                tracing::error!("could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("received SIGTERM");
            } else {
                tracing::error!("could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("received Ctrl+C");
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
        }
    }
}
