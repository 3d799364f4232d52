//! Custom configuration example
//!
//! This example shows how to configure dashboard-harvest with various options:
//! - A multi-year plan with fixed sub-region overrides
//! - Browser launch settings
//! - Retry, pacing, and recovery tunables
//! - Filter checkbox selection
//! - Refreshed volatile selectors after an upstream redeploy
//! - Object storage uploads

use dashboard_harvest::config::{
    BrowserConfig, Config, FilterConfig, PlanConfig, SelectorConfig, StorageConfig, TunableConfig,
    VolatileSelectors,
};
use dashboard_harvest::run_with_shutdown;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    // Regions per year, walked in order
    let mut years = BTreeMap::new();
    years.insert(
        2024,
        vec!["Uttar Pradesh(77)".to_string(), "Delhi(96)".to_string()],
    );
    years.insert(2025, vec!["Uttar Pradesh(77)".to_string()]);

    // Skip live discovery for Delhi and use a fixed sub-region list
    let mut subregion_overrides = BTreeMap::new();
    subregion_overrides.insert(
        "Delhi(96)".to_string(),
        vec![
            "Delhi North RTO - DL35(6)".to_string(),
            "Delhi South RTO - DL42(9)".to_string(),
        ],
    );

    let config = Config {
        plan: PlanConfig {
            years,
            subregion_overrides,
        },

        browser: BrowserConfig {
            headless: false, // watch the run
            download_dir: PathBuf::from("/tmp/harvest-downloads"),
            ..Default::default()
        },

        // Patience knobs; slower pacing keeps the request rate polite on
        // shared deployments
        tunables: TunableConfig {
            unit_attempts: 3,
            recovery_cooldown: Duration::from_secs(600),
            delay_min: Duration::from_secs(3),
            delay_max: Duration::from_secs(8),
            ..Default::default()
        },

        // Tick a different set of filter checkboxes before exporting
        filters: FilterConfig {
            fuel_indexes: vec![7],
            ..Default::default()
        },

        // Framework-generated ids rotate when the upstream redeploys;
        // refresh them here from the live page
        selectors: SelectorConfig {
            volatile: VolatileSelectors {
                region_label: "j_idt44_label".to_string(),
                region_widget: "j_idt52".to_string(),
                left_refresh: "j_idt80".to_string(),
                right_refresh: "j_idt75".to_string(),
            },
            ..Default::default()
        },

        // Mirror staged exports to S3-compatible storage; a failed upload
        // never fails the unit
        storage: Some(StorageConfig {
            endpoint: "https://storage.example.com".to_string(),
            bucket: "harvest".to_string(),
            prefix: "vahan/exports".to_string(),
            auth_token: std::env::var("HARVEST_STORAGE_TOKEN").ok(),
            timeout: Duration::from_secs(30),
        }),

        base_dir: PathBuf::from("/srv/harvest/exports"),
    };

    // run_with_shutdown wires SIGINT/SIGTERM to a cooperative stop: the
    // unit in flight finishes, the partial report is still returned
    let report = run_with_shutdown(config).await?;

    println!(
        "run finished: {} completed, {} failed",
        report.completed_count(),
        report.failed_count()
    );
    if report.any_region_failed_wholesale() {
        println!("at least one region never came up; check the log");
    }
    Ok(())
}
