//! Basic harvest example
//!
//! This example demonstrates the core functionality of dashboard-harvest:
//! - Building a configuration with a small plan
//! - Launching a Chromium instance
//! - Running the pipeline over the plan
//! - Reading the run report

use dashboard_harvest::config::{Config, PlanConfig};
use dashboard_harvest::{ChromiumTarget, PipelineController};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Make the harvest progress visible; RUST_LOG overrides the default
    tracing_subscriber::fmt::init();

    // The plan: one year, one region. Sub-regions are discovered from the
    // live dropdown because no override is configured.
    let mut plan = PlanConfig::default();
    plan.years.insert(2025, vec!["Uttar Pradesh(77)".to_string()]);

    // Everything else keeps its defaults, which target the public Vahan
    // analytics dashboard
    let config = Arc::new(Config {
        plan,
        ..Default::default()
    });

    // Launch the browser and build the controller
    let target = ChromiumTarget::launch(&config).await?;
    let mut controller = PipelineController::new(Arc::clone(&config), target)?;

    // Walk the whole plan. Failures never abort the run; they end up in
    // the report instead.
    let report = controller.run().await;

    for region in &report.regions {
        println!(
            "{} {}: {} completed, {} failed",
            region.year,
            region.region,
            region.completed.len(),
            region.failed.len()
        );
        for unit in &region.completed {
            println!("  staged {}", unit.path.display());
        }
        for failure in &region.failed {
            println!(
                "  gave up on {} after {} attempts: {}",
                failure.unit.subregion, failure.attempts_tried, failure.last_reason
            );
        }
    }

    // Give the browser back and shut it down
    controller.into_target().close().await?;
    Ok(())
}
