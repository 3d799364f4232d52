//! Run orchestration
//!
//! [`PipelineController`] walks the harvest plan: for every (year, region)
//! pair it establishes a dashboard session, expands the region into work
//! units, and drives each unit through the worker under a bounded retry
//! budget. The controller also owns run-level bookkeeping such as per-region
//! reports, pacing between interactions, and cooperative shutdown.

use crate::config::Config;
use crate::error::Result;
use crate::navigation::NavigationSession;
use crate::recovery::RecoveryPolicy;
use crate::storage::StorageUploader;
use crate::target::RemoteUITarget;
use crate::types::{
    AttemptOutcome, CompletedUnit, FailureRecord, RegionReport, RunReport, WorkUnit,
};
use crate::worker::UnitWorker;
use chrono::Utc;
use rand::Rng;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

/// Sub-region placeholder on the synthetic record of a region that failed
/// before any unit could run
pub(crate) const WHOLE_REGION: &str = "all sub-regions";

/// Walks the plan and turns it into a [`RunReport`]
pub struct PipelineController<T: RemoteUITarget> {
    target: T,
    navigation: NavigationSession,
    recovery: RecoveryPolicy,
    worker: UnitWorker,
    uploader: Option<StorageUploader>,
    config: Arc<Config>,
    cancel: CancellationToken,
}

impl<T: RemoteUITarget> PipelineController<T> {
    /// Build a controller over an already-launched UI target
    ///
    /// Fails when the configured storage section or the worker's label
    /// patterns cannot be turned into working components.
    pub fn new(config: Arc<Config>, target: T) -> Result<Self> {
        let uploader = match &config.storage {
            Some(storage) => Some(StorageUploader::new(storage)?),
            None => None,
        };
        Ok(Self {
            navigation: NavigationSession::new(Arc::clone(&config)),
            recovery: RecoveryPolicy::new(Arc::clone(&config)),
            worker: UnitWorker::new(Arc::clone(&config))?,
            uploader,
            target,
            config,
            cancel: CancellationToken::new(),
        })
    }

    /// Token that stops the run after the unit currently in flight
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Give the UI target back, for teardown
    pub fn into_target(self) -> T {
        self.target
    }

    /// Process the whole plan and report what happened
    ///
    /// Failures never abort the run: a region that cannot be established is
    /// recorded wholesale and the walk moves on.
    pub async fn run(&mut self) -> RunReport {
        let started_at = Utc::now();
        let mut regions = Vec::new();

        info!(years = self.config.plan.years.len(), "run starting");
        'plan: for (year, year_regions) in self.config.plan.years.clone() {
            for region in year_regions {
                if self.cancel.is_cancelled() {
                    info!(region, year, "shutdown requested, leaving the plan early");
                    break 'plan;
                }
                regions.push(self.process_region(year, &region).await);
            }
        }

        let report = RunReport {
            started_at,
            finished_at: Utc::now(),
            regions,
        };
        info!(
            completed = report.completed_count(),
            failed = report.failed_count(),
            "run finished"
        );
        report
    }

    async fn process_region(&mut self, year: u16, region: &str) -> RegionReport {
        info!(region, year, "region starting");

        if !self.available_or_recovered(region, year).await {
            return Self::region_failed(year, region, "dashboard unavailable");
        }

        if let Err(e) = self.navigation.establish(&self.target, region, year).await {
            warn!(region, year, error = %e, "session could not be established");
            return Self::region_failed(year, region, &e.to_string());
        }

        // establishment can itself land on an outage page
        if !self.available_or_recovered(region, year).await {
            return Self::region_failed(year, region, "dashboard unavailable");
        }

        let subregions = match self.subregions_for(region).await {
            Ok(list) => list,
            Err(e) => {
                warn!(region, year, error = %e, "sub-region discovery failed");
                return Self::region_failed(year, region, &e.to_string());
            }
        };

        let mut report = RegionReport {
            year,
            region: region.to_string(),
            established: true,
            completed: Vec::new(),
            failed: Vec::new(),
        };

        let total = subregions.len();
        for (position, subregion) in subregions.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!(region, year, "shutdown requested, leaving the region early");
                break;
            }
            let unit = WorkUnit::new(year, region, &subregion);
            info!(unit = %unit, position = position + 1, total, "unit starting");
            self.process_unit(unit, &mut report).await;
            if position + 1 < total {
                self.pace().await;
            }
        }

        info!(
            region,
            year,
            completed = report.completed.len(),
            failed = report.failed.len(),
            "region finished"
        );
        report
    }

    /// Run one unit against its retry budget and record the result
    ///
    /// Availability events are not charged to the budget: the worker either
    /// absorbed the outage (and the attempt kept running) or abandoned the
    /// unit, and an abandoned unit reports the attempts it actually consumed.
    async fn process_unit(&mut self, unit: WorkUnit, report: &mut RegionReport) {
        let budget = self.config.tunables.unit_attempts;
        let mut attempts_used: u32 = 0;
        let mut last_reason = String::new();

        while attempts_used < budget {
            let outcome = self
                .worker
                .process(&self.target, &mut self.navigation, &self.recovery, &unit)
                .await;
            match outcome {
                AttemptOutcome::Success(path) => {
                    let uploaded = self.upload(&unit, &path).await;
                    report.completed.push(CompletedUnit {
                        subregion: unit.subregion.clone(),
                        path,
                        uploaded,
                    });
                    return;
                }
                AttemptOutcome::TransientFailure(reason) => {
                    attempts_used += 1;
                    warn!(
                        unit = %unit,
                        attempt = attempts_used,
                        budget,
                        reason = %reason,
                        "attempt failed"
                    );
                    last_reason = reason;
                    if attempts_used < budget {
                        self.pace().await;
                    }
                }
                AttemptOutcome::UpstreamUnavailable => {
                    warn!(unit = %unit, "dashboard unavailable, unit abandoned");
                    report.failed.push(FailureRecord {
                        unit,
                        attempts_tried: attempts_used,
                        last_reason: "dashboard unavailable".to_string(),
                    });
                    return;
                }
                AttemptOutcome::FatalFailure(reason) => {
                    warn!(unit = %unit, reason = %reason, "unit failed fatally");
                    report.failed.push(FailureRecord {
                        unit,
                        attempts_tried: attempts_used,
                        last_reason: reason,
                    });
                    return;
                }
            }
        }

        report.failed.push(FailureRecord {
            unit,
            attempts_tried: attempts_used,
            last_reason,
        });
    }

    /// Probe for an outage at a region boundary and recover in place
    async fn available_or_recovered(&mut self, region: &str, year: u16) -> bool {
        if !self.recovery.is_upstream_unavailable(&self.target).await {
            return true;
        }
        self.recovery
            .recover(&self.target, &mut self.navigation, region, year)
            .await
    }

    async fn subregions_for(&self, region: &str) -> Result<Vec<String>> {
        if let Some(fixed) = self.config.plan.subregion_overrides.get(region) {
            debug!(region, count = fixed.len(), "sub-regions from override");
            return Ok(fixed.clone());
        }
        self.navigation.discover_subregions(&self.target).await
    }

    /// Best-effort upload; a failed upload never un-completes the unit
    async fn upload(&self, unit: &WorkUnit, path: &Path) -> Option<bool> {
        let uploader = self.uploader.as_ref()?;
        let key = uploader.key_for(unit);
        if let Err(e) = uploader.put(path, &key).await {
            warn!(key, error = %e, "upload failed");
            return Some(false);
        }
        match uploader.exists(&key).await {
            Ok(true) => Some(true),
            Ok(false) => {
                warn!(key, "uploaded object did not verify");
                Some(false)
            }
            Err(e) => {
                warn!(key, error = %e, "upload verification failed");
                Some(false)
            }
        }
    }

    /// Randomized pause between interactions; keeps the request rate polite
    async fn pace(&self) {
        let delay = self.pick_delay();
        debug!(millis = delay.as_millis() as u64, "pacing");
        tokio::time::sleep(delay).await;
    }

    fn pick_delay(&self) -> Duration {
        let min = self.config.tunables.delay_min;
        let max = self.config.tunables.delay_max;
        if max <= min {
            return min;
        }
        let span = (max - min).as_millis() as u64;
        let jitter = rand::thread_rng().gen_range(0..=span);
        min + Duration::from_millis(jitter)
    }

    /// Report for a region that failed before any unit could run
    fn region_failed(year: u16, region: &str, reason: &str) -> RegionReport {
        RegionReport {
            year,
            region: region.to_string(),
            established: false,
            completed: Vec::new(),
            failed: vec![FailureRecord {
                unit: WorkUnit::new(year, region, WHOLE_REGION),
                attempts_tried: 0,
                last_reason: reason.to_string(),
            }],
        }
    }
}
