//! Per-unit export processing
//!
//! [`UnitWorker`] turns one [`WorkUnit`] into a staged spreadsheet: select
//! the sub-region, apply the configured filters, trigger the export, and
//! hand the download to the watcher. Every step is guarded by an
//! availability probe so an outage surfaces immediately instead of as a
//! cascade of misleading element-not-found failures.

use crate::config::Config;
use crate::download_watcher::DownloadWatcher;
use crate::error::{Error, Result};
use crate::navigation::NavigationSession;
use crate::recovery::RecoveryPolicy;
use crate::target::{RemoteUITarget, by_id};
use crate::types::{AttemptOutcome, WorkUnit};
use regex::Regex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Trailing commissioning-date annotation on sub-region labels,
/// e.g. "RTO AGRA (01-JAN-2021)"
const DATE_SUFFIX_PATTERN: &str = r"\s*\(\d{2}-[A-Z]{3}-\d{4}\)\s*$";

/// How a guarded step run ended, before outcome mapping
enum StepError {
    /// Outage seen and recovered from; redo the attempt from the top
    Restart,
    /// Outage seen and not recoverable (or it struck a second time)
    Abandon,
    /// Ordinary failure of the step itself
    Failed(Error),
}

pub(crate) fn subregion_option_selector(subregion: &str) -> String {
    format!("//li[normalize-space(text())='{subregion}']")
}

/// Probe whether the filter panel's toggler reports the panel as closed
fn panel_closed_probe(toggler_id: &str) -> String {
    format!(
        "(function() {{\
           var toggler = document.getElementById('{toggler_id}');\
           if (!toggler) {{ return false; }}\
           var cls = toggler.className || '';\
           return cls.indexOf('ui-layout-toggler-closed') !== -1\
             || cls.indexOf('layout-toggler-collapsed') !== -1;\
         }})()"
    )
}

fn checkbox_checked_probe(id: &str) -> String {
    format!(
        "(function() {{\
           var box = document.getElementById('{id}');\
           return !!(box && box.checked);\
         }})()"
    )
}

/// Processes individual work units against an established session
pub struct UnitWorker {
    config: Arc<Config>,
    watcher: DownloadWatcher,
    date_suffix: Regex,
}

impl UnitWorker {
    /// Build a worker and its download watcher
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let watcher = DownloadWatcher::new(&config)?;
        let date_suffix = Regex::new(DATE_SUFFIX_PATTERN).map_err(|e| Error::Config {
            message: format!("date suffix pattern: {e}"),
            key: None,
        })?;
        Ok(Self {
            config,
            watcher,
            date_suffix,
        })
    }

    /// Run one attempt for `unit` against an established session
    ///
    /// A successful mid-attempt recovery restarts the step sequence in place
    /// without surfacing as a failed attempt; the caller only sees
    /// [`AttemptOutcome::UpstreamUnavailable`] when recovery failed or the
    /// outage struck twice within the same attempt.
    pub async fn process<T: RemoteUITarget>(
        &self,
        target: &T,
        navigation: &mut NavigationSession,
        recovery: &RecoveryPolicy,
        unit: &WorkUnit,
    ) -> AttemptOutcome {
        let mut recovered_once = false;
        loop {
            let steps = self
                .run_steps(target, navigation, recovery, unit, &mut recovered_once)
                .await;
            match steps {
                Ok(path) => return AttemptOutcome::Success(path),
                Err(StepError::Restart) => {
                    info!(unit = %unit, "restarting attempt after recovery");
                }
                Err(StepError::Abandon) => return AttemptOutcome::UpstreamUnavailable,
                Err(StepError::Failed(Error::FatalSetup { reason })) => {
                    return AttemptOutcome::FatalFailure(reason);
                }
                Err(StepError::Failed(e)) => return AttemptOutcome::TransientFailure(e.to_string()),
            }
        }
    }

    async fn run_steps<T: RemoteUITarget>(
        &self,
        target: &T,
        navigation: &mut NavigationSession,
        recovery: &RecoveryPolicy,
        unit: &WorkUnit,
        recovered_once: &mut bool,
    ) -> std::result::Result<PathBuf, StepError> {
        self.ensure_available(target, navigation, recovery, unit, recovered_once)
            .await?;
        self.select_subregion(target, &unit.subregion)
            .await
            .map_err(StepError::Failed)?;

        self.ensure_available(target, navigation, recovery, unit, recovered_once)
            .await?;
        self.apply_filters(target).await.map_err(StepError::Failed)?;

        self.ensure_available(target, navigation, recovery, unit, recovered_once)
            .await?;
        self.trigger_export(target).await.map_err(StepError::Failed)?;

        self.ensure_available(target, navigation, recovery, unit, recovered_once)
            .await?;
        let target_dir = self
            .config
            .base_dir()
            .join(unit.year.to_string())
            .join(&unit.region);
        let label = self.file_label(&unit.subregion);
        self.watcher
            .await_and_resolve(&target_dir, &label)
            .await
            .map_err(StepError::Failed)
    }

    /// Probe for an outage and, if one is on screen, try to recover once
    async fn ensure_available<T: RemoteUITarget>(
        &self,
        target: &T,
        navigation: &mut NavigationSession,
        recovery: &RecoveryPolicy,
        unit: &WorkUnit,
        recovered_once: &mut bool,
    ) -> std::result::Result<(), StepError> {
        if !recovery.is_upstream_unavailable(target).await {
            return Ok(());
        }
        if *recovered_once {
            warn!(unit = %unit, "dashboard went away again within one attempt");
            return Err(StepError::Abandon);
        }
        if recovery
            .recover(target, navigation, &unit.region, unit.year)
            .await
        {
            *recovered_once = true;
            Err(StepError::Restart)
        } else {
            Err(StepError::Abandon)
        }
    }

    async fn select_subregion<T: RemoteUITarget>(&self, target: &T, subregion: &str) -> Result<()> {
        let timeout = self.config.tunables.locate_timeout;

        let opener = by_id(&self.config.selectors.subregion_label);
        let label = target
            .locate(&opener, timeout)
            .await
            .ok_or_else(|| Error::TransientUi {
                reason: format!(
                    "sub-region dropdown {} not found",
                    self.config.selectors.subregion_label
                ),
            })?;
        if !target.click(&label).await {
            return Err(Error::TransientUi {
                reason: "could not open sub-region dropdown".to_string(),
            });
        }

        let option = target
            .locate(&subregion_option_selector(subregion), timeout)
            .await
            .ok_or_else(|| Error::TransientUi {
                reason: format!("sub-region {subregion} not in the list"),
            })?;
        if !target.click(&option).await {
            return Err(Error::TransientUi {
                reason: format!("could not select sub-region {subregion}"),
            });
        }
        debug!(subregion, "sub-region selected");
        Ok(())
    }

    /// Refresh the grid, tick the configured checkboxes, refresh again
    async fn apply_filters<T: RemoteUITarget>(&self, target: &T) -> Result<()> {
        let selectors = &self.config.selectors;

        // first refresh renders the grid for the selection made so far
        self.click_by_id(target, &selectors.volatile.right_refresh, "refresh control")
            .await?;

        self.ensure_filter_panel_open(target).await?;

        for id in self.config.filters.checkbox_ids() {
            self.tick_checkbox(target, &id).await?;
        }

        // second refresh applies the ticked filters
        self.click_by_id(
            target,
            &selectors.volatile.left_refresh,
            "filter refresh control",
        )
        .await?;

        // fold the panel away; not every skin renders the collapse anchor
        if let Some(handle) = target
            .locate(&selectors.panel_collapse, Duration::ZERO)
            .await
        {
            if !target.click(&handle).await {
                debug!("collapse control did not accept the click");
            }
        }
        Ok(())
    }

    async fn ensure_filter_panel_open<T: RemoteUITarget>(&self, target: &T) -> Result<()> {
        let toggler_id = &self.config.selectors.panel_toggler;
        let value = target.run_script(&panel_closed_probe(toggler_id)).await?;
        if value.as_bool().unwrap_or(false) {
            debug!("filter panel closed, opening it");
            self.click_by_id(target, toggler_id, "filter panel toggler")
                .await?;
        }
        Ok(())
    }

    async fn tick_checkbox<T: RemoteUITarget>(&self, target: &T, id: &str) -> Result<()> {
        let value = target.run_script(&checkbox_checked_probe(id)).await?;
        if value.as_bool().unwrap_or(false) {
            debug!(id, "checkbox already set");
            return Ok(());
        }
        self.click_by_id(target, id, "filter checkbox").await
    }

    async fn trigger_export<T: RemoteUITarget>(&self, target: &T) -> Result<()> {
        let selectors = &self.config.selectors;
        let timeout = self.config.tunables.locate_timeout;

        if let Some(button) = target.locate(&by_id(&selectors.export_button), timeout).await {
            if target.click(&button).await {
                info!("export requested");
                return Ok(());
            }
        }
        for alternate in &selectors.export_alternates {
            if let Some(button) = target.locate(alternate, Duration::ZERO).await {
                if target.click(&button).await {
                    info!(selector = %alternate, "export requested via fallback locator");
                    return Ok(());
                }
            }
        }
        Err(Error::TransientUi {
            reason: "no export control accepted the click".to_string(),
        })
    }

    async fn click_by_id<T: RemoteUITarget>(&self, target: &T, id: &str, what: &str) -> Result<()> {
        let handle = target
            .locate(&by_id(id), self.config.tunables.locate_timeout)
            .await
            .ok_or_else(|| Error::TransientUi {
                reason: format!("{what} {id} not found"),
            })?;
        if !target.click(&handle).await {
            return Err(Error::TransientUi {
                reason: format!("{what} {id} did not accept the click"),
            });
        }
        Ok(())
    }

    /// File stem for a sub-region, with any trailing commissioning date removed
    fn file_label(&self, subregion: &str) -> String {
        self.date_suffix.replace(subregion, "").trim().to_string()
    }
}
