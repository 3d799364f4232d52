//! Core types for dashboard-harvest

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One harvestable item: a (year, region, sub-region) triple
///
/// The pipeline walks the plan region by region and expands each region into
/// one `WorkUnit` per sub-region before handing them to the worker.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkUnit {
    /// Calendar year the export covers
    pub year: u16,
    /// Region label exactly as the dashboard shows it, e.g. "Uttar Pradesh(77)"
    pub region: String,
    /// Sub-region label exactly as the dashboard shows it
    pub subregion: String,
}

impl WorkUnit {
    /// Create a new work unit
    pub fn new(year: u16, region: impl Into<String>, subregion: impl Into<String>) -> Self {
        Self {
            year,
            region: region.into(),
            subregion: subregion.into(),
        }
    }
}

impl std::fmt::Display for WorkUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.year, self.region, self.subregion)
    }
}

/// What the navigation layer believes the remote page currently shows
///
/// The fields are staged: a step's marker is set only after that step
/// succeeded, so a failed establishment leaves the state partially filled and
/// the next establishment redoes everything from the page load.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionState {
    /// Both chart axes have been configured on the current page
    pub axis_configured: bool,
    /// The region the dropdown currently shows, if one was selected
    pub region_selected: Option<String>,
    /// The year the dropdown currently shows, if one was selected
    pub year_selected: Option<u16>,
}

impl SessionState {
    /// True when the state fully reflects the given (region, year) pair
    pub fn matches(&self, region: &str, year: u16) -> bool {
        self.axis_configured
            && self.region_selected.as_deref() == Some(region)
            && self.year_selected == Some(year)
    }

    /// Forget everything; the next establishment starts from a page load
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Result of one worker pass over a unit
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The export landed at this staged path
    Success(PathBuf),
    /// The attempt failed but another try may succeed
    TransientFailure(String),
    /// The upstream was down and recovery failed; abandon the unit
    UpstreamUnavailable,
    /// Nothing about this unit can succeed; do not retry
    FatalFailure(String),
}

/// A unit that exhausted its attempts (or was abandoned)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// The unit that failed
    pub unit: WorkUnit,
    /// How many full attempts were actually consumed
    pub attempts_tried: u32,
    /// The reason the last attempt gave
    pub last_reason: String,
}

/// A unit whose export was staged successfully
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedUnit {
    /// Sub-region label of the unit
    pub subregion: String,
    /// Where the export was staged
    pub path: PathBuf,
    /// Upload result: `None` when no storage is configured
    pub uploaded: Option<bool>,
}

/// Per-region slice of the run report
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionReport {
    /// Calendar year this slice covers
    pub year: u16,
    /// Region label
    pub region: String,
    /// Whether the region's dashboard session was ever established
    pub established: bool,
    /// Units that produced a staged export
    pub completed: Vec<CompletedUnit>,
    /// Units that were given up on
    pub failed: Vec<FailureRecord>,
}

/// Everything a finished run has to say for itself
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run finished
    pub finished_at: DateTime<Utc>,
    /// One entry per (year, region) pair in plan order
    pub regions: Vec<RegionReport>,
}

impl RunReport {
    /// Total number of staged exports across all regions
    pub fn completed_count(&self) -> usize {
        self.regions.iter().map(|r| r.completed.len()).sum()
    }

    /// Total number of failure records across all regions
    pub fn failed_count(&self) -> usize {
        self.regions.iter().map(|r| r.failed.len()).sum()
    }

    /// True when at least one region could not be established at all
    pub fn any_region_failed_wholesale(&self) -> bool {
        self.regions.iter().any(|r| !r.established)
    }
}
