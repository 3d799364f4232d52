//! Poll-based completion watcher for the browser's download directory
//!
//! The browser owns the download directory and streams bytes into temp-named
//! files until a download finishes, so the watcher polls instead of relying
//! on filesystem events: a temp file's rename is the only trustworthy signal,
//! and polling sidesteps the partial-write noise entirely. Once a candidate
//! appears it gets a short settle period, then moves into the staged layout
//! under a collision-free name.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::utils::{move_file, unique_destination};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

/// File name suffixes that mark an in-progress download
const TEMP_SUFFIX_PATTERN: &str = r"(?i)\.(crdownload|part|tmp)$";

/// Spreadsheet extensions accepted as export candidates
const EXPORT_EXTENSIONS: &[&str] = &["xlsx", "xls"];

/// Watches the shared download directory for completed exports
pub struct DownloadWatcher {
    download_dir: PathBuf,
    timeout: Duration,
    poll_interval: Duration,
    settle_delay: Duration,
    temp_suffix: Regex,
}

impl DownloadWatcher {
    /// Build a watcher over the configured download directory
    pub fn new(config: &Config) -> Result<Self> {
        let temp_suffix = Regex::new(TEMP_SUFFIX_PATTERN).map_err(|e| Error::Config {
            message: format!("invalid temp-suffix pattern: {e}"),
            key: None,
        })?;

        Ok(Self {
            download_dir: config.browser.download_dir.clone(),
            timeout: config.tunables.download_timeout,
            poll_interval: config.tunables.poll_interval,
            settle_delay: config.tunables.settle_delay,
            temp_suffix,
        })
    }

    /// Wait for a completed export and stage it as `{target_dir}/{file_label}.xlsx`
    ///
    /// Polls until a finished spreadsheet shows up (newest wins when several
    /// qualify), lets it settle, then moves it into place and verifies the
    /// move stuck. Occupied names get a `_1`, `_2` suffix.
    pub async fn await_and_resolve(&self, target_dir: &Path, file_label: &str) -> Result<PathBuf> {
        let deadline = tokio::time::Instant::now() + self.timeout;
        let candidate = loop {
            if let Some(found) = self.latest_candidate()? {
                break found;
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(Error::DownloadTimeout {
                    dir: self.download_dir.clone(),
                    waited: self.timeout,
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        };

        debug!(candidate = %candidate.display(), "export candidate found, settling");
        tokio::time::sleep(self.settle_delay).await;

        std::fs::create_dir_all(target_dir)?;
        let wanted = target_dir.join(format!("{file_label}.xlsx"));
        let destination = unique_destination(&wanted)?;
        move_file(&candidate, &destination)?;

        if !destination.exists() {
            return Err(Error::Destination {
                path: destination,
                reason: "file vanished after move".to_string(),
            });
        }

        info!(staged = %destination.display(), "export staged");
        Ok(destination)
    }

    /// Newest completed spreadsheet in the download directory, if any
    fn latest_candidate(&self) -> Result<Option<PathBuf>> {
        let mut newest: Option<(SystemTime, PathBuf)> = None;

        for entry in std::fs::read_dir(&self.download_dir)? {
            let Ok(entry) = entry else { continue };
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if self.temp_suffix.is_match(name) || !has_export_extension(name) {
                continue;
            }
            // entries can vanish mid-scan while the browser renames temp files
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            let Ok(modified) = metadata.modified() else {
                continue;
            };
            match &newest {
                Some((best, _)) if *best >= modified => {}
                _ => newest = Some((modified, path)),
            }
        }

        Ok(newest.map(|(_, path)| path))
    }
}

/// True when the file name carries a spreadsheet extension, any case
fn has_export_extension(name: &str) -> bool {
    let Some((_, ext)) = name.rsplit_once('.') else {
        return false;
    };
    EXPORT_EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e))
}
