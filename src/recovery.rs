//! Outage detection and recovery
//!
//! The dashboard regularly disappears behind gateway errors or expires the
//! server-side view state mid-run. [`RecoveryPolicy`] owns both halves of
//! dealing with that: a cheap page probe that spots the outage, and the slow
//! path that waits the outage out and rebuilds the session afterwards.

use crate::config::Config;
use crate::navigation::NavigationSession;
use crate::target::RemoteUITarget;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One script round-trip collecting everything the outage markers match on
const AVAILABILITY_PROBE: &str = "(function() {\
   return document.title + '\\n' + (document.body ? document.body.innerText : '');\
 })()";

/// Detects dashboard outages and waits them out
pub struct RecoveryPolicy {
    config: Arc<Config>,
}

impl RecoveryPolicy {
    /// Create a policy over the configured markers and cooldown
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// Does the current page look like an outage page?
    ///
    /// A single script evaluation against the page as it is; this never
    /// navigates. A probe that cannot run reports the dashboard as available
    /// so a flaky evaluate cannot trigger a fifteen-minute cooldown.
    pub async fn is_upstream_unavailable<T: RemoteUITarget>(&self, target: &T) -> bool {
        let value = match target.run_script(AVAILABILITY_PROBE).await {
            Ok(value) => value,
            Err(e) => {
                debug!(error = %e, "availability probe could not run");
                return false;
            }
        };
        let Some(text) = value.as_str() else {
            return false;
        };

        let haystack = text.to_lowercase();
        for marker in &self.config.selectors.availability_markers {
            if haystack.contains(&marker.to_lowercase()) {
                warn!(marker = %marker, "outage marker on page");
                return true;
            }
        }
        false
    }

    /// Wait out an outage and rebuild the session at (region, year)
    ///
    /// Invalidates the session first: whatever state the page held is gone
    /// with the outage. Then a flat cooldown, a reload of the entry page, and
    /// a full re-establishment. Returns whether the dashboard came back; every
    /// failure mode inside collapses to `false` and the caller decides what
    /// giving up means.
    pub async fn recover<T: RemoteUITarget>(
        &self,
        target: &T,
        navigation: &mut NavigationSession,
        region: &str,
        year: u16,
    ) -> bool {
        let cooldown = self.config.tunables.recovery_cooldown;
        warn!(
            cooldown_secs = cooldown.as_secs(),
            region, year, "dashboard unavailable, cooling down"
        );
        navigation.invalidate();
        tokio::time::sleep(cooldown).await;

        if let Err(e) = target.navigate(&self.config.selectors.base_url).await {
            warn!(error = %e, "reload after cooldown failed");
            return false;
        }
        if !target
            .await_marker(
                &self.config.selectors.session_marker,
                self.config.tunables.marker_timeout,
            )
            .await
        {
            warn!("dashboard still not serving sessions after cooldown");
            return false;
        }

        match navigation.establish(target, region, year).await {
            Ok(()) => {
                info!(region, year, "recovered and re-established");
                true
            }
            Err(e) => {
                warn!(error = %e, "re-establish after recovery failed");
                false
            }
        }
    }
}
