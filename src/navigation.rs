//! Session establishment against the remote dashboard
//!
//! The dashboard keeps its real state server-side; the page is only a
//! projection of it. [`NavigationSession`] mirrors that: it tracks what the
//! page should currently show and replays the full establishment sequence
//! (page load, axis configuration, region, year) whenever its cached state
//! does not match what the caller asks for.

use crate::config::{AxisSelector, Config};
use crate::error::{Error, Result};
use crate::target::{RemoteUITarget, by_id};
use crate::types::SessionState;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Region-selection strategies, tried in ladder order
///
/// The option markup shifts between dashboard deployments, so no single
/// locator is trusted. Each declarative strategy is followed by a
/// verification read of the dropdown label; the scripted strategy is the
/// last resort.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RegionStrategy {
    /// `//li` with exactly the region's visible text
    LabelExact,
    /// `//li` whose text contains the region's base name
    LabelContains,
    /// `//li` whose `data-label` equals the full region label
    AttributeExact,
    /// `//li` whose `data-label` contains the base name
    AttributeContains,
    /// Scoped to the dropdown's own option list
    ItemsList,
    /// Widget API call with the option index probed from the live list
    ScriptedIndex,
}

pub(crate) const REGION_STRATEGIES: &[RegionStrategy] = &[
    RegionStrategy::LabelExact,
    RegionStrategy::LabelContains,
    RegionStrategy::AttributeExact,
    RegionStrategy::AttributeContains,
    RegionStrategy::ItemsList,
    RegionStrategy::ScriptedIndex,
];

impl RegionStrategy {
    /// Locator for this strategy, or `None` for the scripted path
    pub(crate) fn option_selector(self, region: &str, base: &str, widget: &str) -> Option<String> {
        match self {
            Self::LabelExact => Some(format!("//li[normalize-space(text())='{region}']")),
            Self::LabelContains => Some(format!("//li[contains(text(), '{base}')]")),
            Self::AttributeExact => Some(format!("//li[@data-label='{region}']")),
            Self::AttributeContains => Some(format!("//li[contains(@data-label, '{base}')]")),
            Self::ItemsList => Some(format!(
                "//ul[contains(@id, '{widget}')]/li[contains(text(), '{base}')]"
            )),
            Self::ScriptedIndex => None,
        }
    }
}

/// Region label with any parenthesized code suffix removed
///
/// "Uttar Pradesh(77)" carries a numeric code that partial-match locators
/// must not see; matching on "Uttar Pradesh" survives code renumbering.
pub(crate) fn base_label(region: &str) -> &str {
    region.split('(').next().unwrap_or(region).trim()
}

pub(crate) fn axis_option_selector(option_label: &str) -> String {
    format!("//li[@data-label='{option_label}']")
}

pub(crate) fn year_option_selector(year: u16) -> String {
    format!("//li[text()='{year}']")
}

/// Widget-API region selection: probe the live option list for the first
/// entry containing `base`, select it by index, and report that index
/// (or -1 when nothing matched)
fn scripted_region_select(widget: &str, base: &str) -> String {
    format!(
        "(function() {{\
           var items = document.querySelectorAll(\"ul[id*='{widget}'] li\");\
           for (var i = 0; i < items.length; i++) {{\
             if (items[i].textContent.indexOf('{base}') !== -1) {{\
               PrimeFaces.widgets.widget_{widget}.selectValue(String(i));\
               return i;\
             }}\
           }}\
           return -1;\
         }})()"
    )
}

/// Collect the visible text of every option in the sub-region panel
fn subregion_listing_script(panel_id: &str) -> String {
    format!(
        "(function() {{\
           var out = [];\
           var items = document.querySelectorAll(\"[id='{panel_id}'] li\");\
           for (var i = 0; i < items.length; i++) {{\
             var text = items[i].textContent.trim();\
             if (text) {{ out.push(text); }}\
           }}\
           return out;\
         }})()"
    )
}

/// Drives the dashboard into a known (region, year) state, idempotently
pub struct NavigationSession {
    config: Arc<Config>,
    state: SessionState,
}

impl NavigationSession {
    /// Create a session with no established state
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            state: SessionState::default(),
        }
    }

    /// What the session believes the page currently shows
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Drop all session knowledge; the next establish starts from a page load
    pub fn invalidate(&mut self) {
        self.state.reset();
    }

    /// Bring the dashboard to (region, year), reusing the session when the
    /// cached state already matches
    ///
    /// A full match is a no-op with zero remote interactions. Anything less
    /// redoes the whole sequence; partial resume would act on a page whose
    /// earlier selections were already lost. On failure the state keeps the
    /// markers of the steps that did succeed.
    pub async fn establish<T: RemoteUITarget>(
        &mut self,
        target: &T,
        region: &str,
        year: u16,
    ) -> Result<()> {
        if self.state.matches(region, year) {
            debug!(region, year, "session already established");
            return Ok(());
        }

        self.state.reset();
        info!(region, year, "establishing dashboard session");

        self.load_base_page(target).await?;
        self.configure_axis(target, &self.config.selectors.y_axis)
            .await?;
        self.configure_axis(target, &self.config.selectors.x_axis)
            .await?;
        self.state.axis_configured = true;

        self.select_region(target, region).await?;
        self.state.region_selected = Some(region.to_string());

        self.select_year(target, year).await?;
        self.state.year_selected = Some(year);

        info!(region, year, "session established");
        Ok(())
    }

    /// List the sub-region options the dashboard offers for the current region
    ///
    /// Skips the aggregate placeholder entry and closes the dropdown again so
    /// the page is ready for unit processing.
    pub async fn discover_subregions<T: RemoteUITarget>(&self, target: &T) -> Result<Vec<String>> {
        let selectors = &self.config.selectors;
        let timeout = self.config.tunables.locate_timeout;

        let opener = by_id(&selectors.subregion_label);
        let label = target
            .locate(&opener, timeout)
            .await
            .ok_or_else(|| Error::TransientUi {
                reason: format!("sub-region dropdown {} not found", selectors.subregion_label),
            })?;
        if !target.click(&label).await {
            return Err(Error::TransientUi {
                reason: "could not open sub-region dropdown".to_string(),
            });
        }

        let value = target
            .run_script(&subregion_listing_script(&selectors.subregion_panel))
            .await?;

        let mut options = Vec::new();
        if let serde_json::Value::Array(items) = value {
            for item in items {
                if let Some(text) = item.as_str() {
                    let text = text.trim();
                    if text.is_empty() || text.contains(&selectors.subregion_placeholder) {
                        continue;
                    }
                    options.push(text.to_string());
                }
            }
        }

        // close the dropdown so it does not cover the widgets below
        let _ = target.run_script("document.body.click()").await;

        if options.is_empty() {
            return Err(Error::TransientUi {
                reason: "no sub-regions offered".to_string(),
            });
        }

        debug!(count = options.len(), "sub-regions discovered");
        Ok(options)
    }

    async fn load_base_page<T: RemoteUITarget>(&self, target: &T) -> Result<()> {
        let selectors = &self.config.selectors;
        target.navigate(&selectors.base_url).await?;
        if !target
            .await_marker(&selectors.session_marker, self.config.tunables.marker_timeout)
            .await
        {
            return Err(Error::TransientUi {
                reason: format!(
                    "session marker {} never appeared",
                    selectors.session_marker
                ),
            });
        }
        Ok(())
    }

    async fn configure_axis<T: RemoteUITarget>(
        &self,
        target: &T,
        axis: &AxisSelector,
    ) -> Result<()> {
        let timeout = self.config.tunables.locate_timeout;

        let label = target
            .locate(&by_id(&axis.label_id), timeout)
            .await
            .ok_or_else(|| Error::TransientUi {
                reason: format!("axis dropdown {} not found", axis.label_id),
            })?;
        if !target.click(&label).await {
            return Err(Error::TransientUi {
                reason: format!("could not open axis dropdown {}", axis.label_id),
            });
        }

        if let Some(option) = target
            .locate(&axis_option_selector(&axis.option_label), timeout)
            .await
        {
            if target.click(&option).await {
                return Ok(());
            }
        }

        // the option list renders late on slow loads; the widget API does not
        debug!(widget = %axis.widget, "axis option not clickable, using widget api");
        let command = format!(
            "PrimeFaces.widgets.widget_{}.selectValue('{}')",
            axis.widget, axis.fallback_value
        );
        target.run_script(&command).await?;
        Ok(())
    }

    async fn select_region<T: RemoteUITarget>(&self, target: &T, region: &str) -> Result<()> {
        let selectors = &self.config.selectors;
        let base = base_label(region);
        let widget = &selectors.volatile.region_widget;
        let opener = by_id(&selectors.volatile.region_label);
        let mut last_seen = String::new();

        for (index, strategy) in REGION_STRATEGIES.iter().enumerate() {
            // the first strategy absorbs the render wait; later ones probe once
            let wait = if index == 0 {
                self.config.tunables.locate_timeout
            } else {
                Duration::ZERO
            };

            // reopen the dropdown every round; a failed click may have closed it
            let label = target
                .locate(&opener, self.config.tunables.locate_timeout)
                .await
                .ok_or_else(|| Error::TransientUi {
                    reason: format!(
                        "region dropdown {} not found",
                        selectors.volatile.region_label
                    ),
                })?;
            if !target.click(&label).await {
                return Err(Error::TransientUi {
                    reason: "could not open region dropdown".to_string(),
                });
            }

            let selected = match strategy.option_selector(region, base, widget) {
                Some(selector) => match target.locate(&selector, wait).await {
                    Some(option) => target.click(&option).await,
                    None => false,
                },
                None => {
                    let value = target
                        .run_script(&scripted_region_select(widget, base))
                        .await?;
                    value.as_i64().is_some_and(|i| i >= 0)
                }
            };

            if !selected {
                debug!(?strategy, region, "selection strategy found nothing");
                continue;
            }

            match self.read_region_label(target).await {
                Ok(shown) if shown.contains(base) => {
                    debug!(?strategy, region, "region selected");
                    return Ok(());
                }
                Ok(shown) => {
                    warn!(?strategy, region, shown = %shown, "selection landed on the wrong entry");
                    last_seen = shown;
                }
                Err(e) => {
                    warn!(?strategy, error = %e, "could not read region label");
                }
            }
        }

        Err(Error::SelectionVerification {
            wanted: region.to_string(),
            got: last_seen,
        })
    }

    async fn read_region_label<T: RemoteUITarget>(&self, target: &T) -> Result<String> {
        let selector = by_id(&self.config.selectors.volatile.region_label);
        let handle = target
            .locate(&selector, self.config.tunables.locate_timeout)
            .await
            .ok_or_else(|| Error::TransientUi {
                reason: "region label disappeared".to_string(),
            })?;
        let text = target.read_text(&handle).await?;
        Ok(text.trim().to_string())
    }

    async fn select_year<T: RemoteUITarget>(&self, target: &T, year: u16) -> Result<()> {
        let timeout = self.config.tunables.locate_timeout;

        let opener = by_id(&self.config.selectors.year_label);
        let label = target
            .locate(&opener, timeout)
            .await
            .ok_or_else(|| Error::TransientUi {
                reason: format!("year dropdown {} not found", self.config.selectors.year_label),
            })?;
        if !target.click(&label).await {
            return Err(Error::TransientUi {
                reason: "could not open year dropdown".to_string(),
            });
        }

        let option = target
            .locate(&year_option_selector(year), timeout)
            .await
            .ok_or_else(|| Error::TransientUi {
                reason: format!("year {year} not offered"),
            })?;
        if !target.click(&option).await {
            return Err(Error::TransientUi {
                reason: format!("could not select year {year}"),
            });
        }
        Ok(())
    }
}
