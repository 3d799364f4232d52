//! Shared test helpers: a scripted in-memory UI target plus small configs.
//!
//! [`ScriptedTarget`] implements [`RemoteUITarget`] over a mutable page
//! model (elements with text, click side effects, canned script results) so
//! session, recovery and pipeline behavior can be tested without a browser.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::navigation::{RegionStrategy, axis_option_selector, base_label, year_option_selector};
use crate::target::{RemoteUITarget, by_id};
use crate::worker::subregion_option_selector;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tempfile::TempDir;

/// What clicking an element does to the scripted page
#[derive(Clone)]
enum ClickEffect {
    /// Replace another element's text
    SetText { selector: String, text: String },
    /// Drop a file into a directory, as a finished download would
    WriteFile { dir: PathBuf, name: String },
}

#[derive(Default)]
struct TargetState {
    elements: HashMap<String, String>,
    click_effects: HashMap<String, Vec<ClickEffect>>,
    script_results: Vec<(String, Value)>,
    script_effects: Vec<(String, String, String)>,
    script_failures: Vec<String>,
    checked: HashSet<String>,
    page_text: String,
    page_text_after_reload: Option<String>,
    marker_present: bool,
    panel_closed: bool,
    navigations: Vec<String>,
    clicks: Vec<String>,
    scripts: Vec<String>,
    interactions: usize,
}

/// Handle type of the scripted target; remembers which selector found it
pub(crate) struct FakeHandle {
    selector: String,
}

/// In-memory [`RemoteUITarget`] with a scriptable page model
pub(crate) struct ScriptedTarget {
    state: Mutex<TargetState>,
}

impl ScriptedTarget {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(TargetState {
                marker_present: true,
                page_text: "Vahan Analytics".to_string(),
                ..TargetState::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TargetState> {
        self.state.lock().unwrap()
    }

    pub(crate) fn insert_element(&self, selector: &str, text: &str) {
        self.lock()
            .elements
            .insert(selector.to_string(), text.to_string());
    }

    pub(crate) fn remove_element(&self, selector: &str) {
        self.lock().elements.remove(selector);
    }

    /// Clicking `on` rewrites the text of `selector`
    pub(crate) fn on_click_set_text(&self, on: &str, selector: &str, text: &str) {
        self.lock()
            .click_effects
            .entry(on.to_string())
            .or_default()
            .push(ClickEffect::SetText {
                selector: selector.to_string(),
                text: text.to_string(),
            });
    }

    /// Clicking `on` drops `name` into `dir`, like a finished download
    pub(crate) fn on_click_write_file(&self, on: &str, dir: &Path, name: &str) {
        self.lock()
            .click_effects
            .entry(on.to_string())
            .or_default()
            .push(ClickEffect::WriteFile {
                dir: dir.to_path_buf(),
                name: name.to_string(),
            });
    }

    pub(crate) fn clear_click_effects(&self, on: &str) {
        self.lock().click_effects.remove(on);
    }

    /// Scripts containing `pattern` answer with `value`
    pub(crate) fn set_script_result(&self, pattern: &str, value: Value) {
        self.lock()
            .script_results
            .push((pattern.to_string(), value));
    }

    /// Scripts containing `pattern` also rewrite the text of `selector`
    pub(crate) fn on_script_set_text(&self, pattern: &str, selector: &str, text: &str) {
        self.lock().script_effects.push((
            pattern.to_string(),
            selector.to_string(),
            text.to_string(),
        ));
    }

    /// Scripts containing `pattern` fail outright
    pub(crate) fn fail_scripts_matching(&self, pattern: &str) {
        self.lock().script_failures.push(pattern.to_string());
    }

    pub(crate) fn set_checkbox_checked(&self, id: &str) {
        self.lock().checked.insert(id.to_string());
    }

    pub(crate) fn set_panel_closed(&self) {
        self.lock().panel_closed = true;
    }

    /// Text the availability probe sees right now
    pub(crate) fn set_page_text(&self, text: &str) {
        self.lock().page_text = text.to_string();
    }

    /// Text the availability probe sees after the next navigation
    pub(crate) fn set_page_text_after_reload(&self, text: &str) {
        self.lock().page_text_after_reload = Some(text.to_string());
    }

    pub(crate) fn set_marker_missing(&self) {
        self.lock().marker_present = false;
    }

    pub(crate) fn navigations(&self) -> Vec<String> {
        self.lock().navigations.clone()
    }

    pub(crate) fn clicks(&self) -> Vec<String> {
        self.lock().clicks.clone()
    }

    pub(crate) fn scripts(&self) -> Vec<String> {
        self.lock().scripts.clone()
    }

    /// Every remote interaction of any kind, for idempotence assertions
    pub(crate) fn interaction_count(&self) -> usize {
        self.lock().interactions
    }
}

#[async_trait]
impl RemoteUITarget for ScriptedTarget {
    type Handle = FakeHandle;

    async fn navigate(&self, url: &str) -> Result<()> {
        let mut state = self.lock();
        state.interactions += 1;
        state.navigations.push(url.to_string());
        if let Some(text) = state.page_text_after_reload.clone() {
            state.page_text = text;
        }
        Ok(())
    }

    async fn await_marker(&self, _selector: &str, _timeout: Duration) -> bool {
        let mut state = self.lock();
        state.interactions += 1;
        state.marker_present
    }

    async fn locate(&self, selector: &str, _timeout: Duration) -> Option<FakeHandle> {
        let mut state = self.lock();
        state.interactions += 1;
        if state.elements.contains_key(selector) {
            Some(FakeHandle {
                selector: selector.to_string(),
            })
        } else {
            None
        }
    }

    async fn click(&self, handle: &FakeHandle) -> bool {
        let mut state = self.lock();
        state.interactions += 1;
        state.clicks.push(handle.selector.clone());

        let effects = state
            .click_effects
            .get(&handle.selector)
            .cloned()
            .unwrap_or_default();
        for effect in effects {
            match effect {
                ClickEffect::SetText { selector, text } => {
                    state.elements.insert(selector, text);
                }
                ClickEffect::WriteFile { dir, name } => {
                    std::fs::create_dir_all(&dir).unwrap();
                    std::fs::write(dir.join(name), b"export bytes").unwrap();
                }
            }
        }
        true
    }

    async fn read_text(&self, handle: &FakeHandle) -> Result<String> {
        let mut state = self.lock();
        state.interactions += 1;
        Ok(state
            .elements
            .get(&handle.selector)
            .cloned()
            .unwrap_or_default())
    }

    async fn run_script(&self, command: &str) -> Result<Value> {
        let mut state = self.lock();
        state.interactions += 1;
        state.scripts.push(command.to_string());

        if state
            .script_failures
            .iter()
            .any(|p| command.contains(p.as_str()))
        {
            return Err(Error::Browser {
                message: "scripted evaluate failure".to_string(),
            });
        }

        // side effects first so a canned result reflects them
        let effects: Vec<(String, String)> = state
            .script_effects
            .iter()
            .filter(|(pattern, _, _)| command.contains(pattern.as_str()))
            .map(|(_, selector, text)| (selector.clone(), text.clone()))
            .collect();
        for (selector, text) in effects {
            state.elements.insert(selector, text);
        }

        if let Some((_, value)) = state
            .script_results
            .iter()
            .find(|(pattern, _)| command.contains(pattern.as_str()))
        {
            return Ok(value.clone());
        }

        // built-in understanding of the probes the crate sends
        if command.contains("document.title") {
            return Ok(json!(state.page_text.clone()));
        }
        if command.contains("ui-layout-toggler-closed") {
            return Ok(json!(state.panel_closed));
        }
        if command.contains(".checked") {
            if let Some(id) = extract_between(command, "getElementById('", "')") {
                return Ok(json!(state.checked.contains(id)));
            }
        }
        Ok(Value::Null)
    }

    async fn current_url(&self) -> Result<String> {
        let state = self.lock();
        Ok(state.navigations.last().cloned().unwrap_or_default())
    }
}

fn extract_between<'a>(text: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let from = text.find(start)? + start.len();
    let to = text[from..].find(end)? + from;
    Some(&text[from..to])
}

/// Default config with all waits shrunk to test scale
pub(crate) fn test_config() -> Config {
    let mut config = Config::default();
    config.tunables.locate_timeout = Duration::from_millis(50);
    config.tunables.marker_timeout = Duration::from_millis(50);
    config.tunables.navigate_timeout = Duration::from_millis(200);
    config.tunables.recovery_cooldown = Duration::from_millis(25);
    config.tunables.download_timeout = Duration::from_millis(400);
    config.tunables.poll_interval = Duration::from_millis(20);
    config.tunables.settle_delay = Duration::from_millis(10);
    config.tunables.delay_min = Duration::from_millis(1);
    config.tunables.delay_max = Duration::from_millis(3);
    config
}

/// [`test_config`] with download and staging directories in fresh temp dirs
///
/// Keep the returned dirs alive for the test's duration.
pub(crate) fn test_config_with_dirs() -> (Config, TempDir, TempDir) {
    let downloads = TempDir::new().unwrap();
    let exports = TempDir::new().unwrap();
    let mut config = test_config();
    config.browser.download_dir = downloads.path().to_path_buf();
    config.base_dir = exports.path().to_path_buf();
    (config, downloads, exports)
}

/// Populate `target` so a full establish for (region, year) succeeds
pub(crate) fn wire_happy_navigation(target: &ScriptedTarget, region: &str, year: u16) {
    let config = test_config();
    let selectors = &config.selectors;

    target.insert_element(&by_id(&selectors.y_axis.label_id), "Y-Axis");
    target.insert_element(
        &axis_option_selector(&selectors.y_axis.option_label),
        &selectors.y_axis.option_label,
    );
    target.insert_element(&by_id(&selectors.x_axis.label_id), "X-Axis");
    target.insert_element(
        &axis_option_selector(&selectors.x_axis.option_label),
        &selectors.x_axis.option_label,
    );

    // region dropdown starts on a placeholder; clicking any strategy's
    // option moves it to the requested region
    let label_selector = by_id(&selectors.volatile.region_label);
    target.insert_element(&label_selector, "Select State");
    for strategy in crate::navigation::REGION_STRATEGIES {
        if let Some(selector) = strategy.option_selector(
            region,
            base_label(region),
            &selectors.volatile.region_widget,
        ) {
            target.insert_element(&selector, region);
            target.on_click_set_text(&selector, &label_selector, region);
        }
    }

    target.insert_element(
        &by_id(&selectors.subregion_label),
        &selectors.subregion_placeholder,
    );

    target.insert_element(&by_id(&selectors.year_label), "Year");
    target.insert_element(&year_option_selector(year), &year.to_string());
}

/// Populate `target` so processing `subregion` succeeds end to end
///
/// The export button click drops a spreadsheet into the config's download
/// directory, which is what the watcher then stages.
pub(crate) fn wire_happy_unit(target: &ScriptedTarget, config: &Config, subregion: &str) {
    let selectors = &config.selectors;

    target.insert_element(
        &by_id(&selectors.subregion_label),
        &selectors.subregion_placeholder,
    );
    target.insert_element(&subregion_option_selector(subregion), subregion);

    target.insert_element(&by_id(&selectors.volatile.right_refresh), "Refresh");
    target.insert_element(&by_id(&selectors.volatile.left_refresh), "Refresh");

    for id in config.filters.checkbox_ids() {
        target.insert_element(&by_id(&id), "");
    }

    let export_selector = by_id(&selectors.export_button);
    target.insert_element(&export_selector, "EXCEL");
    target.on_click_write_file(
        &export_selector,
        &config.browser.download_dir,
        "grouping_report.xlsx",
    );
}
