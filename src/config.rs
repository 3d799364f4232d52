//! Configuration types for dashboard-harvest

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::Duration,
};

/// Browser launch configuration (executable, flags, download routing)
///
/// Groups settings related to how the Chromium instance is started.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Path to the browser executable (auto-detected if None)
    #[serde(default)]
    pub executable: Option<PathBuf>,

    /// Run without a visible window (default: true)
    #[serde(default = "default_true")]
    pub headless: bool,

    /// Directory the browser drops exports into (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// User-agent strings; one is picked at random per launch
    #[serde(default = "default_user_agents")]
    pub user_agents: Vec<String>,

    /// Extra command-line flags passed to the browser
    #[serde(default = "default_browser_args")]
    pub extra_args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            executable: None,
            headless: true,
            download_dir: default_download_dir(),
            user_agents: default_user_agents(),
            extra_args: default_browser_args(),
        }
    }
}

/// How to drive one chart-axis dropdown
///
/// The option is located by its `data-label`; if that fails, the widget's
/// scripted API is invoked with `fallback_value`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AxisSelector {
    /// Element id of the dropdown's visible label
    pub label_id: String,
    /// The option label to select, e.g. "Maker"
    pub option_label: String,
    /// Widget name for the scripted fallback
    pub widget: String,
    /// Option value passed to the scripted fallback
    pub fallback_value: String,
}

/// Identifiers the dashboard framework generates per deployment
///
/// These rotate whenever the upstream redeploys; expect to update them from
/// the live page rather than treating them as stable.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VolatileSelectors {
    /// Element id of the region dropdown's visible label
    #[serde(default = "default_region_label")]
    pub region_label: String,

    /// Widget id fragment of the region dropdown's option list
    #[serde(default = "default_region_widget")]
    pub region_widget: String,

    /// Element id of the refresh button inside the filter panel
    #[serde(default = "default_left_refresh")]
    pub left_refresh: String,

    /// Element id of the refresh button beside the grid
    #[serde(default = "default_right_refresh")]
    pub right_refresh: String,
}

impl Default for VolatileSelectors {
    fn default() -> Self {
        Self {
            region_label: default_region_label(),
            region_widget: default_region_widget(),
            left_refresh: default_left_refresh(),
            right_refresh: default_right_refresh(),
        }
    }
}

/// Everything needed to find the dashboard's widgets
///
/// Plain values are element ids; entries that start with `//` (or `(`) are
/// XPath expressions and are dispatched as such by the UI target.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Dashboard entry URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Selector that proves the server-side session is live
    #[serde(default = "default_session_marker")]
    pub session_marker: String,

    /// Vertical chart axis (grouping dimension)
    #[serde(default = "default_y_axis")]
    pub y_axis: AxisSelector,

    /// Horizontal chart axis (time dimension)
    #[serde(default = "default_x_axis")]
    pub x_axis: AxisSelector,

    /// Element id of the year dropdown's visible label
    #[serde(default = "default_year_label")]
    pub year_label: String,

    /// Element id of the sub-region dropdown's visible label
    #[serde(default = "default_subregion_label")]
    pub subregion_label: String,

    /// Element id of the sub-region dropdown's option panel
    #[serde(default = "default_subregion_panel")]
    pub subregion_panel: String,

    /// Aggregate option to skip during sub-region discovery
    #[serde(default = "default_subregion_placeholder")]
    pub subregion_placeholder: String,

    /// Element id of the filter panel's open/close toggler
    #[serde(default = "default_panel_toggler")]
    pub panel_toggler: String,

    /// Locator of the filter panel's collapse control
    #[serde(default = "default_panel_collapse")]
    pub panel_collapse: String,

    /// Element id of the spreadsheet export button
    #[serde(default = "default_export_button")]
    pub export_button: String,

    /// Fallback locators tried when the export button id fails
    #[serde(default = "default_export_alternates")]
    pub export_alternates: Vec<String>,

    /// Lowercase substrings that mark an outage page (matched against
    /// the page title and body text)
    #[serde(default = "default_availability_markers")]
    pub availability_markers: Vec<String>,

    /// Per-deployment identifiers, see [`VolatileSelectors`]
    #[serde(default)]
    pub volatile: VolatileSelectors,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            session_marker: default_session_marker(),
            y_axis: default_y_axis(),
            x_axis: default_x_axis(),
            year_label: default_year_label(),
            subregion_label: default_subregion_label(),
            subregion_panel: default_subregion_panel(),
            subregion_placeholder: default_subregion_placeholder(),
            panel_toggler: default_panel_toggler(),
            panel_collapse: default_panel_collapse(),
            export_button: default_export_button(),
            export_alternates: default_export_alternates(),
            availability_markers: default_availability_markers(),
            volatile: VolatileSelectors::default(),
        }
    }
}

/// Which filter checkboxes to tick before exporting
///
/// Checkbox ids follow the `{group}:{index}` convention of the dashboard
/// framework; a checkbox is only clicked when it is not already set.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Id prefix of the vehicle-category checkbox group
    #[serde(default = "default_category_group")]
    pub category_group: String,

    /// Category checkbox indexes to enable (default: two-wheelers)
    #[serde(default = "default_category_indexes")]
    pub category_indexes: Vec<u32>,

    /// Id prefix of the fuel-type checkbox group
    #[serde(default = "default_fuel_group")]
    pub fuel_group: String,

    /// Fuel checkbox indexes to enable (default: electric variants)
    #[serde(default = "default_fuel_indexes")]
    pub fuel_indexes: Vec<u32>,
}

impl FilterConfig {
    /// Checkbox element ids in click order, categories before fuels
    pub fn checkbox_ids(&self) -> Vec<String> {
        self.category_indexes
            .iter()
            .map(|i| format!("{}:{}", self.category_group, i))
            .chain(
                self.fuel_indexes
                    .iter()
                    .map(|i| format!("{}:{}", self.fuel_group, i)),
            )
            .collect()
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            category_group: default_category_group(),
            category_indexes: default_category_indexes(),
            fuel_group: default_fuel_group(),
            fuel_indexes: default_fuel_indexes(),
        }
    }
}

/// Timing and retry knobs
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TunableConfig {
    /// Attempts per work unit before recording a failure (default: 2)
    #[serde(default = "default_unit_attempts")]
    pub unit_attempts: u32,

    /// Flat cooldown before recovering from an outage (default: 900s)
    #[serde(default = "default_recovery_cooldown", with = "duration_serde")]
    pub recovery_cooldown: Duration,

    /// How long to wait for an export to finish downloading (default: 60s)
    #[serde(default = "default_download_timeout", with = "duration_serde")]
    pub download_timeout: Duration,

    /// Download directory poll cadence (default: 1s)
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,

    /// Grace period after a download candidate appears (default: 2s)
    #[serde(default = "default_settle_delay", with = "duration_serde")]
    pub settle_delay: Duration,

    /// Minimum pause between units and attempts (default: 2s)
    #[serde(default = "default_delay_min", with = "duration_serde")]
    pub delay_min: Duration,

    /// Maximum pause between units and attempts (default: 5s)
    #[serde(default = "default_delay_max", with = "duration_serde")]
    pub delay_max: Duration,

    /// How long declarative element lookups keep polling (default: 10s)
    #[serde(default = "default_locate_timeout", with = "duration_serde")]
    pub locate_timeout: Duration,

    /// How long to wait for the session marker after a load (default: 30s)
    #[serde(default = "default_marker_timeout", with = "duration_serde")]
    pub marker_timeout: Duration,

    /// Page navigation timeout (default: 30s)
    #[serde(default = "default_navigate_timeout", with = "duration_serde")]
    pub navigate_timeout: Duration,
}

impl Default for TunableConfig {
    fn default() -> Self {
        Self {
            unit_attempts: default_unit_attempts(),
            recovery_cooldown: default_recovery_cooldown(),
            download_timeout: default_download_timeout(),
            poll_interval: default_poll_interval(),
            settle_delay: default_settle_delay(),
            delay_min: default_delay_min(),
            delay_max: default_delay_max(),
            locate_timeout: default_locate_timeout(),
            marker_timeout: default_marker_timeout(),
            navigate_timeout: default_navigate_timeout(),
        }
    }
}

/// S3-compatible object storage settings
///
/// Absent entirely when uploads are disabled; `endpoint` and `bucket` are
/// required once the section is present.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Service endpoint, e.g. "https://storage.example.com"
    pub endpoint: String,

    /// Bucket objects are written into
    pub bucket: String,

    /// Key prefix prepended to every object (default: none)
    #[serde(default)]
    pub prefix: String,

    /// Bearer token sent with every request (default: none)
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Per-request timeout (default: 30s)
    #[serde(default = "default_storage_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

/// The harvest plan: which years to walk and the regions under each
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PlanConfig {
    /// Regions to process per year, in plan order
    #[serde(default)]
    pub years: BTreeMap<u16, Vec<String>>,

    /// Fixed sub-region lists per region; regions not listed here are
    /// discovered from the live dropdown instead
    #[serde(default)]
    pub subregion_overrides: BTreeMap<String, Vec<String>>,
}

/// Main configuration for dashboard-harvest
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Browser launch settings
    #[serde(default)]
    pub browser: BrowserConfig,

    /// Widget locators, including the per-deployment volatile block
    #[serde(default)]
    pub selectors: SelectorConfig,

    /// Filter checkbox selection
    #[serde(default)]
    pub filters: FilterConfig,

    /// Timing and retry knobs
    #[serde(default)]
    pub tunables: TunableConfig,

    /// Object storage uploads (disabled when absent)
    #[serde(default)]
    pub storage: Option<StorageConfig>,

    /// The harvest plan
    #[serde(default)]
    pub plan: PlanConfig,

    /// Root directory of the staged export layout (default: "./exports")
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            browser: BrowserConfig::default(),
            selectors: SelectorConfig::default(),
            filters: FilterConfig::default(),
            tunables: TunableConfig::default(),
            storage: None,
            plan: PlanConfig::default(),
            base_dir: default_base_dir(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file
    ///
    /// Every field is optional in the file; missing sections fall back to
    /// the defaults above.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| Error::Config {
            message: format!("failed to parse {}: {e}", path.display()),
            key: None,
        })
    }

    /// Directory the browser drops exports into
    pub fn download_dir(&self) -> &Path {
        &self.browser.download_dir
    }

    /// Root of the staged export layout
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_base_dir() -> PathBuf {
    PathBuf::from("./exports")
}

fn default_user_agents() -> Vec<String> {
    vec![
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
         Chrome/99.0.4844.84 Safari/537.36"
            .to_string(),
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
         Chrome/100.0.4896.75 Safari/537.36"
            .to_string(),
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like \
         Gecko) Version/15.4 Safari/605.1.15"
            .to_string(),
    ]
}

fn default_browser_args() -> Vec<String> {
    vec![
        "--no-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-notifications".to_string(),
        "--disable-blink-features=AutomationControlled".to_string(),
    ]
}

fn default_base_url() -> String {
    "https://vahan.parivahan.gov.in/vahan4dashboard/vahan/view/reportview.xhtml".to_string()
}

fn default_session_marker() -> String {
    "[name='javax.faces.ViewState']".to_string()
}

fn default_y_axis() -> AxisSelector {
    AxisSelector {
        label_id: "yaxisVar_label".to_string(),
        option_label: "Maker".to_string(),
        widget: "yaxisVar".to_string(),
        fallback_value: "4".to_string(),
    }
}

fn default_x_axis() -> AxisSelector {
    AxisSelector {
        label_id: "xaxisVar_label".to_string(),
        option_label: "Month Wise".to_string(),
        widget: "xaxisVar".to_string(),
        fallback_value: "6".to_string(),
    }
}

fn default_year_label() -> String {
    "selectedYear_label".to_string()
}

fn default_subregion_label() -> String {
    "selectedRto_label".to_string()
}

fn default_subregion_panel() -> String {
    "selectedRto_panel".to_string()
}

fn default_subregion_placeholder() -> String {
    "All Vahan4 Running Office".to_string()
}

fn default_panel_toggler() -> String {
    "filterLayout-toggler".to_string()
}

fn default_panel_collapse() -> String {
    r#"//a[@title="Collapse" and contains(@class, "ui-layout-unit-header-icon")]"#.to_string()
}

fn default_export_button() -> String {
    "groupingTable:xls".to_string()
}

fn default_export_alternates() -> Vec<String> {
    vec![
        "//button[contains(@id, 'xls')]".to_string(),
        "//button[contains(@title, 'Excel')]".to_string(),
        "button[id$='xls']".to_string(),
    ]
}

fn default_availability_markers() -> Vec<String> {
    vec![
        "503 service".to_string(),
        "service unavailable".to_string(),
        "bad gateway".to_string(),
        "gateway time-out".to_string(),
        "session expired".to_string(),
        "view state could not be restored".to_string(),
    ]
}

fn default_region_label() -> String {
    "j_idt41_label".to_string()
}

fn default_region_widget() -> String {
    "j_idt49".to_string()
}

fn default_left_refresh() -> String {
    "j_idt77".to_string()
}

fn default_right_refresh() -> String {
    "j_idt72".to_string()
}

fn default_category_group() -> String {
    "VhCatg".to_string()
}

fn default_category_indexes() -> Vec<u32> {
    vec![0, 1, 2]
}

fn default_fuel_group() -> String {
    "fuel".to_string()
}

fn default_fuel_indexes() -> Vec<u32> {
    vec![7, 21]
}

fn default_unit_attempts() -> u32 {
    2
}

fn default_recovery_cooldown() -> Duration {
    Duration::from_secs(900)
}

fn default_download_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_settle_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_delay_min() -> Duration {
    Duration::from_secs(2)
}

fn default_delay_max() -> Duration {
    Duration::from_secs(5)
}

fn default_locate_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_marker_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_navigate_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_storage_timeout() -> Duration {
    Duration::from_secs(30)
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_full_defaults() {
        let config: Config = serde_json::from_str("{}").expect("empty object must parse");

        assert!(config.browser.headless);
        assert_eq!(config.browser.download_dir, PathBuf::from("./downloads"));
        assert_eq!(config.base_dir, PathBuf::from("./exports"));
        assert!(
            config
                .selectors
                .base_url
                .starts_with("https://vahan.parivahan.gov.in/")
        );
        assert_eq!(config.selectors.volatile.region_label, "j_idt41_label");
        assert_eq!(config.selectors.volatile.left_refresh, "j_idt77");
        assert_eq!(config.selectors.volatile.right_refresh, "j_idt72");
        assert_eq!(config.filters.category_indexes, vec![0, 1, 2]);
        assert_eq!(config.filters.fuel_indexes, vec![7, 21]);
        assert_eq!(config.tunables.unit_attempts, 2);
        assert_eq!(config.tunables.recovery_cooldown, Duration::from_secs(900));
        assert_eq!(config.tunables.download_timeout, Duration::from_secs(60));
        assert!(config.storage.is_none());
        assert!(config.plan.years.is_empty());
    }

    #[test]
    fn default_delays_are_ordered() {
        let config = Config::default();
        assert!(config.tunables.delay_min <= config.tunables.delay_max);
    }

    #[test]
    fn checkbox_ids_follow_the_group_index_convention() {
        let ids = FilterConfig::default().checkbox_ids();
        assert_eq!(ids[..3], ["VhCatg:0", "VhCatg:1", "VhCatg:2"]);
        assert_eq!(ids[3..], ["fuel:7", "fuel:21"]);
    }

    #[test]
    fn durations_serialize_as_integer_seconds() {
        let config = Config::default();
        let value = serde_json::to_value(&config).expect("serialize");
        assert_eq!(value["tunables"]["recovery_cooldown"], 900);
        assert_eq!(value["tunables"]["settle_delay"], 2);
    }

    #[test]
    fn default_config_round_trips_through_json() {
        let config = Config::default();
        let json = serde_json::to_string(&config).expect("serialize failed");
        let back: Config = serde_json::from_str(&json).expect("deserialize failed");

        assert_eq!(back.selectors.base_url, config.selectors.base_url);
        assert_eq!(back.tunables.unit_attempts, config.tunables.unit_attempts);
        assert_eq!(
            back.tunables.recovery_cooldown,
            config.tunables.recovery_cooldown
        );
        assert_eq!(back.browser.user_agents, config.browser.user_agents);
    }

    #[test]
    fn plan_years_parse_from_json_object_keys() {
        let raw = r#"{
            "plan": {
                "years": { "2025": ["Uttar Pradesh(77)", "Delhi(96)"] },
                "subregion_overrides": { "Delhi(96)": ["RTO-X"] }
            }
        }"#;
        let config: Config = serde_json::from_str(raw).expect("plan must parse");

        assert_eq!(
            config.plan.years.get(&2025).map(Vec::len),
            Some(2),
            "both regions present"
        );
        assert_eq!(
            config.plan.subregion_overrides.get("Delhi(96)"),
            Some(&vec!["RTO-X".to_string()])
        );
    }

    #[test]
    fn storage_section_requires_endpoint_and_bucket() {
        let missing_bucket = r#"{ "storage": { "endpoint": "https://s.example.com" } }"#;
        assert!(
            serde_json::from_str::<Config>(missing_bucket).is_err(),
            "bucket must be mandatory once the section exists"
        );

        let complete = r#"{
            "storage": {
                "endpoint": "https://s.example.com",
                "bucket": "harvest",
                "auth_token": "tok"
            }
        }"#;
        let config: Config = serde_json::from_str(complete).expect("complete section parses");
        let storage = config.storage.expect("storage present");
        assert_eq!(storage.bucket, "harvest");
        assert_eq!(storage.prefix, "");
        assert_eq!(storage.timeout, Duration::from_secs(30));
    }

    #[test]
    fn volatile_overrides_survive_partial_documents() {
        let raw = r#"{
            "selectors": { "volatile": { "region_label": "j_idt44_label" } }
        }"#;
        let config: Config = serde_json::from_str(raw).expect("partial volatile block parses");

        assert_eq!(config.selectors.volatile.region_label, "j_idt44_label");
        // untouched siblings keep their defaults
        assert_eq!(config.selectors.volatile.region_widget, "j_idt49");
        assert_eq!(config.selectors.year_label, "selectedYear_label");
    }

    #[test]
    fn load_reads_a_file_and_reports_parse_failures() {
        let dir = tempfile::tempdir().expect("tempdir");

        let good = dir.path().join("config.json");
        std::fs::write(&good, r#"{ "tunables": { "unit_attempts": 3 } }"#).expect("write");
        let config = Config::load(&good).expect("valid file loads");
        assert_eq!(config.tunables.unit_attempts, 3);

        let bad = dir.path().join("broken.json");
        std::fs::write(&bad, "{ not json").expect("write");
        let error = Config::load(&bad).expect_err("broken file must fail");
        assert!(matches!(error, Error::Config { .. }), "got: {error:?}");

        let missing = dir.path().join("absent.json");
        let error = Config::load(&missing).expect_err("missing file must fail");
        assert!(matches!(error, Error::Io(_)), "got: {error:?}");
    }
}
