//! The remote-UI seam
//!
//! Everything above this module drives the dashboard through the
//! [`RemoteUITarget`] trait: navigate, wait for a marker, locate, click,
//! read text, evaluate a script. The trait is the reason the session,
//! recovery and pipeline layers are testable without a browser; the one
//! real implementation lives in [`chromium`].
//!
//! Selector convention: plain strings are CSS selectors, strings starting
//! with `//` (or a parenthesized XPath expression) are dispatched as XPath.
//! Element ids go through [`by_id`] because the dashboard framework puts
//! colons in its generated ids, which a `#id` selector cannot carry.

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Chromium-backed implementation
pub mod chromium;

/// CSS selector matching an element by its literal id
///
/// `[id='...']` instead of `#...`: generated ids like `groupingTable:xls`
/// contain characters that are meaningful in a CSS id selector.
pub fn by_id(id: &str) -> String {
    format!("[id='{id}']")
}

/// True when `selector` should be dispatched as XPath rather than CSS
pub(crate) fn is_xpath(selector: &str) -> bool {
    selector.starts_with("//") || selector.starts_with('(')
}

/// Capability set the harvest core consumes from a remote UI
///
/// Implementations are expected to make `click` resilient on their own
/// (direct click, scripted click, pointer click) so callers can treat a
/// `false` return as "this element really does not take clicks right now".
#[async_trait]
pub trait RemoteUITarget: Send + Sync {
    /// Opaque reference to a located element
    type Handle: Send + Sync;

    /// Load `url` and wait for the navigation to finish
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Wait up to `timeout` for `selector` to appear; the presence probe
    /// for "the page is really loaded"
    async fn await_marker(&self, selector: &str, timeout: Duration) -> bool;

    /// Find the first element matching `selector`, polling up to `timeout`
    ///
    /// A zero timeout means a single probe with no waiting.
    async fn locate(&self, selector: &str, timeout: Duration) -> Option<Self::Handle>;

    /// Click a located element, trying every click method the target has
    async fn click(&self, handle: &Self::Handle) -> bool;

    /// Visible text of a located element
    async fn read_text(&self, handle: &Self::Handle) -> Result<String>;

    /// Evaluate a script in the page and return its JSON value
    ///
    /// The escape hatch for everything declarative locators cannot do:
    /// widget API calls, option-list probing, availability sniffing.
    async fn run_script(&self, command: &str) -> Result<serde_json::Value>;

    /// URL the page currently shows
    async fn current_url(&self) -> Result<String>;
}
