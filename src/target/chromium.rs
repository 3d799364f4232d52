//! Chromium implementation of the remote-UI seam, over the DevTools protocol
//!
//! One browser, one page, for the whole run: the dashboard keeps its view
//! state server-side per session, so a second page would corrupt the first.
//! Downloads are routed into the directory the watcher polls, and the
//! `navigator.webdriver` flag is masked before any page script can look at
//! it, since the dashboard is known to probe for automation.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::target::{RemoteUITarget, is_xpath};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt;
use rand::seq::SliceRandom;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How often `locate` and `await_marker` re-probe the page
const LOCATE_POLL: Duration = Duration::from_millis(200);

/// Installed on every new document, before the page's own scripts run
const WEBDRIVER_MASK: &str =
    "Object.defineProperty(navigator, 'webdriver', { get: () => undefined })";

/// Find a Chromium or Chrome binary on PATH
///
/// Checked in preference order; the common macOS bundle location is the
/// last resort.
pub fn find_browser() -> Option<PathBuf> {
    for name in [
        "chromium",
        "chromium-browser",
        "google-chrome",
        "google-chrome-stable",
        "chrome",
    ] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }
    if cfg!(target_os = "macos") {
        let bundle = PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if bundle.exists() {
            return Some(bundle);
        }
    }
    None
}

fn pick_user_agent(agents: &[String]) -> Option<&String> {
    agents.choose(&mut rand::thread_rng())
}

/// [`RemoteUITarget`] over a launched Chromium instance
pub struct ChromiumTarget {
    browser: Browser,
    page: Page,
    events: JoinHandle<()>,
    navigate_timeout: Duration,
}

impl ChromiumTarget {
    /// Launch a browser per the config and open the run's single page
    ///
    /// Fails with [`Error::FatalSetup`] when no executable can be found or
    /// the browser will not come up; there is nothing to retry at that
    /// point.
    pub async fn launch(config: &Config) -> Result<Self> {
        let executable = config
            .browser
            .executable
            .clone()
            .or_else(find_browser)
            .ok_or_else(|| Error::FatalSetup {
                reason: "no chromium or chrome executable found".to_string(),
            })?;

        let download_dir = config.browser.download_dir.clone();
        std::fs::create_dir_all(&download_dir)?;

        let mut builder = BrowserConfig::builder().chrome_executable(&executable);
        if !config.browser.headless {
            builder = builder.with_head();
        }
        for arg in &config.browser.extra_args {
            builder = builder.arg(arg);
        }
        if let Some(agent) = pick_user_agent(&config.browser.user_agents) {
            builder = builder.arg(format!("--user-agent={agent}"));
        }
        let browser_config = builder.build().map_err(|e| Error::FatalSetup {
            reason: format!("browser configuration rejected: {e}"),
        })?;

        info!(executable = %executable.display(), "launching browser");
        let (browser, mut handler) =
            Browser::launch(browser_config)
                .await
                .map_err(|e| Error::FatalSetup {
                    reason: format!("failed to launch browser: {e}"),
                })?;

        // drain CDP events for the life of the browser
        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| Error::FatalSetup {
                reason: format!("failed to open a page: {e}"),
            })?;

        let routing = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::Allow)
            .download_path(download_dir.to_string_lossy().into_owned())
            .build()
            .map_err(|e| Error::FatalSetup {
                reason: format!("download routing rejected: {e}"),
            })?;
        page.execute(routing).await.map_err(|e| Error::FatalSetup {
            reason: format!("failed to route downloads: {e}"),
        })?;

        page.evaluate_on_new_document(WEBDRIVER_MASK)
            .await
            .map_err(|e| Error::FatalSetup {
                reason: format!("failed to install webdriver mask: {e}"),
            })?;

        Ok(Self {
            browser,
            page,
            events,
            navigate_timeout: config.tunables.navigate_timeout,
        })
    }

    /// Shut the browser down and stop the event drain
    pub async fn close(mut self) -> Result<()> {
        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "browser close request failed");
        }
        let _ = self.browser.wait().await;
        self.events.abort();
        Ok(())
    }

    /// Single probe for `selector`, CSS or XPath per the selector convention
    async fn find_once(&self, selector: &str) -> Option<Element> {
        let found = if is_xpath(selector) {
            self.page.find_xpath(selector).await
        } else {
            self.page.find_element(selector).await
        };
        found.ok()
    }
}

#[async_trait]
impl RemoteUITarget for ChromiumTarget {
    type Handle = Element;

    async fn navigate(&self, url: &str) -> Result<()> {
        match tokio::time::timeout(self.navigate_timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => {
                // best effort; some dashboard actions navigate via script
                // and never emit a load event
                let _ = self.page.wait_for_navigation().await;
                Ok(())
            }
            Ok(Err(e)) => Err(Error::Browser {
                message: format!("navigation to {url} failed: {e}"),
            }),
            Err(_) => Err(Error::Browser {
                message: format!(
                    "navigation to {url} timed out after {}s",
                    self.navigate_timeout.as_secs()
                ),
            }),
        }
    }

    async fn await_marker(&self, selector: &str, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.find_once(selector).await.is_some() {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(LOCATE_POLL).await;
        }
    }

    async fn locate(&self, selector: &str, timeout: Duration) -> Option<Element> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(element) = self.find_once(selector).await {
                return Some(element);
            }
            if tokio::time::Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(LOCATE_POLL).await;
        }
    }

    async fn click(&self, handle: &Element) -> bool {
        if handle.click().await.is_ok() {
            return true;
        }
        debug!("direct click failed, trying scripted click");
        if handle
            .call_js_fn("function() { this.click(); }", false)
            .await
            .is_ok()
        {
            return true;
        }
        debug!("scripted click failed, trying pointer click");
        if handle.scroll_into_view().await.is_ok() {
            if let Ok(point) = handle.clickable_point().await {
                if self.page.click(point).await.is_ok() {
                    return true;
                }
            }
        }
        warn!("element did not accept any click method");
        false
    }

    async fn read_text(&self, handle: &Element) -> Result<String> {
        let text = handle.inner_text().await.map_err(|e| Error::Browser {
            message: format!("failed to read element text: {e}"),
        })?;
        Ok(text.unwrap_or_default())
    }

    async fn run_script(&self, command: &str) -> Result<serde_json::Value> {
        let outcome = self.page.evaluate(command).await.map_err(|e| Error::Browser {
            message: format!("script evaluation failed: {e}"),
        })?;
        // `undefined` carries no value; callers treat that as null
        Ok(outcome.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn current_url(&self) -> Result<String> {
        let url = self.page.url().await.map_err(|e| Error::Browser {
            message: format!("failed to read page url: {e}"),
        })?;
        Ok(url.unwrap_or_default())
    }
}
