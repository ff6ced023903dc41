use crate::browser::config::{ConnectionOptions, LaunchOptions};
use crate::browser::state::{PageState, TabInfo};
use crate::dom::{DomTree, EXTRACT_DOM_JS, parse_dom_snapshot};
use crate::error::{AgentError, Result};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, Tab};
use std::{ffi::OsStr, sync::Arc, time::Duration, time::Instant};

/// Maximum total wait for the page to settle after navigation
const PAGE_STABLE_MAX_WAIT: Duration = Duration::from_secs(5);

/// The page counts as settled once no relevant resource loads for this long
const PAGE_STABLE_QUIET_PERIOD: Duration = Duration::from_millis(500);

/// Resource URL fragments ignored by the quiet-period check; these keep
/// streaming or beaconing long after the page is usable
const NON_ESSENTIAL_URL_PATTERNS: &[&str] = &[
    "analytics", "googletagmanager", "doubleclick", "adservice", "facebook.com/tr",
    "hotjar", "segment.io", "mixpanel", "clarity.ms", "heapanalytics",
];

/// Browser session that manages a Chrome/Chromium instance
pub struct BrowserSession {
    browser: Browser,
}

impl BrowserSession {
    /// Launch a new browser instance with the given options
    pub fn launch(options: LaunchOptions) -> Result<Self> {
        let mut launch_opts = headless_chrome::LaunchOptions::default();

        // Ignore default arguments to prevent detection by anti-bot services
        launch_opts.ignore_default_args.push(OsStr::new("--enable-automation"));
        launch_opts.args.push(OsStr::new("--disable-blink-features=AutomationControlled"));

        // Agent runs span many LLM round-trips; keep the browser alive well
        // past the library's 30 second default
        launch_opts.idle_browser_timeout = Duration::from_secs(60 * 60);

        launch_opts.headless = options.headless;
        launch_opts.window_size = Some((options.window_width, options.window_height));

        if let Some(path) = options.chrome_path {
            launch_opts.path = Some(path);
        }
        if let Some(dir) = options.user_data_dir {
            launch_opts.user_data_dir = Some(dir);
        }
        launch_opts.sandbox = options.sandbox;

        let browser = Browser::new(launch_opts).map_err(|e| AgentError::LaunchFailed(e.to_string()))?;

        browser
            .new_tab()
            .map_err(|e| AgentError::LaunchFailed(format!("Failed to create tab: {}", e)))?;

        Ok(Self { browser })
    }

    /// Connect to an existing browser instance via WebSocket
    pub fn connect(options: ConnectionOptions) -> Result<Self> {
        let browser =
            Browser::connect_with_timeout(options.ws_url, Duration::from_millis(options.timeout))
                .map_err(|e| AgentError::ConnectionFailed(e.to_string()))?;

        Ok(Self { browser })
    }

    /// Launch a browser with default options
    pub fn new() -> Result<Self> {
        Self::launch(LaunchOptions::default())
    }

    /// Get the underlying Browser instance
    pub fn browser(&self) -> &Browser {
        &self.browser
    }

    /// Get the active tab
    pub fn tab(&self) -> Result<Arc<Tab>> {
        self.get_active_tab()
    }

    /// Create a new tab
    pub fn new_tab(&self) -> Result<Arc<Tab>> {
        self.browser
            .new_tab()
            .map_err(|e| AgentError::TabOperationFailed(format!("Failed to create tab: {}", e)))
    }

    /// Get all tabs
    pub fn get_tabs(&self) -> Result<Vec<Arc<Tab>>> {
        let tabs = self
            .browser
            .get_tabs()
            .lock()
            .map_err(|e| AgentError::TabOperationFailed(format!("Failed to get tabs: {}", e)))?
            .clone();

        Ok(tabs)
    }

    /// Get the currently active tab by checking document visibility and focus
    pub fn get_active_tab(&self) -> Result<Arc<Tab>> {
        let tabs = self.get_tabs()?;

        // First pass: check for both visibility and focus (strongest signal)
        for tab in &tabs {
            match tab.evaluate("document.visibilityState === 'visible' && document.hasFocus()", false) {
                Ok(remote_object) => {
                    if let Some(value) = remote_object.value {
                        if value.as_bool().unwrap_or(false) {
                            return Ok(tab.clone());
                        }
                    }
                }
                Err(e) => {
                    log::debug!("Failed to check tab status: {}", e);
                    continue;
                }
            }
        }

        // Second pass: visibility alone (weaker signal, but better than nothing)
        for tab in &tabs {
            match tab.evaluate("document.visibilityState === 'visible'", false) {
                Ok(remote_object) => {
                    if let Some(value) = remote_object.value {
                        if value.as_bool().unwrap_or(false) {
                            return Ok(tab.clone());
                        }
                    }
                }
                Err(_) => continue,
            }
        }

        // Fall back to the last tab; headless Chrome reports no visible page
        tabs.last()
            .cloned()
            .ok_or_else(|| AgentError::TabOperationFailed("No tabs open".to_string()))
    }

    /// Metadata for every open tab, in tab-list order
    pub fn tab_infos(&self) -> Result<Vec<TabInfo>> {
        let tabs = self.get_tabs()?;
        Ok(tabs
            .iter()
            .enumerate()
            .map(|(page_id, tab)| TabInfo {
                page_id,
                url: tab.get_url(),
                title: tab.get_title().unwrap_or_default(),
            })
            .collect())
    }

    /// Activate the tab at the given position in the tab list
    pub fn switch_to_tab(&self, page_id: usize) -> Result<()> {
        let tabs = self.get_tabs()?;
        let tab = tabs
            .get(page_id)
            .ok_or_else(|| AgentError::TabOperationFailed(format!("No tab with id {}", page_id)))?;
        tab.activate()
            .map_err(|e| AgentError::TabOperationFailed(format!("Failed to activate tab: {}", e)))?;
        Ok(())
    }

    /// Close the active tab
    pub fn close_active_tab(&self) -> Result<()> {
        self.tab()?
            .close(true)
            .map_err(|e| AgentError::TabOperationFailed(format!("Failed to close tab: {}", e)))?;
        Ok(())
    }

    /// Navigate the active tab to a URL
    pub fn navigate(&self, url: &str) -> Result<()> {
        self.tab()?
            .navigate_to(url)
            .map_err(|e| AgentError::NavigationFailed(format!("Failed to navigate to {}: {}", url, e)))?;
        Ok(())
    }

    /// Wait for navigation to complete
    pub fn wait_for_navigation(&self) -> Result<()> {
        self.tab()?
            .wait_until_navigated()
            .map_err(|e| AgentError::NavigationFailed(format!("Navigation timeout: {}", e)))?;
        Ok(())
    }

    /// Navigate back in browser history
    pub fn go_back(&self) -> Result<()> {
        self.evaluate("window.history.back(); true")?;
        std::thread::sleep(Duration::from_millis(300));
        Ok(())
    }

    /// Navigate forward in browser history
    pub fn go_forward(&self) -> Result<()> {
        self.evaluate("window.history.forward(); true")?;
        std::thread::sleep(Duration::from_millis(300));
        Ok(())
    }

    /// Evaluate JavaScript in the active tab and return its value
    pub fn evaluate(&self, js: &str) -> Result<serde_json::Value> {
        let tab = self.tab()?;
        self.evaluate_on(&tab, js)
    }

    /// Evaluate JavaScript on a specific tab
    pub fn evaluate_on(&self, tab: &Arc<Tab>, js: &str) -> Result<serde_json::Value> {
        let result = tab
            .evaluate(js, false)
            .map_err(|e| AgentError::EvaluationFailed(e.to_string()))?;
        Ok(result.value.unwrap_or(serde_json::Value::Null))
    }

    /// Capture the full perception state for one agent step.
    ///
    /// Waits for the page to settle, runs the extraction script and builds a
    /// fresh snapshot; the previous snapshot (if any) is simply dropped by
    /// the caller when it replaces its state.
    pub fn capture_state(&self, include_screenshot: bool) -> Result<PageState> {
        let tab = self.tab()?;
        self.wait_for_page_stable(&tab)?;

        let dom = self.snapshot_dom_on(&tab)?;
        let (pixels_above, pixels_below) = self.scroll_info(&tab)?;
        let screenshot = if include_screenshot {
            Some(self.screenshot_base64(&tab)?)
        } else {
            None
        };

        Ok(PageState {
            url: tab.get_url(),
            title: tab.get_title().unwrap_or_default(),
            tabs: self.tab_infos()?,
            dom,
            pixels_above,
            pixels_below,
            screenshot,
        })
    }

    /// Build a DOM snapshot of the active tab without waiting or screenshots
    /// (used for the staleness re-check between queued actions)
    pub fn snapshot_dom(&self) -> Result<DomTree> {
        let tab = self.tab()?;
        self.snapshot_dom_on(&tab)
    }

    fn snapshot_dom_on(&self, tab: &Arc<Tab>) -> Result<DomTree> {
        let result = tab
            .evaluate(EXTRACT_DOM_JS, false)
            .map_err(|e| AgentError::EvaluationFailed(format!("DOM extraction script failed: {}", e)))?;

        let json_value = result.value.ok_or_else(|| {
            AgentError::DomTreeConstruction("extraction script returned no value".to_string())
        })?;

        // The script returns JSON.stringify output, so unwrap the string first
        let json_str: String = serde_json::from_value(json_value).map_err(|e| {
            AgentError::DomTreeConstruction(format!("extraction payload is not a string: {}", e))
        })?;

        parse_dom_snapshot(&json_str)
    }

    /// Scrollable content above and below the current viewport, in pixels
    pub fn scroll_info(&self, tab: &Arc<Tab>) -> Result<(f64, f64)> {
        let value = self.evaluate_on(
            tab,
            "JSON.stringify({above: window.scrollY, below: Math.max(0, \
             document.documentElement.scrollHeight - window.scrollY - window.innerHeight)})",
        )?;
        let json_str = value.as_str().unwrap_or("{}");
        let parsed: serde_json::Value = serde_json::from_str(json_str).unwrap_or_default();
        Ok((
            parsed.get("above").and_then(|v| v.as_f64()).unwrap_or(0.0),
            parsed.get("below").and_then(|v| v.as_f64()).unwrap_or(0.0),
        ))
    }

    /// Viewport screenshot as base64 PNG
    pub fn screenshot_base64(&self, tab: &Arc<Tab>) -> Result<String> {
        let png = tab
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
            .map_err(|e| AgentError::EvaluationFailed(format!("Screenshot failed: {}", e)))?;
        Ok(STANDARD.encode(png))
    }

    /// Bounded quiet-loop approximation of a network-idle wait.
    ///
    /// headless_chrome exposes no request tracking, so this polls the page's
    /// resource-timing entries (minus known non-essential resources) and
    /// resolves once the count stops changing for the quiet period, or the
    /// maximum wait elapses, whichever comes first.
    pub fn wait_for_page_stable(&self, tab: &Arc<Tab>) -> Result<()> {
        if let Err(e) = tab.wait_until_navigated() {
            log::debug!("wait_until_navigated: {}", e);
        }

        let patterns = NON_ESSENTIAL_URL_PATTERNS.join("|");
        let js = format!(
            "performance.getEntriesByType('resource').filter(r => !/({})/i.test(r.name)).length",
            patterns
        );

        let started = Instant::now();
        let mut last_count: i64 = -1;
        let mut quiet_since = Instant::now();

        while started.elapsed() < PAGE_STABLE_MAX_WAIT {
            let count = self.evaluate_on(tab, &js)
                .ok()
                .and_then(|v| v.as_i64())
                .unwrap_or(-1);

            if count == last_count {
                if quiet_since.elapsed() >= PAGE_STABLE_QUIET_PERIOD {
                    return Ok(());
                }
            } else {
                last_count = count;
                quiet_since = Instant::now();
            }
            std::thread::sleep(Duration::from_millis(100));
        }

        log::debug!("Page did not settle within {:?}; continuing", PAGE_STABLE_MAX_WAIT);
        Ok(())
    }

    /// Close the browser by closing every tab; the process exits on drop
    pub fn close(&self) -> Result<()> {
        let tabs = self.get_tabs()?;
        for tab in tabs {
            let _ = tab.close(false);
        }
        Ok(())
    }
}
