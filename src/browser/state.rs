use crate::dom::DomTree;
use serde::{Deserialize, Serialize};

/// Identity and location of one open tab
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TabInfo {
    /// Position in the tab list, the handle the model uses to switch tabs
    pub page_id: usize,
    pub url: String,
    pub title: String,
}

/// Everything the agent perceives about the page at one instant.
///
/// Built fresh by [`crate::browser::BrowserSession::capture_state`] on every
/// step; the embedded snapshot (and its selector map) must not be used after
/// any action that could mutate the page.
#[derive(Debug, Clone)]
pub struct PageState {
    pub url: String,
    pub title: String,
    pub tabs: Vec<TabInfo>,
    pub dom: DomTree,

    /// Scrollable content above the viewport, in pixels
    pub pixels_above: f64,

    /// Scrollable content below the viewport, in pixels
    pub pixels_below: f64,

    /// Base64-encoded PNG of the viewport, when vision is enabled
    pub screenshot: Option<String>,
}
