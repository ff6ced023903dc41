use crate::error::Result;
use crate::tools::utils::normalize_url;
use crate::tools::{Tool, ToolContext, ToolOutcome};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OpenTabParams {
    /// URL to open in the new tab
    pub url: String,
}

/// Open a URL in a new tab
#[derive(Default)]
pub struct OpenTabTool;

impl Tool for OpenTabTool {
    type Params = OpenTabParams;

    fn name(&self) -> &str {
        "open_tab"
    }

    fn description(&self) -> &str {
        "Open the given URL in a new browser tab"
    }

    fn execute_typed(&self, params: OpenTabParams, context: &mut ToolContext) -> Result<ToolOutcome> {
        let url = normalize_url(&params.url);
        let tab = context.session.new_tab()?;
        tab.navigate_to(&url)
            .and_then(|t| t.wait_until_navigated())
            .map_err(|e| crate::error::AgentError::NavigationFailed(format!(
                "Failed to open {} in new tab: {}",
                url, e
            )))?;
        context.invalidate_dom();

        log::info!("Opened new tab at {}", url);
        Ok(format!("Opened new tab with url {}", url).into())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwitchTabParams {
    /// Position of the tab in the tab list
    pub page_id: usize,
}

/// Switch to another open tab
#[derive(Default)]
pub struct SwitchTabTool;

impl Tool for SwitchTabTool {
    type Params = SwitchTabParams;

    fn name(&self) -> &str {
        "switch_tab"
    }

    fn description(&self) -> &str {
        "Switch focus to the tab with the given page id"
    }

    fn execute_typed(&self, params: SwitchTabParams, context: &mut ToolContext) -> Result<ToolOutcome> {
        context.session.switch_to_tab(params.page_id)?;
        context.invalidate_dom();
        Ok(format!("Switched to tab {}", params.page_id).into())
    }
}
