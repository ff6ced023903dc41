use crate::error::Result;
use crate::tools::utils::normalize_url;
use crate::tools::{Tool, ToolContext, ToolOutcome};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GoToUrlParams {
    /// URL to open in the current tab
    pub url: String,
}

/// Navigate the current tab to a URL
#[derive(Default)]
pub struct GoToUrlTool;

impl Tool for GoToUrlTool {
    type Params = GoToUrlParams;

    fn name(&self) -> &str {
        "go_to_url"
    }

    fn description(&self) -> &str {
        "Navigate the current tab to the given URL"
    }

    fn execute_typed(&self, params: GoToUrlParams, context: &mut ToolContext) -> Result<ToolOutcome> {
        let url = normalize_url(&params.url);
        context.session.navigate(&url)?;
        context.session.wait_for_navigation()?;
        context.invalidate_dom();

        log::info!("Navigated to {}", url);
        Ok(format!("Navigated to {}", url).into())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GoBackParams {}

/// Navigate back in the current tab's history
#[derive(Default)]
pub struct GoBackTool;

impl Tool for GoBackTool {
    type Params = GoBackParams;

    fn name(&self) -> &str {
        "go_back"
    }

    fn description(&self) -> &str {
        "Go back one entry in the browser history"
    }

    fn execute_typed(&self, _params: GoBackParams, context: &mut ToolContext) -> Result<ToolOutcome> {
        context.session.go_back()?;
        context.invalidate_dom();
        Ok("Navigated back".to_string().into())
    }
}
