use crate::error::{AgentError, Result};
use crate::tools::{Tool, ToolContext, ToolOutcome};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClickElementParams {
    /// Highlight index of the element to click
    pub index: usize,
}

/// Click an interactive element by its highlight index
#[derive(Default)]
pub struct ClickElementTool;

impl Tool for ClickElementTool {
    type Params = ClickElementParams;

    fn name(&self) -> &str {
        "click_element"
    }

    fn description(&self) -> &str {
        "Click the interactive element with the given index"
    }

    fn execute_typed(
        &self,
        params: ClickElementParams,
        context: &mut ToolContext,
    ) -> Result<ToolOutcome> {
        let xpath = context.xpath_of_index(params.index)?;

        let tab = context.session.tab()?;
        let element = tab
            .find_element_by_xpath(&xpath)
            .map_err(|e| AgentError::ElementNotFound(format!("index {}: {}", params.index, e)))?;
        element.click().map_err(|e| AgentError::ActionFailed {
            action: "click_element".to_string(),
            reason: e.to_string(),
        })?;

        // The click may have mutated the page, so the snapshot is no longer
        // trustworthy for later actions in this batch
        context.invalidate_dom();

        log::debug!("Clicked element {} ({})", params.index, xpath);
        Ok(format!("Clicked element with index {}", params.index).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_click_params() {
        let params: ClickElementParams =
            serde_json::from_value(serde_json::json!({"index": 5})).unwrap();
        assert_eq!(params.index, 5);
    }

    #[test]
    fn test_click_params_reject_missing_index() {
        let params: serde_json::Result<ClickElementParams> =
            serde_json::from_value(serde_json::json!({}));
        assert!(params.is_err());
    }
}
