use crate::error::{AgentError, Result};
use crate::tools::{Tool, ToolContext, ToolOutcome};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InputTextParams {
    /// Highlight index of the input element
    pub index: usize,

    /// Text to type into the element
    pub text: String,
}

/// Type text into an input element by its highlight index
#[derive(Default)]
pub struct InputTextTool;

impl Tool for InputTextTool {
    type Params = InputTextParams;

    fn name(&self) -> &str {
        "input_text"
    }

    fn description(&self) -> &str {
        "Click the element with the given index and type text into it"
    }

    fn execute_typed(&self, params: InputTextParams, context: &mut ToolContext) -> Result<ToolOutcome> {
        let xpath = context.xpath_of_index(params.index)?;

        let tab = context.session.tab()?;
        let element = tab
            .find_element_by_xpath(&xpath)
            .map_err(|e| AgentError::ElementNotFound(format!("index {}: {}", params.index, e)))?;

        // Focus first so typing lands in the field
        element.click().map_err(|e| AgentError::ActionFailed {
            action: "input_text".to_string(),
            reason: format!("focus click failed: {}", e),
        })?;
        element.type_into(&params.text).map_err(|e| AgentError::ActionFailed {
            action: "input_text".to_string(),
            reason: e.to_string(),
        })?;

        context.invalidate_dom();

        log::debug!("Typed {} characters into element {}", params.text.len(), params.index);
        Ok(format!("Input '{}' into element with index {}", params.text, params.index).into())
    }
}
