use crate::error::{AgentError, Result};
use crate::tools::{Tool, ToolContext, ToolOutcome};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SendKeysParams {
    /// Key to press, e.g. "Enter", "Escape", "Tab", "ArrowDown"
    pub keys: String,
}

/// Press a keyboard key in the active tab
#[derive(Default)]
pub struct SendKeysTool;

impl Tool for SendKeysTool {
    type Params = SendKeysParams;

    fn name(&self) -> &str {
        "send_keys"
    }

    fn description(&self) -> &str {
        "Press a keyboard key such as Enter, Escape, Tab or ArrowDown"
    }

    fn execute_typed(&self, params: SendKeysParams, context: &mut ToolContext) -> Result<ToolOutcome> {
        let tab = context.session.tab()?;
        tab.press_key(&params.keys).map_err(|e| AgentError::ActionFailed {
            action: "send_keys".to_string(),
            reason: e.to_string(),
        })?;
        context.invalidate_dom();

        Ok(format!("Sent keys: {}", params.keys).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_keys_params() {
        let params: SendKeysParams =
            serde_json::from_value(serde_json::json!({"keys": "Enter"})).unwrap();
        assert_eq!(params.keys, "Enter");
    }
}
