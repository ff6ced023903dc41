use crate::error::Result;
use crate::tools::{ActionResult, Tool, ToolContext, ToolOutcome};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DoneParams {
    /// Final answer or summary handed back to the user
    pub text: String,

    /// Whether the task was fully accomplished
    pub success: bool,
}

/// Terminal action: report the task as finished
#[derive(Default)]
pub struct DoneTool;

impl Tool for DoneTool {
    type Params = DoneParams;

    fn name(&self) -> &str {
        "done"
    }

    fn description(&self) -> &str {
        "Complete the task. Use when everything is finished or no further progress is possible. \
         Set success to true only if the full task was accomplished."
    }

    fn execute_typed(&self, params: DoneParams, _context: &mut ToolContext) -> Result<ToolOutcome> {
        Ok(ActionResult::done(params.text, params.success).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_done_params() {
        let json = serde_json::json!({"text": "Booked the flight", "success": true});
        let params: DoneParams = serde_json::from_value(json).unwrap();
        assert!(params.success);
        assert_eq!(params.text, "Booked the flight");
    }
}
