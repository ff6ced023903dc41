use crate::error::Result;
use crate::tools::{Tool, ToolContext, ToolOutcome};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_seconds() -> u64 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WaitParams {
    /// Seconds to wait (default 3)
    #[serde(default = "default_seconds")]
    pub seconds: u64,
}

/// Pause for a fixed time, for pages that load content slowly
#[derive(Default)]
pub struct WaitTool;

impl Tool for WaitTool {
    type Params = WaitParams;

    fn name(&self) -> &str {
        "wait"
    }

    fn description(&self) -> &str {
        "Wait for the given number of seconds (default 3)"
    }

    fn execute_typed(&self, params: WaitParams, context: &mut ToolContext) -> Result<ToolOutcome> {
        std::thread::sleep(Duration::from_secs(params.seconds));
        context.invalidate_dom();
        Ok(format!("Waited for {} seconds", params.seconds).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_params_default() {
        let params: WaitParams = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(params.seconds, 3);

        let params: WaitParams = serde_json::from_value(serde_json::json!({"seconds": 1})).unwrap();
        assert_eq!(params.seconds, 1);
    }
}
