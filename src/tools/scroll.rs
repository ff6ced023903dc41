use crate::error::Result;
use crate::tools::{Tool, ToolContext, ToolOutcome};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ScrollParams {
    /// Pixels to scroll; defaults to one viewport height
    #[serde(default)]
    pub amount: Option<f64>,
}

fn scroll_by(context: &mut ToolContext, amount: Option<f64>, direction: f64) -> Result<String> {
    let js = match amount {
        Some(px) => format!("window.scrollBy(0, {}); true", px * direction),
        None => format!("window.scrollBy(0, window.innerHeight * {}); true", direction),
    };
    context.session.evaluate(&js)?;
    context.invalidate_dom();

    let described = amount
        .map(|px| format!("{} pixels", px))
        .unwrap_or_else(|| "one page".to_string());
    Ok(described)
}

/// Scroll the page down
#[derive(Default)]
pub struct ScrollDownTool;

impl Tool for ScrollDownTool {
    type Params = ScrollParams;

    fn name(&self) -> &str {
        "scroll_down"
    }

    fn description(&self) -> &str {
        "Scroll down by the given pixel amount, or one page if omitted"
    }

    fn execute_typed(&self, params: ScrollParams, context: &mut ToolContext) -> Result<ToolOutcome> {
        let described = scroll_by(context, params.amount, 1.0)?;
        Ok(format!("Scrolled down by {}", described).into())
    }
}

/// Scroll the page up
#[derive(Default)]
pub struct ScrollUpTool;

impl Tool for ScrollUpTool {
    type Params = ScrollParams;

    fn name(&self) -> &str {
        "scroll_up"
    }

    fn description(&self) -> &str {
        "Scroll up by the given pixel amount, or one page if omitted"
    }

    fn execute_typed(&self, params: ScrollParams, context: &mut ToolContext) -> Result<ToolOutcome> {
        let described = scroll_by(context, params.amount, -1.0)?;
        Ok(format!("Scrolled up by {}", described).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scroll_params_default_amount() {
        let params: ScrollParams = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(params.amount.is_none());

        let params: ScrollParams =
            serde_json::from_value(serde_json::json!({"amount": 250.0})).unwrap();
        assert_eq!(params.amount, Some(250.0));
    }
}
