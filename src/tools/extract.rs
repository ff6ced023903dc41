use crate::error::{AgentError, Result};
use crate::llm::Message;
use crate::tools::{ActionResult, Tool, ToolContext, ToolOutcome};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Markdown beyond this length is cut before it reaches the extraction model
const MAX_MARKDOWN_CHARS: usize = 40_000;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractContentParams {
    /// What to look for; when omitted the whole page is returned as markdown
    #[serde(default)]
    pub goal: Option<String>,
}

/// Convert the page to markdown and optionally distill it with an LLM
#[derive(Default)]
pub struct ExtractContentTool;

impl Tool for ExtractContentTool {
    type Params = ExtractContentParams;

    fn name(&self) -> &str {
        "extract_content"
    }

    fn description(&self) -> &str {
        "Extract the page content as markdown, optionally filtered to a specific goal"
    }

    fn execute_typed(
        &self,
        params: ExtractContentParams,
        context: &mut ToolContext,
    ) -> Result<ToolOutcome> {
        let tab = context.session.tab()?;
        let html = tab.get_content().map_err(|e| AgentError::ActionFailed {
            action: "extract_content".to_string(),
            reason: format!("failed to read page content: {}", e),
        })?;

        let mut markdown = html2md::parse_html(&html);
        if markdown.len() > MAX_MARKDOWN_CHARS {
            let mut cut = MAX_MARKDOWN_CHARS;
            while !markdown.is_char_boundary(cut) {
                cut -= 1;
            }
            markdown.truncate(cut);
            markdown.push_str("\n\n[content truncated]");
        }

        let content = match (&params.goal, context.extraction_llm) {
            (Some(goal), Some(llm)) => {
                let messages = [
                    Message::system(
                        "You extract information from web pages. Given a page in markdown and \
                         an extraction goal, return only the information relevant to the goal. \
                         If the page contains nothing relevant, say so briefly.",
                    ),
                    Message::human(format!("Extraction goal: {}\n\nPage:\n{}", goal, markdown)),
                ];
                llm.complete(&messages)?
            }
            (Some(goal), None) => {
                log::debug!("No extraction model configured; returning raw markdown for goal '{}'", goal);
                markdown
            }
            (None, _) => markdown,
        };

        // Extracted content is the point of this action, so it stays in memory
        Ok(ActionResult::ok(format!("Extracted page content:\n{}", content))
            .with_memory()
            .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_params_goal_optional() {
        let params: ExtractContentParams = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(params.goal.is_none());

        let params: ExtractContentParams =
            serde_json::from_value(serde_json::json!({"goal": "find prices"})).unwrap();
        assert_eq!(params.goal.as_deref(), Some("find prices"));
    }
}
