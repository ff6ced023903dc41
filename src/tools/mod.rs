//! Action dispatch registry
//!
//! Each action declares its parameter schema explicitly (schemars derive) and
//! is registered under the name the LLM uses to invoke it. The registry
//! deserializes raw parameters, substitutes sensitive-data placeholders just
//! before execution, runs the handler and normalizes its outcome into an
//! [`ActionResult`].

pub mod click;
pub mod done;
pub mod extract;
pub mod input;
pub mod keys;
pub mod navigate;
pub mod scroll;
pub mod tabs;
pub mod utils;
pub mod wait;

pub use click::ClickElementTool;
pub use done::DoneTool;
pub use extract::ExtractContentTool;
pub use input::InputTextTool;
pub use keys::SendKeysTool;
pub use navigate::{GoBackTool, GoToUrlTool};
pub use scroll::{ScrollDownTool, ScrollUpTool};
pub use tabs::{OpenTabTool, SwitchTabTool};
pub use wait::WaitTool;

use crate::browser::BrowserSession;
use crate::dom::DomTree;
use crate::error::{AgentError, Result};
use crate::llm::LanguageModel;
use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::collections::HashMap;

/// Outcome of one executed action
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ActionResult {
    /// The task is finished
    #[serde(default)]
    pub is_done: bool,

    /// Whether the finished task succeeded; `None` means unknown
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,

    /// Content the action produced for the model to read
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_content: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Fold this result permanently into conversation memory instead of
    /// showing it only in the next transient state message
    #[serde(default)]
    pub include_in_memory: bool,
}

impl ActionResult {
    /// Successful result carrying content for the model
    pub fn ok(content: impl Into<String>) -> Self {
        Self { extracted_content: Some(content.into()), ..Default::default() }
    }

    /// Successful result with nothing to report
    pub fn empty() -> Self {
        Self::default()
    }

    /// Failed result; errors are always worth remembering
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            include_in_memory: true,
            ..Default::default()
        }
    }

    /// Terminal result ending the task
    pub fn done(text: impl Into<String>, success: bool) -> Self {
        Self {
            is_done: true,
            success: Some(success),
            extracted_content: Some(text.into()),
            ..Default::default()
        }
    }

    /// Builder method: mark for permanent memory
    pub fn with_memory(mut self) -> Self {
        self.include_in_memory = true;
        self
    }
}

/// What a handler may return: a full result, a shorthand string (wrapped as a
/// successful result), or nothing (an empty success)
#[derive(Debug, Clone)]
pub enum ToolOutcome {
    Result(ActionResult),
    Text(String),
    Empty,
}

impl From<ToolOutcome> for ActionResult {
    fn from(outcome: ToolOutcome) -> Self {
        match outcome {
            ToolOutcome::Result(r) => r,
            ToolOutcome::Text(s) => ActionResult::ok(s),
            ToolOutcome::Empty => ActionResult::empty(),
        }
    }
}

impl From<ActionResult> for ToolOutcome {
    fn from(result: ActionResult) -> Self {
        ToolOutcome::Result(result)
    }
}

impl From<String> for ToolOutcome {
    fn from(text: String) -> Self {
        ToolOutcome::Text(text)
    }
}

/// Execution context passed to every action handler
pub struct ToolContext<'a> {
    pub session: &'a BrowserSession,

    /// Model used by content-extraction actions, when configured
    pub extraction_llm: Option<&'a dyn LanguageModel>,

    /// Secret name -> actual value; values are substituted into parameters
    /// at execution time and never appear in prompts
    pub sensitive_data: Option<&'a HashMap<String, String>>,

    /// Paths actions are allowed to read or write
    pub available_file_paths: Option<&'a [String]>,

    cached_dom: Option<DomTree>,
}

impl<'a> ToolContext<'a> {
    pub fn new(session: &'a BrowserSession) -> Self {
        Self {
            session,
            extraction_llm: None,
            sensitive_data: None,
            available_file_paths: None,
            cached_dom: None,
        }
    }

    /// Builder method: set the extraction model
    pub fn with_extraction_llm(mut self, llm: &'a dyn LanguageModel) -> Self {
        self.extraction_llm = Some(llm);
        self
    }

    /// Builder method: set the sensitive-data map
    pub fn with_sensitive_data(mut self, data: &'a HashMap<String, String>) -> Self {
        self.sensitive_data = Some(data);
        self
    }

    /// Builder method: set allowed file paths
    pub fn with_file_paths(mut self, paths: &'a [String]) -> Self {
        self.available_file_paths = Some(paths);
        self
    }

    /// Seed the snapshot actions resolve indices against. The agent passes
    /// the snapshot the model saw so indices mean what the model meant.
    pub fn set_dom(&mut self, dom: DomTree) {
        self.cached_dom = Some(dom);
    }

    /// Snapshot for index resolution, capturing one lazily if none was seeded
    pub fn get_dom(&mut self) -> Result<&DomTree> {
        if self.cached_dom.is_none() {
            self.cached_dom = Some(self.session.snapshot_dom()?);
        }
        match &self.cached_dom {
            Some(dom) => Ok(dom),
            None => Err(AgentError::DomTreeConstruction("snapshot unavailable".to_string())),
        }
    }

    /// Drop the cached snapshot (after an action known to mutate the page)
    pub fn invalidate_dom(&mut self) {
        self.cached_dom = None;
    }

    /// XPath of the indexed element, or an ElementNotFound error
    pub fn xpath_of_index(&mut self, index: usize) -> Result<String> {
        let dom = self.get_dom()?;
        let el = dom
            .get_by_index(index)
            .ok_or_else(|| AgentError::ElementNotFound(format!("No element with index {}", index)))?;
        Ok(el.xpath.clone())
    }
}

/// A browser action with explicitly declared, schema-validated parameters
pub trait Tool: Send + Sync {
    type Params: DeserializeOwned + JsonSchema;

    /// Name the LLM uses to invoke the action
    fn name(&self) -> &str;

    /// One-line description rendered into the system prompt
    fn description(&self) -> &str;

    fn execute_typed(&self, params: Self::Params, context: &mut ToolContext) -> Result<ToolOutcome>;

    /// JSON schema of the parameter struct
    fn parameters_schema(&self) -> Value {
        serde_json::to_value(schemars::schema_for!(Self::Params)).unwrap_or_else(|_| Value::Null)
    }
}

/// Object-safe view over [`Tool`] so the registry can dispatch by name
trait ErasedTool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> Value;
    fn execute(&self, params: Value, context: &mut ToolContext) -> Result<ToolOutcome>;
}

impl<T: Tool> ErasedTool for T {
    fn name(&self) -> &str {
        Tool::name(self)
    }

    fn description(&self) -> &str {
        Tool::description(self)
    }

    fn parameters_schema(&self) -> Value {
        Tool::parameters_schema(self)
    }

    fn execute(&self, params: Value, context: &mut ToolContext) -> Result<ToolOutcome> {
        let typed: T::Params =
            serde_json::from_value(params).map_err(|e| AgentError::InvalidActionParams {
                action: Tool::name(self).to_string(),
                reason: e.to_string(),
            })?;
        self.execute_typed(typed, context)
    }
}

/// Registry mapping action names to handlers, in registration order
pub struct ToolRegistry {
    tools: IndexMap<String, Box<dyn ErasedTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: IndexMap::new() }
    }

    /// Registry with the default browser action set
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(DoneTool);
        registry.register(GoToUrlTool);
        registry.register(GoBackTool);
        registry.register(ClickElementTool);
        registry.register(InputTextTool);
        registry.register(ScrollDownTool);
        registry.register(ScrollUpTool);
        registry.register(SendKeysTool);
        registry.register(ExtractContentTool);
        registry.register(OpenTabTool);
        registry.register(SwitchTabTool);
        registry.register(WaitTool);
        registry
    }

    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.tools.insert(Tool::name(&tool).to_string(), Box::new(tool));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute an action by name, normalizing the outcome.
    ///
    /// Sensitive-data placeholders in string parameters are replaced with
    /// their actual values here, immediately before the handler runs.
    pub fn execute(&self, name: &str, params: Value, context: &mut ToolContext) -> Result<ActionResult> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| AgentError::UnknownAction(name.to_string()))?;

        let params = match context.sensitive_data {
            Some(secrets) => substitute_secrets(params, secrets),
            None => params,
        };

        tool.execute(params, context).map(ActionResult::from)
    }

    /// Action vocabulary for the system prompt: one block per action with
    /// name, description and parameter schema
    pub fn prompt_description(&self) -> String {
        self.tools
            .values()
            .map(|tool| {
                format!(
                    "{}: {}\n  Parameters: {}",
                    tool.name(),
                    tool.description(),
                    tool.parameters_schema()
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Recursively replace `<secret>name</secret>` tokens in string values
fn substitute_secrets(value: Value, secrets: &HashMap<String, String>) -> Value {
    match value {
        Value::String(s) => {
            let mut replaced = s;
            for (name, secret) in secrets {
                let token = format!("<secret>{}</secret>", name);
                if replaced.contains(&token) {
                    replaced = replaced.replace(&token, secret);
                }
            }
            Value::String(replaced)
        }
        Value::Array(items) => Value::Array(
            items.into_iter().map(|v| substitute_secrets(v, secrets)).collect(),
        ),
        Value::Object(map) => Value::Object(
            map.into_iter().map(|(k, v)| (k, substitute_secrets(v, secrets))).collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_result_constructors() {
        let ok = ActionResult::ok("found it");
        assert_eq!(ok.extracted_content.as_deref(), Some("found it"));
        assert!(!ok.is_done);
        assert!(!ok.include_in_memory);

        let failed = ActionResult::failed("boom");
        assert_eq!(failed.error.as_deref(), Some("boom"));
        assert!(failed.include_in_memory);

        let done = ActionResult::done("all set", true);
        assert!(done.is_done);
        assert_eq!(done.success, Some(true));
    }

    #[test]
    fn test_tool_outcome_conversions() {
        let from_text: ActionResult = ToolOutcome::Text("hi".to_string()).into();
        assert_eq!(from_text.extracted_content.as_deref(), Some("hi"));
        assert!(from_text.error.is_none());

        let from_empty: ActionResult = ToolOutcome::Empty.into();
        assert_eq!(from_empty, ActionResult::empty());

        let from_result: ActionResult =
            ToolOutcome::Result(ActionResult::done("x", false)).into();
        assert!(from_result.is_done);
        assert_eq!(from_result.success, Some(false));
    }

    #[test]
    fn test_registry_defaults() {
        let registry = ToolRegistry::with_defaults();
        for name in [
            "done", "go_to_url", "go_back", "click_element", "input_text",
            "scroll_down", "scroll_up", "send_keys", "extract_content",
            "open_tab", "switch_tab", "wait",
        ] {
            assert!(registry.contains(name), "missing default action {}", name);
        }
    }

    #[test]
    fn test_prompt_description_lists_all_actions() {
        let registry = ToolRegistry::with_defaults();
        let description = registry.prompt_description();
        assert!(description.contains("click_element:"));
        assert!(description.contains("Parameters:"));
        assert_eq!(description.matches("Parameters:").count(), registry.len());
    }

    #[test]
    fn test_substitute_secrets() {
        let mut secrets = HashMap::new();
        secrets.insert("password".to_string(), "hunter2".to_string());

        let params = serde_json::json!({
            "index": 3,
            "text": "<secret>password</secret>",
            "nested": {"note": "keep <secret>password</secret> safe"}
        });
        let substituted = substitute_secrets(params, &secrets);

        assert_eq!(substituted["text"], "hunter2");
        assert_eq!(substituted["nested"]["note"], "keep hunter2 safe");
        assert_eq!(substituted["index"], 3);
    }

    #[test]
    fn test_substitute_secrets_unknown_token_untouched() {
        let secrets = HashMap::new();
        let params = serde_json::json!({"text": "<secret>missing</secret>"});
        let substituted = substitute_secrets(params, &secrets);
        assert_eq!(substituted["text"], "<secret>missing</secret>");
    }
}
