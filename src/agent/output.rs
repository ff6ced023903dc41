//! Model output parsing
//!
//! The model answers every step with one JSON object: a `current_state`
//! self-assessment plus a queue of actions. Raw-mode responses arrive as
//! free text that may be wrapped in code fences or reasoning tags, so
//! [`AgentOutput::parse_raw`] sanitizes before deserializing.

use crate::error::{AgentError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// The model's self-assessment carried alongside its actions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentBrain {
    /// Did the previous actions achieve their goal
    pub evaluation_previous_goal: String,

    /// Running notes the model keeps for itself
    pub memory: String,

    /// What the queued actions are meant to achieve
    pub next_goal: String,
}

/// One action invocation: a single-entry map of action name to parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionCall(pub IndexMap<String, Value>);

impl ActionCall {
    pub fn new(name: impl Into<String>, params: Value) -> Self {
        let mut map = IndexMap::new();
        map.insert(name.into(), params);
        Self(map)
    }

    /// Action name, or empty for a malformed empty map
    pub fn name(&self) -> &str {
        self.0.keys().next().map(|s| s.as_str()).unwrap_or("")
    }

    pub fn params(&self) -> Value {
        self.0.values().next().cloned().unwrap_or(Value::Null)
    }

    /// Highlight index this action targets, if it takes one
    pub fn index(&self) -> Option<usize> {
        self.params().get("index").and_then(|v| v.as_u64()).map(|v| v as usize)
    }
}

/// One full model decision: state assessment plus action queue
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentOutput {
    pub current_state: AgentBrain,
    pub action: Vec<ActionCall>,
}

impl AgentOutput {
    /// Parse a free-text model response.
    ///
    /// Strips markdown code fences and `<think>` reasoning blocks before
    /// parsing; anything before a stray unmatched `</think>` is discarded.
    pub fn parse_raw(response: &str) -> Result<Self> {
        let cleaned = sanitize_raw_response(response);
        serde_json::from_str(&cleaned).map_err(|e| {
            AgentError::InvalidModelOutput(format!("could not parse response as JSON: {}", e))
        })
    }

    /// Build from an already-structured JSON value
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| {
            AgentError::InvalidModelOutput(format!("structured response has wrong shape: {}", e))
        })
    }

    /// Enforce the per-step action cap
    pub fn truncate_actions(&mut self, max: usize) {
        if self.action.len() > max {
            log::warn!("Model queued {} actions; keeping the first {}", self.action.len(), max);
            self.action.truncate(max);
        }
    }

    /// JSON schema for structured completion
    pub fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "current_state": {
                    "type": "object",
                    "properties": {
                        "evaluation_previous_goal": {"type": "string"},
                        "memory": {"type": "string"},
                        "next_goal": {"type": "string"}
                    },
                    "required": ["evaluation_previous_goal", "memory", "next_goal"]
                },
                "action": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "minProperties": 1,
                        "maxProperties": 1,
                        "additionalProperties": {"type": "object"}
                    }
                }
            },
            "required": ["current_state", "action"]
        })
    }

    /// Schema variant for the final step, where only `done` is acceptable
    pub fn schema_forced_done() -> Value {
        json!({
            "type": "object",
            "properties": {
                "current_state": {
                    "type": "object",
                    "properties": {
                        "evaluation_previous_goal": {"type": "string"},
                        "memory": {"type": "string"},
                        "next_goal": {"type": "string"}
                    },
                    "required": ["evaluation_previous_goal", "memory", "next_goal"]
                },
                "action": {
                    "type": "array",
                    "minItems": 1,
                    "maxItems": 1,
                    "items": {
                        "type": "object",
                        "properties": {
                            "done": {
                                "type": "object",
                                "properties": {
                                    "text": {"type": "string"},
                                    "success": {"type": "boolean"}
                                },
                                "required": ["text", "success"]
                            }
                        },
                        "required": ["done"],
                        "additionalProperties": false
                    }
                }
            },
            "required": ["current_state", "action"]
        })
    }
}

/// Whether the step is free to act or must finish the task now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Normal,
    ForcedDone,
}

fn sanitize_raw_response(response: &str) -> String {
    let mut text = response.trim().to_string();

    // Remove matched <think>...</think> blocks
    while let (Some(start), Some(end)) = (text.find("<think>"), text.find("</think>")) {
        if end > start {
            text.replace_range(start..end + "</think>".len(), "");
        } else {
            break;
        }
    }

    // A stray close tag means everything before it was reasoning
    if let Some(end) = text.find("</think>") {
        text = text[end + "</think>".len()..].to_string();
    }

    let mut trimmed = text.trim();

    // Strip a markdown code fence, with or without a language tag
    if trimmed.starts_with("```") {
        trimmed = trimmed.trim_start_matches("```");
        if let Some(newline) = trimmed.find('\n') {
            let first_line = &trimmed[..newline];
            if !first_line.contains('{') {
                trimmed = &trimmed[newline + 1..];
            }
        }
        trimmed = trimmed.trim_end_matches("```").trim();
    }

    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> String {
        serde_json::json!({
            "current_state": {
                "evaluation_previous_goal": "Success",
                "memory": "On the search page",
                "next_goal": "Click the first result"
            },
            "action": [
                {"click_element": {"index": 3}},
                {"extract_content": {"goal": "prices"}}
            ]
        })
        .to_string()
    }

    #[test]
    fn test_parse_plain_json() {
        let output = AgentOutput::parse_raw(&sample_json()).unwrap();
        assert_eq!(output.action.len(), 2);
        assert_eq!(output.action[0].name(), "click_element");
        assert_eq!(output.action[0].index(), Some(3));
        assert_eq!(output.action[1].index(), None);
        assert_eq!(output.current_state.next_goal, "Click the first result");
    }

    #[test]
    fn test_parse_fenced_json() {
        let fenced = format!("```json\n{}\n```", sample_json());
        let output = AgentOutput::parse_raw(&fenced).unwrap();
        assert_eq!(output.action[0].name(), "click_element");
    }

    #[test]
    fn test_parse_with_think_block() {
        let wrapped = format!("<think>let me see...\nthe button is [3]</think>\n{}", sample_json());
        let output = AgentOutput::parse_raw(&wrapped).unwrap();
        assert_eq!(output.action.len(), 2);
    }

    #[test]
    fn test_parse_with_stray_close_tag() {
        let wrapped = format!("some leaked reasoning</think>{}", sample_json());
        let output = AgentOutput::parse_raw(&wrapped).unwrap();
        assert_eq!(output.action.len(), 2);
    }

    #[test]
    fn test_parse_garbage_is_typed_error() {
        let err = AgentOutput::parse_raw("I think we should click the button").unwrap_err();
        assert!(matches!(err, AgentError::InvalidModelOutput(_)));
    }

    #[test]
    fn test_truncate_actions() {
        let mut output = AgentOutput::parse_raw(&sample_json()).unwrap();
        output.truncate_actions(1);
        assert_eq!(output.action.len(), 1);
        assert_eq!(output.action[0].name(), "click_element");
    }

    #[test]
    fn test_action_call_roundtrip() {
        let call = ActionCall::new("wait", serde_json::json!({"seconds": 2}));
        let serialized = serde_json::to_string(&call).unwrap();
        assert_eq!(serialized, r#"{"wait":{"seconds":2}}"#);
        let back: ActionCall = serde_json::from_str(&serialized).unwrap();
        assert_eq!(back.name(), "wait");
    }
}
