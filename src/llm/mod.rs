//! Language model interface
//!
//! A small role-tagged message model plus the [`LanguageModel`] trait the
//! agent calls through. The concrete [`OpenAiClient`] speaks the
//! chat-completions protocol of any OpenAI-compatible endpoint.

pub mod openai;

pub use openai::OpenAiClient;

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    Human,
    Ai,
    Tool,
}

/// One piece of message content; state messages may carry an image next to text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { url: String },
}

/// A structured tool invocation attached to an AI message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// One conversation message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: Vec<ContentPart>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self::with_role(MessageRole::System, text)
    }

    pub fn human(text: impl Into<String>) -> Self {
        Self::with_role(MessageRole::Human, text)
    }

    pub fn ai(text: impl Into<String>) -> Self {
        Self::with_role(MessageRole::Ai, text)
    }

    pub fn tool(text: impl Into<String>) -> Self {
        Self::with_role(MessageRole::Tool, text)
    }

    fn with_role(role: MessageRole, text: impl Into<String>) -> Self {
        Self {
            role,
            content: vec![ContentPart::Text { text: text.into() }],
            tool_calls: Vec::new(),
        }
    }

    /// Builder method: attach a base64 PNG as an image part
    pub fn with_image_base64(mut self, base64_png: &str) -> Self {
        self.content.push(ContentPart::ImageUrl {
            url: format!("data:image/png;base64,{}", base64_png),
        });
        self
    }

    /// Builder method: attach tool calls
    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = tool_calls;
        self
    }

    /// Concatenated text parts
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text { text } => Some(text.as_str()),
                ContentPart::ImageUrl { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Replace all text parts with a single new text, keeping image parts
    pub fn set_text(&mut self, text: String) {
        self.content.retain(|p| matches!(p, ContentPart::ImageUrl { .. }));
        self.content.insert(0, ContentPart::Text { text });
    }

    pub fn has_image(&self) -> bool {
        self.content.iter().any(|p| matches!(p, ContentPart::ImageUrl { .. }))
    }

    /// Drop image parts; returns whether any were present
    pub fn strip_images(&mut self) -> bool {
        let before = self.content.len();
        self.content.retain(|p| matches!(p, ContentPart::Text { .. }));
        self.content.len() != before
    }
}

/// A chat-completion language model.
///
/// Errors must be typed: rate/quota rejections surface as
/// [`crate::error::AgentError::RateLimited`] so the agent's failure handling
/// never inspects provider message strings.
pub trait LanguageModel: Send + Sync {
    /// Model identifier, for logs
    fn model_name(&self) -> &str;

    /// Free-text completion over the message list
    fn complete(&self, messages: &[Message]) -> Result<String>;

    /// Structured completion constrained by a JSON schema.
    ///
    /// `method` of `Some("function_calling")` requests a named function call;
    /// `None` requests a plain JSON response.
    fn complete_structured(
        &self,
        messages: &[Message],
        schema: &serde_json::Value,
        method: Option<&str>,
    ) -> Result<serde_json::Value>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        let msg = Message::system("rules");
        assert_eq!(msg.role, MessageRole::System);
        assert_eq!(msg.text(), "rules");
        assert!(!msg.has_image());
    }

    #[test]
    fn test_image_attachment_and_strip() {
        let mut msg = Message::human("state").with_image_base64("QUJD");
        assert!(msg.has_image());
        assert!(msg.text().contains("state"));

        assert!(msg.strip_images());
        assert!(!msg.has_image());
        assert_eq!(msg.text(), "state");
        // A second strip finds nothing to remove
        assert!(!msg.strip_images());
    }

    #[test]
    fn test_set_text_keeps_images() {
        let mut msg = Message::human("old").with_image_base64("QUJD");
        msg.set_text("new".to_string());
        assert_eq!(msg.text(), "new");
        assert!(msg.has_image());
    }

    #[test]
    fn test_tool_calls() {
        let msg = Message::ai("").with_tool_calls(vec![ToolCall {
            id: "1".to_string(),
            name: "AgentOutput".to_string(),
            arguments: serde_json::json!({"action": []}),
        }]);
        assert_eq!(msg.tool_calls.len(), 1);
        assert_eq!(msg.tool_calls[0].name, "AgentOutput");
    }
}
