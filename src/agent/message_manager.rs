//! Conversation assembly under a token budget
//!
//! Token counts are estimated, not exact: text costs its character count
//! divided by a per-token ratio, every image costs a flat amount, tool calls
//! cost their serialized length. The running total is kept alongside the
//! messages so trimming decisions never rescan the whole history.

use crate::agent::output::AgentOutput;
use crate::agent::prompts::AgentMessagePrompt;
use crate::agent::settings::AgentStepInfo;
use crate::browser::PageState;
use crate::error::{AgentError, Result};
use crate::llm::{ContentPart, Message, MessageRole, ToolCall};
use crate::tools::ActionResult;
use serde_json::json;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct MessageManagerSettings {
    pub max_input_tokens: usize,

    /// Estimated characters per token for plain text
    pub estimated_characters_per_token: usize,

    /// Flat token cost charged per attached image
    pub image_tokens: usize,

    pub include_attributes: Vec<String>,

    /// Extra instructions inserted after the system message
    pub message_context: Option<String>,

    /// Secret name -> value; values never enter the conversation, only their
    /// placeholder names do
    pub sensitive_data: Option<HashMap<String, String>>,
}

impl Default for MessageManagerSettings {
    fn default() -> Self {
        Self {
            max_input_tokens: 128_000,
            estimated_characters_per_token: 3,
            image_tokens: 800,
            include_attributes: Vec::new(),
            message_context: None,
            sensitive_data: None,
        }
    }
}

/// A message plus its estimated token cost
#[derive(Debug, Clone)]
pub struct ManagedMessage {
    pub message: Message,
    pub tokens: usize,
}

/// Ordered message list with a maintained token total
#[derive(Debug, Clone, Default)]
struct MessageHistory {
    messages: Vec<ManagedMessage>,
    current_tokens: usize,
}

impl MessageHistory {
    /// Append, or insert at `position` when given
    fn add(&mut self, message: Message, tokens: usize, position: Option<usize>) {
        self.current_tokens += tokens;
        let managed = ManagedMessage { message, tokens };
        match position {
            Some(pos) if pos < self.messages.len() => self.messages.insert(pos, managed),
            _ => self.messages.push(managed),
        }
    }

    fn remove(&mut self, index: usize) -> ManagedMessage {
        let removed = self.messages.remove(index);
        self.current_tokens -= removed.tokens;
        removed
    }

    fn len(&self) -> usize {
        self.messages.len()
    }

    fn last(&self) -> Option<&ManagedMessage> {
        self.messages.last()
    }
}

/// Assembles the message list sent to the model each step
pub struct MessageManager {
    settings: MessageManagerSettings,
    history: MessageHistory,
}

impl MessageManager {
    /// Seed the conversation: system message, optional context, the task,
    /// sensitive-data placeholder info and one example model turn
    pub fn new(task: &str, system_message: Message, settings: MessageManagerSettings) -> Self {
        let mut manager = Self { settings, history: MessageHistory::default() };

        manager.add_message(system_message, None);

        if let Some(context) = manager.settings.message_context.clone() {
            manager.add_message(Message::human(format!("Context for the task: {}", context)), None);
        }

        manager.add_message(
            Message::human(format!(
                "Your ultimate task is: \"{}\". If you achieved your ultimate task, stop \
                 everything and use the done action in the next step to complete the task. \
                 If not, continue as usual.",
                task
            )),
            None,
        );

        if let Some(sensitive) = &manager.settings.sensitive_data {
            let mut placeholders: Vec<&str> = sensitive.keys().map(|k| k.as_str()).collect();
            placeholders.sort_unstable();
            let info = format!(
                "Here are placeholders for sensitive data: {:?} To use them, write \
                 <secret>the placeholder name</secret>",
                placeholders
            );
            manager.add_message(Message::human(info), None);
        }

        // One example turn so the model has seen the expected shape
        let example = Message::ai("").with_tool_calls(vec![ToolCall {
            id: "1".to_string(),
            name: "AgentOutput".to_string(),
            arguments: json!({
                "current_state": {
                    "evaluation_previous_goal": "Success - I opened the first page",
                    "memory": "Starting with the new task. I have completed 1/10 steps",
                    "next_goal": "Click on company a"
                },
                "action": [{"click_element": {"index": 0}}]
            }),
        }]);
        manager.add_message(example, None);
        manager.add_message(Message::tool("Browser started"), None);

        manager
    }

    /// Fold memorable results into the permanent history, then append the
    /// transient state message the model decides from
    pub fn add_state_message(
        &mut self,
        state: &PageState,
        last_results: &[ActionResult],
        step_info: Option<AgentStepInfo>,
        use_vision: bool,
    ) {
        let mut transient: Vec<ActionResult> = Vec::new();
        for result in last_results {
            if result.include_in_memory {
                if let Some(content) = &result.extracted_content {
                    self.add_message(Message::human(format!("Action result: {}", content)), None);
                }
                if let Some(error) = &result.error {
                    let last_line = error.lines().last().unwrap_or(error);
                    self.add_message(Message::human(format!("Action error: {}", last_line)), None);
                }
            } else {
                transient.push(result.clone());
            }
        }

        let message = AgentMessagePrompt::new(
            state,
            &transient,
            &self.settings.include_attributes,
            step_info,
        )
        .build(use_vision);
        self.add_message(message, None);
    }

    /// Drop the transient state message again (the model has answered, or
    /// failed to; either way the next step renders a fresh one)
    pub fn remove_last_state_message(&mut self) {
        if self.history.len() > 2
            && self
                .history
                .last()
                .map(|m| m.message.role == MessageRole::Human)
                .unwrap_or(false)
        {
            let last = self.history.len() - 1;
            self.history.remove(last);
        }
    }

    /// Record the model's decision as a tool-calling AI turn plus its ack
    pub fn add_model_output(&mut self, output: &AgentOutput) -> Result<()> {
        let arguments = serde_json::to_value(output)?;
        let message = Message::ai("").with_tool_calls(vec![ToolCall {
            id: "1".to_string(),
            name: "AgentOutput".to_string(),
            arguments,
        }]);
        self.add_message(message, None);
        self.add_message(Message::tool(""), None);
        Ok(())
    }

    /// Insert the planner's analysis just before the current state message
    pub fn add_plan(&mut self, plan: &str) {
        let position = self.history.len().saturating_sub(1);
        self.add_message(Message::ai(plan), Some(position));
    }

    /// Append an arbitrary message (corrective hints, forced-done directives)
    pub fn add_message(&mut self, message: Message, position: Option<usize>) {
        let message = self.filter_sensitive(message);
        let tokens = self.estimate_tokens(&message);
        self.history.add(message, tokens, position);
    }

    /// Bring the conversation under budget by degrading the last message.
    ///
    /// First the screenshot goes, then text is truncated proportionally to
    /// the overshoot. If that would remove more than 99% of the message the
    /// budget is considered exhausted.
    pub fn cut_messages(&mut self) -> Result<()> {
        let mut diff = self.history.current_tokens as i64 - self.settings.max_input_tokens as i64;
        if diff <= 0 {
            return Ok(());
        }
        if self.history.messages.is_empty() {
            return Ok(());
        }

        let last_index = self.history.len() - 1;

        let mut last = self.history.remove(last_index);
        if last.message.strip_images() {
            last.tokens = self.estimate_tokens(&last.message);
            log::debug!("Dropped state screenshot to save tokens");
        }
        self.history.add(last.message.clone(), last.tokens, None);

        diff = self.history.current_tokens as i64 - self.settings.max_input_tokens as i64;
        if diff <= 0 {
            return Ok(());
        }

        let last = self.history.remove(last_index);
        let proportion_to_remove = diff as f64 / last.tokens.max(1) as f64;
        if proportion_to_remove > 0.99 {
            // Put it back so the caller sees a consistent history
            self.history.add(last.message, last.tokens, None);
            return Err(AgentError::TokenBudgetExhausted(format!(
                "trimming would remove {:.0}% of the last message; reduce the page or the history",
                proportion_to_remove * 100.0
            )));
        }

        let text = last.message.text();
        let keep_chars = (text.chars().count() as f64 * (1.0 - proportion_to_remove)) as usize;
        let truncated: String = text.chars().take(keep_chars).collect();

        let mut message = last.message;
        message.set_text(truncated);
        let tokens = self.estimate_tokens(&message);
        log::debug!(
            "Truncated state message from {} to {} estimated tokens",
            last.tokens,
            tokens
        );
        self.history.add(message, tokens, None);

        Ok(())
    }

    /// Coarser fallback than [`Self::cut_messages`]: evict the oldest
    /// non-system message entirely. Returns false when nothing is evictable.
    pub fn remove_oldest_message(&mut self) -> bool {
        let index = self
            .history
            .messages
            .iter()
            .position(|m| m.message.role != MessageRole::System);
        match index {
            Some(index) => {
                self.history.remove(index);
                true
            }
            None => false,
        }
    }

    /// Messages in send order
    pub fn input_messages(&self) -> Vec<Message> {
        self.history.messages.iter().map(|m| m.message.clone()).collect()
    }

    pub fn total_tokens(&self) -> usize {
        self.history.current_tokens
    }

    pub fn max_input_tokens(&self) -> usize {
        self.settings.max_input_tokens
    }

    /// Lower the budget (after the model rejected the current size)
    pub fn set_max_input_tokens(&mut self, max: usize) {
        self.settings.max_input_tokens = max;
    }

    /// Estimated token cost of one message
    fn estimate_tokens(&self, message: &Message) -> usize {
        let mut tokens = 0;
        for part in &message.content {
            match part {
                ContentPart::Text { text } => {
                    tokens += text.chars().count() / self.settings.estimated_characters_per_token;
                }
                ContentPart::ImageUrl { .. } => tokens += self.settings.image_tokens,
            }
        }
        for call in &message.tool_calls {
            tokens += call.arguments.to_string().chars().count()
                / self.settings.estimated_characters_per_token;
        }
        tokens
    }

    /// Replace raw secret values with their placeholder names
    fn filter_sensitive(&self, mut message: Message) -> Message {
        let Some(sensitive) = &self.settings.sensitive_data else {
            return message;
        };
        for part in &mut message.content {
            if let ContentPart::Text { text } = part {
                for (name, value) in sensitive {
                    if !value.is_empty() && text.contains(value.as_str()) {
                        *text = text.replace(value.as_str(), &format!("<secret>{}</secret>", name));
                    }
                }
            }
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::output::{ActionCall, AgentBrain};
    use crate::browser::{PageState, TabInfo};
    use crate::dom::parse_dom_snapshot;

    fn manager(settings: MessageManagerSettings) -> MessageManager {
        MessageManager::new("find the price", Message::system("You are an agent."), settings)
    }

    fn sample_state(screenshot: Option<String>) -> PageState {
        let json = serde_json::json!({
            "rootId": "0",
            "map": {
                "0": {"type": "ELEMENT_NODE", "tagName": "body", "xpath": "/body",
                      "attributes": {}, "children": ["1"], "isVisible": true},
                "1": {"type": "ELEMENT_NODE", "tagName": "a", "xpath": "/body/a",
                      "attributes": {}, "children": [], "isVisible": true,
                      "isInteractive": true, "isTopElement": true, "highlightIndex": 0}
            }
        })
        .to_string();
        PageState {
            url: "https://example.com".to_string(),
            title: "Example".to_string(),
            tabs: vec![TabInfo {
                page_id: 0,
                url: "https://example.com".to_string(),
                title: "Example".to_string(),
            }],
            dom: parse_dom_snapshot(&json).unwrap(),
            pixels_above: 0.0,
            pixels_below: 0.0,
            screenshot,
        }
    }

    #[test]
    fn test_seed_layout() {
        let m = manager(MessageManagerSettings::default());
        let messages = m.input_messages();

        assert_eq!(messages[0].role, MessageRole::System);
        assert!(messages[1].text().contains("Your ultimate task is: \"find the price\""));
        assert_eq!(messages[2].tool_calls[0].name, "AgentOutput");
        assert_eq!(messages[3].role, MessageRole::Tool);
        assert!(m.total_tokens() > 0);
    }

    #[test]
    fn test_sensitive_data_never_enters_history() {
        let mut sensitive = HashMap::new();
        sensitive.insert("api_key".to_string(), "sk-supersecret".to_string());
        let settings = MessageManagerSettings {
            sensitive_data: Some(sensitive),
            ..Default::default()
        };
        let mut m = manager(settings);

        m.add_message(Message::human("use sk-supersecret to log in"), None);

        let all_text: String = m.input_messages().iter().map(|msg| msg.text()).collect();
        assert!(!all_text.contains("sk-supersecret"));
        assert!(all_text.contains("<secret>api_key</secret>"));
        // The placeholder list itself is announced at seed time
        assert!(all_text.contains("placeholders for sensitive data"));
    }

    #[test]
    fn test_state_message_is_transient_and_memory_results_stay() {
        let mut m = manager(MessageManagerSettings::default());
        let seeded = m.input_messages().len();

        let results = vec![
            ActionResult::ok("Extracted page content:\nprice is 10").with_memory(),
            ActionResult::ok("Clicked element with index 0"),
        ];
        m.add_state_message(&sample_state(None), &results, None, false);
        // One permanent memory message plus one transient state message
        assert_eq!(m.input_messages().len(), seeded + 2);

        let state_text = m.input_messages().last().unwrap().text();
        assert!(state_text.contains("Clicked element with index 0"));
        assert!(!state_text.contains("price is 10"));

        m.remove_last_state_message();
        let remaining = m.input_messages();
        assert_eq!(remaining.len(), seeded + 1);
        assert!(remaining.last().unwrap().text().contains("price is 10"));
    }

    #[test]
    fn test_token_total_tracks_adds_and_removes() {
        let mut m = manager(MessageManagerSettings::default());
        let before = m.total_tokens();

        m.add_state_message(&sample_state(None), &[], None, false);
        assert!(m.total_tokens() > before);

        m.remove_last_state_message();
        assert_eq!(m.total_tokens(), before);
    }

    #[test]
    fn test_cut_strips_image_first() {
        let mut m = manager(MessageManagerSettings::default());
        m.add_state_message(&sample_state(Some("QUJD".to_string())), &[], None, true);

        // Budget that fits once the flat image cost is gone
        let budget = m.total_tokens() - MessageManagerSettings::default().image_tokens;
        m.set_max_input_tokens(budget);

        m.cut_messages().unwrap();
        assert!(m.total_tokens() <= budget);
        assert!(!m.input_messages().last().unwrap().has_image());
    }

    #[test]
    fn test_cut_truncates_text_proportionally() {
        let mut m = manager(MessageManagerSettings::default());
        m.add_state_message(&sample_state(None), &[], None, false);

        let before_tokens = m.total_tokens();
        let last_len = m.input_messages().last().unwrap().text().len();
        m.set_max_input_tokens(before_tokens - 20);

        m.cut_messages().unwrap();
        assert!(m.input_messages().last().unwrap().text().len() < last_len);
        assert!(m.total_tokens() < before_tokens);
    }

    #[test]
    fn test_cut_fails_when_budget_unreachable() {
        let mut m = manager(MessageManagerSettings::default());
        m.add_state_message(&sample_state(None), &[], None, false);

        m.set_max_input_tokens(1);
        let err = m.cut_messages().unwrap_err();
        assert!(matches!(err, AgentError::TokenBudgetExhausted(_)));
    }

    #[test]
    fn test_remove_oldest_skips_system_message() {
        let mut m = manager(MessageManagerSettings::default());
        let before = m.input_messages().len();

        assert!(m.remove_oldest_message());
        let messages = m.input_messages();
        assert_eq!(messages.len(), before - 1);
        assert_eq!(messages[0].role, MessageRole::System);
        // The task message right after the system message was the one evicted
        assert!(!messages.iter().any(|msg| msg.text().contains("Your ultimate task")));
    }

    #[test]
    fn test_model_output_recorded_as_tool_call() {
        let mut m = manager(MessageManagerSettings::default());
        let output = AgentOutput {
            current_state: AgentBrain {
                evaluation_previous_goal: "Success".to_string(),
                memory: String::new(),
                next_goal: "done".to_string(),
            },
            action: vec![ActionCall::new("done", serde_json::json!({"text": "x", "success": true}))],
        };
        m.add_model_output(&output).unwrap();

        let messages = m.input_messages();
        let ai = &messages[messages.len() - 2];
        assert_eq!(ai.tool_calls[0].name, "AgentOutput");
        assert!(ai.tool_calls[0].arguments["action"][0].get("done").is_some());
        assert_eq!(messages.last().unwrap().role, MessageRole::Tool);
    }
}
