//! Prompt construction
//!
//! The system prompt fixes the response contract and lists the action
//! vocabulary; [`AgentMessagePrompt`] renders the per-step page state into
//! the transient human message the model decides from.

use crate::agent::settings::AgentStepInfo;
use crate::browser::PageState;
use crate::dom::clickable_elements_to_string;
use crate::llm::Message;
use crate::tools::ActionResult;

/// Directive appended on the final step, when only finishing is acceptable
pub const FORCED_DONE_DIRECTIVE: &str = "This is your last step. You must now finish the task: \
respond with exactly one action, the \"done\" action, carrying a \"text\" field summarizing \
everything you found out for the ultimate task and a \"success\" boolean that is true only if \
the full task was accomplished.";

/// Builds the fixed system message
pub struct SystemPrompt {
    action_description: String,
    max_actions_per_step: usize,
}

impl SystemPrompt {
    pub fn new(action_description: impl Into<String>, max_actions_per_step: usize) -> Self {
        Self {
            action_description: action_description.into(),
            max_actions_per_step,
        }
    }

    pub fn build(&self) -> Message {
        let text = format!(
            r#"You are an agent that automates browser tasks. Your goal is to accomplish the ultimate task following the rules.

# Input Format
Task
Previous steps
Current URL
Open Tabs
Interactive Elements
[index]<type>text</type>
- index: Numeric identifier for interaction
- type: HTML element type (button, input, etc.)
- text: Element description
Example: [33]<button>Submit Form</button>

- Only elements with numeric indexes in [] are interactive
- Elements without [] provide only context

# Response Rules
1. RESPONSE FORMAT: You must ALWAYS respond with valid JSON in this exact format:
{{"current_state": {{"evaluation_previous_goal": "Success|Failed|Unknown - Analyze whether the previous goals were achieved",
"memory": "Description of what has been done and what you need to remember",
"next_goal": "What needs to be done with the next immediate action"}},
"action": [{{"one_action_name": {{// action-specific parameters}}}}, // ... more actions in sequence]}}

2. ACTIONS: You can specify multiple actions in the list to be executed in sequence, but always specify only one action name per item. Use maximum {max_actions} actions per sequence.
Actions are executed in the given order. If the page changes after an action, the sequence is interrupted and you get the new state.
Only use multiple actions when they belong together on the same unchanged page, like filling several form fields.

3. ELEMENT INTERACTION: Only use indexes of the interactive elements listed in the current state. If you need an element that is not listed, scroll or extract content first.

4. NAVIGATION & ERROR HANDLING: If no suitable elements exist, use other functions such as go_back, open_tab or wait. If an action fails, try an alternative approach instead of repeating it.

5. TASK COMPLETION: Use the done action as the last action as soon as the ultimate task is complete. Set success to true only if the full task was accomplished, otherwise describe what was and was not achieved in the text field. Do not invent results.

6. EXTRACTION: If your task is to find information, use extract_content on the relevant pages to get and store the information.

# Available Actions
{actions}"#,
            max_actions = self.max_actions_per_step,
            actions = self.action_description,
        );
        Message::system(text)
    }
}

/// Renders page state plus the previous step's results into a human message
pub struct AgentMessagePrompt<'a> {
    state: &'a PageState,
    results: &'a [ActionResult],
    include_attributes: &'a [String],
    step_info: Option<AgentStepInfo>,
}

impl<'a> AgentMessagePrompt<'a> {
    pub fn new(
        state: &'a PageState,
        results: &'a [ActionResult],
        include_attributes: &'a [String],
        step_info: Option<AgentStepInfo>,
    ) -> Self {
        Self { state, results, include_attributes, step_info }
    }

    fn state_description(&self) -> String {
        let elements = clickable_elements_to_string(&self.state.dom, self.include_attributes);

        let elements_block = if elements.is_empty() {
            "empty page".to_string()
        } else {
            let above = if self.state.pixels_above > 0.0 {
                format!(
                    "... {} pixels above - scroll or extract content to see more ...\n",
                    self.state.pixels_above as i64
                )
            } else {
                "[Start of page]\n".to_string()
            };
            let below = if self.state.pixels_below > 0.0 {
                format!(
                    "\n... {} pixels below - scroll or extract content to see more ...",
                    self.state.pixels_below as i64
                )
            } else {
                "\n[End of page]".to_string()
            };
            format!("{}{}{}", above, elements, below)
        };

        let tabs = self
            .state
            .tabs
            .iter()
            .map(|t| format!("{}: {} ({})", t.page_id, t.url, t.title))
            .collect::<Vec<_>>()
            .join("\n");

        let mut text = format!(
            "[Current state starts here]\n\
             The following is one-time information - if you need to remember it write it to memory:\n\
             Current url: {}\n\
             Available tabs:\n{}\n\
             Interactive elements from top layer of the current page inside the viewport:\n{}",
            self.state.url, tabs, elements_block
        );

        if let Some(info) = self.step_info {
            text.push_str(&format!(
                "\nCurrent step: {}/{}",
                info.step_number + 1,
                info.max_steps
            ));
        }

        for (i, result) in self.results.iter().enumerate() {
            if let Some(content) = &result.extracted_content {
                text.push_str(&format!(
                    "\nAction result {}/{}: {}",
                    i + 1,
                    self.results.len(),
                    content
                ));
            }
            if let Some(error) = &result.error {
                // Only the tail of a long error is actionable for the model
                let last_line = error.lines().last().unwrap_or(error);
                text.push_str(&format!(
                    "\nAction error {}/{}: ...{}",
                    i + 1,
                    self.results.len(),
                    last_line
                ));
            }
        }

        text
    }

    /// The full human state message, with a screenshot when vision is on
    pub fn build(&self, use_vision: bool) -> Message {
        let text = self.state_description();
        match (&self.state.screenshot, use_vision) {
            (Some(screenshot), true) => Message::human(text).with_image_base64(screenshot),
            _ => Message::human(text),
        }
    }
}

/// System message for the optional planning model
pub struct PlannerPrompt<'a> {
    action_description: &'a str,
}

impl<'a> PlannerPrompt<'a> {
    pub fn new(action_description: &'a str) -> Self {
        Self { action_description }
    }

    pub fn build(&self) -> Message {
        Message::system(format!(
            "You are a planning agent that helps break down tasks into smaller steps based on the \
             current state. Your job is to:\n\
             1. Analyze the current state and history\n\
             2. Evaluate progress towards the ultimate goal\n\
             3. Identify potential challenges\n\
             4. Suggest the next high-level steps to take\n\n\
             The browser agent can act through these actions:\n{}\n\n\
             Respond in plain text with your analysis and suggested next steps. Keep it concise.",
            self.action_description
        ))
    }
}
