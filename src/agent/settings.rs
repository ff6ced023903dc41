use std::path::PathBuf;

/// How structured output is requested from the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmMode {
    /// Free-text completion, parsed as JSON after stripping code fences and
    /// reasoning tags
    Raw,

    /// Schema-constrained completion; `method` of `Some("function_calling")`
    /// uses a named function call, `None` a plain JSON response format
    Structured { method: Option<String> },
}

impl Default for LlmMode {
    fn default() -> Self {
        LlmMode::Structured { method: None }
    }
}

/// Tunable behavior of the agent loop
#[derive(Debug, Clone)]
pub struct AgentSettings {
    /// Consecutive failed steps before the run aborts
    pub max_failures: usize,

    /// Seconds to back off after a rate-limit rejection
    pub retry_delay_secs: u64,

    /// Token budget for the conversation sent to the model
    pub max_input_tokens: usize,

    /// Upper bound on actions the model may queue in one step
    pub max_actions_per_step: usize,

    /// Attach a screenshot to each state message
    pub use_vision: bool,

    /// Attributes rendered next to each interactive element
    pub include_attributes: Vec<String>,

    /// Run the planner every N steps (when a planner model is set)
    pub planner_interval: usize,

    /// Pause between queued actions within one step
    pub action_delay_ms: u64,

    /// Directory to write per-step conversation transcripts into
    pub save_conversation_path: Option<PathBuf>,

    pub llm_mode: LlmMode,

    /// Extra instructions appended after the system prompt
    pub message_context: Option<String>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_failures: 3,
            retry_delay_secs: 10,
            max_input_tokens: 128_000,
            max_actions_per_step: 10,
            use_vision: true,
            include_attributes: [
                "title",
                "type",
                "name",
                "role",
                "tabindex",
                "aria-label",
                "placeholder",
                "value",
                "alt",
                "aria-expanded",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            planner_interval: 1,
            action_delay_ms: 500,
            save_conversation_path: None,
            llm_mode: LlmMode::default(),
            message_context: None,
        }
    }
}

/// Position of the current step within the run
#[derive(Debug, Clone, Copy)]
pub struct AgentStepInfo {
    pub step_number: usize,
    pub max_steps: usize,
}

impl AgentStepInfo {
    pub fn new(step_number: usize, max_steps: usize) -> Self {
        Self { step_number, max_steps }
    }

    pub fn is_last_step(&self) -> bool {
        self.step_number + 1 >= self.max_steps
    }
}
