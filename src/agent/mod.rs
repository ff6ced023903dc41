//! Agent loop
//!
//! Couples perception (browser + DOM snapshot), decision (prompt assembly +
//! LLM) and action (the dispatch registry) into the step engine in
//! [`service`]. History records every step durably; the message manager
//! keeps the conversation under its token budget.

pub mod history;
pub mod message_manager;
pub mod output;
pub mod prompts;
pub mod service;
pub mod settings;

pub use history::{AgentHistory, AgentHistoryList, BrowserStateHistory, StepMetadata};
pub use message_manager::{MessageManager, MessageManagerSettings};
pub use output::{ActionCall, AgentBrain, AgentOutput, OutputMode};
pub use prompts::{AgentMessagePrompt, PlannerPrompt, SystemPrompt};
pub use service::{Agent, AgentControl, AgentState};
pub use settings::{AgentSettings, AgentStepInfo, LlmMode};
