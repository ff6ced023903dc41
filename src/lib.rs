//! # browser-agent
//!
//! An LLM-driven browser automation agent over the Chrome DevTools Protocol.
//!
//! The agent perceives a page as a flat list of indexed interactive elements,
//! asks a language model what to do next, executes the chosen actions and
//! repeats until the task is done or a step limit is hit.
//!
//! ## Components
//!
//! - **Browser session**: launch or connect to Chrome/Chromium, capture the
//!   per-step perception state ([`BrowserSession`])
//! - **DOM snapshot**: indexed element tree built by an in-page script, with
//!   the `[index]<tag>text</>` serialization the model reads ([`dom`])
//! - **Action registry**: schema-validated browser actions dispatched by name
//!   ([`tools::ToolRegistry`])
//! - **Agent loop**: prompt assembly under a token budget, step engine with
//!   multi-action staleness detection, durable run history ([`agent::Agent`])
//!
//! ## Running a task
//!
//! ```rust,no_run
//! use browser_agent::{Agent, BrowserSession, LaunchOptions, OpenAiClient};
//!
//! # fn main() -> browser_agent::Result<()> {
//! let session = BrowserSession::launch(LaunchOptions::default())?;
//! let llm = OpenAiClient::new("https://api.openai.com/v1", "sk-...", "gpt-4o")?;
//!
//! let mut agent = Agent::new("Find the current Rust release version", Box::new(llm), session);
//! let history = agent.run(25)?;
//!
//! if let Some(result) = history.final_result() {
//!     println!("{}", result);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Direct action dispatch
//!
//! ```rust,no_run
//! use browser_agent::{BrowserSession, LaunchOptions};
//! use browser_agent::tools::{ToolContext, ToolRegistry};
//! use serde_json::json;
//!
//! # fn main() -> browser_agent::Result<()> {
//! let session = BrowserSession::launch(LaunchOptions::default())?;
//! let registry = ToolRegistry::with_defaults();
//! let mut context = ToolContext::new(&session);
//!
//! registry.execute("go_to_url", json!({"url": "example.com"}), &mut context)?;
//! let result = registry.execute("extract_content", json!({}), &mut context)?;
//! println!("{}", result.extracted_content.unwrap_or_default());
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod browser;
pub mod dom;
pub mod error;
pub mod llm;
pub mod tools;

pub use agent::{Agent, AgentHistoryList, AgentSettings, LlmMode};
pub use browser::{BrowserSession, ConnectionOptions, LaunchOptions, PageState, TabInfo};
pub use dom::{DomTree, clickable_elements_to_string};
pub use error::{AgentError, Result};
pub use llm::{LanguageModel, Message, OpenAiClient};
pub use tools::{ActionResult, Tool, ToolContext, ToolRegistry};
