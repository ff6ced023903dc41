use thiserror::Error;

/// Errors produced by the browser agent
#[derive(Debug, Error)]
pub enum AgentError {
    /// Chrome could not be launched
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    /// Could not connect to an existing Chrome instance
    #[error("Failed to connect to browser: {0}")]
    ConnectionFailed(String),

    /// Navigation to a URL failed or timed out
    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    /// A tab-level operation failed (create, activate, close, lookup)
    #[error("Tab operation failed: {0}")]
    TabOperationFailed(String),

    /// JavaScript evaluation in the page failed
    #[error("Script evaluation failed: {0}")]
    EvaluationFailed(String),

    /// The in-page extraction script returned a malformed or empty node map
    #[error("Failed to construct DOM tree: {0}")]
    DomTreeConstruction(String),

    /// A highlight index from the model does not exist in the current snapshot
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// A registered action failed while executing
    #[error("Action '{action}' failed: {reason}")]
    ActionFailed { action: String, reason: String },

    /// The model asked for an action name that is not registered
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// Action parameters did not match the declared schema
    #[error("Invalid parameters for action '{action}': {reason}")]
    InvalidActionParams { action: String, reason: String },

    /// The LLM response could not be parsed into an agent output
    #[error("Invalid model output: {0}")]
    InvalidModelOutput(String),

    /// The LLM endpoint rejected the request for rate/quota reasons
    #[error("LLM rate limited: {0}")]
    RateLimited(String),

    /// Any other LLM transport or protocol failure
    #[error("LLM request failed: {0}")]
    LlmRequestFailed(String),

    /// Trimming would have to remove more than 99% of the last message
    #[error("Token budget exhausted: {0}")]
    TokenBudgetExhausted(String),

    /// The agent was paused or stopped at a cancellation point
    #[error("Agent interrupted")]
    Interrupted,

    /// Conversation log or history file could not be written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failure outside model-output parsing
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience result alias used throughout the crate
pub type Result<T> = std::result::Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AgentError::ActionFailed {
            action: "click_element".to_string(),
            reason: "node detached".to_string(),
        };
        assert_eq!(err.to_string(), "Action 'click_element' failed: node detached");

        let err = AgentError::TokenBudgetExhausted("needs 100% removal".to_string());
        assert!(err.to_string().contains("Token budget exhausted"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: AgentError = io_err.into();
        assert!(matches!(err, AgentError::Io(_)));
    }
}
