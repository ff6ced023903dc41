//! Run history
//!
//! Every step appends one [`AgentHistory`] record: the model's decision, the
//! action results and a durable projection of the page state. Interacted
//! elements are stored as [`DomHistoryElement`] projections so records stay
//! valid after their snapshot is gone.

use crate::agent::output::AgentOutput;
use crate::browser::TabInfo;
use crate::dom::DomHistoryElement;
use crate::error::Result;
use crate::tools::ActionResult;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Timing and cost accounting for one step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepMetadata {
    pub step_number: usize,

    /// Unix timestamps in seconds
    pub step_start_time: f64,
    pub step_end_time: f64,

    /// Estimated tokens sent to the model this step
    pub input_tokens: usize,
}

impl StepMetadata {
    pub fn duration_seconds(&self) -> f64 {
        self.step_end_time - self.step_start_time
    }
}

/// Seconds since the Unix epoch, as a float
pub(crate) fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Snapshot-independent record of the page as it was during a step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserStateHistory {
    pub url: String,
    pub title: String,
    pub tabs: Vec<TabInfo>,

    /// One entry per executed action: the element it targeted, if any
    pub interacted_element: Vec<Option<DomHistoryElement>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
}

/// One step of the run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentHistory {
    pub model_output: Option<AgentOutput>,
    pub result: Vec<ActionResult>,
    pub state: BrowserStateHistory,
    pub metadata: Option<StepMetadata>,
}

/// The full run, with accessors over all steps
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentHistoryList {
    pub history: Vec<AgentHistory>,
}

impl AgentHistoryList {
    pub fn add(&mut self, item: AgentHistory) {
        self.history.push(item);
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    fn last_result(&self) -> Option<&ActionResult> {
        self.history.last().and_then(|h| h.result.last())
    }

    /// The run ended with a `done` action
    pub fn is_done(&self) -> bool {
        self.last_result().map(|r| r.is_done).unwrap_or(false)
    }

    /// Success flag of the final `done` action, if the run is done
    pub fn is_successful(&self) -> Option<bool> {
        self.last_result().filter(|r| r.is_done).and_then(|r| r.success)
    }

    /// Content of the final `done` action
    pub fn final_result(&self) -> Option<&str> {
        self.last_result()
            .filter(|r| r.is_done)
            .and_then(|r| r.extracted_content.as_deref())
    }

    /// Every error message across all steps
    pub fn errors(&self) -> Vec<&str> {
        self.history
            .iter()
            .flat_map(|h| h.result.iter())
            .filter_map(|r| r.error.as_deref())
            .collect()
    }

    /// URL visited at each step
    pub fn urls(&self) -> Vec<&str> {
        self.history.iter().map(|h| h.state.url.as_str()).collect()
    }

    /// Action names in execution order
    pub fn action_names(&self) -> Vec<String> {
        self.history
            .iter()
            .filter_map(|h| h.model_output.as_ref())
            .flat_map(|o| o.action.iter())
            .map(|a| a.name().to_string())
            .collect()
    }

    pub fn total_input_tokens(&self) -> usize {
        self.history
            .iter()
            .filter_map(|h| h.metadata.as_ref())
            .map(|m| m.input_tokens)
            .sum()
    }

    pub fn total_duration_seconds(&self) -> f64 {
        self.history
            .iter()
            .filter_map(|h| h.metadata.as_ref())
            .map(|m| m.duration_seconds())
            .sum()
    }

    /// Serialize the whole run to a JSON file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
