//! The agent step engine
//!
//! Each step perceives the page, asks the model for a decision, executes the
//! queued actions and records the outcome. Actions after the first re-check
//! the page before touching an index: if elements appeared that the model
//! never saw, the rest of the queue is abandoned and the model decides again
//! from fresh state.

use crate::agent::history::{
    AgentHistory, AgentHistoryList, BrowserStateHistory, StepMetadata, unix_now,
};
use crate::agent::message_manager::{MessageManager, MessageManagerSettings};
use crate::agent::output::{AgentOutput, OutputMode};
use crate::agent::prompts::{FORCED_DONE_DIRECTIVE, PlannerPrompt, SystemPrompt};
use crate::agent::settings::{AgentSettings, AgentStepInfo, LlmMode};
use crate::browser::{BrowserSession, PageState};
use crate::dom::{selector_fingerprints, to_history_element};
use crate::error::{AgentError, Result};
use crate::llm::{LanguageModel, Message};
use crate::tools::{ActionResult, ToolContext, ToolRegistry};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Mutable run state, injectable for resumption
#[derive(Debug, Default)]
pub struct AgentState {
    pub n_steps: usize,
    pub consecutive_failures: usize,
    pub last_result: Vec<ActionResult>,
    pub history: AgentHistoryList,
}

/// Shared pause/stop flags, usable from another thread (e.g. a Ctrl-C handler)
#[derive(Clone)]
pub struct AgentControl {
    paused: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
}

impl AgentControl {
    fn new() -> Self {
        Self {
            paused: Arc::new(AtomicBool::new(false)),
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

struct StepOutcome {
    page_state: PageState,
    model_output: AgentOutput,
    results: Vec<ActionResult>,
    input_tokens: usize,
}

/// LLM-driven browser agent
pub struct Agent {
    task: String,
    llm: Box<dyn LanguageModel>,
    planner_llm: Option<Box<dyn LanguageModel>>,
    session: BrowserSession,
    registry: ToolRegistry,
    settings: AgentSettings,
    state: AgentState,
    message_manager: MessageManager,
    sensitive_data: Option<HashMap<String, String>>,
    available_file_paths: Option<Vec<String>>,
    control: AgentControl,
}

impl Agent {
    pub fn new(task: impl Into<String>, llm: Box<dyn LanguageModel>, session: BrowserSession) -> Self {
        let task = task.into();
        let registry = ToolRegistry::with_defaults();
        let settings = AgentSettings::default();
        let message_manager = Self::build_message_manager(&task, &registry, &settings, None);

        Self {
            task,
            llm,
            planner_llm: None,
            session,
            registry,
            settings,
            state: AgentState::default(),
            message_manager,
            sensitive_data: None,
            available_file_paths: None,
            control: AgentControl::new(),
        }
    }

    /// Builder method: replace the settings (re-seeds the conversation)
    pub fn with_settings(mut self, settings: AgentSettings) -> Self {
        self.settings = settings;
        self.reseed_message_manager();
        self
    }

    /// Builder method: replace the action registry (re-seeds the conversation)
    pub fn with_registry(mut self, registry: ToolRegistry) -> Self {
        self.registry = registry;
        self.reseed_message_manager();
        self
    }

    /// Builder method: set a separate planning model
    pub fn with_planner(mut self, planner: Box<dyn LanguageModel>) -> Self {
        self.planner_llm = Some(planner);
        self
    }

    /// Builder method: provide secrets the model sees only as placeholders
    pub fn with_sensitive_data(mut self, data: HashMap<String, String>) -> Self {
        self.sensitive_data = Some(data);
        self.reseed_message_manager();
        self
    }

    /// Builder method: restrict file access to these paths
    pub fn with_file_paths(mut self, paths: Vec<String>) -> Self {
        self.available_file_paths = Some(paths);
        self
    }

    /// Builder method: resume from previously captured state
    pub fn with_state(mut self, state: AgentState) -> Self {
        self.state = state;
        self
    }

    /// Handle for pausing or stopping the run from another thread
    pub fn control(&self) -> AgentControl {
        self.control.clone()
    }

    pub fn session(&self) -> &BrowserSession {
        &self.session
    }

    fn build_message_manager(
        task: &str,
        registry: &ToolRegistry,
        settings: &AgentSettings,
        sensitive_data: Option<&HashMap<String, String>>,
    ) -> MessageManager {
        let system =
            SystemPrompt::new(registry.prompt_description(), settings.max_actions_per_step).build();
        MessageManager::new(
            task,
            system,
            MessageManagerSettings {
                max_input_tokens: settings.max_input_tokens,
                include_attributes: settings.include_attributes.clone(),
                message_context: settings.message_context.clone(),
                sensitive_data: sensitive_data.cloned(),
                ..Default::default()
            },
        )
    }

    fn reseed_message_manager(&mut self) {
        self.message_manager = Self::build_message_manager(
            &self.task,
            &self.registry,
            &self.settings,
            self.sensitive_data.as_ref(),
        );
    }

    /// Run the agent until the task is done, the step limit is hit, the run
    /// is stopped, or too many consecutive steps fail
    pub fn run(&mut self, max_steps: usize) -> Result<AgentHistoryList> {
        log::info!("Starting task: {}", self.task);

        for step in 0..max_steps {
            while self.control.is_paused() && !self.control.is_stopped() {
                std::thread::sleep(Duration::from_millis(200));
            }
            if self.control.is_stopped() {
                log::info!("Agent stopped");
                break;
            }
            if self.state.consecutive_failures >= self.settings.max_failures {
                log::error!(
                    "Stopping after {} consecutive failures",
                    self.state.consecutive_failures
                );
                break;
            }

            let mode = if step + 1 >= max_steps {
                OutputMode::ForcedDone
            } else {
                OutputMode::Normal
            };
            self.step(AgentStepInfo::new(step, max_steps), mode);

            if self.state.history.is_done() {
                log::info!("Task completed in {} steps", self.state.n_steps);
                break;
            }
        }

        Ok(self.state.history.clone())
    }

    /// Execute one full step; errors become failure results, an interrupt
    /// leaves the run state untouched for resumption
    pub fn step(&mut self, step_info: AgentStepInfo, mode: OutputMode) {
        log::info!("Step {}", self.state.n_steps + 1);
        let step_start = unix_now();

        match self.run_step_inner(step_info, mode) {
            Ok(outcome) => {
                self.state.consecutive_failures = 0;
                self.state.last_result = outcome.results.clone();

                let metadata = StepMetadata {
                    step_number: self.state.n_steps,
                    step_start_time: step_start,
                    step_end_time: unix_now(),
                    input_tokens: outcome.input_tokens,
                };
                let item = Self::make_history_item(
                    Some(outcome.model_output),
                    outcome.results,
                    &outcome.page_state,
                    Some(metadata),
                );
                self.state.history.add(item);
                self.state.n_steps += 1;
            }
            Err(AgentError::Interrupted) => {
                log::info!("Step interrupted; state preserved for resumption");
                self.state.last_result = vec![
                    ActionResult::failed(
                        "The agent was paused or stopped - the last action might not have finished",
                    ),
                ];
            }
            Err(error) => {
                let results = self.handle_step_error(error);
                self.state.last_result = results.clone();

                // Failed steps still occupy one history slot so the record
                // length always matches the number of steps taken
                let metadata = StepMetadata {
                    step_number: self.state.n_steps,
                    step_start_time: step_start,
                    step_end_time: unix_now(),
                    input_tokens: 0,
                };
                self.state.history.add(Self::failure_history_item(results, Some(metadata)));
                self.state.n_steps += 1;
            }
        }
    }

    fn run_step_inner(&mut self, step_info: AgentStepInfo, mode: OutputMode) -> Result<StepOutcome> {
        self.check_control()?;

        let page_state = self.session.capture_state(self.settings.use_vision)?;
        self.message_manager.add_state_message(
            &page_state,
            &self.state.last_result,
            Some(step_info),
            self.settings.use_vision,
        );

        if let Some(plan) = self.maybe_run_plan()? {
            self.message_manager.add_plan(&plan);
        }

        if mode == OutputMode::ForcedDone {
            // Before the state message, so the transient-removal below still
            // targets the right message
            let position = self.message_manager.input_messages().len().saturating_sub(1);
            self.message_manager
                .add_message(Message::human(FORCED_DONE_DIRECTIVE), Some(position));
        }

        if let Err(e) = self.message_manager.cut_messages() {
            self.message_manager.remove_last_state_message();
            return Err(e);
        }
        let input_tokens = self.message_manager.total_tokens();

        let messages = self.message_manager.input_messages();
        let model_output = match self.get_next_action(&messages, mode) {
            Ok(output) => {
                self.message_manager.remove_last_state_message();
                output
            }
            Err(e) => {
                self.message_manager.remove_last_state_message();
                return Err(e);
            }
        };

        self.check_control()?;

        self.message_manager.add_model_output(&model_output)?;
        self.save_conversation(&messages, &model_output);

        let results = self.multi_act(&model_output, &page_state)?;
        Ok(StepOutcome { page_state, model_output, results, input_tokens })
    }

    /// Ask the planner for a fresh plan when one is due this step
    fn maybe_run_plan(&self) -> Result<Option<String>> {
        let Some(planner) = &self.planner_llm else {
            return Ok(None);
        };
        if self.settings.planner_interval == 0
            || self.state.n_steps % self.settings.planner_interval != 0
        {
            return Ok(None);
        }

        let mut messages = vec![PlannerPrompt::new(&self.registry.prompt_description()).build()];
        // The planner sees the conversation minus the system message
        messages.extend(self.message_manager.input_messages().into_iter().skip(1));

        let mut plan = planner.complete(&messages)?;
        if let Some(end) = plan.find("</think>") {
            plan = plan[end + "</think>".len()..].trim().to_string();
        }
        log::debug!("Planner: {}", plan);
        Ok(Some(plan))
    }

    fn get_next_action(&self, messages: &[Message], mode: OutputMode) -> Result<AgentOutput> {
        let mut output = match &self.settings.llm_mode {
            LlmMode::Raw => {
                let response = self.llm.complete(messages)?;
                AgentOutput::parse_raw(&response)?
            }
            LlmMode::Structured { method } => {
                let schema = match mode {
                    OutputMode::Normal => AgentOutput::schema(),
                    OutputMode::ForcedDone => AgentOutput::schema_forced_done(),
                };
                let value = self.llm.complete_structured(messages, &schema, method.as_deref())?;
                AgentOutput::from_value(value)?
            }
        };

        output.truncate_actions(self.settings.max_actions_per_step);
        if output.action.is_empty() {
            return Err(AgentError::InvalidModelOutput(
                "model returned no actions".to_string(),
            ));
        }

        log::info!("Eval: {}", output.current_state.evaluation_previous_goal);
        log::info!("Next goal: {}", output.current_state.next_goal);
        Ok(output)
    }

    /// Execute the queued actions, re-checking the page before every indexed
    /// action after the first
    fn multi_act(&self, output: &AgentOutput, page_state: &PageState) -> Result<Vec<ActionResult>> {
        let cached = selector_fingerprints(&page_state.dom);

        let mut context = ToolContext::new(&self.session).with_extraction_llm(self.llm.as_ref());
        if let Some(data) = &self.sensitive_data {
            context = context.with_sensitive_data(data);
        }
        if let Some(paths) = &self.available_file_paths {
            context = context.with_file_paths(paths);
        }
        context.set_dom(page_state.dom.clone());

        let total = output.action.len();
        let mut results = Vec::with_capacity(total);

        for (i, action) in output.action.iter().enumerate() {
            if i > 0 && action.index().is_some() {
                let fresh_tree = self.session.snapshot_dom()?;
                let fresh = selector_fingerprints(&fresh_tree);
                if page_changed(&cached, &fresh) {
                    let message = format!(
                        "Something new appeared on the page, aborting before action {} / {}",
                        i + 1,
                        total
                    );
                    log::info!("{}", message);
                    results.push(ActionResult::ok(message).with_memory());
                    break;
                }
                context.set_dom(fresh_tree);
            }

            log::debug!("Executing action {}/{}: {}", i + 1, total, action.name());
            let result = match self.registry.execute(action.name(), action.params(), &mut context) {
                Ok(result) => result,
                Err(AgentError::Interrupted) => return Err(AgentError::Interrupted),
                Err(error) => ActionResult::failed(error.to_string()),
            };

            let stop_here = result.is_done || result.error.is_some();
            results.push(result);
            if stop_here || i + 1 == total {
                break;
            }

            std::thread::sleep(Duration::from_millis(self.settings.action_delay_ms));
        }

        Ok(results)
    }

    /// Convert a step error into failure results and apply its recovery
    fn handle_step_error(&mut self, error: AgentError) -> Vec<ActionResult> {
        self.state.consecutive_failures += 1;
        if matches!(error, AgentError::RateLimited(_)) {
            log::warn!(
                "Step failed ({}/{}): {}",
                self.state.consecutive_failures,
                self.settings.max_failures,
                error
            );
        } else {
            log::error!(
                "Step failed ({}/{}): {}",
                self.state.consecutive_failures,
                self.settings.max_failures,
                error
            );
        }

        match &error {
            AgentError::TokenBudgetExhausted(_) => {
                let reduced = self.message_manager.max_input_tokens().saturating_sub(500);
                log::warn!("Reducing input token budget to {}", reduced);
                self.settings.max_input_tokens = reduced;
                self.message_manager.set_max_input_tokens(reduced);
                if let Err(e) = self.message_manager.cut_messages() {
                    log::warn!("History still over budget: {}", e);
                }
            }
            AgentError::InvalidModelOutput(_) => {
                self.message_manager.add_message(
                    Message::human(
                        "Your last response could not be parsed. Respond with a single valid \
                         JSON object in the required format.",
                    ),
                    None,
                );
            }
            AgentError::RateLimited(_) => {
                log::warn!("Rate limited; waiting {}s", self.settings.retry_delay_secs);
                std::thread::sleep(Duration::from_secs(self.settings.retry_delay_secs));
            }
            _ => {}
        }

        vec![ActionResult::failed(error.to_string())]
    }

    fn check_control(&self) -> Result<()> {
        if self.control.is_stopped() || self.control.is_paused() {
            return Err(AgentError::Interrupted);
        }
        Ok(())
    }

    /// Project the step into a durable history record
    fn make_history_item(
        model_output: Option<AgentOutput>,
        results: Vec<ActionResult>,
        page_state: &PageState,
        metadata: Option<StepMetadata>,
    ) -> AgentHistory {
        let interacted_element = match &model_output {
            Some(output) => output
                .action
                .iter()
                .map(|action| {
                    action
                        .index()
                        .and_then(|i| page_state.dom.selector_map.get(i))
                        .and_then(|id| to_history_element(&page_state.dom.arena, id))
                })
                .collect(),
            None => vec![None],
        };

        AgentHistory {
            model_output,
            result: results,
            state: BrowserStateHistory {
                url: page_state.url.clone(),
                title: page_state.title.clone(),
                tabs: page_state.tabs.clone(),
                interacted_element,
                screenshot: page_state.screenshot.clone(),
            },
            metadata,
        }
    }

    /// History entry for a step that failed before producing model output;
    /// no page state survives such a step, so the projection is empty
    fn failure_history_item(
        results: Vec<ActionResult>,
        metadata: Option<StepMetadata>,
    ) -> AgentHistory {
        AgentHistory {
            model_output: None,
            result: results,
            state: BrowserStateHistory {
                url: String::new(),
                title: String::new(),
                tabs: Vec::new(),
                interacted_element: vec![None],
                screenshot: None,
            },
            metadata,
        }
    }

    /// Write the step's conversation to disk, best effort
    fn save_conversation(&self, messages: &[Message], output: &AgentOutput) {
        let Some(dir) = &self.settings.save_conversation_path else {
            return;
        };
        if let Err(e) = std::fs::create_dir_all(dir) {
            log::warn!("Could not create conversation dir: {}", e);
            return;
        }

        let mut transcript = String::new();
        for message in messages {
            transcript.push_str(&format!("{:?}:\n{}\n\n", message.role, message.text()));
        }
        match serde_json::to_string_pretty(output) {
            Ok(json) => transcript.push_str(&format!("RESPONSE:\n{}\n", json)),
            Err(e) => log::warn!("Could not serialize model output: {}", e),
        }

        let path = dir.join(format!("conversation_{}.txt", self.state.n_steps + 1));
        if let Err(e) = std::fs::write(&path, transcript) {
            log::warn!("Could not write {}: {}", path.display(), e);
        }
    }
}

/// Elements the model never saw are on the page now
pub(crate) fn page_changed(cached: &HashSet<String>, fresh: &HashSet<String>) -> bool {
    !fresh.is_subset(cached)
}
