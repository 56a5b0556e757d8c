//! The agent turn loop.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::Config;
use crate::context::compaction::shrink_tool_results;
use crate::context::{self, ContextManager, DropOldestContextManager};
use crate::error::{HarnessError, Result};
use crate::events::{EventSink, NullSink, RealtimeEvent};
use crate::history::{ContentBlock, MessageHistory, ToolResult, Turn};
use crate::providers::{GenerateRequest, LLMClient, ToolChoice};
use crate::tools::{Tool, ToolContext, ToolManager};
use crate::utils::string::preview;

use super::completion::{Completion, CompletionPolicy};
use super::prompt::{RunInput, TaskTemplate};
use super::run_context::{CancelFlag, RunContext};

/// Text stored when the model returns no content at all.
pub const NO_RESPONSE: &str = "No response from model";

/// Result text for a tool call cancelled before dispatch.
pub const TOOL_INTERRUPTED: &str = "Tool execution interrupted";

/// Default turn budget per run.
pub const DEFAULT_MAX_TURNS: u32 = 200;

/// How a run ended, short of a fatal error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Final answer
    Completed(String),
    /// Stopped by `cancel()`; the reason
    Interrupted(String),
    /// Turn budget spent; a JSON error payload
    BudgetExhausted(String),
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed(_))
    }

    /// The text carried by any variant.
    pub fn text(&self) -> &str {
        match self {
            RunOutcome::Completed(s) | RunOutcome::Interrupted(s) | RunOutcome::BudgetExhausted(s) => s,
        }
    }
}

enum Step {
    Continue,
    Done(RunOutcome),
}

/// An LLM agent: one history, one tool set, one client.
///
/// History and tools persist across [`run`](Self::run) calls until
/// [`clear`](Self::clear) or a non-resuming run.
pub struct Agent {
    name: String,
    session_id: String,
    client: Box<dyn LLMClient>,
    tools: ToolManager,
    context: Box<dyn ContextManager>,
    history: MessageHistory,
    events: Arc<dyn EventSink>,
    completion: CompletionPolicy,
    termination_tool: Option<String>,
    task_template: TaskTemplate,
    max_turns: u32,
    max_tokens: u32,
    temperature: Option<f32>,
    model: Option<String>,
    system_prompt: Option<String>,
    tool_choice: Option<ToolChoice>,
    tool_result_budget: usize,
    workspace: Option<PathBuf>,
    cancel: CancelFlag,
}

impl Agent {
    pub fn builder(client: Box<dyn LLMClient>) -> AgentBuilder {
        AgentBuilder::new(client)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn history(&self) -> &MessageHistory {
        &self.history
    }

    pub fn tools(&self) -> &ToolManager {
        &self.tools
    }

    /// Register another tool. Duplicate names fail the next turn.
    pub fn register_tool(&mut self, tool: Box<dyn Tool>) {
        self.tools.register(tool);
    }

    /// Request a stop at the next checkpoint. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A handle other tasks can use to cancel this agent's runs.
    pub fn cancel_handle(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Whether `run(.., resume = true)` would be accepted.
    pub fn can_resume(&self) -> bool {
        self.history.ends_on_user_turn()
    }

    /// Reset history, interruption state and tool state.
    pub fn clear(&mut self) {
        self.history.clear();
        self.cancel.reset();
        self.tools.reset();
    }

    /// Run the turn loop until completion, interruption or budget exhaustion.
    ///
    /// With `resume = false` the history is cleared first. With
    /// `resume = true` the history must end on a user turn (e.g. after an
    /// interrupted run); an empty instruction then just continues.
    pub async fn run(&mut self, input: impl Into<RunInput>, resume: bool) -> Result<RunOutcome> {
        self.cancel.reset();
        let cancel = self.cancel.clone();
        self.run_until(input.into(), resume, cancel).await
    }

    /// Like [`run`](Self::run), but stops on a caller-owned flag instead of
    /// the agent's own. The flag is not reset, so a cancel that already
    /// happened interrupts the run before its first generation.
    pub async fn run_with_cancel(
        &mut self,
        input: impl Into<RunInput>,
        resume: bool,
        cancel: CancelFlag,
    ) -> Result<RunOutcome> {
        self.run_until(input.into(), resume, cancel).await
    }

    async fn run_until(
        &mut self,
        input: RunInput,
        resume: bool,
        cancel: CancelFlag,
    ) -> Result<RunOutcome> {
        self.tools.reset();

        if resume {
            if !self.history.ends_on_user_turn() {
                return Err(HarnessError::Precondition(
                    "cannot resume: history does not end on a user turn".into(),
                ));
            }
        } else {
            self.history.clear();
        }

        let workspace = self
            .workspace
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| ".".to_string());
        let prompt = self.task_template.render_input(&input, &workspace);
        if !(resume && prompt.trim().is_empty()) {
            self.history.add_user_prompt(prompt.as_str());
            self.events
                .enqueue(RealtimeEvent::user_message(&self.session_id, &prompt));
        }

        info!(
            agent = %self.name,
            session_id = %self.session_id,
            resume,
            max_turns = self.max_turns,
            prompt = %preview(&prompt, 80),
            "Starting agent run"
        );

        let tool_ctx = self.tool_context(&cancel);
        let mut run = RunContext::new(cancel, self.max_turns);

        loop {
            if !run.take_turn() {
                warn!(agent = %self.name, max_turns = self.max_turns, "Turn budget exhausted");
                let payload = json!({
                    "error": format!("{} did not complete within maximum turns", self.name)
                });
                return Ok(RunOutcome::BudgetExhausted(payload.to_string()));
            }

            let span = info_span!(
                "turn",
                agent = %self.name,
                session_id = %self.session_id,
                turn = run.turn()
            );
            match self.step(&run, &tool_ctx).instrument(span).await? {
                Step::Continue => continue,
                Step::Done(outcome) => {
                    if let RunOutcome::Completed(content) = &outcome {
                        self.events.enqueue(RealtimeEvent::agent_response(
                            &self.session_id,
                            &self.name,
                            content,
                        ));
                    }
                    info!(agent = %self.name, turns = run.turn(), outcome = ?outcome_kind(&outcome), "Agent run finished");
                    return Ok(outcome);
                }
            }
        }
    }

    /// Blocking wrapper around [`run`](Self::run) on a current-thread
    /// runtime. Must not be called from inside a tokio runtime.
    pub fn run_blocking(&mut self, input: impl Into<RunInput>, resume: bool) -> Result<RunOutcome> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.run(input, resume))
    }

    async fn step(&mut self, run: &RunContext, tool_ctx: &ToolContext) -> Result<Step> {
        self.tools.validate_unique_names()?;

        if run.is_interrupted() {
            info!("Interrupted before generation");
            return Ok(Step::Done(RunOutcome::Interrupted(
                "Agent interrupted by user".into(),
            )));
        }

        let turns = self.fit_context();
        if let Some(turns) = turns {
            self.history.set_message_list(turns)?;
        }

        let request = self.generate_request();
        let response = self
            .client
            .generate(self.history.get_messages_for_llm(), &request)
            .await?;
        if let Some(usage) = response.usage {
            debug!(
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                "Generation usage"
            );
        }

        let mut blocks = response.blocks;
        if blocks.is_empty() {
            warn!("Model returned no content");
            blocks.push(ContentBlock::result(NO_RESPONSE));
        }
        self.history.add_assistant_turn(blocks)?;

        let mut pending = self.history.get_pending_tool_calls();
        if pending.len() > 1 {
            return Err(HarnessError::Protocol(
                "Only one tool call per turn is supported".into(),
            ));
        }

        let Some(call) = pending.pop() else {
            let text = self.history.last_assistant_text().unwrap_or_default();
            return Ok(match self.completion.evaluate(&text) {
                Completion::Done(output) => Step::Done(RunOutcome::Completed(output)),
                Completion::Reprompt(reminder) => {
                    debug!("Completion requirements not met, reminding model");
                    self.history.add_user_prompt(reminder);
                    Step::Continue
                }
            });
        };

        self.events
            .enqueue(RealtimeEvent::tool_call(&self.session_id, &call));

        if run.is_interrupted() {
            info!(tool = %call.tool_name, "Interrupted before tool dispatch");
            let result = ToolResult::error(&call, TOOL_INTERRUPTED);
            self.history.add_tool_call_result(result.clone())?;
            self.events
                .enqueue(RealtimeEvent::tool_result(&self.session_id, &result));
            return Ok(Step::Done(RunOutcome::Interrupted(TOOL_INTERRUPTED.into())));
        }

        let result = self.tools.run_tool(&call, &self.history, tool_ctx).await;
        self.history.add_tool_call_result(result.clone())?;
        self.events
            .enqueue(RealtimeEvent::tool_result(&self.session_id, &result));

        if !result.is_error && self.termination_tool.as_deref() == Some(call.tool_name.as_str()) {
            return Ok(Step::Done(RunOutcome::Completed(result.output)));
        }
        Ok(Step::Continue)
    }

    /// Truncated turns when the history has to change, `None` otherwise.
    fn fit_context(&self) -> Option<Vec<Turn>> {
        let truncation = self
            .context
            .apply_truncation_if_needed(self.history.get_messages_for_llm());
        if !truncation.oversized {
            return truncation.changed().then_some(truncation.turns);
        }

        let dropped = truncation.dropped_turns;
        let (shrunk, count) = shrink_tool_results(truncation.turns, self.tool_result_budget);
        warn!(
            budget = self.context.budget(),
            dropped_turns = dropped,
            shrunk_results = count,
            "Context still over budget, shrinking tool results"
        );
        let retry = self.context.apply_truncation_if_needed(shrunk);
        if retry.oversized {
            warn!("Context remains over budget after shrinking");
        }
        // the first pass may have changed turns even if the second did not
        if dropped > 0 || count > 0 || retry.changed() {
            Some(retry.turns)
        } else {
            None
        }
    }

    fn generate_request(&self) -> GenerateRequest {
        GenerateRequest {
            max_tokens: self.max_tokens,
            tools: self.tools.get_tools(),
            system_prompt: self.system_prompt.clone(),
            tool_choice: self.tool_choice.clone(),
            temperature: self.temperature,
            model: self.model.clone(),
        }
    }

    fn tool_context(&self, cancel: &CancelFlag) -> ToolContext {
        let mut ctx = ToolContext::new()
            .with_session(&self.session_id)
            .with_cancel(cancel.clone());
        if let Some(workspace) = &self.workspace {
            ctx = ctx.with_workspace(workspace.clone());
        }
        ctx
    }
}

fn outcome_kind(outcome: &RunOutcome) -> &'static str {
    match outcome {
        RunOutcome::Completed(_) => "completed",
        RunOutcome::Interrupted(_) => "interrupted",
        RunOutcome::BudgetExhausted(_) => "budget_exhausted",
    }
}

/// Builder for [`Agent`].
pub struct AgentBuilder {
    agent: Agent,
}

impl AgentBuilder {
    pub fn new(client: Box<dyn LLMClient>) -> Self {
        Self {
            agent: Agent {
                name: "agent".to_string(),
                session_id: Uuid::new_v4().to_string(),
                client,
                tools: ToolManager::new(),
                context: Box::new(DropOldestContextManager::new(
                    crate::config::ContextConfig::default().budget(),
                )),
                history: MessageHistory::new(),
                events: Arc::new(NullSink),
                completion: CompletionPolicy::FinishOnText,
                termination_tool: Some(crate::config::DEFAULT_TERMINATION_TOOL.to_string()),
                task_template: TaskTemplate::default(),
                max_turns: DEFAULT_MAX_TURNS,
                max_tokens: 8192,
                temperature: None,
                model: None,
                system_prompt: None,
                tool_choice: None,
                tool_result_budget: 10_000,
                workspace: None,
                cancel: CancelFlag::new(),
            },
        }
    }

    /// Apply the `agent`, `context` and `tools` config sections.
    pub fn config(mut self, config: &Config) -> Self {
        let a = &mut self.agent;
        a.name = config.agent.name.clone();
        a.max_turns = config.agent.max_turns;
        a.max_tokens = config.agent.max_tokens;
        a.temperature = Some(config.agent.temperature);
        a.model = Some(config.agent.model.clone());
        a.system_prompt = config.agent.system_prompt.clone();
        a.completion = CompletionPolicy::from_config(&config.agent);
        a.termination_tool = config.agent.termination_tool.clone();
        a.context = context::from_config(&config.context);
        a.tool_result_budget = config.context.tool_result_budget;
        a.workspace = Some(config.workspace());
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.agent.name = name.to_string();
        self
    }

    pub fn session_id(mut self, session_id: &str) -> Self {
        self.agent.session_id = session_id.to_string();
        self
    }

    pub fn tool(mut self, tool: Box<dyn Tool>) -> Self {
        self.agent.tools.register(tool);
        self
    }

    pub fn tools(mut self, tools: Vec<Box<dyn Tool>>) -> Self {
        for tool in tools {
            self.agent.tools.register(tool);
        }
        self
    }

    pub fn context_manager(mut self, context: Box<dyn ContextManager>) -> Self {
        self.agent.context = context;
        self
    }

    pub fn event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.agent.events = events;
        self
    }

    pub fn completion(mut self, completion: CompletionPolicy) -> Self {
        self.agent.completion = completion;
        self
    }

    /// Tool whose successful call completes the run. `None` disables it.
    pub fn termination_tool(mut self, name: Option<&str>) -> Self {
        self.agent.termination_tool = name.map(str::to_string);
        self
    }

    pub fn task_template(mut self, template: TaskTemplate) -> Self {
        self.agent.task_template = template;
        self
    }

    pub fn max_turns(mut self, max_turns: u32) -> Self {
        self.agent.max_turns = max_turns;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.agent.max_tokens = max_tokens;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.agent.temperature = Some(temperature);
        self
    }

    pub fn model(mut self, model: &str) -> Self {
        self.agent.model = Some(model.to_string());
        self
    }

    pub fn system_prompt(mut self, prompt: &str) -> Self {
        self.agent.system_prompt = Some(prompt.to_string());
        self
    }

    pub fn tool_choice(mut self, choice: ToolChoice) -> Self {
        self.agent.tool_choice = Some(choice);
        self
    }

    pub fn tool_result_budget(mut self, bytes: usize) -> Self {
        self.agent.tool_result_budget = bytes;
        self
    }

    pub fn workspace(mut self, workspace: impl Into<PathBuf>) -> Self {
        self.agent.workspace = Some(workspace.into());
        self
    }

    pub fn build(self) -> Agent {
        self.agent
    }
}
