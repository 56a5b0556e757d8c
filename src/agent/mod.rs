//! Agent module - the turn loop
//!
//! An [`Agent`] owns a [`MessageHistory`](crate::history::MessageHistory),
//! a [`ToolManager`](crate::tools::ToolManager), a context manager and an
//! LLM client. Each turn it:
//!
//! - fits the history into the context budget
//! - asks the model for the next assistant turn
//! - executes at most one tool call and records its result
//! - decides whether the run is complete
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Caller    │────>│    Agent    │────>│  LLMClient  │
//! │ run/cancel  │     │ (turn loop) │     │  (Claude)   │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                        │    │    │
//!                        ▼    ▼    ▼
//!              ┌─────────┐ ┌───────┐ ┌───────────┐
//!              │ Context │ │ Tools │ │ EventSink │
//!              │ Manager │ │       │ │  (queue)  │
//!              └─────────┘ └───────┘ └───────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use agentharness::agent::{Agent, RunOutcome};
//! use agentharness::providers::{LLMResponse, ScriptedClient};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let client = ScriptedClient::with_responses(vec![LLMResponse::text("All done")]);
//! let mut agent = Agent::builder(Box::new(client)).name("demo").build();
//!
//! let outcome = agent.run("Say you are done", false).await.unwrap();
//! assert_eq!(outcome, RunOutcome::Completed("All done".to_string()));
//! # });
//! ```

mod completion;
mod r#loop;
mod prompt;
mod run_context;

pub use completion::{extract_json_block, Completion, CompletionPolicy};
pub use prompt::{RunInput, TaskTemplate, DEFAULT_TASK_TEMPLATE};
pub use r#loop::{
    Agent, AgentBuilder, RunOutcome, DEFAULT_MAX_TURNS, NO_RESPONSE, TOOL_INTERRUPTED,
};
pub use run_context::{CancelFlag, RunContext};
