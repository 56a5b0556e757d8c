//! agentharness - an LLM agent turn loop with tool orchestration
//!
//! The crate drives a model in a request/act/observe cycle: it keeps a
//! strictly alternating [`MessageHistory`], fits it into the context budget,
//! dispatches at most one tool call per turn and streams lifecycle events to
//! an out-of-band consumer.

pub mod agent;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod history;
pub mod providers;
pub mod tools;
pub mod utils;

pub use agent::{Agent, AgentBuilder, CancelFlag, CompletionPolicy, RunInput, RunOutcome};
pub use config::Config;
pub use error::{HarnessError, ProviderError, Result};
pub use events::{EventQueue, EventSink, EventType, RealtimeEvent};
pub use history::{ContentBlock, MessageHistory, Role, ToolCall, ToolResult, Turn};
pub use providers::{GenerateRequest, LLMClient, LLMResponse};
pub use tools::{Tool, ToolContext, ToolManager, ToolOutput};
