//! Configuration type definitions
//!
//! Every struct is `#[serde(default)]` so partial config files work.

use serde::{Deserialize, Serialize};

/// Default model for the Anthropic client.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";

/// Default name of the tool that ends a run and hands control back.
pub const DEFAULT_TERMINATION_TOOL: &str = "return_control_to_user";

/// Corrective prompt used when structured output is required but missing.
pub const DEFAULT_JSON_REMINDER: &str = "Please provide your answer in the exact JSON format \
specified in the instructions, including the ```json and ``` markers.";

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Turn loop settings (model, budgets, completion rule)
    pub agent: AgentDefaults,
    /// Context window budgeting
    pub context: ContextConfig,
    /// LLM provider credentials and endpoint
    pub provider: ProviderConfig,
    /// Retry policy for transient provider failures
    pub retry: RetryConfig,
    /// Built-in tool settings
    pub tools: ToolsConfig,
    /// Event persistence and streaming
    pub events: EventsConfig,
    /// Logging output
    pub logging: LoggingConfig,
}

// ============================================================================
// Agent Configuration
// ============================================================================

/// How the loop decides a turn without a tool call is final.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionMode {
    /// Plain text without a tool call completes the run
    #[default]
    Text,
    /// The text must contain a fenced ```json block that parses
    Json,
}

/// Turn loop defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentDefaults {
    /// Name reported in AGENT_RESPONSE events
    pub name: String,
    pub model: String,
    /// Max output tokens per generation
    pub max_tokens: u32,
    pub temperature: f32,
    /// Turn budget per run
    pub max_turns: u32,
    /// Optional system prompt
    pub system_prompt: Option<String>,
    pub completion: CompletionMode,
    /// Reminder sent when `completion` is `json` and no block was found
    pub json_reminder: String,
    /// Tool whose call ends the run; `null` disables it
    pub termination_tool: Option<String>,
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            name: "agent".to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 8192,
            temperature: 0.0,
            max_turns: 200,
            system_prompt: None,
            completion: CompletionMode::Text,
            json_reminder: DEFAULT_JSON_REMINDER.to_string(),
            termination_tool: Some(DEFAULT_TERMINATION_TOOL.to_string()),
        }
    }
}

// ============================================================================
// Context Configuration
// ============================================================================

/// Truncation policy for over-budget conversations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextStrategy {
    #[default]
    DropOldest,
    Summarize,
}

/// Context window budgeting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub strategy: ContextStrategy,
    /// Model context window in tokens
    pub context_limit: usize,
    /// Fraction (0.0-1.0) of `context_limit` the conversation may use
    pub threshold: f64,
    /// Byte cap applied to tool outputs when a single turn is over budget
    pub tool_result_budget: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            strategy: ContextStrategy::DropOldest,
            context_limit: 100_000,
            threshold: 0.80,
            tool_result_budget: 10_000,
        }
    }
}

impl ContextConfig {
    /// Token budget the conversation must fit.
    pub fn budget(&self) -> usize {
        (self.context_limit as f64 * self.threshold.clamp(0.0, 1.0)) as usize
    }
}

// ============================================================================
// Provider Configuration
// ============================================================================

/// Anthropic API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    /// Override for the API base URL (proxies, gateways)
    pub api_base: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: None,
            timeout_secs: 120,
        }
    }
}

/// Retry policy for transient provider failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub enabled: bool,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
        }
    }
}

// ============================================================================
// Tools Configuration
// ============================================================================

/// Built-in tool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Directory the filesystem and shell tools are confined to.
    /// Defaults to the current directory.
    pub workspace: Option<String>,
    /// Seconds before `shell_exec` kills its subprocess
    pub shell_timeout_secs: u64,
    /// Max bytes `read_file` returns
    pub max_read_bytes: usize,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            workspace: None,
            shell_timeout_secs: 30,
            max_read_bytes: 200_000,
        }
    }
}

// ============================================================================
// Events Configuration
// ============================================================================

/// Event persistence and live streaming.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Persist events as JSONL files
    pub persist: bool,
    /// Directory for session event files (default `~/.agentharness/sessions`)
    pub store_dir: Option<String>,
    /// WebSocket endpoint that receives live events
    pub websocket_url: Option<String>,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            persist: true,
            store_dir: None,
            websocket_url: None,
        }
    }
}

// ============================================================================
// Logging Configuration
// ============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    #[default]
    Component,
    Json,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    /// Write logs to this file instead of stderr
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Component,
            level: "info".to_string(),
            file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.agent.model, DEFAULT_MODEL);
        assert_eq!(config.agent.max_turns, 200);
        assert_eq!(config.agent.completion, CompletionMode::Text);
        assert_eq!(
            config.agent.termination_tool.as_deref(),
            Some(DEFAULT_TERMINATION_TOOL)
        );
        assert_eq!(config.context.strategy, ContextStrategy::DropOldest);
        assert_eq!(config.retry.max_retries, 3);
        assert!(config.events.persist);
    }

    #[test]
    fn test_context_budget() {
        let config = ContextConfig::default();
        assert_eq!(config.budget(), 80_000);

        let config = ContextConfig {
            threshold: 1.5,
            ..ContextConfig::default()
        };
        assert_eq!(config.budget(), 100_000);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config = serde_json::from_str(
            r#"{"agent": {"max_turns": 5, "completion": "json"}, "context": {"strategy": "summarize"}}"#,
        )
        .unwrap();
        assert_eq!(config.agent.max_turns, 5);
        assert_eq!(config.agent.completion, CompletionMode::Json);
        assert_eq!(config.agent.model, DEFAULT_MODEL);
        assert_eq!(config.context.strategy, ContextStrategy::Summarize);
        assert_eq!(config.context.context_limit, 100_000);
    }

    #[test]
    fn test_termination_tool_can_be_disabled() {
        let config: Config =
            serde_json::from_str(r#"{"agent": {"termination_tool": null}}"#).unwrap();
        assert!(config.agent.termination_tool.is_none());
    }
}
