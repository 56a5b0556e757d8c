//! Generation contract shared by every LLM client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::history::{ContentBlock, Turn};
use crate::tools::ToolDescriptor;

/// How the model may use the offered tools.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolChoice {
    /// Model decides
    #[default]
    Auto,
    /// Model must call some tool
    Any,
    /// Model must call the named tool
    Tool { name: String },
}

/// Everything besides the conversation that a generation call needs.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub max_tokens: u32,
    /// Tools offered this turn, in registration order
    pub tools: Vec<ToolDescriptor>,
    pub system_prompt: Option<String>,
    pub tool_choice: Option<ToolChoice>,
    pub temperature: Option<f32>,
    /// Overrides the client's default model
    pub model: Option<String>,
}

impl GenerateRequest {
    pub fn new(max_tokens: u32) -> Self {
        Self {
            max_tokens,
            ..Default::default()
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDescriptor>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = Some(choice);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Token accounting reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMetadata {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl UsageMetadata {
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total(&self) -> u32 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

/// One generation: zero or more assistant blocks plus usage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LLMResponse {
    pub blocks: Vec<ContentBlock>,
    pub usage: Option<UsageMetadata>,
}

impl LLMResponse {
    pub fn new(blocks: Vec<ContentBlock>) -> Self {
        Self {
            blocks,
            usage: None,
        }
    }

    /// A text-only response.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(vec![ContentBlock::result(text)])
    }

    pub fn with_usage(mut self, usage: UsageMetadata) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn has_tool_calls(&self) -> bool {
        self.blocks.iter().any(|b| b.as_tool_call().is_some())
    }
}

/// A model backend.
///
/// Implementations translate [`Turn`]s to the provider's wire format. Retry
/// on transient failure is layered on with [`super::RetryClient`].
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Generate the next assistant turn for `messages`.
    async fn generate(&self, messages: Vec<Turn>, request: &GenerateRequest)
        -> Result<LLMResponse>;

    /// Provider name, e.g. "claude"
    fn name(&self) -> &str;

    fn default_model(&self) -> &str;
}
