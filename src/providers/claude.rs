//! Claude (Anthropic) LLM client
//!
//! Implements [`LLMClient`] over the Anthropic Messages API, translating
//! [`Turn`]s and content blocks to Claude's wire format and back.
//!
//! # Example
//!
//! ```rust,ignore
//! use agentharness::history::{ContentBlock, Turn};
//! use agentharness::providers::{ClaudeClient, GenerateRequest, LLMClient};
//!
//! async fn example() {
//!     let client = ClaudeClient::new("your-api-key");
//!     let turns = vec![Turn::user(vec![ContentBlock::prompt("Hello!")])];
//!     let response = client
//!         .generate(turns, &GenerateRequest::new(1000))
//!         .await
//!         .unwrap();
//!     println!("{:?}", response.blocks);
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{ProviderConfig, DEFAULT_MODEL};
use crate::error::{HarnessError, ProviderError, Result};
use crate::history::{ContentBlock, Role, ToolCall, Turn};
use crate::tools::ToolDescriptor;

use super::{parse_provider_error, GenerateRequest, LLMClient, LLMResponse, ToolChoice, UsageMetadata};

/// The Claude API base URL.
const CLAUDE_API_BASE: &str = "https://api.anthropic.com";

/// The Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Claude/Anthropic LLM client.
pub struct ClaudeClient {
    api_key: String,
    api_base: String,
    model: String,
    client: Client,
}

impl ClaudeClient {
    /// Create a client with the default endpoint and a 120 s timeout.
    ///
    /// # Example
    /// ```
    /// use agentharness::providers::{ClaudeClient, LLMClient};
    ///
    /// let client = ClaudeClient::new("sk-ant-api03-xxx");
    /// assert_eq!(client.name(), "claude");
    /// ```
    pub fn new(api_key: &str) -> Self {
        Self::with_client(api_key, build_http_client(Duration::from_secs(120)))
    }

    /// Create a client with a custom HTTP client.
    pub fn with_client(api_key: &str, client: Client) -> Self {
        Self {
            api_key: api_key.to_string(),
            api_base: CLAUDE_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            client,
        }
    }

    /// Build from the `provider` config section. Fails if no API key is set.
    pub fn from_config(config: &ProviderConfig, model: &str) -> Result<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                HarnessError::Config(
                    "No API key configured (set provider.api_key or ANTHROPIC_API_KEY)".into(),
                )
            })?;
        let mut client = Self::with_client(
            api_key,
            build_http_client(Duration::from_secs(config.timeout_secs)),
        )
        .with_model(model);
        if let Some(base) = &config.api_base {
            client = client.with_api_base(base);
        }
        Ok(client)
    }

    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.api_base)
    }
}

fn build_http_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| Client::new())
}

#[async_trait]
impl LLMClient for ClaudeClient {
    async fn generate(
        &self,
        messages: Vec<Turn>,
        request: &GenerateRequest,
    ) -> Result<LLMResponse> {
        let body = build_request(&self.model, messages, request);
        debug!(model = %body.model, messages = body.messages.len(), tools = body.tools.as_ref().map_or(0, Vec::len), "Sending Claude request");

        let response = self
            .client
            .post(self.endpoint())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response.text().await.unwrap_or_default();
            return Err(parse_error_body(status, &error_text).into());
        }

        let text = response.text().await.map_err(classify_transport_error)?;
        let parsed: ClaudeResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::Format(format!("Invalid Claude response: {}", e)))?;
        Ok(convert_response(parsed))
    }

    fn name(&self) -> &str {
        "claude"
    }

    fn default_model(&self) -> &str {
        &self.model
    }
}

fn classify_transport_error(err: reqwest::Error) -> HarnessError {
    if err.is_timeout() {
        ProviderError::Timeout(err.to_string()).into()
    } else {
        HarnessError::Http(err)
    }
}

fn parse_error_body(status: u16, error_text: &str) -> ProviderError {
    match serde_json::from_str::<ClaudeErrorResponse>(error_text) {
        Ok(error_response) => {
            let body = format!(
                "Claude API error: {} - {}",
                error_response.error.r#type, error_response.error.message
            );
            if error_response.error.r#type == "overloaded_error" {
                ProviderError::Overloaded(body)
            } else {
                parse_provider_error(status, &body)
            }
        }
        Err(_) => parse_provider_error(status, &format!("Claude API error: {}", error_text)),
    }
}

// ============================================================================
// Claude API Request Types
// ============================================================================

#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ClaudeMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ClaudeTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ClaudeMessage {
    role: String,
    content: Vec<ClaudeContentBlock>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClaudeContentBlock {
    Text {
        text: String,
    },
    Image {
        source: ImageSource,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ImageSource {
    #[serde(rename = "type")]
    source_type: String,
    media_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct ClaudeTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

// ============================================================================
// Claude API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    content: Vec<ClaudeContentBlock>,
    usage: ClaudeUsage,
    #[allow(dead_code)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClaudeErrorResponse {
    error: ClaudeError,
}

#[derive(Debug, Deserialize)]
struct ClaudeError {
    r#type: String,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ClaudeUsage {
    input_tokens: u32,
    output_tokens: u32,
}

// ============================================================================
// Conversion Functions
// ============================================================================

fn build_request(default_model: &str, messages: Vec<Turn>, request: &GenerateRequest) -> ClaudeRequest {
    ClaudeRequest {
        model: request
            .model
            .clone()
            .unwrap_or_else(|| default_model.to_string()),
        max_tokens: request.max_tokens,
        messages: convert_turns(messages),
        system: request.system_prompt.clone(),
        tools: if request.tools.is_empty() {
            None
        } else {
            Some(convert_tools(&request.tools))
        },
        // tool_choice without tools is rejected by the API
        tool_choice: if request.tools.is_empty() {
            None
        } else {
            request.tool_choice.clone()
        },
        temperature: request.temperature,
    }
}

fn convert_block(block: ContentBlock) -> ClaudeContentBlock {
    match block {
        ContentBlock::TextPrompt { text } | ContentBlock::TextResult { text } => {
            ClaudeContentBlock::Text { text }
        }
        ContentBlock::ToolCall(call) => ClaudeContentBlock::ToolUse {
            id: call.tool_call_id,
            name: call.tool_name,
            input: call.tool_input,
        },
        ContentBlock::ToolResult(result) => ClaudeContentBlock::ToolResult {
            tool_use_id: result.tool_call_id,
            content: result.output,
            is_error: result.is_error.then_some(true),
        },
        ContentBlock::Image(image) => ClaudeContentBlock::Image {
            source: ImageSource {
                source_type: "base64".to_string(),
                media_type: image.mime_type,
                data: STANDARD.encode(&image.data),
            },
        },
    }
}

/// Convert turns to Claude messages. Roles map one to one.
fn convert_turns(turns: Vec<Turn>) -> Vec<ClaudeMessage> {
    turns
        .into_iter()
        .map(|turn| ClaudeMessage {
            role: match turn.role {
                Role::User => "user".to_string(),
                Role::Assistant => "assistant".to_string(),
            },
            content: turn.blocks.into_iter().map(convert_block).collect(),
        })
        .collect()
}

fn convert_tools(tools: &[ToolDescriptor]) -> Vec<ClaudeTool> {
    tools
        .iter()
        .map(|t| ClaudeTool {
            name: t.name.clone(),
            description: t.description.clone(),
            input_schema: t.input_schema.clone(),
        })
        .collect()
}

fn convert_response(response: ClaudeResponse) -> LLMResponse {
    let blocks = response
        .content
        .into_iter()
        .filter_map(|block| match block {
            ClaudeContentBlock::Text { text } if text.trim().is_empty() => None,
            ClaudeContentBlock::Text { text } => Some(ContentBlock::result(text)),
            ClaudeContentBlock::ToolUse { id, name, input } => {
                Some(ContentBlock::ToolCall(ToolCall::new(&id, &name, input)))
            }
            // not produced by the model
            ClaudeContentBlock::ToolResult { .. } | ClaudeContentBlock::Image { .. } => None,
        })
        .collect();

    LLMResponse {
        blocks,
        usage: Some(UsageMetadata::new(
            response.usage.input_tokens,
            response.usage.output_tokens,
        )),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{ImageBlock, ToolResult};
    use serde_json::json;

    #[test]
    fn test_claude_client_creation() {
        let client = ClaudeClient::new("test-key");
        assert_eq!(client.name(), "claude");
        assert_eq!(client.default_model(), DEFAULT_MODEL);
        assert_eq!(client.endpoint(), "https://api.anthropic.com/v1/messages");
    }

    #[test]
    fn test_from_config_requires_key() {
        let err = ClaudeClient::from_config(&ProviderConfig::default(), DEFAULT_MODEL)
            .err()
            .unwrap();
        assert!(matches!(err, HarnessError::Config(_)));

        let config = ProviderConfig {
            api_key: Some("k".into()),
            api_base: Some("http://localhost:8080/".into()),
            ..Default::default()
        };
        let client = ClaudeClient::from_config(&config, "claude-test").unwrap();
        assert_eq!(client.endpoint(), "http://localhost:8080/v1/messages");
        assert_eq!(client.default_model(), "claude-test");
    }

    #[test]
    fn test_convert_turns_with_tool_round_trip() {
        let call = ToolCall::new("toolu_1", "list_dir", json!({"path": "."}));
        let turns = vec![
            Turn::user(vec![ContentBlock::prompt("list files")]),
            Turn::assistant(vec![
                ContentBlock::result("Looking."),
                ContentBlock::ToolCall(call.clone()),
            ]),
            Turn::user(vec![ContentBlock::ToolResult(ToolResult::error(&call, "denied"))]),
        ];

        let messages = convert_turns(turns);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].role, "assistant");
        assert_eq!(
            messages[1].content[1],
            ClaudeContentBlock::ToolUse {
                id: "toolu_1".into(),
                name: "list_dir".into(),
                input: json!({"path": "."}),
            }
        );
        assert_eq!(
            messages[2].content[0],
            ClaudeContentBlock::ToolResult {
                tool_use_id: "toolu_1".into(),
                content: "denied".into(),
                is_error: Some(true),
            }
        );
    }

    #[test]
    fn test_image_serialized_as_base64_source() {
        let turns = vec![Turn::user(vec![ContentBlock::Image(ImageBlock {
            data: vec![1, 2, 3],
            mime_type: "image/png".into(),
        })])];
        let v = serde_json::to_value(convert_turns(turns)).unwrap();
        assert_eq!(
            v[0]["content"][0],
            json!({"type": "image", "source": {"type": "base64", "media_type": "image/png", "data": "AQID"}})
        );
    }

    #[test]
    fn test_build_request() {
        let tool = ToolDescriptor {
            name: "echo".into(),
            description: "Echo".into(),
            input_schema: json!({"type": "object"}),
        };
        let req = GenerateRequest::new(512)
            .with_tools(vec![tool])
            .with_system_prompt("sys")
            .with_tool_choice(ToolChoice::Any)
            .with_temperature(0.0);
        let body = serde_json::to_value(build_request("m", vec![], &req)).unwrap();
        assert_eq!(body["model"], "m");
        assert_eq!(body["max_tokens"], 512);
        assert_eq!(body["system"], "sys");
        assert_eq!(body["tools"][0]["input_schema"], json!({"type": "object"}));
        assert_eq!(body["tool_choice"], json!({"type": "any"}));

        // no tools: neither tools nor tool_choice are sent
        let req = GenerateRequest::new(512).with_tool_choice(ToolChoice::Any);
        let body = serde_json::to_value(build_request("m", vec![], &req)).unwrap();
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
        assert!(body.get("system").is_none());
    }

    #[test]
    fn test_convert_response() {
        let raw = json!({
            "content": [
                {"type": "text", "text": "Let me check."},
                {"type": "tool_use", "id": "toolu_9", "name": "shell_exec", "input": {"command": "ls"}}
            ],
            "usage": {"input_tokens": 12, "output_tokens": 7},
            "stop_reason": "tool_use"
        });
        let parsed: ClaudeResponse = serde_json::from_value(raw).unwrap();
        let resp = convert_response(parsed);
        assert_eq!(resp.blocks.len(), 2);
        assert_eq!(resp.blocks[0], ContentBlock::result("Let me check."));
        let call = resp.blocks[1].as_tool_call().unwrap();
        assert_eq!(call.tool_call_id, "toolu_9");
        assert_eq!(call.tool_input, json!({"command": "ls"}));
        assert_eq!(resp.usage, Some(UsageMetadata::new(12, 7)));
    }

    #[test]
    fn test_convert_empty_response() {
        let parsed: ClaudeResponse = serde_json::from_value(json!({
            "content": [{"type": "text", "text": "  "}],
            "usage": {"input_tokens": 1, "output_tokens": 0}
        }))
        .unwrap();
        assert!(convert_response(parsed).blocks.is_empty());
    }

    #[test]
    fn test_parse_error_body() {
        let err = parse_error_body(
            529,
            r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
        );
        assert!(matches!(err, ProviderError::Overloaded(_)));
        assert!(err.is_retryable());

        let err = parse_error_body(
            401,
            r#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#,
        );
        assert!(matches!(err, ProviderError::Auth(ref m) if m.contains("invalid x-api-key")));

        let err = parse_error_body(500, "<html>oops</html>");
        assert!(matches!(err, ProviderError::ServerError(ref m) if m.contains("oops")));
    }
}
