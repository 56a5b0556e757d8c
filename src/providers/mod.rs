//! Providers module - LLM clients
//!
//! Defines the [`LLMClient`] trait and its request/response types. Concrete
//! clients: [`ClaudeClient`] (Anthropic Messages API) and [`ScriptedClient`]
//! (canned responses for tests). [`RetryClient`] wraps either with bounded,
//! jittered retries.
//!
//! # Example
//!
//! ```rust,ignore
//! use agentharness::config::Config;
//! use agentharness::providers::build_client;
//!
//! let config = Config::load()?;
//! let client = build_client(&config)?;
//! println!("using {} / {}", client.name(), client.default_model());
//! ```

pub mod claude;
pub mod retry;
pub mod scripted;
mod types;

use crate::config::Config;
use crate::error::{ProviderError, Result};

pub use claude::ClaudeClient;
pub use retry::RetryClient;
pub use scripted::{RecordedRequest, ScriptedClient};
pub use types::{GenerateRequest, LLMClient, LLMResponse, ToolChoice, UsageMetadata};

/// Parse an HTTP status code and response body into a structured [`ProviderError`].
pub fn parse_provider_error(status: u16, body: &str) -> ProviderError {
    match status {
        401 | 403 => ProviderError::Auth(body.to_string()),
        402 => ProviderError::Billing(body.to_string()),
        404 => ProviderError::ModelNotFound(body.to_string()),
        408 => ProviderError::Timeout(body.to_string()),
        429 => ProviderError::RateLimit(body.to_string()),
        400 | 413 => ProviderError::InvalidRequest(body.to_string()),
        529 => ProviderError::Overloaded(body.to_string()),
        500..=599 => ProviderError::ServerError(body.to_string()),
        _ => ProviderError::Unknown(format!("HTTP {}: {}", status, body)),
    }
}

/// Build the configured client: Claude, wrapped in [`RetryClient`] unless
/// `retry.enabled` is false.
pub fn build_client(config: &Config) -> Result<Box<dyn LLMClient>> {
    let claude = ClaudeClient::from_config(&config.provider, &config.agent.model)?;
    if config.retry.enabled {
        Ok(Box::new(RetryClient::from_config(
            Box::new(claude),
            &config.retry,
        )))
    } else {
        Ok(Box::new(claude))
    }
}
