//! Retry client - decorator that adds automatic retry with exponential backoff.
//!
//! Wraps any [`LLMClient`] and retries failures classified as transient
//! (rate limit, overload, 5xx, timeout). Everything else is returned at once.
//!
//! # Example
//!
//! ```rust,ignore
//! use agentharness::providers::{ClaudeClient, RetryClient};
//!
//! let client = RetryClient::new(Box::new(ClaudeClient::new("api-key")))
//!     .with_max_retries(5)
//!     .with_base_delay_ms(500);
//! ```

use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::config::RetryConfig;
use crate::error::{HarnessError, Result};
use crate::history::Turn;

use super::{GenerateRequest, LLMClient, LLMResponse};

/// A decorator client that retries transient errors with jittered backoff.
pub struct RetryClient {
    inner: Box<dyn LLMClient>,
    /// Retries after the first attempt. Default: 3.
    max_retries: u32,
    /// Delay before the first retry. Default: 1000.
    base_delay_ms: u64,
    /// Cap on any single delay. Default: 30000.
    max_delay_ms: u64,
}

impl std::fmt::Debug for RetryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryClient")
            .field("inner", &self.inner.name())
            .field("max_retries", &self.max_retries)
            .field("base_delay_ms", &self.base_delay_ms)
            .field("max_delay_ms", &self.max_delay_ms)
            .finish()
    }
}

impl RetryClient {
    pub fn new(inner: Box<dyn LLMClient>) -> Self {
        Self {
            inner,
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
        }
    }

    /// Build from the `retry` config section.
    pub fn from_config(inner: Box<dyn LLMClient>, config: &RetryConfig) -> Self {
        Self::new(inner)
            .with_max_retries(config.max_retries)
            .with_base_delay_ms(config.base_delay_ms)
            .with_max_delay_ms(config.max_delay_ms)
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }
}

/// Whether `err` is a transient provider failure.
pub fn is_retryable(err: &HarnessError) -> bool {
    match err {
        HarnessError::ProviderTyped(pe) => pe.is_retryable(),
        HarnessError::Http(e) => e.is_timeout() || e.is_connect(),
        _ => false,
    }
}

/// Backoff for retry `attempt` (0-indexed) before jitter:
/// `min(base_delay_ms * 2^attempt, max_delay_ms)`.
pub fn compute_delay(attempt: u32, base_delay_ms: u64, max_delay_ms: u64) -> u64 {
    base_delay_ms
        .saturating_mul(1u64 << attempt.min(16))
        .min(max_delay_ms)
}

/// Spread `delay_ms` uniformly over +/-25% using `seed`, then cap at
/// `max_delay_ms`.
pub fn apply_jitter(delay_ms: u64, seed: u64, max_delay_ms: u64) -> u64 {
    let spread = delay_ms / 4;
    let offset = seed % (2 * spread + 1);
    (delay_ms - spread + offset).min(max_delay_ms)
}

async fn sleep_with_jitter(attempt: u32, base_delay_ms: u64, max_delay_ms: u64) {
    // Nanosecond component of the clock is enough to decorrelate retries.
    let seed = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0);
    let delay = apply_jitter(
        compute_delay(attempt, base_delay_ms, max_delay_ms),
        seed,
        max_delay_ms,
    );
    tokio::time::sleep(Duration::from_millis(delay)).await;
}

#[async_trait]
impl LLMClient for RetryClient {
    async fn generate(
        &self,
        messages: Vec<Turn>,
        request: &GenerateRequest,
    ) -> Result<LLMResponse> {
        let mut attempt = 0;
        loop {
            match self.inner.generate(messages.clone(), request).await {
                Ok(response) => return Ok(response),
                Err(err) => {
                    if !is_retryable(&err) || attempt >= self.max_retries {
                        return Err(err);
                    }
                    warn!(
                        client = self.inner.name(),
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        error = %err,
                        "Retrying generation after transient error"
                    );
                    sleep_with_jitter(attempt, self.base_delay_ms, self.max_delay_ms).await;
                    attempt += 1;
                }
            }
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn default_model(&self) -> &str {
        self.inner.default_model()
    }
}
