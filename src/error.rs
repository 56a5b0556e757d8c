//! Error types for the agent harness
//!
//! Fatal conditions (protocol violations, broken history invariants, exhausted
//! provider retries) surface as `HarnessError`. Recoverable tool failures never
//! do: the tool manager turns them into error-flagged tool results instead.

use std::fmt;
use thiserror::Error;

// ============================================================================
// Provider Error Classification
// ============================================================================

/// Structured classification of LLM provider failures.
///
/// Drives the retry decision in [`crate::providers::RetryClient`] without
/// string matching on error messages.
#[derive(Debug)]
pub enum ProviderError {
    /// 401: invalid API key
    Auth(String),
    /// 429: rate limit or quota exceeded
    RateLimit(String),
    /// 402: billing problem
    Billing(String),
    /// 500/502/503/504
    ServerError(String),
    /// 400: malformed request
    InvalidRequest(String),
    /// 404: unknown model or endpoint
    ModelNotFound(String),
    /// Connection or read timeout
    Timeout(String),
    /// Provider reports it is overloaded (Anthropic `overloaded_error`, HTTP 529)
    Overloaded(String),
    /// Response could not be understood
    Format(String),
    /// Anything unrecognized
    Unknown(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Auth(msg) => write!(f, "Authentication error: {}", msg),
            ProviderError::RateLimit(msg) => write!(f, "Rate limit error: {}", msg),
            ProviderError::Billing(msg) => write!(f, "Billing error: {}", msg),
            ProviderError::ServerError(msg) => write!(f, "Server error: {}", msg),
            ProviderError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ProviderError::ModelNotFound(msg) => write!(f, "Model not found: {}", msg),
            ProviderError::Timeout(msg) => write!(f, "Timeout: {}", msg),
            ProviderError::Overloaded(msg) => write!(f, "Overloaded error: {}", msg),
            ProviderError::Format(msg) => write!(f, "Format error: {}", msg),
            ProviderError::Unknown(msg) => write!(f, "Unknown provider error: {}", msg),
        }
    }
}

impl ProviderError {
    /// Returns `true` for transient failures worth retrying with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimit(_)
                | ProviderError::ServerError(_)
                | ProviderError::Timeout(_)
                | ProviderError::Overloaded(_)
        )
    }

    /// HTTP status code associated with this classification, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ProviderError::Auth(_) => Some(401),
            ProviderError::RateLimit(_) => Some(429),
            ProviderError::Billing(_) => Some(402),
            ProviderError::ServerError(_) => Some(500),
            ProviderError::InvalidRequest(_) => Some(400),
            ProviderError::ModelNotFound(_) => Some(404),
            ProviderError::Overloaded(_) => Some(529),
            ProviderError::Format(_) => None,
            ProviderError::Timeout(_) => None,
            ProviderError::Unknown(_) => None,
        }
    }
}

impl From<ProviderError> for HarnessError {
    fn from(err: ProviderError) -> Self {
        HarnessError::ProviderTyped(err)
    }
}

// ============================================================================
// Primary Error Type
// ============================================================================

/// The primary error type for harness operations.
#[derive(Error, Debug)]
pub enum HarnessError {
    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Untyped provider failure (missing credentials, unexpected payloads)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Classified provider failure, used for retry decisions
    #[error("Provider error: {0}")]
    ProviderTyped(ProviderError),

    /// Tool execution failure. Converted to an error tool result by the
    /// tool manager; only escapes when a tool is called directly.
    #[error("Tool error: {0}")]
    Tool(String),

    /// The model or a tool broke the loop protocol (duplicate tool names,
    /// more than one tool call in a turn)
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// A history operation would break turn alternation or call/result pairing
    #[error("History invariant violated: {0}")]
    HistoryViolation(String),

    /// A caller-side precondition failed (e.g. resuming a non-resumable history)
    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// WebSocket transport failure
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Event queue receiver dropped
    #[error("Event queue closed")]
    EventQueueClosed,
}

/// A specialized `Result` type for harness operations.
pub type Result<T> = std::result::Result<T, HarnessError>;
