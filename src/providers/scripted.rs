//! Scripted LLM client for tests and offline runs.
//!
//! Replays a queue of canned responses in order and records every request it
//! receives. Clones share state, so a test can keep a handle after moving the
//! client into an agent.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{HarnessError, Result};
use crate::history::{ContentBlock, ToolCall, Turn};

use super::{GenerateRequest, LLMClient, LLMResponse};

/// A generation call as the client saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<Turn>,
    pub request: GenerateRequest,
}

#[derive(Default)]
struct ScriptState {
    queue: VecDeque<Result<LLMResponse>>,
    fallback: Option<LLMResponse>,
    requests: Vec<RecordedRequest>,
}

#[derive(Clone, Default)]
pub struct ScriptedClient {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Client that replays `responses` in order.
    pub fn with_responses(responses: Vec<LLMResponse>) -> Self {
        let client = Self::new();
        for response in responses {
            client.push(response);
        }
        client
    }

    pub fn push(&self, response: LLMResponse) {
        self.lock().queue.push_back(Ok(response));
    }

    /// Queue a failed generation.
    pub fn push_error(&self, error: HarnessError) {
        self.lock().queue.push_back(Err(error));
    }

    /// Queue a text-only response.
    pub fn push_text(&self, text: &str) {
        self.push(LLMResponse::text(text));
    }

    /// Queue a response with a single tool call.
    pub fn push_tool_call(&self, id: &str, name: &str, input: serde_json::Value) {
        self.push(LLMResponse::new(vec![ContentBlock::ToolCall(ToolCall::new(
            id, name, input,
        ))]));
    }

    /// Response returned once the queue is empty. Without one, an empty
    /// queue is an error.
    pub fn with_fallback(self, response: LLMResponse) -> Self {
        self.lock().fallback = Some(response);
        self
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().requests.len()
    }

    pub fn remaining(&self) -> usize {
        self.lock().queue.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ScriptState> {
        // a panicking test thread must not poison the script for others
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl LLMClient for ScriptedClient {
    async fn generate(
        &self,
        messages: Vec<Turn>,
        request: &GenerateRequest,
    ) -> Result<LLMResponse> {
        let mut state = self.lock();
        state.requests.push(RecordedRequest {
            messages,
            request: request.clone(),
        });
        match state.queue.pop_front() {
            Some(next) => next,
            None => state
                .fallback
                .clone()
                .ok_or_else(|| HarnessError::Provider("Scripted client has no responses left".into())),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn default_model(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::ContentBlock;
    use serde_json::json;

    #[tokio::test]
    async fn test_replays_in_order_and_records() {
        let client = ScriptedClient::new();
        client.push_tool_call("c1", "list_dir", json!({"path": "."}));
        client.push_text("done");
        let handle = client.clone();

        let turns = vec![Turn::user(vec![ContentBlock::prompt("go")])];
        let first = client
            .generate(turns.clone(), &GenerateRequest::new(100))
            .await
            .unwrap();
        assert!(first.has_tool_calls());
        let second = client
            .generate(turns, &GenerateRequest::new(200))
            .await
            .unwrap();
        assert_eq!(second, LLMResponse::text("done"));

        assert_eq!(handle.call_count(), 2);
        assert_eq!(handle.requests()[1].request.max_tokens, 200);
        assert_eq!(handle.remaining(), 0);
    }

    #[tokio::test]
    async fn test_empty_queue_errors_without_fallback() {
        let client = ScriptedClient::new();
        let err = client
            .generate(vec![], &GenerateRequest::new(1))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no responses left"));
    }

    #[tokio::test]
    async fn test_fallback_repeats() {
        let client = ScriptedClient::new().with_fallback(LLMResponse::text("again"));
        for _ in 0..3 {
            let resp = client.generate(vec![], &GenerateRequest::new(1)).await.unwrap();
            assert_eq!(resp, LLMResponse::text("again"));
        }
    }
}
