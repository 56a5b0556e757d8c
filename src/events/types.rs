//! Realtime event types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::history::{ToolCall, ToolResult};

/// Lifecycle event kinds emitted by the turn loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    UserMessage,
    ToolCall,
    ToolResult,
    AgentResponse,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::UserMessage => "USER_MESSAGE",
            EventType::ToolCall => "TOOL_CALL",
            EventType::ToolResult => "TOOL_RESULT",
            EventType::AgentResponse => "AGENT_RESPONSE",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One event as persisted and streamed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeEvent {
    pub session_id: String,
    pub event_type: EventType,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
}

impl RealtimeEvent {
    pub fn new(session_id: &str, event_type: EventType, payload: Value) -> Self {
        Self {
            session_id: session_id.to_string(),
            event_type,
            payload,
            timestamp: Utc::now(),
        }
    }

    /// `{text}`
    pub fn user_message(session_id: &str, text: &str) -> Self {
        Self::new(session_id, EventType::UserMessage, json!({ "text": text }))
    }

    /// `{tool_call_id, tool_name, tool_input}`
    pub fn tool_call(session_id: &str, call: &ToolCall) -> Self {
        Self::new(
            session_id,
            EventType::ToolCall,
            json!({
                "tool_call_id": call.tool_call_id,
                "tool_name": call.tool_name,
                "tool_input": call.tool_input,
            }),
        )
    }

    /// `{tool_call_id, tool_name, result}`, plus `is_error` when set
    pub fn tool_result(session_id: &str, result: &ToolResult) -> Self {
        let mut payload = json!({
            "tool_call_id": result.tool_call_id,
            "tool_name": result.tool_name,
            "result": result.output,
        });
        if result.is_error {
            payload["is_error"] = Value::Bool(true);
        }
        Self::new(session_id, EventType::ToolResult, payload)
    }

    /// `{agent_name, content, timestamp}`
    pub fn agent_response(session_id: &str, agent_name: &str, content: &str) -> Self {
        let event = Self::new(session_id, EventType::AgentResponse, Value::Null);
        let payload = json!({
            "agent_name": agent_name,
            "content": content,
            "timestamp": event.timestamp.to_rfc3339(),
        });
        Self { payload, ..event }
    }

    /// Text of a USER_MESSAGE event.
    pub fn user_text(&self) -> Option<&str> {
        if self.event_type != EventType::UserMessage {
            return None;
        }
        self.payload.get("text").and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_wire_names() {
        assert_eq!(
            serde_json::to_value(EventType::ToolResult).unwrap(),
            json!("TOOL_RESULT")
        );
        let parsed: EventType = serde_json::from_value(json!("AGENT_RESPONSE")).unwrap();
        assert_eq!(parsed, EventType::AgentResponse);
        assert_eq!(EventType::UserMessage.to_string(), "USER_MESSAGE");
    }

    #[test]
    fn test_payload_shapes() {
        let call = ToolCall::new("c1", "list_dir", json!({"path": "."}));
        let ev = RealtimeEvent::tool_call("s1", &call);
        assert_eq!(ev.session_id, "s1");
        assert_eq!(
            ev.payload,
            json!({"tool_call_id": "c1", "tool_name": "list_dir", "tool_input": {"path": "."}})
        );

        let ev = RealtimeEvent::tool_result("s1", &ToolResult::success(&call, "a\nb"));
        assert_eq!(
            ev.payload,
            json!({"tool_call_id": "c1", "tool_name": "list_dir", "result": "a\nb"})
        );
        let ev = RealtimeEvent::tool_result("s1", &ToolResult::error(&call, "nope"));
        assert_eq!(ev.payload["is_error"], json!(true));

        let ev = RealtimeEvent::agent_response("s1", "general", "done");
        assert_eq!(ev.payload["agent_name"], "general");
        assert_eq!(ev.payload["content"], "done");
        assert_eq!(ev.payload["timestamp"], json!(ev.timestamp.to_rfc3339()));
    }

    #[test]
    fn test_user_text() {
        let ev = RealtimeEvent::user_message("s1", "list files");
        assert_eq!(ev.user_text(), Some("list files"));
        let ev = RealtimeEvent::agent_response("s1", "a", "x");
        assert_eq!(ev.user_text(), None);
    }

    #[test]
    fn test_event_serde_round_trip() {
        let ev = RealtimeEvent::user_message("s1", "hi");
        let line = serde_json::to_string(&ev).unwrap();
        let back: RealtimeEvent = serde_json::from_str(&line).unwrap();
        assert_eq!(back, ev);
    }
}
