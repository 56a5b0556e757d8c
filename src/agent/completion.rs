//! Completion detection for turns without a tool call.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::config::{AgentDefaults, CompletionMode};

static JSON_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)```json\s*(.*?)```").unwrap());

/// What a text-only assistant turn means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionPolicy {
    /// The text is the final answer.
    FinishOnText,
    /// The text must contain a fenced `json` block that parses. Otherwise
    /// `reminder` is sent as a user prompt and the loop continues.
    StructuredJson { reminder: String },
}

/// Verdict for one text-only turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Done(String),
    Reprompt(String),
}

impl Default for CompletionPolicy {
    fn default() -> Self {
        CompletionPolicy::FinishOnText
    }
}

impl CompletionPolicy {
    pub fn from_config(agent: &AgentDefaults) -> Self {
        match agent.completion {
            CompletionMode::Text => CompletionPolicy::FinishOnText,
            CompletionMode::Json => CompletionPolicy::StructuredJson {
                reminder: agent.json_reminder.clone(),
            },
        }
    }

    /// Judge the assistant's text. For `StructuredJson` the result is the
    /// block's JSON, not the surrounding prose.
    pub fn evaluate(&self, text: &str) -> Completion {
        match self {
            CompletionPolicy::FinishOnText => Completion::Done(text.to_string()),
            CompletionPolicy::StructuredJson { reminder } => match extract_json_block(text) {
                Some((raw, _)) => Completion::Done(raw),
                None => Completion::Reprompt(reminder.clone()),
            },
        }
    }
}

/// Find the first ```` ```json ```` fence whose body parses. Returns the
/// trimmed body and the parsed value.
pub fn extract_json_block(text: &str) -> Option<(String, Value)> {
    JSON_FENCE.captures_iter(text).find_map(|caps| {
        let raw = caps.get(1)?.as_str().trim();
        serde_json::from_str(raw)
            .ok()
            .map(|value| (raw.to_string(), value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_json_block() {
        let text = "Review done.\n```json\n{\"score\": 7, \"issues\": []}\n```\nThanks";
        let (raw, value) = extract_json_block(text).unwrap();
        assert_eq!(raw, "{\"score\": 7, \"issues\": []}");
        assert_eq!(value, json!({"score": 7, "issues": []}));
    }

    #[test]
    fn test_extract_skips_invalid_block() {
        let text = "```json\n{broken\n```\nthen\n```json\n[1, 2]\n```";
        let (_, value) = extract_json_block(text).unwrap();
        assert_eq!(value, json!([1, 2]));
        assert!(extract_json_block("no fences here").is_none());
        assert!(extract_json_block("```\n{\"a\": 1}\n```").is_none());
    }

    #[test]
    fn test_policy_from_config() {
        let mut agent = AgentDefaults::default();
        assert_eq!(CompletionPolicy::from_config(&agent), CompletionPolicy::FinishOnText);
        agent.completion = CompletionMode::Json;
        agent.json_reminder = "JSON please".into();
        assert_eq!(
            CompletionPolicy::from_config(&agent),
            CompletionPolicy::StructuredJson {
                reminder: "JSON please".into()
            }
        );
    }

    #[test]
    fn test_evaluate() {
        assert_eq!(
            CompletionPolicy::FinishOnText.evaluate("done"),
            Completion::Done("done".into())
        );
        let policy = CompletionPolicy::StructuredJson {
            reminder: "use json".into(),
        };
        assert_eq!(policy.evaluate("done"), Completion::Reprompt("use json".into()));
        assert_eq!(
            policy.evaluate("```json\n{\"ok\": true}\n```"),
            Completion::Done("{\"ok\": true}".into())
        );
    }
}
