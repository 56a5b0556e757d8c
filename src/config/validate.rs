//! Configuration validation: unknown field detection and range checks.

use std::path::Path;

use serde_json::Value;

use super::Config;
use crate::error::{HarnessError, Result};

const KNOWN_TOP_LEVEL: &[&str] = &[
    "agent", "context", "provider", "retry", "tools", "events", "logging",
];

const KNOWN_AGENT: &[&str] = &[
    "name",
    "model",
    "max_tokens",
    "temperature",
    "max_turns",
    "system_prompt",
    "completion",
    "json_reminder",
    "termination_tool",
];
const KNOWN_CONTEXT: &[&str] = &["strategy", "context_limit", "threshold", "tool_result_budget"];
const KNOWN_PROVIDER: &[&str] = &["api_key", "api_base", "timeout_secs"];
const KNOWN_RETRY: &[&str] = &["enabled", "max_retries", "base_delay_ms", "max_delay_ms"];
const KNOWN_TOOLS: &[&str] = &["workspace", "shell_timeout_secs", "max_read_bytes"];
const KNOWN_EVENTS: &[&str] = &["persist", "store_dir", "websocket_url"];
const KNOWN_LOGGING: &[&str] = &["format", "level", "file"];

fn known_fields(section: &str) -> &'static [&'static str] {
    match section {
        "agent" => KNOWN_AGENT,
        "context" => KNOWN_CONTEXT,
        "provider" => KNOWN_PROVIDER,
        "retry" => KNOWN_RETRY,
        "tools" => KNOWN_TOOLS,
        "events" => KNOWN_EVENTS,
        "logging" => KNOWN_LOGGING,
        _ => &[],
    }
}

/// A validation diagnostic.
#[derive(Debug)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub path: String,
    pub message: String,
}

#[derive(Debug, PartialEq)]
pub enum DiagnosticLevel {
    Ok,
    Warn,
    Error,
}

impl Diagnostic {
    fn new(level: DiagnosticLevel, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.level {
            DiagnosticLevel::Ok => "[OK]",
            DiagnosticLevel::Warn => "[WARN]",
            DiagnosticLevel::Error => "[ERROR]",
        };
        if self.path.is_empty() {
            write!(f, "{} {}", prefix, self.message)
        } else {
            write!(f, "{} {}: {}", prefix, self.path, self.message)
        }
    }
}

/// Levenshtein distance for "did you mean?" suggestions.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();

    for (i, ca) in a.iter().enumerate() {
        let mut current = vec![i + 1; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        previous = current;
    }
    previous[b.len()]
}

/// Closest known field name within distance 3.
pub fn suggest_field(unknown: &str, known: &[&str]) -> Option<String> {
    known
        .iter()
        .map(|k| (k, levenshtein(unknown, k)))
        .filter(|(_, d)| *d <= 3)
        .min_by_key(|(_, d)| *d)
        .map(|(k, _)| format!("did you mean '{}'?", k))
}

fn unknown_field(path: String, key: &str, known: &[&str]) -> Diagnostic {
    let message = match suggest_field(key, known) {
        Some(suggestion) => format!("Unknown field '{}', {}", key, suggestion),
        None => format!("Unknown field '{}'", key),
    };
    Diagnostic::new(DiagnosticLevel::Error, path, message)
}

/// Check a raw JSON config for unknown sections and fields.
pub fn validate_config(raw: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let Some(obj) = raw.as_object() else {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Error,
            "",
            "Config must be a JSON object",
        ));
        return diagnostics;
    };
    diagnostics.push(Diagnostic::new(DiagnosticLevel::Ok, "", "Valid JSON"));

    let mut has_unknown = false;
    for (key, value) in obj {
        if !KNOWN_TOP_LEVEL.contains(&key.as_str()) {
            has_unknown = true;
            diagnostics.push(unknown_field(key.clone(), key, KNOWN_TOP_LEVEL));
            continue;
        }
        let known = known_fields(key);
        if let Some(section) = value.as_object() {
            for field in section.keys() {
                if !known.contains(&field.as_str()) {
                    has_unknown = true;
                    diagnostics.push(unknown_field(format!("{}.{}", key, field), field, known));
                }
            }
        }
    }

    if !has_unknown {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Ok,
            "",
            "All fields recognized",
        ));
    }
    diagnostics
}

/// Range and consistency checks on a parsed config.
pub fn validate_values(config: &Config) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    if config.agent.max_turns == 0 {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Error,
            "agent.max_turns",
            "must be at least 1",
        ));
    }
    if config.agent.max_tokens == 0 {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Error,
            "agent.max_tokens",
            "must be at least 1",
        ));
    }
    if !(0.0..=1.0).contains(&config.agent.temperature) {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Warn,
            "agent.temperature",
            format!("{} is outside 0.0-1.0", config.agent.temperature),
        ));
    }
    if !(0.0..=1.0).contains(&config.context.threshold) || config.context.threshold == 0.0 {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Error,
            "context.threshold",
            "must be in (0.0, 1.0]",
        ));
    }
    if config.retry.base_delay_ms > config.retry.max_delay_ms {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Warn,
            "retry.base_delay_ms",
            "greater than retry.max_delay_ms, delays will be capped",
        ));
    }
    if config.provider.api_key.is_none() {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Warn,
            "provider.api_key",
            "not set; ANTHROPIC_API_KEY must be exported",
        ));
    }
    diagnostics
}

/// Read `path` and run both the unknown-key and the range checks.
///
/// A missing file yields a single `Ok` diagnostic. Invalid JSON is an
/// `Error` diagnostic, not an `Err`.
pub fn check_file(path: &Path) -> Result<Vec<Diagnostic>> {
    if !path.exists() {
        return Ok(vec![Diagnostic::new(
            DiagnosticLevel::Ok,
            "",
            "No config file found (using defaults)",
        )]);
    }
    let content = std::fs::read_to_string(path)?;
    let raw: Value = match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            return Ok(vec![Diagnostic::new(
                DiagnosticLevel::Error,
                "",
                format!("Invalid JSON: {}", e),
            )])
        }
    };

    let mut diagnostics = validate_config(&raw);
    match serde_json::from_value::<Config>(raw) {
        Ok(config) => diagnostics.extend(validate_values(&config)),
        Err(e) => diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Error,
            "",
            HarnessError::Config(e.to_string()).to_string(),
        )),
    }
    Ok(diagnostics)
}
