//! Configuration management
//!
//! Configuration is loaded from `~/.agentharness/config.json` and then
//! overridden from `AGENTHARNESS_*` environment variables.

mod types;
pub mod validate;

pub use types::*;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::debug;

use crate::error::{HarnessError, Result};

impl Config {
    /// Configuration directory (`~/.agentharness`)
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".agentharness")
    }

    /// Default config file path (`~/.agentharness/config.json`)
    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load from the default path with environment overrides.
    ///
    /// A missing file yields the defaults.
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::path())
    }

    /// Load from `path` with environment overrides.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content).map_err(|e| {
                HarnessError::Config(format!("{}: {}", path.display(), e))
            })?
        } else {
            debug!(path = %path.display(), "Config file not found, using defaults");
            Config::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides using `lookup` to resolve variable names.
    ///
    /// Variables follow `AGENTHARNESS_SECTION_KEY`.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: FromStr>(value: Option<String>) -> Option<T> {
            value.and_then(|v| v.trim().parse().ok())
        }

        if let Some(v) = lookup("AGENTHARNESS_AGENT_NAME") {
            self.agent.name = v;
        }
        if let Some(v) = lookup("AGENTHARNESS_AGENT_MODEL") {
            self.agent.model = v;
        }
        if let Some(v) = parsed(lookup("AGENTHARNESS_AGENT_MAX_TOKENS")) {
            self.agent.max_tokens = v;
        }
        if let Some(v) = parsed(lookup("AGENTHARNESS_AGENT_TEMPERATURE")) {
            self.agent.temperature = v;
        }
        if let Some(v) = parsed(lookup("AGENTHARNESS_AGENT_MAX_TURNS")) {
            self.agent.max_turns = v;
        }
        if let Some(v) = lookup("AGENTHARNESS_AGENT_COMPLETION") {
            match v.as_str() {
                "text" => self.agent.completion = CompletionMode::Text,
                "json" => self.agent.completion = CompletionMode::Json,
                _ => {}
            }
        }
        if let Some(v) = parsed(lookup("AGENTHARNESS_CONTEXT_LIMIT")) {
            self.context.context_limit = v;
        }
        if let Some(v) = lookup("AGENTHARNESS_PROVIDER_API_KEY") {
            self.provider.api_key = Some(v);
        } else if self.provider.api_key.is_none() {
            self.provider.api_key = lookup("ANTHROPIC_API_KEY");
        }
        if let Some(v) = lookup("AGENTHARNESS_PROVIDER_API_BASE") {
            self.provider.api_base = Some(v);
        }
        if let Some(v) = lookup("AGENTHARNESS_TOOLS_WORKSPACE") {
            self.tools.workspace = Some(v);
        }
        if let Some(v) = lookup("AGENTHARNESS_EVENTS_WEBSOCKET_URL") {
            self.events.websocket_url = Some(v);
        }
        if let Some(v) = lookup("AGENTHARNESS_LOGGING_LEVEL") {
            self.logging.level = v;
        }
    }

    /// Workspace directory for tools, defaulting to the current directory.
    pub fn workspace(&self) -> PathBuf {
        self.tools
            .workspace
            .as_ref()
            .map(PathBuf::from)
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Directory holding persisted session events.
    pub fn store_dir(&self) -> PathBuf {
        self.events
            .store_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| Self::dir().join("sessions"))
    }

    /// Range checks on the loaded values. Unknown keys are only visible in
    /// the raw file; see [`validate::check_file`].
    pub fn validate(&self) -> Vec<validate::Diagnostic> {
        validate::validate_values(self)
    }
}
