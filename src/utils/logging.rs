//! Logging initialization.
//!
//! Formats:
//! - `pretty`: multi-line, human-readable
//! - `component`: compact single line, grep-friendly; pair with [`log_component!`]
//! - `json`: JSON lines for log aggregators

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};
use crate::error::Result;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `cfg.level`. Logs go to stderr unless
/// `cfg.file` is set. Calling this twice is a no-op for the second call.
pub fn init_logging(cfg: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let result = match (&cfg.file, cfg.format) {
        (Some(path), format) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let builder = builder.with_ansi(false).with_writer(Mutex::new(file));
            match format {
                LogFormat::Json => builder.json().try_init(),
                LogFormat::Pretty => builder.pretty().try_init(),
                LogFormat::Component => builder.compact().try_init(),
            }
        }
        (None, LogFormat::Json) => builder.json().with_writer(std::io::stderr).try_init(),
        (None, LogFormat::Pretty) => builder.pretty().with_writer(std::io::stderr).try_init(),
        (None, LogFormat::Component) => builder.compact().with_writer(std::io::stderr).try_init(),
    };

    // already initialized (tests, embedding applications)
    let _ = result;
    Ok(())
}

/// Emit a component-tagged tracing event.
///
/// ```
/// # use agentharness::log_component;
/// log_component!(info, "events", "consumer started");
/// log_component!(warn, "agent", "context over budget", tokens = 9000u64, budget = 8000u64);
/// ```
#[macro_export]
macro_rules! log_component {
    ($level:ident, $component:expr, $msg:expr) => {
        tracing::$level!(component = $component, $msg)
    };
    ($level:ident, $component:expr, $msg:expr, $($key:ident = $val:expr),+ $(,)?) => {
        tracing::$level!(component = $component, $($key = $val,)+ $msg)
    };
}
