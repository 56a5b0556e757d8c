//! Session listing and event dump handlers.

use anyhow::{Context, Result};

use agentharness::config::Config;
use agentharness::events::JsonlEventStore;
use agentharness::utils::string::one_line;

fn open_store() -> Result<JsonlEventStore> {
    let config = Config::load().with_context(|| "Failed to load configuration")?;
    let dir = config.store_dir();
    JsonlEventStore::new(&dir)
        .with_context(|| format!("Failed to open event store at {}", dir.display()))
}

/// List persisted sessions, newest first.
pub(crate) async fn cmd_sessions() -> Result<()> {
    let store = open_store()?;
    let sessions = store
        .list_sessions()
        .await
        .with_context(|| "Failed to list sessions")?;

    if sessions.is_empty() {
        println!("No sessions in {}", store.dir().display());
        return Ok(());
    }

    println!("{:<38} {:>6}  {:<20}  FIRST MESSAGE", "SESSION", "EVENTS", "UPDATED");
    for s in &sessions {
        let updated = s
            .last_updated
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "--".to_string());
        let first = s
            .first_user_message
            .as_deref()
            .map(|m| one_line(m, 60))
            .unwrap_or_default();
        println!(
            "{:<38} {:>6}  {:<20}  {}",
            s.session_id, s.event_count, updated, first
        );
    }
    println!();
    println!("{} session(s)", sessions.len());
    Ok(())
}

/// Print every event of a session as one JSON object per line.
pub(crate) async fn cmd_events(session_id: &str) -> Result<()> {
    let store = open_store()?;
    let events = store
        .load_session(session_id)
        .await
        .with_context(|| format!("Failed to load session {}", session_id))?;

    if events.is_empty() {
        anyhow::bail!("No events recorded for session {}", session_id);
    }
    for event in &events {
        println!("{}", serde_json::to_string(event)?);
    }
    Ok(())
}
