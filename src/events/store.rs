//! Append-only event persistence keyed by session.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::error::Result;

use super::{EventType, RealtimeEvent};

/// Where the consumer persists events.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append one event to its session.
    async fn append(&self, event: &RealtimeEvent) -> Result<()>;
}

/// In-memory store, mostly for tests. Clones share storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryEventStore {
    events: Arc<Mutex<Vec<RealtimeEvent>>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything stored, in append order.
    pub fn events(&self) -> Vec<RealtimeEvent> {
        self.events
            .lock()
            .map(|e| e.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn append(&self, event: &RealtimeEvent) -> Result<()> {
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events.push(event.clone());
        Ok(())
    }
}

/// One line per persisted session in `sessions` output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    /// Text of the first USER_MESSAGE, if any
    pub first_user_message: Option<String>,
    pub event_count: usize,
    pub last_updated: Option<DateTime<Utc>>,
}

/// One `<session_id>.jsonl` file per session under a directory.
#[derive(Debug, Clone)]
pub struct JsonlEventStore {
    dir: PathBuf,
}

impl JsonlEventStore {
    /// Create the store, creating `dir` if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn session_path(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{}.jsonl", sanitize_key(session_id)))
    }

    /// All events of a session, ordered by timestamp. Unparseable lines are
    /// skipped with a warning. A missing session yields an empty list.
    pub async fn load_session(&self, session_id: &str) -> Result<Vec<RealtimeEvent>> {
        let path = self.session_path(session_id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut events = read_events(&path).await?;
        // stable: equal timestamps keep file order
        events.sort_by_key(|e| e.timestamp);
        Ok(events)
    }

    /// Every persisted session, most recently updated first.
    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        let mut summaries = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map(|e| e != "jsonl").unwrap_or(true) {
                continue;
            }
            let events = read_events(&path).await?;
            // the id inside the file is authoritative, the file name is sanitized
            let Some(session_id) = events.first().map(|e| e.session_id.clone()) else {
                continue;
            };
            summaries.push(SessionSummary {
                session_id,
                first_user_message: events
                    .iter()
                    .find(|e| e.event_type == EventType::UserMessage)
                    .and_then(|e| e.user_text())
                    .map(str::to_string),
                event_count: events.len(),
                last_updated: events.iter().map(|e| e.timestamp).max(),
            });
        }
        summaries.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        Ok(summaries)
    }
}

async fn read_events(path: &Path) -> Result<Vec<RealtimeEvent>> {
    let content = tokio::fs::read_to_string(path).await?;
    let mut events = Vec::new();
    for (lineno, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<RealtimeEvent>(line) {
            Ok(event) => events.push(event),
            Err(e) => warn!(
                path = %path.display(),
                line = lineno + 1,
                error = %e,
                "Skipping malformed event line"
            ),
        }
    }
    Ok(events)
}

#[async_trait]
impl EventStore for JsonlEventStore {
    async fn append(&self, event: &RealtimeEvent) -> Result<()> {
        let mut line = serde_json::to_string(event)?;
        line.push('\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.session_path(&event.session_id))
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Percent-encode characters that are unsafe in file names.
fn sanitize_key(key: &str) -> String {
    let mut result = String::with_capacity(key.len());
    for c in key.chars() {
        match c {
            '/' => result.push_str("%2F"),
            '\\' => result.push_str("%5C"),
            ':' => result.push_str("%3A"),
            '*' => result.push_str("%2A"),
            '?' => result.push_str("%3F"),
            '"' => result.push_str("%22"),
            '<' => result.push_str("%3C"),
            '>' => result.push_str("%3E"),
            '|' => result.push_str("%7C"),
            '%' => result.push_str("%25"),
            c => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_sanitize_key() {
        assert_eq!(sanitize_key("abc-123"), "abc-123");
        assert_eq!(sanitize_key("../etc/passwd"), "..%2Fetc%2Fpasswd");
        assert_eq!(sanitize_key("100%"), "100%25");
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryEventStore::new();
        let shared = store.clone();
        store
            .append(&RealtimeEvent::user_message("s", "hi"))
            .await
            .unwrap();
        assert_eq!(shared.events().len(), 1);
    }

    #[tokio::test]
    async fn test_jsonl_append_and_load_in_timestamp_order() {
        let dir = tempdir().unwrap();
        let store = JsonlEventStore::new(dir.path().join("sessions")).unwrap();

        let first = RealtimeEvent::user_message("s1", "first");
        let mut earlier = RealtimeEvent::agent_response("s1", "agent", "earlier");
        earlier.timestamp = first.timestamp - Duration::seconds(5);

        store.append(&first).await.unwrap();
        store.append(&earlier).await.unwrap();
        store
            .append(&RealtimeEvent::user_message("s2", "other"))
            .await
            .unwrap();

        let events = store.load_session("s1").await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], earlier);
        assert_eq!(events[1], first);

        assert!(store.load_session("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_jsonl_skips_malformed_lines() {
        let dir = tempdir().unwrap();
        let store = JsonlEventStore::new(dir.path()).unwrap();
        store
            .append(&RealtimeEvent::user_message("s1", "ok"))
            .await
            .unwrap();
        let path = dir.path().join("s1.jsonl");
        let mut content = std::fs::read_to_string(&path).unwrap();
        content.push_str("{not json\n");
        std::fs::write(&path, content).unwrap();

        assert_eq!(store.load_session("s1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_sessions() {
        let dir = tempdir().unwrap();
        let store = JsonlEventStore::new(dir.path()).unwrap();

        let mut old = RealtimeEvent::user_message("team/old", "old task");
        old.timestamp = Utc::now() - Duration::hours(1);
        store.append(&old).await.unwrap();
        store
            .append(&RealtimeEvent::user_message("new", "new task"))
            .await
            .unwrap();
        store
            .append(&RealtimeEvent::agent_response("new", "agent", "done"))
            .await
            .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let sessions = store.list_sessions().await.unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].session_id, "new");
        assert_eq!(sessions[0].event_count, 2);
        assert_eq!(sessions[0].first_user_message.as_deref(), Some("new task"));
        assert_eq!(sessions[1].session_id, "team/old");
    }
}
