//! The campaign journal: long-term memory beyond the truncated chat log.
//!
//! The chat log only keeps the newest hundred messages, so periodically
//! the coordinator distills recent events into a journal entry. Entries
//! are append-only and live outside the lobby document; losing one never
//! corrupts live state.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

/// One distilled chapter of campaign history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub id: Uuid,
    pub title: String,
    pub summary_text: String,
    /// Which resolved turn triggered this entry.
    pub turn_number: u64,
    pub created_at: i64,
}

impl JournalEntry {
    pub fn new(title: impl Into<String>, summary_text: impl Into<String>, turn_number: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            summary_text: summary_text.into(),
            turn_number,
            created_at: crate::party::now_millis(),
        }
    }
}

/// Errors from the journal store.
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("journal backend error: {0}")]
    Backend(String),
}

/// Append-only storage for journal entries, keyed by lobby.
#[async_trait]
pub trait JournalStore: Send + Sync {
    async fn append(&self, lobby_id: &str, entry: JournalEntry) -> Result<(), JournalError>;

    /// All entries for a lobby, oldest first.
    async fn entries(&self, lobby_id: &str) -> Result<Vec<JournalEntry>, JournalError>;

    /// The newest entry, if any.
    async fn latest(&self, lobby_id: &str) -> Result<Option<JournalEntry>, JournalError> {
        Ok(self.entries(lobby_id).await?.pop())
    }
}

/// In-memory journal used in tests and demos.
#[derive(Default)]
pub struct MemoryJournal {
    entries: Mutex<HashMap<String, Vec<JournalEntry>>>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JournalStore for MemoryJournal {
    async fn append(&self, lobby_id: &str, entry: JournalEntry) -> Result<(), JournalError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| JournalError::Backend(e.to_string()))?;
        entries.entry(lobby_id.to_string()).or_default().push(entry);
        Ok(())
    }

    async fn entries(&self, lobby_id: &str) -> Result<Vec<JournalEntry>, JournalError> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| JournalError::Backend(e.to_string()))?;
        Ok(entries.get(lobby_id).cloned().unwrap_or_default())
    }
}
