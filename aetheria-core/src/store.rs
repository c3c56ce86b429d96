//! Shared lobby state: the persisted document and the store seam.
//!
//! A lobby is persisted as one full document, replaced wholesale on every
//! write. There is no server-side merging; writers race, so saves carry a
//! revision number and the store rejects a save whose revision doesn't
//! match what it holds. Callers reload and retry on conflict.

use crate::party::{Character, Message};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;
use tokio::sync::broadcast;

/// The newest messages kept per lobby; older entries are dropped on save.
/// Long-term continuity lives in the journal, not the chat log.
pub const MAX_MESSAGES: usize = 100;

/// Capacity of each lobby's change-notification channel.
const CHANNEL_CAPACITY: usize = 64;

/// The full persisted state of one lobby.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LobbyDocument {
    pub party: Vec<Character>,
    pub messages: Vec<Message>,
    /// Last-write wall-clock time, display only.
    pub timestamp: i64,
    /// Monotonic write counter used for conflict detection. Documents
    /// from before revisions existed decode as 0.
    #[serde(default)]
    pub revision: u64,
}

impl LobbyDocument {
    /// The next `seq` to assign when appending a message.
    pub fn next_seq(&self) -> u64 {
        self.messages.last().map(|m| m.seq + 1).unwrap_or(0)
    }

    /// Append a message, assigning its `seq`, and return it.
    pub fn push_message(&mut self, mut message: Message) -> &Message {
        message.seq = self.next_seq();
        self.messages.push(message);
        &self.messages[self.messages.len() - 1]
    }

    /// Drop everything but the newest [`MAX_MESSAGES`] entries.
    pub fn truncate_messages(&mut self) {
        if self.messages.len() > MAX_MESSAGES {
            let excess = self.messages.len() - MAX_MESSAGES;
            self.messages.drain(..excess);
        }
    }
}

/// Errors from the lobby store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("lobby {0} not found")]
    NotFound(String),

    #[error("stale write: expected revision {expected}, store has {actual}")]
    Conflict { expected: u64, actual: u64 },

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// The persistence seam for lobby documents.
///
/// Implementations push every saved document to all subscribers of that
/// lobby, including the writer itself. Delivery is at-least-once;
/// consumers must tolerate re-delivery and their own echoes.
#[async_trait]
pub trait LobbyStore: Send + Sync {
    /// Persist `doc` for `lobby_id` and return the new revision.
    ///
    /// The document's `revision` must match the stored one (0 for a
    /// fresh lobby) or the save fails with [`StoreError::Conflict`].
    /// The stored copy gets `revision + 1` and the chat log truncated
    /// to [`MAX_MESSAGES`].
    async fn save(&self, lobby_id: &str, doc: LobbyDocument) -> Result<u64, StoreError>;

    /// Load the current document for `lobby_id`.
    async fn load(&self, lobby_id: &str) -> Result<LobbyDocument, StoreError>;

    /// Subscribe to change notifications for `lobby_id`.
    fn subscribe(&self, lobby_id: &str) -> broadcast::Receiver<LobbyDocument>;
}

struct LobbySlot {
    doc: Option<LobbyDocument>,
    notify: broadcast::Sender<LobbyDocument>,
}

impl LobbySlot {
    fn new() -> Self {
        let (notify, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { doc: None, notify }
    }
}

/// In-memory store with broadcast fan-out, used in tests and demos. The
/// production backend implements [`LobbyStore`] over its own transport.
#[derive(Default)]
pub struct MemoryStore {
    lobbies: Mutex<HashMap<String, LobbySlot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LobbyStore for MemoryStore {
    async fn save(&self, lobby_id: &str, mut doc: LobbyDocument) -> Result<u64, StoreError> {
        let mut lobbies = self
            .lobbies
            .lock()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let slot = lobbies
            .entry(lobby_id.to_string())
            .or_insert_with(LobbySlot::new);

        let current = slot.doc.as_ref().map(|d| d.revision).unwrap_or(0);
        if doc.revision != current {
            return Err(StoreError::Conflict {
                expected: doc.revision,
                actual: current,
            });
        }

        doc.revision = current + 1;
        doc.truncate_messages();
        slot.doc = Some(doc.clone());

        // Send fails only when nobody is subscribed, which is fine.
        let _ = slot.notify.send(doc);
        Ok(current + 1)
    }

    async fn load(&self, lobby_id: &str) -> Result<LobbyDocument, StoreError> {
        let lobbies = self
            .lobbies
            .lock()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        lobbies
            .get(lobby_id)
            .and_then(|slot| slot.doc.clone())
            .ok_or_else(|| StoreError::NotFound(lobby_id.to_string()))
    }

    fn subscribe(&self, lobby_id: &str) -> broadcast::Receiver<LobbyDocument> {
        let mut lobbies = match self.lobbies.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        lobbies
            .entry(lobby_id.to_string())
            .or_insert_with(LobbySlot::new)
            .notify
            .subscribe()
    }
}
