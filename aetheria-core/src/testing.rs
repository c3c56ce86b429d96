//! Test doubles: a scripted narrator and a multi-client harness.
//!
//! `MockNarrator` plays back queued replies so tests can drive the turn
//! loop deterministically without a network. `TestHarness` wires several
//! coordinators to one shared in-memory store, which is exactly the
//! multiplayer topology: N clients, one document.

use crate::coordinator::TurnCoordinator;
use crate::delta::StateDelta;
use crate::journal::{JournalStore, MemoryJournal};
use crate::narrator::{Narrator, NarratorError, PlayerAction};
use crate::party::{Character, ClassType, Message, MessageMetadata, Stats};
use crate::store::{LobbyStore, MemoryStore};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// One scripted narrator reply.
#[derive(Debug, Clone, Default)]
pub struct MockReply {
    pub narrative: String,
    pub delta: Option<StateDelta>,
}

impl MockReply {
    pub fn new(narrative: impl Into<String>) -> Self {
        Self {
            narrative: narrative.into(),
            delta: None,
        }
    }

    pub fn with_delta(mut self, delta: StateDelta) -> Self {
        self.delta = Some(delta);
        self
    }
}

/// A narrator that plays back a queue of scripted replies.
///
/// When the queue runs dry it falls back to a fixed line, and when
/// `fail_next` is armed the next DM call behaves like an API outage
/// (a `system` message, matching the live implementation's contract).
#[derive(Default)]
pub struct MockNarrator {
    replies: Mutex<Vec<MockReply>>,
    fail_next: Mutex<bool>,
    initialize_calls: AtomicUsize,
    resolve_calls: AtomicUsize,
    summarize_calls: AtomicUsize,
}

impl MockNarrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scripted(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Mutex::new(replies),
            ..Self::default()
        }
    }

    pub fn push_reply(&self, reply: MockReply) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push(reply);
        }
    }

    /// Make the next initialize/resolve call act like an API failure.
    pub fn fail_next(&self) {
        if let Ok(mut flag) = self.fail_next.lock() {
            *flag = true;
        }
    }

    pub fn initialize_calls(&self) -> usize {
        self.initialize_calls.load(Ordering::SeqCst)
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    pub fn summarize_calls(&self) -> usize {
        self.summarize_calls.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> bool {
        self.fail_next
            .lock()
            .map(|mut flag| std::mem::take(&mut *flag))
            .unwrap_or(false)
    }

    fn next_reply(&self) -> Message {
        let reply = self
            .replies
            .lock()
            .ok()
            .filter(|replies| !replies.is_empty())
            .map(|mut replies| replies.remove(0))
            .unwrap_or_else(|| MockReply::new("The world holds its breath."));

        let mut message = Message::dm(reply.narrative);
        if let Some(delta) = reply.delta {
            message = message.with_metadata(MessageMetadata {
                state: Some(delta),
                ..MessageMetadata::default()
            });
        }
        message
    }
}

#[async_trait]
impl Narrator for MockNarrator {
    async fn initialize(&self, _roster: &[Character]) -> Message {
        self.initialize_calls.fetch_add(1, Ordering::SeqCst);
        if self.take_failure() {
            return Message::system("The Dungeon Master is having trouble connecting to the astral plane.");
        }
        self.next_reply()
    }

    async fn resolve_turn(
        &self,
        _actions: &[PlayerAction],
        _history: &[Message],
        _summary: Option<&str>,
    ) -> Message {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        if self.take_failure() {
            return Message::system("The Dungeon Master is silent.");
        }
        self.next_reply()
    }

    async fn summarize(
        &self,
        previous: Option<&str>,
        recent: &[Message],
    ) -> Result<String, NarratorError> {
        self.summarize_calls.fetch_add(1, Ordering::SeqCst);
        if self.take_failure() {
            return Err(NarratorError::EmptyReply);
        }
        let base = previous.unwrap_or("");
        Ok(format!("{base}[{} recent events]", recent.len()))
    }
}

/// A lobby with a shared store and one coordinator per player.
pub struct TestHarness {
    pub store: Arc<MemoryStore>,
    pub journal: Arc<MemoryJournal>,
    pub narrator: Arc<MockNarrator>,
    pub lobby_id: String,
}

impl TestHarness {
    pub fn new(lobby_id: impl Into<String>) -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            journal: Arc::new(MemoryJournal::new()),
            narrator: Arc::new(MockNarrator::new()),
            lobby_id: lobby_id.into(),
        }
    }

    pub fn with_narrator(mut self, narrator: MockNarrator) -> Self {
        self.narrator = Arc::new(narrator);
        self
    }

    /// A coordinator for one player's client, sharing this lobby.
    pub fn coordinator(&self, player_email: &str) -> TurnCoordinator {
        TurnCoordinator::new(
            &self.lobby_id,
            player_email,
            self.store.clone() as Arc<dyn LobbyStore>,
            self.journal.clone() as Arc<dyn JournalStore>,
            self.narrator.clone() as Arc<dyn Narrator>,
        )
    }

    /// The store's current copy of the lobby document.
    pub async fn current_doc(&self) -> crate::store::LobbyDocument {
        self.store
            .load(&self.lobby_id)
            .await
            .unwrap_or_default()
    }
}

/// A baseline character for tests.
pub fn sample_character(name: &str, email: &str, class_type: ClassType) -> Character {
    Character::create(name, email, class_type, Stats::baseline(), "A test hero.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::party::Sender;

    #[tokio::test]
    async fn test_mock_narrator_plays_back_script() {
        let narrator = MockNarrator::scripted(vec![
            MockReply::new("Scene one."),
            MockReply::new("Scene two."),
        ]);

        let first = narrator.resolve_turn(&[], &[], None).await;
        let second = narrator.resolve_turn(&[], &[], None).await;
        let fallback = narrator.resolve_turn(&[], &[], None).await;

        assert_eq!(first.text, "Scene one.");
        assert_eq!(second.text, "Scene two.");
        assert_eq!(fallback.text, "The world holds its breath.");
        assert_eq!(narrator.resolve_calls(), 3);
    }

    #[tokio::test]
    async fn test_mock_narrator_failure_is_system_message() {
        let narrator = MockNarrator::new();
        narrator.fail_next();

        let message = narrator.resolve_turn(&[], &[], None).await;
        assert_eq!(message.sender, Sender::System);

        // The failure arms once.
        let next = narrator.resolve_turn(&[], &[], None).await;
        assert_eq!(next.sender, Sender::Dm);
    }

    #[tokio::test]
    async fn test_harness_shares_one_store() {
        let harness = TestHarness::new("lobby-test");
        let mut alice = harness.coordinator("alice@example.com");
        alice
            .join(sample_character(
                "Alice",
                "alice@example.com",
                ClassType::Rogue,
            ))
            .await
            .unwrap();

        let doc = harness.current_doc().await;
        assert_eq!(doc.party.len(), 1);
        assert_eq!(doc.party[0].name, "Alice");
    }
}
