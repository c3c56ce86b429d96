//! Turn coordination across fully replicated clients.
//!
//! Every player's client runs one `TurnCoordinator`; there is no central
//! arbiter. Each coordinator adopts documents pushed by the store,
//! recomputes readiness, and exactly one of them (the one whose player
//! owns the leader character) invokes the narrator when the whole party
//! has committed actions. Saves use optimistic revisions with a bounded
//! reload-and-retry loop, so two clients racing on the same document
//! converge instead of silently overwriting each other.

use crate::items::{ItemCatalog, StandardCatalog};
use crate::journal::{JournalEntry, JournalStore};
use crate::narrator::{Narrator, PlayerAction, SUMMARY_INTERVAL};
use crate::party::{
    now_millis, Character, CharacterId, DiceRollMeta, Message, MessageMetadata, Sender,
};
use crate::reconcile::apply_delta;
use crate::store::{LobbyDocument, LobbyStore, StoreError};
use std::sync::Arc;
use thiserror::Error;

/// What a member who committed nothing is assumed to do.
const DEFAULT_HESITATION: &str = "Hesitates and does nothing.";

/// How many times a save is retried after a revision conflict.
const SAVE_ATTEMPTS: usize = 3;

/// True when every member of a non-empty roster has committed an action.
///
/// An empty roster is never ready; resolving a turn for nobody would
/// only burn narrator calls.
pub fn all_ready(roster: &[Character]) -> bool {
    !roster.is_empty() && roster.iter().all(|c| c.is_ready)
}

/// The party leader: the character in roster position 0, fixed by
/// join order. There is no failover; if the leader's player leaves,
/// turns stop resolving until they return.
pub fn elect_leader(roster: &[Character]) -> Option<CharacterId> {
    roster.first().map(|c| c.id)
}

/// Errors surfaced to the caller of coordinator operations.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("no character in this lobby belongs to {0}")]
    NotInParty(String),

    #[error("action already committed for this turn")]
    AlreadyReady,

    #[error("a turn resolution is in flight")]
    ResolutionInFlight,
}

/// One client's replicated view of a lobby plus its turn logic.
pub struct TurnCoordinator {
    lobby_id: String,
    player_email: String,
    store: Arc<dyn LobbyStore>,
    journal: Arc<dyn JournalStore>,
    narrator: Arc<dyn Narrator>,
    catalog: Arc<dyn ItemCatalog>,
    doc: LobbyDocument,
    is_loading: bool,
}

impl TurnCoordinator {
    pub fn new(
        lobby_id: impl Into<String>,
        player_email: impl Into<String>,
        store: Arc<dyn LobbyStore>,
        journal: Arc<dyn JournalStore>,
        narrator: Arc<dyn Narrator>,
    ) -> Self {
        Self {
            lobby_id: lobby_id.into(),
            player_email: player_email.into(),
            store,
            journal,
            narrator,
            catalog: Arc::new(StandardCatalog),
            doc: LobbyDocument::default(),
            is_loading: false,
        }
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn ItemCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn lobby_id(&self) -> &str {
        &self.lobby_id
    }

    pub fn roster(&self) -> &[Character] {
        &self.doc.party
    }

    pub fn messages(&self) -> &[Message] {
        &self.doc.messages
    }

    pub fn revision(&self) -> u64 {
        self.doc.revision
    }

    pub fn my_character(&self) -> Option<&Character> {
        self.doc
            .party
            .iter()
            .find(|c| c.owner_email == self.player_email)
    }

    /// Whether this client's player owns the leader character.
    pub fn is_leader(&self) -> bool {
        let Some(leader_id) = elect_leader(&self.doc.party) else {
            return false;
        };
        self.doc
            .party
            .iter()
            .find(|c| c.id == leader_id)
            .map(|c| c.owner_email == self.player_email)
            .unwrap_or(false)
    }

    /// Add a character to the roster and persist.
    ///
    /// Loads the current document first so late joiners land on top of
    /// whatever state the lobby already has.
    pub async fn join(&mut self, character: Character) -> Result<(), TurnError> {
        match self.store.load(&self.lobby_id).await {
            Ok(doc) => self.doc = doc,
            Err(StoreError::NotFound(_)) => {}
            Err(err) => return Err(err.into()),
        }

        log::info!(
            "{} joining lobby {} as {}",
            self.player_email,
            self.lobby_id,
            character.name
        );
        self.persist(move |doc| doc.party.push(character.clone()))
            .await
    }

    /// Commit this player's action for the current turn.
    ///
    /// Moves the owned character from Thinking to Ready, appends the
    /// action to the chat log, and persists immediately so everyone
    /// sees the readiness change. Rejected when the character is
    /// already ready or a resolution is running.
    pub async fn submit_action(
        &mut self,
        text: &str,
        roll: Option<DiceRollMeta>,
    ) -> Result<(), TurnError> {
        if self.is_loading {
            return Err(TurnError::ResolutionInFlight);
        }
        let me = self
            .my_character()
            .ok_or_else(|| TurnError::NotInParty(self.player_email.clone()))?;
        if me.is_ready {
            return Err(TurnError::AlreadyReady);
        }

        let full_action = match &roll {
            Some(meta) => format!("{text} [Dice: {} = {}]", meta.detail, meta.result),
            None => text.to_string(),
        };

        let mut message = Message::player(full_action.clone());
        if let Some(meta) = roll {
            message = message.with_metadata(MessageMetadata {
                dice_roll: Some(meta),
                ..MessageMetadata::default()
            });
        }

        log::debug!("{} commits action in {}", self.player_email, self.lobby_id);
        let email = self.player_email.clone();
        self.persist(move |doc| {
            if let Some(c) = doc.party.iter_mut().find(|c| c.owner_email == email) {
                c.commit_action(full_action.clone());
            }
            doc.push_message(message.clone());
        })
        .await
    }

    /// Handle a change notification carrying the full new document.
    ///
    /// Idempotent: stale documents and echoes of this client's own
    /// writes are skipped by revision comparison, and re-evaluating the
    /// readiness trigger is harmless because a resolved turn resets
    /// every member to Thinking. Returns the DM message when this call
    /// resolved a turn.
    pub async fn observe(&mut self, doc: LobbyDocument) -> Result<Option<Message>, TurnError> {
        if doc.revision < self.doc.revision {
            log::debug!(
                "ignoring stale document rev {} (have {})",
                doc.revision,
                self.doc.revision
            );
            return Ok(None);
        }
        if doc.revision > self.doc.revision {
            self.doc = doc;
        }

        if self.is_loading {
            return Ok(None);
        }
        if !all_ready(&self.doc.party) || !self.is_leader() {
            return Ok(None);
        }

        self.is_loading = true;
        let outcome = self.resolve_pending_turn().await;
        self.is_loading = false;
        outcome.map(Some)
    }

    /// Leader-only: open the campaign with the narrator's first scene.
    ///
    /// A no-op for non-leaders and for lobbies whose log already has
    /// messages.
    pub async fn start_campaign(&mut self) -> Result<Option<Message>, TurnError> {
        if self.is_loading {
            return Err(TurnError::ResolutionInFlight);
        }
        if !self.is_leader() || !self.doc.messages.is_empty() {
            return Ok(None);
        }

        log::info!("leader opening campaign in {}", self.lobby_id);
        self.is_loading = true;
        let opening = self.narrator.initialize(&self.doc.party).await;
        let result = self
            .persist(|doc| {
                doc.push_message(opening.clone());
            })
            .await;
        self.is_loading = false;
        result?;
        Ok(self.doc.messages.last().cloned())
    }

    async fn resolve_pending_turn(&mut self) -> Result<Message, TurnError> {
        let actions: Vec<PlayerAction> = self
            .doc
            .party
            .iter()
            .map(|c| {
                PlayerAction::new(
                    c.name.clone(),
                    c.pending_action
                        .clone()
                        .unwrap_or_else(|| DEFAULT_HESITATION.to_string()),
                )
            })
            .collect();

        let summary = match self.journal.latest(&self.lobby_id).await {
            Ok(entry) => entry.map(|e| e.summary_text),
            Err(err) => {
                log::warn!("journal unavailable, resolving without summary: {err}");
                None
            }
        };

        log::info!(
            "resolving turn in {} with {} actions",
            self.lobby_id,
            actions.len()
        );
        let reply = self
            .narrator
            .resolve_turn(&actions, &self.doc.messages, summary.as_deref())
            .await;

        let new_party = match reply
            .metadata
            .as_ref()
            .and_then(|m| m.state.as_ref())
        {
            Some(delta) => apply_delta(&self.doc.party, delta, self.catalog.as_ref()),
            None => self.doc.party.clone(),
        };

        self.persist(move |doc| {
            doc.party = new_party.clone();
            for member in &mut doc.party {
                member.clear_action();
            }
            doc.push_message(reply.clone());
        })
        .await?;

        self.maybe_summarize(summary).await;

        // The persisted copy carries the assigned seq.
        Ok(self
            .doc
            .messages
            .last()
            .cloned()
            .unwrap_or_else(|| Message::system("turn resolved")))
    }

    /// Append a journal entry every [`SUMMARY_INTERVAL`] DM messages.
    /// Summarization failures are logged and skipped; the campaign
    /// just runs on a staler memory until the next interval.
    async fn maybe_summarize(&mut self, previous: Option<String>) {
        let dm_count = self
            .doc
            .messages
            .iter()
            .filter(|m| m.sender == Sender::Dm)
            .count();
        if dm_count == 0 || dm_count % SUMMARY_INTERVAL != 0 {
            return;
        }

        let window_start = self
            .doc
            .messages
            .len()
            .saturating_sub(SUMMARY_INTERVAL * 2);
        let recent = &self.doc.messages[window_start..];

        match self.narrator.summarize(previous.as_deref(), recent).await {
            Ok(summary_text) => {
                let chapter = dm_count / SUMMARY_INTERVAL;
                let entry = JournalEntry::new(
                    format!("Chapter {chapter}"),
                    summary_text,
                    dm_count as u64,
                );
                if let Err(err) = self.journal.append(&self.lobby_id, entry).await {
                    log::warn!("failed to append journal entry: {err}");
                }
            }
            Err(err) => log::warn!("summarization failed, skipping journal entry: {err}"),
        }
    }

    /// Save with optimistic-conflict retry.
    ///
    /// Applies `mutate` to a copy of the cached document and saves it.
    /// On a revision conflict the current document is reloaded and the
    /// mutation reapplied, up to [`SAVE_ATTEMPTS`] times.
    async fn persist<F>(&mut self, mutate: F) -> Result<(), TurnError>
    where
        F: Fn(&mut LobbyDocument),
    {
        let mut attempt = 0;
        loop {
            let mut doc = self.doc.clone();
            mutate(&mut doc);
            doc.timestamp = now_millis();

            match self.store.save(&self.lobby_id, doc.clone()).await {
                Ok(revision) => {
                    doc.revision = revision;
                    doc.truncate_messages();
                    self.doc = doc;
                    return Ok(());
                }
                Err(StoreError::Conflict { expected, actual }) if attempt + 1 < SAVE_ATTEMPTS => {
                    attempt += 1;
                    log::warn!(
                        "save conflict in {} (expected {expected}, actual {actual}), retry {attempt}",
                        self.lobby_id
                    );
                    match self.store.load(&self.lobby_id).await {
                        Ok(fresh) => self.doc = fresh,
                        Err(StoreError::NotFound(_)) => self.doc = LobbyDocument::default(),
                        Err(err) => return Err(err.into()),
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}
