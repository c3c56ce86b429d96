//! Collaborative AI-Dungeon-Master engine.
//!
//! This crate provides:
//! - A replicated lobby document (party roster + chat log) with
//!   optimistic-revision persistence
//! - Leader-driven turn synchronization across N player clients
//! - Decoding and reconciliation of the narrator's machine-readable
//!   state deltas (HP, inventory, equipment)
//! - A journal of AI-written summaries as long-term campaign memory
//!
//! # Quick Start
//!
//! ```ignore
//! use aetheria_core::{GeminiNarrator, MemoryJournal, MemoryStore, TurnCoordinator};
//! use aetheria_core::party::{Character, ClassType, Stats};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryStore::new());
//!     let journal = Arc::new(MemoryJournal::new());
//!     let narrator = Arc::new(GeminiNarrator::from_env()?);
//!
//!     let mut client = TurnCoordinator::new(
//!         "lobby-1", "alice@example.com", store.clone(), journal, narrator,
//!     );
//!     client
//!         .join(Character::create(
//!             "Alice", "alice@example.com", ClassType::Rogue, Stats::baseline(), "A sly scout.",
//!         ))
//!         .await?;
//!
//!     client.start_campaign().await?;
//!     client.submit_action("I scout the treeline", None).await?;
//!
//!     let mut updates = store.subscribe("lobby-1");
//!     while let Ok(doc) = updates.recv().await {
//!         if let Some(dm_message) = client.observe(doc).await? {
//!             println!("{}", dm_message.text);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod coordinator;
pub mod delta;
pub mod dice;
pub mod items;
pub mod journal;
pub mod narrator;
pub mod party;
pub mod reconcile;
pub mod store;
pub mod testing;

// Primary public API
pub use coordinator::{all_ready, elect_leader, TurnCoordinator, TurnError};
pub use delta::{extract_delta, StateDelta};
pub use journal::{JournalEntry, JournalStore, MemoryJournal};
pub use narrator::{GeminiNarrator, Narrator, NarratorError, PlayerAction};
pub use reconcile::apply_delta;
pub use store::{LobbyDocument, LobbyStore, MemoryStore, StoreError, MAX_MESSAGES};
pub use testing::{sample_character, MockNarrator, MockReply, TestHarness};
