//! QA tests for the multiplayer turn loop.
//!
//! These drive several coordinators against one shared in-memory store
//! with a scripted narrator, verifying:
//! - The ready/resolve cycle across two players
//! - Leader exclusivity (only the leader's client calls the narrator)
//! - Idempotence against re-delivered documents
//! - Degradation when the narrator fails
//! - Journal summary cadence

use aetheria_core::coordinator::TurnError;
use aetheria_core::journal::JournalStore;
use aetheria_core::party::{ClassType, Sender};
use aetheria_core::testing::{sample_character, MockNarrator, MockReply, TestHarness};
use aetheria_core::{LobbyDocument, TurnCoordinator};

/// Make the coordination log traces visible under `RUST_LOG`.
fn setup() {
    let _ = env_logger::builder().is_test(true).try_init();
}

async fn two_player_lobby(harness: &TestHarness) -> (TurnCoordinator, TurnCoordinator) {
    setup();
    let mut alice = harness.coordinator("alice@example.com");
    let mut bob = harness.coordinator("bob@example.com");

    alice
        .join(sample_character(
            "Alice",
            "alice@example.com",
            ClassType::Fighter,
        ))
        .await
        .unwrap();
    bob.join(sample_character("Bob", "bob@example.com", ClassType::Wizard))
        .await
        .unwrap();

    // Alice adopts the post-join document so both see the full roster.
    let doc = harness.current_doc().await;
    alice.observe(doc).await.unwrap();

    (alice, bob)
}

#[tokio::test]
async fn test_two_player_ready_resolve_cycle() {
    let harness = TestHarness::new("lobby-cycle")
        .with_narrator(MockNarrator::scripted(vec![MockReply::new(
            "The goblins scatter before your charge.",
        )]));
    let (mut alice, mut bob) = two_player_lobby(&harness).await;

    alice.submit_action("I charge the goblins", None).await.unwrap();
    assert!(alice.my_character().unwrap().is_ready);

    // Bob adopts Alice's readiness, then commits his own action.
    bob.observe(harness.current_doc().await).await.unwrap();
    bob.submit_action("I cast a fire bolt", None).await.unwrap();

    // Alice (leader) observes the all-ready document and resolves.
    let dm_message = alice
        .observe(harness.current_doc().await)
        .await
        .unwrap()
        .expect("leader should resolve the turn");

    assert_eq!(dm_message.sender, Sender::Dm);
    assert_eq!(dm_message.text, "The goblins scatter before your charge.");
    assert_eq!(harness.narrator.resolve_calls(), 1);

    // Everyone is back to Thinking in the persisted document.
    let doc = harness.current_doc().await;
    assert!(doc.party.iter().all(|c| !c.is_ready));
    assert!(doc.party.iter().all(|c| c.pending_action.is_none()));

    // Log order: two player actions, then the DM reply, with monotonic seq.
    let senders: Vec<Sender> = doc.messages.iter().map(|m| m.sender).collect();
    assert_eq!(senders, vec![Sender::Player, Sender::Player, Sender::Dm]);
    let seqs: Vec<u64> = doc.messages.iter().map(|m| m.seq).collect();
    assert_eq!(seqs, vec![0, 1, 2]);
}

#[tokio::test]
async fn test_non_leader_never_resolves() {
    let harness = TestHarness::new("lobby-exclusive");
    let (mut alice, mut bob) = two_player_lobby(&harness).await;

    alice.submit_action("ready up", None).await.unwrap();
    bob.observe(harness.current_doc().await).await.unwrap();
    bob.submit_action("also ready", None).await.unwrap();

    // Bob sees the all-ready document first but is not the leader.
    let outcome = bob.observe(harness.current_doc().await).await.unwrap();
    assert!(outcome.is_none());
    assert_eq!(harness.narrator.resolve_calls(), 0);

    // The leader's observation is what resolves.
    assert!(alice
        .observe(harness.current_doc().await)
        .await
        .unwrap()
        .is_some());
    assert_eq!(harness.narrator.resolve_calls(), 1);
}

#[tokio::test]
async fn test_redelivery_is_idempotent() {
    let harness = TestHarness::new("lobby-redelivery");
    let (mut alice, mut bob) = two_player_lobby(&harness).await;

    alice.submit_action("attack", None).await.unwrap();
    bob.observe(harness.current_doc().await).await.unwrap();
    bob.submit_action("defend", None).await.unwrap();

    let all_ready_doc = harness.current_doc().await;
    assert!(alice
        .observe(all_ready_doc.clone())
        .await
        .unwrap()
        .is_some());

    // The same document delivered again (at-least-once push) resolves
    // nothing: it is stale relative to the post-resolution revision.
    assert!(alice.observe(all_ready_doc).await.unwrap().is_none());
    assert_eq!(harness.narrator.resolve_calls(), 1);

    // The echo of the resolution write is also a no-op.
    let echo = harness.current_doc().await;
    assert!(alice.observe(echo).await.unwrap().is_none());
    assert_eq!(harness.narrator.resolve_calls(), 1);
}

#[tokio::test]
async fn test_empty_roster_never_triggers() {
    setup();
    let harness = TestHarness::new("lobby-empty");
    let mut ghost = harness.coordinator("ghost@example.com");

    let outcome = ghost.observe(LobbyDocument::default()).await.unwrap();
    assert!(outcome.is_none());
    assert_eq!(harness.narrator.resolve_calls(), 0);
    assert_eq!(harness.narrator.initialize_calls(), 0);
}

#[tokio::test]
async fn test_double_submit_is_rejected() {
    let harness = TestHarness::new("lobby-double");
    let (mut alice, _bob) = two_player_lobby(&harness).await;

    alice.submit_action("first", None).await.unwrap();
    match alice.submit_action("second", None).await {
        Err(TurnError::AlreadyReady) => {}
        other => panic!("expected AlreadyReady, got {other:?}"),
    }

    // Only one player message landed.
    let doc = harness.current_doc().await;
    assert_eq!(doc.messages.len(), 1);
}

#[tokio::test]
async fn test_spectator_cannot_submit() {
    let harness = TestHarness::new("lobby-spectator");
    let (_alice, _bob) = two_player_lobby(&harness).await;

    let mut watcher = harness.coordinator("watcher@example.com");
    watcher.observe(harness.current_doc().await).await.unwrap();

    match watcher.submit_action("I try to play", None).await {
        Err(TurnError::NotInParty(email)) => assert_eq!(email, "watcher@example.com"),
        other => panic!("expected NotInParty, got {other:?}"),
    }
}

#[tokio::test]
async fn test_concurrent_submits_converge_via_retry() {
    let harness = TestHarness::new("lobby-race");
    let (mut alice, mut bob) = two_player_lobby(&harness).await;

    // Bob does NOT adopt Alice's write first: both clients hold the
    // same revision, so the second save conflicts and must retry.
    alice.submit_action("goes left", None).await.unwrap();
    bob.submit_action("goes right", None).await.unwrap();

    let doc = harness.current_doc().await;
    assert_eq!(doc.messages.len(), 2, "neither action may be lost");
    assert!(doc.party.iter().all(|c| c.is_ready));
}

#[tokio::test]
async fn test_narrator_failure_becomes_system_message() {
    let harness = TestHarness::new("lobby-outage");
    let (mut alice, mut bob) = two_player_lobby(&harness).await;
    harness.narrator.fail_next();

    alice.submit_action("attack", None).await.unwrap();
    bob.observe(harness.current_doc().await).await.unwrap();
    bob.submit_action("defend", None).await.unwrap();

    let message = alice
        .observe(harness.current_doc().await)
        .await
        .unwrap()
        .expect("the turn still completes");

    assert_eq!(message.sender, Sender::System);
    assert!(message.text.contains("silent"));

    // Readiness was still reset so the table can try again.
    let doc = harness.current_doc().await;
    assert!(doc.party.iter().all(|c| !c.is_ready));
}

#[tokio::test]
async fn test_start_campaign_is_leader_only_and_once() {
    let harness = TestHarness::new("lobby-opening")
        .with_narrator(MockNarrator::scripted(vec![MockReply::new(
            "You all wake in a torch-lit cell.",
        )]));
    let (mut alice, mut bob) = two_player_lobby(&harness).await;

    // Non-leader: no-op.
    assert!(bob.start_campaign().await.unwrap().is_none());
    assert_eq!(harness.narrator.initialize_calls(), 0);

    let opening = alice.start_campaign().await.unwrap().unwrap();
    assert_eq!(opening.text, "You all wake in a torch-lit cell.");
    assert_eq!(opening.seq, 0);

    // A second call with a non-empty log is a no-op.
    assert!(alice.start_campaign().await.unwrap().is_none());
    assert_eq!(harness.narrator.initialize_calls(), 1);
}

#[tokio::test]
async fn test_summary_cadence_writes_journal() {
    let harness = TestHarness::new("lobby-journal");
    let (mut alice, mut bob) = two_player_lobby(&harness).await;

    // Ten resolved turns = ten DM messages = one summary.
    for turn in 0..10 {
        alice
            .submit_action(&format!("action {turn}"), None)
            .await
            .unwrap();
        bob.observe(harness.current_doc().await).await.unwrap();
        bob.submit_action(&format!("reaction {turn}"), None)
            .await
            .unwrap();
        alice
            .observe(harness.current_doc().await)
            .await
            .unwrap()
            .expect("turn resolves");
        bob.observe(harness.current_doc().await).await.unwrap();
    }

    assert_eq!(harness.narrator.summarize_calls(), 1);
    let entries = harness.journal.entries("lobby-journal").await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].title, "Chapter 1");
    assert_eq!(entries[0].turn_number, 10);
}
