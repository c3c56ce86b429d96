//! The AI Dungeon Master session.
//!
//! `Narrator` is the seam between the turn loop and the language model.
//! Opening scenes and turn resolutions never return errors: an API
//! failure becomes a `system` chat message so the table hears about it
//! and the turn loop stays unblocked. Only summarization, which has no
//! user-facing fallback, surfaces a `Result`.

use crate::delta::extract_delta;
use crate::party::{Character, Message, MessageMetadata, Sender};
use async_trait::async_trait;
use gemini::{Content, Gemini, Request};
use thiserror::Error;

/// How many DM messages pass between journal summaries.
pub const SUMMARY_INTERVAL: usize = 10;

/// Chat context sent per turn once a journal summary exists.
const HISTORY_WITH_SUMMARY: usize = 10;

/// Chat context sent per turn before the first summary.
const HISTORY_WITHOUT_SUMMARY: usize = 20;

const DM_SYSTEM_INSTRUCTION: &str = "\
You are the Dungeon Master (DM) for a Dungeons & Dragons 5th Edition game. \
Your goal is to provide an immersive, text-based RPG experience.

RULES:
1. Act as the narrator and referee. Describe the environment, NPCs, and outcomes of actions.
2. Be descriptive but concise. Avoid wall-of-text.
3. Adhere to D&D 5e rules for combat and skill checks.
4. If a player attempts something risky, ask them to roll a specific check.
5. Manage the health, status, and **inventory** of the party based on the narrative.
6. **Multiplayer Turn Resolution**: You will receive a list of actions from multiple characters. \
Resolve them simultaneously or in logical initiative order, then describe the collective outcome.

CRITICAL OUTPUT FORMAT:
Your response must be natural text for the story. \
However, at the very end of your response, you MUST include a JSON block wrapped in ```json``` \
to update the game interface state.
The JSON block should match this schema:
{
  \"hpUpdates\": { \"CharacterName\": number }, // The NEW total HP value, not the change.
  \"itemsAdded\": { \"CharacterName\": [\"item name\"] }, // Items gained this turn.
  \"itemsRemoved\": { \"CharacterName\": [\"item name\"] }, // Items lost or consumed this turn.
  \"equipmentUpdates\": { \"CharacterName\": { \"mainHand\": \"item name or null\" } }, \
// Slots: head, chest, legs, feet, mainHand, offHand, ring1, ring2. null unequips.
  \"location\": \"Current location name\",
  \"inCombat\": boolean,
  \"suggestedActions\": [\"Action 1\", \"Action 2\", \"Action 3\"], // 3 short options for quick play
  \"requiredRoll\": { \"character\": \"CharacterName\", \"formula\": \"1d20\" } // Only when a check is needed.
}";

const SUMMARY_SYSTEM_INSTRUCTION: &str = "\
You are the chronicler of an ongoing tabletop campaign. Condense recent play \
into a tight summary the Dungeon Master can use as long-term memory. Preserve \
names, locations, open quests, and unresolved threats. Respond with the \
summary text only.";

/// One player's declared action for the turn.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerAction {
    pub character_name: String,
    pub action: String,
    pub roll: Option<String>,
}

impl PlayerAction {
    pub fn new(character_name: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            character_name: character_name.into(),
            action: action.into(),
            roll: None,
        }
    }

    pub fn with_roll(mut self, roll: impl Into<String>) -> Self {
        self.roll = Some(roll.into());
        self
    }
}

/// Errors from operations that have no in-band fallback.
#[derive(Debug, Error)]
pub enum NarratorError {
    #[error("AI backend error: {0}")]
    Backend(#[from] gemini::Error),

    #[error("AI returned an empty reply")]
    EmptyReply,
}

/// The turn loop's view of the AI Dungeon Master.
#[async_trait]
pub trait Narrator: Send + Sync {
    /// Open a new campaign for this party. Always yields a message;
    /// failures come back as `system`-sender notices.
    async fn initialize(&self, roster: &[Character]) -> Message;

    /// Resolve one turn of declared actions against the recent history
    /// and the latest journal summary. Always yields a message.
    async fn resolve_turn(
        &self,
        actions: &[PlayerAction],
        history: &[Message],
        summary: Option<&str>,
    ) -> Message;

    /// Condense recent history into a journal summary.
    async fn summarize(
        &self,
        previous: Option<&str>,
        recent: &[Message],
    ) -> Result<String, NarratorError>;
}

/// `Narrator` backed by the Gemini generateContent API.
pub struct GeminiNarrator {
    client: Gemini,
}

impl GeminiNarrator {
    pub fn new(client: Gemini) -> Self {
        Self { client }
    }

    pub fn from_env() -> Result<Self, gemini::Error> {
        Ok(Self::new(Gemini::from_env()?))
    }

    async fn generate_dm_message(&self, contents: Vec<Content>, failure_notice: &str) -> Message {
        let request = Request::new(contents)
            .with_system_instruction(DM_SYSTEM_INSTRUCTION)
            .with_temperature(0.9);

        let raw = match self.client.generate(request).await {
            Ok(response) => response.text(),
            Err(err) => {
                log::error!("narrator request failed: {err}");
                return Message::system(format!("{failure_notice} ({err})"));
            }
        };
        if raw.is_empty() {
            log::error!("narrator returned no candidates");
            return Message::system(failure_notice.to_string());
        }

        let (narrative, delta) = extract_delta(&raw);
        let mut message = Message::dm(narrative);
        if let Some(delta) = delta {
            message = message.with_metadata(MessageMetadata {
                state: Some(delta),
                ..MessageMetadata::default()
            });
        }
        message
    }
}

#[async_trait]
impl Narrator for GeminiNarrator {
    async fn initialize(&self, roster: &[Character]) -> Message {
        let party_description = roster
            .iter()
            .map(describe_member)
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "Start a new adventure for this party:\n{party_description}\n\n\
             Create an interesting scenario (e.g., a tavern meeting, waking up \
             in a dungeon, a king's summons).\n\
             Set the scene and ask what they want to do."
        );

        self.generate_dm_message(
            vec![Content::user(prompt)],
            "The Dungeon Master is having trouble connecting to the astral plane.",
        )
        .await
    }

    async fn resolve_turn(
        &self,
        actions: &[PlayerAction],
        history: &[Message],
        summary: Option<&str>,
    ) -> Message {
        let action_descriptions = actions
            .iter()
            .map(|a| match &a.roll {
                Some(roll) => format!("- {}: {} (Rolled: {roll})", a.character_name, a.action),
                None => format!("- {}: {}", a.character_name, a.action),
            })
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "The players have made their decisions for this turn:\n{action_descriptions}\n\n\
             Resolve these actions based on the current context and describe what happens next."
        );

        let window = if summary.is_some() {
            HISTORY_WITH_SUMMARY
        } else {
            HISTORY_WITHOUT_SUMMARY
        };
        let mut contents = Vec::new();
        if let Some(summary) = summary {
            contents.push(Content::user(format!(
                "Campaign so far (journal summary):\n{summary}"
            )));
        }
        contents.extend(history_to_contents(history, window));
        contents.push(Content::user(prompt));

        self.generate_dm_message(contents, "The Dungeon Master is silent.")
            .await
    }

    async fn summarize(
        &self,
        previous: Option<&str>,
        recent: &[Message],
    ) -> Result<String, NarratorError> {
        let transcript = recent
            .iter()
            .filter(|m| m.sender != Sender::System)
            .map(|m| {
                let who = match m.sender {
                    Sender::Dm => "DM",
                    Sender::Player => "Player",
                    Sender::System => "System",
                };
                format!("{who}: {}", m.text)
            })
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = match previous {
            Some(previous) => format!(
                "Existing summary:\n{previous}\n\nNew events:\n{transcript}\n\n\
                 Produce an updated summary covering both."
            ),
            None => format!("Events so far:\n{transcript}\n\nProduce the campaign summary."),
        };

        let request = Request::new(vec![Content::user(prompt)])
            .with_system_instruction(SUMMARY_SYSTEM_INSTRUCTION);

        let text = self.client.generate(request).await?.text();
        if text.trim().is_empty() {
            return Err(NarratorError::EmptyReply);
        }
        Ok(text.trim().to_string())
    }
}

fn describe_member(character: &Character) -> String {
    let inventory = character
        .inventory
        .iter()
        .map(|i| i.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "{} (Level {} {}) - HP: {}/{}. Stats: STR{} DEX{} CON{} INT{} WIS{} CHA{}. Bio: {}. Inventory: {}",
        character.name,
        character.level,
        character.class_type,
        character.hp,
        character.max_hp,
        character.stats.strength,
        character.stats.dexterity,
        character.stats.constitution,
        character.stats.intelligence,
        character.stats.wisdom,
        character.stats.charisma,
        character.bio,
        inventory,
    )
}

/// Map the newest `window` dm/player messages into conversation turns.
/// System notices are local chatter and never reach the model.
fn history_to_contents(history: &[Message], window: usize) -> Vec<Content> {
    let relevant: Vec<&Message> = history
        .iter()
        .filter(|m| matches!(m.sender, Sender::Dm | Sender::Player))
        .collect();
    let start = relevant.len().saturating_sub(window);

    relevant[start..]
        .iter()
        .map(|m| match m.sender {
            Sender::Dm => Content::model(m.text.clone()),
            _ => Content::user(m.text.clone()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_window_filters_and_limits() {
        let mut history = Vec::new();
        for i in 0..30 {
            history.push(Message::player(format!("action {i}")));
            history.push(Message::dm(format!("outcome {i}")));
        }
        history.push(Message::system("a local notice"));

        let contents = history_to_contents(&history, 10);
        assert_eq!(contents.len(), 10);
        // Newest entries survive.
        assert_eq!(contents[9].parts[0].text, "outcome 29");
        assert!(contents.iter().all(|c| !c.parts[0].text.contains("notice")));
    }

    #[test]
    fn test_history_window_shorter_than_limit() {
        let history = vec![Message::dm("welcome")];
        let contents = history_to_contents(&history, 20);
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0].role, gemini::Role::Model);
    }

    #[test]
    fn test_member_description_contains_vitals() {
        use crate::party::{ClassType, Stats};
        let character = crate::party::Character::create(
            "Thorin",
            "thorin@example.com",
            ClassType::Fighter,
            Stats::baseline(),
            "A grim dwarf.",
        );

        let description = describe_member(&character);
        assert!(description.contains("Thorin (Level 1 Fighter)"));
        assert!(description.contains("HP: 10/10"));
        assert!(description.contains("A grim dwarf."));
        assert!(description.contains("Health Potion"));
    }

    #[test]
    fn test_player_action_builder() {
        let action = PlayerAction::new("Alice", "I attack").with_roll("1d20 -> [14] = 14");
        assert_eq!(action.character_name, "Alice");
        assert!(action.roll.is_some());
    }
}
