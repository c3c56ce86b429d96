//! Lobby data model: characters, items, equipment, and chat messages.
//!
//! All types here serialize to the camelCase document shape shared with
//! other clients of the same lobby. Older documents may lack newer optional
//! fields, so everything optional carries `#[serde(default)]` — there is no
//! schema migration mechanism.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CharacterId(pub Uuid);

impl CharacterId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CharacterId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Current wall-clock time in milliseconds since the epoch.
///
/// Used for display timestamps only; ordering and identity come from
/// message `seq` numbers and UUIDs.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

// ============================================================================
// Ability Scores
// ============================================================================

/// The six ability scores. Wire keys are the classic abbreviations
/// (STR/DEX/CON/INT/WIS/CHA).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    #[serde(rename = "STR")]
    pub strength: u8,
    #[serde(rename = "DEX")]
    pub dexterity: u8,
    #[serde(rename = "CON")]
    pub constitution: u8,
    #[serde(rename = "INT")]
    pub intelligence: u8,
    #[serde(rename = "WIS")]
    pub wisdom: u8,
    #[serde(rename = "CHA")]
    pub charisma: u8,
}

impl Stats {
    /// All scores at 10, the point-buy baseline.
    pub fn baseline() -> Self {
        Self {
            strength: 10,
            dexterity: 10,
            constitution: 10,
            intelligence: 10,
            wisdom: 10,
            charisma: 10,
        }
    }

    /// Standard ability modifier: (score - 10) / 2, rounded down.
    pub fn modifier(score: u8) -> i32 {
        (score as i32 - 10).div_euclid(2)
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::baseline()
    }
}

// ============================================================================
// Classes
// ============================================================================

/// Playable character classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassType {
    Fighter,
    Wizard,
    Rogue,
    Cleric,
    Paladin,
    Ranger,
}

impl ClassType {
    pub fn name(&self) -> &'static str {
        match self {
            ClassType::Fighter => "Fighter",
            ClassType::Wizard => "Wizard",
            ClassType::Rogue => "Rogue",
            ClassType::Cleric => "Cleric",
            ClassType::Paladin => "Paladin",
            ClassType::Ranger => "Ranger",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ClassType::Fighter => {
                "A master of martial combat, skilled with a variety of weapons and armor."
            }
            ClassType::Wizard => {
                "A scholarly magic-user capable of manipulating the structures of reality."
            }
            ClassType::Rogue => {
                "A scoundrel who uses stealth and trickery to overcome obstacles and enemies."
            }
            ClassType::Cleric => {
                "A priestly champion who wields divine magic in service of a higher power."
            }
            ClassType::Paladin => "A holy warrior bound to a sacred oath.",
            ClassType::Ranger => "A warrior who combats threats on the edges of civilization.",
        }
    }

    /// Hit die size used to seed starting HP.
    pub fn hit_die(&self) -> i32 {
        match self {
            ClassType::Wizard => 6,
            ClassType::Fighter => 10,
            _ => 8,
        }
    }

    pub fn all() -> [ClassType; 6] {
        [
            ClassType::Fighter,
            ClassType::Wizard,
            ClassType::Rogue,
            ClassType::Cleric,
            ClassType::Paladin,
            ClassType::Ranger,
        ]
    }
}

impl fmt::Display for ClassType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ============================================================================
// Items
// ============================================================================

/// Item categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemType {
    Weapon,
    Armor,
    Potion,
    Scroll,
    Consumable,
    Tool,
    Misc,
}

/// Item rarity, ordered from Common up to Legendary.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum Rarity {
    #[default]
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

/// An item carried or equipped by a character.
///
/// Items are value objects: the reconciler matches them by name
/// (case-insensitive), not by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    #[serde(default)]
    pub rarity: Rarity,
    #[serde(default)]
    pub description: String,
    /// Partial stat-bonus mapping, e.g. {"ATK": 2} or {"DEF": 1}.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub stats: HashMap<String, i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl Item {
    pub fn new(id: impl Into<String>, name: impl Into<String>, item_type: ItemType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            item_type,
            rarity: Rarity::Common,
            description: String::new(),
            stats: HashMap::new(),
            icon: None,
        }
    }

    /// A synthesized item for names the catalog cannot resolve, such as
    /// narrative loot the AI invented on the spot.
    pub fn placeholder(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: format!("gen-{}", Uuid::new_v4()),
            name,
            item_type: ItemType::Misc,
            rarity: Rarity::Common,
            description: "An item of unknown provenance.".to_string(),
            stats: HashMap::new(),
            icon: None,
        }
    }

    pub fn with_rarity(mut self, rarity: Rarity) -> Self {
        self.rarity = rarity;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_stat(mut self, stat: impl Into<String>, bonus: i32) -> Self {
        self.stats.insert(stat.into(), bonus);
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }
}

// ============================================================================
// Equipment
// ============================================================================

/// The fixed, closed set of equipment slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EquipSlot {
    Head,
    Chest,
    Legs,
    Feet,
    MainHand,
    OffHand,
    Ring1,
    Ring2,
}

impl EquipSlot {
    /// The wire key used in documents and AI deltas.
    pub fn key(&self) -> &'static str {
        match self {
            EquipSlot::Head => "head",
            EquipSlot::Chest => "chest",
            EquipSlot::Legs => "legs",
            EquipSlot::Feet => "feet",
            EquipSlot::MainHand => "mainHand",
            EquipSlot::OffHand => "offHand",
            EquipSlot::Ring1 => "ring1",
            EquipSlot::Ring2 => "ring2",
        }
    }

    /// Parse a wire key, case-insensitively. Unknown keys yield None and
    /// callers treat the update as a no-op.
    pub fn from_key(key: &str) -> Option<EquipSlot> {
        match key.to_lowercase().as_str() {
            "head" => Some(EquipSlot::Head),
            "chest" | "torso" => Some(EquipSlot::Chest),
            "legs" => Some(EquipSlot::Legs),
            "feet" => Some(EquipSlot::Feet),
            "mainhand" => Some(EquipSlot::MainHand),
            "offhand" => Some(EquipSlot::OffHand),
            "ring1" => Some(EquipSlot::Ring1),
            "ring2" => Some(EquipSlot::Ring2),
            _ => None,
        }
    }

    pub fn all() -> [EquipSlot; 8] {
        [
            EquipSlot::Head,
            EquipSlot::Chest,
            EquipSlot::Legs,
            EquipSlot::Feet,
            EquipSlot::MainHand,
            EquipSlot::OffHand,
            EquipSlot::Ring1,
            EquipSlot::Ring2,
        ]
    }
}

impl fmt::Display for EquipSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// A character's equipped items, one optional item per slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Equipment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head: Option<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chest: Option<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legs: Option<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feet: Option<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_hand: Option<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub off_hand: Option<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ring1: Option<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ring2: Option<Item>,
}

impl Equipment {
    pub fn get(&self, slot: EquipSlot) -> Option<&Item> {
        match slot {
            EquipSlot::Head => self.head.as_ref(),
            EquipSlot::Chest => self.chest.as_ref(),
            EquipSlot::Legs => self.legs.as_ref(),
            EquipSlot::Feet => self.feet.as_ref(),
            EquipSlot::MainHand => self.main_hand.as_ref(),
            EquipSlot::OffHand => self.off_hand.as_ref(),
            EquipSlot::Ring1 => self.ring1.as_ref(),
            EquipSlot::Ring2 => self.ring2.as_ref(),
        }
    }

    /// Place an item in a slot, returning whatever previously occupied it.
    pub fn set(&mut self, slot: EquipSlot, item: Item) -> Option<Item> {
        self.slot_mut(slot).replace(item)
    }

    /// Clear a slot, returning the removed item if any.
    pub fn clear(&mut self, slot: EquipSlot) -> Option<Item> {
        self.slot_mut(slot).take()
    }

    fn slot_mut(&mut self, slot: EquipSlot) -> &mut Option<Item> {
        match slot {
            EquipSlot::Head => &mut self.head,
            EquipSlot::Chest => &mut self.chest,
            EquipSlot::Legs => &mut self.legs,
            EquipSlot::Feet => &mut self.feet,
            EquipSlot::MainHand => &mut self.main_hand,
            EquipSlot::OffHand => &mut self.off_hand,
            EquipSlot::Ring1 => &mut self.ring1,
            EquipSlot::Ring2 => &mut self.ring2,
        }
    }
}

// ============================================================================
// Characters
// ============================================================================

/// One player's character in a lobby.
///
/// Invariant: `is_ready` is true exactly when `pending_action` is present.
/// Use `commit_action` / `clear_action` rather than setting the fields
/// directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    pub id: CharacterId,
    pub name: String,
    /// Links the character to a specific player.
    pub owner_email: String,
    pub class_type: ClassType,
    pub level: u8,
    pub hp: i32,
    pub max_hp: i32,
    pub stats: Stats,
    #[serde(default)]
    pub bio: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub inventory: Vec<Item>,
    #[serde(default)]
    pub equipment: Equipment,
    #[serde(default)]
    pub is_ready: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_action: Option<String>,
}

impl Character {
    /// Create a level-1 character with class-seeded HP and starter gear.
    pub fn create(
        name: impl Into<String>,
        owner_email: impl Into<String>,
        class_type: ClassType,
        stats: Stats,
        bio: impl Into<String>,
    ) -> Self {
        let max_hp = (class_type.hit_die() + Stats::modifier(stats.constitution)).max(1);
        let kit = crate::items::starter_kit(class_type);

        let equipment = Equipment {
            main_hand: Some(kit.main_hand),
            chest: Some(kit.chest),
            ..Equipment::default()
        };

        Self {
            id: CharacterId::new(),
            name: name.into(),
            owner_email: owner_email.into(),
            class_type,
            level: 1,
            hp: max_hp,
            max_hp,
            stats,
            bio: bio.into(),
            avatar_url: None,
            inventory: kit.inventory,
            equipment,
            is_ready: false,
            pending_action: None,
        }
    }

    /// Mark this character ready with a committed action for the turn.
    pub fn commit_action(&mut self, action: impl Into<String>) {
        self.pending_action = Some(action.into());
        self.is_ready = true;
    }

    /// Reset to Thinking, clearing the pending action.
    pub fn clear_action(&mut self) {
        self.pending_action = None;
        self.is_ready = false;
    }
}

// ============================================================================
// Messages
// ============================================================================

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    Dm,
    Player,
    System,
}

/// Metadata attached to a dice roll embedded in a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiceRollMeta {
    pub formula: String,
    pub result: i32,
    pub detail: String,
}

/// Optional message enrichment: the parsed state delta, dice-roll details,
/// and async audio-synthesis status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MessageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<crate::delta::StateDelta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dice_roll: Option<DiceRollMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    /// Transient flag: audio synthesis is in flight for this message.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub audio_pending: bool,
}

impl MessageMetadata {
    pub fn is_empty(&self) -> bool {
        self.state.is_none()
            && self.dice_roll.is_none()
            && self.audio_url.is_none()
            && !self.audio_pending
    }
}

/// An append-only chat log entry.
///
/// Identity is a v4 UUID; chronological order within a lobby is the `seq`
/// field assigned at append time. The wall-clock timestamp is display-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    #[serde(default)]
    pub seq: u64,
    pub sender: Sender,
    pub text: String,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
}

impl Message {
    /// Create a message with a fresh id and current timestamp. The `seq`
    /// is assigned when the message is appended to a lobby's log.
    pub fn new(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            seq: 0,
            sender,
            text: text.into(),
            timestamp: now_millis(),
            metadata: None,
        }
    }

    pub fn dm(text: impl Into<String>) -> Self {
        Self::new(Sender::Dm, text)
    }

    pub fn player(text: impl Into<String>) -> Self {
        Self::new(Sender::Player, text)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Sender::System, text)
    }

    pub fn with_metadata(mut self, metadata: MessageMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stat_modifier() {
        assert_eq!(Stats::modifier(10), 0);
        assert_eq!(Stats::modifier(14), 2);
        assert_eq!(Stats::modifier(8), -1);
        assert_eq!(Stats::modifier(7), -2);
    }

    #[test]
    fn test_character_creation_seeds_hp_and_gear() {
        let character = Character::create(
            "Thorin",
            "thorin@example.com",
            ClassType::Fighter,
            Stats {
                constitution: 14,
                ..Stats::baseline()
            },
            "A grim dwarf.",
        );

        // Fighter hit die 10 + CON modifier 2
        assert_eq!(character.max_hp, 12);
        assert_eq!(character.hp, 12);
        assert_eq!(character.level, 1);
        assert!(character.equipment.main_hand.is_some());
        assert!(character.equipment.chest.is_some());
        assert!(!character.inventory.is_empty());
        assert!(!character.is_ready);
        assert!(character.pending_action.is_none());
    }

    #[test]
    fn test_wizard_hp_floor() {
        let character = Character::create(
            "Frail",
            "frail@example.com",
            ClassType::Wizard,
            Stats {
                constitution: 1,
                ..Stats::baseline()
            },
            "",
        );
        // 6 + (-5) would be 1; never below 1
        assert_eq!(character.max_hp, 1);
    }

    #[test]
    fn test_commit_and_clear_action() {
        let mut character = Character::create(
            "Alice",
            "alice@example.com",
            ClassType::Rogue,
            Stats::baseline(),
            "",
        );

        character.commit_action("I pick the lock");
        assert!(character.is_ready);
        assert_eq!(character.pending_action.as_deref(), Some("I pick the lock"));

        character.clear_action();
        assert!(!character.is_ready);
        assert!(character.pending_action.is_none());
    }

    #[test]
    fn test_equip_slot_keys_round_trip() {
        for slot in EquipSlot::all() {
            assert_eq!(EquipSlot::from_key(slot.key()), Some(slot));
        }
        assert_eq!(EquipSlot::from_key("MAINHAND"), Some(EquipSlot::MainHand));
        assert_eq!(EquipSlot::from_key("belt"), None);
    }

    #[test]
    fn test_equipment_set_returns_previous() {
        let mut equipment = Equipment::default();
        let sword = Item::new("sword-1", "Iron Sword", ItemType::Weapon);
        let axe = Item::new("axe-1", "Battle Axe", ItemType::Weapon);

        assert!(equipment.set(EquipSlot::MainHand, sword.clone()).is_none());
        let previous = equipment.set(EquipSlot::MainHand, axe);
        assert_eq!(previous, Some(sword));
        assert_eq!(
            equipment.get(EquipSlot::MainHand).map(|i| i.name.as_str()),
            Some("Battle Axe")
        );
    }

    #[test]
    fn test_rarity_ordering() {
        assert!(Rarity::Common < Rarity::Uncommon);
        assert!(Rarity::Rare < Rarity::Epic);
        assert!(Rarity::Epic < Rarity::Legendary);
    }

    #[test]
    fn test_character_wire_shape() {
        let character = Character::create(
            "Bob",
            "bob@example.com",
            ClassType::Cleric,
            Stats::baseline(),
            "A humble cleric.",
        );

        let json = serde_json::to_value(&character).unwrap();
        assert!(json.get("ownerEmail").is_some());
        assert!(json.get("maxHp").is_some());
        assert!(json.get("classType").is_some());
        assert!(json.get("isReady").is_some());

        let back: Character = serde_json::from_value(json).unwrap();
        assert_eq!(back, character);
    }

    #[test]
    fn test_character_tolerates_missing_optional_fields() {
        // An older-shaped document without equipment or readiness fields.
        let json = serde_json::json!({
            "id": Uuid::new_v4(),
            "name": "Old Timer",
            "ownerEmail": "old@example.com",
            "classType": "Ranger",
            "level": 3,
            "hp": 21,
            "maxHp": 24,
            "stats": {"STR": 12, "DEX": 14, "CON": 13, "INT": 10, "WIS": 14, "CHA": 8}
        });

        let character: Character = serde_json::from_value(json).unwrap();
        assert!(character.inventory.is_empty());
        assert_eq!(character.equipment, Equipment::default());
        assert!(!character.is_ready);
    }

    #[test]
    fn test_message_seq_default() {
        let msg = Message::dm("Welcome to the tavern.");
        assert_eq!(msg.seq, 0);
        assert_eq!(msg.sender, Sender::Dm);
        assert!(msg.metadata.is_none());
    }
}
