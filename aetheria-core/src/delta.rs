//! Decoding of machine-readable state blocks from AI narration.
//!
//! The narrator is instructed to end each reply with a trailing fenced
//! ```json block describing mechanical consequences (HP changes, loot,
//! equipment moves). `extract_delta` splits that block off the narrative
//! and decodes it; anything malformed degrades to "no delta" rather than
//! failing, because a turn must never be lost to a formatting slip.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Case-insensitive name matching.
///
/// This is the one matcher used everywhere a delta names something: HP
/// update keys against character names, removal names against inventory
/// items, equipment names against carried items. True when `key` appears
/// as a substring of `candidate`, ignoring case. First match wins at
/// every call site.
pub fn name_matches(candidate: &str, key: &str) -> bool {
    candidate.to_lowercase().contains(&key.to_lowercase())
}

/// A roll the narrator has asked a specific character to make.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequiredRoll {
    pub character: String,
    pub formula: String,
}

/// Inventory changes, in one of two wire dialects.
///
/// Modern replies carry granular `itemsAdded` / `itemsRemoved` maps.
/// Older replies carried `inventoryUpdates`, a full replacement list per
/// character; that dialect is still accepted but is applied as an
/// add-only diff against the current inventory, never a replacement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InventoryDelta {
    Granular {
        added: HashMap<String, Vec<String>>,
        removed: HashMap<String, Vec<String>>,
    },
    FullList(HashMap<String, Vec<String>>),
}

impl InventoryDelta {
    pub fn is_empty(&self) -> bool {
        match self {
            InventoryDelta::Granular { added, removed } => added.is_empty() && removed.is_empty(),
            InventoryDelta::FullList(lists) => lists.is_empty(),
        }
    }
}

impl Default for InventoryDelta {
    fn default() -> Self {
        InventoryDelta::Granular {
            added: HashMap::new(),
            removed: HashMap::new(),
        }
    }
}

/// The decoded mechanical consequences of one narration.
///
/// All keys are character names as the narrator spelled them; the
/// reconciler resolves them with [`name_matches`]. HP values are
/// absolute, not deltas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(from = "RawDelta", into = "RawDelta")]
pub struct StateDelta {
    pub hp_updates: HashMap<String, i32>,
    pub inventory: InventoryDelta,
    /// name -> slot key -> item name (None or empty string clears the slot).
    pub equipment_updates: HashMap<String, HashMap<String, Option<String>>>,
    pub location: Option<String>,
    pub in_combat: Option<bool>,
    pub suggested_actions: Vec<String>,
    pub required_roll: Option<RequiredRoll>,
}

impl StateDelta {
    pub fn is_empty(&self) -> bool {
        self.hp_updates.is_empty()
            && self.inventory.is_empty()
            && self.equipment_updates.is_empty()
            && self.location.is_none()
            && self.in_combat.is_none()
            && self.suggested_actions.is_empty()
            && self.required_roll.is_none()
    }
}

/// The literal wire shape of the fenced block.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawDelta {
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    hp_updates: HashMap<String, i32>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    items_added: HashMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    items_removed: HashMap<String, Vec<String>>,
    /// Legacy dialect, superseded by itemsAdded/itemsRemoved.
    #[serde(skip_serializing_if = "Option::is_none")]
    inventory_updates: Option<HashMap<String, Vec<String>>>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    equipment_updates: HashMap<String, HashMap<String, Option<String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    in_combat: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    suggested_actions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    required_roll: Option<RequiredRoll>,
}

impl From<RawDelta> for StateDelta {
    fn from(raw: RawDelta) -> Self {
        // Granular keys take precedence; the legacy list only applies
        // when the reply carries neither modern key.
        let inventory = if !raw.items_added.is_empty() || !raw.items_removed.is_empty() {
            InventoryDelta::Granular {
                added: raw.items_added,
                removed: raw.items_removed,
            }
        } else if let Some(lists) = raw.inventory_updates {
            InventoryDelta::FullList(lists)
        } else {
            InventoryDelta::default()
        };

        StateDelta {
            hp_updates: raw.hp_updates,
            inventory,
            equipment_updates: raw.equipment_updates,
            location: raw.location,
            in_combat: raw.in_combat,
            suggested_actions: raw.suggested_actions,
            required_roll: raw.required_roll,
        }
    }
}

impl From<StateDelta> for RawDelta {
    fn from(delta: StateDelta) -> Self {
        let (items_added, items_removed, inventory_updates) = match delta.inventory {
            InventoryDelta::Granular { added, removed } => (added, removed, None),
            InventoryDelta::FullList(lists) => (HashMap::new(), HashMap::new(), Some(lists)),
        };

        RawDelta {
            hp_updates: delta.hp_updates,
            items_added,
            items_removed,
            inventory_updates,
            equipment_updates: delta.equipment_updates,
            location: delta.location,
            in_combat: delta.in_combat,
            suggested_actions: delta.suggested_actions,
            required_roll: delta.required_roll,
        }
    }
}

/// Split a raw narrator reply into narrative text and its state delta.
///
/// Looks for a trailing ```json fenced block. Absent or malformed blocks
/// leave the full text untouched and yield no delta; a well-formed block
/// is stripped from the narrative before it reaches the chat log.
pub fn extract_delta(raw_text: &str) -> (String, Option<StateDelta>) {
    let Some(fence_start) = raw_text.rfind("```json") else {
        return (raw_text.trim().to_string(), None);
    };

    let block_start = fence_start + "```json".len();
    let Some(fence_end_rel) = raw_text[block_start..].find("```") else {
        return (raw_text.trim().to_string(), None);
    };
    let fence_end = block_start + fence_end_rel;

    // Only a trailing block counts; json in the middle of the narrative
    // is the narrator quoting something, not a state block.
    if !raw_text[fence_end + 3..].trim().is_empty() {
        return (raw_text.trim().to_string(), None);
    }

    let payload = &raw_text[block_start..fence_end];
    match serde_json::from_str::<StateDelta>(payload) {
        Ok(delta) => {
            let narrative = raw_text[..fence_start].trim().to_string();
            (narrative, Some(delta))
        }
        Err(err) => {
            log::warn!("discarding malformed state block: {err}");
            (raw_text.trim().to_string(), None)
        }
    }
}
