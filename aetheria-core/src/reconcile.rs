//! Applying a state delta to the party roster.
//!
//! This is a pure function from (roster, delta) to a new roster. It never
//! fails: names that match nothing, unknown equipment slots, and removals
//! of absent items are all silent no-ops, because the delta comes from a
//! language model and partial applicability is the normal case.

use crate::delta::{name_matches, InventoryDelta, StateDelta};
use crate::items::ItemCatalog;
use crate::party::{Character, EquipSlot, Item};

/// Apply `delta` to `roster`, returning the updated roster.
///
/// Callers compare the result against the input to decide whether a
/// persist is needed; an empty delta is guaranteed to return an equal
/// roster.
pub fn apply_delta(
    roster: &[Character],
    delta: &StateDelta,
    catalog: &dyn ItemCatalog,
) -> Vec<Character> {
    let mut updated: Vec<Character> = roster.to_vec();

    for character in &mut updated {
        apply_hp(character, delta);
        apply_inventory(character, delta, catalog);
        apply_equipment(character, delta, catalog);
    }

    updated
}

fn apply_hp(character: &mut Character, delta: &StateDelta) {
    for (key, hp) in &delta.hp_updates {
        if name_matches(&character.name, key) {
            // Absolute value, unclamped. Negative HP is a meaningful
            // signal (downed / dying) that the narrative layer reads.
            character.hp = *hp;
            break;
        }
    }
}

fn apply_inventory(character: &mut Character, delta: &StateDelta, catalog: &dyn ItemCatalog) {
    match &delta.inventory {
        InventoryDelta::Granular { added, removed } => {
            for (key, names) in added {
                if !name_matches(&character.name, key) {
                    continue;
                }
                for name in names {
                    character.inventory.push(resolve_item(catalog, name));
                }
            }
            for (key, names) in removed {
                if !name_matches(&character.name, key) {
                    continue;
                }
                for name in names {
                    if let Some(pos) = character
                        .inventory
                        .iter()
                        .position(|item| name_matches(&item.name, name))
                    {
                        character.inventory.remove(pos);
                    }
                }
            }
        }
        InventoryDelta::FullList(lists) => {
            // Legacy dialect: treat the list as additive only. Names the
            // character already carries are kept as-is; replacement
            // semantics would silently destroy equipped-item bookkeeping.
            for (key, names) in lists {
                if !name_matches(&character.name, key) {
                    continue;
                }
                for name in names {
                    let already_carried = character
                        .inventory
                        .iter()
                        .any(|item| name_matches(&item.name, name));
                    if !already_carried {
                        character.inventory.push(resolve_item(catalog, name));
                    }
                }
            }
        }
    }
}

fn apply_equipment(character: &mut Character, delta: &StateDelta, catalog: &dyn ItemCatalog) {
    for (key, slots) in &delta.equipment_updates {
        if !name_matches(&character.name, key) {
            continue;
        }
        for (slot_key, item_name) in slots {
            let Some(slot) = EquipSlot::from_key(slot_key) else {
                log::warn!("ignoring unknown equipment slot {slot_key:?}");
                continue;
            };

            match item_name.as_deref() {
                None | Some("") => {
                    // Unequip. The previous occupant is discarded, not
                    // returned to inventory; the narrator accounts for
                    // dropped gear through itemsAdded when it matters.
                    character.equipment.clear(slot);
                }
                Some(name) => {
                    let item = match character
                        .inventory
                        .iter()
                        .position(|item| name_matches(&item.name, name))
                    {
                        Some(pos) => character.inventory.remove(pos),
                        None => resolve_item(catalog, name),
                    };
                    character.equipment.set(slot, item);
                }
            }
        }
    }
}

fn resolve_item(catalog: &dyn ItemCatalog, name: &str) -> Item {
    catalog
        .lookup(name)
        .unwrap_or_else(|| Item::placeholder(name))
}
