//! Standard item database and class starter kits.
//!
//! Contains the predefined weapons, armor, and consumables that seed new
//! characters, plus the lookup catalog the reconciler uses to resolve
//! item names from AI deltas.

use crate::party::{ClassType, Item, ItemType};

/// Resolves item names to known items.
///
/// Injected into the reconciler so tests can substitute their own tables.
/// Names the catalog cannot resolve degenerate to `Item::placeholder`.
pub trait ItemCatalog: Send + Sync {
    /// Look up an item by name, case-insensitively.
    fn lookup(&self, name: &str) -> Option<Item>;
}

/// Catalog backed by the standard item tables.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardCatalog;

impl ItemCatalog for StandardCatalog {
    fn lookup(&self, name: &str) -> Option<Item> {
        find_item(name)
    }
}

/// Get a standard weapon by name.
pub fn get_weapon(name: &str) -> Option<Item> {
    let name_lower = name.to_lowercase();
    WEAPONS
        .iter()
        .find(|w| w.name.to_lowercase() == name_lower)
        .cloned()
}

/// Get a standard armor piece by name.
pub fn get_armor(name: &str) -> Option<Item> {
    let name_lower = name.to_lowercase();
    ARMOR
        .iter()
        .find(|a| a.name.to_lowercase() == name_lower)
        .cloned()
}

/// Get a standard consumable or tool by name.
pub fn get_gear(name: &str) -> Option<Item> {
    let name_lower = name.to_lowercase();
    GEAR.iter()
        .find(|g| g.name.to_lowercase() == name_lower)
        .cloned()
}

/// Try to find any standard item by name.
pub fn find_item(name: &str) -> Option<Item> {
    get_weapon(name)
        .or_else(|| get_armor(name))
        .or_else(|| get_gear(name))
}

/// The gear a freshly created character starts with.
#[derive(Debug, Clone)]
pub struct StarterKit {
    pub main_hand: Item,
    pub chest: Item,
    pub inventory: Vec<Item>,
}

/// The class-based starter-kit table applied at character creation.
pub fn starter_kit(class_type: ClassType) -> StarterKit {
    match class_type {
        ClassType::Fighter => StarterKit {
            main_hand: IRON_SWORD.clone(),
            chest: CHAIN_MAIL.clone(),
            inventory: vec![HEALTH_POTION.clone()],
        },
        ClassType::Wizard => StarterKit {
            main_hand: OAK_STAFF.clone(),
            chest: APPRENTICE_ROBE.clone(),
            inventory: vec![MANA_POTION.clone()],
        },
        ClassType::Rogue => StarterKit {
            main_hand: RUSTY_DAGGER.clone(),
            chest: LEATHER_ARMOR.clone(),
            inventory: vec![LOCKPICK.clone()],
        },
        ClassType::Cleric => StarterKit {
            main_hand: CLERIC_MACE.clone(),
            chest: CHAIN_MAIL.clone(),
            inventory: vec![HEALTH_POTION.clone()],
        },
        ClassType::Paladin => StarterKit {
            main_hand: IRON_SWORD.clone(),
            chest: CHAIN_MAIL.clone(),
            inventory: vec![HOLY_SYMBOL.clone()],
        },
        ClassType::Ranger => StarterKit {
            main_hand: RUSTY_DAGGER.clone(),
            chest: LEATHER_ARMOR.clone(),
            inventory: vec![TRAVEL_RATIONS.clone()],
        },
    }
}

lazy_static::lazy_static! {
    static ref IRON_SWORD: Item = Item::new("start-sword", "Iron Sword", ItemType::Weapon)
        .with_description("A dependable blade for a novice adventurer.")
        .with_stat("ATK", 2)
        .with_icon("⚔️");
    static ref OAK_STAFF: Item = Item::new("start-staff", "Oak Staff", ItemType::Weapon)
        .with_description("Channels basic magical energy.")
        .with_stat("INT", 1)
        .with_icon("🪄");
    static ref RUSTY_DAGGER: Item = Item::new("start-dagger", "Rusty Dagger", ItemType::Weapon)
        .with_description("Small, but lethal in the right hands.")
        .with_stat("DEX", 1)
        .with_icon("🗡️");
    static ref CLERIC_MACE: Item = Item::new("start-mace", "Cleric's Mace", ItemType::Weapon)
        .with_description("Ideal for crushing skeletons.")
        .with_stat("STR", 1)
        .with_stat("WIS", 1)
        .with_icon("🔨");

    static ref LEATHER_ARMOR: Item = Item::new("start-leather", "Leather Armor", ItemType::Armor)
        .with_description("Protection without sacrificing mobility.")
        .with_stat("DEF", 1)
        .with_icon("🧥");
    static ref APPRENTICE_ROBE: Item = Item::new("start-robe", "Apprentice Robe", ItemType::Armor)
        .with_description("Simple cloth, comfortable for spellcasting.")
        .with_stat("MP", 5)
        .with_icon("👘");
    static ref CHAIN_MAIL: Item = Item::new("start-chain", "Chain Mail", ItemType::Armor)
        .with_description("Interlocking iron links.")
        .with_stat("DEF", 3)
        .with_icon("⛓️");

    static ref HEALTH_POTION: Item = Item::new("pot-health", "Health Potion", ItemType::Consumable)
        .with_description("Restores health.")
        .with_icon("🍷");
    static ref MANA_POTION: Item = Item::new("pot-mana", "Mana Potion", ItemType::Consumable)
        .with_description("Restores mana.")
        .with_icon("🧪");
    static ref LOCKPICK: Item = Item::new("lockpick", "Lockpick", ItemType::Tool)
        .with_description("For opening locked doors.")
        .with_icon("🗝️");
    static ref HOLY_SYMBOL: Item = Item::new("holy-symbol", "Holy Symbol", ItemType::Misc)
        .with_description("A divine focus.")
        .with_icon("✝️");
    static ref TRAVEL_RATIONS: Item = Item::new("rations", "Travel Rations", ItemType::Consumable)
        .with_description("Food for the road.")
        .with_icon("🍖");

    /// Standard starter weapons.
    pub static ref WEAPONS: Vec<Item> = vec![
        IRON_SWORD.clone(),
        OAK_STAFF.clone(),
        RUSTY_DAGGER.clone(),
        CLERIC_MACE.clone(),
    ];

    /// Standard starter armor.
    pub static ref ARMOR: Vec<Item> = vec![
        LEATHER_ARMOR.clone(),
        APPRENTICE_ROBE.clone(),
        CHAIN_MAIL.clone(),
    ];

    /// Standard consumables and tools.
    pub static ref GEAR: Vec<Item> = vec![
        HEALTH_POTION.clone(),
        MANA_POTION.clone(),
        LOCKPICK.clone(),
        HOLY_SYMBOL.clone(),
        TRAVEL_RATIONS.clone(),
    ];
}
