//! Item definitions module
//!
//! Static item table used for:
//! - Stackability and inventory slot accounting
//! - Equipment slot validation and combat bonuses
//! - Shop prices and consumable healing

use std::fmt;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/// Shop buy price as a fraction of item value
pub const SHOP_BUY_MARKUP: f64 = 1.5;

/// Shop sell price as a fraction of item value
pub const SHOP_SELL_DISCOUNT: f64 = 0.5;

/// Every item in the game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemKind {
    IronSword,
    BronzeDagger,
    SteelSword,
    LeatherArmor,
    IronShield,
    IronHelmet,
    IronBoots,
    Pickaxe,
    FishingRod,
    GoldOre,
    IronOre,
    Coal,
    RawFish,
    Bread,
    HealthPotion,
    Bones,
}

impl ItemKind {
    /// All kinds in table order
    pub const ALL: [ItemKind; 16] = [
        ItemKind::IronSword,
        ItemKind::BronzeDagger,
        ItemKind::SteelSword,
        ItemKind::LeatherArmor,
        ItemKind::IronShield,
        ItemKind::IronHelmet,
        ItemKind::IronBoots,
        ItemKind::Pickaxe,
        ItemKind::FishingRod,
        ItemKind::GoldOre,
        ItemKind::IronOre,
        ItemKind::Coal,
        ItemKind::RawFish,
        ItemKind::Bread,
        ItemKind::HealthPotion,
        ItemKind::Bones,
    ];

    /// Upper-case key used on the wire
    pub fn key(self) -> &'static str {
        match self {
            ItemKind::IronSword => "IRON_SWORD",
            ItemKind::BronzeDagger => "BRONZE_DAGGER",
            ItemKind::SteelSword => "STEEL_SWORD",
            ItemKind::LeatherArmor => "LEATHER_ARMOR",
            ItemKind::IronShield => "IRON_SHIELD",
            ItemKind::IronHelmet => "IRON_HELMET",
            ItemKind::IronBoots => "IRON_BOOTS",
            ItemKind::Pickaxe => "PICKAXE",
            ItemKind::FishingRod => "FISHING_ROD",
            ItemKind::GoldOre => "GOLD_ORE",
            ItemKind::IronOre => "IRON_ORE",
            ItemKind::Coal => "COAL",
            ItemKind::RawFish => "RAW_FISH",
            ItemKind::Bread => "BREAD",
            ItemKind::HealthPotion => "HEALTH_POTION",
            ItemKind::Bones => "BONES",
        }
    }

    /// Look up a kind by its wire key
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.key() == key)
    }

    /// Static definition for this kind
    pub fn definition(self) -> &'static ItemDefinition {
        &definitions()[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.definition().name
    }

    pub fn is_stackable(self) -> bool {
        self.definition().stackable
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Broad item category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemCategory {
    Weapon,
    Armor,
    Tool,
    Resource,
    Consumable,
}

/// Equipment slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EquipSlot {
    Head,
    Chest,
    Legs,
    Feet,
    Weapon,
    Offhand,
    Tool,
}

impl EquipSlot {
    pub const ALL: [EquipSlot; 7] = [
        EquipSlot::Head,
        EquipSlot::Chest,
        EquipSlot::Legs,
        EquipSlot::Feet,
        EquipSlot::Weapon,
        EquipSlot::Offhand,
        EquipSlot::Tool,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EquipSlot::Head => "head",
            EquipSlot::Chest => "chest",
            EquipSlot::Legs => "legs",
            EquipSlot::Feet => "feet",
            EquipSlot::Weapon => "weapon",
            EquipSlot::Offhand => "offhand",
            EquipSlot::Tool => "tool",
        }
    }
}

/// Bonuses an item grants
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ItemStats {
    #[serde(skip_serializing_if = "is_zero")]
    pub attack: u32,
    #[serde(skip_serializing_if = "is_zero")]
    pub defense: u32,
    #[serde(skip_serializing_if = "is_zero")]
    pub mining: u32,
    #[serde(skip_serializing_if = "is_zero")]
    pub fishing: u32,
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

/// Item definition
#[derive(Debug, Clone)]
pub struct ItemDefinition {
    pub kind: ItemKind,
    pub name: &'static str,
    pub category: ItemCategory,
    pub value: u64,
    pub stackable: bool,
    pub slot: Option<EquipSlot>,
    pub stats: ItemStats,
    /// Health restored when consumed
    pub heals: Option<u32>,
    pub color: &'static str,
    pub emoji: &'static str,
}

impl ItemDefinition {
    /// Create a new item definition
    pub fn new(kind: ItemKind, name: &'static str, category: ItemCategory) -> Self {
        Self {
            kind,
            name,
            category,
            value: 1,
            stackable: false,
            slot: None,
            stats: ItemStats::default(),
            heals: None,
            color: "#888888",
            emoji: "📦",
        }
    }

    pub fn is_equippable(&self) -> bool {
        self.slot.is_some()
    }

    pub fn is_consumable(&self) -> bool {
        self.category == ItemCategory::Consumable
    }

    /// Price a shop charges for one unit
    pub fn buy_price(&self) -> u64 {
        (self.value as f64 * SHOP_BUY_MARKUP).ceil() as u64
    }

    /// Price a shop pays for one unit
    pub fn sell_price(&self) -> u64 {
        (self.value as f64 * SHOP_SELL_DISCOUNT).floor() as u64
    }

    /// Builder method - set value
    pub fn value(mut self, value: u64) -> Self {
        self.value = value;
        self
    }

    /// Builder method - mark stackable
    pub fn stackable(mut self) -> Self {
        self.stackable = true;
        self
    }

    /// Builder method - set equipment slot
    pub fn slot(mut self, slot: EquipSlot) -> Self {
        self.slot = Some(slot);
        self
    }

    /// Builder method - set bonuses
    pub fn stats(mut self, stats: ItemStats) -> Self {
        self.stats = stats;
        self
    }

    /// Builder method - set healing
    pub fn heals(mut self, amount: u32) -> Self {
        self.heals = Some(amount);
        self
    }

    /// Builder method - set client appearance
    pub fn looks(mut self, color: &'static str, emoji: &'static str) -> Self {
        self.color = color;
        self.emoji = emoji;
        self
    }
}

/// Global item definitions, indexed by `ItemKind`
static ITEM_DEFINITIONS: OnceLock<Vec<ItemDefinition>> = OnceLock::new();

/// Get the item table
pub fn definitions() -> &'static [ItemDefinition] {
    ITEM_DEFINITIONS.get_or_init(|| ItemKind::ALL.into_iter().map(build_definition).collect())
}

fn attack(attack: u32) -> ItemStats {
    ItemStats {
        attack,
        ..Default::default()
    }
}

fn defense(defense: u32) -> ItemStats {
    ItemStats {
        defense,
        ..Default::default()
    }
}

fn build_definition(kind: ItemKind) -> ItemDefinition {
    use ItemCategory::*;

    match kind {
        // Weapons
        ItemKind::IronSword => ItemDefinition::new(kind, "Iron Sword", Weapon)
            .value(150)
            .slot(EquipSlot::Weapon)
            .stats(attack(8))
            .looks("#aaaacc", "⚔️"),
        ItemKind::BronzeDagger => ItemDefinition::new(kind, "Bronze Dagger", Weapon)
            .value(60)
            .slot(EquipSlot::Weapon)
            .stats(attack(4))
            .looks("#cc9966", "🗡️"),
        ItemKind::SteelSword => ItemDefinition::new(kind, "Steel Sword", Weapon)
            .value(350)
            .slot(EquipSlot::Weapon)
            .stats(attack(15))
            .looks("#ccddee", "⚔️"),

        // Armor
        ItemKind::LeatherArmor => ItemDefinition::new(kind, "Leather Armor", Armor)
            .value(120)
            .slot(EquipSlot::Chest)
            .stats(defense(5))
            .looks("#aa7744", "🧥"),
        ItemKind::IronShield => ItemDefinition::new(kind, "Iron Shield", Armor)
            .value(100)
            .slot(EquipSlot::Offhand)
            .stats(defense(8))
            .looks("#888899", "🛡️"),
        ItemKind::IronHelmet => ItemDefinition::new(kind, "Iron Helmet", Armor)
            .value(80)
            .slot(EquipSlot::Head)
            .stats(defense(3))
            .looks("#999abb", "⛑️"),
        ItemKind::IronBoots => ItemDefinition::new(kind, "Iron Boots", Armor)
            .value(70)
            .slot(EquipSlot::Feet)
            .stats(defense(2))
            .looks("#888899", "👢"),

        // Tools
        ItemKind::Pickaxe => ItemDefinition::new(kind, "Pickaxe", Tool)
            .value(200)
            .slot(EquipSlot::Tool)
            .stats(ItemStats {
                mining: 5,
                ..Default::default()
            })
            .looks("#887766", "⛏️"),
        ItemKind::FishingRod => ItemDefinition::new(kind, "Fishing Rod", Tool)
            .value(150)
            .slot(EquipSlot::Tool)
            .stats(ItemStats {
                fishing: 5,
                ..Default::default()
            })
            .looks("#446688", "🎣"),

        // Resources
        ItemKind::GoldOre => ItemDefinition::new(kind, "Gold Ore", Resource)
            .value(80)
            .stackable()
            .looks("#ddbb22", "🪨"),
        ItemKind::IronOre => ItemDefinition::new(kind, "Iron Ore", Resource)
            .value(40)
            .stackable()
            .looks("#887777", "🪨"),
        ItemKind::Coal => ItemDefinition::new(kind, "Coal", Resource)
            .value(25)
            .stackable()
            .looks("#333333", "🪨"),
        ItemKind::RawFish => ItemDefinition::new(kind, "Raw Fish", Resource)
            .value(30)
            .stackable()
            .looks("#66aacc", "🐟"),
        ItemKind::Bones => ItemDefinition::new(kind, "Bones", Resource)
            .value(5)
            .stackable()
            .looks("#eeeecc", "🦴"),

        // Consumables
        ItemKind::Bread => ItemDefinition::new(kind, "Bread", Consumable)
            .value(20)
            .stackable()
            .heals(10)
            .looks("#ddaa55", "🍞"),
        ItemKind::HealthPotion => ItemDefinition::new(kind, "Health Potion", Consumable)
            .value(50)
            .stackable()
            .heals(30)
            .looks("#dd4444", "🧪"),
    }
}
