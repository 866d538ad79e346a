//! Player module
//!
//! Manages player entities and their state including:
//! - Vitals, gold, combat stats and skills
//! - Inventory, equipment and bank
//! - Movement and the pending (move-then-act) action
//! - The registry that enforces unique display names

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::GameError;
use crate::game::action::{ActionState, PendingAction};
use crate::game::bank::Bank;
use crate::game::equipment::Equipment;
use crate::game::inventory::Inventory;
use crate::game::item::{EquipSlot, ItemKind};
use crate::game::map::TilePos;
use crate::game::movement::{Direction, Movable, Movement};
use crate::net::session::SessionId;

/// Starting gold
pub const STARTING_GOLD: u64 = 500;

/// Gold cap
pub const MAX_GOLD: u64 = 9_999_999;

/// Attack with nothing equipped
pub const BASE_ATTACK: u32 = 5;

/// Defence with nothing equipped
pub const BASE_DEFENSE: u32 = 2;

/// Simulated time between hunger ticks
pub const HUNGER_INTERVAL_MS: f64 = 10_000.0;

/// Hunger restored by food without a heal value
const DEFAULT_HUNGER_RESTORE: u32 = 20;

/// Display name length bounds (characters)
pub const NAME_MIN_LEN: usize = 2;
pub const NAME_MAX_LEN: usize = 20;

/// Items every new player carries
pub const STARTING_ITEMS: [(ItemKind, u32); 3] = [
    (ItemKind::Bread, 5),
    (ItemKind::HealthPotion, 2),
    (ItemKind::IronSword, 1),
];

/// Trainable skills
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Skill {
    Mining,
    Fishing,
    Smithing,
    Cooking,
    Combat,
}

impl Skill {
    pub const ALL: [Skill; 5] = [
        Skill::Mining,
        Skill::Fishing,
        Skill::Smithing,
        Skill::Cooking,
        Skill::Combat,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Skill::Mining => "mining",
            Skill::Fishing => "fishing",
            Skill::Smithing => "smithing",
            Skill::Cooking => "cooking",
            Skill::Combat => "combat",
        }
    }
}

/// Level for an experience total: `floor(sqrt(xp / 100)) + 1`
pub fn level_for_xp(xp: u64) -> u32 {
    (xp as f64 / 100.0).sqrt().floor() as u32 + 1
}

/// Experience per skill
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Skills {
    experience: [u64; 5],
}

impl Skills {
    pub fn experience(&self, skill: Skill) -> u64 {
        self.experience[skill as usize]
    }

    pub fn level(&self, skill: Skill) -> u32 {
        level_for_xp(self.experience(skill))
    }

    /// Add experience; returns the new level when one was gained
    pub fn add_experience(&mut self, skill: Skill, xp: u64) -> Option<u32> {
        let before = self.level(skill);
        let slot = &mut self.experience[skill as usize];
        *slot = slot.saturating_add(xp);
        let after = self.level(skill);
        (after > before).then_some(after)
    }
}

impl Serialize for Skills {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Skill::ALL.len()))?;
        for skill in Skill::ALL {
            map.serialize_entry(skill.name(), &self.experience(skill))?;
        }
        map.end()
    }
}

/// Health, mana and hunger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vitals {
    pub health: u32,
    pub max_health: u32,
    pub mana: u32,
    pub max_mana: u32,
    pub hunger: u32,
    pub max_hunger: u32,
}

impl Default for Vitals {
    fn default() -> Self {
        Self {
            health: 100,
            max_health: 100,
            mana: 50,
            max_mana: 50,
            hunger: 100,
            max_hunger: 100,
        }
    }
}

/// Snapshot every client may see
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerPublic {
    pub id: Uuid,
    pub name: String,
    pub col: i32,
    pub row: i32,
    pub x: f64,
    pub y: f64,
    pub direction: Direction,
    pub moving: bool,
    pub health: u32,
    pub max_health: u32,
    pub hunger: u32,
    pub max_hunger: u32,
}

/// Snapshot sent only to the owning client
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerPrivate {
    #[serde(flatten)]
    pub public: PlayerPublic,
    pub gold: u64,
    pub mana: u32,
    pub max_mana: u32,
    pub attack: u32,
    pub defense: u32,
    pub skills: Skills,
    pub inventory: Inventory,
    pub equipment: Equipment,
    pub bank: Bank,
}

/// A connected player
#[derive(Debug)]
pub struct Player {
    pub id: Uuid,
    pub session_id: SessionId,
    pub name: String,
    movement: Movement,
    pub action: ActionState,
    pub vitals: Vitals,
    pub gold: u64,
    pub attack: u32,
    pub defense: u32,
    pub skills: Skills,
    pub inventory: Inventory,
    pub equipment: Equipment,
    pub bank: Bank,
    hunger_timer_ms: f64,
    pub joined_at: DateTime<Utc>,
}

impl Player {
    /// Create a new player standing on `tile`
    pub fn new(session_id: SessionId, name: String, tile: TilePos, speed: f64) -> Self {
        let mut inventory = Inventory::default();
        for (kind, quantity) in STARTING_ITEMS {
            if let Err(e) = inventory.add(kind, quantity) {
                warn!(item = %kind, error = %e, "Could not grant starting item");
            }
        }

        Self {
            id: Uuid::new_v4(),
            session_id,
            name,
            movement: Movement::new(tile, speed),
            action: ActionState::Idle,
            vitals: Vitals::default(),
            gold: STARTING_GOLD,
            attack: BASE_ATTACK,
            defense: BASE_DEFENSE,
            skills: Skills::default(),
            inventory,
            equipment: Equipment::new(),
            bank: Bank::new(),
            hunger_timer_ms: 0.0,
            joined_at: Utc::now(),
        }
    }

    /// Action waiting for the current walk to finish
    pub fn pending(&self) -> Option<&PendingAction> {
        self.action.pending()
    }

    /// Holds a tool in the inventory or equipped
    pub fn has_tool(&self, tool: ItemKind) -> bool {
        self.inventory.contains_kind(tool) || self.equipment.has_kind(tool)
    }

    /// Add gold up to the cap
    pub fn credit_gold(&mut self, amount: u64) {
        self.gold = self.gold.saturating_add(amount).min(MAX_GOLD);
    }

    /// Recompute attack and defence from equipment
    pub fn recalculate_stats(&mut self) {
        self.attack = BASE_ATTACK + self.equipment.attack_bonus();
        self.defense = BASE_DEFENSE + self.equipment.defense_bonus();
    }

    /// Wear an inventory item
    pub fn equip(&mut self, item_id: &Uuid) -> Result<String, GameError> {
        let item = self.inventory.get(item_id).ok_or(GameError::NotEquippable)?;
        if !item.kind.definition().is_equippable() {
            return Err(GameError::NotEquippable);
        }

        let item = self.inventory.take(item_id).ok_or(GameError::NotEquippable)?;
        let name = item.name();
        match self.equipment.equip(item) {
            Ok(Some(previous)) => {
                // The equipped item just freed a slot
                if let Err(e) = self.inventory.insert(previous) {
                    warn!(player = %self.name, error = %e, "Swapped item did not fit");
                }
            }
            Ok(None) => {}
            Err(item) => {
                let _ = self.inventory.insert(item);
                return Err(GameError::NotEquippable);
            }
        }

        self.recalculate_stats();
        Ok(format!("Equipped {}.", name))
    }

    /// Move a worn item back to the inventory
    pub fn unequip(&mut self, slot: EquipSlot) -> Result<String, GameError> {
        if self.equipment.get(slot).is_none() {
            return Err(GameError::EmptySlot);
        }
        if self.inventory.is_full() {
            return Err(GameError::InventoryFull);
        }

        let item = self.equipment.unequip(slot).ok_or(GameError::EmptySlot)?;
        self.inventory.insert(item)?;
        self.recalculate_stats();
        Ok("Item unequipped.".to_string())
    }

    /// Eat or drink one unit of a consumable
    pub fn consume(&mut self, item_id: &Uuid) -> Result<String, GameError> {
        let kind = self
            .inventory
            .get(item_id)
            .map(|item| item.kind)
            .ok_or(GameError::NotConsumable)?;
        let def = kind.definition();
        if !def.is_consumable() {
            return Err(GameError::NotConsumable);
        }

        self.inventory.remove(item_id, 1)?;

        let vitals = &mut self.vitals;
        if let Some(heals) = def.heals {
            vitals.health = (vitals.health + heals).min(vitals.max_health);
        }
        let restore = def.heals.unwrap_or(DEFAULT_HUNGER_RESTORE);
        vitals.hunger = (vitals.hunger + restore).min(vitals.max_hunger);

        Ok(format!("Used {}. HP/Hunger restored.", def.name))
    }

    /// Hunger and regeneration; returns whether vitals changed
    pub fn tick_vitals(&mut self, delta_ms: f64) -> bool {
        self.hunger_timer_ms += delta_ms;
        if self.hunger_timer_ms < HUNGER_INTERVAL_MS {
            return false;
        }
        self.hunger_timer_ms = 0.0;

        let vitals = &mut self.vitals;
        if vitals.hunger > 0 {
            vitals.hunger -= 1;
        } else {
            vitals.health = vitals.health.saturating_sub(2);
        }
        if vitals.hunger > 80 && vitals.health < vitals.max_health {
            vitals.health += 1;
        }
        true
    }

    pub fn public(&self) -> PlayerPublic {
        let tile = self.movement.tile();
        let (x, y) = self.movement.position();
        PlayerPublic {
            id: self.id,
            name: self.name.clone(),
            col: tile.col,
            row: tile.row,
            x,
            y,
            direction: self.movement.direction(),
            moving: self.movement.is_moving(),
            health: self.vitals.health,
            max_health: self.vitals.max_health,
            hunger: self.vitals.hunger,
            max_hunger: self.vitals.max_hunger,
        }
    }

    pub fn private(&self) -> PlayerPrivate {
        PlayerPrivate {
            public: self.public(),
            gold: self.gold,
            mana: self.vitals.mana,
            max_mana: self.vitals.max_mana,
            attack: self.attack,
            defense: self.defense,
            skills: self.skills.clone(),
            inventory: self.inventory.clone(),
            equipment: self.equipment.clone(),
            bank: self.bank.clone(),
        }
    }
}

impl Movable for Player {
    fn movement(&self) -> &Movement {
        &self.movement
    }

    fn movement_mut(&mut self) -> &mut Movement {
        &mut self.movement
    }
}

/// Trim and check a requested display name
pub fn validate_name(name: &str) -> Result<String, GameError> {
    let name = name.trim();
    let len = name.chars().count();
    if !(NAME_MIN_LEN..=NAME_MAX_LEN).contains(&len) {
        return Err(GameError::InvalidName);
    }
    Ok(name.to_string())
}

/// All joined players, indexed by id, lowercase name and session
#[derive(Debug, Default)]
pub struct PlayerRegistry {
    players: HashMap<Uuid, Player>,
    name_index: HashMap<String, Uuid>,
    session_index: HashMap<SessionId, Uuid>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a display name is in use (case-insensitive)
    pub fn name_taken(&self, name: &str) -> bool {
        self.name_index.contains_key(&name.to_lowercase())
    }

    /// Register a player; names are unique ignoring case
    pub fn insert(&mut self, player: Player) -> Result<Uuid, GameError> {
        if self.name_taken(&player.name) {
            return Err(GameError::NameTaken);
        }
        if self.session_index.contains_key(&player.session_id) {
            return Err(GameError::AlreadyJoined);
        }

        let id = player.id;
        self.name_index.insert(player.name.to_lowercase(), id);
        self.session_index.insert(player.session_id, id);

        info!(
            player_id = %id,
            name = %player.name,
            session_id = player.session_id,
            "Player registered"
        );
        self.players.insert(id, player);
        Ok(id)
    }

    /// Unregister the player bound to a session
    pub fn remove_by_session(&mut self, session_id: SessionId) -> Option<Player> {
        let id = self.session_index.remove(&session_id)?;
        let player = self.players.remove(&id)?;
        self.name_index.remove(&player.name.to_lowercase());

        info!(player_id = %id, name = %player.name, "Player unregistered");
        Some(player)
    }

    pub fn get(&self, id: &Uuid) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn get_mut(&mut self, id: &Uuid) -> Option<&mut Player> {
        self.players.get_mut(id)
    }

    pub fn id_for_session(&self, session_id: SessionId) -> Option<Uuid> {
        self.session_index.get(&session_id).copied()
    }

    pub fn by_session(&self, session_id: SessionId) -> Option<&Player> {
        self.id_for_session(session_id)
            .and_then(|id| self.players.get(&id))
    }

    pub fn by_session_mut(&mut self, session_id: SessionId) -> Option<&mut Player> {
        let id = self.id_for_session(session_id)?;
        self.players.get_mut(&id)
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.players.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn ids(&self) -> Vec<Uuid> {
        self.players.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.players.values_mut()
    }

    /// Tiles currently occupied by players
    pub fn occupies(&self, tile: TilePos) -> bool {
        self.players.values().any(|p| p.tile() == tile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::movement::Movable;

    fn player(session_id: SessionId, name: &str) -> Player {
        Player::new(session_id, name.to_string(), TilePos::new(19, 10), 2.5)
    }

    #[test]
    fn test_level_for_xp() {
        assert_eq!(level_for_xp(0), 1);
        assert_eq!(level_for_xp(99), 1);
        assert_eq!(level_for_xp(100), 2);
        assert_eq!(level_for_xp(399), 2);
        assert_eq!(level_for_xp(400), 3);
        assert_eq!(level_for_xp(10_000), 11);
    }

    #[test]
    fn test_skills_level_up() {
        let mut skills = Skills::default();
        assert_eq!(skills.add_experience(Skill::Mining, 90), None);
        assert_eq!(skills.add_experience(Skill::Mining, 15), Some(2));
        assert_eq!(skills.experience(Skill::Mining), 105);
        assert_eq!(skills.level(Skill::Fishing), 1);
    }

    #[test]
    fn test_player_creation() {
        let p = player(1, "Alice");
        assert_eq!(p.gold, 500);
        assert_eq!(p.vitals, Vitals::default());
        assert_eq!((p.attack, p.defense), (5, 2));
        assert_eq!(p.inventory.count(ItemKind::Bread), 5);
        assert_eq!(p.inventory.count(ItemKind::HealthPotion), 2);
        assert_eq!(p.inventory.count(ItemKind::IronSword), 1);
        assert_eq!(p.inventory.len(), 3);
        assert_eq!(p.tile(), TilePos::new(19, 10));
        assert!(!p.is_moving());
        assert!(p.pending().is_none());
    }

    #[test]
    fn test_equip_and_unequip() {
        let mut p = player(1, "Alice");
        let sword = p.inventory.find_kind(ItemKind::IronSword).unwrap().id;

        assert_eq!(p.equip(&sword).unwrap(), "Equipped Iron Sword.");
        assert_eq!(p.attack, 13);
        assert!(!p.inventory.contains_kind(ItemKind::IronSword));

        // Swapping puts the old weapon back
        p.inventory.add(ItemKind::SteelSword, 1).unwrap();
        let steel = p.inventory.find_kind(ItemKind::SteelSword).unwrap().id;
        p.equip(&steel).unwrap();
        assert_eq!(p.attack, 20);
        assert!(p.inventory.contains_kind(ItemKind::IronSword));

        let bread = p.inventory.find_kind(ItemKind::Bread).unwrap().id;
        assert_eq!(p.equip(&bread), Err(GameError::NotEquippable));

        p.unequip(EquipSlot::Weapon).unwrap();
        assert_eq!(p.attack, 5);
        assert_eq!(p.unequip(EquipSlot::Weapon), Err(GameError::EmptySlot));
    }

    #[test]
    fn test_unequip_needs_room() {
        let mut p = player(1, "Alice");
        let sword = p.inventory.find_kind(ItemKind::IronSword).unwrap().id;
        p.equip(&sword).unwrap();
        p.inventory.add(ItemKind::IronBoots, 26).unwrap();
        assert!(p.inventory.is_full());

        assert_eq!(p.unequip(EquipSlot::Weapon), Err(GameError::InventoryFull));
        assert!(p.equipment.get(EquipSlot::Weapon).is_some());
    }

    #[test]
    fn test_consume() {
        let mut p = player(1, "Alice");
        p.vitals.health = 50;
        p.vitals.hunger = 95;

        let potion = p.inventory.find_kind(ItemKind::HealthPotion).unwrap().id;
        p.consume(&potion).unwrap();
        assert_eq!(p.vitals.health, 80);
        assert_eq!(p.vitals.hunger, 100);
        assert_eq!(p.inventory.count(ItemKind::HealthPotion), 1);

        let sword = p.inventory.find_kind(ItemKind::IronSword).unwrap().id;
        assert_eq!(p.consume(&sword), Err(GameError::NotConsumable));
    }

    #[test]
    fn test_hunger() {
        let mut p = player(1, "Alice");
        assert!(!p.tick_vitals(9_999.0));
        assert!(p.tick_vitals(1.0));
        assert_eq!(p.vitals.hunger, 99);

        p.vitals.hunger = 0;
        p.vitals.health = 10;
        assert!(p.tick_vitals(10_000.0));
        assert_eq!(p.vitals.health, 8);

        p.vitals.hunger = 90;
        assert!(p.tick_vitals(10_000.0));
        assert_eq!(p.vitals.hunger, 89);
        assert_eq!(p.vitals.health, 9);
    }

    #[test]
    fn test_gold_cap() {
        let mut p = player(1, "Alice");
        p.credit_gold(20_000_000);
        assert_eq!(p.gold, MAX_GOLD);
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("  Bob "), Ok("Bob".to_string()));
        assert_eq!(validate_name("B"), Err(GameError::InvalidName));
        assert_eq!(validate_name(&"x".repeat(21)), Err(GameError::InvalidName));
        assert_eq!(validate_name(&"x".repeat(20)).map(|n| n.len()), Ok(20));
    }

    #[test]
    fn test_registry_rejects_duplicate_names() {
        let mut registry = PlayerRegistry::new();
        registry.insert(player(1, "TestPlayer")).unwrap();

        assert_eq!(registry.insert(player(2, "testplayer")), Err(GameError::NameTaken));
        assert_eq!(registry.len(), 1);
        assert!(registry.by_session(2).is_none());

        let removed = registry.remove_by_session(1).unwrap();
        assert_eq!(removed.name, "TestPlayer");
        assert!(!registry.name_taken("TESTPLAYER"));
        registry.insert(player(2, "testplayer")).unwrap();
    }

    #[test]
    fn test_snapshots() {
        let p = player(1, "Alice");
        let json = serde_json::to_value(p.private()).unwrap();
        assert_eq!(json["name"], "Alice");
        assert_eq!(json["col"], 19);
        assert_eq!(json["maxHealth"], 100);
        assert_eq!(json["gold"], 500);
        assert_eq!(json["skills"]["mining"], 0);
        assert_eq!(json["inventory"].as_array().unwrap().len(), 3);
        assert!(json["equipment"]["weapon"].is_null());
        assert_eq!(json["direction"], "south");
    }
}
