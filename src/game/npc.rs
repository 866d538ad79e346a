//! NPC module
//!
//! Non-player characters: static definitions, world placements and the
//! wander behaviour that keeps them pottering around their home tile.

use rand::Rng;
use serde::Serialize;
use tracing::trace;
use uuid::Uuid;

use crate::config::GameplayConfig;
use crate::game::item::{ItemCategory, ItemKind};
use crate::game::map::{TileMap, TilePos};
use crate::game::movement::{Direction, Movable, Movement};
use crate::game::pathfinding::{find_path, PathLimits};

/// Stock shown for every shop line
pub const SHOP_STOCK: u32 = 999;

/// NPC definitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NpcKind {
    Merchant,
    Banker,
    Guard,
    Blacksmith,
    Fisherman,
}

/// What an NPC does when a player talks to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NpcRole {
    Shop(&'static [ItemKind]),
    Bank,
    Dialog,
}

impl NpcRole {
    pub fn name(&self) -> &'static str {
        match self {
            NpcRole::Shop(_) => "shop",
            NpcRole::Bank => "bank",
            NpcRole::Dialog => "dialog",
        }
    }
}

/// Static data for one NPC kind
#[derive(Debug, Clone)]
pub struct NpcDefinition {
    pub kind: NpcKind,
    pub name: &'static str,
    pub role: NpcRole,
    pub dialog: &'static str,
    pub color: &'static str,
    pub emoji: &'static str,
}

const MERCHANT_STOCK: &[ItemKind] = &[
    ItemKind::IronSword,
    ItemKind::BronzeDagger,
    ItemKind::LeatherArmor,
    ItemKind::IronShield,
    ItemKind::Bread,
    ItemKind::HealthPotion,
    ItemKind::Pickaxe,
];

const BLACKSMITH_STOCK: &[ItemKind] = &[
    ItemKind::IronSword,
    ItemKind::SteelSword,
    ItemKind::IronHelmet,
    ItemKind::IronBoots,
    ItemKind::IronShield,
    ItemKind::Pickaxe,
];

const FISHERMAN_STOCK: &[ItemKind] = &[ItemKind::FishingRod, ItemKind::RawFish, ItemKind::Bread];

impl NpcKind {
    pub fn definition(self) -> NpcDefinition {
        match self {
            NpcKind::Merchant => NpcDefinition {
                kind: self,
                name: "Gareth the Merchant",
                role: NpcRole::Shop(MERCHANT_STOCK),
                dialog: "Welcome to my shop, adventurer! I have fine goods.",
                color: "#4488cc",
                emoji: "🧔",
            },
            NpcKind::Banker => NpcDefinition {
                kind: self,
                name: "Millicent the Banker",
                role: NpcRole::Bank,
                dialog: "Welcome to the bank. Your items are safe with us.",
                color: "#ddaa44",
                emoji: "👩",
            },
            NpcKind::Guard => NpcDefinition {
                kind: self,
                name: "Town Guard",
                role: NpcRole::Dialog,
                dialog: "Stay out of trouble, citizen.",
                color: "#558844",
                emoji: "💂",
            },
            NpcKind::Blacksmith => NpcDefinition {
                kind: self,
                name: "Erik the Blacksmith",
                role: NpcRole::Shop(BLACKSMITH_STOCK),
                dialog: "Looking for quality arms and armor? You've come to the right place!",
                color: "#cc6633",
                emoji: "🧑",
            },
            NpcKind::Fisherman => NpcDefinition {
                kind: self,
                name: "Old Tom the Fisherman",
                role: NpcRole::Shop(FISHERMAN_STOCK),
                dialog: "Fishing is the most peaceful trade there is.",
                color: "#226688",
                emoji: "🧓",
            },
        }
    }
}

/// Where each NPC lives in the standard world
pub const NPC_PLACEMENTS: [(NpcKind, TilePos); 5] = [
    (NpcKind::Merchant, TilePos::new(23, 9)),
    (NpcKind::Blacksmith, TilePos::new(23, 16)),
    (NpcKind::Banker, TilePos::new(17, 15)),
    (NpcKind::Guard, TilePos::new(19, 7)),
    (NpcKind::Fisherman, TilePos::new(3, 17)),
];

/// One line of a shop listing
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopEntry {
    pub def_key: ItemKind,
    pub name: &'static str,
    pub emoji: &'static str,
    pub color: &'static str,
    #[serde(rename = "type")]
    pub category: ItemCategory,
    pub buy_price: u64,
    pub sell_price: u64,
    pub stock: u32,
}

impl ShopEntry {
    fn new(kind: ItemKind) -> Self {
        let def = kind.definition();
        Self {
            def_key: kind,
            name: def.name,
            emoji: def.emoji,
            color: def.color,
            category: def.category,
            buy_price: def.buy_price(),
            sell_price: def.sell_price(),
            stock: SHOP_STOCK,
        }
    }
}

/// Snapshot every client may see
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NpcPublic {
    pub id: Uuid,
    pub def_key: NpcKind,
    pub name: &'static str,
    #[serde(rename = "type")]
    pub role: &'static str,
    pub color: &'static str,
    pub emoji: &'static str,
    pub dialog: &'static str,
    pub col: i32,
    pub row: i32,
    pub x: f64,
    pub y: f64,
    pub direction: Direction,
    pub moving: bool,
    pub shop_items: Vec<ShopEntry>,
}

/// A non-player character
#[derive(Debug)]
pub struct Npc {
    pub id: Uuid,
    pub definition: NpcDefinition,
    pub home: TilePos,
    movement: Movement,
    idle_ms: f64,
    wander_interval_ms: f64,
}

impl Npc {
    /// Create an NPC at its home tile
    pub fn new<R: Rng + ?Sized>(kind: NpcKind, home: TilePos, config: &GameplayConfig, rng: &mut R) -> Self {
        Self {
            id: Uuid::new_v4(),
            definition: kind.definition(),
            home,
            movement: Movement::new(home, config.npc_speed),
            idle_ms: 0.0,
            wander_interval_ms: next_interval(config, rng),
        }
    }

    pub fn kind(&self) -> NpcKind {
        self.definition.kind
    }

    /// Items this NPC sells, if it runs a shop
    pub fn shop_stock(&self) -> Option<&'static [ItemKind]> {
        match self.definition.role {
            NpcRole::Shop(stock) => Some(stock),
            _ => None,
        }
    }

    pub fn is_banker(&self) -> bool {
        self.definition.role == NpcRole::Bank
    }

    /// Accumulate idle time and, when due, start walking somewhere near
    /// home. Returns whether a new walk began.
    pub fn wander<R: Rng + ?Sized>(
        &mut self,
        delta_ms: f64,
        map: &TileMap,
        config: &GameplayConfig,
        limits: PathLimits,
        rng: &mut R,
    ) -> bool {
        if self.movement.is_moving() {
            return false;
        }

        self.idle_ms += delta_ms;
        if self.idle_ms < self.wander_interval_ms {
            return false;
        }
        self.idle_ms = 0.0;
        self.wander_interval_ms = next_interval(config, rng);

        let radius = config.wander_radius;
        for _ in 0..config.wander_attempts {
            let target = TilePos::new(
                self.home.col + rng.gen_range(-radius..=radius),
                self.home.row + rng.gen_range(-radius..=radius),
            );
            if !map.is_walkable(target) {
                continue;
            }

            let path = find_path(map, self.movement.tile(), target, limits);
            if path.len() > 1 {
                trace!(npc = %self.definition.name, to = %target, "NPC wandering");
                self.movement.set_path_from(path, 1);
                return true;
            }
            return false;
        }
        false
    }

    pub fn public(&self) -> NpcPublic {
        let tile = self.movement.tile();
        let (x, y) = self.movement.position();
        NpcPublic {
            id: self.id,
            def_key: self.definition.kind,
            name: self.definition.name,
            role: self.definition.role.name(),
            color: self.definition.color,
            emoji: self.definition.emoji,
            dialog: self.definition.dialog,
            col: tile.col,
            row: tile.row,
            x,
            y,
            direction: self.movement.direction(),
            moving: self.movement.is_moving(),
            shop_items: self
                .shop_stock()
                .unwrap_or(&[])
                .iter()
                .map(|kind| ShopEntry::new(*kind))
                .collect(),
        }
    }
}

impl Movable for Npc {
    fn movement(&self) -> &Movement {
        &self.movement
    }

    fn movement_mut(&mut self) -> &mut Movement {
        &mut self.movement
    }
}

fn next_interval<R: Rng + ?Sized>(config: &GameplayConfig, rng: &mut R) -> f64 {
    let jitter = if config.wander_jitter_ms > 0 {
        rng.gen_range(0..config.wander_jitter_ms)
    } else {
        0
    };
    (config.wander_min_ms + jitter) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::map::{TileGrid, TileKind};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Arc;

    fn grass_map() -> TileMap {
        TileMap::new(Arc::new(TileGrid::filled(20, 20, TileKind::Grass).unwrap()))
    }

    #[test]
    fn test_placements_are_walkable() {
        let map = TileMap::new(Arc::new(TileGrid::standard().unwrap()));
        for (kind, tile) in NPC_PLACEMENTS {
            assert!(map.is_walkable(tile), "{:?} at {}", kind, tile);
        }
    }

    #[test]
    fn test_roles() {
        let mut rng = StdRng::seed_from_u64(1);
        let config = GameplayConfig::default();

        let merchant = Npc::new(NpcKind::Merchant, TilePos::new(1, 1), &config, &mut rng);
        assert!(merchant.shop_stock().unwrap().contains(&ItemKind::Pickaxe));
        assert!(!merchant.is_banker());

        let banker = Npc::new(NpcKind::Banker, TilePos::new(1, 1), &config, &mut rng);
        assert!(banker.is_banker());
        assert!(banker.shop_stock().is_none());

        let json = serde_json::to_value(merchant.public()).unwrap();
        assert_eq!(json["type"], "shop");
        assert_eq!(json["defKey"], "MERCHANT");
        assert_eq!(json["shopItems"][0]["buyPrice"], 225);
        assert_eq!(json["shopItems"][0]["sellPrice"], 75);
    }

    #[test]
    fn test_wander_waits_for_interval() {
        let mut rng = StdRng::seed_from_u64(7);
        let config = GameplayConfig::default();
        let map = grass_map();
        let home = TilePos::new(10, 10);
        let mut npc = Npc::new(NpcKind::Guard, home, &config, &mut rng);

        // Never before the minimum interval
        assert!(!npc.wander(2_999.0, &map, &config, PathLimits::default(), &mut rng));
        assert!(!npc.is_moving());

        // Always by min + jitter; on open grass a target is found unless it
        // lands on the NPC's own tile every attempt
        let mut started = false;
        for _ in 0..20 {
            if npc.wander(4_000.0, &map, &config, PathLimits::default(), &mut rng) {
                started = true;
                break;
            }
        }
        assert!(started);
        assert!(npc.is_moving());

        let remaining = npc.movement().remaining();
        assert!(remaining[0].is_adjacent(home));
        let end = *remaining.last().unwrap();
        assert!(end.manhattan(home) <= 6);
    }

    #[test]
    fn test_wander_stays_home_when_boxed_in() {
        let mut rng = StdRng::seed_from_u64(3);
        let config = GameplayConfig::default();
        let grid = TileGrid::filled(9, 9, TileKind::Water)
            .unwrap()
            .with_tiles(&[(TilePos::new(4, 4), TileKind::Grass)])
            .unwrap();
        let map = TileMap::new(Arc::new(grid));
        let mut npc = Npc::new(NpcKind::Guard, TilePos::new(4, 4), &config, &mut rng);

        for _ in 0..10 {
            assert!(!npc.wander(10_000.0, &map, &config, PathLimits::default(), &mut rng));
        }
        assert_eq!(npc.tile(), TilePos::new(4, 4));
    }

    #[test]
    fn test_wander_walks_home_region() {
        let mut rng = StdRng::seed_from_u64(11);
        let config = GameplayConfig::default();
        let map = grass_map();
        let home = TilePos::new(10, 10);
        let mut npc = Npc::new(NpcKind::Guard, home, &config, &mut rng);

        for _ in 0..2_000 {
            npc.wander(50.0, &map, &config, PathLimits::default(), &mut rng);
            npc.advance(50.0);
            let tile = npc.tile();
            assert!(tile.col.abs_diff(home.col) <= 3 && tile.row.abs_diff(home.row) <= 3);
        }
    }
}
