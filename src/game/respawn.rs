//! Resource respawn module
//!
//! Each resource zone owns a bounded pool of world items:
//! - Items spawn on random tiles inside the zone's bounding square
//! - Gathering removes an item and starts a cooldown
//! - When a cooldown expires, one replacement spawns (if there is room)
//!
//! Times are milliseconds on the world clock.

use rand::Rng;
use serde::Serialize;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::game::item::ItemKind;
use crate::game::map::{TileMap, TilePos};
use crate::game::player::Skill;

/// A named region that produces gatherable items
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceZone {
    pub key: String,
    pub center: TilePos,
    pub radius: i32,
    pub items: Vec<ItemKind>,
    pub cooldown_ms: u64,
    pub required_tool: Option<ItemKind>,
    pub skill: Option<Skill>,
    pub xp_per_gather: u64,
}

impl ResourceZone {
    pub fn new(key: impl Into<String>, center: TilePos, radius: i32, items: Vec<ItemKind>, cooldown_ms: u64) -> Self {
        Self {
            key: key.into(),
            center,
            radius,
            items,
            cooldown_ms,
            required_tool: None,
            skill: None,
            xp_per_gather: 0,
        }
    }

    /// Builder method - require a tool to gather
    pub fn with_tool(mut self, tool: ItemKind) -> Self {
        self.required_tool = Some(tool);
        self
    }

    /// Builder method - experience per gather
    pub fn with_reward(mut self, skill: Option<Skill>, xp: u64) -> Self {
        self.skill = skill;
        self.xp_per_gather = xp;
        self
    }

    /// Live item cap: `radius * 2`
    pub fn max_items(&self) -> usize {
        (self.radius.max(0) * 2) as usize
    }
}

/// The zones of the standard world
pub fn standard_zones() -> Vec<ResourceZone> {
    vec![
        ResourceZone::new(
            "IRON_MINE",
            TilePos::new(5, 5),
            3,
            vec![ItemKind::IronOre, ItemKind::Coal],
            8_000,
        )
        .with_tool(ItemKind::Pickaxe)
        .with_reward(Some(Skill::Mining), 15),
        ResourceZone::new("GOLD_MINE", TilePos::new(8, 3), 2, vec![ItemKind::GoldOre], 15_000)
            .with_tool(ItemKind::Pickaxe)
            .with_reward(Some(Skill::Mining), 35),
        ResourceZone::new("FISHING_SPOT", TilePos::new(2, 18), 2, vec![ItemKind::RawFish], 6_000)
            .with_tool(ItemKind::FishingRod)
            .with_reward(Some(Skill::Fishing), 12),
        ResourceZone::new("GRAVEYARD", TilePos::new(34, 26), 3, vec![ItemKind::Bones], 10_000)
            .with_reward(None, 5),
    ]
}

/// A resource lying on the map
#[derive(Debug, Clone, PartialEq)]
pub struct WorldItem {
    pub id: Uuid,
    pub kind: ItemKind,
    pub tile: TilePos,
    pub zone: String,
    pub spawned_at_ms: u64,
}

/// Snapshot every client may see
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldItemPublic {
    pub id: Uuid,
    pub def_key: ItemKind,
    pub name: &'static str,
    pub emoji: &'static str,
    pub color: &'static str,
    pub col: i32,
    pub row: i32,
}

impl WorldItem {
    pub fn public(&self) -> WorldItemPublic {
        let def = self.kind.definition();
        WorldItemPublic {
            id: self.id,
            def_key: self.kind,
            name: def.name,
            emoji: def.emoji,
            color: def.color,
            col: self.tile.col,
            row: self.tile.row,
        }
    }
}

/// Respawn tracker statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerStats {
    pub live: usize,
    pub cooling: usize,
    pub spawned_total: u64,
    pub removed_total: u64,
    pub failed_spawns: u64,
}

/// Live items and pending respawns for one zone
#[derive(Debug, Clone)]
pub struct RespawnTracker {
    zone: ResourceZone,
    /// Live items in spawn order
    items: Vec<WorldItem>,
    /// (removed item, respawn deadline) in removal order
    cooldowns: Vec<(Uuid, u64)>,
    spawned_total: u64,
    removed_total: u64,
    failed_spawns: u64,
}

impl RespawnTracker {
    pub fn new(zone: ResourceZone) -> Self {
        Self {
            zone,
            items: Vec::new(),
            cooldowns: Vec::new(),
            spawned_total: 0,
            removed_total: 0,
            failed_spawns: 0,
        }
    }

    pub fn zone(&self) -> &ResourceZone {
        &self.zone
    }

    pub fn items(&self) -> &[WorldItem] {
        &self.items
    }

    pub fn max_items(&self) -> usize {
        self.zone.max_items()
    }

    pub fn pending_cooldowns(&self) -> usize {
        self.cooldowns.len()
    }

    /// Earliest pending respawn deadline
    pub fn next_respawn_at(&self) -> Option<u64> {
        self.cooldowns.iter().map(|(_, at)| *at).min()
    }

    pub fn get(&self, id: &Uuid) -> Option<&WorldItem> {
        self.items.iter().find(|item| item.id == *id)
    }

    /// Fill the pool at world start; returns what spawned
    pub fn populate<R: Rng + ?Sized>(&mut self, map: &TileMap, rng: &mut R, attempts: u32, now_ms: u64) -> Vec<WorldItem> {
        let spawned: Vec<_> = (0..self.max_items())
            .filter_map(|_| self.spawn_item(map, rng, attempts, now_ms))
            .collect();
        debug!(zone = %self.zone.key, count = spawned.len(), "Zone populated");
        spawned
    }

    /// Try to place one random item kind on a random tile in the zone.
    ///
    /// Mountain and tree tiles are accepted even though nobody can walk
    /// on them. Gives up after `attempts` samples.
    pub fn spawn_item<R: Rng + ?Sized>(&mut self, map: &TileMap, rng: &mut R, attempts: u32, now_ms: u64) -> Option<WorldItem> {
        if self.zone.items.is_empty() {
            return None;
        }
        let kind = self.zone.items[rng.gen_range(0..self.zone.items.len())];
        let radius = self.zone.radius;

        for _ in 0..attempts {
            let tile = TilePos::new(
                self.zone.center.col + rng.gen_range(-radius..=radius),
                self.zone.center.row + rng.gen_range(-radius..=radius),
            );
            if !map.can_hold_resource(tile) {
                continue;
            }

            let item = WorldItem {
                id: Uuid::new_v4(),
                kind,
                tile,
                zone: self.zone.key.clone(),
                spawned_at_ms: now_ms,
            };
            trace!(zone = %self.zone.key, item = %kind, tile = %tile, "Resource spawned");
            self.items.push(item.clone());
            self.spawned_total += 1;
            return Some(item);
        }

        self.failed_spawns += 1;
        None
    }

    /// Clear expired cooldowns, spawning one replacement per expiry while
    /// the pool is below its cap. Returns the new items.
    pub fn tick<R: Rng + ?Sized>(&mut self, now_ms: u64, map: &TileMap, rng: &mut R, attempts: u32) -> Vec<WorldItem> {
        let mut spawned = Vec::new();
        let mut i = 0;
        while i < self.cooldowns.len() {
            if now_ms < self.cooldowns[i].1 {
                i += 1;
                continue;
            }
            self.cooldowns.remove(i);
            if self.items.len() < self.max_items() {
                if let Some(item) = self.spawn_item(map, rng, attempts, now_ms) {
                    spawned.push(item);
                }
            }
        }
        spawned
    }

    /// The item a gather would yield (oldest first)
    pub fn peek_first(&self) -> Option<&WorldItem> {
        self.items.first()
    }

    /// Gather the oldest live item
    pub fn take_first(&mut self, now_ms: u64) -> Option<WorldItem> {
        let id = self.items.first()?.id;
        self.remove_item(&id, now_ms)
    }

    /// Remove a specific item and schedule its respawn
    pub fn remove_item(&mut self, id: &Uuid, now_ms: u64) -> Option<WorldItem> {
        let index = self.items.iter().position(|item| item.id == *id)?;
        let item = self.items.remove(index);
        self.cooldowns.push((item.id, now_ms + self.zone.cooldown_ms));
        self.removed_total += 1;
        Some(item)
    }

    pub fn stats(&self) -> TrackerStats {
        TrackerStats {
            live: self.items.len(),
            cooling: self.cooldowns.len(),
            spawned_total: self.spawned_total,
            removed_total: self.removed_total,
            failed_spawns: self.failed_spawns,
        }
    }
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

    fn ore_zone() -> ResourceZone {
        ResourceZone::new("ORE", TilePos::new(5, 5), 3, vec![ItemKind::IronOre], 8_000)
    }

    #[test]
    fn test_standard_zones() {
        let zones = standard_zones();
        assert_eq!(zones.len(), 4);
        let iron = &zones[0];
        assert_eq!(iron.key, "IRON_MINE");
        assert_eq!(iron.max_items(), 6);
        assert_eq!(iron.required_tool, Some(ItemKind::Pickaxe));
        assert_eq!(zones[3].required_tool, None);
        assert_eq!(zones[3].skill, None);
    }

    #[test]
    fn test_populate_fills_to_max() {
        let map = grass_map();
        let mut rng = StdRng::seed_from_u64(42);
        let mut tracker = RespawnTracker::new(ore_zone());

        let spawned = tracker.populate(&map, &mut rng, 20, 0);
        assert_eq!(spawned.len(), 6);
        assert_eq!(tracker.items().len(), 6);
        for item in tracker.items() {
            assert!(item.tile.col.abs_diff(5) <= 3 && item.tile.row.abs_diff(5) <= 3);
            assert_eq!(item.zone, "ORE");
        }
    }

    #[test]
    fn test_spawn_accepts_mountains_but_not_water() {
        let mut rng = StdRng::seed_from_u64(5);

        let rocks = TileMap::new(Arc::new(TileGrid::filled(12, 12, TileKind::Mountain).unwrap()));
        let mut tracker = RespawnTracker::new(ore_zone());
        assert!(tracker.spawn_item(&rocks, &mut rng, 20, 0).is_some());

        let lake = TileMap::new(Arc::new(TileGrid::filled(12, 12, TileKind::Water).unwrap()));
        let mut tracker = RespawnTracker::new(ore_zone());
        assert!(tracker.spawn_item(&lake, &mut rng, 20, 0).is_none());
        assert_eq!(tracker.stats().failed_spawns, 1);
    }

    #[test]
    fn test_take_first_is_fifo() {
        let map = grass_map();
        let mut rng = StdRng::seed_from_u64(1);
        let mut tracker = RespawnTracker::new(ore_zone());
        tracker.populate(&map, &mut rng, 20, 0);

        let oldest = tracker.items()[0].id;
        let second = tracker.items()[1].id;
        assert_eq!(tracker.take_first(100).unwrap().id, oldest);
        assert_eq!(tracker.peek_first().unwrap().id, second);
        assert_eq!(tracker.next_respawn_at(), Some(8_100));
    }

    #[test]
    fn test_cooldown_respawn_timing() {
        let map = grass_map();
        let mut rng = StdRng::seed_from_u64(9);
        let mut tracker = RespawnTracker::new(ore_zone());
        tracker.populate(&map, &mut rng, 20, 0);

        let gathered = tracker.take_first(1_000).unwrap();
        assert_eq!(tracker.items().len(), 5);
        assert!(tracker.get(&gathered.id).is_none());

        assert!(tracker.tick(8_999, &map, &mut rng, 20).is_empty());
        assert_eq!(tracker.items().len(), 5);
        assert_eq!(tracker.pending_cooldowns(), 1);

        let spawned = tracker.tick(9_000, &map, &mut rng, 20);
        assert_eq!(spawned.len(), 1);
        assert_ne!(spawned[0].id, gathered.id);
        assert_eq!(tracker.items().len(), 6);
        assert_eq!(tracker.pending_cooldowns(), 0);

        // Nothing left to respawn
        assert!(tracker.tick(50_000, &map, &mut rng, 20).is_empty());
    }

    #[test]
    fn test_expiry_at_cap_spawns_nothing() {
        let map = grass_map();
        let mut rng = StdRng::seed_from_u64(2);
        let mut tracker = RespawnTracker::new(ore_zone());
        tracker.populate(&map, &mut rng, 20, 0);

        let id = tracker.items()[2].id;
        tracker.remove_item(&id, 0).unwrap();
        tracker.spawn_item(&map, &mut rng, 20, 0).unwrap();
        assert_eq!(tracker.items().len(), 6);

        assert!(tracker.tick(8_000, &map, &mut rng, 20).is_empty());
        assert_eq!(tracker.pending_cooldowns(), 0);
    }

    #[test]
    fn test_depleted_zone() {
        let mut tracker = RespawnTracker::new(ore_zone());
        assert!(tracker.peek_first().is_none());
        assert!(tracker.take_first(0).is_none());
        assert!(tracker.remove_item(&Uuid::new_v4(), 0).is_none());
        assert_eq!(tracker.pending_cooldowns(), 0);
    }

    #[test]
    fn test_item_snapshot() {
        let item = WorldItem {
            id: Uuid::new_v4(),
            kind: ItemKind::Coal,
            tile: TilePos::new(3, 4),
            zone: "IRON_MINE".to_string(),
            spawned_at_ms: 0,
        };
        let json = serde_json::to_value(item.public()).unwrap();
        assert_eq!(json["defKey"], "COAL");
        assert_eq!(json["col"], 3);
        assert_eq!(json["row"], 4);
    }
}
