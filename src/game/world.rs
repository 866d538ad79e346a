//! World module
//!
//! The single-writer world aggregate:
//! - Owns the map, players, NPCs, respawn trackers, chat and environment
//! - Advances everything once per tick from the measured delta
//! - Replays deferred actions once their players arrive
//! - Collects changed entities for throttled world updates
//!
//! Nothing here blocks or awaits; the scheduler drives it.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, trace};
use uuid::Uuid;

use crate::config::{GameplayConfig, ServerConfig};
use crate::error::{GameError, Result};
use crate::game::action::{gate, ActionState, Approach, Gate, PendingAction, TargetKind};
use crate::game::chat::ChatLog;
use crate::game::environment::Environment;
use crate::game::map::{TileGrid, TileMap, TilePos};
use crate::game::movement::Movable;
use crate::game::npc::{Npc, NpcKind, NPC_PLACEMENTS};
use crate::game::pathfinding::PathLimits;
use crate::game::player::{Player, PlayerRegistry};
use crate::game::respawn::{standard_zones, RespawnTracker, ResourceZone, WorldItemPublic};
use crate::game::sync::{DeltaAccumulator, SyncThrottle};
use crate::protocol::{Outbound, ServerMessage, TileChange, WorldSnapshot};

/// Default simulation tick in milliseconds
pub const TICK_RATE_MS: u64 = 50;

/// Default world update interval in milliseconds
pub const SYNC_INTERVAL_MS: u64 = 100;

/// Where new players appear
pub const SPAWN_POINT: TilePos = TilePos::new(19, 10);

/// World settings
#[derive(Debug, Clone)]
pub struct WorldSettings {
    /// Server name shown to players
    pub name: String,
    /// Tick rate in milliseconds
    pub tick_rate_ms: u64,
    /// Minimum time between world updates
    pub sync_interval_ms: u64,
    /// RNG seed; random when unset
    pub seed: Option<u64>,
    /// Base tile grid; the standard map when unset
    pub grid: Option<Arc<TileGrid>>,
    /// Resource zones, each filled at startup
    pub zones: Vec<ResourceZone>,
    /// NPCs and their home tiles
    pub npcs: Vec<(NpcKind, TilePos)>,
    /// Tile new players spawn around
    pub spawn_point: TilePos,
    /// Ranges, speeds and search limits
    pub gameplay: GameplayConfig,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            name: "Tileworld".to_string(),
            tick_rate_ms: TICK_RATE_MS,
            sync_interval_ms: SYNC_INTERVAL_MS,
            seed: None,
            grid: None,
            zones: standard_zones(),
            npcs: NPC_PLACEMENTS.to_vec(),
            spawn_point: SPAWN_POINT,
            gameplay: GameplayConfig::default(),
        }
    }
}

impl WorldSettings {
    /// Settings taken from the server configuration
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            name: config.server_name.clone(),
            tick_rate_ms: config.tick_rate_ms,
            sync_interval_ms: config.sync_interval_ms,
            seed: config.world_seed,
            gameplay: config.gameplay.clone(),
            ..Default::default()
        }
    }

    /// Set the world name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Use a fixed RNG seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Replace the standard map
    pub fn with_map(mut self, grid: TileGrid) -> Self {
        self.grid = Some(Arc::new(grid));
        self
    }

    /// Replace the resource zones
    pub fn with_zones(mut self, zones: Vec<ResourceZone>) -> Self {
        self.zones = zones;
        self
    }

    /// Replace the NPC placements
    pub fn with_npcs(mut self, npcs: Vec<(NpcKind, TilePos)>) -> Self {
        self.npcs = npcs;
        self
    }

    /// Set the spawn point
    pub fn with_spawn_point(mut self, spawn_point: TilePos) -> Self {
        self.spawn_point = spawn_point;
        self
    }

    /// Set the gameplay tuning
    pub fn with_gameplay(mut self, gameplay: GameplayConfig) -> Self {
        self.gameplay = gameplay;
        self
    }
}

/// What one tick changed
#[derive(Debug, Default)]
pub struct TickReport {
    /// Tick number
    pub tick: u64,
    /// Players that moved or whose vitals changed
    pub players: Vec<Uuid>,
    /// NPCs that moved
    pub npcs: Vec<Uuid>,
    /// Whether any world item spawned
    pub items_changed: bool,
    /// Messages produced by replayed actions
    pub outbound: Vec<Outbound>,
}

impl TickReport {
    pub fn is_quiet(&self) -> bool {
        self.players.is_empty() && self.npcs.is_empty() && !self.items_changed && self.outbound.is_empty()
    }
}

/// The game world
pub struct World {
    /// World settings
    pub settings: WorldSettings,
    pub(crate) map: TileMap,
    pub(crate) players: PlayerRegistry,
    pub(crate) npcs: Vec<Npc>,
    pub(crate) trackers: Vec<RespawnTracker>,
    pub(crate) environment: Environment,
    pub(crate) chat: ChatLog,
    pub(crate) rng: StdRng,
    pub(crate) limits: PathLimits,
    pub(crate) sync: DeltaAccumulator,
    throttle: SyncThrottle,
    /// Accumulated simulated time
    elapsed_ms: f64,
    tick: u64,
}

impl World {
    /// Create the standard world
    pub fn new() -> Result<Self> {
        Self::with_settings(WorldSettings::default())
    }

    /// Create a world with custom settings
    pub fn with_settings(settings: WorldSettings) -> Result<Self> {
        info!(
            name = %settings.name,
            seed = ?settings.seed,
            zones = settings.zones.len(),
            npcs = settings.npcs.len(),
            "Creating game world"
        );

        let grid = match &settings.grid {
            Some(grid) => Arc::clone(grid),
            None => Arc::new(TileGrid::standard()?),
        };
        let map = TileMap::new(grid);

        let mut rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let gameplay = &settings.gameplay;
        let npcs = settings
            .npcs
            .iter()
            .map(|(kind, home)| Npc::new(*kind, *home, gameplay, &mut rng))
            .collect();

        let mut trackers: Vec<RespawnTracker> = settings
            .zones
            .iter()
            .cloned()
            .map(RespawnTracker::new)
            .collect();
        for tracker in &mut trackers {
            tracker.populate(&map, &mut rng, gameplay.spawn_attempts, 0);
        }

        Ok(Self {
            limits: PathLimits::from(gameplay),
            throttle: SyncThrottle::new(settings.sync_interval_ms),
            settings,
            map,
            players: PlayerRegistry::new(),
            npcs,
            trackers,
            environment: Environment::new(),
            chat: ChatLog::new(),
            rng,
            sync: DeltaAccumulator::new(),
            elapsed_ms: 0.0,
            tick: 0,
        })
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// World clock in milliseconds
    pub fn now_ms(&self) -> u64 {
        self.elapsed_ms as u64
    }

    pub fn map(&self) -> &TileMap {
        &self.map
    }

    pub fn players(&self) -> &PlayerRegistry {
        &self.players
    }

    pub fn player(&self, id: &Uuid) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn player_by_session(&self, session_id: u64) -> Option<&Player> {
        self.players.by_session(session_id)
    }

    pub fn npcs(&self) -> &[Npc] {
        &self.npcs
    }

    pub fn npc(&self, id: &Uuid) -> Option<&Npc> {
        self.npcs.iter().find(|npc| npc.id == *id)
    }

    pub fn trackers(&self) -> &[RespawnTracker] {
        &self.trackers
    }

    pub fn tracker(&self, zone: &str) -> Option<&RespawnTracker> {
        self.trackers.iter().find(|t| t.zone().key == zone)
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn npc_count(&self) -> usize {
        self.npcs.len()
    }

    /// Live world items across all zones
    pub fn item_count(&self) -> usize {
        self.trackers.iter().map(|t| t.items().len()).sum()
    }

    pub fn items_public(&self) -> Vec<WorldItemPublic> {
        self.trackers
            .iter()
            .flat_map(|t| t.items())
            .map(|item| item.public())
            .collect()
    }

    /// Full world state for a joining player
    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            players: self.players.iter().map(Player::public).collect(),
            npcs: self.npcs.iter().map(Npc::public).collect(),
            items: self.items_public(),
            chat_history: self.chat.recent(),
            environment: self.environment.state(),
            tiles: self
                .map
                .overlay()
                .map(|(pos, kind)| TileChange::new(pos, Some(kind)))
                .collect(),
        }
    }

    /// Advance the world by `delta_ms` of wall-clock time.
    ///
    /// Order: environment, NPC wander, NPC movement, player movement and
    /// vitals, deferred action replay, then respawns.
    pub fn tick(&mut self, delta_ms: f64) -> TickReport {
        self.tick += 1;
        self.elapsed_ms += delta_ms;
        let now = self.now_ms();
        let mut report = TickReport {
            tick: self.tick,
            ..Default::default()
        };

        if self.environment.advance(delta_ms) {
            debug!(day = self.environment.day(), "A new day begins");
        }

        let gameplay = &self.settings.gameplay;
        for npc in &mut self.npcs {
            npc.wander(delta_ms, &self.map, gameplay, self.limits, &mut self.rng);
        }
        for npc in &mut self.npcs {
            if npc.advance(delta_ms) {
                report.npcs.push(npc.id);
            }
        }

        for player in self.players.iter_mut() {
            let moved = player.advance(delta_ms);
            let starving = player.tick_vitals(delta_ms);
            if moved || starving {
                report.players.push(player.id);
            }
        }

        self.replay_arrivals(&mut report.outbound);

        let attempts = self.settings.gameplay.spawn_attempts;
        for tracker in &mut self.trackers {
            let spawned = tracker.tick(now, &self.map, &mut self.rng, attempts);
            if !spawned.is_empty() {
                trace!(zone = %tracker.zone().key, count = spawned.len(), "Resources respawned");
                report.items_changed = true;
            }
        }

        self.sync.mark_players(report.players.iter().copied());
        self.sync.mark_npcs(report.npcs.iter().copied());
        if report.items_changed {
            self.sync.mark_items();
        }

        if self.tick % 1000 == 0 {
            debug!(
                tick = self.tick,
                players = self.players.len(),
                items = self.item_count(),
                "World tick milestone"
            );
        }

        report
    }

    /// Run the pending action of every player whose walk just ended; a
    /// target that moved out of range fails instead of being chased
    fn replay_arrivals(&mut self, out: &mut Vec<Outbound>) {
        let arrived: Vec<Uuid> = self
            .players
            .iter()
            .filter(|p| matches!(p.action, ActionState::Moving { .. }) && !p.is_moving())
            .map(|p| p.id)
            .collect();

        for id in arrived {
            let Some(player) = self.players.get_mut(&id) else {
                continue;
            };
            let session_id = player.session_id;
            let Some(action) = player.action.finish() else {
                continue;
            };

            debug!(player = %player.name, action = action.label(), "Replaying deferred action");
            if let Err(e) = self.submit(id, action, Approach::Stay, out) {
                out.push(Outbound::to(session_id, ServerMessage::failure(e.to_string())));
            }
        }
    }

    /// World update for everything changed since the last one, if the
    /// sync interval has passed
    pub fn sync_update(&mut self) -> Option<Outbound> {
        if self.sync.is_empty() || !self.throttle.ready(self.now_ms()) {
            return None;
        }

        let dirty = self.sync.take();
        let players = dirty
            .players
            .iter()
            .filter_map(|id| self.players.get(id))
            .map(Player::public)
            .collect();
        let npcs = self
            .npcs
            .iter()
            .filter(|npc| dirty.npcs.contains(&npc.id))
            .map(Npc::public)
            .collect();

        Some(Outbound::broadcast(ServerMessage::WorldUpdate {
            players,
            npcs,
            items: self.items_public(),
        }))
    }

    /// Target tile and allowed distance for a gated action
    fn action_target(&self, action: &PendingAction) -> std::result::Result<(TilePos, u32), GameError> {
        let gameplay = &self.settings.gameplay;
        match action {
            PendingAction::Interact {
                target_id,
                kind: TargetKind::Npc,
            }
            | PendingAction::Trade {
                npc_id: target_id, ..
            }
            | PendingAction::Bank {
                npc_id: target_id, ..
            } => self
                .npc(target_id)
                .map(|npc| (npc.tile(), gameplay.interaction_range))
                .ok_or(GameError::UnknownTarget),
            PendingAction::Interact {
                target_id,
                kind: TargetKind::Item,
            } => self
                .trackers
                .iter()
                .find_map(|t| t.get(target_id))
                .map(|item| (item.tile, gameplay.pickup_range))
                .ok_or(GameError::UnknownTarget),
            PendingAction::Gather { zone } => self
                .tracker(zone)
                .map(|t| {
                    let zone = t.zone();
                    (zone.center, zone.radius.max(0) as u32 + gameplay.gather_slack)
                })
                .ok_or(GameError::UnknownZone),
        }
    }

    /// Run `action` now if the player is close enough, otherwise walk
    /// there with it pending when `approach` allows
    pub(crate) fn submit(
        &mut self,
        player_id: Uuid,
        action: PendingAction,
        approach: Approach,
        out: &mut Vec<Outbound>,
    ) -> std::result::Result<(), GameError> {
        let (target, range) = self.action_target(&action)?;
        let player = self.players.get_mut(&player_id).ok_or(GameError::NotJoined)?;
        let session_id = player.session_id;

        match gate(player, &self.map, target, range, self.limits, action, approach)? {
            Gate::Ready(action) => self.perform(player_id, action, out),
            Gate::Deferred(path) => {
                self.sync.mark_players([player_id]);
                out.push(Outbound::to(session_id, ServerMessage::MoveAck { path }));
                Ok(())
            }
        }
    }

    /// Place a new player near the spawn point
    pub(crate) fn spawn_tile(&mut self) -> TilePos {
        let spawn = self.settings.spawn_point;
        let jittered = TilePos::new(
            spawn.col + self.rng.gen_range(-1..=1),
            spawn.row + self.rng.gen_range(-1..=1),
        );
        if self.map.is_walkable(jittered) {
            jittered
        } else {
            spawn
        }
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("name", &self.settings.name)
            .field("tick", &self.tick)
            .field("now_ms", &self.now_ms())
            .field("players", &self.players.len())
            .field("npcs", &self.npcs.len())
            .field("items", &self.item_count())
            .finish()
    }
}
