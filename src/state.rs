//! Application state module
//!
//! Contains the shared state used across all server connections.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

use crate::config::ServerConfig;
use crate::error::Result;
use crate::game::scheduler::{WorldHandle, WorldRunner, WorldStatus};
use crate::game::world::{World, WorldSettings};
use crate::net::session::SessionManager;

/// Application state shared across all connections
pub struct AppState {
    /// Server configuration
    pub config: ServerConfig,
    /// Session manager for tracking connected clients
    pub sessions: Arc<SessionManager>,
    /// Sender into the world actor
    pub world: WorldHandle,
    /// Counters published by the world actor
    pub world_status: Arc<WorldStatus>,
    /// Shutdown signal sender
    pub shutdown_tx: broadcast::Sender<()>,
}

impl AppState {
    /// Build the world and the shared state.
    ///
    /// The returned runner must be spawned for the world to tick.
    pub fn new(config: ServerConfig, shutdown_tx: broadcast::Sender<()>) -> Result<(Self, WorldRunner)> {
        let world = World::with_settings(WorldSettings::from_config(&config))?;
        info!(
            npcs = world.npc_count(),
            items = world.item_count(),
            map_cols = world.map().cols(),
            map_rows = world.map().rows(),
            "World created"
        );

        let sessions = Arc::new(SessionManager::with_limits(
            config.max_connections_per_ip,
            config.outbound_buffer,
        ));
        let world_status = Arc::new(WorldStatus::new());
        let (runner, world) = WorldRunner::new(world, sessions.clone(), world_status.clone());

        let state = Self {
            config,
            sessions,
            world,
            world_status,
            shutdown_tx,
        };
        Ok((state, runner))
    }

    /// Whether new connections should be accepted
    pub fn accepting_connections(&self) -> bool {
        self.world_status.state().accepting_connections()
    }
}
