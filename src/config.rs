//! Server configuration module
//!
//! Handles loading and parsing of server configuration from files and environment variables.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Path to the configuration file
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Server name displayed to players
    #[serde(default = "default_server_name")]
    pub server_name: String,

    /// WebSocket port for game clients
    #[serde(default = "default_websocket_port")]
    pub websocket_port: u16,

    /// Management API port
    #[serde(default = "default_management_port")]
    pub management_port: u16,

    /// Maximum simultaneous connections from one IP
    #[serde(default = "default_max_per_ip")]
    pub max_connections_per_ip: usize,

    /// Capacity of each connection's outbound queue
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,

    /// Simulation tick rate in milliseconds
    #[serde(default = "default_tick_rate")]
    pub tick_rate_ms: u64,

    /// Minimum interval between world update broadcasts
    #[serde(default = "default_sync_interval")]
    pub sync_interval_ms: u64,

    /// Heartbeat (ping/liveness) interval in seconds
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    /// Fixed RNG seed for the world (random when unset)
    #[serde(default)]
    pub world_seed: Option<u64>,

    /// Enable debug logging
    #[serde(default)]
    pub debug: bool,

    /// Gameplay distances, speeds and search limits
    #[serde(default)]
    pub gameplay: GameplayConfig,
}

/// Gameplay tuning values
///
/// These are empirically chosen; they are exposed so they can be tuned
/// without a rebuild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameplayConfig {
    /// Max Manhattan distance for NPC interaction, shops and bank
    #[serde(default = "default_interaction_range")]
    pub interaction_range: u32,

    /// Max Manhattan distance for picking up a world item
    #[serde(default = "default_pickup_range")]
    pub pickup_range: u32,

    /// Tiles added to a zone's radius when checking gather distance
    #[serde(default = "default_gather_slack")]
    pub gather_slack: u32,

    /// Max distance for placing or breaking overlay tiles
    #[serde(default = "default_build_range")]
    pub build_range: u32,

    /// A* expansion cap
    #[serde(default = "default_path_max_iterations")]
    pub path_max_iterations: usize,

    /// Search radius for a walkable substitute destination
    #[serde(default = "default_path_fallback_radius")]
    pub path_fallback_radius: i32,

    /// Player speed in tiles per second
    #[serde(default = "default_player_speed")]
    pub player_speed: f64,

    /// NPC speed in tiles per second
    #[serde(default = "default_npc_speed")]
    pub npc_speed: f64,

    /// How far an NPC may wander from its home tile
    #[serde(default = "default_wander_radius")]
    pub wander_radius: i32,

    /// Random tile samples per wander attempt
    #[serde(default = "default_wander_attempts")]
    pub wander_attempts: u32,

    /// Minimum idle time between wanders
    #[serde(default = "default_wander_min_ms")]
    pub wander_min_ms: u64,

    /// Random extra idle time added to `wander_min_ms`
    #[serde(default = "default_wander_jitter_ms")]
    pub wander_jitter_ms: u64,

    /// Random tile samples per resource spawn
    #[serde(default = "default_spawn_attempts")]
    pub spawn_attempts: u32,
}

// Default value functions
fn default_server_name() -> String {
    "Tileworld".to_string()
}

fn default_websocket_port() -> u16 {
    8080
}

fn default_management_port() -> u16 {
    8081
}

fn default_max_per_ip() -> usize {
    10
}

fn default_outbound_buffer() -> usize {
    256
}

fn default_tick_rate() -> u64 {
    50
}

fn default_sync_interval() -> u64 {
    100
}

fn default_heartbeat_interval() -> u64 {
    30
}

fn default_interaction_range() -> u32 {
    3
}

fn default_pickup_range() -> u32 {
    2
}

fn default_gather_slack() -> u32 {
    3
}

fn default_build_range() -> u32 {
    5
}

fn default_path_max_iterations() -> usize {
    2000
}

fn default_path_fallback_radius() -> i32 {
    3
}

fn default_player_speed() -> f64 {
    2.5
}

fn default_npc_speed() -> f64 {
    1.0
}

fn default_wander_radius() -> i32 {
    3
}

fn default_wander_attempts() -> u32 {
    5
}

fn default_wander_min_ms() -> u64 {
    3000
}

fn default_wander_jitter_ms() -> u64 {
    4000
}

fn default_spawn_attempts() -> u32 {
    20
}

impl Default for GameplayConfig {
    fn default() -> Self {
        Self {
            interaction_range: default_interaction_range(),
            pickup_range: default_pickup_range(),
            gather_slack: default_gather_slack(),
            build_range: default_build_range(),
            path_max_iterations: default_path_max_iterations(),
            path_fallback_radius: default_path_fallback_radius(),
            player_speed: default_player_speed(),
            npc_speed: default_npc_speed(),
            wander_radius: default_wander_radius(),
            wander_attempts: default_wander_attempts(),
            wander_min_ms: default_wander_min_ms(),
            wander_jitter_ms: default_wander_jitter_ms(),
            spawn_attempts: default_spawn_attempts(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("config/server.toml"),
            server_name: default_server_name(),
            websocket_port: default_websocket_port(),
            management_port: default_management_port(),
            max_connections_per_ip: default_max_per_ip(),
            outbound_buffer: default_outbound_buffer(),
            tick_rate_ms: default_tick_rate(),
            sync_interval_ms: default_sync_interval(),
            heartbeat_interval_secs: default_heartbeat_interval(),
            world_seed: None,
            debug: false,
            gameplay: GameplayConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from file and environment variables
    pub async fn load() -> Result<Self> {
        // Determine config path from environment or use default
        let config_path = env::var("TILEWORLD_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/server.toml"));

        let mut config = if config_path.exists() {
            let content = tokio::fs::read_to_string(&config_path)
                .await
                .with_context(|| {
                    format!("Failed to read config file: {}", config_path.display())
                })?;

            Self::from_toml(&content).with_context(|| {
                format!("Failed to parse config file: {}", config_path.display())
            })?
        } else {
            tracing::warn!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            Self::default()
        };

        config.config_path = config_path;

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parse a configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("TILEWORLD_SERVER_NAME") {
            self.server_name = val;
        }
        if let Ok(val) = env::var("TILEWORLD_WEBSOCKET_PORT") {
            if let Ok(port) = val.parse() {
                self.websocket_port = port;
            }
        }
        if let Ok(val) = env::var("TILEWORLD_MANAGEMENT_PORT") {
            if let Ok(port) = val.parse() {
                self.management_port = port;
            }
        }
        if let Ok(val) = env::var("TILEWORLD_TICK_RATE_MS") {
            if let Ok(ms) = val.parse() {
                self.tick_rate_ms = ms;
            }
        }
        if let Ok(val) = env::var("TILEWORLD_SYNC_INTERVAL_MS") {
            if let Ok(ms) = val.parse() {
                self.sync_interval_ms = ms;
            }
        }
        if let Ok(val) = env::var("TILEWORLD_HEARTBEAT_SECS") {
            if let Ok(secs) = val.parse() {
                self.heartbeat_interval_secs = secs;
            }
        }
        if let Ok(val) = env::var("TILEWORLD_MAX_PER_IP") {
            if let Ok(max) = val.parse() {
                self.max_connections_per_ip = max;
            }
        }
        if let Ok(val) = env::var("TILEWORLD_WORLD_SEED") {
            if let Ok(seed) = val.parse() {
                self.world_seed = Some(seed);
            }
        }
        if let Ok(val) = env::var("TILEWORLD_DEBUG") {
            self.debug = val.to_lowercase() == "true" || val == "1";
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.websocket_port == self.management_port {
            anyhow::bail!("WebSocket port and management port must be different");
        }

        if self.tick_rate_ms < 10 || self.tick_rate_ms > 1000 {
            anyhow::bail!("Tick rate must be between 10ms and 1000ms");
        }

        if self.sync_interval_ms < self.tick_rate_ms {
            anyhow::bail!("Sync interval must not be shorter than the tick rate");
        }

        if self.heartbeat_interval_secs == 0 {
            anyhow::bail!("Heartbeat interval must be at least one second");
        }

        if self.max_connections_per_ip == 0 || self.outbound_buffer == 0 {
            anyhow::bail!("Connection limits and buffers must be non-zero");
        }

        let gameplay = &self.gameplay;
        if gameplay.player_speed <= 0.0 || gameplay.npc_speed <= 0.0 {
            anyhow::bail!("Movement speeds must be positive");
        }
        if gameplay.interaction_range == 0 || gameplay.pickup_range == 0 {
            anyhow::bail!("Interaction ranges must be positive");
        }
        if gameplay.path_max_iterations == 0 {
            anyhow::bail!("Pathfinder iteration cap must be positive");
        }
        if gameplay.path_fallback_radius < 0 || gameplay.wander_radius < 0 {
            anyhow::bail!("Search radii must not be negative");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.server_name, "Tileworld");
        assert_eq!(config.tick_rate_ms, 50);
        assert_eq!(config.sync_interval_ms, 100);
        assert_eq!(config.heartbeat_interval_secs, 30);
        assert_eq!(config.gameplay.interaction_range, 3);
        assert_eq!(config.gameplay.pickup_range, 2);
        assert_eq!(config.gameplay.gather_slack, 3);
        assert_eq!(config.gameplay.path_max_iterations, 2000);
    }

    #[test]
    fn test_validation() {
        let mut config = ServerConfig::default();

        // Valid config should pass
        assert!(config.validate().is_ok());

        // Duplicate ports
        config.management_port = config.websocket_port;
        assert!(config.validate().is_err());
        config.management_port = default_management_port();

        // Sync faster than the simulation
        config.sync_interval_ms = 20;
        assert!(config.validate().is_err());
        config.sync_interval_ms = 100;

        config.gameplay.npc_speed = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = ServerConfig::from_toml(
            r#"
            server_name = "Test"
            tick_rate_ms = 25

            [gameplay]
            gather_slack = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.server_name, "Test");
        assert_eq!(config.tick_rate_ms, 25);
        assert_eq!(config.websocket_port, 8080);
        assert_eq!(config.gameplay.gather_slack, 5);
        assert_eq!(config.gameplay.pickup_range, 2);
        assert!(config.validate().is_ok());
    }
}
