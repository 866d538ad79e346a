//! Tileworld Game Server Library
//!
//! This library provides the core functionality for the Tileworld game server:
//! an authoritative tile-world simulation driven by WebSocket clients.
//!
//! ## Modules
//!
//! - `api` - Management HTTP endpoints
//! - `config` - Server configuration management
//! - `error` - Error types and result definitions
//! - `game` - World simulation, entities and the tick scheduler
//! - `net` - WebSocket handling and session management
//! - `protocol` - JSON wire messages

pub mod api;
pub mod config;
pub mod error;
pub mod game;
pub mod net;
pub mod protocol;
pub mod state;

// Re-export commonly used types
pub use config::ServerConfig;
pub use error::{Result, TileworldError};
pub use state::AppState;

/// Server version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
