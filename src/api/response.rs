//! API response types for consistent JSON responses
//!
//! This module provides standardized response types for the management API,
//! ensuring consistent response structures across all endpoints.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::game::scheduler::WorldStatus;
use crate::net::session::SessionManager;

/// Standard API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Whether the request was successful
    pub success: bool,
    /// Response message
    pub message: String,
    /// Response data (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a successful response with data
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}

/// Server status returned by `/api/status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub server_name: String,
    pub version: &'static str,
    pub world_state: &'static str,
    pub tick: u64,
    pub uptime_secs: u64,
    pub players_online: usize,
    pub connected_sessions: usize,
    pub sessions_by_state: BTreeMap<&'static str, usize>,
    pub npcs: usize,
    pub world_items: usize,
}

impl StatusResponse {
    /// Read the current counters
    pub fn collect(server_name: &str, world: &WorldStatus, sessions: &SessionManager) -> Self {
        Self {
            server_name: server_name.to_string(),
            version: crate::VERSION,
            world_state: world.state().name(),
            tick: world.tick(),
            uptime_secs: world.uptime_secs(),
            players_online: world.player_count(),
            connected_sessions: sessions.count(),
            sessions_by_state: sessions
                .count_by_state()
                .into_iter()
                .map(|(state, count)| (state.name(), count))
                .collect(),
            npcs: world.npc_count(),
            world_items: world.item_count(),
        }
    }
}
