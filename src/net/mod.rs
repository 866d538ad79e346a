//! Networking module
//!
//! This module handles all network-related functionality for the Tileworld server:
//! - WebSocket handling for browser clients
//! - Session management and outbound fan-out
//! - Heartbeat and connection lifecycle

pub mod handler;
pub mod session;

pub use handler::{run_heartbeat, ConnectionHandler};
pub use session::{OutboundFrame, Session, SessionId, SessionManager, SessionState};
