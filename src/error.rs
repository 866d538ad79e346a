//! Error handling module
//!
//! Defines custom error types for the Tileworld server.

use std::io;

use thiserror::Error;

/// Main error type for the Tileworld server
#[derive(Error, Debug)]
pub enum TileworldError {
    /// Network-related errors
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// Protocol-related errors
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Game logic errors
    #[error("Game error: {0}")]
    Game(#[from] GameError),

    /// Tile map errors
    #[error("Map error: {0}")]
    Map(#[from] MapError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Network-specific errors
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Connection closed")]
    ConnectionClosed,

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Too many connections from {0}")]
    TooManyConnections(String),

    #[error("Session not found: {0}")]
    SessionNotFound(u64),

    #[error("Write buffer full")]
    WriteBufferFull,

    #[error("World is not accepting messages")]
    WorldUnavailable,
}

/// Protocol-specific errors
///
/// The display text of these is sent back to the client verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Unknown message type: {0}")]
    UnknownMessageType(String),

    #[error("Malformed message.")]
    MalformedMessage(String),

    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },
}

/// Tile map construction errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MapError {
    #[error("Map has no tiles")]
    Empty,

    #[error("Row {row} has {actual} tiles, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Unknown tile code {code} at ({col}, {row})")]
    UnknownTile { code: u8, col: usize, row: usize },

    #[error("Tile ({col}, {row}) is outside the map")]
    OutOfBounds { col: i32, row: i32 },
}

/// Game logic errors
///
/// Every variant is recoverable: it is reported to the requesting
/// connection and never aborts a tick.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("Cannot reach that location.")]
    Unreachable,

    #[error("Too far away.")]
    OutOfRange,

    #[error("Move closer to gather here.")]
    TooFarToGather,

    #[error("You need a {0} to gather here.")]
    MissingTool(String),

    #[error("Nothing to gather here. Wait for respawn.")]
    ZoneDepleted,

    #[error("Invalid resource zone.")]
    UnknownZone,

    #[error("That target no longer exists.")]
    UnknownTarget,

    #[error("Inventory full.")]
    InventoryFull,

    #[error("Invalid player name (2-20 chars).")]
    InvalidName,

    #[error("Name already taken. Choose another.")]
    NameTaken,

    #[error("Join the game first.")]
    NotJoined,

    #[error("Already in game.")]
    AlreadyJoined,

    #[error("Not enough gold. Need {0}g.")]
    InsufficientGold(u64),

    #[error("Item not found.")]
    ItemNotFound,

    #[error("Not enough of that item.")]
    InsufficientItems,

    #[error("Item cannot be equipped.")]
    NotEquippable,

    #[error("Cannot consume that item.")]
    NotConsumable,

    #[error("Nothing equipped in that slot.")]
    EmptySlot,

    #[error("This NPC does not run a shop.")]
    NotAShop,

    #[error("This is not a bank.")]
    NotABank,

    #[error("Item not available in this shop.")]
    NotSoldHere,

    #[error("{0}")]
    NotImplemented(String),

    #[error("{0}")]
    InvalidAction(String),
}

/// Result type alias for Tileworld operations
pub type Result<T> = std::result::Result<T, TileworldError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NetworkError::ConnectionClosed;
        assert_eq!(err.to_string(), "Connection closed");

        let err = ProtocolError::UnknownMessageType("DANCE".to_string());
        assert_eq!(err.to_string(), "Unknown message type: DANCE");

        let err = MapError::UnknownTile {
            code: 42,
            col: 3,
            row: 7,
        };
        assert_eq!(err.to_string(), "Unknown tile code 42 at (3, 7)");
    }

    #[test]
    fn test_game_error_messages_are_user_facing() {
        assert_eq!(
            GameError::MissingTool("pickaxe".to_string()).to_string(),
            "You need a pickaxe to gather here."
        );
        assert_eq!(
            GameError::InsufficientGold(225).to_string(),
            "Not enough gold. Need 225g."
        );
        assert_eq!(
            GameError::NameTaken.to_string(),
            "Name already taken. Choose another."
        );
    }

    #[test]
    fn test_error_conversion() {
        let err: TileworldError = GameError::Unreachable.into();
        assert!(matches!(err, TileworldError::Game(GameError::Unreachable)));
        assert_eq!(err.to_string(), "Game error: Cannot reach that location.");
    }
}
