//! Protocol module
//!
//! JSON messages exchanged with game clients over WebSocket.

pub mod messages;

pub use messages::{
    decode_client_message, ClientMessage, InventorySnapshot, Outbound, Recipient, ServerMessage, TileChange,
    TradeRequest, WorldSnapshot, MAX_FRAME_SIZE,
};
