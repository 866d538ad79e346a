//! Wire messages
//!
//! JSON text frames tagged by `"type"`. Client messages are decoded in two
//! steps so that an unknown type and a malformed body get different
//! errors.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ProtocolError;
use crate::game::action::{BankAction, TargetKind, TradeOrder};
use crate::game::bank::Bank;
use crate::game::chat::ChatLine;
use crate::game::environment::EnvironmentState;
use crate::game::equipment::Equipment;
use crate::game::inventory::Inventory;
use crate::game::item::{EquipSlot, ItemKind};
use crate::game::map::{TileKind, TilePos};
use crate::game::npc::NpcPublic;
use crate::game::player::{PlayerPrivate, PlayerPublic, Skills};
use crate::game::respawn::WorldItemPublic;
use crate::net::session::SessionId;

/// Largest accepted text frame in bytes
pub const MAX_FRAME_SIZE: usize = 16 * 1024;

/// Every `type` a client may send
pub const CLIENT_MESSAGE_TYPES: [&str; 14] = [
    "JOIN_GAME",
    "MOVE",
    "INTERACT",
    "GATHER",
    "ACTION",
    "BANK_ACTION",
    "CHAT",
    "EQUIP",
    "UNEQUIP",
    "CONSUME",
    "PLACE_TILE",
    "BREAK_TILE",
    "ATTACK",
    "WEBRTC_SIGNAL",
];

/// Messages sent by clients
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    JoinGame { player_name: String },
    #[serde(rename_all = "camelCase")]
    Move { target_col: i32, target_row: i32 },
    #[serde(rename_all = "camelCase")]
    Interact {
        target_id: Uuid,
        target_type: TargetKind,
    },
    #[serde(rename_all = "camelCase")]
    Gather { zone_key: String },
    Action(TradeRequest),
    #[serde(rename_all = "camelCase")]
    BankAction {
        npc_id: Uuid,
        action: BankAction,
        item_id: Uuid,
        #[serde(default)]
        quantity: Option<u32>,
    },
    Chat { message: String },
    #[serde(rename_all = "camelCase")]
    Equip { item_id: Uuid },
    Unequip { slot: EquipSlot },
    #[serde(rename_all = "camelCase")]
    Consume { item_id: Uuid },
    #[serde(rename_all = "camelCase")]
    PlaceTile { item_id: Uuid, col: i32, row: i32 },
    BreakTile { col: i32, row: i32 },
    #[serde(rename_all = "camelCase")]
    Attack { target_id: Uuid },
    /// Peer-to-peer negotiation relayed verbatim to another player
    #[serde(rename_all = "camelCase")]
    WebrtcSignal {
        target_id: Uuid,
        #[serde(default)]
        signal: serde_json::Value,
    },
}

impl ClientMessage {
    /// Wire name, for logs
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::JoinGame { .. } => "JOIN_GAME",
            ClientMessage::Move { .. } => "MOVE",
            ClientMessage::Interact { .. } => "INTERACT",
            ClientMessage::Gather { .. } => "GATHER",
            ClientMessage::Action(_) => "ACTION",
            ClientMessage::BankAction { .. } => "BANK_ACTION",
            ClientMessage::Chat { .. } => "CHAT",
            ClientMessage::Equip { .. } => "EQUIP",
            ClientMessage::Unequip { .. } => "UNEQUIP",
            ClientMessage::Consume { .. } => "CONSUME",
            ClientMessage::PlaceTile { .. } => "PLACE_TILE",
            ClientMessage::BreakTile { .. } => "BREAK_TILE",
            ClientMessage::Attack { .. } => "ATTACK",
            ClientMessage::WebrtcSignal { .. } => "WEBRTC_SIGNAL",
        }
    }
}

/// A shop order addressed to an NPC
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawTradeRequest")]
pub struct TradeRequest {
    pub npc_id: Uuid,
    pub order: TradeOrder,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum ShopVerb {
    BuyItem,
    SellItem,
}

/// `itemId` is an item key when buying and an inventory entry id when
/// selling.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTradeRequest {
    action: ShopVerb,
    target_id: Uuid,
    item_id: String,
    #[serde(default)]
    quantity: Option<u32>,
}

impl TryFrom<RawTradeRequest> for TradeRequest {
    type Error = String;

    fn try_from(raw: RawTradeRequest) -> Result<Self, Self::Error> {
        let quantity = raw.quantity.unwrap_or(1).max(1);
        let order = match raw.action {
            ShopVerb::BuyItem => TradeOrder::Buy {
                kind: ItemKind::from_key(&raw.item_id)
                    .ok_or_else(|| format!("unknown item {}", raw.item_id))?,
                quantity,
            },
            ShopVerb::SellItem => TradeOrder::Sell {
                item_id: raw.item_id.parse().map_err(|e| format!("bad item id: {}", e))?,
                quantity,
            },
        };
        Ok(Self {
            npc_id: raw.target_id,
            order,
        })
    }
}

/// Decode one text frame.
///
/// Frames with an unrecognised `type` are reported by name; anything else
/// that fails to decode is malformed.
pub fn decode_client_message(text: &str) -> Result<ClientMessage, ProtocolError> {
    if text.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: text.len(),
            max: MAX_FRAME_SIZE,
        });
    }

    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| ProtocolError::MalformedMessage(e.to_string()))?;

    let kind = value
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or_else(|| ProtocolError::MalformedMessage("missing type".to_string()))?;
    if !CLIENT_MESSAGE_TYPES.contains(&kind) {
        return Err(ProtocolError::UnknownMessageType(kind.to_string()));
    }

    serde_json::from_value(value).map_err(|e| ProtocolError::MalformedMessage(e.to_string()))
}

/// Everything a joining player needs to draw the world
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldSnapshot {
    pub players: Vec<PlayerPublic>,
    pub npcs: Vec<NpcPublic>,
    pub items: Vec<WorldItemPublic>,
    pub chat_history: Vec<ChatLine>,
    pub environment: EnvironmentState,
    pub tiles: Vec<TileChange>,
}

/// One overlay cell; `tile` is null once cleared
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileChange {
    pub col: i32,
    pub row: i32,
    pub tile: Option<TileKind>,
}

impl TileChange {
    pub fn new(pos: TilePos, tile: Option<TileKind>) -> Self {
        Self {
            col: pos.col,
            row: pos.row,
            tile,
        }
    }
}

/// Private inventory and stats refresh
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventorySnapshot {
    pub inventory: Inventory,
    pub equipment: Equipment,
    pub gold: u64,
    pub skills: Skills,
    pub health: u32,
    pub max_health: u32,
    pub mana: u32,
    pub max_mana: u32,
    pub hunger: u32,
    pub attack: u32,
    pub defense: u32,
    pub bank: Bank,
}

/// Messages sent to clients
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    JoinSuccess {
        player: PlayerPrivate,
        world_state: WorldSnapshot,
    },
    PlayerJoined { player: PlayerPublic },
    #[serde(rename_all = "camelCase")]
    PlayerLeft { player_id: Uuid, player_name: String },
    MoveAck { path: Vec<TilePos> },
    ActionResult { success: bool, message: String },
    #[serde(rename_all = "camelCase")]
    InteractResult { target_type: TargetKind, npc: NpcPublic },
    #[serde(rename_all = "camelCase")]
    ItemRemoved { item_id: Uuid },
    InventoryUpdated(InventorySnapshot),
    LevelUp {
        skill: &'static str,
        level: u32,
        message: String,
    },
    ChatMessage(ChatLine),
    ActionLog { message: String },
    TileChanged(TileChange),
    Error { message: String },
    WorldUpdate {
        players: Vec<PlayerPublic>,
        npcs: Vec<NpcPublic>,
        items: Vec<WorldItemPublic>,
    },
    #[serde(rename_all = "camelCase")]
    WebrtcSignal { source_id: Uuid, signal: serde_json::Value },
}

impl ServerMessage {
    pub fn success(message: impl Into<String>) -> Self {
        ServerMessage::ActionResult {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        ServerMessage::ActionResult {
            success: false,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    /// Encode as a JSON text frame
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Who receives an outbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    Session(SessionId),
    Broadcast,
    BroadcastExcept(SessionId),
}

/// A message addressed to one or more sessions
#[derive(Debug, Clone)]
pub struct Outbound {
    pub to: Recipient,
    pub message: ServerMessage,
}

impl Outbound {
    pub fn to(session_id: SessionId, message: ServerMessage) -> Self {
        Self {
            to: Recipient::Session(session_id),
            message,
        }
    }

    pub fn broadcast(message: ServerMessage) -> Self {
        Self {
            to: Recipient::Broadcast,
            message,
        }
    }

    pub fn broadcast_except(session_id: SessionId, message: ServerMessage) -> Self {
        Self {
            to: Recipient::BroadcastExcept(session_id),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_move() {
        let msg = decode_client_message(r#"{"type":"MOVE","targetCol":4,"targetRow":9}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Move {
                target_col: 4,
                target_row: 9
            }
        );
    }

    #[test]
    fn test_decode_interact() {
        let id = Uuid::new_v4();
        let text = format!(r#"{{"type":"INTERACT","targetId":"{}","targetType":"npc"}}"#, id);
        assert_eq!(
            decode_client_message(&text).unwrap(),
            ClientMessage::Interact {
                target_id: id,
                target_type: TargetKind::Npc
            }
        );
    }

    #[test]
    fn test_decode_shop_orders() {
        let npc = Uuid::new_v4();
        let text = format!(
            r#"{{"type":"ACTION","action":"BUY_ITEM","targetId":"{}","itemId":"PICKAXE"}}"#,
            npc
        );
        let ClientMessage::Action(request) = decode_client_message(&text).unwrap() else {
            panic!("expected a shop action");
        };
        assert_eq!(request.npc_id, npc);
        assert_eq!(
            request.order,
            TradeOrder::Buy {
                kind: ItemKind::Pickaxe,
                quantity: 1
            }
        );

        let entry = Uuid::new_v4();
        let text = format!(
            r#"{{"type":"ACTION","action":"SELL_ITEM","targetId":"{}","itemId":"{}","quantity":3}}"#,
            npc, entry
        );
        let ClientMessage::Action(request) = decode_client_message(&text).unwrap() else {
            panic!("expected a shop action");
        };
        assert_eq!(
            request.order,
            TradeOrder::Sell {
                item_id: entry,
                quantity: 3
            }
        );
    }

    #[test]
    fn test_decode_webrtc_signal() {
        let target = Uuid::new_v4();
        let text = format!(
            r#"{{"type":"WEBRTC_SIGNAL","targetId":"{}","signal":{{"sdp":"v=0","kind":"offer"}}}}"#,
            target
        );
        assert_eq!(
            decode_client_message(&text).unwrap(),
            ClientMessage::WebrtcSignal {
                target_id: target,
                signal: serde_json::json!({"sdp": "v=0", "kind": "offer"}),
            }
        );

        let source = Uuid::new_v4();
        let json = serde_json::to_value(ServerMessage::WebrtcSignal {
            source_id: source,
            signal: serde_json::json!({"candidate": "a=1"}),
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "WEBRTC_SIGNAL", "sourceId": source, "signal": {"candidate": "a=1"}})
        );
    }

    #[test]
    fn test_unknown_type_is_named() {
        let err = decode_client_message(r#"{"type":"DANCE"}"#).unwrap_err();
        assert_eq!(err, ProtocolError::UnknownMessageType("DANCE".to_string()));
        assert_eq!(err.to_string(), "Unknown message type: DANCE");
    }

    #[test]
    fn test_malformed_bodies() {
        for text in [
            "not json",
            r#"{"targetCol":1}"#,
            r#"{"type":"MOVE","targetCol":1}"#,
            r#"{"type":"INTERACT","targetId":"x","targetType":"npc"}"#,
            r#"{"type":"INTERACT","targetId":"6a1f0c1e-3f0e-4a8e-9c1a-2d7b4c9e8f10","targetType":"tree"}"#,
            r#"{"type":"ACTION","action":"BUY_ITEM","targetId":"6a1f0c1e-3f0e-4a8e-9c1a-2d7b4c9e8f10","itemId":"LASER"}"#,
        ] {
            let err = decode_client_message(text).unwrap_err();
            assert!(
                matches!(err, ProtocolError::MalformedMessage(_)),
                "{} gave {:?}",
                text,
                err
            );
            assert_eq!(err.to_string(), "Malformed message.");
        }
    }

    #[test]
    fn test_oversized_frame() {
        let text = format!(r#"{{"type":"CHAT","message":"{}"}}"#, "a".repeat(MAX_FRAME_SIZE));
        assert!(matches!(
            decode_client_message(&text),
            Err(ProtocolError::MessageTooLarge { .. })
        ));
    }

    #[test]
    fn test_server_message_shape() {
        let json = serde_json::to_value(ServerMessage::failure("Too far away.")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "ACTION_RESULT", "success": false, "message": "Too far away."})
        );

        let json = serde_json::to_value(ServerMessage::TileChanged(TileChange::new(
            TilePos::new(3, 4),
            None,
        )))
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "TILE_CHANGED", "col": 3, "row": 4, "tile": null})
        );

        let json = serde_json::to_value(ServerMessage::MoveAck {
            path: vec![TilePos::new(1, 1), TilePos::new(2, 1)],
        })
        .unwrap();
        assert_eq!(json["type"], "MOVE_ACK");
        assert_eq!(json["path"][1]["col"], 2);
    }
}
