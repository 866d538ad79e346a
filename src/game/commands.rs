//! Command handling module
//!
//! Applies one decoded client message to the world and returns the
//! messages it produced. Rejections go back to the requesting session
//! only and never touch other players.

use tracing::{debug, info, trace};
use uuid::Uuid;

use crate::error::GameError;
use crate::game::action::{ActionState, Approach, PendingAction, TargetKind};
use crate::game::combat;
use crate::game::economy;
use crate::game::item::{EquipSlot, ItemCategory};
use crate::game::map::{TileKind, TilePos};
use crate::game::movement::Movable;
use crate::game::pathfinding::find_path;
use crate::game::player::{validate_name, Player};
use crate::game::world::World;
use crate::net::session::SessionId;
use crate::protocol::{ClientMessage, InventorySnapshot, Outbound, ServerMessage, TileChange};

type CommandResult = Result<(), GameError>;

/// Private inventory refresh for `player`
pub fn inventory_update(player: &Player) -> ServerMessage {
    ServerMessage::InventoryUpdated(InventorySnapshot {
        inventory: player.inventory.clone(),
        equipment: player.equipment.clone(),
        gold: player.gold,
        skills: player.skills.clone(),
        health: player.vitals.health,
        max_health: player.vitals.max_health,
        mana: player.vitals.mana,
        max_mana: player.vitals.max_mana,
        hunger: player.vitals.hunger,
        attack: player.attack,
        defense: player.defense,
        bank: player.bank.clone(),
    })
}

impl World {
    /// Apply one client message from `session_id`
    pub fn handle_message(&mut self, session_id: SessionId, message: ClientMessage) -> Vec<Outbound> {
        let mut out = Vec::new();

        if let ClientMessage::JoinGame { player_name } = message {
            if let Err(e) = self.join(session_id, &player_name, &mut out) {
                debug!(session_id, error = %e, "Join rejected");
                out.push(Outbound::to(session_id, ServerMessage::error(e.to_string())));
            }
            return out;
        }

        let Some(player_id) = self.players.id_for_session(session_id) else {
            out.push(Outbound::to(
                session_id,
                ServerMessage::error(GameError::NotJoined.to_string()),
            ));
            return out;
        };

        let kind = message.kind();
        let result = match message {
            ClientMessage::JoinGame { .. } => Ok(()),
            ClientMessage::Move {
                target_col,
                target_row,
            } => self.request_move(player_id, TilePos::new(target_col, target_row), &mut out),
            ClientMessage::Interact {
                target_id,
                target_type,
            } => self.submit(
                player_id,
                PendingAction::Interact {
                    target_id,
                    kind: target_type,
                },
                Approach::Walk,
                &mut out,
            ),
            ClientMessage::Gather { zone_key } => self.submit(
                player_id,
                PendingAction::Gather { zone: zone_key },
                Approach::Stay,
                &mut out,
            ),
            ClientMessage::Action(request) => self.submit(
                player_id,
                PendingAction::Trade {
                    npc_id: request.npc_id,
                    order: request.order,
                },
                Approach::Walk,
                &mut out,
            ),
            ClientMessage::BankAction {
                npc_id,
                action,
                item_id,
                quantity,
            } => self.submit(
                player_id,
                PendingAction::Bank {
                    npc_id,
                    action,
                    item_id,
                    quantity,
                },
                Approach::Walk,
                &mut out,
            ),
            ClientMessage::Chat { message } => {
                self.chat(player_id, &message, &mut out);
                Ok(())
            }
            ClientMessage::Equip { item_id } => {
                self.update_player(player_id, &mut out, |player| player.equip(&item_id))
            }
            ClientMessage::Unequip { slot } => self.unequip(player_id, slot, &mut out),
            ClientMessage::Consume { item_id } => {
                let result = self.update_player(player_id, &mut out, |player| player.consume(&item_id));
                if result.is_ok() {
                    self.sync.mark_players([player_id]);
                }
                result
            }
            ClientMessage::PlaceTile { item_id, col, row } => {
                self.place_tile(player_id, item_id, TilePos::new(col, row), &mut out)
            }
            ClientMessage::BreakTile { col, row } => self.break_tile(player_id, TilePos::new(col, row), &mut out),
            ClientMessage::Attack { target_id } => combat::initiate_pvp(&self.players, &player_id, &target_id),
            ClientMessage::WebrtcSignal { target_id, signal } => {
                self.relay_signal(player_id, target_id, signal, &mut out);
                Ok(())
            }
        };

        if let Err(e) = result {
            debug!(session_id, command = kind, error = %e, "Command rejected");
            out.push(Outbound::to(session_id, ServerMessage::failure(e.to_string())));
        }
        out
    }

    /// Remove the player bound to `session_id`, if any
    pub fn handle_disconnect(&mut self, session_id: SessionId) -> Vec<Outbound> {
        let Some(player) = self.players.remove_by_session(session_id) else {
            return Vec::new();
        };
        self.sync.forget_player(&player.id);
        info!(player = %player.name, player_id = %player.id, "Player left the world");

        vec![Outbound::broadcast(ServerMessage::PlayerLeft {
            player_id: player.id,
            player_name: player.name,
        })]
    }

    fn join(&mut self, session_id: SessionId, requested: &str, out: &mut Vec<Outbound>) -> CommandResult {
        if self.players.by_session(session_id).is_some() {
            return Err(GameError::AlreadyJoined);
        }
        let name = validate_name(requested)?;
        if self.players.name_taken(&name) {
            return Err(GameError::NameTaken);
        }

        let tile = self.spawn_tile();
        let player = Player::new(session_id, name, tile, self.settings.gameplay.player_speed);
        let player_id = self.players.insert(player)?;
        let player = self.players.get(&player_id).ok_or(GameError::NotJoined)?;

        info!(player = %player.name, player_id = %player_id, tile = %tile, "Player joined the world");

        out.push(Outbound::to(
            session_id,
            ServerMessage::JoinSuccess {
                player: player.private(),
                world_state: self.snapshot(),
            },
        ));
        out.push(Outbound::broadcast_except(
            session_id,
            ServerMessage::PlayerJoined {
                player: player.public(),
            },
        ));
        out.push(Outbound::to(
            session_id,
            ServerMessage::ActionLog {
                message: format!(
                    "Welcome to {}, {}! Click to move, gather resources and visit the shops.",
                    self.settings.name, player.name
                ),
            },
        ));
        Ok(())
    }

    /// Manual move. Replaces any pending action once a route is found.
    fn request_move(&mut self, player_id: Uuid, target: TilePos, out: &mut Vec<Outbound>) -> CommandResult {
        let player = self.players.get_mut(&player_id).ok_or(GameError::NotJoined)?;
        let here = player.tile();

        let path = if target == here {
            player.movement_mut().halt()
        } else {
            let path = find_path(&self.map, here, target, self.limits);
            if path.is_empty() {
                return Err(GameError::Unreachable);
            }
            player.movement_mut().set_path(path.clone());
            path
        };

        player.action = if path.is_empty() {
            ActionState::Idle
        } else {
            ActionState::Moving { pending: None }
        };
        self.sync.mark_players([player_id]);
        out.push(Outbound::to(player.session_id, ServerMessage::MoveAck { path }));
        Ok(())
    }

    /// Carry out an action whose target is within reach
    pub(crate) fn perform(&mut self, player_id: Uuid, action: PendingAction, out: &mut Vec<Outbound>) -> CommandResult {
        match action {
            PendingAction::Interact {
                target_id,
                kind: TargetKind::Npc,
            } => {
                let npc = self.npc(&target_id).ok_or(GameError::UnknownTarget)?;
                let session_id = self.session_of(&player_id)?;
                out.push(Outbound::to(
                    session_id,
                    ServerMessage::InteractResult {
                        target_type: TargetKind::Npc,
                        npc: npc.public(),
                    },
                ));
                Ok(())
            }
            PendingAction::Interact { target_id, .. } => self.pick_up(player_id, target_id, out),
            PendingAction::Gather { zone } => self.gather(player_id, &zone, out),
            PendingAction::Trade { npc_id, order } => {
                let npc = self
                    .npcs
                    .iter()
                    .find(|npc| npc.id == npc_id)
                    .ok_or(GameError::UnknownTarget)?;
                let player = self.players.get_mut(&player_id).ok_or(GameError::NotJoined)?;
                let message = economy::trade(player, npc, order)?;
                out.push(Outbound::to(player.session_id, inventory_update(player)));
                out.push(Outbound::to(player.session_id, ServerMessage::success(message)));
                Ok(())
            }
            PendingAction::Bank {
                npc_id,
                action,
                item_id,
                quantity,
            } => {
                let npc = self
                    .npcs
                    .iter()
                    .find(|npc| npc.id == npc_id)
                    .ok_or(GameError::UnknownTarget)?;
                let player = self.players.get_mut(&player_id).ok_or(GameError::NotJoined)?;
                let message = economy::bank(player, npc, action, &item_id, quantity)?;
                out.push(Outbound::to(player.session_id, inventory_update(player)));
                out.push(Outbound::to(player.session_id, ServerMessage::success(message)));
                Ok(())
            }
        }
    }

    /// Take the oldest item from a zone.
    ///
    /// Checks run before anything is removed so a rejection leaves both
    /// the zone and the player unchanged.
    fn gather(&mut self, player_id: Uuid, zone: &str, out: &mut Vec<Outbound>) -> CommandResult {
        let now = self.now_ms();
        let tracker = self
            .trackers
            .iter_mut()
            .find(|t| t.zone().key == zone)
            .ok_or(GameError::UnknownZone)?;
        let player = self.players.get_mut(&player_id).ok_or(GameError::NotJoined)?;

        if let Some(tool) = tracker.zone().required_tool {
            if !player.has_tool(tool) {
                return Err(GameError::MissingTool(tool.name().to_lowercase()));
            }
        }
        let kind = tracker.peek_first().map(|item| item.kind).ok_or(GameError::ZoneDepleted)?;
        if !player.inventory.has_room_for(kind, 1) {
            return Err(GameError::InventoryFull);
        }

        let item = tracker.take_first(now).ok_or(GameError::ZoneDepleted)?;
        player.inventory.add(item.kind, 1)?;

        let zone = tracker.zone();
        let session_id = player.session_id;
        debug!(player = %player.name, zone = %zone.key, item = %item.kind, "Resource gathered");

        out.push(Outbound::broadcast(ServerMessage::ItemRemoved { item_id: item.id }));
        if let Some(skill) = zone.skill {
            if let Some(level) = player.skills.add_experience(skill, zone.xp_per_gather) {
                info!(player = %player.name, skill = skill.name(), level, "Level up");
                out.push(Outbound::to(
                    session_id,
                    ServerMessage::LevelUp {
                        skill: skill.name(),
                        level,
                        message: format!("Your {} level is now {}!", skill.name(), level),
                    },
                ));
            }
        }
        out.push(Outbound::to(session_id, inventory_update(player)));
        out.push(Outbound::to(
            session_id,
            ServerMessage::success(format!("Gathered {}! (+{} XP)", item.kind.name(), zone.xp_per_gather)),
        ));
        self.sync.mark_items();
        Ok(())
    }

    fn pick_up(&mut self, player_id: Uuid, item_id: Uuid, out: &mut Vec<Outbound>) -> CommandResult {
        let now = self.now_ms();
        let tracker = self
            .trackers
            .iter_mut()
            .find(|t| t.get(&item_id).is_some())
            .ok_or(GameError::UnknownTarget)?;
        let player = self.players.get_mut(&player_id).ok_or(GameError::NotJoined)?;

        let kind = tracker.get(&item_id).map(|item| item.kind).ok_or(GameError::UnknownTarget)?;
        if !player.inventory.has_room_for(kind, 1) {
            return Err(GameError::InventoryFull);
        }
        let item = tracker.remove_item(&item_id, now).ok_or(GameError::UnknownTarget)?;
        player.inventory.add(item.kind, 1)?;

        out.push(Outbound::broadcast(ServerMessage::ItemRemoved { item_id }));
        out.push(Outbound::to(player.session_id, inventory_update(player)));
        out.push(Outbound::to(
            player.session_id,
            ServerMessage::success(format!("Picked up {}.", item.kind.name())),
        ));
        self.sync.mark_items();
        Ok(())
    }

    fn chat(&mut self, player_id: Uuid, message: &str, out: &mut Vec<Outbound>) {
        let Some(player) = self.players.get(&player_id) else {
            return;
        };
        if let Some(line) = self.chat.post(player_id, &player.name, message) {
            out.push(Outbound::broadcast(ServerMessage::ChatMessage(line)));
        }
    }

    /// Forward an opaque signalling payload to another player; unknown
    /// targets are ignored
    fn relay_signal(&self, player_id: Uuid, target_id: Uuid, signal: serde_json::Value, out: &mut Vec<Outbound>) {
        let Some(target) = self.players.get(&target_id) else {
            trace!(from = %player_id, to = %target_id, "Signal for unknown player dropped");
            return;
        };
        out.push(Outbound::to(
            target.session_id,
            ServerMessage::WebrtcSignal {
                source_id: player_id,
                signal,
            },
        ));
    }

    fn unequip(&mut self, player_id: Uuid, slot: EquipSlot, out: &mut Vec<Outbound>) -> CommandResult {
        self.update_player(player_id, out, |player| player.unequip(slot))
    }

    /// Run an immediate inventory operation and report the result
    fn update_player<F>(&mut self, player_id: Uuid, out: &mut Vec<Outbound>, op: F) -> CommandResult
    where
        F: FnOnce(&mut Player) -> Result<String, GameError>,
    {
        let player = self.players.get_mut(&player_id).ok_or(GameError::NotJoined)?;
        let message = op(player)?;
        out.push(Outbound::to(player.session_id, inventory_update(player)));
        out.push(Outbound::to(player.session_id, ServerMessage::success(message)));
        Ok(())
    }

    fn place_tile(&mut self, player_id: Uuid, item_id: Uuid, pos: TilePos, out: &mut Vec<Outbound>) -> CommandResult {
        if !self.map.in_bounds(pos) {
            return Err(GameError::InvalidAction("Invalid position.".to_string()));
        }
        let occupied = self.players.occupies(pos) || self.npcs.iter().any(|npc| npc.tile() == pos);
        let build_range = self.settings.gameplay.build_range;

        let player = self.players.get_mut(&player_id).ok_or(GameError::NotJoined)?;
        if player.tile().manhattan(pos) > build_range {
            return Err(GameError::OutOfRange);
        }
        let item = player
            .inventory
            .get(&item_id)
            .ok_or_else(|| GameError::InvalidAction("You don't have that block!".to_string()))?;
        if item.kind.definition().category != ItemCategory::Resource {
            return Err(GameError::InvalidAction("Invalid block type!".to_string()));
        }
        if self.map.overlay_at(pos).is_some() {
            return Err(GameError::InvalidAction("Something is already built there.".to_string()));
        }
        if occupied {
            return Err(GameError::InvalidAction("Someone is standing there.".to_string()));
        }

        let used = player.inventory.remove(&item_id, 1)?;
        self.map
            .set_overlay(pos, TileKind::Wall)
            .map_err(|e| GameError::InvalidAction(e.to_string()))?;

        debug!(player = %player.name, tile = %pos, "Tile placed");
        out.push(Outbound::broadcast(ServerMessage::TileChanged(TileChange::new(
            pos,
            Some(TileKind::Wall),
        ))));
        out.push(Outbound::to(player.session_id, inventory_update(player)));
        out.push(Outbound::to(
            player.session_id,
            ServerMessage::success(format!("Placed {}.", used.name())),
        ));
        Ok(())
    }

    fn break_tile(&mut self, player_id: Uuid, pos: TilePos, out: &mut Vec<Outbound>) -> CommandResult {
        let build_range = self.settings.gameplay.build_range;
        let player = self.players.get(&player_id).ok_or(GameError::NotJoined)?;
        if player.tile().manhattan(pos) > build_range {
            return Err(GameError::OutOfRange);
        }
        if self.map.overlay_at(pos).is_none() {
            return Err(GameError::InvalidAction("Cannot break permanent map tiles!".to_string()));
        }

        self.map.clear_overlay(pos);
        debug!(player = %player.name, tile = %pos, "Tile broken");
        out.push(Outbound::broadcast(ServerMessage::TileChanged(TileChange::new(pos, None))));
        out.push(Outbound::to(player.session_id, ServerMessage::success("Mined block.")));
        Ok(())
    }

    fn session_of(&self, player_id: &Uuid) -> Result<SessionId, GameError> {
        self.players
            .get(player_id)
            .map(|player| player.session_id)
            .ok_or(GameError::NotJoined)
    }
}
