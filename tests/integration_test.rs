//! Integration tests for the world simulation
//!
//! These tests drive the world through its public API the way the world
//! actor does: decoded client messages in, ticks of measured time, and the
//! outbound messages that come back.

use pretty_assertions::assert_eq;
use tileworld_server::config::GameplayConfig;
use tileworld_server::game::action::TargetKind;
use tileworld_server::game::item::ItemKind;
use tileworld_server::game::map::TileGrid;
use tileworld_server::game::movement::Movable;
use tileworld_server::game::npc::NpcKind;
use tileworld_server::game::respawn::ResourceZone;
use tileworld_server::game::{TileKind, TilePos, World, WorldSettings};
use tileworld_server::protocol::{decode_client_message, ClientMessage, Outbound, Recipient, ServerMessage};
use uuid::Uuid;

const TICK_MS: f64 = 50.0;

/// 30x30 grass field, a still merchant far from spawn and one ore zone
fn field() -> World {
    let gameplay = GameplayConfig {
        wander_radius: 0,
        ..GameplayConfig::default()
    };
    let zone = ResourceZone::new("ORE", TilePos::new(24, 5), 2, vec![ItemKind::IronOre], 2_000);

    World::with_settings(
        WorldSettings::default()
            .with_seed(21)
            .with_map(TileGrid::filled(30, 30, TileKind::Grass).expect("grid"))
            .with_zones(vec![zone])
            .with_npcs(vec![(NpcKind::Merchant, TilePos::new(20, 20))])
            .with_spawn_point(TilePos::new(5, 5))
            .with_gameplay(gameplay),
    )
    .expect("world")
}

fn join(world: &mut World, session_id: u64, name: &str) -> Uuid {
    let out = world.handle_message(
        session_id,
        ClientMessage::JoinGame {
            player_name: name.to_string(),
        },
    );
    assert!(matches!(out[0].message, ServerMessage::JoinSuccess { .. }));
    world.player_by_session(session_id).expect("joined").id
}

/// Tick until `done` holds or `max_ticks` pass; returns every message sent
fn run_until(world: &mut World, max_ticks: usize, done: impl Fn(&World) -> bool) -> Vec<Outbound> {
    let mut sent = Vec::new();
    for _ in 0..max_ticks {
        sent.extend(world.tick(TICK_MS).outbound);
        if done(world) {
            break;
        }
    }
    sent
}

fn is_idle(world: &World, player_id: &Uuid) -> bool {
    world
        .player(player_id)
        .map(|p| !p.is_moving() && p.pending().is_none())
        .unwrap_or(true)
}

#[test]
fn test_interact_resolves_after_walking() {
    let mut world = field();
    let player_id = join(&mut world, 1, "Walker");
    let npc_id = world.npcs()[0].id;

    let out = world.handle_message(
        1,
        ClientMessage::Interact {
            target_id: npc_id,
            target_type: TargetKind::Npc,
        },
    );
    assert_eq!(out.len(), 1);
    assert!(matches!(&out[0].message, ServerMessage::MoveAck { path } if !path.is_empty()));
    assert!(world.player(&player_id).unwrap().pending().is_some());

    let sent = run_until(&mut world, 400, |w| is_idle(w, &player_id));
    let results: Vec<_> = sent
        .iter()
        .filter(|o| matches!(o.message, ServerMessage::InteractResult { .. }))
        .collect();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].to, Recipient::Session(1));

    let player = world.player(&player_id).unwrap();
    assert!(player.tile().manhattan(TilePos::new(20, 20)) <= 3);
    assert!(player.pending().is_none());
}

#[test]
fn test_manual_move_cancels_pending_action() {
    let mut world = field();
    let player_id = join(&mut world, 1, "Walker");
    let npc_id = world.npcs()[0].id;

    world.handle_message(
        1,
        ClientMessage::Interact {
            target_id: npc_id,
            target_type: TargetKind::Npc,
        },
    );
    world.tick(TICK_MS);
    world.handle_message(1, ClientMessage::Move { target_col: 2, target_row: 2 });

    let sent = run_until(&mut world, 400, |w| is_idle(w, &player_id));
    assert!(!sent
        .iter()
        .any(|o| matches!(o.message, ServerMessage::InteractResult { .. })));
    assert_eq!(world.player(&player_id).unwrap().tile(), TilePos::new(2, 2));
}

#[test]
fn test_distant_gather_is_rejected_until_player_walks_over() {
    let mut world = field();
    let player_id = join(&mut world, 1, "Miner");
    let before = world.item_count();
    assert_eq!(before, 4);

    let out = world.handle_message(1, ClientMessage::Gather { zone_key: "ORE".into() });
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].to, Recipient::Session(1));
    assert!(matches!(
        &out[0].message,
        ServerMessage::ActionResult { success: false, message } if message == "Move closer to gather here."
    ));
    let player = world.player(&player_id).unwrap();
    assert!(!player.is_moving());
    assert!(player.pending().is_none());
    assert_eq!(world.item_count(), before);

    world.handle_message(1, ClientMessage::Move { target_col: 20, target_row: 5 });
    run_until(&mut world, 400, |w| is_idle(w, &player_id));
    assert_eq!(world.player(&player_id).unwrap().tile(), TilePos::new(20, 5));

    let out = world.handle_message(1, ClientMessage::Gather { zone_key: "ORE".into() });
    assert!(out
        .iter()
        .any(|o| matches!(o.message, ServerMessage::ItemRemoved { .. }) && o.to == Recipient::Broadcast));
    assert_eq!(world.item_count(), before - 1);
    assert_eq!(
        world.player(&player_id).unwrap().inventory.count(ItemKind::IronOre),
        1
    );

    // Cooldown is two seconds of world time
    run_until(&mut world, 60, |w| w.item_count() == before);
    assert_eq!(world.item_count(), before);
}

#[test]
fn test_duplicate_names_are_rejected() {
    let mut world = field();
    join(&mut world, 1, "TestPlayer");

    let out = world.handle_message(
        2,
        ClientMessage::JoinGame {
            player_name: "testplayer".to_string(),
        },
    );
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].to, Recipient::Session(2));
    assert!(matches!(
        &out[0].message,
        ServerMessage::Error { message } if message == "Name already taken. Choose another."
    ));
    assert_eq!(world.players().len(), 1);

    // The name frees up once its owner leaves
    world.handle_disconnect(1);
    join(&mut world, 2, "testplayer");
}

#[test]
fn test_wire_round_trip_through_world() {
    let mut world = field();
    let message = decode_client_message(r#"{"type":"JOIN_GAME","playerName":"Ada"}"#).unwrap();
    let out = world.handle_message(7, message);

    let json: serde_json::Value = serde_json::from_str(&out[0].message.to_json().unwrap()).unwrap();
    assert_eq!(json["type"], "JOIN_SUCCESS");
    assert_eq!(json["player"]["name"], "Ada");
    assert_eq!(json["player"]["gold"], 500);
    assert_eq!(json["worldState"]["npcs"].as_array().unwrap().len(), 1);
    assert_eq!(json["worldState"]["items"].as_array().unwrap().len(), 4);
    assert_eq!(json["worldState"]["environment"]["day"], 1);

    let unknown = decode_client_message(r#"{"type":"DANCE"}"#).unwrap_err();
    assert_eq!(unknown.to_string(), "Unknown message type: DANCE");
    let malformed = decode_client_message(r#"{"type":"MOVE","targetCol":"x"}"#).unwrap_err();
    assert_eq!(malformed.to_string(), "Malformed message.");
}

#[test]
fn test_world_update_carries_only_changed_entities() {
    let mut world = field();
    let walker = join(&mut world, 1, "Walker");
    let _idle = join(&mut world, 2, "Idler");

    world.handle_message(1, ClientMessage::Move { target_col: 9, target_row: 5 });
    world.tick(TICK_MS);
    world.tick(TICK_MS);

    let update = world.sync_update().expect("update after movement");
    assert_eq!(update.to, Recipient::Broadcast);
    let ServerMessage::WorldUpdate { players, npcs, items } = update.message else {
        panic!("expected WORLD_UPDATE");
    };
    assert_eq!(players.len(), 1);
    assert_eq!(players[0].id, walker);
    assert!(npcs.is_empty());
    assert_eq!(items.len(), 4);

    // Nothing new changed and the interval has not passed
    assert!(world.sync_update().is_none());
}
