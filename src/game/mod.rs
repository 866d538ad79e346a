//! Game module
//!
//! This module contains the simulation for the Tileworld server:
//! - Tile map, pathfinding and tile-by-tile movement
//! - Players, NPCs and their move-then-act actions
//! - Resource zones with cooldown respawns
//! - Inventory, equipment, bank and shops
//! - The world aggregate and the actor that ticks it

pub mod action;
pub mod bank;
pub mod chat;
pub mod combat;
pub mod commands;
pub mod economy;
pub mod environment;
pub mod equipment;
pub mod inventory;
pub mod item;
pub mod map;
pub mod movement;
pub mod npc;
pub mod pathfinding;
pub mod player;
pub mod respawn;
pub mod scheduler;
pub mod sync;
pub mod world;

pub use map::{TileKind, TileMap, TilePos};
pub use scheduler::{Outlet, WorldHandle, WorldMessage, WorldRunner, WorldState, WorldStatus};
pub use world::{World, WorldSettings};
