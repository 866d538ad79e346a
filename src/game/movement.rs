//! Movement module
//!
//! Shared movement state for players and NPCs. An entity walks its path
//! waypoint by waypoint in pixel space; the tile coordinate only changes
//! once a waypoint's centre is reached.

use serde::{Deserialize, Serialize};

use crate::game::map::{TilePos, TILE_SIZE};

/// Facing direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    /// Direction of a movement vector: the larger axis wins, ties go
    /// vertical. A zero vector has no direction.
    pub fn from_vector(dx: f64, dy: f64) -> Option<Self> {
        if dx == 0.0 && dy == 0.0 {
            return None;
        }
        if dx.abs() > dy.abs() {
            Some(if dx > 0.0 { Direction::East } else { Direction::West })
        } else {
            Some(if dy > 0.0 { Direction::South } else { Direction::North })
        }
    }
}

/// Position, path and speed of a walking entity
#[derive(Debug, Clone)]
pub struct Movement {
    tile: TilePos,
    x: f64,
    y: f64,
    path: Vec<TilePos>,
    path_index: usize,
    moving: bool,
    direction: Direction,
    /// Tiles per second
    speed: f64,
}

impl Movement {
    /// Standing still on the centre of `tile`
    pub fn new(tile: TilePos, speed: f64) -> Self {
        let (x, y) = tile.center();
        Self {
            tile,
            x,
            y,
            path: Vec::new(),
            path_index: 0,
            moving: false,
            direction: Direction::South,
            speed,
        }
    }

    pub fn tile(&self) -> TilePos {
        self.tile
    }

    /// Pixel position
    pub fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_moving(&self) -> bool {
        self.moving
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Waypoints not yet reached
    pub fn remaining(&self) -> &[TilePos] {
        self.path.get(self.path_index..).unwrap_or(&[])
    }

    /// Follow `path` from its first waypoint
    pub fn set_path(&mut self, path: Vec<TilePos>) {
        self.set_path_from(path, 0);
    }

    /// Follow `path` starting at `start_index`
    pub fn set_path_from(&mut self, path: Vec<TilePos>, start_index: usize) {
        if start_index < path.len() {
            self.path = path;
            self.path_index = start_index;
            self.moving = true;
        } else {
            self.clear_path();
        }
    }

    /// Stop walking.
    ///
    /// An entity caught between tiles walks back to its tile centre;
    /// returns the path that leaves it with.
    pub fn halt(&mut self) -> Vec<TilePos> {
        if (self.x, self.y) == self.tile.center() {
            self.clear_path();
            Vec::new()
        } else {
            let path = vec![self.tile];
            self.set_path(path.clone());
            path
        }
    }

    fn clear_path(&mut self) {
        self.path.clear();
        self.path_index = 0;
        self.moving = false;
    }

    /// Advance along the path by `delta_ms` of simulated time.
    ///
    /// Returns whether the entity moved.
    pub fn advance(&mut self, delta_ms: f64) -> bool {
        if !self.moving {
            return false;
        }
        let Some(&target) = self.path.get(self.path_index) else {
            self.clear_path();
            return false;
        };

        let (tx, ty) = target.center();
        let dx = tx - self.x;
        let dy = ty - self.y;
        let distance = (dx * dx + dy * dy).sqrt();
        let step = self.speed * TILE_SIZE * (delta_ms / 1000.0);

        if let Some(direction) = Direction::from_vector(dx, dy) {
            self.direction = direction;
        }

        if distance <= step {
            self.x = tx;
            self.y = ty;
            self.tile = target;
            self.path_index += 1;
            if self.path_index >= self.path.len() {
                self.clear_path();
            }
        } else {
            self.x += dx / distance * step;
            self.y += dy / distance * step;
        }

        true
    }
}

/// Anything that walks the map
pub trait Movable {
    fn movement(&self) -> &Movement;

    fn movement_mut(&mut self) -> &mut Movement;

    fn tile(&self) -> TilePos {
        self.movement().tile()
    }

    fn is_moving(&self) -> bool {
        self.movement().is_moving()
    }

    fn advance(&mut self, delta_ms: f64) -> bool {
        self.movement_mut().advance(delta_ms)
    }
}
