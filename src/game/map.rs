//! Tile map module
//!
//! The world grid and its walkability rules:
//! - `TileKind` codes shared with the client
//! - `TileGrid`, the immutable static layout (shared via `Arc`)
//! - `TileMap`, the grid plus the dynamic overlay of placed tiles

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize, Serializer};

use crate::error::MapError;

/// Tile size in pixels
pub const TILE_SIZE: f64 = 32.0;

/// Columns in the standard map
pub const MAP_COLS: usize = 40;

/// Rows in the standard map
pub const MAP_ROWS: usize = 32;

/// Tile kinds, with the numeric codes clients render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TileKind {
    Grass = 0,
    Water = 1,
    Mountain = 2,
    Tree = 3,
    Path = 4,
    Wall = 5,
    Mine = 6,
    Bank = 7,
    Shop = 8,
    Sand = 9,
    Flower = 10,
}

impl TileKind {
    /// Decode a tile code
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(TileKind::Grass),
            1 => Some(TileKind::Water),
            2 => Some(TileKind::Mountain),
            3 => Some(TileKind::Tree),
            4 => Some(TileKind::Path),
            5 => Some(TileKind::Wall),
            6 => Some(TileKind::Mine),
            7 => Some(TileKind::Bank),
            8 => Some(TileKind::Shop),
            9 => Some(TileKind::Sand),
            10 => Some(TileKind::Flower),
            _ => None,
        }
    }

    /// Numeric code of this tile
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Whether pedestrians can stand on this tile
    pub fn is_walkable(self) -> bool {
        matches!(
            self,
            TileKind::Grass
                | TileKind::Path
                | TileKind::Shop
                | TileKind::Bank
                | TileKind::Sand
                | TileKind::Flower
        )
    }

    /// Whether resources may sit on this otherwise impassable tile
    pub fn holds_resources(self) -> bool {
        matches!(self, TileKind::Mountain | TileKind::Tree)
    }

    /// Lowercase name
    pub fn name(self) -> &'static str {
        match self {
            TileKind::Grass => "grass",
            TileKind::Water => "water",
            TileKind::Mountain => "mountain",
            TileKind::Tree => "tree",
            TileKind::Path => "path",
            TileKind::Wall => "wall",
            TileKind::Mine => "mine",
            TileKind::Bank => "bank",
            TileKind::Shop => "shop",
            TileKind::Sand => "sand",
            TileKind::Flower => "flower",
        }
    }
}

impl fmt::Display for TileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl Serialize for TileKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

/// A grid-aligned tile coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TilePos {
    pub col: i32,
    pub row: i32,
}

impl TilePos {
    pub const fn new(col: i32, row: i32) -> Self {
        Self { col, row }
    }

    /// Manhattan distance to another tile
    pub fn manhattan(&self, other: TilePos) -> u32 {
        self.col.abs_diff(other.col) + self.row.abs_diff(other.row)
    }

    /// Pixel coordinate of the tile centre
    pub fn center(&self) -> (f64, f64) {
        (
            self.col as f64 * TILE_SIZE + TILE_SIZE / 2.0,
            self.row as f64 * TILE_SIZE + TILE_SIZE / 2.0,
        )
    }

    /// The four orthogonal neighbours: up, right, down, left
    pub fn neighbours(&self) -> [TilePos; 4] {
        [
            TilePos::new(self.col, self.row - 1),
            TilePos::new(self.col + 1, self.row),
            TilePos::new(self.col, self.row + 1),
            TilePos::new(self.col - 1, self.row),
        ]
    }

    /// Whether the other tile is one orthogonal step away
    pub fn is_adjacent(&self, other: TilePos) -> bool {
        self.manhattan(other) == 1
    }
}

impl fmt::Display for TilePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.col, self.row)
    }
}

/// Immutable static tile layout
#[derive(Debug, Clone)]
pub struct TileGrid {
    cols: usize,
    rows: usize,
    tiles: Vec<TileKind>,
}

impl TileGrid {
    /// Build a grid from rows of tile codes
    pub fn from_codes<R: AsRef<[u8]>>(rows: &[R]) -> Result<Self, MapError> {
        let cols = rows.first().map(|r| r.as_ref().len()).unwrap_or(0);
        if rows.is_empty() || cols == 0 {
            return Err(MapError::Empty);
        }

        let mut tiles = Vec::with_capacity(cols * rows.len());
        for (row, codes) in rows.iter().enumerate() {
            let codes = codes.as_ref();
            if codes.len() != cols {
                return Err(MapError::RaggedRow {
                    row,
                    expected: cols,
                    actual: codes.len(),
                });
            }
            for (col, &code) in codes.iter().enumerate() {
                let kind = TileKind::from_code(code).ok_or(MapError::UnknownTile { code, col, row })?;
                tiles.push(kind);
            }
        }

        Ok(Self {
            cols,
            rows: rows.len(),
            tiles,
        })
    }

    /// A grid of a single tile kind
    pub fn filled(cols: usize, rows: usize, kind: TileKind) -> Result<Self, MapError> {
        if cols == 0 || rows == 0 {
            return Err(MapError::Empty);
        }
        Ok(Self {
            cols,
            rows,
            tiles: vec![kind; cols * rows],
        })
    }

    /// The standard compiled-in world layout
    pub fn standard() -> Result<Self, MapError> {
        Self::from_codes(&WORLD_MAP)
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn contains(&self, pos: TilePos) -> bool {
        pos.col >= 0 && pos.row >= 0 && (pos.col as usize) < self.cols && (pos.row as usize) < self.rows
    }

    /// Flat index of a tile, if in bounds
    pub fn index_of(&self, pos: TilePos) -> Option<usize> {
        if self.contains(pos) {
            Some(pos.row as usize * self.cols + pos.col as usize)
        } else {
            None
        }
    }

    /// Tile at a flat index
    pub fn pos_of(&self, index: usize) -> TilePos {
        TilePos::new((index % self.cols) as i32, (index / self.cols) as i32)
    }

    pub fn get(&self, pos: TilePos) -> Option<TileKind> {
        self.index_of(pos).map(|i| self.tiles[i])
    }

    /// Copy of this grid with some tiles replaced
    pub fn with_tiles(mut self, tiles: &[(TilePos, TileKind)]) -> Result<Self, MapError> {
        for &(pos, kind) in tiles {
            let index = self.index_of(pos).ok_or(MapError::OutOfBounds {
                col: pos.col,
                row: pos.row,
            })?;
            self.tiles[index] = kind;
        }
        Ok(self)
    }
}

/// Static grid plus the overlay of tiles players have placed
#[derive(Debug, Clone)]
pub struct TileMap {
    grid: Arc<TileGrid>,
    overlay: BTreeMap<TilePos, TileKind>,
}

impl TileMap {
    pub fn new(grid: Arc<TileGrid>) -> Self {
        Self {
            grid,
            overlay: BTreeMap::new(),
        }
    }

    /// Shared handle to the static grid
    pub fn grid(&self) -> &Arc<TileGrid> {
        &self.grid
    }

    pub fn cols(&self) -> usize {
        self.grid.cols()
    }

    pub fn rows(&self) -> usize {
        self.grid.rows()
    }

    pub fn in_bounds(&self, pos: TilePos) -> bool {
        self.grid.contains(pos)
    }

    /// Static tile, ignoring the overlay
    pub fn base_tile(&self, pos: TilePos) -> Option<TileKind> {
        self.grid.get(pos)
    }

    /// Effective tile: overlay if present, else static
    pub fn tile_at(&self, pos: TilePos) -> Option<TileKind> {
        self.overlay
            .get(&pos)
            .copied()
            .or_else(|| self.grid.get(pos))
    }

    /// Out of bounds is never walkable
    pub fn is_walkable(&self, pos: TilePos) -> bool {
        self.tile_at(pos).map(TileKind::is_walkable).unwrap_or(false)
    }

    /// Whether a resource may be spawned on this tile
    pub fn can_hold_resource(&self, pos: TilePos) -> bool {
        self.is_walkable(pos)
            || self
                .base_tile(pos)
                .map(TileKind::holds_resources)
                .unwrap_or(false)
    }

    pub fn overlay_at(&self, pos: TilePos) -> Option<TileKind> {
        self.overlay.get(&pos).copied()
    }

    /// Place an overlay tile
    pub fn set_overlay(&mut self, pos: TilePos, kind: TileKind) -> Result<(), MapError> {
        if !self.in_bounds(pos) {
            return Err(MapError::OutOfBounds {
                col: pos.col,
                row: pos.row,
            });
        }
        self.overlay.insert(pos, kind);
        Ok(())
    }

    /// Remove an overlay tile, returning what was there
    pub fn clear_overlay(&mut self, pos: TilePos) -> Option<TileKind> {
        self.overlay.remove(&pos)
    }

    /// All overlay entries in tile order
    pub fn overlay(&self) -> impl Iterator<Item = (TilePos, TileKind)> + '_ {
        self.overlay.iter().map(|(pos, kind)| (*pos, *kind))
    }
}

/// The standard 40 x 32 layout.
///
/// 0 grass, 1 water, 2 mountain, 3 tree, 4 path, 5 wall, 6 mine, 7 bank,
/// 8 shop, 9 sand, 10 flower.
#[rustfmt::skip]
pub const WORLD_MAP: [[u8; MAP_COLS]; MAP_ROWS] = [
    [2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2],
    [2, 6, 6, 0, 0, 6, 6, 0, 6, 2, 2, 0, 0, 3, 3, 3, 3, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2],
    [2, 6, 6, 0, 0, 6, 6, 0, 6, 2, 0, 0, 3, 3, 3, 3, 3, 0, 0, 0, 0, 0, 0, 0, 0, 3, 3, 3, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2],
    [2, 0, 0, 0, 0, 0, 0, 0, 6, 2, 0, 3, 3, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 3, 3, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2],
    [2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 3, 0, 0, 0, 0, 0, 0, 0, 4, 4, 4, 0, 0, 0, 0, 0, 3, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2],
    [2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 4, 0, 4, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2],
    [2, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 2],
    [2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 4, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2],
    [2, 0, 3, 3, 0, 0, 10, 10, 0, 0, 0, 0, 0, 0, 0, 0, 3, 3, 0, 4, 0, 0, 5, 5, 5, 5, 0, 0, 0, 0, 3, 3, 0, 0, 0, 0, 0, 0, 0, 2],
    [2, 0, 3, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 3, 0, 4, 0, 0, 5, 8, 8, 5, 0, 0, 0, 0, 0, 3, 0, 0, 0, 0, 0, 0, 0, 2],
    [2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 4, 0, 0, 5, 8, 8, 5, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 3, 3, 0, 2],
    [2, 0, 0, 10, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 4, 0, 0, 5, 5, 5, 5, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 3, 3, 0, 2],
    [1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2],
    [1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 4, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 4, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2],
    [1, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 4, 0, 5, 5, 5, 5, 0, 0, 5, 5, 5, 5, 0, 0, 0, 4, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2],
    [1, 1, 0, 0, 0, 0, 0, 0, 0, 10, 0, 0, 0, 4, 0, 5, 7, 7, 5, 0, 0, 5, 8, 8, 5, 0, 0, 0, 4, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2],
    [1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 4, 0, 5, 7, 7, 5, 0, 0, 5, 8, 8, 5, 0, 0, 0, 4, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2],
    [1, 0, 0, 0, 10, 10, 0, 0, 0, 0, 0, 0, 0, 4, 0, 5, 5, 5, 5, 0, 0, 5, 5, 5, 5, 0, 0, 0, 4, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2],
    [1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 4, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 4, 0, 0, 3, 3, 0, 0, 0, 0, 0, 0, 2],
    [1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 4, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 4, 0, 0, 3, 3, 3, 0, 0, 0, 0, 0, 2],
    [1, 1, 1, 0, 0, 10, 0, 0, 0, 0, 0, 0, 0, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 0, 0, 0, 3, 0, 0, 0, 0, 0, 0, 2],
    [2, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 4, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2],
    [2, 2, 1, 1, 0, 0, 3, 3, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 4, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2],
    [2, 2, 2, 1, 1, 0, 3, 3, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 4, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2],
    [2, 2, 2, 2, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 4, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 3, 3, 0, 0, 0, 0, 0, 2],
    [2, 2, 2, 2, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 4, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 3, 3, 3, 0, 0, 0, 0, 2],
    [2, 2, 2, 2, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 4, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 3, 0, 2],
    [2, 2, 2, 2, 2, 0, 0, 0, 3, 3, 0, 0, 0, 0, 0, 0, 0, 0, 0, 4, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 3, 0, 2],
    [2, 2, 2, 2, 2, 0, 0, 0, 3, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 4, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2],
    [2, 2, 2, 2, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 4, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2],
    [2, 2, 2, 2, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 4, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2],
    [2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2],
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_map() {
        let grid = TileGrid::standard().unwrap();
        assert_eq!(grid.cols(), MAP_COLS);
        assert_eq!(grid.rows(), MAP_ROWS);
        assert_eq!(grid.get(TilePos::new(0, 0)), Some(TileKind::Mountain));
        assert_eq!(grid.get(TilePos::new(19, 10)), Some(TileKind::Path));
        assert_eq!(grid.get(TilePos::new(16, 15)), Some(TileKind::Bank));
        assert_eq!(grid.get(TilePos::new(23, 9)), Some(TileKind::Shop));
        assert_eq!(grid.get(TilePos::new(40, 0)), None);
    }

    #[test]
    fn test_grid_errors() {
        let empty: [[u8; 0]; 0] = [];
        assert_eq!(TileGrid::from_codes(&empty).unwrap_err(), MapError::Empty);

        let ragged = [vec![0u8, 0, 0], vec![0u8, 0]];
        assert_eq!(
            TileGrid::from_codes(&ragged).unwrap_err(),
            MapError::RaggedRow {
                row: 1,
                expected: 3,
                actual: 2
            }
        );

        let unknown: [[u8; 2]; 1] = [[0, 11]];
        assert_eq!(
            TileGrid::from_codes(&unknown).unwrap_err(),
            MapError::UnknownTile {
                code: 11,
                col: 1,
                row: 0
            }
        );
    }

    #[test]
    fn test_walkability() {
        let map = TileMap::new(Arc::new(TileGrid::standard().unwrap()));

        assert!(map.is_walkable(TilePos::new(19, 10)));
        assert!(!map.is_walkable(TilePos::new(0, 12))); // water
        assert!(!map.is_walkable(TilePos::new(-1, 5)));
        assert!(!map.is_walkable(TilePos::new(5, 32)));

        // Mountain is impassable but can hold resources
        assert!(!map.is_walkable(TilePos::new(0, 0)));
        assert!(map.can_hold_resource(TilePos::new(0, 0)));
        assert!(!map.can_hold_resource(TilePos::new(0, 12)));
    }

    #[test]
    fn test_overlay() {
        let mut map = TileMap::new(Arc::new(TileGrid::filled(4, 4, TileKind::Grass).unwrap()));
        let pos = TilePos::new(2, 2);

        map.set_overlay(pos, TileKind::Wall).unwrap();
        assert_eq!(map.tile_at(pos), Some(TileKind::Wall));
        assert_eq!(map.base_tile(pos), Some(TileKind::Grass));
        assert!(!map.is_walkable(pos));

        assert!(map.set_overlay(TilePos::new(4, 0), TileKind::Wall).is_err());
        assert_eq!(map.overlay().count(), 1);

        assert_eq!(map.clear_overlay(pos), Some(TileKind::Wall));
        assert!(map.is_walkable(pos));
    }

    #[test]
    fn test_tile_pos() {
        let a = TilePos::new(0, 0);
        let b = TilePos::new(3, -2);
        assert_eq!(a.manhattan(b), 5);
        assert_eq!(a.center(), (16.0, 16.0));
        assert!(a.is_adjacent(TilePos::new(0, 1)));
        assert!(!a.is_adjacent(TilePos::new(1, 1)));
        assert_eq!(
            a.neighbours(),
            [
                TilePos::new(0, -1),
                TilePos::new(1, 0),
                TilePos::new(0, 1),
                TilePos::new(-1, 0)
            ]
        );
    }
}
