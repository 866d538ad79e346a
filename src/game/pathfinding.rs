//! Pathfinding module
//!
//! Grid A* over the effective tile map:
//! - Manhattan heuristic, 4-directional expansion, uniform step cost
//! - Open set is a `BinaryHeap` ordered by (f, insertion sequence), so
//!   the result is deterministic for a given map
//! - Scores and parents live in `Vec`s indexed by flat tile index
//! - Blocked destinations are swapped for a nearby walkable tile

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::config::GameplayConfig;
use crate::game::map::{TileMap, TilePos};

/// Search limits for one path request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathLimits {
    /// Maximum node expansions before giving up
    pub max_iterations: usize,
    /// Radius searched for a substitute when the destination is blocked
    pub fallback_radius: i32,
}

impl Default for PathLimits {
    fn default() -> Self {
        Self {
            max_iterations: 2000,
            fallback_radius: 3,
        }
    }
}

impl From<&GameplayConfig> for PathLimits {
    fn from(config: &GameplayConfig) -> Self {
        Self {
            max_iterations: config.path_max_iterations,
            fallback_radius: config.path_fallback_radius,
        }
    }
}

/// Entry in the open set (min-heap via reversed ordering)
#[derive(Debug, PartialEq, Eq)]
struct OpenEntry {
    f_score: u32,
    seq: u64,
    index: usize,
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Smallest f is "greatest"; on ties the earliest insertion wins.
        other
            .f_score
            .cmp(&self.f_score)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Find a path from `start` to `goal`.
///
/// The returned waypoints start with `start` and end with `goal` (or its
/// walkable substitute). An empty result means "cannot reach": the start
/// is off the map, no substitute exists, the search ran out of budget,
/// or the entity is already there.
pub fn find_path(map: &TileMap, start: TilePos, goal: TilePos, limits: PathLimits) -> Vec<TilePos> {
    if !map.in_bounds(start) {
        return Vec::new();
    }

    let goal = if map.is_walkable(goal) {
        goal
    } else {
        match nearest_walkable(map, start, goal, limits.fallback_radius) {
            Some(substitute) => substitute,
            None => return Vec::new(),
        }
    };

    if start == goal {
        return Vec::new();
    }

    let grid = map.grid();
    let (Some(start_index), Some(goal_index)) = (grid.index_of(start), grid.index_of(goal)) else {
        return Vec::new();
    };

    let tiles = grid.cols() * grid.rows();
    let mut g_score = vec![u32::MAX; tiles];
    let mut came_from: Vec<Option<usize>> = vec![None; tiles];
    let mut closed = vec![false; tiles];
    let mut open = BinaryHeap::new();
    let mut seq = 0u64;
    let mut iterations = 0usize;

    g_score[start_index] = 0;
    open.push(OpenEntry {
        f_score: start.manhattan(goal),
        seq,
        index: start_index,
    });

    while let Some(current) = open.pop() {
        if closed[current.index] {
            continue;
        }

        iterations += 1;
        if iterations > limits.max_iterations {
            return Vec::new();
        }

        if current.index == goal_index {
            return reconstruct_path(map, &came_from, goal_index);
        }
        closed[current.index] = true;

        let pos = grid.pos_of(current.index);
        let next_g = g_score[current.index] + 1;
        for neighbour in pos.neighbours() {
            let Some(ni) = grid.index_of(neighbour) else {
                continue;
            };
            if closed[ni] || !map.is_walkable(neighbour) {
                continue;
            }
            if next_g < g_score[ni] {
                g_score[ni] = next_g;
                came_from[ni] = Some(current.index);
                seq += 1;
                open.push(OpenEntry {
                    f_score: next_g + neighbour.manhattan(goal),
                    seq,
                    index: ni,
                });
            }
        }
    }

    Vec::new()
}

/// Walkable tile near a blocked destination.
///
/// Minimises `2 * distance-to-goal + distance-to-start` over the square
/// window of `radius` around the goal; the first minimum in row-major
/// order wins.
pub fn nearest_walkable(map: &TileMap, start: TilePos, goal: TilePos, radius: i32) -> Option<TilePos> {
    let mut best: Option<(u32, TilePos)> = None;

    for dr in -radius..=radius {
        for dc in -radius..=radius {
            let candidate = TilePos::new(goal.col + dc, goal.row + dr);
            if !map.is_walkable(candidate) {
                continue;
            }
            let score = 2 * candidate.manhattan(goal) + candidate.manhattan(start);
            if best.map_or(true, |(best_score, _)| score < best_score) {
                best = Some((score, candidate));
            }
        }
    }

    best.map(|(_, pos)| pos)
}

/// Path that ends within `range` of `target`.
///
/// Tries the target itself first. When that is unreachable (an NPC
/// behind a counter, say), the walkable tiles within range are tried
/// nearest-to-start first.
pub fn approach_path(
    map: &TileMap,
    start: TilePos,
    target: TilePos,
    range: u32,
    limits: PathLimits,
) -> Vec<TilePos> {
    let direct = find_path(map, start, target, limits);
    if direct.last().map_or(false, |end| end.manhattan(target) <= range) {
        return direct;
    }

    let reach = range as i32;
    let mut candidates = Vec::new();
    for dr in -reach..=reach {
        for dc in -reach..=reach {
            let pos = TilePos::new(target.col + dc, target.row + dr);
            if pos != start && pos.manhattan(target) <= range && map.is_walkable(pos) {
                candidates.push(pos);
            }
        }
    }
    candidates.sort_by_key(|pos| pos.manhattan(start));

    candidates
        .into_iter()
        .map(|pos| find_path(map, start, pos, limits))
        .find(|path| !path.is_empty())
        .unwrap_or_default()
}

fn reconstruct_path(map: &TileMap, came_from: &[Option<usize>], goal_index: usize) -> Vec<TilePos> {
    let grid = map.grid();
    let mut path = vec![grid.pos_of(goal_index)];
    let mut current = goal_index;
    while let Some(prev) = came_from[current] {
        path.push(grid.pos_of(prev));
        current = prev;
    }
    path.reverse();
    path
}
