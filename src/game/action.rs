//! Deferred action module
//!
//! Move-then-act for proximity gated commands:
//! - In range: the action runs at once
//! - Out of range: the player walks toward the target carrying the action
//! - Arrival: the world replays the action exactly once, without walking
//!   again if the target has moved off
//!
//! Gathering never walks. A manual move replaces whatever was pending.

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::GameError;
use crate::game::item::ItemKind;
use crate::game::map::{TileMap, TilePos};
use crate::game::movement::Movable;
use crate::game::pathfinding::{approach_path, PathLimits};
use crate::game::player::Player;

/// What an interact request points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Npc,
    Item,
}

/// Shop order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeOrder {
    Buy { kind: ItemKind, quantity: u32 },
    Sell { item_id: Uuid, quantity: u32 },
}

/// Bank transfer direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BankAction {
    Deposit,
    Withdraw,
}

/// A captured request waiting for its player to arrive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingAction {
    Interact { target_id: Uuid, kind: TargetKind },
    Gather { zone: String },
    Trade { npc_id: Uuid, order: TradeOrder },
    Bank {
        npc_id: Uuid,
        action: BankAction,
        item_id: Uuid,
        quantity: Option<u32>,
    },
}

impl PendingAction {
    /// Error for a request made from too far away
    pub fn out_of_range(&self) -> GameError {
        match self {
            PendingAction::Gather { .. } => GameError::TooFarToGather,
            _ => GameError::OutOfRange,
        }
    }

    /// Short label for logs
    pub fn label(&self) -> &'static str {
        match self {
            PendingAction::Interact { .. } => "interact",
            PendingAction::Gather { .. } => "gather",
            PendingAction::Trade { .. } => "trade",
            PendingAction::Bank { .. } => "bank",
        }
    }
}

/// Per-player action state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ActionState {
    #[default]
    Idle,
    /// Walking; `pending` runs on arrival
    Moving { pending: Option<PendingAction> },
}

impl ActionState {
    pub fn pending(&self) -> Option<&PendingAction> {
        match self {
            ActionState::Moving { pending } => pending.as_ref(),
            ActionState::Idle => None,
        }
    }

    /// Return to idle, handing back any pending action
    pub fn finish(&mut self) -> Option<PendingAction> {
        match std::mem::take(self) {
            ActionState::Moving { pending } => pending,
            ActionState::Idle => None,
        }
    }
}

/// Whether an out-of-range player may walk toward the target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Approach {
    Walk,
    Stay,
}

/// Outcome of the proximity gate
#[derive(Debug, PartialEq)]
pub enum Gate {
    /// Close enough; perform the action now
    Ready(PendingAction),
    /// Walking toward the target along this path
    Deferred(Vec<TilePos>),
}

/// Gate `action` on the player being within `range` of `target`.
///
/// When the player is too far away and may walk, a path is computed and
/// the action is attached as the player's only pending action. With
/// `Approach::Stay`, or when the target is unreachable, it fails without
/// touching the player.
pub fn gate(
    player: &mut Player,
    map: &TileMap,
    target: TilePos,
    range: u32,
    limits: PathLimits,
    action: PendingAction,
    approach: Approach,
) -> Result<Gate, GameError> {
    let here = player.tile();
    if here.manhattan(target) <= range {
        return Ok(Gate::Ready(action));
    }
    if approach == Approach::Stay {
        return Err(action.out_of_range());
    }

    let path = approach_path(map, here, target, range, limits);
    if path.is_empty() {
        return Err(GameError::Unreachable);
    }

    debug!(
        player = %player.name,
        action = action.label(),
        to = %target,
        steps = path.len(),
        "Deferring action until arrival"
    );
    player.movement_mut().set_path(path.clone());
    player.action = ActionState::Moving {
        pending: Some(action),
    };
    Ok(Gate::Deferred(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::map::{TileGrid, TileKind};
    use std::sync::Arc;

    fn open_map() -> TileMap {
        TileMap::new(Arc::new(TileGrid::filled(20, 20, TileKind::Grass).unwrap()))
    }

    fn gather(zone: &str) -> PendingAction {
        PendingAction::Gather {
            zone: zone.to_string(),
        }
    }

    #[test]
    fn test_in_range_runs_now() {
        let map = open_map();
        let mut player = Player::new(1, "Alice".into(), TilePos::new(2, 2), 2.5);

        let outcome = gate(&mut player, &map, TilePos::new(4, 3), 3, PathLimits::default(), gather("A"), Approach::Walk).unwrap();
        assert_eq!(outcome, Gate::Ready(gather("A")));
        assert!(!player.is_moving());
        assert_eq!(player.action, ActionState::Idle);
    }

    #[test]
    fn test_out_of_range_defers() {
        let map = open_map();
        let mut player = Player::new(1, "Alice".into(), TilePos::new(0, 0), 2.5);

        let outcome = gate(&mut player, &map, TilePos::new(10, 0), 3, PathLimits::default(), gather("A"), Approach::Walk).unwrap();
        let Gate::Deferred(path) = outcome else {
            panic!("expected a deferred action");
        };
        assert_eq!(path.first(), Some(&TilePos::new(0, 0)));
        assert_eq!(path.last().unwrap().manhattan(TilePos::new(10, 0)), 0);
        assert!(player.is_moving());
        assert_eq!(player.pending(), Some(&gather("A")));
    }

    #[test]
    fn test_new_request_replaces_pending() {
        let map = open_map();
        let mut player = Player::new(1, "Alice".into(), TilePos::new(0, 0), 2.5);
        let limits = PathLimits::default();

        gate(&mut player, &map, TilePos::new(10, 0), 3, limits, gather("A"), Approach::Walk).unwrap();
        gate(&mut player, &map, TilePos::new(0, 10), 3, limits, gather("B"), Approach::Walk).unwrap();
        assert_eq!(player.pending(), Some(&gather("B")));
    }

    #[test]
    fn test_unreachable_changes_nothing() {
        // Target sealed inside a ring of water
        let grid = TileGrid::filled(20, 20, TileKind::Grass)
            .unwrap()
            .with_tiles(
                &(0..20)
                    .map(|i| (TilePos::new(i, 10), TileKind::Water))
                    .collect::<Vec<_>>(),
            )
            .unwrap();
        let map = TileMap::new(Arc::new(grid));
        let mut player = Player::new(1, "Alice".into(), TilePos::new(0, 0), 2.5);

        let result = gate(&mut player, &map, TilePos::new(5, 18), 3, PathLimits::default(), gather("A"), Approach::Walk);
        assert_eq!(result, Err(GameError::Unreachable));
        assert!(!player.is_moving());
        assert!(player.pending().is_none());
    }

    #[test]
    fn test_stay_rejects_out_of_range() {
        let map = open_map();
        let mut player = Player::new(1, "Alice".into(), TilePos::new(0, 0), 2.5);
        let limits = PathLimits::default();

        let result = gate(&mut player, &map, TilePos::new(10, 0), 3, limits, gather("A"), Approach::Stay);
        assert_eq!(result, Err(GameError::TooFarToGather));

        let trade = PendingAction::Trade {
            npc_id: Uuid::new_v4(),
            order: TradeOrder::Buy {
                kind: ItemKind::Bread,
                quantity: 1,
            },
        };
        let result = gate(&mut player, &map, TilePos::new(10, 0), 3, limits, trade, Approach::Stay);
        assert_eq!(result, Err(GameError::OutOfRange));
        assert!(!player.is_moving());
        assert_eq!(player.action, ActionState::Idle);
    }

    #[test]
    fn test_finish_returns_pending_once() {
        let mut state = ActionState::Moving {
            pending: Some(gather("A")),
        };
        assert_eq!(state.finish(), Some(gather("A")));
        assert_eq!(state, ActionState::Idle);
        assert_eq!(state.finish(), None);
    }
}
