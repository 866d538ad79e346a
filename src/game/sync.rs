//! World synchronization module
//!
//! Collects what changed across ticks and decides when a world update
//! goes out:
//! - `DeltaAccumulator` merges the changed sets of successive ticks
//! - `SyncThrottle` limits broadcasts to one per sync interval
//!
//! Entities that did not change are left out of the update.

use std::collections::BTreeSet;

use uuid::Uuid;

/// Entities changed since the last broadcast
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dirty {
    pub players: BTreeSet<Uuid>,
    pub npcs: BTreeSet<Uuid>,
    pub items: bool,
}

impl Dirty {
    pub fn is_empty(&self) -> bool {
        self.players.is_empty() && self.npcs.is_empty() && !self.items
    }
}

/// Merges tick deltas until the next broadcast
#[derive(Debug, Default)]
pub struct DeltaAccumulator {
    pending: Dirty,
}

impl DeltaAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_players<I: IntoIterator<Item = Uuid>>(&mut self, ids: I) {
        self.pending.players.extend(ids);
    }

    pub fn mark_npcs<I: IntoIterator<Item = Uuid>>(&mut self, ids: I) {
        self.pending.npcs.extend(ids);
    }

    pub fn mark_items(&mut self) {
        self.pending.items = true;
    }

    /// Forget a player that left before the next broadcast
    pub fn forget_player(&mut self, id: &Uuid) {
        self.pending.players.remove(id);
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Hand over everything collected so far
    pub fn take(&mut self) -> Dirty {
        std::mem::take(&mut self.pending)
    }
}

/// Rate limit for world updates
#[derive(Debug, Clone)]
pub struct SyncThrottle {
    interval_ms: u64,
    last_sync_ms: Option<u64>,
}

impl SyncThrottle {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            last_sync_ms: None,
        }
    }

    /// Whether a broadcast may go out at `now_ms`; records it if so
    pub fn ready(&mut self, now_ms: u64) -> bool {
        let due = self
            .last_sync_ms
            .map_or(true, |last| now_ms.saturating_sub(last) >= self.interval_ms);
        if due {
            self.last_sync_ms = Some(now_ms);
        }
        due
    }
}
