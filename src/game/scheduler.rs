//! World scheduler module
//!
//! Runs the world as a single actor task:
//! - Fixed-period tick loop measuring the real delta between ticks
//! - Inbound commands applied between ticks, in arrival order
//! - Outbound delivery through an [`Outlet`]
//! - Read-mostly status for the management API

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::error::NetworkError;
use crate::game::world::World;
use crate::net::session::SessionId;
use crate::protocol::{ClientMessage, Outbound};

/// Capacity of the world's inbound queue
pub const WORLD_QUEUE_CAPACITY: usize = 1024;

/// World state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldState {
    /// World is being built
    Initializing,
    /// Ticking and accepting players
    Running,
    /// Shutdown requested
    ShuttingDown,
    /// The actor has exited
    Stopped,
}

impl WorldState {
    /// Check if the world is accepting new connections
    pub fn accepting_connections(&self) -> bool {
        matches!(self, WorldState::Running)
    }

    /// Check if the world is processing ticks
    pub fn is_active(&self) -> bool {
        matches!(self, WorldState::Running | WorldState::ShuttingDown)
    }

    pub fn name(&self) -> &'static str {
        match self {
            WorldState::Initializing => "initializing",
            WorldState::Running => "running",
            WorldState::ShuttingDown => "shutting_down",
            WorldState::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for WorldState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Counters published by the world actor after every tick
#[derive(Debug)]
pub struct WorldStatus {
    state: RwLock<WorldState>,
    tick: AtomicU64,
    players: AtomicUsize,
    npcs: AtomicUsize,
    items: AtomicUsize,
    start_time: RwLock<Option<Instant>>,
}

impl WorldStatus {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(WorldState::Initializing),
            tick: AtomicU64::new(0),
            players: AtomicUsize::new(0),
            npcs: AtomicUsize::new(0),
            items: AtomicUsize::new(0),
            start_time: RwLock::new(None),
        }
    }

    pub fn state(&self) -> WorldState {
        *self.state.read()
    }

    /// Set the world state
    pub fn set_state(&self, new_state: WorldState) {
        let old_state = {
            let mut state = self.state.write();
            let old = *state;
            *state = new_state;
            old
        };
        info!(old_state = %old_state, new_state = %new_state, "World state changed");
    }

    pub fn tick(&self) -> u64 {
        self.tick.load(Ordering::Relaxed)
    }

    pub fn player_count(&self) -> usize {
        self.players.load(Ordering::Relaxed)
    }

    pub fn npc_count(&self) -> usize {
        self.npcs.load(Ordering::Relaxed)
    }

    pub fn item_count(&self) -> usize {
        self.items.load(Ordering::Relaxed)
    }

    /// Seconds since the world started running
    pub fn uptime_secs(&self) -> u64 {
        self.start_time
            .read()
            .map(|start| start.elapsed().as_secs())
            .unwrap_or(0)
    }

    fn mark_started(&self) {
        *self.start_time.write() = Some(Instant::now());
    }

    /// Copy the world's counters
    pub fn record(&self, world: &World) {
        self.tick.store(world.tick_count(), Ordering::Relaxed);
        self.players.store(world.player_count(), Ordering::Relaxed);
        self.npcs.store(world.npc_count(), Ordering::Relaxed);
        self.items.store(world.item_count(), Ordering::Relaxed);
    }
}

impl Default for WorldStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Where the world's outbound messages go
pub trait Outlet: Send + Sync {
    /// Hand messages to their recipients without blocking
    fn deliver(&self, messages: Vec<Outbound>);
}

/// Input to the world actor
#[derive(Debug, Clone)]
pub enum WorldMessage {
    /// A session asks to join under a display name
    Join {
        session_id: SessionId,
        player_name: String,
    },
    /// Any other decoded client command
    Command {
        session_id: SessionId,
        message: ClientMessage,
    },
    /// The session's connection is gone
    Disconnect { session_id: SessionId },
}

/// Cloneable sender half of the world actor
#[derive(Debug, Clone)]
pub struct WorldHandle {
    tx: mpsc::Sender<WorldMessage>,
}

impl WorldHandle {
    /// A handle and the queue it feeds
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<WorldMessage>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Queue a message for the world; waits while the queue is full
    pub async fn send(&self, message: WorldMessage) -> Result<(), NetworkError> {
        self.tx
            .send(message)
            .await
            .map_err(|_| NetworkError::WorldUnavailable)
    }

    /// Route a decoded client message
    pub async fn command(&self, session_id: SessionId, message: ClientMessage) -> Result<(), NetworkError> {
        let message = match message {
            ClientMessage::JoinGame { player_name } => WorldMessage::Join {
                session_id,
                player_name,
            },
            message => WorldMessage::Command { session_id, message },
        };
        self.send(message).await
    }

    pub async fn disconnect(&self, session_id: SessionId) -> Result<(), NetworkError> {
        self.send(WorldMessage::Disconnect { session_id }).await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// The world actor
pub struct WorldRunner {
    world: World,
    rx: mpsc::Receiver<WorldMessage>,
    outlet: Arc<dyn Outlet>,
    status: Arc<WorldStatus>,
    tick_rate: Duration,
}

impl WorldRunner {
    /// Wrap a world; returns the actor and a handle for feeding it
    pub fn new(world: World, outlet: Arc<dyn Outlet>, status: Arc<WorldStatus>) -> (Self, WorldHandle) {
        let (handle, rx) = WorldHandle::channel(WORLD_QUEUE_CAPACITY);
        let tick_rate = Duration::from_millis(world.settings.tick_rate_ms);
        status.record(&world);

        let runner = Self {
            world,
            rx,
            outlet,
            status,
            tick_rate,
        };
        (runner, handle)
    }

    /// Run until shutdown is signalled or every handle is dropped.
    ///
    /// Returns the world so callers can inspect its final state.
    pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) -> World {
        info!(
            name = %self.world.settings.name,
            tick_rate_ms = self.tick_rate.as_millis() as u64,
            "Starting world"
        );

        self.status.mark_started();
        self.status.set_state(WorldState::Running);

        let mut tick_interval = interval(self.tick_rate);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_tick = Instant::now();

        loop {
            tokio::select! {
                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let delta_ms = now.duration_since(last_tick).as_secs_f64() * 1000.0;
                    last_tick = now;
                    self.process_tick(delta_ms);
                }
                message = self.rx.recv() => {
                    match message {
                        Some(message) => self.process_message(message),
                        None => {
                            debug!("All world handles dropped");
                            break;
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        self.status.set_state(WorldState::ShuttingDown);
        self.status.record(&self.world);
        self.status.set_state(WorldState::Stopped);

        info!(
            total_ticks = self.world.tick_count(),
            uptime_secs = self.status.uptime_secs(),
            "World stopped"
        );
        self.world
    }

    fn process_tick(&mut self, delta_ms: f64) {
        let report = self.world.tick(delta_ms);
        if !report.outbound.is_empty() {
            self.outlet.deliver(report.outbound);
        }
        if let Some(update) = self.world.sync_update() {
            self.outlet.deliver(vec![update]);
        }
        self.status.record(&self.world);
    }

    fn process_message(&mut self, message: WorldMessage) {
        let outbound = match message {
            WorldMessage::Join {
                session_id,
                player_name,
            } => self
                .world
                .handle_message(session_id, ClientMessage::JoinGame { player_name }),
            WorldMessage::Command { session_id, message } => self.world.handle_message(session_id, message),
            WorldMessage::Disconnect { session_id } => self.world.handle_disconnect(session_id),
        };
        if !outbound.is_empty() {
            self.outlet.deliver(outbound);
        }
        self.status.record(&self.world);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::map::{TileGrid, TileKind, TilePos};
    use crate::game::world::WorldSettings;
    use crate::protocol::{Recipient, ServerMessage};
    use parking_lot::Mutex;
    use tokio_test::assert_ok;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<Outbound>>,
    }

    impl Recorder {
        fn types(&self) -> Vec<String> {
            self.sent
                .lock()
                .iter()
                .map(|o| o.message.to_json().unwrap())
                .collect()
        }

        fn count(&self, pred: impl Fn(&Outbound) -> bool) -> usize {
            self.sent.lock().iter().filter(|o| pred(o)).count()
        }
    }

    impl Outlet for Recorder {
        fn deliver(&self, messages: Vec<Outbound>) {
            self.sent.lock().extend(messages);
        }
    }

    fn small_world() -> World {
        let mut settings = WorldSettings::default()
            .with_seed(4)
            .with_map(TileGrid::filled(20, 20, TileKind::Grass).unwrap())
            .with_zones(Vec::new())
            .with_npcs(Vec::new())
            .with_spawn_point(TilePos::new(5, 5));
        settings.tick_rate_ms = 10;
        settings.sync_interval_ms = 10;
        World::with_settings(settings).unwrap()
    }

    async fn wait_for(recorder: &Recorder, pred: impl Fn(&Outbound) -> bool + Copy) {
        for _ in 0..200 {
            if recorder.count(pred) > 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("message never delivered: {:?}", recorder.types());
    }

    #[test]
    fn test_world_state() {
        assert!(WorldState::Running.accepting_connections());
        assert!(!WorldState::ShuttingDown.accepting_connections());
        assert!(!WorldState::Stopped.is_active());
        assert_eq!(WorldState::ShuttingDown.to_string(), "shutting_down");
    }

    #[tokio::test]
    async fn test_runner_ticks_and_stops() {
        let recorder = Arc::new(Recorder::default());
        let status = Arc::new(WorldStatus::new());
        let (runner, handle) = WorldRunner::new(small_world(), recorder.clone(), status.clone());
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let task = tokio::spawn(runner.run(shutdown_rx));
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(status.state(), WorldState::Running);
        assert!(status.tick() > 0);

        assert_ok!(shutdown_tx.send(()));
        let world = assert_ok!(task.await);
        assert_eq!(status.state(), WorldState::Stopped);
        assert!(world.tick_count() >= status.tick());
        assert!(handle.is_closed());
    }

    #[tokio::test]
    async fn test_runner_applies_commands_in_order() {
        let recorder = Arc::new(Recorder::default());
        let status = Arc::new(WorldStatus::new());
        let (runner, handle) = WorldRunner::new(small_world(), recorder.clone(), status.clone());
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = tokio::spawn(runner.run(shutdown_rx));

        assert_ok!(
            handle
                .command(
                    1,
                    ClientMessage::JoinGame {
                        player_name: "Alice".into()
                    }
                )
                .await
        );
        assert_ok!(
            handle
                .command(1, ClientMessage::Move { target_col: 9, target_row: 5 })
                .await
        );
        wait_for(&recorder, |o| matches!(o.message, ServerMessage::MoveAck { .. })).await;
        assert_eq!(
            recorder.count(|o| matches!(o.message, ServerMessage::JoinSuccess { .. }) && o.to == Recipient::Session(1)),
            1
        );
        assert_eq!(status.player_count(), 1);

        // Walking shows up in throttled world updates
        wait_for(&recorder, |o| matches!(o.message, ServerMessage::WorldUpdate { .. })).await;

        assert_ok!(handle.disconnect(1).await);
        wait_for(&recorder, |o| matches!(o.message, ServerMessage::PlayerLeft { .. })).await;
        assert_eq!(status.player_count(), 0);

        shutdown_tx.send(()).unwrap();
        assert_ok!(task.await);
    }

    #[tokio::test]
    async fn test_handle_errors_after_stop() {
        let recorder = Arc::new(Recorder::default());
        let (runner, handle) = WorldRunner::new(small_world(), recorder, Arc::new(WorldStatus::new()));
        drop(runner);
        assert!(matches!(
            handle.disconnect(1).await,
            Err(NetworkError::WorldUnavailable)
        ));
    }
}
