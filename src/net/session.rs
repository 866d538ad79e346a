//! Session management module
//!
//! Manages client sessions including:
//! - Session lifecycle (creation, tracking, cleanup)
//! - Session state machine (connected -> in game -> disconnected)
//! - Per-session bounded outbound queue
//! - Heartbeat liveness tracking
//! - Thread-safe session registry and message fan-out

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::{mpsc, watch};
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info, warn};

use crate::error::{NetworkError, Result, TileworldError};
use crate::game::scheduler::Outlet;
use crate::protocol::{Outbound, Recipient, ServerMessage};

/// Unique session identifier
pub type SessionId = u64;

/// Default outbound queue capacity per session
pub const DEFAULT_OUTBOUND_BUFFER: usize = 256;

/// Session state in the connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Socket open, no player yet
    Connected,
    /// Joined as a player
    InGame,
    /// Session is disconnecting
    Disconnecting,
    /// Session has been disconnected
    Disconnected,
}

impl SessionState {
    /// Check if the session is still active (not disconnecting/disconnected)
    pub fn is_active(&self) -> bool {
        !matches!(self, SessionState::Disconnecting | SessionState::Disconnected)
    }

    /// Get a human-readable name for the state
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Connected => "Connected",
            SessionState::InGame => "InGame",
            SessionState::Disconnecting => "Disconnecting",
            SessionState::Disconnected => "Disconnected",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// What the write task sends next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// Serialized server message
    Text(Arc<str>),
    /// Heartbeat probe
    Ping,
    /// Close the socket
    Close,
}

/// A connected client session
pub struct Session {
    /// Unique session identifier
    pub id: SessionId,
    /// Remote address of the client
    pub address: SocketAddr,
    /// Current session state
    state: RwLock<SessionState>,
    /// Display name once joined
    player_name: RwLock<Option<String>>,
    /// Time of session creation
    pub created_at: Instant,
    /// Time of last activity
    last_activity: RwLock<Instant>,
    /// Set by any inbound frame, cleared by each heartbeat
    alive: AtomicBool,
    /// Outbound frame queue drained by the write task
    outbound_tx: mpsc::Sender<OutboundFrame>,
    /// Raised when the server closes the session
    closed: watch::Sender<bool>,
}

impl Session {
    /// Create a new session and the receiving end of its queue
    pub fn new(id: SessionId, address: SocketAddr, buffer: usize) -> (Self, mpsc::Receiver<OutboundFrame>) {
        let (outbound_tx, outbound_rx) = mpsc::channel(buffer.max(1));
        let now = Instant::now();
        let session = Self {
            id,
            address,
            state: RwLock::new(SessionState::Connected),
            player_name: RwLock::new(None),
            created_at: now,
            last_activity: RwLock::new(now),
            alive: AtomicBool::new(true),
            outbound_tx,
            closed: watch::Sender::new(false),
        };
        (session, outbound_rx)
    }

    /// Get the IP address as a string (without port)
    pub fn ip(&self) -> String {
        self.address.ip().to_string()
    }

    /// Get the current session state
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Set the session state
    pub fn set_state(&self, new_state: SessionState) {
        let old_state = {
            let mut state = self.state.write();
            let old = *state;
            *state = new_state;
            old
        };
        debug!(
            session_id = self.id,
            old_state = %old_state,
            new_state = %new_state,
            "Session state changed"
        );
    }

    /// Check if session is active
    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    pub fn player_name(&self) -> Option<String> {
        self.player_name.read().clone()
    }

    /// Mark the session as joined under `name`
    pub fn enter_game(&self, name: String) {
        *self.player_name.write() = Some(name);
        self.set_state(SessionState::InGame);
    }

    /// Record inbound traffic
    pub fn touch(&self) {
        *self.last_activity.write() = Instant::now();
        self.alive.store(true, Ordering::Relaxed);
    }

    /// Get the last activity time
    pub fn last_activity(&self) -> Instant {
        *self.last_activity.read()
    }

    /// Get the duration since last activity
    pub fn idle_duration(&self) -> Duration {
        self.last_activity().elapsed()
    }

    /// Clear the liveness flag; returns whether it was set
    fn take_alive(&self) -> bool {
        self.alive.swap(false, Ordering::Relaxed)
    }

    /// Close from the server side: wakes the read task and tells the
    /// writer to close the socket
    pub fn close(&self) {
        self.closed.send_replace(true);
        if let Err(e) = self.try_send(OutboundFrame::Close) {
            debug!(session_id = self.id, error = %e, "Close frame not queued");
        }
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Resolves once `close` has been called
    pub async fn closed(&self) {
        let mut closed = self.closed.subscribe();
        let _ = closed.wait_for(|closed| *closed).await;
    }

    /// Queue a frame without blocking
    pub fn try_send(&self, frame: OutboundFrame) -> Result<()> {
        self.outbound_tx.try_send(frame).map_err(|e| {
            TileworldError::Network(match e {
                TrySendError::Full(_) => NetworkError::WriteBufferFull,
                TrySendError::Closed(_) => NetworkError::ConnectionClosed,
            })
        })
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("address", &self.address)
            .field("state", &self.state())
            .field("player_name", &self.player_name())
            .field("created_at", &self.created_at)
            .field("idle_duration", &self.idle_duration())
            .finish()
    }
}

/// Thread-safe session manager
pub struct SessionManager {
    /// Map of session ID to session
    sessions: DashMap<SessionId, Arc<Session>>,
    /// Map of IP address to list of session IDs (for connection limiting)
    ip_to_sessions: DashMap<String, Vec<SessionId>>,
    /// Next session ID to assign
    next_id: AtomicU64,
    /// Maximum sessions per IP
    max_per_ip: usize,
    /// Outbound queue capacity per session
    outbound_buffer: usize,
}

impl SessionManager {
    /// Create a new session manager
    pub fn new() -> Self {
        Self::with_limits(10, DEFAULT_OUTBOUND_BUFFER)
    }

    /// Create a session manager with custom limits
    pub fn with_limits(max_per_ip: usize, outbound_buffer: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            ip_to_sessions: DashMap::new(),
            next_id: AtomicU64::new(1),
            max_per_ip,
            outbound_buffer,
        }
    }

    /// Create a new session and register it
    pub fn create_session(&self, address: SocketAddr) -> Result<(Arc<Session>, mpsc::Receiver<OutboundFrame>)> {
        let ip = address.ip().to_string();

        // Check connection limit per IP
        let current_count = self.ip_to_sessions.get(&ip).map(|v| v.len()).unwrap_or(0);

        if current_count >= self.max_per_ip {
            warn!(
                ip = %ip,
                count = current_count,
                max = self.max_per_ip,
                "Connection limit exceeded for IP"
            );
            return Err(TileworldError::Network(NetworkError::TooManyConnections(ip)));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (session, outbound_rx) = Session::new(id, address, self.outbound_buffer);
        let session = Arc::new(session);

        self.sessions.insert(id, session.clone());
        self.ip_to_sessions.entry(ip).or_default().push(id);

        info!(session_id = id, address = %address, "Session created");

        Ok((session, outbound_rx))
    }

    /// Get a session by ID
    pub fn get(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.get(&id).map(|r| r.clone())
    }

    /// Remove a session
    pub fn remove(&self, id: SessionId) -> Option<Arc<Session>> {
        let (_, session) = self.sessions.remove(&id)?;
        session.set_state(SessionState::Disconnected);

        let ip = session.ip();
        if let Some(mut sessions) = self.ip_to_sessions.get_mut(&ip) {
            sessions.retain(|&sid| sid != id);
        }
        self.ip_to_sessions.retain(|_, v| !v.is_empty());

        info!(
            session_id = id,
            player = ?session.player_name(),
            "Session removed"
        );
        Some(session)
    }

    /// Ask every session's writer to close its socket
    pub fn close_all(&self) {
        for session in self.sessions.iter() {
            session.set_state(SessionState::Disconnecting);
            session.close();
        }
    }

    /// Get the count of active sessions
    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    /// Get the count of sessions per state
    pub fn count_by_state(&self) -> HashMap<SessionState, usize> {
        let mut counts = HashMap::new();
        for session in self.sessions.iter() {
            *counts.entry(session.state()).or_insert(0) += 1;
        }
        counts
    }

    /// Get list of all session IDs
    pub fn session_ids(&self) -> Vec<SessionId> {
        self.sessions.iter().map(|r| *r.key()).collect()
    }

    /// Queue a frame for one session; a full queue drops the frame
    pub fn send(&self, id: SessionId, frame: OutboundFrame) {
        let Some(session) = self.get(id) else {
            return;
        };
        if let Err(e) = session.try_send(frame) {
            debug!(session_id = id, error = %e, "Dropped outbound frame");
        }
    }

    /// One heartbeat pass.
    ///
    /// Sessions that stayed silent since the previous pass are closed and
    /// removed; the rest are pinged. Returns the removed ids.
    pub fn heartbeat(&self) -> Vec<SessionId> {
        let mut dead = Vec::new();
        for session in self.sessions.iter() {
            if session.take_alive() {
                if let Err(e) = session.try_send(OutboundFrame::Ping) {
                    debug!(session_id = session.id, error = %e, "Could not queue ping");
                }
            } else {
                dead.push(session.id);
            }
        }

        for id in &dead {
            if let Some(session) = self.remove(*id) {
                info!(
                    session_id = id,
                    idle_secs = session.idle_duration().as_secs(),
                    "Heartbeat timeout, dropping session"
                );
                session.close();
            }
        }
        dead
    }

    fn enter_game(&self, id: SessionId, message: &ServerMessage) {
        if let (Some(session), ServerMessage::JoinSuccess { player, .. }) = (self.get(id), message) {
            session.enter_game(player.public.name.clone());
        }
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Outlet for SessionManager {
    fn deliver(&self, messages: Vec<Outbound>) {
        for outbound in messages {
            let text: Arc<str> = match outbound.message.to_json() {
                Ok(text) => text.into(),
                Err(e) => {
                    error!(error = %e, "Failed to serialize server message");
                    continue;
                }
            };

            match outbound.to {
                Recipient::Session(id) => {
                    self.enter_game(id, &outbound.message);
                    self.send(id, OutboundFrame::Text(text));
                }
                Recipient::Broadcast => {
                    for id in self.session_ids() {
                        self.send(id, OutboundFrame::Text(text.clone()));
                    }
                }
                Recipient::BroadcastExcept(skip) => {
                    for id in self.session_ids().into_iter().filter(|id| *id != skip) {
                        self.send(id, OutboundFrame::Text(text.clone()));
                    }
                }
            }
        }
    }
}
