//! Connection handler module
//!
//! Handles the lifecycle of client connections including:
//! - WebSocket upgrade and session registration
//! - A read task that decodes frames and forwards them to the world in order
//! - A write task that drains the session's outbound queue
//! - The periodic heartbeat sweep
//! - Graceful disconnection

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, Stream, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{accept_async, WebSocketStream};
use tracing::{debug, info, trace, warn};

use crate::error::{NetworkError, ProtocolError, Result, TileworldError};
use crate::game::scheduler::{Outlet, WorldHandle};
use crate::net::session::{OutboundFrame, Session, SessionId, SessionManager, SessionState};
use crate::protocol::{decode_client_message, Outbound, ServerMessage};
use crate::state::AppState;

type WsStream = WebSocketStream<TcpStream>;

/// Connection handler for processing client connections
pub struct ConnectionHandler {
    /// Shared application state
    state: Arc<AppState>,
}

impl ConnectionHandler {
    /// Create a new connection handler
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Handle a WebSocket connection until either side closes it
    pub async fn handle_websocket(&self, stream: TcpStream, addr: SocketAddr) -> Result<()> {
        debug!(address = %addr, "Handling WebSocket connection");

        // Set TCP options before upgrade
        stream.set_nodelay(true)?;

        let ws_stream = accept_async(stream)
            .await
            .map_err(|e| TileworldError::Network(NetworkError::WebSocket(e.to_string())))?;

        let (session, outbound_rx) = self.state.sessions.create_session(addr)?;
        let session_id = session.id;
        info!(session_id, address = %addr, "WebSocket connection established");

        let (sink, stream) = ws_stream.split();
        let writer = tokio::spawn(write_frames(sink, outbound_rx, session_id));

        let result = self.read_frames(stream, &session).await;

        // Cleanup
        debug!(session_id, "Connection handler ending");
        session.set_state(SessionState::Disconnecting);
        if let Err(e) = self.state.world.disconnect(session_id).await {
            debug!(session_id, error = %e, "World gone before disconnect");
        }
        self.state.sessions.remove(session_id);

        // The writer ends once the last sender is gone
        drop(session);
        if let Err(e) = writer.await {
            trace!(session_id, error = %e, "Writer task failed");
        }

        result
    }

    /// Read loop: decode each text frame and hand it to the world.
    ///
    /// Ends when the peer closes, the stream fails, or the server closes
    /// the session (heartbeat timeout or shutdown).
    async fn read_frames<S>(&self, mut stream: S, session: &Session) -> Result<()>
    where
        S: Stream<Item = std::result::Result<Message, WsError>> + Unpin,
    {
        loop {
            let frame = tokio::select! {
                biased;
                _ = session.closed() => {
                    debug!(session_id = session.id, "Session closed by server");
                    break;
                }
                frame = stream.next() => frame,
            };
            let Some(frame) = frame else {
                break;
            };
            let frame = frame.map_err(|e| TileworldError::Network(NetworkError::WebSocket(e.to_string())))?;
            session.touch();

            match frame {
                Message::Text(text) => self.route_text(session.id, &text).await?,
                Message::Binary(_) => {
                    self.reject(session.id, ProtocolError::MalformedMessage("binary frame".to_string()));
                }
                Message::Close(_) => {
                    debug!(session_id = session.id, "Client sent close frame");
                    break;
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
        Ok(())
    }

    async fn route_text(&self, session_id: SessionId, text: &str) -> Result<()> {
        match decode_client_message(text) {
            Ok(message) => {
                trace!(session_id, kind = message.kind(), "Client message");
                self.state.world.command(session_id, message).await?;
            }
            Err(e) => self.reject(session_id, e),
        }
        Ok(())
    }

    /// Answer an undecodable frame; the connection stays open
    fn reject(&self, session_id: SessionId, error: ProtocolError) {
        debug!(session_id, error = ?error, "Rejected client frame");
        self.state
            .sessions
            .deliver(vec![Outbound::to(session_id, ServerMessage::error(error.to_string()))]);
    }
}

/// Write loop: drain the outbound queue into the socket
async fn write_frames(
    mut sink: SplitSink<WsStream, Message>,
    mut outbound_rx: mpsc::Receiver<OutboundFrame>,
    session_id: SessionId,
) {
    while let Some(frame) = outbound_rx.recv().await {
        let result = match frame {
            OutboundFrame::Text(text) => sink.send(Message::Text(text.to_string())).await,
            OutboundFrame::Ping => sink.send(Message::Ping(Vec::new())).await,
            OutboundFrame::Close => break,
        };
        if let Err(e) = result {
            debug!(session_id, error = %e, "Write failed");
            return;
        }
    }

    if let Err(e) = sink.send(Message::Close(None)).await {
        trace!(session_id, error = %e, "Close frame not sent");
    }
    let _ = sink.close().await;
}

/// Run the heartbeat sweep until shutdown
pub async fn run_heartbeat(
    sessions: Arc<SessionManager>,
    world: WorldHandle,
    period: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(period);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                for session_id in sessions.heartbeat() {
                    if let Err(e) = world.disconnect(session_id).await {
                        warn!(session_id, error = %e, "Could not notify world of dropped session");
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                debug!("Heartbeat shutting down");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::scheduler::WorldMessage;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_heartbeat_reports_dropped_sessions() {
        let sessions = Arc::new(SessionManager::new());
        let (silent, _rx) = assert_ok!(sessions.create_session("127.0.0.1:9".parse().unwrap()));
        let (handle, mut world_rx) = WorldHandle::channel(8);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let task = tokio::spawn(run_heartbeat(
            sessions.clone(),
            handle,
            Duration::from_millis(10),
            shutdown_rx,
        ));

        // Two sweeps: ping, then drop
        let message = tokio::time::timeout(Duration::from_secs(2), world_rx.recv())
            .await
            .unwrap();
        assert!(matches!(
            message,
            Some(WorldMessage::Disconnect { session_id }) if session_id == silent.id
        ));
        assert!(sessions.get(silent.id).is_none());

        shutdown_tx.send(()).unwrap();
        assert_ok!(task.await);
    }

    #[tokio::test]
    async fn test_read_loop_ends_when_heartbeat_drops_session() {
        let (shutdown_tx, _) = broadcast::channel(1);
        let (state, _runner) = AppState::new(crate::config::ServerConfig::default(), shutdown_tx).unwrap();
        let state = Arc::new(state);
        let handler = ConnectionHandler::new(state.clone());
        let (session, _outbound_rx) = assert_ok!(state.sessions.create_session("127.0.0.1:9".parse().unwrap()));

        // A half-open peer: nothing ever arrives
        let silent = futures_util::stream::pending::<std::result::Result<Message, WsError>>();
        let sweep = async {
            tokio::task::yield_now().await;
            assert!(state.sessions.heartbeat().is_empty());
            assert_eq!(state.sessions.heartbeat(), vec![session.id]);
        };

        let (result, ()) = tokio::time::timeout(Duration::from_secs(2), async {
            tokio::join!(handler.read_frames(silent, &session), sweep)
        })
        .await
        .expect("read loop should end after the session is dropped");
        assert_ok!(result);
        assert!(session.is_closed());
    }
}
