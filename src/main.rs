//! Tileworld Game Server
//!
//! Authoritative multiplayer tile-world server with WebSocket clients and a
//! small HTTP management API.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use tileworld_server::api;
use tileworld_server::config::ServerConfig;
use tileworld_server::net::handler::{run_heartbeat, ConnectionHandler};
use tileworld_server::state::AppState;
use tileworld_server::VERSION;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    info!("Tileworld Game Server v{}", VERSION);

    // Load configuration
    let config = ServerConfig::load().await?;
    info!(
        "Configuration loaded from: {}",
        config.config_path.display()
    );
    if config.debug {
        debug!(?config, "Debug mode enabled");
    }

    // Create shutdown channel
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Build the world and shared state
    let (state, runner) = AppState::new(config.clone(), shutdown_tx.clone())?;
    let state = Arc::new(state);
    info!("Application state initialized");

    // Start the world actor
    let world_shutdown_rx = shutdown_tx.subscribe();
    let world_handle = tokio::spawn(runner.run(world_shutdown_rx));

    // Start WebSocket listener for game clients
    let ws_addr: SocketAddr = format!("0.0.0.0:{}", config.websocket_port).parse()?;
    let ws_listener = TcpListener::bind(ws_addr).await?;
    info!("WebSocket server listening on: {}", ws_addr);

    let ws_state = state.clone();
    let mut ws_shutdown_rx = shutdown_tx.subscribe();
    let ws_handle = tokio::spawn(async move {
        accept_websocket_connections(ws_listener, ws_state, &mut ws_shutdown_rx).await;
    });

    // Start HTTP management API
    let api_addr: SocketAddr = format!("0.0.0.0:{}", config.management_port).parse()?;
    let api_listener = TcpListener::bind(api_addr).await?;
    info!("Management API listening on: {}", api_addr);

    let api_state = state.clone();
    let api_shutdown_rx = shutdown_tx.subscribe();
    let api_handle = tokio::spawn(async move {
        run_api_server(api_listener, api_state, api_shutdown_rx).await;
    });

    // Start heartbeat sweep
    let heartbeat_handle = tokio::spawn(run_heartbeat(
        state.sessions.clone(),
        state.world.clone(),
        Duration::from_secs(config.heartbeat_interval_secs),
        shutdown_tx.subscribe(),
    ));

    info!("Server startup complete!");
    info!("{} is ready for connections", config.server_name);

    // Wait for shutdown signal
    wait_for_shutdown(shutdown_tx.clone()).await;

    info!("Shutting down server...");

    // Wait for tasks to finish
    let _ = ws_handle.await;
    let _ = api_handle.await;
    let _ = heartbeat_handle.await;
    match world_handle.await {
        Ok(world) => info!(players = world.player_count(), "World actor finished"),
        Err(e) => warn!("World actor ended abnormally: {}", e),
    }

    // Cleanup
    state.sessions.close_all();
    info!("All sessions closed");

    info!("Server shutdown complete. Goodbye!");
    Ok(())
}

/// Initialize the logging/tracing system
fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tileworld_server=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .init();
}

/// Accept incoming WebSocket connections
async fn accept_websocket_connections(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown_rx: &mut broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        if !state.accepting_connections() {
                            warn!("Rejecting connection from {}: world not running", addr);
                            continue;
                        }
                        info!("New WebSocket connection from: {}", addr);
                        let handler = ConnectionHandler::new(state.clone());
                        tokio::spawn(async move {
                            if let Err(e) = handler.handle_websocket(stream, addr).await {
                                warn!("WebSocket connection error from {}: {}", addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept WebSocket connection: {}", e);
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("WebSocket connection acceptor shutting down");
                break;
            }
        }
    }
}

/// Run the HTTP API server
async fn run_api_server(
    listener: TcpListener,
    state: Arc<AppState>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let router = api::create_router(state);

    info!("Starting management API server...");

    let shutdown_signal = async move {
        let _ = shutdown_rx.recv().await;
        info!("Management API server shutting down");
    };

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .unwrap_or_else(|e| error!("API server error: {}", e));
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn wait_for_shutdown(shutdown_tx: broadcast::Sender<()>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    // Signal all tasks to shut down
    let _ = shutdown_tx.send(());
}
