mod catalog;
mod catalog_io;
mod config;
mod error;
mod graph;
mod planner;
mod registry;
mod session;
mod shapes;
mod state;
mod trilateration;
mod window;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::config::Config;
use crate::registry::ClientRegistry;
use crate::session::Session;
use crate::state::{Engine, SharedEngine};

static STARTUP_MS: AtomicU64 = AtomicU64::new(0);

/// Transport-level keepalive: a ping every 20s, and a client that hasn't
/// ponged back by the next tick is considered gone.
const PING_INTERVAL: Duration = Duration::from_secs(20);

#[derive(Clone)]
struct AppState {
    engine: SharedEngine,
    registry: Arc<ClientRegistry>,
}

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("nav_backend=info,tower_http=warn")),
        )
        .init();

    STARTUP_MS.store(now_ms(), Ordering::Relaxed);

    if let Err(e) = run().await {
        warn!("nav-backend exited: {e:#}");
    }
}

async fn run() -> anyhow::Result<()> {
    let config = Config::from_env();
    let catalog = Catalog::embedded();
    catalog_io::ensure_files(&catalog, &config.graph_file, &config.targets_file).await;

    let host = config.host.clone();
    let port = config.port;
    let engine: SharedEngine = Arc::new(Engine::new(config, catalog));
    let registry = Arc::new(ClientRegistry::new());
    let app_state = AppState { engine, registry };

    let cors = match std::env::var("CORS_ORIGINS").ok().as_deref() {
        Some("*") | None => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
        Some(origins) => {
            let parsed: Vec<_> = origins.split(',').filter_map(|o| o.trim().parse().ok()).collect();
            CorsLayer::new().allow_origin(parsed)
        }
    };

    let app = Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws_upgrade))
        .layer(cors)
        .with_state(app_state);

    let addr = format!("{host}:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("could not bind {addr}: {e}"))?;
    info!("nav-backend listening on {addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> impl IntoResponse {
    let uptime_secs = (now_ms().saturating_sub(STARTUP_MS.load(Ordering::Relaxed))) / 1000;
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptimeSecs": uptime_secs,
    }))
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<serde_json::Value>();
    let client_id = state.registry.join(tx).await;
    info!("client {client_id} connected");

    let mut session = Session::new(state.engine.config.rssi_min_valid);
    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    ping_interval.tick().await; // first tick fires immediately; consume it
    let mut awaiting_pong = false;

    loop {
        tokio::select! {
            maybe_msg = receiver.next() => {
                match maybe_msg {
                    Some(Ok(Message::Text(text))) => {
                        let parsed: serde_json::Value = match serde_json::from_str(&text) {
                            Ok(v) => v,
                            Err(e) => {
                                warn!("client {client_id}: malformed message: {e}");
                                continue;
                            }
                        };
                        let outbound_msgs = session::handle_message(&state.engine, &mut session, parsed).await;
                        for msg in outbound_msgs {
                            state.registry.broadcast(msg).await;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        awaiting_pong = false;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        warn!("client {client_id}: transport error: {e}");
                        break;
                    }
                    _ => {}
                }
            }
            value = rx.recv() => {
                let Some(value) = value else { break };
                if sender.send(Message::Text(value.to_string())).await.is_err() {
                    break;
                }
            }
            _ = ping_interval.tick() => {
                if awaiting_pong {
                    warn!("client {client_id}: ping timeout, disconnecting");
                    break;
                }
                if sender.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
                awaiting_pong = true;
            }
        }
    }

    state.registry.leave(client_id).await;
    info!("client {client_id} disconnected");
}
