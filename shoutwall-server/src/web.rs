//! WebSocket transport adapter and read-only REST API.
//!
//! The WebSocket endpoint (`/ws`) upgrades and bridges socket activity
//! onto the hub's handlers: inbound text frames become message events,
//! socket close becomes a disconnect event, and a drained outbound queue
//! means the hub tore the connection down. The REST surface is read-only —
//! if you want to act on the hub, speak WebSocket.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::ws::{Message as WsMessage, WebSocket};
use axum::extract::{ConnectInfo, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use tower_http::cors::CorsLayer;

use crate::connection::{self, Admitted};
use crate::server::SharedState;
use crate::topics::Topic;

/// Build the axum router with WebSocket and REST endpoints.
pub fn router(state: Arc<SharedState>) -> Router {
    let mut app = Router::new()
        .route("/ws", get(ws_upgrade))
        .route("/api/v1/health", get(api_health))
        .route("/api/v1/topic", get(api_topic))
        .route("/api/v1/presence", get(api_presence))
        .layer(CorsLayer::permissive())
        .with_state(Arc::clone(&state));

    // Serve the web client if the directory exists.
    if let Some(ref dir) = state.config.static_dir {
        let path = std::path::PathBuf::from(dir);
        if path.exists() {
            tracing::info!("serving web client from {}", path.display());
            app = app.fallback_service(tower_http::services::ServeDir::new(path));
        }
    }

    app
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<Arc<SharedState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_socket(socket, peer, state))
}

/// Bridge one WebSocket to the hub: admission, then a read/write loop
/// until the client goes away or the hub tears the connection down.
async fn serve_socket(mut socket: WebSocket, peer: SocketAddr, state: Arc<SharedState>) {
    let addr = peer.ip().to_string();
    let Some(Admitted { id, mut rx }) = connection::handle_connect(&state, &addr) else {
        // Over the per-address cap: close without allocating anything.
        let _ = socket.send(WsMessage::Close(None)).await;
        return;
    };

    loop {
        tokio::select! {
            outbound = rx.recv() => {
                match outbound {
                    Some(event) => {
                        let Ok(text) = serde_json::to_string(&event) else {
                            continue;
                        };
                        if socket.send(WsMessage::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    // Sender dropped: the hub already tore this connection
                    // down (ban), so there is no registry state left to clean.
                    None => {
                        let _ = socket.send(WsMessage::Close(None)).await;
                        return;
                    }
                }
            }
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(WsMessage::Text(text))) => {
                        connection::handle_message(&state, id, text.as_str(), Instant::now());
                    }
                    // Binary and control frames are not messages.
                    Some(Ok(_)) => {}
                    Some(Err(_)) | None => break,
                }
            }
        }
    }

    connection::handle_disconnect(&state, id);
}

async fn api_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn api_topic(State(state): State<Arc<SharedState>>) -> Json<Topic> {
    Json(state.current_topic.lock().clone())
}

async fn api_presence(State(state): State<Arc<SharedState>>) -> Json<serde_json::Value> {
    let connected = state.registry.lock().presence();
    Json(serde_json::json!({ "connected": connected }))
}
