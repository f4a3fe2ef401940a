//! WebSocket endpoint for the rendezvous protocol.

mod handler;

pub use handler::handle_socket;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::room::RoomRegistry;

async fn ws_upgrade_handler(
    ws: WebSocketUpgrade,
    State(registry): State<Arc<RoomRegistry>>,
    addr: Result<ConnectInfo<SocketAddr>, axum::extract::rejection::ExtensionRejection>,
) -> Response {
    let client = addr
        .ok()
        .map(|a| a.0.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    ws.on_upgrade(move |socket| handle_socket(socket, registry, client))
}

/// Build the relay router. The permissive CORS layer is deliberate: the
/// clients are browsers served from whatever origin hosts the UI, and the
/// room id already acts as the capability token.
pub fn create_router(registry: Arc<RoomRegistry>) -> Router {
    Router::new()
        .route("/ws", get(ws_upgrade_handler))
        .layer(CorsLayer::permissive())
        .with_state(registry)
}
