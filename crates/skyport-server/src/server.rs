use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use skyport_core::envelope::push;
use skyport_relay::ApiRelay;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use crate::connection;
use crate::coordinator::Coordinator;
use crate::registry::{self, ConnectionRegistry};
use crate::router::GatewayState;

/// Valid operator-selectable port range (registered ports).
pub const PORT_MIN: u16 = 1024;
pub const PORT_MAX: u16 = 49151;

pub fn port_in_range(port: u16) -> bool {
    (PORT_MIN..=PORT_MAX).contains(&port)
}

/// Gateway configuration.
pub struct ServerConfig {
    pub port: u16,
    pub max_send_queue: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 9090,
            max_send_queue: 256,
        }
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Bind the listener and start serving. Returns a handle holding the
/// registry and the shutdown coordinator.
pub async fn start(
    config: ServerConfig,
    relay: Arc<dyn ApiRelay>,
) -> Result<GatewayHandle, std::io::Error> {
    let registry = Arc::new(ConnectionRegistry::new(config.max_send_queue));
    let cancel = CancellationToken::new();
    let coordinator = Coordinator::new(Arc::clone(&registry), cancel.clone());

    let _cleanup = registry::start_cleanup_task(Arc::clone(&registry), Duration::from_secs(60));

    let state = GatewayState {
        registry: Arc::clone(&registry),
        relay,
    };

    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(port = local_addr.port(), "gateway listening");

    let server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(cancel.cancelled_owned())
            .await
            .ok();
    });

    Ok(GatewayHandle {
        port: local_addr.port(),
        registry,
        coordinator,
        _server: server,
        _cleanup,
    })
}

/// Handle returned by `start()` — keeps background tasks alive.
pub struct GatewayHandle {
    pub port: u16,
    pub registry: Arc<ConnectionRegistry>,
    pub coordinator: Coordinator,
    _server: tokio::task::JoinHandle<()>,
    _cleanup: tokio::task::JoinHandle<()>,
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<GatewayState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: GatewayState) {
    let (conn_id, rx) = state.registry.register();
    tracing::info!(conn = %conn_id, open = state.registry.count(), "client connected");

    state
        .registry
        .send_to(conn_id, push::connection_established(Utc::now()).to_string());

    connection::handle_ws_connection(socket, conn_id, rx, state).await;
}

/// Health check HTTP endpoint.
async fn health_handler(State(state): State<GatewayState>) -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "ok",
        "connections": state.registry.count(),
    }))
}
