//! Per-connection WebSocket lifecycle: reader/writer tasks and heartbeat.

use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures::{SinkExt, StreamExt};
use skyport_core::ConnId;
use tokio::sync::mpsc;

use crate::registry::HEARTBEAT_INTERVAL;
use crate::router::{self, GatewayState};

/// Drive one WebSocket to completion.
///
/// The writer drains the outbound queue and pings on an interval; when the
/// registry drops the sender (kill or shutdown) it finishes delivering
/// queued messages and only then closes the socket, so no connection is
/// closed before its final push. The reader handles inbound messages
/// sequentially to completion. The registry entry is removed when either
/// side finishes.
pub async fn handle_ws_connection(
    socket: WebSocket,
    conn_id: ConnId,
    mut rx: mpsc::Receiver<String>,
    state: GatewayState,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let writer = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(HEARTBEAT_INTERVAL);
        ping_interval.tick().await; // consume first immediate tick

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    match msg {
                        Some(text) => {
                            if ws_tx.send(WsMessage::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        // queue closed and drained: close the socket
                        None => break,
                    }
                }
                _ = ping_interval.tick() => {
                    if ws_tx.send(WsMessage::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }

        let _ = ws_tx.send(WsMessage::Close(None)).await;
    });

    let reader_state = state.clone();
    let reader = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            match msg {
                WsMessage::Text(text) => {
                    router::handle_message(&reader_state, conn_id, text.as_str()).await;
                }
                WsMessage::Pong(_) => reader_state.registry.record_pong(conn_id),
                WsMessage::Close(_) => break,
                WsMessage::Ping(_) => {} // axum replies automatically
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = writer => {},
        _ = reader => {},
    }

    state.registry.unregister(conn_id);
    tracing::info!(conn = %conn_id, open = state.registry.count(), "client disconnected");
}
