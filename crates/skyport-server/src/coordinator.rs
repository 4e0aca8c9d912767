use std::sync::Arc;

use serde_json::Value;
use skyport_core::envelope::push;
use tokio_util::sync::CancellationToken;

use crate::registry::ConnectionRegistry;

/// Sends push notifications to all connections and orchestrates shutdown.
#[derive(Clone)]
pub struct Coordinator {
    registry: Arc<ConnectionRegistry>,
    cancel: CancellationToken,
}

impl Coordinator {
    pub fn new(registry: Arc<ConnectionRegistry>, cancel: CancellationToken) -> Self {
        Self { registry, cancel }
    }

    /// Send a push envelope to every open connection. No acknowledgment.
    pub fn broadcast(&self, envelope: &Value) {
        self.registry.broadcast(&envelope.to_string());
    }

    pub fn broadcast_log(&self, message: &str, kind: &str) {
        self.broadcast(&push::server_log(message, kind));
    }

    /// Coordinated shutdown: every open connection receives the
    /// `server_shutdown` push strictly before it is closed, the registry is
    /// cleared, and the listener stops accepting new connections.
    pub fn shutdown(&self) {
        tracing::info!(connections = self.registry.count(), "gateway shutting down");

        let notice = push::server_shutdown("Server is shutting down").to_string();
        for id in self.registry.ids() {
            let _ = self.registry.send_to(id, notice.clone());
            self.registry.unregister(id);
        }

        self.cancel.cancel();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
