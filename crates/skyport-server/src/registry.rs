use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use skyport_core::envelope::push;
use skyport_core::{ConnId, Session};
use tokio::sync::mpsc;

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(90);

/// One open connection: its outbound queue and optional session.
pub struct ConnectionEntry {
    pub tx: mpsc::Sender<String>,
    pub session: Option<Session>,
    pub connected_at: DateTime<Utc>,
    last_pong: AtomicU64,
}

impl ConnectionEntry {
    fn new(tx: mpsc::Sender<String>) -> Self {
        Self {
            tx,
            session: None,
            connected_at: Utc::now(),
            last_pong: AtomicU64::new(now_secs()),
        }
    }

    fn is_alive(&self) -> bool {
        let last = self.last_pong.load(Ordering::Relaxed);
        now_secs().saturating_sub(last) < CLIENT_TIMEOUT.as_secs()
    }
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// The authoritative in-memory set of open connections and their sessions.
///
/// Constructed at gateway startup, cleared by the shutdown coordinator.
/// An entry exists exactly as long as its transport stream is open; a
/// session exists only after a successful login relay.
pub struct ConnectionRegistry {
    conns: DashMap<ConnId, ConnectionEntry>,
    max_send_queue: usize,
}

impl ConnectionRegistry {
    pub fn new(max_send_queue: usize) -> Self {
        Self {
            conns: DashMap::new(),
            max_send_queue,
        }
    }

    /// Register a new connection and return its id + outbound receiver.
    pub fn register(&self) -> (ConnId, mpsc::Receiver<String>) {
        let id = ConnId::next();
        let (tx, rx) = mpsc::channel(self.max_send_queue);
        self.conns.insert(id, ConnectionEntry::new(tx));
        (id, rx)
    }

    /// Remove a connection. Dropping its sender closes the writer's queue,
    /// which lets the writer drain buffered messages and then close the
    /// socket. Idempotent.
    pub fn unregister(&self, id: ConnId) -> bool {
        self.conns.remove(&id).is_some()
    }

    pub fn contains(&self, id: ConnId) -> bool {
        self.conns.contains_key(&id)
    }

    pub fn count(&self) -> usize {
        self.conns.len()
    }

    /// Snapshot of currently open connection ids.
    pub fn ids(&self) -> Vec<ConnId> {
        self.conns.iter().map(|e| *e.key()).collect()
    }

    /// Attach (or replace) the session for a connection.
    ///
    /// Returns false when the connection has already closed; callers that
    /// resumed after a relay call use this as their re-validation step.
    pub fn set_session(&self, id: ConnId, session: Session) -> bool {
        match self.conns.get_mut(&id) {
            Some(mut entry) => {
                entry.session = Some(session);
                true
            }
            None => false,
        }
    }

    /// Clone the session attached to a connection, if any.
    pub fn session(&self, id: ConnId) -> Option<Session> {
        self.conns.get(&id).and_then(|e| e.session.clone())
    }

    /// Refresh `last_active` on a connection's session, if still present.
    pub fn touch(&self, id: ConnId) {
        if let Some(mut entry) = self.conns.get_mut(&id) {
            if let Some(session) = entry.session.as_mut() {
                session.touch();
            }
        }
    }

    /// First connection whose session carries the given username.
    ///
    /// Usernames are not unique across sessions; zero or one match is
    /// returned and callers must not assume more.
    pub fn find_by_username(&self, username: &str) -> Option<ConnId> {
        self.conns.iter().find_map(|entry| {
            entry
                .session
                .as_ref()
                .filter(|s| s.username == username)
                .map(|_| *entry.key())
        })
    }

    /// All authenticated connections with a clone of their session.
    pub fn sessions(&self) -> Vec<(ConnId, Session)> {
        self.conns
            .iter()
            .filter_map(|entry| entry.session.clone().map(|s| (*entry.key(), s)))
            .collect()
    }

    /// Queue a message for one connection.
    ///
    /// A vanished connection or closed queue is a silent no-op failure:
    /// relay results resolving after close land here and are dropped.
    pub fn send_to(&self, id: ConnId, message: String) -> bool {
        let Some(entry) = self.conns.get(&id) else {
            return false;
        };
        match entry.tx.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(msg)) => {
                tracing::warn!(conn = %id, msg_len = msg.len(), "send queue full, dropping message");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Queue a message for every open connection. No acknowledgment.
    pub fn broadcast(&self, message: &str) {
        for entry in self.conns.iter() {
            let _ = entry.tx.try_send(message.to_string());
        }
    }

    /// Push a `connection_killed` notice, then close the connection.
    pub fn kill(&self, id: ConnId, reason: &str) -> bool {
        let notified = self.send_to(id, push::connection_killed(reason).to_string());
        if !notified {
            tracing::debug!(conn = %id, "kill raced a disconnect");
        }
        self.unregister(id)
    }

    pub fn record_pong(&self, id: ConnId) {
        if let Some(entry) = self.conns.get(&id) {
            entry.last_pong.store(now_secs(), Ordering::Relaxed);
        }
    }

    /// Remove connections that have not answered a ping within the timeout.
    pub fn cleanup_dead(&self) -> usize {
        let dead: Vec<ConnId> = self
            .conns
            .iter()
            .filter(|entry| !entry.is_alive())
            .map(|entry| *entry.key())
            .collect();

        for id in &dead {
            self.unregister(*id);
            tracing::info!(conn = %id, "cleaned up dead connection");
        }
        dead.len()
    }
}

/// Start a background task that periodically cleans up dead connections.
pub fn start_cleanup_task(
    registry: std::sync::Arc<ConnectionRegistry>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let removed = registry.cleanup_dead();
            if removed > 0 {
                tracing::info!(removed, "dead connection cleanup");
            }
        }
    })
}
