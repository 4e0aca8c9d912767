use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

/// Unique connection identifier.
///
/// Assigned monotonically at accept time; all cross-references between the
/// registry, router, and console go through this id rather than a shared
/// handle to the socket itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ConnId(u64);

impl ConnId {
    /// Allocate the next connection id.
    pub fn next() -> Self {
        Self(NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn_{}", self.0)
    }
}
