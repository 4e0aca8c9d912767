use chrono::{DateTime, Utc};
use serde::Serialize;

/// Authenticated identity attached to exactly one connection.
///
/// Created only on a successful login relay; replaced wholesale on re-login,
/// never merged. Destroyed with its connection.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: i64,
    pub username: String,
    pub user_type: String,
    pub connected_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: i64, username: impl Into<String>, user_type: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            username: username.into(),
            user_type: user_type.into(),
            connected_at: now,
            last_active: now,
        }
    }

    /// Refresh the activity timestamp.
    pub fn touch(&mut self) {
        self.last_active = Utc::now();
    }
}
