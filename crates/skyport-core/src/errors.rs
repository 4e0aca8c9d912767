use crate::envelope::ApiEnvelope;

/// Failure taxonomy for calls to the backend API.
///
/// Never crosses the router boundary as an error: every variant normalizes
/// to a `success: false` envelope via [`RelayError::into_envelope`].
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("API endpoint unreachable: {0}")]
    Unreachable(String),
    #[error("API request failed with status {status}")]
    Status {
        status: u16,
        /// Backend-reported body, when one was received and parseable.
        body: Option<ApiEnvelope>,
    },
    #[error("invalid response from API server: {0}")]
    InvalidBody(String),
}

impl RelayError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Unreachable(_) => "unreachable",
            Self::Status { .. } => "status",
            Self::InvalidBody(_) => "invalid_body",
        }
    }

    /// Normalize to the backend envelope shape the router expects.
    ///
    /// A backend-reported body is propagated as-is (with `success` forced
    /// false) to preserve whatever detail the backend attached.
    pub fn into_envelope(self) -> ApiEnvelope {
        match self {
            Self::Unreachable(detail) => {
                ApiEnvelope::failure(format!("API endpoint unreachable: {detail}"))
            }
            Self::Status {
                status,
                body: Some(mut envelope),
            } => {
                envelope.success = false;
                if envelope.message.is_empty() {
                    envelope.message = format!("API request failed with status {status}");
                }
                envelope
            }
            Self::Status { status, body: None } => {
                ApiEnvelope::failure(format!("API request failed with status {status}"))
            }
            Self::InvalidBody(detail) => {
                ApiEnvelope::failure(format!("invalid response from API server: {detail}"))
            }
        }
    }
}
