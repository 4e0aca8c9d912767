use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use skyport_core::{ApiEnvelope, RelayError};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Outbound relay to the single backend endpoint.
///
/// `call` is infallible by contract: every transport or protocol failure is
/// normalized to a `success: false` envelope so a misbehaving backend
/// degrades relayed actions instead of faulting the connection handler.
#[async_trait]
pub trait ApiRelay: Send + Sync {
    async fn call(&self, kind: &str, payload: Value) -> ApiEnvelope;
}

/// HTTP relay client: `POST {type, ...payload}` to the configured endpoint.
pub struct HttpRelay {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpRelay {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .connect_timeout(CONNECT_TIMEOUT)
                .build()
                .expect("failed to build HTTP client"),
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn request(&self, kind: &str, payload: Value) -> Result<ApiEnvelope, RelayError> {
        let body = build_request_body(kind, payload);

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| RelayError::Unreachable(e.to_string()))?;

        let status = resp.status();
        // A reset mid-read leaves no usable body; treat it as absent.
        let text = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            let body = serde_json::from_str::<ApiEnvelope>(&text).ok();
            return Err(RelayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&text).map_err(|e| RelayError::InvalidBody(e.to_string()))
    }
}

#[async_trait]
impl ApiRelay for HttpRelay {
    async fn call(&self, kind: &str, payload: Value) -> ApiEnvelope {
        match self.request(kind, payload).await {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(kind, error_kind = e.error_kind(), error = %e, "relay call failed");
                e.into_envelope()
            }
        }
    }
}

/// Merge the request type with the payload fields into one flat object.
fn build_request_body(kind: &str, payload: Value) -> Value {
    let mut body = serde_json::Map::new();
    body.insert("type".into(), Value::String(kind.to_string()));
    if let Value::Object(fields) = payload {
        body.extend(fields);
    }
    Value::Object(body)
}
