//! Pre-programmed relay for deterministic testing without a live backend.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use skyport_core::ApiEnvelope;

use crate::client::ApiRelay;

/// Relay that returns queued responses in order and records every call.
pub struct MockRelay {
    responses: Mutex<VecDeque<ApiEnvelope>>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl MockRelay {
    pub fn new(responses: Vec<ApiEnvelope>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Convenience: a relay whose next call succeeds with the given data.
    pub fn ok(data: Value) -> Self {
        Self::new(vec![ApiEnvelope::ok(data)])
    }

    /// Convenience: a relay whose next call fails with the given message.
    pub fn failing(message: &str) -> Self {
        Self::new(vec![ApiEnvelope::failure(message)])
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Every `(kind, payload)` pair this relay has received, in order.
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ApiRelay for MockRelay {
    async fn call(&self, kind: &str, payload: Value) -> ApiEnvelope {
        self.calls.lock().push((kind.to_string(), payload));
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| ApiEnvelope::failure("mock relay exhausted"))
    }
}
