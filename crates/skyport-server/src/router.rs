//! Inbound message dispatch, keyed by the envelope's `action`.

use std::sync::Arc;

use serde_json::{json, Value};
use skyport_core::{ClientEnvelope, ConnId, Response, Session};
use skyport_relay::ApiRelay;

use crate::registry::ConnectionRegistry;

/// Shared state for the router, console, and transport handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub registry: Arc<ConnectionRegistry>,
    pub relay: Arc<dyn ApiRelay>,
}

/// Handle one inbound message to completion and queue the response.
///
/// The only suspension point is the relay call, so a slow backend stalls
/// only the issuing connection's handler. A relay failure is always turned
/// into a `success: false` response, never a fault. If the connection
/// closed while a relay call was pending, the result is discarded.
pub async fn handle_message(state: &GatewayState, conn_id: ConnId, raw: &str) {
    let envelope = match ClientEnvelope::parse(raw) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::debug!(conn = %conn_id, error = %e, "malformed inbound message");
            send(state, conn_id, Response::error("Invalid message format"));
            return;
        }
    };

    let response = match envelope.action.as_str() {
        "login" => login(state, conn_id, &envelope).await,
        "getAllOrders" => get_all_orders(state, conn_id).await,
        "getAllDrones" => get_all_drones(state).await,
        "test" | "testApi" => test_api(state).await,
        other => {
            tracing::debug!(conn = %conn_id, action = other, "unknown action");
            Response::error("Unknown action")
        }
    };

    send(state, conn_id, response);
}

fn send(state: &GatewayState, conn_id: ConnId, response: Response) {
    if !state.registry.send_to(conn_id, response.to_json()) {
        tracing::debug!(conn = %conn_id, action = response.action, "connection closed before response delivery");
    }
}

/// Relay the credentials and attach a session on success.
async fn login(state: &GatewayState, conn_id: ConnId, envelope: &ClientEnvelope) -> Response {
    let username = match envelope.require_str("username") {
        Ok(u) => u.to_string(),
        Err(msg) => return Response::error(msg),
    };
    let password = match envelope.require_str("password") {
        Ok(p) => p.to_string(),
        Err(msg) => return Response::error(msg),
    };

    let result = state
        .relay
        .call("login", json!({"username": username, "password": password}))
        .await;

    if !result.success {
        tracing::info!(conn = %conn_id, username = %username, "login rejected");
        return Response::from_api("login_response", result);
    }

    let user_id = result.data.get("id").and_then(Value::as_i64);
    let user_type = result.data.get("type").and_then(Value::as_str);
    let (Some(user_id), Some(user_type)) = (user_id, user_type) else {
        tracing::warn!(conn = %conn_id, "login response missing identity fields");
        return Response::fail("login_response", "invalid response from API server");
    };

    let session = Session::new(user_id, username.clone(), user_type);
    if state.registry.set_session(conn_id, session) {
        tracing::info!(conn = %conn_id, username = %username, user_type, "login succeeded");
    } else {
        // connection closed while the relay call was pending
        tracing::info!(conn = %conn_id, "discarding login result for closed connection");
    }
    Response::from_api("login_response", result)
}

/// Authenticated: relay with the session's identity.
async fn get_all_orders(state: &GatewayState, conn_id: ConnId) -> Response {
    let Some(session) = state.registry.session(conn_id) else {
        return Response::error("Not logged in");
    };

    let result = state
        .relay
        .call(
            "getAllOrders",
            json!({"userId": session.user_id, "userType": session.user_type}),
        )
        .await;
    state.registry.touch(conn_id);
    Response::from_api("orders_data", result)
}

async fn get_all_drones(state: &GatewayState) -> Response {
    let result = state.relay.call("getAllDrones", json!({})).await;
    Response::from_api("drones_data", result)
}

async fn test_api(state: &GatewayState) -> Response {
    let result = state.relay.call("test", json!({})).await;
    Response::from_api("test_response", result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyport_core::ApiEnvelope;
    use skyport_relay::MockRelay;
    use tokio::sync::mpsc;

    fn state_with(relay: MockRelay) -> (GatewayState, Arc<MockRelay>) {
        let relay = Arc::new(relay);
        let state = GatewayState {
            registry: Arc::new(ConnectionRegistry::new(32)),
            relay: Arc::clone(&relay) as Arc<dyn ApiRelay>,
        };
        (state, relay)
    }

    fn recv_json(rx: &mut mpsc::Receiver<String>) -> Value {
        serde_json::from_str(&rx.try_recv().expect("expected a response")).unwrap()
    }

    #[tokio::test]
    async fn unknown_action_yields_error() {
        let (state, relay) = state_with(MockRelay::new(vec![]));
        let (id, mut rx) = state.registry.register();

        handle_message(&state, id, r#"{"action":"fly"}"#).await;

        let resp = recv_json(&mut rx);
        assert_eq!(resp["action"], "error");
        assert_eq!(resp["message"], "Unknown action");
        assert_eq!(relay.call_count(), 0);
        assert!(rx.try_recv().is_err(), "exactly one response expected");
    }

    #[tokio::test]
    async fn malformed_message_yields_error_and_keeps_connection() {
        let (state, _relay) = state_with(MockRelay::new(vec![]));
        let (id, mut rx) = state.registry.register();

        handle_message(&state, id, "definitely not json").await;

        let resp = recv_json(&mut rx);
        assert_eq!(resp["action"], "error");
        assert_eq!(resp["message"], "Invalid message format");
        assert!(state.registry.contains(id));
    }

    #[tokio::test]
    async fn login_success_attaches_session() {
        let (state, _relay) = state_with(MockRelay::ok(json!({"id": 1, "type": "Customer"})));
        let (id, mut rx) = state.registry.register();

        handle_message(
            &state,
            id,
            r#"{"action":"login","username":"alice","password":"pw"}"#,
        )
        .await;

        let resp = recv_json(&mut rx);
        assert_eq!(resp["action"], "login_response");
        assert_eq!(resp["success"], true);
        assert_eq!(resp["data"]["id"], 1);
        assert_eq!(resp["data"]["type"], "Customer");
        assert_eq!(resp["message"], "");

        let session = state.registry.session(id).unwrap();
        assert_eq!(session.user_id, 1);
        assert_eq!(session.username, "alice");
        assert_eq!(session.user_type, "Customer");
    }

    #[tokio::test]
    async fn login_failure_leaves_session_unset() {
        let (state, _relay) = state_with(MockRelay::failing("Invalid credentials"));
        let (id, mut rx) = state.registry.register();

        handle_message(
            &state,
            id,
            r#"{"action":"login","username":"alice","password":"wrong"}"#,
        )
        .await;

        let resp = recv_json(&mut rx);
        assert_eq!(resp["action"], "login_response");
        assert_eq!(resp["success"], false);
        assert_eq!(resp["message"], "Invalid credentials");
        assert!(state.registry.session(id).is_none());
    }

    #[tokio::test]
    async fn login_failure_keeps_previous_session() {
        let (state, _relay) = state_with(MockRelay::new(vec![
            ApiEnvelope::ok(json!({"id": 1, "type": "Customer"})),
            ApiEnvelope::failure("Invalid credentials"),
        ]));
        let (id, mut rx) = state.registry.register();

        handle_message(
            &state,
            id,
            r#"{"action":"login","username":"alice","password":"pw"}"#,
        )
        .await;
        handle_message(
            &state,
            id,
            r#"{"action":"login","username":"mallory","password":"nope"}"#,
        )
        .await;

        let _ = recv_json(&mut rx);
        let second = recv_json(&mut rx);
        assert_eq!(second["success"], false);

        let session = state.registry.session(id).unwrap();
        assert_eq!(session.username, "alice");
    }

    #[tokio::test]
    async fn relogin_replaces_session() {
        let (state, _relay) = state_with(MockRelay::new(vec![
            ApiEnvelope::ok(json!({"id": 1, "type": "Customer"})),
            ApiEnvelope::ok(json!({"id": 2, "type": "Admin"})),
        ]));
        let (id, _rx) = state.registry.register();

        handle_message(
            &state,
            id,
            r#"{"action":"login","username":"alice","password":"pw"}"#,
        )
        .await;
        handle_message(
            &state,
            id,
            r#"{"action":"login","username":"root","password":"pw"}"#,
        )
        .await;

        let session = state.registry.session(id).unwrap();
        assert_eq!(session.user_id, 2);
        assert_eq!(session.username, "root");
        assert_eq!(state.registry.sessions().len(), 1);
    }

    #[tokio::test]
    async fn login_missing_credentials_is_rejected_without_relay() {
        let (state, relay) = state_with(MockRelay::new(vec![]));
        let (id, mut rx) = state.registry.register();

        handle_message(&state, id, r#"{"action":"login","username":"alice"}"#).await;

        let resp = recv_json(&mut rx);
        assert_eq!(resp["action"], "error");
        assert_eq!(relay.call_count(), 0);
    }

    #[tokio::test]
    async fn login_with_bad_identity_payload_creates_no_session() {
        let (state, _relay) = state_with(MockRelay::ok(json!({"unexpected": true})));
        let (id, mut rx) = state.registry.register();

        handle_message(
            &state,
            id,
            r#"{"action":"login","username":"alice","password":"pw"}"#,
        )
        .await;

        let resp = recv_json(&mut rx);
        assert_eq!(resp["action"], "login_response");
        assert_eq!(resp["success"], false);
        assert!(state.registry.session(id).is_none());
    }

    #[tokio::test]
    async fn login_result_for_closed_connection_is_discarded() {
        let (state, _relay) = state_with(MockRelay::ok(json!({"id": 1, "type": "Customer"})));
        let (id, rx) = state.registry.register();

        // connection closes before the handler runs
        state.registry.unregister(id);
        drop(rx);

        handle_message(
            &state,
            id,
            r#"{"action":"login","username":"alice","password":"pw"}"#,
        )
        .await;

        assert!(state.registry.find_by_username("alice").is_none());
        assert_eq!(state.registry.count(), 0);
    }

    #[tokio::test]
    async fn get_all_orders_requires_login_and_skips_relay() {
        let (state, relay) = state_with(MockRelay::new(vec![]));
        let (id, mut rx) = state.registry.register();

        handle_message(&state, id, r#"{"action":"getAllOrders"}"#).await;

        let resp = recv_json(&mut rx);
        assert_eq!(resp["action"], "error");
        assert_eq!(resp["message"], "Not logged in");
        assert_eq!(relay.call_count(), 0);
    }

    #[tokio::test]
    async fn get_all_orders_relays_session_identity() {
        let (state, relay) = state_with(MockRelay::ok(json!([{"orderId": 9}])));
        let (id, mut rx) = state.registry.register();
        state
            .registry
            .set_session(id, Session::new(42, "alice", "Customer"));

        handle_message(&state, id, r#"{"action":"getAllOrders"}"#).await;

        let resp = recv_json(&mut rx);
        assert_eq!(resp["action"], "orders_data");
        assert_eq!(resp["success"], true);
        assert_eq!(resp["data"][0]["orderId"], 9);

        let calls = relay.calls();
        assert_eq!(calls[0].0, "getAllOrders");
        assert_eq!(calls[0].1["userId"], 42);
        assert_eq!(calls[0].1["userType"], "Customer");
    }

    #[tokio::test]
    async fn get_all_drones_needs_no_login() {
        let (state, relay) = state_with(MockRelay::ok(json!([{"droneId": 3}])));
        let (id, mut rx) = state.registry.register();

        handle_message(&state, id, r#"{"action":"getAllDrones"}"#).await;

        let resp = recv_json(&mut rx);
        assert_eq!(resp["action"], "drones_data");
        assert_eq!(resp["success"], true);
        assert_eq!(relay.calls()[0].0, "getAllDrones");
    }

    #[tokio::test]
    async fn test_action_accepts_both_spellings() {
        let (state, relay) = state_with(MockRelay::new(vec![
            ApiEnvelope::ok(json!("pong")),
            ApiEnvelope::ok(json!("pong")),
        ]));
        let (id, mut rx) = state.registry.register();

        handle_message(&state, id, r#"{"action":"test"}"#).await;
        handle_message(&state, id, r#"{"action":"testApi"}"#).await;

        for _ in 0..2 {
            let resp = recv_json(&mut rx);
            assert_eq!(resp["action"], "test_response");
            assert_eq!(resp["success"], true);
        }
        assert_eq!(relay.call_count(), 2);
    }

    #[tokio::test]
    async fn relay_failure_becomes_failure_response() {
        let (state, _relay) = state_with(MockRelay::failing("API endpoint unreachable: refused"));
        let (id, mut rx) = state.registry.register();

        handle_message(&state, id, r#"{"action":"getAllDrones"}"#).await;

        let resp = recv_json(&mut rx);
        assert_eq!(resp["action"], "drones_data");
        assert_eq!(resp["success"], false);
        assert!(!resp["message"].as_str().unwrap().is_empty());
        assert!(state.registry.contains(id), "gateway keeps the connection open");
    }
}
