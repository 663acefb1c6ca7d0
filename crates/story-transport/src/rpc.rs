//! JSON-RPC 2.0 client over HTTP.
//!
//! Blocking (`ureq`); async callers go through [`RpcClient::call_async`],
//! which moves the request onto tokio's blocking pool.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use story_discovery_types::{is_throttle_message, DiscoveryError};
use tracing::debug;

/// Failure of a single JSON-RPC call.
///
/// Node-reported errors are kept structured so the registry adapter can
/// recognise reverts; everything else is already classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    /// The node answered with an `error` object.
    Response {
        code: i64,
        message: String,
        /// Revert payload (`0x…`), when the node includes one.
        data: Option<String>,
    },
    /// HTTP or transport failure, or an unusable response.
    Failed(DiscoveryError),
}

impl RpcError {
    /// Collapse into the shared taxonomy, with no revert interpretation.
    pub fn into_discovery_error(self) -> DiscoveryError {
        match self {
            Self::Failed(e) => e,
            Self::Response { code, message, .. } => {
                if code == -32005 || is_throttle_message(&message) {
                    DiscoveryError::Throttled(message)
                } else {
                    DiscoveryError::Registry(format!("RPC error {code}: {message}"))
                }
            }
        }
    }
}

impl From<DiscoveryError> for RpcError {
    fn from(e: DiscoveryError) -> Self {
        Self::Failed(e)
    }
}

#[derive(Clone)]
pub struct RpcClient {
    endpoint: String,
    agent: ureq::Agent,
    next_id: Arc<AtomicU64>,
}

impl RpcClient {
    pub const DEFAULT_TIMEOUT_SECS: u64 = 20;
    pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

    pub fn new(endpoint: &str) -> Self {
        Self::with_timeouts(
            endpoint,
            Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            Duration::from_secs(Self::DEFAULT_CONNECT_TIMEOUT_SECS),
        )
    }

    pub fn with_timeouts(endpoint: &str, timeout: Duration, connect_timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            agent: ureq::AgentBuilder::new()
                .timeout(timeout)
                .timeout_connect(connect_timeout)
                .build(),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Execute one JSON-RPC request and return its `result`.
    pub fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!(method, id, "rpc request");

        let response = match self
            .agent
            .post(&self.endpoint)
            .set("Content-Type", "application/json")
            .send_json(&body)
        {
            Ok(resp) => resp,
            Err(ureq::Error::Status(429, _)) => {
                return Err(DiscoveryError::Throttled(format!("{method}: HTTP 429")).into())
            }
            Err(ureq::Error::Status(code, resp)) => {
                let text = resp.into_string().unwrap_or_default();
                // Some providers wrap the JSON-RPC error in a non-2xx response.
                if let Ok(value) = serde_json::from_str::<Value>(&text) {
                    if let Some(err) = value.get("error") {
                        return Err(parse_error_object(err));
                    }
                }
                let message = format!("{method}: HTTP {code}: {}", text.trim());
                return Err(if is_throttle_message(&message) {
                    DiscoveryError::Throttled(message)
                } else {
                    DiscoveryError::Transport(message)
                }
                .into());
            }
            Err(e) => {
                let message = format!("{method}: {e}");
                return Err(if is_throttle_message(&message) {
                    DiscoveryError::Throttled(message)
                } else {
                    DiscoveryError::Transport(message)
                }
                .into());
            }
        };

        let value: Value = response
            .into_json()
            .map_err(|e| DiscoveryError::Transport(format!("{method}: unreadable response: {e}")))?;

        if let Some(err) = value.get("error") {
            return Err(parse_error_object(err));
        }
        value
            .get("result")
            .cloned()
            .ok_or_else(|| DiscoveryError::Registry(format!("{method}: response has no result")).into())
    }

    /// [`call`](Self::call) on the blocking pool.
    ///
    /// If the awaiting task is dropped the request still runs to completion
    /// and its result is discarded.
    pub async fn call_async(&self, method: &'static str, params: Value) -> Result<Value, RpcError> {
        let client = self.clone();
        tokio::task::spawn_blocking(move || client.call(method, params))
            .await
            .map_err(|e| DiscoveryError::Transport(format!("{method}: worker failed: {e}")))?
    }
}

fn parse_error_object(err: &Value) -> RpcError {
    let code = err.get("code").and_then(Value::as_i64).unwrap_or_default();
    let message = err
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_string();
    // Geth puts revert bytes in `data`; some providers nest them one level deeper.
    let data = match err.get("data") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Object(obj)) => obj
            .get("data")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| obj.get("message").and_then(Value::as_str).map(str::to_string)),
        _ => None,
    };
    RpcError::Response {
        code,
        message,
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_call_returns_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": "eth_blockNumber" })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "jsonrpc": "2.0", "id": 1, "result": "0x10" })),
            )
            .mount(&server)
            .await;

        let client = RpcClient::new(&server.uri());
        let result = client.call_async("eth_blockNumber", json!([])).await.unwrap();
        assert_eq!(result, json!("0x10"));
    }

    #[tokio::test]
    async fn test_error_object_is_structured() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": { "code": 3, "message": "execution reverted", "data": "0x7e273289" }
            })))
            .mount(&server)
            .await;

        let client = RpcClient::new(&server.uri());
        let err = client.call_async("eth_call", json!([])).await.unwrap_err();
        assert_eq!(
            err,
            RpcError::Response {
                code: 3,
                message: "execution reverted".to_string(),
                data: Some("0x7e273289".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_http_429_is_throttled() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let client = RpcClient::new(&server.uri());
        let err = client.call_async("eth_call", json!([])).await.unwrap_err();
        assert!(err.into_discovery_error().is_throttled());
    }

    #[tokio::test]
    async fn test_http_500_is_transport() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let client = RpcClient::new(&server.uri());
        let err = client.call_async("eth_call", json!([])).await.unwrap_err();
        assert!(matches!(
            err.into_discovery_error(),
            DiscoveryError::Transport(_)
        ));
    }

    #[test]
    fn test_limit_exceeded_code_is_throttled() {
        let err = RpcError::Response {
            code: -32005,
            message: "limit exceeded".to_string(),
            data: None,
        };
        assert!(err.into_discovery_error().is_throttled());
    }
}
