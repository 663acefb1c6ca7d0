//! Registry Reader: existence, token URI and story details for a token id.
//!
//! # Existence is a value, not an error
//!
//! A revert on `ownerOf` is the registry's normal answer for an id that was
//! never minted. [`JsonRpcRegistry`] recognises those reverts in exactly one
//! place ([`is_nonexistent_revert`]) and returns [`Existence::NotExistent`].
//! Throttling and every other failure stay errors, so they can never be
//! mistaken for "this token does not exist".

use async_trait::async_trait;
use serde_json::{json, Value};
use story_discovery_types::{DiscoveryError, DiscoveryResult, TokenId};
use tracing::debug;

use crate::abi;
use crate::rpc::{RpcClient, RpcError};

/// Outcome of a registry read for one token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Existence<T> {
    Exists(T),
    NotExistent,
}

/// Return value of `getStoryDetails(uint256)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryDetails {
    /// Reference to the story body (CID or `data:` URI).
    pub story_reference: String,
    pub image_count: u64,
    pub content_type_code: u8,
}

#[async_trait]
pub trait RegistryReader: Send + Sync {
    async fn owner_of(&self, id: TokenId) -> DiscoveryResult<Existence<String>>;

    async fn token_uri(&self, id: TokenId) -> DiscoveryResult<Existence<String>>;

    async fn story_details(&self, id: TokenId) -> DiscoveryResult<Existence<StoryDetails>>;

    /// Ids minted in the last `lookback_blocks` blocks, newest first, at most `max`.
    async fn recent_token_ids(
        &self,
        _lookback_blocks: u64,
        _max: usize,
    ) -> DiscoveryResult<Vec<TokenId>> {
        Ok(Vec::new())
    }

    /// Cheap configuration check run once before a scan.
    async fn verify(&self) -> DiscoveryResult<()> {
        Ok(())
    }
}

/// Whether an RPC error is the registry saying the token does not exist.
pub fn is_nonexistent_revert(message: &str, data: Option<&str>) -> bool {
    let mut texts = vec![message.to_ascii_lowercase()];
    if let Some(data) = data {
        let lower = data.to_ascii_lowercase();
        if lower.starts_with("0x7e273289") {
            return true;
        }
        if let Some(reason) = abi::decode_hex(data).ok().and_then(|b| abi::decode_revert(&b)) {
            texts.push(reason.to_ascii_lowercase());
        }
        texts.push(lower);
    }
    texts.iter().any(|t| {
        t.contains("nonexistent")
            || t.contains("invalid token id")
            || t.contains("owner query for nonexistent token")
    })
}

/// ERC-721 story registry over Ethereum JSON-RPC.
#[derive(Clone)]
pub struct JsonRpcRegistry {
    rpc: RpcClient,
    contract: String,
}

impl JsonRpcRegistry {
    /// Fails with [`DiscoveryError::Registry`] if `contract` is not a 20-byte hex address.
    pub fn new(endpoint: &str, contract: &str) -> DiscoveryResult<Self> {
        Self::with_client(RpcClient::new(endpoint), contract)
    }

    pub fn with_client(rpc: RpcClient, contract: &str) -> DiscoveryResult<Self> {
        let contract = contract.trim();
        let digits = contract.strip_prefix("0x").unwrap_or_default();
        if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DiscoveryError::Registry(format!(
                "invalid registry address `{contract}`"
            )));
        }
        Ok(Self {
            rpc,
            contract: contract.to_ascii_lowercase(),
        })
    }

    pub fn contract(&self) -> &str {
        &self.contract
    }

    async fn eth_call(&self, selector: [u8; 4], id: TokenId) -> Result<Vec<u8>, RpcError> {
        let params = json!([
            { "to": self.contract, "data": abi::encode_uint_call(selector, id) },
            "latest"
        ]);
        let result = self.rpc.call_async("eth_call", params).await?;
        let hex = result
            .as_str()
            .ok_or_else(|| DiscoveryError::Registry("eth_call result is not a string".to_string()))?;
        let bytes = abi::decode_hex(hex)?;
        if bytes.is_empty() {
            // Nodes return `0x` for calls to an address with no code.
            return Err(DiscoveryError::Registry(format!(
                "empty eth_call result from {}",
                self.contract
            ))
            .into());
        }
        Ok(bytes)
    }

    /// Run a token-scoped call and classify its failure.
    async fn token_call<T>(
        &self,
        selector: [u8; 4],
        id: TokenId,
        decode: impl FnOnce(&[u8]) -> DiscoveryResult<T>,
    ) -> DiscoveryResult<Existence<T>> {
        match self.eth_call(selector, id).await {
            Ok(bytes) => decode(&bytes).map(Existence::Exists),
            Err(RpcError::Response { message, data, .. })
                if is_nonexistent_revert(&message, data.as_deref()) =>
            {
                debug!(id, "registry: token does not exist");
                Ok(Existence::NotExistent)
            }
            Err(e) => Err(e.into_discovery_error()),
        }
    }

    async fn block_number(&self) -> DiscoveryResult<u64> {
        let result = self
            .rpc
            .call_async("eth_blockNumber", json!([]))
            .await
            .map_err(RpcError::into_discovery_error)?;
        let hex = result
            .as_str()
            .ok_or_else(|| DiscoveryError::Registry("eth_blockNumber result is not a string".to_string()))?;
        abi::decode_quantity(hex)
    }

    async fn logs(&self, from: u64, to: u64, topic: &str, id_topic: usize) -> DiscoveryResult<Vec<TokenId>> {
        let params = json!([{
            "address": self.contract,
            "fromBlock": format!("0x{from:x}"),
            "toBlock": format!("0x{to:x}"),
            "topics": [topic],
        }]);
        let result = self
            .rpc
            .call_async("eth_getLogs", params)
            .await
            .map_err(RpcError::into_discovery_error)?;
        let entries = result
            .as_array()
            .ok_or_else(|| DiscoveryError::Registry("eth_getLogs result is not an array".to_string()))?;

        let mut ids = Vec::new();
        for entry in entries {
            let topic = entry
                .get("topics")
                .and_then(Value::as_array)
                .and_then(|topics| topics.get(id_topic))
                .and_then(Value::as_str);
            match topic.map(abi::decode_quantity) {
                Some(Ok(id)) => ids.push(id),
                _ => debug!(?entry, "skipping log without a token id topic"),
            }
        }
        Ok(ids)
    }
}

#[async_trait]
impl RegistryReader for JsonRpcRegistry {
    async fn owner_of(&self, id: TokenId) -> DiscoveryResult<Existence<String>> {
        self.token_call(abi::OWNER_OF, id, abi::decode_address).await
    }

    async fn token_uri(&self, id: TokenId) -> DiscoveryResult<Existence<String>> {
        self.token_call(abi::TOKEN_URI, id, abi::decode_string).await
    }

    async fn story_details(&self, id: TokenId) -> DiscoveryResult<Existence<StoryDetails>> {
        self.token_call(abi::GET_STORY_DETAILS, id, |bytes| {
            let (story_reference, image_count, content_type_code) =
                abi::decode_story_details(bytes)?;
            Ok(StoryDetails {
                story_reference,
                image_count,
                content_type_code,
            })
        })
        .await
    }

    async fn recent_token_ids(&self, lookback_blocks: u64, max: usize) -> DiscoveryResult<Vec<TokenId>> {
        let latest = self.block_number().await?;
        let from = latest.saturating_sub(lookback_blocks);

        // StoryMinted indexes the token id first; Transfer carries it as the third topic.
        let mut ids = self.logs(from, latest, abi::STORY_MINTED_TOPIC, 1).await?;
        if ids.is_empty() {
            debug!(from, latest, "no StoryMinted logs, falling back to Transfer");
            ids = self.logs(from, latest, abi::TRANSFER_TOPIC, 3).await?;
        }

        ids.sort_unstable_by(|a, b| b.cmp(a));
        ids.dedup();
        ids.truncate(max);
        Ok(ids)
    }

    async fn verify(&self) -> DiscoveryResult<()> {
        let code = self
            .rpc
            .call_async("eth_getCode", json!([self.contract, "latest"]))
            .await
            .map_err(RpcError::into_discovery_error)?;
        match code.as_str() {
            Some(code) if code.trim_start_matches("0x").is_empty() => Err(DiscoveryError::Registry(
                format!("no contract deployed at {}", self.contract),
            )),
            Some(_) => Ok(()),
            None => Err(DiscoveryError::Registry("eth_getCode result is not a string".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CONTRACT: &str = "0x6bfe3bd2bd3a5b8f4c3e1a6e1d0e8b7c9a2f920a";

    fn rpc_result(result: Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({ "jsonrpc": "2.0", "id": 1, "result": result }))
    }

    fn rpc_error(code: i64, message: &str, data: Option<&str>) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": code, "message": message, "data": data }
        }))
    }

    fn call_for(selector: [u8; 4], id: TokenId) -> Value {
        json!({ "params": [{ "data": abi::encode_uint_call(selector, id) }] })
    }

    async fn registry(server: &MockServer) -> JsonRpcRegistry {
        JsonRpcRegistry::new(&server.uri(), CONTRACT).unwrap()
    }

    #[test]
    fn test_rejects_bad_address() {
        assert!(matches!(
            JsonRpcRegistry::new("http://localhost:1", "0x1234"),
            Err(DiscoveryError::Registry(_))
        ));
    }

    #[test]
    fn test_nonexistent_revert_patterns() {
        assert!(is_nonexistent_revert("execution reverted", Some("0x7e273289000000")));
        assert!(is_nonexistent_revert("ERC721: owner query for nonexistent token", None));
        assert!(is_nonexistent_revert("execution reverted: ERC721: invalid token ID", None));
        assert!(!is_nonexistent_revert("execution reverted", None));
        assert!(!is_nonexistent_revert("429 Too Many Requests", None));
    }

    #[tokio::test]
    async fn test_owner_of_existing_and_missing() {
        let server = MockServer::start().await;
        let mut owner = [0u8; 32];
        owner[31] = 0x11;
        Mock::given(method("POST"))
            .and(body_partial_json(call_for(abi::OWNER_OF, 1)))
            .respond_with(rpc_result(json!(format!("0x{}", hex::encode(owner)))))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(call_for(abi::OWNER_OF, 2)))
            .respond_with(rpc_error(3, "execution reverted", Some("0x7e2732890000000000000000000000000000000000000000000000000000000000000002")))
            .mount(&server)
            .await;

        let registry = registry(&server).await;
        assert_eq!(
            registry.owner_of(1).await.unwrap(),
            Existence::Exists(format!("0x{}11", "0".repeat(38)))
        );
        assert_eq!(registry.owner_of(2).await.unwrap(), Existence::NotExistent);
    }

    #[tokio::test]
    async fn test_throttle_never_concludes_nonexistence() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let registry = registry(&server).await;
        let err = registry.owner_of(5).await.unwrap_err();
        assert!(err.is_throttled());
    }

    #[tokio::test]
    async fn test_bare_revert_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(rpc_error(3, "execution reverted", None))
            .mount(&server)
            .await;

        let registry = registry(&server).await;
        assert!(matches!(
            registry.token_uri(5).await,
            Err(DiscoveryError::Registry(_))
        ));
    }

    #[tokio::test]
    async fn test_recent_ids_fall_back_to_transfer_logs() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": "eth_blockNumber" })))
            .respond_with(rpc_result(json!("0x200")))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "method": "eth_getLogs",
                "params": [{ "topics": [abi::STORY_MINTED_TOPIC] }]
            })))
            .respond_with(rpc_result(json!([])))
            .mount(&server)
            .await;
        let transfer = |id: u64| {
            json!({ "topics": [abi::TRANSFER_TOPIC, "0x0", "0x1", format!("0x{id:064x}")] })
        };
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "method": "eth_getLogs",
                "params": [{ "topics": [abi::TRANSFER_TOPIC] }]
            })))
            .respond_with(rpc_result(json!([transfer(4), transfer(9), transfer(4), transfer(7)])))
            .mount(&server)
            .await;

        let registry = registry(&server).await;
        assert_eq!(registry.recent_token_ids(100, 2).await.unwrap(), vec![9, 7]);
    }

    #[tokio::test]
    async fn test_verify_detects_missing_contract() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(rpc_result(json!("0x")))
            .mount(&server)
            .await;

        let registry = registry(&server).await;
        assert!(matches!(registry.verify().await, Err(DiscoveryError::Registry(_))));
    }
}
