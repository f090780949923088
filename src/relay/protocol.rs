//! Bridge wire format.
//!
//! The bridge only sees socket messages; everything inside `payload` is an
//! [`EncryptedPayload`](super::EncryptedPayload) wrapping a JSON-RPC envelope.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const METHOD_SESSION_REQUEST: &str = "wc_sessionRequest";
pub const METHOD_SESSION_UPDATE: &str = "wc_sessionUpdate";
pub const METHOD_PERSONAL_SIGN: &str = "personal_sign";

/// Bridge-level message: publish to or subscribe on a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocketMessage {
    pub topic: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: String,
    #[serde(default)]
    pub silent: bool,
}

impl SocketMessage {
    pub fn subscribe(topic: impl Into<String>) -> Self {
        Self { topic: topic.into(), kind: "sub".into(), payload: String::new(), silent: true }
    }

    pub fn publish(topic: impl Into<String>, payload: impl Into<String>, silent: bool) -> Self {
        Self { topic: topic.into(), kind: "pub".into(), payload: payload.into(), silent }
    }

    pub fn is_publish(&self) -> bool {
        self.kind == "pub"
    }
}

/// Application metadata shown by the wallet when asked to approve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerMeta {
    pub name: String,
    pub description: String,
    pub url: String,
    #[serde(default)]
    pub icons: Vec<String>,
}

impl Default for PeerMeta {
    fn default() -> Self {
        Self {
            name: "walletlink".into(),
            description: "Wallet sign-in for messaging clients".into(),
            url: "https://walletlink.invalid".into(),
            icons: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub id: u64,
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Vec<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: &str, params: Vec<Value>) -> Self {
        Self { id, jsonrpc: "2.0".into(), method: method.into(), params }
    }

    pub fn session_request(id: u64, client_id: &str, meta: &PeerMeta, chain_id: u64) -> Self {
        Self::new(
            id,
            METHOD_SESSION_REQUEST,
            vec![json!({ "peerId": client_id, "peerMeta": meta, "chainId": chain_id })],
        )
    }

    pub fn personal_sign(id: u64, message: &str, account: &str) -> Self {
        Self::new(
            id,
            METHOD_PERSONAL_SIGN,
            vec![json!(format!("0x{}", hex::encode(message.as_bytes()))), json!(account)],
        )
    }

    pub fn session_kill(id: u64) -> Self {
        Self::new(
            id,
            METHOD_SESSION_UPDATE,
            vec![json!({
                "approved": false,
                "chainId": null,
                "networkId": null,
                "accounts": null,
            })],
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRpcError {
    #[serde(default)]
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub id: u64,
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: u64, result: Value) -> Self {
        Self { id, jsonrpc: "2.0".into(), result: Some(result), error: None }
    }

    pub fn failure(id: u64, message: impl Into<String>) -> Self {
        let error = JsonRpcError { code: -32000, message: message.into() };
        Self { id, jsonrpc: "2.0".into(), result: None, error: Some(error) }
    }

    /// String result or the wallet's error message.
    pub fn into_outcome(self) -> Result<String, String> {
        if let Some(err) = self.error {
            return Err(err.message);
        }
        match self.result {
            Some(Value::String(s)) => Ok(s),
            Some(Value::Null) | None => Ok(String::new()),
            Some(other) => Ok(other.to_string()),
        }
    }
}

/// Wallet's answer to `wc_sessionRequest` (also the shape of `wc_sessionUpdate`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionParams {
    pub approved: bool,
    #[serde(default)]
    pub chain_id: Option<u64>,
    #[serde(default)]
    pub accounts: Option<Vec<String>>,
    #[serde(default)]
    pub peer_id: Option<String>,
    #[serde(default)]
    pub peer_meta: Option<PeerMeta>,
}

/// Decrypted JSON-RPC envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Request(JsonRpcRequest),
    Response(JsonRpcResponse),
}

/// Classify a decrypted envelope; `None` if it is neither shape.
pub fn parse_inbound(raw: &[u8]) -> Option<Inbound> {
    let value: Value = serde_json::from_slice(raw).ok()?;
    if value.get("method").is_some() {
        serde_json::from_value(value).ok().map(Inbound::Request)
    } else {
        serde_json::from_value(value).ok().map(Inbound::Response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_message_field_names() {
        let msg = serde_json::to_value(SocketMessage::subscribe("client")).unwrap();
        assert_eq!(msg, json!({"topic": "client", "type": "sub", "payload": "", "silent": true}));
    }

    #[test]
    fn personal_sign_hex_encodes_message() {
        let req = JsonRpcRequest::personal_sign(7, "hi", "0xabc");
        assert_eq!(req.params, vec![json!("0x6869"), json!("0xabc")]);
        assert_eq!(req.method, METHOD_PERSONAL_SIGN);
    }

    #[test]
    fn classifies_requests_and_responses() {
        let update = concat!(
            r#"{"id":1,"jsonrpc":"2.0","method":"wc_sessionUpdate","#,
            r#""params":[{"approved":false}]}"#
        )
        .as_bytes();
        assert!(matches!(
            parse_inbound(update),
            Some(Inbound::Request(r)) if r.method == METHOD_SESSION_UPDATE
        ));

        let ok = br#"{"id":2,"jsonrpc":"2.0","result":"0x1234"}"#;
        let Some(Inbound::Response(resp)) = parse_inbound(ok) else { panic!("expected response") };
        assert_eq!(resp.into_outcome(), Ok("0x1234".to_string()));

        let err = br#"{"id":3,"jsonrpc":"2.0","error":{"code":-32000,"message":"User rejected"}}"#;
        let Some(Inbound::Response(resp)) = parse_inbound(err) else { panic!("expected response") };
        assert_eq!(resp.into_outcome(), Err("User rejected".to_string()));

        assert!(parse_inbound(b"not json").is_none());
    }

    #[test]
    fn session_params_from_wallet() {
        let params: SessionParams = serde_json::from_value(json!({
            "approved": true,
            "chainId": 1,
            "accounts": ["0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed"],
            "peerId": "wallet-peer",
            "peerMeta": {
                "name": "Wallet",
                "description": "",
                "url": "https://wallet.example",
                "icons": []
            }
        }))
        .unwrap();
        assert!(params.approved);
        assert_eq!(params.peer_id.as_deref(), Some("wallet-peer"));
        assert_eq!(params.accounts.unwrap().len(), 1);
    }
}
