use crate::node::Node;
use crate::protocol::Protocol;
use serde::Serialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// JSON-RPC error code
    pub fn code(&self) -> i32 {
        match self {
            ApiError::MethodNotFound(_) => -32601,
            ApiError::InvalidParams(_) => -32602,
            ApiError::Internal(_) => -32603,
        }
    }

    pub fn to_json(&self) -> Value {
        json!({ "code": self.code(), "message": self.to_string() })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeInfo {
    pub name: String,
    pub id: String,
    pub listen_addr: Option<SocketAddr>,
    pub protocols: Vec<Protocol>,
    pub network_id: u64,
    pub chain_id: String,
    pub genesis: String,
}

pub struct AdminApi {
    node: Arc<Node>,
}

impl AdminApi {
    pub fn new(node: Arc<Node>) -> Self {
        Self { node }
    }

    pub fn handle_request(&self, method: &str, params: &Value) -> Result<Value, ApiError> {
        let params_array = match params {
            Value::Array(arr) => arr.clone(),
            Value::Null => vec![],
            other => vec![other.clone()],
        };

        match method {
            "admin_peers" => self.peers(),
            "admin_nodeInfo" => self.node_info(),
            "admin_addPeer" => self.add_peer(&params_array),
            "admin_protocols" => self.protocols(),
            _ => Err(ApiError::MethodNotFound(method.to_string())),
        }
    }

    fn peers(&self) -> Result<Value, ApiError> {
        serde_json::to_value(self.node.peers().peers())
            .map_err(|e| ApiError::Internal(e.to_string()))
    }

    pub fn node_info(&self) -> Result<Value, ApiError> {
        let params = self.node.manager().params();
        let info = NodeInfo {
            name: self.node.config().node.name.clone(),
            id: self.node.peer_id().to_string(),
            listen_addr: self.node.listen_addr(),
            protocols: self.node.manager().protocols(),
            network_id: params.network_id,
            chain_id: params.chain_id.to_string(),
            genesis: format!("0x{}", hex::encode(params.genesis)),
        };
        serde_json::to_value(info).map_err(|e| ApiError::Internal(e.to_string()))
    }

    fn add_peer(&self, params: &[Value]) -> Result<Value, ApiError> {
        let raw = params
            .first()
            .and_then(|v| v.as_str())
            .ok_or_else(|| ApiError::InvalidParams("expected peer address".to_string()))?;
        let addr: SocketAddr = raw
            .parse()
            .map_err(|e| ApiError::InvalidParams(format!("invalid address {}: {}", raw, e)))?;

        self.node
            .add_peer(addr)
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        Ok(json!(true))
    }

    fn protocols(&self) -> Result<Value, ApiError> {
        serde_json::to_value(self.node.manager().protocols())
            .map_err(|e| ApiError::Internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn api() -> AdminApi {
        let mut config = Config::default();
        config.node.name = "admin-test".to_string();
        config.network.listen_address = "127.0.0.1:0".to_string();
        AdminApi::new(Arc::new(Node::new(config).unwrap()))
    }

    #[test]
    fn test_unknown_method() {
        let err = api().handle_request("admin_nope", &Value::Null).unwrap_err();
        assert_eq!(err, ApiError::MethodNotFound("admin_nope".to_string()));
        assert_eq!(err.code(), -32601);
    }

    #[test]
    fn test_node_info() {
        let info = api().handle_request("admin_nodeInfo", &Value::Null).unwrap();
        assert_eq!(info["name"], "admin-test");
        assert_eq!(info["network_id"], 8217);
        assert_eq!(info["chain_id"], "8217");
        assert_eq!(info["id"].as_str().unwrap().len(), 64);
        assert!(info["listen_addr"].is_null());
        assert_eq!(info["protocols"][0]["name"], "guardian");
        assert_eq!(info["protocols"][0]["length"], 23);
    }

    #[test]
    fn test_protocols_table() {
        let protocols = api().handle_request("admin_protocols", &json!([])).unwrap();
        let protocols = protocols.as_array().unwrap();
        assert_eq!(protocols.len(), 5);
        assert_eq!(protocols[1], json!({"name": "klay", "version": 65, "length": 21}));
        assert_eq!(protocols[4], json!({"name": "klay", "version": 62, "length": 8}));
    }

    #[test]
    fn test_empty_peer_list() {
        let peers = api().handle_request("admin_peers", &Value::Null).unwrap();
        assert_eq!(peers, json!([]));
    }

    #[test]
    fn test_add_peer_rejects_bad_address() {
        let api = api();
        assert!(matches!(
            api.handle_request("admin_addPeer", &json!([])),
            Err(ApiError::InvalidParams(_))
        ));
        assert!(matches!(
            api.handle_request("admin_addPeer", &json!(["not-an-addr"])),
            Err(ApiError::InvalidParams(_))
        ));
    }

    #[tokio::test]
    async fn test_add_peer_on_running_node() {
        let mut config = Config::default();
        config.network.listen_address = "127.0.0.1:0".to_string();
        let node = Arc::new(Node::new(config).unwrap());
        node.start().await.unwrap();

        let api = AdminApi::new(node.clone());
        let started = api
            .handle_request("admin_addPeer", &json!(["127.0.0.1:1"]))
            .unwrap();
        assert_eq!(started, json!(true));

        node.stop().await.unwrap();
    }
}
