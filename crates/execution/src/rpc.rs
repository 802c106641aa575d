use serde::{Deserialize, Serialize};

use crate::error::EngineError;

#[derive(Debug, Serialize)]
pub struct JsonRpcRequest {
    pub id: u64,
    pub jsonrpc: String,
    pub method: String,
    pub params: Vec<serde_json::Value>,
}

impl JsonRpcRequest {
    pub fn new(method: &str, params: Vec<serde_json::Value>) -> Self {
        Self {
            id: 1,
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse<T> {
    pub result: Option<T>,
    pub error: Option<JsonRpcError>,
}

impl<T> JsonRpcResponse<T> {
    pub fn to_result(self) -> Result<T, EngineError> {
        if let Some(error) = self.error {
            return Err(EngineError::RpcError {
                code: error.code,
                message: error.message,
            });
        }
        self.result
            .ok_or_else(|| EngineError::Transport("rpc reply carried no result".to_string()))
    }
}

/// Claims of the short-lived JWT the engine API requires on every call.
#[derive(Debug, Serialize)]
pub struct Claims {
    pub iat: u64,
}
