use std::path::PathBuf;

use alloy_primitives::{B64, B256, hex};
use async_trait::async_trait;
use jsonwebtoken::{EncodingKey, Header, encode, get_current_timestamp};
use reqwest::{Client, Request, Url};
use serde_json::json;

use crate::{
    error::EngineError,
    rpc::{Claims, JsonRpcRequest, JsonRpcResponse},
    rpc_types::{
        execution_block::ExecutionBlock,
        execution_payload::ExecutionPayloadV3,
        forkchoice_update::{ForkchoiceStateV1, ForkchoiceUpdateResult, PayloadAttributesV3},
        get_payload::PayloadV3,
        payload_status::PayloadStatusV1,
    },
};

/// Raw engine-API surface the adapter is built on. Kept narrow so tests can
/// script every status the EL may reply with.
#[async_trait]
pub trait EngineRpc: Send + Sync {
    async fn forkchoice_updated(
        &self,
        forkchoice_state: ForkchoiceStateV1,
        payload_attributes: Option<PayloadAttributesV3>,
    ) -> Result<ForkchoiceUpdateResult, EngineError>;

    async fn new_payload(
        &self,
        execution_payload: ExecutionPayloadV3,
        versioned_hashes: Vec<B256>,
        parent_beacon_block_root: B256,
    ) -> Result<PayloadStatusV1, EngineError>;

    async fn get_payload(&self, payload_id: B64) -> Result<PayloadV3, EngineError>;

    async fn block_by_hash(&self, block_hash: B256)
        -> Result<Option<ExecutionBlock>, EngineError>;
}

/// JSON-RPC client for the execution client's authenticated engine port.
pub struct EngineApiClient {
    http_client: Client,
    jwt_encoding_key: EncodingKey,
    engine_api_url: Url,
}

impl EngineApiClient {
    pub fn new(engine_api_url: Url, jwt_path: PathBuf) -> Result<EngineApiClient, EngineError> {
        let jwt_file = std::fs::read_to_string(jwt_path)
            .map_err(|err| EngineError::Jwt(format!("could not read jwt secret: {err}")))?;
        let jwt_private_key = hex::decode(jwt_file.trim_end().trim_start_matches("0x"))
            .map_err(|err| EngineError::Jwt(format!("malformed jwt secret: {err}")))?;
        Ok(EngineApiClient {
            http_client: Client::new(),
            jwt_encoding_key: EncodingKey::from_secret(jwt_private_key.as_slice()),
            engine_api_url,
        })
    }

    fn create_jwt_token(&self) -> Result<String, EngineError> {
        let claims = Claims {
            iat: get_current_timestamp(),
        };
        encode(&Header::default(), &claims, &self.jwt_encoding_key)
            .map_err(|err| EngineError::Jwt(format!("could not encode jwt token: {err}")))
    }

    fn build_request(&self, rpc_request: JsonRpcRequest) -> Result<Request, EngineError> {
        Ok(self
            .http_client
            .post(self.engine_api_url.clone())
            .json(&rpc_request)
            .bearer_auth(self.create_jwt_token()?)
            .build()?)
    }

    async fn dispatch<T: serde::de::DeserializeOwned>(
        &self,
        request: JsonRpcRequest,
    ) -> Result<T, EngineError> {
        let http_post_request = self.build_request(request)?;
        self.http_client
            .execute(http_post_request)
            .await?
            .json::<JsonRpcResponse<T>>()
            .await?
            .to_result()
    }

    pub async fn exchange_capabilities(&self) -> Result<Vec<String>, EngineError> {
        let capabilities: Vec<String> = vec![
            "engine_forkchoiceUpdatedV3".to_string(),
            "engine_getPayloadV3".to_string(),
            "engine_newPayloadV3".to_string(),
        ];
        self.dispatch(JsonRpcRequest::new(
            "engine_exchangeCapabilities",
            vec![json!(capabilities)],
        ))
        .await
    }
}

#[async_trait]
impl EngineRpc for EngineApiClient {
    async fn forkchoice_updated(
        &self,
        forkchoice_state: ForkchoiceStateV1,
        payload_attributes: Option<PayloadAttributesV3>,
    ) -> Result<ForkchoiceUpdateResult, EngineError> {
        self.dispatch(JsonRpcRequest::new(
            "engine_forkchoiceUpdatedV3",
            vec![json!(forkchoice_state), json!(payload_attributes)],
        ))
        .await
    }

    async fn new_payload(
        &self,
        execution_payload: ExecutionPayloadV3,
        versioned_hashes: Vec<B256>,
        parent_beacon_block_root: B256,
    ) -> Result<PayloadStatusV1, EngineError> {
        self.dispatch(JsonRpcRequest::new(
            "engine_newPayloadV3",
            vec![
                json!(execution_payload),
                json!(versioned_hashes),
                json!(parent_beacon_block_root),
            ],
        ))
        .await
    }

    async fn get_payload(&self, payload_id: B64) -> Result<PayloadV3, EngineError> {
        self.dispatch(JsonRpcRequest::new(
            "engine_getPayloadV3",
            vec![json!(payload_id)],
        ))
        .await
    }

    async fn block_by_hash(
        &self,
        block_hash: B256,
    ) -> Result<Option<ExecutionBlock>, EngineError> {
        self.dispatch(JsonRpcRequest::new(
            "eth_getBlockByHash",
            vec![json!(block_hash), json!(false)],
        ))
        .await
    }
}
