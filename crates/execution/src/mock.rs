//! Scriptable in-process engine used by unit and scenario tests.

use std::{
    collections::{HashSet, VecDeque},
    sync::Mutex,
};

use alloy_primitives::{B64, B256, U256};
use async_trait::async_trait;

use crate::{
    client::EngineRpc,
    error::EngineError,
    rpc_types::{
        execution_block::ExecutionBlock,
        execution_payload::ExecutionPayloadV3,
        forkchoice_update::{ForkchoiceStateV1, ForkchoiceUpdateResult, PayloadAttributesV3},
        get_payload::{BlobsBundleV1, PayloadV3},
        payload_status::PayloadStatusV1,
    },
};
use moraine_consensus::execution_payload::ExecutionPayload;

/// Replies with queued statuses, falling back to `VALID` when the queue is
/// empty, and records what it was asked.
#[derive(Default)]
pub struct MockEngineRpc {
    forkchoice_statuses: Mutex<VecDeque<PayloadStatusV1>>,
    new_payload_statuses: Mutex<VecDeque<PayloadStatusV1>>,
    known_blocks: Mutex<HashSet<B256>>,
    next_payload_id: Mutex<Option<B64>>,
    built_payload: Mutex<Option<ExecutionPayload>>,
    forkchoice_states: Mutex<Vec<ForkchoiceStateV1>>,
    new_payload_count: Mutex<u64>,
}

impl MockEngineRpc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_forkchoice_status(&self, status: PayloadStatusV1) {
        self.forkchoice_statuses
            .lock()
            .unwrap()
            .push_back(status);
    }

    pub fn push_new_payload_status(&self, status: PayloadStatusV1) {
        self.new_payload_statuses
            .lock()
            .unwrap()
            .push_back(status);
    }

    pub fn insert_known_block(&self, block_hash: B256) {
        self.known_blocks.lock().unwrap().insert(block_hash);
    }

    pub fn set_next_payload_id(&self, payload_id: B64) {
        *self.next_payload_id.lock().unwrap() = Some(payload_id);
    }

    pub fn set_built_payload(&self, payload: ExecutionPayload) {
        *self.built_payload.lock().unwrap() = Some(payload);
    }

    pub fn new_payload_calls(&self) -> u64 {
        *self.new_payload_count.lock().unwrap()
    }

    pub fn last_forkchoice_state(&self) -> Option<ForkchoiceStateV1> {
        self.forkchoice_states.lock().unwrap().last().copied()
    }

    pub fn forkchoice_calls(&self) -> usize {
        self.forkchoice_states.lock().unwrap().len()
    }
}

#[async_trait]
impl EngineRpc for MockEngineRpc {
    async fn forkchoice_updated(
        &self,
        forkchoice_state: ForkchoiceStateV1,
        _payload_attributes: Option<PayloadAttributesV3>,
    ) -> Result<ForkchoiceUpdateResult, EngineError> {
        self.forkchoice_states.lock().unwrap().push(forkchoice_state);
        let payload_status = self
            .forkchoice_statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(PayloadStatusV1::valid);
        Ok(ForkchoiceUpdateResult {
            payload_status,
            payload_id: *self.next_payload_id.lock().unwrap(),
        })
    }

    async fn new_payload(
        &self,
        _execution_payload: ExecutionPayloadV3,
        _versioned_hashes: Vec<B256>,
        _parent_beacon_block_root: B256,
    ) -> Result<PayloadStatusV1, EngineError> {
        *self.new_payload_count.lock().unwrap() += 1;
        Ok(self
            .new_payload_statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(PayloadStatusV1::valid))
    }

    async fn get_payload(&self, _payload_id: B64) -> Result<PayloadV3, EngineError> {
        let payload = self
            .built_payload
            .lock()
            .unwrap()
            .clone()
            .ok_or(EngineError::MissingPayloadId)?;
        Ok(PayloadV3 {
            execution_payload: ExecutionPayloadV3::from(&payload),
            block_value: U256::ZERO,
            blobs_bundle: BlobsBundleV1::default(),
            should_override_builder: false,
        })
    }

    async fn block_by_hash(
        &self,
        block_hash: B256,
    ) -> Result<Option<ExecutionBlock>, EngineError> {
        if self.known_blocks.lock().unwrap().contains(&block_hash) {
            Ok(Some(ExecutionBlock {
                hash: block_hash,
                parent_hash: B256::ZERO,
                number: 0,
                timestamp: 0,
            }))
        } else {
            Ok(None)
        }
    }
}
