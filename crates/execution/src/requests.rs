use alloy_primitives::{B64, B256, U256};

use crate::rpc_types::{
    forkchoice_update::{ForkchoiceStateV1, PayloadAttributesV3},
    get_payload::BlobsBundleV1,
};
use moraine_consensus::execution_payload::ExecutionPayload;

/// Everything `newPayload` needs, plus the caller's tolerance settings.
#[derive(Debug, Clone)]
pub struct NewPayloadRequest {
    pub execution_payload: ExecutionPayload,
    pub versioned_hashes: Vec<B256>,
    pub parent_beacon_block_root: B256,
    /// Treat `ACCEPTED`/`SYNCING` as success.
    pub optimistic: bool,
    /// Short-circuit if the EL already knows the block hash.
    pub skip_if_exists: bool,
}

#[derive(Debug, Clone)]
pub struct ForkchoiceUpdateRequest {
    pub state: ForkchoiceStateV1,
    pub payload_attributes: Option<PayloadAttributesV3>,
}

/// Successful outcome of a forkchoice update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForkchoiceResult {
    pub payload_id: Option<B64>,
    pub latest_valid_hash: Option<B256>,
}

/// A built payload handed back by `getPayload`.
#[derive(Debug, Clone)]
pub struct PayloadEnvelope {
    pub execution_payload: ExecutionPayload,
    pub blobs_bundle: BlobsBundleV1,
    pub block_value: U256,
}
