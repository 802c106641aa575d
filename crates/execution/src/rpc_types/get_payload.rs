use alloy_primitives::{Bytes, U256};
use serde::{Deserialize, Serialize};

use super::execution_payload::ExecutionPayloadV3;
use moraine_consensus::polynomial_commitments::{
    kzg_commitment::KZGCommitment, kzg_proof::KZGProof,
};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobsBundleV1 {
    pub commitments: Vec<KZGCommitment>,
    pub proofs: Vec<KZGProof>,
    pub blobs: Vec<Bytes>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadV3 {
    pub execution_payload: ExecutionPayloadV3,
    pub block_value: U256,
    pub blobs_bundle: BlobsBundleV1,
    pub should_override_builder: bool,
}
