use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

/// The slice of `eth_getBlockByHash` the adapter cares about when checking
/// whether the EL already knows a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionBlock {
    pub hash: B256,
    pub parent_hash: B256,
    #[serde(with = "serde_utils::u64_hex_be")]
    pub number: u64,
    #[serde(with = "serde_utils::u64_hex_be")]
    pub timestamp: u64,
}
