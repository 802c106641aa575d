use alloy_primitives::aliases::B32;
use serde::{Deserialize, Serialize};

use crate::{deposit_data::DepositData, execution_payload_header::ExecutionPayloadHeader};

/// Everything needed to seed the chain: the premined validator set and the
/// execution genesis the consensus layer anchors to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genesis {
    pub fork_version: B32,
    pub deposits: Vec<DepositData>,
    pub execution_payload_header: ExecutionPayloadHeader,
}
