//! Request/response shapes of the BFT host callbacks the service
//! implements. They mirror the host's ABCI surface closely enough that the
//! outer shim is a mechanical conversion.

use moraine_consensus::validator_update::ValidatorUpdate;

/// Position of the SSZ-encoded beacon block in a proposal's transactions.
pub const BEACON_BLOCK_TX_INDEX: usize = 0;
/// Position of the optional SSZ-encoded sidecar list.
pub const BLOB_SIDECARS_TX_INDEX: usize = 1;

#[derive(Debug, Clone)]
pub struct ProcessProposalRequest {
    pub height: u64,
    /// Wall-clock time the host attached to the proposal, seconds.
    pub time: u64,
    pub proposer_address: [u8; 20],
    pub txs: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalStatus {
    Accept,
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessProposalResponse {
    pub status: ProposalStatus,
}

#[derive(Debug, Clone)]
pub struct FinalizeBlockRequest {
    pub height: u64,
    pub time: u64,
    pub proposer_address: [u8; 20],
    pub txs: Vec<Vec<u8>>,
}

/// Indexable event attached to a finalized block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: String,
    pub attributes: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct FinalizeBlockResponse {
    pub events: Vec<Event>,
    pub validator_updates: Vec<ValidatorUpdate>,
}
