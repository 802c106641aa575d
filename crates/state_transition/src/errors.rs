use alloy_primitives::B256;
use thiserror::Error;

/// Non-fatal consensus verdicts of the transition function. Any of these
/// rejects the block under verification; none of them corrupts the
/// committed state, which only moves on an explicit branch commit.
///
/// Fatal conditions surface as `StoreError` / fatal `EngineError` values in
/// the same `anyhow` chain and are told apart by downcasting.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TransitionError {
    #[error("block slot {block} does not match state slot {state}")]
    SlotMismatch { block: u64, state: u64 },

    #[error("block slot {block} is not newer than the latest header slot {latest}")]
    StaleBlock { block: u64, latest: u64 },

    #[error("block parent root {block} does not match the latest header root {expected}")]
    ParentRootMismatch { block: B256, expected: B256 },

    #[error("proposer index {0} is not in the registry")]
    UnknownProposer(u64),

    #[error("proposer index {index} does not belong to the host-reported proposer")]
    ProposerMismatch { index: u64 },

    #[error("proposer {0} is slashed")]
    ProposerSlashed(u64),

    #[error("randao reveal does not verify against the proposer key")]
    InvalidRandaoReveal,

    #[error("invalid {kind}: {reason}")]
    InvalidOperation { kind: &'static str, reason: String },

    #[error("payload parent hash {payload} does not extend the latest payload header {expected}")]
    PayloadParentHashMismatch { payload: B256, expected: B256 },

    #[error("payload prev_randao {payload} does not match the current mix {expected}")]
    PayloadPrevRandaoMismatch { payload: B256, expected: B256 },

    #[error(
        "payload timestamp {timestamp} outside the window ({parent_timestamp}, {upper_bound}]"
    )]
    InvalidPayloadTimestamp {
        timestamp: u64,
        parent_timestamp: u64,
        upper_bound: u64,
    },

    #[error("{got} blob commitments exceed the per-block limit {limit}")]
    TooManyBlobCommitments { got: usize, limit: u64 },

    #[error("state root mismatch: block advertises {block}, computed {computed}")]
    StateRootMismatch { block: B256, computed: B256 },
}

impl TransitionError {
    pub(crate) fn invalid_operation(kind: &'static str, reason: impl Into<String>) -> Self {
        TransitionError::InvalidOperation {
            kind,
            reason: reason.into(),
        }
    }
}
