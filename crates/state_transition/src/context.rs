use tokio_util::sync::CancellationToken;

/// Per-invocation options of the transition function. The flags mirror the
/// distinct callers: full verification for incoming proposals, optimistic
/// finalization, sealed-block construction and historical replay.
#[derive(Debug, Clone)]
pub struct TransitionContext {
    /// Treat EL `ACCEPTED`/`SYNCING` replies as success.
    pub optimistic_engine: bool,
    /// Skip EL interaction entirely (historical replay).
    pub skip_payload_verification: bool,
    /// Skip the post-state-root comparison (proposer has not sealed yet).
    pub skip_validate_result: bool,
    /// Skip the randao-reveal BLS verification (replay only).
    pub skip_validate_randao: bool,
    /// BFT-layer address of the proposer, for attribution checks.
    pub proposer_address: Option<[u8; 20]>,
    /// Wall-clock time asserted by the BFT host, bounding the payload
    /// timestamp.
    pub consensus_time: u64,
    pub cancel: CancellationToken,
}

impl TransitionContext {
    /// Everything verified, nothing tolerated: the `ProcessProposal` path.
    pub fn verifying(
        proposer_address: [u8; 20],
        consensus_time: u64,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            optimistic_engine: false,
            skip_payload_verification: false,
            skip_validate_result: false,
            skip_validate_randao: false,
            proposer_address: Some(proposer_address),
            consensus_time,
            cancel,
        }
    }

    /// The `FinalizeBlock` path. Whether EL `ACCEPTED`/`SYNCING` is
    /// tolerated follows the deployment's optimistic-payload-builds
    /// setting: a non-optimistic node never finalizes a payload the EL
    /// has not validated.
    pub fn finalizing(
        proposer_address: [u8; 20],
        consensus_time: u64,
        optimistic_engine: bool,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            optimistic_engine,
            ..Self::verifying(proposer_address, consensus_time, cancel)
        }
    }

    /// Proposal construction: the state root is not known yet.
    pub fn building(consensus_time: u64, cancel: CancellationToken) -> Self {
        Self {
            optimistic_engine: true,
            skip_payload_verification: false,
            skip_validate_result: true,
            skip_validate_randao: false,
            proposer_address: None,
            consensus_time,
            cancel,
        }
    }
}
