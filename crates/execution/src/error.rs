use thiserror::Error;

/// Classified outcomes of talking to the execution client.
///
/// Three families matter to callers:
/// - transient engine conditions (`Accepted`/`Syncing`) that an optimistic
///   caller may treat as success,
/// - non-fatal consensus verdicts (bad hashes, invalid payloads) that reject
///   the block under verification,
/// - fatal transport/recovery failures that must abort the host.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum EngineError {
    #[error("payload was accepted but has not been validated yet")]
    AcceptedPayloadStatus,

    #[error("execution client is syncing")]
    SyncingPayloadStatus,

    #[error("invalid payload status")]
    InvalidPayloadStatus,

    #[error("invalid block hash payload status")]
    InvalidBlockHashPayloadStatus,

    #[error("a bad block was produced and pushed to the execution chain")]
    BadBlockProduced,

    #[error("payload block hash does not match the locally computed hash")]
    InvalidPayloadBlockHash,

    #[error("payload versioned hashes do not match the blob commitments")]
    InvalidVersionedHashes,

    #[error("malformed payload: {0}")]
    InvalidPayload(String),

    #[error("engine returned no payload id for a build request")]
    MissingPayloadId,

    #[error("forkchoice recovery failed: execution chain has no valid ancestor")]
    ForkchoiceRecoveryFailed,

    #[error("request cancelled")]
    Cancelled,

    #[error("jwt error: {0}")]
    Jwt(String),

    #[error("engine rpc error {code}: {message}")]
    RpcError { code: i64, message: String },

    #[error("rpc transport error: {0}")]
    Transport(String),
}

impl EngineError {
    /// Engine-transient conditions: the EL has not rejected the payload, it
    /// just cannot validate it yet.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EngineError::AcceptedPayloadStatus | EngineError::SyncingPayloadStatus
        )
    }

    /// Errors that must abort the host rather than reject the block.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::ForkchoiceRecoveryFailed
                | EngineError::Jwt(_)
                | EngineError::RpcError { .. }
                | EngineError::Transport(_)
        )
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        EngineError::Transport(err.to_string())
    }
}
