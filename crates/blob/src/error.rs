use thiserror::Error;

/// Errors raised while verifying blob sidecars. All of them are non-fatal:
/// the proposal is rejected and the node keeps running.
#[derive(Debug, Error)]
pub enum BlobVerificationError {
    #[error("sidecar count {got} exceeds the per-block limit {limit}")]
    TooManyBlobs { got: usize, limit: u64 },

    #[error("sidecar index {0} exceeds the commitment list capacity")]
    InvalidIndex(u64),

    #[error("sidecar at index {0} carries a header that does not match the proposal")]
    HeaderMismatch(u64),

    #[error("invalid blob data: {0}")]
    InvalidBlob(String),

    #[error("invalid KZG commitment: {0}")]
    InvalidCommitment(String),

    #[error("invalid KZG proof: {0}")]
    InvalidProof(String),

    #[error("KZG verification failed: {0}")]
    VerificationFailed(String),

    #[error("KZG proof is invalid for the sidecar batch")]
    InvalidProofValue,

    #[error("inclusion proof for commitment at index {0} does not bind to the body root")]
    InclusionProofInvalid(u64),

    #[error("block header signature rejected: {0}")]
    SignatureError(String),

    #[error("block header signature is invalid")]
    SignatureInvalid,
}
