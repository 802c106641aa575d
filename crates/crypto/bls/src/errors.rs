use blst::BLST_ERROR;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum BLSError {
    #[error("invalid public key bytes")]
    InvalidPublicKey,

    #[error("invalid signature bytes")]
    InvalidSignature,

    #[error("invalid secret key bytes")]
    InvalidSecretKey,

    #[error("invalid hex string")]
    InvalidHexString,

    #[error("invalid byte length")]
    InvalidByteLength,

    #[error("blst error: {0:?}")]
    BlstError(BLST_ERROR),
}

impl From<BLST_ERROR> for BLSError {
    fn from(err: BLST_ERROR) -> Self {
        BLSError::BlstError(err)
    }
}
