use alloy_primitives::B256;
use blst::min_pk::SecretKey as BlstSecretKey;
use ssz_derive::{Decode, Encode};
use ssz_types::FixedVector;
use tree_hash_derive::TreeHash;

use crate::{
    constants::DST, errors::BLSError, pubkey::PubKey, signature::BLSSignature, traits::Signable,
};

#[derive(Debug, PartialEq, Clone, Encode, Decode, TreeHash, Default, Eq, Hash)]
pub struct PrivateKey {
    pub inner: B256,
}

impl PrivateKey {
    /// Derive a key from at least 32 bytes of input key material.
    pub fn from_seed(ikm: &[u8]) -> Result<PrivateKey, BLSError> {
        let secret_key =
            BlstSecretKey::key_gen(ikm, &[]).map_err(|_| BLSError::InvalidSecretKey)?;
        Ok(PrivateKey {
            inner: B256::from_slice(&secret_key.to_bytes()),
        })
    }

    pub fn to_blst_secret_key(&self) -> Result<BlstSecretKey, BLSError> {
        BlstSecretKey::from_bytes(self.inner.as_slice()).map_err(|_| BLSError::InvalidSecretKey)
    }

    pub fn public_key(&self) -> Result<PubKey, BLSError> {
        PubKey::try_from(self.to_blst_secret_key()?.sk_to_pk())
    }
}

impl Signable for PrivateKey {
    type Error = BLSError;

    fn sign(&self, message: &[u8]) -> Result<BLSSignature, Self::Error> {
        let private_key = self.to_blst_secret_key()?;
        let signature = private_key.sign(message, DST, &[]);
        Ok(BLSSignature {
            inner: FixedVector::new(signature.to_bytes().to_vec())
                .map_err(|_| BLSError::InvalidSignature)?,
        })
    }
}
