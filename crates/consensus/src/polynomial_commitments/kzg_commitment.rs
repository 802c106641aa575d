use alloy_primitives::{B256, FixedBytes};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use ssz_derive::{Decode, Encode};
use tree_hash::TreeHash;

use crate::constants::{BYTES_PER_COMMITMENT, VERSIONED_HASH_VERSION_KZG};

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Default, Serialize, Deserialize, Encode, Decode)]
#[ssz(struct_behaviour = "transparent")]
#[serde(transparent)]
pub struct KZGCommitment(pub FixedBytes<BYTES_PER_COMMITMENT>);

impl TreeHash for KZGCommitment {
    fn tree_hash_type() -> tree_hash::TreeHashType {
        <FixedBytes<BYTES_PER_COMMITMENT> as TreeHash>::tree_hash_type()
    }

    fn tree_hash_packed_encoding(&self) -> tree_hash::PackedEncoding {
        self.0.tree_hash_packed_encoding()
    }

    fn tree_hash_packing_factor() -> usize {
        <FixedBytes<BYTES_PER_COMMITMENT> as TreeHash>::tree_hash_packing_factor()
    }

    fn tree_hash_root(&self) -> tree_hash::Hash256 {
        self.0.tree_hash_root()
    }
}

impl KZGCommitment {
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_slice()
    }

    /// The EIP-4844 versioned hash: SHA-256 of the commitment with the first
    /// byte replaced by the version tag.
    pub fn calculate_versioned_hash(&self) -> B256 {
        let mut hash: [u8; 32] = Sha256::digest(self.0.as_slice()).into();
        hash[0] = VERSIONED_HASH_VERSION_KZG;
        B256::new(hash)
    }
}
