use alloy_primitives::B256;
use anyhow::ensure;
use moraine_bls::BLSSignature;
use moraine_chain_spec::ForkName;
use serde::{Deserialize, Serialize};
use ssz::Decode;
use ssz_derive::{Decode, Encode};
use tree_hash::TreeHash;
use tree_hash_derive::TreeHash;

use crate::{
    beacon_block_body::BeaconBlockBody,
    beacon_block_header::{BeaconBlockHeader, SignedBeaconBlockHeader},
    blob_sidecar::BlobSidecar,
    polynomial_commitments::kzg_proof::KZGProof,
};

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct SignedBeaconBlock {
    pub message: BeaconBlock,
    pub signature: BLSSignature,
}

impl SignedBeaconBlock {
    /// Decode a proposal payload tagged with the fork active at its height.
    /// The body layout is shared by the supported forks, so the tag only
    /// guards against decoding blocks from unknown rule sets.
    pub fn from_ssz_bytes_by_fork(
        bytes: &[u8],
        fork_name: ForkName,
    ) -> Result<Self, ssz::DecodeError> {
        match fork_name {
            ForkName::Deneb | ForkName::Deneb1 => Self::from_ssz_bytes(bytes),
        }
    }

    pub fn signed_header(&self) -> SignedBeaconBlockHeader {
        SignedBeaconBlockHeader {
            message: self.message.header(),
            signature: self.signature.clone(),
        }
    }

    /// Package `blobs[index]` with everything a verifier needs to bind it to
    /// this block.
    pub fn blob_sidecar(
        &self,
        blob: crate::blob_sidecar::Blob,
        proof: KZGProof,
        index: u64,
    ) -> anyhow::Result<BlobSidecar> {
        ensure!(
            index < self.message.body.blob_kzg_commitments.len() as u64,
            "index must be less than the number of blob kzg commitments"
        );
        Ok(BlobSidecar {
            index,
            blob,
            kzg_commitment: self.message.body.blob_kzg_commitments[index as usize],
            kzg_proof: proof,
            signed_block_header: self.signed_header(),
            kzg_commitment_inclusion_proof: self
                .message
                .body
                .blob_kzg_commitment_inclusion_proof(index)?
                .into(),
        })
    }
}

#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct BeaconBlock {
    #[serde(with = "serde_utils::quoted_u64")]
    pub slot: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub proposer_index: u64,
    pub parent_root: B256,
    pub state_root: B256,
    pub body: BeaconBlockBody,
}

impl BeaconBlock {
    pub fn block_root(&self) -> B256 {
        self.tree_hash_root()
    }

    pub fn header(&self) -> BeaconBlockHeader {
        BeaconBlockHeader {
            slot: self.slot,
            proposer_index: self.proposer_index,
            parent_root: self.parent_root,
            state_root: self.state_root,
            body_root: self.body.tree_hash_root(),
        }
    }
}

#[cfg(test)]
mod tests {
    use ssz::Encode;

    use super::*;

    #[test]
    fn ssz_roundtrip_preserves_root() {
        let block = SignedBeaconBlock {
            message: BeaconBlock {
                slot: 7,
                proposer_index: 3,
                parent_root: B256::repeat_byte(1),
                state_root: B256::repeat_byte(2),
                body: Default::default(),
            },
            signature: Default::default(),
        };

        let bytes = block.as_ssz_bytes();
        let decoded = SignedBeaconBlock::from_ssz_bytes_by_fork(&bytes, ForkName::Deneb).unwrap();
        assert_eq!(decoded, block);
        assert_eq!(
            decoded.message.block_root(),
            block.message.block_root()
        );
    }

    #[test]
    fn header_root_commits_to_body() {
        let mut block = BeaconBlock {
            slot: 1,
            ..Default::default()
        };
        let root_before = block.header().tree_hash_root();
        block.body.graffiti = B256::repeat_byte(9);
        assert_ne!(block.header().tree_hash_root(), root_before);
    }
}
