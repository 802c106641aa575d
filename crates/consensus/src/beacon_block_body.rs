use alloy_primitives::B256;
use anyhow::ensure;
use moraine_bls::BLSSignature;
use moraine_merkle::list_in_container_proof;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use ssz_types::{
    VariableList,
    typenum::{U2, U16, U4096},
};
use tree_hash::TreeHash;
use tree_hash_derive::TreeHash;

use crate::{
    attester_slashing::AttesterSlashing,
    constants::{
        BLOB_KZG_COMMITMENTS_INDEX, BLOB_KZG_COMMITMENTS_LIST_DEPTH, BODY_MERKLE_DEPTH,
        KZG_COMMITMENT_INCLUSION_PROOF_DEPTH,
    },
    deposit::Deposit,
    eth1_data::Eth1Data,
    execution_payload::ExecutionPayload,
    polynomial_commitments::kzg_commitment::KZGCommitment,
    proposer_slashing::ProposerSlashing,
    voluntary_exit::SignedVoluntaryExit,
};

#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct BeaconBlockBody {
    pub randao_reveal: BLSSignature,
    pub eth1_data: Eth1Data,
    pub graffiti: B256,
    pub proposer_slashings: VariableList<ProposerSlashing, U16>,
    pub attester_slashings: VariableList<AttesterSlashing, U2>,
    pub deposits: VariableList<Deposit, U16>,
    pub voluntary_exits: VariableList<SignedVoluntaryExit, U16>,
    pub execution_payload: ExecutionPayload,
    pub blob_kzg_commitments: VariableList<KZGCommitment, U4096>,
}

impl BeaconBlockBody {
    /// Field roots of the container in declaration order. Must stay in
    /// lockstep with the struct fields; `tree_hash_root` is derived from
    /// the same ordering.
    fn merkle_leaves(&self) -> Vec<B256> {
        vec![
            self.randao_reveal.tree_hash_root(),
            self.eth1_data.tree_hash_root(),
            self.graffiti.tree_hash_root(),
            self.proposer_slashings.tree_hash_root(),
            self.attester_slashings.tree_hash_root(),
            self.deposits.tree_hash_root(),
            self.voluntary_exits.tree_hash_root(),
            self.execution_payload.tree_hash_root(),
            self.blob_kzg_commitments.tree_hash_root(),
        ]
    }

    /// Merkle branch binding `blob_kzg_commitments[index]` to the body
    /// root, leaf-first.
    pub fn blob_kzg_commitment_inclusion_proof(&self, index: u64) -> anyhow::Result<Vec<B256>> {
        ensure!(
            index < self.blob_kzg_commitments.len() as u64,
            "commitment index {index} out of bounds"
        );

        let commitment_leaves = self
            .blob_kzg_commitments
            .iter()
            .map(|commitment| commitment.tree_hash_root())
            .collect::<Vec<_>>();

        let proof = list_in_container_proof(
            &commitment_leaves,
            index,
            BLOB_KZG_COMMITMENTS_LIST_DEPTH,
            &self.merkle_leaves(),
            BLOB_KZG_COMMITMENTS_INDEX as u64,
            BODY_MERKLE_DEPTH,
        )?;
        debug_assert_eq!(proof.len() as u64, KZG_COMMITMENT_INCLUSION_PROOF_DEPTH);

        Ok(proof)
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::FixedBytes;
    use moraine_merkle::{ChunkTree, verify_list_in_container};

    use super::*;

    fn body_with_commitments(count: usize) -> BeaconBlockBody {
        let commitments = (0..count)
            .map(|i| KZGCommitment(FixedBytes::from([i as u8 + 1; 48])))
            .collect::<Vec<_>>();
        BeaconBlockBody {
            blob_kzg_commitments: VariableList::new(commitments).unwrap(),
            ..Default::default()
        }
    }

    #[test]
    fn manual_leaves_match_derived_body_root() {
        let body = body_with_commitments(3);
        let tree = ChunkTree::build(&body.merkle_leaves(), BODY_MERKLE_DEPTH).unwrap();
        assert_eq!(tree.root(), body.tree_hash_root());
    }

    #[test]
    fn inclusion_proof_verifies_against_body_root() {
        let body = body_with_commitments(3);
        let body_root = body.tree_hash_root();

        for index in 0..3u64 {
            let proof = body.blob_kzg_commitment_inclusion_proof(index).unwrap();
            assert_eq!(proof.len() as u64, KZG_COMMITMENT_INCLUSION_PROOF_DEPTH);
            assert!(verify_list_in_container(
                body.blob_kzg_commitments[index as usize].tree_hash_root(),
                &proof,
                index,
                BLOB_KZG_COMMITMENTS_LIST_DEPTH,
                BLOB_KZG_COMMITMENTS_INDEX as u64,
                BODY_MERKLE_DEPTH,
                body_root,
            ));
        }
    }

    #[test]
    fn inclusion_proof_is_bound_to_the_body() {
        let body = body_with_commitments(2);
        let proof = body.blob_kzg_commitment_inclusion_proof(0).unwrap();

        let mut other = body_with_commitments(2);
        other.graffiti = B256::repeat_byte(0x42);

        assert!(!verify_list_in_container(
            body.blob_kzg_commitments[0].tree_hash_root(),
            &proof,
            0,
            BLOB_KZG_COMMITMENTS_LIST_DEPTH,
            BLOB_KZG_COMMITMENTS_INDEX as u64,
            BODY_MERKLE_DEPTH,
            other.tree_hash_root(),
        ));
    }

    #[test]
    fn inclusion_proof_rejects_out_of_bounds_index() {
        let body = body_with_commitments(1);
        assert!(body.blob_kzg_commitment_inclusion_proof(1).is_err());
    }
}
