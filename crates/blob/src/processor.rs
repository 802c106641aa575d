use std::sync::Arc;

use alloy_primitives::B256;
use c_kzg::{Blob as CKzgBlob, Bytes48, KzgSettings, ethereum_kzg_settings};
use moraine_bls::{PubKey, traits::Verifiable};
use moraine_chain_spec::ChainSpec;
use moraine_consensus::{
    beacon_block_header::SignedBeaconBlockHeader,
    blob_sidecar::BlobSidecar,
    constants::{
        BLOB_KZG_COMMITMENTS_INDEX, BLOB_KZG_COMMITMENTS_LIST_DEPTH, BODY_MERKLE_DEPTH,
        MAX_BLOB_COMMITMENTS_PER_BLOCK,
    },
    misc::compute_signing_root,
};
use moraine_merkle::verify_list_in_container;
use tracing::debug;
use tree_hash::TreeHash;

use crate::error::BlobVerificationError;

/// Disable the fixed-base MSM precomputation; verification stays fast
/// enough and the memory stays flat.
const NO_PRECOMPUTE: u64 = 0;

/// Verifies blob sidecars against the block header they claim to belong to.
/// The trusted setup is the embedded Ethereum mainnet one, loaded once.
pub struct BlobProcessor {
    kzg_settings: &'static KzgSettings,
    spec: Arc<ChainSpec>,
}

impl BlobProcessor {
    pub fn new(spec: Arc<ChainSpec>) -> Self {
        Self {
            kzg_settings: ethereum_kzg_settings(NO_PRECOMPUTE),
            spec,
        }
    }

    /// Run the full sidecar check: count bound, batched pairing check,
    /// commitment inclusion proofs, and the proposer's header signature.
    ///
    /// An empty set is legal and verifies trivially.
    pub fn verify_sidecars(
        &self,
        sidecars: &[BlobSidecar],
        expected_header: &SignedBeaconBlockHeader,
        proposer_pubkey: &PubKey,
        proposer_domain: B256,
    ) -> Result<(), BlobVerificationError> {
        if sidecars.is_empty() {
            return Ok(());
        }

        if sidecars.len() as u64 > self.spec.max_blobs_per_block {
            return Err(BlobVerificationError::TooManyBlobs {
                got: sidecars.len(),
                limit: self.spec.max_blobs_per_block,
            });
        }

        // Each sidecar must restate the proposal's header verbatim; the
        // inclusion proofs below only bind commitments to that header's
        // body root.
        for sidecar in sidecars {
            if sidecar.index >= MAX_BLOB_COMMITMENTS_PER_BLOCK {
                return Err(BlobVerificationError::InvalidIndex(sidecar.index));
            }
            if &sidecar.signed_block_header != expected_header {
                return Err(BlobVerificationError::HeaderMismatch(sidecar.index));
            }
        }

        self.verify_kzg_proof_batch(sidecars)?;

        let body_root = expected_header.message.body_root;
        for sidecar in sidecars {
            let valid = verify_list_in_container(
                sidecar.kzg_commitment.tree_hash_root(),
                &sidecar.kzg_commitment_inclusion_proof,
                sidecar.index,
                BLOB_KZG_COMMITMENTS_LIST_DEPTH,
                BLOB_KZG_COMMITMENTS_INDEX as u64,
                BODY_MERKLE_DEPTH,
                body_root,
            );
            if !valid {
                return Err(BlobVerificationError::InclusionProofInvalid(sidecar.index));
            }
        }

        let signing_root = compute_signing_root(&expected_header.message, proposer_domain);
        let signature_valid = expected_header
            .signature
            .verify(proposer_pubkey, signing_root.as_slice())
            .map_err(|err| BlobVerificationError::SignatureError(format!("{err:?}")))?;
        if !signature_valid {
            return Err(BlobVerificationError::SignatureInvalid);
        }

        debug!(num_blobs = sidecars.len(), "blob sidecars verified");
        Ok(())
    }

    fn verify_kzg_proof_batch(
        &self,
        sidecars: &[BlobSidecar],
    ) -> Result<(), BlobVerificationError> {
        let blobs = sidecars
            .iter()
            .map(|sidecar| CKzgBlob::from_bytes(sidecar.blob.iter().as_slice()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| BlobVerificationError::InvalidBlob(format!("{err:?}")))?;

        let commitments = sidecars
            .iter()
            .map(|sidecar| Bytes48::from_bytes(sidecar.kzg_commitment.as_bytes()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| BlobVerificationError::InvalidCommitment(format!("{err:?}")))?;

        let proofs = sidecars
            .iter()
            .map(|sidecar| Bytes48::from_bytes(sidecar.kzg_proof.as_slice()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| BlobVerificationError::InvalidProof(format!("{err:?}")))?;

        let valid = self
            .kzg_settings
            .verify_blob_kzg_proof_batch(&blobs, &commitments, &proofs)
            .map_err(|err| BlobVerificationError::VerificationFailed(format!("{err:?}")))?;

        if !valid {
            return Err(BlobVerificationError::InvalidProofValue);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::FixedBytes;
    use moraine_bls::{PrivateKey, traits::Signable};
    use moraine_consensus::{
        beacon_block::{BeaconBlock, SignedBeaconBlock},
        constants::DOMAIN_BEACON_PROPOSER,
        misc::compute_domain,
        polynomial_commitments::kzg_commitment::KZGCommitment,
    };
    use ssz_types::VariableList;

    use super::*;

    fn proposer_key() -> PrivateKey {
        PrivateKey::from_seed(&[42u8; 32]).unwrap()
    }

    fn domain() -> B256 {
        compute_domain(
            DOMAIN_BEACON_PROPOSER,
            FixedBytes::from([4, 0, 0, 0]),
            B256::ZERO,
        )
    }

    /// A block carrying `count` zero blobs with honest commitments and
    /// proofs, plus its signed header and sidecars.
    fn block_with_blobs(count: usize) -> (SignedBeaconBlock, Vec<BlobSidecar>) {
        let settings = ethereum_kzg_settings(NO_PRECOMPUTE);
        let blob_bytes = vec![0u8; 131_072];
        let blob = CKzgBlob::from_bytes(&blob_bytes).unwrap();
        let commitment = settings.blob_to_kzg_commitment(&blob).unwrap();
        let proof = settings
            .compute_blob_kzg_proof(&blob, &commitment.to_bytes())
            .unwrap();

        let commitments = (0..count)
            .map(|_| KZGCommitment(FixedBytes::from(*commitment.to_bytes())))
            .collect::<Vec<_>>();

        let mut block = BeaconBlock::default();
        block.body.blob_kzg_commitments = VariableList::new(commitments).unwrap();

        let header = block.header();
        let signing_root = compute_signing_root(&header, domain());
        let signature = proposer_key().sign(signing_root.as_slice()).unwrap();
        let signed_block = SignedBeaconBlock {
            message: block,
            signature,
        };

        let sidecars = (0..count)
            .map(|index| {
                signed_block
                    .blob_sidecar(
                        blob_bytes.clone().into(),
                        FixedBytes::from(*proof.to_bytes()),
                        index as u64,
                    )
                    .unwrap()
            })
            .collect();

        (signed_block, sidecars)
    }

    fn processor() -> BlobProcessor {
        BlobProcessor::new(Arc::new(ChainSpec::minimal()))
    }

    #[test]
    fn empty_sidecar_set_is_legal() {
        let (block, _) = block_with_blobs(1);
        let pubkey = proposer_key().public_key().unwrap();
        assert!(processor()
            .verify_sidecars(&[], &block.signed_header(), &pubkey, domain())
            .is_ok());
    }

    #[test]
    fn honest_sidecars_verify() {
        let (block, sidecars) = block_with_blobs(2);
        let pubkey = proposer_key().public_key().unwrap();
        processor()
            .verify_sidecars(&sidecars, &block.signed_header(), &pubkey, domain())
            .unwrap();
    }

    #[test]
    fn count_above_limit_is_rejected() {
        let (block, sidecars) = block_with_blobs(7);
        let pubkey = proposer_key().public_key().unwrap();
        assert!(matches!(
            processor().verify_sidecars(&sidecars, &block.signed_header(), &pubkey, domain()),
            Err(BlobVerificationError::TooManyBlobs { got: 7, .. })
        ));
    }

    #[test]
    fn commitment_mismatch_fails_the_pairing_check() {
        let (block, mut sidecars) = block_with_blobs(1);
        let pubkey = proposer_key().public_key().unwrap();
        // A commitment that does not open to the blob.
        sidecars[0].kzg_commitment = KZGCommitment(FixedBytes::from([0xC0; 48]));

        assert!(matches!(
            processor().verify_sidecars(&sidecars, &block.signed_header(), &pubkey, domain()),
            Err(BlobVerificationError::InvalidCommitment(_))
                | Err(BlobVerificationError::VerificationFailed(_))
                | Err(BlobVerificationError::InvalidProofValue)
        ));
    }

    #[test]
    fn tampered_inclusion_proof_is_rejected() {
        let (block, mut sidecars) = block_with_blobs(1);
        let pubkey = proposer_key().public_key().unwrap();
        sidecars[0].kzg_commitment_inclusion_proof[0] = B256::repeat_byte(0xEE);

        assert!(matches!(
            processor().verify_sidecars(&sidecars, &block.signed_header(), &pubkey, domain()),
            Err(BlobVerificationError::InclusionProofInvalid(0))
        ));
    }

    #[test]
    fn sidecar_from_a_different_block_is_rejected() {
        let (block, sidecars) = block_with_blobs(1);
        let (_, foreign_sidecars) = {
            let (mut other_block, _) = block_with_blobs(1);
            other_block.message.slot = 99;
            let header = other_block.message.header();
            let signing_root = compute_signing_root(&header, domain());
            other_block.signature = proposer_key().sign(signing_root.as_slice()).unwrap();
            let sidecar = other_block
                .blob_sidecar(
                    sidecars[0].blob.clone(),
                    sidecars[0].kzg_proof,
                    0,
                )
                .unwrap();
            (other_block, vec![sidecar])
        };
        let pubkey = proposer_key().public_key().unwrap();

        assert!(matches!(
            processor().verify_sidecars(
                &foreign_sidecars,
                &block.signed_header(),
                &pubkey,
                domain()
            ),
            Err(BlobVerificationError::HeaderMismatch(0))
        ));
    }

    #[test]
    fn wrong_proposer_signature_is_rejected() {
        let (block, sidecars) = block_with_blobs(1);
        let other_pubkey = PrivateKey::from_seed(&[43u8; 32])
            .unwrap()
            .public_key()
            .unwrap();

        assert!(matches!(
            processor().verify_sidecars(
                &sidecars,
                &block.signed_header(),
                &other_pubkey,
                domain()
            ),
            Err(BlobVerificationError::SignatureInvalid)
        ));
    }
}
