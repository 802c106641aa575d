use alloy_primitives::{B256, aliases::B32};
use sha2::{Digest, Sha256};
use tree_hash::TreeHash;

use crate::{fork_data::ForkData, signing_data::SigningData};

pub fn compute_signing_root<SSZObject: TreeHash>(ssz_object: &SSZObject, domain: B256) -> B256 {
    SigningData {
        object_root: ssz_object.tree_hash_root(),
        domain,
    }
    .tree_hash_root()
}

/// Return the domain for the ``domain_type`` and ``fork_version``.
pub fn compute_domain(
    domain_type: B32,
    fork_version: B32,
    genesis_validators_root: B256,
) -> B256 {
    let fork_data = ForkData {
        current_version: fork_version,
        genesis_validators_root,
    };
    let fork_data_root = fork_data.compute_fork_data_root();
    let domain_bytes = [&domain_type.0[..], &fork_data_root.0[..28]].concat();
    B256::from_slice(&domain_bytes)
}

pub fn xor(left: &[u8], right: &[u8]) -> B256 {
    let mut result = [0u8; 32];
    for (i, byte) in result.iter_mut().enumerate() {
        *byte = left[i] ^ right[i];
    }
    B256::new(result)
}

/// BFT-layer address of a validator: the first 20 bytes of the SHA-256 hash
/// of its BLS pubkey. This is the key of the consensus-address secondary
/// index and the identity the host reports in proposals.
pub fn consensus_address(pubkey_bytes: &[u8]) -> [u8; 20] {
    let digest = Sha256::digest(pubkey_bytes);
    let mut address = [0u8; 20];
    address.copy_from_slice(&digest[..20]);
    address
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xor_is_involutive() {
        let a = B256::repeat_byte(0b1010_1010);
        let b = B256::repeat_byte(0b0101_0101);
        let mixed = xor(a.as_slice(), b.as_slice());
        assert_eq!(mixed, B256::repeat_byte(0xFF));
        assert_eq!(xor(mixed.as_slice(), b.as_slice()), a);
    }

    #[test]
    fn domain_changes_with_fork_version() {
        let root = B256::ZERO;
        let domain_a = compute_domain(
            crate::constants::DOMAIN_RANDAO,
            B32::new([4, 0, 0, 0]),
            root,
        );
        let domain_b = compute_domain(
            crate::constants::DOMAIN_RANDAO,
            B32::new([4, 1, 0, 0]),
            root,
        );
        assert_ne!(domain_a, domain_b);
        assert_eq!(&domain_a[..4], &[0x02, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn consensus_address_is_stable() {
        let address = consensus_address(&[7u8; 48]);
        assert_eq!(address, consensus_address(&[7u8; 48]));
        assert_ne!(address, consensus_address(&[8u8; 48]));
    }
}
