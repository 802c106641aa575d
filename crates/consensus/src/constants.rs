use alloy_primitives::aliases::B32;

pub const GENESIS_SLOT: u64 = 0;
pub const GENESIS_EPOCH: u64 = 0;
pub const FAR_FUTURE_EPOCH: u64 = u64::MAX;

// Serialization-level vector sizes. These are mirrored by `typenum`
// parameters on the SSZ containers and therefore cannot vary per network.
pub const SLOTS_PER_HISTORICAL_ROOT: u64 = 8192;
pub const EPOCHS_PER_HISTORICAL_VECTOR: u64 = 65536;
pub const EPOCHS_PER_SLASHINGS_VECTOR: u64 = 8192;

pub const DEPOSIT_CONTRACT_TREE_DEPTH: u64 = 32;

pub const MAX_BLOB_COMMITMENTS_PER_BLOCK: u64 = 4096;
/// Depth of the commitment list's data tree (4096 leaves).
pub const BLOB_KZG_COMMITMENTS_LIST_DEPTH: u64 = 12;
/// Depth of the block body container tree (9 fields padded to 16).
pub const BODY_MERKLE_DEPTH: u64 = 4;
/// Merkle depth of a `blob_kzg_commitments[i]` leaf relative to the block
/// body root: the list levels, one length mix-in and the body levels.
pub const KZG_COMMITMENT_INCLUSION_PROOF_DEPTH: u64 =
    BLOB_KZG_COMMITMENTS_LIST_DEPTH + 1 + BODY_MERKLE_DEPTH;
/// Field position of `blob_kzg_commitments` in the block body container.
pub const BLOB_KZG_COMMITMENTS_INDEX: usize = 8;

pub const BYTES_PER_COMMITMENT: usize = 48;
pub const BYTES_PER_PROOF: usize = 48;
pub const BYTES_PER_BLOB: usize = 131_072;
pub const VERSIONED_HASH_VERSION_KZG: u8 = 0x01;

pub const BLS_WITHDRAWAL_PREFIX: &[u8] = &[0x00];
pub const ETH1_ADDRESS_WITHDRAWAL_PREFIX: &[u8] = &[0x01];

pub const DOMAIN_BEACON_PROPOSER: B32 = B32::new([0x00, 0x00, 0x00, 0x00]);
pub const DOMAIN_BEACON_ATTESTER: B32 = B32::new([0x01, 0x00, 0x00, 0x00]);
pub const DOMAIN_RANDAO: B32 = B32::new([0x02, 0x00, 0x00, 0x00]);
pub const DOMAIN_DEPOSIT: B32 = B32::new([0x03, 0x00, 0x00, 0x00]);
pub const DOMAIN_VOLUNTARY_EXIT: B32 = B32::new([0x04, 0x00, 0x00, 0x00]);
