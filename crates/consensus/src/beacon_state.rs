use alloy_primitives::B256;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use ssz_types::{
    FixedVector, VariableList,
    serde_utils::{quoted_u64_fixed_vec, quoted_u64_var_list},
    typenum::{U2048, U8192, U65536, U16777216, U1099511627776},
};
use tree_hash::TreeHash;
use tree_hash_derive::TreeHash;

use crate::{
    beacon_block_header::BeaconBlockHeader, eth1_data::Eth1Data,
    execution_payload_header::ExecutionPayloadHeader, fork::Fork,
    historical_summary::HistoricalSummary, validator::Validator,
};

// Type-level mirror of the ring-buffer sizes in `constants`.
pub type BlockRoots = FixedVector<B256, U8192>;
pub type StateRoots = FixedVector<B256, U8192>;
pub type RandaoMixes = FixedVector<B256, U65536>;
pub type Slashings = FixedVector<u64, U8192>;
pub type Validators = VariableList<Validator, U1099511627776>;
pub type Balances = VariableList<u64, U1099511627776>;
pub type Eth1DataVotes = VariableList<Eth1Data, U2048>;
pub type HistoricalSummaries = VariableList<HistoricalSummary, U16777216>;

/// The flat, merkleizable form of the beacon state. The store materializes
/// this struct from its field-granular backend to compute the state root
/// and to import/export whole states (genesis, tests, replay).
///
/// Field order is consensus-critical: `hash_tree_root` commits to it.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct BeaconState {
    // Versioning
    pub genesis_validators_root: B256,
    #[serde(with = "serde_utils::quoted_u64")]
    pub slot: u64,
    pub fork: Fork,

    // History
    pub latest_block_header: BeaconBlockHeader,
    pub block_roots: BlockRoots,
    pub state_roots: StateRoots,

    // Eth1
    pub eth1_data: Eth1Data,
    pub eth1_data_votes: Eth1DataVotes,
    #[serde(with = "serde_utils::quoted_u64")]
    pub eth1_deposit_index: u64,
    pub latest_execution_payload_header: ExecutionPayloadHeader,

    // Registry
    pub validators: Validators,
    #[serde(with = "quoted_u64_var_list")]
    pub balances: Balances,

    // Randomness
    pub randao_mixes: RandaoMixes,

    // Withdrawals
    #[serde(with = "serde_utils::quoted_u64")]
    pub next_withdrawal_index: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub next_withdrawal_validator_index: u64,

    // Slashings
    #[serde(with = "quoted_u64_fixed_vec")]
    pub slashings: Slashings,
    #[serde(with = "serde_utils::quoted_u64")]
    pub total_slashing: u64,

    // Deep history
    pub historical_summaries: HistoricalSummaries,
}

impl Default for BeaconState {
    fn default() -> Self {
        Self {
            genesis_validators_root: B256::ZERO,
            slot: 0,
            fork: Fork {
                previous_version: Default::default(),
                current_version: Default::default(),
                epoch: 0,
            },
            latest_block_header: Default::default(),
            block_roots: FixedVector::default(),
            state_roots: FixedVector::default(),
            eth1_data: Default::default(),
            eth1_data_votes: VariableList::default(),
            eth1_deposit_index: 0,
            latest_execution_payload_header: Default::default(),
            validators: VariableList::default(),
            balances: VariableList::default(),
            randao_mixes: FixedVector::default(),
            next_withdrawal_index: 0,
            next_withdrawal_validator_index: 0,
            slashings: FixedVector::default(),
            total_slashing: 0,
            historical_summaries: VariableList::default(),
        }
    }
}

impl BeaconState {
    pub fn hash_tree_root(&self) -> B256 {
        self.tree_hash_root()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_deterministic() {
        let state = BeaconState::default();
        assert_eq!(state.hash_tree_root(), state.hash_tree_root());
    }

    #[test]
    fn root_commits_to_every_field() {
        let base = BeaconState::default();
        let base_root = base.hash_tree_root();

        let mut changed = base.clone();
        changed.slot = 1;
        assert_ne!(changed.hash_tree_root(), base_root);

        let mut changed = base.clone();
        changed.total_slashing = 1;
        assert_ne!(changed.hash_tree_root(), base_root);

        let mut changed = base.clone();
        changed.randao_mixes[65_535] = B256::repeat_byte(1);
        assert_ne!(changed.hash_tree_root(), base_root);
    }
}
