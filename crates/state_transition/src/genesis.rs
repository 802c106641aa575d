use moraine_consensus::{
    beacon_block_body::BeaconBlockBody,
    beacon_block_header::BeaconBlockHeader,
    beacon_state::{BeaconState, Validators},
    constants::{EPOCHS_PER_HISTORICAL_VECTOR, GENESIS_EPOCH},
    deposit_data::DepositData,
    fork::Fork,
    genesis::Genesis,
    validator_update::ValidatorUpdate,
};
use moraine_storage::StateDb;
use ssz_types::{FixedVector, VariableList, typenum::U4294967296};
use tree_hash::TreeHash;

use crate::processor::StateProcessor;

type GenesisDeposits = VariableList<DepositData, U4294967296>;

impl StateProcessor {
    /// Seed an empty store with the genesis state: premined validators,
    /// randao mixes anchored to the execution genesis hash, and the
    /// execution payload header the chain starts from. Returns the initial
    /// validator set for the host.
    ///
    /// Genesis deposits are trusted configuration, so no inclusion proofs
    /// or possession signatures are checked here.
    pub fn initialize_from_genesis(
        &self,
        st: &mut StateDb,
        genesis: &Genesis,
    ) -> anyhow::Result<Vec<ValidatorUpdate>> {
        let payload_header = &genesis.execution_payload_header;

        let deposits: GenesisDeposits = VariableList::new(genesis.deposits.clone())
            .map_err(|err| anyhow::anyhow!("too many genesis deposits: {err:?}"))?;

        let mut state = BeaconState {
            fork: Fork {
                previous_version: genesis.fork_version,
                current_version: genesis.fork_version,
                epoch: GENESIS_EPOCH,
            },
            latest_block_header: BeaconBlockHeader {
                body_root: BeaconBlockBody::default().tree_hash_root(),
                ..Default::default()
            },
            latest_execution_payload_header: payload_header.clone(),
            eth1_deposit_index: genesis.deposits.len() as u64,
            ..Default::default()
        };
        state.eth1_data.deposit_root = deposits.tree_hash_root();
        state.eth1_data.deposit_count = genesis.deposits.len() as u64;
        state.eth1_data.block_hash = payload_header.block_hash;

        // Seed the randomness rings with the execution genesis hash.
        state.randao_mixes = FixedVector::new(vec![
            payload_header.block_hash;
            EPOCHS_PER_HISTORICAL_VECTOR as usize
        ])
        .map_err(|err| anyhow::anyhow!("randao ring malformed: {err:?}"))?;

        st.import(&state)?;

        for deposit in &genesis.deposits {
            let index = self.add_validator_from_deposit(st, deposit)?;
            let mut validator = st.validator(index)?;
            // A full genesis stake is active immediately.
            if validator.effective_balance >= self.spec().max_effective_balance {
                validator.activation_eligibility_epoch = GENESIS_EPOCH;
                validator.activation_epoch = GENESIS_EPOCH;
                st.set_validator(index, &validator)?;
            }
        }

        let validators: Validators = VariableList::new(st.validators()?)
            .map_err(|err| anyhow::anyhow!("genesis registry overflow: {err:?}"))?;
        st.set_genesis_validators_root(validators.tree_hash_root())?;

        let updates = validators
            .iter()
            .filter_map(|validator| {
                let power = self.validator_power(validator, GENESIS_EPOCH);
                (power > 0).then(|| ValidatorUpdate {
                    pubkey: validator.pubkey.clone(),
                    power,
                })
            })
            .collect();
        Ok(updates)
    }
}
