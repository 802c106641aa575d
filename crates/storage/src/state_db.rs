use std::sync::Arc;

use alloy_primitives::B256;
use moraine_bls::PubKey;
use moraine_chain_spec::ChainSpec;
use moraine_consensus::{
    beacon_block_header::BeaconBlockHeader,
    beacon_state::BeaconState,
    constants::{
        EPOCHS_PER_HISTORICAL_VECTOR, EPOCHS_PER_SLASHINGS_VECTOR, SLOTS_PER_HISTORICAL_ROOT,
    },
    eth1_data::Eth1Data,
    execution_payload_header::ExecutionPayloadHeader,
    fork::Fork,
    historical_summary::HistoricalSummary,
    misc::consensus_address,
    validator::Validator,
};
use sha2::{Digest, Sha256};
use ssz::{Decode, Encode};
use ssz_types::{FixedVector, VariableList};

use crate::{errors::StoreError, keys, kv::KvBackend};

/// Typed, field-granular view over a key-value backend holding one beacon
/// state. Reads take `&self`; every mutation takes `&mut self`, so sharing
/// a `&StateDb` hands out a read-only capability.
#[derive(Debug)]
pub struct StateDb {
    kv: Arc<dyn KvBackend>,
    spec: Arc<ChainSpec>,
}

impl StateDb {
    pub(crate) fn new(kv: Arc<dyn KvBackend>, spec: Arc<ChainSpec>) -> Self {
        Self { kv, spec }
    }

    pub fn spec(&self) -> &ChainSpec {
        &self.spec
    }

    fn get_ssz<T: Decode>(&self, key: &[u8], field: &'static str) -> Result<Option<T>, StoreError> {
        match self.kv.get(key)? {
            Some(bytes) => T::from_ssz_bytes(&bytes)
                .map(Some)
                .map_err(|err| StoreError::Decode {
                    field,
                    reason: format!("{err:?}"),
                }),
            None => Ok(None),
        }
    }

    fn must_get_ssz<T: Decode>(&self, key: &[u8], field: &'static str) -> Result<T, StoreError> {
        self.get_ssz(key, field)?
            .ok_or(StoreError::MissingField(field))
    }

    fn put_ssz<T: Encode>(&mut self, key: Vec<u8>, value: &T) -> Result<(), StoreError> {
        self.kv.apply_batch(vec![(key, Some(value.as_ssz_bytes()))])
    }

    // Versioning

    pub fn genesis_validators_root(&self) -> Result<B256, StoreError> {
        self.must_get_ssz(
            &keys::item(keys::GENESIS_VALIDATORS_ROOT),
            "genesis_validators_root",
        )
    }

    pub fn set_genesis_validators_root(&mut self, root: B256) -> Result<(), StoreError> {
        self.put_ssz(keys::item(keys::GENESIS_VALIDATORS_ROOT), &root)
    }

    pub fn slot(&self) -> Result<u64, StoreError> {
        self.must_get_ssz(&keys::item(keys::SLOT), "slot")
    }

    pub fn set_slot(&mut self, slot: u64) -> Result<(), StoreError> {
        self.put_ssz(keys::item(keys::SLOT), &slot)
    }

    pub fn fork(&self) -> Result<Fork, StoreError> {
        self.must_get_ssz(&keys::item(keys::FORK), "fork")
    }

    pub fn set_fork(&mut self, fork: &Fork) -> Result<(), StoreError> {
        self.put_ssz(keys::item(keys::FORK), fork)
    }

    // History

    pub fn latest_block_header(&self) -> Result<BeaconBlockHeader, StoreError> {
        self.must_get_ssz(&keys::item(keys::LATEST_BLOCK_HEADER), "latest_block_header")
    }

    pub fn set_latest_block_header(
        &mut self,
        header: &BeaconBlockHeader,
    ) -> Result<(), StoreError> {
        self.put_ssz(keys::item(keys::LATEST_BLOCK_HEADER), header)
    }

    pub fn block_root_at_index(&self, index: u64) -> Result<B256, StoreError> {
        let index = index % SLOTS_PER_HISTORICAL_ROOT;
        self.must_get_ssz(&keys::indexed(keys::BLOCK_ROOTS, index), "block_roots")
    }

    pub fn update_block_root_at_index(
        &mut self,
        index: u64,
        root: B256,
    ) -> Result<(), StoreError> {
        let index = index % SLOTS_PER_HISTORICAL_ROOT;
        self.put_ssz(keys::indexed(keys::BLOCK_ROOTS, index), &root)
    }

    pub fn state_root_at_index(&self, index: u64) -> Result<B256, StoreError> {
        let index = index % SLOTS_PER_HISTORICAL_ROOT;
        self.must_get_ssz(&keys::indexed(keys::STATE_ROOTS, index), "state_roots")
    }

    pub fn update_state_root_at_index(
        &mut self,
        index: u64,
        root: B256,
    ) -> Result<(), StoreError> {
        let index = index % SLOTS_PER_HISTORICAL_ROOT;
        self.put_ssz(keys::indexed(keys::STATE_ROOTS, index), &root)
    }

    // Eth1

    pub fn eth1_data(&self) -> Result<Eth1Data, StoreError> {
        self.must_get_ssz(&keys::item(keys::ETH1_DATA), "eth1_data")
    }

    pub fn set_eth1_data(&mut self, eth1_data: &Eth1Data) -> Result<(), StoreError> {
        self.put_ssz(keys::item(keys::ETH1_DATA), eth1_data)
    }

    pub fn eth1_data_votes(
        &self,
    ) -> Result<moraine_consensus::beacon_state::Eth1DataVotes, StoreError> {
        self.must_get_ssz(&keys::item(keys::ETH1_DATA_VOTES), "eth1_data_votes")
    }

    pub fn set_eth1_data_votes(
        &mut self,
        votes: &moraine_consensus::beacon_state::Eth1DataVotes,
    ) -> Result<(), StoreError> {
        self.put_ssz(keys::item(keys::ETH1_DATA_VOTES), votes)
    }

    pub fn eth1_deposit_index(&self) -> Result<u64, StoreError> {
        self.must_get_ssz(&keys::item(keys::ETH1_DEPOSIT_INDEX), "eth1_deposit_index")
    }

    pub fn set_eth1_deposit_index(&mut self, index: u64) -> Result<(), StoreError> {
        self.put_ssz(keys::item(keys::ETH1_DEPOSIT_INDEX), &index)
    }

    pub fn latest_execution_payload_header(
        &self,
    ) -> Result<ExecutionPayloadHeader, StoreError> {
        self.must_get_ssz(
            &keys::item(keys::LATEST_EXECUTION_PAYLOAD_HEADER),
            "latest_execution_payload_header",
        )
    }

    pub fn set_latest_execution_payload_header(
        &mut self,
        header: &ExecutionPayloadHeader,
    ) -> Result<(), StoreError> {
        self.put_ssz(keys::item(keys::LATEST_EXECUTION_PAYLOAD_HEADER), header)
    }

    // Registry. Validator indices are dense and assigned in insertion
    // order; the count doubles as the next free index.

    pub fn validator_count(&self) -> Result<u64, StoreError> {
        Ok(self
            .get_ssz(&keys::item(keys::VALIDATOR_COUNT), "validator_count")?
            .unwrap_or(0))
    }

    pub fn validator(&self, index: u64) -> Result<Validator, StoreError> {
        self.get_ssz(&keys::indexed(keys::VALIDATOR_BY_INDEX, index), "validators")?
            .ok_or(StoreError::UnknownValidator(index))
    }

    pub fn set_validator(&mut self, index: u64, validator: &Validator) -> Result<(), StoreError> {
        if index >= self.validator_count()? {
            return Err(StoreError::UnknownValidator(index));
        }
        self.put_ssz(keys::indexed(keys::VALIDATOR_BY_INDEX, index), validator)
    }

    /// Append a validator to the registry, maintaining both secondary
    /// indexes and the parallel balance entry. Returns the assigned index.
    pub fn add_validator(
        &mut self,
        validator: &Validator,
        balance: u64,
    ) -> Result<u64, StoreError> {
        let index = self.validator_count()?;
        let pubkey_digest: [u8; 32] = Sha256::digest(validator.pubkey.to_bytes()).into();
        let address = consensus_address(validator.pubkey.to_bytes());

        self.kv.apply_batch(vec![
            (
                keys::indexed(keys::VALIDATOR_BY_INDEX, index),
                Some(validator.as_ssz_bytes()),
            ),
            (
                keys::indexed(keys::BALANCES, index),
                Some(balance.as_ssz_bytes()),
            ),
            (
                keys::digest(keys::VALIDATOR_INDEX_BY_PUBKEY, &pubkey_digest),
                Some(index.as_ssz_bytes()),
            ),
            (
                keys::digest(keys::VALIDATOR_INDEX_BY_CONSENSUS_ADDRESS, &address),
                Some(index.as_ssz_bytes()),
            ),
            (
                keys::item(keys::VALIDATOR_COUNT),
                Some((index + 1).as_ssz_bytes()),
            ),
        ])?;
        Ok(index)
    }

    pub fn validator_index_by_pubkey(
        &self,
        pubkey: &PubKey,
    ) -> Result<Option<u64>, StoreError> {
        let pubkey_digest: [u8; 32] = Sha256::digest(pubkey.to_bytes()).into();
        self.get_ssz(
            &keys::digest(keys::VALIDATOR_INDEX_BY_PUBKEY, &pubkey_digest),
            "validator_index_by_pubkey",
        )
    }

    pub fn validator_index_by_consensus_address(
        &self,
        address: &[u8; 20],
    ) -> Result<Option<u64>, StoreError> {
        self.get_ssz(
            &keys::digest(keys::VALIDATOR_INDEX_BY_CONSENSUS_ADDRESS, address),
            "validator_index_by_consensus_address",
        )
    }

    /// All validators in index order.
    pub fn validators(&self) -> Result<Vec<Validator>, StoreError> {
        (0..self.validator_count()?)
            .map(|index| self.validator(index))
            .collect()
    }

    pub fn balance(&self, index: u64) -> Result<u64, StoreError> {
        self.get_ssz(&keys::indexed(keys::BALANCES, index), "balances")?
            .ok_or(StoreError::UnknownValidator(index))
    }

    pub fn set_balance(&mut self, index: u64, balance: u64) -> Result<(), StoreError> {
        if index >= self.validator_count()? {
            return Err(StoreError::UnknownValidator(index));
        }
        self.put_ssz(keys::indexed(keys::BALANCES, index), &balance)
    }

    pub fn increase_balance(&mut self, index: u64, delta: u64) -> Result<(), StoreError> {
        let balance = self.balance(index)?;
        self.set_balance(index, balance.saturating_add(delta))
    }

    /// Decrease with floor at zero, matching the protocol's saturating
    /// balance arithmetic.
    pub fn decrease_balance(&mut self, index: u64, delta: u64) -> Result<(), StoreError> {
        let balance = self.balance(index)?;
        self.set_balance(index, balance.saturating_sub(delta))
    }

    // Randomness

    pub fn randao_mix_at_index(&self, index: u64) -> Result<B256, StoreError> {
        let index = index % EPOCHS_PER_HISTORICAL_VECTOR;
        self.must_get_ssz(&keys::indexed(keys::RANDAO_MIXES, index), "randao_mixes")
    }

    pub fn update_randao_mix_at_index(
        &mut self,
        index: u64,
        mix: B256,
    ) -> Result<(), StoreError> {
        let index = index % EPOCHS_PER_HISTORICAL_VECTOR;
        self.put_ssz(keys::indexed(keys::RANDAO_MIXES, index), &mix)
    }

    // Withdrawals

    pub fn next_withdrawal_index(&self) -> Result<u64, StoreError> {
        self.must_get_ssz(
            &keys::item(keys::NEXT_WITHDRAWAL_INDEX),
            "next_withdrawal_index",
        )
    }

    pub fn set_next_withdrawal_index(&mut self, index: u64) -> Result<(), StoreError> {
        self.put_ssz(keys::item(keys::NEXT_WITHDRAWAL_INDEX), &index)
    }

    pub fn next_withdrawal_validator_index(&self) -> Result<u64, StoreError> {
        self.must_get_ssz(
            &keys::item(keys::NEXT_WITHDRAWAL_VALIDATOR_INDEX),
            "next_withdrawal_validator_index",
        )
    }

    pub fn set_next_withdrawal_validator_index(&mut self, index: u64) -> Result<(), StoreError> {
        self.put_ssz(keys::item(keys::NEXT_WITHDRAWAL_VALIDATOR_INDEX), &index)
    }

    // Slashings

    pub fn slashing_at_index(&self, index: u64) -> Result<u64, StoreError> {
        let index = index % EPOCHS_PER_SLASHINGS_VECTOR;
        self.must_get_ssz(&keys::indexed(keys::SLASHINGS, index), "slashings")
    }

    pub fn update_slashing_at_index(
        &mut self,
        index: u64,
        amount: u64,
    ) -> Result<(), StoreError> {
        let index = index % EPOCHS_PER_SLASHINGS_VECTOR;
        self.put_ssz(keys::indexed(keys::SLASHINGS, index), &amount)
    }

    pub fn total_slashing(&self) -> Result<u64, StoreError> {
        self.must_get_ssz(&keys::item(keys::TOTAL_SLASHING), "total_slashing")
    }

    pub fn set_total_slashing(&mut self, total: u64) -> Result<(), StoreError> {
        self.put_ssz(keys::item(keys::TOTAL_SLASHING), &total)
    }

    // Deep history

    pub fn historical_summaries(
        &self,
    ) -> Result<moraine_consensus::beacon_state::HistoricalSummaries, StoreError> {
        self.must_get_ssz(
            &keys::item(keys::HISTORICAL_SUMMARIES),
            "historical_summaries",
        )
    }

    pub fn append_historical_summary(
        &mut self,
        summary: HistoricalSummary,
    ) -> Result<(), StoreError> {
        let mut summaries = self.historical_summaries()?;
        summaries
            .push(summary)
            .map_err(|_| StoreError::Capacity("historical_summaries"))?;
        self.put_ssz(keys::item(keys::HISTORICAL_SUMMARIES), &summaries)
    }

    // Whole-state forms

    /// Read every field back into the flat merkleizable state.
    pub fn materialize(&self) -> Result<BeaconState, StoreError> {
        let mut block_roots = Vec::with_capacity(SLOTS_PER_HISTORICAL_ROOT as usize);
        let mut state_roots = Vec::with_capacity(SLOTS_PER_HISTORICAL_ROOT as usize);
        for index in 0..SLOTS_PER_HISTORICAL_ROOT {
            block_roots.push(self.block_root_at_index(index)?);
            state_roots.push(self.state_root_at_index(index)?);
        }

        let mut randao_mixes = Vec::with_capacity(EPOCHS_PER_HISTORICAL_VECTOR as usize);
        for index in 0..EPOCHS_PER_HISTORICAL_VECTOR {
            randao_mixes.push(self.randao_mix_at_index(index)?);
        }

        let mut slashings = Vec::with_capacity(EPOCHS_PER_SLASHINGS_VECTOR as usize);
        for index in 0..EPOCHS_PER_SLASHINGS_VECTOR {
            slashings.push(self.slashing_at_index(index)?);
        }

        let validator_count = self.validator_count()?;
        let mut validators = Vec::with_capacity(validator_count as usize);
        let mut balances = Vec::with_capacity(validator_count as usize);
        for index in 0..validator_count {
            validators.push(self.validator(index)?);
            balances.push(self.balance(index)?);
        }

        Ok(BeaconState {
            genesis_validators_root: self.genesis_validators_root()?,
            slot: self.slot()?,
            fork: self.fork()?,
            latest_block_header: self.latest_block_header()?,
            block_roots: FixedVector::new(block_roots)
                .map_err(|_| StoreError::Capacity("block_roots"))?,
            state_roots: FixedVector::new(state_roots)
                .map_err(|_| StoreError::Capacity("state_roots"))?,
            eth1_data: self.eth1_data()?,
            eth1_data_votes: self.eth1_data_votes()?,
            eth1_deposit_index: self.eth1_deposit_index()?,
            latest_execution_payload_header: self.latest_execution_payload_header()?,
            validators: VariableList::new(validators)
                .map_err(|_| StoreError::Capacity("validators"))?,
            balances: VariableList::new(balances)
                .map_err(|_| StoreError::Capacity("balances"))?,
            randao_mixes: FixedVector::new(randao_mixes)
                .map_err(|_| StoreError::Capacity("randao_mixes"))?,
            next_withdrawal_index: self.next_withdrawal_index()?,
            next_withdrawal_validator_index: self.next_withdrawal_validator_index()?,
            slashings: FixedVector::new(slashings)
                .map_err(|_| StoreError::Capacity("slashings"))?,
            total_slashing: self.total_slashing()?,
            historical_summaries: self.historical_summaries()?,
        })
    }

    /// State root of the (possibly uncommitted) view.
    pub fn hash_tree_root(&self) -> Result<B256, StoreError> {
        Ok(self.materialize()?.hash_tree_root())
    }

    /// Write every field of `state`, replacing whatever the view held.
    /// Used by genesis initialization and replay.
    pub fn import(&mut self, state: &BeaconState) -> Result<(), StoreError> {
        let mut batch = vec![
            (
                keys::item(keys::GENESIS_VALIDATORS_ROOT),
                Some(state.genesis_validators_root.as_ssz_bytes()),
            ),
            (keys::item(keys::SLOT), Some(state.slot.as_ssz_bytes())),
            (keys::item(keys::FORK), Some(state.fork.as_ssz_bytes())),
            (
                keys::item(keys::LATEST_BLOCK_HEADER),
                Some(state.latest_block_header.as_ssz_bytes()),
            ),
            (
                keys::item(keys::ETH1_DATA),
                Some(state.eth1_data.as_ssz_bytes()),
            ),
            (
                keys::item(keys::ETH1_DATA_VOTES),
                Some(state.eth1_data_votes.as_ssz_bytes()),
            ),
            (
                keys::item(keys::ETH1_DEPOSIT_INDEX),
                Some(state.eth1_deposit_index.as_ssz_bytes()),
            ),
            (
                keys::item(keys::LATEST_EXECUTION_PAYLOAD_HEADER),
                Some(state.latest_execution_payload_header.as_ssz_bytes()),
            ),
            (
                keys::item(keys::VALIDATOR_COUNT),
                Some((state.validators.len() as u64).as_ssz_bytes()),
            ),
            (
                keys::item(keys::NEXT_WITHDRAWAL_INDEX),
                Some(state.next_withdrawal_index.as_ssz_bytes()),
            ),
            (
                keys::item(keys::NEXT_WITHDRAWAL_VALIDATOR_INDEX),
                Some(state.next_withdrawal_validator_index.as_ssz_bytes()),
            ),
            (
                keys::item(keys::TOTAL_SLASHING),
                Some(state.total_slashing.as_ssz_bytes()),
            ),
            (
                keys::item(keys::HISTORICAL_SUMMARIES),
                Some(state.historical_summaries.as_ssz_bytes()),
            ),
        ];

        for (index, root) in state.block_roots.iter().enumerate() {
            batch.push((
                keys::indexed(keys::BLOCK_ROOTS, index as u64),
                Some(root.as_ssz_bytes()),
            ));
        }
        for (index, root) in state.state_roots.iter().enumerate() {
            batch.push((
                keys::indexed(keys::STATE_ROOTS, index as u64),
                Some(root.as_ssz_bytes()),
            ));
        }
        for (index, mix) in state.randao_mixes.iter().enumerate() {
            batch.push((
                keys::indexed(keys::RANDAO_MIXES, index as u64),
                Some(mix.as_ssz_bytes()),
            ));
        }
        for (index, amount) in state.slashings.iter().enumerate() {
            batch.push((
                keys::indexed(keys::SLASHINGS, index as u64),
                Some(amount.as_ssz_bytes()),
            ));
        }
        for (index, validator) in state.validators.iter().enumerate() {
            let pubkey_digest: [u8; 32] = Sha256::digest(validator.pubkey.to_bytes()).into();
            let address = consensus_address(validator.pubkey.to_bytes());
            batch.push((
                keys::indexed(keys::VALIDATOR_BY_INDEX, index as u64),
                Some(validator.as_ssz_bytes()),
            ));
            batch.push((
                keys::digest(keys::VALIDATOR_INDEX_BY_PUBKEY, &pubkey_digest),
                Some((index as u64).as_ssz_bytes()),
            ));
            batch.push((
                keys::digest(keys::VALIDATOR_INDEX_BY_CONSENSUS_ADDRESS, &address),
                Some((index as u64).as_ssz_bytes()),
            ));
        }
        for (index, balance) in state.balances.iter().enumerate() {
            batch.push((
                keys::indexed(keys::BALANCES, index as u64),
                Some(balance.as_ssz_bytes()),
            ));
        }

        self.kv.apply_batch(batch)
    }
}
