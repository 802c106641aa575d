use std::sync::Arc;

use moraine_chain_spec::ChainSpec;

use crate::{
    errors::StoreError,
    kv::{KvBackend, MemoryKv},
    overlay::Overlay,
    state_db::StateDb,
};

/// Owner of the committed beacon state. Hands out two capabilities: a
/// read-only [`StateView`] anchored at the committed version and a writable
/// [`StateBranch`] whose mutations stay buffered until promoted by
/// [`StateBranch::commit`].
///
/// The host drives proposal and finalization for one height at a time, so
/// at most one branch is live per height and the store needs no internal
/// locking beyond the backends' own.
#[derive(Debug, Clone)]
pub struct StateStore {
    kv: Arc<dyn KvBackend>,
    spec: Arc<ChainSpec>,
}

impl StateStore {
    pub fn new(kv: Arc<dyn KvBackend>, spec: Arc<ChainSpec>) -> Self {
        Self { kv, spec }
    }

    pub fn in_memory(spec: Arc<ChainSpec>) -> Self {
        Self::new(Arc::new(MemoryKv::new()), spec)
    }

    pub fn spec(&self) -> Arc<ChainSpec> {
        self.spec.clone()
    }

    /// Read-only handle anchored at the committed state.
    pub fn snapshot(&self) -> StateView {
        StateView {
            db: StateDb::new(self.kv.clone(), self.spec.clone()),
        }
    }

    /// Writable overlay on top of the committed state.
    pub fn branch(&self) -> StateBranch {
        let overlay = Arc::new(Overlay::new(self.kv.clone()));
        StateBranch {
            db: StateDb::new(overlay.clone(), self.spec.clone()),
            overlay,
        }
    }
}

/// Immutable capability: only `&StateDb` escapes, and every mutating
/// accessor on [`StateDb`] requires `&mut self`.
#[derive(Debug)]
pub struct StateView {
    db: StateDb,
}

impl StateView {
    pub fn state(&self) -> &StateDb {
        &self.db
    }
}

/// Exclusive writable capability over a buffered overlay.
#[derive(Debug)]
pub struct StateBranch {
    db: StateDb,
    overlay: Arc<Overlay>,
}

impl StateBranch {
    pub fn state(&self) -> &StateDb {
        &self.db
    }

    pub fn state_mut(&mut self) -> &mut StateDb {
        &mut self.db
    }

    /// Promote every buffered write into the committed state atomically.
    pub fn commit(self) -> Result<(), StoreError> {
        self.overlay.commit()
    }

    /// Drop the branch and everything it wrote.
    pub fn discard(self) {}
}

#[cfg(test)]
mod tests {
    use alloy_primitives::B256;
    use moraine_bls::PrivateKey;
    use moraine_consensus::{beacon_state::BeaconState, validator::Validator};

    use super::*;

    fn store() -> StateStore {
        StateStore::in_memory(Arc::new(ChainSpec::minimal()))
    }

    fn seeded_store() -> StateStore {
        let store = store();
        let mut branch = store.branch();
        branch.state_mut().import(&BeaconState::default()).unwrap();
        branch.commit().unwrap();
        store
    }

    fn validator(seed: u8) -> Validator {
        Validator {
            pubkey: PrivateKey::from_seed(&[seed; 32])
                .unwrap()
                .public_key()
                .unwrap(),
            withdrawal_credentials: B256::ZERO,
            effective_balance: 32_000_000_000,
            slashed: false,
            activation_eligibility_epoch: 0,
            activation_epoch: 0,
            exit_epoch: u64::MAX,
            withdrawable_epoch: u64::MAX,
        }
    }

    #[test]
    fn branch_is_isolated_until_commit() {
        let store = seeded_store();
        let committed_root = store.snapshot().state().hash_tree_root().unwrap();

        let mut branch = store.branch();
        branch.state_mut().set_slot(42).unwrap();
        assert_eq!(branch.state().slot().unwrap(), 42);

        // The committed state has not moved.
        assert_eq!(store.snapshot().state().slot().unwrap(), 0);
        assert_eq!(
            store.snapshot().state().hash_tree_root().unwrap(),
            committed_root
        );

        branch.discard();
        assert_eq!(
            store.snapshot().state().hash_tree_root().unwrap(),
            committed_root
        );
    }

    #[test]
    fn commit_promotes_branch_writes() {
        let store = seeded_store();
        let mut branch = store.branch();
        branch.state_mut().set_slot(7).unwrap();
        branch
            .state_mut()
            .update_block_root_at_index(3, B256::repeat_byte(3))
            .unwrap();
        branch.commit().unwrap();

        let snapshot = store.snapshot();
        assert_eq!(snapshot.state().slot().unwrap(), 7);
        assert_eq!(
            snapshot.state().block_root_at_index(3).unwrap(),
            B256::repeat_byte(3)
        );
    }

    #[test]
    fn ring_buffers_wrap_modulo_their_length() {
        let store = seeded_store();
        let mut branch = store.branch();

        let root = B256::repeat_byte(0xAB);
        branch
            .state_mut()
            .update_block_root_at_index(8192 + 5, root)
            .unwrap();
        assert_eq!(branch.state().block_root_at_index(5).unwrap(), root);

        let mix = B256::repeat_byte(0xCD);
        branch
            .state_mut()
            .update_randao_mix_at_index(65_536 * 3 + 11, mix)
            .unwrap();
        assert_eq!(branch.state().randao_mix_at_index(11).unwrap(), mix);

        branch
            .state_mut()
            .update_slashing_at_index(8192 * 2 + 1, 77)
            .unwrap();
        assert_eq!(branch.state().slashing_at_index(1).unwrap(), 77);
    }

    #[test]
    fn validator_indices_are_dense_and_indexed() {
        let store = seeded_store();
        let mut branch = store.branch();

        let validator_0 = validator(10);
        let validator_1 = validator(11);
        assert_eq!(
            branch
                .state_mut()
                .add_validator(&validator_0, 32_000_000_000)
                .unwrap(),
            0
        );
        assert_eq!(
            branch
                .state_mut()
                .add_validator(&validator_1, 31_000_000_000)
                .unwrap(),
            1
        );

        let state = branch.state();
        assert_eq!(state.validator_count().unwrap(), 2);
        assert_eq!(state.validator(1).unwrap().pubkey, validator_1.pubkey);
        assert_eq!(state.balance(1).unwrap(), 31_000_000_000);
        assert_eq!(
            state.validator_index_by_pubkey(&validator_1.pubkey).unwrap(),
            Some(1)
        );
        assert_eq!(
            state
                .validator_index_by_consensus_address(&validator_0.consensus_address())
                .unwrap(),
            Some(0)
        );
        assert!(matches!(
            state.validator(2),
            Err(StoreError::UnknownValidator(2))
        ));
    }

    #[test]
    fn missing_mandatory_field_is_fatal() {
        let store = store();
        let snapshot = store.snapshot();
        assert!(matches!(
            snapshot.state().slot(),
            Err(StoreError::MissingField("slot"))
        ));
    }

    #[test]
    fn materialize_roundtrips_through_import() {
        let store = seeded_store();
        let mut branch = store.branch();
        branch.state_mut().set_slot(5).unwrap();
        branch.state_mut().set_total_slashing(123).unwrap();
        branch
            .state_mut()
            .add_validator(&validator(20), 32_000_000_000)
            .unwrap();

        let materialized = branch.state().materialize().unwrap();
        let root = materialized.hash_tree_root();

        let mut other = store.branch();
        other.state_mut().import(&materialized).unwrap();
        assert_eq!(other.state().hash_tree_root().unwrap(), root);
        assert_eq!(
            other
                .state()
                .validator_index_by_pubkey(&validator(20).pubkey)
                .unwrap(),
            Some(0)
        );
    }

    #[test]
    fn balance_arithmetic_saturates_at_zero() {
        let store = seeded_store();
        let mut branch = store.branch();
        branch.state_mut().add_validator(&validator(1), 10).unwrap();

        branch.state_mut().decrease_balance(0, 25).unwrap();
        assert_eq!(branch.state().balance(0).unwrap(), 0);

        branch.state_mut().increase_balance(0, 40).unwrap();
        assert_eq!(branch.state().balance(0).unwrap(), 40);
    }
}
