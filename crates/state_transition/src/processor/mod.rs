mod block;
mod epoch;
mod operations;
mod payload;
mod registry;
mod withdrawals;

use std::sync::Arc;

use alloy_primitives::B256;
use anyhow::ensure;
use moraine_chain_spec::ChainSpec;
use moraine_consensus::{beacon_block::SignedBeaconBlock, validator_update::ValidatorUpdate};
use moraine_execution::ExecutionEngine;
use moraine_storage::StateDb;
use tree_hash::TreeHash;

use crate::{context::TransitionContext, errors::TransitionError};

/// The deterministic consensus kernel: `(state, block, ctx) -> state'`.
///
/// All methods operate on a writable branch; the caller decides whether the
/// branch is promoted. Iteration is always in index order and arithmetic is
/// fixed-width `u64`, so two invocations over the same inputs produce
/// byte-identical states.
pub struct StateProcessor {
    pub(crate) spec: Arc<ChainSpec>,
    pub(crate) engine: Arc<ExecutionEngine>,
}

impl StateProcessor {
    pub fn new(spec: Arc<ChainSpec>, engine: Arc<ExecutionEngine>) -> Self {
        Self { spec, engine }
    }

    pub fn spec(&self) -> &ChainSpec {
        &self.spec
    }

    /// Advance `st` through empty slots, apply the block, and compare the
    /// resulting root against the proposer's claim. Returns the validator
    /// set changes accumulated by any epoch boundaries crossed.
    pub async fn transition(
        &self,
        ctx: &TransitionContext,
        st: &mut StateDb,
        signed_block: &SignedBeaconBlock,
    ) -> anyhow::Result<Vec<ValidatorUpdate>> {
        let block = &signed_block.message;

        // Process slots (including those with no blocks) since the last
        // applied block.
        let validator_updates = self.process_slots(st, block.slot)?;

        self.process_block(ctx, st, block).await?;

        if !ctx.skip_validate_result {
            let computed = st.hash_tree_root()?;
            ensure!(
                computed == block.state_root,
                TransitionError::StateRootMismatch {
                    block: block.state_root,
                    computed,
                }
            );
        }

        Ok(validator_updates)
    }

    pub fn process_slots(
        &self,
        st: &mut StateDb,
        target_slot: u64,
    ) -> anyhow::Result<Vec<ValidatorUpdate>> {
        let mut validator_updates = vec![];

        while st.slot()? < target_slot {
            self.process_slot(st)?;
            let slot = st.slot()?;
            // Epoch processing runs on the last slot of each epoch.
            if self.spec.is_last_slot_of_epoch(slot) {
                validator_updates.extend(self.process_epoch(st)?);
            }
            st.set_slot(slot + 1)?;
        }

        Ok(validator_updates)
    }

    fn process_slot(&self, st: &mut StateDb) -> anyhow::Result<()> {
        let slot = st.slot()?;

        // Cache the state root of the slot that just ended.
        let previous_state_root = st.hash_tree_root()?;
        st.update_state_root_at_index(slot, previous_state_root)?;

        // The header installed by the previous block left its state root
        // zeroed; it is only known now.
        let mut latest_block_header = st.latest_block_header()?;
        if latest_block_header.state_root == B256::ZERO {
            latest_block_header.state_root = previous_state_root;
            st.set_latest_block_header(&latest_block_header)?;
        }

        // Cache the block root.
        st.update_block_root_at_index(slot, latest_block_header.tree_hash_root())?;

        Ok(())
    }
}
