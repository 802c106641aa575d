use moraine_bls::PubKey;
use moraine_consensus::{
    beacon_state::{BlockRoots, StateRoots},
    constants::{FAR_FUTURE_EPOCH, SLOTS_PER_HISTORICAL_ROOT},
    historical_summary::HistoricalSummary,
    validator_update::ValidatorUpdate,
};
use moraine_storage::StateDb;
use ssz_types::FixedVector;
use tree_hash::TreeHash;

use super::StateProcessor;

impl StateProcessor {
    /// Run the epoch sub-transitions in their fixed order and report the
    /// resulting validator-set changes to the host.
    ///
    /// Justification/finalization, inactivity scoring and attestation
    /// rewards are identity updates here: finality is the BFT host's job
    /// under single-slot finality, and no participation is tracked.
    pub(crate) fn process_epoch(&self, st: &mut StateDb) -> anyhow::Result<Vec<ValidatorUpdate>> {
        let next_epoch = self.spec.epoch_at_slot(st.slot()?) + 1;
        let before = self.host_power_map(st, next_epoch)?;

        self.process_registry_updates(st)?;
        self.process_slashings(st)?;
        self.process_effective_balance_updates(st)?;
        self.process_randao_mixes_reset(st)?;
        self.process_historical_summaries_update(st)?;
        self.process_slashings_reset(st)?;
        self.process_eth1_data_reset(st)?;

        let after = self.host_power_map(st, next_epoch)?;
        Ok(diff_power_maps(before, after))
    }

    /// Process activation eligibility, ejections, and activations.
    pub(crate) fn process_registry_updates(&self, st: &mut StateDb) -> anyhow::Result<()> {
        let current_epoch = self.spec.epoch_at_slot(st.slot()?);
        let activation_epoch = self.spec.activation_exit_epoch(current_epoch);

        let mut ejections = vec![];
        let mut activation_queue = vec![];
        for (index, mut validator) in st.validators()?.into_iter().enumerate() {
            let index = index as u64;
            if validator.is_eligible_for_activation_queue(self.spec.max_effective_balance) {
                validator.activation_eligibility_epoch = current_epoch + 1;
                st.set_validator(index, &validator)?;
            } else if validator.is_active_validator(current_epoch)
                && validator.effective_balance <= self.spec.ejection_balance
            {
                ejections.push(index);
            } else if validator.activation_eligibility_epoch <= current_epoch
                && validator.activation_epoch == FAR_FUTURE_EPOCH
            {
                // Eligibility is final as soon as it is recorded: the host
                // finalizes every block in its own slot.
                activation_queue.push((validator.activation_eligibility_epoch, index));
            }
        }

        for index in ejections {
            self.initiate_validator_exit(st, index)?;
        }

        activation_queue.sort();
        let churn = self
            .spec
            .activation_churn_limit(self.active_validator_count(st, current_epoch)?);
        for (_, index) in activation_queue.into_iter().take(churn as usize) {
            let mut validator = st.validator(index)?;
            validator.activation_epoch = activation_epoch;
            st.set_validator(index, &validator)?;
        }

        Ok(())
    }

    /// Pay out the correlation penalty to validators halfway through their
    /// slashing window.
    pub(crate) fn process_slashings(&self, st: &mut StateDb) -> anyhow::Result<()> {
        let epoch = self.spec.epoch_at_slot(st.slot()?);
        let total_balance = self.total_active_balance(st)?;
        let adjusted_total_slashing_balance = std::cmp::min(
            st.total_slashing()?
                .saturating_mul(self.spec.proportional_slashing_multiplier),
            total_balance,
        );

        // Factored out of the penalty numerator to avoid u64 overflow.
        let increment = self.spec.effective_balance_increment;
        let penalty_per_increment = adjusted_total_slashing_balance / (total_balance / increment);

        for (index, validator) in st.validators()?.iter().enumerate() {
            if validator.slashed
                && epoch + moraine_consensus::constants::EPOCHS_PER_SLASHINGS_VECTOR / 2
                    == validator.withdrawable_epoch
            {
                let penalty = validator.effective_balance / increment * penalty_per_increment;
                st.decrease_balance(index as u64, penalty)?;
            }
        }

        Ok(())
    }

    /// Update effective balances with hysteresis.
    pub(crate) fn process_effective_balance_updates(
        &self,
        st: &mut StateDb,
    ) -> anyhow::Result<()> {
        let increment = self.spec.effective_balance_increment;
        let hysteresis_increment = increment / self.spec.hysteresis_quotient;
        let downward_threshold = hysteresis_increment * self.spec.hysteresis_downward_multiplier;
        let upward_threshold = hysteresis_increment * self.spec.hysteresis_upward_multiplier;

        for (index, mut validator) in st.validators()?.into_iter().enumerate() {
            let balance = st.balance(index as u64)?;
            if balance + downward_threshold < validator.effective_balance
                || validator.effective_balance + upward_threshold < balance
            {
                validator.effective_balance =
                    std::cmp::min(balance - balance % increment, self.spec.max_effective_balance);
                st.set_validator(index as u64, &validator)?;
            }
        }

        Ok(())
    }

    pub(crate) fn process_randao_mixes_reset(&self, st: &mut StateDb) -> anyhow::Result<()> {
        let current_epoch = self.spec.epoch_at_slot(st.slot()?);
        st.update_randao_mix_at_index(
            current_epoch + 1,
            st.randao_mix_at_index(current_epoch)?,
        )?;
        Ok(())
    }

    /// Roll the block/state-root rings into a historical summary once per
    /// `SLOTS_PER_HISTORICAL_ROOT` window.
    pub(crate) fn process_historical_summaries_update(
        &self,
        st: &mut StateDb,
    ) -> anyhow::Result<()> {
        let next_epoch = self.spec.epoch_at_slot(st.slot()?) + 1;
        if next_epoch % (SLOTS_PER_HISTORICAL_ROOT / self.spec.slots_per_epoch) != 0 {
            return Ok(());
        }

        let mut block_roots = Vec::with_capacity(SLOTS_PER_HISTORICAL_ROOT as usize);
        let mut state_roots = Vec::with_capacity(SLOTS_PER_HISTORICAL_ROOT as usize);
        for index in 0..SLOTS_PER_HISTORICAL_ROOT {
            block_roots.push(st.block_root_at_index(index)?);
            state_roots.push(st.state_root_at_index(index)?);
        }
        let block_roots: BlockRoots = FixedVector::new(block_roots)
            .map_err(|err| anyhow::anyhow!("block roots ring malformed: {err:?}"))?;
        let state_roots: StateRoots = FixedVector::new(state_roots)
            .map_err(|err| anyhow::anyhow!("state roots ring malformed: {err:?}"))?;

        st.append_historical_summary(HistoricalSummary {
            block_summary_root: block_roots.tree_hash_root(),
            state_summary_root: state_roots.tree_hash_root(),
        })?;
        Ok(())
    }

    /// Zero the slashings bucket the next epoch will reuse, keeping the
    /// running total in lockstep.
    pub(crate) fn process_slashings_reset(&self, st: &mut StateDb) -> anyhow::Result<()> {
        let next_epoch = self.spec.epoch_at_slot(st.slot()?) + 1;
        let expiring = st.slashing_at_index(next_epoch)?;
        st.set_total_slashing(st.total_slashing()?.saturating_sub(expiring))?;
        st.update_slashing_at_index(next_epoch, 0)?;
        Ok(())
    }

    /// Reset eth1 data votes on voting-period boundaries.
    pub(crate) fn process_eth1_data_reset(&self, st: &mut StateDb) -> anyhow::Result<()> {
        let next_epoch = self.spec.epoch_at_slot(st.slot()?) + 1;
        if next_epoch % self.spec.epochs_per_eth1_voting_period == 0 {
            st.set_eth1_data_votes(&Default::default())?;
        }
        Ok(())
    }

    /// Voting power per validator index, as the host will see it at
    /// `epoch`.
    fn host_power_map(
        &self,
        st: &StateDb,
        epoch: u64,
    ) -> anyhow::Result<Vec<(PubKey, u64)>> {
        Ok(st
            .validators()?
            .iter()
            .map(|validator| {
                (
                    validator.pubkey.clone(),
                    self.validator_power(validator, epoch),
                )
            })
            .collect())
    }
}

/// Entries of `after` that differ from `before`, in index order. New
/// validators appear with their full power, exited ones with zero.
fn diff_power_maps(
    before: Vec<(PubKey, u64)>,
    after: Vec<(PubKey, u64)>,
) -> Vec<ValidatorUpdate> {
    after
        .into_iter()
        .enumerate()
        .filter_map(|(index, (pubkey, power))| match before.get(index) {
            Some((_, previous_power)) if *previous_power == power => None,
            _ => Some(ValidatorUpdate { pubkey, power }),
        })
        .collect()
}
