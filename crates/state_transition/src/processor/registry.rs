use alloy_primitives::B256;
use moraine_bls::PubKey;
use moraine_consensus::{
    constants::{EPOCHS_PER_SLASHINGS_VECTOR, FAR_FUTURE_EPOCH},
    deposit_data::DepositData,
    misc::consensus_address,
    validator::Validator,
};
use moraine_storage::StateDb;

use super::StateProcessor;

impl StateProcessor {
    /// Sum of active effective balances, floored at one increment so the
    /// slashing quotient never divides by zero.
    pub(crate) fn total_active_balance(&self, st: &StateDb) -> anyhow::Result<u64> {
        let epoch = self.spec.epoch_at_slot(st.slot()?);
        let mut total = 0u64;
        for validator in st.validators()? {
            if validator.is_active_validator(epoch) {
                total += validator.effective_balance;
            }
        }
        Ok(std::cmp::max(total, self.spec.effective_balance_increment))
    }

    pub(crate) fn active_validator_count(&self, st: &StateDb, epoch: u64) -> anyhow::Result<u64> {
        let mut count = 0;
        for validator in st.validators()? {
            if validator.is_active_validator(epoch) {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Initiate the exit of the validator with index `index`.
    pub(crate) fn initiate_validator_exit(
        &self,
        st: &mut StateDb,
        index: u64,
    ) -> anyhow::Result<()> {
        let mut validator = st.validator(index)?;
        if validator.exit_epoch != FAR_FUTURE_EPOCH {
            return Ok(());
        }

        let current_epoch = self.spec.epoch_at_slot(st.slot()?);
        let mut exit_queue_epoch = self.spec.activation_exit_epoch(current_epoch);

        // Respect the per-epoch exit churn: push the exit out while the
        // queue at `exit_queue_epoch` is full.
        let churn = self
            .spec
            .churn_limit(self.active_validator_count(st, current_epoch)?);
        loop {
            let exits_at_epoch = st
                .validators()?
                .iter()
                .filter(|v| v.exit_epoch == exit_queue_epoch)
                .count() as u64;
            if exits_at_epoch < churn {
                break;
            }
            exit_queue_epoch += 1;
        }

        validator.exit_epoch = exit_queue_epoch;
        validator.withdrawable_epoch =
            exit_queue_epoch + self.spec.min_validator_withdrawability_delay;
        st.set_validator(index, &validator)?;

        Ok(())
    }

    /// Slash the validator with index `slashed_index`, crediting the block
    /// proposer as whistleblower.
    pub(crate) fn slash_validator(
        &self,
        st: &mut StateDb,
        slashed_index: u64,
        proposer_index: u64,
    ) -> anyhow::Result<()> {
        let epoch = self.spec.epoch_at_slot(st.slot()?);

        self.initiate_validator_exit(st, slashed_index)?;

        let mut validator = st.validator(slashed_index)?;
        validator.slashed = true;
        validator.withdrawable_epoch = std::cmp::max(
            validator.withdrawable_epoch,
            epoch + EPOCHS_PER_SLASHINGS_VECTOR,
        );
        let effective_balance = validator.effective_balance;
        st.set_validator(slashed_index, &validator)?;

        // Record the slashed stake in the ring and its running total.
        let bucket = st.slashing_at_index(epoch)?;
        st.update_slashing_at_index(epoch, bucket + effective_balance)?;
        st.set_total_slashing(st.total_slashing()? + effective_balance)?;

        st.decrease_balance(
            slashed_index,
            effective_balance / self.spec.min_slashing_penalty_quotient,
        )?;

        // Whistleblower and proposer rewards collapse onto the proposer
        // under the BFT host.
        let whistleblower_reward = effective_balance / self.spec.whistleblower_reward_quotient;
        let proposer_reward = whistleblower_reward / self.spec.proposer_reward_quotient;
        st.increase_balance(proposer_index, proposer_reward)?;
        st.increase_balance(proposer_index, whistleblower_reward - proposer_reward)?;

        Ok(())
    }

    /// Registry entry for a fresh deposit. On the legacy testnet the
    /// withdrawal credentials are derived from the pubkey, not read from
    /// the deposit.
    pub(crate) fn add_validator_from_deposit(
        &self,
        st: &mut StateDb,
        deposit: &DepositData,
    ) -> anyhow::Result<u64> {
        let withdrawal_credentials = if self.spec.is_legacy_testnet() {
            legacy_withdrawal_credentials(&deposit.pubkey)
        } else {
            deposit.withdrawal_credentials
        };

        let amount = deposit.amount;
        let effective_balance = std::cmp::min(
            amount - amount % self.spec.effective_balance_increment,
            self.spec.max_effective_balance,
        );

        let validator = Validator {
            pubkey: deposit.pubkey.clone(),
            withdrawal_credentials,
            effective_balance,
            slashed: false,
            activation_eligibility_epoch: FAR_FUTURE_EPOCH,
            activation_epoch: FAR_FUTURE_EPOCH,
            exit_epoch: FAR_FUTURE_EPOCH,
            withdrawable_epoch: FAR_FUTURE_EPOCH,
        };
        Ok(st.add_validator(&validator, amount)?)
    }

    /// Host-facing voting power of a validator.
    pub(crate) fn validator_power(&self, validator: &Validator, epoch: u64) -> u64 {
        if validator.is_active_validator(epoch) {
            validator.effective_balance / self.spec.effective_balance_increment
        } else {
            0
        }
    }
}

/// 0x01 credentials pointing at an address derived from the pubkey hash.
fn legacy_withdrawal_credentials(pubkey: &PubKey) -> B256 {
    let address = consensus_address(pubkey.to_bytes());
    let mut credentials = [0u8; 32];
    credentials[0] = 0x01;
    credentials[12..].copy_from_slice(&address);
    B256::new(credentials)
}
