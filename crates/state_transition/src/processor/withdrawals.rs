use alloy_primitives::Address;
use anyhow::ensure;
use moraine_consensus::{execution_payload::ExecutionPayload, withdrawal::Withdrawal};
use moraine_storage::StateDb;

use super::StateProcessor;
use crate::errors::TransitionError;

impl StateProcessor {
    /// Sweep the registry from the withdrawal cursor and collect what the
    /// payload is obliged to pay out. Also used by the payload builder to
    /// fill build attributes.
    pub fn expected_withdrawals(&self, st: &StateDb) -> anyhow::Result<Vec<Withdrawal>> {
        let epoch = self.spec.epoch_at_slot(st.slot()?);
        let validator_count = st.validator_count()?;
        if validator_count == 0 {
            return Ok(vec![]);
        }

        let mut withdrawal_index = st.next_withdrawal_index()?;
        let mut validator_index = st.next_withdrawal_validator_index()?;
        let mut withdrawals: Vec<Withdrawal> = vec![];

        let bound = std::cmp::min(
            validator_count,
            self.spec.max_validators_per_withdrawals_sweep,
        );
        for _ in 0..bound {
            let validator = st.validator(validator_index)?;
            let balance = st.balance(validator_index)?;
            let address = Address::from_slice(&validator.withdrawal_credentials[12..]);

            if validator.is_fully_withdrawable_validator(balance, epoch) {
                withdrawals.push(Withdrawal {
                    index: withdrawal_index,
                    validator_index,
                    address,
                    amount: balance,
                });
                withdrawal_index += 1;
            } else if validator
                .is_partially_withdrawable_validator(balance, self.spec.max_effective_balance)
            {
                withdrawals.push(Withdrawal {
                    index: withdrawal_index,
                    validator_index,
                    address,
                    amount: balance - self.spec.max_effective_balance,
                });
                withdrawal_index += 1;
            }
            if withdrawals.len() as u64 == self.spec.max_withdrawals_per_payload {
                break;
            }
            validator_index = (validator_index + 1) % validator_count;
        }

        Ok(withdrawals)
    }

    pub(crate) fn process_withdrawals(
        &self,
        st: &mut StateDb,
        payload: &ExecutionPayload,
    ) -> anyhow::Result<()> {
        let expected_withdrawals = self.expected_withdrawals(st)?;
        ensure!(
            payload.withdrawals.iter().cloned().collect::<Vec<_>>() == expected_withdrawals,
            TransitionError::invalid_operation(
                "withdrawals",
                "payload withdrawals do not match the expected sweep"
            )
        );

        for withdrawal in &expected_withdrawals {
            st.decrease_balance(withdrawal.validator_index, withdrawal.amount)?;
        }

        let validator_count = st.validator_count()?;
        if validator_count == 0 {
            return Ok(());
        }

        if let Some(latest) = expected_withdrawals.last() {
            st.set_next_withdrawal_index(latest.index + 1)?;
        }

        // Advance the sweep cursor: past the last payout on a full payload,
        // past the whole scanned range otherwise.
        if expected_withdrawals.len() as u64 == self.spec.max_withdrawals_per_payload {
            let next_validator_index = (expected_withdrawals
                .last()
                .expect("non-empty by the length check")
                .validator_index
                + 1)
                % validator_count;
            st.set_next_withdrawal_validator_index(next_validator_index)?;
        } else {
            let next_validator_index = (st.next_withdrawal_validator_index()?
                + std::cmp::min(
                    validator_count,
                    self.spec.max_validators_per_withdrawals_sweep,
                ))
                % validator_count;
            st.set_next_withdrawal_validator_index(next_validator_index)?;
        }

        Ok(())
    }
}
