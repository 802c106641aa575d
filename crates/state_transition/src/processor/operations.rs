use std::collections::HashSet;

use anyhow::{anyhow, ensure};
use itertools::Itertools;
use moraine_bls::traits::Verifiable;
use moraine_consensus::{
    attestation_data::is_slashable_attestation_data,
    attester_slashing::AttesterSlashing,
    beacon_block::BeaconBlock,
    constants::{
        DEPOSIT_CONTRACT_TREE_DEPTH, DOMAIN_BEACON_ATTESTER, DOMAIN_BEACON_PROPOSER,
        DOMAIN_DEPOSIT, DOMAIN_VOLUNTARY_EXIT, FAR_FUTURE_EPOCH,
    },
    deposit::Deposit,
    deposit_data::DepositData,
    deposit_message::DepositMessage,
    indexed_attestation::IndexedAttestation,
    misc::{compute_domain, compute_signing_root},
    proposer_slashing::ProposerSlashing,
    voluntary_exit::SignedVoluntaryExit,
};
use moraine_merkle::verify_merkle_branch;
use moraine_storage::StateDb;
use tree_hash::TreeHash;

use super::StateProcessor;
use crate::errors::TransitionError;

impl StateProcessor {
    /// Apply the block's operations in their fixed order. The first failing
    /// precondition aborts the whole transition.
    pub(crate) fn process_operations(
        &self,
        st: &mut StateDb,
        block: &BeaconBlock,
    ) -> anyhow::Result<()> {
        let body = &block.body;

        // Every pending deposit the eth1 vote committed to must be drained
        // before the block may carry fewer than the maximum.
        let expected_deposits = std::cmp::min(
            self.spec.max_deposits_per_block,
            st.eth1_data()?
                .deposit_count
                .saturating_sub(st.eth1_deposit_index()?),
        );
        ensure!(
            body.deposits.len() as u64 == expected_deposits,
            TransitionError::invalid_operation(
                "deposit",
                format!(
                    "block carries {} deposits, expected {expected_deposits}",
                    body.deposits.len()
                ),
            )
        );

        for proposer_slashing in body.proposer_slashings.iter() {
            self.process_proposer_slashing(st, proposer_slashing, block.proposer_index)?;
        }
        for attester_slashing in body.attester_slashings.iter() {
            self.process_attester_slashing(st, attester_slashing, block.proposer_index)?;
        }
        for deposit in body.deposits.iter() {
            self.process_deposit(st, deposit)?;
        }
        for voluntary_exit in body.voluntary_exits.iter() {
            self.process_voluntary_exit(st, voluntary_exit)?;
        }
        self.process_withdrawals(st, &body.execution_payload)?;

        Ok(())
    }

    pub(crate) fn process_proposer_slashing(
        &self,
        st: &mut StateDb,
        proposer_slashing: &ProposerSlashing,
        block_proposer_index: u64,
    ) -> anyhow::Result<()> {
        let header_1 = &proposer_slashing.signed_header_1.message;
        let header_2 = &proposer_slashing.signed_header_2.message;

        ensure!(
            header_1.slot == header_2.slot,
            TransitionError::invalid_operation("proposer slashing", "header slots differ")
        );
        ensure!(
            header_1.proposer_index == header_2.proposer_index,
            TransitionError::invalid_operation("proposer slashing", "proposer indices differ")
        );
        ensure!(
            header_1 != header_2,
            TransitionError::invalid_operation("proposer slashing", "headers are identical")
        );

        let offender_index = header_1.proposer_index;
        let offender = st.validator(offender_index).map_err(|_| {
            TransitionError::invalid_operation("proposer slashing", "unknown proposer index")
        })?;
        let current_epoch = self.spec.epoch_at_slot(st.slot()?);
        ensure!(
            offender.is_slashable_validator(current_epoch),
            TransitionError::invalid_operation("proposer slashing", "proposer is not slashable")
        );

        for signed_header in [
            &proposer_slashing.signed_header_1,
            &proposer_slashing.signed_header_2,
        ] {
            let domain = compute_domain(
                DOMAIN_BEACON_PROPOSER,
                st.fork()?.current_version,
                st.genesis_validators_root()?,
            );
            let signing_root = compute_signing_root(&signed_header.message, domain);
            ensure!(
                signed_header
                    .signature
                    .verify(&offender.pubkey, signing_root.as_slice())
                    .map_err(|err| anyhow!("slashing header signature malformed: {err:?}"))?,
                TransitionError::invalid_operation(
                    "proposer slashing",
                    "header signature invalid"
                )
            );
        }

        self.slash_validator(st, offender_index, block_proposer_index)
    }

    pub(crate) fn process_attester_slashing(
        &self,
        st: &mut StateDb,
        attester_slashing: &AttesterSlashing,
        block_proposer_index: u64,
    ) -> anyhow::Result<()> {
        let attestation_1 = &attester_slashing.attestation_1;
        let attestation_2 = &attester_slashing.attestation_2;

        ensure!(
            is_slashable_attestation_data(&attestation_1.data, &attestation_2.data),
            TransitionError::invalid_operation(
                "attester slashing",
                "attestation pair is not slashable"
            )
        );
        ensure!(
            self.is_valid_indexed_attestation(st, attestation_1)?,
            TransitionError::invalid_operation("attester slashing", "first attestation invalid")
        );
        ensure!(
            self.is_valid_indexed_attestation(st, attestation_2)?,
            TransitionError::invalid_operation("attester slashing", "second attestation invalid")
        );

        let current_epoch = self.spec.epoch_at_slot(st.slot()?);
        let indices_1: HashSet<u64> = attestation_1.attesting_indices.iter().copied().collect();
        let indices_2: HashSet<u64> = attestation_2.attesting_indices.iter().copied().collect();

        let mut slashed_any = false;
        for &index in indices_1.intersection(&indices_2).sorted() {
            if st.validator(index)?.is_slashable_validator(current_epoch) {
                self.slash_validator(st, index, block_proposer_index)?;
                slashed_any = true;
            }
        }

        ensure!(
            slashed_any,
            TransitionError::invalid_operation("attester slashing", "no validator was slashed")
        );

        Ok(())
    }

    fn is_valid_indexed_attestation(
        &self,
        st: &StateDb,
        attestation: &IndexedAttestation,
    ) -> anyhow::Result<bool> {
        if attestation.attesting_indices.is_empty()
            || !attestation.has_sorted_and_unique_indices()
        {
            return Ok(false);
        }

        let mut pubkeys = vec![];
        for &index in attestation.attesting_indices.iter() {
            match st.validator(index) {
                Ok(validator) => pubkeys.push(validator.pubkey),
                Err(_) => return Ok(false),
            }
        }

        let domain = compute_domain(
            DOMAIN_BEACON_ATTESTER,
            st.fork()?.current_version,
            st.genesis_validators_root()?,
        );
        let signing_root = compute_signing_root(&attestation.data, domain);
        attestation
            .signature
            .fast_aggregate_verify(
                pubkeys.iter().collect::<Vec<_>>(),
                signing_root.as_slice(),
            )
            .map_err(|err| anyhow!("indexed attestation signature malformed: {err:?}"))
    }

    pub(crate) fn process_deposit(&self, st: &mut StateDb, deposit: &Deposit) -> anyhow::Result<()> {
        // The branch binds the deposit to the eth1 deposit tree at exactly
        // the next unprocessed index; the +1 covers the list length mix-in.
        let deposit_index = st.eth1_deposit_index()?;
        ensure!(
            verify_merkle_branch(
                deposit.data.tree_hash_root(),
                &deposit.proof,
                DEPOSIT_CONTRACT_TREE_DEPTH + 1,
                deposit_index,
                st.eth1_data()?.deposit_root,
            ),
            TransitionError::invalid_operation("deposit", "merkle proof invalid")
        );

        // Deposits must be processed in order.
        st.set_eth1_deposit_index(deposit_index + 1)?;

        self.apply_deposit(st, &deposit.data)
    }

    pub(crate) fn apply_deposit(
        &self,
        st: &mut StateDb,
        deposit: &DepositData,
    ) -> anyhow::Result<()> {
        match st.validator_index_by_pubkey(&deposit.pubkey)? {
            Some(index) => {
                st.increase_balance(index, deposit.amount)?;
            }
            None => {
                // Proof of possession is not checked by the deposit
                // contract; a deposit with a bad signature burns quietly
                // instead of aborting the block.
                if self.is_valid_deposit_signature(deposit)? {
                    self.add_validator_from_deposit(st, deposit)?;
                }
            }
        }
        Ok(())
    }

    fn is_valid_deposit_signature(&self, deposit: &DepositData) -> anyhow::Result<bool> {
        // Deposit domain is fork-agnostic.
        let domain = compute_domain(
            DOMAIN_DEPOSIT,
            self.spec.genesis_fork_version,
            Default::default(),
        );
        let message = DepositMessage {
            pubkey: deposit.pubkey.clone(),
            withdrawal_credentials: deposit.withdrawal_credentials,
            amount: deposit.amount,
        };
        let signing_root = compute_signing_root(&message, domain);
        Ok(deposit
            .signature
            .verify(&deposit.pubkey, signing_root.as_slice())
            .unwrap_or(false))
    }

    pub(crate) fn process_voluntary_exit(
        &self,
        st: &mut StateDb,
        signed_voluntary_exit: &SignedVoluntaryExit,
    ) -> anyhow::Result<()> {
        let voluntary_exit = &signed_voluntary_exit.message;
        let current_epoch = self.spec.epoch_at_slot(st.slot()?);

        let validator = st.validator(voluntary_exit.validator_index).map_err(|_| {
            TransitionError::invalid_operation("voluntary exit", "unknown validator index")
        })?;

        ensure!(
            validator.is_active_validator(current_epoch),
            TransitionError::invalid_operation("voluntary exit", "validator is not active")
        );
        ensure!(
            validator.exit_epoch == FAR_FUTURE_EPOCH,
            TransitionError::invalid_operation("voluntary exit", "exit already initiated")
        );
        ensure!(
            current_epoch >= voluntary_exit.epoch,
            TransitionError::invalid_operation("voluntary exit", "exit epoch is in the future")
        );
        ensure!(
            current_epoch
                >= validator.activation_epoch + self.spec.min_epochs_before_voluntary_exit,
            TransitionError::invalid_operation(
                "voluntary exit",
                "validator has not been active long enough"
            )
        );

        let domain = compute_domain(
            DOMAIN_VOLUNTARY_EXIT,
            st.fork()?.current_version,
            st.genesis_validators_root()?,
        );
        let signing_root = compute_signing_root(voluntary_exit, domain);
        ensure!(
            signed_voluntary_exit
                .signature
                .verify(&validator.pubkey, signing_root.as_slice())
                .map_err(|err| anyhow!("voluntary exit signature malformed: {err:?}"))?,
            TransitionError::invalid_operation("voluntary exit", "signature invalid")
        );

        self.initiate_validator_exit(st, voluntary_exit.validator_index)
    }
}
