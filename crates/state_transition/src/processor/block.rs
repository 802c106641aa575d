use alloy_primitives::B256;
use anyhow::{anyhow, ensure};
use ethereum_hashing::hash;
use moraine_bls::traits::Verifiable;
use moraine_consensus::{
    beacon_block::BeaconBlock,
    beacon_block_body::BeaconBlockBody,
    beacon_block_header::BeaconBlockHeader,
    constants::DOMAIN_RANDAO,
    misc::{compute_domain, compute_signing_root, xor},
};
use moraine_storage::StateDb;
use tree_hash::TreeHash;

use super::StateProcessor;
use crate::{context::TransitionContext, errors::TransitionError};

impl StateProcessor {
    pub(crate) async fn process_block(
        &self,
        ctx: &TransitionContext,
        st: &mut StateDb,
        block: &BeaconBlock,
    ) -> anyhow::Result<()> {
        self.process_block_header(ctx, st, block)?;
        self.process_randao(ctx, st, block)?;
        self.process_eth1_data(st, &block.body)?;
        self.process_operations(st, block)?;
        self.process_execution_payload(ctx, st, &block.body).await?;

        Ok(())
    }

    pub(crate) fn process_block_header(
        &self,
        ctx: &TransitionContext,
        st: &mut StateDb,
        block: &BeaconBlock,
    ) -> anyhow::Result<()> {
        let slot = st.slot()?;
        ensure!(
            block.slot == slot,
            TransitionError::SlotMismatch {
                block: block.slot,
                state: slot,
            }
        );

        let latest_block_header = st.latest_block_header()?;
        ensure!(
            block.slot > latest_block_header.slot,
            TransitionError::StaleBlock {
                block: block.slot,
                latest: latest_block_header.slot,
            }
        );

        let expected_parent = latest_block_header.tree_hash_root();
        ensure!(
            block.parent_root == expected_parent,
            TransitionError::ParentRootMismatch {
                block: block.parent_root,
                expected: expected_parent,
            }
        );

        let proposer = st
            .validator(block.proposer_index)
            .map_err(|_| TransitionError::UnknownProposer(block.proposer_index))?;

        // The host picked the proposer; the block must name the validator
        // behind that consensus address.
        if let Some(proposer_address) = ctx.proposer_address {
            let expected_index = st.validator_index_by_consensus_address(&proposer_address)?;
            ensure!(
                expected_index == Some(block.proposer_index),
                TransitionError::ProposerMismatch {
                    index: block.proposer_index,
                }
            );
        }

        ensure!(
            !proposer.slashed,
            TransitionError::ProposerSlashed(block.proposer_index)
        );

        // Cache the block as the new latest header. Its state root stays
        // zeroed until the next process_slot fills it in.
        st.set_latest_block_header(&BeaconBlockHeader {
            slot: block.slot,
            proposer_index: block.proposer_index,
            parent_root: block.parent_root,
            state_root: B256::ZERO,
            body_root: block.body.tree_hash_root(),
        })?;

        Ok(())
    }

    pub(crate) fn process_randao(
        &self,
        ctx: &TransitionContext,
        st: &mut StateDb,
        block: &BeaconBlock,
    ) -> anyhow::Result<()> {
        let epoch = self.spec.epoch_at_slot(st.slot()?);

        if !ctx.skip_validate_randao {
            let proposer = st.validator(block.proposer_index)?;
            let domain = compute_domain(
                DOMAIN_RANDAO,
                st.fork()?.current_version,
                st.genesis_validators_root()?,
            );
            let signing_root = compute_signing_root(&epoch, domain);
            ensure!(
                block
                    .body
                    .randao_reveal
                    .verify(&proposer.pubkey, signing_root.as_slice())
                    .map_err(|err| anyhow!("randao signature malformed: {err:?}"))?,
                TransitionError::InvalidRandaoReveal
            );
        }

        let mix = xor(
            st.randao_mix_at_index(epoch)?.as_slice(),
            &hash(block.body.randao_reveal.to_bytes()),
        );
        st.update_randao_mix_at_index(epoch, mix)?;

        Ok(())
    }

    pub(crate) fn process_eth1_data(
        &self,
        st: &mut StateDb,
        body: &BeaconBlockBody,
    ) -> anyhow::Result<()> {
        let mut votes = st.eth1_data_votes()?;
        votes
            .push(body.eth1_data.clone())
            .map_err(|err| anyhow!("eth1 data votes overflow: {err:?}"))?;
        st.set_eth1_data_votes(&votes)?;

        let support = votes
            .iter()
            .filter(|vote| **vote == body.eth1_data)
            .count() as u64;
        if support * 2 > self.spec.slots_per_eth1_voting_period() {
            st.set_eth1_data(&body.eth1_data)?;
        }

        Ok(())
    }
}
