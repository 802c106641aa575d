use anyhow::ensure;
use moraine_consensus::beacon_block_body::BeaconBlockBody;
use moraine_execution::NewPayloadRequest;
use moraine_storage::StateDb;

use super::StateProcessor;
use crate::{context::TransitionContext, errors::TransitionError, payload_time};

impl StateProcessor {
    /// Check the payload's consensus commitments, hand it to the execution
    /// engine, and cache its header.
    pub(crate) async fn process_execution_payload(
        &self,
        ctx: &TransitionContext,
        st: &mut StateDb,
        body: &BeaconBlockBody,
    ) -> anyhow::Result<()> {
        let payload = &body.execution_payload;
        let latest_payload_header = st.latest_execution_payload_header()?;

        // Consistency of the parent hash with the previous payload header.
        ensure!(
            payload.parent_hash == latest_payload_header.block_hash,
            TransitionError::PayloadParentHashMismatch {
                payload: payload.parent_hash,
                expected: latest_payload_header.block_hash,
            }
        );

        let epoch = self.spec.epoch_at_slot(st.slot()?);
        let expected_mix = st.randao_mix_at_index(epoch)?;
        ensure!(
            payload.prev_randao == expected_mix,
            TransitionError::PayloadPrevRandaoMismatch {
                payload: payload.prev_randao,
                expected: expected_mix,
            }
        );

        payload_time::verify_timestamp(
            ctx.consensus_time,
            latest_payload_header.timestamp,
            payload.timestamp,
            self.spec.max_payload_timestamp_drift,
        )?;

        ensure!(
            body.blob_kzg_commitments.len() as u64 <= self.spec.max_blobs_per_block,
            TransitionError::TooManyBlobCommitments {
                got: body.blob_kzg_commitments.len(),
                limit: self.spec.max_blobs_per_block,
            }
        );

        if !ctx.skip_payload_verification {
            let versioned_hashes = body
                .blob_kzg_commitments
                .iter()
                .map(|commitment| commitment.calculate_versioned_hash())
                .collect();
            self.engine
                .verify_and_notify_new_payload(
                    NewPayloadRequest {
                        execution_payload: payload.clone(),
                        versioned_hashes,
                        // The header cached by process_block_header is the
                        // block's own; its parent root is the parent beacon
                        // block root the EL commits to.
                        parent_beacon_block_root: st.latest_block_header()?.parent_root,
                        optimistic: ctx.optimistic_engine,
                        skip_if_exists: false,
                    },
                    &ctx.cancel,
                )
                .await?;
        }

        st.set_latest_execution_payload_header(&payload.to_execution_payload_header())?;

        Ok(())
    }
}
