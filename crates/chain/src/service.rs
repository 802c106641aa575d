use std::sync::{Arc, Mutex};

use alloy_primitives::B256;
use anyhow::anyhow;
use moraine_blob::BlobProcessor;
use moraine_chain_spec::ChainSpec;
use moraine_consensus::{
    beacon_block::SignedBeaconBlock,
    blob_sidecar::{BlobSidecar, BlobSidecars},
    constants::DOMAIN_BEACON_PROPOSER,
    genesis::Genesis,
    misc::compute_domain,
    validator_update::ValidatorUpdate,
};
use moraine_execution::{EngineError, ExecutionEngine, ForkchoiceUpdateRequest,
    rpc_types::forkchoice_update::ForkchoiceStateV1};
use moraine_state_transition::{StateProcessor, TransitionContext, payload_time};
use moraine_storage::{StateDb, StateStore};
use ssz::Decode;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tree_hash::TreeHash;

use crate::{
    errors::{ChainError, is_fatal},
    host::{
        BEACON_BLOCK_TX_INDEX, BLOB_SIDECARS_TX_INDEX, Event, FinalizeBlockRequest,
        FinalizeBlockResponse, ProcessProposalRequest, ProcessProposalResponse, ProposalStatus,
    },
    payload_builder::{BuildRequest, PayloadBuilder, PayloadBuilderConfig},
};

/// The EL head is synchronized once, on the first block verification after
/// boot; afterwards forkchoice moves only with finalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StartupSync {
    Uninitialized,
    Ready,
}

/// Orchestrates the host callbacks: decode the proposal, verify sidecars,
/// drive the state transition on a branch, and commit only at
/// finalization.
pub struct ChainService {
    store: StateStore,
    processor: Arc<StateProcessor>,
    engine: Arc<ExecutionEngine>,
    blob_processor: Arc<BlobProcessor>,
    payload_builder: Arc<PayloadBuilder>,
    spec: Arc<ChainSpec>,
    startup: Mutex<StartupSync>,
    shutdown: CancellationToken,
}

impl ChainService {
    pub fn builder() -> ChainServiceBuilder {
        ChainServiceBuilder::default()
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn payload_builder(&self) -> &Arc<PayloadBuilder> {
        &self.payload_builder
    }

    /// Seed an empty store from genesis and report the initial validator
    /// set to the host.
    pub fn init_chain(&self, genesis: &Genesis) -> anyhow::Result<Vec<ValidatorUpdate>> {
        let mut branch = self.store.branch();
        let validator_updates = self
            .processor
            .initialize_from_genesis(branch.state_mut(), genesis)?;
        branch.commit()?;
        info!(
            validators = validator_updates.len(),
            "initialized beacon state from genesis"
        );
        Ok(validator_updates)
    }

    /// The host's proposal check. Non-fatal failures map to `Reject` with
    /// no error; fatal ones propagate and abort the host.
    pub async fn process_proposal(
        &self,
        request: &ProcessProposalRequest,
    ) -> anyhow::Result<ProcessProposalResponse> {
        match self.verify_proposal(request).await {
            Ok(()) => Ok(ProcessProposalResponse {
                status: ProposalStatus::Accept,
            }),
            Err(err) if !is_fatal(&err) => Ok(ProcessProposalResponse {
                status: ProposalStatus::Reject,
            }),
            Err(err) => Err(err),
        }
    }

    async fn verify_proposal(&self, request: &ProcessProposalRequest) -> anyhow::Result<()> {
        let block = self.decode_block(&request.txs, request.height)?;
        let sidecars = self.decode_sidecars(&request.txs)?;

        if !sidecars.is_empty() {
            info!(num_blobs = sidecars.len(), "received incoming blob sidecars");
            self.verify_sidecars(&block, &sidecars).map_err(|err| {
                error!(reason = %err, "rejecting incoming blob sidecars");
                err
            })?;
            info!(
                num_blobs = sidecars.len(),
                "blob sidecars verification succeeded"
            );
        }

        self.verify_incoming_block(&block, request.time, request.proposer_address)
            .await
    }

    fn verify_sidecars(
        &self,
        block: &SignedBeaconBlock,
        sidecars: &[BlobSidecar],
    ) -> anyhow::Result<()> {
        let snapshot = self.store.snapshot();
        let proposer = snapshot
            .state()
            .validator(block.message.proposer_index)
            .map_err(|_| ChainError::UnknownProposer(block.message.proposer_index))?;
        let domain = compute_domain(
            DOMAIN_BEACON_PROPOSER,
            snapshot.state().fork()?.current_version,
            snapshot.state().genesis_validators_root()?,
        );
        self.blob_processor
            .verify_sidecars(sidecars, &block.signed_header(), &proposer.pubkey, domain)
            .map_err(|err| anyhow!(err))
    }

    /// Verify the state root of an incoming block against a fresh branch.
    /// The branch is always discarded: only finalization commits.
    pub async fn verify_incoming_block(
        &self,
        block: &SignedBeaconBlock,
        consensus_time: u64,
        proposer_address: [u8; 20],
    ) -> anyhow::Result<()> {
        let pre_state = self.store.snapshot();
        self.force_startup_head(pre_state.state()).await;

        info!(
            state_root = %block.message.state_root,
            slot = block.message.slot,
            "received incoming beacon block"
        );

        let mut post = self.store.branch();
        let ctx = TransitionContext::verifying(
            proposer_address,
            consensus_time,
            self.shutdown.child_token(),
        );
        let outcome = self
            .processor
            .transition(&ctx, post.state_mut(), block)
            .await;

        let outcome = match outcome {
            // The EL accepted the payload without validating it. Under
            // single-slot finality the transition at finalize time will
            // enforce that the block is part of the canonical chain, so
            // the verdict is safe to ignore here.
            Err(err)
                if matches!(
                    err.downcast_ref::<EngineError>(),
                    Some(EngineError::AcceptedPayloadStatus)
                ) =>
            {
                Ok(vec![])
            }
            other => other,
        };

        match outcome {
            Err(err) => {
                error!(
                    state_root = %block.message.state_root,
                    slot = block.message.slot,
                    reason = %err,
                    "rejecting incoming beacon block"
                );
                // Our payload for this slot lost; rebuild against the
                // pre-state so the next round has something to propose.
                if self.payload_builder.enabled() {
                    if let Ok(rebuild) =
                        self.rebuild_request(pre_state.state(), block.message.slot, consensus_time)
                    {
                        self.payload_builder
                            .spawn_build(rebuild, self.shutdown.child_token());
                    }
                }
                post.discard();
                Err(err)
            }
            Ok(_) => {
                info!(
                    state_root = %block.message.state_root,
                    "state root verification succeeded - accepting incoming beacon block"
                );
                if self.payload_builder.enabled() {
                    if let Ok(next_build) =
                        self.next_slot_request(post.state(), block, consensus_time)
                    {
                        self.payload_builder
                            .spawn_build(next_build, self.shutdown.child_token());
                    }
                }
                post.discard();
                Ok(())
            }
        }
    }

    /// Re-run the transition with the host's decided timestamp and promote
    /// the branch. EL sync is tolerated here: the host has already decided
    /// and the chain must advance.
    pub async fn finalize_block(
        &self,
        request: &FinalizeBlockRequest,
    ) -> anyhow::Result<FinalizeBlockResponse> {
        let block = self.decode_block(&request.txs, request.height)?;

        let mut post = self.store.branch();
        let ctx = TransitionContext::finalizing(
            request.proposer_address,
            request.time,
            self.payload_builder.enabled(),
            self.shutdown.child_token(),
        );
        let validator_updates = self
            .processor
            .transition(&ctx, post.state_mut(), &block)
            .await?;
        post.commit()?;

        info!(
            slot = block.message.slot,
            state_root = %block.message.state_root,
            "finalized beacon block"
        );

        // Move the EL head along. When optimistic builds are on, the
        // builder's forkchoice calls already carry the head.
        if !self.payload_builder.enabled() {
            let head = block.message.body.execution_payload.block_hash;
            if let Err(err) = self
                .engine
                .notify_forkchoice_update(
                    ForkchoiceUpdateRequest {
                        state: ForkchoiceStateV1::from_single_hash(head),
                        payload_attributes: None,
                    },
                    &self.shutdown.child_token(),
                )
                .await
            {
                warn!(%err, "post-finalization forkchoice update failed");
            }
        }

        let events = vec![Event {
            kind: "beacon_block_finalized".to_string(),
            attributes: vec![
                ("slot".to_string(), block.message.slot.to_string()),
                (
                    "state_root".to_string(),
                    format!("{:#x}", block.message.state_root),
                ),
            ],
        }];

        Ok(FinalizeBlockResponse {
            events,
            validator_updates,
        })
    }

    /// `Uninitialized -> Ready` edge: point the EL at our latest known
    /// payload once, best effort.
    async fn force_startup_head(&self, state: &StateDb) {
        {
            let mut startup = self.startup.lock().expect("startup lock poisoned");
            if *startup == StartupSync::Ready {
                return;
            }
            *startup = StartupSync::Ready;
        }

        let head = match state.latest_execution_payload_header() {
            Ok(header) => header.block_hash,
            Err(err) => {
                warn!(%err, "startup head sync skipped, no committed payload header");
                return;
            }
        };
        info!(%head, "forcing startup forkchoice update");
        if let Err(err) = self
            .engine
            .notify_forkchoice_update(
                ForkchoiceUpdateRequest {
                    state: ForkchoiceStateV1::from_single_hash(head),
                    payload_attributes: None,
                },
                &self.shutdown.child_token(),
            )
            .await
        {
            warn!(%err, "startup forkchoice update failed");
        }
    }

    fn decode_block(
        &self,
        txs: &[Vec<u8>],
        height: u64,
    ) -> anyhow::Result<SignedBeaconBlock> {
        let bytes = txs
            .get(BEACON_BLOCK_TX_INDEX)
            .filter(|bytes| !bytes.is_empty())
            .ok_or(ChainError::NilBlock)?;
        let fork_name = self
            .spec
            .fork_name_at_epoch(self.spec.epoch_at_slot(height));
        SignedBeaconBlock::from_ssz_bytes_by_fork(bytes, fork_name).map_err(|err| {
            ChainError::Undecodable {
                what: "beacon block",
                reason: format!("{err:?}"),
            }
            .into()
        })
    }

    fn decode_sidecars(&self, txs: &[Vec<u8>]) -> anyhow::Result<Vec<BlobSidecar>> {
        match txs.get(BLOB_SIDECARS_TX_INDEX) {
            None => Ok(vec![]),
            Some(bytes) if bytes.is_empty() => Ok(vec![]),
            Some(bytes) => Ok(BlobSidecars::from_ssz_bytes(bytes)
                .map_err(|err| ChainError::Undecodable {
                    what: "blob sidecars",
                    reason: format!("{err:?}"),
                })?
                .to_vec()),
        }
    }

    /// Build attributes for retrying the slot we just rejected, anchored
    /// at the pre-state.
    fn rebuild_request(
        &self,
        state: &StateDb,
        slot: u64,
        consensus_time: u64,
    ) -> anyhow::Result<BuildRequest> {
        let payload_header = state.latest_execution_payload_header()?;
        let epoch = state.spec().epoch_at_slot(slot);
        Ok(BuildRequest {
            slot,
            head_block_hash: payload_header.block_hash,
            parent_block_root: backfilled_header_root(state)?,
            timestamp: payload_time::next_timestamp(consensus_time, payload_header.timestamp),
            prev_randao: state.randao_mix_at_index(epoch)?,
            withdrawals: self.processor.expected_withdrawals(state)?,
        })
    }

    /// Build attributes for the slot after an accepted block, anchored at
    /// the post-state.
    fn next_slot_request(
        &self,
        state: &StateDb,
        block: &SignedBeaconBlock,
        consensus_time: u64,
    ) -> anyhow::Result<BuildRequest> {
        let next_slot = block.message.slot + 1;
        let epoch = state.spec().epoch_at_slot(next_slot);
        let payload = &block.message.body.execution_payload;
        Ok(BuildRequest {
            slot: next_slot,
            head_block_hash: payload.block_hash,
            parent_block_root: block.message.block_root(),
            timestamp: payload_time::next_timestamp(consensus_time, payload.timestamp),
            prev_randao: state.randao_mix_at_index(epoch)?,
            withdrawals: self.processor.expected_withdrawals(state)?,
        })
    }
}

/// Root of the latest block header as the chain will record it: the header
/// of the last applied block with its state root backfilled.
fn backfilled_header_root(state: &StateDb) -> anyhow::Result<B256> {
    let mut header = state.latest_block_header()?;
    if header.state_root == B256::ZERO {
        header.state_root = state.hash_tree_root()?;
    }
    Ok(header.tree_hash_root())
}

/// Construction-time wiring, leaves first: the store and engine come in
/// ready-made, everything above them is derived here. No component ever
/// reaches back up the stack at runtime.
#[derive(Default)]
pub struct ChainServiceBuilder {
    store: Option<StateStore>,
    engine: Option<Arc<ExecutionEngine>>,
    payload_builds: PayloadBuilderConfig,
    shutdown: Option<CancellationToken>,
}

impl ChainServiceBuilder {
    pub fn store(mut self, store: StateStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn engine(mut self, engine: Arc<ExecutionEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn payload_builds(mut self, config: PayloadBuilderConfig) -> Self {
        self.payload_builds = config;
        self
    }

    pub fn shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    pub fn build(self) -> anyhow::Result<ChainService> {
        let store = self.store.ok_or_else(|| anyhow!("chain service needs a state store"))?;
        let engine = self
            .engine
            .ok_or_else(|| anyhow!("chain service needs an execution engine"))?;
        let spec = store.spec();

        let processor = Arc::new(StateProcessor::new(spec.clone(), engine.clone()));
        let blob_processor = Arc::new(BlobProcessor::new(spec.clone()));
        let payload_builder = Arc::new(PayloadBuilder::new(engine.clone(), self.payload_builds));

        Ok(ChainService {
            store,
            processor,
            engine,
            blob_processor,
            payload_builder,
            spec,
            startup: Mutex::new(StartupSync::Uninitialized),
            shutdown: self.shutdown.unwrap_or_default(),
        })
    }
}
