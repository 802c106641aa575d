//! End-to-end host-callback scenarios over the in-memory store and the
//! scriptable mock execution engine.

use std::sync::Arc;

use alloy_primitives::{Address, B256, FixedBytes};
use ethereum_hashing::hash;
use moraine_bls::{PrivateKey, traits::Signable};
use moraine_chain::{
    ChainService, PayloadBuilderConfig,
    host::{
        FinalizeBlockRequest, ProcessProposalRequest, ProposalStatus,
    },
};
use moraine_chain_spec::ChainSpec;
use moraine_consensus::{
    beacon_block::{BeaconBlock, SignedBeaconBlock},
    beacon_block_body::BeaconBlockBody,
    blob_sidecar::BlobSidecars,
    constants::{DOMAIN_BEACON_PROPOSER, DOMAIN_RANDAO},
    deposit_data::DepositData,
    execution_payload_header::ExecutionPayloadHeader,
    genesis::Genesis,
    misc::{compute_domain, compute_signing_root, consensus_address, xor},
    polynomial_commitments::kzg_commitment::KZGCommitment,
};
use moraine_execution::{
    EngineError, ExecutionEngine,
    block_hash::compute_execution_block_hash,
    mock::MockEngineRpc,
    rpc_types::payload_status::{PayloadStatus, PayloadStatusV1},
};
use moraine_state_transition::{StateProcessor, TransitionContext, payload_time};
use moraine_storage::StateStore;
use ssz::Encode;
use ssz_types::VariableList;
use tokio_util::sync::CancellationToken;
use tree_hash::TreeHash;

const FULL_STAKE: u64 = 32_000_000_000;

struct TestChain {
    service: ChainService,
    processor: StateProcessor,
    store: StateStore,
    rpc: Arc<MockEngineRpc>,
    key: PrivateKey,
    spec: Arc<ChainSpec>,
}

fn withdrawal_credentials(key: &PrivateKey) -> B256 {
    let address = consensus_address(key.public_key().unwrap().to_bytes());
    let mut credentials = [0u8; 32];
    credentials[0] = 0x01;
    credentials[12..].copy_from_slice(&address);
    B256::new(credentials)
}

impl TestChain {
    fn new() -> Self {
        Self::with_payload_builds(PayloadBuilderConfig::default())
    }

    fn with_optimistic_builds() -> Self {
        Self::with_payload_builds(PayloadBuilderConfig {
            enabled: true,
            suggested_fee_recipient: Address::ZERO,
        })
    }

    fn with_payload_builds(config: PayloadBuilderConfig) -> Self {
        let spec = Arc::new(ChainSpec::minimal());
        let store = StateStore::in_memory(spec.clone());
        let rpc = Arc::new(MockEngineRpc::new());
        let engine = Arc::new(ExecutionEngine::new(rpc.clone()));
        let processor = StateProcessor::new(spec.clone(), engine.clone());

        let service = ChainService::builder()
            .store(store.clone())
            .engine(engine)
            .payload_builds(config)
            .build()
            .unwrap();

        let key = PrivateKey::from_seed(&[7u8; 32]).unwrap();
        let genesis = Genesis {
            fork_version: spec.genesis_fork_version,
            deposits: vec![DepositData {
                pubkey: key.public_key().unwrap(),
                withdrawal_credentials: withdrawal_credentials(&key),
                amount: FULL_STAKE,
                signature: Default::default(),
            }],
            execution_payload_header: ExecutionPayloadHeader {
                block_hash: B256::repeat_byte(0x11),
                ..Default::default()
            },
        };
        let updates = service.init_chain(&genesis).unwrap();
        assert_eq!(updates.len(), 1);

        Self {
            service,
            processor,
            store,
            rpc,
            key,
            spec,
        }
    }

    fn proposer_address(&self) -> [u8; 20] {
        consensus_address(self.key.public_key().unwrap().to_bytes())
    }

    fn proposer_domain(&self) -> B256 {
        let snapshot = self.store.snapshot();
        compute_domain(
            DOMAIN_BEACON_PROPOSER,
            snapshot.state().fork().unwrap().current_version,
            snapshot.state().genesis_validators_root().unwrap(),
        )
    }

    /// A sealed, signed block for `slot` on top of the committed state.
    async fn build_block(&self, slot: u64, consensus_time: u64) -> SignedBeaconBlock {
        let mut scratch = self.store.branch();
        self.processor
            .process_slots(scratch.state_mut(), slot)
            .unwrap();
        let epoch = self.spec.epoch_at_slot(slot);
        let parent_root = scratch
            .state()
            .latest_block_header()
            .unwrap()
            .tree_hash_root();
        let payload_header = scratch.state().latest_execution_payload_header().unwrap();
        let current_mix = scratch.state().randao_mix_at_index(epoch).unwrap();
        let eth1_data = scratch.state().eth1_data().unwrap();
        let genesis_validators_root = scratch.state().genesis_validators_root().unwrap();
        scratch.discard();

        let randao_domain = compute_domain(
            DOMAIN_RANDAO,
            self.spec.genesis_fork_version,
            genesis_validators_root,
        );
        let randao_reveal = self
            .key
            .sign(compute_signing_root(&epoch, randao_domain).as_slice())
            .unwrap();

        let mut body = BeaconBlockBody {
            randao_reveal: randao_reveal.clone(),
            eth1_data,
            ..Default::default()
        };
        body.execution_payload.parent_hash = payload_header.block_hash;
        body.execution_payload.prev_randao =
            xor(current_mix.as_slice(), &hash(randao_reveal.to_bytes()));
        body.execution_payload.block_number = payload_header.block_number + 1;
        body.execution_payload.timestamp =
            payload_time::next_timestamp(consensus_time, payload_header.timestamp);

        let mut block = BeaconBlock {
            slot,
            proposer_index: 0,
            parent_root,
            state_root: B256::ZERO,
            body,
        };
        block.body.execution_payload.block_hash =
            compute_execution_block_hash(&block.body.execution_payload, block.parent_root);

        // Learn the post-state root by running the transition unchecked.
        let mut scratch = self.store.branch();
        let ctx = TransitionContext::building(consensus_time, CancellationToken::new());
        let unsigned = SignedBeaconBlock {
            message: block.clone(),
            signature: Default::default(),
        };
        self.processor
            .transition(&ctx, scratch.state_mut(), &unsigned)
            .await
            .unwrap();
        block.state_root = scratch.state().hash_tree_root().unwrap();
        scratch.discard();

        let header_signing_root = compute_signing_root(&block.header(), self.proposer_domain());
        let signature = self.key.sign(header_signing_root.as_slice()).unwrap();
        SignedBeaconBlock {
            message: block,
            signature,
        }
    }

    fn proposal(&self, block: &SignedBeaconBlock, consensus_time: u64) -> ProcessProposalRequest {
        ProcessProposalRequest {
            height: block.message.slot,
            time: consensus_time,
            proposer_address: self.proposer_address(),
            txs: vec![block.as_ssz_bytes()],
        }
    }

    fn finalize_request(
        &self,
        block: &SignedBeaconBlock,
        consensus_time: u64,
    ) -> FinalizeBlockRequest {
        FinalizeBlockRequest {
            height: block.message.slot,
            time: consensus_time,
            proposer_address: self.proposer_address(),
            txs: vec![block.as_ssz_bytes()],
        }
    }

    fn committed_root(&self) -> B256 {
        self.store.snapshot().state().hash_tree_root().unwrap()
    }
}

#[tokio::test]
async fn happy_path_accepts_and_finalizes_the_first_block() {
    let chain = TestChain::new();
    let block = chain.build_block(1, 10).await;

    let response = chain
        .service
        .process_proposal(&chain.proposal(&block, 10))
        .await
        .unwrap();
    assert_eq!(response.status, ProposalStatus::Accept);

    // Verification never commits.
    assert_eq!(chain.store.snapshot().state().slot().unwrap(), 0);

    let finalize = chain
        .service
        .finalize_block(&chain.finalize_request(&block, 10))
        .await
        .unwrap();
    assert!(finalize.validator_updates.is_empty());
    assert_eq!(chain.store.snapshot().state().slot().unwrap(), 1);
    assert_eq!(
        chain.committed_root(),
        block.message.state_root
    );

    // The post-finalization forkchoice points the EL at the new payload.
    assert_eq!(
        chain.rpc.last_forkchoice_state().unwrap().head_block_hash,
        block.message.body.execution_payload.block_hash
    );
}

#[tokio::test]
async fn state_root_mismatch_is_rejected_without_commit() {
    let chain = TestChain::new();
    let mut block = chain.build_block(1, 10).await;
    let committed = chain.committed_root();

    let mut tampered = block.message.state_root;
    tampered.0[0] ^= 0x01;
    block.message.state_root = tampered;

    let response = chain
        .service
        .process_proposal(&chain.proposal(&block, 10))
        .await
        .unwrap();
    assert_eq!(response.status, ProposalStatus::Reject);
    assert_eq!(chain.committed_root(), committed);
}

#[tokio::test]
async fn syncing_engine_blocks_a_non_optimistic_deployment() {
    let chain = TestChain::new();
    let block = chain.build_block(1, 10).await;

    chain
        .rpc
        .push_new_payload_status(PayloadStatusV1::from_status(PayloadStatus::Syncing));
    let response = chain
        .service
        .process_proposal(&chain.proposal(&block, 10))
        .await
        .unwrap();
    assert_eq!(response.status, ProposalStatus::Reject);

    // Without optimistic payload builds, finalization refuses to commit a
    // payload the EL has not validated.
    chain
        .rpc
        .push_new_payload_status(PayloadStatusV1::from_status(PayloadStatus::Syncing));
    let err = chain
        .service
        .finalize_block(&chain.finalize_request(&block, 10))
        .await
        .unwrap_err();
    assert_eq!(
        err.downcast_ref::<EngineError>(),
        Some(&EngineError::SyncingPayloadStatus)
    );
    assert_eq!(chain.store.snapshot().state().slot().unwrap(), 0);
}

#[tokio::test]
async fn syncing_engine_finalizes_under_optimistic_builds() {
    let chain = TestChain::with_optimistic_builds();
    let block = chain.build_block(1, 10).await;

    chain
        .rpc
        .push_new_payload_status(PayloadStatusV1::from_status(PayloadStatus::Syncing));
    let finalize = chain
        .service
        .finalize_block(&chain.finalize_request(&block, 10))
        .await
        .unwrap();
    assert!(finalize.validator_updates.is_empty());
    assert_eq!(chain.store.snapshot().state().slot().unwrap(), 1);
    assert_eq!(chain.committed_root(), block.message.state_root);
}

#[tokio::test]
async fn accepted_payload_status_is_swallowed_under_ssf() {
    let chain = TestChain::new();
    let block = chain.build_block(1, 10).await;

    chain
        .rpc
        .push_new_payload_status(PayloadStatusV1::from_status(PayloadStatus::Accepted));
    let response = chain
        .service
        .process_proposal(&chain.proposal(&block, 10))
        .await
        .unwrap();
    assert_eq!(response.status, ProposalStatus::Accept);
}

#[tokio::test]
async fn blob_commitment_mismatch_rejects_before_the_transition_runs() {
    let chain = TestChain::new();

    // An honest blob on an honest block...
    let settings = c_kzg::ethereum_kzg_settings(0);
    let blob_bytes = vec![0u8; 131_072];
    let blob = c_kzg::Blob::from_bytes(&blob_bytes).unwrap();
    let commitment = settings.blob_to_kzg_commitment(&blob).unwrap();
    let proof = settings
        .compute_blob_kzg_proof(&blob, &commitment.to_bytes())
        .unwrap();

    let mut block = chain.build_block(1, 10).await;
    block.message.body.blob_kzg_commitments =
        VariableList::new(vec![KZGCommitment(FixedBytes::from(*commitment.to_bytes()))])
            .unwrap();
    // Re-sign the header over the updated body.
    let signing_root = compute_signing_root(&block.message.header(), chain.proposer_domain());
    block.signature = chain.key.sign(signing_root.as_slice()).unwrap();

    let mut sidecar = block
        .blob_sidecar(
            blob_bytes.into(),
            FixedBytes::from(*proof.to_bytes()),
            0,
        )
        .unwrap();
    // ...with a commitment that does not match the body's.
    sidecar.kzg_commitment = KZGCommitment(FixedBytes::from([0xC0; 48]));

    let calls_before = chain.rpc.new_payload_calls();
    let mut request = chain.proposal(&block, 10);
    request
        .txs
        .push(BlobSidecars::new(vec![sidecar]).unwrap().as_ssz_bytes());

    let response = chain.service.process_proposal(&request).await.unwrap();
    assert_eq!(response.status, ProposalStatus::Reject);
    // The transition (and its newPayload call) never ran.
    assert_eq!(chain.rpc.new_payload_calls(), calls_before);
}

#[tokio::test]
async fn missing_or_garbage_block_rejects_without_error() {
    let chain = TestChain::new();

    let empty = ProcessProposalRequest {
        height: 1,
        time: 10,
        proposer_address: chain.proposer_address(),
        txs: vec![],
    };
    let response = chain.service.process_proposal(&empty).await.unwrap();
    assert_eq!(response.status, ProposalStatus::Reject);

    let garbage = ProcessProposalRequest {
        height: 1,
        time: 10,
        proposer_address: chain.proposer_address(),
        txs: vec![vec![0xDE, 0xAD, 0xBE, 0xEF]],
    };
    let response = chain.service.process_proposal(&garbage).await.unwrap();
    assert_eq!(response.status, ProposalStatus::Reject);
}

#[tokio::test]
async fn startup_head_sync_runs_exactly_once() {
    let chain = TestChain::new();
    let block = chain.build_block(1, 10).await;

    chain
        .service
        .process_proposal(&chain.proposal(&block, 10))
        .await
        .unwrap();
    let calls_after_first = chain.rpc.forkchoice_calls();
    assert!(calls_after_first >= 1);
    // The startup sync targeted the genesis payload hash.
    // (The first recorded forkchoice state is the startup one.)

    chain
        .service
        .process_proposal(&chain.proposal(&block, 10))
        .await
        .unwrap();
    assert_eq!(chain.rpc.forkchoice_calls(), calls_after_first);
}
