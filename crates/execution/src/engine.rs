use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    block_hash::{blob_versioned_hashes, compute_execution_block_hash},
    client::EngineRpc,
    error::EngineError,
    requests::{ForkchoiceResult, ForkchoiceUpdateRequest, NewPayloadRequest, PayloadEnvelope},
    rpc_types::{
        execution_payload::ExecutionPayloadV3,
        forkchoice_update::ForkchoiceUpdateResult,
        payload_status::{PayloadStatus, PayloadStatusV1},
    },
};
use alloy_primitives::B64;

/// Adapter between the state transition and the raw engine API. Classifies
/// every payload-status reply, keeps one in-flight slot per call kind, and
/// recovers from an invalid forkchoice by retargeting head to the safe hash
/// exactly once.
pub struct ExecutionEngine {
    rpc: Arc<dyn EngineRpc>,
    forkchoice_lock: Mutex<()>,
    new_payload_lock: Mutex<()>,
}

impl ExecutionEngine {
    pub fn new(rpc: Arc<dyn EngineRpc>) -> Self {
        Self {
            rpc,
            forkchoice_lock: Mutex::new(()),
            new_payload_lock: Mutex::new(()),
        }
    }

    async fn forkchoice_once(
        &self,
        request: &ForkchoiceUpdateRequest,
        cancel: &CancellationToken,
    ) -> Result<ForkchoiceUpdateResult, EngineError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(EngineError::Cancelled),
            result = self.rpc.forkchoice_updated(
                request.state,
                request.payload_attributes.clone(),
            ) => result,
        }
    }

    /// Relay the three-hash forkchoice, optionally kicking off a payload
    /// build.
    pub async fn notify_forkchoice_update(
        &self,
        request: ForkchoiceUpdateRequest,
        cancel: &CancellationToken,
    ) -> Result<ForkchoiceResult, EngineError> {
        let _slot = self.forkchoice_lock.lock().await;

        info!(
            head = %request.state.head_block_hash,
            safe = %request.state.safe_block_hash,
            finalized = %request.state.finalized_block_hash,
            has_attributes = request.payload_attributes.is_some(),
            "notifying forkchoice update"
        );

        let result = self.forkchoice_once(&request, cancel).await?;
        match result.payload_status.status {
            PayloadStatus::Valid => Ok(ForkchoiceResult {
                payload_id: result.payload_id,
                latest_valid_hash: result.payload_status.latest_valid_hash,
            }),
            PayloadStatus::Syncing | PayloadStatus::Accepted => {
                info!(
                    head = %request.state.head_block_hash,
                    "forkchoice updated with optimistic block"
                );
                Ok(ForkchoiceResult {
                    payload_id: result.payload_id,
                    latest_valid_hash: None,
                })
            }
            PayloadStatus::Invalid | PayloadStatus::InvalidBlockHash => {
                // Retarget the head to the last known-safe hash and retry
                // once. The safe hash was valid when it became safe, so a
                // second INVALID means the EL disagrees about our entire
                // chain and recovery is hopeless.
                warn!(
                    head = %request.state.head_block_hash,
                    safe = %request.state.safe_block_hash,
                    "invalid forkchoice head, retrying against the safe hash"
                );
                let mut recovery = request;
                recovery.state.head_block_hash = recovery.state.safe_block_hash;

                let retry = self.forkchoice_once(&recovery, cancel).await?;
                match retry.payload_status.status {
                    PayloadStatus::Invalid | PayloadStatus::InvalidBlockHash => {
                        error!("forkchoice recovery rejected by the execution client");
                        Err(EngineError::ForkchoiceRecoveryFailed)
                    }
                    _ => Err(EngineError::BadBlockProduced),
                }
            }
        }
    }

    /// Verify the payload's local commitments and submit it to the EL.
    pub async fn verify_and_notify_new_payload(
        &self,
        request: NewPayloadRequest,
        cancel: &CancellationToken,
    ) -> Result<(), EngineError> {
        let payload = &request.execution_payload;

        let computed_hash =
            compute_execution_block_hash(payload, request.parent_beacon_block_root);
        if computed_hash != payload.block_hash {
            warn!(
                advertised = %payload.block_hash,
                computed = %computed_hash,
                "payload block hash mismatch"
            );
            return Err(EngineError::InvalidPayloadBlockHash);
        }

        if blob_versioned_hashes(payload)? != request.versioned_hashes {
            return Err(EngineError::InvalidVersionedHashes);
        }

        // The block may already be known, e.g. replayed during a restart.
        if request.skip_if_exists {
            if let Ok(Some(_)) = self.rpc.block_by_hash(payload.block_hash).await {
                info!(block_hash = %payload.block_hash, "skipping new payload, block already available");
                return Ok(());
            }
        }

        let _slot = self.new_payload_lock.lock().await;
        let status: PayloadStatusV1 = tokio::select! {
            _ = cancel.cancelled() => return Err(EngineError::Cancelled),
            result = self.rpc.new_payload(
                ExecutionPayloadV3::from(payload),
                request.versioned_hashes.clone(),
                request.parent_beacon_block_root,
            ) => result?,
        };

        match status.status {
            PayloadStatus::Valid => Ok(()),
            PayloadStatus::Accepted | PayloadStatus::Syncing => {
                info!(
                    payload_block_hash = %payload.block_hash,
                    parent_hash = %payload.parent_hash,
                    status = ?status.status,
                    "new payload called with optimistic block"
                );
                if request.optimistic {
                    return Ok(());
                }
                match status.status {
                    PayloadStatus::Accepted => Err(EngineError::AcceptedPayloadStatus),
                    _ => Err(EngineError::SyncingPayloadStatus),
                }
            }
            PayloadStatus::Invalid | PayloadStatus::InvalidBlockHash => {
                error!(
                    last_valid_hash = ?status.latest_valid_hash,
                    validation_error = ?status.validation_error,
                    "invalid payload status"
                );
                Err(EngineError::BadBlockProduced)
            }
        }
    }

    /// Fetch a payload previously requested through payload attributes.
    pub async fn get_payload(
        &self,
        payload_id: B64,
        cancel: &CancellationToken,
    ) -> Result<PayloadEnvelope, EngineError> {
        let payload = tokio::select! {
            _ = cancel.cancelled() => return Err(EngineError::Cancelled),
            result = self.rpc.get_payload(payload_id) => result?,
        };
        Ok(PayloadEnvelope {
            execution_payload: payload.execution_payload.try_into_payload()?,
            blobs_bundle: payload.blobs_bundle,
            block_value: payload.block_value,
        })
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::B256;

    use super::*;
    use crate::{
        mock::MockEngineRpc,
        rpc_types::forkchoice_update::ForkchoiceStateV1,
    };
    use moraine_consensus::execution_payload::ExecutionPayload;

    fn sealed_payload(parent_beacon_block_root: B256) -> ExecutionPayload {
        let mut payload = ExecutionPayload::default();
        payload.block_hash = compute_execution_block_hash(&payload, parent_beacon_block_root);
        payload
    }

    fn new_payload_request(optimistic: bool) -> NewPayloadRequest {
        let parent_root = B256::repeat_byte(7);
        NewPayloadRequest {
            execution_payload: sealed_payload(parent_root),
            versioned_hashes: vec![],
            parent_beacon_block_root: parent_root,
            optimistic,
            skip_if_exists: false,
        }
    }

    fn forkchoice_request() -> ForkchoiceUpdateRequest {
        ForkchoiceUpdateRequest {
            state: ForkchoiceStateV1 {
                head_block_hash: B256::repeat_byte(1),
                safe_block_hash: B256::repeat_byte(2),
                finalized_block_hash: B256::repeat_byte(2),
            },
            payload_attributes: None,
        }
    }

    #[tokio::test]
    async fn new_payload_status_classification() {
        let cancel = CancellationToken::new();

        let cases = [
            (PayloadStatus::Valid, false, Ok(())),
            (
                PayloadStatus::Accepted,
                false,
                Err(EngineError::AcceptedPayloadStatus),
            ),
            (
                PayloadStatus::Syncing,
                false,
                Err(EngineError::SyncingPayloadStatus),
            ),
            (PayloadStatus::Accepted, true, Ok(())),
            (PayloadStatus::Syncing, true, Ok(())),
            (
                PayloadStatus::Invalid,
                false,
                Err(EngineError::BadBlockProduced),
            ),
            (
                PayloadStatus::InvalidBlockHash,
                false,
                Err(EngineError::BadBlockProduced),
            ),
        ];

        for (status, optimistic, expected) in cases {
            let rpc = Arc::new(MockEngineRpc::new());
            rpc.push_new_payload_status(PayloadStatusV1::from_status(status));
            let engine = ExecutionEngine::new(rpc);

            let outcome = engine
                .verify_and_notify_new_payload(new_payload_request(optimistic), &cancel)
                .await;
            assert_eq!(outcome, expected, "status {status:?} optimistic {optimistic}");
        }
    }

    #[tokio::test]
    async fn new_payload_rejects_tampered_block_hash() {
        let cancel = CancellationToken::new();
        let rpc = Arc::new(MockEngineRpc::new());
        let engine = ExecutionEngine::new(rpc.clone());

        let mut request = new_payload_request(false);
        request.execution_payload.block_hash = B256::repeat_byte(0xBE);

        assert_eq!(
            engine
                .verify_and_notify_new_payload(request, &cancel)
                .await,
            Err(EngineError::InvalidPayloadBlockHash)
        );
        assert_eq!(rpc.new_payload_calls(), 0);
    }

    #[tokio::test]
    async fn new_payload_skips_known_blocks() {
        let cancel = CancellationToken::new();
        let rpc = Arc::new(MockEngineRpc::new());
        let mut request = new_payload_request(false);
        request.skip_if_exists = true;
        rpc.insert_known_block(request.execution_payload.block_hash);
        let engine = ExecutionEngine::new(rpc.clone());

        assert_eq!(
            engine
                .verify_and_notify_new_payload(request, &cancel)
                .await,
            Ok(())
        );
        assert_eq!(rpc.new_payload_calls(), 0);
    }

    #[tokio::test]
    async fn forkchoice_valid_passes_payload_id_through() {
        let cancel = CancellationToken::new();
        let rpc = Arc::new(MockEngineRpc::new());
        rpc.set_next_payload_id(B64::from([1, 2, 3, 4, 5, 6, 7, 8]));
        rpc.push_forkchoice_status(PayloadStatusV1::valid());
        let engine = ExecutionEngine::new(rpc);

        let result = engine
            .notify_forkchoice_update(forkchoice_request(), &cancel)
            .await
            .unwrap();
        assert_eq!(result.payload_id, Some(B64::from([1, 2, 3, 4, 5, 6, 7, 8])));
    }

    #[tokio::test]
    async fn forkchoice_syncing_is_optimistic_without_error() {
        let cancel = CancellationToken::new();
        let rpc = Arc::new(MockEngineRpc::new());
        rpc.push_forkchoice_status(PayloadStatusV1::from_status(PayloadStatus::Syncing));
        let engine = ExecutionEngine::new(rpc);

        let result = engine
            .notify_forkchoice_update(forkchoice_request(), &cancel)
            .await
            .unwrap();
        assert_eq!(result.latest_valid_hash, None);
    }

    #[tokio::test]
    async fn forkchoice_invalid_recovers_once_then_reports_bad_block() {
        let cancel = CancellationToken::new();
        let rpc = Arc::new(MockEngineRpc::new());
        rpc.push_forkchoice_status(PayloadStatusV1::from_status(PayloadStatus::Invalid));
        rpc.push_forkchoice_status(PayloadStatusV1::valid());
        let engine = ExecutionEngine::new(rpc.clone());

        assert_eq!(
            engine
                .notify_forkchoice_update(forkchoice_request(), &cancel)
                .await,
            Err(EngineError::BadBlockProduced)
        );
        // The retry retargeted head to the safe hash.
        assert_eq!(
            rpc.last_forkchoice_state().unwrap().head_block_hash,
            B256::repeat_byte(2)
        );
    }

    #[tokio::test]
    async fn forkchoice_double_invalid_is_fatal() {
        let cancel = CancellationToken::new();
        let rpc = Arc::new(MockEngineRpc::new());
        rpc.push_forkchoice_status(PayloadStatusV1::from_status(PayloadStatus::Invalid));
        rpc.push_forkchoice_status(PayloadStatusV1::from_status(
            PayloadStatus::InvalidBlockHash,
        ));
        let engine = ExecutionEngine::new(rpc);

        let outcome = engine
            .notify_forkchoice_update(forkchoice_request(), &cancel)
            .await;
        assert_eq!(outcome, Err(EngineError::ForkchoiceRecoveryFailed));
        assert!(outcome.unwrap_err().is_fatal());
    }

    #[tokio::test]
    async fn cancelled_token_aborts_the_call() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let rpc = Arc::new(MockEngineRpc::new());
        rpc.push_new_payload_status(PayloadStatusV1::valid());
        let engine = ExecutionEngine::new(rpc);

        assert_eq!(
            engine
                .verify_and_notify_new_payload(new_payload_request(false), &cancel)
                .await,
            Err(EngineError::Cancelled)
        );
    }
}
