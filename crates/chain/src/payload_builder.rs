use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use alloy_primitives::{Address, B64, B256};
use moraine_consensus::withdrawal::Withdrawal;
use moraine_execution::{
    EngineError, ExecutionEngine, ForkchoiceUpdateRequest, PayloadEnvelope,
    rpc_types::{
        execution_payload::WithdrawalV1,
        forkchoice_update::{ForkchoiceStateV1, PayloadAttributesV3},
    },
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Builds never accumulate without bound: older slots are superseded and
/// the map is capped.
const MAX_PENDING_BUILDS: usize = 4;

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct PayloadBuilderConfig {
    pub enabled: bool,
    pub suggested_fee_recipient: Address,
}

impl Default for PayloadBuilderConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            suggested_fee_recipient: Address::ZERO,
        }
    }
}

/// Everything a payload build needs, captured synchronously from a state
/// view before the background task starts. Background tasks never touch
/// the store.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub slot: u64,
    /// EL block hash the build extends.
    pub head_block_hash: B256,
    /// Beacon block root the payload must commit to.
    pub parent_block_root: B256,
    pub timestamp: u64,
    pub prev_randao: B256,
    pub withdrawals: Vec<Withdrawal>,
}

/// Requests optimistic payload builds from the EL and keeps the resulting
/// payload ids keyed by `(slot, parent_block_root)`. A newer slot
/// supersedes older pending work; late results are dropped by key miss.
pub struct PayloadBuilder {
    engine: Arc<ExecutionEngine>,
    config: PayloadBuilderConfig,
    pending: Mutex<BTreeMap<(u64, B256), B64>>,
}

impl PayloadBuilder {
    pub fn new(engine: Arc<ExecutionEngine>, config: PayloadBuilderConfig) -> Self {
        Self {
            engine,
            config,
            pending: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    /// Ask the EL to start building and remember the returned payload id.
    pub async fn request_payload(
        &self,
        request: BuildRequest,
        cancel: &CancellationToken,
    ) -> Result<Option<B64>, EngineError> {
        let payload_attributes = PayloadAttributesV3 {
            timestamp: request.timestamp,
            prev_randao: request.prev_randao,
            suggested_fee_recipient: self.config.suggested_fee_recipient,
            withdrawals: request.withdrawals.iter().map(WithdrawalV1::from).collect(),
            parent_beacon_block_root: request.parent_block_root,
        };

        let result = self
            .engine
            .notify_forkchoice_update(
                ForkchoiceUpdateRequest {
                    state: ForkchoiceStateV1::from_single_hash(request.head_block_hash),
                    payload_attributes: Some(payload_attributes),
                },
                cancel,
            )
            .await?;

        if let Some(payload_id) = result.payload_id {
            self.remember(request.slot, request.parent_block_root, payload_id);
        }
        Ok(result.payload_id)
    }

    /// Spawn a build in the background. Failures are logged, never fatal:
    /// a missing optimistic payload only costs proposal latency later.
    pub fn spawn_build(self: &Arc<Self>, request: BuildRequest, cancel: CancellationToken) {
        if !self.enabled() {
            return;
        }
        let builder = self.clone();
        tokio::spawn(async move {
            let slot = request.slot;
            match builder.request_payload(request, &cancel).await {
                Ok(Some(payload_id)) => {
                    debug!(slot, %payload_id, "optimistic payload build started")
                }
                Ok(None) => warn!(slot, "engine accepted forkchoice but returned no payload id"),
                Err(EngineError::Cancelled) => {}
                Err(err) => warn!(slot, %err, "optimistic payload build failed"),
            }
        });
    }

    /// Retrieve a payload built earlier for `(slot, parent_block_root)`.
    pub async fn get_built_payload(
        &self,
        slot: u64,
        parent_block_root: B256,
        cancel: &CancellationToken,
    ) -> Result<Option<PayloadEnvelope>, EngineError> {
        let payload_id = {
            let mut pending = self.pending.lock().expect("builder lock poisoned");
            pending.remove(&(slot, parent_block_root))
        };
        match payload_id {
            Some(payload_id) => Ok(Some(self.engine.get_payload(payload_id, cancel).await?)),
            None => Ok(None),
        }
    }

    pub fn has_pending_build(&self, slot: u64, parent_block_root: B256) -> bool {
        self.pending
            .lock()
            .expect("builder lock poisoned")
            .contains_key(&(slot, parent_block_root))
    }

    fn remember(&self, slot: u64, parent_block_root: B256, payload_id: B64) {
        let mut pending = self.pending.lock().expect("builder lock poisoned");
        pending.insert((slot, parent_block_root), payload_id);
        // Drop superseded work: keep only the newest few slots.
        while pending.len() > MAX_PENDING_BUILDS {
            let oldest = *pending.keys().next().expect("non-empty map");
            pending.remove(&oldest);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> PayloadBuilder {
        let rpc = Arc::new(moraine_execution::mock::MockEngineRpc::new());
        PayloadBuilder::new(
            Arc::new(ExecutionEngine::new(rpc)),
            PayloadBuilderConfig {
                enabled: true,
                suggested_fee_recipient: Address::ZERO,
            },
        )
    }

    #[test]
    fn newer_slots_supersede_older_pending_builds() {
        let builder = builder();
        for slot in 0..10u64 {
            builder.remember(slot, B256::repeat_byte(slot as u8), B64::ZERO);
        }

        // Only the newest MAX_PENDING_BUILDS survive.
        assert!(!builder.has_pending_build(0, B256::repeat_byte(0)));
        assert!(!builder.has_pending_build(5, B256::repeat_byte(5)));
        for slot in 6..10u64 {
            assert!(builder.has_pending_build(slot, B256::repeat_byte(slot as u8)));
        }
    }

    #[tokio::test]
    async fn get_built_payload_is_single_shot() {
        let builder = builder();
        let cancel = CancellationToken::new();
        builder.remember(3, B256::repeat_byte(3), B64::ZERO);

        // The mock returns no payload for an unknown id, so only the key
        // lookup semantics are observed here.
        assert!(builder.has_pending_build(3, B256::repeat_byte(3)));
        let _ = builder.get_built_payload(3, B256::repeat_byte(3), &cancel).await;
        assert!(!builder.has_pending_build(3, B256::repeat_byte(3)));
    }
}
