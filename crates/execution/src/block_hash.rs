//! Local commitments of an execution payload: the EL block hash recomputed
//! from the payload fields, and the versioned hashes carried by its blob
//! transactions. Both are checked before a payload is ever sent to the EL.

use alloy_consensus::{EMPTY_OMMER_ROOT_HASH, Header, Transaction, TxEnvelope, proofs};
use alloy_eips::{eip2718::Decodable2718, eip4895};
use alloy_primitives::{B64, B256, Bloom, Bytes};

use crate::error::EngineError;
use moraine_consensus::execution_payload::ExecutionPayload;

const EIP4844_TX_TYPE: u8 = 0x03;

/// Rebuild the EL block header the payload commits to and hash it.
pub fn compute_execution_block_hash(
    payload: &ExecutionPayload,
    parent_beacon_block_root: B256,
) -> B256 {
    let transactions_root = proofs::ordered_trie_root_with_encoder(
        &payload.transactions.iter().collect::<Vec<_>>(),
        |tx, buf| buf.extend_from_slice(tx.iter().as_slice()),
    );

    let withdrawals = payload
        .withdrawals
        .iter()
        .map(|withdrawal| eip4895::Withdrawal {
            index: withdrawal.index,
            validator_index: withdrawal.validator_index,
            address: withdrawal.address,
            amount: withdrawal.amount,
        })
        .collect::<Vec<_>>();
    let withdrawals_root = proofs::calculate_withdrawals_root(&withdrawals);

    let header = Header {
        parent_hash: payload.parent_hash,
        ommers_hash: EMPTY_OMMER_ROOT_HASH,
        beneficiary: payload.fee_recipient,
        state_root: payload.state_root,
        transactions_root,
        receipts_root: payload.receipts_root,
        logs_bloom: Bloom::from_slice(payload.logs_bloom.iter().as_slice()),
        difficulty: Default::default(),
        number: payload.block_number,
        gas_limit: payload.gas_limit,
        gas_used: payload.gas_used,
        timestamp: payload.timestamp,
        extra_data: Bytes::copy_from_slice(payload.extra_data.iter().as_slice()),
        mix_hash: payload.prev_randao,
        nonce: B64::ZERO,
        base_fee_per_gas: Some(payload.base_fee_per_gas.saturating_to()),
        withdrawals_root: Some(withdrawals_root),
        blob_gas_used: Some(payload.blob_gas_used),
        excess_blob_gas: Some(payload.excess_blob_gas),
        parent_beacon_block_root: Some(parent_beacon_block_root),
        requests_hash: None,
    };

    header.hash_slow()
}

/// Versioned hashes referenced by the payload's blob transactions, in
/// transaction order.
pub fn blob_versioned_hashes(payload: &ExecutionPayload) -> Result<Vec<B256>, EngineError> {
    let mut hashes = vec![];
    for tx in payload.transactions.iter() {
        if tx.first() != Some(&EIP4844_TX_TYPE) {
            continue;
        }
        let envelope = TxEnvelope::decode_2718(&mut tx.iter().as_slice())
            .map_err(|err| EngineError::InvalidPayload(format!("undecodable blob tx: {err}")))?;
        if let Some(tx_hashes) = envelope.blob_versioned_hashes() {
            hashes.extend_from_slice(tx_hashes);
        }
    }
    Ok(hashes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_hash_commits_to_parent_beacon_root() {
        let payload = ExecutionPayload::default();
        let hash_a = compute_execution_block_hash(&payload, B256::ZERO);
        let hash_b = compute_execution_block_hash(&payload, B256::repeat_byte(1));
        assert_ne!(hash_a, hash_b);
        assert_eq!(
            hash_a,
            compute_execution_block_hash(&payload, B256::ZERO)
        );
    }

    #[test]
    fn non_blob_transactions_carry_no_versioned_hashes() {
        let mut payload = ExecutionPayload::default();
        payload.transactions = ssz_types::VariableList::new(vec![
            // Legacy-style opaque bytes, not an EIP-4844 envelope.
            ssz_types::VariableList::new(vec![0xF8, 0x01, 0x02]).unwrap(),
        ])
        .unwrap();
        assert!(blob_versioned_hashes(&payload).unwrap().is_empty());
    }

    #[test]
    fn garbage_blob_transaction_is_rejected() {
        let mut payload = ExecutionPayload::default();
        payload.transactions = ssz_types::VariableList::new(vec![
            ssz_types::VariableList::new(vec![0x03, 0xFF]).unwrap(),
        ])
        .unwrap();
        assert!(matches!(
            blob_versioned_hashes(&payload),
            Err(EngineError::InvalidPayload(_))
        ));
    }
}
