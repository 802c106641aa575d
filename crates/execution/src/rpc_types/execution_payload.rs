use alloy_primitives::{Address, B256, Bytes, U256};
use serde::{Deserialize, Serialize};
use ssz_types::{FixedVector, VariableList};

use crate::error::EngineError;
use moraine_consensus::{execution_payload::ExecutionPayload, withdrawal::Withdrawal};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalV1 {
    #[serde(with = "serde_utils::u64_hex_be")]
    pub index: u64,
    #[serde(with = "serde_utils::u64_hex_be")]
    pub validator_index: u64,
    pub address: Address,
    #[serde(with = "serde_utils::u64_hex_be")]
    pub amount: u64,
}

impl From<&Withdrawal> for WithdrawalV1 {
    fn from(withdrawal: &Withdrawal) -> Self {
        Self {
            index: withdrawal.index,
            validator_index: withdrawal.validator_index,
            address: withdrawal.address,
            amount: withdrawal.amount,
        }
    }
}

impl From<&WithdrawalV1> for Withdrawal {
    fn from(withdrawal: &WithdrawalV1) -> Self {
        Self {
            index: withdrawal.index,
            validator_index: withdrawal.validator_index,
            address: withdrawal.address,
            amount: withdrawal.amount,
        }
    }
}

/// JSON wire form of an execution payload, quantities hex-encoded per the
/// engine API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPayloadV3 {
    pub parent_hash: B256,
    pub fee_recipient: Address,
    pub state_root: B256,
    pub receipts_root: B256,
    pub logs_bloom: Bytes,
    pub prev_randao: B256,
    #[serde(with = "serde_utils::u64_hex_be")]
    pub block_number: u64,
    #[serde(with = "serde_utils::u64_hex_be")]
    pub gas_limit: u64,
    #[serde(with = "serde_utils::u64_hex_be")]
    pub gas_used: u64,
    #[serde(with = "serde_utils::u64_hex_be")]
    pub timestamp: u64,
    pub extra_data: Bytes,
    pub base_fee_per_gas: U256,
    pub block_hash: B256,
    pub transactions: Vec<Bytes>,
    pub withdrawals: Vec<WithdrawalV1>,
    #[serde(with = "serde_utils::u64_hex_be")]
    pub blob_gas_used: u64,
    #[serde(with = "serde_utils::u64_hex_be")]
    pub excess_blob_gas: u64,
}

impl From<&ExecutionPayload> for ExecutionPayloadV3 {
    fn from(payload: &ExecutionPayload) -> Self {
        Self {
            parent_hash: payload.parent_hash,
            fee_recipient: payload.fee_recipient,
            state_root: payload.state_root,
            receipts_root: payload.receipts_root,
            logs_bloom: Bytes::copy_from_slice(payload.logs_bloom.iter().as_slice()),
            prev_randao: payload.prev_randao,
            block_number: payload.block_number,
            gas_limit: payload.gas_limit,
            gas_used: payload.gas_used,
            timestamp: payload.timestamp,
            extra_data: Bytes::copy_from_slice(payload.extra_data.iter().as_slice()),
            base_fee_per_gas: payload.base_fee_per_gas,
            block_hash: payload.block_hash,
            transactions: payload
                .transactions
                .iter()
                .map(|tx| Bytes::copy_from_slice(tx.iter().as_slice()))
                .collect(),
            withdrawals: payload.withdrawals.iter().map(WithdrawalV1::from).collect(),
            blob_gas_used: payload.blob_gas_used,
            excess_blob_gas: payload.excess_blob_gas,
        }
    }
}

impl ExecutionPayloadV3 {
    /// Back into the SSZ payload the consensus types carry. Fails if the EL
    /// reply overflows the consensus list bounds.
    pub fn try_into_payload(self) -> Result<ExecutionPayload, EngineError> {
        let transactions = self
            .transactions
            .iter()
            .map(|tx| {
                VariableList::new(tx.to_vec())
                    .map_err(|_| EngineError::InvalidPayload("transaction too large".to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ExecutionPayload {
            parent_hash: self.parent_hash,
            fee_recipient: self.fee_recipient,
            state_root: self.state_root,
            receipts_root: self.receipts_root,
            logs_bloom: FixedVector::new(self.logs_bloom.to_vec())
                .map_err(|_| EngineError::InvalidPayload("malformed logs bloom".to_string()))?,
            prev_randao: self.prev_randao,
            block_number: self.block_number,
            gas_limit: self.gas_limit,
            gas_used: self.gas_used,
            timestamp: self.timestamp,
            extra_data: VariableList::new(self.extra_data.to_vec())
                .map_err(|_| EngineError::InvalidPayload("extra data too large".to_string()))?,
            base_fee_per_gas: self.base_fee_per_gas,
            block_hash: self.block_hash,
            transactions: VariableList::new(transactions)
                .map_err(|_| EngineError::InvalidPayload("too many transactions".to_string()))?,
            withdrawals: VariableList::new(
                self.withdrawals.iter().map(Withdrawal::from).collect(),
            )
            .map_err(|_| EngineError::InvalidPayload("too many withdrawals".to_string()))?,
            blob_gas_used: self.blob_gas_used,
            excess_blob_gas: self.excess_blob_gas,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_roundtrip_preserves_payload() {
        let mut payload = ExecutionPayload::default();
        payload.block_number = 9;
        payload.base_fee_per_gas = U256::from(7);
        payload.transactions = VariableList::new(vec![
            VariableList::new(vec![0x03, 0x01, 0x02]).unwrap(),
        ])
        .unwrap();

        let wire = ExecutionPayloadV3::from(&payload);
        assert_eq!(wire.transactions.len(), 1);
        let back = wire.try_into_payload().unwrap();
        assert_eq!(back, payload);
    }
}
