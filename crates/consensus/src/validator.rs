use alloy_primitives::B256;
use moraine_bls::PubKey;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash_derive::TreeHash;

use crate::{
    constants::{ETH1_ADDRESS_WITHDRAWAL_PREFIX, FAR_FUTURE_EPOCH},
    misc::consensus_address,
};

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct Validator {
    pub pubkey: PubKey,

    /// Commitment to pubkey for withdrawals
    pub withdrawal_credentials: B256,

    /// Balance at stake
    #[serde(with = "serde_utils::quoted_u64")]
    pub effective_balance: u64,
    pub slashed: bool,

    /// When criteria for activation were met
    #[serde(with = "serde_utils::quoted_u64")]
    pub activation_eligibility_epoch: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub activation_epoch: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub exit_epoch: u64,

    /// When validator can withdraw funds
    #[serde(with = "serde_utils::quoted_u64")]
    pub withdrawable_epoch: u64,
}

impl Validator {
    pub fn is_active_validator(&self, epoch: u64) -> bool {
        self.activation_epoch <= epoch && epoch < self.exit_epoch
    }

    pub fn is_slashable_validator(&self, epoch: u64) -> bool {
        !self.slashed && self.activation_epoch <= epoch && epoch < self.withdrawable_epoch
    }

    /// Check if ``validator`` has an 0x01 prefixed "eth1" withdrawal
    /// credential.
    pub fn has_eth1_withdrawal_credential(&self) -> bool {
        &self.withdrawal_credentials[..1] == ETH1_ADDRESS_WITHDRAWAL_PREFIX
    }

    /// Check if ``validator`` is fully withdrawable.
    pub fn is_fully_withdrawable_validator(&self, balance: u64, epoch: u64) -> bool {
        self.has_eth1_withdrawal_credential() && self.withdrawable_epoch <= epoch && balance > 0
    }

    /// Check if ``validator`` is partially withdrawable.
    pub fn is_partially_withdrawable_validator(
        &self,
        balance: u64,
        max_effective_balance: u64,
    ) -> bool {
        self.has_eth1_withdrawal_credential()
            && self.effective_balance == max_effective_balance
            && balance > max_effective_balance
    }

    /// Check if ``validator`` may be placed into the activation queue.
    pub fn is_eligible_for_activation_queue(&self, max_effective_balance: u64) -> bool {
        self.activation_eligibility_epoch == FAR_FUTURE_EPOCH
            && self.effective_balance == max_effective_balance
    }

    /// BFT-layer address the host knows this validator by.
    pub fn consensus_address(&self) -> [u8; 20] {
        consensus_address(self.pubkey.to_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator(activation_epoch: u64, exit_epoch: u64) -> Validator {
        Validator {
            pubkey: PubKey::default(),
            withdrawal_credentials: B256::ZERO,
            effective_balance: 32_000_000_000,
            slashed: false,
            activation_eligibility_epoch: 0,
            activation_epoch,
            exit_epoch,
            withdrawable_epoch: FAR_FUTURE_EPOCH,
        }
    }

    #[test]
    fn activation_window() {
        let v = validator(2, 10);
        assert!(!v.is_active_validator(1));
        assert!(v.is_active_validator(2));
        assert!(v.is_active_validator(9));
        assert!(!v.is_active_validator(10));
    }

    #[test]
    fn slashed_validator_is_not_slashable_twice() {
        let mut v = validator(0, FAR_FUTURE_EPOCH);
        assert!(v.is_slashable_validator(1));
        v.slashed = true;
        assert!(!v.is_slashable_validator(1));
    }
}
