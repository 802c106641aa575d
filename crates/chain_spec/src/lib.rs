use alloy_primitives::aliases::B32;
use serde::Deserialize;

/// Names of the protocol rule sets a chain can run under. The block body
/// layout is shared across the two, so the name only drives decoding and
/// rule gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForkName {
    Deneb,
    Deneb1,
}

/// A scheduled fork activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForkScheduleEntry {
    pub name: ForkName,
    pub version: B32,
    pub epoch: u64,
}

/// Behavioural constants of a chain. One instance is built at construction
/// time and shared (`Arc`) by every component; nothing reads global state.
///
/// Serialization-level sizes (historical vector lengths, registry limits)
/// are compile-time `typenum` parameters of the SSZ containers and live in
/// `moraine-consensus::constants`; this struct only carries the knobs that
/// may differ between networks without changing the state shape.
#[derive(Debug, Clone)]
pub struct ChainSpec {
    /// EL chain id, also used to gate legacy-network quirks.
    pub chain_id: u64,

    // Time
    pub seconds_per_slot: u64,
    pub slots_per_epoch: u64,
    pub epochs_per_eth1_voting_period: u64,

    // Forks
    pub genesis_fork_version: B32,
    pub fork_schedule: Vec<ForkScheduleEntry>,

    // Validator economics
    pub max_effective_balance: u64,
    pub effective_balance_increment: u64,
    pub ejection_balance: u64,
    pub hysteresis_quotient: u64,
    pub hysteresis_downward_multiplier: u64,
    pub hysteresis_upward_multiplier: u64,

    // Registry churn
    pub min_per_epoch_churn_limit: u64,
    pub churn_limit_quotient: u64,
    pub max_per_epoch_activation_churn_limit: u64,
    pub max_seed_lookahead: u64,
    pub min_validator_withdrawability_delay: u64,
    pub min_epochs_before_voluntary_exit: u64,

    // Slashing
    pub proportional_slashing_multiplier: u64,
    pub min_slashing_penalty_quotient: u64,
    pub whistleblower_reward_quotient: u64,
    pub proposer_reward_quotient: u64,

    // Block limits
    pub max_deposits_per_block: u64,
    pub max_withdrawals_per_payload: u64,
    pub max_validators_per_withdrawals_sweep: u64,
    pub max_blobs_per_block: u64,

    // Execution layer
    pub eth1_follow_distance: u64,
    pub max_payload_timestamp_drift: u64,
}

/// Chain id of the legacy public testnet whose validator registration path
/// derived withdrawal credentials from the pubkey instead of trusting the
/// deposit. Kept alive behind [`ChainSpec::is_legacy_testnet`].
pub const LEGACY_TESTNET_CHAIN_ID: u64 = 80084;

impl ChainSpec {
    pub fn mainnet() -> Self {
        Self {
            chain_id: 80094,
            seconds_per_slot: 12,
            slots_per_epoch: 32,
            epochs_per_eth1_voting_period: 64,
            genesis_fork_version: B32::new([0x04, 0x00, 0x00, 0x00]),
            fork_schedule: vec![ForkScheduleEntry {
                name: ForkName::Deneb1,
                version: B32::new([0x04, 0x01, 0x00, 0x00]),
                epoch: 64,
            }],
            max_effective_balance: 32_000_000_000,
            effective_balance_increment: 1_000_000_000,
            ejection_balance: 16_000_000_000,
            hysteresis_quotient: 4,
            hysteresis_downward_multiplier: 1,
            hysteresis_upward_multiplier: 5,
            min_per_epoch_churn_limit: 4,
            churn_limit_quotient: 65_536,
            max_per_epoch_activation_churn_limit: 8,
            max_seed_lookahead: 4,
            min_validator_withdrawability_delay: 256,
            min_epochs_before_voluntary_exit: 256,
            proportional_slashing_multiplier: 3,
            min_slashing_penalty_quotient: 32,
            whistleblower_reward_quotient: 512,
            proposer_reward_quotient: 8,
            max_deposits_per_block: 16,
            max_withdrawals_per_payload: 16,
            max_validators_per_withdrawals_sweep: 16_384,
            max_blobs_per_block: 6,
            eth1_follow_distance: 1,
            max_payload_timestamp_drift: 2,
        }
    }

    pub fn legacy_testnet() -> Self {
        Self {
            chain_id: LEGACY_TESTNET_CHAIN_ID,
            ..Self::mainnet()
        }
    }

    /// Small numbers so unit tests cross epoch and voting-period boundaries
    /// in a handful of slots. The SSZ state shape is unchanged.
    pub fn minimal() -> Self {
        Self {
            chain_id: 1337,
            seconds_per_slot: 2,
            slots_per_epoch: 4,
            epochs_per_eth1_voting_period: 2,
            min_validator_withdrawability_delay: 2,
            min_epochs_before_voluntary_exit: 2,
            max_validators_per_withdrawals_sweep: 16,
            ..Self::mainnet()
        }
    }

    pub fn is_legacy_testnet(&self) -> bool {
        self.chain_id == LEGACY_TESTNET_CHAIN_ID
    }

    // Epoch math. All callers pass raw u64 slots; an epoch is
    // `slots_per_epoch` slots, integer division throughout.

    pub fn epoch_at_slot(&self, slot: u64) -> u64 {
        slot / self.slots_per_epoch
    }

    pub fn start_slot_of_epoch(&self, epoch: u64) -> u64 {
        epoch * self.slots_per_epoch
    }

    pub fn is_last_slot_of_epoch(&self, slot: u64) -> bool {
        (slot + 1) % self.slots_per_epoch == 0
    }

    /// Epoch at which activations and exits initiated in `epoch` take effect.
    pub fn activation_exit_epoch(&self, epoch: u64) -> u64 {
        epoch + 1 + self.max_seed_lookahead
    }

    pub fn slots_per_eth1_voting_period(&self) -> u64 {
        self.epochs_per_eth1_voting_period * self.slots_per_epoch
    }

    /// Fork version in force at `epoch`.
    pub fn fork_version_at_epoch(&self, epoch: u64) -> B32 {
        self.fork_schedule
            .iter()
            .rev()
            .find(|entry| entry.epoch <= epoch)
            .map(|entry| entry.version)
            .unwrap_or(self.genesis_fork_version)
    }

    pub fn fork_name_at_epoch(&self, epoch: u64) -> ForkName {
        self.fork_schedule
            .iter()
            .rev()
            .find(|entry| entry.epoch <= epoch)
            .map(|entry| entry.name)
            .unwrap_or(ForkName::Deneb)
    }

    /// Validator churn limit for an active-set size.
    pub fn churn_limit(&self, active_validator_count: u64) -> u64 {
        std::cmp::max(
            self.min_per_epoch_churn_limit,
            active_validator_count / self.churn_limit_quotient,
        )
    }

    pub fn activation_churn_limit(&self, active_validator_count: u64) -> u64 {
        std::cmp::min(
            self.max_per_epoch_activation_churn_limit,
            self.churn_limit(active_validator_count),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fork_version_follows_schedule() {
        let spec = ChainSpec::mainnet();
        assert_eq!(spec.fork_version_at_epoch(0), spec.genesis_fork_version);
        assert_eq!(spec.fork_version_at_epoch(63), spec.genesis_fork_version);
        assert_eq!(
            spec.fork_version_at_epoch(64),
            B32::new([0x04, 0x01, 0x00, 0x00])
        );
        assert_eq!(spec.fork_name_at_epoch(0), ForkName::Deneb);
        assert_eq!(spec.fork_name_at_epoch(1_000), ForkName::Deneb1);
    }

    #[test]
    fn epoch_math() {
        let spec = ChainSpec::minimal();
        assert_eq!(spec.epoch_at_slot(0), 0);
        assert_eq!(spec.epoch_at_slot(7), 1);
        assert_eq!(spec.start_slot_of_epoch(2), 8);
        assert!(spec.is_last_slot_of_epoch(3));
        assert!(!spec.is_last_slot_of_epoch(4));
    }

    #[test]
    fn churn_has_floor() {
        let spec = ChainSpec::mainnet();
        assert_eq!(spec.churn_limit(10), spec.min_per_epoch_churn_limit);
        assert_eq!(spec.churn_limit(65_536 * 8), 8);
    }
}
