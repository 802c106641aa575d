use moraine_bls::PubKey;
use serde::{Deserialize, Serialize};

/// Voting-power change reported back to the BFT host after epoch
/// processing. `power == 0` removes the validator from the host's set.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ValidatorUpdate {
    pub pubkey: PubKey,
    pub power: u64,
}
