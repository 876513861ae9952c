use crate::{Epoch, Slot};
use serde_derive::{Deserialize, Serialize};

/// Chain-level constants the fork-choice core depends on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainSpec {
    pub slots_per_epoch: u64,
    pub seconds_per_slot: u64,
    pub genesis_slot: Slot,
    pub far_future_epoch: Epoch,
    pub max_effective_balance: u64,
}

impl ChainSpec {
    /// The mainnet configuration.
    pub fn mainnet() -> Self {
        Self {
            slots_per_epoch: 32,
            seconds_per_slot: 12,
            genesis_slot: Slot::new(0),
            far_future_epoch: Epoch::max_value(),
            max_effective_balance: 32_000_000_000,
        }
    }

    /// A small configuration for fast tests: eight slots per epoch, six
    /// seconds per slot.
    pub fn minimal() -> Self {
        Self {
            slots_per_epoch: 8,
            seconds_per_slot: 6,
            ..Self::mainnet()
        }
    }
}

impl Default for ChainSpec {
    fn default() -> Self {
        Self::mainnet()
    }
}
