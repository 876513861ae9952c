//! The `Slot` and `Epoch` types are defined as new types over u64 to enforce
//! type-safety between the two units of time.
//!
//! All math operations on `Slot` and `Epoch` are saturating, they never wrap.

use serde_derive::{Deserialize, Serialize};

#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slot(u64);

#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Epoch(u64);

impl_common!(Slot);
impl_common!(Epoch);

impl Slot {
    /// The epoch this slot belongs to.
    pub fn epoch(self, slots_per_epoch: u64) -> Epoch {
        Epoch::new(self.0 / slots_per_epoch)
    }
}

impl Epoch {
    /// The first slot in the epoch.
    pub fn start_slot(self, slots_per_epoch: u64) -> Slot {
        Slot::new(self.0.saturating_mul(slots_per_epoch))
    }

    /// The last slot in the epoch.
    pub fn end_slot(self, slots_per_epoch: u64) -> Slot {
        Slot::new(
            self.0
                .saturating_mul(slots_per_epoch)
                .saturating_add(slots_per_epoch.saturating_sub(1)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ssz::{Decode, Encode};

    #[test]
    fn slot_epoch_conversion() {
        let slots_per_epoch = 8;

        assert_eq!(Slot::new(0).epoch(slots_per_epoch), Epoch::new(0));
        assert_eq!(Slot::new(7).epoch(slots_per_epoch), Epoch::new(0));
        assert_eq!(Slot::new(8).epoch(slots_per_epoch), Epoch::new(1));

        assert_eq!(Epoch::new(1).start_slot(slots_per_epoch), Slot::new(8));
        assert_eq!(Epoch::new(1).end_slot(slots_per_epoch), Slot::new(15));
    }

    #[test]
    fn saturating_math() {
        assert_eq!(Slot::new(u64::MAX) + 1, Slot::new(u64::MAX));
        assert_eq!(Slot::new(0) - 1, Slot::new(0));
        assert_eq!(
            Epoch::max_value().start_slot(8),
            Slot::new(u64::MAX),
            "start_slot saturates rather than wrapping"
        );
    }

    #[test]
    fn ssz_round_trip() {
        let slot = Slot::new(42);
        assert_eq!(Slot::from_ssz_bytes(&slot.as_ssz_bytes()).unwrap(), slot);

        let epoch = Epoch::max_value();
        assert_eq!(
            epoch.as_ssz_bytes(),
            vec![255, 255, 255, 255, 255, 255, 255, 255]
        );
        assert_eq!(Epoch::from_ssz_bytes(&epoch.as_ssz_bytes()).unwrap(), epoch);
    }
}
