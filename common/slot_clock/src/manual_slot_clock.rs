use super::SlotClock;
use parking_lot::RwLock;
use std::time::Duration;
use types::Slot;

/// Determines the present slot based upon a manually-incremented UNIX
/// timestamp.
pub struct ManualSlotClock {
    genesis_slot: Slot,
    /// Duration from UNIX epoch to genesis.
    genesis_duration: Duration,
    /// Duration from UNIX epoch to right now.
    current_time: RwLock<Duration>,
    /// The length of each slot.
    slot_duration: Duration,
}

impl Clone for ManualSlotClock {
    fn clone(&self) -> Self {
        ManualSlotClock {
            genesis_slot: self.genesis_slot,
            genesis_duration: self.genesis_duration,
            current_time: RwLock::new(*self.current_time.read()),
            slot_duration: self.slot_duration,
        }
    }
}

impl ManualSlotClock {
    /// Pins "now" to an exact duration since the UNIX epoch.
    pub fn set_current_time(&self, time: Duration) {
        *self.current_time.write() = time;
    }

    /// Pins "now" to the start of `slot`.
    pub fn set_slot(&self, slot: u64) {
        let slots_since_genesis = slot.saturating_sub(self.genesis_slot.as_u64()) as u32;
        *self.current_time.write() =
            self.genesis_duration + self.slot_duration * slots_since_genesis;
    }

    pub fn advance_slot(&self) {
        let now = self.now().map(Slot::as_u64).unwrap_or(0);
        self.set_slot(now + 1)
    }
}

impl SlotClock for ManualSlotClock {
    fn new(genesis_slot: Slot, genesis_duration: Duration, slot_duration: Duration) -> Self {
        assert!(
            slot_duration.as_millis() != 0,
            "ManualSlotClock cannot have a < 1ms slot duration"
        );

        Self {
            genesis_slot,
            current_time: RwLock::new(genesis_duration),
            genesis_duration,
            slot_duration,
        }
    }

    fn now(&self) -> Option<Slot> {
        self.slot_of(*self.current_time.read())
    }

    fn now_duration(&self) -> Option<Duration> {
        Some(*self.current_time.read())
    }

    fn slot_of(&self, now: Duration) -> Option<Slot> {
        let since_genesis = now.checked_sub(self.genesis_duration)?;
        let slot = Slot::new((since_genesis.as_millis() / self.slot_duration.as_millis()) as u64);
        Some(slot + self.genesis_slot.as_u64())
    }

    fn slot_duration(&self) -> Duration {
        self.slot_duration
    }

    fn genesis_duration(&self) -> Duration {
        self.genesis_duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_now() {
        let clock = ManualSlotClock::new(
            Slot::new(10),
            Duration::from_secs(0),
            Duration::from_secs(1),
        );
        assert_eq!(clock.now(), Some(Slot::new(10)));
        clock.set_slot(123);
        assert_eq!(clock.now(), Some(Slot::new(123)));
    }

    #[test]
    fn set_current_time_is_exact() {
        let clock = ManualSlotClock::new(
            Slot::new(0),
            Duration::from_secs(1000),
            Duration::from_secs(6),
        );
        clock.set_current_time(Duration::from_secs(1013));
        assert_eq!(clock.now_duration(), Some(Duration::from_secs(1013)));
        assert_eq!(clock.now(), Some(Slot::new(2)));
    }
}
