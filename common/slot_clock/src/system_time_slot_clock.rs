use super::SlotClock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use types::Slot;

/// Determines the present slot based upon the present system time.
#[derive(Clone)]
pub struct SystemTimeSlotClock {
    genesis_slot: Slot,
    genesis_duration: Duration,
    slot_duration: Duration,
}

impl SlotClock for SystemTimeSlotClock {
    fn new(genesis_slot: Slot, genesis_duration: Duration, slot_duration: Duration) -> Self {
        assert!(
            slot_duration.as_millis() != 0,
            "SystemTimeSlotClock cannot have a < 1ms slot duration"
        );

        Self {
            genesis_slot,
            genesis_duration,
            slot_duration,
        }
    }

    fn now(&self) -> Option<Slot> {
        self.slot_of(self.now_duration()?)
    }

    fn now_duration(&self) -> Option<Duration> {
        SystemTime::now().duration_since(UNIX_EPOCH).ok()
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
    fn slot_of_past_genesis() {
        let clock = SystemTimeSlotClock::new(
            Slot::new(0),
            Duration::from_secs(0),
            Duration::from_secs(6),
        );
        assert_eq!(clock.slot_of(Duration::from_secs(5)), Some(Slot::new(0)));
        assert_eq!(clock.slot_of(Duration::from_secs(6)), Some(Slot::new(1)));
        assert_eq!(clock.slot_of(Duration::from_secs(13)), Some(Slot::new(2)));
    }

    #[test]
    fn slot_of_before_genesis() {
        let clock = SystemTimeSlotClock::new(
            Slot::new(0),
            Duration::from_secs(100),
            Duration::from_secs(6),
        );
        assert_eq!(clock.slot_of(Duration::from_secs(99)), None);
    }
}
