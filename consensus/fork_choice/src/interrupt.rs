use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cancellation signal shared between the fork-choice store and whoever
/// drives its shutdown.
///
/// Operations check the flag between I/O steps and abandon once it fires;
/// partial writes stay consistent because persistence is transactional.
#[derive(Clone, Default)]
pub struct Interrupt {
    triggered: Arc<AtomicBool>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask in-flight operations to abandon.
    pub fn trigger(&self) {
        self.triggered.store(true, Ordering::Relaxed);
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let interrupt = Interrupt::new();
        let other = interrupt.clone();

        assert!(!other.is_triggered());
        interrupt.trigger();
        assert!(other.is_triggered());
    }
}
