//! Shared test scaffolding: an in-memory store, a manual clock and a stub
//! state-transition oracle, wired into a ready-to-use fork-choice store.

use crate::fork_choice::{Error, ForkChoice};
use crate::{StateTransition, StateTransitionError};
use parking_lot::Mutex;
use slog::Logger;
use sloggers::null::NullLoggerBuilder;
use sloggers::Build;
use slot_clock::{ManualSlotClock, SlotClock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use store::BeaconDb;
use store::MemoryStore;
use types::{
    BeaconBlock, BeaconBlockBody, BeaconState, ChainSpec, Checkpoint, Epoch, Hash256, Slot,
    Validator, VariableList,
};

pub fn null_logger() -> Logger {
    NullLoggerBuilder.build().expect("builds a null logger")
}

/// A stand-in for the state-transition oracle: copies the pre-state forward
/// to the block's slot and applies any checkpoint overrides registered for
/// that slot.
#[derive(Default)]
pub struct StubTransition {
    justified_at: Mutex<HashMap<Slot, Checkpoint>>,
    finalized_at: Mutex<HashMap<Slot, Checkpoint>>,
    failing_slots: Mutex<HashSet<Slot>>,
}

impl StubTransition {
    /// Post-states of blocks at `slot` will carry this justified checkpoint.
    pub fn justify_at(&self, slot: Slot, checkpoint: Checkpoint) {
        self.justified_at.lock().insert(slot, checkpoint);
    }

    /// Post-states of blocks at `slot` will carry this finalized checkpoint.
    pub fn finalize_at(&self, slot: Slot, checkpoint: Checkpoint) {
        self.finalized_at.lock().insert(slot, checkpoint);
    }

    /// Blocks at `slot` will fail the transition.
    pub fn fail_at(&self, slot: Slot) {
        self.failing_slots.lock().insert(slot);
    }

    pub fn clear_failures(&self) {
        self.failing_slots.lock().clear();
    }
}

impl StateTransition for StubTransition {
    fn state_transition(
        &self,
        pre_state: &BeaconState,
        block: &BeaconBlock,
    ) -> Result<BeaconState, StateTransitionError> {
        if self.failing_slots.lock().contains(&block.slot) {
            return Err(StateTransitionError("block rejected by stub".into()));
        }

        let mut post_state = pre_state.clone();
        post_state.slot = block.slot;
        if let Some(checkpoint) = self.justified_at.lock().get(&block.slot) {
            post_state.current_justified_checkpoint = *checkpoint;
        }
        if let Some(checkpoint) = self.finalized_at.lock().get(&block.slot) {
            post_state.finalized_checkpoint = *checkpoint;
        }
        Ok(post_state)
    }
}

type TestForkChoice = ForkChoice<BeaconDb<MemoryStore>, Arc<StubTransition>, ManualSlotClock>;

/// An in-memory fork-choice setup seeded with a genesis state of three
/// active validators.
pub struct TestRig {
    pub db: Arc<BeaconDb<MemoryStore>>,
    pub transition: Arc<StubTransition>,
    pub fork_choice: TestForkChoice,
    pub genesis_root: Hash256,
    pub spec: ChainSpec,
}

impl TestRig {
    pub fn genesis(genesis_time: u64) -> Self {
        Self::build(genesis_time, |fork_choice| fork_choice)
    }

    pub fn genesis_with_hook<F>(genesis_time: u64, hook: F) -> Self
    where
        F: Fn(Checkpoint) + Send + Sync + 'static,
    {
        Self::build(genesis_time, |fork_choice| {
            fork_choice.with_finalization_hook(hook)
        })
    }

    fn build(genesis_time: u64, wrap: impl FnOnce(TestForkChoice) -> TestForkChoice) -> Self {
        let spec = ChainSpec::minimal();
        let db = Arc::new(BeaconDb::memory());
        let transition = Arc::new(StubTransition::default());

        let clock = ManualSlotClock::new(
            Slot::new(0),
            Duration::from_secs(genesis_time),
            Duration::from_secs(spec.seconds_per_slot),
        );
        // Far enough ahead that ordinary test blocks are never "future".
        clock.set_current_time(Duration::from_secs(genesis_time + 10_000));

        let fork_choice = wrap(ForkChoice::new(
            db.clone(),
            transition.clone(),
            clock,
            spec.clone(),
            null_logger(),
        ));

        let validators = (0..3)
            .map(|_| Validator {
                effective_balance: 32_000_000_000,
                activation_epoch: Epoch::new(0),
                ..Validator::default()
            })
            .collect::<Vec<_>>();
        let genesis_state = BeaconState {
            genesis_time,
            slot: Slot::new(0),
            balances: VariableList::from(vec![32_000_000_000; validators.len()]),
            validators: VariableList::from(validators),
            ..BeaconState::default()
        };

        let genesis_root = fork_choice
            .genesis_store(&genesis_state)
            .expect("genesis store succeeds");

        Self {
            db,
            transition,
            fork_choice,
            genesis_root,
            spec,
        }
    }

    /// Pins the clock to an exact UNIX time in seconds.
    pub fn set_time(&self, secs: u64) {
        self.fork_choice
            .clock()
            .set_current_time(Duration::from_secs(secs));
    }

    pub fn process(&self, block: &BeaconBlock) -> Result<Hash256, Error> {
        self.fork_choice.on_block(block)
    }

    pub fn block_at_slot(&self, slot: u64, parent_root: Hash256) -> BeaconBlock {
        BeaconBlock {
            slot: Slot::new(slot),
            parent_root,
            state_root: Hash256::zero(),
            body: BeaconBlockBody::default(),
        }
    }

    /// A block distinguished from same-slot siblings by its graffiti.
    pub fn block_with_graffiti(&self, slot: u64, parent_root: Hash256, graffiti: u8) -> BeaconBlock {
        let mut block = self.block_at_slot(slot, parent_root);
        block.body.graffiti = Hash256::repeat_byte(graffiti);
        block
    }
}
