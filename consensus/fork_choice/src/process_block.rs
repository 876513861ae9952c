use crate::fork_choice::{Error, ForkChoice};
use crate::StateTransition;
use slog::{error, warn};
use slot_clock::SlotClock;
use store::{BlockStore, HeadStore, StateStore, VoteStore};
use types::{BeaconBlock, BeaconState, Hash256};

impl<S, T, C> ForkChoice<S, T, C>
where
    S: BlockStore + StateStore + VoteStore + HeadStore,
    T: StateTransition,
    C: SlotClock,
{
    /// Validates and applies a block.
    ///
    /// The pre-checks run in order and the first failure aborts with
    /// nothing persisted: the parent's state must exist, the block's slot
    /// time must not be in the future, the block must descend from the
    /// finalized block and sit after the finalized epoch's start slot.
    /// Only then is the state transition executed and the result persisted,
    /// followed by the checkpoint updates.
    ///
    /// Recomputing the head is deliberately not done here; callers do so
    /// lazily via [`ForkChoice::head`].
    pub fn on_block(&self, block: &BeaconBlock) -> Result<Hash256, Error> {
        let root = block.canonical_root();

        if self.is_bad_block(root) {
            return Err(Error::KnownBadBlock(root));
        }
        self.check_interrupt(None)?;

        let pre_state = self.verify_block_pre_state(block)?;
        self.verify_block_slot_time(&pre_state, block)?;
        self.verify_descends_from_finalized(block, root)?;
        self.verify_after_finalized_slot(block)?;

        let post_state = match self.transition.state_transition(&pre_state, block) {
            Ok(post_state) => post_state,
            Err(e) => {
                error!(
                    self.log,
                    "Block failed state transition";
                    "root" => format!("{:?}", root),
                    "slot" => block.slot.as_u64(),
                    "error" => %e,
                );
                self.mark_bad_block(root);
                return Err(Error::StateTransitionFailed(e.0));
            }
        };

        self.check_interrupt(None)?;

        self.db.put_block(block)?;
        self.db.put_state(&post_state, root)?;

        self.update_checkpoints(&post_state)?;

        Ok(root)
    }

    /// The block's parent must have a stored post-state to transition from.
    fn verify_block_pre_state(&self, block: &BeaconBlock) -> Result<BeaconState, Error> {
        match self.db.state(block.parent_root)? {
            Some(pre_state) => Ok(pre_state),
            None => {
                warn!(
                    self.log,
                    "Block parent has no known state";
                    "parent_root" => format!("{:?}", block.parent_root),
                    "slot" => block.slot.as_u64(),
                );
                Err(Error::MissingPreState(block.parent_root))
            }
        }
    }

    /// The start of the block's slot must not lie in the future.
    fn verify_block_slot_time(
        &self,
        pre_state: &BeaconState,
        block: &BeaconBlock,
    ) -> Result<(), Error> {
        let slot_time = pre_state
            .genesis_time
            .saturating_add(block.slot.as_u64().saturating_mul(self.spec.seconds_per_slot));
        let now = self.now()?;
        if slot_time > now {
            warn!(
                self.log,
                "Block is from a future slot";
                "slot" => block.slot.as_u64(),
                "slot_time" => slot_time,
                "now" => now,
            );
            return Err(Error::FutureSlot { slot_time, now });
        }
        Ok(())
    }

    /// The block's ancestor at the finalized block's slot must be the
    /// finalized root.
    fn verify_descends_from_finalized(
        &self,
        block: &BeaconBlock,
        root: Hash256,
    ) -> Result<(), Error> {
        let finalized = self.finalized_checkpoint();
        let finalized_block = self
            .db
            .block(finalized.root)?
            .ok_or(Error::MissingFinalizedBlock(finalized))?;

        let ancestor = self.ancestor_of_block(block, root, finalized_block.slot)?;
        if ancestor != Some(finalized.root) {
            warn!(
                self.log,
                "Block does not descend from the finalized block";
                "root" => format!("{:?}", root),
                "slot" => block.slot.as_u64(),
                "finalized_root" => format!("{:?}", finalized.root),
            );
            return Err(Error::NotDescendantOfFinalized {
                block_root: root,
                finalized_root: finalized.root,
            });
        }
        Ok(())
    }

    /// The block must be later than the start slot of the finalized epoch.
    fn verify_after_finalized_slot(&self, block: &BeaconBlock) -> Result<(), Error> {
        let finalized = self.finalized_checkpoint();
        let finalized_slot = finalized.epoch.start_slot(self.spec.slots_per_epoch);
        if block.slot <= finalized_slot {
            warn!(
                self.log,
                "Block is at or before the finalized epoch slot";
                "slot" => block.slot.as_u64(),
                "finalized_slot" => finalized_slot.as_u64(),
            );
            return Err(Error::BeforeFinalized {
                block_slot: block.slot,
                finalized_slot,
            });
        }
        Ok(())
    }
}
