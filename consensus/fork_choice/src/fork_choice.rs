use crate::{Interrupt, StateTransition};
use parking_lot::RwLock;
use slog::{info, Logger};
use slot_clock::SlotClock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use store::{BlockFilter, BlockStore, HeadStore, StateStore, VoteStore};
use tree_hash::TreeHash;
use types::{BeaconBlock, BeaconState, Checkpoint, ChainSpec, Epoch, Hash256, Slot};

#[derive(Debug)]
pub enum Error {
    /// No state is stored for the block's parent root.
    MissingPreState(Hash256),
    /// The block's slot start time has not been reached yet.
    FutureSlot { slot_time: u64, now: u64 },
    /// The block does not descend from the finalized block.
    NotDescendantOfFinalized {
        block_root: Hash256,
        finalized_root: Hash256,
    },
    /// The block's slot is at or before the start of the finalized epoch.
    BeforeFinalized {
        block_slot: Slot,
        finalized_slot: Slot,
    },
    /// The state-transition oracle rejected the block.
    StateTransitionFailed(String),
    /// The block root is in the deny set.
    KnownBadBlock(Hash256),
    /// The finalized checkpoint references a block that is not stored.
    MissingFinalizedBlock(Checkpoint),
    /// The system clock could not be read.
    UnableToReadTime,
    /// The operation was abandoned because the interrupt fired. For a head
    /// computation, `head` carries the stale-but-valid root reached before
    /// abandoning the walk.
    Interrupted { head: Option<Hash256> },
    StoreError(store::Error),
}

impl From<store::Error> for Error {
    fn from(e: store::Error) -> Error {
        Error::StoreError(e)
    }
}

/// The checkpoint fields shared between readers and the block-admission
/// path, behind a single reader-writer lock.
struct Checkpoints {
    justified: Checkpoint,
    finalized: Checkpoint,
    /// Checkpoint cache key -> root of the block the checkpoint references.
    /// Keyed by `Checkpoint::cache_key` so two checkpoints naming the same
    /// block at different epochs cannot alias.
    checkpoint_block_roots: HashMap<Hash256, Hash256>,
}

/// The fork-choice store.
///
/// `S` is the persistence capability bundle, `T` the state-transition
/// oracle, `C` the clock used by the future-slot admission check.
pub struct ForkChoice<S, T, C> {
    pub(crate) db: Arc<S>,
    pub(crate) transition: T,
    clock: C,
    pub(crate) spec: ChainSpec,
    checkpoints: RwLock<Checkpoints>,
    /// Roots that failed the state transition; rejected outright on
    /// re-submission so sync does not repeat the work.
    bad_blocks: RwLock<HashSet<Hash256>>,
    interrupt: Interrupt,
    /// Fired after the finalized checkpoint advances, once per advance,
    /// outside the checkpoint lock. The node wires this to clear the
    /// per-finalized process caches.
    on_finalization: Option<Box<dyn Fn(Checkpoint) + Send + Sync>>,
    pub(crate) log: Logger,
}

impl<S, T, C> ForkChoice<S, T, C>
where
    S: BlockStore + StateStore + VoteStore + HeadStore,
    T: StateTransition,
    C: SlotClock,
{
    pub fn new(db: Arc<S>, transition: T, clock: C, spec: ChainSpec, log: Logger) -> Self {
        Self {
            db,
            transition,
            clock,
            spec,
            checkpoints: RwLock::new(Checkpoints {
                justified: Checkpoint::default(),
                finalized: Checkpoint::default(),
                checkpoint_block_roots: HashMap::new(),
            }),
            bad_blocks: RwLock::new(HashSet::new()),
            interrupt: Interrupt::new(),
            on_finalization: None,
            log,
        }
    }

    /// Registers the hook fired after every finalized-checkpoint advance.
    pub fn with_finalization_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(Checkpoint) + Send + Sync + 'static,
    {
        self.on_finalization = Some(Box::new(hook));
        self
    }

    /// A handle that cancels in-flight operations when triggered.
    pub fn interrupt(&self) -> Interrupt {
        self.interrupt.clone()
    }

    /// The clock the store verifies slot times against.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// The persistence layer the store reads and writes through.
    pub fn db(&self) -> &Arc<S> {
        &self.db
    }

    /// Initializes the store from the genesis state: constructs and persists
    /// the genesis block, points both checkpoints at it and records it as
    /// the initial head.
    pub fn genesis_store(&self, genesis_state: &BeaconState) -> Result<Hash256, Error> {
        let state_root = genesis_state.tree_hash_root();
        let genesis_block = BeaconBlock::genesis(state_root);
        let root = genesis_block.canonical_root();

        self.db.put_block(&genesis_block)?;
        self.db.put_state(genesis_state, root)?;
        self.db.put_head_block_root(root)?;

        let checkpoint = Checkpoint {
            epoch: Epoch::new(0),
            root,
        };
        let mut checkpoints = self.checkpoints.write();
        checkpoints.justified = checkpoint;
        checkpoints.finalized = checkpoint;
        checkpoints
            .checkpoint_block_roots
            .insert(checkpoint.cache_key(), root);
        drop(checkpoints);

        info!(
            self.log,
            "Fork choice store initialized";
            "genesis_root" => format!("{:?}", root),
            "genesis_time" => genesis_state.genesis_time,
        );
        Ok(root)
    }

    /// The latest justified checkpoint.
    pub fn justified_checkpoint(&self) -> Checkpoint {
        self.checkpoints.read().justified
    }

    /// The latest finalized checkpoint.
    pub fn finalized_checkpoint(&self) -> Checkpoint {
        self.checkpoints.read().finalized
    }

    /// Walks parent pointers from `root` until a block at `slot` is found.
    ///
    /// Returns `None` when the walk reaches a missing block (partially
    /// synced chain) or passes below `slot` without landing on it (the slot
    /// was skipped on this chain). Iterative on purpose: chains are long and
    /// recursion depth is finite.
    pub fn ancestor(&self, root: Hash256, slot: Slot) -> Result<Option<Hash256>, Error> {
        let mut current = root;
        loop {
            self.check_interrupt(None)?;

            let block = match self.db.block(current)? {
                Some(block) => block,
                None => return Ok(None),
            };
            if block.slot == slot {
                return Ok(Some(current));
            }
            if block.slot < slot {
                return Ok(None);
            }
            current = block.parent_root;
        }
    }

    /// The ancestor of a block not yet persisted: the walk starts at the
    /// block's own fields rather than a store lookup.
    pub(crate) fn ancestor_of_block(
        &self,
        block: &BeaconBlock,
        root: Hash256,
        slot: Slot,
    ) -> Result<Option<Hash256>, Error> {
        if block.slot == slot {
            Ok(Some(root))
        } else if block.slot < slot {
            Ok(None)
        } else {
            self.ancestor(block.parent_root, slot)
        }
    }

    /// The total effective balance of active validators whose latest vote
    /// supports the subtree rooted at `root`.
    ///
    /// Balances are read from the state at the justified checkpoint; a vote
    /// supports `root` when the vote block's ancestor at `root`'s slot is
    /// `root` itself. Returns zero when the target block or the justified
    /// state is unavailable.
    pub fn latest_attesting_balance(&self, root: Hash256) -> Result<u64, Error> {
        let justified_state = match self.justified_state()? {
            Some(state) => state,
            None => return Ok(0),
        };
        self.attesting_balance_with_state(&justified_state, root)
    }

    fn attesting_balance_with_state(
        &self,
        justified_state: &BeaconState,
        root: Hash256,
    ) -> Result<u64, Error> {
        let target = match self.db.block(root)? {
            Some(block) => block,
            None => return Ok(0),
        };

        let epoch = justified_state.current_epoch(&self.spec);
        let mut balance = 0_u64;
        for index in justified_state.active_validator_indices(epoch) {
            let vote = match self.db.latest_vote(index)? {
                Some(vote) => vote,
                None => continue,
            };
            if self.ancestor(vote.root, target.slot)? == Some(root) {
                balance = balance.saturating_add(
                    justified_state
                        .validators
                        .get(index as usize)
                        .map_or(0, |validator| validator.effective_balance),
                );
            }
        }
        Ok(balance)
    }

    /// The state at the justified checkpoint, via the checkpoint-to-root
    /// side table.
    fn justified_state(&self) -> Result<Option<BeaconState>, Error> {
        let justified_block_root = {
            let checkpoints = self.checkpoints.read();
            let key = checkpoints.justified.cache_key();
            checkpoints.checkpoint_block_roots.get(&key).copied()
        };
        match justified_block_root {
            Some(root) => Ok(self.db.state(root)?),
            None => Ok(None),
        }
    }

    /// Executes the LMD-GHOST fork-choice rule: starting at the justified
    /// root, repeatedly descend into the child subtree with the greatest
    /// latest attesting balance, ties broken towards the lexicographically
    /// larger root, until a leaf is reached.
    ///
    /// Each iteration strictly increases the head slot and the block set is
    /// finite, so the walk terminates.
    pub fn head(&self) -> Result<Hash256, Error> {
        let justified = self.justified_checkpoint();
        let justified_state = self.justified_state()?;
        let justified_slot = justified.epoch.start_slot(self.spec.slots_per_epoch);

        let mut head = justified.root;
        loop {
            self.check_interrupt(Some(head))?;

            let children = self.db.block_roots(
                &BlockFilter::new()
                    .with_parent_root(head)
                    .with_start_slot(justified_slot + 1),
            )?;

            match children.as_slice() {
                [] => return Ok(head),
                // A single child wins regardless of balance.
                [only] => head = *only,
                [first, rest @ ..] => {
                    let mut best = *first;
                    let mut best_balance = self.child_balance(&justified_state, best)?;
                    for &child in rest {
                        let balance = self.child_balance(&justified_state, child)?;
                        if balance > best_balance || (balance == best_balance && child > best) {
                            best = child;
                            best_balance = balance;
                        }
                    }
                    head = best;
                }
            }
        }
    }

    /// Recomputes the head and overwrites the persisted head pointer.
    pub fn update_head(&self) -> Result<Hash256, Error> {
        let head = self.head()?;
        self.db.put_head_block_root(head)?;
        Ok(head)
    }

    fn child_balance(
        &self,
        justified_state: &Option<BeaconState>,
        root: Hash256,
    ) -> Result<u64, Error> {
        match justified_state {
            Some(state) => self.attesting_balance_with_state(state, root),
            None => Ok(0),
        }
    }

    /// Marks a root whose block must never be admitted again.
    pub fn mark_bad_block(&self, root: Hash256) {
        self.bad_blocks.write().insert(root);
    }

    pub fn is_bad_block(&self, root: Hash256) -> bool {
        self.bad_blocks.read().contains(&root)
    }

    pub(crate) fn check_interrupt(&self, head: Option<Hash256>) -> Result<(), Error> {
        if self.interrupt.is_triggered() {
            Err(Error::Interrupted { head })
        } else {
            Ok(())
        }
    }

    pub(crate) fn now(&self) -> Result<u64, Error> {
        self.clock
            .now_duration()
            .map(|duration| duration.as_secs())
            .ok_or(Error::UnableToReadTime)
    }

    /// Advances the checkpoints from a freshly admitted post-state, pruning
    /// per-finalized data when finality moves.
    pub(crate) fn update_checkpoints(&self, post_state: &BeaconState) -> Result<(), Error> {
        let mut finalized_advance = None;

        {
            let mut checkpoints = self.checkpoints.write();

            let justified = post_state.current_justified_checkpoint;
            if justified.epoch > checkpoints.justified.epoch {
                checkpoints.justified = justified;
                checkpoints
                    .checkpoint_block_roots
                    .insert(justified.cache_key(), justified.root);
                info!(
                    self.log,
                    "Justified checkpoint advanced";
                    "epoch" => justified.epoch.as_u64(),
                    "root" => format!("{:?}", justified.root),
                );
            }

            let finalized = post_state.finalized_checkpoint;
            if finalized.epoch > checkpoints.finalized.epoch {
                checkpoints.finalized = finalized;
                checkpoints
                    .checkpoint_block_roots
                    .insert(finalized.cache_key(), finalized.root);

                // Only the live checkpoints are ever read again; drop stale
                // side-table entries.
                let keep = [
                    checkpoints.justified.cache_key(),
                    checkpoints.finalized.cache_key(),
                ];
                checkpoints
                    .checkpoint_block_roots
                    .retain(|key, _| keep.contains(key));

                finalized_advance = Some(finalized);
            }
        }

        if let Some(finalized) = finalized_advance {
            let finalized_slot = finalized.epoch.start_slot(self.spec.slots_per_epoch);
            let pruned = self.db.prune_states(finalized_slot)?;
            info!(
                self.log,
                "Finalized checkpoint advanced";
                "epoch" => finalized.epoch.as_u64(),
                "root" => format!("{:?}", finalized.root),
                "states_pruned" => pruned,
            );
            if let Some(hook) = &self.on_finalization {
                hook(finalized);
            }
        }

        Ok(())
    }
}
