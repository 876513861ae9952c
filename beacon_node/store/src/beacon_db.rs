use crate::{
    get_item, get_key_for_col, item_store_op, put_item, BlockFilter, DBColumn, Error,
    KeyValueStore, KeyValueStoreOp, MemoryStore,
};
use ssz::{Decode, DecodeError, Encode};
use std::collections::{hash_map::Entry, HashMap, HashSet};
use types::{BeaconBlock, BeaconState, Hash256, LatestVote, Slot};

/// Key of the process-wide head pointer, in the meta column.
const HEAD_BLOCK_ROOT_KEY: &[u8] = b"head_block_root";

/// Read access to blocks plus the index-backed child and slot-range queries.
pub trait BlockStore: Send + Sync {
    fn block(&self, root: Hash256) -> Result<Option<BeaconBlock>, Error>;

    fn has_block(&self, root: Hash256) -> Result<bool, Error>;

    /// Persist a block, updating the parent-root and slot indices atomically
    /// with the primary write. Returns the block's signing root.
    fn put_block(&self, block: &BeaconBlock) -> Result<Hash256, Error>;

    /// Persist a batch of blocks in a single all-or-nothing write.
    fn put_blocks(&self, blocks: &[BeaconBlock]) -> Result<(), Error>;

    /// Remove a block and its entries in both secondary indices.
    fn delete_block(&self, root: Hash256) -> Result<(), Error>;

    /// Blocks matching every criterion of `filter`. Ordering is unspecified.
    fn blocks(&self, filter: &BlockFilter) -> Result<Vec<BeaconBlock>, Error>;

    /// Signing roots of blocks matching every criterion of `filter`.
    fn block_roots(&self, filter: &BlockFilter) -> Result<Vec<Hash256>, Error>;
}

/// Access to post-states, keyed by the root of the block they result from.
pub trait StateStore: Send + Sync {
    fn state(&self, block_root: Hash256) -> Result<Option<BeaconState>, Error>;

    fn put_state(&self, state: &BeaconState, block_root: Hash256) -> Result<(), Error>;

    /// Delete states older than `finalized_slot`. Returns how many were
    /// removed.
    fn prune_states(&self, finalized_slot: Slot) -> Result<usize, Error>;
}

/// The process-wide head pointer.
pub trait HeadStore: Send + Sync {
    fn head_block_root(&self) -> Result<Option<Hash256>, Error>;

    fn put_head_block_root(&self, root: Hash256) -> Result<(), Error>;
}

/// Per-validator latest fork-choice votes.
pub trait VoteStore: Send + Sync {
    fn latest_vote(&self, validator_index: u64) -> Result<Option<LatestVote>, Error>;

    /// Record a vote. A write carrying a lower epoch than the stored vote
    /// is ignored: votes never regress.
    fn put_latest_vote(&self, validator_index: u64, vote: LatestVote) -> Result<(), Error>;
}

/// The beacon database: blocks, states, head pointer and votes over a
/// `KeyValueStore`, with parent-root and slot secondary indices.
pub struct BeaconDb<K: KeyValueStore> {
    kv: K,
}

impl BeaconDb<MemoryStore> {
    /// An in-memory database, for testing.
    pub fn memory() -> Self {
        Self::new(MemoryStore::open())
    }
}

impl<K: KeyValueStore> BeaconDb<K> {
    pub fn new(kv: K) -> Self {
        Self { kv }
    }

    /// The ops inserting `blocks` and their index entries. Index values are
    /// read once and accumulated in an overlay so blocks sharing a parent or
    /// slot within one batch observe each other.
    fn block_insert_ops(&self, blocks: &[BeaconBlock]) -> Result<Vec<KeyValueStoreOp>, Error> {
        let mut ops = Vec::with_capacity(blocks.len());
        let mut indices: HashMap<(DBColumn, Vec<u8>), Vec<Hash256>> = HashMap::new();

        for block in blocks {
            let root = block.canonical_root();
            ops.push(item_store_op(&root, block));

            let index_keys = [
                (DBColumn::BlockParentIndex, block.parent_root.as_bytes().to_vec()),
                (DBColumn::BlockSlotIndex, slot_key(block.slot).to_vec()),
            ];
            for map_key in index_keys {
                let set = match indices.entry(map_key) {
                    Entry::Occupied(entry) => entry.into_mut(),
                    Entry::Vacant(entry) => {
                        let (column, key) = entry.key();
                        let existing = self
                            .kv
                            .get_bytes(column.as_str(), key)?
                            .map(|bytes| decode_root_set(&bytes))
                            .transpose()?
                            .unwrap_or_default();
                        entry.insert(existing)
                    }
                };
                if !set.contains(&root) {
                    set.push(root);
                }
            }
        }

        for ((column, key), set) in indices {
            ops.push(KeyValueStoreOp::PutKeyValue(
                get_key_for_col(column.as_str(), &key),
                encode_root_set(&set),
            ));
        }

        Ok(ops)
    }

    /// The op removing `root` from the index entry at `(column, key)`, or
    /// deleting the entry outright when it empties.
    fn index_remove_op(
        &self,
        column: DBColumn,
        key: &[u8],
        root: Hash256,
    ) -> Result<KeyValueStoreOp, Error> {
        let mut set = self
            .kv
            .get_bytes(column.as_str(), key)?
            .map(|bytes| decode_root_set(&bytes))
            .transpose()?
            .unwrap_or_default();
        set.retain(|r| *r != root);

        let db_key = get_key_for_col(column.as_str(), key);
        if set.is_empty() {
            Ok(KeyValueStoreOp::DeleteKey(db_key))
        } else {
            Ok(KeyValueStoreOp::PutKeyValue(db_key, encode_root_set(&set)))
        }
    }

    /// Child roots recorded under `parent_root`.
    fn parent_index(&self, parent_root: Hash256) -> Result<Vec<Hash256>, Error> {
        self.kv
            .get_bytes(DBColumn::BlockParentIndex.as_str(), parent_root.as_bytes())?
            .map(|bytes| decode_root_set(&bytes))
            .transpose()
            .map(Option::unwrap_or_default)
    }

    /// Roots of all blocks within the slot range, either bound optional.
    fn roots_in_slot_range(
        &self,
        start_slot: Option<Slot>,
        end_slot: Option<Slot>,
    ) -> Result<Vec<Hash256>, Error> {
        let from = slot_key(start_slot.unwrap_or_else(|| Slot::new(0)));

        let mut keys = Vec::new();
        for key in self.kv.iter_column_keys_from(DBColumn::BlockSlotIndex, &from) {
            let key = key?;
            let slot = decode_slot_key(&key)?;
            if end_slot.map_or(false, |end| slot > end) {
                break;
            }
            keys.push(key);
        }

        let mut roots = Vec::new();
        for key in keys {
            if let Some(bytes) = self.kv.get_bytes(DBColumn::BlockSlotIndex.as_str(), &key)? {
                roots.extend(decode_root_set(&bytes)?);
            }
        }
        Ok(roots)
    }

    /// Every block root in the database.
    fn all_block_roots(&self) -> Result<Vec<Hash256>, Error> {
        self.kv
            .iter_column_keys_from(DBColumn::BeaconBlock, &[])
            .map(|key| hash256_from_bytes(&key?))
            .collect()
    }

    /// Every state key (block root) in the database.
    fn all_state_keys(&self) -> Result<Vec<Hash256>, Error> {
        self.kv
            .iter_column_keys_from(DBColumn::BeaconState, &[])
            .map(|key| hash256_from_bytes(&key?))
            .collect()
    }
}

impl<K: KeyValueStore> BlockStore for BeaconDb<K> {
    fn block(&self, root: Hash256) -> Result<Option<BeaconBlock>, Error> {
        get_item(&self.kv, &root)
    }

    fn has_block(&self, root: Hash256) -> Result<bool, Error> {
        self.kv
            .key_exists(DBColumn::BeaconBlock.as_str(), root.as_bytes())
    }

    fn put_block(&self, block: &BeaconBlock) -> Result<Hash256, Error> {
        let _guard = self.kv.begin_rw_transaction();
        let root = block.canonical_root();
        let ops = self.block_insert_ops(std::slice::from_ref(block))?;
        self.kv.do_atomically(ops)?;
        Ok(root)
    }

    fn put_blocks(&self, blocks: &[BeaconBlock]) -> Result<(), Error> {
        let _guard = self.kv.begin_rw_transaction();
        let ops = self.block_insert_ops(blocks)?;
        self.kv.do_atomically(ops)
    }

    fn delete_block(&self, root: Hash256) -> Result<(), Error> {
        let _guard = self.kv.begin_rw_transaction();

        let block: BeaconBlock = match get_item(&self.kv, &root)? {
            Some(block) => block,
            None => return Ok(()),
        };

        let ops = vec![
            KeyValueStoreOp::DeleteKey(get_key_for_col(
                DBColumn::BeaconBlock.as_str(),
                root.as_bytes(),
            )),
            self.index_remove_op(DBColumn::BlockParentIndex, block.parent_root.as_bytes(), root)?,
            self.index_remove_op(DBColumn::BlockSlotIndex, &slot_key(block.slot), root)?,
        ];
        self.kv.do_atomically(ops)
    }

    fn blocks(&self, filter: &BlockFilter) -> Result<Vec<BeaconBlock>, Error> {
        let mut blocks = Vec::new();
        for root in self.block_roots(filter)? {
            // Indices are written atomically with blocks, but a reader racing
            // a delete may observe a dangling root; skip rather than fail.
            if let Some(block) = self.block(root)? {
                blocks.push(block);
            }
        }
        Ok(blocks)
    }

    fn block_roots(&self, filter: &BlockFilter) -> Result<Vec<Hash256>, Error> {
        if filter.is_empty() {
            return self.all_block_roots();
        }

        let mut candidate_sets = Vec::new();
        if let Some(parent_root) = filter.parent_root() {
            candidate_sets.push(self.parent_index(parent_root)?);
        }
        if filter.has_slot_range() {
            candidate_sets.push(self.roots_in_slot_range(filter.start_slot(), filter.end_slot())?);
        }

        let mut sets = candidate_sets.into_iter();
        let first = sets.next().unwrap_or_default();
        Ok(sets.fold(first, |acc, set| {
            let set: HashSet<Hash256> = set.into_iter().collect();
            acc.into_iter().filter(|root| set.contains(root)).collect()
        }))
    }
}

impl<K: KeyValueStore> StateStore for BeaconDb<K> {
    fn state(&self, block_root: Hash256) -> Result<Option<BeaconState>, Error> {
        get_item(&self.kv, &block_root)
    }

    fn put_state(&self, state: &BeaconState, block_root: Hash256) -> Result<(), Error> {
        put_item(&self.kv, &block_root, state)
    }

    fn prune_states(&self, finalized_slot: Slot) -> Result<usize, Error> {
        let _guard = self.kv.begin_rw_transaction();

        let mut ops = Vec::new();
        for key in self.all_state_keys()? {
            let state: Option<BeaconState> = get_item(&self.kv, &key)?;
            if state.map_or(false, |state| state.slot < finalized_slot) {
                ops.push(KeyValueStoreOp::DeleteKey(get_key_for_col(
                    DBColumn::BeaconState.as_str(),
                    key.as_bytes(),
                )));
            }
        }

        let pruned = ops.len();
        self.kv.do_atomically(ops)?;
        Ok(pruned)
    }
}

impl<K: KeyValueStore> HeadStore for BeaconDb<K> {
    fn head_block_root(&self) -> Result<Option<Hash256>, Error> {
        self.kv
            .get_bytes(DBColumn::BeaconMeta.as_str(), HEAD_BLOCK_ROOT_KEY)?
            .map(|bytes| hash256_from_bytes(&bytes))
            .transpose()
    }

    fn put_head_block_root(&self, root: Hash256) -> Result<(), Error> {
        self.kv.put_bytes(
            DBColumn::BeaconMeta.as_str(),
            HEAD_BLOCK_ROOT_KEY,
            root.as_bytes(),
        )
    }
}

impl<K: KeyValueStore> VoteStore for BeaconDb<K> {
    fn latest_vote(&self, validator_index: u64) -> Result<Option<LatestVote>, Error> {
        self.kv
            .get_bytes(
                DBColumn::ValidatorVote.as_str(),
                &validator_index.to_be_bytes(),
            )?
            .map(|bytes| LatestVote::from_ssz_bytes(&bytes).map_err(Into::into))
            .transpose()
    }

    fn put_latest_vote(&self, validator_index: u64, vote: LatestVote) -> Result<(), Error> {
        let _guard = self.kv.begin_rw_transaction();

        if let Some(existing) = self.latest_vote(validator_index)? {
            if existing.epoch > vote.epoch {
                return Ok(());
            }
        }
        self.kv.put_bytes(
            DBColumn::ValidatorVote.as_str(),
            &validator_index.to_be_bytes(),
            &vote.as_ssz_bytes(),
        )
    }
}

fn slot_key(slot: Slot) -> [u8; 8] {
    slot.as_u64().to_be_bytes()
}

fn decode_slot_key(key: &[u8]) -> Result<Slot, Error> {
    let bytes: [u8; 8] = key
        .try_into()
        .map_err(|_| DecodeError::InvalidByteLength {
            len: key.len(),
            expected: 8,
        })?;
    Ok(Slot::new(u64::from_be_bytes(bytes)))
}

fn hash256_from_bytes(bytes: &[u8]) -> Result<Hash256, Error> {
    if bytes.len() == 32 {
        Ok(Hash256::from_slice(bytes))
    } else {
        Err(DecodeError::InvalidByteLength {
            len: bytes.len(),
            expected: 32,
        }
        .into())
    }
}

fn encode_root_set(roots: &[Hash256]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(roots.len() * 32);
    for root in roots {
        bytes.extend_from_slice(root.as_bytes());
    }
    bytes
}

fn decode_root_set(bytes: &[u8]) -> Result<Vec<Hash256>, Error> {
    if bytes.len() % 32 != 0 {
        return Err(DecodeError::InvalidByteLength {
            len: bytes.len(),
            expected: bytes.len() / 32 * 32,
        }
        .into());
    }
    Ok(bytes.chunks(32).map(Hash256::from_slice).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::{BeaconBlockBody, Epoch};

    fn block(slot: u64, parent_root: Hash256) -> BeaconBlock {
        BeaconBlock {
            slot: Slot::new(slot),
            parent_root,
            state_root: Hash256::zero(),
            body: BeaconBlockBody::default(),
        }
    }

    /// Blocks at the same slot with the same parent, distinguished by
    /// graffiti so their roots differ.
    fn block_with_graffiti(slot: u64, parent_root: Hash256, graffiti: u8) -> BeaconBlock {
        let mut block = block(slot, parent_root);
        block.body.graffiti = Hash256::repeat_byte(graffiti);
        block
    }

    #[test]
    fn put_get_delete_block() {
        let db = BeaconDb::memory();
        let block = block(1, Hash256::repeat_byte(0xaa));

        let root = db.put_block(&block).unwrap();
        assert_eq!(root, block.canonical_root());
        assert!(db.has_block(root).unwrap());
        assert_eq!(db.block(root).unwrap().unwrap(), block);

        db.delete_block(root).unwrap();
        assert!(!db.has_block(root).unwrap());
        assert_eq!(db.block(root).unwrap(), None);
    }

    #[test]
    fn delete_block_drops_index_entries() {
        let db = BeaconDb::memory();
        let parent = Hash256::repeat_byte(0xaa);
        let block = block(3, parent);

        let root = db.put_block(&block).unwrap();
        db.delete_block(root).unwrap();

        let by_parent = db
            .block_roots(&BlockFilter::new().with_parent_root(parent))
            .unwrap();
        assert!(by_parent.is_empty());

        let by_slot = db
            .block_roots(
                &BlockFilter::new()
                    .with_start_slot(Slot::new(3))
                    .with_end_slot(Slot::new(3)),
            )
            .unwrap();
        assert!(by_slot.is_empty());
    }

    #[test]
    fn query_by_parent_root() {
        let db = BeaconDb::memory();
        let parent = Hash256::repeat_byte(0xaa);

        let a = block_with_graffiti(1, parent, 1);
        let b = block_with_graffiti(1, parent, 2);
        let unrelated = block(1, Hash256::repeat_byte(0xbb));

        let a_root = db.put_block(&a).unwrap();
        let b_root = db.put_block(&b).unwrap();
        db.put_block(&unrelated).unwrap();

        let mut roots = db
            .block_roots(&BlockFilter::new().with_parent_root(parent))
            .unwrap();
        roots.sort();
        let mut expected = vec![a_root, b_root];
        expected.sort();
        assert_eq!(roots, expected);
    }

    #[test]
    fn query_by_slot_range() {
        let db = BeaconDb::memory();
        let parent = Hash256::repeat_byte(0xaa);

        let roots: Vec<Hash256> = (1..=5)
            .map(|slot| db.put_block(&block(slot, parent)).unwrap())
            .collect();

        let found = db
            .block_roots(
                &BlockFilter::new()
                    .with_start_slot(Slot::new(2))
                    .with_end_slot(Slot::new(4)),
            )
            .unwrap();
        assert_eq!(found.len(), 3);
        for root in &roots[1..4] {
            assert!(found.contains(root));
        }
    }

    #[test]
    fn query_intersects_criteria() {
        let db = BeaconDb::memory();
        let parent = Hash256::repeat_byte(0xaa);

        let child_in_range = db.put_block(&block(2, parent)).unwrap();
        // Same parent, outside the slot range.
        db.put_block(&block(9, parent)).unwrap();
        // In the slot range, different parent.
        db.put_block(&block(2, Hash256::repeat_byte(0xbb))).unwrap();

        let found = db
            .block_roots(
                &BlockFilter::new()
                    .with_parent_root(parent)
                    .with_start_slot(Slot::new(1))
                    .with_end_slot(Slot::new(5)),
            )
            .unwrap();
        assert_eq!(found, vec![child_in_range]);
    }

    #[test]
    fn empty_filter_returns_all_blocks() {
        let db = BeaconDb::memory();
        db.put_block(&block(1, Hash256::repeat_byte(1))).unwrap();
        db.put_block(&block(2, Hash256::repeat_byte(2))).unwrap();

        assert_eq!(db.blocks(&BlockFilter::new()).unwrap().len(), 2);
    }

    #[test]
    fn batched_puts_index_all_blocks() {
        let db = BeaconDb::memory();
        let parent = Hash256::repeat_byte(0xaa);

        let batch = vec![
            block_with_graffiti(1, parent, 1),
            block_with_graffiti(1, parent, 2),
        ];
        db.put_blocks(&batch).unwrap();

        let children = db
            .block_roots(&BlockFilter::new().with_parent_root(parent))
            .unwrap();
        assert_eq!(children.len(), 2);

        let at_slot = db
            .block_roots(
                &BlockFilter::new()
                    .with_start_slot(Slot::new(1))
                    .with_end_slot(Slot::new(1)),
            )
            .unwrap();
        assert_eq!(at_slot.len(), 2);
    }

    #[test]
    fn put_block_is_idempotent() {
        let db = BeaconDb::memory();
        let block = block(1, Hash256::repeat_byte(0xaa));

        let root = db.put_block(&block).unwrap();
        assert_eq!(db.put_block(&block).unwrap(), root);

        let children = db
            .block_roots(&BlockFilter::new().with_parent_root(block.parent_root))
            .unwrap();
        assert_eq!(children, vec![root]);
    }

    #[test]
    fn head_root_round_trip() {
        let db = BeaconDb::memory();
        assert_eq!(db.head_block_root().unwrap(), None);

        let root = Hash256::repeat_byte(0x1f);
        db.put_head_block_root(root).unwrap();
        assert_eq!(db.head_block_root().unwrap(), Some(root));
    }

    #[test]
    fn latest_vote_never_regresses() {
        let db = BeaconDb::memory();

        let newer = LatestVote {
            epoch: Epoch::new(5),
            root: Hash256::repeat_byte(1),
        };
        let older = LatestVote {
            epoch: Epoch::new(3),
            root: Hash256::repeat_byte(2),
        };

        db.put_latest_vote(0, newer).unwrap();
        db.put_latest_vote(0, older).unwrap();
        assert_eq!(db.latest_vote(0).unwrap(), Some(newer));

        let newest = LatestVote {
            epoch: Epoch::new(6),
            root: Hash256::repeat_byte(3),
        };
        db.put_latest_vote(0, newest).unwrap();
        assert_eq!(db.latest_vote(0).unwrap(), Some(newest));
    }

    #[test]
    fn prune_states_deletes_older_than_finalized_slot() {
        let db = BeaconDb::memory();

        for slot in 0..4u64 {
            let state = BeaconState {
                slot: Slot::new(slot),
                ..BeaconState::default()
            };
            db.put_state(&state, Hash256::repeat_byte(slot as u8)).unwrap();
        }

        let pruned = db.prune_states(Slot::new(2)).unwrap();
        assert_eq!(pruned, 2);

        assert!(db.state(Hash256::repeat_byte(0)).unwrap().is_none());
        assert!(db.state(Hash256::repeat_byte(1)).unwrap().is_none());
        assert!(db.state(Hash256::repeat_byte(2)).unwrap().is_some());
        assert!(db.state(Hash256::repeat_byte(3)).unwrap().is_some());
    }
}
