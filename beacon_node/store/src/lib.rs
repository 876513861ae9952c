//! Storage for the fork-choice core.
//!
//! Provides the following stores:
//!
//! - `LevelDB`: an on-disk store backed by leveldb. Used in production.
//! - `MemoryStore`: an in-memory store backed by a `BTreeMap`. Used for testing.
//!
//! Both implement `KeyValueStore`; `BeaconDb` layers the block, state, head
//! and vote capability interfaces over either one, maintaining the
//! parent-root and slot secondary indices the fork-choice walk queries.

pub mod errors;
mod beacon_db;
mod filters;
mod impls;
mod leveldb_store;
mod memory_store;

pub use self::beacon_db::{BeaconDb, BlockStore, HeadStore, StateStore, VoteStore};
pub use self::filters::BlockFilter;
pub use self::leveldb_store::LevelDB;
pub use self::memory_store::MemoryStore;
pub use errors::Error;

use parking_lot::MutexGuard;
use ssz::{Decode, Encode};
use types::Hash256;

pub trait KeyValueStore: Sync + Send + Sized + 'static {
    /// Retrieve some bytes in `column` with `key`.
    fn get_bytes(&self, column: &str, key: &[u8]) -> Result<Option<Vec<u8>>, Error>;

    /// Store some `value` in `column`, indexed with `key`.
    fn put_bytes(&self, column: &str, key: &[u8], value: &[u8]) -> Result<(), Error>;

    /// Return `true` if `key` exists in `column`.
    fn key_exists(&self, column: &str, key: &[u8]) -> Result<bool, Error>;

    /// Removes `key` from `column`.
    fn key_delete(&self, column: &str, key: &[u8]) -> Result<(), Error>;

    /// Execute either all of the operations in `batch` or none at all.
    fn do_atomically(&self, batch: Vec<KeyValueStoreOp>) -> Result<(), Error>;

    /// Iterate the keys of `column` (column prefix stripped) in ascending
    /// order, starting at the first key `>= from`.
    fn iter_column_keys_from(
        &self,
        column: DBColumn,
        from: &[u8],
    ) -> Box<dyn Iterator<Item = Result<Vec<u8>, Error>> + '_>;

    /// Return a mutex guard that serializes read-modify-write sequences.
    ///
    /// This doesn't prevent other threads writing to the DB unless they also
    /// use this method.
    fn begin_rw_transaction(&self) -> MutexGuard<'_, ()>;
}

pub fn get_key_for_col(column: &str, key: &[u8]) -> Vec<u8> {
    let mut result = column.as_bytes().to_vec();
    result.extend_from_slice(key);
    result
}

/// Reified key-value storage operation, for atomic batches.
pub enum KeyValueStoreOp {
    PutKeyValue(Vec<u8>, Vec<u8>),
    DeleteKey(Vec<u8>),
}

/// A unique column identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DBColumn {
    /// For data related to the database itself, e.g. the head pointer.
    BeaconMeta,
    BeaconBlock,
    /// States, keyed by the root of the block they result from.
    BeaconState,
    /// Parent root -> set of child block roots.
    BlockParentIndex,
    /// Slot (big-endian u64) -> set of block roots at that slot.
    BlockSlotIndex,
    /// Validator index (big-endian u64) -> latest fork-choice vote.
    ValidatorVote,
}

impl From<DBColumn> for &'static str {
    /// Returns a `&str` prefix to be added to keys before they hit the
    /// key-value database.
    fn from(column: DBColumn) -> &'static str {
        match column {
            DBColumn::BeaconMeta => "bma",
            DBColumn::BeaconBlock => "blk",
            DBColumn::BeaconState => "ste",
            DBColumn::BlockParentIndex => "bpi",
            DBColumn::BlockSlotIndex => "bsi",
            DBColumn::ValidatorVote => "vlv",
        }
    }
}

impl DBColumn {
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    pub fn as_bytes(self) -> &'static [u8] {
        self.as_str().as_bytes()
    }
}

/// An item that may be stored by serializing and deserializing from bytes.
pub trait StoreItem: Sized {
    /// Identifies which column this item should be placed in.
    fn db_column() -> DBColumn;

    /// Serialize `self` as bytes.
    fn as_store_bytes(&self) -> Vec<u8>;

    /// De-serialize `self` from bytes.
    fn from_store_bytes(bytes: &[u8]) -> Result<Self, Error>;
}

/// Store an item keyed by a root.
pub(crate) fn put_item<K: KeyValueStore, I: StoreItem>(
    kv: &K,
    key: &Hash256,
    item: &I,
) -> Result<(), Error> {
    kv.put_bytes(I::db_column().as_str(), key.as_bytes(), &item.as_store_bytes())
}

/// Retrieve an item keyed by a root.
pub(crate) fn get_item<K: KeyValueStore, I: StoreItem>(
    kv: &K,
    key: &Hash256,
) -> Result<Option<I>, Error> {
    match kv.get_bytes(I::db_column().as_str(), key.as_bytes())? {
        Some(bytes) => Ok(Some(I::from_store_bytes(&bytes)?)),
        None => Ok(None),
    }
}

/// The atomic-batch op that stores an item keyed by a root.
pub(crate) fn item_store_op<I: StoreItem>(key: &Hash256, item: &I) -> KeyValueStoreOp {
    let db_key = get_key_for_col(I::db_column().as_str(), key.as_bytes());
    KeyValueStoreOp::PutKeyValue(db_key, item.as_store_bytes())
}

pub(crate) fn ssz_store_bytes<T: Encode>(item: &T) -> Vec<u8> {
    item.as_ssz_bytes()
}

pub(crate) fn ssz_from_store_bytes<T: Decode>(bytes: &[u8]) -> Result<T, Error> {
    T::from_ssz_bytes(bytes).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_impl(store: impl KeyValueStore) {
        let col = DBColumn::BeaconMeta.as_str();
        let key = [0xAA; 32];

        assert_eq!(store.key_exists(col, &key).unwrap(), false);

        store.put_bytes(col, &key, &[1, 2, 3]).unwrap();

        assert_eq!(store.key_exists(col, &key).unwrap(), true);
        assert_eq!(store.get_bytes(col, &key).unwrap().unwrap(), vec![1, 2, 3]);

        store.key_delete(col, &key).unwrap();

        assert_eq!(store.key_exists(col, &key).unwrap(), false);
        assert_eq!(store.get_bytes(col, &key).unwrap(), None);
    }

    fn test_atomicity(store: impl KeyValueStore) {
        let col = DBColumn::BeaconMeta.as_str();

        store.put_bytes(col, b"doomed", &[0]).unwrap();

        let batch = vec![
            KeyValueStoreOp::PutKeyValue(get_key_for_col(col, b"alpha"), vec![1]),
            KeyValueStoreOp::DeleteKey(get_key_for_col(col, b"doomed")),
            KeyValueStoreOp::PutKeyValue(get_key_for_col(col, b"beta"), vec![2]),
        ];
        store.do_atomically(batch).unwrap();

        assert_eq!(store.get_bytes(col, b"alpha").unwrap(), Some(vec![1]));
        assert_eq!(store.get_bytes(col, b"beta").unwrap(), Some(vec![2]));
        assert_eq!(store.get_bytes(col, b"doomed").unwrap(), None);
    }

    #[test]
    fn leveldb() {
        let dir = tempdir().unwrap();
        test_impl(LevelDB::open(dir.path()).unwrap());

        let dir = tempdir().unwrap();
        test_atomicity(LevelDB::open(dir.path()).unwrap());
    }

    #[test]
    fn memorydb() {
        test_impl(MemoryStore::open());
        test_atomicity(MemoryStore::open());
    }
}
