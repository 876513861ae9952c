use crate::leveldb_store::BytesKey;
use crate::{get_key_for_col, DBColumn, Error, KeyValueStore, KeyValueStoreOp};
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::collections::BTreeMap;

type DBMap = BTreeMap<BytesKey, Vec<u8>>;

/// A thread-safe `BTreeMap` wrapper.
pub struct MemoryStore {
    db: RwLock<DBMap>,
    transaction_mutex: Mutex<()>,
}

impl MemoryStore {
    /// Create a new, empty database.
    pub fn open() -> Self {
        Self {
            db: RwLock::new(BTreeMap::new()),
            transaction_mutex: Mutex::new(()),
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get_bytes(&self, col: &str, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        let column_key = BytesKey::from_vec(get_key_for_col(col, key));
        Ok(self.db.read().get(&column_key).cloned())
    }

    fn put_bytes(&self, col: &str, key: &[u8], val: &[u8]) -> Result<(), Error> {
        let column_key = BytesKey::from_vec(get_key_for_col(col, key));
        self.db.write().insert(column_key, val.to_vec());
        Ok(())
    }

    fn key_exists(&self, col: &str, key: &[u8]) -> Result<bool, Error> {
        let column_key = BytesKey::from_vec(get_key_for_col(col, key));
        Ok(self.db.read().contains_key(&column_key))
    }

    fn key_delete(&self, col: &str, key: &[u8]) -> Result<(), Error> {
        let column_key = BytesKey::from_vec(get_key_for_col(col, key));
        self.db.write().remove(&column_key);
        Ok(())
    }

    fn do_atomically(&self, batch: Vec<KeyValueStoreOp>) -> Result<(), Error> {
        // A single write lock held across the batch makes it atomic with
        // respect to readers.
        let mut db = self.db.write();
        for op in batch {
            match op {
                KeyValueStoreOp::PutKeyValue(key, value) => {
                    db.insert(BytesKey::from_vec(key), value);
                }
                KeyValueStoreOp::DeleteKey(key) => {
                    db.remove(&BytesKey::from_vec(key));
                }
            }
        }
        Ok(())
    }

    fn iter_column_keys_from(
        &self,
        column: DBColumn,
        from: &[u8],
    ) -> Box<dyn Iterator<Item = Result<Vec<u8>, Error>> + '_> {
        // Collect up-front: the lock guard cannot be held across calls to
        // `.next()` without a self-referential struct.
        let start_key = BytesKey::from_vec(get_key_for_col(column.as_str(), from));
        let keys = self
            .db
            .read()
            .range(start_key..)
            .map(|(k, _)| k.clone())
            .take_while(|k| k.matches_column(column))
            .filter_map(|k| k.remove_column(column))
            .collect::<Vec<_>>();
        Box::new(keys.into_iter().map(Ok))
    }

    fn begin_rw_transaction(&self) -> MutexGuard<'_, ()> {
        self.transaction_mutex.lock()
    }
}
