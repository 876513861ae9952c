use crate::{get_key_for_col, DBColumn, Error, KeyValueStore, KeyValueStoreOp};
use db_key::Key;
use leveldb::database::batch::{Batch, Writebatch};
use leveldb::database::kv::KV;
use leveldb::database::Database;
use leveldb::error::Error as LevelDBError;
use leveldb::iterator::{Iterable, LevelDBIterator};
use leveldb::options::{Options, ReadOptions, WriteOptions};
use parking_lot::{Mutex, MutexGuard};
use std::path::Path;

/// A wrapped leveldb database.
pub struct LevelDB {
    db: Database<BytesKey>,
    /// A mutex to synchronise sensitive read-write transactions.
    transaction_mutex: Mutex<()>,
}

impl LevelDB {
    /// Open a database at `path`, creating a new database if one does not
    /// already exist.
    pub fn open(path: &Path) -> Result<Self, Error> {
        let mut options = Options::new();
        options.create_if_missing = true;

        let db = Database::open(path, options)?;

        Ok(Self {
            db,
            transaction_mutex: Mutex::new(()),
        })
    }

    fn read_options(&self) -> ReadOptions<BytesKey> {
        ReadOptions::new()
    }

    fn write_options(&self) -> WriteOptions {
        WriteOptions::new()
    }

    fn write_options_sync(&self) -> WriteOptions {
        let mut opts = WriteOptions::new();
        opts.sync = true;
        opts
    }
}

impl KeyValueStore for LevelDB {
    fn get_bytes(&self, col: &str, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        let column_key = get_key_for_col(col, key);

        self.db
            .get(self.read_options(), BytesKey::from_vec(column_key))
            .map_err(Into::into)
    }

    fn put_bytes(&self, col: &str, key: &[u8], val: &[u8]) -> Result<(), Error> {
        let column_key = get_key_for_col(col, key);

        self.db
            .put(self.write_options_sync(), BytesKey::from_vec(column_key), val)
            .map_err(Into::into)
    }

    fn key_exists(&self, col: &str, key: &[u8]) -> Result<bool, Error> {
        let column_key = get_key_for_col(col, key);

        self.db
            .get(self.read_options(), BytesKey::from_vec(column_key))
            .map_err(Into::into)
            .map(|val| val.is_some())
    }

    fn key_delete(&self, col: &str, key: &[u8]) -> Result<(), Error> {
        let column_key = get_key_for_col(col, key);

        self.db
            .delete(self.write_options(), BytesKey::from_vec(column_key))
            .map_err(Into::into)
    }

    fn do_atomically(&self, ops_batch: Vec<KeyValueStoreOp>) -> Result<(), Error> {
        let mut leveldb_batch = Writebatch::new();
        for op in ops_batch {
            match op {
                KeyValueStoreOp::PutKeyValue(key, value) => {
                    leveldb_batch.put(BytesKey::from_vec(key), &value);
                }
                KeyValueStoreOp::DeleteKey(key) => {
                    leveldb_batch.delete(BytesKey::from_vec(key));
                }
            }
        }
        self.db
            .write(self.write_options_sync(), &leveldb_batch)
            .map_err(Into::into)
    }

    fn iter_column_keys_from(
        &self,
        column: DBColumn,
        from: &[u8],
    ) -> Box<dyn Iterator<Item = Result<Vec<u8>, Error>> + '_> {
        let start_key = BytesKey::from_vec(get_key_for_col(column.as_str(), from));

        let iter = self.db.keys_iter(self.read_options());
        iter.seek(&start_key);

        Box::new(
            iter.take_while(move |key| key.matches_column(column))
                .filter_map(move |key| key.remove_column(column).map(Ok)),
        )
    }

    fn begin_rw_transaction(&self) -> MutexGuard<'_, ()> {
        self.transaction_mutex.lock()
    }
}

impl From<LevelDBError> for Error {
    fn from(e: LevelDBError) -> Error {
        Error::DBError {
            message: format!("{:?}", e),
        }
    }
}

/// Used for keying leveldb.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct BytesKey {
    key: Vec<u8>,
}

impl Key for BytesKey {
    fn from_u8(key: &[u8]) -> Self {
        Self { key: key.to_vec() }
    }

    fn as_slice<T, F: Fn(&[u8]) -> T>(&self, f: F) -> T {
        f(self.key.as_slice())
    }
}

impl BytesKey {
    /// Return `true` iff this `BytesKey` was created with the given `column`.
    pub fn matches_column(&self, column: DBColumn) -> bool {
        self.key.starts_with(column.as_bytes())
    }

    /// Remove the column prefix from a key, returning the remainder.
    pub fn remove_column(&self, column: DBColumn) -> Option<Vec<u8>> {
        if self.matches_column(column) {
            Some(self.key[column.as_bytes().len()..].to_vec())
        } else {
            None
        }
    }

    pub fn from_vec(key: Vec<u8>) -> Self {
        Self { key }
    }
}
