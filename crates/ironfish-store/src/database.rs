use core::marker::PhantomData;
use std::path::Path;

use redb::{ReadableTable, TableDefinition};
use tracing::debug;

use crate::errors::StoreError;
use crate::key::{StoreKey, decode_key, prefix_successor};
use crate::migration::{DatabaseKind, MigrationSchedule};
use crate::store::StoreDef;
use crate::value::StoreValue;

/// The table holding database-level scalars, currently only the schema version.
const META_TABLE: TableDefinition<'static, &'static [u8], &'static [u8]> =
    TableDefinition::new("__database_meta");

const VERSION_KEY: &[u8] = b"version";

// DATABASE
// ================================================================================================

/// A database owning a set of typed stores and a schema version.
///
/// All writes go through [`WriteTx`]; a write transaction either commits as a whole or leaves no
/// trace. Readers observe a consistent snapshot taken when the read transaction begins.
#[derive(Debug)]
pub struct Database {
    inner: redb::Database,
    version: u32,
}

impl Database {
    /// Opens or creates the database at `path`, pre-creating `stores` and bringing the schema up
    /// to date by running every unapplied migration in `schedule` for this `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::VersionMismatch`] if the on-disk version is newer than the highest
    /// migration known to this build.
    pub fn open(
        path: impl AsRef<Path>,
        kind: DatabaseKind,
        stores: &[&'static str],
        schedule: &MigrationSchedule,
    ) -> Result<Self, StoreError> {
        let inner = redb::Database::create(path)?;

        // Tables must exist before any read transaction may open them.
        let tx = inner.begin_write()?;
        tx.open_table(META_TABLE)?;
        for store in stores {
            let def: TableDefinition<'static, &'static [u8], &'static [u8]> =
                TableDefinition::new(store);
            tx.open_table(def)?;
        }
        tx.commit().map_err(StoreError::TxAborted)?;

        let mut database = Database { inner, version: 0 };
        database.version = database.read_version()?;
        debug!(version = database.version, ?kind, "opened database");

        schedule.apply(&mut database, kind, false)?;
        Ok(database)
    }

    /// Returns the current schema version.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Begins a read transaction observing a consistent snapshot.
    pub fn read(&self) -> Result<ReadTx, StoreError> {
        Ok(ReadTx { inner: self.inner.begin_read()? })
    }

    /// Begins a write transaction.
    pub fn write(&self) -> Result<WriteTx, StoreError> {
        Ok(WriteTx { inner: self.inner.begin_write()? })
    }

    fn read_version(&self) -> Result<u32, StoreError> {
        let tx = self.inner.begin_read()?;
        let table = tx.open_table(META_TABLE)?;
        match table.get(VERSION_KEY)? {
            Some(guard) => {
                let bytes: [u8; 4] = guard.value().try_into().map_err(|_| StoreError::Corrupt {
                    store: "__database_meta",
                    reason: "version is not 4 bytes".into(),
                })?;
                Ok(u32::from_be_bytes(bytes))
            },
            None => Ok(0),
        }
    }

    pub(crate) fn set_version(&mut self, tx: &WriteTx, version: u32) -> Result<(), StoreError> {
        let mut table = tx.inner.open_table(META_TABLE)?;
        table.insert(VERSION_KEY, version.to_be_bytes().as_slice())?;
        self.version = version;
        Ok(())
    }
}

// RAW HELPERS
// ================================================================================================

fn get_raw<T: ReadableTable<&'static [u8], &'static [u8]>>(
    table: &T,
    key: &[u8],
) -> Result<Option<Vec<u8>>, StoreError> {
    Ok(table.get(key)?.map(|guard| guard.value().to_vec()))
}

fn collect_range<T: ReadableTable<&'static [u8], &'static [u8]>>(
    table: &T,
    start: Option<&[u8]>,
    end: Option<&[u8]>,
) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
    let mut entries = Vec::new();
    let range = match (start, end) {
        (Some(start), Some(end)) => table.range::<&[u8]>(start..end)?,
        (Some(start), None) => table.range::<&[u8]>(start..)?,
        (None, Some(end)) => table.range::<&[u8]>(..end)?,
        (None, None) => table.range::<&[u8]>(..)?,
    };
    for entry in range {
        let (key, value) = entry?;
        entries.push((key.value().to_vec(), value.value().to_vec()));
    }
    Ok(entries)
}

fn prefix_bounds(prefix: &[u8]) -> (Option<Vec<u8>>, Option<Vec<u8>>) {
    (Some(prefix.to_vec()), prefix_successor(prefix))
}

fn decode_value<V: StoreValue>(
    store: &'static str,
    bytes: Option<Vec<u8>>,
) -> Result<Option<V>, StoreError> {
    match bytes {
        Some(bytes) => V::from_store_bytes(&bytes)
            .map(Some)
            .map_err(|reason| StoreError::Corrupt { store, reason }),
        None => Ok(None),
    }
}

fn not_found<K: StoreKey>(store: &'static str, key: &K) -> StoreError {
    StoreError::NotFound { store, key: hex::encode(key.encode()) }
}

// STORE ITERATOR
// ================================================================================================

/// An owned, ordered iterator over decoded store entries.
///
/// Entries are captured from the transaction's snapshot when the iterator is created; decoding
/// happens lazily as the iterator is consumed.
pub struct StoreIter<K, V> {
    entries: std::vec::IntoIter<(Vec<u8>, Vec<u8>)>,
    store: &'static str,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K: StoreKey, V: StoreValue> StoreIter<K, V> {
    fn new(store: &'static str, entries: Vec<(Vec<u8>, Vec<u8>)>) -> Self {
        Self { entries: entries.into_iter(), store, _marker: PhantomData }
    }
}

impl<K: StoreKey, V: StoreValue> Iterator for StoreIter<K, V> {
    type Item = Result<(K, V), StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        let (key_bytes, value_bytes) = self.entries.next()?;
        let entry = decode_key::<K>(self.store, &key_bytes).and_then(|key| {
            let value = V::from_store_bytes(&value_bytes)
                .map_err(|reason| StoreError::Corrupt { store: self.store, reason })?;
            Ok((key, value))
        });
        Some(entry)
    }
}

// TX READ
// ================================================================================================

/// Read operations available on both read and write transactions.
///
/// A [`WriteTx`] observes its own uncommitted writes through these; a [`ReadTx`] observes the
/// snapshot it was opened against.
pub trait TxRead {
    /// Returns the value stored under `key`, if any.
    fn get<K: StoreKey, V: StoreValue>(
        &self,
        store: &StoreDef<K, V>,
        key: &K,
    ) -> Result<Option<V>, StoreError>;

    /// Returns true if `key` is present.
    fn has<K: StoreKey, V: StoreValue>(
        &self,
        store: &StoreDef<K, V>,
        key: &K,
    ) -> Result<bool, StoreError>;

    /// Iterates the whole store in key order.
    fn iter<K: StoreKey, V: StoreValue>(
        &self,
        store: &StoreDef<K, V>,
    ) -> Result<StoreIter<K, V>, StoreError>;

    /// Iterates every entry whose key starts with the encoding of `prefix`.
    fn iter_prefix<K: StoreKey, V: StoreValue, P: StoreKey>(
        &self,
        store: &StoreDef<K, V>,
        prefix: &P,
    ) -> Result<StoreIter<K, V>, StoreError>;

    /// Returns the value stored under `key`, failing with [`StoreError::NotFound`] if absent.
    fn require<K: StoreKey, V: StoreValue>(
        &self,
        store: &StoreDef<K, V>,
        key: &K,
    ) -> Result<V, StoreError> {
        self.get(store, key)?.ok_or_else(|| not_found(store.name(), key))
    }
}

// READ TRANSACTION
// ================================================================================================

/// A read-only view of a consistent database snapshot.
pub struct ReadTx {
    inner: redb::ReadTransaction,
}

impl TxRead for ReadTx {
    fn get<K: StoreKey, V: StoreValue>(
        &self,
        store: &StoreDef<K, V>,
        key: &K,
    ) -> Result<Option<V>, StoreError> {
        let table = self.inner.open_table(store.table())?;
        decode_value(store.name(), get_raw(&table, &key.encode())?)
    }

    fn has<K: StoreKey, V: StoreValue>(
        &self,
        store: &StoreDef<K, V>,
        key: &K,
    ) -> Result<bool, StoreError> {
        let table = self.inner.open_table(store.table())?;
        Ok(table.get(key.encode().as_slice())?.is_some())
    }

    fn iter<K: StoreKey, V: StoreValue>(
        &self,
        store: &StoreDef<K, V>,
    ) -> Result<StoreIter<K, V>, StoreError> {
        let table = self.inner.open_table(store.table())?;
        Ok(StoreIter::new(store.name(), collect_range(&table, None, None)?))
    }

    fn iter_prefix<K: StoreKey, V: StoreValue, P: StoreKey>(
        &self,
        store: &StoreDef<K, V>,
        prefix: &P,
    ) -> Result<StoreIter<K, V>, StoreError> {
        let table = self.inner.open_table(store.table())?;
        let (start, end) = prefix_bounds(&prefix.encode());
        Ok(StoreIter::new(store.name(), collect_range(&table, start.as_deref(), end.as_deref())?))
    }
}

// WRITE TRANSACTION
// ================================================================================================

/// A write transaction.
///
/// Writes become visible to other transactions only on [`WriteTx::commit`]; dropping or
/// explicitly aborting the transaction restores the prior state atomically.
pub struct WriteTx {
    pub(crate) inner: redb::WriteTransaction,
}

impl WriteTx {
    /// Stores `value` under `key`, replacing any existing value.
    pub fn put<K: StoreKey, V: StoreValue>(
        &self,
        store: &StoreDef<K, V>,
        key: &K,
        value: &V,
    ) -> Result<(), StoreError> {
        let mut table = self.inner.open_table(store.table())?;
        table.insert(key.encode().as_slice(), value.to_store_bytes().as_slice())?;
        Ok(())
    }

    /// Deletes the value under `key`, if any.
    pub fn del<K: StoreKey, V: StoreValue>(
        &self,
        store: &StoreDef<K, V>,
        key: &K,
    ) -> Result<(), StoreError> {
        let mut table = self.inner.open_table(store.table())?;
        table.remove(key.encode().as_slice())?;
        Ok(())
    }

    /// Deletes every entry with `start <= key < end`, or through the end of the store when `end`
    /// is `None`.
    pub fn clear_range<K: StoreKey, V: StoreValue>(
        &self,
        store: &StoreDef<K, V>,
        start: &K,
        end: Option<&K>,
    ) -> Result<(), StoreError> {
        let mut table = self.inner.open_table(store.table())?;
        let end = end.map(StoreKey::encode);
        let keys: Vec<Vec<u8>> =
            collect_range(&table, Some(&start.encode()), end.as_deref())?
                .into_iter()
                .map(|(key, _)| key)
                .collect();
        for key in keys {
            table.remove(key.as_slice())?;
        }
        Ok(())
    }

    /// Deletes every entry whose key starts with the encoding of `prefix`.
    pub fn clear_prefix<K: StoreKey, V: StoreValue, P: StoreKey>(
        &self,
        store: &StoreDef<K, V>,
        prefix: &P,
    ) -> Result<(), StoreError> {
        let mut table = self.inner.open_table(store.table())?;
        let (start, end) = prefix_bounds(&prefix.encode());
        let keys: Vec<Vec<u8>> = collect_range(&table, start.as_deref(), end.as_deref())?
            .into_iter()
            .map(|(key, _)| key)
            .collect();
        for key in keys {
            table.remove(key.as_slice())?;
        }
        Ok(())
    }

    /// Deletes every entry of the store.
    pub fn clear<K: StoreKey, V: StoreValue>(
        &self,
        store: &StoreDef<K, V>,
    ) -> Result<(), StoreError> {
        self.inner.delete_table(store.table())?;
        self.inner.open_table(store.table())?;
        Ok(())
    }

    /// Commits every write of this transaction atomically.
    pub fn commit(self) -> Result<(), StoreError> {
        self.inner.commit().map_err(StoreError::TxAborted)
    }

    /// Discards every write of this transaction.
    pub fn abort(self) -> Result<(), StoreError> {
        self.inner.abort()?;
        Ok(())
    }
}

impl TxRead for WriteTx {
    fn get<K: StoreKey, V: StoreValue>(
        &self,
        store: &StoreDef<K, V>,
        key: &K,
    ) -> Result<Option<V>, StoreError> {
        let table = self.inner.open_table(store.table())?;
        decode_value(store.name(), get_raw(&table, &key.encode())?)
    }

    fn has<K: StoreKey, V: StoreValue>(
        &self,
        store: &StoreDef<K, V>,
        key: &K,
    ) -> Result<bool, StoreError> {
        let table = self.inner.open_table(store.table())?;
        Ok(table.get(key.encode().as_slice())?.is_some())
    }

    fn iter<K: StoreKey, V: StoreValue>(
        &self,
        store: &StoreDef<K, V>,
    ) -> Result<StoreIter<K, V>, StoreError> {
        let table = self.inner.open_table(store.table())?;
        Ok(StoreIter::new(store.name(), collect_range(&table, None, None)?))
    }

    fn iter_prefix<K: StoreKey, V: StoreValue, P: StoreKey>(
        &self,
        store: &StoreDef<K, V>,
        prefix: &P,
    ) -> Result<StoreIter<K, V>, StoreError> {
        let table = self.inner.open_table(store.table())?;
        let (start, end) = prefix_bounds(&prefix.encode());
        Ok(StoreIter::new(store.name(), collect_range(&table, start.as_deref(), end.as_deref())?))
    }
}

// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::{Database, TxRead};
    use crate::errors::StoreError;
    use crate::migration::{DatabaseKind, MigrationSchedule};
    use crate::store::StoreDef;
    use crate::value::NullValue;

    const NUMBERS: StoreDef<u32, u64> = StoreDef::new("numbers");
    const PAIRS: StoreDef<(u8, u32), u64> = StoreDef::new("pairs");
    const FLAGS: StoreDef<(u32, [u8; 32]), NullValue> = StoreDef::new("flags");

    fn open_database() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(
            dir.path().join("test.redb"),
            DatabaseKind::Blockchain,
            &["numbers", "pairs", "flags"],
            &MigrationSchedule::empty(),
        )
        .unwrap();
        (dir, db)
    }

    #[test]
    fn put_get_round_trip() {
        let (_dir, db) = open_database();

        let tx = db.write().unwrap();
        tx.put(&NUMBERS, &7, &700).unwrap();
        tx.commit().unwrap();

        let tx = db.read().unwrap();
        assert_eq!(tx.get(&NUMBERS, &7).unwrap(), Some(700));
        assert_eq!(tx.get(&NUMBERS, &8).unwrap(), None);
    }

    #[test]
    fn require_distinguishes_absence() {
        let (_dir, db) = open_database();
        let tx = db.read().unwrap();
        assert_matches!(
            tx.require(&NUMBERS, &1).unwrap_err(),
            StoreError::NotFound { store: "numbers", .. }
        );
    }

    #[test]
    fn aborted_writes_are_invisible() {
        let (_dir, db) = open_database();

        let tx = db.write().unwrap();
        tx.put(&NUMBERS, &1, &10).unwrap();
        tx.abort().unwrap();

        let tx = db.read().unwrap();
        assert_eq!(tx.get(&NUMBERS, &1).unwrap(), None);
    }

    #[test]
    fn readers_see_a_snapshot() {
        let (_dir, db) = open_database();

        let tx = db.write().unwrap();
        tx.put(&NUMBERS, &1, &10).unwrap();
        tx.commit().unwrap();

        let reader = db.read().unwrap();
        let writer = db.write().unwrap();
        writer.put(&NUMBERS, &1, &20).unwrap();
        writer.commit().unwrap();

        // The snapshot predates the second commit.
        assert_eq!(reader.get(&NUMBERS, &1).unwrap(), Some(10));
        assert_eq!(db.read().unwrap().get(&NUMBERS, &1).unwrap(), Some(20));
    }

    #[test]
    fn write_tx_observes_own_writes() {
        let (_dir, db) = open_database();
        let tx = db.write().unwrap();
        tx.put(&NUMBERS, &5, &50).unwrap();
        assert_eq!(tx.get(&NUMBERS, &5).unwrap(), Some(50));
        tx.del(&NUMBERS, &5).unwrap();
        assert_eq!(tx.get(&NUMBERS, &5).unwrap(), None);
        tx.abort().unwrap();
    }

    #[test]
    fn iteration_is_key_ordered() {
        let (_dir, db) = open_database();

        let tx = db.write().unwrap();
        for key in [300u32, 1, 200, 2] {
            tx.put(&NUMBERS, &key, &(key as u64)).unwrap();
        }
        tx.commit().unwrap();

        let tx = db.read().unwrap();
        let keys: Vec<u32> = tx.iter(&NUMBERS).unwrap().map(|entry| entry.unwrap().0).collect();
        assert_eq!(keys, vec![1, 2, 200, 300]);
    }

    #[test]
    fn prefix_iteration_scans_leading_component() {
        let (_dir, db) = open_database();

        let tx = db.write().unwrap();
        tx.put(&PAIRS, &(1, 10), &1).unwrap();
        tx.put(&PAIRS, &(1, 20), &2).unwrap();
        tx.put(&PAIRS, &(2, 10), &3).unwrap();
        tx.commit().unwrap();

        let tx = db.read().unwrap();
        let entries: Vec<((u8, u32), u64)> =
            tx.iter_prefix(&PAIRS, &1u8).unwrap().map(|entry| entry.unwrap()).collect();
        assert_eq!(entries, vec![((1, 10), 1), ((1, 20), 2)]);
    }

    #[test]
    fn null_values_give_set_semantics() {
        let (_dir, db) = open_database();

        let tx = db.write().unwrap();
        tx.put(&FLAGS, &(9, [1; 32]), &NullValue).unwrap();
        tx.commit().unwrap();

        let tx = db.read().unwrap();
        assert!(tx.has(&FLAGS, &(9, [1; 32])).unwrap());
        assert!(!tx.has(&FLAGS, &(9, [2; 32])).unwrap());
    }

    #[test]
    fn clear_prefix_leaves_other_prefixes() {
        let (_dir, db) = open_database();

        let tx = db.write().unwrap();
        tx.put(&PAIRS, &(1, 10), &1).unwrap();
        tx.put(&PAIRS, &(1, 20), &2).unwrap();
        tx.put(&PAIRS, &(2, 10), &3).unwrap();
        tx.clear_prefix(&PAIRS, &1u8).unwrap();
        tx.commit().unwrap();

        let tx = db.read().unwrap();
        let entries: Vec<((u8, u32), u64)> =
            tx.iter(&PAIRS).unwrap().map(|entry| entry.unwrap()).collect();
        assert_eq!(entries, vec![((2, 10), 3)]);
    }

    #[test]
    fn clear_range_respects_bounds() {
        let (_dir, db) = open_database();

        let tx = db.write().unwrap();
        for key in 1u32..=6 {
            tx.put(&NUMBERS, &key, &(key as u64)).unwrap();
        }
        tx.clear_range(&NUMBERS, &3, Some(&6)).unwrap();
        tx.commit().unwrap();

        let tx = db.read().unwrap();
        let keys: Vec<u32> = tx.iter(&NUMBERS).unwrap().map(|entry| entry.unwrap().0).collect();
        assert_eq!(keys, vec![1, 2, 6]);
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.redb");

        {
            let db = Database::open(
                &path,
                DatabaseKind::Blockchain,
                &["numbers"],
                &MigrationSchedule::empty(),
            )
            .unwrap();
            let tx = db.write().unwrap();
            tx.put(&NUMBERS, &1, &11).unwrap();
            tx.commit().unwrap();
        }

        let db = Database::open(
            &path,
            DatabaseKind::Blockchain,
            &["numbers"],
            &MigrationSchedule::empty(),
        )
        .unwrap();
        assert_eq!(db.read().unwrap().get(&NUMBERS, &1).unwrap(), Some(11));
    }
}
