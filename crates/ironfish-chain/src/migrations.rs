//! The canonical migration list of the blockchain database.

use ironfish_store::{
    DatabaseKind,
    Migration,
    MigrationSchedule,
    NullValue,
    StoreError,
    TxRead,
    WriteTx,
};

use crate::schema::{HEADERS, SEQUENCE_TO_HASHES};

/// Returns the migration schedule for the blockchain database.
pub fn blockchain_schedule() -> MigrationSchedule {
    MigrationSchedule::new(vec![
        Box::new(InitialSchema),
        Box::new(RebuildSequenceIndex),
    ])
    .expect("the canonical migration list is ordered")
}

// 0001 INITIAL SCHEMA
// ================================================================================================

/// Marks the initial schema. Stores are created at open, so there is nothing to do beyond
/// recording the version.
struct InitialSchema;

impl Migration for InitialSchema {
    fn id(&self) -> u32 {
        1
    }

    fn name(&self) -> &'static str {
        "initial-schema"
    }

    fn database(&self) -> DatabaseKind {
        DatabaseKind::Blockchain
    }

    fn forward(&self, _tx: &WriteTx, _dry_run: bool) -> Result<(), StoreError> {
        Ok(())
    }

    fn backward(&self, _tx: &WriteTx, _dry_run: bool) -> Result<(), StoreError> {
        Ok(())
    }
}

// 0002 REBUILD SEQUENCE INDEX
// ================================================================================================

/// Rebuilds the sequence→hashes multimap from the header store.
///
/// An earlier format only indexed main-chain blocks; the index must cover every fork so that
/// sequence lookups see competing blocks.
struct RebuildSequenceIndex;

impl Migration for RebuildSequenceIndex {
    fn id(&self) -> u32 {
        2
    }

    fn name(&self) -> &'static str {
        "rebuild-sequence-index"
    }

    fn database(&self) -> DatabaseKind {
        DatabaseKind::Blockchain
    }

    fn forward(&self, tx: &WriteTx, _dry_run: bool) -> Result<(), StoreError> {
        tx.clear(&SEQUENCE_TO_HASHES)?;
        for entry in tx.iter(&HEADERS)? {
            let (hash, record) = entry?;
            tx.put(&SEQUENCE_TO_HASHES, &(record.header.sequence(), hash), &NullValue)?;
        }
        Ok(())
    }

    fn backward(&self, tx: &WriteTx, _dry_run: bool) -> Result<(), StoreError> {
        tx.clear(&SEQUENCE_TO_HASHES)
    }
}
