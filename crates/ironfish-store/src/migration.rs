use tracing::info;

use crate::database::{Database, WriteTx};
use crate::errors::StoreError;

// DATABASE KIND
// ================================================================================================

/// The logical database a migration applies to.
///
/// The node runs separate databases for the chain and the wallet; a single migration list covers
/// both and the runner filters by kind at open time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseKind {
    Blockchain,
    Wallet,
}

// MIGRATION
// ================================================================================================

/// A single, numbered schema migration.
///
/// Migrations run inside the same write transaction that bumps the stored version, so a crash
/// mid-migration leaves the database at the previous version with no partial writes.
pub trait Migration: Send + Sync {
    /// The version this migration brings the database to. Must be unique and increasing.
    fn id(&self) -> u32;

    /// A short human-readable name for logs.
    fn name(&self) -> &'static str;

    /// The logical database this migration applies to.
    fn database(&self) -> DatabaseKind;

    /// Applies the migration.
    fn forward(&self, tx: &WriteTx, dry_run: bool) -> Result<(), StoreError>;

    /// Reverts the migration.
    fn backward(&self, tx: &WriteTx, dry_run: bool) -> Result<(), StoreError>;
}

// MIGRATION SCHEDULE
// ================================================================================================

/// The ordered list of migrations known to this build.
pub struct MigrationSchedule {
    migrations: Vec<Box<dyn Migration>>,
}

impl std::fmt::Debug for MigrationSchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationSchedule")
            .field("migrations", &self.migrations.iter().map(|m| m.id()).collect::<Vec<_>>())
            .finish()
    }
}

impl MigrationSchedule {
    /// Returns an empty schedule.
    pub fn empty() -> Self {
        Self { migrations: Vec::new() }
    }

    /// Returns a schedule over the provided migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the migrations are not in strictly increasing id order.
    pub fn new(migrations: Vec<Box<dyn Migration>>) -> Result<Self, StoreError> {
        let mut previous = 0;
        for migration in &migrations {
            if migration.id() <= previous {
                return Err(StoreError::MigrationOutOfOrder { id: migration.id(), previous });
            }
            previous = migration.id();
        }
        Ok(Self { migrations })
    }

    /// Returns the version the database ends at after applying every migration for `kind`.
    pub fn latest_version(&self, kind: DatabaseKind) -> u32 {
        self.migrations
            .iter()
            .filter(|migration| migration.database() == kind)
            .map(|migration| migration.id())
            .max()
            .unwrap_or(0)
    }

    /// Runs every unapplied migration for `kind`, bumping the stored version with each.
    ///
    /// With `dry_run` set, each migration executes and is then rolled back, leaving the database
    /// untouched.
    pub fn apply(
        &self,
        database: &mut Database,
        kind: DatabaseKind,
        dry_run: bool,
    ) -> Result<(), StoreError> {
        let supported = self.latest_version(kind);
        if database.version() > supported {
            return Err(StoreError::VersionMismatch {
                stored: database.version(),
                supported,
            });
        }

        for migration in &self.migrations {
            if migration.database() != kind || migration.id() <= database.version() {
                continue;
            }

            info!(id = migration.id(), name = migration.name(), dry_run, "running migration");
            let tx = database.write()?;
            migration.forward(&tx, dry_run)?;

            if dry_run {
                tx.abort()?;
            } else {
                database.set_version(&tx, migration.id())?;
                tx.commit()?;
            }
        }

        Ok(())
    }
}

// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::{DatabaseKind, Migration, MigrationSchedule};
    use crate::database::{Database, TxRead, WriteTx};
    use crate::errors::StoreError;
    use crate::store::StoreDef;

    const MARKS: StoreDef<u32, u32> = StoreDef::new("marks");

    struct MarkMigration {
        id: u32,
        kind: DatabaseKind,
    }

    impl Migration for MarkMigration {
        fn id(&self) -> u32 {
            self.id
        }

        fn name(&self) -> &'static str {
            "mark"
        }

        fn database(&self) -> DatabaseKind {
            self.kind
        }

        fn forward(&self, tx: &WriteTx, _dry_run: bool) -> Result<(), StoreError> {
            tx.put(&MARKS, &self.id, &self.id)
        }

        fn backward(&self, tx: &WriteTx, _dry_run: bool) -> Result<(), StoreError> {
            tx.del(&MARKS, &self.id)
        }
    }

    fn schedule() -> MigrationSchedule {
        MigrationSchedule::new(vec![
            Box::new(MarkMigration { id: 1, kind: DatabaseKind::Blockchain }),
            Box::new(MarkMigration { id: 2, kind: DatabaseKind::Wallet }),
            Box::new(MarkMigration { id: 3, kind: DatabaseKind::Blockchain }),
        ])
        .unwrap()
    }

    #[test]
    fn open_applies_migrations_for_kind_only() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(
            dir.path().join("test.redb"),
            DatabaseKind::Blockchain,
            &["marks"],
            &schedule(),
        )
        .unwrap();

        // The wallet migration is filtered out; version ends at the highest blockchain id.
        assert_eq!(db.version(), 3);
        let tx = db.read().unwrap();
        assert_eq!(tx.get(&MARKS, &1).unwrap(), Some(1));
        assert_eq!(tx.get(&MARKS, &2).unwrap(), None);
        assert_eq!(tx.get(&MARKS, &3).unwrap(), Some(3));
    }

    #[test]
    fn migrations_run_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.redb");

        {
            let db =
                Database::open(&path, DatabaseKind::Blockchain, &["marks"], &schedule()).unwrap();
            let tx = db.write().unwrap();
            // Overwrite a mark so a re-run would be visible.
            tx.put(&MARKS, &1, &99).unwrap();
            tx.commit().unwrap();
        }

        let db = Database::open(&path, DatabaseKind::Blockchain, &["marks"], &schedule()).unwrap();
        assert_eq!(db.read().unwrap().get(&MARKS, &1).unwrap(), Some(99));
    }

    #[test]
    fn newer_database_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.redb");

        {
            Database::open(&path, DatabaseKind::Blockchain, &["marks"], &schedule()).unwrap();
        }

        // A build that only knows migration 1 must refuse a version-3 database.
        let old_schedule = MigrationSchedule::new(vec![Box::new(MarkMigration {
            id: 1,
            kind: DatabaseKind::Blockchain,
        })])
        .unwrap();
        let result = Database::open(&path, DatabaseKind::Blockchain, &["marks"], &old_schedule);
        assert_matches!(
            result.unwrap_err(),
            StoreError::VersionMismatch { stored: 3, supported: 1 }
        );
    }

    #[test]
    fn out_of_order_schedule_is_rejected() {
        let result = MigrationSchedule::new(vec![
            Box::new(MarkMigration { id: 2, kind: DatabaseKind::Blockchain }),
            Box::new(MarkMigration { id: 1, kind: DatabaseKind::Blockchain }),
        ]);
        assert_matches!(result.unwrap_err(), StoreError::MigrationOutOfOrder { id: 1, previous: 2 });
    }

    #[test]
    fn dry_run_leaves_no_trace() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::open(
            dir.path().join("test.redb"),
            DatabaseKind::Blockchain,
            &["marks"],
            &MigrationSchedule::empty(),
        )
        .unwrap();

        schedule().apply(&mut db, DatabaseKind::Blockchain, true).unwrap();
        assert_eq!(db.version(), 0);
        assert_eq!(db.read().unwrap().get(&MARKS, &1).unwrap(), None);
    }
}
