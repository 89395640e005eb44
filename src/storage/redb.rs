//! ReDB storage for recovery state.
//!
//! The whole registry is stored as one JSON document under a fixed key, so
//! every save is a single atomic write transaction.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, TableDefinition};

use crate::error::{RecoveryError, RecoveryResult};
use crate::recovery::types::RecoverySnapshot;
use crate::storage::StateStore;

const RECOVERY_STATE: TableDefinition<&str, &[u8]> = TableDefinition::new("recovery_state");

const CURRENT_KEY: &str = "current";

/// Storage wrapper for ReDB. Clone is cheap.
#[derive(Clone)]
pub struct Storage {
    db: Arc<Database>,
}

impl Storage {
    /// Open or create a database at `path`, creating parent directories.
    pub fn open(path: &Path) -> RecoveryResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::create(path).map_err(|e| RecoveryError::Storage(e.to_string()))?;
        let storage = Self::init(db)?;

        tracing::info!(path = %path.display(), "Opened recovery database");
        Ok(storage)
    }

    /// Open a throwaway in-memory database.
    pub fn open_memory() -> RecoveryResult<Self> {
        let db = Database::builder()
            .create_with_backend(redb::backends::InMemoryBackend::new())
            .map_err(|e| RecoveryError::Storage(e.to_string()))?;
        Self::init(db)
    }

    fn init(db: Database) -> RecoveryResult<Self> {
        let write_txn = db.begin_write()?;
        {
            // opening creates the table
            let _ = write_txn.open_table(RECOVERY_STATE)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Remove the stored snapshot. Returns whether one existed.
    #[cfg(test)]
    pub fn clear(&self) -> RecoveryResult<bool> {
        let write_txn = self.db.begin_write()?;
        let deleted = {
            let mut table = write_txn.open_table(RECOVERY_STATE)?;
            table.remove(CURRENT_KEY)?.is_some()
        };
        write_txn.commit()?;
        Ok(deleted)
    }
}

impl StateStore for Storage {
    fn load(&self) -> RecoveryResult<Option<RecoverySnapshot>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(RECOVERY_STATE)?;

        match table.get(CURRENT_KEY)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    fn save(&self, snapshot: &RecoverySnapshot) -> RecoveryResult<()> {
        let value = zeroize::Zeroizing::new(serde_json::to_vec(snapshot)?);
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(RECOVERY_STATE)?;
            table.insert(CURRENT_KEY, value.as_slice())?;
        }
        write_txn.commit()?;
        tracing::debug!(bytes = value.len(), "Stored recovery snapshot");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;
    use crate::error::RecoveryResult;
    use crate::recovery::events::{RecoveryEvent, RecoveryEventType};

    #[test]
    fn test_empty_store_loads_nothing() -> RecoveryResult<()> {
        let storage = Storage::open_memory()?;
        assert!(storage.load()?.is_none());
        Ok(())
    }

    #[test]
    fn test_save_and_load() -> RecoveryResult<()> {
        let storage = Storage::open_memory()?;
        let mut snapshot = RecoverySnapshot::default();
        snapshot.events.push(RecoveryEvent::new(
            RecoveryEventType::StateImported,
            Utc::now(),
            json!({ "guardians": 0 }),
            None,
        ));

        storage.save(&snapshot)?;
        assert_eq!(storage.load()?, Some(snapshot));

        assert!(storage.clear()?);
        assert!(storage.load()?.is_none());
        assert!(!storage.clear()?);
        Ok(())
    }

    #[test]
    fn test_open_creates_parent_directories() -> RecoveryResult<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join("recovery.redb");

        let storage = Storage::open(&path)?;
        storage.save(&RecoverySnapshot::default())?;
        drop(storage);

        let reopened = Storage::open(&path)?;
        assert_eq!(reopened.load()?, Some(RecoverySnapshot::default()));
        Ok(())
    }
}
