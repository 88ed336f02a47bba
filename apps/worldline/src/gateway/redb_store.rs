//! # redb-backed Save Slots
//!
//! Keeps the canonical export of the graph in a redb table, so saves get
//! redb's transactions and crash safety. Each save replaces the whole slot
//! inside one write transaction.

use super::SaveStore;
use redb::{Database, ReadableDatabase, TableDefinition};
use std::path::{Path, PathBuf};
use worldline_core::{
    GraphDocument, WorldSnapshot, WorldlineError, canonical_digest, export_canonical,
    import_canonical,
};

/// Table for saves: slot name -> canonical export bytes
const SAVES: TableDefinition<&str, &[u8]> = TableDefinition::new("saves");

/// Table for save metadata: slot name -> BLAKE3 digest of the export
const DIGESTS: TableDefinition<&str, &str> = TableDefinition::new("digests");

/// Slot used for the live session.
const CURRENT_SLOT: &str = "current";

fn io_error(e: impl std::fmt::Display) -> WorldlineError {
    WorldlineError::IoError(e.to_string())
}

/// A redb database holding saved graphs.
pub struct RedbStore {
    db: Database,
    path: PathBuf,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a save database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, WorldlineError> {
        let path = path.as_ref().to_path_buf();
        let db = Database::create(&path).map_err(io_error)?;

        {
            let write_txn = db.begin_write().map_err(io_error)?;
            let _ = write_txn.open_table(SAVES).map_err(io_error)?;
            let _ = write_txn.open_table(DIGESTS).map_err(io_error)?;
            write_txn.commit().map_err(io_error)?;
        }

        Ok(Self { db, path })
    }

    /// Stored digest of the current slot, if any.
    pub fn digest(&self) -> Result<Option<String>, WorldlineError> {
        let read_txn = self.db.begin_read().map_err(io_error)?;
        let table = read_txn.open_table(DIGESTS).map_err(io_error)?;
        Ok(table
            .get(CURRENT_SLOT)
            .map_err(io_error)?
            .map(|v| v.value().to_string()))
    }
}

impl SaveStore for RedbStore {
    fn name(&self) -> &'static str {
        "redb"
    }

    fn load(&self) -> Result<Option<GraphDocument<WorldSnapshot>>, WorldlineError> {
        let read_txn = self.db.begin_read().map_err(io_error)?;
        let table = read_txn.open_table(SAVES).map_err(io_error)?;
        let Some(bytes) = table
            .get(CURRENT_SLOT)
            .map_err(io_error)?
            .map(|v| v.value().to_vec())
        else {
            return Ok(None);
        };
        import_canonical(&bytes).map(Some)
    }

    fn save(&self, document: &GraphDocument<WorldSnapshot>) -> Result<(), WorldlineError> {
        let bytes = export_canonical(document)?;
        let digest = canonical_digest(document)?;

        let write_txn = self.db.begin_write().map_err(io_error)?;
        {
            let mut saves = write_txn.open_table(SAVES).map_err(io_error)?;
            saves
                .insert(CURRENT_SLOT, bytes.as_slice())
                .map_err(io_error)?;
            let mut digests = write_txn.open_table(DIGESTS).map_err(io_error)?;
            digests
                .insert(CURRENT_SLOT, digest.as_str())
                .map_err(io_error)?;
        }
        write_txn.commit().map_err(io_error)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), WorldlineError> {
        let write_txn = self.db.begin_write().map_err(io_error)?;
        {
            let mut saves = write_txn.open_table(SAVES).map_err(io_error)?;
            saves.remove(CURRENT_SLOT).map_err(io_error)?;
            let mut digests = write_txn.open_table(DIGESTS).map_err(io_error)?;
            digests.remove(CURRENT_SLOT).map_err(io_error)?;
        }
        write_txn.commit().map_err(io_error)?;
        Ok(())
    }
}
