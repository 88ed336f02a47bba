//! # Save Gateway
//!
//! Persistence for the application layer. The core engine never touches
//! disk; a store saves and loads whole exported documents.
//!
//! Backends:
//! - `file`: one canonical export file, replaced atomically on save
//! - `redb`: a redb database slot, with a canonical file as fallback

mod file;
mod redb_store;

pub use file::FileStore;
pub use redb_store::RedbStore;

use crate::config::{Backend, Settings};
use std::path::Path;
use std::sync::Arc;
use worldline_core::{GitEngine, GraphDocument, SystemClock, WorldSnapshot, WorldlineError};

/// Extension used for the file that backs up an unusable redb store.
const FALLBACK_EXTENSION: &str = "fallback.wldx";

/// Somewhere a graph document can be saved and loaded.
pub trait SaveStore: Send + Sync + std::fmt::Debug {
    /// Short backend name for logs and status output.
    fn name(&self) -> &'static str;

    /// Load the saved document, or `None` if nothing was saved yet.
    fn load(&self) -> Result<Option<GraphDocument<WorldSnapshot>>, WorldlineError>;

    /// Replace the saved document.
    fn save(&self, document: &GraphDocument<WorldSnapshot>) -> Result<(), WorldlineError>;

    /// Drop the saved document, so the next `load` returns `None`.
    fn clear(&self) -> Result<(), WorldlineError>;
}

/// A primary store that hands over to a secondary one when it fails.
///
/// The fallback only ever holds a document saved after the primary's last
/// successful save, so a document found there is the newest one.
#[derive(Debug)]
pub struct FallbackStore {
    primary: Box<dyn SaveStore>,
    fallback: Box<dyn SaveStore>,
}

impl FallbackStore {
    pub fn new(primary: Box<dyn SaveStore>, fallback: Box<dyn SaveStore>) -> Self {
        Self { primary, fallback }
    }
}

impl SaveStore for FallbackStore {
    fn name(&self) -> &'static str {
        self.primary.name()
    }

    fn load(&self) -> Result<Option<GraphDocument<WorldSnapshot>>, WorldlineError> {
        match self.fallback.load() {
            Ok(Some(document)) => {
                tracing::info!(
                    fallback = self.fallback.name(),
                    "fallback holds a newer save than the primary"
                );
                return Ok(Some(document));
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(
                    fallback = self.fallback.name(),
                    error = %e,
                    "fallback store failed to load, using primary"
                );
            }
        }

        match self.primary.load() {
            Err(e) => {
                tracing::warn!(
                    primary = self.primary.name(),
                    error = %e,
                    "primary store failed to load and fallback is empty"
                );
                Ok(None)
            }
            loaded => loaded,
        }
    }

    fn save(&self, document: &GraphDocument<WorldSnapshot>) -> Result<(), WorldlineError> {
        if let Err(e) = self.primary.save(document) {
            tracing::warn!(
                primary = self.primary.name(),
                fallback = self.fallback.name(),
                error = %e,
                "primary store failed to save, using fallback"
            );
            return self.fallback.save(document);
        }

        // The primary is current again; a stale fallback must not win a load.
        if let Err(e) = self.fallback.clear() {
            tracing::warn!(
                fallback = self.fallback.name(),
                error = %e,
                "cannot clear fallback, mirroring the save instead"
            );
            return self.fallback.save(document);
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), WorldlineError> {
        self.primary.clear()?;
        self.fallback.clear()
    }
}

/// Open the store described by `settings`.
///
/// A redb database that cannot be opened degrades to a canonical file next
/// to it rather than failing the whole session.
pub fn open_store(settings: &Settings) -> Arc<dyn SaveStore> {
    open_store_at(&settings.store, settings.backend)
}

/// Open a store of the given kind at `path`.
pub fn open_store_at(path: &Path, backend: Backend) -> Arc<dyn SaveStore> {
    match backend {
        Backend::File => Arc::new(FileStore::new(path)),
        Backend::Redb => {
            let fallback = FileStore::new(path.with_extension(FALLBACK_EXTENSION));
            match RedbStore::open(path) {
                Ok(db) => Arc::new(FallbackStore::new(Box::new(db), Box::new(fallback))),
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "cannot open redb store, saving to file instead"
                    );
                    Arc::new(fallback)
                }
            }
        }
    }
}

/// Restore the engine from `store`, or start a fresh graph.
pub fn load_engine(store: &dyn SaveStore) -> Result<GitEngine, WorldlineError> {
    match store.load()? {
        Some(document) => {
            let engine = GitEngine::from_document(document, Arc::new(SystemClock))?;
            tracing::info!(
                store = store.name(),
                commits = engine.commit_count(),
                head = %engine.head(),
                "loaded saved graph"
            );
            Ok(engine)
        }
        None => {
            tracing::info!(store = store.name(), "no saved graph, starting fresh");
            GitEngine::new(&WorldSnapshot::default())
        }
    }
}

/// Save the engine's whole graph to `store`.
pub fn save_engine(store: &dyn SaveStore, engine: &GitEngine) -> Result<(), WorldlineError> {
    store.save(&engine.export())?;
    tracing::debug!(
        store = store.name(),
        commits = engine.commit_count(),
        "saved graph"
    );
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
