//! # Git Engine
//!
//! The façade over `CommitStore` + `ReferenceTable`. Every mutation goes
//! through here, and every mutation is all-or-nothing: inputs are resolved
//! and validated first, the graph is touched last.
//!
//! ## HEAD transitions
//!
//! | operation       | Attached(b)                  | Detached(c)               |
//! |-----------------|------------------------------|---------------------------|
//! | `commit`        | b advances                   | HEAD moves to new commit  |
//! | `reset`         | b moves to target            | HEAD moves to target      |
//! | `merge`         | b advances to merge commit   | HEAD moves to merge commit|
//! | `checkout`      | attach or detach             | attach or detach          |
//! | `create_branch` | unchanged                    | unchanged                 |
//!
//! Every snapshot going in or out is cloned; nothing returned aliases a
//! stored commit.

use crate::clock::{Clock, SystemClock};
use crate::digest;
use crate::export::GraphDocument;
use crate::gc::{self, GcReport};
use crate::graph::{CommitStore, Graph, ReferenceTable};
use crate::primitives::{BRANCH_PALETTE, DEFAULT_BRANCH, HEAD_TOKEN, MAX_BRANCH_NAME_LENGTH};
use crate::revision::resolve_commit;
use crate::types::{Commit, CommitId, Head, ResetMode, Snapshot, WorldSnapshot, WorldlineError};
use std::sync::Arc;

/// Message of the root commit created by `GitEngine::new`.
const ROOT_MESSAGE: &str = "Initial state";

/// Status returned by a merge that changes nothing.
pub const MERGE_UP_TO_DATE: &str = "Already up to date.";

/// Check that `name` is usable as a branch name.
///
/// Rejects empty names, whitespace and control characters, the revision
/// operators `~ ^ :`, `..`, a leading `-`, and the reserved `HEAD`.
pub fn validate_branch_name(name: &str) -> Result<(), WorldlineError> {
    let invalid = name.is_empty()
        || name.len() > MAX_BRANCH_NAME_LENGTH
        || name == HEAD_TOKEN
        || name.starts_with('-')
        || name.contains("..")
        || name
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '~' | '^' | ':' | '"'));

    if invalid {
        return Err(WorldlineError::InvalidBranchName(name.to_string()));
    }
    Ok(())
}

/// The version-control engine for one session.
///
/// A plain owned value: construct it once, pass it by reference, drop it
/// when the session ends. It performs no internal locking; callers that
/// share it across tasks must serialize access themselves.
#[derive(Debug, Clone)]
pub struct GitEngine<S: Snapshot = WorldSnapshot> {
    graph: Graph<S>,
    clock: Arc<dyn Clock>,
}

impl<S: Snapshot> GitEngine<S> {
    /// Initialize a graph from `snapshot` using the system clock.
    ///
    /// Creates a root commit, a `main` branch on it, and attaches HEAD.
    pub fn new(snapshot: &S) -> Result<Self, WorldlineError> {
        Self::with_clock(snapshot, Arc::new(SystemClock))
    }

    /// Initialize a graph from `snapshot` using the given clock.
    pub fn with_clock(snapshot: &S, clock: Arc<dyn Clock>) -> Result<Self, WorldlineError> {
        let mut engine = Self {
            graph: Graph::from_parts(
                CommitStore::new(),
                ReferenceTable::attached_to(DEFAULT_BRANCH),
            ),
            clock,
        };

        let root = engine.record_commit(ROOT_MESSAGE, Vec::new(), snapshot.clone())?;
        engine.graph.refs.set_branch(DEFAULT_BRANCH, root.clone());
        engine.graph.refs.set_color(DEFAULT_BRANCH, BRANCH_PALETTE[0]);

        tracing::info!(root = %root.short(), "initialized commit graph");
        Ok(engine)
    }

    /// Build an engine from an exported document.
    pub fn from_document(
        document: GraphDocument<S>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, WorldlineError> {
        Ok(Self {
            graph: document.into_graph()?,
            clock,
        })
    }

    // =========================================================================
    // READ SURFACE
    // =========================================================================

    /// Read-only view of the whole graph.
    #[must_use]
    pub fn graph(&self) -> &Graph<S> {
        &self.graph
    }

    /// The current HEAD reference.
    #[must_use]
    pub fn head(&self) -> &Head {
        self.graph.head()
    }

    /// The branch HEAD is attached to.
    #[must_use]
    pub fn current_branch(&self) -> Option<&str> {
        self.graph.head().branch()
    }

    /// Id of the commit HEAD resolves to.
    #[must_use]
    pub fn current_commit_id(&self) -> Option<&CommitId> {
        self.graph.head_id()
    }

    /// A copy of the snapshot HEAD resolves to.
    pub fn current_state(&self) -> Result<S, WorldlineError> {
        self.graph
            .head_commit()
            .map(|c| c.snapshot.clone())
            .ok_or(WorldlineError::EmptyStore)
    }

    /// Branches in name order.
    pub fn branches(&self) -> impl Iterator<Item = (&str, &CommitId)> {
        self.graph.refs.branches()
    }

    /// Branch names in name order.
    #[must_use]
    pub fn branch_names(&self) -> Vec<String> {
        self.branches().map(|(name, _)| name.to_string()).collect()
    }

    /// Display color of a branch.
    #[must_use]
    pub fn branch_color(&self, name: &str) -> Option<&str> {
        self.graph.refs.color(name)
    }

    /// Lookup a commit by id.
    #[must_use]
    pub fn commit_record(&self, id: &CommitId) -> Option<&Commit<S>> {
        self.graph.commit(id)
    }

    /// Number of commits in the store.
    #[must_use]
    pub fn commit_count(&self) -> usize {
        self.graph.store.len()
    }

    /// First-parent history from HEAD, newest first.
    #[must_use]
    pub fn log(&self, limit: usize) -> Vec<&Commit<S>> {
        let mut history = Vec::new();
        let mut cursor = self.graph.head_commit();
        while let Some(commit) = cursor {
            if history.len() >= limit {
                break;
            }
            history.push(commit);
            cursor = commit.first_parent().and_then(|p| self.graph.commit(p));
        }
        history
    }

    // =========================================================================
    // MUTATIONS
    // =========================================================================

    /// Capture `snapshot` as a new commit on top of HEAD.
    pub fn commit(&mut self, message: &str, snapshot: &S) -> Result<CommitId, WorldlineError> {
        let parent = self
            .graph
            .head_id()
            .cloned()
            .ok_or(WorldlineError::EmptyStore)?;

        let id = self.record_commit(message, vec![parent], snapshot.clone())?;
        self.graph.refs.advance_head(id.clone());

        tracing::info!(
            commit = %id.short(),
            head = %self.graph.head().label(),
            "commit created"
        );
        Ok(id)
    }

    /// Create a branch at the commit HEAD resolves to.
    pub fn create_branch(&mut self, name: &str) -> Result<(), WorldlineError> {
        validate_branch_name(name)?;
        if self.graph.refs.contains_branch(name) {
            return Err(WorldlineError::DuplicateBranch(name.to_string()));
        }
        let target = self
            .graph
            .head_id()
            .cloned()
            .ok_or(WorldlineError::EmptyStore)?;

        let color = BRANCH_PALETTE[self.graph.refs.branch_count() % BRANCH_PALETTE.len()];
        self.graph.refs.set_branch(name, target.clone());
        self.graph.refs.set_color(name, color);

        tracing::info!(branch = name, at = %target.short(), color, "branch created");
        Ok(())
    }

    /// Point HEAD at a branch (attached) or a commit (detached).
    ///
    /// Branch names win over commit ids. Returns a copy of the snapshot HEAD
    /// now resolves to.
    pub fn checkout(&mut self, target: &str) -> Result<S, WorldlineError> {
        if target == HEAD_TOKEN {
            return self.current_state();
        }

        let head = if self.graph.refs.contains_branch(target) {
            Head::Attached(target.to_string())
        } else {
            Head::Detached(resolve_commit(&self.graph, target)?)
        };

        let snapshot = match &head {
            Head::Attached(name) => self.graph.refs.branch(name),
            Head::Detached(id) => Some(id),
        }
        .and_then(|id| self.graph.commit(id))
        .map(|c| c.snapshot.clone())
        .ok_or_else(|| WorldlineError::TargetNotFound(target.to_string()))?;

        tracing::info!(%head, "checkout");
        self.graph.refs.set_head(head);
        Ok(snapshot)
    }

    /// `checkout -b`: create a branch at HEAD, then attach HEAD to it.
    ///
    /// If creation fails no checkout is attempted.
    pub fn checkout_new_branch(&mut self, name: &str) -> Result<S, WorldlineError> {
        self.create_branch(name)?;
        self.checkout(name)
    }

    /// Move HEAD (or the branch it follows) to `target`.
    ///
    /// Soft keeps the live position; hard restores the commit exactly and
    /// then collects unreachable commits.
    pub fn reset(&mut self, target: &str, mode: ResetMode, live: &S) -> Result<S, WorldlineError> {
        let target_id = resolve_commit(&self.graph, target)?;
        let restored = self
            .graph
            .commit(&target_id)
            .map(|c| c.snapshot.clone())
            .ok_or_else(|| WorldlineError::TargetNotFound(target.to_string()))?;

        self.graph.refs.advance_head(target_id.clone());
        tracing::info!(target = %target_id.short(), %mode, "reset");

        match mode {
            ResetMode::Soft => Ok(restored.with_position(live.position())),
            ResetMode::Hard => {
                self.garbage_collect();
                Ok(restored)
            }
        }
    }

    /// Merge `branch` into HEAD and delete `branch`.
    ///
    /// Topology only: the merge commit carries HEAD's snapshot unchanged.
    pub fn merge(&mut self, branch: &str) -> Result<String, WorldlineError> {
        let theirs = self
            .graph
            .refs
            .branch(branch)
            .cloned()
            .ok_or_else(|| WorldlineError::BranchNotFound(branch.to_string()))?;
        let ours = self
            .graph
            .head_commit()
            .ok_or(WorldlineError::EmptyStore)?;

        if ours.id == theirs {
            tracing::debug!(branch, "merge is a no-op");
            return Ok(MERGE_UP_TO_DATE.to_string());
        }

        let label = self.graph.head().label().to_string();
        let message = format!("Merge branch '{}' into {}", branch, label);
        let parents = vec![ours.id.clone(), theirs];
        let snapshot = ours.snapshot.clone();

        let id = self.record_commit(&message, parents, snapshot)?;
        self.graph.refs.advance_head(id.clone());
        self.graph.refs.remove_branch(branch);

        tracing::info!(branch, into = %label, commit = %id.short(), "merge complete");
        Ok(format!("Merged '{}' into {} ({})", branch, label, id.short()))
    }

    /// Mark-and-sweep unreachable commits.
    pub fn garbage_collect(&mut self) -> GcReport {
        let report = gc::collect_garbage(&mut self.graph);
        if !report.is_noop() {
            tracing::info!(
                removed = report.removed.len(),
                retained = report.retained,
                "collected unreachable commits"
            );
        }
        report
    }

    // =========================================================================
    // EXPORT / IMPORT
    // =========================================================================

    /// Snapshot the whole graph as one document.
    #[must_use]
    pub fn export(&self) -> GraphDocument<S> {
        GraphDocument::from_graph(&self.graph)
    }

    /// Replace the whole graph with `document`.
    ///
    /// Validation happens before the swap; on failure the live graph is
    /// untouched.
    pub fn import(&mut self, document: GraphDocument<S>) -> Result<S, WorldlineError> {
        let graph = document.into_graph()?;
        let snapshot = graph
            .head_commit()
            .map(|c| c.snapshot.clone())
            .ok_or_else(|| WorldlineError::ImportMalformed("HEAD does not resolve".to_string()))?;

        tracing::info!(
            commits = graph.store().len(),
            branches = graph.refs().branch_count(),
            "graph imported"
        );
        self.graph = graph;
        Ok(snapshot)
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    /// Build, hash, and insert a commit. Does not move any reference.
    fn record_commit(
        &mut self,
        message: &str,
        parents: Vec<CommitId>,
        snapshot: S,
    ) -> Result<CommitId, WorldlineError> {
        let timestamp = self
            .clock
            .now_millis()
            .max(self.graph.store.latest_timestamp());
        let sequence = self.graph.store.next_sequence();
        let id = digest::commit_id(&parents, message, &snapshot, timestamp, sequence)?;

        self.graph.store.insert(Commit {
            id: id.clone(),
            message: message.to_string(),
            parents,
            timestamp,
            branch: self.graph.head().label().to_string(),
            sequence,
            snapshot,
        })?;
        Ok(id)
    }
}

// =============================================================================
// TESTS
// =============================================================================
