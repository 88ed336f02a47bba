//! # Commit Graph
//!
//! The deterministic storage behind the engine.
//!
//! - `CommitStore` owns the DAG: commit id -> commit record
//! - `ReferenceTable` owns branch pointers, branch colors, and HEAD
//! - `Graph` is the aggregate the engine mutates and readers inspect
//!
//! Commits reference their parents by id, never by pointer, so the DAG is a
//! plain value and can be cloned, swapped, or dropped as a unit. All maps are
//! `BTreeMap` for deterministic iteration.

use crate::types::{Commit, CommitId, Head, WorldlineError};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

// =============================================================================
// COMMIT STORE
// =============================================================================

/// Arena of commit records keyed by id.
///
/// Append-only except for `retain_only`, which is what garbage collection
/// calls.
#[derive(Debug, Clone)]
pub struct CommitStore<S> {
    commits: BTreeMap<CommitId, Commit<S>>,
    next_sequence: u64,
}

impl<S> Default for CommitStore<S> {
    fn default() -> Self {
        Self {
            commits: BTreeMap::new(),
            next_sequence: 0,
        }
    }
}

impl<S> CommitStore<S> {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a commit whose parents are already present.
    ///
    /// Rejecting forward references here is what keeps the graph acyclic:
    /// a commit can only point at commits that existed before it.
    pub fn insert(&mut self, commit: Commit<S>) -> Result<(), WorldlineError> {
        if self.commits.contains_key(&commit.id) {
            return Err(WorldlineError::ImportMalformed(format!(
                "duplicate commit id {}",
                commit.id
            )));
        }
        if let Some(missing) = commit.parents.iter().find(|p| !self.commits.contains_key(p)) {
            return Err(WorldlineError::TargetNotFound(format!(
                "parent {} of {}",
                missing, commit.id
            )));
        }
        if commit.sequence >= self.next_sequence {
            self.next_sequence = commit.sequence.saturating_add(1);
        }
        self.commits.insert(commit.id.clone(), commit);
        Ok(())
    }

    /// The sequence number the next inserted commit should carry.
    #[must_use]
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Lookup a commit by id.
    #[must_use]
    pub fn get(&self, id: &CommitId) -> Option<&Commit<S>> {
        self.commits.get(id)
    }

    /// Check if the store contains a commit.
    #[must_use]
    pub fn contains(&self, id: &CommitId) -> bool {
        self.commits.contains_key(id)
    }

    /// Number of commits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commits.len()
    }

    /// Check if the store holds no commits.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    /// All commits in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Commit<S>> {
        self.commits.values()
    }

    /// All commit ids in id order.
    pub fn ids(&self) -> impl Iterator<Item = &CommitId> {
        self.commits.keys()
    }

    /// All commits in insertion order.
    #[must_use]
    pub fn in_insertion_order(&self) -> Vec<&Commit<S>> {
        let mut commits: Vec<&Commit<S>> = self.commits.values().collect();
        commits.sort_by_key(|c| c.sequence);
        commits
    }

    /// Newest timestamp in the store, or 0 when empty.
    #[must_use]
    pub fn latest_timestamp(&self) -> u64 {
        self.commits.values().map(|c| c.timestamp).max().unwrap_or(0)
    }

    /// Walk `steps` first-parent links back from `start`.
    ///
    /// Returns `None` when the chain is shorter than `steps`.
    #[must_use]
    pub fn first_parent_ancestor(&self, start: &CommitId, steps: usize) -> Option<&CommitId> {
        let mut current = self.commits.get(start)?;
        for _ in 0..steps {
            let parent = current.first_parent()?;
            current = self.commits.get(parent)?;
        }
        Some(&current.id)
    }

    /// Breadth-first closure over `parents` starting at `roots`.
    ///
    /// Roots that are not in the store are skipped.
    #[must_use]
    pub fn reachable_from<'a, I>(&self, roots: I) -> BTreeSet<CommitId>
    where
        I: IntoIterator<Item = &'a CommitId>,
    {
        let mut visited = BTreeSet::new();
        let mut queue = VecDeque::new();

        for root in roots {
            if self.commits.contains_key(root) && visited.insert(root.clone()) {
                queue.push_back(root.clone());
            }
        }

        while let Some(current) = queue.pop_front() {
            if let Some(commit) = self.commits.get(&current) {
                for parent in &commit.parents {
                    if self.commits.contains_key(parent) && visited.insert(parent.clone()) {
                        queue.push_back(parent.clone());
                    }
                }
            }
        }

        visited
    }

    /// Check whether `ancestor` is reachable from `descendant` via parents.
    #[must_use]
    pub fn is_ancestor(&self, ancestor: &CommitId, descendant: &CommitId) -> bool {
        self.reachable_from([descendant]).contains(ancestor)
    }

    /// Resolve a unique id prefix.
    ///
    /// `Ok(None)` means no commit matches; two or more matches is an error.
    pub fn resolve_prefix(&self, prefix: &str) -> Result<Option<CommitId>, WorldlineError> {
        let mut matches = self
            .commits
            .range(CommitId::new(prefix)..)
            .map(|(id, _)| id)
            .take_while(|id| id.has_prefix(prefix));

        let first = matches.next().cloned();
        if matches.next().is_some() {
            return Err(WorldlineError::TargetNotFound(format!(
                "ambiguous commit prefix '{}'",
                prefix
            )));
        }
        Ok(first)
    }

    /// Drop every commit not in `keep`, returning the removed ids in id order.
    pub fn retain_only(&mut self, keep: &BTreeSet<CommitId>) -> Vec<CommitId> {
        let removed: Vec<CommitId> = self
            .commits
            .keys()
            .filter(|id| !keep.contains(*id))
            .cloned()
            .collect();
        for id in &removed {
            self.commits.remove(id);
        }
        removed
    }
}

// =============================================================================
// REFERENCE TABLE
// =============================================================================

/// Branch pointers, branch colors, and HEAD.
///
/// Values are only ever set to ids the engine has already checked against
/// the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceTable {
    branches: BTreeMap<String, CommitId>,
    colors: BTreeMap<String, String>,
    head: Head,
}

impl ReferenceTable {
    /// A table with HEAD attached to `branch` and no pointers yet.
    #[must_use]
    pub fn attached_to(branch: impl Into<String>) -> Self {
        Self {
            branches: BTreeMap::new(),
            colors: BTreeMap::new(),
            head: Head::Attached(branch.into()),
        }
    }

    /// The current HEAD reference.
    #[must_use]
    pub fn head(&self) -> &Head {
        &self.head
    }

    /// Replace HEAD.
    pub fn set_head(&mut self, head: Head) {
        self.head = head;
    }

    /// Target of a branch.
    #[must_use]
    pub fn branch(&self, name: &str) -> Option<&CommitId> {
        self.branches.get(name)
    }

    /// Check if a branch exists.
    #[must_use]
    pub fn contains_branch(&self, name: &str) -> bool {
        self.branches.contains_key(name)
    }

    /// Point `name` at `target`, creating the branch if needed.
    pub fn set_branch(&mut self, name: impl Into<String>, target: CommitId) {
        self.branches.insert(name.into(), target);
    }

    /// Delete a branch and its color. Returns the old target.
    pub fn remove_branch(&mut self, name: &str) -> Option<CommitId> {
        self.colors.remove(name);
        self.branches.remove(name)
    }

    /// Number of branches.
    #[must_use]
    pub fn branch_count(&self) -> usize {
        self.branches.len()
    }

    /// Branches in name order.
    pub fn branches(&self) -> impl Iterator<Item = (&str, &CommitId)> {
        self.branches.iter().map(|(name, id)| (name.as_str(), id))
    }

    /// Display color of a branch.
    #[must_use]
    pub fn color(&self, name: &str) -> Option<&str> {
        self.colors.get(name).map(String::as_str)
    }

    /// Assign a display color.
    pub fn set_color(&mut self, name: impl Into<String>, color: impl Into<String>) {
        self.colors.insert(name.into(), color.into());
    }

    /// Colors in branch-name order.
    pub fn colors(&self) -> impl Iterator<Item = (&str, &str)> {
        self.colors.iter().map(|(n, c)| (n.as_str(), c.as_str()))
    }

    /// The commit HEAD resolves to, if any.
    #[must_use]
    pub fn resolve_head(&self) -> Option<&CommitId> {
        match &self.head {
            Head::Attached(name) => self.branches.get(name),
            Head::Detached(id) => Some(id),
        }
    }

    /// Move whatever HEAD points through to `target`.
    ///
    /// Attached: the branch advances. Detached: HEAD itself moves.
    pub fn advance_head(&mut self, target: CommitId) {
        match &self.head {
            Head::Attached(name) => {
                let name = name.clone();
                self.branches.insert(name, target);
            }
            Head::Detached(_) => self.head = Head::Detached(target),
        }
    }
}

// =============================================================================
// GRAPH AGGREGATE
// =============================================================================

/// All commits, all branches, HEAD, and branch colors.
///
/// This is the read-only view handed to layout and UI code via
/// `GitEngine::graph`.
#[derive(Debug, Clone)]
pub struct Graph<S> {
    pub(crate) store: CommitStore<S>,
    pub(crate) refs: ReferenceTable,
}

impl<S> Graph<S> {
    /// Assemble a graph from parts.
    #[must_use]
    pub fn from_parts(store: CommitStore<S>, refs: ReferenceTable) -> Self {
        Self { store, refs }
    }

    /// The commit store.
    #[must_use]
    pub fn store(&self) -> &CommitStore<S> {
        &self.store
    }

    /// The reference table.
    #[must_use]
    pub fn refs(&self) -> &ReferenceTable {
        &self.refs
    }

    /// The current HEAD reference.
    #[must_use]
    pub fn head(&self) -> &Head {
        self.refs.head()
    }

    /// Id of the commit HEAD resolves to, if it resolves to a stored commit.
    #[must_use]
    pub fn head_id(&self) -> Option<&CommitId> {
        self.refs
            .resolve_head()
            .filter(|id| self.store.contains(id))
    }

    /// The commit HEAD resolves to.
    #[must_use]
    pub fn head_commit(&self) -> Option<&Commit<S>> {
        self.head_id().and_then(|id| self.store.get(id))
    }

    /// Lookup a commit by id.
    #[must_use]
    pub fn commit(&self, id: &CommitId) -> Option<&Commit<S>> {
        self.store.get(id)
    }

    /// Ids that garbage collection treats as live roots.
    ///
    /// Every branch pointer, plus HEAD's target while HEAD is detached.
    #[must_use]
    pub fn gc_roots(&self) -> BTreeSet<CommitId> {
        let mut roots: BTreeSet<CommitId> =
            self.refs.branches().map(|(_, id)| id.clone()).collect();
        if let Head::Detached(id) = self.refs.head() {
            roots.insert(id.clone());
        }
        roots
    }

    /// Check the structural invariants: every branch and HEAD resolve,
    /// every parent exists. Used by import validation and tests.
    #[must_use]
    pub fn references_are_valid(&self) -> bool {
        let branches_ok = self.refs.branches().all(|(_, id)| self.store.contains(id));
        let parents_ok = self
            .store
            .iter()
            .all(|c| c.parents.iter().all(|p| self.store.contains(p)));
        let head_ok = self.store.is_empty() || self.head_id().is_some();
        branches_ok && parents_ok && head_ok
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Position, WorldSnapshot};

    fn commit(id: &str, parents: &[&str], sequence: u64) -> Commit<WorldSnapshot> {
        Commit {
            id: CommitId::new(id),
            message: id.to_string(),
            parents: parents.iter().map(|p| CommitId::new(*p)).collect(),
            timestamp: sequence,
            branch: "main".to_string(),
            sequence,
            snapshot: WorldSnapshot::new(Position::planar(sequence as i64, 0)),
        }
    }

    fn chain() -> CommitStore<WorldSnapshot> {
        let mut store = CommitStore::new();
        store.insert(commit("a1", &[], 0)).expect("insert");
        store.insert(commit("b2", &["a1"], 1)).expect("insert");
        store.insert(commit("c3", &["b2"], 2)).expect("insert");
        store
    }

    #[test]
    fn insert_rejects_forward_reference() {
        let mut store = CommitStore::new();
        let result = store.insert(commit("x", &["missing"], 0));
        assert!(matches!(result, Err(WorldlineError::TargetNotFound(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn insert_rejects_duplicate_id() {
        let mut store = chain();
        let result = store.insert(commit("a1", &[], 9));
        assert!(result.is_err());
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn sequence_tracks_highest_inserted() {
        let store = chain();
        assert_eq!(store.next_sequence(), 3);
    }

    #[test]
    fn first_parent_walk() {
        let store = chain();
        let tip = CommitId::new("c3");

        assert_eq!(store.first_parent_ancestor(&tip, 0), Some(&tip));
        assert_eq!(
            store.first_parent_ancestor(&tip, 2),
            Some(&CommitId::new("a1"))
        );
        assert_eq!(store.first_parent_ancestor(&tip, 3), None);
    }

    #[test]
    fn reachable_follows_all_parents() {
        let mut store = chain();
        store.insert(commit("d4", &["a1"], 3)).expect("insert");
        store.insert(commit("e5", &["c3", "d4"], 4)).expect("insert");

        let reach = store.reachable_from([&CommitId::new("e5")]);
        assert_eq!(reach.len(), 5);

        let side = store.reachable_from([&CommitId::new("d4")]);
        assert_eq!(side.len(), 2);
        assert!(store.is_ancestor(&CommitId::new("a1"), &CommitId::new("d4")));
        assert!(!store.is_ancestor(&CommitId::new("c3"), &CommitId::new("d4")));
    }

    #[test]
    fn prefix_resolution() {
        let mut store = chain();
        assert_eq!(store.resolve_prefix("b"), Ok(Some(CommitId::new("b2"))));
        assert_eq!(store.resolve_prefix("z"), Ok(None));

        store.insert(commit("b9", &["a1"], 3)).expect("insert");
        assert!(store.resolve_prefix("b").is_err());
    }

    #[test]
    fn retain_only_removes_the_rest() {
        let mut store = chain();
        let keep: BTreeSet<CommitId> = [CommitId::new("a1")].into_iter().collect();

        let removed = store.retain_only(&keep);
        assert_eq!(removed, vec![CommitId::new("b2"), CommitId::new("c3")]);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn advance_head_moves_branch_or_detached_target() {
        let mut refs = ReferenceTable::attached_to("main");
        refs.set_branch("main", CommitId::new("a1"));
        refs.advance_head(CommitId::new("b2"));
        assert_eq!(refs.branch("main"), Some(&CommitId::new("b2")));

        refs.set_head(Head::Detached(CommitId::new("a1")));
        refs.advance_head(CommitId::new("c3"));
        assert_eq!(refs.head(), &Head::Detached(CommitId::new("c3")));
        assert_eq!(refs.branch("main"), Some(&CommitId::new("b2")));
    }

    #[test]
    fn remove_branch_drops_color() {
        let mut refs = ReferenceTable::attached_to("main");
        refs.set_branch("feat", CommitId::new("a1"));
        refs.set_color("feat", "#ffffff");

        assert_eq!(refs.remove_branch("feat"), Some(CommitId::new("a1")));
        assert_eq!(refs.color("feat"), None);
    }

    #[test]
    fn gc_roots_include_detached_head_only_while_detached() {
        let store = chain();
        let mut refs = ReferenceTable::attached_to("main");
        refs.set_branch("main", CommitId::new("b2"));

        let graph = Graph::from_parts(store.clone(), refs.clone());
        assert_eq!(graph.gc_roots().len(), 1);

        refs.set_head(Head::Detached(CommitId::new("c3")));
        let detached = Graph::from_parts(store, refs);
        assert!(detached.gc_roots().contains(&CommitId::new("c3")));
        assert!(detached.references_are_valid());
    }
}
