//! # Garbage Collection
//!
//! Mark-and-sweep over the whole commit store.
//!
//! Roots are every branch pointer plus HEAD's target while HEAD is detached
//! (see `Graph::gc_roots`). Historical detached targets are not roots. The
//! pass always runs to completion; an empty reachable set empties the store.

use crate::graph::Graph;
use crate::types::CommitId;

/// Outcome of one collection pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GcReport {
    /// Commits left in the store.
    pub retained: usize,
    /// Commits deleted, in id order.
    pub removed: Vec<CommitId>,
}

impl GcReport {
    /// Check if the pass deleted nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.removed.is_empty()
    }
}

/// Delete every commit unreachable from the GC roots.
pub fn collect_garbage<S>(graph: &mut Graph<S>) -> GcReport {
    let roots = graph.gc_roots();
    let live = graph.store.reachable_from(&roots);
    let removed = graph.store.retain_only(&live);

    tracing::debug!(
        roots = roots.len(),
        retained = live.len(),
        removed = removed.len(),
        "garbage collection complete"
    );

    GcReport {
        retained: graph.store.len(),
        removed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{CommitStore, ReferenceTable};
    use crate::types::{Commit, Head, WorldSnapshot};

    fn commit(id: &str, parents: &[&str], sequence: u64) -> Commit<WorldSnapshot> {
        Commit {
            id: CommitId::new(id),
            message: String::new(),
            parents: parents.iter().map(|p| CommitId::new(*p)).collect(),
            timestamp: sequence,
            branch: "main".to_string(),
            sequence,
            snapshot: WorldSnapshot::default(),
        }
    }

    fn graph_with_orphan() -> Graph<WorldSnapshot> {
        let mut store = CommitStore::new();
        store.insert(commit("a", &[], 0)).expect("insert");
        store.insert(commit("b", &["a"], 1)).expect("insert");
        store.insert(commit("orphan", &["b"], 2)).expect("insert");
        let mut refs = ReferenceTable::attached_to("main");
        refs.set_branch("main", CommitId::new("b"));
        Graph::from_parts(store, refs)
    }

    #[test]
    fn sweeps_unreachable_commits() {
        let mut graph = graph_with_orphan();
        let report = collect_garbage(&mut graph);

        assert_eq!(report.removed, vec![CommitId::new("orphan")]);
        assert_eq!(report.retained, 2);
        assert!(graph.references_are_valid());
    }

    #[test]
    fn current_detached_head_is_a_root() {
        let mut graph = graph_with_orphan();
        graph.refs.set_head(Head::Detached(CommitId::new("orphan")));

        let report = collect_garbage(&mut graph);
        assert!(report.is_noop());
        assert_eq!(graph.store().len(), 3);
    }

    #[test]
    fn no_roots_empties_the_store() {
        let mut store = CommitStore::new();
        store.insert(commit("a", &[], 0)).expect("insert");
        let mut graph = Graph::from_parts(store, ReferenceTable::attached_to("main"));

        let report = collect_garbage(&mut graph);
        assert_eq!(report.retained, 0);
        assert!(graph.store().is_empty());
    }
}
