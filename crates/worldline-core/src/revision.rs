//! # Revision Resolution
//!
//! Turns a user-supplied target string into a concrete commit id.
//!
//! Accepted forms, tried in order:
//! 1. an exact commit id
//! 2. `HEAD`
//! 3. `HEAD~n` (n first-parent steps back) and `HEAD^` (same as `HEAD~1`)
//! 4. a branch name
//! 5. a unique id prefix of at least `MIN_ID_PREFIX_LENGTH` characters
//!
//! Every failure is `TargetNotFound`, including an unparsable `n` and a
//! first-parent chain shorter than `n`.

use crate::graph::Graph;
use crate::primitives::{HEAD_TOKEN, MIN_ID_PREFIX_LENGTH};
use crate::types::{CommitId, WorldlineError};

/// A parsed target expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Revision {
    /// The literal `HEAD`.
    Head,
    /// `HEAD~n` / `HEAD^`.
    HeadAncestor(usize),
    /// Anything else: a branch name, an id, or an id prefix.
    Name(String),
}

impl Revision {
    /// Parse a target expression.
    pub fn parse(expression: &str) -> Result<Self, WorldlineError> {
        let expression = expression.trim();
        if expression.is_empty() {
            return Err(WorldlineError::TargetNotFound("empty target".to_string()));
        }
        if expression == HEAD_TOKEN {
            return Ok(Revision::Head);
        }
        let Some(suffix) = expression.strip_prefix(HEAD_TOKEN) else {
            return Ok(Revision::Name(expression.to_string()));
        };
        if suffix == "^" {
            return Ok(Revision::HeadAncestor(1));
        }
        match suffix.strip_prefix('~') {
            Some(steps) => steps
                .starts_with(|c: char| c.is_ascii_digit())
                .then(|| steps.parse::<usize>().ok())
                .flatten()
                .map(Revision::HeadAncestor)
                .ok_or_else(|| {
                    WorldlineError::TargetNotFound(format!(
                        "'{}': ancestor count must be a non-negative integer",
                        expression
                    ))
                }),
            // "HEADLESS" and friends are ordinary names.
            None => Ok(Revision::Name(expression.to_string())),
        }
    }
}

/// Resolve `target` to a commit present in `graph`.
pub fn resolve_commit<S>(graph: &Graph<S>, target: &str) -> Result<CommitId, WorldlineError> {
    let exact = CommitId::new(target.trim());
    if graph.store().contains(&exact) {
        return Ok(exact);
    }

    match Revision::parse(target)? {
        Revision::Head => graph.head_id().cloned().ok_or(WorldlineError::EmptyStore),
        Revision::HeadAncestor(steps) => {
            let head = graph.head_id().ok_or(WorldlineError::EmptyStore)?;
            graph
                .store()
                .first_parent_ancestor(head, steps)
                .cloned()
                .ok_or_else(|| {
                    WorldlineError::TargetNotFound(format!(
                        "HEAD~{}: history has fewer than {} first-parent ancestors",
                        steps, steps
                    ))
                })
        }
        Revision::Name(name) => {
            if let Some(id) = graph.refs().branch(&name) {
                return Ok(id.clone());
            }
            if name.len() >= MIN_ID_PREFIX_LENGTH
                && let Some(id) = graph.store().resolve_prefix(&name)?
            {
                return Ok(id);
            }
            Err(WorldlineError::TargetNotFound(name))
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{CommitStore, ReferenceTable};
    use crate::types::{Commit, Head, Position, WorldSnapshot};

    fn graph() -> Graph<WorldSnapshot> {
        let mut store = CommitStore::new();
        for (seq, (id, parents)) in [
            ("aaaa1111", vec![]),
            ("bbbb2222", vec!["aaaa1111"]),
            ("cccc3333", vec!["bbbb2222"]),
        ]
        .into_iter()
        .enumerate()
        {
            store
                .insert(Commit {
                    id: CommitId::new(id),
                    message: id.to_string(),
                    parents: parents.into_iter().map(CommitId::new).collect(),
                    timestamp: seq as u64,
                    branch: "main".to_string(),
                    sequence: seq as u64,
                    snapshot: WorldSnapshot::new(Position::default()),
                })
                .expect("insert");
        }
        let mut refs = ReferenceTable::attached_to("main");
        refs.set_branch("main", CommitId::new("cccc3333"));
        refs.set_branch("old", CommitId::new("aaaa1111"));
        Graph::from_parts(store, refs)
    }

    #[test]
    fn parse_forms() {
        assert_eq!(Revision::parse("HEAD"), Ok(Revision::Head));
        assert_eq!(Revision::parse("HEAD~3"), Ok(Revision::HeadAncestor(3)));
        assert_eq!(Revision::parse("HEAD~0"), Ok(Revision::HeadAncestor(0)));
        assert_eq!(Revision::parse("HEAD^"), Ok(Revision::HeadAncestor(1)));
        assert_eq!(
            Revision::parse("HEADLESS"),
            Ok(Revision::Name("HEADLESS".to_string()))
        );
    }

    #[test]
    fn parse_rejects_bad_ancestor_count() {
        assert!(matches!(
            Revision::parse("HEAD~x"),
            Err(WorldlineError::TargetNotFound(_))
        ));
        assert!(matches!(
            Revision::parse("HEAD~-1"),
            Err(WorldlineError::TargetNotFound(_))
        ));
        assert!(Revision::parse("HEAD~").is_err());
    }

    #[test]
    fn parse_rejects_signed_ancestor_count() {
        assert!(matches!(
            Revision::parse("HEAD~+1"),
            Err(WorldlineError::TargetNotFound(_))
        ));
        assert!(Revision::parse("HEAD~ 1").is_err());
    }

    #[test]
    fn resolves_every_form() {
        let g = graph();
        assert_eq!(resolve_commit(&g, "HEAD"), Ok(CommitId::new("cccc3333")));
        assert_eq!(resolve_commit(&g, "HEAD~2"), Ok(CommitId::new("aaaa1111")));
        assert_eq!(resolve_commit(&g, "old"), Ok(CommitId::new("aaaa1111")));
        assert_eq!(resolve_commit(&g, "bbbb2222"), Ok(CommitId::new("bbbb2222")));
        assert_eq!(resolve_commit(&g, "bbbb"), Ok(CommitId::new("bbbb2222")));
    }

    #[test]
    fn overrun_and_short_prefix_fail() {
        let g = graph();
        assert!(matches!(
            resolve_commit(&g, "HEAD~3"),
            Err(WorldlineError::TargetNotFound(_))
        ));
        assert!(matches!(
            resolve_commit(&g, "bbb"),
            Err(WorldlineError::TargetNotFound(_))
        ));
    }

    #[test]
    fn detached_head_resolves_directly() {
        let mut g = graph();
        g.refs.set_head(Head::Detached(CommitId::new("bbbb2222")));
        assert_eq!(resolve_commit(&g, "HEAD~1"), Ok(CommitId::new("aaaa1111")));
    }
}
