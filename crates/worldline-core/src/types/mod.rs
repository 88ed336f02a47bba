//! # Core Type Definitions
//!
//! This module contains all core types for the Worldline commit graph:
//! - Identifiers (`CommitId`)
//! - The snapshot contract (`Snapshot`, `Position`, `WorldSnapshot`)
//! - Graph records (`Commit`, `Head`, `ResetMode`)
//! - Error types (`WorldlineError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Use integer arithmetic only (no floating-point)
//! - Implement `Ord` where they key a `BTreeMap`/`BTreeSet`
//! - Are plain owned values; cloning a snapshot never aliases the original

use crate::primitives::{DETACHED_LABEL, SHORT_ID_LENGTH};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// COMMIT IDENTIFIER
// =============================================================================

/// Unique identifier for a commit.
///
/// Locally created commits carry a 64-character BLAKE3 hex digest. Ids read
/// from an imported document are kept verbatim, whatever their shape.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitId(String);

impl CommitId {
    /// Wrap an existing identifier string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form used in status lines and logs.
    #[must_use]
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(SHORT_ID_LENGTH)
            .map_or(self.0.len(), |(idx, _)| idx);
        &self.0[..end]
    }

    /// Check whether this id starts with `prefix`.
    #[must_use]
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// SNAPSHOT CONTRACT
// =============================================================================

/// Player/cursor position carried by every snapshot.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Position {
    pub x: i64,
    pub y: i64,
    #[serde(default)]
    pub z: i64,
}

impl Position {
    /// Create a new position.
    #[must_use]
    pub const fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }

    /// Create a position on the ground plane (`z = 0`).
    #[must_use]
    pub const fn planar(x: i64, y: i64) -> Self {
        Self { x, y, z: 0 }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// The contract a State Provider's world value must satisfy.
///
/// The engine treats the value as opaque: it clones it, serializes it for
/// content hashing and export, and touches nothing but the position during
/// a soft reset.
pub trait Snapshot:
    Clone + PartialEq + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// The player/cursor position captured in this snapshot.
    fn position(&self) -> Position;

    /// Return this snapshot with its position replaced.
    #[must_use]
    fn with_position(self, position: Position) -> Self;
}

/// The default world value: a position plus an opaque cell map.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Where the player stands.
    pub position: Position,
    /// World content, keyed by cell name.
    #[serde(default)]
    pub cells: BTreeMap<String, String>,
}

impl WorldSnapshot {
    /// Create an empty world with the player at `position`.
    #[must_use]
    pub fn new(position: Position) -> Self {
        Self {
            position,
            cells: BTreeMap::new(),
        }
    }

    /// Builder-style cell insertion.
    #[must_use]
    pub fn with_cell(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.cells.insert(key.into(), value.into());
        self
    }

    /// Set a cell, returning the previous value.
    pub fn set_cell(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.cells.insert(key.into(), value.into())
    }

    /// Read a cell.
    #[must_use]
    pub fn cell(&self, key: &str) -> Option<&str> {
        self.cells.get(key).map(String::as_str)
    }
}

impl Snapshot for WorldSnapshot {
    fn position(&self) -> Position {
        self.position
    }

    fn with_position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }
}

// =============================================================================
// COMMIT
// =============================================================================

/// An immutable commit record.
///
/// `parents[0]` is the first parent followed by `HEAD~n`. The engine never
/// hands out `&mut Commit`; once inserted a commit only leaves the store via
/// garbage collection or a full import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit<S> {
    pub id: CommitId,
    pub message: String,
    pub parents: Vec<CommitId>,
    /// Milliseconds since the Unix epoch, non-decreasing within one graph.
    pub timestamp: u64,
    /// Branch active when the commit was made (cosmetic).
    pub branch: String,
    /// Insertion counter; breaks timestamp ties in layout.
    pub sequence: u64,
    pub snapshot: S,
}

impl<S> Commit<S> {
    /// A root commit has no parents.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    /// A merge commit has two or more parents.
    #[must_use]
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    /// The parent followed by relative-ancestor resolution.
    #[must_use]
    pub fn first_parent(&self) -> Option<&CommitId> {
        self.parents.first()
    }
}

// =============================================================================
// HEAD
// =============================================================================

/// The single active reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Head {
    /// Following a branch; resolves through the reference table.
    Attached(String),
    /// Pinned directly to a commit.
    Detached(CommitId),
}

impl Head {
    /// The branch HEAD follows, if attached.
    #[must_use]
    pub fn branch(&self) -> Option<&str> {
        match self {
            Head::Attached(name) => Some(name),
            Head::Detached(_) => None,
        }
    }

    /// Check if HEAD is detached.
    #[must_use]
    pub fn is_detached(&self) -> bool {
        matches!(self, Head::Detached(_))
    }

    /// Label recorded on commits made from this HEAD.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Head::Attached(name) => name,
            Head::Detached(_) => DETACHED_LABEL,
        }
    }
}

impl fmt::Display for Head {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Head::Attached(name) => write!(f, "HEAD -> {}", name),
            Head::Detached(id) => write!(f, "HEAD detached at {}", id.short()),
        }
    }
}

// =============================================================================
// RESET MODE
// =============================================================================

/// How `reset` treats the live snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResetMode {
    /// Restore content, keep the live position.
    #[default]
    Soft,
    /// Restore the commit exactly, then collect unreachable commits.
    Hard,
}

impl FromStr for ResetMode {
    type Err = WorldlineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "soft" | "--soft" => Ok(ResetMode::Soft),
            "hard" | "--hard" => Ok(ResetMode::Hard),
            other => Err(WorldlineError::TargetNotFound(format!(
                "unknown reset mode '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for ResetMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResetMode::Soft => f.write_str("soft"),
            ResetMode::Hard => f.write_str("hard"),
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Worldline engine.
///
/// - Every engine operation either succeeds or fails with exactly one kind
/// - A failed operation leaves the graph untouched
/// - The engine never panics; callers render these as one-line messages
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorldlineError {
    /// A branch with this name already exists.
    #[error("branch '{0}' already exists")]
    DuplicateBranch(String),

    /// No branch with this name exists.
    #[error("branch '{0}' not found")]
    BranchNotFound(String),

    /// A checkout/reset target resolved to neither a branch nor a commit.
    #[error("target not found: {0}")]
    TargetNotFound(String),

    /// The operation needs a commit but the store is empty.
    #[error("commit store is empty")]
    EmptyStore,

    /// An imported document failed structural validation.
    #[error("malformed import: {0}")]
    ImportMalformed(String),

    /// The proposed branch name is not usable as a reference.
    #[error("invalid branch name '{0}'")]
    InvalidBranchName(String),

    /// A serialization error occurred while exporting.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// An I/O error occurred in a persistence collaborator.
    #[error("I/O error: {0}")]
    IoError(String),

    /// A command line matched no known command.
    #[error("unrecognized command: {0}")]
    UnrecognizedCommand(String),

    /// A configuration value is missing or out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_id_truncates() {
        let id = CommitId::new("0123456789abcdef");
        assert_eq!(id.short(), "0123456");

        let tiny = CommitId::new("ab");
        assert_eq!(tiny.short(), "ab");
    }

    #[test]
    fn with_position_replaces_only_position() {
        let snap = WorldSnapshot::new(Position::planar(1, 0)).with_cell("door", "open");
        let moved = snap.clone().with_position(Position::planar(5, 5));

        assert_eq!(moved.position, Position::planar(5, 5));
        assert_eq!(moved.cells, snap.cells);
    }

    #[test]
    fn head_label_and_branch() {
        let attached = Head::Attached("main".to_string());
        assert_eq!(attached.branch(), Some("main"));
        assert_eq!(attached.label(), "main");
        assert!(!attached.is_detached());

        let detached = Head::Detached(CommitId::new("abc"));
        assert_eq!(detached.branch(), None);
        assert_eq!(detached.label(), DETACHED_LABEL);
        assert!(detached.is_detached());
    }

    #[test]
    fn reset_mode_parses_flags_and_words() {
        assert_eq!("--hard".parse::<ResetMode>(), Ok(ResetMode::Hard));
        assert_eq!("soft".parse::<ResetMode>(), Ok(ResetMode::Soft));
        assert!("--mixed".parse::<ResetMode>().is_err());
    }

    #[test]
    fn commit_shape_helpers() {
        let commit = Commit {
            id: CommitId::new("m"),
            message: "merge".to_string(),
            parents: vec![CommitId::new("a"), CommitId::new("b")],
            timestamp: 0,
            branch: "main".to_string(),
            sequence: 2,
            snapshot: WorldSnapshot::default(),
        };
        assert!(commit.is_merge());
        assert!(!commit.is_root());
        assert_eq!(commit.first_parent(), Some(&CommitId::new("a")));
    }
}
