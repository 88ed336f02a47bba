//! # worldline-core
//!
//! The in-memory version-control engine for Worldline - THE LOGIC.
//!
//! A commit graph over arbitrary world snapshots: commits, branches, a
//! single HEAD, merge, soft/hard reset, garbage collection, whole-graph
//! export/import, and a deterministic lane layout for drawing the graph.
//!
//! ## Architectural Constraints
//!
//! The core:
//! - Holds no global state; one `GitEngine` value per session
//! - Never touches disk or network; persistence works on exported documents
//! - Is deterministic apart from the injected `Clock`
//! - Never panics on bad input; every failure is a `WorldlineError`

// =============================================================================
// MODULES
// =============================================================================

pub mod clock;
pub mod command;
pub mod digest;
pub mod engine;
pub mod export;
pub mod gc;
pub mod graph;
pub mod layout;
pub mod primitives;
pub mod revision;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types
// =============================================================================

pub use types::{
    Commit, CommitId, Head, Position, ResetMode, Snapshot, WorldSnapshot, WorldlineError,
};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{GitEngine, MERGE_UP_TO_DATE, validate_branch_name};
pub use gc::GcReport;
pub use graph::{CommitStore, Graph, ReferenceTable};
pub use revision::{Revision, resolve_commit};

// =============================================================================
// RE-EXPORTS: Layout, Export, Commands
// =============================================================================

pub use command::{Command, CommandOutcome, CommandRunner};
pub use export::{
    CanonicalHeader, CommitRecord, GraphDocument, canonical_checksum, canonical_digest,
    export_canonical, import_canonical, verify_canonical,
};
pub use layout::{EdgeKind, GraphLayout, LayoutEdge, LayoutNode, layout};
