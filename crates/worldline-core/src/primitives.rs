//! # Engine Primitives
//!
//! Hardcoded runtime constants for the Worldline engine.
//!
//! These values are compiled into the binary and are immutable at runtime.
//! Changing any of the layout or palette constants changes what every
//! client draws, so treat them as part of the wire contract.

/// Name of the branch installed by `GitEngine::new`.
pub const DEFAULT_BRANCH: &str = "main";

/// The literal token that resolves to the current HEAD commit.
pub const HEAD_TOKEN: &str = "HEAD";

/// Label stored in `Commit::branch` when the commit was made on a detached HEAD.
pub const DETACHED_LABEL: &str = "HEAD";

/// Display colors handed out to branches in creation order.
///
/// A branch takes `BRANCH_PALETTE[branch_count % BRANCH_PALETTE.len()]`.
pub const BRANCH_PALETTE: [&str; 8] = [
    "#4ade80", "#60a5fa", "#f472b6", "#facc15", "#a78bfa", "#fb923c", "#2dd4bf", "#f87171",
];

/// Maximum length for branch names, in bytes.
pub const MAX_BRANCH_NAME_LENGTH: usize = 64;

/// Shortest commit id prefix accepted when resolving a checkout/reset target.
pub const MIN_ID_PREFIX_LENGTH: usize = 4;

/// Number of id characters shown by `CommitId::short`.
pub const SHORT_ID_LENGTH: usize = 7;

// =============================================================================
// LAYOUT
// =============================================================================

/// Horizontal distance between two adjacent lanes.
pub const LANE_WIDTH: i64 = 120;

/// Vertical distance between two adjacent depths.
pub const DEPTH_HEIGHT: i64 = 80;

/// Cosmetic jitter stays within `[-JITTER_SPAN, JITTER_SPAN]` on each axis.
pub const JITTER_SPAN: i64 = 8;

// =============================================================================
// CANONICAL FORMAT
// =============================================================================

/// Magic bytes for the canonical export header.
pub const MAGIC_BYTES: &[u8; 4] = b"WLDX";

/// Current canonical format version.
///
/// Increment this when making breaking changes to the serialization format.
pub const FORMAT_VERSION: u8 = 1;

/// Maximum number of commits accepted by an import.
///
/// Checked against the header BEFORE the payload is deserialized.
pub const MAX_IMPORT_COMMIT_COUNT: u64 = 1_000_000;

/// Maximum number of branches accepted by an import.
pub const MAX_IMPORT_BRANCH_COUNT: u64 = 100_000;
