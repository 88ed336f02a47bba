//! # Digests
//!
//! Two hashes with two jobs:
//! - `commit_id` - BLAKE3 content address for new commits
//! - `fnv1a_64` - cheap, stable hash for layout jitter and export checksums
//!
//! `fnv1a_64` is **NOT** collision resistant. It only has to be stable
//! across runs and platforms.

use crate::types::{CommitId, Snapshot, WorldlineError};

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a over a byte slice.
#[must_use]
pub fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Derive the content address of a new commit.
///
/// Hashes `{parents, message, snapshot, timestamp, sequence}`. Fields are
/// length-prefixed so `("ab", "c")` and `("a", "bc")` never collide by
/// concatenation.
pub fn commit_id<S: Snapshot>(
    parents: &[CommitId],
    message: &str,
    snapshot: &S,
    timestamp: u64,
    sequence: u64,
) -> Result<CommitId, WorldlineError> {
    let snapshot_bytes = postcard::to_stdvec(snapshot)
        .map_err(|e| WorldlineError::SerializationError(format!("Snapshot: {}", e)))?;

    let mut hasher = blake3::Hasher::new();
    hasher.update(&(parents.len() as u64).to_le_bytes());
    for parent in parents {
        update_field(&mut hasher, parent.as_str().as_bytes());
    }
    update_field(&mut hasher, message.as_bytes());
    update_field(&mut hasher, &snapshot_bytes);
    hasher.update(&timestamp.to_le_bytes());
    hasher.update(&sequence.to_le_bytes());

    Ok(CommitId::new(hasher.finalize().to_hex().to_string()))
}

fn update_field(hasher: &mut blake3::Hasher, bytes: &[u8]) {
    hasher.update(&(bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}
