//! # Export / Import
//!
//! Two encodings of the same document:
//!
//! - `GraphDocument` - the whole graph as one serde value. Serialized with
//!   `serde_json` by the app for human-readable saves.
//! - Canonical binary - `[header_len: u32 LE][CanonicalHeader][GraphDocument]`,
//!   both parts `postcard`. Bit-exact for a given graph, so two exports of
//!   the same graph can be compared byte for byte.
//!
//! Importing never trusts the document: ids, parents, references and HEAD
//! are all re-checked before a `Graph` is built.

use crate::digest::fnv1a_64;
use crate::engine::validate_branch_name;
use crate::graph::{CommitStore, Graph, ReferenceTable};
use crate::primitives::{
    BRANCH_PALETTE, FORMAT_VERSION, MAGIC_BYTES, MAX_IMPORT_BRANCH_COUNT, MAX_IMPORT_COMMIT_COUNT,
};
use crate::types::{Commit, CommitId, Head, Snapshot, WorldlineError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// DOCUMENT
// =============================================================================

/// One commit inside a `GraphDocument`. The id is the pair's key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord<S> {
    pub message: String,
    pub parents: Vec<CommitId>,
    pub timestamp: u64,
    pub branch: String,
    pub snapshot: S,
}

/// The complete graph as a single value.
///
/// Commits are listed in insertion order; sequence numbers are not stored
/// and are rebuilt from that order on import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphDocument<S> {
    pub commits: Vec<(CommitId, CommitRecord<S>)>,
    pub branches: Vec<(String, CommitId)>,
    #[serde(rename = "branchColors")]
    pub branch_colors: Vec<(String, String)>,
    #[serde(rename = "HEAD")]
    pub head: Head,
}

impl<S: Snapshot> GraphDocument<S> {
    /// Capture `graph` as a document.
    #[must_use]
    pub fn from_graph(graph: &Graph<S>) -> Self {
        let commits = graph
            .store()
            .in_insertion_order()
            .into_iter()
            .map(|c| {
                (
                    c.id.clone(),
                    CommitRecord {
                        message: c.message.clone(),
                        parents: c.parents.clone(),
                        timestamp: c.timestamp,
                        branch: c.branch.clone(),
                        snapshot: c.snapshot.clone(),
                    },
                )
            })
            .collect();

        Self {
            commits,
            branches: graph
                .refs()
                .branches()
                .map(|(name, id)| (name.to_string(), id.clone()))
                .collect(),
            branch_colors: graph
                .refs()
                .colors()
                .map(|(name, color)| (name.to_string(), color.to_string()))
                .collect(),
            head: graph.head().clone(),
        }
    }

    /// Validate the document and build a graph from it.
    ///
    /// Commits are inserted parents-first. A document whose commits are
    /// already in dependency order (every export is) keeps its order.
    pub fn into_graph(self) -> Result<Graph<S>, WorldlineError> {
        if self.commits.is_empty() {
            return Err(malformed("document has no commits"));
        }
        if self.commits.len() as u64 > MAX_IMPORT_COMMIT_COUNT {
            return Err(malformed(format!(
                "commit count {} exceeds maximum allowed {}",
                self.commits.len(),
                MAX_IMPORT_COMMIT_COUNT
            )));
        }
        if self.branches.len() as u64 > MAX_IMPORT_BRANCH_COUNT {
            return Err(malformed(format!(
                "branch count {} exceeds maximum allowed {}",
                self.branches.len(),
                MAX_IMPORT_BRANCH_COUNT
            )));
        }

        let order = dependency_order(&self.commits)?;

        let mut slots: Vec<Option<(CommitId, CommitRecord<S>)>> =
            self.commits.into_iter().map(Some).collect();
        let mut store = CommitStore::new();
        for (sequence, position) in order.into_iter().enumerate() {
            let Some((id, record)) = slots.get_mut(position).and_then(Option::take) else {
                return Err(malformed("commit listed twice in dependency order"));
            };
            store
                .insert(Commit {
                    id,
                    message: record.message,
                    parents: record.parents,
                    timestamp: record.timestamp,
                    branch: record.branch,
                    sequence: sequence as u64,
                    snapshot: record.snapshot,
                })
                .map_err(|e| malformed(e.to_string()))?;
        }

        let refs = build_references(&store, self.branches, self.branch_colors, self.head)?;
        Ok(Graph::from_parts(store, refs))
    }
}

fn malformed(reason: impl Into<String>) -> WorldlineError {
    WorldlineError::ImportMalformed(reason.into())
}

/// Kahn's algorithm over document positions.
///
/// Ready commits are taken lowest position first so the result is stable.
/// Fails on duplicate ids, unknown parents and cycles.
fn dependency_order<S>(commits: &[(CommitId, CommitRecord<S>)]) -> Result<Vec<usize>, WorldlineError> {
    let mut position_of: BTreeMap<&CommitId, usize> = BTreeMap::new();
    for (position, (id, _)) in commits.iter().enumerate() {
        if position_of.insert(id, position).is_some() {
            return Err(malformed(format!("duplicate commit id {}", id)));
        }
    }

    let mut pending = vec![0usize; commits.len()];
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); commits.len()];
    for (position, (id, record)) in commits.iter().enumerate() {
        for parent in &record.parents {
            let Some(&parent_position) = position_of.get(parent) else {
                return Err(malformed(format!("commit {} has unknown parent {}", id, parent)));
            };
            if let Some(slot) = pending.get_mut(position) {
                *slot += 1;
            }
            if let Some(list) = children.get_mut(parent_position) {
                list.push(position);
            }
        }
    }

    let mut ready: BTreeSet<usize> = pending
        .iter()
        .enumerate()
        .filter(|(_, count)| **count == 0)
        .map(|(position, _)| position)
        .collect();
    let mut order = Vec::with_capacity(commits.len());

    while let Some(position) = ready.pop_first() {
        order.push(position);
        for &child in children.get(position).map(Vec::as_slice).unwrap_or_default() {
            if let Some(count) = pending.get_mut(child) {
                *count -= 1;
                if *count == 0 {
                    ready.insert(child);
                }
            }
        }
    }

    if order.len() != commits.len() {
        return Err(malformed("commit parents form a cycle"));
    }
    Ok(order)
}

fn build_references<S>(
    store: &CommitStore<S>,
    branches: Vec<(String, CommitId)>,
    colors: Vec<(String, String)>,
    head: Head,
) -> Result<ReferenceTable, WorldlineError> {
    let mut refs = ReferenceTable::attached_to(head.label());
    refs.set_head(head);

    for (name, target) in branches {
        validate_branch_name(&name).map_err(|e| malformed(e.to_string()))?;
        if refs.contains_branch(&name) {
            return Err(malformed(format!("duplicate branch {}", name)));
        }
        if !store.contains(&target) {
            return Err(malformed(format!(
                "branch {} points at unknown commit {}",
                name, target
            )));
        }
        refs.set_branch(name, target);
    }

    match refs.head() {
        Head::Attached(name) if !refs.contains_branch(name) => {
            return Err(malformed(format!("HEAD is attached to unknown branch {}", name)));
        }
        Head::Detached(id) if !store.contains(id) => {
            return Err(malformed(format!("HEAD is detached at unknown commit {}", id)));
        }
        _ => {}
    }

    for (name, color) in colors {
        if !refs.contains_branch(&name) {
            return Err(malformed(format!("color assigned to unknown branch {}", name)));
        }
        refs.set_color(name, color);
    }

    let uncolored: Vec<(usize, String)> = refs
        .branches()
        .enumerate()
        .filter(|(_, (name, _))| refs.color(name).is_none())
        .map(|(index, (name, _))| (index, name.to_string()))
        .collect();
    for (index, name) in uncolored {
        refs.set_color(name, BRANCH_PALETTE[index % BRANCH_PALETTE.len()]);
    }

    Ok(refs)
}

// =============================================================================
// CANONICAL BINARY FORMAT
// =============================================================================

/// Header for canonical exports.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CanonicalHeader {
    /// Format magic, `WLDX`.
    pub magic: [u8; 4],
    pub version: u8,
    pub commit_count: u64,
    pub branch_count: u64,
    /// FNV-1a of the payload bytes.
    pub checksum: u64,
}

impl CanonicalHeader {
    #[must_use]
    pub fn new(commit_count: u64, branch_count: u64, checksum: u64) -> Self {
        Self {
            magic: *MAGIC_BYTES,
            version: FORMAT_VERSION,
            commit_count,
            branch_count,
            checksum,
        }
    }

    /// Check magic, version and size limits.
    ///
    /// Messages stay generic; they end up in API responses.
    pub fn validate(&self) -> Result<(), WorldlineError> {
        if &self.magic != MAGIC_BYTES {
            return Err(malformed("invalid file format"));
        }
        if self.version != FORMAT_VERSION {
            return Err(malformed("unsupported file version"));
        }
        if self.commit_count > MAX_IMPORT_COMMIT_COUNT {
            return Err(malformed(format!(
                "commit count {} exceeds maximum allowed {}",
                self.commit_count, MAX_IMPORT_COMMIT_COUNT
            )));
        }
        if self.branch_count > MAX_IMPORT_BRANCH_COUNT {
            return Err(malformed(format!(
                "branch count {} exceeds maximum allowed {}",
                self.branch_count, MAX_IMPORT_BRANCH_COUNT
            )));
        }
        Ok(())
    }
}

fn encode_payload<S: Snapshot>(document: &GraphDocument<S>) -> Result<Vec<u8>, WorldlineError> {
    postcard::to_allocvec(document)
        .map_err(|e| WorldlineError::SerializationError(format!("Data: {}", e)))
}

/// Encode a document in the canonical binary format.
pub fn export_canonical<S: Snapshot>(document: &GraphDocument<S>) -> Result<Vec<u8>, WorldlineError> {
    let payload = encode_payload(document)?;
    let header = CanonicalHeader::new(
        document.commits.len() as u64,
        document.branches.len() as u64,
        fnv1a_64(&payload),
    );

    let header_bytes = postcard::to_allocvec(&header)
        .map_err(|e| WorldlineError::SerializationError(format!("Header: {}", e)))?;

    // [header_len: u32] [header] [payload]
    let mut result = Vec::with_capacity(4 + header_bytes.len() + payload.len());
    result.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
    result.extend_from_slice(&header_bytes);
    result.extend_from_slice(&payload);
    Ok(result)
}

/// Decode a canonical export.
///
/// The header is checked before the payload is decoded, so an oversized or
/// foreign file is rejected without allocating for its contents. The
/// returned document has not been structurally validated yet; that happens
/// in `GraphDocument::into_graph`.
pub fn import_canonical<S: Snapshot>(data: &[u8]) -> Result<GraphDocument<S>, WorldlineError> {
    let Some((len_bytes, rest)) = data.split_first_chunk::<4>() else {
        return Err(malformed("data too short"));
    };
    let header_len = u32::from_le_bytes(*len_bytes) as usize;
    if rest.len() < header_len {
        return Err(malformed("data too short for header"));
    }
    let (header_bytes, payload) = rest.split_at(header_len);

    let header: CanonicalHeader =
        postcard::from_bytes(header_bytes).map_err(|e| malformed(format!("Header: {}", e)))?;
    header.validate()?;

    let computed = fnv1a_64(payload);
    if computed != header.checksum {
        return Err(malformed(format!(
            "checksum mismatch: expected {}, got {}",
            header.checksum, computed
        )));
    }

    let document: GraphDocument<S> =
        postcard::from_bytes(payload).map_err(|e| malformed(format!("Data: {}", e)))?;

    if document.commits.len() as u64 != header.commit_count {
        return Err(malformed("commit count mismatch"));
    }
    if document.branches.len() as u64 != header.branch_count {
        return Err(malformed("branch count mismatch"));
    }
    Ok(document)
}

/// Checksum of a document's canonical payload.
pub fn canonical_checksum<S: Snapshot>(document: &GraphDocument<S>) -> Result<u64, WorldlineError> {
    Ok(fnv1a_64(&encode_payload(document)?))
}

/// BLAKE3 digest of a document's full canonical export, as hex.
pub fn canonical_digest<S: Snapshot>(document: &GraphDocument<S>) -> Result<String, WorldlineError> {
    let bytes = export_canonical(document)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

/// Check that `canonical_data` decodes to exactly `document`.
pub fn verify_canonical<S: Snapshot>(
    document: &GraphDocument<S>,
    canonical_data: &[u8],
) -> Result<bool, WorldlineError> {
    let imported: GraphDocument<S> = import_canonical(canonical_data)?;
    Ok(&imported == document)
}

// =============================================================================
// TESTS
// =============================================================================
