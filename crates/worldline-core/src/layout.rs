//! # Graph Layout
//!
//! Assigns every commit a `(lane, depth)` slot and a pixel position.
//!
//! - depth: longest parent chain back to a root
//! - lane: first parent's lane if free at this depth, else the lowest free
//!   lane at this depth
//!
//! Commits are visited in `(timestamp, sequence)` order. Lanes are tracked
//! per depth, so a lane freed by one branch is reused further down by
//! another. Jitter comes from FNV-1a of the id and is the same every call.
//!
//! Pure: reads a `Graph`, allocates its own result, keeps nothing.

use crate::digest::fnv1a_64;
use crate::graph::Graph;
use crate::primitives::{DEPTH_HEIGHT, JITTER_SPAN, LANE_WIDTH};
use crate::types::CommitId;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Placement of one commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayoutNode {
    pub id: CommitId,
    pub lane: u32,
    pub depth: u32,
    pub x: i64,
    pub y: i64,
}

/// Which parent slot an edge comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// `parents[0]`.
    FirstParent,
    /// Any later parent of a merge commit.
    Merge,
}

/// A child -> parent connection for drawing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayoutEdge {
    pub child: CommitId,
    pub parent: CommitId,
    pub kind: EdgeKind,
}

/// A computed layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphLayout {
    nodes: Vec<LayoutNode>,
    edges: Vec<LayoutEdge>,
}

impl GraphLayout {
    /// Lay out every commit in `graph`.
    #[must_use]
    pub fn compute<S>(graph: &Graph<S>) -> Self {
        let store = graph.store();
        let mut ordered = store.in_insertion_order();

        // Parents always precede children in insertion order.
        let mut depths: BTreeMap<&CommitId, u32> = BTreeMap::new();
        for commit in ordered.iter().copied() {
            let depth = commit
                .parents
                .iter()
                .filter_map(|p| depths.get(p))
                .map(|d| d.saturating_add(1))
                .max()
                .unwrap_or(0);
            depths.insert(&commit.id, depth);
        }

        // Stable: ties keep insertion order.
        ordered.sort_by_key(|c| (c.timestamp, c.sequence));

        let mut used: BTreeMap<u32, BTreeSet<u32>> = BTreeMap::new();
        let mut lanes: BTreeMap<&CommitId, u32> = BTreeMap::new();
        let mut nodes = Vec::with_capacity(ordered.len());
        let mut edges = Vec::new();

        for commit in ordered {
            let depth = depths.get(&commit.id).copied().unwrap_or(0);
            let taken = used.entry(depth).or_default();

            let preferred = commit
                .first_parent()
                .and_then(|p| lanes.get(p))
                .copied()
                .filter(|lane| !taken.contains(lane));
            let lane = preferred.unwrap_or_else(|| lowest_free_lane(taken));
            taken.insert(lane);
            lanes.insert(&commit.id, lane);

            let (jitter_x, jitter_y) = jitter(&commit.id);
            nodes.push(LayoutNode {
                id: commit.id.clone(),
                lane,
                depth,
                x: i64::from(lane) * LANE_WIDTH + jitter_x,
                y: i64::from(depth) * DEPTH_HEIGHT + jitter_y,
            });

            for (index, parent) in commit.parents.iter().enumerate() {
                edges.push(LayoutEdge {
                    child: commit.id.clone(),
                    parent: parent.clone(),
                    kind: if index == 0 {
                        EdgeKind::FirstParent
                    } else {
                        EdgeKind::Merge
                    },
                });
            }
        }

        Self { nodes, edges }
    }

    /// Nodes in processing order.
    #[must_use]
    pub fn nodes(&self) -> &[LayoutNode] {
        &self.nodes
    }

    #[must_use]
    pub fn edges(&self) -> &[LayoutEdge] {
        &self.edges
    }

    /// Node for a commit id.
    #[must_use]
    pub fn node(&self, id: &CommitId) -> Option<&LayoutNode> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    /// Number of distinct lanes in use.
    #[must_use]
    pub fn lane_count(&self) -> usize {
        self.nodes
            .iter()
            .map(|n| n.lane)
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Deepest depth, or 0 for an empty layout.
    #[must_use]
    pub fn max_depth(&self) -> u32 {
        self.nodes.iter().map(|n| n.depth).max().unwrap_or(0)
    }

    #[must_use]
    pub fn into_nodes(self) -> Vec<LayoutNode> {
        self.nodes
    }
}

/// Lay out `graph` and return only the nodes.
#[must_use]
pub fn layout<S>(graph: &Graph<S>) -> Vec<LayoutNode> {
    GraphLayout::compute(graph).into_nodes()
}

fn lowest_free_lane(taken: &BTreeSet<u32>) -> u32 {
    let mut lane = 0;
    while taken.contains(&lane) {
        lane += 1;
    }
    lane
}

/// Cosmetic offset in `[-JITTER_SPAN, JITTER_SPAN]` on each axis.
fn jitter(id: &CommitId) -> (i64, i64) {
    let hash = fnv1a_64(id.as_str().as_bytes());
    let span = 2 * JITTER_SPAN + 1;
    let low = (hash & 0xffff_ffff) as i64;
    let high = (hash >> 32) as i64;
    (low % span - JITTER_SPAN, high % span - JITTER_SPAN)
}

// =============================================================================
// TESTS
// =============================================================================
