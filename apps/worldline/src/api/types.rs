//! # API Request/Response Types
//!
//! JSON structures for the HTTP API.

use serde::{Deserialize, Serialize};
use worldline_core::{
    GitEngine, GraphDocument, GraphLayout, LayoutEdge, WorldSnapshot, WorldlineError,
};

/// Maximum length of a command line accepted over HTTP.
pub const MAX_COMMAND_LENGTH: usize = 4096;

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// STATUS RESPONSE
// =============================================================================

/// One branch and where it points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchJson {
    pub name: String,
    pub commit: String,
    pub color: Option<String>,
    pub current: bool,
}

impl BranchJson {
    /// All branches of `engine`, sorted by name.
    pub fn list(engine: &GitEngine) -> Vec<Self> {
        let current = engine.current_branch();
        engine
            .branches()
            .map(|(name, id)| Self {
                name: name.to_string(),
                commit: id.as_str().to_string(),
                color: engine.branch_color(name).map(str::to_string),
                current: current == Some(name),
            })
            .collect()
    }
}

/// HEAD and graph counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Branch name, or `HEAD` when detached.
    pub head: String,
    pub head_commit: Option<String>,
    pub detached: bool,
    pub commit_count: usize,
    pub branch_count: usize,
}

impl StatusResponse {
    pub fn from_engine(engine: &GitEngine) -> Self {
        Self {
            head: engine.head().label().to_string(),
            head_commit: engine.current_commit_id().map(|id| id.as_str().to_string()),
            detached: engine.head().is_detached(),
            commit_count: engine.commit_count(),
            branch_count: engine.graph().refs().branch_count(),
        }
    }
}

// =============================================================================
// GRAPH RESPONSE
// =============================================================================

/// A commit with its layout slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitJson {
    pub id: String,
    pub message: String,
    pub parents: Vec<String>,
    pub timestamp: u64,
    pub branch: String,
    pub lane: u32,
    pub depth: u32,
    pub x: i64,
    pub y: i64,
}

/// Everything a graph view needs to draw the history.
#[derive(Debug, Clone, Serialize)]
pub struct GraphResponse {
    pub head: String,
    pub head_commit: Option<String>,
    pub commits: Vec<CommitJson>,
    pub edges: Vec<LayoutEdge>,
    pub branches: Vec<BranchJson>,
    pub lane_count: usize,
    pub max_depth: u32,
}

impl GraphResponse {
    pub fn from_engine(engine: &GitEngine) -> Self {
        let layout = GraphLayout::compute(engine.graph());
        let commits = layout
            .nodes()
            .iter()
            .filter_map(|node| {
                let commit = engine.commit_record(&node.id)?;
                Some(CommitJson {
                    id: node.id.as_str().to_string(),
                    message: commit.message.clone(),
                    parents: commit
                        .parents
                        .iter()
                        .map(|p| p.as_str().to_string())
                        .collect(),
                    timestamp: commit.timestamp,
                    branch: commit.branch.clone(),
                    lane: node.lane,
                    depth: node.depth,
                    x: node.x,
                    y: node.y,
                })
            })
            .collect();

        Self {
            head: engine.head().label().to_string(),
            head_commit: engine.current_commit_id().map(|id| id.as_str().to_string()),
            commits,
            edges: layout.edges().to_vec(),
            branches: BranchJson::list(engine),
            lane_count: layout.lane_count(),
            max_depth: layout.max_depth(),
        }
    }
}

// =============================================================================
// STATE RESPONSE
// =============================================================================

/// Snapshot at HEAD.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateResponse {
    pub commit: String,
    pub snapshot: WorldSnapshot,
}

// =============================================================================
// COMMAND REQUEST/RESPONSE
// =============================================================================

/// One command line, optionally with the caller's live world state.
///
/// Without `live`, commits record the snapshot at HEAD.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRequest {
    pub line: String,
    #[serde(default)]
    pub live: Option<WorldSnapshot>,
}

impl CommandRequest {
    /// Check size limits before the line reaches the engine.
    pub fn validate(&self) -> Result<(), WorldlineError> {
        if self.line.trim().is_empty() {
            return Err(WorldlineError::SerializationError(
                "command line is empty".to_string(),
            ));
        }
        if self.line.len() > MAX_COMMAND_LENGTH {
            return Err(WorldlineError::SerializationError(format!(
                "command line exceeds {} bytes",
                MAX_COMMAND_LENGTH
            )));
        }
        Ok(())
    }
}

/// Result of a command line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    pub success: bool,
    pub output: String,
    pub mutated: bool,
    /// Snapshot the caller should adopt, after checkout or reset.
    pub snapshot: Option<WorldSnapshot>,
    pub head: String,
    pub error: Option<String>,
}

impl CommandResponse {
    pub fn error(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        Self {
            success: false,
            output: msg.clone(),
            mutated: false,
            snapshot: None,
            head: String::new(),
            error: Some(msg),
        }
    }
}

// =============================================================================
// EXPORT RESPONSE
// =============================================================================

/// Canonical export response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResponse {
    pub success: bool,
    pub data: Option<String>, // Base64 encoded
    pub checksum: Option<u64>,
    /// BLAKE3 of the canonical bytes, hex.
    pub digest: Option<String>,
    pub error: Option<String>,
}

impl ExportResponse {
    pub fn success(data: &[u8], checksum: u64, digest: String) -> Self {
        Self {
            success: true,
            data: Some(base64::Engine::encode(
                &base64::engine::general_purpose::STANDARD,
                data,
            )),
            checksum: Some(checksum),
            digest: Some(digest),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            checksum: None,
            digest: None,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// IMPORT REQUEST/RESPONSE
// =============================================================================

/// A graph to import: either a JSON document or base64 canonical bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRequest {
    #[serde(default)]
    pub document: Option<GraphDocument<WorldSnapshot>>,
    #[serde(default)]
    pub data: Option<String>,
}

impl ImportRequest {
    /// Decode into a document. Exactly one of `document` / `data` must be set.
    pub fn into_document(self) -> Result<GraphDocument<WorldSnapshot>, WorldlineError> {
        match (self.document, self.data) {
            (Some(document), None) => Ok(document),
            (None, Some(data)) => {
                let bytes =
                    base64::Engine::decode(&base64::engine::general_purpose::STANDARD, data)
                        .map_err(|e| WorldlineError::ImportMalformed(format!("base64: {}", e)))?;
                worldline_core::import_canonical(&bytes)
            }
            _ => Err(WorldlineError::ImportMalformed(
                "expected exactly one of 'document' or 'data'".to_string(),
            )),
        }
    }
}

/// Import result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportResponse {
    pub success: bool,
    pub commit_count: Option<usize>,
    pub branch_count: Option<usize>,
    pub head: Option<String>,
    /// Snapshot at the imported HEAD.
    pub snapshot: Option<WorldSnapshot>,
    pub error: Option<String>,
}

impl ImportResponse {
    pub fn success(engine: &GitEngine, snapshot: WorldSnapshot) -> Self {
        Self {
            success: true,
            commit_count: Some(engine.commit_count()),
            branch_count: Some(engine.graph().refs().branch_count()),
            head: Some(engine.head().label().to_string()),
            snapshot: Some(snapshot),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            commit_count: None,
            branch_count: None,
            head: None,
            snapshot: None,
            error: Some(msg.into()),
        }
    }
}
