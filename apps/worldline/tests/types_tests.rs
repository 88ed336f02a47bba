//! Unit tests for API request/response types.

#![allow(clippy::unwrap_used, clippy::panic)]

use std::sync::Arc;
use worldline::api::{
    BranchJson, CommandRequest, ExportResponse, GraphResponse, HealthResponse, ImportRequest,
    ImportResponse, MAX_COMMAND_LENGTH, StatusResponse,
};
use worldline_core::{
    GitEngine, ManualClock, Position, WorldSnapshot, WorldlineError, export_canonical,
};

fn engine() -> GitEngine {
    GitEngine::with_clock(
        &WorldSnapshot::default(),
        Arc::new(ManualClock::stepping(100, 1)),
    )
    .unwrap()
}

// =============================================================================
// HEALTH / STATUS
// =============================================================================

#[test]
fn test_health_response_default() {
    let health = HealthResponse::default();
    assert_eq!(health.status, "ok");
    assert!(!health.version.is_empty());
}

#[test]
fn test_status_detached() {
    let mut engine = engine();
    let root = engine.current_commit_id().cloned().unwrap();
    engine.checkout(root.as_str()).unwrap();

    let status = StatusResponse::from_engine(&engine);
    assert_eq!(status.head, "HEAD");
    assert!(status.detached);
    assert_eq!(status.head_commit.as_deref(), Some(root.as_str()));
}

#[test]
fn test_branch_list_marks_current() {
    let mut engine = engine();
    engine.create_branch("alt").unwrap();

    let branches = BranchJson::list(&engine);
    assert_eq!(branches.len(), 2);
    assert_eq!(branches[0].name, "alt");
    assert!(!branches[0].current);
    assert!(branches[1].current);
    assert!(branches.iter().all(|b| b.color.is_some()));
}

#[test]
fn test_graph_response_serializes_edge_kinds() {
    let mut engine = engine();
    engine.commit("one", &WorldSnapshot::default()).unwrap();

    let graph = GraphResponse::from_engine(&engine);
    assert_eq!(graph.commits.len(), 2);
    assert_eq!(graph.lane_count, 1);

    let json = serde_json::to_string(&graph).unwrap();
    assert!(json.contains("\"kind\":\"first_parent\""));
}

// =============================================================================
// COMMAND REQUEST
// =============================================================================

#[test]
fn test_command_request_without_live() {
    let request: CommandRequest = serde_json::from_str(r#"{"line":"git log"}"#).unwrap();
    assert!(request.live.is_none());
    assert!(request.validate().is_ok());
}

#[test]
fn test_command_request_with_live() {
    let json = r#"{"line":"git commit -m x","live":{"position":{"x":1,"y":2,"z":0},"cells":{}}}"#;
    let request: CommandRequest = serde_json::from_str(json).unwrap();
    assert_eq!(
        request.live.map(|l| l.position),
        Some(Position::planar(1, 2))
    );
}

#[test]
fn test_command_request_limits() {
    let empty = CommandRequest {
        line: "   ".to_string(),
        live: None,
    };
    assert!(empty.validate().is_err());

    let long = CommandRequest {
        line: "x".repeat(MAX_COMMAND_LENGTH + 1),
        live: None,
    };
    assert!(long.validate().is_err());
}

// =============================================================================
// EXPORT / IMPORT
// =============================================================================

#[test]
fn test_export_response_base64() {
    let response = ExportResponse::success(&[1, 2, 3], 7, "ab".to_string());
    assert_eq!(response.data.as_deref(), Some("AQID"));
    assert_eq!(response.checksum, Some(7));
    assert!(response.error.is_none());
}

#[test]
fn test_import_request_from_base64() {
    let engine = engine();
    let bytes = export_canonical(&engine.export()).unwrap();
    let request = ImportRequest {
        document: None,
        data: Some(base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            &bytes,
        )),
    };

    assert_eq!(request.into_document().unwrap(), engine.export());
}

#[test]
fn test_import_request_rejects_both_and_neither() {
    let engine = engine();
    let both = ImportRequest {
        document: Some(engine.export()),
        data: Some(String::new()),
    };
    assert!(matches!(
        both.into_document(),
        Err(WorldlineError::ImportMalformed(_))
    ));

    let neither = ImportRequest {
        document: None,
        data: None,
    };
    assert!(neither.into_document().is_err());
}

#[test]
fn test_import_request_bad_base64() {
    let request = ImportRequest {
        document: None,
        data: Some("!!!".to_string()),
    };
    assert!(matches!(
        request.into_document(),
        Err(WorldlineError::ImportMalformed(_))
    ));
}

#[test]
fn test_import_response_error() {
    let response = ImportResponse::error("nope");
    assert!(!response.success);
    assert_eq!(response.error.as_deref(), Some("nope"));
}
