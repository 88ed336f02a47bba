//! # API Endpoint Handlers

use super::{
    AppState,
    types::{
        CommandRequest, CommandResponse, ExportResponse, GraphResponse, HealthResponse,
        ImportRequest, ImportResponse, StateResponse, StatusResponse,
    },
};
use crate::gateway::save_engine;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use worldline_core::{
    CommandRunner, GitEngine, WorldlineError, canonical_checksum, canonical_digest,
    export_canonical,
};

/// Save after a mutation when autosave is on. A failed save is logged,
/// the in-memory graph stays authoritative.
fn persist(state: &AppState, engine: &GitEngine) {
    if !state.autosave {
        return;
    }
    if let Some(store) = &state.store
        && let Err(e) = save_engine(store.as_ref(), engine)
    {
        tracing::error!(store = store.name(), error = %e, "failed to save graph");
    }
}

// =============================================================================
// HEALTH / STATUS
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

/// HEAD and counts.
pub async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let engine = state.engine.read().await;
    (StatusCode::OK, Json(StatusResponse::from_engine(&engine)))
}

// =============================================================================
// GRAPH / STATE
// =============================================================================

/// Commits with layout, edges and branches.
pub async fn graph_handler(State(state): State<AppState>) -> impl IntoResponse {
    let engine = state.engine.read().await;
    (StatusCode::OK, Json(GraphResponse::from_engine(&engine)))
}

/// Snapshot at HEAD.
pub async fn state_handler(State(state): State<AppState>) -> impl IntoResponse {
    let engine = state.engine.read().await;
    let commit = engine
        .current_commit_id()
        .map(|id| id.as_str().to_string())
        .unwrap_or_default();

    match engine.current_state() {
        Ok(snapshot) => Ok(Json(StateResponse { commit, snapshot })),
        Err(e) => Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

// =============================================================================
// COMMAND HANDLER
// =============================================================================

/// Run one `git ...` command line.
pub async fn command_handler(
    State(state): State<AppState>,
    Json(request): Json<CommandRequest>,
) -> impl IntoResponse {
    if let Err(e) = request.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(CommandResponse::error(format!("Invalid command: {}", e))),
        );
    }

    let mut engine = state.engine.write().await;
    let live = match request.live {
        Some(live) => live,
        None => match engine.current_state() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(CommandResponse::error(e.to_string())),
                );
            }
        },
    };

    let outcome = CommandRunner::new().run(&mut *engine, &request.line, &live);
    if outcome.mutated {
        persist(&state, &engine);
    }

    let status = if outcome.failed {
        StatusCode::UNPROCESSABLE_ENTITY
    } else {
        StatusCode::OK
    };
    let response = CommandResponse {
        success: !outcome.failed,
        error: outcome.failed.then(|| outcome.output.clone()),
        output: outcome.output,
        mutated: outcome.mutated,
        snapshot: outcome.snapshot,
        head: engine.head().label().to_string(),
    };
    (status, Json(response))
}

// =============================================================================
// EXPORT / IMPORT
// =============================================================================

/// Whole graph as a JSON document.
pub async fn export_handler(State(state): State<AppState>) -> impl IntoResponse {
    let engine = state.engine.read().await;
    Json(engine.export())
}

/// Whole graph in the canonical binary format, base64 encoded.
pub async fn export_canonical_handler(State(state): State<AppState>) -> impl IntoResponse {
    let engine = state.engine.read().await;
    let document = engine.export();

    let encoded = export_canonical(&document).and_then(|data| {
        let checksum = canonical_checksum(&document)?;
        let digest = canonical_digest(&document)?;
        Ok(ExportResponse::success(&data, checksum, digest))
    });

    match encoded {
        Ok(response) => (StatusCode::OK, Json(response)),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ExportResponse::error(format!("Export failed: {}", e))),
        ),
    }
}

/// Replace the graph. A rejected document leaves the current graph as is.
pub async fn import_handler(
    State(state): State<AppState>,
    Json(request): Json<ImportRequest>,
) -> impl IntoResponse {
    let document = match request.into_document() {
        Ok(document) => document,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ImportResponse::error(format!("Import failed: {}", e))),
            );
        }
    };

    let mut engine = state.engine.write().await;
    match engine.import(document) {
        Ok(snapshot) => {
            persist(&state, &engine);
            tracing::info!(commits = engine.commit_count(), "imported graph over HTTP");
            (StatusCode::OK, Json(ImportResponse::success(&engine, snapshot)))
        }
        Err(e @ WorldlineError::ImportMalformed(_)) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ImportResponse::error(format!("Import failed: {}", e))),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ImportResponse::error(format!("Import failed: {}", e))),
        ),
    }
}
