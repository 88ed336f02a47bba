//! # Worldline HTTP API Module
//!
//! A JSON API over one shared engine, for graph UIs and remote drivers.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /status` - HEAD and counts
//! - `GET /graph` - Commits with lane layout, edges and branches
//! - `GET /state` - Snapshot at HEAD
//! - `POST /command` - Run a `git ...` command line
//! - `GET /export` - Whole graph as a JSON document
//! - `GET /export/canonical` - Canonical export, base64 encoded
//! - `POST /import` - Replace the graph
//!
//! ## Security Configuration (Environment Variables)
//!
//! - `WORLDLINE_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)
//! - `WORLDLINE_RATE_LIMIT`: Requests per second (default: 100, 0 to disable)
//! - `WORLDLINE_API_KEY`: If set, requires Bearer token authentication

mod auth;
mod handlers;
mod middleware;
mod types;

pub use auth::{API_KEY_ENV, get_api_key_from_env};
pub use middleware::{create_rate_limiter, get_rate_limit_from_env};
pub use types::{
    BranchJson, CommandRequest, CommandResponse, CommitJson, ExportResponse, GraphResponse,
    HealthResponse, ImportRequest, ImportResponse, MAX_COMMAND_LENGTH, StateResponse,
    StatusResponse,
};

use crate::gateway::SaveStore;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use worldline_core::{GitEngine, WorldlineError};

/// Maximum request body (2 MB).
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RwLock<GitEngine>>,
    /// Where the graph is saved. `None` keeps the graph in memory only.
    pub store: Option<Arc<dyn SaveStore>>,
    /// Save after every mutation, not only at shutdown.
    pub autosave: bool,
}

impl AppState {
    #[must_use]
    pub fn new(engine: GitEngine) -> Self {
        Self {
            engine: Arc::new(RwLock::new(engine)),
            store: None,
            autosave: true,
        }
    }

    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn SaveStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn with_autosave(mut self, autosave: bool) -> Self {
        self.autosave = autosave;
        self
    }

    /// Save the current graph, whatever the autosave setting.
    pub async fn save(&self) -> Result<(), WorldlineError> {
        if let Some(store) = &self.store {
            let engine = self.engine.read().await;
            crate::gateway::save_engine(store.as_ref(), &engine)?;
        }
        Ok(())
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build CORS layer from `WORLDLINE_CORS_ORIGINS`.
///
/// - `*`: any origin
/// - unset or no valid entries: localhost only
/// - otherwise: the listed origins
fn build_cors_layer() -> CorsLayer {
    let origins_env = std::env::var("WORLDLINE_CORS_ORIGINS").ok();

    match origins_env.as_deref() {
        Some("*") => {
            tracing::warn!(
                "CORS: Allowing ALL origins (WORLDLINE_CORS_ORIGINS=*). This is insecure for production!"
            );
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!(
                    "CORS: No valid origins in WORLDLINE_CORS_ORIGINS, defaulting to localhost only"
                );
                build_localhost_cors()
            } else {
                restricted_cors(allowed_origins)
            }
        }
        None => {
            tracing::info!("CORS: No WORLDLINE_CORS_ORIGINS set, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

fn restricted_cors(origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

fn build_localhost_cors() -> CorsLayer {
    let origins = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();
    restricted_cors(origins)
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing
/// 2. CORS
/// 3. Body limit
/// 4. Rate limiting (if enabled)
/// 5. Authentication (if configured)
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer();

    let rate_limit = get_rate_limit_from_env();
    let rate_limiter = if rate_limit > 0 {
        tracing::info!("Rate limiting enabled: {} requests/second", rate_limit);
        Some(create_rate_limiter(rate_limit))
    } else {
        tracing::info!("Rate limiting disabled");
        None
    };

    let has_auth = get_api_key_from_env().is_some();
    if has_auth {
        tracing::info!("API key authentication enabled");
    } else {
        tracing::warn!(
            "API key authentication DISABLED - all endpoints are publicly accessible! \
             Set {} to enable authentication.",
            API_KEY_ENV
        );
    }

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
        .route("/graph", get(handlers::graph_handler))
        .route("/state", get(handlers::state_handler))
        .route("/command", post(handlers::command_handler))
        .route("/export", get(handlers::export_handler))
        .route("/export/canonical", get(handlers::export_canonical_handler))
        .route("/import", post(handlers::import_handler));

    if has_auth {
        router = router.layer(axum_middleware::from_fn(auth::api_key_auth_middleware));
    }

    if let Some(limiter) = rate_limiter {
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    router
        .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Serve the API on `addr` until Ctrl+C, then save once more.
///
/// `autosave` only controls saving after each mutation; the shutdown save
/// always happens.
pub async fn run_server(
    addr: &str,
    engine: GitEngine,
    store: Arc<dyn SaveStore>,
    autosave: bool,
) -> Result<(), WorldlineError> {
    let state = AppState::new(engine)
        .with_store(store)
        .with_autosave(autosave);
    let router = create_router(state.clone());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| WorldlineError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!("Worldline HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| WorldlineError::IoError(format!("Server error: {}", e)))?;

    state.save().await?;
    tracing::info!("saved graph on shutdown");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
