//! # CLI Command Implementations

use super::ExportFormat;
use crate::api;
use crate::config::{Backend, Settings};
use crate::gateway::{SaveStore, load_engine, open_store, save_engine};
use crate::repl::Repl;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use worldline_core::{
    CommandRunner, GitEngine, GraphDocument, GraphLayout, WorldSnapshot, WorldlineError,
    canonical_checksum, canonical_digest, export_canonical, import_canonical, verify_canonical,
};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum script size (10 MB).
const MAX_SCRIPT_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Maximum file size for import (500 MB).
const MAX_IMPORT_FILE_SIZE: u64 = 500 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), WorldlineError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| WorldlineError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(WorldlineError::SerializationError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Resolve an input path, rejecting anything that is not an existing file.
///
/// Canonicalizing resolves `..` and symlinks before the file is opened.
fn validate_file_path(path: &Path) -> Result<PathBuf, WorldlineError> {
    let canonical = path.canonicalize().map_err(|e| {
        WorldlineError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(WorldlineError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Resolve an output path against its canonical parent directory.
fn validate_output_path(path: &Path) -> Result<PathBuf, WorldlineError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        WorldlineError::IoError(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(WorldlineError::IoError(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| WorldlineError::IoError("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_default()
    );
}

/// Open the configured store and restore the engine from it.
pub fn open_session(settings: &Settings) -> Result<(Arc<dyn SaveStore>, GitEngine), WorldlineError> {
    let store = open_store(settings);
    let engine = load_engine(store.as_ref())?;
    Ok((store, engine))
}

fn runner(settings: &Settings) -> CommandRunner {
    CommandRunner::new().with_log_limit(settings.log_limit)
}

// =============================================================================
// SESSION COMMANDS
// =============================================================================

/// Interactive session on stdin/stdout.
pub fn cmd_repl(settings: &Settings) -> Result<(), WorldlineError> {
    let (store, engine) = open_session(settings)?;
    let mut repl = Repl::new(engine, runner(settings))?.with_store(store, settings.autosave);

    let stdin = std::io::stdin();
    let interactive = stdin.is_terminal();
    if interactive {
        println!("Type 'help' for commands, 'exit' to leave.");
    }
    repl.run(stdin.lock(), std::io::stdout().lock(), interactive)
}

/// Run a script of session lines, then save.
pub fn cmd_run(settings: &Settings, script: &Path) -> Result<(), WorldlineError> {
    let validated_path = validate_file_path(script)?;
    validate_file_size(&validated_path, MAX_SCRIPT_FILE_SIZE)?;

    let contents = std::fs::read_to_string(&validated_path)
        .map_err(|e| WorldlineError::IoError(format!("Read script: {}", e)))?;

    tracing::info!(script = %validated_path.display(), "running script");

    let (store, engine) = open_session(settings)?;
    let mut repl = Repl::new(engine, runner(settings))?.with_store(store, false);
    repl.run(contents.as_bytes(), std::io::stdout().lock(), false)
}

/// Run one command line against the saved graph.
pub fn cmd_exec(settings: &Settings, line: &str, json_mode: bool) -> Result<(), WorldlineError> {
    let (store, mut engine) = open_session(settings)?;
    let live = engine.current_state()?;
    let outcome = runner(settings).run(&mut engine, line, &live);

    if outcome.mutated {
        save_engine(store.as_ref(), &engine)?;
    }

    if json_mode {
        print_json(&serde_json::json!({
            "success": !outcome.failed,
            "output": outcome.output,
            "mutated": outcome.mutated,
            "head": engine.head().to_string(),
        }));
    } else if !outcome.failed {
        println!("{}", outcome.output);
    }

    // Failures surface once, through the caller's error line.
    match outcome.error {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

// =============================================================================
// INSPECTION COMMANDS
// =============================================================================

/// Show graph status.
pub fn cmd_status(settings: &Settings, json_mode: bool) -> Result<(), WorldlineError> {
    let (_, engine) = open_session(settings)?;
    let head_id = engine
        .current_commit_id()
        .map(|id| id.as_str().to_string())
        .unwrap_or_default();

    if json_mode {
        let branches: Vec<_> = engine
            .branches()
            .map(|(name, id)| {
                serde_json::json!({
                    "name": name,
                    "commit": id.as_str(),
                    "color": engine.branch_color(name),
                })
            })
            .collect();
        print_json(&serde_json::json!({
            "store": settings.store.to_string_lossy(),
            "backend": settings.backend.to_string(),
            "head": engine.head().to_string(),
            "head_commit": head_id,
            "detached": engine.head().is_detached(),
            "commit_count": engine.commit_count(),
            "branches": branches,
        }));
        return Ok(());
    }

    println!("Worldline Status");
    println!("================");
    println!("Store:    {:?}", settings.store);
    println!("Backend:  {}", settings.backend);
    println!();
    println!("HEAD:     {}", engine.head());
    println!("Commit:   {}", head_id);
    println!("Commits:  {}", engine.commit_count());
    println!("Branches:");
    for (name, id) in engine.branches() {
        let marker = if engine.current_branch() == Some(name) {
            '*'
        } else {
            ' '
        };
        println!("  {} {} {}", marker, name, id.short());
    }

    Ok(())
}

/// Show first-parent history.
pub fn cmd_log(settings: &Settings, limit: usize, json_mode: bool) -> Result<(), WorldlineError> {
    let (_, engine) = open_session(settings)?;
    let history = engine.log(limit);

    if json_mode {
        let entries: Vec<_> = history
            .iter()
            .map(|c| {
                serde_json::json!({
                    "id": c.id.as_str(),
                    "message": c.message,
                    "parents": c.parents.iter().map(|p| p.as_str()).collect::<Vec<_>>(),
                    "timestamp": c.timestamp,
                    "branch": c.branch,
                })
            })
            .collect();
        print_json(&serde_json::Value::Array(entries));
        return Ok(());
    }

    for commit in history {
        let merge = if commit.is_merge() { " (merge)" } else { "" };
        println!("{} {}{}", commit.id.short(), commit.message, merge);
    }
    Ok(())
}

/// Show the lane layout.
pub fn cmd_layout(settings: &Settings, json_mode: bool) -> Result<(), WorldlineError> {
    let (_, engine) = open_session(settings)?;
    let layout = GraphLayout::compute(engine.graph());

    if json_mode {
        let value = serde_json::to_value(&layout)
            .map_err(|e| WorldlineError::SerializationError(e.to_string()))?;
        print_json(&value);
        return Ok(());
    }

    let mut nodes: Vec<_> = layout.nodes().iter().collect();
    nodes.sort_by_key(|n| (n.depth, n.lane));
    for node in nodes {
        let message = engine
            .commit_record(&node.id)
            .map(|c| c.message.as_str())
            .unwrap_or_default();
        println!(
            "{}* {} {}",
            "| ".repeat(node.lane as usize),
            node.id.short(),
            message
        );
    }
    println!();
    println!(
        "{} lanes, depth {}",
        layout.lane_count(),
        layout.max_depth()
    );
    Ok(())
}

/// Show the BLAKE3 digest of the canonical export.
pub fn cmd_hash(settings: &Settings, json_mode: bool) -> Result<(), WorldlineError> {
    let (_, engine) = open_session(settings)?;
    let document = engine.export();
    let digest = canonical_digest(&document)?;
    let checksum = canonical_checksum(&document)?;

    if json_mode {
        print_json(&serde_json::json!({
            "digest": digest,
            "checksum": checksum,
            "commit_count": engine.commit_count(),
        }));
    } else {
        println!("BLAKE3:   {}", digest);
        println!("Checksum: {}", checksum);
    }
    Ok(())
}

// =============================================================================
// EXPORT / IMPORT / INIT
// =============================================================================

/// Export the graph to a file.
pub fn cmd_export(
    settings: &Settings,
    output: &Path,
    format: ExportFormat,
) -> Result<(), WorldlineError> {
    let validated_output = validate_output_path(output)?;
    let (_, engine) = open_session(settings)?;
    let document = engine.export();

    let data = match format {
        ExportFormat::Canonical => {
            let data = export_canonical(&document)?;
            if !verify_canonical(&document, &data)? {
                return Err(WorldlineError::SerializationError(
                    "Canonical export did not round-trip".to_string(),
                ));
            }
            println!("Checksum: {}", canonical_checksum(&document)?);
            data
        }
        ExportFormat::Json => serde_json::to_vec_pretty(&document)
            .map_err(|e| WorldlineError::SerializationError(e.to_string()))?,
    };

    std::fs::write(&validated_output, &data)
        .map_err(|e| WorldlineError::IoError(format!("Write file: {}", e)))?;

    println!("Exported {} bytes to {:?}", data.len(), validated_output);
    Ok(())
}

/// Decode an export in either format.
pub fn read_document(data: &[u8]) -> Result<GraphDocument<WorldSnapshot>, WorldlineError> {
    match import_canonical(data) {
        Ok(document) => Ok(document),
        Err(canonical_err) => serde_json::from_slice(data).map_err(|_| canonical_err),
    }
}

/// Replace the saved graph with an exported one.
pub fn cmd_import(settings: &Settings, input: &Path) -> Result<(), WorldlineError> {
    let validated_path = validate_file_path(input)?;
    validate_file_size(&validated_path, MAX_IMPORT_FILE_SIZE)?;

    let data = std::fs::read(&validated_path)
        .map_err(|e| WorldlineError::IoError(format!("Read file: {}", e)))?;
    let document = read_document(&data)?;

    let (store, mut engine) = open_session(settings)?;
    engine.import(document)?;
    save_engine(store.as_ref(), &engine)?;

    println!(
        "Imported graph: {} commits, {} branches, HEAD at {}",
        engine.commit_count(),
        engine.graph().refs().branch_count(),
        engine.head()
    );
    Ok(())
}

/// Create a fresh save with a single root commit.
pub fn cmd_init(settings: &Settings, force: bool) -> Result<(), WorldlineError> {
    let path = &settings.store;
    if path.exists() {
        if !force {
            return Err(WorldlineError::IoError(
                "Save already exists. Use --force to overwrite.".to_string(),
            ));
        }
        if settings.backend == Backend::Redb {
            std::fs::remove_file(path)
                .map_err(|e| WorldlineError::IoError(format!("Remove old save: {}", e)))?;
        }
    }

    let store = open_store(settings);
    let engine = GitEngine::new(&WorldSnapshot::default())?;
    save_engine(store.as_ref(), &engine)?;

    println!(
        "Initialized new {} save at {:?}",
        store.name(),
        settings.store
    );
    Ok(())
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(settings: &Settings) -> Result<(), WorldlineError> {
    let (store, engine) = open_session(settings)?;

    println!("Worldline Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", settings.server.host);
    println!("  Port:     {}", settings.server.port);
    println!("  Backend:  {}", settings.backend);
    println!("  Store:    {:?}", settings.store);
    println!();
    println!("Endpoints:");
    println!("  GET  /health            - Health check");
    println!("  GET  /status            - HEAD and counts");
    println!("  GET  /graph             - Commits, branches and layout");
    println!("  GET  /state             - Snapshot at HEAD");
    println!("  POST /command           - Run a git command line");
    println!("  GET  /export            - JSON export");
    println!("  GET  /export/canonical  - Canonical export (base64)");
    println!("  POST /import            - Replace the graph");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    api::run_server(&addr, engine, store, settings.autosave).await
}

// =============================================================================
// TESTS
// =============================================================================
