//! # Worldline CLI Module
//!
//! ## Available Commands
//!
//! - `repl` - Interactive session (the default)
//! - `run` - Run a script of session lines
//! - `exec` - Run one `git ...` line against the saved graph
//! - `status` - Show HEAD and graph counts
//! - `log` - First-parent history from HEAD
//! - `layout` - Lane layout of the commit graph
//! - `export` / `import` - Whole-graph documents
//! - `init` - Create a fresh save
//! - `hash` - BLAKE3 digest of the canonical export
//! - `server` - Start the HTTP server

mod commands;

use crate::config::{Backend, Settings};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use worldline_core::WorldlineError;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Worldline - version control for a world's state
///
/// Commit, branch, merge and rewind snapshots of a world, git style.
#[derive(Parser, Debug)]
#[command(name = "worldline")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (defaults to ./worldline.toml when present)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Save location, overriding the config file
    #[arg(short = 'S', long, global = true)]
    pub store: Option<PathBuf>,

    /// Storage backend, overriding the config file
    #[arg(short = 'B', long, global = true, value_enum)]
    pub backend: Option<Backend>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Export encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Canonical,
    Json,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start an interactive session
    Repl,

    /// Run session lines from a script file
    Run {
        /// Script path, one session line per line
        script: PathBuf,
    },

    /// Run a single command line, e.g. `worldline exec "git branch feat"`
    Exec {
        /// The full command line, quoted
        line: String,
    },

    /// Show graph status
    Status,

    /// Show first-parent history from HEAD
    Log {
        /// Maximum number of entries
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Show the lane layout of the commit graph
    Layout,

    /// Export the graph
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Export format
        #[arg(short = 't', long, value_enum, default_value = "canonical")]
        format: ExportFormat,
    },

    /// Replace the saved graph with an exported one
    Import {
        /// Input file path (canonical or JSON)
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Initialize a fresh save
    Init {
        /// Overwrite an existing save
        #[arg(short, long)]
        force: bool,
    },

    /// Compute the BLAKE3 digest of the canonical export
    Hash,

    /// Start HTTP server
    Server {
        /// Host to bind to
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Resolve settings: config file, environment, then CLI flags.
pub fn resolve_settings(cli: &Cli) -> Result<Settings, WorldlineError> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(store) = &cli.store {
        settings.store = store.clone();
    }
    if let Some(backend) = cli.backend {
        settings.backend = backend;
    }
    if let Some(Commands::Server { host, port }) = &cli.command {
        if let Some(host) = host {
            settings.server.host = host.clone();
        }
        if let Some(port) = port {
            settings.server.port = *port;
        }
    }
    tracing::debug!(
        store = %settings.store.display(),
        backend = %settings.backend,
        "resolved settings"
    );
    Ok(settings)
}

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), WorldlineError> {
    let settings = resolve_settings(&cli)?;
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { .. }) => cmd_server(&settings).await,
        Some(Commands::Run { script }) => cmd_run(&settings, &script),
        Some(Commands::Exec { line }) => cmd_exec(&settings, &line, json_mode),
        Some(Commands::Status) => cmd_status(&settings, json_mode),
        Some(Commands::Log { limit }) => {
            cmd_log(&settings, limit.unwrap_or(settings.log_limit), json_mode)
        }
        Some(Commands::Layout) => cmd_layout(&settings, json_mode),
        Some(Commands::Export { output, format }) => cmd_export(&settings, &output, format),
        Some(Commands::Import { input }) => cmd_import(&settings, &input),
        Some(Commands::Init { force }) => cmd_init(&settings, force),
        Some(Commands::Hash) => cmd_hash(&settings, json_mode),
        Some(Commands::Repl) | None => cmd_repl(&settings),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flags_override_config() {
        let cli = Cli::parse_from([
            "worldline",
            "--store",
            "elsewhere.redb",
            "--backend",
            "redb",
            "server",
            "--port",
            "9999",
        ]);
        let settings = resolve_settings(&cli).expect("settings");

        assert_eq!(settings.store, PathBuf::from("elsewhere.redb"));
        assert_eq!(settings.backend, Backend::Redb);
        assert_eq!(settings.server.port, 9999);
    }

    #[test]
    fn exec_takes_one_line() {
        let cli = Cli::parse_from(["worldline", "exec", "git commit -m \"two words\""]);
        assert!(matches!(
            cli.command,
            Some(Commands::Exec { ref line }) if line == "git commit -m \"two words\""
        ));
    }

    #[test]
    fn export_format_parses() {
        let cli = Cli::parse_from(["worldline", "export", "-o", "out.json", "-t", "json"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Export {
                format: ExportFormat::Json,
                ..
            })
        ));
    }
}
