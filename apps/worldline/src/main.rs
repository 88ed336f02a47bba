//! # Worldline
//!
//! The main binary for the Worldline version-control engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   apps/worldline (THE BINARY)                   │
//! │                                                                 │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────────┐    │
//! │  │  CLI + REPL │    │   HTTP API  │    │   Save Gateway   │    │
//! │  │   (clap)    │    │   (axum)    │    │  (file / redb)   │    │
//! │  └──────┬──────┘    └──────┬──────┘    └────────┬─────────┘    │
//! │         │                  │                    │              │
//! │         └──────────────────┼────────────────────┘              │
//! │                            ▼                                   │
//! │                    ┌────────────────┐                          │
//! │                    │ worldline-core │                          │
//! │                    │  (THE LOGIC)   │                          │
//! │                    └────────────────┘                          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Interactive session
//! worldline
//!
//! # One-shot commands against the saved graph
//! worldline exec "git checkout -b experiment"
//! worldline log -n 5
//!
//! # HTTP API for a graph view
//! worldline server --port 8080
//! ```

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use worldline::cli;

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    // WORLDLINE_LOG_FORMAT=json switches to machine-parseable output.
    // Logs go to stderr so session output on stdout stays clean.
    let log_format =
        std::env::var("WORLDLINE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let default_filter = if cli.verbose {
        "worldline=debug,worldline_core=debug,tower_http=debug"
    } else {
        "worldline=info,worldline_core=info,tower_http=debug"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

/// Print the startup banner.
fn print_banner() {
    println!(
        r#"
  ╦ ╦╔═╗╦═╗╦  ╔╦╗╦  ╦╔╗╔╔═╗
  ║║║║ ║╠╦╝║   ║║║  ║║║║║╣
  ╚╩╝╚═╝╩╚═╩═╝═╩╝╩═╝╩╝╚╝╚═╝

  Worldline v{}

  Commit • Branch • Rewind
"#,
        env!("CARGO_PKG_VERSION")
    );
}
