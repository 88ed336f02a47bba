//! # Command Surface
//!
//! The text grammar on top of `GitEngine`:
//!
//! ```text
//! git branch                 list branches
//! git branch <name>          create a branch at HEAD
//! git checkout [-b] <target> switch (optionally creating first)
//! git commit -m "<message>"  commit the live snapshot
//! git merge <branch>         merge and delete <branch>
//! git reset [--hard|--soft] <target>
//! git log                    first-parent history
//! git status                 HEAD and counts
//! ```
//!
//! Tokens are case-sensitive. Anything else parses to `Unrecognized`.
//! `CommandRunner::run` never fails: engine errors come back as a one-line
//! `error: ...` output.

use crate::engine::GitEngine;
use crate::types::{Head, ResetMode, Snapshot, WorldlineError};

/// Default number of entries printed by `git log`.
pub const DEFAULT_LOG_LIMIT: usize = 20;

/// A parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    BranchList,
    BranchCreate(String),
    Checkout { target: String, create: bool },
    Commit { message: String },
    Merge(String),
    Reset { target: String, mode: ResetMode },
    Log,
    Status,
    Unrecognized(String),
}

impl Command {
    /// Parse one line of input.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let unrecognized = || Command::Unrecognized(line.trim().to_string());
        let Some(tokens) = tokenize(line) else {
            return unrecognized();
        };
        let words: Vec<&str> = tokens.iter().map(String::as_str).collect();

        match words.as_slice() {
            ["git", "branch"] => Command::BranchList,
            ["git", "branch", name] => Command::BranchCreate((*name).to_string()),
            ["git", "checkout", "-b", name] => Command::Checkout {
                target: (*name).to_string(),
                create: true,
            },
            ["git", "checkout", target] if *target != "-b" => Command::Checkout {
                target: (*target).to_string(),
                create: false,
            },
            ["git", "commit", "-m", message] => Command::Commit {
                message: (*message).to_string(),
            },
            ["git", "merge", branch] => Command::Merge((*branch).to_string()),
            ["git", "reset", flag, target] if flag.starts_with("--") => {
                match flag.parse::<ResetMode>() {
                    Ok(mode) => Command::Reset {
                        target: (*target).to_string(),
                        mode,
                    },
                    Err(_) => unrecognized(),
                }
            }
            ["git", "reset", target] if !target.starts_with("--") => Command::Reset {
                target: (*target).to_string(),
                mode: ResetMode::Soft,
            },
            ["git", "log"] => Command::Log,
            ["git", "status"] => Command::Status,
            _ => unrecognized(),
        }
    }

    /// Check whether running this command can change the graph.
    #[must_use]
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Command::BranchCreate(_)
                | Command::Checkout { .. }
                | Command::Commit { .. }
                | Command::Merge(_)
                | Command::Reset { .. }
        )
    }
}

/// Split on whitespace, honoring double quotes and `\"` / `\\` escapes.
///
/// Returns `None` for an unterminated quote.
fn tokenize(line: &str) -> Option<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quoted = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' if quoted => match chars.next() {
                Some(escaped) => current.push(escaped),
                None => return None,
            },
            '"' => {
                quoted = !quoted;
                in_token = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                current.push(c);
                in_token = true;
            }
        }
    }

    if quoted {
        return None;
    }
    if in_token {
        tokens.push(current);
    }
    Some(tokens)
}

/// Result of running one command line.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutcome<S> {
    /// Text to show the user. One line for errors.
    pub output: String,
    /// The snapshot the caller should adopt as its live state, if it changed.
    pub snapshot: Option<S>,
    /// True when the graph may have changed and should be persisted.
    pub mutated: bool,
    pub failed: bool,
    /// The error behind a failed command.
    pub error: Option<WorldlineError>,
}

impl<S> CommandOutcome<S> {
    fn ok(output: impl Into<String>, snapshot: Option<S>, mutated: bool) -> Self {
        Self {
            output: output.into(),
            snapshot,
            mutated,
            failed: false,
            error: None,
        }
    }

    fn failure(output: impl Into<String>, error: WorldlineError) -> Self {
        Self {
            output: output.into(),
            snapshot: None,
            mutated: false,
            failed: true,
            error: Some(error),
        }
    }
}

/// Runs parsed commands against an engine.
#[derive(Debug, Clone, Copy)]
pub struct CommandRunner {
    log_limit: usize,
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self {
            log_limit: DEFAULT_LOG_LIMIT,
        }
    }
}

impl CommandRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override how many entries `git log` prints.
    #[must_use]
    pub fn with_log_limit(mut self, limit: usize) -> Self {
        self.log_limit = limit;
        self
    }

    /// Parse and run one line. `live` is the caller's current snapshot.
    pub fn run<S: Snapshot>(
        &self,
        engine: &mut GitEngine<S>,
        line: &str,
        live: &S,
    ) -> CommandOutcome<S> {
        let command = Command::parse(line);
        let outcome = self.execute(engine, &command, live);
        if outcome.failed {
            tracing::debug!(line, output = %outcome.output, "command failed");
        }
        outcome
    }

    /// Run an already parsed command.
    pub fn execute<S: Snapshot>(
        &self,
        engine: &mut GitEngine<S>,
        command: &Command,
        live: &S,
    ) -> CommandOutcome<S> {
        let result = match command {
            Command::BranchList => Ok(CommandOutcome::ok(render_branches(engine), None, false)),
            Command::BranchCreate(name) => engine.create_branch(name).map(|()| {
                let at = engine
                    .current_commit_id()
                    .map(|id| id.short().to_string())
                    .unwrap_or_default();
                CommandOutcome::ok(format!("Created branch '{}' at {}", name, at), None, true)
            }),
            Command::Checkout { target, create } => {
                let result = if *create {
                    engine.checkout_new_branch(target)
                } else {
                    engine.checkout(target)
                };
                result.map(|snapshot| {
                    let message = match (engine.head(), *create) {
                        (Head::Attached(name), true) => {
                            format!("Switched to a new branch '{}'", name)
                        }
                        (Head::Attached(name), false) => format!("Switched to branch '{}'", name),
                        (Head::Detached(id), _) => {
                            format!("HEAD is now detached at {}", id.short())
                        }
                    };
                    CommandOutcome::ok(message, Some(snapshot), true)
                })
            }
            Command::Commit { message } => engine.commit(message, live).map(|id| {
                let label = engine.head().label().to_string();
                CommandOutcome::ok(format!("[{} {}] {}", label, id.short(), message), None, true)
            }),
            Command::Merge(branch) => engine
                .merge(branch)
                .map(|status| CommandOutcome::ok(status, None, true)),
            Command::Reset { target, mode } => {
                let before = engine.commit_count();
                engine.reset(target, *mode, live).map(|snapshot| {
                    let mut message = engine
                        .graph()
                        .head_commit()
                        .map(|c| format!("HEAD is now at {} {}", c.id.short(), c.message))
                        .unwrap_or_default();
                    let removed = before.saturating_sub(engine.commit_count());
                    if removed > 0 {
                        message.push_str(&format!(" (collected {} unreachable)", removed));
                    }
                    CommandOutcome::ok(message, Some(snapshot), true)
                })
            }
            Command::Log => Ok(CommandOutcome::ok(render_log(engine, self.log_limit), None, false)),
            Command::Status => Ok(CommandOutcome::ok(render_status(engine), None, false)),
            Command::Unrecognized(line) => {
                let error = WorldlineError::UnrecognizedCommand(line.clone());
                return CommandOutcome::failure(error.to_string(), error);
            }
        };

        result.unwrap_or_else(|e| CommandOutcome::failure(format!("error: {}", e), e))
    }
}

fn render_branches<S: Snapshot>(engine: &GitEngine<S>) -> String {
    let current = engine.current_branch();
    engine
        .branches()
        .map(|(name, id)| {
            let marker = if Some(name) == current { '*' } else { ' ' };
            format!("{} {} {}", marker, name, id.short())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_log<S: Snapshot>(engine: &GitEngine<S>, limit: usize) -> String {
    engine
        .log(limit)
        .into_iter()
        .map(|c| format!("{} {}", c.id.short(), c.message))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_status<S: Snapshot>(engine: &GitEngine<S>) -> String {
    let location = match engine.head() {
        Head::Attached(name) => format!("On branch {}", name),
        Head::Detached(id) => format!("HEAD detached at {}", id.short()),
    };
    format!(
        "{}\n{} commits, {} branches",
        location,
        engine.commit_count(),
        engine.graph().refs().branch_count()
    )
}

// =============================================================================
// TESTS
// =============================================================================
