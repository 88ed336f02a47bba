//! # Interactive Session
//!
//! A line-oriented shell over one engine. Lines starting with `git` go to
//! the command surface; a few world commands edit the live snapshot the
//! next commit will record.
//!
//! ```text
//! world> move 3 4
//! world> set lamp lit
//! world> git commit -m "light the lamp"
//! [main 1a2b3c4] light the lamp
//! ```

use crate::gateway::{SaveStore, save_engine};
use std::io::{BufRead, Write};
use std::sync::Arc;
use worldline_core::{CommandRunner, GitEngine, Position, WorldSnapshot, WorldlineError};

const PROMPT: &str = "world> ";

const HELP: &str = "\
World commands:
  move <x> <y> [z]     Move to a position
  set <key> <value>    Set a world cell
  unset <key>          Clear a world cell
  show                 Print the live world state
  help                 Show this help
  exit | quit          Leave the session

Graph commands:
  git branch [name]
  git checkout [-b] <branch|commit|HEAD~n>
  git commit -m \"message\"
  git merge <branch>
  git reset [--soft|--hard] <target>
  git log
  git status";

/// What the session loop should do after a line.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Continue(String),
    Exit,
}

/// One interactive session.
#[derive(Debug)]
pub struct Repl {
    engine: GitEngine,
    live: WorldSnapshot,
    runner: CommandRunner,
    store: Option<Arc<dyn SaveStore>>,
    autosave: bool,
}

impl Repl {
    /// Start at the engine's current commit.
    pub fn new(engine: GitEngine, runner: CommandRunner) -> Result<Self, WorldlineError> {
        let live = engine.current_state()?;
        Ok(Self {
            engine,
            live,
            runner,
            store: None,
            autosave: false,
        })
    }

    /// Persist to `store`, after every mutation when `autosave` is set and
    /// always on exit.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn SaveStore>, autosave: bool) -> Self {
        self.store = Some(store);
        self.autosave = autosave;
        self
    }

    pub fn engine(&self) -> &GitEngine {
        &self.engine
    }

    pub fn live(&self) -> &WorldSnapshot {
        &self.live
    }

    /// Read lines from `input` until EOF or `exit`.
    ///
    /// With `interactive` set, a prompt is written before each line.
    pub fn run<R: BufRead, W: Write>(
        &mut self,
        input: R,
        mut output: W,
        interactive: bool,
    ) -> Result<(), WorldlineError> {
        let io = |e: std::io::Error| WorldlineError::IoError(e.to_string());

        if interactive {
            write!(output, "{}", PROMPT).map_err(io)?;
            output.flush().map_err(io)?;
        }

        for line in input.lines() {
            let line = line.map_err(io)?;
            match self.handle(&line) {
                Step::Exit => break,
                Step::Continue(text) => {
                    if !text.is_empty() {
                        writeln!(output, "{}", text).map_err(io)?;
                    }
                }
            }
            if interactive {
                write!(output, "{}", PROMPT).map_err(io)?;
                output.flush().map_err(io)?;
            }
        }

        self.save()
    }

    /// Handle one line and return what to print.
    pub fn eval(&mut self, line: &str) -> Option<String> {
        match self.handle(line) {
            Step::Continue(text) => Some(text),
            Step::Exit => None,
        }
    }

    fn handle(&mut self, line: &str) -> Step {
        let trimmed = line.trim();
        let words: Vec<&str> = trimmed.split_whitespace().collect();

        let text = match words.as_slice() {
            [] => String::new(),
            ["exit" | "quit"] => return Step::Exit,
            ["help"] => HELP.to_string(),
            ["show"] => self.render_live(),
            ["move", coords @ ..] => self.move_to(coords),
            ["set", key, value @ ..] if !value.is_empty() => {
                self.live.set_cell(*key, value.join(" "));
                format!("{} = {}", key, value.join(" "))
            }
            ["unset", key] => match self.live.cells.remove(*key) {
                Some(_) => format!("unset {}", key),
                None => format!("error: no cell '{}'", key),
            },
            _ => self.run_git(trimmed),
        };
        Step::Continue(text)
    }

    fn move_to(&mut self, coords: &[&str]) -> String {
        let parsed: Result<Vec<i64>, _> = coords.iter().map(|c| c.parse::<i64>()).collect();
        match parsed.as_deref() {
            Ok([x, y]) => self.live.position = Position::planar(*x, *y),
            Ok([x, y, z]) => self.live.position = Position::new(*x, *y, *z),
            _ => return "error: usage: move <x> <y> [z]".to_string(),
        }
        format!("at {}", self.live.position)
    }

    fn run_git(&mut self, line: &str) -> String {
        let outcome = self.runner.run(&mut self.engine, line, &self.live);
        if let Some(snapshot) = outcome.snapshot {
            self.live = snapshot;
        }
        if outcome.mutated && self.autosave
            && let Err(e) = self.save()
        {
            return format!("{}\nerror: save failed: {}", outcome.output, e);
        }
        outcome.output
    }

    fn render_live(&self) -> String {
        let mut lines = vec![format!("position {}", self.live.position)];
        lines.extend(
            self.live
                .cells
                .iter()
                .map(|(key, value)| format!("  {} = {}", key, value)),
        );
        lines.join("\n")
    }

    fn save(&self) -> Result<(), WorldlineError> {
        match &self.store {
            Some(store) => save_engine(store.as_ref(), &self.engine),
            None => Ok(()),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
