//! Command loop around a [`Session`]
//!
//! Two front ends feed the same dispatcher: an interactive prompt with line
//! editing and history, and a script mode that runs a fixed list of command
//! lines (`segscope open <index> -e <command> ...`).

use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io::{self, Write};
use std::path::PathBuf;

use crate::config::ShellConfig;
use crate::session::{Flow, Session};

pub struct Shell {
    session: Session,
    prompt: String,
    history: Option<PathBuf>,
}

impl Shell {
    pub fn new(session: Session, config: &ShellConfig) -> Self {
        Self {
            session,
            prompt: config.prompt.clone(),
            history: config.history_path(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Run `lines` in order, stopping early at `exit`
    pub fn run_script<S: AsRef<str>>(&mut self, lines: &[S], out: &mut dyn Write) -> Flow {
        for line in lines {
            if self.session.dispatch(line.as_ref(), out) == Flow::Exit {
                return Flow::Exit;
            }
        }
        Flow::Continue
    }

    /// Read commands from the terminal until `exit`, Ctrl-C or Ctrl-D
    pub fn run_interactive(&mut self) -> Result<()> {
        let mut editor = DefaultEditor::new().context("Failed to initialize line editor")?;
        if let Some(path) = &self.history {
            if path.exists() {
                if let Err(e) = editor.load_history(path) {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to load history");
                }
            }
        }

        println!(
            "{} (readonly mode: {}), type 'help' for commands",
            self.session.directory().describe(),
            self.session.is_read_only()
        );

        let stdout = io::stdout();
        loop {
            let line = match editor.readline(&self.prompt) {
                Ok(line) => line,
                Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read input");
                    break;
                }
            };

            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let _ = editor.add_history_entry(line);

            let mut out = stdout.lock();
            if self.session.dispatch(line, &mut out) == Flow::Exit {
                break;
            }
        }

        if let Some(path) = &self.history {
            if let Err(e) = editor.save_history(path) {
                tracing::warn!(path = %path.display(), error = %e, "Failed to save history");
            }
        }
        Ok(())
    }

    /// Shut the session down
    ///
    /// A writer close failure is reported on `out` and does not fail the
    /// process; the session has ended either way.
    pub fn finish(mut self, out: &mut dyn Write) {
        if let Err(e) = self.session.shutdown() {
            if let Err(write_err) = writeln!(out, "error during shutdown: {}", e) {
                tracing::warn!(error = %write_err, "Failed to report shutdown error");
            }
        }
    }
}
