//! Session controller
//!
//! The session owns everything a command touches:
//!
//! ```text
//! Session
//!   factory    IndexHandleFactory for the index directory (fixed for the session)
//!   reader     current point-in-time reader, swapped whole on refresh
//!   writer     opened lazily, only while not read-only
//!   read_only  when true, writer is always None
//!   commands   CommandRegistry, dispatched one line at a time
//! ```
//!
//! Commands run one at a time and see one reader for their whole run. A
//! failing or panicking command is reported and the session carries on.

pub mod error;
pub mod registry;

use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::commands;
use crate::config::TermDisplay;
use crate::handle::{IndexHandleFactory, IndexReader, IndexWriter};

pub use error::{SessionError, SessionResult, READ_ONLY_MESSAGE};
pub use registry::{parse_line, CommandRegistry};

/// Whether the command loop should keep reading input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Session startup options
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub read_only: bool,
    pub term_display: TermDisplay,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            read_only: true,
            term_display: TermDisplay::Utf8,
        }
    }
}

pub struct Session {
    factory: Box<dyn IndexHandleFactory>,
    reader: Arc<dyn IndexReader>,
    writer: Option<Box<dyn IndexWriter>>,
    read_only: bool,
    commands: CommandRegistry,
    term_display: TermDisplay,
    exit_requested: bool,
    closed: bool,
}

impl Session {
    /// Open a session with the built-in commands
    pub fn open(factory: Box<dyn IndexHandleFactory>, options: SessionOptions) -> SessionResult<Self> {
        let registry = commands::builtin_registry()?;
        Self::with_registry(factory, registry, options)
    }

    pub fn with_registry(
        factory: Box<dyn IndexHandleFactory>,
        commands: CommandRegistry,
        options: SessionOptions,
    ) -> SessionResult<Self> {
        let reader = factory
            .open_reader()
            .map_err(|e| SessionError::StartupFailure(e.to_string()))?;

        tracing::info!(
            directory = %factory.describe(),
            generation = reader.generation(),
            num_docs = reader.num_docs(),
            read_only = options.read_only,
            "Session opened"
        );

        Ok(Self {
            factory,
            reader,
            writer: None,
            read_only: options.read_only,
            commands,
            term_display: options.term_display,
            exit_requested: false,
            closed: false,
        })
    }

    pub fn directory(&self) -> &dyn IndexHandleFactory {
        self.factory.as_ref()
    }

    pub fn commands(&self) -> &CommandRegistry {
        &self.commands
    }

    pub fn term_display(&self) -> TermDisplay {
        self.term_display
    }

    /// The active reader; never absent
    pub fn get_reader(&self) -> Arc<dyn IndexReader> {
        Arc::clone(&self.reader)
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn has_writer(&self) -> bool {
        self.writer.is_some()
    }

    /// The writer, opening it on first use
    ///
    /// Fails with `WriterUnavailable` in read-only mode, after shutdown, or
    /// when another writer holds the directory lock.
    pub fn writer(&mut self) -> SessionResult<&mut (dyn IndexWriter + 'static)> {
        if self.closed {
            return Err(SessionError::WriterUnavailable(
                "unable to open writer, session is closed".to_string(),
            ));
        }
        if self.read_only {
            return Err(SessionError::read_only());
        }
        if self.writer.is_none() {
            let writer = self.factory.open_writer().map_err(|e| {
                SessionError::WriterUnavailable(format!("unable to open writer: {}", e))
            })?;
            tracing::info!(directory = %self.factory.describe(), "Opened writer");
            self.writer = Some(writer);
        }
        self.writer
            .as_deref_mut()
            .ok_or_else(|| SessionError::WriterUnavailable("writer not available".to_string()))
    }

    /// The writer, or `None` if write access cannot be had for any reason
    pub fn get_writer(&mut self) -> Option<&mut (dyn IndexWriter + 'static)> {
        match self.writer() {
            Ok(writer) => Some(writer),
            Err(e) => {
                tracing::warn!(error = %e, "Writer unavailable");
                None
            }
        }
    }

    /// Switch modes. Going read-only closes an open writer.
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
        if read_only {
            if let Some(writer) = self.writer.take() {
                match writer.close() {
                    Ok(()) => tracing::info!("Closed writer"),
                    Err(e) => tracing::error!(error = %e, "Failed to close writer"),
                }
            }
        }
        tracing::debug!(read_only, "Read-only mode changed");
    }

    /// Swap in a reader over the latest commit
    ///
    /// The current reader stays in place if the new one cannot be opened.
    pub fn refresh(&mut self) -> SessionResult<()> {
        let fresh = self.factory.refresh(&self.reader)?;
        if !Arc::ptr_eq(&fresh, &self.reader) {
            tracing::debug!(
                from = self.reader.generation(),
                to = fresh.generation(),
                num_docs = fresh.num_docs(),
                "Refreshed reader"
            );
        }
        self.reader = fresh;
        Ok(())
    }

    /// Close the writer, if any, and release the session's resources
    ///
    /// A writer close failure is returned, but the session is closed
    /// regardless. Calling this again is a no-op.
    pub fn shutdown(&mut self) -> SessionResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let result = match self.writer.take() {
            Some(writer) => writer.close().map_err(|e| {
                tracing::error!(error = %e, "Failed to close writer during shutdown");
                SessionError::Store(e)
            }),
            None => Ok(()),
        };

        tracing::info!(directory = %self.factory.describe(), "Session closed");
        result
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Ask the command loop to stop after the current command
    pub fn request_exit(&mut self) {
        self.exit_requested = true;
    }

    /// Run one input line
    ///
    /// Unknown commands, command errors and command panics are all
    /// reported to `out` and never escape.
    pub fn dispatch(&mut self, line: &str, out: &mut dyn Write) -> Flow {
        let Some((name, args)) = parse_line(line) else {
            return Flow::Continue;
        };

        let Some(command) = self.commands.get(&name) else {
            let _ = writeln!(out, "unknown command: {}", name);
            return Flow::Continue;
        };

        tracing::debug!(command = %name, ?args, "Dispatching command");

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            command.execute(self, &args, &mut *out)
        }));

        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!(command = %name, error = %format!("{:#}", e), "Command failed");
                let _ = writeln!(out, "{}: {:#}", name, e);
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(command = %name, error = %message, "Command panicked");
                let _ = writeln!(out, "{}: internal error: {}", name, message);
            }
        }
        let _ = out.flush();

        debug_assert!(!(self.read_only && self.writer.is_some()));

        if self.exit_requested {
            Flow::Exit
        } else {
            Flow::Continue
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::error!(error = %e, "Session shutdown failed");
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Command;
    use crate::handle::testing::{FakeFactory, FakeIndex};
    use crate::store::{Codec, Document, Field, FsDirectory, StoreError};
    use tempfile::tempdir;

    fn fake_session(index: &FakeIndex, read_only: bool) -> Session {
        Session::open(
            Box::new(FakeFactory::new(index.clone())),
            SessionOptions {
                read_only,
                ..SessionOptions::default()
            },
        )
        .unwrap()
    }

    fn run(session: &mut Session, line: &str) -> String {
        let mut out = Vec::new();
        session.dispatch(line, &mut out);
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_read_only_never_hands_out_writer() {
        let index = FakeIndex::with_doc_counts(&[10]);
        let mut session = fake_session(&index, true);

        assert!(session.get_writer().is_none());
        assert!(!session.has_writer());
        assert_eq!(index.writers_opened(), 0);
    }

    #[test]
    fn test_writer_is_lazy_and_reused() {
        let index = FakeIndex::with_doc_counts(&[10]);
        let mut session = fake_session(&index, false);
        assert!(!session.has_writer());

        assert!(session.get_writer().is_some());
        assert!(session.get_writer().is_some());
        assert_eq!(index.writers_opened(), 1);
        assert!(index.writer_open());
    }

    #[test]
    fn test_set_read_only_closes_writer() {
        let index = FakeIndex::with_doc_counts(&[10]);
        let mut session = fake_session(&index, false);
        session.get_writer().unwrap();

        session.set_read_only(true);
        assert!(!session.has_writer());
        assert!(!index.writer_open());
        assert!(session.get_writer().is_none());

        // switching back is lazy
        session.set_read_only(false);
        assert!(!session.has_writer());
        assert!(session.get_writer().is_some());
        assert_eq!(index.writers_opened(), 2);
    }

    #[test]
    fn test_close_failure_does_not_block_mode_switch() {
        let index = FakeIndex::with_doc_counts(&[10]);
        let mut session = Session::open(
            Box::new(FakeFactory::failing_close(index.clone())),
            SessionOptions {
                read_only: false,
                ..SessionOptions::default()
            },
        )
        .unwrap();
        session.get_writer().unwrap();

        session.set_read_only(true);
        assert!(session.is_read_only());
        assert!(!session.has_writer());
    }

    #[test]
    fn test_set_read_only_without_writer_is_noop() {
        let index = FakeIndex::with_doc_counts(&[10]);
        let mut session = fake_session(&index, false);
        session.set_read_only(true);
        session.set_read_only(true);
        assert!(session.is_read_only());
        assert_eq!(index.writers_opened(), 0);
    }

    #[test]
    fn test_writer_busy_yields_none() {
        let index = FakeIndex::with_doc_counts(&[10]);
        let other = FakeFactory::new(index.clone());
        let _held = other.open_writer().unwrap();

        let mut session = fake_session(&index, false);
        assert!(session.get_writer().is_none());
        assert!(matches!(
            session.writer(),
            Err(SessionError::WriterUnavailable(_))
        ));
        assert!(!session.is_read_only());
    }

    #[test]
    fn test_startup_failure() {
        let dir = tempdir().unwrap();
        let factory = FsDirectory::open(dir.path()).unwrap();
        let result = Session::open(Box::new(factory), SessionOptions::default());
        assert!(matches!(result, Err(SessionError::StartupFailure(_))));
    }

    #[test]
    fn test_refresh_keeps_reader_when_unchanged() {
        let index = FakeIndex::with_doc_counts(&[10]);
        let mut session = fake_session(&index, false);
        let before = session.get_reader();

        session.refresh().unwrap();
        assert!(Arc::ptr_eq(&before, &session.get_reader()));

        let writer = session.get_writer().unwrap();
        writer.delete_by_predicate(&mut |doc| doc < 4).unwrap();
        writer.commit().unwrap();
        session.refresh().unwrap();

        assert_eq!(session.get_reader().num_docs(), 6);
        assert_eq!(before.num_docs(), 10);
    }

    #[test]
    fn test_shutdown_reports_close_error_once() {
        let index = FakeIndex::with_doc_counts(&[10]);
        let mut session = Session::open(
            Box::new(FakeFactory::failing_close(index.clone())),
            SessionOptions {
                read_only: false,
                ..SessionOptions::default()
            },
        )
        .unwrap();
        session.get_writer().unwrap();

        assert!(session.shutdown().is_err());
        assert!(session.is_closed());
        assert!(!index.writer_open());
        assert!(session.shutdown().is_ok());
    }

    #[test]
    fn test_no_writer_after_shutdown() {
        let index = FakeIndex::with_doc_counts(&[10]);
        let mut session = fake_session(&index, false);
        session.shutdown().unwrap();

        let err = session.writer().err().unwrap();
        assert!(matches!(err, SessionError::WriterUnavailable(_)));
        assert!(session.get_writer().is_none());
        assert!(!session.has_writer());
        assert_eq!(index.writers_opened(), 0);

        let output = run(&mut session, "saveusercommit k v");
        assert_eq!(output, "unable to open writer, session is closed\n");
        assert!(!index.writer_open());
    }

    #[test]
    fn test_unknown_command_leaves_state_alone() {
        let index = FakeIndex::with_doc_counts(&[10]);
        let mut session = fake_session(&index, false);
        let reader = session.get_reader();

        let output = run(&mut session, "frobnicate now");
        assert_eq!(output, "unknown command: frobnicate\n");
        assert!(!session.is_read_only());
        assert!(!session.has_writer());
        assert!(Arc::ptr_eq(&reader, &session.get_reader()));
        assert_eq!(run(&mut session, "   "), "");
    }

    struct Failing;

    impl Command for Failing {
        fn name(&self) -> &str {
            "fail"
        }
        fn help(&self) -> &str {
            "always fails"
        }
        fn execute(&self, _: &mut Session, args: &[String], _: &mut dyn Write) -> anyhow::Result<()> {
            if args.is_empty() {
                anyhow::bail!("nothing to do")
            }
            panic!("boom")
        }
    }

    #[test]
    fn test_command_errors_and_panics_are_contained() {
        let index = FakeIndex::with_doc_counts(&[10]);
        let registry =
            CommandRegistry::from_commands([Arc::new(Failing) as Arc<dyn Command>]).unwrap();
        let mut session = Session::with_registry(
            Box::new(FakeFactory::new(index)),
            registry,
            SessionOptions::default(),
        )
        .unwrap();

        let mut out = Vec::new();
        assert_eq!(session.dispatch("fail", &mut out), Flow::Continue);
        assert_eq!(String::from_utf8_lossy(&out), "fail: nothing to do\n");

        let mut out = Vec::new();
        assert_eq!(session.dispatch("fail hard", &mut out), Flow::Continue);
        assert_eq!(String::from_utf8_lossy(&out), "fail: internal error: boom\n");
    }

    #[test]
    fn test_second_handle_can_lock_after_read_only() {
        let dir = tempdir().unwrap();
        {
            let mut writer = FsDirectory::create(dir.path(), Codec::Binary, 100).unwrap();
            writer
                .add_document(Document::new().with(Field::string("id", "1")))
                .unwrap();
            Box::new(writer).close().unwrap();
        }

        let mut session = Session::open(
            Box::new(FsDirectory::open(dir.path()).unwrap()),
            SessionOptions {
                read_only: false,
                ..SessionOptions::default()
            },
        )
        .unwrap();
        assert!(session.get_writer().is_some());

        let probe = FsDirectory::open(dir.path()).unwrap();
        assert!(matches!(probe.open_writer(), Err(StoreError::LockHeld(_))));

        session.set_read_only(true);
        assert!(session.get_writer().is_none());
        assert!(probe.open_writer().is_ok());
    }
}
