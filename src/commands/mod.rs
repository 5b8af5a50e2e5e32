//! Shell commands
//!
//! Every command is a small stateless handler: it parses its arguments,
//! calls into the session or [`crate::ops`], and prints to the output sink
//! it is given. The default set is registered once, at session start, by
//! [`builtin_registry`].
//!
//! | Group   | Commands                                                        |
//! |---------|-----------------------------------------------------------------|
//! | admin   | `help`, `exit`, `readonly`, `directory`                         |
//! | info    | `info`                                                          |
//! | trim    | `trim`                                                          |
//! | export  | `export`                                                        |
//! | write   | `merge`, `delete`, `saveusercommit`, `deleteusercommit`         |
//! | inspect | `getusercommit`, `terms`, `postings`, `docval`, `stored`, `norm`, `tv` |

pub mod admin;
pub mod export;
pub mod info;
pub mod inspect;
pub mod trim;
pub mod write;

use std::io::Write;
use std::sync::Arc;

use crate::config::TermDisplay;
use crate::handle::IndexWriter;
use crate::session::{CommandRegistry, Session, SessionError, SessionResult};

/// A named shell command
pub trait Command: Send + Sync {
    fn name(&self) -> &str;

    /// One-line description shown by `help`
    fn help(&self) -> &str;

    /// Run with whitespace-split arguments, printing to `out`
    fn execute(&self, session: &mut Session, args: &[String], out: &mut dyn Write)
        -> anyhow::Result<()>;
}

/// Registry holding every built-in command
pub fn builtin_registry() -> SessionResult<CommandRegistry> {
    CommandRegistry::from_commands([
        Arc::new(admin::HelpCommand) as Arc<dyn Command>,
        Arc::new(admin::ExitCommand),
        Arc::new(admin::ReadOnlyCommand),
        Arc::new(admin::DirectoryCommand),
        Arc::new(info::InfoCommand),
        Arc::new(trim::TrimCommand),
        Arc::new(export::ExportCommand),
        Arc::new(write::MergeCommand),
        Arc::new(write::DeleteCommand),
        Arc::new(write::SaveUserCommitCommand),
        Arc::new(write::DeleteUserCommitCommand),
        Arc::new(inspect::GetUserCommitCommand),
        Arc::new(inspect::TermsCommand),
        Arc::new(inspect::PostingsCommand),
        Arc::new(inspect::DocValCommand),
        Arc::new(inspect::StoredCommand),
        Arc::new(inspect::NormCommand),
        Arc::new(inspect::TermVectorCommand),
    ])
}

/// The session's writer, or `None` after telling the operator why not
pub(crate) fn writer_or_report<'a>(
    session: &'a mut Session,
    out: &mut dyn Write,
) -> anyhow::Result<Option<&'a mut (dyn IndexWriter + 'static)>> {
    match session.writer() {
        Ok(writer) => Ok(Some(writer)),
        Err(SessionError::WriterUnavailable(reason)) => {
            tracing::warn!(reason = %reason, "Write command skipped");
            writeln!(out, "{}", reason)?;
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Split `field:value` at the first colon
pub(crate) fn split_field(arg: &str) -> Option<(&str, &str)> {
    let (field, value) = arg.split_once(':')?;
    if field.is_empty() {
        None
    } else {
        Some((field, value))
    }
}

/// Render a term according to the session's display mode
pub(crate) fn display_term(term: &str, display: TermDisplay) -> String {
    display_bytes(term.as_bytes(), display)
}

/// Render raw bytes as text, or as hex when `display` is raw
pub(crate) fn display_bytes(bytes: &[u8], display: TermDisplay) -> String {
    match display {
        TermDisplay::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        TermDisplay::Raw => {
            let hex: Vec<String> = bytes.iter().map(|b| format!("{:02x}", b)).collect();
            format!("[{}]", hex.join(" "))
        }
    }
}
