//! Commands that change the index
//!
//! All of them go through the session writer and do nothing but report
//! when it is unavailable. Each change is committed and the session reader
//! refreshed before the command returns.

use std::io::Write;

use super::{split_field, writer_or_report, Command};
use crate::session::{Session, SessionError};

pub struct MergeCommand;

impl Command for MergeCommand {
    fn name(&self) -> &str {
        "merge"
    }

    fn help(&self) -> &str {
        "force merges segments into given N segments, input: number of max segments"
    }

    fn execute(&self, session: &mut Session, args: &[String], out: &mut dyn Write) -> anyhow::Result<()> {
        let max_segments = match args.first() {
            None => 1,
            Some(arg) => match arg.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(SessionError::InvalidArgument(format!(
                        "invalid number of segments: {}",
                        arg
                    ))
                    .into())
                }
            },
        };

        let Some(writer) = writer_or_report(session, out)? else {
            return Ok(());
        };
        writer.force_merge(max_segments)?;
        writer.commit()?;
        session.refresh()?;

        writeln!(
            out,
            "merge successful, index now has {} segments.",
            session.get_reader().leaves().len()
        )?;
        Ok(())
    }
}

pub struct DeleteCommand;

impl Command for DeleteCommand {
    fn name(&self) -> &str {
        "delete"
    }

    fn help(&self) -> &str {
        "deletes documents containing a term, e.g. delete field:term"
    }

    fn execute(&self, session: &mut Session, args: &[String], out: &mut dyn Write) -> anyhow::Result<()> {
        let Some((field, term)) = args.first().and_then(|a| split_field(a)) else {
            writeln!(out, "usage: delete <field>:<term>")?;
            return Ok(());
        };

        let Some(writer) = writer_or_report(session, out)? else {
            return Ok(());
        };
        let deleted = writer.delete_by_term(field, term)?;
        writer.commit()?;
        session.refresh()?;

        writeln!(
            out,
            "deleted {} docs, index now contains: {} docs.",
            deleted,
            session.get_reader().num_docs()
        )?;
        Ok(())
    }
}

pub struct SaveUserCommitCommand;

impl Command for SaveUserCommitCommand {
    fn name(&self) -> &str {
        "saveusercommit"
    }

    fn help(&self) -> &str {
        "save user commit data, <key> <value>"
    }

    fn execute(&self, session: &mut Session, args: &[String], out: &mut dyn Write) -> anyhow::Result<()> {
        if args.len() < 2 {
            writeln!(out, "usage: saveusercommit <key> <value>")?;
            return Ok(());
        }
        let key = args[0].clone();
        let value = args[1..].join(" ");

        let Some(writer) = writer_or_report(session, out)? else {
            return Ok(());
        };
        let mut data = writer.commit_data();
        data.insert(key.clone(), value);
        writer.set_commit_data(data);
        let generation = writer.commit()?;
        session.refresh()?;

        tracing::info!(key = %key, generation, "Saved user commit data");
        writeln!(out, "commit data saved, generation: {}", generation)?;
        Ok(())
    }
}

pub struct DeleteUserCommitCommand;

impl Command for DeleteUserCommitCommand {
    fn name(&self) -> &str {
        "deleteusercommit"
    }

    fn help(&self) -> &str {
        "delete user commit data, <key>"
    }

    fn execute(&self, session: &mut Session, args: &[String], out: &mut dyn Write) -> anyhow::Result<()> {
        let Some(key) = args.first() else {
            writeln!(out, "usage: deleteusercommit <key>")?;
            return Ok(());
        };

        let Some(writer) = writer_or_report(session, out)? else {
            return Ok(());
        };
        let mut data = writer.commit_data();
        if data.remove(key).is_none() {
            writeln!(out, "no commit data for key: {}", key)?;
            return Ok(());
        }
        writer.set_commit_data(data);
        let generation = writer.commit()?;
        session.refresh()?;

        tracing::info!(key = %key, generation, "Deleted user commit data");
        writeln!(out, "commit data deleted, generation: {}", generation)?;
        Ok(())
    }
}
