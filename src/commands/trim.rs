//! `trim <percent>`

use std::io::Write;

use super::Command;
use crate::ops::trim::{trim, TrimOutcome, TrimPercent};
use crate::session::Session;

pub struct TrimCommand;

impl Command for TrimCommand {
    fn name(&self) -> &str {
        "trim"
    }

    fn help(&self) -> &str {
        "trims the index, <TRIM PERCENTAGE>"
    }

    fn execute(&self, session: &mut Session, args: &[String], out: &mut dyn Write) -> anyhow::Result<()> {
        let Some(arg) = args.first() else {
            writeln!(out, "usage: trim <TRIM PERCENTAGE>")?;
            return Ok(());
        };
        let percent: TrimPercent = arg.parse()?;

        match trim(session, percent, &mut rand::thread_rng())? {
            TrimOutcome::Trimmed { num_docs, .. } => {
                writeln!(out, "trim successful, index now contains: {} docs.", num_docs)?;
            }
            TrimOutcome::WriterUnavailable(reason) => writeln!(out, "{}", reason)?,
        }
        Ok(())
    }
}
