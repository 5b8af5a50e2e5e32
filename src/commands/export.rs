//! `export <path> [bin|text]`

use std::io::Write;
use std::path::Path;

use super::Command;
use crate::ops::export::{export, ExportMode};
use crate::session::Session;

pub struct ExportCommand;

impl Command for ExportCommand {
    fn name(&self) -> &str {
        "export"
    }

    fn help(&self) -> &str {
        "export index to readable text files"
    }

    fn execute(&self, session: &mut Session, args: &[String], out: &mut dyn Write) -> anyhow::Result<()> {
        let Some(target) = args.first() else {
            writeln!(out, "usage: export output bin/text (default text)")?;
            return Ok(());
        };
        let mode = ExportMode::from_arg(args.get(1).map(String::as_str));

        writeln!(out, "exporting index to {}", mode)?;
        out.flush()?;

        let summary = export(session, Path::new(target), mode)?;
        writeln!(
            out,
            "exported {} docs to {}",
            summary.num_docs,
            summary.target.display()
        )?;
        Ok(())
    }
}
