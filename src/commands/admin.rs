//! Session housekeeping commands

use anyhow::bail;
use std::io::Write;

use super::Command;
use crate::session::Session;

pub struct HelpCommand;

impl Command for HelpCommand {
    fn name(&self) -> &str {
        "help"
    }

    fn help(&self) -> &str {
        "displays help"
    }

    fn execute(&self, session: &mut Session, _args: &[String], out: &mut dyn Write) -> anyhow::Result<()> {
        for command in session.commands().iter() {
            writeln!(out, "{}: {}", command.name(), command.help())?;
        }
        Ok(())
    }
}

pub struct ExitCommand;

impl Command for ExitCommand {
    fn name(&self) -> &str {
        "exit"
    }

    fn help(&self) -> &str {
        "exits program"
    }

    fn execute(&self, session: &mut Session, _args: &[String], out: &mut dyn Write) -> anyhow::Result<()> {
        out.flush()?;
        session.request_exit();
        if let Err(e) = session.shutdown() {
            writeln!(out, "error during shutdown: {}", e)?;
        }
        Ok(())
    }
}

pub struct ReadOnlyCommand;

impl Command for ReadOnlyCommand {
    fn name(&self) -> &str {
        "readonly"
    }

    fn help(&self) -> &str {
        "toggles readonly mode, or sets it with true/false"
    }

    fn execute(&self, session: &mut Session, args: &[String], out: &mut dyn Write) -> anyhow::Result<()> {
        let read_only = match args.first().map(String::as_str) {
            None => !session.is_read_only(),
            Some("true") => true,
            Some("false") => false,
            Some(other) => bail!("usage: readonly [true|false], got {}", other),
        };
        session.set_read_only(read_only);
        writeln!(out, "readonly mode is now: {}", session.is_read_only())?;
        Ok(())
    }
}

pub struct DirectoryCommand;

impl Command for DirectoryCommand {
    fn name(&self) -> &str {
        "directory"
    }

    fn help(&self) -> &str {
        "prints directory information"
    }

    fn execute(&self, session: &mut Session, _args: &[String], out: &mut dyn Write) -> anyhow::Result<()> {
        writeln!(out, "{}", session.directory().describe())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::commands::test_support::{car_index, open, run};
    use crate::session::Flow;
    use tempfile::tempdir;

    #[test]
    fn test_help_lists_commands_in_order() {
        let dir = tempdir().unwrap();
        car_index(dir.path());
        let mut session = open(dir.path(), true);

        let output = run(&mut session, "help");
        let names: Vec<&str> = output
            .lines()
            .filter_map(|l| l.split(':').next())
            .collect();
        assert_eq!(names.first(), Some(&"delete"));
        assert!(names.contains(&"trim"));
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn test_readonly_toggle_and_set() {
        let dir = tempdir().unwrap();
        car_index(dir.path());
        let mut session = open(dir.path(), true);

        assert_eq!(run(&mut session, "readonly"), "readonly mode is now: false\n");
        assert!(!session.is_read_only());
        assert_eq!(run(&mut session, "readonly true"), "readonly mode is now: true\n");
        assert_eq!(run(&mut session, "readonly true"), "readonly mode is now: true\n");
        assert!(run(&mut session, "readonly maybe").starts_with("readonly: usage"));
        assert!(session.is_read_only());
    }

    #[test]
    fn test_directory_describes_location() {
        let dir = tempdir().unwrap();
        car_index(dir.path());
        let mut session = open(dir.path(), true);

        let output = run(&mut session, "directory");
        assert!(output.starts_with("FsDirectory@"));
        assert!(output.contains(&dir.path().display().to_string()));
    }

    #[test]
    fn test_exit_shuts_down() {
        let dir = tempdir().unwrap();
        car_index(dir.path());
        let mut session = open(dir.path(), false);
        session.get_writer().unwrap();

        let mut out = Vec::new();
        assert_eq!(session.dispatch("exit", &mut out), Flow::Exit);
        assert!(session.is_closed());
        assert!(!session.has_writer());
        assert!(out.is_empty());
    }
}
