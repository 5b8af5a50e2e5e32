//! Command registry and input line parsing

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::commands::Command;
use crate::session::error::{SessionError, SessionResult};

/// Commands by name, enumerated in name order
#[derive(Default, Clone)]
pub struct CommandRegistry {
    commands: BTreeMap<String, Arc<dyn Command>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command, failing if its name is taken
    pub fn register(&mut self, command: Arc<dyn Command>) -> SessionResult<()> {
        let name = command.name().to_string();
        if self.commands.contains_key(&name) {
            return Err(SessionError::DuplicateCommand(name));
        }
        self.commands.insert(name, command);
        Ok(())
    }

    /// Build a registry from a list of commands
    pub fn from_commands(
        commands: impl IntoIterator<Item = Arc<dyn Command>>,
    ) -> SessionResult<Self> {
        let mut registry = Self::new();
        for command in commands {
            registry.register(command)?;
        }
        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.commands.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Command>> {
        self.commands.values()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Split an input line into a command name and its arguments
///
/// Whitespace is the only separator; there is no quoting. Blank lines
/// yield `None`.
pub fn parse_line(line: &str) -> Option<(String, Vec<String>)> {
    let mut parts = line.split_whitespace();
    let name = parts.next()?.to_string();
    Some((name, parts.map(str::to_string).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Command;
    use crate::session::Session;
    use std::io::Write;

    struct Named(&'static str);

    impl Command for Named {
        fn name(&self) -> &str {
            self.0
        }
        fn help(&self) -> &str {
            "test command"
        }
        fn execute(
            &self,
            _session: &mut Session,
            _args: &[String],
            _out: &mut dyn Write,
        ) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = CommandRegistry::new();
        registry.register(Arc::new(Named("info"))).unwrap();
        let err = registry.register(Arc::new(Named("info"))).unwrap_err();
        assert!(matches!(err, SessionError::DuplicateCommand(name) if name == "info"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_names_sorted() {
        let registry = CommandRegistry::from_commands([
            Arc::new(Named("trim")) as Arc<dyn Command>,
            Arc::new(Named("export")),
            Arc::new(Named("info")),
        ])
        .unwrap();
        let names: Vec<&str> = registry.names().collect();
        assert_eq!(names, vec!["export", "info", "trim"]);
    }

    #[test]
    fn test_parse_line() {
        assert_eq!(
            parse_line("  export /tmp/out   bin "),
            Some((
                "export".to_string(),
                vec!["/tmp/out".to_string(), "bin".to_string()]
            ))
        );
        assert_eq!(parse_line("info"), Some(("info".to_string(), vec![])));
        assert_eq!(parse_line("   "), None);
        assert_eq!(parse_line(""), None);
    }
}
