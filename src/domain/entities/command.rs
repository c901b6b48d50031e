use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::application::errors::CommandError;
use crate::plugins::Invocation;

/// Future returned by a command handler
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), CommandError>> + Send + 'static>>;

/// Command handler function type
pub type CommandHandler = Arc<dyn Fn(Invocation) -> HandlerFuture + Send + Sync>;

/// One invocable command in the global table
#[derive(Clone)]
pub struct CommandEntry {
    /// Name including the command sentinel, e.g. `.ping`
    pub qualified_name: String,
    pub description: String,
    /// Identifier of the module that contributed this command
    pub owner_module: String,
    pub handler: CommandHandler,
}

impl std::fmt::Debug for CommandEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandEntry")
            .field("qualified_name", &self.qualified_name)
            .field("description", &self.description)
            .field("owner_module", &self.owner_module)
            .finish()
    }
}

/// Global command table keyed by qualified name
#[derive(Default)]
pub struct CommandTable {
    commands: HashMap<String, CommandEntry>,
}

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&CommandEntry> {
        self.commands.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// First name in `names` already held by a module other than `module`.
    pub fn find_conflict<'a>(
        &self,
        names: impl IntoIterator<Item = &'a String>,
        module: &str,
    ) -> Option<(String, String)> {
        names.into_iter().find_map(|name| {
            self.commands
                .get(name)
                .filter(|entry| entry.owner_module != module)
                .map(|entry| (name.clone(), entry.owner_module.clone()))
        })
    }

    pub fn insert(&mut self, entry: CommandEntry) {
        self.commands.insert(entry.qualified_name.clone(), entry);
    }

    /// Remove every command owned by `module`, returning the removed names.
    pub fn remove_owned_by(&mut self, module: &str) -> Vec<String> {
        let names: Vec<String> = self
            .commands
            .iter()
            .filter(|(_, entry)| entry.owner_module == module)
            .map(|(name, _)| name.clone())
            .collect();
        for name in &names {
            self.commands.remove(name);
        }
        names
    }

    pub fn names_owned_by(&self, module: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .commands
            .values()
            .filter(|entry| entry.owner_module == module)
            .map(|entry| entry.qualified_name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.commands.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, module: &str) -> CommandEntry {
        CommandEntry {
            qualified_name: name.to_string(),
            description: String::new(),
            owner_module: module.to_string(),
            handler: Arc::new(|_| Box::pin(async { Ok(()) })),
        }
    }

    #[test]
    fn remove_owned_by_only_touches_that_module() {
        let mut table = CommandTable::new();
        table.insert(entry(".a", "one"));
        table.insert(entry(".b", "one"));
        table.insert(entry(".c", "two"));

        let mut removed = table.remove_owned_by("one");
        removed.sort();
        assert_eq!(removed, vec![".a".to_string(), ".b".to_string()]);
        assert_eq!(table.names(), vec![".c".to_string()]);
    }

    #[test]
    fn conflict_ignores_own_commands() {
        let mut table = CommandTable::new();
        table.insert(entry(".info", "one"));

        let names = vec![".info".to_string()];
        assert!(table.find_conflict(&names, "one").is_none());
        assert_eq!(
            table.find_conflict(&names, "two"),
            Some((".info".to_string(), "one".to_string()))
        );
    }
}
