//! Command parser - turns raw outgoing text into a command key and arguments

/// A recognized command invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    /// First token, lower-cased, sentinel included (e.g. `.ping`)
    pub key: String,
    /// Remaining whitespace-separated tokens. No quoting support.
    pub args: Vec<String>,
}

impl ParsedCommand {
    /// Key without the sentinel
    pub fn name<'a>(&'a self, prefix: &str) -> &'a str {
        self.key.strip_prefix(prefix).unwrap_or(&self.key)
    }
}

/// Recognizes text that starts with the command sentinel
#[derive(Debug, Clone)]
pub struct CommandParser {
    prefix: String,
}

impl CommandParser {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// `None` for empty text, text without the sentinel, or a bare sentinel.
    pub fn parse(&self, text: &str) -> Option<ParsedCommand> {
        if text.is_empty() || !text.starts_with(&self.prefix) {
            return None;
        }

        let mut tokens = text.split_whitespace();
        let key = tokens.next()?.to_lowercase();
        if key == self.prefix {
            return None;
        }

        Some(ParsedCommand {
            key,
            args: tokens.map(str::to_string).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_key_and_args() {
        let parser = CommandParser::new(".");
        let parsed = parser.parse(".Load  hello\tworld").unwrap();

        assert_eq!(parsed.key, ".load");
        assert_eq!(parsed.name("."), "load");
        assert_eq!(parsed.args, vec!["hello".to_string(), "world".to_string()]);
    }

    #[test]
    fn ignores_plain_text() {
        let parser = CommandParser::new(".");

        assert!(parser.parse("").is_none());
        assert!(parser.parse("hello .ping").is_none());
        assert!(parser.parse(" .ping").is_none());
        assert!(parser.parse(". ping").is_none());
    }

    #[test]
    fn quotes_are_not_grouped() {
        let parser = CommandParser::new("!");
        let parsed = parser.parse("!echo \"a b\"").unwrap();

        assert_eq!(parsed.args, vec!["\"a".to_string(), "b\"".to_string()]);
    }
}
