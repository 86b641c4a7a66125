pub const HELP: &str = "\
Commands:
  sql <query>     - Execute direct SQL query
  nl <query>      - Execute natural language query
  table <name>    - Set/change table name
  show tables     - List available tables
  help            - Show this help
  quit | exit     - Leave the session
Anything else is treated as a natural language query.";

/// One line of user input, classified by its leading keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Sql(String),
    Nl(String),
    SetTable(String),
    ShowTables,
    Help,
    Quit,
    Empty,
    /// A keyword given without the argument it needs.
    Unknown(String),
}

impl Command {
    /// Keywords match case-insensitively, the text after them is kept as typed.
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Command::Empty;
        }
        let (keyword, rest) = match line.split_once(char::is_whitespace) {
            Some((keyword, rest)) => (keyword, Some(rest.trim())),
            None => (line, None),
        };
        match (keyword.to_ascii_lowercase().as_str(), rest) {
            ("quit" | "exit", None) => Command::Quit,
            ("help", None) => Command::Help,
            ("show", Some(rest)) if rest.eq_ignore_ascii_case("tables") => Command::ShowTables,
            ("sql", Some(text)) => Command::Sql(text.to_string()),
            ("nl", Some(text)) => Command::Nl(text.to_string()),
            ("table", Some(name)) => Command::SetTable(name.to_string()),
            ("sql" | "nl" | "table", None) => Command::Unknown(line.to_string()),
            _ => Command::Nl(line.to_string()),
        }
    }
}
