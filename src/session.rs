use std::io::{self, Write};

use sql_query_core::{Command, Context, Database, Outcome, TableName, Translator, dispatch};
use tracing::info;

use crate::output::{render, render_error};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Line(String),
    /// Ctrl-C at the prompt.
    Interrupted,
    End,
}

/// Where interactive input comes from.
pub trait LineSource {
    fn read_line(&mut self, prompt: &str) -> io::Result<Input>;

    /// Whether a person is typing. Ctrl-C is only caught while a query runs
    /// when this holds, otherwise SIGINT keeps its default behavior.
    fn is_terminal(&self) -> bool {
        false
    }
}

pub fn prompt(table: Option<&TableName>) -> String {
    match table {
        Some(table) => format!("{table}> "),
        None => "Query> ".to_string(),
    }
}

/// Reads, dispatches and prints one line at a time until `quit`, end of input
/// or Ctrl-C while a query runs.
pub async fn run<D, T, L, W>(
    ctx: &mut Context<D>,
    translator: &T,
    input: &mut L,
    out: &mut W,
) -> io::Result<()>
where
    D: Database,
    T: Translator,
    L: LineSource,
    W: Write,
{
    let catch_interrupts = input.is_terminal();
    loop {
        let line = match input.read_line(&prompt(ctx.current_table()))? {
            Input::Line(line) => line,
            Input::Interrupted => {
                writeln!(out, "CTRL-C")?;
                writeln!(out, "Goodbye!")?;
                break;
            }
            Input::End => {
                writeln!(out, "\nGoodbye!")?;
                break;
            }
        };
        let command = Command::parse(&line);
        let result = match catch_interrupts {
            true => tokio::select! {
                result = dispatch(ctx, translator, command) => result,
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted while a query was running");
                    writeln!(out, "\nInterrupted, goodbye!")?;
                    break;
                }
            },
            false => dispatch(ctx, translator, command).await,
        };
        match result {
            Ok(Outcome::Quit) => {
                render(out, &Outcome::Quit)?;
                break;
            }
            Ok(outcome) => render(out, &outcome)?,
            Err(err) => render_error(out, &err)?,
        }
        out.flush()?;
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use std::{collections::VecDeque, io};

    use sql_query_core::{
        Context, Rows, TableName, Value,
        testing::{FakeDatabase, FakeTranslator},
        translator::NlError,
    };

    use super::{Input, LineSource, prompt, run};

    struct Script {
        lines: VecDeque<&'static str>,
        prompts: Vec<String>,
    }

    impl Script {
        fn new(lines: &[&'static str]) -> Self {
            Self {
                lines: lines.iter().copied().collect(),
                prompts: vec![],
            }
        }
    }

    impl LineSource for Script {
        fn read_line(&mut self, prompt: &str) -> io::Result<Input> {
            self.prompts.push(prompt.to_string());
            Ok(match self.lines.pop_front() {
                Some("^C") => Input::Interrupted,
                Some(line) => Input::Line(line.to_string()),
                None => Input::End,
            })
        }
    }

    async fn session(
        db: FakeDatabase,
        translator: &FakeTranslator,
        lines: &[&'static str],
    ) -> (Context<FakeDatabase>, Script, String) {
        let mut ctx = Context::new(db);
        let mut script = Script::new(lines);
        let mut out = Vec::new();
        run(&mut ctx, translator, &mut script, &mut out).await.unwrap();
        (ctx, script, String::from_utf8(out).unwrap())
    }

    #[tokio::test]
    async fn quit_first_runs_nothing() {
        let translator = FakeTranslator::answering("unused");
        let (mut ctx, script, out) =
            session(FakeDatabase::default(), &translator, &["quit", "sql SELECT 1"]).await;
        assert_eq!(out, "Goodbye!\n");
        assert!(ctx.database().executed.is_empty());
        assert_eq!(ctx.database().introspections, 0);
        // The line after quit is never read.
        assert_eq!(script.lines.len(), 1);
    }

    #[tokio::test]
    async fn table_then_sql() {
        let db = FakeDatabase::default().with_result(
            "SELECT 1",
            Ok(Rows::new(vec!["?column?".into()], vec![vec![Value::Int(1)]])),
        );
        let translator = FakeTranslator::answering("unused");
        let (mut ctx, script, out) =
            session(db, &translator, &["table reports", "sql SELECT 1"]).await;

        assert_eq!(ctx.current_table().map(ToString::to_string), Some("reports".into()));
        assert_eq!(ctx.database().executed, vec!["SELECT 1".to_string()]);
        assert!(out.contains("✓ Table changed to: reports\n"));
        assert!(out.contains("Found 1 records:\n?column?\n--------\n1\n"));
        assert_eq!(script.prompts, vec!["Query> ", "reports> ", "reports> "]);
    }

    #[tokio::test]
    async fn end_of_input_is_a_quiet_quit() {
        let translator = FakeTranslator::answering("unused");
        let (_, _, out) = session(FakeDatabase::default(), &translator, &["", "  "]).await;
        assert_eq!(out, "\nGoodbye!\n");
    }

    #[tokio::test]
    async fn errors_do_not_end_the_session() {
        let translator = FakeTranslator::failing(NlError::ApiKeyMissing);
        let (mut ctx, _, out) = session(
            FakeDatabase::default(),
            &translator,
            &["what were sales yesterday", "table a.", "help", "exit"],
        )
        .await;
        assert!(out.contains("Falling back to direct SQL query...\n✗ Error executing SQL query: syntax error"));
        assert!(out.contains("✗ 'a.' is not a valid table name"));
        assert!(out.contains("show tables     - List available tables"));
        assert!(out.ends_with("Goodbye!\n"));
        assert_eq!(
            ctx.database().executed,
            vec!["what were sales yesterday".to_string()]
        );
    }

    #[tokio::test]
    async fn ctrl_c_at_the_prompt_ends_the_session_through_the_writer() {
        let translator = FakeTranslator::answering("unused");
        let (mut ctx, script, out) = session(
            FakeDatabase::default(),
            &translator,
            &["help", "^C", "sql SELECT 1"],
        )
        .await;
        assert!(out.ends_with("Leave the session\nAnything else is treated as a natural language query.\nCTRL-C\nGoodbye!\n"));
        assert!(ctx.database().executed.is_empty());
        assert_eq!(script.lines.len(), 1);
    }

    /// A scripted source that claims to be a terminal.
    struct Typed(Script);

    impl LineSource for Typed {
        fn read_line(&mut self, prompt: &str) -> io::Result<Input> {
            self.0.read_line(prompt)
        }

        fn is_terminal(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn terminal_input_still_dispatches() {
        let db = FakeDatabase::default().with_result(
            "SELECT 1",
            Ok(Rows::new(vec!["?column?".into()], vec![vec![Value::Int(1)]])),
        );
        let translator = FakeTranslator::answering("unused");
        let mut ctx = Context::new(db);
        let mut input = Typed(Script::new(&["sql SELECT 1", "quit"]));
        let mut out = Vec::new();
        run(&mut ctx, &translator, &mut input, &mut out).await.unwrap();

        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("Found 1 records:"));
        assert!(out.ends_with("Goodbye!\n"));
        assert_eq!(ctx.database().executed, vec!["SELECT 1".to_string()]);
    }

    #[test]
    fn prompt_shows_current_table() {
        assert_eq!(prompt(None), "Query> ");
        let table = TableName::parse("sales.orders").unwrap();
        assert_eq!(prompt(Some(&table)), "sales.orders> ");
    }
}
