use std::{error::Error, fmt::Display};

use tracing::{info, warn};

use crate::{
    command::Command,
    database::{Database, DatabaseError, Rows},
    table::{InvalidTableName, TableName},
    translator::{Answer, NlError, Translator},
};

/// State threaded through every dispatch of one run.
pub struct Context<D> {
    current_table: Option<TableName>,
    database: D,
}

impl<D: Database> Context<D> {
    pub fn new(database: D) -> Self {
        Self {
            current_table: None,
            database,
        }
    }

    pub fn with_table(mut self, table: Option<TableName>) -> Self {
        self.current_table = table;
        self
    }

    pub fn current_table(&self) -> Option<&TableName> {
        self.current_table.as_ref()
    }

    pub fn database(&mut self) -> &mut D {
        &mut self.database
    }

    /// Releases the connection. Safe to call more than once.
    pub async fn close(&mut self) {
        self.database.close().await;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableList {
    pub tables: Vec<String>,
    /// Set when introspection failed and the list is empty because of it.
    pub warning: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Rows {
        sql: String,
        rows: Rows,
    },
    Answer {
        question: String,
        answer: Answer,
    },
    /// The translator failed and the input ran as literal SQL instead.
    FellBack {
        question: String,
        nl_error: NlError,
        rows: Rows,
    },
    Tables(TableList),
    TableChanged(TableName),
    Help,
    Quit,
    Nothing,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchError {
    Database(DatabaseError),
    Fallback { nl: NlError, sql: DatabaseError },
    InvalidTable(InvalidTableName),
    Usage(String),
}

impl DispatchError {
    /// The database failure that ended the command, if one did.
    pub fn database_error(&self) -> Option<&DatabaseError> {
        match self {
            DispatchError::Database(err) | DispatchError::Fallback { sql: err, .. } => Some(err),
            DispatchError::InvalidTable(_) | DispatchError::Usage(_) => None,
        }
    }
}

impl Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchError::Database(err) => write!(f, "Error executing SQL query: {err}"),
            DispatchError::Fallback { nl, sql } => write!(
                f,
                "Natural language query failed ({nl}) and the SQL fallback failed too: {sql}"
            ),
            DispatchError::InvalidTable(err) => write!(f, "{err}"),
            DispatchError::Usage(msg) => write!(f, "{msg}"),
        }
    }
}

impl Error for DispatchError {}

impl From<DatabaseError> for DispatchError {
    fn from(err: DatabaseError) -> Self {
        DispatchError::Database(err)
    }
}

impl From<InvalidTableName> for DispatchError {
    fn from(err: InvalidTableName) -> Self {
        DispatchError::InvalidTable(err)
    }
}

pub async fn dispatch<D: Database, T: Translator>(
    ctx: &mut Context<D>,
    translator: &T,
    command: Command,
) -> Result<Outcome, DispatchError> {
    match command {
        Command::Sql(sql) => {
            let rows = ctx.database.execute(&sql).await?;
            Ok(Outcome::Rows { sql, rows })
        }
        Command::Nl(question) => ask_with_fallback(ctx, translator, question).await,
        Command::SetTable(name) => {
            let table = TableName::parse(&name)?;
            info!("Current table set to {table}");
            ctx.current_table = Some(table.clone());
            Ok(Outcome::TableChanged(table))
        }
        Command::ShowTables => Ok(Outcome::Tables(match ctx.database.list_tables().await {
            Ok(tables) => TableList {
                tables,
                warning: None,
            },
            Err(err) => {
                warn!("Catalog introspection failed: {err}");
                TableList {
                    tables: vec![],
                    warning: Some(format!("Error listing tables: {err}")),
                }
            }
        })),
        Command::Help => Ok(Outcome::Help),
        Command::Quit => Ok(Outcome::Quit),
        Command::Empty => Ok(Outcome::Nothing),
        Command::Unknown(input) => Err(DispatchError::Usage(format!(
            "'{input}' needs an argument, type 'help' for the list of commands"
        ))),
    }
}

/// A failed translation is retried as literal SQL before anything is reported.
async fn ask_with_fallback<D: Database, T: Translator>(
    ctx: &mut Context<D>,
    translator: &T,
    question: String,
) -> Result<Outcome, DispatchError> {
    let table = ctx.current_table.as_ref();
    match translator.ask(&mut ctx.database, &question, table).await {
        Ok(answer) => Ok(Outcome::Answer { question, answer }),
        Err(nl_error) => {
            warn!("Natural language query failed, retrying as SQL: {nl_error}");
            match ctx.database.execute(&question).await {
                Ok(rows) => Ok(Outcome::FellBack {
                    question,
                    nl_error,
                    rows,
                }),
                Err(sql) => Err(DispatchError::Fallback { nl: nl_error, sql }),
            }
        }
    }
}
