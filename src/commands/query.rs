use std::{
    error::Error,
    fmt::Display,
    io::{self, Write},
};

use sql_query_core::{
    Command, Context, Database, InvalidTableName, TableName, Translator, dispatch,
};
use tracing::{info, warn};

use crate::output::{render, render_error};

#[derive(Debug)]
pub enum UsageError {
    MissingQuery,
    InvalidTable(InvalidTableName),
}

impl Display for UsageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UsageError::MissingQuery => {
                write!(f, "Query is required (use -q/--query or --interactive)")
            }
            UsageError::InvalidTable(err) => write!(f, "{err}"),
        }
    }
}

impl Error for UsageError {}

/// One invocation worth of work, built from the command-line flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub table: Option<TableName>,
    pub command: Command,
}

impl QueryRequest {
    pub fn from_args(
        table: Option<&str>,
        query: Option<&str>,
        sql: bool,
    ) -> Result<Self, UsageError> {
        let table = table
            .map(TableName::parse)
            .transpose()
            .map_err(UsageError::InvalidTable)?;
        let query = query.map(str::trim).filter(|query| !query.is_empty());
        let command = match (query, sql, &table) {
            (Some(query), true, _) => Command::Sql(query.to_string()),
            (Some(query), false, _) => Command::Nl(query.to_string()),
            (None, true, Some(table)) => Command::Sql(format!("SELECT * FROM {}", table.escaped())),
            (None, _, _) => return Err(UsageError::MissingQuery),
        };
        Ok(Self { table, command })
    }
}

/// Runs a single request and reports whether it succeeded.
pub async fn run<D, T>(
    ctx: &mut Context<D>,
    translator: &T,
    request: QueryRequest,
    out: &mut impl Write,
    err: &mut impl Write,
) -> io::Result<bool>
where
    D: Database,
    T: Translator,
{
    if let (Command::Sql(_), Some(table)) = (&request.command, &request.table) {
        match ctx.database().table_exists(table).await {
            Ok(true) => {}
            Ok(false) => writeln!(
                err,
                "⚠ Table {table} not found in database, running the query anyway"
            )?,
            Err(error) => warn!("Could not check whether {table} exists: {error}"),
        }
    }

    let result = tokio::select! {
        result = dispatch(ctx, translator, request.command) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted while the query was running");
            writeln!(err, "Interrupted")?;
            return Ok(false);
        }
    };
    match result {
        Ok(outcome) => {
            render(out, &outcome)?;
            out.flush()?;
            Ok(true)
        }
        Err(error) => {
            render_error(err, &error)?;
            Ok(false)
        }
    }
}
