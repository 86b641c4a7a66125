pub mod gemini;
pub mod prompt;

use std::{error::Error, fmt::Display};

use crate::{
    database::{ColumnInfo, Database},
    table::TableName,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub text: String,
    /// Query the answer was built from, when one was run.
    pub sql: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NlError {
    ApiUnavailable(String),
    ApiKeyMissing,
    TranslationFailed(String),
}

impl Display for NlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NlError::ApiUnavailable(msg) => write!(f, "LLM API unavailable: {msg}"),
            NlError::ApiKeyMissing => write!(
                f,
                "GEMINI_API_KEY environment variable not set. You can set it with: export GEMINI_API_KEY='your-api-key-here'"
            ),
            NlError::TranslationFailed(msg) => write!(f, "translation failed: {msg}"),
        }
    }
}

impl Error for NlError {}

/// Answers a natural-language question, running whatever SQL it needs on `db`.
#[allow(async_fn_in_trait)]
pub trait Translator {
    async fn ask<D: Database>(
        &self,
        db: &mut D,
        question: &str,
        table: Option<&TableName>,
    ) -> Result<Answer, NlError>;
}

/// Collects the column layout the model is allowed to query.
///
/// With no table selected every table visible to the connection is described.
pub async fn schema_context<D: Database>(
    db: &mut D,
    table: Option<&TableName>,
) -> Result<String, NlError> {
    let failed = |err: crate::DatabaseError| {
        NlError::TranslationFailed(format!("could not read table schema: {err}"))
    };
    let tables = match table {
        Some(table) => vec![table.clone()],
        None => db
            .list_tables()
            .await
            .map_err(failed)?
            .iter()
            .filter_map(|name| TableName::parse(name).ok())
            .collect(),
    };

    let mut context = String::new();
    for table in &tables {
        let columns = db.describe_table(table).await.map_err(failed)?;
        if columns.is_empty() {
            if tables.len() == 1 {
                return Err(NlError::TranslationFailed(format!(
                    "table {table} not found in database"
                )));
            }
            continue;
        }
        context.push_str(&describe(table, &columns));
        context.push('\n');
    }
    if context.is_empty() {
        return Err(NlError::TranslationFailed(
            "no tables available to query".into(),
        ));
    }
    Ok(context)
}

fn describe(table: &TableName, columns: &[ColumnInfo]) -> String {
    let columns = columns
        .iter()
        .map(|column| match column.nullable {
            true => format!("{} ({}, nullable)", column.name, column.data_type),
            false => format!("{} ({})", column.name, column.data_type),
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("Table '{table}' has columns: {columns}.")
}
