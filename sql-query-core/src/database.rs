use std::{error::Error, fmt::Display};

use futures_util::TryStreamExt;
use sqlx::{
    Column, Either, Executor, Row, TypeInfo, ValueRef,
    postgres::{PgPool, PgPoolOptions, PgRow},
};
use sqlparser::{dialect::PostgreSqlDialect, parser::Parser};
use tracing::info;

use crate::table::TableName;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Server text rendering for every type without a native mapping.
    Text(String),
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Int(value) => write!(f, "{value}"),
            Value::Float(value) => write!(f, "{value}"),
            Value::Text(value) => write!(f, "{value}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub rows_affected: u64,
}

impl Rows {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns,
            rows,
            rows_affected: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseErrorKind {
    ConnectionFailed,
    SyntaxError,
    TableNotFound,
    Timeout,
    Unknown,
}

impl DatabaseErrorKind {
    /// Maps a PostgreSQL SQLSTATE code onto the kinds reported to the user.
    pub fn from_sqlstate(code: &str) -> Self {
        match code {
            "42601" => Self::SyntaxError,
            "42P01" => Self::TableNotFound,
            "57014" => Self::Timeout,
            // Connection exceptions, authorization failures and unknown databases.
            "3D000" => Self::ConnectionFailed,
            _ if code.starts_with("08") || code.starts_with("28") => Self::ConnectionFailed,
            _ => Self::Unknown,
        }
    }
}

impl Display for DatabaseErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseErrorKind::ConnectionFailed => write!(f, "connection failed"),
            DatabaseErrorKind::SyntaxError => write!(f, "syntax error"),
            DatabaseErrorKind::TableNotFound => write!(f, "table not found"),
            DatabaseErrorKind::Timeout => write!(f, "timeout"),
            DatabaseErrorKind::Unknown => write!(f, "database error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseError {
    pub kind: DatabaseErrorKind,
    /// Driver message, kept verbatim.
    pub message: String,
}

impl DatabaseError {
    pub fn new(kind: DatabaseErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl Display for DatabaseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl Error for DatabaseError {}

impl From<sqlx::Error> for DatabaseError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::Database(db_error) => {
                let kind = db_error
                    .code()
                    .map_or(DatabaseErrorKind::Unknown, |code| {
                        DatabaseErrorKind::from_sqlstate(&code)
                    });
                Self::new(kind, db_error.message())
            }
            sqlx::Error::PoolTimedOut => Self::new(DatabaseErrorKind::Timeout, error.to_string()),
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Configuration(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolClosed => {
                Self::new(DatabaseErrorKind::ConnectionFailed, error.to_string())
            }
            _ => Self::new(DatabaseErrorKind::Unknown, error.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}

#[allow(async_fn_in_trait)]
pub trait Database {
    /// Runs `sql` exactly as written.
    async fn execute(&mut self, sql: &str) -> Result<Rows, DatabaseError>;

    /// Lists user tables, qualified with their schema unless it is `public`.
    async fn list_tables(&mut self) -> Result<Vec<String>, DatabaseError>;

    async fn describe_table(&mut self, table: &TableName)
    -> Result<Vec<ColumnInfo>, DatabaseError>;

    async fn table_exists(&mut self, table: &TableName) -> Result<bool, DatabaseError>;

    async fn close(&mut self);
}

/// PostgreSQL gateway holding a single pooled connection.
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    /// Nothing is opened until the first query runs.
    pub fn connect_lazy(database_url: &str) -> Result<Self, DatabaseError> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .min_connections(0)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_lazy(database_url)?;
        Ok(Self { pool })
    }

    /// Result columns of the last statement in `sql`, found by preparing it.
    ///
    /// Only used when that statement sent no rows, the simple query protocol
    /// carries no column names then.
    async fn result_columns(&self, sql: &str) -> Vec<String> {
        let statement = match Parser::parse_sql(&PostgreSqlDialect {}, sql) {
            Ok(statements) if statements.len() > 1 => {
                statements.last().map(ToString::to_string)
            }
            _ => None,
        };
        let statement = statement.as_deref().unwrap_or(sql);
        match (&self.pool).describe(statement).await {
            Ok(describe) => describe
                .columns()
                .iter()
                .map(|column| column.name().to_string())
                .collect(),
            Err(err) => {
                info!("Could not describe result columns: {err}");
                vec![]
            }
        }
    }
}

/// Collects the outcome of every statement in one query text.
#[derive(Debug, Default)]
struct StatementResults {
    /// Rows of the last statement that sent any.
    last: Rows,
    current: Option<Rows>,
    rows_affected: u64,
    /// Whether the final statement sent no rows at all.
    last_was_empty: bool,
}

impl StatementResults {
    fn push_row(&mut self, columns: impl FnOnce() -> Vec<String>, values: Vec<Value>) {
        self.current
            .get_or_insert_with(|| Rows::new(columns(), vec![]))
            .rows
            .push(values);
    }

    fn finish_statement(&mut self, rows_affected: u64) {
        self.rows_affected += rows_affected;
        match self.current.take() {
            Some(rows) => {
                self.last = rows;
                self.last_was_empty = false;
            }
            None => self.last_was_empty = true,
        }
    }

    /// `columns` names the final statement's result columns when it sent no
    /// rows, an empty list means it returns none.
    fn finish(mut self, columns: Vec<String>) -> Rows {
        if self.last_was_empty && !columns.is_empty() {
            self.last = Rows::new(columns, vec![]);
        }
        self.last.rows_affected = self.rows_affected;
        self.last
    }
}

impl Database for PgDatabase {
    async fn execute(&mut self, sql: &str) -> Result<Rows, DatabaseError> {
        let mut results = StatementResults::default();
        {
            // The simple query protocol lets the text contain several
            // statements, the rows of the last row-returning one are kept.
            let mut stream = self.pool.fetch_many(sqlx::raw_sql(sql));
            while let Some(item) = stream.try_next().await? {
                match item {
                    Either::Left(done) => results.finish_statement(done.rows_affected()),
                    Either::Right(row) => {
                        let values = decode_row(&row)?;
                        results.push_row(
                            || {
                                row.columns()
                                    .iter()
                                    .map(|column| column.name().to_string())
                                    .collect()
                            },
                            values,
                        );
                    }
                }
            }
        }
        let columns = match results.last_was_empty {
            true => self.result_columns(sql).await,
            false => vec![],
        };
        let result = results.finish(columns);
        info!("Query returned {} rows", result.len());
        Ok(result)
    }

    async fn list_tables(&mut self) -> Result<Vec<String>, DatabaseError> {
        let tables: Vec<(String, String)> = sqlx::query_as(
            r#"SELECT
    table_schema::text,
    table_name::text
FROM
    information_schema.tables
WHERE
    table_schema NOT IN ('pg_catalog', 'information_schema')
ORDER BY
    table_schema,
    table_name"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(tables
            .into_iter()
            .map(|(schema, table)| {
                let schema = (schema != "public").then_some(schema.as_str());
                TableName::new(schema, &table).to_string()
            })
            .collect())
    }

    async fn describe_table(
        &mut self,
        table: &TableName,
    ) -> Result<Vec<ColumnInfo>, DatabaseError> {
        let columns: Vec<(String, String, bool)> = sqlx::query_as(
            r#"SELECT
    attribute.attname::text,
    format_type(attribute.atttypid, attribute.atttypmod),
    NOT attribute.attnotnull
FROM
    pg_catalog.pg_attribute AS attribute
WHERE
    attribute.attrelid = to_regclass($1)
    AND attribute.attnum > 0
    AND NOT attribute.attisdropped
ORDER BY
    attribute.attnum"#,
        )
        .bind(table.escaped())
        .fetch_all(&self.pool)
        .await?;
        Ok(columns
            .into_iter()
            .map(|(name, data_type, nullable)| ColumnInfo {
                name,
                data_type,
                nullable,
            })
            .collect())
    }

    async fn table_exists(&mut self, table: &TableName) -> Result<bool, DatabaseError> {
        let (exists,): (bool,) = sqlx::query_as("SELECT to_regclass($1) IS NOT NULL")
            .bind(table.escaped())
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn close(&mut self) {
        if !self.pool.is_closed() {
            self.pool.close().await;
            info!("Database connection closed");
        }
    }
}

fn decode_row(row: &PgRow) -> Result<Vec<Value>, sqlx::Error> {
    (0..row.len()).map(|idx| decode_value(row, idx)).collect()
}

fn decode_value(row: &PgRow, idx: usize) -> Result<Value, sqlx::Error> {
    let raw = row.try_get_raw(idx)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let type_name = raw.type_info().name().to_string();
    Ok(match type_name.as_str() {
        "BOOL" => Value::Bool(row.try_get(idx)?),
        "INT2" => Value::Int(row.try_get::<i16, _>(idx)?.into()),
        "INT4" => Value::Int(row.try_get::<i32, _>(idx)?.into()),
        "INT8" => Value::Int(row.try_get(idx)?),
        "FLOAT4" => Value::Float(row.try_get::<f32, _>(idx)?.into()),
        "FLOAT8" => Value::Float(row.try_get(idx)?),
        _ => Value::Text(raw.as_str().map_err(sqlx::Error::Decode)?.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::{DatabaseError, DatabaseErrorKind, Rows, StatementResults, Value};

    #[test]
    fn sqlstate_classification() {
        assert_eq!(
            DatabaseErrorKind::from_sqlstate("42601"),
            DatabaseErrorKind::SyntaxError
        );
        assert_eq!(
            DatabaseErrorKind::from_sqlstate("42P01"),
            DatabaseErrorKind::TableNotFound
        );
        assert_eq!(
            DatabaseErrorKind::from_sqlstate("57014"),
            DatabaseErrorKind::Timeout
        );
        for code in ["08006", "08001", "28P01", "3D000"] {
            assert_eq!(
                DatabaseErrorKind::from_sqlstate(code),
                DatabaseErrorKind::ConnectionFailed
            );
        }
        assert_eq!(
            DatabaseErrorKind::from_sqlstate("23505"),
            DatabaseErrorKind::Unknown
        );
    }

    #[test]
    fn driver_errors_are_classified() {
        let error = DatabaseError::from(sqlx::Error::PoolTimedOut);
        assert_eq!(error.kind, DatabaseErrorKind::Timeout);

        let error = DatabaseError::from(sqlx::Error::PoolClosed);
        assert_eq!(error.kind, DatabaseErrorKind::ConnectionFailed);

        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let error = DatabaseError::from(sqlx::Error::Io(io));
        assert_eq!(error.kind, DatabaseErrorKind::ConnectionFailed);
        assert!(error.message.contains("refused"));

        let error = DatabaseError::from(sqlx::Error::RowNotFound);
        assert_eq!(error.kind, DatabaseErrorKind::Unknown);
    }

    #[test]
    fn error_display_keeps_driver_message() {
        let error = DatabaseError::new(
            DatabaseErrorKind::SyntaxError,
            "syntax error at or near \"average\"",
        );
        assert_eq!(
            error.to_string(),
            "syntax error: syntax error at or near \"average\""
        );
    }

    #[test]
    fn values_display() {
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Int(150).to_string(), "150");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        assert_eq!(Value::Text("12.50".into()).to_string(), "12.50");
    }

    #[test]
    fn rows_count() {
        let rows = Rows::new(vec!["count".into()], vec![vec![Value::Int(150)]]);
        assert_eq!(rows.len(), 1);
        assert!(!rows.is_empty());
        assert!(Rows::default().is_empty());
    }

    fn columns(names: &[&str]) -> impl FnOnce() -> Vec<String> {
        let names: Vec<String> = names.iter().map(|name| name.to_string()).collect();
        move || names
    }

    #[test]
    fn last_row_set_wins() {
        let mut results = StatementResults::default();
        results.push_row(columns(&["a"]), vec![Value::Int(1)]);
        results.finish_statement(1);
        results.push_row(columns(&["b"]), vec![Value::Int(2)]);
        results.push_row(columns(&["ignored"]), vec![Value::Int(3)]);
        results.finish_statement(2);
        assert!(!results.last_was_empty);

        let rows = results.finish(vec![]);
        assert_eq!(rows.columns, vec!["b".to_string()]);
        assert_eq!(rows.rows, vec![vec![Value::Int(2)], vec![Value::Int(3)]]);
        assert_eq!(rows.rows_affected, 3);
    }

    #[test]
    fn empty_final_select_keeps_its_columns() {
        let mut results = StatementResults::default();
        results.push_row(columns(&["a"]), vec![Value::Int(1)]);
        results.finish_statement(1);
        results.finish_statement(0);
        assert!(results.last_was_empty);

        let rows = results.finish(vec!["b".into()]);
        assert_eq!(rows.columns, vec!["b".to_string()]);
        assert!(rows.is_empty());
    }

    #[test]
    fn statements_without_result_columns() {
        let mut results = StatementResults::default();
        results.finish_statement(4);
        let rows = results.finish(vec![]);
        assert!(rows.columns.is_empty());
        assert_eq!(rows.rows_affected, 4);

        // A trailing UPDATE leaves the earlier SELECT's rows in place.
        let mut results = StatementResults::default();
        results.push_row(columns(&["a"]), vec![Value::Int(1)]);
        results.finish_statement(1);
        results.finish_statement(2);
        let rows = results.finish(vec![]);
        assert_eq!(rows.columns, vec!["a".to_string()]);
        assert_eq!(rows.rows_affected, 3);
    }
}
