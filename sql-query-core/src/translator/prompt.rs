use std::sync::LazyLock;

use regex::Regex;
use sqlparser::{dialect::PostgreSqlDialect, parser::Parser};
use tracing::warn;

use crate::{database::Rows, translator::NlError};

/// Rows beyond this are summarized instead of sent to the model.
const MAX_PROMPT_ROWS: usize = 50;

const FENCE_TAGS: [&str; 4] = ["sql", "postgresql", "postgres", "pgsql"];

static SQL_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\s*(?:sql\s*query|sql)\s*:\s*")
        .expect("This is a bug in the regex crate as per documentation.")
});

pub fn text_to_sql(question: &str, schema: &str) -> String {
    format!(
        "Given an input question, write one syntactically correct PostgreSQL query that answers it.\n\
Only use the tables and columns listed below, never select every column when a few suffice, \
and qualify column names with their table when more than one table is involved.\n\
Reply with the SQL query only, without explanation or markdown.\n\n\
Schema:\n{schema}\n\
Question: {question}\n\
SQLQuery:"
    )
}

pub fn synthesize(question: &str, sql: &str, rows: &Rows) -> String {
    format!(
        "Given an input question, synthesize a short answer from the query results.\n\n\
Question: {question}\n\
SQL: {sql}\n\
SQL Response:\n{}\n\
Response:",
        render_rows(rows)
    )
}

fn render_rows(rows: &Rows) -> String {
    if rows.is_empty() {
        return format!("(no rows, {} affected)", rows.rows_affected);
    }
    let mut rendered = rows.columns.join(" | ");
    for row in rows.rows.iter().take(MAX_PROMPT_ROWS) {
        rendered.push('\n');
        rendered.push_str(
            &row.iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" | "),
        );
    }
    if rows.len() > MAX_PROMPT_ROWS {
        rendered.push_str(&format!("\n... ({} more rows)", rows.len() - MAX_PROMPT_ROWS));
    }
    rendered
}

/// Pulls the query out of a model reply.
///
/// Handles markdown fences, a leading `SQLQuery:` label and a trailing
/// `SQLResult:` section the model sometimes invents.
pub fn extract_sql(reply: &str) -> Option<String> {
    let mut text = reply.trim();
    if let Some(fenced) = text.strip_prefix("```") {
        let body = fenced.rfind("```").map_or(fenced, |end| &fenced[..end]);
        text = strip_fence_tag(body);
    }
    let text = SQL_LABEL.replace(text.trim(), "");
    let mut text: &str = &text;
    if let Some(end) = text.find("SQLResult:") {
        text = &text[..end];
    }
    let sql = text.trim().trim_end_matches(';').trim();
    match sql.is_empty() {
        true => None,
        false => Some(sql.to_string()),
    }
}

/// Drops the language tag that may open a fenced block, on its own line or
/// in front of the query.
fn strip_fence_tag(body: &str) -> &str {
    let body = body.trim_start_matches([' ', '\t']);
    let end = body.find(char::is_whitespace).unwrap_or(body.len());
    match FENCE_TAGS
        .iter()
        .any(|tag| body[..end].eq_ignore_ascii_case(tag))
    {
        true => &body[end..],
        false => body,
    }
}

/// Generated SQL has to be a single statement.
///
/// Text the parser does not understand is passed through, the database has
/// the final say on PostgreSQL syntax.
pub fn check_statement(sql: &str) -> Result<(), NlError> {
    let dialect = PostgreSqlDialect {};
    match Parser::parse_sql(&dialect, sql) {
        Ok(statements) if statements.len() == 1 => Ok(()),
        Ok(statements) => Err(NlError::TranslationFailed(format!(
            "expected a single SQL statement, the model produced {}",
            statements.len()
        ))),
        Err(err) => {
            warn!("Could not parse generated SQL, passing it on as is: {err}");
            Ok(())
        }
    }
}
