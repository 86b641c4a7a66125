use std::io::{self, Write};

use sql_query_core::{DispatchError, Outcome, Rows, command::HELP};

pub fn render(out: &mut impl Write, outcome: &Outcome) -> io::Result<()> {
    match outcome {
        Outcome::Rows { sql, rows } => render_rows(out, sql, rows),
        Outcome::Answer { question, answer } => {
            writeln!(out, "=== Natural Language Query: {question} ===")?;
            writeln!(out, "Response: {}", answer.text)
        }
        Outcome::FellBack {
            question,
            nl_error,
            rows,
        } => {
            writeln!(out, "✗ Natural language query failed: {nl_error}")?;
            writeln!(out, "Falling back to direct SQL query...")?;
            render_rows(out, question, rows)
        }
        Outcome::Tables(list) => {
            if let Some(warning) = &list.warning {
                writeln!(out, "⚠ {warning}")?;
            }
            writeln!(out, "Available tables: [{}]", list.tables.join(", "))
        }
        Outcome::TableChanged(table) => writeln!(out, "✓ Table changed to: {table}"),
        Outcome::Help => writeln!(out, "{HELP}"),
        Outcome::Quit => writeln!(out, "Goodbye!"),
        Outcome::Nothing => Ok(()),
    }
}

pub fn render_error(out: &mut impl Write, err: &DispatchError) -> io::Result<()> {
    match err {
        DispatchError::Fallback { nl, sql } => {
            writeln!(out, "✗ Natural language query failed: {nl}")?;
            writeln!(out, "Falling back to direct SQL query...")?;
            writeln!(out, "✗ Error executing SQL query: {sql}")
        }
        _ => writeln!(out, "✗ {err}"),
    }
}

fn render_rows(out: &mut impl Write, sql: &str, rows: &Rows) -> io::Result<()> {
    writeln!(out, "=== Executing SQL: {sql} ===")?;
    if rows.columns.is_empty() {
        return writeln!(out, "Query OK, {} rows affected", rows.rows_affected);
    }
    if rows.is_empty() {
        return writeln!(out, "No records found.");
    }
    writeln!(out, "Found {} records:", rows.len())?;
    let header = rows.columns.join(" | ");
    writeln!(out, "{header}")?;
    writeln!(out, "{}", "-".repeat(header.chars().count()))?;
    for row in &rows.rows {
        let line = row
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" | ");
        writeln!(out, "{line}")?;
    }
    Ok(())
}
