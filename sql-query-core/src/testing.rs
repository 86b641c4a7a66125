//! In-memory stand-ins for the database and the translator.

use std::{cell::RefCell, collections::HashMap};

use crate::{
    ColumnInfo, Database, DatabaseError, DatabaseErrorKind, Rows, TableName,
    translator::{Answer, NlError, Translator},
};

/// Answers registered queries, rejects anything else as a syntax error.
#[derive(Debug, Default)]
pub struct FakeDatabase {
    pub executed: Vec<String>,
    pub introspections: usize,
    pub closed: bool,
    results: HashMap<String, Result<Rows, DatabaseError>>,
    tables: Vec<(String, Vec<ColumnInfo>)>,
    tables_error: Option<DatabaseError>,
}

impl FakeDatabase {
    pub fn with_result(mut self, sql: &str, result: Result<Rows, DatabaseError>) -> Self {
        self.results.insert(sql.to_string(), result);
        self
    }

    pub fn with_table(mut self, name: &str, columns: Vec<ColumnInfo>) -> Self {
        self.tables.push((name.to_string(), columns));
        self
    }

    pub fn with_tables_error(mut self, error: DatabaseError) -> Self {
        self.tables_error = Some(error);
        self
    }

    fn columns(&self, table: &TableName) -> Option<&Vec<ColumnInfo>> {
        let name = table.to_string();
        self.tables
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, columns)| columns)
    }
}

impl Database for FakeDatabase {
    async fn execute(&mut self, sql: &str) -> Result<Rows, DatabaseError> {
        self.executed.push(sql.to_string());
        match self.results.get(sql) {
            Some(result) => result.clone(),
            None => {
                let token = sql.split_whitespace().next().unwrap_or_default();
                Err(DatabaseError::new(
                    DatabaseErrorKind::SyntaxError,
                    format!("syntax error at or near \"{token}\""),
                ))
            }
        }
    }

    async fn list_tables(&mut self) -> Result<Vec<String>, DatabaseError> {
        self.introspections += 1;
        match &self.tables_error {
            Some(error) => Err(error.clone()),
            None => Ok(self.tables.iter().map(|(name, _)| name.clone()).collect()),
        }
    }

    async fn describe_table(
        &mut self,
        table: &TableName,
    ) -> Result<Vec<ColumnInfo>, DatabaseError> {
        self.introspections += 1;
        Ok(self.columns(table).cloned().unwrap_or_default())
    }

    async fn table_exists(&mut self, table: &TableName) -> Result<bool, DatabaseError> {
        self.introspections += 1;
        Ok(self.columns(table).is_some())
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}

/// Returns a canned reply and remembers what it was asked.
#[derive(Debug)]
pub struct FakeTranslator {
    reply: Result<Answer, NlError>,
    pub asked: RefCell<Vec<(String, Option<String>)>>,
}

impl FakeTranslator {
    pub fn answering(text: &str) -> Self {
        Self {
            reply: Ok(Answer {
                text: text.to_string(),
                sql: None,
            }),
            asked: RefCell::default(),
        }
    }

    pub fn failing(error: NlError) -> Self {
        Self {
            reply: Err(error),
            asked: RefCell::default(),
        }
    }
}

impl Translator for FakeTranslator {
    async fn ask<D: Database>(
        &self,
        _db: &mut D,
        question: &str,
        table: Option<&TableName>,
    ) -> Result<Answer, NlError> {
        self.asked
            .borrow_mut()
            .push((question.to_string(), table.map(TableName::to_string)));
        self.reply.clone()
    }
}
