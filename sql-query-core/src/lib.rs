pub mod command;
pub mod database;
pub mod dispatcher;
pub mod table;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod translator;

pub use command::Command;
pub use database::{ColumnInfo, Database, DatabaseError, DatabaseErrorKind, PgDatabase, Rows, Value};
pub use dispatcher::{Context, DispatchError, Outcome, TableList, dispatch};
pub use table::{InvalidTableName, TableName};
pub use translator::{Answer, NlError, Translator, gemini::GeminiTranslator};

pub fn escape_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace("\"", "\"\""))
}
