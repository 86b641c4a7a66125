pub mod interactive;
pub mod query;

use std::{
    error::Error,
    io::{self, Write},
    path::PathBuf,
    process::ExitCode,
};

use sql_query_core::{Context, GeminiTranslator, PgDatabase, TableName};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use crate::{
    commands::query::QueryRequest,
    config::{self, Config, Overrides},
};

const EXAMPLES: &str = "\
Examples:
  sql-query -t users -q \"How many users are there?\"
  sql-query -t users -s -q \"SELECT COUNT(*) FROM users\"
  sql-query -t sales.orders -s
  sql-query --interactive";

fn init_standard() -> Result<(), Box<dyn Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::WARN)
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn init_debug() -> Result<(), Box<dyn Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Query a SQL database with SQL or natural language.
#[derive(clap::Parser)]
#[command(
    name = "sql-query",
    bin_name = "sql-query",
    long_about = None,
    after_help = EXAMPLES
)]
pub struct Cli {
    #[arg(short, long, help = "Table to query, optionally as schema.table")]
    table: Option<String>,
    #[arg(short, long, help = "Query to run")]
    query: Option<String>,
    #[arg(short, long, help = "Run the query as SQL instead of natural language")]
    sql: bool,
    #[arg(long, help = "Start an interactive session")]
    interactive: bool,
    #[arg(long, help = "Database URL, overrides DATABASE_URL")]
    database_url: Option<String>,
    #[arg(short, long, help = "Path to a TOML config file")]
    config: Option<PathBuf>,
    #[arg(long, help = "Show debug information")]
    debug: bool,
}

impl Cli {
    pub fn run(self) -> Result<ExitCode, Box<dyn Error>> {
        match self.debug {
            true => init_debug()?,
            false => init_standard()?,
        }

        // Usage problems are reported before anything is resolved or connected.
        let (table, request) = match self.interactive {
            true => {
                let table = self.table.as_deref().map(TableName::parse).transpose()?;
                (table, None)
            }
            false => {
                let request = QueryRequest::from_args(
                    self.table.as_deref(),
                    self.query.as_deref(),
                    self.sql,
                )?;
                (request.table.clone(), Some(request))
            }
        };

        let config = config::resolve(&Overrides {
            database_url: self.database_url,
            config: self.config,
        })?;

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        rt.block_on(connect_and_run(config, table, request))
    }
}

async fn connect_and_run(
    config: Config,
    table: Option<TableName>,
    request: Option<QueryRequest>,
) -> Result<ExitCode, Box<dyn Error>> {
    let database = PgDatabase::connect_lazy(&config.database_url)?;
    let translator = GeminiTranslator::new(config.api_key, config.gemini)?;
    let mut ctx = Context::new(database).with_table(table);

    let result = match request {
        Some(request) => {
            let (mut stdout, mut stderr) = (io::stdout(), io::stderr());
            query::run(&mut ctx, &translator, request, &mut stdout, &mut stderr)
                .await
                .map(|ok| match ok {
                    true => ExitCode::SUCCESS,
                    false => ExitCode::FAILURE,
                })
                .map_err(Box::<dyn Error>::from)
        }
        None => interactive::run(&mut ctx, &translator, config.history_file)
            .await
            .map(|()| ExitCode::SUCCESS),
    };
    ctx.close().await;
    info!("Connection closed");
    io::stdout().flush()?;
    result
}
