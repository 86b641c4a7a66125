use std::{
    error::Error,
    io::{self, Write},
    path::PathBuf,
};

use sql_query_core::{Context, Database, Translator, command::HELP};
use tracing::info;

use crate::{editor::Editor, session};

fn banner(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "=== SQL Query CLI - Interactive Mode ===")?;
    writeln!(out, "Type 'quit' or 'exit' to stop")?;
    writeln!(out, "{HELP}")?;
    writeln!(out)
}

pub async fn run<D, T>(
    ctx: &mut Context<D>,
    translator: &T,
    history_file: Option<PathBuf>,
) -> Result<(), Box<dyn Error>>
where
    D: Database,
    T: Translator,
{
    let mut stdout = io::stdout();
    banner(&mut stdout)?;
    let mut editor = Editor::new(history_file)?;
    session::run(ctx, translator, &mut editor, &mut stdout).await?;
    info!("Interactive session finished");
    Ok(())
}
