#![cfg_attr(not(test), deny(clippy::unwrap_used))]
mod commands;
mod config;
mod editor;
mod output;
mod session;

use std::process::ExitCode;

use clap::Parser;
use commands::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("✗ {err}");
            ExitCode::FAILURE
        }
    }
}
