// Allow dead code for items that are part of the public API but only used in tests
#![allow(dead_code)]

mod analyzer;
mod cmd;
mod config;
mod context;
mod dsn;
mod errors;
mod executor;
mod json_schema;
mod lexer;
mod navigator;
mod output;
mod parser;
mod progress;
mod resultset;
mod session;

use clap::Parser;
use cmd::Cli;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = cmd::run(cli) {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
