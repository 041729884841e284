//! Interactive session on top of the command dispatcher.

use super::{arx_to_anyhow, report_warnings};
use crate::output::{OutputFormat, ResultFormatter};
use crate::session::{Reply, Session};
use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;

pub fn run(mut session: Session, default_format: OutputFormat, timing: bool) -> Result<()> {
    let mut rl = DefaultEditor::new()?;

    // Load history
    let history_path = dirs::cache_dir()
        .map(|d| d.join("arx").join("history"))
        .unwrap_or_else(|| PathBuf::from(".arx_history"));
    let _ = rl.load_history(&history_path);

    println!("arx interactive session");
    println!("Type .help for meta-commands, .exit to quit");
    println!();

    let mut current_format = default_format;

    loop {
        let readline = rl.readline("arx> ");

        match readline {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(trimmed);

                if trimmed.starts_with('.') {
                    if handle_meta_command(trimmed, &mut current_format) {
                        break;
                    }
                    continue;
                }

                match session.dispatch(trimmed) {
                    Ok(Reply::Message(message)) => println!("{}", message),
                    Ok(Reply::Result(result)) => {
                        report_warnings(&result.warnings);
                        print!("{}", ResultFormatter::format(&result, current_format));
                        if let Err(e) = super::query::write_dest_copy(
                            &session.ctx,
                            &result,
                            current_format,
                        ) {
                            eprintln!("Error: {}", e);
                        }
                        if timing {
                            eprintln!("({:.3}s)", result.stats.elapsed_secs);
                        }
                    }
                    Err(err) => {
                        eprintln!("{}", arx_to_anyhow(err));
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    // Save history
    if let Some(parent) = history_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = rl.save_history(&history_path);

    Ok(())
}

/// Handle REPL meta-commands. Returns true if the session should exit.
fn handle_meta_command(command: &str, format: &mut OutputFormat) -> bool {
    let parts: Vec<&str> = command.split_whitespace().collect();
    let cmd = parts.first().copied().unwrap_or("");

    match cmd {
        ".exit" | ".quit" | ".q" => {
            println!("Goodbye!");
            return true;
        }
        ".help" | ".h" | ".?" => {
            println!("Meta-commands:");
            println!("  .format <fmt>        Set output format (text, json, jsonl, csv, tsv)");
            println!("  .exit, .quit, .q     Exit the session");
            println!();
            println!("Session commands:");
            println!("  SET MODE {{STANDARD|DSN}}");
            println!("  SET DSN_VERSION {{P25|P26|AUTO}}");
            println!("  SET XSD <path>");
            println!("  SET DEST <path>");
            println!("  SET VERBOSE [ON|OFF]");
            println!("  SHOW {{MODE|XSD|DEST}}");
            println!("  DESCRIBE <shortcut|name|bloc>   (DSN mode)");
            println!("  CHECK {{SIRET|NIR|DATE}} <value> (DSN mode)");
            println!();
            println!("Anything else is executed as a query.");
        }
        ".format" | ".f" => match parts.get(1) {
            Some(name) => match name.parse::<OutputFormat>() {
                Ok(fmt) => {
                    *format = fmt;
                    println!("Output format: {}", fmt);
                }
                Err(e) => eprintln!("Error: {}", e),
            },
            None => println!("Output format: {}", format),
        },
        other => {
            eprintln!("Unknown meta-command: {} (try .help)", other);
        }
    }
    false
}
