pub(crate) mod analyze;
pub(crate) mod check;
mod describe;
mod query;
mod repl;

use crate::errors::ArxError;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;

const AFTER_HELP: &str = "\x1b[1mCommon workflows:\x1b[0m
  Query one file:
    arx query \"SELECT breakfast_menu/food/name FROM 'menu.xml' WHERE breakfast_menu/food/price < 6\"

  Query a directory of XML files:
    arx query \"SELECT FILE_NAME, order/total FROM 'invoices/' ORDER BY FILE_NAME\"

  DSN shortcut notation:
    arx query --mode dsn --xsd schemas/ \"SELECT 30.002, 30.004 FROM 'dsn.xml'\"

  Interactive session:
    arx query --interactive

\x1b[1mMore info:\x1b[0m
  Run 'arx <command> --help' for command-specific options.
  Enable completions: arx completions <shell>";

#[derive(Parser)]
#[command(name = "arx")]
#[command(version)]
#[command(about = "SQL-like query engine for XML documents")]
#[command(after_help = AFTER_HELP)]
#[command(arg_required_else_help = true)]
#[command(max_term_width = 100)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

// Help heading constants for consistency
pub(crate) const INPUT_OUTPUT: &str = "Input/Output";
pub(crate) const MODE: &str = "Mode";
pub(crate) const OUTPUT_FORMAT: &str = "Output";
pub(crate) const BEHAVIOR: &str = "Behavior";

#[derive(Subcommand)]
pub enum Commands {
    /// Run a query, or start the interactive session
    #[command(visible_alias = "qy")]
    #[command(after_help = "\x1b[1mExamples:\x1b[0m
  arx query \"SELECT bookstore/book/title FROM 'books.xml'\"
  arx query \"SELECT b/title, a FROM 'books.xml' FOR b IN bookstore/book FOR a IN b/author\"
  arx query \"SELECT FILE_NAME, x/y FROM 'dir/' ORDER BY FILE_NAME\" -f csv -o out.csv
  arx query --interactive
  arx query --mode dsn --xsd schemas/ \"SELECT 30.001 FROM 'dsn.xml'\"")]
    Query(query::QueryArgs),

    /// Show element counts, depth and size statistics for XML files
    #[command(visible_alias = "an")]
    #[command(after_help = "\x1b[1mExamples:\x1b[0m
  arx analyze data.xml
  arx analyze invoices/ --json")]
    Analyze(analyze::AnalyzeArgs),

    /// Check DSN files against the shortcut schema
    #[command(visible_alias = "ck")]
    #[command(after_help = "\x1b[1mExamples:\x1b[0m
  arx check dsn.xml --xsd schemas/
  arx check declarations/ --xsd schemas/ --dsn-version P26 --json")]
    Check(check::CheckArgs),

    /// Print DSN schema information for a shortcut, attribute or bloc
    #[command(visible_alias = "desc")]
    #[command(after_help = "\x1b[1mExamples:\x1b[0m
  arx describe 30.001 --xsd schemas/
  arx describe S21_G00_30 --xsd schemas/ --dsn-version P26")]
    Describe(describe::DescribeArgs),

    /// Print JSON Schemas for the machine-readable output types
    Schema {
        /// Schema name (all schemas when omitted)
        name: Option<String>,
    },

    /// Generate shell completion scripts
    #[command(after_help = "\x1b[1mInstallation:\x1b[0m
  Bash:
    arx completions bash >> ~/.bashrc

  Zsh:
    arx completions zsh > \"${fpath[1]}/_arx\"

  Fish:
    arx completions fish > ~/.config/fish/completions/arx.fish

  PowerShell:
    arx completions powershell >> $PROFILE")]
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Query(args) => query::run(args),
        Commands::Analyze(args) => analyze::run(args),
        Commands::Check(args) => check::run(args),
        Commands::Describe(args) => describe::run(args),
        Commands::Schema { name } => run_schema(name),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "arx", &mut io::stdout());
            Ok(())
        }
    }
}

fn run_schema(name: Option<String>) -> anyhow::Result<()> {
    match name {
        Some(name) => match crate::json_schema::get_schema(&name) {
            Some(schema) => {
                println!("{}", serde_json::to_string_pretty(&schema)?);
                Ok(())
            }
            None => anyhow::bail!(
                "unknown schema '{}'; available: {}",
                name,
                crate::json_schema::schema_names().join(", ")
            ),
        },
        None => {
            let all = crate::json_schema::all_schemas();
            println!("{}", serde_json::to_string_pretty(&all)?);
            Ok(())
        }
    }
}

/// Render a core diagnostic with its hint and example lines for the
/// terminal, then hand it to anyhow for exit-code handling.
pub(crate) fn arx_to_anyhow(err: ArxError) -> anyhow::Error {
    let mut text = err.to_string();
    if let Some(hint) = err.hint() {
        text.push_str(&format!("\n  hint: {}", hint));
    }
    if let Some(example) = err.example() {
        text.push_str(&format!("\n  example: {}", example));
    }
    anyhow::anyhow!(text)
}

/// Print non-fatal diagnostics to stderr.
pub(crate) fn report_warnings(warnings: &[ArxError]) {
    for warning in warnings {
        eprintln!("{}", warning);
    }
}
