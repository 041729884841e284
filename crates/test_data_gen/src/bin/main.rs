//! Fixture generator CLI: writes deterministic XML corpora for manual
//! testing and benchmarking.

use clap::Parser;
use std::path::PathBuf;
use test_data_gen::{CorpusKind, Generator};

#[derive(Parser)]
#[command(name = "gen-fixtures")]
#[command(about = "Generate deterministic XML fixture corpora")]
struct Cli {
    /// Output directory
    #[arg(short, long, default_value = "fixtures")]
    out: PathBuf,

    /// Corpus kind: menu, bookstore, company, dsn
    #[arg(short, long, default_value = "menu")]
    kind: String,

    /// Number of files to generate
    #[arg(short, long, default_value_t = 10)]
    files: usize,

    /// Items per file (foods, books, blocs...)
    #[arg(short, long, default_value_t = 20)]
    items: usize,

    /// Random seed
    #[arg(short, long, default_value_t = 42)]
    seed: u64,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let kind: CorpusKind = cli.kind.parse().map_err(|e: String| anyhow::anyhow!(e))?;

    let paths = Generator::new(cli.seed).write_corpus(&cli.out, kind, cli.files, cli.items)?;
    println!(
        "Wrote {} file(s) to {} (seed {})",
        paths.len(),
        cli.out.display(),
        cli.seed
    );
    Ok(())
}
