//! Analyze command: structural statistics for XML files.

use super::{arx_to_anyhow, report_warnings, INPUT_OUTPUT, OUTPUT_FORMAT};
use crate::analyzer::{self, FileAnalysis};
use anyhow::Result;
use clap::Args;
use schemars::JsonSchema;
use serde::Serialize;
use std::path::PathBuf;

/// JSON output for the analyze command
#[derive(Serialize, JsonSchema)]
pub(crate) struct AnalyzeJsonOutput {
    pub input: String,
    pub files_analyzed: usize,
    pub files_failed: usize,
    pub results: Vec<FileAnalysis>,
}

/// Show element counts, depth and size statistics for XML files
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// XML file, directory or glob pattern
    #[arg(value_name = "PATH", help_heading = INPUT_OUTPUT)]
    pub path: PathBuf,

    /// Output results as JSON
    #[arg(long, help_heading = OUTPUT_FORMAT)]
    pub json: bool,
}

pub fn run(args: AnalyzeArgs) -> Result<()> {
    let input = args.path.to_string_lossy().into_owned();
    let (analyses, warnings) = analyzer::analyze_path(&input).map_err(arx_to_anyhow)?;

    if args.json {
        let output = AnalyzeJsonOutput {
            input,
            files_analyzed: analyses.len(),
            files_failed: warnings.len(),
            results: analyses,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    report_warnings(&warnings);
    for analysis in &analyses {
        let stats = &analysis.stats;
        println!(
            "{} ({} bytes, root <{}>)",
            stats.file, stats.size_bytes, stats.root_element
        );
        println!(
            "  {} element(s), {} attribute(s), {} text node(s), depth {}, {} distinct name(s)",
            stats.elements,
            stats.attributes,
            stats.text_nodes,
            stats.max_depth,
            stats.distinct_elements
        );
        for entry in &analysis.top_elements {
            println!("    {:6}  {}", entry.count, entry.name);
        }
        println!();
    }
    println!("{} file(s) analyzed.", analyses.len());
    Ok(())
}
