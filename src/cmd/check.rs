//! Check command: DSN conformance of declaration files.

use super::{arx_to_anyhow, INPUT_OUTPUT, MODE, OUTPUT_FORMAT};
use crate::context::DsnVersion;
use crate::dsn::check::CheckReport;
use crate::dsn::{self, DsnSchema};
use crate::executor::discover;
use crate::session::format_check_report;
use anyhow::Result;
use clap::Args;
use schemars::JsonSchema;
use serde::Serialize;
use std::path::PathBuf;

/// JSON output for the check command
#[derive(Serialize, JsonSchema)]
pub(crate) struct CheckJsonOutput {
    pub input: String,
    pub files_checked: usize,
    pub files_with_errors: usize,
    pub reports: Vec<CheckReport>,
}

/// Check DSN files against the shortcut schema
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// DSN file, directory or glob pattern
    #[arg(value_name = "PATH", help_heading = INPUT_OUTPUT)]
    pub path: PathBuf,

    /// DSN schema directory
    #[arg(long, value_name = "DIR", help_heading = MODE)]
    pub xsd: PathBuf,

    /// DSN schema revision: P25, P26, AUTO
    #[arg(long, value_name = "VERSION", default_value = "AUTO", help_heading = MODE)]
    pub dsn_version: String,

    /// Output results as JSON
    #[arg(long, help_heading = OUTPUT_FORMAT)]
    pub json: bool,
}

pub fn run(args: CheckArgs) -> Result<()> {
    let version: DsnVersion = args
        .dsn_version
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    let schema = DsnSchema::load_dir(&args.xsd, version).map_err(arx_to_anyhow)?;

    let input = args.path.to_string_lossy().into_owned();
    let files = discover::discover_files(&input).map_err(arx_to_anyhow)?;

    let mut reports = Vec::with_capacity(files.len());
    for file in &files {
        reports.push(dsn::check::check_file(file, &schema).map_err(arx_to_anyhow)?);
    }
    let failing = reports.iter().filter(|r| !r.ok).count();

    if args.json {
        let output = CheckJsonOutput {
            input,
            files_checked: reports.len(),
            files_with_errors: failing,
            reports,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        for report in &reports {
            println!("{}", format_check_report(report));
            println!();
        }
        println!(
            "{} file(s) checked, {} with errors.",
            reports.len(),
            failing
        );
    }

    if failing > 0 {
        anyhow::bail!("{} file(s) failed the conformance check", failing);
    }
    Ok(())
}
