//! Query command: one-shot execution or the interactive session.

use super::{arx_to_anyhow, report_warnings, BEHAVIOR, INPUT_OUTPUT, MODE, OUTPUT_FORMAT};
use crate::config::StartupConfig;
use crate::context::{AppContext, DsnVersion, Mode as QueryMode};
use crate::executor::Executor;
use crate::output::{OutputFormat, ResultFormatter};
use crate::resultset::ResultSet;
use crate::session::Session;
use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// Query XML files with a SQL-like language
#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Query text (omit for --interactive mode)
    #[arg(value_name = "QUERY")]
    pub query: Option<String>,

    /// Output format: text, json, jsonl, csv, tsv
    #[arg(short, long, default_value = "text", help_heading = OUTPUT_FORMAT)]
    pub format: String,

    /// Write output to file instead of stdout
    #[arg(short, long, value_name = "FILE", help_heading = INPUT_OUTPUT)]
    pub output: Option<PathBuf>,

    /// Query interpretation mode: standard, dsn
    #[arg(short, long, help_heading = MODE)]
    pub mode: Option<String>,

    /// DSN schema revision: P25, P26, AUTO
    #[arg(long, value_name = "VERSION", help_heading = MODE)]
    pub dsn_version: Option<String>,

    /// XSD schema file or directory
    #[arg(long, value_name = "PATH", help_heading = MODE)]
    pub xsd: Option<PathBuf>,

    /// Directory to export a copy of the results to
    #[arg(long, value_name = "DIR", help_heading = INPUT_OUTPUT)]
    pub dest: Option<PathBuf>,

    /// YAML config file (default: <config-dir>/arx/config.yaml)
    #[arg(short, long, value_name = "FILE", help_heading = INPUT_OUTPUT)]
    pub config: Option<PathBuf>,

    /// Report ambiguous paths and execution statistics
    #[arg(short, long, help_heading = OUTPUT_FORMAT)]
    pub verbose: bool,

    /// Show file-processing progress
    #[arg(short, long, help_heading = OUTPUT_FORMAT)]
    pub progress: bool,

    /// Show query execution time
    #[arg(long, help_heading = OUTPUT_FORMAT)]
    pub timing: bool,

    /// Start an interactive session (REPL)
    #[arg(short, long, help_heading = BEHAVIOR)]
    pub interactive: bool,
}

/// Build the application context: config file first, flags on top.
fn build_context(args: &QueryArgs) -> Result<(AppContext, Option<OutputFormat>)> {
    let mut ctx = AppContext::new();
    let mut config_format = None;

    let config_path = args.config.clone().or_else(StartupConfig::default_path);
    if let Some(path) = config_path {
        let config = StartupConfig::load(&path)?;
        if let Some(ref fmt) = config.format {
            config_format = Some(
                fmt.parse::<OutputFormat>()
                    .map_err(|e| anyhow::anyhow!(e))?,
            );
        }
        config.apply(&mut ctx).map_err(arx_to_anyhow)?;
    }

    if let Some(ref mode) = args.mode {
        let mode: QueryMode = mode.parse().map_err(|e: String| anyhow::anyhow!(e))?;
        ctx.set_mode(mode);
    }
    if let Some(ref version) = args.dsn_version {
        let version: DsnVersion = version.parse().map_err(|e: String| anyhow::anyhow!(e))?;
        ctx.set_dsn_version(version);
    }
    if args.verbose {
        ctx.set_verbose(true);
    }
    if let Some(ref xsd) = args.xsd {
        ctx.set_xsd(xsd).map_err(arx_to_anyhow)?;
    }
    if let Some(ref dest) = args.dest {
        ctx.set_dest(dest).map_err(arx_to_anyhow)?;
    }

    Ok((ctx, config_format))
}

/// Run the query command
pub fn run(args: QueryArgs) -> Result<()> {
    let (ctx, config_format) = build_context(&args)?;

    let format: OutputFormat = if args.format == "text" {
        config_format.unwrap_or_default()
    } else {
        args.format.parse().map_err(|e: String| anyhow::anyhow!(e))?
    };

    let session = Session::new(ctx);

    if args.interactive {
        return super::repl::run(session, format, args.timing);
    }

    let Some(query_text) = args.query else {
        anyhow::bail!("Query is required (or use --interactive mode)");
    };

    let (query, parse_warnings) = session
        .prepare_query(&query_text)
        .map_err(arx_to_anyhow)?;

    let mut executor = Executor::new(&query).with_verbose(session.ctx.verbose);

    let bar = if args.progress {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::with_template(
                "  {spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} files",
            )
            .unwrap()
            .progress_chars("█▓▒░  "),
        );
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        let pb_clone = pb.clone();
        executor = executor.with_progress(move |done, total| {
            if pb_clone.length() != Some(total) {
                pb_clone.set_length(total);
            }
            pb_clone.set_position(done);
        });
        Some(pb)
    } else {
        None
    };

    let mut result = executor.execute().map_err(arx_to_anyhow)?;
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
    result.warnings.splice(0..0, parse_warnings);

    report_warnings(&result.warnings);
    write_outputs(&session.ctx, &result, format, args.output.as_deref())?;

    if args.timing {
        eprintln!("Query executed in {:.3}s", result.stats.elapsed_secs);
    }
    Ok(())
}

/// Write the formatted result to stdout or `-o`, plus a timestamped
/// export when a destination directory is configured.
pub(crate) fn write_outputs(
    ctx: &AppContext,
    result: &ResultSet,
    format: OutputFormat,
    output: Option<&std::path::Path>,
) -> Result<()> {
    let formatted = ResultFormatter::format(result, format);

    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Cannot create output file: {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            writer.write_all(formatted.as_bytes())?;
            eprintln!("Wrote {} row(s) to {}", result.row_count(), path.display());
        }
        None => print!("{}", formatted),
    }

    write_dest_copy(ctx, result, format)
}

/// Timestamped export to the configured destination directory, if any.
pub(crate) fn write_dest_copy(
    ctx: &AppContext,
    result: &ResultSet,
    format: OutputFormat,
) -> Result<()> {
    if let Some(ref dest) = ctx.dest_path {
        let formatted = ResultFormatter::format(result, format);
        let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S");
        let path = dest.join(format!("arx_{}.{}", stamp, format.extension()));
        std::fs::write(&path, formatted.as_bytes())
            .with_context(|| format!("Cannot export to {}", path.display()))?;
        eprintln!("Exported results to {}", path.display());
    }
    Ok(())
}
