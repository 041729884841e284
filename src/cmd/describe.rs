//! One-shot DESCRIBE for scripts: schema info without a session.

use super::{arx_to_anyhow, MODE};
use crate::context::DsnVersion;
use crate::dsn::DsnSchema;
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

/// Print DSN schema information for a shortcut, attribute or bloc
#[derive(Args, Debug)]
pub struct DescribeArgs {
    /// Shortcut (30.001), full name (S21_G00_30_001) or bloc (S21_G00_30)
    #[arg(value_name = "KEY")]
    pub key: String,

    /// DSN schema directory
    #[arg(long, value_name = "DIR", help_heading = MODE)]
    pub xsd: PathBuf,

    /// DSN schema revision: P25, P26, AUTO
    #[arg(long, value_name = "VERSION", default_value = "AUTO", help_heading = MODE)]
    pub dsn_version: String,
}

pub fn run(args: DescribeArgs) -> Result<()> {
    let version: DsnVersion = args
        .dsn_version
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    let schema = DsnSchema::load_dir(&args.xsd, version).map_err(arx_to_anyhow)?;
    let text = schema.describe(&args.key).map_err(arx_to_anyhow)?;
    print!("{}", text);
    Ok(())
}
