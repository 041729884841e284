//! YAML startup configuration.
//!
//! An optional config file provides session defaults (mode, DSN
//! version, XSD path, destination, verbosity, output format). Command
//! line flags override the file; SET commands override both.

use crate::context::{AppContext, DsnVersion, Mode};
use crate::errors::{codes, ArxError, ArxResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Complete YAML configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StartupConfig {
    /// Query interpretation mode: STANDARD or DSN
    pub mode: Option<String>,
    /// DSN schema revision: P25, P26 or AUTO
    pub dsn_version: Option<String>,
    /// XSD file or schema directory
    pub xsd: Option<PathBuf>,
    /// Destination directory for result exports
    pub dest: Option<PathBuf>,
    /// Ambiguity warnings and execution statistics
    pub verbose: Option<bool>,
    /// Default output format
    pub format: Option<String>,
}

impl StartupConfig {
    /// Load a config file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("cannot read config {}: {}", path.display(), e))?;
        let config: StartupConfig = serde_yaml_ng::from_str(&text)
            .map_err(|e| anyhow::anyhow!("invalid config {}: {}", path.display(), e))?;
        Ok(config)
    }

    /// `<user-config-dir>/arx/config.yaml`, if the file exists.
    pub fn default_path() -> Option<PathBuf> {
        let path = dirs::config_dir()?.join("arx").join("config.yaml");
        path.is_file().then_some(path)
    }

    /// Layer the file's defaults into a fresh context. Order matters:
    /// mode and version first so an XSD directory loads as a schema.
    pub fn apply(&self, ctx: &mut AppContext) -> ArxResult<()> {
        if let Some(ref mode) = self.mode {
            let mode: Mode = mode.parse().map_err(|e: String| {
                ArxError::code(codes::INVALID_COMMAND_ARGUMENT).with_detail(e)
            })?;
            ctx.set_mode(mode);
        }
        if let Some(ref version) = self.dsn_version {
            let version: DsnVersion = version.parse().map_err(|e: String| {
                ArxError::code(codes::INVALID_COMMAND_ARGUMENT).with_detail(e)
            })?;
            ctx.set_dsn_version(version);
        }
        if let Some(verbose) = self.verbose {
            ctx.set_verbose(verbose);
        }
        if let Some(ref xsd) = self.xsd {
            ctx.set_xsd(xsd)?;
        }
        if let Some(ref dest) = self.dest {
            ctx.set_dest(dest)?;
        }
        Ok(())
    }
}
