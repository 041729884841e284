//! Process-wide application context.
//!
//! Constructed at startup (flags layered over the optional YAML config),
//! mutated only by SET commands, dropped at process exit. The loaded DSN
//! schema is immutable and shared read-only across worker threads.

use crate::dsn::DsnSchema;
use crate::errors::{codes, ArxError, ArxResult, Location};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Query interpretation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Standard,
    Dsn,
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "STANDARD" => Ok(Mode::Standard),
            "DSN" => Ok(Mode::Dsn),
            _ => Err(format!("Unknown mode: {}. Valid options: STANDARD, DSN", s)),
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Standard => write!(f, "STANDARD"),
            Mode::Dsn => write!(f, "DSN"),
        }
    }
}

/// DSN schema revision. AUTO is resolved when a schema directory loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DsnVersion {
    P25,
    P26,
    #[default]
    Auto,
}

impl std::str::FromStr for DsnVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "P25" => Ok(DsnVersion::P25),
            "P26" => Ok(DsnVersion::P26),
            "AUTO" => Ok(DsnVersion::Auto),
            _ => Err(format!(
                "Unknown DSN version: {}. Valid options: P25, P26, AUTO",
                s
            )),
        }
    }
}

impl std::fmt::Display for DsnVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DsnVersion::P25 => write!(f, "P25"),
            DsnVersion::P26 => write!(f, "P26"),
            DsnVersion::Auto => write!(f, "AUTO"),
        }
    }
}

/// Mutable session state shared by the CLI, the REPL and the notebook
/// boundary.
#[derive(Debug, Clone, Default)]
pub struct AppContext {
    pub mode: Mode,
    pub dsn_version: DsnVersion,
    pub xsd_path: Option<PathBuf>,
    pub dest_path: Option<PathBuf>,
    pub verbose: bool,
    pub schema: Option<Arc<DsnSchema>>,
}

impl AppContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    pub fn set_dsn_version(&mut self, version: DsnVersion) {
        self.dsn_version = version;
    }

    /// Record the XSD path. In DSN mode a directory is loaded as the
    /// shortcut schema right away.
    pub fn set_xsd(&mut self, path: &Path) -> ArxResult<()> {
        if !path.exists() {
            return Err(ArxError::code(codes::FILE_NOT_FOUND).with_location(Location::in_file(path)));
        }
        self.xsd_path = Some(path.to_path_buf());
        if self.mode == Mode::Dsn && path.is_dir() {
            let schema = DsnSchema::load_dir(path, self.dsn_version)?;
            self.dsn_version = schema.version();
            self.schema = Some(Arc::new(schema));
        }
        Ok(())
    }

    /// Record the destination directory, creating it if needed.
    pub fn set_dest(&mut self, path: &Path) -> ArxResult<()> {
        if !path.exists() {
            std::fs::create_dir_all(path).map_err(|e| {
                ArxError::code(codes::DEST_CREATE_FAILED)
                    .with_detail(e.to_string())
                    .with_location(Location::in_file(path))
            })?;
        }
        self.dest_path = Some(path.to_path_buf());
        Ok(())
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// Schema handle for DSN rewriting; error when DSN mode has no
    /// schema loaded yet.
    pub fn require_schema(&self) -> ArxResult<Arc<DsnSchema>> {
        self.schema
            .clone()
            .ok_or_else(|| ArxError::code(codes::DSN_SCHEMA_REQUIRED))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_round_trip() {
        assert_eq!("dsn".parse::<Mode>().unwrap(), Mode::Dsn);
        assert_eq!("STANDARD".parse::<Mode>().unwrap(), Mode::Standard);
        assert_eq!(Mode::Dsn.to_string(), "DSN");
        assert!("weird".parse::<Mode>().is_err());
    }

    #[test]
    fn test_dsn_version_round_trip() {
        assert_eq!("p25".parse::<DsnVersion>().unwrap(), DsnVersion::P25);
        assert_eq!("AUTO".parse::<DsnVersion>().unwrap(), DsnVersion::Auto);
        assert_eq!(DsnVersion::P26.to_string(), "P26");
    }

    #[test]
    fn test_set_dest_creates_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let dest = dir.path().join("results");
        let mut ctx = AppContext::new();
        ctx.set_dest(&dest).unwrap();
        assert!(dest.is_dir());
        assert_eq!(ctx.dest_path.as_deref(), Some(dest.as_path()));
    }

    #[test]
    fn test_require_schema_without_load() {
        let ctx = AppContext::new();
        let err = ctx.require_schema().unwrap_err();
        assert_eq!(err.code, crate::errors::codes::DSN_SCHEMA_REQUIRED);
    }
}
