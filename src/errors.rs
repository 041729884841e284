//! Unified error model for the query engine.
//!
//! Every diagnostic the engine emits carries a code of the form
//! `ARX-XXYYY` where `XX` is a two-digit category and `YYY` a specific
//! code. Severity is an attribute of the code, resolved through a static
//! catalog that also provides the human message and an optional
//! remediation hint. Display format is `ARX-XXYYY [Severity] Message`.

use ahash::AHashMap;
use once_cell::sync::Lazy;
use schemars::JsonSchema;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Info,
    Warning,
    Error,
}

impl Severity {
    /// Process exit code mandated for this severity.
    pub fn exit_code(self) -> i32 {
        match self {
            Severity::Error => 1,
            _ => 0,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Success => write!(f, "Success"),
            Severity::Info => write!(f, "Info"),
            Severity::Warning => write!(f, "Warning"),
            Severity::Error => write!(f, "Error"),
        }
    }
}

/// Where a diagnostic was produced: a query position, a file, or both.
#[derive(Debug, Clone, Default, Serialize, JsonSchema)]
pub struct Location {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl Location {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(line: u32, column: u32) -> Self {
        Self {
            line: Some(line),
            column: Some(column),
            path: None,
        }
    }

    pub fn in_file(path: impl Into<PathBuf>) -> Self {
        Self {
            line: None,
            column: None,
            path: Some(path.into()),
        }
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_column(mut self, column: u32) -> Self {
        self.column = Some(column);
        self
    }
}

/// A diagnostic produced by any layer of the engine.
///
/// Constructed from a catalog code; the catalog supplies severity and the
/// base message, a detail string narrows it to the concrete occurrence.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ArxError {
    pub code: &'static str,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl ArxError {
    /// Build a diagnostic from its catalog code.
    ///
    /// Panics in debug builds if the code is not in the catalog; release
    /// builds fall back to an `Error`-severity entry so a missing catalog
    /// row never hides the underlying problem.
    pub fn code(code: &'static str) -> Self {
        let entry = catalog_lookup(code);
        debug_assert!(entry.is_some(), "unknown error code {code}");
        let (severity, message) = entry
            .map(|e| (e.severity, e.message.to_string()))
            .unwrap_or((Severity::Error, format!("unknown error code {code}")));
        Self {
            code,
            severity,
            message,
            location: None,
        }
    }

    /// Append occurrence-specific detail to the catalog message.
    pub fn with_detail(mut self, detail: impl AsRef<str>) -> Self {
        self.message.push_str(": ");
        self.message.push_str(detail.as_ref());
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Two-digit category encoded in the code.
    pub fn category(&self) -> u8 {
        self.code
            .get(4..6)
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    }

    /// Remediation hint from the catalog, if one exists.
    pub fn hint(&self) -> Option<&'static str> {
        catalog_lookup(self.code).and_then(|e| e.hint)
    }

    /// Usage example from the catalog, if one exists.
    pub fn example(&self) -> Option<&'static str> {
        catalog_lookup(self.code).and_then(|e| e.example)
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for ArxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}", self.code, self.severity, self.message)?;
        if let Some(ref loc) = self.location {
            if let Some(ref path) = loc.path {
                write!(f, " path={}", path.display())?;
            }
            if let Some(line) = loc.line {
                write!(f, " line={}", line)?;
            }
            if let Some(column) = loc.column {
                write!(f, " column={}", column)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ArxError {}

pub type ArxResult<T> = Result<T, ArxError>;

/// Static catalog entry for one code.
#[derive(Debug, Clone, Copy)]
pub struct CatalogEntry {
    pub code: &'static str,
    pub category: u8,
    pub severity: Severity,
    pub message: &'static str,
    pub hint: Option<&'static str>,
    pub example: Option<&'static str>,
}

/// All codes the engine can emit, by name.
pub mod codes {
    pub const SUCCESS: &str = "ARX-00000";
    pub const EMPTY_INPUT: &str = "ARX-00001";
    pub const INVALID_CHARACTER: &str = "ARX-00002";
    pub const UNEXPECTED_TOKEN: &str = "ARX-00003";

    pub const EMPTY_SELECT: &str = "ARX-01001";
    pub const MALFORMED_SELECT_ITEM: &str = "ARX-01002";
    pub const AGGREGATE_NEEDS_ELEMENT: &str = "ARX-01003";
    pub const DUPLICATE_SELECT_FIELD: &str = "ARX-01004";
    pub const FIELD_NOT_GROUPED: &str = "ARX-01005";

    pub const MISSING_FROM: &str = "ARX-02001";
    pub const FILE_NOT_FOUND: &str = "ARX-02002";
    pub const NO_XML_FILES: &str = "ARX-02003";

    pub const PARTIAL_PATH_IN_DSN_MODE: &str = "ARX-03001";
    pub const MALFORMED_WHERE: &str = "ARX-03002";
    pub const UNBALANCED_PARENS: &str = "ARX-03003";
    pub const INVALID_LITERAL: &str = "ARX-03004";
    pub const UNTERMINATED_STRING: &str = "ARX-03005";
    pub const INVALID_LIKE_PATTERN: &str = "ARX-03006";

    pub const UNDECLARED_VARIABLE: &str = "ARX-04001";
    pub const DUPLICATE_VARIABLE: &str = "ARX-04002";
    pub const MALFORMED_FOR: &str = "ARX-04003";

    pub const AMBIGUOUS_PARTIAL_PATH: &str = "ARX-05001";
    pub const AMBIGUOUS_SHORTCUT: &str = "ARX-05002";
    pub const PATH_NOT_FOUND: &str = "ARX-05003";

    pub const INVALID_SIRET: &str = "ARX-06001";
    pub const INVALID_NIR: &str = "ARX-06002";
    pub const INVALID_DSN_DATE: &str = "ARX-06003";
    pub const MISSING_MANDATORY_ATTRIBUTE: &str = "ARX-06004";
    pub const TOO_MANY_OCCURRENCES: &str = "ARX-06005";

    pub const FILE_READ_FAILED: &str = "ARX-10001";
    pub const PERMISSION_DENIED: &str = "ARX-10002";
    pub const XML_PARSE_FAILED: &str = "ARX-10003";
    pub const DEST_CREATE_FAILED: &str = "ARX-10004";

    pub const ALL_FILES_FAILED: &str = "ARX-12001";
    pub const QUERY_CANCELLED: &str = "ARX-12002";

    pub const UNKNOWN_COMMAND: &str = "ARX-20001";
    pub const INVALID_COMMAND_ARGUMENT: &str = "ARX-20002";
    pub const INVALID_OUTPUT_FORMAT: &str = "ARX-20003";

    pub const DSN_SCHEMA_REQUIRED: &str = "ARX-22001";
    pub const UNKNOWN_DSN_NAME: &str = "ARX-22002";

    pub const ORDER_KEY_NOT_PROJECTED: &str = "ARX-80001";
    pub const DEPRECATED_SYNTAX: &str = "ARX-80002";
    pub const LARGE_DATASET: &str = "ARX-80003";

    pub const EXECUTION_STATISTICS: &str = "ARX-85001";
}

macro_rules! entry {
    ($code:expr, $cat:expr, $sev:expr, $msg:expr) => {
        CatalogEntry {
            code: $code,
            category: $cat,
            severity: $sev,
            message: $msg,
            hint: None,
            example: None,
        }
    };
    ($code:expr, $cat:expr, $sev:expr, $msg:expr, $hint:expr) => {
        CatalogEntry {
            code: $code,
            category: $cat,
            severity: $sev,
            message: $msg,
            hint: Some($hint),
            example: None,
        }
    };
    ($code:expr, $cat:expr, $sev:expr, $msg:expr, $hint:expr, $ex:expr) => {
        CatalogEntry {
            code: $code,
            category: $cat,
            severity: $sev,
            message: $msg,
            hint: Some($hint),
            example: Some($ex),
        }
    };
}

/// Full catalog. Tests assert that every emitted code is present here
/// and that codes match `ARX-\d{5}`.
pub static CATALOG: &[CatalogEntry] = &[
    entry!(codes::SUCCESS, 0, Severity::Success, "Query completed"),
    entry!(
        codes::EMPTY_INPUT,
        0,
        Severity::Error,
        "Nothing to parse",
        "Provide a query or a command"
    ),
    entry!(
        codes::INVALID_CHARACTER,
        0,
        Severity::Error,
        "Invalid character in query"
    ),
    entry!(
        codes::UNEXPECTED_TOKEN,
        0,
        Severity::Error,
        "Unexpected token"
    ),
    entry!(
        codes::EMPTY_SELECT,
        1,
        Severity::Error,
        "SELECT list is empty",
        "List at least one field after SELECT",
        "SELECT menu/food/name FROM \"menu.xml\""
    ),
    entry!(
        codes::MALFORMED_SELECT_ITEM,
        1,
        Severity::Error,
        "Malformed SELECT item",
        "Use an explicit field path; SELECT * is not supported"
    ),
    entry!(
        codes::AGGREGATE_NEEDS_ELEMENT,
        1,
        Severity::Error,
        "Aggregate functions require an element argument",
        "Name the element to aggregate over",
        "SELECT COUNT(e) FROM \"f.xml\" FOR e IN root/item"
    ),
    entry!(
        codes::DUPLICATE_SELECT_FIELD,
        1,
        Severity::Warning,
        "Duplicate field in SELECT list"
    ),
    entry!(
        codes::FIELD_NOT_GROUPED,
        1,
        Severity::Error,
        "Non-aggregate SELECT field missing from GROUP BY"
    ),
    entry!(
        codes::MISSING_FROM,
        2,
        Severity::Error,
        "Missing FROM clause",
        "Every query needs FROM <file-or-directory>"
    ),
    entry!(
        codes::FILE_NOT_FOUND,
        2,
        Severity::Error,
        "File not found",
        "Check the FROM path"
    ),
    entry!(
        codes::NO_XML_FILES,
        2,
        Severity::Error,
        "Directory contains no XML files"
    ),
    entry!(
        codes::PARTIAL_PATH_IN_DSN_MODE,
        3,
        Severity::Error,
        "Leading-dot partial paths are not allowed in DSN mode",
        "Use a shortcut (e.g. 30.001) or the full element name"
    ),
    entry!(
        codes::MALFORMED_WHERE,
        3,
        Severity::Error,
        "Malformed WHERE expression"
    ),
    entry!(
        codes::UNBALANCED_PARENS,
        3,
        Severity::Error,
        "Unbalanced parentheses"
    ),
    entry!(
        codes::INVALID_LITERAL,
        3,
        Severity::Error,
        "Invalid literal",
        "IN lists take quoted strings or numbers",
        "WHERE x IN ('a', 'b')"
    ),
    entry!(
        codes::UNTERMINATED_STRING,
        3,
        Severity::Error,
        "Unterminated string literal",
        "Close the quote"
    ),
    entry!(
        codes::INVALID_LIKE_PATTERN,
        3,
        Severity::Error,
        "Invalid LIKE pattern",
        "Use SQL wildcards (% and _) or a /regex/ literal"
    ),
    entry!(
        codes::UNDECLARED_VARIABLE,
        4,
        Severity::Error,
        "FOR clause references an undeclared variable",
        "Declare the variable in an earlier FOR clause"
    ),
    entry!(
        codes::DUPLICATE_VARIABLE,
        4,
        Severity::Error,
        "FOR variable declared twice"
    ),
    entry!(
        codes::MALFORMED_FOR,
        4,
        Severity::Error,
        "Malformed FOR clause",
        "Expected FOR <var> IN <path> [AT <var>]",
        "FOR b IN bookstore/book AT i"
    ),
    entry!(
        codes::AMBIGUOUS_PARTIAL_PATH,
        5,
        Severity::Warning,
        "Partial path matches several distinct full paths; using the first"
    ),
    entry!(
        codes::AMBIGUOUS_SHORTCUT,
        5,
        Severity::Warning,
        "DSN shortcut matches several attributes; using the first"
    ),
    entry!(
        codes::PATH_NOT_FOUND,
        5,
        Severity::Warning,
        "Path matched no nodes"
    ),
    entry!(
        codes::INVALID_SIRET,
        6,
        Severity::Error,
        "Invalid SIRET",
        "A SIRET is 14 digits and Luhn-valid"
    ),
    entry!(
        codes::INVALID_NIR,
        6,
        Severity::Error,
        "Invalid NIR",
        "A NIR is 13 digits plus a 2-digit key (97 - number mod 97)"
    ),
    entry!(
        codes::INVALID_DSN_DATE,
        6,
        Severity::Error,
        "Invalid DSN date",
        "Dates use the JJMMAAAA form and must exist in the calendar"
    ),
    entry!(
        codes::MISSING_MANDATORY_ATTRIBUTE,
        6,
        Severity::Error,
        "Mandatory attribute missing"
    ),
    entry!(
        codes::TOO_MANY_OCCURRENCES,
        6,
        Severity::Error,
        "Attribute occurs more often than the schema allows"
    ),
    entry!(codes::FILE_READ_FAILED, 10, Severity::Error, "Cannot read file"),
    entry!(
        codes::PERMISSION_DENIED,
        10,
        Severity::Error,
        "Permission denied"
    ),
    entry!(
        codes::XML_PARSE_FAILED,
        10,
        Severity::Error,
        "XML parsing failed"
    ),
    entry!(
        codes::DEST_CREATE_FAILED,
        10,
        Severity::Error,
        "Cannot create destination directory"
    ),
    entry!(
        codes::ALL_FILES_FAILED,
        12,
        Severity::Error,
        "Every input file failed to process"
    ),
    entry!(
        codes::QUERY_CANCELLED,
        12,
        Severity::Warning,
        "Query cancelled; partial results returned"
    ),
    entry!(
        codes::UNKNOWN_COMMAND,
        20,
        Severity::Error,
        "Unknown command",
        "Valid commands: SET, SHOW, DESCRIBE, CHECK, or a query"
    ),
    entry!(
        codes::INVALID_COMMAND_ARGUMENT,
        20,
        Severity::Error,
        "Invalid command argument"
    ),
    entry!(
        codes::INVALID_OUTPUT_FORMAT,
        20,
        Severity::Error,
        "Invalid output format",
        "Valid: text, json, jsonl, csv, tsv"
    ),
    entry!(
        codes::DSN_SCHEMA_REQUIRED,
        22,
        Severity::Error,
        "DSN mode requires a loaded schema",
        "SET XSD <directory> first"
    ),
    entry!(
        codes::UNKNOWN_DSN_NAME,
        22,
        Severity::Error,
        "Unknown DSN shortcut, attribute or bloc"
    ),
    entry!(
        codes::ORDER_KEY_NOT_PROJECTED,
        80,
        Severity::Warning,
        "ORDER BY key is not in the SELECT list; sorting on a hidden column"
    ),
    entry!(
        codes::DEPRECATED_SYNTAX,
        80,
        Severity::Warning,
        "Deprecated syntax"
    ),
    entry!(codes::LARGE_DATASET, 80, Severity::Warning, "Large dataset"),
    entry!(
        codes::EXECUTION_STATISTICS,
        85,
        Severity::Info,
        "Execution statistics"
    ),
];

static CATALOG_INDEX: Lazy<AHashMap<&'static str, &'static CatalogEntry>> =
    Lazy::new(|| CATALOG.iter().map(|e| (e.code, e)).collect());

/// Look up a code in the catalog.
pub fn catalog_lookup(code: &str) -> Option<&'static CatalogEntry> {
    CATALOG_INDEX.get(code).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_format() {
        let err = ArxError::code(codes::FILE_NOT_FOUND)
            .with_location(Location::in_file("nope.xml"));
        assert_eq!(err.to_string(), "ARX-02002 [Error] File not found path=nope.xml");
    }

    #[test]
    fn test_parse_error_location() {
        let err = ArxError::code(codes::UNTERMINATED_STRING).with_location(Location::at(1, 17));
        let s = err.to_string();
        assert!(s.contains("line=1"));
        assert!(s.contains("column=17"));
    }

    #[test]
    fn test_category_extraction() {
        assert_eq!(ArxError::code(codes::FILE_NOT_FOUND).category(), 2);
        assert_eq!(ArxError::code(codes::QUERY_CANCELLED).category(), 12);
        assert_eq!(ArxError::code(codes::EXECUTION_STATISTICS).category(), 85);
    }

    #[test]
    fn test_severity_exit_codes() {
        assert_eq!(Severity::Error.exit_code(), 1);
        assert_eq!(Severity::Warning.exit_code(), 0);
        assert_eq!(Severity::Info.exit_code(), 0);
        assert_eq!(Severity::Success.exit_code(), 0);
    }

    #[test]
    fn test_detail_appends() {
        let err = ArxError::code(codes::XML_PARSE_FAILED).with_detail("unexpected end of stream");
        assert!(err.message.ends_with("unexpected end of stream"));
    }
}
