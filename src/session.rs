//! Command dispatcher.
//!
//! One entry point for every interactive surface (CLI one-shot, REPL,
//! notebook kernels): SET / SHOW / DESCRIBE / CHECK commands mutate or
//! inspect the [`AppContext`]; anything else falls through and is parsed
//! as a query.

use crate::context::{AppContext, DsnVersion, Mode};
use crate::dsn;
use crate::errors::{codes, ArxError, ArxResult};
use crate::executor::Executor;
use crate::parser::{Parser, Query};
use crate::resultset::ResultSet;
use std::path::Path;

/// What a dispatched input produced.
#[derive(Debug)]
pub enum Reply {
    Result(ResultSet),
    Message(String),
}

pub struct Session {
    pub ctx: AppContext,
}

impl Session {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx }
    }

    /// Dispatch one line of input: command or query.
    pub fn dispatch(&mut self, input: &str) -> ArxResult<Reply> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ArxError::code(codes::EMPTY_INPUT));
        }

        let mut words = trimmed.split_whitespace();
        let head = words.next().unwrap_or("").to_uppercase();
        match head.as_str() {
            "SET" => self.handle_set(trimmed),
            "SHOW" => self.handle_show(trimmed),
            "DESCRIBE" => self.handle_describe(trimmed),
            "CHECK" => self.handle_check(trimmed),
            _ => Ok(Reply::Result(self.run_query(trimmed)?)),
        }
    }

    /// Parse (and in DSN mode rewrite) a query without executing it.
    pub fn prepare_query(&self, input: &str) -> ArxResult<(Query, Vec<ArxError>)> {
        let dsn_mode = self.ctx.mode == Mode::Dsn;
        let parsed = Parser::parse_with_mode(input, dsn_mode)?;
        let mut query = parsed.query;
        let mut warnings = parsed.warnings;
        if dsn_mode {
            let schema = self.ctx.require_schema()?;
            warnings.extend(dsn::rewrite_query(&mut query, &schema));
        }
        Ok((query, warnings))
    }

    /// Parse, rewrite and execute a query with the session defaults.
    pub fn run_query(&self, input: &str) -> ArxResult<ResultSet> {
        let (query, warnings) = self.prepare_query(input)?;
        let mut result = Executor::new(&query)
            .with_verbose(self.ctx.verbose)
            .execute()?;
        result.warnings.splice(0..0, warnings);
        Ok(result)
    }

    fn handle_set(&mut self, input: &str) -> ArxResult<Reply> {
        let mut words = input.split_whitespace();
        words.next(); // SET
        let what = words.next().unwrap_or("").to_uppercase();
        let rest = words.collect::<Vec<_>>().join(" ");

        match what.as_str() {
            "MODE" => {
                let mode: Mode = rest
                    .parse()
                    .map_err(|e: String| invalid_argument(e))?;
                self.ctx.set_mode(mode);
                Ok(Reply::Message(format!("Mode set to {}", mode)))
            }
            "DSN_VERSION" => {
                let version: DsnVersion = rest
                    .parse()
                    .map_err(|e: String| invalid_argument(e))?;
                self.ctx.set_dsn_version(version);
                Ok(Reply::Message(format!("DSN version set to {}", version)))
            }
            "XSD" => {
                let path = unquote(&rest);
                if path.is_empty() {
                    return Err(invalid_argument("SET XSD requires a path"));
                }
                self.ctx.set_xsd(Path::new(path))?;
                let mut msg = format!("XSD path set to {}", path);
                if let Some(ref schema) = self.ctx.schema {
                    msg.push_str(&format!(
                        " ({} attribute(s) from {} file(s), version {})",
                        schema.attribute_count(),
                        schema.files_loaded(),
                        schema.version()
                    ));
                }
                Ok(Reply::Message(msg))
            }
            "DEST" => {
                let path = unquote(&rest);
                if path.is_empty() {
                    return Err(invalid_argument("SET DEST requires a path"));
                }
                self.ctx.set_dest(Path::new(path))?;
                Ok(Reply::Message(format!("Destination set to {}", path)))
            }
            "VERBOSE" => {
                let enable = match rest.to_uppercase().as_str() {
                    "" | "ON" | "TRUE" => true,
                    "OFF" | "FALSE" => false,
                    other => return Err(invalid_argument(format!("SET VERBOSE: '{}'", other))),
                };
                self.ctx.set_verbose(enable);
                Ok(Reply::Message(format!(
                    "Verbose {}",
                    if enable { "enabled" } else { "disabled" }
                )))
            }
            other => Err(ArxError::code(codes::UNKNOWN_COMMAND)
                .with_detail(format!("SET {}", other))),
        }
    }

    fn handle_show(&self, input: &str) -> ArxResult<Reply> {
        let mut words = input.split_whitespace();
        words.next(); // SHOW
        let what = words.next().unwrap_or("").to_uppercase();

        let message = match what.as_str() {
            "MODE" => format!("Mode: {}", self.ctx.mode),
            "XSD" => match self.ctx.xsd_path {
                Some(ref path) => format!("XSD: {}", path.display()),
                None => "XSD: (not set)".to_string(),
            },
            "DEST" => match self.ctx.dest_path {
                Some(ref path) => format!("Destination: {}", path.display()),
                None => "Destination: (not set)".to_string(),
            },
            other => {
                return Err(ArxError::code(codes::UNKNOWN_COMMAND)
                    .with_detail(format!("SHOW {}", other)))
            }
        };
        Ok(Reply::Message(message))
    }

    fn handle_describe(&self, input: &str) -> ArxResult<Reply> {
        if self.ctx.mode != Mode::Dsn {
            return Err(invalid_argument("DESCRIBE is only available in DSN mode"));
        }
        let schema = self.ctx.require_schema()?;
        let key = input["DESCRIBE".len()..].trim();
        let key = unquote(key);
        if key.is_empty() {
            return Err(invalid_argument("DESCRIBE requires a shortcut, name or bloc"));
        }
        Ok(Reply::Message(schema.describe(key)?))
    }

    fn handle_check(&self, input: &str) -> ArxResult<Reply> {
        if self.ctx.mode != Mode::Dsn {
            return Err(invalid_argument("CHECK is only available in DSN mode"));
        }
        let mut words = input.split_whitespace();
        words.next(); // CHECK
        let kind_word = words.next().unwrap_or("");
        let kind = kind_word.to_uppercase();
        let after_kind = input
            .find(kind_word)
            .map(|pos| &input[pos + kind_word.len()..])
            .unwrap_or("");
        let value = unquote(after_kind);
        if kind.is_empty() || value.is_empty() {
            return Err(invalid_argument("CHECK requires a kind and a value"));
        }

        match kind.as_str() {
            "SIRET" => {
                dsn::validate::check_siret(value)?;
                Ok(Reply::Message(format!("SIRET {} is valid", value)))
            }
            "NIR" => {
                dsn::validate::check_nir(value)?;
                Ok(Reply::Message(format!("NIR {} is valid", value)))
            }
            "DATE" => {
                dsn::validate::check_dsn_date(value)?;
                Ok(Reply::Message(format!("Date {} is valid", value)))
            }
            "FILE" => {
                let schema = self.ctx.require_schema()?;
                let report = dsn::check::check_file(Path::new(value), &schema)?;
                Ok(Reply::Message(format_check_report(&report)))
            }
            other => Err(ArxError::code(codes::UNKNOWN_COMMAND)
                .with_detail(format!("CHECK {}", other))),
        }
    }
}

/// Render a conformance report the way query warnings print.
pub fn format_check_report(report: &crate::dsn::check::CheckReport) -> String {
    let mut out = format!(
        "{}: {} bloc(s), {} attribute(s) checked\n",
        report.file, report.blocs_checked, report.attributes_checked
    );
    for issue in &report.issues {
        out.push_str(&format!("{}\n", issue));
    }
    out.push_str(if report.ok {
        "Document conforms to the loaded schema."
    } else {
        "Document does NOT conform to the loaded schema."
    });
    out
}

fn invalid_argument(detail: impl AsRef<str>) -> ArxError {
    ArxError::code(codes::INVALID_COMMAND_ARGUMENT).with_detail(detail)
}

/// Strip one layer of matching quotes.
fn unquote(s: &str) -> &str {
    let s = s.trim();
    if s.len() >= 2 {
        let bytes = s.as_bytes();
        if (bytes[0] == b'\'' && bytes[s.len() - 1] == b'\'')
            || (bytes[0] == b'"' && bytes[s.len() - 1] == b'"')
        {
            return &s[1..s.len() - 1];
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_show_mode() {
        let mut session = Session::new(AppContext::new());
        let reply = session.dispatch("SET MODE DSN").unwrap();
        assert!(matches!(reply, Reply::Message(ref m) if m.contains("DSN")));
        assert_eq!(session.ctx.mode, Mode::Dsn);

        let reply = session.dispatch("show mode").unwrap();
        assert!(matches!(reply, Reply::Message(ref m) if m == "Mode: DSN"));
    }

    #[test]
    fn test_set_mode_rejects_garbage() {
        let mut session = Session::new(AppContext::new());
        let err = session.dispatch("SET MODE SIDEWAYS").unwrap_err();
        assert_eq!(err.code, codes::INVALID_COMMAND_ARGUMENT);
    }

    #[test]
    fn test_unknown_set_subcommand() {
        let mut session = Session::new(AppContext::new());
        let err = session.dispatch("SET COLOUR blue").unwrap_err();
        assert_eq!(err.code, codes::UNKNOWN_COMMAND);
    }

    #[test]
    fn test_describe_requires_dsn_mode() {
        let mut session = Session::new(AppContext::new());
        let err = session.dispatch("DESCRIBE 30.001").unwrap_err();
        assert_eq!(err.code, codes::INVALID_COMMAND_ARGUMENT);
    }

    #[test]
    fn test_check_without_schema_still_validates() {
        let mut session = Session::new(AppContext::new());
        session.ctx.set_mode(Mode::Dsn);
        let reply = session.dispatch("CHECK DATE 29022024").unwrap();
        assert!(matches!(reply, Reply::Message(ref m) if m.contains("valid")));
        let err = session.dispatch("CHECK DATE 31022024").unwrap_err();
        assert_eq!(err.code, codes::INVALID_DSN_DATE);
    }

    #[test]
    fn test_fallthrough_is_a_query() {
        let mut session = Session::new(AppContext::new());
        let err = session.dispatch("FLOOB x FROM y").unwrap_err();
        // not a command: parsed as a query, which must start with SELECT
        assert_eq!(err.code, codes::MALFORMED_SELECT_ITEM);
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("'a path'"), "a path");
        assert_eq!(unquote("\"x\""), "x");
        assert_eq!(unquote("plain"), "plain");
    }
}
