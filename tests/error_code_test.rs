//! Error-code well-formedness: every code matches `ARX-\d{5}`, lives in
//! the catalog, and codes produced across the layers agree with it.

use arx::errors::{catalog_lookup, codes, ArxError, Severity, CATALOG};
use arx::executor::Executor;
use arx::lexer::Lexer;
use arx::parser::Parser;
use regex::Regex;

#[test]
fn test_catalog_codes_are_well_formed() {
    let re = Regex::new(r"^ARX-\d{5}$").unwrap();
    for entry in CATALOG {
        assert!(re.is_match(entry.code), "malformed code {}", entry.code);
        // the category digits embedded in the code match the entry
        let digits: u8 = entry.code[4..6].parse().unwrap();
        assert_eq!(digits, entry.category, "category mismatch for {}", entry.code);
        assert!(!entry.message.is_empty());
    }
}

#[test]
fn test_catalog_has_no_duplicates() {
    let mut seen = std::collections::HashSet::new();
    for entry in CATALOG {
        assert!(seen.insert(entry.code), "duplicate code {}", entry.code);
    }
}

#[test]
fn test_severity_categories() {
    // categories 80 and 85 are never fatal
    for entry in CATALOG {
        match entry.category {
            80 => assert_eq!(entry.severity, Severity::Warning, "{}", entry.code),
            85 => assert_eq!(entry.severity, Severity::Info, "{}", entry.code),
            _ => {}
        }
    }
}

#[test]
fn test_emitted_codes_are_in_catalog() {
    let emitted: Vec<ArxError> = vec![
        Lexer::tokenize("SELECT a # b").unwrap_err(),
        Lexer::tokenize("SELECT 'open").unwrap_err(),
        Parser::parse("").unwrap_err(),
        Parser::parse("SELECT * FROM 'f.xml'").unwrap_err(),
        Parser::parse("SELECT COUNT(*) FROM 'f.xml'").unwrap_err(),
        Parser::parse("SELECT a").unwrap_err(),
        Parser::parse("SELECT a FROM 'f' WHERE (a = 1").unwrap_err(),
        Parser::parse("SELECT a FROM 'f' WHERE a IN (x)").unwrap_err(),
        Parser::parse("SELECT a FROM 'f' FOR a IN r/x FOR a IN r/y").unwrap_err(),
        Parser::parse_with_mode("SELECT .a FROM 'f'", true).unwrap_err(),
        Executor::new(&Parser::parse("SELECT x FROM 'nope.xml'").unwrap().query)
            .execute()
            .unwrap_err(),
    ];

    for err in emitted {
        let entry = catalog_lookup(err.code)
            .unwrap_or_else(|| panic!("code {} missing from catalog", err.code));
        assert_eq!(entry.severity, err.severity);
    }
}

#[test]
fn test_display_carries_severity_bracket() {
    let err = ArxError::code(codes::FILE_NOT_FOUND);
    assert!(err.to_string().starts_with("ARX-02002 [Error] "));
    let warn = ArxError::code(codes::DUPLICATE_SELECT_FIELD);
    assert!(warn.to_string().starts_with("ARX-01004 [Warning] "));
    let info = ArxError::code(codes::EXECUTION_STATISTICS);
    assert!(info.to_string().starts_with("ARX-85001 [Info] "));
}

#[test]
fn test_hints_surface_for_user_facing_errors() {
    assert!(ArxError::code(codes::FILE_NOT_FOUND).hint().is_some());
    assert!(ArxError::code(codes::AGGREGATE_NEEDS_ELEMENT).example().is_some());
}
