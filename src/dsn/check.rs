//! DSN document conformance check.
//!
//! Validates a declaration file against the loaded shortcut schema:
//! unknown attributes, missing mandatory attributes, occurrence bounds,
//! and value formats for the typed rubrics (NIR, SIRET, dates). This is
//! the category-06 surface; full XSD validation lives outside the core.

use super::{validate, Attribute, DsnSchema, ATTR_NAME_RE};
use crate::errors::{codes, ArxError, ArxResult, Location, Severity};
use crate::executor::discover;
use crate::navigator::element_text;
use ahash::AHashMap;
use schemars::JsonSchema;
use serde::Serialize;
use std::path::Path;

/// Outcome of checking one document.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct CheckReport {
    pub file: String,
    pub blocs_checked: usize,
    pub attributes_checked: usize,
    pub issues: Vec<ArxError>,
    pub ok: bool,
}

impl CheckReport {
    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count()
    }
}

/// Check one file against the schema.
pub fn check_file(path: &Path, schema: &DsnSchema) -> ArxResult<CheckReport> {
    let text = discover::read_document_text(path)?;
    let doc = roxmltree::Document::parse(&text).map_err(|e| {
        ArxError::code(codes::XML_PARSE_FAILED)
            .with_detail(e.to_string())
            .with_location(Location::in_file(path))
    })?;

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(check_document(&doc, schema, &filename))
}

/// Check a parsed document against the schema.
pub fn check_document(
    doc: &roxmltree::Document,
    schema: &DsnSchema,
    filename: &str,
) -> CheckReport {
    let mut report = CheckReport {
        file: filename.to_string(),
        blocs_checked: 0,
        attributes_checked: 0,
        issues: Vec::new(),
        ok: true,
    };

    for node in doc.descendants().filter(|n| n.is_element()) {
        let name = node.tag_name().name();

        if schema.bloc(name).is_some() {
            report.blocs_checked += 1;
            check_bloc_instance(&node, schema, &mut report);
            continue;
        }

        if ATTR_NAME_RE.is_match(name) {
            match schema.full_name(name) {
                Some(attr) => {
                    report.attributes_checked += 1;
                    check_value(&attr, &element_text(node), &mut report);
                }
                None => report.issues.push(
                    ArxError::code(codes::UNKNOWN_DSN_NAME).with_detail(name),
                ),
            }
        }
    }

    report.ok = report.error_count() == 0;
    report
}

/// Mandatory presence and occurrence bounds within one bloc instance.
fn check_bloc_instance(node: &roxmltree::Node, schema: &DsnSchema, report: &mut CheckReport) {
    let bloc = match schema.bloc(node.tag_name().name()) {
        Some(bloc) => bloc,
        None => return,
    };

    let mut occurrences: AHashMap<&str, u32> = AHashMap::new();
    for child in node.children().filter(|c| c.is_element()) {
        *occurrences.entry(child.tag_name().name()).or_default() += 1;
    }

    for attr in &bloc.attributes {
        let seen = occurrences
            .get(attr.full_name.as_str())
            .copied()
            .unwrap_or(0);
        if attr.mandatory && seen < attr.min_occurs {
            report.issues.push(
                ArxError::code(codes::MISSING_MANDATORY_ATTRIBUTE).with_detail(format!(
                    "{} ({}) in bloc {}",
                    attr.full_name, attr.short_id, bloc.name
                )),
            );
        }
        if let Some(max) = attr.max_occurs {
            if seen > max {
                report.issues.push(
                    ArxError::code(codes::TOO_MANY_OCCURRENCES).with_detail(format!(
                        "{} appears {} time(s), at most {} allowed",
                        attr.full_name, seen, max
                    )),
                );
            }
        }
    }
}

/// Format check for the typed rubrics. The schema's type names select
/// the validator; plain strings pass through.
fn check_value(attr: &Attribute, value: &str, report: &mut CheckReport) {
    if value.is_empty() {
        return;
    }
    let result = match attr.type_name.to_uppercase().as_str() {
        "NIR" => validate::check_nir(value),
        "SIRET" => validate::check_siret(value),
        "DATE" | "JJMMAAAA" => validate::check_dsn_date(value),
        _ => Ok(()),
    };
    if let Err(mut err) = result {
        err.message.push_str(&format!(" (in {})", attr.full_name));
        report.issues.push(err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::DsnVersion;
    use tempfile::TempDir;

    const XSD: &str = r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="S21_G00_30">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="S21_G00_30_001" type="NIR" minOccurs="1" maxOccurs="1"/>
        <xs:element name="S21_G00_30_002" type="xs:string" minOccurs="1"/>
        <xs:element name="S21_G00_30_007" type="JJMMAAAA" minOccurs="0" maxOccurs="1"/>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;

    fn schema() -> DsnSchema {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("check_P26.xsd"), XSD).unwrap();
        DsnSchema::load_dir(dir.path(), DsnVersion::Auto).unwrap()
    }

    fn valid_nir() -> String {
        let number: i64 = 2_85_01_75_042_012;
        format!("285017504201{}{:02}", 2, 97 - (number % 97))
    }

    #[test]
    fn test_conforming_document() {
        let xml = format!(
            "<DSN><S21_G00_30>\
             <S21_G00_30_001>{}</S21_G00_30_001>\
             <S21_G00_30_002>Durand</S21_G00_30_002>\
             <S21_G00_30_007>29022024</S21_G00_30_007>\
             </S21_G00_30></DSN>",
            valid_nir()
        );
        let doc = roxmltree::Document::parse(&xml).unwrap();
        let report = check_document(&doc, &schema(), "dsn.xml");
        assert!(report.ok, "issues: {:?}", report.issues);
        assert_eq!(report.blocs_checked, 1);
        assert_eq!(report.attributes_checked, 3);
    }

    #[test]
    fn test_missing_mandatory_attribute() {
        let xml = format!(
            "<DSN><S21_G00_30><S21_G00_30_001>{}</S21_G00_30_001></S21_G00_30></DSN>",
            valid_nir()
        );
        let doc = roxmltree::Document::parse(&xml).unwrap();
        let report = check_document(&doc, &schema(), "dsn.xml");
        assert!(!report.ok);
        assert!(report
            .issues
            .iter()
            .any(|i| i.code == codes::MISSING_MANDATORY_ATTRIBUTE
                && i.message.contains("S21_G00_30_002")));
    }

    #[test]
    fn test_bad_nir_and_date() {
        let xml = "<DSN><S21_G00_30>\
             <S21_G00_30_001>123456789012345</S21_G00_30_001>\
             <S21_G00_30_002>Durand</S21_G00_30_002>\
             <S21_G00_30_007>31022024</S21_G00_30_007>\
             </S21_G00_30></DSN>";
        let doc = roxmltree::Document::parse(xml).unwrap();
        let report = check_document(&doc, &schema(), "dsn.xml");
        assert!(!report.ok);
        assert!(report.issues.iter().any(|i| i.code == codes::INVALID_NIR));
        assert!(report
            .issues
            .iter()
            .any(|i| i.code == codes::INVALID_DSN_DATE));
    }

    #[test]
    fn test_too_many_occurrences() {
        let nir = valid_nir();
        let xml = format!(
            "<DSN><S21_G00_30>\
             <S21_G00_30_001>{nir}</S21_G00_30_001>\
             <S21_G00_30_001>{nir}</S21_G00_30_001>\
             <S21_G00_30_002>Durand</S21_G00_30_002>\
             </S21_G00_30></DSN>"
        );
        let doc = roxmltree::Document::parse(&xml).unwrap();
        let report = check_document(&doc, &schema(), "dsn.xml");
        assert!(report
            .issues
            .iter()
            .any(|i| i.code == codes::TOO_MANY_OCCURRENCES));
    }

    #[test]
    fn test_unknown_attribute_reported() {
        let xml = "<DSN><S99_G99_99_999>x</S99_G99_99_999></DSN>";
        let doc = roxmltree::Document::parse(xml).unwrap();
        let report = check_document(&doc, &schema(), "dsn.xml");
        assert!(report
            .issues
            .iter()
            .any(|i| i.code == codes::UNKNOWN_DSN_NAME));
    }
}
