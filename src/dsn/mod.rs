//! DSN shortcut schema.
//!
//! French social-declaration (DSN) files use fully qualified element
//! names like `S21_G00_30_001`. The shortcut notation `30.001` (or
//! `30_001`) names the same element through the last two numeric
//! segments. A schema directory of XSD files is parsed once at startup
//! into an index that maps shortcuts and full names to attribute
//! metadata; queries are rewritten against that index before execution.

pub mod check;
pub mod validate;

use crate::context::DsnVersion;
use crate::errors::{codes, ArxError, ArxResult, Location};
use crate::parser::{FieldPath, Query};
use ahash::AHashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use std::sync::Arc;

/// Shortcut spelling: `30.001` or `30_001`.
pub static SHORTCUT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{2,}[._]\d{3,}$").unwrap());

/// Fully qualified attribute name: `S21_G00_30_001`.
static ATTR_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(S\d{2}_G\d{2}_(\d{2,}))_(\d{3,})$").unwrap());

/// Bloc name: `S21_G00_30`.
static BLOC_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^S\d{2}_G\d{2}_\d{2,}$").unwrap());

/// One declared DSN attribute (a leaf element of a bloc).
#[derive(Debug, Clone)]
pub struct Attribute {
    pub full_name: String,
    /// Normalized shortcut, dot-separated (`30.001`).
    pub short_id: String,
    pub bloc: String,
    pub description: String,
    pub type_name: String,
    pub mandatory: bool,
    pub min_occurs: u32,
    /// `None` means unbounded.
    pub max_occurs: Option<u32>,
    /// Schema revisions the attribute was declared in.
    pub versions: Vec<String>,
}

/// A bloc with its declared attributes in schema order.
#[derive(Debug, Clone, Default)]
pub struct Bloc {
    pub name: String,
    pub description: String,
    pub attributes: Vec<Arc<Attribute>>,
}

/// Outcome of resolving one shortcut component.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// Not a known shortcut; the component is left untouched.
    None,
    Unique(Arc<Attribute>),
    /// Several candidates, disambiguated by the preceding component.
    Preferred(Arc<Attribute>),
    /// Several candidates and no disambiguation; first one is used.
    Ambiguous(Arc<Attribute>, Vec<String>),
}

/// Immutable shortcut index, shared read-only across query workers.
#[derive(Debug, Default)]
pub struct DsnSchema {
    by_short: AHashMap<String, Vec<Arc<Attribute>>>,
    by_full: AHashMap<String, Arc<Attribute>>,
    blocs: AHashMap<String, Bloc>,
    bloc_order: Vec<String>,
    version: DsnVersion,
    files_loaded: usize,
}

impl DsnSchema {
    /// Parse every `.xsd` file of a directory into one schema.
    ///
    /// With `DsnVersion::Auto`, file names vote: names containing `P25`
    /// or `P26` decide the version, majority wins, tie goes to the
    /// newer revision. With an explicit version only matching files are
    /// loaded, unless none match, in which case all files are taken.
    pub fn load_dir(dir: &Path, requested: DsnVersion) -> ArxResult<DsnSchema> {
        let mut files: Vec<std::path::PathBuf> = std::fs::read_dir(dir)
            .map_err(|e| io_error(dir, &e))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.is_file()
                    && p.extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|e| e.eq_ignore_ascii_case("xsd"))
            })
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(ArxError::code(codes::FILE_NOT_FOUND)
                .with_detail("no .xsd files in schema directory")
                .with_location(Location::in_file(dir)));
        }

        let version = match requested {
            DsnVersion::Auto => infer_version(&files),
            explicit => explicit,
        };

        let matching: Vec<&std::path::PathBuf> = files
            .iter()
            .filter(|p| file_version(p).map_or(true, |v| v == version))
            .collect();
        let selected: Vec<&std::path::PathBuf> = if matching.is_empty() {
            files.iter().collect()
        } else {
            matching
        };

        let mut schema = DsnSchema {
            version,
            ..DsnSchema::default()
        };
        for path in selected {
            let text = std::fs::read_to_string(path).map_err(|e| io_error(path, &e))?;
            let doc = roxmltree::Document::parse(&text).map_err(|e| {
                ArxError::code(codes::XML_PARSE_FAILED)
                    .with_detail(e.to_string())
                    .with_location(Location::in_file(path))
            })?;
            let file_rev = file_version(path).unwrap_or(version);
            schema.absorb(&doc, file_rev);
            schema.files_loaded += 1;
        }
        schema.finish();
        Ok(schema)
    }

    /// Collect bloc and attribute declarations from one parsed XSD.
    fn absorb(&mut self, doc: &roxmltree::Document, revision: DsnVersion) {
        for node in doc.descendants().filter(|n| n.is_element()) {
            if node.tag_name().name() != "element" {
                continue;
            }
            let Some(name) = node.attribute("name") else {
                continue;
            };

            if BLOC_NAME_RE.is_match(name) {
                let bloc = self.blocs.entry(name.to_string()).or_insert_with(|| {
                    Bloc {
                        name: name.to_string(),
                        ..Bloc::default()
                    }
                });
                if bloc.description.is_empty() {
                    bloc.description = documentation(&node);
                }
                if !self.bloc_order.iter().any(|b| b == name) {
                    self.bloc_order.push(name.to_string());
                }
                continue;
            }

            let Some(caps) = ATTR_NAME_RE.captures(name) else {
                continue;
            };
            let bloc_name = caps.get(1).unwrap().as_str().to_string();
            let short_id = format!(
                "{}.{}",
                caps.get(2).unwrap().as_str(),
                caps.get(3).unwrap().as_str()
            );

            if let Some(existing) = self.by_full.get(name) {
                // re-declared in another revision: record the version
                let mut attr = (**existing).clone();
                let rev = revision.to_string();
                if !attr.versions.contains(&rev) {
                    attr.versions.push(rev);
                }
                let attr = Arc::new(attr);
                self.replace(attr);
                continue;
            }

            let min_occurs: u32 = node
                .attribute("minOccurs")
                .and_then(|v| v.parse().ok())
                .unwrap_or(1);
            let max_occurs = match node.attribute("maxOccurs") {
                Some("unbounded") => None,
                Some(v) => v.parse().ok(),
                None => Some(1),
            };
            let attr = Arc::new(Attribute {
                full_name: name.to_string(),
                short_id: short_id.clone(),
                bloc: bloc_name,
                description: documentation(&node),
                type_name: node
                    .attribute("type")
                    .map(|t| t.trim_start_matches("xs:").to_string())
                    .unwrap_or_else(|| "string".to_string()),
                mandatory: min_occurs > 0,
                min_occurs,
                max_occurs,
                versions: vec![revision.to_string()],
            });

            self.by_full.insert(name.to_string(), attr.clone());
            self.by_short.entry(short_id).or_default().push(attr);
        }
    }

    fn replace(&mut self, attr: Arc<Attribute>) {
        if let Some(list) = self.by_short.get_mut(&attr.short_id) {
            for slot in list.iter_mut() {
                if slot.full_name == attr.full_name {
                    *slot = attr.clone();
                }
            }
        }
        self.by_full.insert(attr.full_name.clone(), attr);
    }

    /// Attach attributes to their blocs, in full-name order.
    fn finish(&mut self) {
        let mut names: Vec<&String> = self.by_full.keys().collect();
        names.sort();
        let names: Vec<String> = names.into_iter().cloned().collect();
        for name in names {
            let attr = self.by_full[&name].clone();
            let bloc = self
                .blocs
                .entry(attr.bloc.clone())
                .or_insert_with(|| Bloc {
                    name: attr.bloc.clone(),
                    ..Bloc::default()
                });
            bloc.attributes.push(attr.clone());
            if !self.bloc_order.iter().any(|b| b == &attr.bloc) {
                self.bloc_order.push(attr.bloc.clone());
            }
        }
        for list in self.by_short.values_mut() {
            list.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        }
    }

    pub fn version(&self) -> DsnVersion {
        self.version
    }

    pub fn files_loaded(&self) -> usize {
        self.files_loaded
    }

    pub fn attribute_count(&self) -> usize {
        self.by_full.len()
    }

    pub fn full_name(&self, name: &str) -> Option<Arc<Attribute>> {
        self.by_full.get(name).cloned()
    }

    pub fn bloc(&self, name: &str) -> Option<&Bloc> {
        self.blocs.get(name)
    }

    pub fn shortcut(&self, short: &str) -> Option<&[Arc<Attribute>]> {
        let normalized = short.replace('_', ".");
        self.by_short.get(&normalized).map(|v| v.as_slice())
    }

    /// Resolve one path component against the index. `prev` is the
    /// preceding, already-resolved component: when several attributes
    /// share the shortcut, one whose full name starts with `prev` wins.
    pub fn resolve(&self, component: &str, prev: Option<&str>) -> Resolution {
        let Some(candidates) = self.shortcut(component) else {
            return Resolution::None;
        };
        match candidates {
            [] => Resolution::None,
            [single] => Resolution::Unique(single.clone()),
            many => {
                if let Some(prev) = prev {
                    if let Some(hit) = many.iter().find(|a| a.full_name.starts_with(prev)) {
                        return Resolution::Preferred(hit.clone());
                    }
                }
                Resolution::Ambiguous(
                    many[0].clone(),
                    many.iter().map(|a| a.full_name.clone()).collect(),
                )
            }
        }
    }

    /// Human-readable description of a shortcut, full name or bloc.
    pub fn describe(&self, key: &str) -> ArxResult<String> {
        if let Some(bloc) = self.bloc(key) {
            let mut out = format!("Bloc {}", bloc.name);
            if !bloc.description.is_empty() {
                out.push_str(&format!(" - {}", bloc.description));
            }
            out.push('\n');
            for attr in &bloc.attributes {
                out.push_str(&format!(
                    "  {} ({})  {}\n",
                    attr.full_name, attr.short_id, attr.description
                ));
            }
            return Ok(out);
        }
        if let Some(attr) = self.full_name(key) {
            return Ok(format_attribute(&attr));
        }
        if let Some(candidates) = self.shortcut(key) {
            let mut out = String::new();
            for attr in candidates {
                out.push_str(&format_attribute(attr));
            }
            return Ok(out);
        }
        Err(ArxError::code(codes::UNKNOWN_DSN_NAME).with_detail(key))
    }
}

fn format_attribute(attr: &Attribute) -> String {
    let occurs = match attr.max_occurs {
        Some(max) => format!("{}..{}", attr.min_occurs, max),
        None => format!("{}..*", attr.min_occurs),
    };
    format!(
        "{} ({})\n  bloc: {}\n  type: {}\n  occurs: {}{}\n  versions: {}\n{}",
        attr.full_name,
        attr.short_id,
        attr.bloc,
        attr.type_name,
        occurs,
        if attr.mandatory { ", mandatory" } else { "" },
        attr.versions.join(", "),
        if attr.description.is_empty() {
            String::new()
        } else {
            format!("  {}\n", attr.description)
        }
    )
}

/// First `xs:documentation` text under a node.
fn documentation(node: &roxmltree::Node) -> String {
    node.descendants()
        .find(|n| n.tag_name().name() == "documentation")
        .and_then(|n| n.text())
        .map(|t| t.trim().to_string())
        .unwrap_or_default()
}

fn file_version(path: &Path) -> Option<DsnVersion> {
    let name = path.file_name()?.to_str()?.to_uppercase();
    if name.contains("P26") {
        Some(DsnVersion::P26)
    } else if name.contains("P25") {
        Some(DsnVersion::P25)
    } else {
        None
    }
}

fn infer_version(files: &[std::path::PathBuf]) -> DsnVersion {
    let mut p25 = 0usize;
    let mut p26 = 0usize;
    for path in files {
        match file_version(path) {
            Some(DsnVersion::P25) => p25 += 1,
            Some(DsnVersion::P26) => p26 += 1,
            _ => {}
        }
    }
    if p25 > p26 {
        DsnVersion::P25
    } else {
        DsnVersion::P26
    }
}

fn io_error(path: &Path, err: &std::io::Error) -> ArxError {
    let code = if err.kind() == std::io::ErrorKind::PermissionDenied {
        codes::PERMISSION_DENIED
    } else {
        codes::FILE_NOT_FOUND
    };
    ArxError::code(code)
        .with_detail(err.to_string())
        .with_location(Location::in_file(path))
}

/// Rewrite every shortcut component of every field path in the query to
/// its full element name. Returns the warnings produced by ambiguous
/// shortcuts; unknown shortcuts are left as-is for the navigator to
/// report against the actual documents.
pub fn rewrite_query(query: &mut Query, schema: &DsnSchema) -> Vec<ArxError> {
    let mut warnings = Vec::new();
    query.visit_paths_mut(|path| rewrite_path(path, schema, &mut warnings));
    warnings
}

fn rewrite_path(path: &mut FieldPath, schema: &DsnSchema, warnings: &mut Vec<ArxError>) {
    let mut rewrote = false;
    for i in 0..path.components.len() {
        if !SHORTCUT_RE.is_match(&path.components[i]) {
            continue;
        }
        let prev = if i > 0 {
            Some(path.components[i - 1].clone())
        } else {
            None
        };
        match schema.resolve(&path.components[i], prev.as_deref()) {
            Resolution::None => {}
            Resolution::Unique(attr) | Resolution::Preferred(attr) => {
                path.components[i] = attr.full_name.clone();
                rewrote = true;
            }
            Resolution::Ambiguous(first, candidates) => {
                warnings.push(
                    ArxError::code(codes::AMBIGUOUS_SHORTCUT).with_detail(format!(
                        "'{}' matches {}",
                        path.components[i],
                        candidates.join(", ")
                    )),
                );
                path.components[i] = first.full_name.clone();
                rewrote = true;
            }
        }
    }

    // A DSN attribute or bloc names one element wherever it sits in the
    // document, so a lone resolved component searches the whole tree
    // instead of reading the root element only.
    if path.components.len() == 1 && path.variable.is_none() {
        let known = rewrote
            || schema.full_name(&path.components[0]).is_some()
            || schema.bloc(&path.components[0]).is_some();
        if known {
            path.is_partial = true;
        }
    }
}
