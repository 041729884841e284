//! Document statistics.
//!
//! Walks XML files and reports structural numbers (element counts,
//! depth, attribute counts, distinct element names) so users can see
//! what a file or directory contains before writing queries against it.

use crate::errors::{codes, ArxError, ArxResult, Location};
use crate::executor::discover;
use ahash::AHashMap;
use schemars::JsonSchema;
use serde::Serialize;
use std::path::Path;

/// Structural statistics for one document.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct FileStats {
    pub file: String,
    pub size_bytes: u64,
    pub root_element: String,
    pub elements: usize,
    pub attributes: usize,
    pub text_nodes: usize,
    pub max_depth: usize,
    pub distinct_elements: usize,
}

/// Per-element occurrence counts for one document, in descending order.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ElementCount {
    pub name: String,
    pub count: usize,
}

/// Full analysis of one document.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct FileAnalysis {
    #[serde(flatten)]
    pub stats: FileStats,
    pub top_elements: Vec<ElementCount>,
}

/// How many element names the per-file ranking keeps.
const TOP_ELEMENTS: usize = 10;

/// Analyze one document.
pub fn analyze_file(path: &Path) -> ArxResult<FileAnalysis> {
    let text = discover::read_document_text(path)?;
    let doc = roxmltree::Document::parse(&text).map_err(|e| {
        ArxError::code(codes::XML_PARSE_FAILED)
            .with_detail(e.to_string())
            .with_location(Location::in_file(path))
    })?;

    let mut elements = 0usize;
    let mut attributes = 0usize;
    let mut text_nodes = 0usize;
    let mut max_depth = 0usize;
    let mut counts: AHashMap<String, usize> = AHashMap::new();

    for node in doc.descendants() {
        if node.is_element() {
            elements += 1;
            attributes += node.attributes().count();
            *counts.entry(node.tag_name().name().to_string()).or_default() += 1;
            let depth = node.ancestors().filter(|a| a.is_element()).count();
            max_depth = max_depth.max(depth);
        } else if node.is_text() && node.text().is_some_and(|t| !t.trim().is_empty()) {
            text_nodes += 1;
        }
    }

    let distinct_elements = counts.len();
    let mut top: Vec<ElementCount> = counts
        .into_iter()
        .map(|(name, count)| ElementCount { name, count })
        .collect();
    top.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    top.truncate(TOP_ELEMENTS);

    Ok(FileAnalysis {
        stats: FileStats {
            file: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            size_bytes: std::fs::metadata(path).map(|m| m.len()).unwrap_or(0),
            root_element: doc.root_element().tag_name().name().to_string(),
            elements,
            attributes,
            text_nodes,
            max_depth,
            distinct_elements,
        },
        top_elements: top,
    })
}

/// Analyze a file, directory or glob pattern. Unreadable files are
/// reported as warnings; the run fails only when nothing was analyzed.
pub fn analyze_path(from: &str) -> ArxResult<(Vec<FileAnalysis>, Vec<ArxError>)> {
    let files = discover::discover_files(from)?;
    let mut analyses = Vec::with_capacity(files.len());
    let mut warnings = Vec::new();

    for path in &files {
        match analyze_file(path) {
            Ok(analysis) => analyses.push(analysis),
            Err(err) => warnings.push(err),
        }
    }

    if analyses.is_empty() {
        if warnings.len() == 1 {
            return Err(warnings.pop().unwrap());
        }
        return Err(ArxError::code(codes::ALL_FILES_FAILED)
            .with_detail(format!("{} file(s)", warnings.len())));
    }
    Ok((analyses, warnings))
}
