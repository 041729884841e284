//! FROM-path discovery and document loading.
//!
//! The FROM target may be a single file, a directory (immediate `.xml`
//! entries, sorted by name) or a glob pattern. Compressed documents are
//! accepted wherever a file is read; the format is detected from the
//! extension and the payload decompressed to a string before DOM
//! parsing.

use crate::errors::{codes, ArxError, ArxResult, Location};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Compression format detected from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Bzip2,
    Xz,
    Zstd,
}

impl Compression {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("gz" | "gzip") => Compression::Gzip,
            Some("bz2" | "bzip2") => Compression::Bzip2,
            Some("xz" | "lzma") => Compression::Xz,
            Some("zst" | "zstd") => Compression::Zstd,
            _ => Compression::None,
        }
    }

    /// Wrap a reader with the appropriate decompressor.
    pub fn wrap_reader<'a>(&self, reader: Box<dyn Read + 'a>) -> std::io::Result<Box<dyn Read + 'a>> {
        Ok(match self {
            Compression::None => reader,
            Compression::Gzip => Box::new(flate2::read::GzDecoder::new(reader)),
            Compression::Bzip2 => Box::new(bzip2::read::BzDecoder::new(reader)),
            Compression::Xz => Box::new(xz2::read::XzDecoder::new(reader)),
            Compression::Zstd => Box::new(zstd::stream::read::Decoder::new(reader)?),
        })
    }
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Compression::None => write!(f, "none"),
            Compression::Gzip => write!(f, "gzip"),
            Compression::Bzip2 => write!(f, "bzip2"),
            Compression::Xz => write!(f, "xz"),
            Compression::Zstd => write!(f, "zstd"),
        }
    }
}

/// True for `name.xml` plus compressed variants, case-insensitive.
pub fn is_xml_candidate(name: &str) -> bool {
    let lower = name.to_lowercase();
    if lower.ends_with(".xml") {
        return true;
    }
    for ext in [".gz", ".bz2", ".xz", ".zst"] {
        if let Some(stripped) = lower.strip_suffix(ext) {
            return stripped.ends_with(".xml");
        }
    }
    false
}

fn is_glob_pattern(path: &str) -> bool {
    path.contains('*') || path.contains('?') || path.contains('[')
}

/// Expand the FROM path into the ordered list of files to process.
pub fn discover_files(from_path: &str) -> ArxResult<Vec<PathBuf>> {
    if is_glob_pattern(from_path) {
        let mut files: Vec<PathBuf> = glob::glob(from_path)
            .map_err(|e| {
                ArxError::code(codes::FILE_NOT_FOUND)
                    .with_detail(format!("invalid pattern: {e}"))
                    .with_location(Location::in_file(from_path))
            })?
            .filter_map(|entry| entry.ok())
            .filter(|p| p.is_file())
            .collect();
        if files.is_empty() {
            return Err(ArxError::code(codes::FILE_NOT_FOUND)
                .with_detail("no files match pattern")
                .with_location(Location::in_file(from_path)));
        }
        files.sort();
        return Ok(files);
    }

    let path = Path::new(from_path);
    let meta = std::fs::metadata(path).map_err(|e| io_error(path, &e))?;

    if meta.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(path)
        .map_err(|e| io_error(path, &e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(is_xml_candidate)
        })
        .collect();

    if files.is_empty() {
        return Err(ArxError::code(codes::NO_XML_FILES).with_location(Location::in_file(path)));
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Read a document into a string, decompressing if needed, and reject
/// payloads that cannot be XML before handing them to the DOM parser.
pub fn read_document_text(path: &Path) -> ArxResult<String> {
    let file = File::open(path).map_err(|e| io_error(path, &e))?;
    let mut reader = Compression::from_path(path)
        .wrap_reader(Box::new(file))
        .map_err(|e| io_error(path, &e))?;

    let mut text = String::new();
    reader
        .read_to_string(&mut text)
        .map_err(|e| io_error(path, &e))?;

    match text.trim_start().chars().next() {
        Some('<') => Ok(text),
        _ => Err(ArxError::code(codes::XML_PARSE_FAILED)
            .with_detail("first non-whitespace character is not '<'")
            .with_location(Location::in_file(path))),
    }
}

fn io_error(path: &Path, err: &std::io::Error) -> ArxError {
    let code = match err.kind() {
        std::io::ErrorKind::NotFound => codes::FILE_NOT_FOUND,
        std::io::ErrorKind::PermissionDenied => codes::PERMISSION_DENIED,
        std::io::ErrorKind::InvalidData => codes::XML_PARSE_FAILED,
        _ => codes::FILE_READ_FAILED,
    };
    let mut error = ArxError::code(code).with_location(Location::in_file(path));
    if code == codes::FILE_READ_FAILED || code == codes::XML_PARSE_FAILED {
        error = error.with_detail(err.to_string());
    }
    error
}
