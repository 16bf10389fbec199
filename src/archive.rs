//! Line oriented archive codec.
//!
//! An archive is a single text blob holding many files. Every file starts with a header line
//! of the form `-- NAME --` and runs until the next header or the end of input:
//!
//! ```text
//! optional preamble
//! -- go.mod --
//! module example.com/example
//!
//! -- cmd/main.go --
//! package main
//! ```
//!
//! Each section is written with one extra terminating newline which decoding removes again,
//! so content without a trailing newline and zero-length content both survive a round trip.
use crate::vfs::{VirtualFile, VirtualFileSet};
use miette::Diagnostic;
use thiserror::Error;

const MARKER_START: &[u8] = b"-- ";
const MARKER_END: &[u8] = b" --";

#[derive(Debug, Error, Diagnostic)]
pub enum ArchiveError {
    #[error("malformed archive header on line {line}: file name is empty")]
    #[diagnostic(code(skelgen::archive::empty_name))]
    EmptyName { line: usize },

    #[error("malformed archive header on line {line}: file name is not valid UTF-8")]
    #[diagnostic(code(skelgen::archive::non_utf8_name))]
    NonUtf8Name { line: usize },

    #[error("file name cannot be stored in an archive header: {name:?}")]
    #[diagnostic(
        code(skelgen::archive::invalid_name),
        help("Names must be non-empty, single line and without surrounding whitespace")
    )]
    InvalidName { name: String },

    #[error("content of '{name}' contains an archive header on line {line}")]
    #[diagnostic(
        code(skelgen::archive::marker_in_content),
        help("Lines shaped like '-- name --' would split the file when decoded")
    )]
    MarkerInContent { name: String, line: usize },

    #[error("archive contains '{name}' more than once")]
    #[diagnostic(
        code(skelgen::archive::duplicate_name),
        help("Check that templated file names render to distinct paths")
    )]
    DuplicateName { name: String },
}

/// A decoded archive: the text before the first header plus the files that follow it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Archive {
    pub preamble: Vec<u8>,
    pub files: VirtualFileSet,
}
impl Archive {
    pub fn new(files: VirtualFileSet) -> Self {
        Self {
            preamble: Vec::new(),
            files,
        }
    }

    /// Serializes the archive. Output is deterministic and keeps file order.
    pub fn encode(&self) -> Result<Vec<u8>, ArchiveError> {
        let mut out = Vec::new();

        if !self.preamble.is_empty() {
            check_content("preamble", &self.preamble)?;
            out.extend_from_slice(&self.preamble);
            out.push(b'\n');
        }

        for file in &self.files {
            check_name(&file.name)?;
            check_content(&file.name, &file.content)?;

            out.extend_from_slice(MARKER_START);
            out.extend_from_slice(file.name.as_bytes());
            out.extend_from_slice(MARKER_END);
            out.push(b'\n');
            out.extend_from_slice(&file.content);
            out.push(b'\n');
        }

        Ok(out)
    }

    /// Parses archive text. Duplicate names are kept as separate entries.
    pub fn decode(data: &[u8]) -> Result<Self, ArchiveError> {
        let mut preamble = Vec::new();
        let mut files = VirtualFileSet::new();
        let mut current: Option<VirtualFile> = None;

        for (index, line) in data.split_inclusive(|byte| *byte == b'\n').enumerate() {
            if let Some(name) = parse_header(line, index + 1)? {
                if let Some(mut file) = current.take() {
                    strip_terminator(&mut file.content);
                    files.push(file);
                }
                current = Some(VirtualFile::new(name, Vec::new()));
                continue;
            }

            match current.as_mut() {
                Some(file) => file.content.extend_from_slice(line),
                None => preamble.extend_from_slice(line),
            }
        }

        if let Some(mut file) = current.take() {
            strip_terminator(&mut file.content);
            files.push(file);
        }
        strip_terminator(&mut preamble);

        Ok(Self { preamble, files })
    }
}

/// Encodes `files` into archive text without a preamble.
pub fn encode(files: &VirtualFileSet) -> Result<Vec<u8>, ArchiveError> {
    Archive::new(files.clone()).encode()
}

/// Decodes archive text into its files, discarding any preamble.
pub fn decode(data: &[u8]) -> Result<VirtualFileSet, ArchiveError> {
    Archive::decode(data).map(|archive| archive.files)
}

fn line_body(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn is_marker(line: &[u8]) -> bool {
    let body = line_body(line);

    body.len() >= MARKER_START.len() + MARKER_END.len()
        && body.starts_with(MARKER_START)
        && body.ends_with(MARKER_END)
}

fn parse_header(line: &[u8], number: usize) -> Result<Option<String>, ArchiveError> {
    if !is_marker(line) {
        return Ok(None);
    }

    let body = line_body(line);
    let raw = &body[MARKER_START.len()..body.len() - MARKER_END.len()];
    let name = std::str::from_utf8(raw)
        .map_err(|_| ArchiveError::NonUtf8Name { line: number })?
        .trim();

    if name.is_empty() {
        return Err(ArchiveError::EmptyName { line: number });
    }

    Ok(Some(name.to_string()))
}

fn check_name(name: &str) -> Result<(), ArchiveError> {
    if name.is_empty() || name.trim() != name || name.contains(['\n', '\r']) {
        return Err(ArchiveError::InvalidName {
            name: name.to_string(),
        });
    }

    Ok(())
}

fn check_content(name: &str, content: &[u8]) -> Result<(), ArchiveError> {
    match content
        .split_inclusive(|byte| *byte == b'\n')
        .position(is_marker)
    {
        Some(index) => Err(ArchiveError::MarkerInContent {
            name: name.to_string(),
            line: index + 1,
        }),
        None => Ok(()),
    }
}

fn strip_terminator(content: &mut Vec<u8>) {
    if content.last() == Some(&b'\n') {
        content.pop();
    }
}
