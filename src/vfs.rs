use crate::errors::{FileOperation, IoError};
use miette::Diagnostic;
use std::{
    collections::HashSet,
    path::{Component, Path, PathBuf},
};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error, Diagnostic)]
pub enum VfsError {
    #[error("I/O error while loading a template tree")]
    #[diagnostic(code(skelgen::vfs::io))]
    Io(#[from] IoError),

    #[error("path is not valid UTF-8: {path}")]
    #[diagnostic(
        code(skelgen::vfs::non_utf8_path),
        help("Template file names must be valid UTF-8")
    )]
    NonUtf8Path { path: PathBuf },

    #[error("invalid sub-tree prefix: '{prefix}'")]
    #[diagnostic(
        code(skelgen::vfs::invalid_prefix),
        help("Use a relative, slash separated path without '.' or '..' segments")
    )]
    InvalidPrefix { prefix: String },

    #[error("no template files found under '{prefix}'")]
    #[diagnostic(
        code(skelgen::vfs::prefix_not_found),
        help("Check the template `path` in skelgen.toml")
    )]
    PrefixNotFound { prefix: String },
}

/// A single file held in memory: a slash separated relative path and its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualFile {
    pub name: String,
    pub content: Vec<u8>,
}
impl VirtualFile {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// An ordered collection of [`VirtualFile`] values, staged before anything touches the disk.
///
/// Insertion order is preserved. Directories are never stored; they are implied by the
/// separators in each file name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VirtualFileSet {
    files: Vec<VirtualFile>,
}
impl VirtualFileSet {
    pub fn new() -> Self {
        Self { files: Vec::new() }
    }

    pub fn push(&mut self, file: VirtualFile) {
        self.files.push(file);
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, VirtualFile> {
        self.files.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, VirtualFile> {
        self.files.iter_mut()
    }

    /// Returns the first file registered under `name`.
    pub fn get(&self, name: &str) -> Option<&VirtualFile> {
        self.files.iter().find(|file| file.name == name)
    }

    /// Returns the first name that occurs more than once, if any.
    pub fn first_duplicate(&self) -> Option<&str> {
        let mut seen = HashSet::new();

        self.files
            .iter()
            .map(|file| file.name.as_str())
            .find(|name| !seen.insert(*name))
    }

    /// Loads every regular file below `root` into a set, skipping `.git` directories.
    /// Entries are visited in file-name order so the result is deterministic across platforms.
    pub fn from_dir(root: &Path) -> Result<Self, VfsError> {
        let mut set = Self::new();

        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || entry.file_name() != ".git");

        for entry in walker {
            let entry = entry.map_err(|error| {
                let path = error.path().unwrap_or(root).to_path_buf();

                IoError::new(FileOperation::Read, path, error.into())
            })?;

            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let relative = path.strip_prefix(root).unwrap_or(path);
            let name = slash_path(relative)?;

            let content = std::fs::read(path)
                .map_err(|error| IoError::new(FileOperation::Read, path.to_path_buf(), error))?;

            set.push(VirtualFile { name, content });
        }

        log::debug!("loaded {} template files from {}", set.len(), root.display());

        Ok(set)
    }

    /// Returns the sub-tree rooted at `prefix`, with that prefix removed from every name.
    /// A prefix of `.` returns the whole set. A prefix with no files below it is an error.
    pub fn sub(&self, prefix: &str) -> Result<Self, VfsError> {
        if prefix == "." {
            return Ok(self.clone());
        }

        if !is_valid_entry_path(prefix) {
            return Err(VfsError::InvalidPrefix {
                prefix: prefix.to_string(),
            });
        }

        let dir = format!("{prefix}/");

        let sub: Self = self
            .files
            .iter()
            .filter_map(|file| {
                file.name
                    .strip_prefix(&dir)
                    .map(|rest| VirtualFile::new(rest, file.content.clone()))
            })
            .collect();

        if sub.is_empty() {
            return Err(VfsError::PrefixNotFound {
                prefix: prefix.to_string(),
            });
        }

        Ok(sub)
    }
}
impl FromIterator<VirtualFile> for VirtualFileSet {
    fn from_iter<T: IntoIterator<Item = VirtualFile>>(iter: T) -> Self {
        Self {
            files: iter.into_iter().collect(),
        }
    }
}
impl IntoIterator for VirtualFileSet {
    type Item = VirtualFile;
    type IntoIter = std::vec::IntoIter<VirtualFile>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.into_iter()
    }
}
impl<'a> IntoIterator for &'a VirtualFileSet {
    type Item = &'a VirtualFile;
    type IntoIter = std::slice::Iter<'a, VirtualFile>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.iter()
    }
}

/// Reports whether `name` is a clean relative slash path: non-empty, no leading or
/// trailing slash, no empty, `.` or `..` segments and no backslashes.
pub fn is_valid_entry_path(name: &str) -> bool {
    !name.is_empty()
        && !name.contains('\\')
        && name
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..")
}

fn slash_path(relative: &Path) -> Result<String, VfsError> {
    let mut segments = Vec::new();

    for component in relative.components() {
        match component {
            Component::Normal(segment) => {
                let segment = segment.to_str().ok_or_else(|| VfsError::NonUtf8Path {
                    path: relative.to_path_buf(),
                })?;
                segments.push(segment);
            }
            Component::CurDir => {}
            _ => {
                return Err(VfsError::NonUtf8Path {
                    path: relative.to_path_buf(),
                })
            }
        }
    }

    Ok(segments.join("/"))
}
