//! Writes a [`VirtualFileSet`] into a real directory.
//!
//! Conflicts with files that already exist are settled by one [`OverwritePolicy`] per call.
//! When no policy is configured and the target directory already has entries, the operator
//! is asked to pick one; `Confirm` additionally asks before each conflicting file.
//!
//! `Cancel` and `NewOnly` behave the same once writing starts: existing files are left alone
//! and everything else is created. They differ only in how the policy was reached and in the
//! wording shown to the operator.
use crate::{
    errors::{FileOperation, IoError},
    prompt::{Prompt, PromptError},
    vfs::{is_valid_entry_path, VirtualFileSet},
};
use miette::Diagnostic;
use serde::Deserialize;
use std::{
    fmt, fs,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    str::FromStr,
};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum MaterializeError {
    #[error("I/O error while writing files")]
    #[diagnostic(code(skelgen::materialize::io))]
    Io(#[from] IoError),

    #[error("prompt failed")]
    #[diagnostic(code(skelgen::materialize::prompt))]
    Prompt(#[from] PromptError),

    #[error("refusing to write entry with unsafe path: {name:?}")]
    #[diagnostic(
        code(skelgen::materialize::invalid_path),
        help("Entry names must be relative and must not contain '.' or '..' segments")
    )]
    InvalidPath { name: String },
}

/// How to treat files that already exist in the target directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverwritePolicy {
    /// Ask the operator, if there is anything to conflict with.
    #[default]
    Unset,
    /// Keep existing files. Chosen automatically for a missing or empty target.
    Cancel,
    /// Remove everything under the target before writing.
    #[serde(alias = "force")]
    ForceOverwrite,
    /// Ask before overwriting each existing file.
    Confirm,
    /// Only create files that do not exist yet.
    NewOnly,
}
impl OverwritePolicy {
    fn as_str(&self) -> &str {
        match self {
            Self::Unset => "unset",
            Self::Cancel => "cancel",
            Self::ForceOverwrite => "force",
            Self::Confirm => "confirm",
            Self::NewOnly => "new-only",
        }
    }
}
impl fmt::Display for OverwritePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
impl FromStr for OverwritePolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "unset" => Ok(Self::Unset),
            "cancel" => Ok(Self::Cancel),
            "force" | "force-overwrite" => Ok(Self::ForceOverwrite),
            "confirm" => Ok(Self::Confirm),
            "new-only" | "newonly" => Ok(Self::NewOnly),
            other => Err(format!(
                "unknown overwrite policy '{other}' (expected cancel, force, confirm or new-only)"
            )),
        }
    }
}

const POLICY_CHOICES: [(OverwritePolicy, &str); 4] = [
    (OverwritePolicy::Cancel, "No (Exit)"),
    (
        OverwritePolicy::ForceOverwrite,
        "Remove and create new directory",
    ),
    (
        OverwritePolicy::Confirm,
        "Overwrite existing files with confirmation",
    ),
    (OverwritePolicy::NewOnly, "Create new files only"),
];

/// Options for one [`create_dir`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CreatorConfig {
    pub write_empty: bool,
    pub policy: OverwritePolicy,
}
impl CreatorConfig {
    pub fn with_empty(mut self, write_empty: bool) -> Self {
        self.write_empty = write_empty;
        self
    }

    pub fn with_policy(mut self, policy: OverwritePolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// What a [`create_dir`] call did, path by path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateReport {
    pub policy: OverwritePolicy,
    pub created: Vec<PathBuf>,
    pub overwritten: Vec<PathBuf>,
    pub kept: Vec<PathBuf>,
    pub skipped_empty: Vec<PathBuf>,
}

enum Outcome {
    Created,
    Overwritten,
    Kept,
}

// Where the bytes of one file go: a real file, or nowhere when an existing file is kept.
enum Sink {
    File {
        writer: BufWriter<fs::File>,
        existed: bool,
    },
    Discard,
}
impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Sink::File { writer, .. } => writer.write(buf),
            Sink::Discard => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::File { writer, .. } => writer.flush(),
            Sink::Discard => Ok(()),
        }
    }
}
impl Sink {
    /// Flushes and syncs the file so deferred write errors surface here.
    fn close(self) -> io::Result<Outcome> {
        match self {
            Sink::File { writer, existed } => {
                let file = writer.into_inner().map_err(|error| error.into_error())?;
                file.sync_all()?;

                Ok(if existed {
                    Outcome::Overwritten
                } else {
                    Outcome::Created
                })
            }
            Sink::Discard => Ok(Outcome::Kept),
        }
    }
}

/// Creates the files of `files` below `root`, settling conflicts according to `config`.
///
/// Writes happen in set order. The first error stops the walk; files already written stay
/// on disk.
///
/// # Errors
///
/// Returns a [`MaterializeError`] if:
///
/// - An entry name is not a clean relative path (checked before anything is written).
/// - The operator gives an answer that cannot be parsed.
/// - A directory cannot be read, created or cleared, or a file cannot be written.
pub fn create_dir(
    prompt: &mut dyn Prompt,
    root: &Path,
    files: &VirtualFileSet,
    config: CreatorConfig,
) -> Result<CreateReport, MaterializeError> {
    if let Some(file) = files.iter().find(|file| !is_valid_entry_path(&file.name)) {
        return Err(MaterializeError::InvalidPath {
            name: file.name.clone(),
        });
    }

    let policy = resolve_policy(prompt, root, config.policy)?;
    log::debug!("overwrite policy for {}: {}", root.display(), policy);

    if policy == OverwritePolicy::ForceOverwrite {
        clear_dir(root)?;
    }

    let mut report = CreateReport {
        policy,
        ..CreateReport::default()
    };

    for file in files {
        let destination = file
            .name
            .split('/')
            .fold(root.to_path_buf(), |path, segment| path.join(segment));

        if file.is_empty() && !config.write_empty {
            log::debug!("skipping empty file {}", destination.display());
            report.skipped_empty.push(destination);
            continue;
        }

        if let Some(parent) = destination.parent() {
            create_directory(parent)?;
        }

        let mut sink = open_destination(prompt, &destination, policy)?;

        sink.write_all(&file.content)
            .map_err(|error| IoError::new(FileOperation::Write, destination.clone(), error))?;

        let outcome = sink
            .close()
            .map_err(|error| IoError::new(FileOperation::Write, destination.clone(), error))?;

        match outcome {
            Outcome::Created => {
                log::info!("create {}", destination.display());
                report.created.push(destination);
            }
            Outcome::Overwritten => {
                log::info!("overwrite {}", destination.display());
                report.overwritten.push(destination);
            }
            Outcome::Kept => {
                log::info!("keep {}", destination.display());
                report.kept.push(destination);
            }
        }
    }

    Ok(report)
}

/// Turns the configured policy into a concrete one, asking the operator only when the policy
/// is [`OverwritePolicy::Unset`] and `root` already has entries.
pub fn resolve_policy(
    prompt: &mut dyn Prompt,
    root: &Path,
    configured: OverwritePolicy,
) -> Result<OverwritePolicy, MaterializeError> {
    if configured != OverwritePolicy::Unset {
        return Ok(configured);
    }

    if !has_entries(root)? {
        return Ok(OverwritePolicy::Cancel);
    }

    let description = format!("{} already exists, overwrite?", root.display());
    let labels: Vec<&str> = POLICY_CHOICES.iter().map(|(_, label)| *label).collect();

    let index = prompt.choose(&description, &labels, ">")?;

    POLICY_CHOICES
        .get(index)
        .map(|(policy, _)| *policy)
        .ok_or_else(|| {
            PromptError::InvalidChoice {
                input: (index + 1).to_string(),
                max: POLICY_CHOICES.len(),
            }
            .into()
        })
}

fn has_entries(dir: &Path) -> Result<bool, MaterializeError> {
    let mut entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(error) => Err(IoError::new(FileOperation::ReadDir, dir.to_path_buf(), error))?,
    };

    match entries.next() {
        None => Ok(false),
        Some(Ok(_)) => Ok(true),
        Some(Err(error)) => {
            Err(IoError::new(FileOperation::ReadDir, dir.to_path_buf(), error).into())
        }
    }
}

/// Removes every entry directly under `dir`, keeping `dir` itself.
fn clear_dir(dir: &Path) -> Result<(), MaterializeError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(error) => Err(IoError::new(FileOperation::ReadDir, dir.to_path_buf(), error))?,
    };

    for entry in entries {
        let entry =
            entry.map_err(|error| IoError::new(FileOperation::ReadDir, dir.to_path_buf(), error))?;
        let path = entry.path();

        let file_type = entry
            .file_type()
            .map_err(|error| IoError::new(FileOperation::Stat, path.clone(), error))?;

        let removed = if file_type.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        removed.map_err(|error| IoError::new(FileOperation::Remove, path.clone(), error))?;

        log::debug!("removed {}", path.display());
    }

    Ok(())
}

fn create_directory(path: &Path) -> Result<(), MaterializeError> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }

    builder
        .create(path)
        .map_err(|error| IoError::new(FileOperation::Mkdir, path.to_path_buf(), error))?;

    Ok(())
}

fn path_exists(path: &Path) -> Result<bool, MaterializeError> {
    match fs::symlink_metadata(path) {
        Ok(_) => Ok(true),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(error) => Err(IoError::new(FileOperation::Stat, path.to_path_buf(), error).into()),
    }
}

/// Applies the per-file conflict rule and returns where the file's bytes should go.
fn open_destination(
    prompt: &mut dyn Prompt,
    path: &Path,
    policy: OverwritePolicy,
) -> Result<Sink, MaterializeError> {
    let existed = path_exists(path)?;

    if existed {
        if policy != OverwritePolicy::Confirm {
            return Ok(Sink::Discard);
        }

        let description = format!("{} already exists, overwrite?", path.display());
        if !prompt.yes_no(&description, false, ">")? {
            return Ok(Sink::Discard);
        }
    }

    let file = fs::File::create(path)
        .map_err(|error| IoError::new(FileOperation::Create, path.to_path_buf(), error))?;

    Ok(Sink::File {
        writer: BufWriter::new(file),
        existed,
    })
}
