use crate::{
    config::{ConfigError, SourceConfig, TemplateEntry, CONFIG_FILE_NAME},
    errors::{FileOperation, IoError},
    utils::normalize_prefix,
    vfs::{VfsError, VirtualFileSet},
};
use git2::Repository;
use miette::Diagnostic;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum SourceError {
    #[error("I/O error within source domain")]
    #[diagnostic(code(skelgen::source::io))]
    Io(#[from] IoError),

    #[error("invalid template source configuration")]
    #[diagnostic(code(skelgen::source::config))]
    Config(#[from] ConfigError),

    #[error("unable to load template files")]
    #[diagnostic(code(skelgen::source::files))]
    Files(#[from] VfsError),

    #[error("unable to clone repo at: '{url}': {source}")]
    #[diagnostic(
        code(skelgen::source::git_clone),
        help("Make sure that username and project name are correct")
    )]
    GitClone {
        url: String,
        path: PathBuf,
        source: git2::Error,
    },

    #[error("invalid git prefix provided: {url}")]
    #[diagnostic(
        code(skelgen::source::invalid_git_prefix),
        help("Valid git prefix are: ['gh', 'gl', 'git@', 'git+https']")
    )]
    InvalidGitPrefix { url: String },

    #[error("template not found with name: {name}")]
    #[diagnostic(
        code(skelgen::source::template_not_found),
        help("Available templates: {available}")
    )]
    TemplateNotFound { name: String, available: String },
}

/// A template source: a directory holding `skelgen.toml` and the template trees it lists.
#[derive(Debug)]
pub struct Source {
    pub config: SourceConfig,
    pub source_dir: PathBuf,
    // Keeps a cloned checkout alive for as long as the source is in use.
    _checkout: Option<TempDir>,
}
impl Source {
    fn is_git(source: &str) -> bool {
        lazy_static::lazy_static! {
            static ref GIT_URL_REGEX: regex::Regex = regex::Regex::new(
                r"(?x)        # Enable extended mode
                ^(?:
                    # 1) gh:account/repo
                    gh:[^/]+/[^/]+
                    |
                    # 2) gl:account/repo
                    gl:[^/]+/[^/]+
                    |
                    # 3) git@host:account/repo.git
                    git@[A-Za-z0-9._-]+:[^/]+/[^/]+\.git
                    |
                    # 4) git+http(s)://...
                    git\+https?://.*
                )$"
            ).expect("a valid regex pattern");
        }

        GIT_URL_REGEX.is_match(source)
    }

    fn expand_git_url(url: &str) -> Result<String, SourceError> {
        if let Some(stripped) = url.strip_prefix("gh:") {
            Ok(format!("https://github.com/{}.git", stripped))
        } else if let Some(stripped) = url.strip_prefix("gl:") {
            Ok(format!("https://gitlab.com/{}.git", stripped))
        } else if let Some(stripped) = url.strip_prefix("git+") {
            Ok(stripped.to_string())
        } else if url.starts_with("git@") {
            Ok(url.to_string())
        } else {
            Err(SourceError::InvalidGitPrefix {
                url: url.to_string(),
            })
        }
    }

    /// Opens a local directory, or clones a git reference into a temporary directory.
    pub fn build_from(source: &str) -> Result<Self, SourceError> {
        let (source_dir, checkout) = if Source::is_git(source) {
            let directory = tempfile::tempdir()
                .map_err(|error| IoError::new(FileOperation::Mkdir, PathBuf::new(), error))?;

            let expanded_url = Source::expand_git_url(source)?;

            log::debug!(
                "cloning {} into {}",
                expanded_url,
                directory.path().display()
            );

            Repository::clone(&expanded_url, directory.path()).map_err(|err| {
                SourceError::GitClone {
                    url: expanded_url.clone(),
                    path: directory.path().to_path_buf(),
                    source: err,
                }
            })?;

            (directory.path().to_path_buf(), Some(directory))
        } else {
            (PathBuf::from(source), None)
        };

        let config = SourceConfig::from_file(source_dir.join(CONFIG_FILE_NAME))?;

        Ok(Source {
            config,
            source_dir,
            _checkout: checkout,
        })
    }

    pub fn template(&self, name: &str) -> Result<&TemplateEntry, SourceError> {
        self.config
            .templates
            .get(name)
            .ok_or_else(|| SourceError::TemplateNotFound {
                name: name.to_string(),
                available: self
                    .config
                    .templates
                    .keys()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    /// Loads every file of the source except its configuration file.
    /// Use [`Source::prefix_of`] to select one template.
    pub fn files(&self) -> Result<VirtualFileSet, SourceError> {
        Ok(VirtualFileSet::from_dir(&self.source_dir)?
            .into_iter()
            .filter(|file| file.name != CONFIG_FILE_NAME)
            .collect())
    }

    /// The slash separated prefix of `entry` inside the source tree.
    pub fn prefix_of(entry: &TemplateEntry) -> String {
        normalize_prefix(&entry.path)
    }

    pub fn path(&self) -> &Path {
        &self.source_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_git_references() {
        assert!(Source::is_git("gh:owner/repo"));
        assert!(Source::is_git("gl:owner/repo"));
        assert!(Source::is_git("git@github.com:owner/repo.git"));
        assert!(Source::is_git("git+https://example.com/repo.git"));
        assert!(!Source::is_git("./templates"));
        assert!(!Source::is_git("/abs/templates"));
    }

    #[test]
    fn expands_git_references() {
        assert_eq!(
            Source::expand_git_url("gh:owner/repo").unwrap(),
            "https://github.com/owner/repo.git"
        );
        assert_eq!(
            Source::expand_git_url("gl:owner/repo").unwrap(),
            "https://gitlab.com/owner/repo.git"
        );
        assert_eq!(
            Source::expand_git_url("git+https://example.com/r.git").unwrap(),
            "https://example.com/r.git"
        );
        assert!(Source::expand_git_url("svn:owner/repo").is_err());
    }

    #[test]
    fn local_source_lists_templates() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[templates.cli]\npath = \"./templates/cli/\"\n",
        )
        .unwrap();

        let source = Source::build_from(dir.path().to_str().unwrap()).unwrap();

        std::fs::create_dir_all(dir.path().join("templates/cli")).unwrap();
        std::fs::write(dir.path().join("templates/cli/main.go"), "package main\n").unwrap();

        let entry = source.template("cli").unwrap();
        assert_eq!(Source::prefix_of(entry), "templates/cli");
        assert!(matches!(
            source.template("web"),
            Err(SourceError::TemplateNotFound { .. })
        ));

        let names: Vec<_> = source
            .files()
            .unwrap()
            .into_iter()
            .map(|file| file.name)
            .collect();
        assert_eq!(names, vec!["templates/cli/main.go"]);
    }

    #[test]
    fn missing_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();

        assert!(matches!(
            Source::build_from(dir.path().to_str().unwrap()),
            Err(SourceError::Config(ConfigError::Io(_)))
        ));
    }
}
