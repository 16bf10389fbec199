use crate::{
    errors::{FileFormat, FileOperation, IoError, ParseError},
    materialize::OverwritePolicy,
    prompt::Question,
};
use indexmap::IndexMap;
use miette::Diagnostic;
use serde::Deserialize;
use std::{fs, path::Path};
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = "skelgen.toml";

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unable to read template configuration")]
    #[diagnostic(code(skelgen::config::io))]
    Io(#[from] IoError),

    #[error("unable to parse template configuration")]
    #[diagnostic(code(skelgen::config::parse))]
    Parse(#[from] ParseError),
}

/// External command used to format rendered files with a given extension.
#[derive(Debug, Clone, Deserialize)]
pub struct FormatConfig {
    pub extension: String,
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TemplateEntry {
    pub path: String,
    pub description: Option<String>,
    pub delims: Option<(String, String)>,
    #[serde(default)]
    pub policy: OverwritePolicy,
    #[serde(default)]
    pub write_empty: bool,
    pub format: Option<FormatConfig>,
    #[serde(default)]
    pub questions: IndexMap<String, Question>,
}

/// The `skelgen.toml` file at the root of a template source.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub templates: IndexMap<String, TemplateEntry>,
}
impl SourceConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        let content = fs::read_to_string(path)
            .map_err(|error| IoError::new(FileOperation::Read, path.to_path_buf(), error))?;

        let parsed = toml::from_str(&content)
            .map_err(|error| ParseError::new(FileFormat::Toml, path.to_path_buf(), error))?;

        Ok(parsed)
    }
}
