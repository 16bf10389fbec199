//! Whole-tree template rendering.
//!
//! The raw template files are packed into one archive, the archive is rendered once with
//! [`tera`], and the result is unpacked again into a [`VirtualFileSet`]. Because file names
//! travel inside the archive headers they are rendered too, so a file called
//! `cmd/@@ name @@/main.go` ends up under the rendered directory name.
//!
//! Actions use a configurable delimiter pair (`@@` by default) so the files' own `{{ }}`
//! syntax passes through untouched:
//!
//! ```text
//! @@ name @@                      -> value
//! @@ if with_tests @@ ... @@ endif @@
//! @@ gomodinit(path=module_path) @@
//! @@# a comment #@@
//! a @@- if x -@@ b @@- endif @@   -> whitespace around the action is trimmed
//! ```
//!
//! A trim marker on the first or last action of a file can reach into the archive header
//! around it, which then fails to decode.
use crate::{
    archive::{self, ArchiveError},
    modfile::{self, GoToolchain, Toolchain},
    postprocess::{PostProcessError, PostProcessor},
    vfs::{VfsError, VirtualFileSet},
};
use indexmap::IndexMap;
use miette::Diagnostic;
use serde::Serialize;
use std::{collections::HashMap, fmt, sync::Arc};
use tera::{Context, Tera, Value};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum TemplateError {
    #[error("unable to select template sub-tree")]
    #[diagnostic(code(skelgen::template::source))]
    Source(#[from] VfsError),

    #[error("archive error while rendering template")]
    #[diagnostic(code(skelgen::template::archive))]
    Archive(#[from] ArchiveError),

    #[error("invalid template option: {reason}")]
    #[diagnostic(code(skelgen::template::invalid_option))]
    InvalidOption { reason: String },

    #[error("template source is not valid UTF-8")]
    #[diagnostic(
        code(skelgen::template::non_utf8_source),
        help("Binary files cannot be part of a template tree")
    )]
    NonUtf8Source,

    #[error("unclosed action starting on line {line}")]
    #[diagnostic(
        code(skelgen::template::unclosed_action),
        help("Every opening delimiter needs a matching closing delimiter")
    )]
    UnclosedAction { line: usize },

    #[error("empty action on line {line}")]
    #[diagnostic(code(skelgen::template::empty_action))]
    EmptyAction { line: usize },

    #[error("unable to parse template '{name}'")]
    #[diagnostic(code(skelgen::template::parse))]
    Parse {
        name: String,
        #[source]
        source: tera::Error,
    },

    #[error("template data must serialize to a map of fields")]
    #[diagnostic(code(skelgen::template::context))]
    Context {
        #[source]
        source: tera::Error,
    },

    #[error("unable to render template '{name}'")]
    #[diagnostic(code(skelgen::template::render))]
    Execute {
        name: String,
        #[source]
        source: tera::Error,
    },

    #[error("post-processing failed")]
    #[diagnostic(code(skelgen::template::post_process))]
    PostProcess(#[from] PostProcessError),
}

pub type TemplateFunction =
    Arc<dyn Fn(&HashMap<String, Value>) -> tera::Result<Value> + Send + Sync>;

/// Named helpers callable from templates. Later insertions replace earlier ones.
pub type FunctionTable = IndexMap<String, TemplateFunction>;

pub const DEFAULT_DELIMITERS: (&str, &str) = ("@@", "@@");

// First words that turn an action into a tera block tag.
const BLOCK_KEYWORDS: &[&str] = &[
    "if",
    "elif",
    "else",
    "endif",
    "for",
    "endfor",
    "set",
    "set_global",
    "filter",
    "endfilter",
    "macro",
    "endmacro",
    "break",
    "continue",
];

pub fn function<F>(f: F) -> TemplateFunction
where
    F: Fn(&HashMap<String, Value>) -> tera::Result<Value> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// The helpers every template gets: `gitkeep()`, `gomod()` and `gomodinit(path=...)`.
pub fn default_functions() -> FunctionTable {
    functions_for(Arc::new(GoToolchain::default()))
}

/// Same as [`default_functions`] but `gomodinit` asks `toolchain` for the version.
pub fn functions_for(toolchain: Arc<dyn Toolchain>) -> FunctionTable {
    let mut table = FunctionTable::new();

    table.insert(
        "gitkeep".to_string(),
        function(|_| Ok(Value::String(".gitkeep".to_string()))),
    );
    table.insert(
        "gomod".to_string(),
        function(|_| Ok(Value::String("go.mod".to_string()))),
    );
    table.insert(
        "gomodinit".to_string(),
        function(move |args| {
            let path = args
                .get("path")
                .and_then(Value::as_str)
                .ok_or_else(|| tera::Error::msg("gomodinit requires a string `path` argument"))?;

            modfile::mod_init(path, toolchain.as_ref())
                .map(Value::String)
                .map_err(|error| tera::Error::chain("gomodinit failed", error))
        }),
    );

    table
}

/// A configuration step applied to a [`TemplateSpec`] before parsing.
pub enum TemplateOption {
    Delims { open: String, close: String },
    Funcs(FunctionTable),
    PostProcessor(Arc<dyn PostProcessor>),
}

pub fn with_delims(open: impl Into<String>, close: impl Into<String>) -> TemplateOption {
    TemplateOption::Delims {
        open: open.into(),
        close: close.into(),
    }
}

pub fn with_funcs(functions: FunctionTable) -> TemplateOption {
    TemplateOption::Funcs(functions)
}

pub fn with_post_processor(processor: Arc<dyn PostProcessor>) -> TemplateOption {
    TemplateOption::PostProcessor(processor)
}

/// Everything needed to compile a template. Mutable only until [`parse_template`] consumes it.
pub struct TemplateSpec {
    pub name: String,
    pub delimiters: (String, String),
    pub functions: FunctionTable,
    pub post_processors: Vec<Arc<dyn PostProcessor>>,
}
impl TemplateSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            delimiters: (
                DEFAULT_DELIMITERS.0.to_string(),
                DEFAULT_DELIMITERS.1.to_string(),
            ),
            functions: default_functions(),
            post_processors: Vec::new(),
        }
    }

    pub fn apply(&mut self, option: TemplateOption) -> Result<(), TemplateError> {
        match option {
            TemplateOption::Delims { open, close } => {
                if open.is_empty() || close.is_empty() {
                    return Err(TemplateError::InvalidOption {
                        reason: format!("delimiters must not be empty (got {open:?}, {close:?})"),
                    });
                }
                self.delimiters = (open, close);
            }
            TemplateOption::Funcs(functions) => self.functions.extend(functions),
            TemplateOption::PostProcessor(processor) => self.post_processors.push(processor),
        }

        Ok(())
    }
}
impl fmt::Debug for TemplateSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateSpec")
            .field("name", &self.name)
            .field("delimiters", &self.delimiters)
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .field("post_processors", &self.post_processors.len())
            .finish()
    }
}

/// A parsed template ready to be executed any number of times.
pub struct CompiledTemplate {
    name: String,
    tera: Tera,
    post_processors: Vec<Arc<dyn PostProcessor>>,
}
impl fmt::Debug for CompiledTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledTemplate")
            .field("name", &self.name)
            .field("post_processors", &self.post_processors.len())
            .finish_non_exhaustive()
    }
}
impl CompiledTemplate {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renders the template against `data` and unpacks the result into files.
    ///
    /// `data` must serialize to a map; its fields become top level template variables.
    pub fn execute<T: Serialize>(&self, data: &T) -> Result<VirtualFileSet, TemplateError> {
        let context =
            Context::from_serialize(data).map_err(|source| TemplateError::Context { source })?;

        let rendered =
            self.tera
                .render(&self.name, &context)
                .map_err(|source| TemplateError::Execute {
                    name: self.name.clone(),
                    source,
                })?;

        let mut files = archive::decode(rendered.as_bytes())?;

        if let Some(name) = files.first_duplicate() {
            return Err(ArchiveError::DuplicateName {
                name: name.to_string(),
            }
            .into());
        }

        for file in files.iter_mut() {
            for processor in &self.post_processors {
                if processor.accepts(&file.name, &file.content) {
                    file.content = processor.process(&file.name, &file.content)?;
                }
            }
        }

        log::debug!("rendered template '{}' into {} files", self.name, files.len());

        Ok(files)
    }
}

/// Compiles the files of `source` into one template.
///
/// When `strip_prefix` is non-empty only the files below it are used, with the prefix removed
/// from their names. Options are applied in order.
pub fn parse_template<I>(
    source: &VirtualFileSet,
    name: &str,
    strip_prefix: &str,
    options: I,
) -> Result<CompiledTemplate, TemplateError>
where
    I: IntoIterator<Item = TemplateOption>,
{
    let mut spec = TemplateSpec::new(name);
    for option in options {
        spec.apply(option)?;
    }

    let files = if strip_prefix.is_empty() {
        source.clone()
    } else {
        source.sub(strip_prefix)?
    };

    let encoded = archive::encode(&files)?;
    let text = String::from_utf8(encoded).map_err(|_| TemplateError::NonUtf8Source)?;
    let translated = translate(&text, &spec.delimiters.0, &spec.delimiters.1)?;

    let mut tera = Tera::default();
    tera.autoescape_on(vec![]);

    for (function_name, function) in &spec.functions {
        let function = Arc::clone(function);
        tera.register_function(function_name, move |args: &HashMap<String, Value>| {
            function(args)
        });
    }

    tera.add_raw_template(&spec.name, &translated)
        .map_err(|source| TemplateError::Parse {
            name: spec.name.clone(),
            source,
        })?;

    log::debug!(
        "parsed template '{}' from {} files with delimiters {:?}",
        spec.name,
        files.len(),
        spec.delimiters
    );

    Ok(CompiledTemplate {
        name: spec.name,
        tera,
        post_processors: spec.post_processors,
    })
}

/// Rewrites `source` from `open`/`close` actions into tera syntax.
fn translate(source: &str, open: &str, close: &str) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;

    while let Some(start) = rest.find(open) {
        push_literal(&mut out, &rest[..start]);

        let offset = source.len() - rest.len() + start;
        let line = source[..offset].matches('\n').count() + 1;

        let after_open = &rest[start + open.len()..];
        let end = after_open
            .find(close)
            .ok_or(TemplateError::UnclosedAction { line })?;

        push_action(&mut out, &after_open[..end], line)?;

        rest = &after_open[end + close.len()..];
    }

    push_literal(&mut out, rest);

    Ok(out)
}

// Escapes every `{` that could open a tera tag, including one at the end of the segment
// since the next action starts with a brace.
fn push_literal(out: &mut String, literal: &str) {
    let mut chars = literal.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '{' && matches!(chars.peek(), None | Some('{' | '%' | '#')) {
            out.push_str("{{ \"{\" }}");
        } else {
            out.push(c);
        }
    }
}

// A body written as `- body -` (dash next to the delimiter, then whitespace) trims the
// surrounding whitespace, the same marker tera and Go templates use.
fn push_action(out: &mut String, raw: &str, line: usize) -> Result<(), TemplateError> {
    let (trim_left, raw) = match raw.strip_prefix('-') {
        Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => (true, rest),
        _ => (false, raw),
    };
    let (trim_right, raw) = match raw.strip_suffix('-') {
        Some(rest) if rest.ends_with(char::is_whitespace) => (true, rest),
        _ => (false, raw),
    };
    let left = if trim_left { "-" } else { "" };
    let right = if trim_right { "-" } else { "" };

    let body = raw.trim();
    if body.is_empty() {
        return Err(TemplateError::EmptyAction { line });
    }

    if body.starts_with('#') && body.ends_with('#') {
        if trim_left || trim_right {
            out.push_str(&format!("{{{{{left} \"\" {right}}}}}"));
        }
        return Ok(());
    }

    let keyword = body.split_whitespace().next().unwrap_or_default();

    if BLOCK_KEYWORDS.contains(&keyword) {
        out.push_str(&format!("{{%{left} {body} {right}%}}"));
    } else {
        out.push_str(&format!("{{{{{left} {body} {right}}}}}"));
    }

    Ok(())
}
