//! Generate directory trees from template archives.
//!
//! A template is a directory of files. [`template::parse_template`] packs it into a single
//! archive ([`archive`]) and compiles that archive with tera, [`template::CompiledTemplate::execute`]
//! renders it against a data value and unpacks the result into a [`vfs::VirtualFileSet`], and
//! [`materialize::create_dir`] writes that set to disk, asking through a [`prompt::Prompt`] how to
//! handle files that already exist.
pub mod api;
pub mod archive;
pub mod config;
pub mod errors;
pub mod materialize;
pub mod modfile;
pub mod postprocess;
pub mod preview;
pub mod prompt;
pub mod source;
pub mod template;
pub mod utils;
pub mod vfs;

pub use api::{generate, list_templates, GenerateOptions, SkelgenError};
pub use materialize::{create_dir, CreateReport, CreatorConfig, OverwritePolicy};
pub use prompt::{InteractivePrompt, LinePrompt, Prompt};
pub use template::{parse_template, with_delims, with_funcs, with_post_processor, CompiledTemplate};
pub use vfs::{VirtualFile, VirtualFileSet};
