use crate::{
    materialize::{self, CreateReport, CreatorConfig, OverwritePolicy},
    postprocess::{ExternalFormatter, PostProcessError},
    preview::preview_as_tree,
    prompt::{self, Prompt},
    source::{self, Source},
    template::{self, TemplateOption},
};
use indexmap::IndexMap;
use std::{path::Path, sync::Arc};

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum SkelgenError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Source(#[from] source::SourceError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Template(#[from] template::TemplateError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Prompt(#[from] prompt::PromptError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Materialize(#[from] materialize::MaterializeError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    PostProcess(#[from] PostProcessError),
}

/// Caller choices for one [`generate`] run. Unset fields fall back to the template's
/// configuration.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Answers given up front, keyed by question name.
    pub set: IndexMap<String, String>,
    pub policy: Option<OverwritePolicy>,
    pub write_empty: Option<bool>,
    /// Only print what would be written.
    pub dry_run: bool,
    /// Ask missing questions on the terminal.
    pub interactive: bool,
}

/// Renders `template` from the source at `src` and writes it below `destination`.
///
/// Returns `None` for a dry run.
///
/// # Errors
///
/// Returns a [`SkelgenError`] if:
///
/// - The source cannot be opened, cloned or its configuration parsed.
/// - The template does not exist or a question cannot be answered.
/// - The template fails to parse, render or post-process.
/// - Writing the result fails or the operator gives an unparseable answer.
pub fn generate(
    src: &str,
    template: &str,
    destination: &Path,
    options: GenerateOptions,
    prompt: &mut dyn Prompt,
) -> Result<Option<CreateReport>, SkelgenError> {
    let source = Source::build_from(src)?;

    log::debug!(
        "Attempting to build source from: {}",
        source.path().display()
    );

    let entry = source.template(template)?;

    let answers = prompt::get_answers(&entry.questions, options.set, options.interactive)?;

    let mut template_options: Vec<TemplateOption> = Vec::new();
    if let Some((open, close)) = &entry.delims {
        template_options.push(template::with_delims(open.clone(), close.clone()));
    }
    if let Some(format) = &entry.format {
        let formatter = ExternalFormatter::new(format.extension.clone(), format.command.clone())?;
        template_options.push(template::with_post_processor(Arc::new(formatter)));
    }

    let files = source.files()?;
    let compiled = template::parse_template(
        &files,
        template,
        &Source::prefix_of(entry),
        template_options,
    )?;
    let rendered = compiled.execute(&answers)?;

    if options.dry_run {
        preview_as_tree(&rendered, destination);
        return Ok(None);
    }

    let config = CreatorConfig::default()
        .with_empty(options.write_empty.unwrap_or(entry.write_empty))
        .with_policy(options.policy.unwrap_or(entry.policy));

    let report = materialize::create_dir(prompt, destination, &rendered, config)?;

    Ok(Some(report))
}

/// Lists the templates of the source at `src` as `(name, description)` pairs.
pub fn list_templates(src: &str) -> Result<Vec<(String, Option<String>)>, SkelgenError> {
    let source = Source::build_from(src)?;

    Ok(source
        .config
        .templates
        .iter()
        .map(|(name, entry)| (name.clone(), entry.description.clone()))
        .collect())
}
