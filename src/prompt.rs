use indexmap::IndexMap;
use inquire::{required, validator::MinLengthValidator, Confirm, MultiSelect, Select, Text};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum PromptError {
    #[error("invalid choice {input:?}: expected a number between 1 and {max}")]
    #[diagnostic(code(skelgen::prompt::invalid_choice))]
    InvalidChoice { input: String, max: usize },

    #[error("invalid answer {input:?}: expected yes or no")]
    #[diagnostic(code(skelgen::prompt::invalid_yes_no))]
    InvalidYesNo { input: String },

    #[error("input ended before an answer was given")]
    #[diagnostic(code(skelgen::prompt::end_of_input))]
    EndOfInput,

    #[error("I/O error while prompting")]
    #[diagnostic(code(skelgen::prompt::io))]
    Io(#[source] io::Error),

    #[error("interactive prompt failed")]
    #[diagnostic(code(skelgen::prompt::inquire))]
    Inquire(#[from] inquire::InquireError),

    #[error("question '{name}' has no choices")]
    #[diagnostic(
        code(skelgen::prompt::missing_choices),
        help("Select and MultiSelect questions need a `choices` list")
    )]
    MissingChoices { name: String },

    #[error("no answer for '{name}'")]
    #[diagnostic(
        code(skelgen::prompt::missing_answer),
        help("Pass it with --set {name}=VALUE or drop --no-input")
    )]
    MissingAnswer { name: String },
}

/// Synchronous request/response interaction with the operator.
pub trait Prompt {
    /// Asks the operator to pick one of `options`; returns its zero-based index.
    fn choose(&mut self, description: &str, options: &[&str], cue: &str)
        -> Result<usize, PromptError>;

    /// Asks a yes/no question. An empty answer selects `default`.
    fn yes_no(&mut self, description: &str, default: bool, cue: &str)
        -> Result<bool, PromptError>;
}

/// A plain line based prompt: writes the question to `output`, reads one line from `input`.
///
/// Options are numbered from 1. Blocks until a line (or end of input) arrives.
pub struct LinePrompt<R, W> {
    input: R,
    output: W,
}
impl<R: BufRead, W: Write> LinePrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn read_answer(&mut self) -> Result<String, PromptError> {
        self.output.flush().map_err(PromptError::Io)?;

        let mut line = String::new();
        let read = self.input.read_line(&mut line).map_err(PromptError::Io)?;
        if read == 0 {
            return Err(PromptError::EndOfInput);
        }

        Ok(line.trim().to_string())
    }
}
impl LinePrompt<io::StdinLock<'static>, io::Stderr> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}
impl<R: BufRead, W: Write> Prompt for LinePrompt<R, W> {
    fn choose(
        &mut self,
        description: &str,
        options: &[&str],
        cue: &str,
    ) -> Result<usize, PromptError> {
        writeln!(self.output, "{description}").map_err(PromptError::Io)?;
        for (index, option) in options.iter().enumerate() {
            writeln!(self.output, "  {}) {}", index + 1, option).map_err(PromptError::Io)?;
        }
        write!(self.output, "{cue} ").map_err(PromptError::Io)?;

        let answer = self.read_answer()?;

        match answer.parse::<usize>() {
            Ok(n) if (1..=options.len()).contains(&n) => Ok(n - 1),
            _ => Err(PromptError::InvalidChoice {
                input: answer,
                max: options.len(),
            }),
        }
    }

    fn yes_no(&mut self, description: &str, default: bool, cue: &str) -> Result<bool, PromptError> {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        write!(self.output, "{description} {hint} {cue} ").map_err(PromptError::Io)?;

        let answer = self.read_answer()?;

        parse_yes_no(&answer, default)
    }
}

/// Terminal prompt backed by [`inquire`].
#[derive(Debug, Default, Clone, Copy)]
pub struct InteractivePrompt;
impl Prompt for InteractivePrompt {
    fn choose(
        &mut self,
        description: &str,
        options: &[&str],
        _cue: &str,
    ) -> Result<usize, PromptError> {
        let selected = Select::new(description, options.to_vec()).raw_prompt()?;

        Ok(selected.index)
    }

    fn yes_no(&mut self, description: &str, default: bool, _cue: &str) -> Result<bool, PromptError> {
        Ok(Confirm::new(description).with_default(default).prompt()?)
    }
}

fn parse_yes_no(answer: &str, default: bool) -> Result<bool, PromptError> {
    match answer.to_ascii_lowercase().as_str() {
        "" => Ok(default),
        "y" | "yes" => Ok(true),
        "n" | "no" => Ok(false),
        _ => Err(PromptError::InvalidYesNo {
            input: answer.to_string(),
        }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum QuestionType {
    Text,
    Confirm,
    Select,
    MultiSelect,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Question {
    pub r#type: QuestionType,
    #[serde(default)]
    pub help: String,
    pub choices: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Answer {
    String(String),
    Bool(bool),
    Array(Vec<String>),
}
impl Answer {
    /// Interprets a `--set` value according to the question it answers.
    pub fn from_raw(question: Option<&Question>, raw: &str) -> Result<Self, PromptError> {
        match question.map(|q| q.r#type) {
            Some(QuestionType::Confirm) => parse_yes_no(raw, false)
                .or_else(|_| match raw {
                    "true" => Ok(true),
                    "false" => Ok(false),
                    _ => Err(PromptError::InvalidYesNo {
                        input: raw.to_string(),
                    }),
                })
                .map(Answer::Bool),
            Some(QuestionType::MultiSelect) => Ok(Answer::Array(
                raw.split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(str::to_string)
                    .collect(),
            )),
            _ => Ok(Answer::String(raw.to_string())),
        }
    }
}

/// Collects an answer for every question, asking through [`inquire`] for those not already
/// present in `preset`. Preset values without a matching question are passed through.
pub fn get_answers(
    questions: &IndexMap<String, Question>,
    mut preset: IndexMap<String, String>,
    interactive: bool,
) -> Result<IndexMap<String, Answer>, PromptError> {
    let mut answers: IndexMap<String, Answer> = IndexMap::new();

    for (question, config) in questions {
        if let Some(raw) = preset.shift_remove(question) {
            answers.insert(question.clone(), Answer::from_raw(Some(config), &raw)?);
            continue;
        }

        if !interactive {
            return Err(PromptError::MissingAnswer {
                name: question.clone(),
            });
        }

        let answer = match config.r#type {
            QuestionType::Text => Answer::String(
                Text::new(question)
                    .with_help_message(&config.help)
                    .with_validator(required!(format!("{} is required", question)))
                    .prompt()?,
            ),
            QuestionType::Confirm => Answer::Bool(
                Confirm::new(question)
                    .with_help_message(&config.help)
                    .prompt()?,
            ),
            QuestionType::Select => {
                let choices = choices_of(question, config)?;

                Answer::String(
                    Select::new(question, choices)
                        .with_help_message(&config.help)
                        .prompt()?,
                )
            }
            QuestionType::MultiSelect => {
                let choices = choices_of(question, config)?;

                Answer::Array(
                    MultiSelect::new(question, choices)
                        .with_help_message(&config.help)
                        .with_validator(MinLengthValidator::new(1))
                        .prompt()?,
                )
            }
        };

        answers.insert(question.clone(), answer);
    }

    for (key, raw) in preset {
        answers.insert(key, Answer::String(raw));
    }

    Ok(answers)
}

fn choices_of(name: &str, question: &Question) -> Result<Vec<String>, PromptError> {
    match &question.choices {
        Some(choices) if !choices.is_empty() => Ok(choices.clone()),
        _ => Err(PromptError::MissingChoices {
            name: name.to_string(),
        }),
    }
}
