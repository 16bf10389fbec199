use miette::Diagnostic;
use std::{
    io::{self, Write},
    process::{Command, Stdio},
};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum PostProcessError {
    #[error("unable to run formatter '{program}' on '{file}'")]
    #[diagnostic(code(skelgen::postprocess::spawn))]
    Spawn {
        program: String,
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("formatter '{program}' failed on '{file}': {stderr}")]
    #[diagnostic(
        code(skelgen::postprocess::failed),
        help("The rendered file is probably not valid source code; check the template output")
    )]
    Failed {
        program: String,
        file: String,
        stderr: String,
    },

    #[error("formatter command is empty")]
    #[diagnostic(code(skelgen::postprocess::empty_command))]
    EmptyCommand,
}

/// A per-file transform applied to rendered output.
pub trait PostProcessor: Send + Sync {
    /// Whether `process` should run for this file.
    fn accepts(&self, name: &str, content: &[u8]) -> bool;

    fn process(&self, name: &str, content: &[u8]) -> Result<Vec<u8>, PostProcessError>;
}

/// Pipes files with a given extension through an external command (e.g. `gofmt`).
#[derive(Debug, Clone)]
pub struct ExternalFormatter {
    pub extension: String,
    pub command: Vec<String>,
}
impl ExternalFormatter {
    pub fn new(extension: impl Into<String>, command: Vec<String>) -> Result<Self, PostProcessError> {
        if command.is_empty() {
            return Err(PostProcessError::EmptyCommand);
        }

        Ok(Self {
            extension: extension.into().trim_start_matches('.').to_string(),
            command,
        })
    }
}
impl PostProcessor for ExternalFormatter {
    fn accepts(&self, name: &str, content: &[u8]) -> bool {
        let matches_extension = std::path::Path::new(name)
            .extension()
            .map(|ext| ext == self.extension.as_str())
            .unwrap_or(false);

        matches_extension && !content.iter().all(u8::is_ascii_whitespace)
    }

    fn process(&self, name: &str, content: &[u8]) -> Result<Vec<u8>, PostProcessError> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or(PostProcessError::EmptyCommand)?;

        let spawn_error = |error| PostProcessError::Spawn {
            program: program.clone(),
            file: name.to_string(),
            source: error,
        };

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;

        // Feed stdin from its own thread so a command that streams its output cannot fill
        // the stdout pipe while we are still writing.
        let stdin = child.stdin.take();
        let (output, written) = std::thread::scope(|scope| {
            let writer = scope.spawn(move || match stdin {
                Some(mut stdin) => stdin.write_all(content),
                None => Ok(()),
            });

            let output = child.wait_with_output();
            let written = writer
                .join()
                .unwrap_or_else(|_| Err(io::Error::other("stdin writer panicked")));

            (output, written)
        });
        let output = output.map_err(spawn_error)?;

        if !output.status.success() {
            return Err(PostProcessError::Failed {
                program: program.clone(),
                file: name.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        match written {
            Err(error) if error.kind() != io::ErrorKind::BrokenPipe => {
                return Err(spawn_error(error))
            }
            _ => {}
        }

        log::debug!("formatted {} with {}", name, program);

        Ok(output.stdout)
    }
}
