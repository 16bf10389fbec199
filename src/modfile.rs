use miette::Diagnostic;
use std::process::Command;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ModfileError {
    #[error("unable to run '{program}' to query the toolchain version")]
    #[diagnostic(
        code(skelgen::modfile::toolchain),
        help("Make sure the toolchain is installed and available on PATH")
    )]
    Toolchain {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' exited with {status}: {stderr}")]
    #[diagnostic(code(skelgen::modfile::toolchain_status))]
    ToolchainStatus {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("invalid module path: {path:?}")]
    #[diagnostic(code(skelgen::modfile::module_path))]
    InvalidModulePath { path: String },

    #[error("invalid go version '{version}': must match format 1.23.0")]
    #[diagnostic(code(skelgen::modfile::go_version))]
    InvalidGoVersion { version: String },
}

/// Something that can report the version of the host toolchain.
pub trait Toolchain: Send + Sync {
    fn version(&self) -> Result<String, ModfileError>;
}

/// Queries `go env GOVERSION`.
#[derive(Debug, Clone)]
pub struct GoToolchain {
    pub program: String,
}
impl Default for GoToolchain {
    fn default() -> Self {
        Self {
            program: "go".to_string(),
        }
    }
}
impl Toolchain for GoToolchain {
    fn version(&self) -> Result<String, ModfileError> {
        let output = Command::new(&self.program)
            .args(["env", "GOVERSION"])
            .output()
            .map_err(|error| ModfileError::Toolchain {
                program: self.program.clone(),
                source: error,
            })?;

        if !output.status.success() {
            return Err(ModfileError::ToolchainStatus {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let raw = String::from_utf8_lossy(&output.stdout);
        let version = normalize_go_version(raw.trim());

        log::debug!("toolchain '{}' reports go {}", self.program, version);

        Ok(version)
    }
}

/// Reduces a `GOVERSION` string to a bare language version.
///
/// Development builds look like `devel go1.24-f99f5da18f Thu Nov 14 ...`; everything from the
/// first `-` on is dropped before the `go` prefix is removed.
pub fn normalize_go_version(version: &str) -> String {
    let version = match version.strip_prefix("devel ") {
        Some(rest) => rest.split('-').next().unwrap_or_default(),
        None => version,
    };

    version.strip_prefix("go").unwrap_or(version).to_string()
}

/// Renders a minimal `go.mod` for `module_path` pinned to the toolchain's version.
pub fn mod_init(module_path: &str, toolchain: &dyn Toolchain) -> Result<String, ModfileError> {
    if module_path.is_empty() || module_path.contains(['\n', '\r']) {
        return Err(ModfileError::InvalidModulePath {
            path: module_path.to_string(),
        });
    }

    let version = toolchain.version()?;

    lazy_static::lazy_static! {
        static ref GO_VERSION_REGEX: regex::Regex = regex::Regex::new(
            r"^([1-9][0-9]*)\.(0|[1-9][0-9]*)(\.(0|[1-9][0-9]*))?([a-z]+[0-9]+)?$"
        ).expect("a valid regex pattern");
    }

    if !GO_VERSION_REGEX.is_match(&version) {
        return Err(ModfileError::InvalidGoVersion { version });
    }

    Ok(format!(
        "module {}\n\ngo {}\n",
        auto_quote(module_path),
        version
    ))
}

// Module paths with spaces, quotes or comment markers must be written as quoted strings.
fn auto_quote(path: &str) -> String {
    let needs_quote = path.contains(|c: char| c.is_whitespace() || matches!(c, '"' | '\'' | '`'))
        || path.contains("//")
        || path.contains("/*");

    if !needs_quote {
        return path.to_string();
    }

    let mut quoted = String::with_capacity(path.len() + 2);
    quoted.push('"');
    for c in path.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\t' => quoted.push_str("\\t"),
            other => quoted.push(other),
        }
    }
    quoted.push('"');

    quoted
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str);
    impl Toolchain for Fixed {
        fn version(&self) -> Result<String, ModfileError> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn normalize_versions() {
        let cases = [
            ("", ""),
            ("go", ""),
            ("go1", "1"),
            ("go1.20", "1.20"),
            ("go1.21.0", "1.21.0"),
            ("go1.23rc1", "1.23rc1"),
            (
                "devel go1.24-f99f5da18f Thu Nov 14 22:29:26 2024 +0000 darwin/arm64",
                "1.24",
            ),
        ];

        for (input, want) in cases {
            assert_eq!(normalize_go_version(input), want, "input: {input:?}");
        }
    }

    #[test]
    fn mod_init_writes_module_and_go_lines() {
        let content = mod_init("example.com/example", &Fixed("1.22.3")).unwrap();

        assert_eq!(content, "module example.com/example\n\ngo 1.22.3\n");
    }

    #[test]
    fn mod_init_quotes_paths_with_spaces() {
        let content = mod_init("my module", &Fixed("1.22")).unwrap();

        assert!(content.starts_with("module \"my module\"\n"));
    }

    #[test]
    fn mod_init_rejects_bad_versions() {
        let error = mod_init("example.com/x", &Fixed("")).unwrap_err();

        assert!(matches!(error, ModfileError::InvalidGoVersion { .. }));
    }

    #[test]
    fn mod_init_rejects_empty_path() {
        let error = mod_init("", &Fixed("1.22")).unwrap_err();

        assert!(matches!(error, ModfileError::InvalidModulePath { .. }));
    }

    #[test]
    fn missing_toolchain_binary_is_an_error() {
        let toolchain = GoToolchain {
            program: "skelgen-no-such-toolchain".to_string(),
        };

        assert!(matches!(
            toolchain.version(),
            Err(ModfileError::Toolchain { .. })
        ));
    }
}
