// Integration testing can be done either by calling library functions directly or by invoking your CLI as a subprocess.
use serde::Serialize;
use skelgen::{
    create_dir,
    materialize::MaterializeError,
    modfile::{ModfileError, Toolchain},
    parse_template,
    prompt::PromptError,
    template::{function, functions_for, FunctionTable, TemplateOption},
    with_delims, with_funcs, CreateReport, CreatorConfig, LinePrompt, OverwritePolicy,
    VirtualFileSet,
};
use std::{fs, io::Cursor, path::Path, sync::Arc};
use tempfile::TempDir;

struct StubToolchain;
impl Toolchain for StubToolchain {
    fn version(&self) -> Result<String, ModfileError> {
        Ok("1.22".to_string())
    }
}

#[derive(Serialize)]
struct AppInfo {
    name: &'static str,
    module_path: &'static str,
}

const INFO: AppInfo = AppInfo {
    name: "example",
    module_path: "example.com/example",
};

const GO_MOD: &str = "module example.com/example\n\ngo 1.22\n";
const MAIN_GO: &str = "// example\npackage main\n";

fn template_tree() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("testdata/template");
    fs::create_dir_all(root.join("testdata")).unwrap();

    fs::write(
        root.join("@@ gomod() @@"),
        "@@ gomodinit(path=module_path) @@",
    )
    .unwrap();
    fs::write(root.join("main.go"), "// @@ name @@\npackage main\n").unwrap();
    fs::write(root.join("testdata/@@ gitkeep() @@"), "").unwrap();
    fs::write(dir.path().join("README.md"), "not part of the template\n").unwrap();

    dir
}

struct Case<'a> {
    existing: &'a [(&'a str, &'a str)],
    root: &'a str,
    template_options: Vec<TemplateOption>,
    config: CreatorConfig,
    input: &'a str,
}
impl<'a> Case<'a> {
    fn new(root: &'a str) -> Self {
        Self {
            existing: &[],
            root,
            template_options: Vec::new(),
            config: CreatorConfig::default(),
            input: "",
        }
    }

    fn existing(mut self, existing: &'a [(&'a str, &'a str)]) -> Self {
        self.existing = existing;
        self
    }

    fn input(mut self, input: &'a str) -> Self {
        self.input = input;
        self
    }

    fn option(mut self, option: TemplateOption) -> Self {
        self.template_options.push(option);
        self
    }

    fn config(mut self, config: CreatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Parses, executes and materializes the fixture template, returning the destination
    /// directory and the outcome of the final step.
    fn run(self) -> (TempDir, Result<CreateReport, MaterializeError>) {
        let source_dir = template_tree();
        let source = VirtualFileSet::from_dir(source_dir.path()).unwrap();

        let mut options = vec![with_funcs(functions_for(Arc::new(StubToolchain)))];
        options.extend(self.template_options);

        let template = parse_template(&source, "example", "testdata/template", options).unwrap();
        let files = template.execute(&INFO).unwrap();

        let dir = tempfile::tempdir().unwrap();
        for (name, content) in self.existing {
            let path = dir.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }

        let mut prompt = LinePrompt::new(
            Cursor::new(self.input.as_bytes().to_vec()),
            std::io::sink(),
        );

        let result = create_dir(
            &mut prompt,
            &dir.path().join(self.root),
            &files,
            self.config,
        );

        (dir, result)
    }
}

fn read(dir: &Path, name: &str) -> String {
    fs::read_to_string(dir.join(name)).unwrap()
}

#[test]
fn clean() {
    let (dir, result) = Case::new("example").run();

    let report = result.unwrap();
    assert_eq!(report.created.len(), 2);
    assert_eq!(read(dir.path(), "example/go.mod"), GO_MOD);
    assert_eq!(read(dir.path(), "example/main.go"), MAIN_GO);
    assert!(!dir.path().join("example/testdata/.gitkeep").exists());
    assert!(!dir.path().join("example/README.md").exists());
}

#[test]
fn clean_relative() {
    let (dir, result) = Case::new(".").run();

    result.unwrap();
    assert_eq!(read(dir.path(), "go.mod"), GO_MOD);
    assert_eq!(read(dir.path(), "main.go"), MAIN_GO);
}

#[test]
fn overwrite_cancel() {
    for (root, existing) in [
        ("example", "example/main.go"),
        (".", "main.go"),
    ] {
        let (dir, result) = Case::new(root)
            .existing(&[(existing, "// not overwritten")])
            .input("1\n")
            .run();

        let report = result.unwrap();
        assert_eq!(report.policy, OverwritePolicy::Cancel);
        assert_eq!(read(dir.path(), existing), "// not overwritten");
        assert_eq!(read(&dir.path().join(root), "go.mod"), GO_MOD);
    }
}

#[test]
fn overwrite_force() {
    for (root, existing) in [
        ("example", "example/main.go"),
        (".", "main.go"),
    ] {
        let stale = format!("{root}/stale.txt");
        let (dir, result) = Case::new(root)
            .existing(&[(existing, "// not overwritten"), (stale.as_str(), "x")])
            .input("2\n")
            .run();

        let report = result.unwrap();
        assert_eq!(report.policy, OverwritePolicy::ForceOverwrite);
        assert_eq!(read(dir.path(), existing), MAIN_GO);
        assert!(!dir.path().join(root).join("stale.txt").exists());
        assert!(dir.path().join(root).exists());
    }
}

#[test]
fn overwrite_confirm_yes() {
    for (root, existing) in [
        ("example", "example/main.go"),
        (".", "main.go"),
    ] {
        let (dir, result) = Case::new(root)
            .existing(&[(existing, "// not overwritten")])
            .input("3\ny\n")
            .run();

        let report = result.unwrap();
        assert_eq!(report.overwritten.len(), 1);
        assert_eq!(read(dir.path(), existing), MAIN_GO);
    }
}

#[test]
fn overwrite_confirm_no() {
    for (root, existing) in [
        ("example", "example/main.go"),
        (".", "main.go"),
    ] {
        let (dir, result) = Case::new(root)
            .existing(&[(existing, "// not overwritten")])
            .input("3\nn\n")
            .run();

        let report = result.unwrap();
        assert_eq!(report.kept.len(), 1);
        assert_eq!(read(dir.path(), existing), "// not overwritten");
        assert_eq!(read(&dir.path().join(root), "go.mod"), GO_MOD);
    }
}

#[test]
fn overwrite_new_only() {
    for (root, existing) in [
        ("example", "example/go.mod"),
        (".", "go.mod"),
    ] {
        let (dir, result) = Case::new(root)
            .existing(&[(existing, "// not overwritten")])
            .input("4\n")
            .run();

        let report = result.unwrap();
        assert_eq!(report.policy, OverwritePolicy::NewOnly);
        assert_eq!(read(dir.path(), existing), "// not overwritten");
        assert_eq!(read(&dir.path().join(root), "main.go"), MAIN_GO);
    }
}

#[test]
fn prompt_choose_invalid_input() {
    let (dir, result) = Case::new(".")
        .existing(&[("go.mod", "// not overwritten")])
        .input("INVALID\n")
        .run();

    assert!(matches!(
        result,
        Err(MaterializeError::Prompt(PromptError::InvalidChoice { .. }))
    ));
    assert_eq!(read(dir.path(), "go.mod"), "// not overwritten");
    assert!(!dir.path().join("main.go").exists());
}

#[test]
fn prompt_yes_no_invalid_input() {
    let (dir, result) = Case::new(".")
        .existing(&[("go.mod", "// not overwritten")])
        .input("3\nINVALID\n")
        .run();

    assert!(matches!(
        result,
        Err(MaterializeError::Prompt(PromptError::InvalidYesNo { .. }))
    ));
    assert_eq!(read(dir.path(), "go.mod"), "// not overwritten");
}

#[test]
fn failed_confirm_keeps_earlier_writes() {
    let (dir, result) = Case::new("example")
        .existing(&[("example/main.go", "// not overwritten")])
        .config(
            CreatorConfig::default()
                .with_policy(OverwritePolicy::Confirm)
                .with_empty(true),
        )
        .input("INVALID\n")
        .run();

    assert!(matches!(
        result,
        Err(MaterializeError::Prompt(PromptError::InvalidYesNo { .. }))
    ));
    assert_eq!(read(dir.path(), "example/go.mod"), GO_MOD);
    assert_eq!(read(dir.path(), "example/main.go"), "// not overwritten");
    assert!(!dir.path().join("example/testdata").exists());
}

#[test]
fn template_option_delims() {
    let (dir, result) = Case::new("example").option(with_delims("$$", "$$")).run();

    result.unwrap();
    let root = dir.path().join("example");
    assert_eq!(
        read(&root, "@@ gomod() @@"),
        "@@ gomodinit(path=module_path) @@"
    );
    assert_eq!(read(&root, "main.go"), "// @@ name @@\npackage main\n");
}

#[test]
fn template_option_funcs() {
    let mut table = FunctionTable::new();
    table.insert(
        "gomod".to_string(),
        function(|_| Ok(tera::Value::String("DIFFERENT-GOMOD".to_string()))),
    );

    let (dir, result) = Case::new("example").option(with_funcs(table)).run();

    result.unwrap();
    assert_eq!(read(dir.path(), "example/DIFFERENT-GOMOD"), GO_MOD);
    assert!(!dir.path().join("example/go.mod").exists());
}

#[test]
fn creator_option_empty() {
    let (dir, result) = Case::new("example")
        .config(CreatorConfig::default().with_empty(true))
        .run();

    let report = result.unwrap();
    assert!(report.skipped_empty.is_empty());
    assert_eq!(read(dir.path(), "example/testdata/.gitkeep"), "");
}

#[test]
fn creator_option_policy() {
    let (dir, result) = Case::new("example")
        .existing(&[("example/main.go", "// not overwritten")])
        .config(CreatorConfig::default().with_policy(OverwritePolicy::Confirm))
        .input("n\n")
        .run();

    let report = result.unwrap();
    assert_eq!(report.policy, OverwritePolicy::Confirm);
    assert_eq!(read(dir.path(), "example/main.go"), "// not overwritten");
}

fn cli_source() -> TempDir {
    let dir = tempfile::tempdir().unwrap();

    fs::write(
        dir.path().join("skelgen.toml"),
        r#"
[templates.cli]
path = "templates/cli"
description = "a command line app"

[templates.cli.questions.name]
type = "Text"
help = "Binary name"

[templates.lib]
path = "templates/lib"

[templates.typo]
path = "templates/clj"
"#,
    )
    .unwrap();

    let cli = dir.path().join("templates/cli/cmd/@@ name @@");
    fs::create_dir_all(&cli).unwrap();
    fs::write(cli.join("main.go"), "package main // @@ name @@\n").unwrap();
    fs::create_dir_all(dir.path().join("templates/lib")).unwrap();
    fs::write(dir.path().join("templates/lib/lib.go"), "package lib\n").unwrap();

    dir
}

#[test]
fn list_templates() {
    let source = cli_source();
    let mut cmd = assert_cmd::Command::cargo_bin("skelgen").unwrap();

    cmd.arg("list").arg(source.path());

    cmd.assert()
        .success()
        .stdout(predicates::str::contains("cli"))
        .stdout(predicates::str::contains("a command line app"))
        .stdout(predicates::str::contains("lib"));
}

#[test]
fn new_renders_into_destination() {
    let source = cli_source();
    let destination = tempfile::tempdir().unwrap();
    let mut cmd = assert_cmd::Command::cargo_bin("skelgen").unwrap();

    cmd.arg("new")
        .arg(source.path())
        .arg("cli")
        .arg(destination.path().join("app"))
        .args(["--set", "name=tool", "--no-input"]);

    cmd.assert().success();

    assert_eq!(
        read(destination.path(), "app/cmd/tool/main.go"),
        "package main // tool\n"
    );
}

#[test]
fn new_keeps_existing_files_with_new_only() {
    let source = cli_source();
    let destination = tempfile::tempdir().unwrap();
    let existing = destination.path().join("cmd/tool");
    fs::create_dir_all(&existing).unwrap();
    fs::write(existing.join("main.go"), "// mine\n").unwrap();

    let mut cmd = assert_cmd::Command::cargo_bin("skelgen").unwrap();
    cmd.arg("new")
        .arg(source.path())
        .arg("cli")
        .arg(destination.path())
        .args(["--set", "name=tool", "--policy", "new-only", "--no-input"]);

    cmd.assert().success();

    assert_eq!(read(destination.path(), "cmd/tool/main.go"), "// mine\n");
}

#[test]
fn new_dry_run_writes_nothing() {
    let source = cli_source();
    let destination = tempfile::tempdir().unwrap();
    let mut cmd = assert_cmd::Command::cargo_bin("skelgen").unwrap();

    cmd.arg("new")
        .arg(source.path())
        .arg("cli")
        .arg(destination.path().join("app"))
        .args(["--set", "name=tool", "--dry-run", "--no-input"]);

    cmd.assert()
        .success()
        .stdout(predicates::str::contains("main.go"))
        .stdout(predicates::str::contains("files would be written"));

    assert!(!destination.path().join("app").exists());
}

#[test]
fn new_without_answer_fails() {
    let source = cli_source();
    let destination = tempfile::tempdir().unwrap();
    let mut cmd = assert_cmd::Command::cargo_bin("skelgen").unwrap();

    cmd.arg("new")
        .arg(source.path())
        .arg("cli")
        .arg(destination.path())
        .arg("--no-input");

    cmd.assert()
        .failure()
        .stderr(predicates::str::contains("name"));
}

#[test]
fn new_unknown_template_fails() {
    let source = cli_source();
    let destination = tempfile::tempdir().unwrap();
    let mut cmd = assert_cmd::Command::cargo_bin("skelgen").unwrap();

    cmd.arg("new")
        .arg(source.path())
        .arg("web")
        .arg(destination.path())
        .arg("--no-input");

    cmd.assert()
        .failure()
        .stderr(predicates::str::contains("template not found"));
}

#[test]
fn new_with_missing_template_path_fails() {
    let source = cli_source();
    let destination = tempfile::tempdir().unwrap();
    let mut cmd = assert_cmd::Command::cargo_bin("skelgen").unwrap();

    cmd.arg("new")
        .arg(source.path())
        .arg("typo")
        .arg(destination.path().join("app"))
        .arg("--no-input");

    cmd.assert()
        .failure()
        .stderr(predicates::str::contains("templates/clj"));

    assert!(!destination.path().join("app").exists());
}
