use clap::{
    crate_authors, crate_description, crate_name, crate_version, Arg, ArgAction, ArgMatches,
    Command,
};
use colored::Colorize;
use indexmap::IndexMap;
use miette::miette;
use skelgen::{CreateReport, GenerateOptions, InteractivePrompt, LinePrompt, OverwritePolicy};
use std::{io::IsTerminal, path::PathBuf};

// The CLI layer should only parse inputs and forward them to library code.
fn main() -> miette::Result<()> {
    let matches = Command::new(crate_name!())
        .about(crate_description!())
        .author(crate_authors!())
        .version(crate_version!())
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("new")
                .about("Renders a template from a source into a destination directory")
                .arg(
                    Arg::new("source")
                        .help("template source: a local directory or a git reference (gh:owner/repo)")
                        .required(true),
                )
                .arg(Arg::new("template").help("template name").required(true))
                .arg(
                    Arg::new("destination")
                        .help("The destination directory where the project will be created")
                        .required(true),
                )
                .arg(
                    Arg::new("set")
                        .short('s')
                        .long("set")
                        .value_name("KEY=VALUE")
                        .help("Answer a template question up front")
                        .action(ArgAction::Append),
                )
                .arg(
                    Arg::new("policy")
                        .short('p')
                        .long("policy")
                        .help("How to treat existing files")
                        .value_parser(["cancel", "force", "confirm", "new-only"]),
                )
                .arg(
                    Arg::new("empty")
                        .long("empty")
                        .help("Also write files whose rendered content is empty")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("dry-run")
                        .long("dry-run")
                        .help("Print the files that would be written and exit")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("no-input")
                        .long("no-input")
                        .help("Never ask template questions; missing answers are an error")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("list").about("list templates").arg(
                Arg::new("source")
                    .help("template source: a local directory or a git reference")
                    .required(true),
            ),
        )
        .get_matches();

    let is_verbose = matches.get_flag("verbose");

    let level = if is_verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match matches.subcommand() {
        Some(("new", args)) => handle_new(args),
        Some(("list", args)) => handle_list(args),
        _ => unreachable!(),
    }
}

fn handle_new(args: &ArgMatches) -> miette::Result<()> {
    let source = args.get_one::<String>("source").expect("source required");
    let template = args
        .get_one::<String>("template")
        .expect("template required");
    let destination = args
        .get_one::<String>("destination")
        .map(PathBuf::from)
        .expect("destination required");

    let mut set = IndexMap::new();
    for pair in args.get_many::<String>("set").unwrap_or_default() {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| miette!("invalid --set value '{pair}', expected KEY=VALUE"))?;
        set.insert(key.trim().to_string(), value.to_string());
    }

    let policy = args
        .get_one::<String>("policy")
        .map(|value| value.parse::<OverwritePolicy>())
        .transpose()
        .map_err(|error| miette!("{error}"))?;

    let interactive = !args.get_flag("no-input") && std::io::stdin().is_terminal();

    let options = GenerateOptions {
        set,
        policy,
        write_empty: args.get_flag("empty").then_some(true),
        dry_run: args.get_flag("dry-run"),
        interactive,
    };

    let report = if interactive {
        skelgen::generate(source, template, &destination, options, &mut InteractivePrompt)?
    } else {
        skelgen::generate(
            source,
            template,
            &destination,
            options,
            &mut LinePrompt::stdio(),
        )?
    };

    if let Some(report) = report {
        print_report(&report);
    }

    Ok(())
}

fn handle_list(args: &ArgMatches) -> miette::Result<()> {
    let source = args.get_one::<String>("source").expect("source required");

    let templates = skelgen::list_templates(source)?;

    if templates.is_empty() {
        println!("no templates found");
    }

    for (name, description) in templates {
        match description {
            Some(description) => println!("{} {}", name.green(), description.dimmed()),
            None => println!("{}", name.green()),
        }
    }

    Ok(())
}

fn print_report(report: &CreateReport) {
    for path in &report.created {
        println!("{} {}", "create".green(), path.display());
    }
    for path in &report.overwritten {
        println!("{} {}", "overwrite".yellow(), path.display());
    }
    for path in &report.kept {
        println!("{} {}", "keep".blue(), path.display());
    }
    for path in &report.skipped_empty {
        log::debug!("skipped empty {}", path.display());
    }
}
