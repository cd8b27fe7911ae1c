//! Javelin CLI binary.
//!
//! Initializes logging via `tracing`, parses arguments with `clap`, loads
//! `Javelin.toml`, builds the key-graph universe, and executes queries
//! against it (or drops into the REPL).

mod cli;
mod keys;
mod output;
mod universe;

use std::path::PathBuf;

use miette::Result;

use javelin_core::manifest::Manifest;
use javelin_core::query::{Command, Query};
use javelin_util::errors::JavelinError;

use cli::MachineFormat;
use output::KeyRegistry;
use universe::Universe;

fn main() -> Result<()> {
    let args = cli::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    let cwd = std::env::current_dir().map_err(JavelinError::Io)?;
    let project_dir = javelin_util::fs::find_ancestor_with(&cwd, "Javelin.toml")
        .ok_or_else(|| JavelinError::Manifest {
            message: format!("Could not find Javelin.toml in {} or above", cwd.display()),
        })?;
    let manifest_dir = absolute(&project_dir)?;
    let manifest = Manifest::load(&manifest_dir.join("Javelin.toml"))?;

    let universe = universe::build_universe(&manifest, &manifest_dir, args.offline)?;
    let registry = KeyRegistry::standard(&universe.keys);

    let interactive = args.interactive || args.queries.is_empty();
    universe.evaluator.set_interactive(interactive && args.machine_readable_output.is_none());

    for raw in &args.queries {
        let query = Query::parse(raw)?;
        for command in &query.commands {
            execute(&universe, &registry, command, args.machine_readable_output)?;
        }
    }

    if interactive {
        repl(&universe, &registry, args.machine_readable_output)?;
    }

    Ok(())
}

/// Execute one parsed command: select the project, layer the configuration
/// stack, run the key, print the result.
fn execute(
    universe: &Universe,
    registry: &KeyRegistry,
    command: &Command,
    format: Option<MachineFormat>,
) -> Result<()> {
    let project = universe.select_project(command.task.project.as_deref())?;
    let mut scope = universe.evaluator.root_scope(project);
    for config_name in &command.task.configurations {
        let config = universe.configuration(project.name(), config_name)?;
        scope = universe.evaluator.layer(scope, config);
    }

    let inputs: Vec<(Option<String>, String)> = command
        .inputs
        .iter()
        .map(|input| (input.key.clone(), input.value.clone()))
        .collect();

    let outcome = registry.run(&command.task.key, &universe.evaluator, scope, inputs)?;

    match format {
        None => {
            javelin_util::progress::status(
                "Evaluated",
                &format!("{}{}", universe.evaluator.scope_name(scope), command.task.key),
            );
            println!("{}", outcome.pretty);
        }
        Some(MachineFormat::Shell) => println!("{}", output::shell_line(&outcome.machine)),
        Some(MachineFormat::Json) => {
            let line = serde_json::to_string(&outcome.machine).map_err(|e| {
                JavelinError::Generic {
                    message: format!("failed to encode result: {e}"),
                }
            })?;
            println!("{line}");
        }
    }
    Ok(())
}

/// A minimal line-oriented REPL: one query per line, empty line or `exit`
/// to leave. Query failures are printed but do not end the session.
fn repl(
    universe: &Universe,
    registry: &KeyRegistry,
    format: Option<MachineFormat>,
) -> Result<()> {
    loop {
        let line: String = match dialoguer::Input::<String>::new()
            .with_prompt("javelin")
            .allow_empty(true)
            .interact_text()
        {
            Ok(line) => line,
            Err(_) => return Ok(()),
        };
        let line = line.trim();
        if line.is_empty() || line == "exit" || line == "quit" {
            return Ok(());
        }
        if line == "help" {
            println!("keys: {}", registry.key_names().join(", "));
            continue;
        }

        let result = Query::parse(line).and_then(|query| {
            for command in &query.commands {
                execute(universe, registry, command, format)?;
            }
            Ok(())
        });
        if let Err(report) = result {
            eprintln!("{report:?}");
        }
    }
}

fn absolute(path: &std::path::Path) -> Result<PathBuf> {
    path.canonicalize().map_err(|e| {
        JavelinError::Generic {
            message: format!("cannot canonicalize {}: {e}", path.display()),
        }
        .into()
    })
}
