//! The standard key set and the JVM base archetype binding them.

use std::collections::BTreeMap;
use std::path::PathBuf;

use javelin_assembly::{assemble, merge, sources_from_classpath, AssemblyOptions};
use javelin_core::dependency::Dependency;
use javelin_core::repository::Repository;
use javelin_eval::cache::{self, Fingerprint};
use javelin_eval::{Archetype, ArchetypeBuilder, Key};
use javelin_maven::fetcher::Fetcher;
use javelin_resolver::resolve;
use javelin_util::errors::JavelinError;

/// Environment variable holding a JDWP debug port for `runOptions`.
pub const RUN_DEBUG_PORT_VAR: &str = "JAVELIN_RUN_DEBUG_PORT";

/// The standard keys every project scope understands.
#[derive(Debug)]
pub struct StandardKeys {
    pub project_name: Key<String>,
    pub project_group: Key<String>,
    pub project_version: Key<String>,
    pub build_dir: Key<PathBuf>,
    pub repositories: Key<Vec<Repository>>,
    pub library_dependencies: Key<Vec<Dependency>>,
    pub internal_classpath: Key<Vec<PathBuf>>,
    pub external_classpath: Key<Vec<PathBuf>>,
    pub dependency_tree: Key<String>,
    pub run_options: Key<Vec<String>>,
    pub run_environment: Key<BTreeMap<String, String>>,
    pub assembly_output: Key<PathBuf>,
    pub assembly: Key<PathBuf>,
    pub clean: Key<u32>,
}

/// Construct the standard key set. Keys compare by name, so every call
/// yields interchangeable handles.
pub fn standard_keys() -> StandardKeys {
    let plain = |s: &String| s.clone();
    let path = |p: &PathBuf| p.display().to_string();
    let paths = |ps: &Vec<PathBuf>| {
        ps.iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join("\n")
    };

    StandardKeys {
        project_name: Key::new("projectName", "Name of the project").with_printer(plain),
        project_group: Key::new("projectGroup", "Maven group of the project")
            .with_default(String::new())
            .with_printer(plain),
        project_version: Key::new("projectVersion", "Version of the project")
            .with_default("0.0.0-SNAPSHOT".to_string())
            .with_printer(plain),
        build_dir: Key::new("buildDir", "Directory with build sources and outputs")
            .with_printer(path),
        repositories: Key::new("repositories", "Repositories used to resolve dependencies")
            .with_printer(|repos: &Vec<Repository>| {
                repos.iter().map(Repository::to_string).collect::<Vec<_>>().join("\n")
            }),
        library_dependencies: Key::new(
            "libraryDependencies",
            "Maven coordinates of library dependencies",
        )
        .with_default(Vec::new())
        .with_printer(|deps: &Vec<Dependency>| {
            deps.iter().map(Dependency::to_string).collect::<Vec<_>>().join("\n")
        }),
        internal_classpath: Key::new(
            "internalClasspath",
            "Classpath entries produced by this project and its aggregates",
        )
        .with_default(Vec::new())
        .with_printer(paths),
        external_classpath: Key::new(
            "externalClasspath",
            "Classpath entries resolved from repositories",
        )
        .with_printer(paths),
        dependency_tree: Key::new("dependencyTree", "Resolved dependency tree rendering")
            .with_printer(plain),
        run_options: Key::new("runOptions", "JVM options for running the project")
            .with_input_key("debugPort", "JDWP port to listen on")
            .with_printer(|opts: &Vec<String>| opts.join(" ")),
        run_environment: Key::new(
            "runEnvironment",
            "Environment variables forwarded to spawned processes",
        )
        .with_default(BTreeMap::new()),
        assembly_output: Key::new("assemblyOutput", "Path of the assembled archive")
            .with_printer(path),
        assembly: Key::new("assembly", "Assemble the classpath into a single archive")
            .with_printer(path),
        clean: Key::new("clean", "Delete expendable cache entries; returns the count")
            .with_printer(|count: &u32| format!("{count} removed")),
    }
}

/// The base archetype shared by every JVM project: wires the resolver and
/// the assembly pipeline into the key graph.
pub fn jvm_archetype(keys: &StandardKeys, repositories: Vec<Repository>, offline: bool) -> Archetype {
    let mut builder = ArchetypeBuilder::new("jvm");

    builder = builder.bind(&keys.repositories, cache::constant(repositories));

    // Resolution is memoized per (dependencies, repositories) fingerprint;
    // a second evaluation in the same process is a cache hit.
    {
        let deps_key = keys.library_dependencies.clone();
        let repos_key = keys.repositories.clone();
        builder = builder.bind(
            &keys.external_classpath,
            cache::input_cached(
                {
                    let deps_key = deps_key.clone();
                    let repos_key = repos_key.clone();
                    move |eval| {
                        let deps = eval.get(&deps_key)?;
                        let repos = eval.get(&repos_key)?;
                        Ok(Fingerprint::text(format!("{deps:?}|{repos:?}|{offline}")))
                    }
                },
                move |eval| {
                    let deps = eval.get(&deps_key)?;
                    let repos = eval.get(&repos_key)?;
                    let fetcher = Fetcher::new(offline)?;
                    let resolution = resolve(&deps, &repos, &fetcher)?;
                    if !resolution.complete {
                        return Err(JavelinError::Resolution {
                            message: resolution.error_report(),
                        }
                        .into());
                    }
                    if !resolution.conflicts.is_empty() {
                        tracing::debug!("{}", resolution.conflicts);
                    }
                    Ok(resolution.classpath())
                },
            ),
        );
    }

    {
        let deps_key = keys.library_dependencies.clone();
        let repos_key = keys.repositories.clone();
        builder = builder.bind(&keys.dependency_tree, move |eval| {
            let deps = eval.get(&deps_key)?;
            let repos = eval.get(&repos_key)?;
            let fetcher = Fetcher::new(offline)?;
            let resolution = resolve(&deps, &repos, &fetcher)?;
            let mut tree = resolution.render_tree();
            if !resolution.complete {
                tree.push_str("\nIncomplete:\n");
                tree.push_str(&resolution.error_report());
            }
            Ok(tree)
        });
    }

    {
        let name_key = keys.project_name.clone();
        let build_dir_key = keys.build_dir.clone();
        builder = builder.bind(&keys.assembly_output, move |eval| {
            let name = eval.get(&name_key)?;
            let build_dir = eval.get(&build_dir_key)?;
            Ok(build_dir.join("artifacts").join(format!("{name}-assembly.jar")))
        });
    }

    {
        let internal_key = keys.internal_classpath.clone();
        let external_key = keys.external_classpath.clone();
        let output_key = keys.assembly_output.clone();
        builder = builder.bind(&keys.assembly, move |eval| {
            let internal = eval.get(&internal_key)?;
            let external = eval.get(&external_key)?;
            let output = eval.get(&output_key)?;

            let mut entries = internal.clone();
            entries.extend(external);
            let sources = sources_from_classpath(&entries, internal.len());
            let options = AssemblyOptions {
                strategy: merge::jar_chooser(),
                ..AssemblyOptions::default()
            };
            assemble(&sources, &options, &output)?;
            Ok(output)
        });
    }

    builder = builder.bind(&keys.run_options, |eval| {
        let mut options = Vec::new();
        let port = match std::env::var(RUN_DEBUG_PORT_VAR) {
            Ok(value) => value.trim().parse::<u16>().ok(),
            Err(_) => None,
        };
        let port = match port {
            Some(port) => Some(port),
            None => eval.read_input("debugPort", "JDWP debug port", |text| {
                text.parse::<u16>().map_err(|e| e.to_string())
            })?,
        };
        if let Some(port) = port {
            options.push(format!(
                "-agentlib:jdwp=transport=dt_socket,server=y,suspend=y,address={port}"
            ));
        }
        Ok(options)
    });

    {
        let build_dir_key = keys.build_dir.clone();
        builder = builder.bind(&keys.clean, move |eval| {
            let build_dir = eval.get(&build_dir_key)?;
            clean_cache(&build_dir.join("cache"))
        });
    }

    builder.build()
}

/// Delete expendable cache entries: everything under `cache_dir` whose name
/// starts with `-`.
fn clean_cache(cache_dir: &std::path::Path) -> miette::Result<u32> {
    let mut removed = 0u32;
    let Ok(entries) = std::fs::read_dir(cache_dir) else {
        return Ok(0);
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        if !name.to_string_lossy().starts_with('-') {
            continue;
        }
        let path = entry.path();
        let result = if path.is_dir() {
            std::fs::remove_dir_all(&path)
        } else {
            std::fs::remove_file(&path)
        };
        match result {
            Ok(()) => removed += 1,
            Err(e) => tracing::warn!("failed to remove {}: {e}", path.display()),
        }
    }
    Ok(removed)
}
