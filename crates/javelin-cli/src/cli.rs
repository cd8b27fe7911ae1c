//! CLI argument definitions.
//!
//! The surface is query-driven: zero or more `project/config:key input`
//! strings, executed in order. Flags switch the REPL, the output format,
//! and offline resolution.

use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "javelin",
    version,
    about = "A JVM build tool with a scoped, lazily evaluated key graph",
    long_about = "Javelin evaluates keys against layered scopes of projects, \
                  archetypes, and configurations, resolving Maven dependencies \
                  and assembling archives on demand.\n\n\
                  Queries look like `project/config1:config2:key input`, e.g.\n\
                  `app/testing:externalClasspath` or `clean; app/assembly`."
)]
pub struct Cli {
    /// Queries to execute in order; the remaining ones are abandoned after
    /// the first failure.
    pub queries: Vec<String>,

    /// Force the interactive REPL even when queries are given.
    #[arg(short, long)]
    pub interactive: bool,

    /// Emit results in a machine-readable format, one result per line.
    #[arg(long, value_name = "FORMAT")]
    pub machine_readable_output: Option<MachineFormat>,

    /// Disable remote fetches; rely on local caches only.
    #[arg(long)]
    pub offline: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MachineFormat {
    Shell,
    Json,
}

pub fn parse() -> Cli {
    Cli::parse()
}
