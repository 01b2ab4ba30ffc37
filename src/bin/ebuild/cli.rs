//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

/// EBuild - a C/C++ build system driven by declarative module definitions
#[derive(Parser)]
#[command(name = "ebuild")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose output (debug/info)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build a module and its dependencies
    Build(BuildArgs),

    /// Generate a secondary artifact (compile_commands.json)
    Generate(GenerateArgs),

    /// Run a graph check (circular-dependency)
    Check(CheckArgs),

    /// Print a resolved module attribute
    Property(PropertyArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct BuildArgs {
    /// Path to the module definition file (or its directory)
    pub module_path: PathBuf,

    /// Build with debug settings
    #[arg(long)]
    pub debug: bool,

    /// Remove intermediate outputs before building
    #[arg(long)]
    pub clean: bool,

    /// Number of parallel compile jobs (defaults to the CPU count)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Target platform (defaults to the host)
    #[arg(long)]
    pub target: Option<String>,

    /// Toolchain override
    #[arg(long)]
    pub toolchain: Option<String>,

    /// Root module options, repeatable
    #[arg(long = "option", value_name = "KEY=VALUE")]
    pub options: Vec<String>,

    /// Rebuild on source changes (watcher is provided by the host)
    #[arg(long)]
    pub watch: bool,
}

#[derive(Args)]
pub struct GenerateArgs {
    /// Artifact to generate (only `compile_commands.json`)
    pub artifact: String,

    /// Path to the module definition file (or its directory)
    pub module_path: PathBuf,

    /// Target platform (defaults to the host)
    #[arg(long)]
    pub target: Option<String>,

    /// Toolchain override
    #[arg(long)]
    pub toolchain: Option<String>,

    /// Root module options, repeatable
    #[arg(long = "option", value_name = "KEY=VALUE")]
    pub options: Vec<String>,
}

#[derive(Args)]
pub struct CheckArgs {
    /// Check to run (only `circular-dependency`)
    pub what: String,

    /// Path to the module definition file (or its directory)
    pub module_path: PathBuf,
}

#[derive(Args)]
pub struct PropertyArgs {
    /// Path to the module definition file (or its directory)
    pub module_path: PathBuf,

    /// Attribute to print (e.g. name, type, sources, includes, variant-id)
    pub property: String,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
