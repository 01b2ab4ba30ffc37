//! EBuild CLI - a C/C++ build system driven by declarative module definitions

use clap::Parser;
use ebuild::errors::BuildError;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};

/// Exit code for a cancelled build, distinct from ordinary failure.
const EXIT_CANCELLED: i32 = 130;

fn main() {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("ebuild=debug")
    } else if cli.quiet {
        EnvFilter::new("ebuild=error")
    } else {
        EnvFilter::new("ebuild=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let verbose = cli.verbose;
    let result = match cli.command {
        Commands::Build(args) => commands::build::execute(args, verbose),
        Commands::Generate(args) => commands::generate::execute(args),
        Commands::Check(args) => commands::check::execute(args),
        Commands::Property(args) => commands::property::execute(args),
        Commands::Completions(args) => commands::completions::execute(args),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {:#}", e);
            let code = match e.downcast_ref::<BuildError>() {
                Some(BuildError::Cancelled) => EXIT_CANCELLED,
                _ => 1,
            };
            std::process::exit(code);
        }
    }
}
