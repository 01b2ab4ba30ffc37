//! `ebuild check circular-dependency` - resolve the graph and report cycles.

use anyhow::Result;

use ebuild::graph::ResolveMode;

use crate::cli::CheckArgs;

use super::{resolve_graph, EXIT_USAGE};

pub fn execute(args: CheckArgs) -> Result<i32> {
    if args.what != "circular-dependency" {
        eprintln!(
            "error: unknown check `{}` (expected `circular-dependency`)",
            args.what
        );
        return Ok(EXIT_USAGE);
    }

    let (_instancer, graph) = resolve_graph(
        &args.module_path,
        ebuild::core::platform::host_platform_name(),
        None,
        Default::default(),
        false,
        false,
        ResolveMode::Check,
    )?;

    if graph.cycles().is_empty() {
        println!("no circular dependencies");
        return Ok(0);
    }

    for chain in graph.cycles() {
        println!("{}", chain);
    }
    Ok(1)
}
