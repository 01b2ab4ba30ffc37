//! `ebuild generate compile_commands.json` - emit the compilation database.

use anyhow::Result;

use ebuild::builder::{BuildContext, BuildPlan};
use ebuild::generators::write_compile_commands;
use ebuild::graph::ResolveMode;

use crate::cli::GenerateArgs;

use super::{parse_options, resolve_graph, EXIT_USAGE};

pub fn execute(args: GenerateArgs) -> Result<i32> {
    if args.artifact != "compile_commands.json" {
        eprintln!(
            "error: unknown artifact `{}` (expected `compile_commands.json`)",
            args.artifact
        );
        return Ok(EXIT_USAGE);
    }

    let options = match parse_options(&args.options) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("error: {:#}", e);
            return Ok(EXIT_USAGE);
        }
    };

    let mut ctx = BuildContext::with_builtins()?;
    if let Some(target) = &args.target {
        ctx.target = target.clone();
    }
    ctx.toolchain_override = args.toolchain.clone();
    // Argv construction only; the tools need not be installed.
    ctx.require_tools = false;

    let (_instancer, graph) = resolve_graph(
        &args.module_path,
        &ctx.target,
        args.toolchain,
        options,
        false,
        false,
        ResolveMode::Build,
    )?;

    let plan = BuildPlan::new(&graph, &ctx)?;
    let out = graph
        .node(graph.root())
        .instance
        .dir
        .join("compile_commands.json");
    write_compile_commands(&plan, &out)?;

    println!("{}", out.display());
    Ok(0)
}
