//! `ebuild build` - resolve the graph and build the root module and its
//! dependencies.

use anyhow::Result;

use ebuild::builder::{BuildContext, BuildExecutor, BuildPlan};
use ebuild::errors::BuildError;
use ebuild::graph::ResolveMode;

use crate::cli::BuildArgs;

use super::{parse_options, resolve_graph, EXIT_USAGE};

pub fn execute(args: BuildArgs, verbose: bool) -> Result<i32> {
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
    ctx.jobs = args.jobs;
    ctx.debug = args.debug;
    ctx.clean = args.clean;
    ctx.watching = args.watch;

    let (instancer, graph) = resolve_graph(
        &args.module_path,
        &ctx.target,
        args.toolchain,
        options,
        args.watch,
        args.debug,
        ResolveMode::Build,
    )?;

    // Setup phase: let modules fetch or generate sources before planning.
    for ix in graph.topo_order() {
        let node = graph.node(ix);
        instancer
            .loader()
            .prepare_sources(&node.instance.module, &node.instance.dir)
            .map_err(|e| BuildError::SetupFailure {
                module: node.instance.module.name().to_string(),
                reason: e.to_string(),
            })?;
    }

    let plan = BuildPlan::new(&graph, &ctx)?;
    tracing::info!(
        modules = plan.link_count(),
        sources = plan.compile_count(),
        "build plan ready"
    );

    let start = std::time::Instant::now();
    let report = BuildExecutor::new(&ctx).verbose(verbose).execute(&plan)?;

    if report.success() {
        eprintln!(
            "    Finished {} module(s) in {:.2}s",
            report.artifacts.len(),
            start.elapsed().as_secs_f64()
        );
        Ok(0)
    } else {
        eprintln!(
            "error: {} module(s) failed, {} skipped",
            report.failed.len(),
            report.skipped.len()
        );
        Ok(1)
    }
}
