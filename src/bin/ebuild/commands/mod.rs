//! CLI command implementations.

pub mod build;
pub mod check;
pub mod completions;
pub mod generate;
pub mod property;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use ebuild::core::platform::host_platform_name;
use ebuild::core::ModuleReference;
use ebuild::graph::{Instancer, ModuleGraph, ResolveMode};
use ebuild::loader::TomlLoader;

/// Usage-error exit code.
pub const EXIT_USAGE: i32 = 2;

/// Parse repeated `--option k=v` pairs.
pub fn parse_options(pairs: &[String]) -> Result<BTreeMap<String, String>> {
    let mut options = BTreeMap::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("invalid --option `{}`: expected KEY=VALUE", pair))?;
        if key.is_empty() {
            bail!("invalid --option `{}`: empty key", pair);
        }
        options.insert(key.to_string(), value.to_string());
    }
    Ok(options)
}

/// Build the instancer and resolve the graph for a root module path.
pub fn resolve_graph(
    module_path: &Path,
    target: &str,
    toolchain: Option<String>,
    options: BTreeMap<String, String>,
    watching: bool,
    debug: bool,
    mode: ResolveMode,
) -> Result<(Arc<Instancer>, ModuleGraph)> {
    let instancer = Arc::new(Instancer::new(
        Arc::new(TomlLoader::new()),
        host_platform_name(),
        target,
        toolchain,
        watching,
        debug,
    ));

    let reference = ModuleReference {
        path: module_path.to_path_buf(),
        module: None,
        options,
        transformer: None,
    };

    let cwd = std::env::current_dir().context("failed to determine working directory")?;
    let graph = ModuleGraph::resolve(&instancer, &reference, &cwd, mode)?;
    Ok((instancer, graph))
}
