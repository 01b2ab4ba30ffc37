//! Build planning.
//!
//! Planning walks the resolved graph leaf-first and derives, per module, one
//! compile task per source plus one link task, each carrying a prebuilt
//! command. Execution and generators both consume the plan; generators never
//! execute it.

use std::collections::HashMap;
use std::path::PathBuf;

use petgraph::graph::NodeIndex;

use crate::builder::context::BuildContext;
use crate::core::module::{Define, Language, LibraryRef};
use crate::errors::Result;
use crate::graph::resolve::ModuleGraph;
use crate::toolchain::{CommandSpec, CompilerSettings, LinkSettings};

/// Execution state of one task. Terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Planned,
    Running,
    Succeeded,
    Failed,
    Cancelled,
    Skipped,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskState::Planned | TaskState::Running)
    }
}

/// One compiler invocation.
#[derive(Debug, Clone)]
pub struct CompileTask {
    pub module: String,
    pub source: PathBuf,
    pub output: PathBuf,
    pub command: CommandSpec,
}

/// One link (or archive) invocation.
#[derive(Debug, Clone)]
pub struct LinkTask {
    pub module: String,
    pub output: PathBuf,
    pub command: CommandSpec,
}

/// Everything needed to build one `(module, variant)` node.
#[derive(Debug)]
pub struct ModulePlan {
    pub name: String,
    pub variant_id: String,
    pub module_dir: PathBuf,
    pub intermediate_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Indices of dependency modules within the plan (always earlier).
    pub deps: Vec<usize>,
    pub compiles: Vec<CompileTask>,
    pub link: LinkTask,
}

/// A complete build plan in leaf-first topological order.
#[derive(Debug)]
pub struct BuildPlan {
    pub modules: Vec<ModulePlan>,
}

impl BuildPlan {
    /// Plan every node of a resolved (acyclic) graph.
    pub fn new(graph: &ModuleGraph, ctx: &BuildContext) -> Result<BuildPlan> {
        let platform = ctx.target_platform()?;
        let platform_definitions = platform.definitions();
        let platform_flags = platform.compiler_flags();

        let order = graph.topo_order();
        let mut index_of: HashMap<NodeIndex, usize> = HashMap::new();
        let mut modules = Vec::with_capacity(order.len());

        for ix in order {
            let node = graph.node(ix);
            let module = &node.instance.module;
            let tools = ctx.tools_for(module)?;

            let module_dir = node.instance.dir.clone();
            let variant_id = node.instance.variant_id.clone();
            let intermediate_dir = ctx.intermediate_dir(&module_dir, module.name(), &variant_id);
            let obj_dir = intermediate_dir.join("obj");
            let output_dir = ctx.output_dir(&module_dir, &variant_id);

            // Include paths: effective set, deduplicated by construction,
            // restricted to directories that exist.
            let include_dirs: Vec<PathBuf> = node
                .effective_includes()
                .into_iter()
                .filter(|d| d.is_dir())
                .collect();

            let mut definitions: Vec<Define> = platform_definitions.clone();
            for define in node.effective_definitions() {
                if !definitions.contains(&define) {
                    definitions.push(define);
                }
            }

            let module_options = node.effective_compiler_options();

            let settings_for = |language: Language, source: &PathBuf, output: &PathBuf| {
                CompilerSettings {
                    source: source.clone(),
                    output: output.clone(),
                    language,
                    architecture: platform.architecture(),
                    module_type: module.module_type(),
                    optimization: module.optimization(),
                    debug_symbols: module.enable_debug_symbols(),
                    c_standard: module.c_standard(),
                    cpp_standard: module.cpp_standard(),
                    include_dirs: include_dirs.clone(),
                    definitions: definitions.clone(),
                    forced_includes: module.forced_includes().to_vec(),
                    enable_exceptions: module.enable_exceptions(),
                    enable_rtti: module.enable_rtti(),
                    enable_fast_fp: module.enable_fast_fp(),
                    cpu_extension: module.cpu_extension(),
                    platform_flags: platform_flags.clone(),
                    module_options: module_options.clone(),
                    extra_flags: Vec::new(),
                }
            };

            let mut compiles = Vec::new();
            let mut objects = Vec::new();
            let mut used_outputs: Vec<PathBuf> = Vec::new();

            for source in module.sources() {
                let language = match Language::from_path(source) {
                    Some(l) => l,
                    None => {
                        tracing::warn!(
                            module = module.name(),
                            source = %source.display(),
                            "skipping source with unrecognized extension"
                        );
                        continue;
                    }
                };

                let driver = match language {
                    Language::Resource => match &tools.resource_compiler {
                        Some(rc) => rc.clone(),
                        None => {
                            tracing::warn!(
                                module = module.name(),
                                source = %source.display(),
                                "toolchain has no resource compiler; skipping"
                            );
                            continue;
                        }
                    },
                    _ => tools.compiler.clone(),
                };

                let rel = source
                    .strip_prefix(&module_dir)
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from(source.file_name().unwrap_or_default()));
                let mut output = obj_dir.join(rel).with_extension(driver.object_extension());
                // a.c and a.cpp would both land on a.o; disambiguate.
                let mut suffix = 1;
                while used_outputs.contains(&output) {
                    output.set_file_name(format!(
                        "{}-{}.{}",
                        output.file_stem().unwrap_or_default().to_string_lossy(),
                        suffix,
                        driver.object_extension()
                    ));
                    suffix += 1;
                }
                used_outputs.push(output.clone());

                let settings = settings_for(language, source, &output);
                compiles.push(CompileTask {
                    module: module.name().to_string(),
                    source: source.clone(),
                    output: output.clone(),
                    command: driver.compile_command(&settings),
                });
                objects.push(output);
            }

            // Link inputs: dependency artifacts first (dependents before
            // their own dependencies), then the module's effective library
            // references.
            let mut lib_dirs: Vec<PathBuf> = Vec::new();
            let mut libraries: Vec<LibraryRef> = Vec::new();
            for dep_ix in graph.transitive_deps(ix) {
                let dep = graph.node(dep_ix);
                if !dep.instance.module.module_type().is_library() {
                    continue;
                }
                let dep_out = ctx.output_dir(&dep.instance.dir, &dep.instance.variant_id);
                if !lib_dirs.contains(&dep_out) {
                    lib_dirs.push(dep_out);
                }
                let lib = LibraryRef::Name(dep.instance.module.name().to_string());
                if !libraries.contains(&lib) {
                    libraries.push(lib);
                }
            }
            for lib in node.effective_libraries() {
                if !libraries.contains(&lib) {
                    libraries.push(lib);
                }
            }

            // g++ drives the link when any module in the closure has C++
            // sources.
            let mut link_language = module.link_language();
            if link_language != Language::Cxx {
                let any_cxx = graph.transitive_deps(ix).into_iter().any(|dep_ix| {
                    graph.node(dep_ix).instance.module.link_language() == Language::Cxx
                });
                if any_cxx {
                    link_language = Language::Cxx;
                }
            }

            let output = output_dir.join(
                tools
                    .linker
                    .output_filename(module.name(), module.module_type()),
            );
            let link_settings = LinkSettings {
                objects,
                output: output.clone(),
                module_type: module.module_type(),
                language: link_language,
                lib_dirs,
                libraries,
                linker_options: node.effective_linker_options(),
                delay_load_dlls: module.delay_load_dlls().to_vec(),
                debug_symbols: module.enable_debug_symbols(),
            };

            let link = LinkTask {
                module: module.name().to_string(),
                output,
                command: tools.linker.link_command(&link_settings),
            };

            let deps: Vec<usize> = {
                let mut deps = Vec::new();
                for (dep_ix, _) in &node.deps {
                    if let Some(&i) = index_of.get(dep_ix) {
                        if !deps.contains(&i) {
                            deps.push(i);
                        }
                    }
                }
                deps
            };

            index_of.insert(ix, modules.len());
            modules.push(ModulePlan {
                name: module.name().to_string(),
                variant_id,
                module_dir,
                intermediate_dir,
                output_dir,
                deps,
                compiles,
                link,
            });
        }

        Ok(BuildPlan { modules })
    }

    /// Total number of compile tasks.
    pub fn compile_count(&self) -> usize {
        self.modules.iter().map(|m| m.compiles.len()).sum()
    }

    /// Total number of link tasks.
    pub fn link_count(&self) -> usize {
        self.modules.len()
    }

    /// Find a module plan by name.
    pub fn find(&self, name: &str) -> Option<&ModulePlan> {
        self.modules.iter().find(|m| m.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reference::ModuleReference;
    use crate::graph::instance::Instancer;
    use crate::graph::resolve::ResolveMode;
    use crate::loader::TomlLoader;
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn context() -> BuildContext {
        let mut ctx = BuildContext::with_builtins().unwrap();
        ctx.target = "unix".to_string();
        ctx.require_tools = false;
        ctx.cache_root = None;
        ctx
    }

    fn plan_for(dir: &Path, root: &str) -> (BuildPlan, BuildContext) {
        let ctx = context();
        let instancer = Instancer::new(
            Arc::new(TomlLoader::new()),
            "unix",
            "unix",
            None,
            false,
            false,
        );
        let graph =
            ModuleGraph::resolve(&instancer, &ModuleReference::new(root), dir, ResolveMode::Build)
                .unwrap();
        (BuildPlan::new(&graph, &ctx).unwrap(), ctx)
    }

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_single_source_static_library_plan() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.c", "int a(void) { return 1; }\n");
        write(
            tmp.path(),
            "lib.ebuild",
            r#"
            [[modules]]
            name = "lib"
            type = "static-library"
            c-standard = "c17"
            sources = ["a.c"]
            "#,
        );

        let (plan, _ctx) = plan_for(tmp.path(), "lib.ebuild");
        assert_eq!(plan.compile_count(), 1);
        assert_eq!(plan.link_count(), 1);

        let m = &plan.modules[0];
        let compile = &m.compiles[0];

        // gcc -c -o <obj> -O2 -std=c17 <src>
        assert!(compile.command.program.to_string_lossy().contains("gcc"));
        let args = &compile.command.args;
        assert_eq!(args[0], "-c");
        assert_eq!(args[1], "-o");
        assert!(args[2].ends_with("obj/a.o"));
        assert!(args[2].contains(".ebuild"));
        assert_eq!(args[3], "-O2");
        assert_eq!(args[4], "-std=c17");
        assert!(args[5].ends_with("a.c"));

        // ar rcs Binaries/<vid>/liblib.a <obj>
        assert!(m.link.command.program.to_string_lossy().contains("ar"));
        assert_eq!(m.link.command.args[0], "rcs");
        assert!(m.link.command.args[1].ends_with("liblib.a"));
        assert!(m.link.command.args[1].contains("Binaries"));
        assert!(m.link.command.args[2].ends_with("a.o"));
    }

    #[test]
    fn test_objects_follow_source_declaration_order() {
        let tmp = TempDir::new().unwrap();
        for name in ["z.c", "a.c", "m.c"] {
            write(tmp.path(), name, "");
        }
        write(
            tmp.path(),
            "lib.ebuild",
            r#"
            [[modules]]
            name = "lib"
            type = "static-library"
            sources = ["z.c", "a.c", "m.c"]
            "#,
        );

        let (plan, _ctx) = plan_for(tmp.path(), "lib.ebuild");
        let link_args = &plan.modules[0].link.command.args;

        // `ar rcs <out>` then the objects in declaration order.
        assert!(link_args[2].ends_with("z.o"));
        assert!(link_args[3].ends_with("a.o"));
        assert!(link_args[4].ends_with("m.o"));
    }

    #[test]
    fn test_public_includes_propagate_private_do_not() {
        let tmp = TempDir::new().unwrap();
        let pub_inc = tmp.path().join("p/pub");
        let priv_inc = tmp.path().join("p/priv");
        fs::create_dir_all(&pub_inc).unwrap();
        fs::create_dir_all(&priv_inc).unwrap();

        let dep_dir = tmp.path().join("p");
        write(&dep_dir, "dep.ebuild", {
            r#"
            [[modules]]
            name = "dep"
            type = "static-library"

            [modules.includes]
            public = ["pub"]
            private = ["priv"]
            "#
        });
        write(tmp.path(), "c.c", "");
        write(
            tmp.path(),
            "consumer.ebuild",
            r#"
            [[modules]]
            name = "consumer"
            type = "executable"
            sources = ["c.c"]

            [modules.dependencies]
            public = ["p/dep.ebuild"]
            "#,
        );

        let (plan, _ctx) = plan_for(tmp.path(), "consumer.ebuild");
        let consumer = plan.find("consumer").unwrap();
        let args = &consumer.compiles[0].command.args;

        let pub_flag = format!("-I{}", pub_inc.canonicalize().unwrap().display());
        let priv_flag = format!("-I{}", priv_inc.canonicalize().unwrap().display());
        assert!(args.contains(&pub_flag), "missing {pub_flag} in {args:?}");
        assert!(!args.contains(&priv_flag), "unexpected {priv_flag}");
    }

    #[test]
    fn test_dependency_artifacts_join_link_inputs() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "dep.c", "");
        write(
            tmp.path(),
            "dep.ebuild",
            r#"
            [[modules]]
            name = "dep"
            type = "static-library"
            sources = ["dep.c"]

            [modules.libraries]
            public = ["m"]
            "#,
        );
        write(tmp.path(), "main.c", "");
        write(
            tmp.path(),
            "app.ebuild",
            r#"
            [[modules]]
            name = "app"
            type = "executable"
            sources = ["main.c"]

            [modules.dependencies]
            public = ["dep.ebuild"]
            "#,
        );

        let (plan, _ctx) = plan_for(tmp.path(), "app.ebuild");
        let app = plan.find("app").unwrap();
        let args = &app.link.command.args;

        assert!(args.iter().any(|a| a.starts_with("-L") && a.contains("Binaries")));
        assert!(args.contains(&"-ldep".to_string()));
        // The dependency's public system library reaches the executable.
        assert!(args.contains(&"-lm".to_string()));
    }

    #[test]
    fn test_empty_module_still_has_a_link_task() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "empty.ebuild",
            r#"
            [[modules]]
            name = "empty"
            type = "static-library"
            "#,
        );

        let (plan, _ctx) = plan_for(tmp.path(), "empty.ebuild");
        assert_eq!(plan.compile_count(), 0);
        assert_eq!(plan.link_count(), 1);
        // `ar rcs <out>` with no objects; the tool itself will reject it.
        assert_eq!(plan.modules[0].link.command.args.len(), 2);
    }

    #[test]
    fn test_option_derived_define_reaches_compile_argv() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.c", "");
        write(
            tmp.path(),
            "lib.ebuild",
            r#"
            [[modules]]
            name = "lib"
            type = "static-library"
            sources = ["a.c"]

            [modules.options.fast]
            type = "bool"
            changes-binary = true
            define = "FAST_PATH"
            "#,
        );
        write(
            tmp.path(),
            "app.ebuild",
            r#"
            [[modules]]
            name = "app"
            type = "executable"

            [[modules.dependencies.public]]
            path = "lib.ebuild"
            options = { fast = "true" }
            "#,
        );

        let (plan, _ctx) = plan_for(tmp.path(), "app.ebuild");
        let lib = plan.find("lib").unwrap();
        assert!(lib.compiles[0]
            .command
            .args
            .contains(&"-DFAST_PATH".to_string()));
    }

    #[test]
    fn test_executable_links_shared_dependency_import_library_on_win32() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "impl.c", "");
        write(
            tmp.path(),
            "engine.ebuild",
            r#"
            [[modules]]
            name = "engine"
            type = "shared-library"
            sources = ["impl.c"]
            "#,
        );
        write(tmp.path(), "main.c", "");
        write(
            tmp.path(),
            "app.ebuild",
            r#"
            [[modules]]
            name = "app"
            type = "executable"
            sources = ["main.c"]

            [modules.dependencies]
            public = ["engine.ebuild"]
            "#,
        );

        let mut ctx = context();
        ctx.target = "win32".to_string();

        let instancer = Instancer::new(
            Arc::new(TomlLoader::new()),
            "unix",
            "win32",
            None,
            false,
            false,
        );
        let graph = ModuleGraph::resolve(
            &instancer,
            &ModuleReference::new("app.ebuild"),
            tmp.path(),
            ResolveMode::Build,
        )
        .unwrap();
        let plan = BuildPlan::new(&graph, &ctx).unwrap();

        let app = plan.find("app").unwrap();
        let args = &app.link.command.args;
        // link.exe receives the dependency's import-library entry.
        assert!(args.contains(&"engine.lib".to_string()), "{args:?}");
        assert!(args
            .iter()
            .any(|a| a.starts_with("/LIBPATH:") && a.contains("Binaries")));
    }

    #[test]
    fn test_task_state_terminality() {
        assert!(!TaskState::Planned.is_terminal());
        assert!(!TaskState::Running.is_terminal());
        for state in [
            TaskState::Succeeded,
            TaskState::Failed,
            TaskState::Cancelled,
            TaskState::Skipped,
        ] {
            assert!(state.is_terminal());
        }
    }
}
