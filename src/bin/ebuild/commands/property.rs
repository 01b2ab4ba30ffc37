//! `ebuild property` - print a resolved module attribute.

use anyhow::Result;

use ebuild::graph::ResolveMode;

use crate::cli::PropertyArgs;

const KNOWN: &[&str] = &[
    "name",
    "type",
    "sources",
    "includes",
    "definitions",
    "libraries",
    "compiler-options",
    "linker-options",
    "cpp-standard",
    "c-standard",
    "optimization",
    "cpu-extension",
    "variant-id",
    "options",
];

pub fn execute(args: PropertyArgs) -> Result<i32> {
    let (_instancer, graph) = super::resolve_graph(
        &args.module_path,
        ebuild::core::platform::host_platform_name(),
        None,
        Default::default(),
        false,
        false,
        ResolveMode::Check,
    )?;

    let instance = &graph.node(graph.root()).instance;
    let module = &instance.module;

    match args.property.as_str() {
        "name" => println!("{}", module.name()),
        "type" => println!("{}", module.module_type()),
        "sources" => {
            for source in module.sources() {
                println!("{}", source.display());
            }
        }
        "includes" => {
            for dir in module.includes().joined() {
                println!("{}", dir.display());
            }
        }
        "definitions" => {
            for define in module.definitions().joined() {
                println!("{}", define);
            }
        }
        "libraries" => {
            for lib in module.libraries().joined() {
                println!("{}", lib);
            }
        }
        "compiler-options" => {
            for opt in module.compiler_options().joined() {
                println!("{}", opt);
            }
        }
        "linker-options" => {
            for opt in module.linker_options().joined() {
                println!("{}", opt);
            }
        }
        "cpp-standard" => println!("{}", module.cpp_standard()),
        "c-standard" => {
            if let Some(std) = module.c_standard() {
                println!("{}", std);
            }
        }
        "optimization" => println!("{}", module.optimization()),
        "cpu-extension" => println!("{}", module.cpu_extension()),
        "variant-id" => println!("{}", instance.variant_id),
        "options" => {
            for (name, value) in module.options() {
                println!("{}={}", name, value);
            }
        }
        unknown => {
            eprintln!(
                "error: unknown property `{}` (known: {})",
                unknown,
                KNOWN.join(", ")
            );
            return Ok(1);
        }
    }

    Ok(0)
}
