//! `compile_commands.json` generation for IDE and tooling integration.
//!
//! One entry per planned compile task, in the walked graph's
//! source-declaration order. The `command` string is the shell-escaped argv
//! the compiler driver would run; `directory` is the module's intermediate
//! directory. The file is written atomically (temp file + rename), UTF-8
//! with LF line endings.

use std::borrow::Cow;
use std::path::Path;

use serde::Serialize;

use crate::builder::plan::BuildPlan;
use crate::errors::{BuildError, Result};
use crate::toolchain::CommandSpec;
use crate::util::fs::write_atomic;

/// One compilation database entry.
#[derive(Debug, Serialize)]
struct Entry {
    directory: String,
    command: String,
    file: String,
}

/// Emit the compilation database for a plan.
pub fn write_compile_commands(plan: &BuildPlan, path: &Path) -> Result<()> {
    let entries: Vec<Entry> = plan
        .modules
        .iter()
        .flat_map(|module| {
            module.compiles.iter().map(|task| Entry {
                directory: module.intermediate_dir.display().to_string(),
                command: shell_join(&task.command),
                file: task.source.display().to_string(),
            })
        })
        .collect();

    let mut json = serde_json::to_string_pretty(&entries).map_err(|e| {
        BuildError::io(path, std::io::Error::other(e))
    })?;
    json.push('\n');

    write_atomic(path, json.as_bytes())
}

/// Join a command into one shell-safe string.
pub fn shell_join(command: &CommandSpec) -> String {
    let mut parts = vec![shell_escape(&command.program.display().to_string()).into_owned()];
    parts.extend(command.args.iter().map(|a| shell_escape(a).into_owned()));
    parts.join(" ")
}

/// Quote an argument for POSIX shells when it contains anything outside the
/// safe character set.
fn shell_escape(arg: &str) -> Cow<'_, str> {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-+=/.,:@%^".contains(c));
    if safe {
        return Cow::Borrowed(arg);
    }
    Cow::Owned(format!("'{}'", arg.replace('\'', r"'\''")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::context::BuildContext;
    use crate::builder::plan::BuildPlan;
    use crate::core::reference::ModuleReference;
    use crate::graph::instance::Instancer;
    use crate::graph::resolve::{ModuleGraph, ResolveMode};
    use crate::loader::TomlLoader;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_shell_escape() {
        assert_eq!(shell_escape("plain-arg_1.c"), "plain-arg_1.c");
        assert_eq!(shell_escape("-DVERSION=3"), "-DVERSION=3");
        assert_eq!(shell_escape("has space"), "'has space'");
        assert_eq!(shell_escape("it's"), r"'it'\''s'");
        assert_eq!(shell_escape(""), "''");
    }

    #[test]
    fn test_shell_join() {
        let cmd = CommandSpec::new("gcc").arg("-c").arg("-DNAME=a b");
        assert_eq!(shell_join(&cmd), "gcc -c '-DNAME=a b'");
    }

    #[test]
    fn test_database_entries_in_declaration_order() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.cpp"), "").unwrap();
        fs::write(tmp.path().join("b.cpp"), "").unwrap();
        fs::write(
            tmp.path().join("lib.ebuild"),
            r#"
            [[modules]]
            name = "lib"
            type = "static-library"
            sources = ["a.cpp", "b.cpp"]
            "#,
        )
        .unwrap();

        let mut ctx = BuildContext::with_builtins().unwrap();
        ctx.target = "unix".to_string();
        ctx.require_tools = false;
        ctx.cache_root = None;

        let instancer = Instancer::new(
            Arc::new(TomlLoader::new()),
            "unix",
            "unix",
            None,
            false,
            false,
        );
        let graph = ModuleGraph::resolve(
            &instancer,
            &ModuleReference::new("lib.ebuild"),
            tmp.path(),
            ResolveMode::Build,
        )
        .unwrap();
        let plan = BuildPlan::new(&graph, &ctx).unwrap();

        let out = tmp.path().join("compile_commands.json");
        write_compile_commands(&plan, &out).unwrap();

        let text = fs::read_to_string(&out).unwrap();
        let entries: Vec<serde_json::Value> = serde_json::from_str(&text).unwrap();

        assert_eq!(entries.len(), 2);
        assert!(entries[0]["file"].as_str().unwrap().ends_with("a.cpp"));
        assert!(entries[1]["file"].as_str().unwrap().ends_with("b.cpp"));
        // Absolute paths, commands starting with the configured compiler.
        for entry in &entries {
            assert!(entry["file"].as_str().unwrap().starts_with('/'));
            assert!(entry["command"].as_str().unwrap().contains("++"));
            assert!(entry["directory"].as_str().unwrap().contains(".ebuild"));
        }
        assert!(text.ends_with('\n'));
    }
}
