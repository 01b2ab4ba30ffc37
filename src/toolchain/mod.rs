//! Toolchain abstraction: factories and drivers that translate abstract
//! compile/link settings into concrete process invocations.
//!
//! A toolchain names a compiler factory and a type-directed linker factory
//! (archiver for static libraries, linker otherwise), both resolved through
//! the registries in the build context. Factories verify applicability
//! (`can_create`) and availability (`is_available`); drivers build argv.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::module::{
    CStandard, CppStandard, CpuExtension, Define, Language, LibraryRef, Module, ModuleType,
    Optimization,
};
use crate::core::platform::{Architecture, Platform};

mod detect;
mod gcc;
mod msvc;

pub use detect::{find_tool, find_tool_or};
pub use gcc::{ArArchiverFactory, GccCompilerFactory, GccLinkerFactory};
pub use msvc::{
    MsvcCompilerFactory, MsvcLibFactory, MsvcLinkerFactory, MsvcResourceCompilerFactory,
};

/// A command to execute, with program, arguments, and environment.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// The program to run (e.g., "gcc", "cl.exe")
    pub program: PathBuf,
    /// Command arguments
    pub args: Vec<String>,
    /// Environment variables to set
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    /// Create a new command spec.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        CommandSpec {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Add an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments.
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(|a| a.into()));
        self
    }

    /// Add an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// Fully resolved inputs for one compiler invocation.
#[derive(Debug, Clone)]
pub struct CompilerSettings {
    pub source: PathBuf,
    pub output: PathBuf,
    pub language: Language,
    pub architecture: Architecture,
    pub module_type: ModuleType,
    pub optimization: Optimization,
    pub debug_symbols: bool,
    pub c_standard: Option<CStandard>,
    pub cpp_standard: CppStandard,
    /// Deduplicated, existing include directories.
    pub include_dirs: Vec<PathBuf>,
    /// Platform, module, and option-derived definitions.
    pub definitions: Vec<Define>,
    pub forced_includes: Vec<PathBuf>,
    pub enable_exceptions: bool,
    pub enable_rtti: bool,
    pub enable_fast_fp: bool,
    pub cpu_extension: CpuExtension,
    pub platform_flags: Vec<String>,
    /// The module's effective compiler options.
    pub module_options: Vec<String>,
    pub extra_flags: Vec<String>,
}

/// Fully resolved inputs for one link (or archive) invocation.
#[derive(Debug, Clone)]
pub struct LinkSettings {
    /// Object files, in source-declaration order.
    pub objects: Vec<PathBuf>,
    pub output: PathBuf,
    pub module_type: ModuleType,
    /// Language driving the link step (selects gcc vs g++).
    pub language: Language,
    pub lib_dirs: Vec<PathBuf>,
    pub libraries: Vec<LibraryRef>,
    pub linker_options: Vec<String>,
    pub delay_load_dlls: Vec<String>,
    pub debug_symbols: bool,
}

/// Translates compiler settings into a concrete invocation.
pub trait CompilerDriver: Send + Sync + std::fmt::Debug {
    fn compile_command(&self, settings: &CompilerSettings) -> CommandSpec;

    /// Object file extension (`o` / `obj` / `res`).
    fn object_extension(&self) -> &'static str;
}

/// Translates link settings into a concrete invocation.
pub trait LinkerDriver: Send + Sync + std::fmt::Debug {
    fn link_command(&self, settings: &LinkSettings) -> CommandSpec;

    /// Artifact filename for a module name and type (`libfoo.a`, `foo.exe`).
    fn output_filename(&self, name: &str, module_type: ModuleType) -> String;
}

/// Applicability and availability checks shared by all factories.
pub trait ToolFactory: Send + Sync {
    /// Display name of the tool this factory drives.
    fn name(&self) -> &str;

    /// Whether this factory can drive a build of the given module.
    fn can_create(&self, module: &Module) -> bool;

    /// Whether the tool is usable on the given platform: the platform family
    /// matches and the executable is discoverable on PATH or at a configured
    /// location.
    fn is_available(&self, platform: &dyn Platform) -> bool;
}

/// Constructs compiler drivers.
pub trait CompilerFactory: ToolFactory {
    fn create(&self) -> Arc<dyn CompilerDriver>;
}

/// Constructs linker (or archiver) drivers.
pub trait LinkerFactory: ToolFactory {
    fn create(&self) -> Arc<dyn LinkerDriver>;
}

/// A named pairing of compiler and linker factories.
pub trait Toolchain: Send + Sync + std::fmt::Debug {
    /// Registry name of the toolchain.
    fn name(&self) -> &str;

    /// Registry name of the compiler factory.
    fn compiler_factory(&self) -> &str;

    /// Registry name of the linker factory for a module type. Static
    /// libraries route to the archiver; everything else to the linker.
    fn linker_factory(&self, module_type: ModuleType) -> &str;

    /// Registry name of the resource compiler factory, when the toolchain
    /// offers one (windowed-executable metadata on Win32-family platforms).
    fn resource_compiler_factory(&self) -> Option<&str> {
        None
    }
}

/// The GCC-family toolchain: gcc/g++ drivers and the ar archiver.
#[derive(Debug, Default)]
pub struct GccToolchain;

impl Toolchain for GccToolchain {
    fn name(&self) -> &str {
        "gcc"
    }

    fn compiler_factory(&self) -> &str {
        "gcc"
    }

    fn linker_factory(&self, module_type: ModuleType) -> &str {
        match module_type {
            ModuleType::StaticLibrary => "ar",
            _ => "gcc-ld",
        }
    }
}

/// The MSVC-family toolchain: cl.exe, lib.exe, link.exe, rc.exe.
#[derive(Debug, Default)]
pub struct MsvcToolchain;

impl Toolchain for MsvcToolchain {
    fn name(&self) -> &str {
        "msvc"
    }

    fn compiler_factory(&self) -> &str {
        "cl"
    }

    fn linker_factory(&self, module_type: ModuleType) -> &str {
        match module_type {
            ModuleType::StaticLibrary => "lib",
            _ => "link",
        }
    }

    fn resource_compiler_factory(&self) -> Option<&str> {
        Some("rc")
    }
}

/// Drivers resolved for one module through a toolchain's factories.
#[derive(Debug)]
pub struct ResolvedTools {
    pub compiler: Arc<dyn CompilerDriver>,
    pub linker: Arc<dyn LinkerDriver>,
    pub resource_compiler: Option<Arc<dyn CompilerDriver>>,
}

/// Helper shared by the drivers: render a library reference for GCC-style
/// linkers (`-lname` or an absolute path).
pub(crate) fn gcc_library_arg(lib: &LibraryRef) -> String {
    match lib {
        LibraryRef::Name(name) => format!("-l{}", name),
        LibraryRef::Path(path) => path.display().to_string(),
    }
}

/// Render a library reference for MSVC-style linkers (`name.lib` or a path).
pub(crate) fn msvc_library_arg(lib: &LibraryRef) -> String {
    match lib {
        LibraryRef::Name(name) => format!("{}.lib", name),
        LibraryRef::Path(path) => path.display().to_string(),
    }
}

/// Render a path for argv.
pub(crate) fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toolchain_linker_selection_is_type_directed() {
        let gcc = GccToolchain;
        assert_eq!(gcc.linker_factory(ModuleType::StaticLibrary), "ar");
        assert_eq!(gcc.linker_factory(ModuleType::SharedLibrary), "gcc-ld");
        assert_eq!(gcc.linker_factory(ModuleType::Executable), "gcc-ld");

        let msvc = MsvcToolchain;
        assert_eq!(msvc.linker_factory(ModuleType::StaticLibrary), "lib");
        assert_eq!(msvc.linker_factory(ModuleType::ExecutableWindowed), "link");
        assert_eq!(msvc.resource_compiler_factory(), Some("rc"));
        assert_eq!(GccToolchain.resource_compiler_factory(), None);
    }

    #[test]
    fn test_library_arg_rendering() {
        assert_eq!(gcc_library_arg(&LibraryRef::Name("m".into())), "-lm");
        assert_eq!(
            gcc_library_arg(&LibraryRef::Path("/usr/lib/libz.a".into())),
            "/usr/lib/libz.a"
        );
        assert_eq!(msvc_library_arg(&LibraryRef::Name("user32".into())), "user32.lib");
    }
}
