//! GCC-family drivers: gcc/g++ compilation and linking, ar archiving.

use std::path::PathBuf;
use std::sync::Arc;

use crate::core::module::{Language, Module, ModuleType};
use crate::core::platform::Platform;

use super::detect::{find_tool, find_tool_or};
use super::{
    gcc_library_arg, path_arg, CommandSpec, CompilerDriver, CompilerFactory, CompilerSettings,
    LinkSettings, LinkerDriver, LinkerFactory, ToolFactory,
};

/// gcc/g++ compiler driver. C sources use the C driver, C++ sources the C++
/// driver.
#[derive(Debug, Clone)]
pub struct GccCompiler {
    pub cc: PathBuf,
    pub cxx: PathBuf,
}

impl GccCompiler {
    pub fn new(cc: impl Into<PathBuf>, cxx: impl Into<PathBuf>) -> Self {
        GccCompiler {
            cc: cc.into(),
            cxx: cxx.into(),
        }
    }
}

impl CompilerDriver for GccCompiler {
    fn compile_command(&self, settings: &CompilerSettings) -> CommandSpec {
        let compiler = match settings.language {
            Language::Cxx => &self.cxx,
            _ => &self.cc,
        };

        let mut cmd = CommandSpec::new(compiler);

        cmd = cmd.arg("-c");
        cmd = cmd.arg("-o").arg(path_arg(&settings.output));

        cmd = cmd.arg(settings.optimization.as_gcc_flag());

        if settings.debug_symbols {
            cmd = cmd.arg("-g");
        }

        match settings.language {
            Language::Cxx => {
                cmd = cmd.arg(format!("-std={}", settings.cpp_standard.as_flag_value()));
            }
            _ => {
                if let Some(std) = settings.c_standard {
                    cmd = cmd.arg(format!("-std={}", std.as_flag_value()));
                }
            }
        }

        for dir in &settings.include_dirs {
            cmd = cmd.arg(format!("-I{}", dir.display()));
        }

        for define in &settings.definitions {
            cmd = cmd.arg(define.to_flag("-D"));
        }

        for file in &settings.forced_includes {
            cmd = cmd.arg("-include").arg(path_arg(file));
        }

        // Exception/RTTI toggles only make sense for C++ translation units.
        if settings.language == Language::Cxx {
            cmd = cmd.arg(if settings.enable_exceptions {
                "-fexceptions"
            } else {
                "-fno-exceptions"
            });
            cmd = cmd.arg(if settings.enable_rtti {
                "-frtti"
            } else {
                "-fno-rtti"
            });
        }

        if settings.enable_fast_fp {
            cmd = cmd.arg("-ffast-math");
        }

        if let Some(flag) = settings.cpu_extension.as_gcc_flag() {
            cmd = cmd.arg(flag);
        }

        cmd = cmd.args(settings.platform_flags.iter().cloned());
        cmd = cmd.args(settings.module_options.iter().cloned());
        cmd = cmd.args(settings.extra_flags.iter().cloned());

        cmd.arg(path_arg(&settings.source))
    }

    fn object_extension(&self) -> &'static str {
        "o"
    }
}

/// gcc/g++ link driver for shared libraries and executables.
#[derive(Debug, Clone)]
pub struct GccLinker {
    pub cc: PathBuf,
    pub cxx: PathBuf,
}

impl GccLinker {
    pub fn new(cc: impl Into<PathBuf>, cxx: impl Into<PathBuf>) -> Self {
        GccLinker {
            cc: cc.into(),
            cxx: cxx.into(),
        }
    }
}

impl LinkerDriver for GccLinker {
    fn link_command(&self, settings: &LinkSettings) -> CommandSpec {
        let linker = match settings.language {
            Language::Cxx => &self.cxx,
            _ => &self.cc,
        };

        let mut cmd = CommandSpec::new(linker);

        cmd = cmd.arg("-o").arg(path_arg(&settings.output));

        for obj in &settings.objects {
            cmd = cmd.arg(path_arg(obj));
        }

        for dir in &settings.lib_dirs {
            cmd = cmd.arg(format!("-L{}", dir.display()));
        }

        for lib in &settings.libraries {
            cmd = cmd.arg(gcc_library_arg(lib));
        }

        if settings.module_type == ModuleType::SharedLibrary {
            cmd = cmd.arg("-shared");
        }

        cmd = cmd.args(settings.linker_options.iter().cloned());

        if settings.debug_symbols {
            cmd = cmd.arg("-g");
        }

        cmd
    }

    fn output_filename(&self, name: &str, module_type: ModuleType) -> String {
        match module_type {
            ModuleType::StaticLibrary => format!("lib{}.a", name),
            ModuleType::SharedLibrary => {
                if cfg!(target_os = "macos") {
                    format!("lib{}.dylib", name)
                } else {
                    format!("lib{}.so", name)
                }
            }
            ModuleType::Executable | ModuleType::ExecutableWindowed => name.to_string(),
        }
    }
}

/// ar archiver driver for static libraries.
#[derive(Debug, Clone)]
pub struct ArArchiver {
    pub ar: PathBuf,
}

impl ArArchiver {
    pub fn new(ar: impl Into<PathBuf>) -> Self {
        ArArchiver { ar: ar.into() }
    }
}

impl LinkerDriver for ArArchiver {
    fn link_command(&self, settings: &LinkSettings) -> CommandSpec {
        // Create archive with symbol index, replace members.
        let mut cmd = CommandSpec::new(&self.ar);
        cmd = cmd.arg("rcs");
        cmd = cmd.arg(path_arg(&settings.output));

        for obj in &settings.objects {
            cmd = cmd.arg(path_arg(obj));
        }

        cmd
    }

    fn output_filename(&self, name: &str, _module_type: ModuleType) -> String {
        format!("lib{}.a", name)
    }
}

fn on_unix(platform: &dyn Platform) -> bool {
    platform.name() == "unix"
}

/// Factory for the gcc/g++ compiler driver.
#[derive(Debug, Default)]
pub struct GccCompilerFactory;

impl ToolFactory for GccCompilerFactory {
    fn name(&self) -> &str {
        "gcc"
    }

    fn can_create(&self, _module: &Module) -> bool {
        true
    }

    fn is_available(&self, platform: &dyn Platform) -> bool {
        on_unix(platform) && find_tool(Some("CC"), &["gcc", "cc"]).is_some()
    }
}

impl CompilerFactory for GccCompilerFactory {
    fn create(&self) -> Arc<dyn CompilerDriver> {
        Arc::new(GccCompiler::new(
            find_tool_or(Some("CC"), &["gcc", "cc"], "gcc"),
            find_tool_or(Some("CXX"), &["g++", "c++"], "g++"),
        ))
    }
}

/// Factory for the gcc/g++ link driver. Windowed executables are a
/// Win32-family concept, so the factory refuses them.
#[derive(Debug, Default)]
pub struct GccLinkerFactory;

impl ToolFactory for GccLinkerFactory {
    fn name(&self) -> &str {
        "gcc-ld"
    }

    fn can_create(&self, module: &Module) -> bool {
        !matches!(
            module.module_type(),
            ModuleType::StaticLibrary | ModuleType::ExecutableWindowed
        )
    }

    fn is_available(&self, platform: &dyn Platform) -> bool {
        on_unix(platform) && find_tool(Some("CC"), &["gcc", "cc"]).is_some()
    }
}

impl LinkerFactory for GccLinkerFactory {
    fn create(&self) -> Arc<dyn LinkerDriver> {
        Arc::new(GccLinker::new(
            find_tool_or(Some("CC"), &["gcc", "cc"], "gcc"),
            find_tool_or(Some("CXX"), &["g++", "c++"], "g++"),
        ))
    }
}

/// Factory for the ar archiver.
#[derive(Debug, Default)]
pub struct ArArchiverFactory;

impl ToolFactory for ArArchiverFactory {
    fn name(&self) -> &str {
        "ar"
    }

    fn can_create(&self, module: &Module) -> bool {
        module.module_type() == ModuleType::StaticLibrary
    }

    fn is_available(&self, platform: &dyn Platform) -> bool {
        on_unix(platform) && find_tool(Some("AR"), &["ar", "llvm-ar"]).is_some()
    }
}

impl LinkerFactory for ArArchiverFactory {
    fn create(&self) -> Arc<dyn LinkerDriver> {
        Arc::new(ArArchiver::new(find_tool_or(
            Some("AR"),
            &["ar", "llvm-ar"],
            "ar",
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::module::{CStandard, CppStandard, CpuExtension, Define, Optimization};
    use crate::core::platform::Architecture;
    use crate::core::LibraryRef;

    fn settings(language: Language) -> CompilerSettings {
        CompilerSettings {
            source: PathBuf::from("/work/a.c"),
            output: PathBuf::from("/work/.ebuild/v/obj/a.o"),
            language,
            architecture: Architecture::X86_64,
            module_type: ModuleType::StaticLibrary,
            optimization: Optimization::O2,
            debug_symbols: false,
            c_standard: Some(CStandard::C17),
            cpp_standard: CppStandard::Cpp17,
            include_dirs: Vec::new(),
            definitions: Vec::new(),
            forced_includes: Vec::new(),
            enable_exceptions: true,
            enable_rtti: true,
            enable_fast_fp: false,
            cpu_extension: CpuExtension::Default,
            platform_flags: Vec::new(),
            module_options: Vec::new(),
            extra_flags: Vec::new(),
        }
    }

    #[test]
    fn test_c_compile_argv() {
        let driver = GccCompiler::new("gcc", "g++");
        let cmd = driver.compile_command(&settings(Language::C));

        assert_eq!(cmd.program, PathBuf::from("gcc"));
        assert_eq!(
            cmd.args,
            vec![
                "-c",
                "-o",
                "/work/.ebuild/v/obj/a.o",
                "-O2",
                "-std=c17",
                "/work/a.c"
            ]
        );
    }

    #[test]
    fn test_cxx_compile_argv_selects_gxx_and_toggles() {
        let driver = GccCompiler::new("gcc", "g++");
        let mut s = settings(Language::Cxx);
        s.source = PathBuf::from("/work/a.cpp");
        s.enable_exceptions = false;
        s.enable_rtti = false;
        s.cpp_standard = CppStandard::Cpp20;

        let cmd = driver.compile_command(&s);
        assert_eq!(cmd.program, PathBuf::from("g++"));
        assert!(cmd.args.contains(&"-std=c++20".to_string()));
        assert!(cmd.args.contains(&"-fno-exceptions".to_string()));
        assert!(cmd.args.contains(&"-fno-rtti".to_string()));
        // The C standard must not leak into a C++ invocation.
        assert!(!cmd.args.contains(&"-std=c17".to_string()));
    }

    #[test]
    fn test_compile_argv_flag_sections_in_order() {
        let driver = GccCompiler::new("gcc", "g++");
        let mut s = settings(Language::C);
        s.include_dirs = vec![PathBuf::from("/inc/a"), PathBuf::from("/inc/b")];
        s.definitions = vec![Define::flag("NDEBUG"), Define::key_value("VERSION", "3")];
        s.forced_includes = vec![PathBuf::from("/inc/prefix.h")];
        s.enable_fast_fp = true;
        s.cpu_extension = CpuExtension::Avx2;
        s.debug_symbols = true;
        s.module_options = vec!["-Wall".into()];
        s.extra_flags = vec!["-fPIC".into()];

        let cmd = driver.compile_command(&s);
        let args = &cmd.args;

        assert!(args.contains(&"-I/inc/a".to_string()));
        assert!(args.contains(&"-DNDEBUG".to_string()));
        assert!(args.contains(&"-DVERSION=3".to_string()));
        assert!(args.contains(&"-include".to_string()));
        assert!(args.contains(&"-ffast-math".to_string()));
        assert!(args.contains(&"-mavx2".to_string()));
        assert!(args.contains(&"-g".to_string()));

        // Sections keep their relative order; the source file comes last.
        let pos = |flag: &str| args.iter().position(|a| a == flag).unwrap();
        assert!(pos("-I/inc/a") < pos("-I/inc/b"));
        assert!(pos("-I/inc/b") < pos("-DNDEBUG"));
        assert!(pos("-DVERSION=3") < pos("-include"));
        assert!(pos("-mavx2") < pos("-Wall"));
        assert!(pos("-Wall") < pos("-fPIC"));
        assert_eq!(args.last().unwrap(), "/work/a.c");
    }

    #[test]
    fn test_link_argv_shared_library() {
        let driver = GccLinker::new("gcc", "g++");
        let cmd = driver.link_command(&LinkSettings {
            objects: vec![PathBuf::from("a.o"), PathBuf::from("b.o")],
            output: PathBuf::from("/out/libdemo.so"),
            module_type: ModuleType::SharedLibrary,
            language: Language::C,
            lib_dirs: vec![PathBuf::from("/deps/lib")],
            libraries: vec![
                LibraryRef::Name("m".into()),
                LibraryRef::Path("/usr/lib/libz.a".into()),
            ],
            linker_options: vec!["-Wl,--as-needed".into()],
            delay_load_dlls: Vec::new(),
            debug_symbols: false,
        });

        assert_eq!(cmd.program, PathBuf::from("gcc"));
        assert_eq!(
            cmd.args,
            vec![
                "-o",
                "/out/libdemo.so",
                "a.o",
                "b.o",
                "-L/deps/lib",
                "-lm",
                "/usr/lib/libz.a",
                "-shared",
                "-Wl,--as-needed",
            ]
        );
    }

    #[test]
    fn test_cxx_link_uses_gxx() {
        let driver = GccLinker::new("gcc", "g++");
        let cmd = driver.link_command(&LinkSettings {
            objects: vec![PathBuf::from("a.o")],
            output: PathBuf::from("/out/app"),
            module_type: ModuleType::Executable,
            language: Language::Cxx,
            lib_dirs: Vec::new(),
            libraries: Vec::new(),
            linker_options: Vec::new(),
            delay_load_dlls: Vec::new(),
            debug_symbols: false,
        });
        assert_eq!(cmd.program, PathBuf::from("g++"));
        assert!(!cmd.args.contains(&"-shared".to_string()));
    }

    #[test]
    fn test_archiver_argv() {
        let driver = ArArchiver::new("ar");
        let cmd = driver.link_command(&LinkSettings {
            objects: vec![PathBuf::from("a.o")],
            output: PathBuf::from("/out/liblib.a"),
            module_type: ModuleType::StaticLibrary,
            language: Language::C,
            lib_dirs: Vec::new(),
            libraries: Vec::new(),
            linker_options: Vec::new(),
            delay_load_dlls: Vec::new(),
            debug_symbols: false,
        });

        assert_eq!(cmd.program, PathBuf::from("ar"));
        assert_eq!(cmd.args, vec!["rcs", "/out/liblib.a", "a.o"]);
        assert_eq!(driver.output_filename("lib", ModuleType::StaticLibrary), "liblib.a");
    }

    #[test]
    fn test_factory_applicability() {
        let staticlib = Module::new("s", ModuleType::StaticLibrary);
        let windowed = Module::new("w", ModuleType::ExecutableWindowed);
        let exe = Module::new("e", ModuleType::Executable);

        assert!(ArArchiverFactory.can_create(&staticlib));
        assert!(!ArArchiverFactory.can_create(&exe));
        assert!(GccLinkerFactory.can_create(&exe));
        assert!(!GccLinkerFactory.can_create(&staticlib));
        assert!(!GccLinkerFactory.can_create(&windowed));
    }
}
