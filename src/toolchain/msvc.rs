//! MSVC-family drivers: cl.exe compilation, link.exe linking, lib.exe
//! archiving, rc.exe resource compilation.

use std::path::PathBuf;
use std::sync::Arc;

use crate::core::module::{Language, Module, ModuleType};
use crate::core::platform::Platform;

use super::detect::{find_tool, find_tool_or};
use super::{
    msvc_library_arg, path_arg, CommandSpec, CompilerDriver, CompilerFactory, CompilerSettings,
    LinkSettings, LinkerDriver, LinkerFactory, ToolFactory,
};

/// cl.exe compiler driver. cl handles both C and C++.
#[derive(Debug, Clone)]
pub struct MsvcCompiler {
    pub cl: PathBuf,
}

impl MsvcCompiler {
    pub fn new(cl: impl Into<PathBuf>) -> Self {
        MsvcCompiler { cl: cl.into() }
    }
}

impl CompilerDriver for MsvcCompiler {
    fn compile_command(&self, settings: &CompilerSettings) -> CommandSpec {
        let mut cmd = CommandSpec::new(&self.cl);

        cmd = cmd.arg("/nologo");
        cmd = cmd.arg("/c");
        cmd = cmd.arg(format!("/Fo{}", settings.output.display()));

        cmd = cmd.arg(settings.optimization.as_msvc_flag());

        if settings.debug_symbols {
            cmd = cmd.arg("/Zi");
        }

        match settings.language {
            Language::Cxx => {
                cmd = cmd.arg(format!(
                    "/std:{}",
                    settings.cpp_standard.as_msvc_flag_value()
                ));
            }
            _ => {
                if let Some(std) = settings.c_standard {
                    cmd = cmd.arg(format!("/std:{}", std.as_msvc_flag_value()));
                }
            }
        }

        for dir in &settings.include_dirs {
            cmd = cmd.arg(format!("/I{}", dir.display()));
        }

        for define in &settings.definitions {
            cmd = cmd.arg(define.to_flag("/D"));
        }

        for file in &settings.forced_includes {
            cmd = cmd.arg(format!("/FI{}", file.display()));
        }

        if settings.language == Language::Cxx {
            if settings.enable_exceptions {
                cmd = cmd.arg("/EHsc");
            }
            cmd = cmd.arg(if settings.enable_rtti { "/GR" } else { "/GR-" });
        }

        if settings.enable_fast_fp {
            cmd = cmd.arg("/fp:fast");
        }

        if let Some(flag) = settings.cpu_extension.as_msvc_flag() {
            cmd = cmd.arg(flag);
        }

        cmd = cmd.args(settings.platform_flags.iter().cloned());
        cmd = cmd.args(settings.module_options.iter().cloned());
        cmd = cmd.args(settings.extra_flags.iter().cloned());

        cmd.arg(path_arg(&settings.source))
    }

    fn object_extension(&self) -> &'static str {
        "obj"
    }
}

/// link.exe driver for shared libraries and executables.
#[derive(Debug, Clone)]
pub struct MsvcLinker {
    pub link: PathBuf,
}

impl MsvcLinker {
    pub fn new(link: impl Into<PathBuf>) -> Self {
        MsvcLinker { link: link.into() }
    }
}

impl LinkerDriver for MsvcLinker {
    fn link_command(&self, settings: &LinkSettings) -> CommandSpec {
        let mut cmd = CommandSpec::new(&self.link);

        cmd = cmd.arg("/nologo");
        cmd = cmd.arg(format!("/OUT:{}", settings.output.display()));

        for obj in &settings.objects {
            cmd = cmd.arg(path_arg(obj));
        }

        for dir in &settings.lib_dirs {
            cmd = cmd.arg(format!("/LIBPATH:{}", dir.display()));
        }

        for lib in &settings.libraries {
            cmd = cmd.arg(msvc_library_arg(lib));
        }

        match settings.module_type {
            ModuleType::SharedLibrary => {
                cmd = cmd.arg("/DLL");
            }
            ModuleType::Executable => {
                cmd = cmd.arg("/SUBSYSTEM:CONSOLE");
            }
            ModuleType::ExecutableWindowed => {
                cmd = cmd.arg("/SUBSYSTEM:WINDOWS");
            }
            ModuleType::StaticLibrary => {}
        }

        if settings.debug_symbols {
            cmd = cmd.arg("/DEBUG");
        }

        for dll in &settings.delay_load_dlls {
            cmd = cmd.arg(format!("/DELAYLOAD:{}", dll));
        }

        cmd.args(settings.linker_options.iter().cloned())
    }

    fn output_filename(&self, name: &str, module_type: ModuleType) -> String {
        match module_type {
            ModuleType::StaticLibrary => format!("{}.lib", name),
            ModuleType::SharedLibrary => format!("{}.dll", name),
            ModuleType::Executable | ModuleType::ExecutableWindowed => format!("{}.exe", name),
        }
    }
}

/// lib.exe archiver driver for static libraries.
#[derive(Debug, Clone)]
pub struct MsvcLib {
    pub lib: PathBuf,
}

impl MsvcLib {
    pub fn new(lib: impl Into<PathBuf>) -> Self {
        MsvcLib { lib: lib.into() }
    }
}

impl LinkerDriver for MsvcLib {
    fn link_command(&self, settings: &LinkSettings) -> CommandSpec {
        let mut cmd = CommandSpec::new(&self.lib);
        cmd = cmd.arg("/nologo");
        cmd = cmd.arg(format!("/OUT:{}", settings.output.display()));

        for obj in &settings.objects {
            cmd = cmd.arg(path_arg(obj));
        }

        cmd
    }

    fn output_filename(&self, name: &str, _module_type: ModuleType) -> String {
        format!("{}.lib", name)
    }
}

/// rc.exe resource compiler driver. Its `.res` outputs join the link inputs
/// of windowed executables.
#[derive(Debug, Clone)]
pub struct MsvcResourceCompiler {
    pub rc: PathBuf,
}

impl MsvcResourceCompiler {
    pub fn new(rc: impl Into<PathBuf>) -> Self {
        MsvcResourceCompiler { rc: rc.into() }
    }
}

impl CompilerDriver for MsvcResourceCompiler {
    fn compile_command(&self, settings: &CompilerSettings) -> CommandSpec {
        let mut cmd = CommandSpec::new(&self.rc);

        cmd = cmd.arg("/nologo");
        cmd = cmd.arg(format!("/fo{}", settings.output.display()));

        for dir in &settings.include_dirs {
            cmd = cmd.arg(format!("/i{}", dir.display()));
        }

        for define in &settings.definitions {
            cmd = cmd.arg(define.to_flag("/d"));
        }

        cmd.arg(path_arg(&settings.source))
    }

    fn object_extension(&self) -> &'static str {
        "res"
    }
}

fn on_win32(platform: &dyn Platform) -> bool {
    platform.name() == "win32"
}

/// Factory for the cl.exe compiler driver.
#[derive(Debug, Default)]
pub struct MsvcCompilerFactory;

impl ToolFactory for MsvcCompilerFactory {
    fn name(&self) -> &str {
        "cl"
    }

    fn can_create(&self, _module: &Module) -> bool {
        true
    }

    fn is_available(&self, platform: &dyn Platform) -> bool {
        on_win32(platform) && find_tool(Some("CL"), &["cl"]).is_some()
    }
}

impl CompilerFactory for MsvcCompilerFactory {
    fn create(&self) -> Arc<dyn CompilerDriver> {
        Arc::new(MsvcCompiler::new(find_tool_or(
            Some("CL"),
            &["cl"],
            "cl.exe",
        )))
    }
}

/// Factory for the link.exe driver.
#[derive(Debug, Default)]
pub struct MsvcLinkerFactory;

impl ToolFactory for MsvcLinkerFactory {
    fn name(&self) -> &str {
        "link"
    }

    fn can_create(&self, module: &Module) -> bool {
        module.module_type() != ModuleType::StaticLibrary
    }

    fn is_available(&self, platform: &dyn Platform) -> bool {
        on_win32(platform) && find_tool(Some("LINK"), &["link"]).is_some()
    }
}

impl LinkerFactory for MsvcLinkerFactory {
    fn create(&self) -> Arc<dyn LinkerDriver> {
        Arc::new(MsvcLinker::new(find_tool_or(
            Some("LINK"),
            &["link"],
            "link.exe",
        )))
    }
}

/// Factory for the lib.exe archiver driver.
#[derive(Debug, Default)]
pub struct MsvcLibFactory;

impl ToolFactory for MsvcLibFactory {
    fn name(&self) -> &str {
        "lib"
    }

    fn can_create(&self, module: &Module) -> bool {
        module.module_type() == ModuleType::StaticLibrary
    }

    fn is_available(&self, platform: &dyn Platform) -> bool {
        on_win32(platform) && find_tool(Some("LIB"), &["lib"]).is_some()
    }
}

impl LinkerFactory for MsvcLibFactory {
    fn create(&self) -> Arc<dyn LinkerDriver> {
        Arc::new(MsvcLib::new(find_tool_or(Some("LIB"), &["lib"], "lib.exe")))
    }
}

/// Factory for the rc.exe resource compiler driver.
#[derive(Debug, Default)]
pub struct MsvcResourceCompilerFactory;

impl ToolFactory for MsvcResourceCompilerFactory {
    fn name(&self) -> &str {
        "rc"
    }

    fn can_create(&self, _module: &Module) -> bool {
        true
    }

    fn is_available(&self, platform: &dyn Platform) -> bool {
        on_win32(platform) && find_tool(Some("RC"), &["rc"]).is_some()
    }
}

impl CompilerFactory for MsvcResourceCompilerFactory {
    fn create(&self) -> Arc<dyn CompilerDriver> {
        Arc::new(MsvcResourceCompiler::new(find_tool_or(
            Some("RC"),
            &["rc"],
            "rc.exe",
        )))
    }
}
