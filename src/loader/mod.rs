//! Module-definition loading.
//!
//! The engine consumes module definitions through the
//! `ModuleDefinitionLoader` trait and treats the loading mechanism as a black
//! box. The shipped implementation parses a declarative TOML dialect
//! (`*.ebuild` files); a dynamic-plugin or scripted loader could replace it
//! without touching the engine.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::core::access::AccessLimited;
use crate::core::module::{
    CStandard, CppStandard, CpuExtension, Define, LibraryRef, Module, ModuleType, Optimization,
};
use crate::core::options::OptionDescriptor;
use crate::core::reference::ModuleReference;
use crate::errors::Result;
use crate::util::fs::expand_sources;

mod toml;

pub use self::toml::TomlLoader;

/// Context handed to module construction.
#[derive(Debug, Clone)]
pub struct ModuleContext {
    /// Canonical path of the definition file.
    pub module_file: PathBuf,
    /// Directory containing the definition file.
    pub module_dir: PathBuf,
    /// Registry name of the host platform.
    pub host_platform: String,
    /// Registry name of the target platform.
    pub target_platform: String,
    /// Toolchain override from the CLI, if any.
    pub toolchain_hint: Option<String>,
    /// Raw option map from the referencing side.
    pub options: BTreeMap<String, String>,
    /// Whether a file watcher drives this build.
    pub watching: bool,
    /// Whether this is a debug build.
    pub debug: bool,
}

/// A named hook that patches module attributes to yield a variant
/// (e.g. a shared rendition of a static library).
#[derive(Debug, Clone, Default)]
pub struct OutputTransformer {
    pub module_type: Option<ModuleType>,
    pub definitions: AccessLimited<Define>,
    pub compiler_options: AccessLimited<String>,
    pub linker_options: AccessLimited<String>,
    pub libraries: AccessLimited<LibraryRef>,
}

impl OutputTransformer {
    /// Apply the patch to an unfrozen module.
    pub fn apply(&self, module: &mut Module) -> Result<()> {
        if let Some(ty) = self.module_type {
            module.set_module_type(ty)?;
        }

        let defs = module.definitions_mut()?;
        defs.extend_public(self.definitions.public().iter().cloned());
        defs.extend_private(self.definitions.private().iter().cloned());

        let copts = module.compiler_options_mut()?;
        copts.extend_public(self.compiler_options.public().iter().cloned());
        copts.extend_private(self.compiler_options.private().iter().cloned());

        let lopts = module.linker_options_mut()?;
        lopts.extend_public(self.linker_options.public().iter().cloned());
        lopts.extend_private(self.linker_options.private().iter().cloned());

        let libs = module.libraries_mut()?;
        libs.extend_public(self.libraries.public().iter().cloned());
        libs.extend_private(self.libraries.private().iter().cloned());

        Ok(())
    }
}

/// One module declaration produced by a loader, not yet bound to a context.
#[derive(Debug, Clone, Default)]
pub struct ModuleDescriptor {
    pub name: String,
    pub module_type: Option<ModuleType>,
    /// Source patterns, relative to the module directory.
    pub sources: Vec<String>,
    /// Include directories, relative to the module directory.
    pub includes: AccessLimited<String>,
    pub definitions: AccessLimited<Define>,
    pub libraries: AccessLimited<LibraryRef>,
    pub compiler_options: AccessLimited<String>,
    pub linker_options: AccessLimited<String>,
    pub dependencies: AccessLimited<ModuleReference>,
    pub forced_includes: Vec<String>,
    pub delay_load_dlls: Vec<String>,
    pub cpp_standard: Option<CppStandard>,
    pub c_standard: Option<CStandard>,
    pub optimization: Option<Optimization>,
    pub cpu_extension: Option<CpuExtension>,
    pub enable_exceptions: Option<bool>,
    pub enable_rtti: Option<bool>,
    pub enable_fast_fp: Option<bool>,
    pub enable_debug_symbols: Option<bool>,
    pub toolchain: Option<String>,
    pub options: Vec<OptionDescriptor>,
    pub transformers: BTreeMap<String, OutputTransformer>,
}

impl ModuleDescriptor {
    /// Construct an unfrozen module from this descriptor.
    ///
    /// Source patterns expand against the module directory; relative include
    /// paths become absolute. Option binding, transformers, validation, and
    /// freezing happen in the instancer afterwards.
    pub fn instantiate(&self, cx: &ModuleContext) -> Result<Module> {
        let module_type = self.module_type.unwrap_or(ModuleType::Executable);
        let mut module = Module::new(&self.name, module_type);

        module.set_sources(expand_sources(&cx.module_dir, &self.sources)?)?;

        let absolutize = |p: &String| -> PathBuf {
            let path = Path::new(p);
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                cx.module_dir.join(path)
            }
        };

        {
            let includes = module.includes_mut()?;
            includes.extend_public(self.includes.public().iter().map(absolutize));
            includes.extend_private(self.includes.private().iter().map(absolutize));
        }
        module.set_forced_includes(self.forced_includes.iter().map(absolutize).collect())?;

        {
            let defs = module.definitions_mut()?;
            defs.extend_public(self.definitions.public().iter().cloned());
            defs.extend_private(self.definitions.private().iter().cloned());
        }
        {
            let libs = module.libraries_mut()?;
            libs.extend_public(self.libraries.public().iter().cloned());
            libs.extend_private(self.libraries.private().iter().cloned());
        }
        {
            let copts = module.compiler_options_mut()?;
            copts.extend_public(self.compiler_options.public().iter().cloned());
            copts.extend_private(self.compiler_options.private().iter().cloned());
        }
        {
            let lopts = module.linker_options_mut()?;
            lopts.extend_public(self.linker_options.public().iter().cloned());
            lopts.extend_private(self.linker_options.private().iter().cloned());
        }
        {
            let deps = module.dependencies_mut()?;
            deps.extend_public(self.dependencies.public().iter().cloned());
            deps.extend_private(self.dependencies.private().iter().cloned());
        }

        module.set_delay_load_dlls(self.delay_load_dlls.clone())?;

        if let Some(std) = self.cpp_standard {
            module.set_cpp_standard(std)?;
        }
        module.set_c_standard(self.c_standard)?;

        module.set_is_debug(cx.debug)?;
        let default_opt = if cx.debug {
            Optimization::O0
        } else {
            Optimization::O2
        };
        module.set_optimization(self.optimization.unwrap_or(default_opt))?;
        module.set_enable_debug_symbols(self.enable_debug_symbols.unwrap_or(cx.debug))?;

        if let Some(ext) = self.cpu_extension {
            module.set_cpu_extension(ext)?;
        }
        if let Some(on) = self.enable_exceptions {
            module.set_enable_exceptions(on)?;
        }
        if let Some(on) = self.enable_rtti {
            module.set_enable_rtti(on)?;
        }
        if let Some(on) = self.enable_fast_fp {
            module.set_enable_fast_fp(on)?;
        }
        module.set_toolchain_hint(self.toolchain.clone())?;

        Ok(module)
    }
}

/// Produces module descriptors for a definition file.
pub trait ModuleDefinitionLoader: Send + Sync {
    /// Load all module descriptors declared in `path`.
    fn load(&self, path: &Path) -> Result<Vec<ModuleDescriptor>>;

    /// Optional setup phase run by the orchestrator before planning, for
    /// modules whose sources need fetching or generation. Failures surface
    /// as `SetupFailure`.
    fn prepare_sources(&self, _module: &Module, _module_dir: &Path) -> Result<()> {
        Ok(())
    }
}
