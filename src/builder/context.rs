//! Build context - registries, target selection, and toolchain dispatch.
//!
//! The context owns the four registries (platforms, toolchains, compiler
//! factories, linker factories). They are populated once during bootstrap and
//! only read afterwards; worker threads never mutate them.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::module::{Module, ModuleType};
use crate::core::platform::{host_platform_name, Platform, UnixPlatform, Win32Platform};
use crate::core::registry::Registry;
use crate::errors::{BuildError, Result};
use crate::toolchain::{
    ArArchiverFactory, CompilerFactory, GccCompilerFactory, GccLinkerFactory, GccToolchain,
    LinkerFactory, MsvcCompilerFactory, MsvcLibFactory, MsvcLinkerFactory,
    MsvcResourceCompilerFactory, MsvcToolchain, ResolvedTools, ToolFactory, Toolchain,
};
use crate::util::process::{CancelToken, ProcessRunner, SystemRunner};

/// Environment variable overriding the intermediate directory root.
pub const CACHE_DIR_ENV: &str = "EBUILD_CACHE_DIR";

/// Shared state for one build invocation.
pub struct BuildContext {
    pub platforms: Registry<dyn Platform>,
    pub toolchains: Registry<dyn Toolchain>,
    pub compiler_factories: Registry<dyn CompilerFactory>,
    pub linker_factories: Registry<dyn LinkerFactory>,

    /// Registry name of the target platform.
    pub target: String,
    /// Toolchain override from the CLI.
    pub toolchain_override: Option<String>,
    /// Worker pool size; defaults to the CPU count.
    pub jobs: Option<usize>,
    /// Intermediate directory root override (`EBUILD_CACHE_DIR`).
    pub cache_root: Option<PathBuf>,
    pub runner: Arc<dyn ProcessRunner>,
    pub cancel: CancelToken,
    pub debug: bool,
    pub clean: bool,
    pub watching: bool,
    /// Whether planning must verify tool availability (true for `build`,
    /// false for argv-only consumers like the compilation database).
    pub require_tools: bool,
}

impl BuildContext {
    /// Create a context with the built-in platforms, toolchains, and
    /// factories registered, targeting the host platform.
    pub fn with_builtins() -> Result<Self> {
        let mut platforms: Registry<dyn Platform> = Registry::new();
        platforms.register("unix", Arc::new(UnixPlatform))?;
        platforms.register("win32", Arc::new(Win32Platform))?;

        let mut toolchains: Registry<dyn Toolchain> = Registry::new();
        toolchains.register("gcc", Arc::new(GccToolchain))?;
        toolchains.register("msvc", Arc::new(MsvcToolchain))?;

        let mut compiler_factories: Registry<dyn CompilerFactory> = Registry::new();
        compiler_factories.register("gcc", Arc::new(GccCompilerFactory))?;
        compiler_factories.register("cl", Arc::new(MsvcCompilerFactory))?;
        compiler_factories.register("rc", Arc::new(MsvcResourceCompilerFactory))?;

        let mut linker_factories: Registry<dyn LinkerFactory> = Registry::new();
        linker_factories.register("gcc-ld", Arc::new(GccLinkerFactory))?;
        linker_factories.register("ar", Arc::new(ArArchiverFactory))?;
        linker_factories.register("link", Arc::new(MsvcLinkerFactory))?;
        linker_factories.register("lib", Arc::new(MsvcLibFactory))?;

        Ok(BuildContext {
            platforms,
            toolchains,
            compiler_factories,
            linker_factories,
            target: host_platform_name().to_string(),
            toolchain_override: None,
            jobs: None,
            cache_root: std::env::var_os(CACHE_DIR_ENV).map(PathBuf::from),
            runner: Arc::new(SystemRunner::new()),
            cancel: CancelToken::new(),
            debug: false,
            clean: false,
            watching: false,
            require_tools: true,
        })
    }

    /// The target platform instance.
    pub fn target_platform(&self) -> Result<Arc<dyn Platform>> {
        self.platforms.get(&self.target)
    }

    /// Worker pool size for compile scheduling.
    pub fn effective_jobs(&self) -> usize {
        self.jobs.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    /// Intermediate directory for a module: `<module-dir>/.ebuild/<vid>` by
    /// default; under a cache-root override the module name keys the layout
    /// so distinct modules cannot collide.
    pub fn intermediate_dir(&self, module_dir: &Path, name: &str, variant_id: &str) -> PathBuf {
        match &self.cache_root {
            Some(root) => root.join(name).join(variant_id),
            None => module_dir.join(".ebuild").join(variant_id),
        }
    }

    /// Link output directory for a module.
    pub fn output_dir(&self, module_dir: &Path, variant_id: &str) -> PathBuf {
        module_dir.join("Binaries").join(variant_id)
    }

    /// Select the toolchain for a module: module-level hint, then the CLI
    /// override, then the target platform's default.
    pub fn toolchain_for(&self, module: &Module) -> Result<Arc<dyn Toolchain>> {
        if let Some(hint) = module.toolchain_hint() {
            return self.toolchains.get(hint);
        }
        if let Some(name) = &self.toolchain_override {
            return self.toolchains.get(name);
        }
        let platform = self.target_platform()?;
        self.toolchains.get(platform.default_toolchain())
    }

    /// Resolve the concrete drivers for a module through its toolchain's
    /// factories, verifying applicability and (when required) availability.
    pub fn tools_for(&self, module: &Module) -> Result<ResolvedTools> {
        let platform = self.target_platform()?;
        let toolchain = self.toolchain_for(module)?;

        let compiler_factory = self.compiler_factories.get(toolchain.compiler_factory())?;
        self.check_factory(compiler_factory.as_ref(), toolchain.as_ref(), module, platform.as_ref())?;

        let linker_factory = self
            .linker_factories
            .get(toolchain.linker_factory(module.module_type()))?;
        self.check_factory(linker_factory.as_ref(), toolchain.as_ref(), module, platform.as_ref())?;

        let resource_compiler = if module.module_type() == ModuleType::ExecutableWindowed {
            match toolchain.resource_compiler_factory() {
                Some(name) => {
                    let factory = self.compiler_factories.get(name)?;
                    self.check_factory(
                        factory.as_ref(),
                        toolchain.as_ref(),
                        module,
                        platform.as_ref(),
                    )?;
                    Some(factory.create())
                }
                None => None,
            }
        } else {
            None
        };

        Ok(ResolvedTools {
            compiler: compiler_factory.create(),
            linker: linker_factory.create(),
            resource_compiler,
        })
    }

    fn check_factory<F: ToolFactory + ?Sized>(
        &self,
        factory: &F,
        toolchain: &dyn Toolchain,
        module: &Module,
        platform: &dyn Platform,
    ) -> Result<()> {
        if !factory.can_create(module) {
            return Err(BuildError::ToolchainIncompatible {
                toolchain: toolchain.name().to_string(),
                module: module.name().to_string(),
            });
        }
        if self.require_tools && !factory.is_available(platform) {
            return Err(BuildError::ToolNotFound {
                tool: factory.name().to_string(),
            });
        }
        Ok(())
    }
}
