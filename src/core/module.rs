//! The module model - a typed attribute bag describing one translation unit
//! group and the artifact it produces.
//!
//! Modules are mutable during instancing (construction, option binding,
//! transformers) and frozen afterwards. Post-freeze mutation fails with
//! `FrozenModule`.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::access::AccessLimited;
use crate::core::options::OptionValue;
use crate::core::reference::ModuleReference;
use crate::errors::{BuildError, Result};

/// The kind of artifact a module produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModuleType {
    /// Static library (.a / .lib)
    StaticLibrary,
    /// Shared/dynamic library (.so / .dylib / .dll)
    SharedLibrary,
    /// Console executable
    Executable,
    /// Windowed executable (no console; Win32-family subsystem)
    ExecutableWindowed,
}

impl ModuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleType::StaticLibrary => "static-library",
            ModuleType::SharedLibrary => "shared-library",
            ModuleType::Executable => "executable",
            ModuleType::ExecutableWindowed => "executable-windowed",
        }
    }

    /// Check if this is a library (static or shared).
    pub fn is_library(&self) -> bool {
        matches!(self, ModuleType::StaticLibrary | ModuleType::SharedLibrary)
    }

    /// Check if this is an executable of either subsystem.
    pub fn is_executable(&self) -> bool {
        matches!(self, ModuleType::Executable | ModuleType::ExecutableWindowed)
    }
}

impl fmt::Display for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source language, inferred from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    C,
    Cxx,
    /// Win32 resource script (.rc)
    Resource,
}

impl Language {
    /// Infer the language of a source file from its extension.
    pub fn from_path(path: &Path) -> Option<Language> {
        let ext = path.extension()?.to_str()?;
        match ext.to_ascii_lowercase().as_str() {
            "c" => Some(Language::C),
            "cc" | "cpp" | "cxx" | "c++" => Some(Language::Cxx),
            "rc" => Some(Language::Resource),
            _ => None,
        }
    }
}

/// C++ language standard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CppStandard {
    #[serde(rename = "c++11")]
    Cpp11,
    #[serde(rename = "c++14")]
    Cpp14,
    #[serde(rename = "c++17")]
    Cpp17,
    #[serde(rename = "c++20")]
    Cpp20,
    #[serde(rename = "c++23")]
    Cpp23,
}

impl CppStandard {
    /// Value for the GCC-family `-std=` flag.
    pub fn as_flag_value(&self) -> &'static str {
        match self {
            CppStandard::Cpp11 => "c++11",
            CppStandard::Cpp14 => "c++14",
            CppStandard::Cpp17 => "c++17",
            CppStandard::Cpp20 => "c++20",
            CppStandard::Cpp23 => "c++23",
        }
    }

    /// Value for the MSVC `/std:` flag. cl has no c++11 mode, so that maps
    /// to the lowest supported standard.
    pub fn as_msvc_flag_value(&self) -> &'static str {
        match self {
            CppStandard::Cpp11 | CppStandard::Cpp14 => "c++14",
            CppStandard::Cpp17 => "c++17",
            CppStandard::Cpp20 => "c++20",
            CppStandard::Cpp23 => "c++latest",
        }
    }
}

/// C language standard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CStandard {
    #[serde(rename = "c99")]
    C99,
    #[serde(rename = "c11")]
    C11,
    #[serde(rename = "c17")]
    C17,
    #[serde(rename = "c23")]
    C23,
}

impl CStandard {
    pub fn as_flag_value(&self) -> &'static str {
        match self {
            CStandard::C99 => "c99",
            CStandard::C11 => "c11",
            CStandard::C17 => "c17",
            CStandard::C23 => "c23",
        }
    }

    /// Value for the MSVC `/std:` flag. cl supports c11 and up.
    pub fn as_msvc_flag_value(&self) -> &'static str {
        match self {
            CStandard::C99 | CStandard::C11 => "c11",
            CStandard::C17 => "c17",
            CStandard::C23 => "clatest",
        }
    }
}

/// Optimization level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Optimization {
    O0,
    O1,
    O2,
    O3,
    Os,
}

impl Optimization {
    pub fn as_gcc_flag(&self) -> &'static str {
        match self {
            Optimization::O0 => "-O0",
            Optimization::O1 => "-O1",
            Optimization::O2 => "-O2",
            Optimization::O3 => "-O3",
            Optimization::Os => "-Os",
        }
    }

    pub fn as_msvc_flag(&self) -> &'static str {
        match self {
            Optimization::O0 => "/Od",
            Optimization::O1 | Optimization::Os => "/O1",
            Optimization::O2 | Optimization::O3 => "/O2",
        }
    }
}

impl Optimization {
    pub fn as_str(&self) -> &'static str {
        match self {
            Optimization::O0 => "o0",
            Optimization::O1 => "o1",
            Optimization::O2 => "o2",
            Optimization::O3 => "o3",
            Optimization::Os => "os",
        }
    }
}

impl fmt::Display for Optimization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for CppStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_flag_value())
    }
}

impl fmt::Display for CStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_flag_value())
    }
}

/// CPU instruction-set extension level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CpuExtension {
    Default,
    Sse2,
    Avx,
    Avx2,
    Avx512,
    Neon,
}

impl Default for CpuExtension {
    fn default() -> Self {
        CpuExtension::Default
    }
}

impl CpuExtension {
    pub fn as_gcc_flag(&self) -> Option<&'static str> {
        match self {
            CpuExtension::Default => None,
            CpuExtension::Sse2 => Some("-msse2"),
            CpuExtension::Avx => Some("-mavx"),
            CpuExtension::Avx2 => Some("-mavx2"),
            CpuExtension::Avx512 => Some("-mavx512f"),
            CpuExtension::Neon => Some("-mfpu=neon"),
        }
    }

    pub fn as_msvc_flag(&self) -> Option<&'static str> {
        match self {
            CpuExtension::Default | CpuExtension::Neon => None,
            CpuExtension::Sse2 => Some("/arch:SSE2"),
            CpuExtension::Avx => Some("/arch:AVX"),
            CpuExtension::Avx2 => Some("/arch:AVX2"),
            CpuExtension::Avx512 => Some("/arch:AVX512"),
        }
    }
}

impl CpuExtension {
    pub fn as_str(&self) -> &'static str {
        match self {
            CpuExtension::Default => "default",
            CpuExtension::Sse2 => "sse2",
            CpuExtension::Avx => "avx",
            CpuExtension::Avx2 => "avx2",
            CpuExtension::Avx512 => "avx512",
            CpuExtension::Neon => "neon",
        }
    }
}

impl fmt::Display for CpuExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A preprocessor define: a name with an optional value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Define {
    pub name: String,
    pub value: Option<String>,
}

impl Define {
    /// Create a valueless define.
    pub fn flag(name: impl Into<String>) -> Self {
        Define {
            name: name.into(),
            value: None,
        }
    }

    /// Create a key-value define.
    pub fn key_value(name: impl Into<String>, value: impl Into<String>) -> Self {
        Define {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    /// Parse `NAME` or `NAME=VALUE`.
    pub fn parse(s: &str) -> Self {
        match s.split_once('=') {
            Some((name, value)) => Define::key_value(name, value),
            None => Define::flag(s),
        }
    }

    /// Render with the given prefix (`-D` or `/D`).
    pub fn to_flag(&self, prefix: &str) -> String {
        match &self.value {
            Some(v) => format!("{}{}={}", prefix, self.name, v),
            None => format!("{}{}", prefix, self.name),
        }
    }
}

impl fmt::Display for Define {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(v) => write!(f, "{}={}", self.name, v),
            None => f.write_str(&self.name),
        }
    }
}

/// A link input: a library referenced by name or by absolute path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LibraryRef {
    Name(String),
    Path(PathBuf),
}

impl LibraryRef {
    /// Parse a library reference. Entries containing a path separator or a
    /// library file extension are treated as paths.
    pub fn parse(s: &str) -> Self {
        let looks_like_path = s.contains('/')
            || s.contains('\\')
            || [".a", ".so", ".dylib", ".lib", ".dll"]
                .iter()
                .any(|ext| s.ends_with(ext));
        if looks_like_path {
            LibraryRef::Path(PathBuf::from(s))
        } else {
            LibraryRef::Name(s.to_string())
        }
    }
}

impl fmt::Display for LibraryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LibraryRef::Name(n) => f.write_str(n),
            LibraryRef::Path(p) => write!(f, "{}", p.display()),
        }
    }
}

/// A module: the typed attribute bag the build engine operates on.
#[derive(Debug, Clone)]
pub struct Module {
    name: String,
    module_type: ModuleType,
    sources: Vec<PathBuf>,
    includes: AccessLimited<PathBuf>,
    definitions: AccessLimited<Define>,
    libraries: AccessLimited<LibraryRef>,
    compiler_options: AccessLimited<String>,
    linker_options: AccessLimited<String>,
    dependencies: AccessLimited<ModuleReference>,
    forced_includes: Vec<PathBuf>,
    delay_load_dlls: Vec<String>,
    cpp_standard: CppStandard,
    c_standard: Option<CStandard>,
    optimization: Optimization,
    cpu_extension: CpuExtension,
    enable_exceptions: bool,
    enable_rtti: bool,
    enable_fast_fp: bool,
    is_debug: bool,
    enable_debug_symbols: bool,
    toolchain_hint: Option<String>,
    options: BTreeMap<String, OptionValue>,
    frozen: bool,
}

impl Module {
    /// Create a new, unfrozen module with default settings.
    pub fn new(name: impl Into<String>, module_type: ModuleType) -> Self {
        Module {
            name: name.into(),
            module_type,
            sources: Vec::new(),
            includes: AccessLimited::new(),
            definitions: AccessLimited::new(),
            libraries: AccessLimited::new(),
            compiler_options: AccessLimited::new(),
            linker_options: AccessLimited::new(),
            dependencies: AccessLimited::new(),
            forced_includes: Vec::new(),
            delay_load_dlls: Vec::new(),
            cpp_standard: CppStandard::Cpp17,
            c_standard: None,
            optimization: Optimization::O2,
            cpu_extension: CpuExtension::Default,
            enable_exceptions: true,
            enable_rtti: true,
            enable_fast_fp: false,
            is_debug: false,
            enable_debug_symbols: false,
            toolchain_hint: None,
            options: BTreeMap::new(),
            frozen: false,
        }
    }

    fn ensure_mutable(&self) -> Result<()> {
        if self.frozen {
            return Err(BuildError::FrozenModule {
                module: self.name.clone(),
            });
        }
        Ok(())
    }

    /// Freeze the module. All further mutation fails with `FrozenModule`.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn module_type(&self) -> ModuleType {
        self.module_type
    }

    pub fn set_module_type(&mut self, ty: ModuleType) -> Result<()> {
        self.ensure_mutable()?;
        self.module_type = ty;
        Ok(())
    }

    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    pub fn set_sources(&mut self, sources: Vec<PathBuf>) -> Result<()> {
        self.ensure_mutable()?;
        self.sources = sources;
        Ok(())
    }

    pub fn includes(&self) -> &AccessLimited<PathBuf> {
        &self.includes
    }

    pub fn includes_mut(&mut self) -> Result<&mut AccessLimited<PathBuf>> {
        self.ensure_mutable()?;
        Ok(&mut self.includes)
    }

    pub fn definitions(&self) -> &AccessLimited<Define> {
        &self.definitions
    }

    pub fn definitions_mut(&mut self) -> Result<&mut AccessLimited<Define>> {
        self.ensure_mutable()?;
        Ok(&mut self.definitions)
    }

    pub fn libraries(&self) -> &AccessLimited<LibraryRef> {
        &self.libraries
    }

    pub fn libraries_mut(&mut self) -> Result<&mut AccessLimited<LibraryRef>> {
        self.ensure_mutable()?;
        Ok(&mut self.libraries)
    }

    pub fn compiler_options(&self) -> &AccessLimited<String> {
        &self.compiler_options
    }

    pub fn compiler_options_mut(&mut self) -> Result<&mut AccessLimited<String>> {
        self.ensure_mutable()?;
        Ok(&mut self.compiler_options)
    }

    pub fn linker_options(&self) -> &AccessLimited<String> {
        &self.linker_options
    }

    pub fn linker_options_mut(&mut self) -> Result<&mut AccessLimited<String>> {
        self.ensure_mutable()?;
        Ok(&mut self.linker_options)
    }

    pub fn dependencies(&self) -> &AccessLimited<ModuleReference> {
        &self.dependencies
    }

    pub fn dependencies_mut(&mut self) -> Result<&mut AccessLimited<ModuleReference>> {
        self.ensure_mutable()?;
        Ok(&mut self.dependencies)
    }

    pub fn forced_includes(&self) -> &[PathBuf] {
        &self.forced_includes
    }

    pub fn set_forced_includes(&mut self, paths: Vec<PathBuf>) -> Result<()> {
        self.ensure_mutable()?;
        self.forced_includes = paths;
        Ok(())
    }

    pub fn delay_load_dlls(&self) -> &[String] {
        &self.delay_load_dlls
    }

    pub fn set_delay_load_dlls(&mut self, dlls: Vec<String>) -> Result<()> {
        self.ensure_mutable()?;
        self.delay_load_dlls = dlls;
        Ok(())
    }

    pub fn cpp_standard(&self) -> CppStandard {
        self.cpp_standard
    }

    pub fn set_cpp_standard(&mut self, std: CppStandard) -> Result<()> {
        self.ensure_mutable()?;
        self.cpp_standard = std;
        Ok(())
    }

    pub fn c_standard(&self) -> Option<CStandard> {
        self.c_standard
    }

    pub fn set_c_standard(&mut self, std: Option<CStandard>) -> Result<()> {
        self.ensure_mutable()?;
        self.c_standard = std;
        Ok(())
    }

    pub fn optimization(&self) -> Optimization {
        self.optimization
    }

    pub fn set_optimization(&mut self, opt: Optimization) -> Result<()> {
        self.ensure_mutable()?;
        self.optimization = opt;
        Ok(())
    }

    pub fn cpu_extension(&self) -> CpuExtension {
        self.cpu_extension
    }

    pub fn set_cpu_extension(&mut self, ext: CpuExtension) -> Result<()> {
        self.ensure_mutable()?;
        self.cpu_extension = ext;
        Ok(())
    }

    pub fn enable_exceptions(&self) -> bool {
        self.enable_exceptions
    }

    pub fn set_enable_exceptions(&mut self, on: bool) -> Result<()> {
        self.ensure_mutable()?;
        self.enable_exceptions = on;
        Ok(())
    }

    pub fn enable_rtti(&self) -> bool {
        self.enable_rtti
    }

    pub fn set_enable_rtti(&mut self, on: bool) -> Result<()> {
        self.ensure_mutable()?;
        self.enable_rtti = on;
        Ok(())
    }

    pub fn enable_fast_fp(&self) -> bool {
        self.enable_fast_fp
    }

    pub fn set_enable_fast_fp(&mut self, on: bool) -> Result<()> {
        self.ensure_mutable()?;
        self.enable_fast_fp = on;
        Ok(())
    }

    pub fn is_debug(&self) -> bool {
        self.is_debug
    }

    pub fn set_is_debug(&mut self, on: bool) -> Result<()> {
        self.ensure_mutable()?;
        self.is_debug = on;
        Ok(())
    }

    pub fn enable_debug_symbols(&self) -> bool {
        self.enable_debug_symbols
    }

    pub fn set_enable_debug_symbols(&mut self, on: bool) -> Result<()> {
        self.ensure_mutable()?;
        self.enable_debug_symbols = on;
        Ok(())
    }

    pub fn toolchain_hint(&self) -> Option<&str> {
        self.toolchain_hint.as_deref()
    }

    pub fn set_toolchain_hint(&mut self, hint: Option<String>) -> Result<()> {
        self.ensure_mutable()?;
        self.toolchain_hint = hint;
        Ok(())
    }

    /// Bound option values, by name.
    pub fn options(&self) -> &BTreeMap<String, OptionValue> {
        &self.options
    }

    /// Record a bound option value.
    pub fn bind_option(&mut self, name: impl Into<String>, value: OptionValue) -> Result<()> {
        self.ensure_mutable()?;
        self.options.insert(name.into(), value);
        Ok(())
    }

    /// The language driving the link step: C++ if any source is C++.
    pub fn link_language(&self) -> Language {
        if self
            .sources
            .iter()
            .any(|s| Language::from_path(s) == Some(Language::Cxx))
        {
            Language::Cxx
        } else {
            Language::C
        }
    }
}
