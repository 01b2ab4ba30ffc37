//! Declarative TOML module definitions.
//!
//! An `.ebuild` file declares one or more modules:
//!
//! ```toml
//! [[modules]]
//! name = "zippy"
//! type = "static-library"
//! c-standard = "c17"
//! sources = ["src/*.c"]
//!
//! [modules.includes]
//! public = ["include"]
//! private = ["src"]
//!
//! [[modules.dependencies.public]]
//! path = "../checksum"
//! options = { fast = "true" }
//!
//! [modules.options.fast]
//! type = "bool"
//! changes-binary = true
//! define = "ZIPPY_FAST"
//!
//! [modules.transformers.shared]
//! type = "shared-library"
//! definitions = { public = ["ZIPPY_SHARED"] }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::core::access::AccessLimited;
use crate::core::module::{
    CStandard, CppStandard, CpuExtension, Define, LibraryRef, ModuleType, Optimization,
};
use crate::core::options::{OptionDescriptor, OptionType};
use crate::core::reference::ModuleReference;
use crate::errors::{BuildError, Result};
use crate::util::fs::read_to_string;

use super::{ModuleDefinitionLoader, ModuleDescriptor, OutputTransformer};

/// Loader for the TOML definition dialect.
#[derive(Debug, Default)]
pub struct TomlLoader;

impl TomlLoader {
    pub fn new() -> Self {
        TomlLoader
    }
}

impl ModuleDefinitionLoader for TomlLoader {
    fn load(&self, path: &Path) -> Result<Vec<ModuleDescriptor>> {
        let text = read_to_string(path).map_err(|e| BuildError::ModuleFileLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let file: TomlFile = toml::from_str(&text).map_err(|e| BuildError::ModuleFileLoad {
            path: path.to_path_buf(),
            reason: e.message().to_string(),
        })?;

        if file.modules.is_empty() {
            return Err(BuildError::ModuleFileLoad {
                path: path.to_path_buf(),
                reason: "file declares no modules".to_string(),
            });
        }

        Ok(file
            .modules
            .into_iter()
            .map(TomlModule::into_descriptor)
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct TomlFile {
    #[serde(default)]
    modules: Vec<TomlModule>,
}

/// Public/private section as written in TOML.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlAccess<T> {
    #[serde(default = "Vec::new")]
    public: Vec<T>,
    #[serde(default = "Vec::new")]
    private: Vec<T>,
}

impl<T> Default for TomlAccess<T> {
    fn default() -> Self {
        TomlAccess {
            public: Vec::new(),
            private: Vec::new(),
        }
    }
}

impl<T> TomlAccess<T> {
    fn into_access<U: Clone + PartialEq>(self, f: impl Fn(T) -> U) -> AccessLimited<U> {
        let mut out = AccessLimited::new();
        out.extend_public(self.public.into_iter().map(&f));
        out.extend_private(self.private.into_iter().map(&f));
        out
    }
}

/// A dependency entry: either a bare path string or a full table.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TomlReference {
    Path(String),
    Full {
        path: String,
        #[serde(default)]
        module: Option<String>,
        #[serde(default)]
        options: BTreeMap<String, String>,
        #[serde(default)]
        transformer: Option<String>,
    },
}

impl TomlReference {
    fn into_reference(self) -> ModuleReference {
        match self {
            TomlReference::Path(path) => ModuleReference::new(path),
            TomlReference::Full {
                path,
                module,
                options,
                transformer,
            } => ModuleReference {
                path: path.into(),
                module,
                options,
                transformer,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct TomlOption {
    #[serde(default)]
    description: String,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    changes_binary: bool,
    #[serde(default, rename = "type")]
    value_type: OptionType,
    #[serde(default)]
    values: Vec<String>,
    #[serde(default)]
    default: Option<String>,
    #[serde(default)]
    define: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct TomlTransformer {
    #[serde(default, rename = "type")]
    module_type: Option<ModuleType>,
    #[serde(default)]
    definitions: TomlAccess<String>,
    #[serde(default)]
    compiler_options: TomlAccess<String>,
    #[serde(default)]
    linker_options: TomlAccess<String>,
    #[serde(default)]
    libraries: TomlAccess<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct TomlModule {
    name: String,
    #[serde(rename = "type")]
    module_type: Option<ModuleType>,
    #[serde(default)]
    sources: Vec<String>,
    #[serde(default)]
    includes: TomlAccess<String>,
    #[serde(default)]
    definitions: TomlAccess<String>,
    #[serde(default)]
    libraries: TomlAccess<String>,
    #[serde(default)]
    compiler_options: TomlAccess<String>,
    #[serde(default)]
    linker_options: TomlAccess<String>,
    #[serde(default)]
    dependencies: TomlAccess<TomlReference>,
    #[serde(default)]
    forced_includes: Vec<String>,
    #[serde(default)]
    delay_load_dlls: Vec<String>,
    #[serde(default)]
    cpp_standard: Option<CppStandard>,
    #[serde(default)]
    c_standard: Option<CStandard>,
    #[serde(default)]
    optimization: Option<Optimization>,
    #[serde(default)]
    cpu_extension: Option<CpuExtension>,
    #[serde(default)]
    exceptions: Option<bool>,
    #[serde(default)]
    rtti: Option<bool>,
    #[serde(default)]
    fast_fp: Option<bool>,
    #[serde(default)]
    debug_symbols: Option<bool>,
    #[serde(default)]
    toolchain: Option<String>,
    #[serde(default)]
    options: BTreeMap<String, TomlOption>,
    #[serde(default)]
    transformers: BTreeMap<String, TomlTransformer>,
}

impl TomlModule {
    fn into_descriptor(self) -> ModuleDescriptor {
        let options = self
            .options
            .into_iter()
            .map(|(name, o)| OptionDescriptor {
                name,
                description: o.description,
                required: o.required,
                changes_binary: o.changes_binary,
                value_type: o.value_type,
                members: o.values,
                default: o.default,
                define: o.define,
            })
            .collect();

        let transformers = self
            .transformers
            .into_iter()
            .map(|(name, t)| {
                (
                    name,
                    OutputTransformer {
                        module_type: t.module_type,
                        definitions: t.definitions.into_access(|s| Define::parse(&s)),
                        compiler_options: t.compiler_options.into_access(|s| s),
                        linker_options: t.linker_options.into_access(|s| s),
                        libraries: t.libraries.into_access(|s| LibraryRef::parse(&s)),
                    },
                )
            })
            .collect();

        ModuleDescriptor {
            name: self.name,
            module_type: self.module_type,
            sources: self.sources,
            includes: self.includes.into_access(|s| s),
            definitions: self.definitions.into_access(|s| Define::parse(&s)),
            libraries: self.libraries.into_access(|s| LibraryRef::parse(&s)),
            compiler_options: self.compiler_options.into_access(|s| s),
            linker_options: self.linker_options.into_access(|s| s),
            dependencies: self.dependencies.into_access(TomlReference::into_reference),
            forced_includes: self.forced_includes,
            delay_load_dlls: self.delay_load_dlls,
            cpp_standard: self.cpp_standard,
            c_standard: self.c_standard,
            optimization: self.optimization,
            cpu_extension: self.cpu_extension,
            enable_exceptions: self.exceptions,
            enable_rtti: self.rtti,
            enable_fast_fp: self.fast_fp,
            enable_debug_symbols: self.debug_symbols,
            toolchain: self.toolchain,
            options,
            transformers,
        }
    }
}
