//! Module instancing.
//!
//! Turns a `ModuleReference` into a frozen `(module, variant-id)` handle:
//! canonicalize the path, load descriptors, construct with a `ModuleContext`,
//! bind options, apply the output transformer, validate, freeze. Identical
//! references (same canonical path, option map, and transformer) share one
//! instance through a mutex-guarded cache.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::core::module::Module;
use crate::core::options::{bind_options, variant_id};
use crate::core::reference::ModuleReference;
use crate::errors::{BuildError, Result};
use crate::loader::{ModuleContext, ModuleDefinitionLoader};
use crate::util::fs::canonicalize;

/// A frozen module together with its identity within the build.
#[derive(Debug)]
pub struct ModuleInstance {
    pub module: Module,
    pub variant_id: String,
    /// Canonical path of the definition file.
    pub path: PathBuf,
    /// Directory containing the definition file.
    pub dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct InstanceKey {
    path: PathBuf,
    module: Option<String>,
    options: BTreeMap<String, String>,
    transformer: Option<String>,
}

/// Creates and caches module instances.
pub struct Instancer {
    loader: Arc<dyn ModuleDefinitionLoader>,
    host_platform: String,
    target_platform: String,
    toolchain_hint: Option<String>,
    watching: bool,
    debug: bool,
    cache: Mutex<HashMap<InstanceKey, Arc<ModuleInstance>>>,
}

impl Instancer {
    pub fn new(
        loader: Arc<dyn ModuleDefinitionLoader>,
        host_platform: impl Into<String>,
        target_platform: impl Into<String>,
        toolchain_hint: Option<String>,
        watching: bool,
        debug: bool,
    ) -> Self {
        Instancer {
            loader,
            host_platform: host_platform.into(),
            target_platform: target_platform.into(),
            toolchain_hint,
            watching,
            debug,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// The loader this instancer constructs modules through.
    pub fn loader(&self) -> &Arc<dyn ModuleDefinitionLoader> {
        &self.loader
    }

    /// Instantiate the module a reference points at, deduplicating identical
    /// references.
    pub fn instantiate(
        &self,
        reference: &ModuleReference,
        base_dir: &Path,
    ) -> Result<Arc<ModuleInstance>> {
        let file = reference.definition_file(base_dir);
        let path = canonicalize(&file).map_err(|_| BuildError::ModuleFileLoad {
            path: file.clone(),
            reason: "definition file not found".to_string(),
        })?;

        let key = InstanceKey {
            path: path.clone(),
            module: reference.module.clone(),
            options: reference.options.clone(),
            transformer: reference.transformer.clone(),
        };
        if let Some(instance) = self.cache.lock().unwrap().get(&key) {
            return Ok(Arc::clone(instance));
        }

        let instance = Arc::new(self.construct(reference, &path)?);

        let mut cache = self.cache.lock().unwrap();
        let entry = cache.entry(key).or_insert_with(|| Arc::clone(&instance));
        Ok(Arc::clone(entry))
    }

    fn construct(&self, reference: &ModuleReference, path: &Path) -> Result<ModuleInstance> {
        let descriptors = self.loader.load(path)?;

        let descriptor = match &reference.module {
            Some(name) => descriptors.iter().find(|d| &d.name == name).ok_or_else(|| {
                BuildError::ModuleFileLoad {
                    path: path.to_path_buf(),
                    reason: format!(
                        "no module named `{}` (available: {})",
                        name,
                        descriptors
                            .iter()
                            .map(|d| d.name.as_str())
                            .collect::<Vec<_>>()
                            .join(", ")
                    ),
                }
            })?,
            None if descriptors.len() == 1 => &descriptors[0],
            None => {
                return Err(BuildError::ModuleFileLoad {
                    path: path.to_path_buf(),
                    reason: format!(
                        "file declares {} modules; the reference must name one",
                        descriptors.len()
                    ),
                });
            }
        };

        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let cx = ModuleContext {
            module_file: path.to_path_buf(),
            module_dir: dir.clone(),
            host_platform: self.host_platform.clone(),
            target_platform: self.target_platform.clone(),
            toolchain_hint: self.toolchain_hint.clone(),
            options: reference.options.clone(),
            watching: self.watching,
            debug: self.debug,
        };

        let mut module = descriptor.instantiate(&cx)?;
        bind_options(&mut module, &descriptor.options, &cx.options)?;

        if let Some(tag) = &reference.transformer {
            let transformer =
                descriptor
                    .transformers
                    .get(tag)
                    .ok_or_else(|| BuildError::UnknownTransformer {
                        name: tag.clone(),
                        module: module.name().to_string(),
                    })?;
            transformer.apply(&mut module)?;
        }

        validate(&module, descriptor.module_type.is_some())?;
        module.freeze();

        let variant_id = variant_id(&module, &descriptor.options);
        Ok(ModuleInstance {
            module,
            variant_id,
            path: path.to_path_buf(),
            dir,
        })
    }
}

fn validate(module: &Module, type_declared: bool) -> Result<()> {
    if module.name().is_empty() {
        return Err(BuildError::InvalidModule {
            module: "<unnamed>".to_string(),
            reason: "module name is empty".to_string(),
        });
    }
    if !type_declared {
        return Err(BuildError::InvalidModule {
            module: module.name().to_string(),
            reason: "module type is not set".to_string(),
        });
    }
    Ok(())
}
