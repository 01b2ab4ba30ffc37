//! Core data model: modules, access-qualified collections, options,
//! platforms, and registries.

pub mod access;
pub mod module;
pub mod options;
pub mod platform;
pub mod reference;
pub mod registry;

pub use access::AccessLimited;
pub use module::{
    CStandard, CppStandard, CpuExtension, Define, Language, LibraryRef, Module, ModuleType,
    Optimization,
};
pub use options::{OptionDescriptor, OptionType, OptionValue};
pub use platform::{Architecture, Platform};
pub use reference::ModuleReference;
pub use registry::Registry;
