//! EBuild - a C/C++ build system driven by declarative module definitions.
//!
//! This crate provides the core engine: module instancing with option
//! binding, dependency-graph resolution with public/private attribute
//! propagation, toolchain dispatch, build planning and execution, and
//! secondary artifact generation.

pub mod builder;
pub mod core;
pub mod errors;
pub mod generators;
pub mod graph;
pub mod loader;
pub mod toolchain;
pub mod util;

pub use crate::core::{
    AccessLimited, Define, LibraryRef, Module, ModuleReference, ModuleType, Platform, Registry,
};
pub use builder::{BuildContext, BuildExecutor, BuildPlan, BuildReport};
pub use errors::{BuildError, Result};
pub use graph::{Instancer, ModuleGraph, ModuleInstance, ResolveMode};
pub use loader::{ModuleDefinitionLoader, TomlLoader};
