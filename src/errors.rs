//! Error taxonomy for the build engine.
//!
//! Every failure the engine can surface is a `BuildError` kind. Fatal kinds
//! abort the invocation; `CompileFailure`/`LinkFailure` mark a module failed
//! while siblings continue.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Result alias used throughout the engine.
pub type Result<T> = std::result::Result<T, BuildError>;

/// All error kinds the build engine surfaces.
#[derive(Debug, Error, Diagnostic)]
pub enum BuildError {
    /// An option name failed validation.
    #[error("invalid option name `{name}`: illegal character(s) at column(s) {columns:?}")]
    #[diagnostic(
        code(ebuild::options::bad_name),
        help("option names must match `^[A-Za-z_\\-+$@.]+[A-Za-z0-9_\\-+$@.]*$`")
    )]
    BadOptionName { name: String, columns: Vec<usize> },

    /// A required option was not supplied.
    #[error("missing required option `{name}` for module `{module}`")]
    #[diagnostic(code(ebuild::options::missing))]
    MissingOption { name: String, module: String },

    /// An option value could not be parsed into its declared type.
    #[error("invalid value `{raw}` for option `{name}`: expected {expected}")]
    #[diagnostic(code(ebuild::options::bad_value))]
    BadOptionValue {
        name: String,
        raw: String,
        expected: String,
    },

    /// An option was supplied that the module does not declare.
    #[error("module `{module}` declares no option named `{name}`")]
    #[diagnostic(code(ebuild::options::unknown))]
    UnknownOption { name: String, module: String },

    /// A reference named an output transformer the module does not define.
    #[error("unknown output transformer `{name}` for module `{module}`")]
    #[diagnostic(code(ebuild::instancing::unknown_transformer))]
    UnknownTransformer { name: String, module: String },

    /// Post-construction module validation failed.
    #[error("invalid module `{module}`: {reason}")]
    #[diagnostic(code(ebuild::instancing::invalid_module))]
    InvalidModule { module: String, reason: String },

    /// The loader could not produce module descriptors for a file.
    #[error("failed to load module definitions from {}: {reason}", path.display())]
    #[diagnostic(code(ebuild::loader::load_failed))]
    ModuleFileLoad { path: PathBuf, reason: String },

    /// A module was mutated after it was frozen. Programmer error.
    #[error("module `{module}` is frozen and can no longer be mutated")]
    FrozenModule { module: String },

    /// Two registrations collided on the same name. Programmer error.
    #[error("duplicate registry entry `{name}`")]
    DuplicateName { name: String },

    /// A registry lookup found nothing.
    #[error("no registry entry named `{name}`")]
    NotFound { name: String },

    /// The selected toolchain cannot build the module.
    #[error("toolchain `{toolchain}` cannot build module `{module}`")]
    #[diagnostic(code(ebuild::toolchain::incompatible))]
    ToolchainIncompatible { toolchain: String, module: String },

    /// A required tool executable is missing.
    #[error("tool `{tool}` not found on PATH or at a configured location")]
    #[diagnostic(code(ebuild::toolchain::tool_not_found))]
    ToolNotFound { tool: String },

    /// A compiler process exited non-zero.
    #[error("compiling {} for module `{module}` failed (exit {status})", source_file.display())]
    CompileFailure {
        module: String,
        source_file: PathBuf,
        status: i32,
    },

    /// A linker or archiver process exited non-zero.
    #[error("linking {} for module `{module}` failed (exit {status})", output.display())]
    LinkFailure {
        module: String,
        output: PathBuf,
        status: i32,
    },

    /// The module graph contains a cycle.
    #[error("circular dependency: {chain}")]
    #[diagnostic(code(ebuild::graph::circular_dependency))]
    CircularDependency { chain: String },

    /// The cancel signal fired.
    #[error("build cancelled")]
    Cancelled,

    /// A module's source preparation phase failed.
    #[error("source preparation failed for module `{module}`: {reason}")]
    SetupFailure { module: String, reason: String },

    /// A filesystem operation failed.
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BuildError {
    /// Wrap an io error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BuildError::Io {
            path: path.into(),
            source,
        }
    }

    /// Short kind tag used as the `kind` field of structured diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            BuildError::BadOptionName { .. } => "BadOptionName",
            BuildError::MissingOption { .. } => "MissingOption",
            BuildError::BadOptionValue { .. } => "BadOptionValue",
            BuildError::UnknownOption { .. } => "UnknownOption",
            BuildError::UnknownTransformer { .. } => "UnknownTransformer",
            BuildError::InvalidModule { .. } => "InvalidModule",
            BuildError::ModuleFileLoad { .. } => "ModuleFileLoadError",
            BuildError::FrozenModule { .. } => "FrozenModule",
            BuildError::DuplicateName { .. } => "DuplicateName",
            BuildError::NotFound { .. } => "NotFound",
            BuildError::ToolchainIncompatible { .. } => "ToolchainIncompatible",
            BuildError::ToolNotFound { .. } => "ToolNotFound",
            BuildError::CompileFailure { .. } => "CompileFailure",
            BuildError::LinkFailure { .. } => "LinkFailure",
            BuildError::CircularDependency { .. } => "CircularDependency",
            BuildError::Cancelled => "Cancelled",
            BuildError::SetupFailure { .. } => "SetupFailure",
            BuildError::Io { .. } => "IoError",
        }
    }
}
