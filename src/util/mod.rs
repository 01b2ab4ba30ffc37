//! Shared utilities.

pub mod fs;
pub mod hash;
pub mod process;

pub use hash::Fingerprint;
pub use process::{CancelToken, ProcessBuilder, ProcessOutput, ProcessRunner, SystemRunner};
