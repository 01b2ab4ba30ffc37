//! Secondary artifact generators.
//!
//! Generators consume the planned task list without executing it.

pub mod compile_commands;

pub use compile_commands::write_compile_commands;
