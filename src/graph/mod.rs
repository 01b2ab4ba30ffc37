//! Module instancing and the resolved dependency graph.

pub mod instance;
pub mod resolve;

pub use instance::{Instancer, ModuleInstance};
pub use resolve::{Access, GraphNode, ModuleGraph, PropagatedSet, ResolveMode};
