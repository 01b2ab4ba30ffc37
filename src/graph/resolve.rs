//! Dependency graph construction and attribute propagation.
//!
//! The graph is built depth-first over module references. Nodes are keyed by
//! `(canonical path, module name, variant-id)` so the same definition may
//! appear under several variants. Grey/black marks detect cycles; the full
//! chain is recorded and construction continues, so `check` mode can report
//! every cycle while `build` mode refuses before any compilation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;

use crate::core::module::{Define, LibraryRef, Module};
use crate::core::reference::ModuleReference;
use crate::errors::{BuildError, Result};
use crate::graph::instance::{Instancer, ModuleInstance};

/// How cycles are treated during resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    /// Cycles abort resolution with `CircularDependency`.
    Build,
    /// Cycles are collected and reported as data.
    Check,
}

/// Whether a dependency edge propagates onward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Private,
}

/// The attribute buckets that flow along graph edges.
#[derive(Debug, Clone, Default)]
pub struct PropagatedSet {
    pub includes: Vec<PathBuf>,
    pub definitions: Vec<Define>,
    pub libraries: Vec<LibraryRef>,
    pub compiler_options: Vec<String>,
    pub linker_options: Vec<String>,
}

fn push_missing<T: Clone + PartialEq>(dst: &mut Vec<T>, src: &[T]) {
    for item in src {
        if !dst.contains(item) {
            dst.push(item.clone());
        }
    }
}

impl PropagatedSet {
    /// The public buckets of a module's own collections.
    fn from_public(module: &Module) -> Self {
        PropagatedSet {
            includes: module.includes().propagated().to_vec(),
            definitions: module.definitions().propagated().to_vec(),
            libraries: module.libraries().propagated().to_vec(),
            compiler_options: module.compiler_options().propagated().to_vec(),
            linker_options: module.linker_options().propagated().to_vec(),
        }
    }

    /// First-seen-wins merge of another set into this one.
    fn merge(&mut self, other: &PropagatedSet) {
        push_missing(&mut self.includes, &other.includes);
        push_missing(&mut self.definitions, &other.definitions);
        push_missing(&mut self.libraries, &other.libraries);
        push_missing(&mut self.compiler_options, &other.compiler_options);
        push_missing(&mut self.linker_options, &other.linker_options);
    }
}

/// A `(module, variant)` node of the resolved graph.
#[derive(Debug)]
pub struct GraphNode {
    pub instance: Arc<ModuleInstance>,
    /// Outgoing edges in source-declared order.
    pub deps: Vec<(NodeIndex, Access)>,
    /// Union of the exported sets of all dependencies.
    pub inherited: PropagatedSet,
    /// What this node offers to its dependents: own public buckets plus the
    /// exported sets of public dependencies.
    pub exported: PropagatedSet,
}

impl GraphNode {
    fn new(instance: Arc<ModuleInstance>) -> Self {
        GraphNode {
            instance,
            deps: Vec::new(),
            inherited: PropagatedSet::default(),
            exported: PropagatedSet::default(),
        }
    }

    fn effective<T: Clone + PartialEq>(own: Vec<T>, inherited: &[T]) -> Vec<T> {
        let mut out = own;
        push_missing(&mut out, inherited);
        out
    }

    /// Effective include directories: joined own buckets plus inherited.
    pub fn effective_includes(&self) -> Vec<PathBuf> {
        Self::effective(self.instance.module.includes().joined(), &self.inherited.includes)
    }

    pub fn effective_definitions(&self) -> Vec<Define> {
        Self::effective(
            self.instance.module.definitions().joined(),
            &self.inherited.definitions,
        )
    }

    pub fn effective_libraries(&self) -> Vec<LibraryRef> {
        Self::effective(
            self.instance.module.libraries().joined(),
            &self.inherited.libraries,
        )
    }

    pub fn effective_compiler_options(&self) -> Vec<String> {
        Self::effective(
            self.instance.module.compiler_options().joined(),
            &self.inherited.compiler_options,
        )
    }

    pub fn effective_linker_options(&self) -> Vec<String> {
        Self::effective(
            self.instance.module.linker_options().joined(),
            &self.inherited.linker_options,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Grey,
    Black,
}

type NodeKey = (PathBuf, String, String);

/// The resolved module graph.
#[derive(Debug)]
pub struct ModuleGraph {
    graph: DiGraph<GraphNode, Access>,
    root: NodeIndex,
    cycles: Vec<String>,
}

impl ModuleGraph {
    /// Resolve the graph rooted at a reference.
    pub fn resolve(
        instancer: &Instancer,
        root: &ModuleReference,
        base_dir: &Path,
        mode: ResolveMode,
    ) -> Result<ModuleGraph> {
        let mut builder = GraphBuilder {
            instancer,
            graph: DiGraph::new(),
            keys: HashMap::new(),
            marks: HashMap::new(),
            stack: Vec::new(),
            cycles: Vec::new(),
        };

        let root_ix = builder.visit(root, base_dir)?;

        let mut graph = ModuleGraph {
            graph: builder.graph,
            root: root_ix,
            cycles: builder.cycles,
        };

        if !graph.cycles.is_empty() {
            if mode == ResolveMode::Build {
                return Err(BuildError::CircularDependency {
                    chain: graph.cycles[0].clone(),
                });
            }
            // Cycles tolerated: skip propagation, the caller only inspects
            // the cycle list.
            return Ok(graph);
        }

        graph.propagate();
        Ok(graph)
    }

    pub fn root(&self) -> NodeIndex {
        self.root
    }

    pub fn node(&self, ix: NodeIndex) -> &GraphNode {
        &self.graph[ix]
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Formatted cycle chains (`a → b → a`), if any were found.
    pub fn cycles(&self) -> &[String] {
        &self.cycles
    }

    /// Node indices in leaf-first topological order.
    ///
    /// Only meaningful on an acyclic graph; with tolerated cycles the raw
    /// node order is returned.
    pub fn topo_order(&self) -> Vec<NodeIndex> {
        match toposort(&self.graph, None) {
            Ok(mut order) => {
                order.reverse();
                order
            }
            Err(_) => self.graph.node_indices().collect(),
        }
    }

    /// All nodes reachable from `ix` (excluding `ix`), ordered with
    /// dependents before their dependencies. This is the link order for
    /// dependency artifacts.
    pub fn transitive_deps(&self, ix: NodeIndex) -> Vec<NodeIndex> {
        let mut reachable = Vec::new();
        let mut dfs = Dfs::new(&self.graph, ix);
        while let Some(n) = dfs.next(&self.graph) {
            if n != ix {
                reachable.push(n);
            }
        }

        let mut order = self.topo_order();
        order.reverse(); // dependents first
        order.retain(|n| reachable.contains(n));
        order
    }

    /// Bottom-up propagation pass. For each node, `inherited` collects the
    /// exported set of every dependency; `exported` is the node's own public
    /// buckets plus the exported sets of its public dependencies.
    fn propagate(&mut self) {
        for ix in self.topo_order() {
            let deps = self.graph[ix].deps.clone();

            let mut exported = PropagatedSet::from_public(&self.graph[ix].instance.module);
            let mut inherited = PropagatedSet::default();

            for (dep, access) in deps {
                let dep_exported = self.graph[dep].exported.clone();
                inherited.merge(&dep_exported);
                if access == Access::Public {
                    exported.merge(&dep_exported);
                }
            }

            self.graph[ix].inherited = inherited;
            self.graph[ix].exported = exported;
        }
    }
}

struct GraphBuilder<'a> {
    instancer: &'a Instancer,
    graph: DiGraph<GraphNode, Access>,
    keys: HashMap<NodeKey, NodeIndex>,
    marks: HashMap<NodeIndex, Mark>,
    stack: Vec<NodeIndex>,
    cycles: Vec<String>,
}

impl GraphBuilder<'_> {
    fn visit(&mut self, reference: &ModuleReference, base_dir: &Path) -> Result<NodeIndex> {
        let instance = self.instancer.instantiate(reference, base_dir)?;
        let key = (
            instance.path.clone(),
            instance.module.name().to_string(),
            instance.variant_id.clone(),
        );

        if let Some(&ix) = self.keys.get(&key) {
            if self.marks.get(&ix) == Some(&Mark::Grey) {
                self.record_cycle(ix);
            }
            return Ok(ix);
        }

        let dir = instance.dir.clone();
        let public: Vec<ModuleReference> =
            instance.module.dependencies().public().to_vec();
        let private: Vec<ModuleReference> =
            instance.module.dependencies().private().to_vec();

        let ix = self.graph.add_node(GraphNode::new(instance));
        self.keys.insert(key, ix);
        self.marks.insert(ix, Mark::Grey);
        self.stack.push(ix);

        let edges = public
            .iter()
            .map(|r| (r, Access::Public))
            .chain(private.iter().map(|r| (r, Access::Private)));
        for (dep_ref, access) in edges {
            let child = self.visit(dep_ref, &dir)?;
            self.graph.add_edge(ix, child, access);
            self.graph[ix].deps.push((child, access));
        }

        self.stack.pop();
        self.marks.insert(ix, Mark::Black);
        Ok(ix)
    }

    fn record_cycle(&mut self, entry: NodeIndex) {
        let Some(pos) = self.stack.iter().position(|&ix| ix == entry) else {
            return;
        };

        let mut names: Vec<&str> = self.stack[pos..]
            .iter()
            .map(|&ix| self.graph[ix].instance.module.name())
            .collect();
        names.push(self.graph[entry].instance.module.name());
        let chain = names.join(" → ");

        if !self.cycles.contains(&chain) {
            self.cycles.push(chain);
        }
    }
}
