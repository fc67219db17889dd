use petgraph::algo;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;
use strobe_ir as ir;
use strobe_utils::{Error, StrobeResult};

/// The order in which the modules are traversed.
#[derive(Default, PartialEq, Eq)]
pub enum Order {
    /// Use the order of the context.
    #[default]
    No,
    /// Derived classes before their bases.
    Pre,
    /// Base classes before the classes derived from them.
    Post,
}

/// Define traversal order of modules: pre-order, post-order, or none.
///
/// ## Post-order
/// If class `B` extends class `A` then `A` is guaranteed to be visited before
/// `B`. This is done by finding a topological order over a graph where `A`
/// has a directed edge to `B`.
///
/// Instead of constructing a new vector of modules in a topological order,
/// the implementation builds an `order` vector which contains indices into the
/// original module vector, so the modules can be handed back in their input
/// order.
///
/// ## Pre-order
/// Reverse of post-order
pub struct CompTraversal {
    /// A topological ordering of the modules.
    order: Vec<NodeIndex>,
    /// Vector of modules in the original ordering.
    modules: Vec<ir::Module>,
}

impl CompTraversal {
    /// Returns a new traversal over `modules`. Fails if the inheritance graph
    /// has a cycle.
    pub fn new(modules: Vec<ir::Module>, order: Order) -> StrobeResult<Self> {
        // If the order is not specified, return the modules in the original order.
        if order == Order::No {
            return Ok(Self {
                order: (0..modules.len()).map(NodeIndex::new).collect(),
                modules,
            });
        }
        let mut graph: DiGraph<usize, ()> = DiGraph::new();
        // Reverse mapping from index to modules.
        let rev_map: HashMap<ir::Id, NodeIndex> = modules
            .iter()
            .enumerate()
            .map(|(idx, m)| (m.name, graph.add_node(idx)))
            .collect();

        for m in &modules {
            if let Some(base) = m.extends() {
                if let Some(b) = rev_map.get(&base) {
                    graph.add_edge(*b, rev_map[&m.name], ());
                }
            }
        }

        let mut topo = algo::toposort(&graph, None).map_err(|cycle| {
            let name = modules[graph[cycle.node_id()]].name;
            Error::malformed_structure(format!(
                "Class `{name}` is part of an inheritance cycle"
            ))
        })?;

        if order == Order::Pre {
            topo.reverse();
        }
        Ok(Self {
            order: topo,
            modules,
        })
    }

    /// Traverses modules in the chosen order and applies `upd`.
    pub fn apply_update<F>(&mut self, mut upd: F) -> StrobeResult<()>
    where
        F: FnMut(&mut ir::Module, &[ir::Module]) -> StrobeResult<()>,
    {
        for idx in self.order.iter() {
            let mut module = self.modules.remove(idx.index());
            let res = upd(&mut module, &self.modules);
            self.modules.insert(idx.index(), module);
            res?;
        }

        Ok(())
    }

    /// Returns the underlying module vector in original order.
    pub fn take(self) -> Vec<ir::Module> {
        self.modules
    }
}
