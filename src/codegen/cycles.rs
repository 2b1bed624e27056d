//! Definition Cycle Analysis
//!
//! Computes strongly connected components (SCCs) over the direct references
//! between definitions. A field whose type lives in the same SCC as its owner
//! has to be boxed, otherwise the generated type has infinite size. References
//! under an array are not direct: `Vec` already provides the indirection.

use std::collections::HashMap;

use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::registry::ReferenceRegistry;
use crate::schema::{DefId, NodeKind, SchemaNode};

/// Cycle membership of every definition
#[derive(Debug, Clone, Default)]
pub struct CycleAnalysis {
    /// Definition -> SCC id, only for definitions that are part of a cycle
    scc_of: HashMap<DefId, usize>,
    group_count: usize,
}

impl CycleAnalysis {
    pub fn compute(registry: &ReferenceRegistry) -> Self {
        let mut graph: DiGraph<DefId, ()> = DiGraph::new();
        let mut index: HashMap<DefId, NodeIndex> = HashMap::new();

        for (id, _) in registry.definitions() {
            index.insert(id, graph.add_node(id));
        }

        for (id, def) in registry.definitions() {
            let mut targets = Vec::new();
            direct_refs(&def.node, &mut targets);
            for target in targets {
                if let (Some(from), Some(to)) = (index.get(&id), index.get(&target)) {
                    graph.add_edge(*from, *to, ());
                }
            }
        }

        let mut analysis = Self::default();
        for scc in kosaraju_scc(&graph) {
            let cyclic = match scc.as_slice() {
                [single] => graph
                    .edges_directed(*single, Direction::Outgoing)
                    .any(|e| e.target() == *single),
                _ => true,
            };
            if !cyclic {
                continue;
            }

            let scc_id = analysis.group_count;
            analysis.group_count += 1;
            for node in scc {
                if let Some(id) = graph.node_weight(node) {
                    analysis.scc_of.insert(*id, scc_id);
                }
            }
        }

        analysis
    }

    /// A direct field of `from` typed as `to` must be boxed
    pub fn needs_boxing(&self, from: DefId, to: DefId) -> bool {
        match (self.scc_of.get(&from), self.scc_of.get(&to)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    pub fn is_cyclic(&self, id: DefId) -> bool {
        self.scc_of.contains_key(&id)
    }

    /// Number of cyclic groups
    pub fn group_count(&self) -> usize {
        self.group_count
    }
}

/// References reachable from `node` without passing through an array
fn direct_refs(node: &SchemaNode, out: &mut Vec<DefId>) {
    match &node.kind {
        NodeKind::Reference(id) => out.push(*id),
        NodeKind::Object { properties } => {
            for property in properties {
                direct_refs(&property.node, out);
            }
        }
        NodeKind::Scalar { .. } | NodeKind::Enum(_) | NodeKind::Array { .. } => {}
    }
}
