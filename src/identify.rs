use std::collections::BTreeMap;

use crate::Dumpfile;
use crate::Strength;
use crate::StrengthFilter;

/// Sentinel root attached where the depth bound cut a branch short.
pub const EDEPTH: &str = "EDEPTH";

/// An inbound edge of a trace-graph node.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct TraceEdge {
    /// Address of the referring object.
    pub owner_at: u64,
    /// Role of the reference within the owner.
    pub name: String,
    /// Reference strength.
    pub strength: Strength,
    /// Whether the owner was already part of the graph; the edge closes a
    /// cycle and was not descended into.
    pub cycle: bool,
}

/// One node of a trace graph.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct TraceNode {
    /// Labels of the named roots, root-table inrefs and sentinels attached
    /// directly to this node.
    pub roots: Vec<String>,
    /// Inbound edges from other objects.
    pub edges: Vec<TraceEdge>,
}

/// A bounded reverse-reference graph from one object back towards the named
/// roots.
///
/// Built by [`Dumpfile::inref_graph`]; suitable for rendering as a tree.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct InrefGraph {
    /// Address of the traced object.
    pub start: u64,
    nodes: BTreeMap<u64, TraceNode>,
}

impl InrefGraph {
    /// The node for `addr`, when the trace reached it.
    pub fn node(&self, addr: u64) -> Option<&TraceNode> {
        self.nodes.get(&addr)
    }

    /// Iterate over all nodes in address order.
    pub fn nodes(&self) -> impl Iterator<Item = (u64, &TraceNode)> {
        self.nodes.iter().map(|(addr, node)| (*addr, node))
    }

    /// The number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Dumpfile {
    /// Trace the object at `addr` back towards the named roots.
    ///
    /// Walks inrefs depth-first, bounded by `depth` when given, keeping only
    /// edges whose strength belongs to `filter`. Cycles become back-edges;
    /// exhausting the depth bound attaches the [`EDEPTH`] sentinel root.
    pub fn inref_graph(
        &self,
        addr: u64,
        depth: Option<usize>,
        filter: StrengthFilter,
    ) -> InrefGraph {
        let mut graph = InrefGraph {
            start: addr,
            nodes: BTreeMap::new(),
        };
        self.trace_into(&mut graph, addr, depth, filter);
        graph
    }

    fn trace_into(
        &self,
        graph: &mut InrefGraph,
        addr: u64,
        depth: Option<usize>,
        filter: StrengthFilter,
    ) {
        if self.is_immortal_addr(addr) {
            graph
                .nodes
                .entry(addr)
                .or_default()
                .roots
                .push("an immortal value".to_string());
            return;
        }
        if let Some(root) = self.roots.iter().find(|r| r.addr == addr && r.addr != 0) {
            graph
                .nodes
                .entry(addr)
                .or_default()
                .roots
                .push(root.description().to_string());
            return;
        }
        graph.nodes.entry(addr).or_default();
        let mut depth_exhausted = false;
        for inref in self.inrefs_of(addr) {
            if !inref.strength.matches(filter) {
                continue;
            }
            let Some(owner_at) = inref.owner_at else {
                graph
                    .nodes
                    .entry(addr)
                    .or_default()
                    .roots
                    .push(inref.name.clone());
                continue;
            };
            if graph.nodes.contains_key(&owner_at) {
                graph.nodes.entry(addr).or_default().edges.push(TraceEdge {
                    owner_at,
                    name: inref.name.clone(),
                    strength: inref.strength,
                    cycle: true,
                });
                continue;
            }
            if depth == Some(0) {
                if !depth_exhausted {
                    depth_exhausted = true;
                    graph
                        .nodes
                        .entry(addr)
                        .or_default()
                        .roots
                        .push(EDEPTH.to_string());
                }
                continue;
            }
            self.trace_into(graph, owner_at, depth.map(|d| d - 1), filter);
            graph.nodes.entry(addr).or_default().edges.push(TraceEdge {
                owner_at,
                name: inref.name.clone(),
                strength: inref.strength,
                cycle: false,
            });
        }
    }
}
