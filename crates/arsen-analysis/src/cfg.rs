//! Per-function control flow graph using `petgraph`.
//!
//! Nodes are basic-block start addresses and edges follow the block
//! successor lists. Loops are found as back edges: an edge whose target
//! dominates its source.

use std::collections::{BTreeMap, HashSet};
use std::fmt::Write as _;

use arsen_common::disassembly::{BasicBlock, Function};
use arsen_common::types::Address;
use petgraph::Direction;
use petgraph::algo::dominators;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

/// Control flow graph of one function.
#[derive(Debug, Clone)]
pub struct ControlFlowGraph {
    graph: DiGraph<Address, ()>,
    nodes: BTreeMap<Address, NodeIndex>,
    blocks: BTreeMap<Address, BasicBlock>,
}

impl ControlFlowGraph {
    /// Builds the graph from `function`'s blocks. Successors that are not
    /// blocks of the function are dropped.
    #[must_use]
    pub fn build(function: &Function) -> Self {
        let mut graph = DiGraph::new();
        let mut nodes = BTreeMap::new();
        let mut blocks = BTreeMap::new();

        for block in &function.basic_blocks {
            let _ = nodes
                .entry(block.start)
                .or_insert_with(|| graph.add_node(block.start));
            let _ = blocks.insert(block.start, block.clone());
        }

        for block in &function.basic_blocks {
            let from = nodes[&block.start];
            let mut seen = HashSet::new();
            for succ in &block.successors {
                if let Some(&to) = nodes.get(succ) {
                    if seen.insert(to) {
                        let _ = graph.add_edge(from, to, ());
                    }
                }
            }
        }

        Self {
            graph,
            nodes,
            blocks,
        }
    }

    /// Start of the lowest-addressed block.
    #[must_use]
    pub fn entry(&self) -> Option<Address> {
        self.nodes.keys().next().copied()
    }

    /// The block starting at `address`.
    #[must_use]
    pub fn block(&self, address: Address) -> Option<&BasicBlock> {
        self.blocks.get(&address)
    }

    /// Every block, in address order.
    pub fn blocks(&self) -> impl Iterator<Item = &BasicBlock> {
        self.blocks.values()
    }

    fn neighbors(&self, address: Address, direction: Direction) -> Vec<Address> {
        let Some(&idx) = self.nodes.get(&address) else {
            return Vec::new();
        };
        let mut out: Vec<Address> = self
            .graph
            .neighbors_directed(idx, direction)
            .map(|n| self.graph[n])
            .collect();
        out.sort_unstable();
        out
    }

    /// Successor block starts, ascending.
    #[must_use]
    pub fn successors(&self, address: Address) -> Vec<Address> {
        self.neighbors(address, Direction::Outgoing)
    }

    /// Predecessor block starts, ascending.
    #[must_use]
    pub fn predecessors(&self, address: Address) -> Vec<Address> {
        self.neighbors(address, Direction::Incoming)
    }

    /// Number of blocks.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of distinct edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Whether the function has no blocks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Edges `(latch, header)` whose header dominates the latch, sorted.
    #[must_use]
    pub fn back_edges(&self) -> Vec<(Address, Address)> {
        let Some(entry) = self.entry() else {
            return Vec::new();
        };
        let doms = dominators::simple_fast(&self.graph, self.nodes[&entry]);
        let mut edges: Vec<(Address, Address)> = self
            .graph
            .edge_references()
            .filter(|e| {
                doms.dominators(e.source())
                    .is_some_and(|mut chain| chain.any(|d| d == e.target()))
            })
            .map(|e| (self.graph[e.source()], self.graph[e.target()]))
            .collect();
        edges.sort_unstable();
        edges
    }

    /// Highest-addressed block that jumps back to `header`.
    #[must_use]
    pub fn loop_latch(&self, header: Address) -> Option<Address> {
        self.back_edges()
            .into_iter()
            .filter(|&(_, h)| h == header)
            .map(|(latch, _)| latch)
            .max()
    }

    /// Layers blocks by their longest forward distance from a root, for
    /// drawing. Roots are the entry and any block with no forward
    /// predecessor, which places unreachable blocks on level 0.
    #[must_use]
    pub fn levels(&self) -> Vec<Vec<Address>> {
        let Some(entry) = self.entry() else {
            return Vec::new();
        };
        let retreating = self.retreating_edges(entry);
        let forward = |from: NodeIndex, to: NodeIndex| !retreating.contains(&(from, to));

        let mut indegree: BTreeMap<NodeIndex, usize> =
            self.nodes.values().map(|&n| (n, 0)).collect();
        for e in self.graph.edge_references() {
            if forward(e.source(), e.target()) {
                *indegree.entry(e.target()).or_default() += 1;
            }
        }

        let mut level: BTreeMap<NodeIndex, usize> = BTreeMap::new();
        let mut ready: Vec<NodeIndex> = indegree
            .iter()
            .filter(|&(_, &d)| d == 0)
            .map(|(&n, _)| n)
            .collect();
        for &n in &ready {
            let _ = level.insert(n, 0);
        }
        while let Some(n) = ready.pop() {
            let here = level.get(&n).copied().unwrap_or_default();
            for e in self.graph.edges(n) {
                if !forward(n, e.target()) {
                    continue;
                }
                let slot = level.entry(e.target()).or_default();
                *slot = (*slot).max(here + 1);
                if let Some(d) = indegree.get_mut(&e.target()) {
                    *d -= 1;
                    if *d == 0 {
                        ready.push(e.target());
                    }
                }
            }
        }

        let depth = level.values().copied().max().map_or(0, |m| m + 1);
        let mut layers = vec![Vec::new(); depth];
        for (n, l) in level {
            layers[l].push(self.graph[n]);
        }
        for layer in &mut layers {
            layer.sort_unstable();
        }
        layers
    }

    /// Edges closing a cycle in a depth-first walk that starts at the entry
    /// and then at each unvisited block in address order.
    fn retreating_edges(&self, entry: Address) -> HashSet<(NodeIndex, NodeIndex)> {
        let mut retreating = HashSet::new();
        let mut on_stack = HashSet::new();
        let mut visited = HashSet::new();
        let roots = std::iter::once(entry).chain(self.nodes.keys().copied());

        for root in roots {
            let root = self.nodes[&root];
            if !visited.insert(root) {
                continue;
            }
            let _ = on_stack.insert(root);
            let mut stack = vec![(root, self.sorted_targets(root), 0_usize)];
            while let Some((node, targets, next)) = stack.last_mut() {
                let node = *node;
                if let Some(&succ) = targets.get(*next) {
                    *next += 1;
                    if on_stack.contains(&succ) {
                        let _ = retreating.insert((node, succ));
                    } else if visited.insert(succ) {
                        let _ = on_stack.insert(succ);
                        stack.push((succ, self.sorted_targets(succ), 0));
                    }
                } else {
                    let _ = on_stack.remove(&node);
                    let _ = stack.pop();
                }
            }
        }
        retreating
    }

    fn sorted_targets(&self, node: NodeIndex) -> Vec<NodeIndex> {
        let mut targets: Vec<NodeIndex> = self.graph.neighbors(node).collect();
        targets.sort_unstable_by_key(|&n| self.graph[n]);
        targets
    }

    /// Graphviz rendering with one box per block listing its instructions.
    #[must_use]
    pub fn to_dot(&self, function: &Function) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "digraph \"{}\" {{", function.name);
        let _ = writeln!(out, "    node [shape=box, fontname=\"monospace\"];");
        for block in self.blocks.values() {
            let mut label = format!("{}:\\l", block.start);
            for insn in &block.instructions {
                let text = insn.full_text().replace('"', "\\\"");
                let _ = write!(label, "{:X}  {text}\\l", insn.address.value());
            }
            let _ = writeln!(out, "    \"{}\" [label=\"{label}\"];", block.start);
        }
        for e in self.graph.edge_references() {
            let _ = writeln!(
                out,
                "    \"{}\" -> \"{}\";",
                self.graph[e.source()],
                self.graph[e.target()]
            );
        }
        out.push('}');
        out.push('\n');
        out
    }
}
