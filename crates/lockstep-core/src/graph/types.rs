//! Environment reference graph.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, VecDeque};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, Reversed};
use rustc_hash::{FxHashMap, FxHashSet};

use super::parser::{self, EnvironmentSpec};
use crate::error::{Error, Result};
use crate::options::Options;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// The environment dependency graph.
///
/// Edges go from a referenced environment to the environment that references
/// it, so the edge direction is also the compilation direction. Nodes are
/// added in declaration order, which makes a node's index its declaration
/// position.
#[derive(Debug)]
pub struct EnvironmentGraph {
    /// The directed graph: edges go from upstream to downstream
    graph: DiGraph<String, ()>,
    /// Environment name to node index mapping
    node_indices: FxHashMap<String, NodeIndex>,
    /// Specifications in declaration order
    specs: Vec<EnvironmentSpec>,
}

impl EnvironmentGraph {
    /// Discover specifications under the configured directory and build the graph.
    pub fn discover(options: &Options) -> Result<Self> {
        Self::build(parser::discover(options)?)
    }

    /// Build the graph from specifications in declaration order.
    ///
    /// Fails on duplicate names, references to unknown environments and
    /// cycles. A graph that builds successfully is always acyclic.
    pub fn build(specs: Vec<EnvironmentSpec>) -> Result<Self> {
        let mut graph = DiGraph::new();
        let mut node_indices = FxHashMap::default();

        for spec in &specs {
            let idx = graph.add_node(spec.name.clone());
            if node_indices.insert(spec.name.clone(), idx).is_some() {
                return Err(Error::Configuration(format!(
                    "environment '{}' is declared more than once",
                    spec.name
                )));
            }
        }

        for spec in &specs {
            let consumer = node_indices[&spec.name];
            for reference in &spec.references {
                let Some(&producer) = node_indices.get(reference) else {
                    return Err(Error::Configuration(format!(
                        "environment '{}' references unknown environment '{}'",
                        spec.name, reference
                    )));
                };
                graph.add_edge(producer, consumer, ());
            }
        }

        let engine = Self {
            graph,
            node_indices,
            specs,
        };
        engine.detect_cycles()?;
        Ok(engine)
    }

    fn reference_indices(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        self.specs[idx]
            .references
            .iter()
            .map(|name| self.node_indices[name].index())
    }

    /// Depth-first search over references with explicit in-progress marking.
    fn detect_cycles(&self) -> Result<()> {
        let mut marks = vec![Mark::Unvisited; self.specs.len()];

        for start in 0..self.specs.len() {
            if marks[start] != Mark::Unvisited {
                continue;
            }
            marks[start] = Mark::InProgress;
            let mut stack: Vec<(usize, usize)> = vec![(start, 0)];

            while let Some(frame) = stack.last_mut() {
                let (node, next) = *frame;
                let Some(child) = self.reference_indices(node).nth(next) else {
                    marks[node] = Mark::Done;
                    stack.pop();
                    continue;
                };
                frame.1 += 1;

                match marks[child] {
                    Mark::InProgress => {
                        let pos = stack.iter().position(|&(n, _)| n == child).unwrap_or(0);
                        let mut cycle: Vec<&str> = stack[pos..]
                            .iter()
                            .map(|&(n, _)| self.specs[n].name.as_str())
                            .collect();
                        cycle.push(self.specs[child].name.as_str());
                        return Err(Error::CyclicReference(cycle.join(" -> ")));
                    }
                    Mark::Unvisited => {
                        marks[child] = Mark::InProgress;
                        stack.push((child, 0));
                    }
                    Mark::Done => {}
                }
            }
        }

        Ok(())
    }

    /// Stable topological order of a node subset.
    ///
    /// Kahn's algorithm with a min-heap on declaration position, so ties are
    /// always broken by declaration order.
    fn order_of(&self, include: &FxHashSet<usize>) -> Vec<usize> {
        let mut pending: FxHashMap<usize, usize> = include
            .iter()
            .map(|&idx| {
                let count = self
                    .reference_indices(idx)
                    .filter(|r| include.contains(r))
                    .count();
                (idx, count)
            })
            .collect();

        let mut ready: BinaryHeap<Reverse<usize>> = pending
            .iter()
            .filter(|&(_, &count)| count == 0)
            .map(|(&idx, _)| Reverse(idx))
            .collect();

        let mut order = Vec::with_capacity(include.len());
        while let Some(Reverse(idx)) = ready.pop() {
            order.push(idx);
            for dependent in self
                .graph
                .neighbors_directed(NodeIndex::new(idx), Direction::Outgoing)
            {
                if let Some(count) = pending.get_mut(&dependent.index()) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push(Reverse(dependent.index()));
                    }
                }
            }
        }

        order
    }

    fn names(&self, indices: impl IntoIterator<Item = usize>) -> Vec<&str> {
        indices
            .into_iter()
            .map(|idx| self.specs[idx].name.as_str())
            .collect()
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        self.node_indices
            .get(name)
            .map(|idx| idx.index())
            .ok_or_else(|| Error::Configuration(format!("unknown environment '{name}'")))
    }

    /// Indices of every transitive reference of `idx`, excluding `idx` itself.
    fn ancestors(&self, idx: usize) -> FxHashSet<usize> {
        let reversed = Reversed(&self.graph);
        let mut dfs = Dfs::new(reversed, NodeIndex::new(idx));
        let mut found = FxHashSet::default();
        while let Some(node) = dfs.next(reversed) {
            if node.index() != idx {
                found.insert(node.index());
            }
        }
        found
    }

    /// Every environment in topological order.
    pub fn topological_order(&self) -> Vec<&str> {
        let all: FxHashSet<usize> = (0..self.specs.len()).collect();
        self.names(self.order_of(&all))
    }

    /// Transitive references of an environment in topological order.
    pub fn transitive_references(&self, name: &str) -> Result<Vec<&str>> {
        let idx = self.index_of(name)?;
        Ok(self.names(self.order_of(&self.ancestors(idx))))
    }

    /// Restrict the graph to `names` plus everything they transitively
    /// reference, in topological order. An empty filter selects everything.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<&str>> {
        if names.is_empty() {
            return Ok(self.topological_order());
        }

        let mut include = FxHashSet::default();
        for name in names {
            let idx = self.index_of(name.as_ref())?;
            include.insert(idx);
            include.extend(self.ancestors(idx));
        }
        Ok(self.names(self.order_of(&include)))
    }

    /// Group environments into levels: every environment's references lie in
    /// earlier levels, so environments within a level are independent.
    pub fn topological_levels<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<Vec<&str>>> {
        let mut include = FxHashSet::default();
        for name in names {
            include.insert(self.index_of(name.as_ref())?);
        }

        let mut level_of: FxHashMap<usize, usize> = FxHashMap::default();
        let mut levels: Vec<Vec<usize>> = Vec::new();
        for idx in self.order_of(&include) {
            let level = self
                .reference_indices(idx)
                .filter_map(|r| level_of.get(&r))
                .map(|l| l + 1)
                .max()
                .unwrap_or(0);
            level_of.insert(idx, level);
            if levels.len() <= level {
                levels.resize_with(level + 1, Vec::new);
            }
            levels[level].push(idx);
        }

        Ok(levels
            .into_iter()
            .map(|mut level| {
                level.sort_unstable();
                self.names(level)
            })
            .collect())
    }

    /// Every environment connected to `name` through references in either
    /// direction, including `name` itself.
    pub fn reference_cluster(&self, name: &str) -> Result<BTreeSet<String>> {
        let start = NodeIndex::new(self.index_of(name)?);
        let mut seen = FxHashSet::default();
        let mut queue = VecDeque::from([start]);
        seen.insert(start);

        while let Some(node) = queue.pop_front() {
            for neighbor in self.graph.neighbors_undirected(node) {
                if seen.insert(neighbor) {
                    queue.push_back(neighbor);
                }
            }
        }

        Ok(seen
            .into_iter()
            .map(|idx| self.graph[idx].clone())
            .collect())
    }

    /// Direct dependents of an environment (environments referencing it).
    pub fn dependents(&self, name: &str) -> Vec<&str> {
        let Some(&idx) = self.node_indices.get(name) else {
            return Vec::new();
        };
        let mut found: Vec<usize> = self
            .graph
            .neighbors_directed(idx, Direction::Outgoing)
            .map(|n| n.index())
            .collect();
        found.sort_unstable();
        found.dedup();
        self.names(found)
    }

    /// Get a specification by name.
    pub fn get(&self, name: &str) -> Option<&EnvironmentSpec> {
        self.node_indices
            .get(name)
            .map(|idx| &self.specs[idx.index()])
    }

    /// All specifications in declaration order.
    pub fn specs(&self) -> &[EnvironmentSpec] {
        &self.specs
    }

    /// Get the number of environments.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Check if the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}
