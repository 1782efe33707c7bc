use std::collections::{BTreeMap, BTreeSet};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::config::{ArtifactRoles, OrderingPolicy};
use crate::index::{Symbol, SymbolKey, SymbolKind, SymbolTable};

use super::cycles;

/// Whether a symbol takes part in the processing order.
pub fn is_orderable(symbol: &Symbol, policy: &OrderingPolicy, artifacts: &ArtifactRoles) -> bool {
    if symbol.language != policy.language || !policy.kinds.contains(&symbol.kind) {
        return false;
    }
    if symbol.is_static && !policy.include_static {
        return false;
    }
    if symbol.kind == SymbolKind::Function && policy.min_line_count > 0 {
        return symbol.is_declared_in(&artifacts.header_extensions)
            || symbol.line_count >= policy.min_line_count;
    }
    true
}

/// Adjacency over one language's ordering subset.
///
/// Edges run `dependency -> dependent` and only connect two members; self-edges
/// and edges to symbols outside the subset are dropped.
pub struct DependencyGraph {
    graph: DiGraph<SymbolKey, ()>,
    index: BTreeMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// The subset selected by `policy`.
    pub fn build(table: &SymbolTable, policy: &OrderingPolicy, artifacts: &ArtifactRoles) -> Self {
        let members = table
            .iter()
            .filter(|s| is_orderable(s, policy, artifacts))
            .map(SymbolKey::from);
        Self::from_keys(table, members)
    }

    /// An arbitrary subset of the table, e.g. one symbol's dependencies.
    ///
    /// Keys are expected to share a language; names are the node identity.
    pub fn from_keys(table: &SymbolTable, keys: impl IntoIterator<Item = SymbolKey>) -> Self {
        let members: BTreeMap<String, SymbolKey> = keys
            .into_iter()
            .filter(|k| table.contains(&k.name, k.language))
            .map(|k| (k.name.clone(), k))
            .collect();

        let mut graph = DiGraph::with_capacity(members.len(), 0);
        let mut index = BTreeMap::new();
        for (name, key) in &members {
            index.insert(name.clone(), graph.add_node(key.clone()));
        }

        for (name, key) in &members {
            let Some(symbol) = table.get(&key.name, key.language) else {
                continue;
            };
            let dependent = index[name];
            for dep in symbol.all_dependencies() {
                if dep == *name {
                    continue;
                }
                if let Some(&dependency) = index.get(&dep) {
                    graph.add_edge(dependency, dependent, ());
                }
            }
        }

        Self { graph, index }
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Direct dependencies of `name` inside the subset.
    pub fn dependencies_of(&self, name: &str) -> BTreeSet<&str> {
        self.index
            .get(name)
            .map(|&node| {
                self.graph
                    .neighbors_directed(node, Direction::Incoming)
                    .map(|n| self.name(n))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn graph(&self) -> &DiGraph<SymbolKey, ()> {
        &self.graph
    }

    pub(crate) fn name(&self, node: NodeIndex) -> &str {
        &self.graph[node].name
    }

    pub(crate) fn key(&self, node: NodeIndex) -> &SymbolKey {
        &self.graph[node]
    }

    /// Deterministic cycle-aware topological order with longest-path depth.
    pub fn order(&self) -> Vec<(SymbolKey, u32)> {
        let components = cycles::strongly_connected(self);
        self.order_with(&components)
    }

    /// Kahn's algorithm with a name-ordered ready set.
    ///
    /// When the ready set runs dry the remaining nodes sit in cycles. The unplaced
    /// component whose outside dependencies are all placed (smallest, then lowest
    /// name) is placed in name order and the sort resumes, so a cyclic block still
    /// precedes its own dependents.
    pub fn order_with(&self, components: &[Vec<NodeIndex>]) -> Vec<(SymbolKey, u32)> {
        let n = self.graph.node_count();
        let mut component_of = vec![0usize; n];
        for (ci, component) in components.iter().enumerate() {
            for node in component {
                component_of[node.index()] = ci;
            }
        }

        let mut in_degree: Vec<usize> = self
            .graph
            .node_indices()
            .map(|node| self.graph.neighbors_directed(node, Direction::Incoming).count())
            .collect();
        let mut depth = vec![0u32; n];
        let mut placed = vec![false; n];
        let mut result: Vec<(SymbolKey, u32)> = Vec::with_capacity(n);

        let mut ready: BTreeSet<&str> = self
            .graph
            .node_indices()
            .filter(|node| in_degree[node.index()] == 0)
            .map(|node| self.name(node))
            .collect();

        loop {
            while let Some(name) = ready.pop_first() {
                let node = self.index[name];
                placed[node.index()] = true;
                result.push((self.key(node).clone(), depth[node.index()]));

                for dependent in self.graph.neighbors_directed(node, Direction::Outgoing) {
                    let d = dependent.index();
                    depth[d] = depth[d].max(depth[node.index()] + 1);
                    in_degree[d] -= 1;
                    if in_degree[d] == 0 {
                        ready.insert(self.name(dependent));
                    }
                }
            }

            if result.len() == n {
                break;
            }

            let Some(ci) = self.next_component(components, &component_of, &placed) else {
                // unreachable for a consistent component list; keep the output total
                let mut rest: Vec<NodeIndex> = self
                    .graph
                    .node_indices()
                    .filter(|node| !placed[node.index()])
                    .collect();
                rest.sort_by(|a, b| self.name(*a).cmp(self.name(*b)));
                for node in rest {
                    result.push((self.key(node).clone(), depth[node.index()]));
                }
                break;
            };

            let mut members = components[ci].clone();
            members.sort_by(|a, b| self.name(*a).cmp(self.name(*b)));
            let block_depth = members.iter().map(|m| depth[m.index()]).max().unwrap_or(0);

            for &member in &members {
                placed[member.index()] = true;
                depth[member.index()] = block_depth;
                result.push((self.key(member).clone(), block_depth));
            }
            for &member in &members {
                for dependent in self.graph.neighbors_directed(member, Direction::Outgoing) {
                    let d = dependent.index();
                    if component_of[d] == ci {
                        continue;
                    }
                    depth[d] = depth[d].max(block_depth + 1);
                    in_degree[d] -= 1;
                    if in_degree[d] == 0 {
                        ready.insert(self.name(dependent));
                    }
                }
            }
        }

        result
    }

    fn next_component(
        &self,
        components: &[Vec<NodeIndex>],
        component_of: &[usize],
        placed: &[bool],
    ) -> Option<usize> {
        components
            .iter()
            .enumerate()
            .filter(|(_, c)| c.iter().any(|m| !placed[m.index()]))
            .filter(|(ci, c)| {
                c.iter().all(|&m| {
                    self.graph
                        .neighbors_directed(m, Direction::Incoming)
                        .all(|dep| component_of[dep.index()] == *ci || placed[dep.index()])
                })
            })
            .min_by(|(_, a), (_, b)| {
                a.len()
                    .cmp(&b.len())
                    .then_with(|| self.min_name(a).cmp(self.min_name(b)))
            })
            .map(|(ci, _)| ci)
    }

    fn min_name(&self, component: &[NodeIndex]) -> &str {
        component
            .iter()
            .map(|&node| self.name(node))
            .min()
            .unwrap_or_default()
    }
}
