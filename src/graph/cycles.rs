use petgraph::graph::NodeIndex;

use super::order::DependencyGraph;
use crate::index::{SymbolKey, SymbolTable};

/// Removes each symbol's edge to itself and flags it as cyclic.
///
/// Runs after the transitive closure, so a symbol that only reaches itself
/// through other symbols is flagged here as well. Returns how many were flagged.
pub fn break_self_cycles(table: &mut SymbolTable) -> usize {
    let mut count = 0;
    for symbol in table.iter_mut() {
        let name = symbol.name.clone();
        if symbol.remove_dependency(&name) {
            symbol.is_cycle = true;
            count += 1;
        }
    }
    count
}

/// Tarjan SCCs of the ordering graph (petgraph's implementation is iterative).
pub fn strongly_connected(graph: &DependencyGraph) -> Vec<Vec<NodeIndex>> {
    petgraph::algo::tarjan_scc(graph.graph())
}

/// Components with more than one member, members and components sorted by name.
pub fn cyclic_components(graph: &DependencyGraph, components: &[Vec<NodeIndex>]) -> Vec<Vec<SymbolKey>> {
    let mut result: Vec<Vec<SymbolKey>> = components
        .iter()
        .filter(|c| c.len() > 1)
        .map(|component| {
            let mut keys: Vec<SymbolKey> = component.iter().map(|&n| graph.key(n).clone()).collect();
            keys.sort();
            keys
        })
        .collect();
    result.sort();
    result
}

/// Sets `is_cycle` on every member of every component; never clears it.
pub fn mark_cycles(table: &mut SymbolTable, components: &[Vec<SymbolKey>]) {
    for key in components.iter().flatten() {
        if let Some(symbol) = table.get_mut(&key.name, key.language) {
            symbol.is_cycle = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ArtifactRoles, OrderingPolicy};
    use crate::graph::resolver::resolve_transitive;
    use crate::index::{SourceLanguage, Symbol, SymbolKind};

    fn add(table: &mut SymbolTable, name: &str, deps: &[&str]) {
        let mut s = Symbol::new(name, SymbolKind::Struct, SourceLanguage::C, "");
        s.type_deps = deps.iter().map(|d| d.to_string()).collect();
        table.add_or_merge(s);
    }

    fn graph_of(table: &SymbolTable) -> DependencyGraph {
        DependencyGraph::build(table, &OrderingPolicy::default(), &ArtifactRoles::default())
    }

    #[test]
    fn test_self_reference_flagged_and_removed() {
        let mut table = SymbolTable::new();
        add(&mut table, "Node", &["Node", "Value"]);
        add(&mut table, "Value", &[]);

        assert_eq!(break_self_cycles(&mut table), 1);
        let node = table.get("Node", SourceLanguage::C).unwrap();
        assert!(node.is_cycle);
        assert_eq!(node.type_deps.iter().collect::<Vec<_>>(), vec!["Value"]);
        assert!(!table.get("Value", SourceLanguage::C).unwrap().is_cycle);
    }

    #[test]
    fn test_three_way_cycle_marked() {
        let mut table = SymbolTable::new();
        add(&mut table, "Ab", &["Bc"]);
        add(&mut table, "Bc", &["Ca"]);
        add(&mut table, "Ca", &["Ab"]);
        add(&mut table, "Free", &["Ab"]);

        let graph = graph_of(&table);
        let components = strongly_connected(&graph);
        let cyclic = cyclic_components(&graph, &components);
        assert_eq!(cyclic.len(), 1);
        let names: Vec<&str> = cyclic[0].iter().map(|k| k.name.as_str()).collect();
        assert_eq!(names, vec!["Ab", "Bc", "Ca"]);

        mark_cycles(&mut table, &cyclic);
        assert!(table.get("Bc", SourceLanguage::C).unwrap().is_cycle);
        assert!(!table.get("Free", SourceLanguage::C).unwrap().is_cycle);
    }

    #[test]
    fn test_closure_then_self_pass_flags_cycle_members() {
        let mut table = SymbolTable::new();
        add(&mut table, "Ab", &["Bc"]);
        add(&mut table, "Bc", &["Ab"]);
        resolve_transitive(&mut table, false);
        assert_eq!(break_self_cycles(&mut table), 2);
        for symbol in table.iter() {
            assert!(symbol.is_cycle);
            assert!(!symbol.depends_on(&symbol.name));
        }
    }

    #[test]
    fn test_marking_is_monotonic() {
        let mut table = SymbolTable::new();
        add(&mut table, "Node", &["Node"]);
        break_self_cycles(&mut table);
        mark_cycles(&mut table, &[]);
        assert!(table.get("Node", SourceLanguage::C).unwrap().is_cycle);
    }
}
