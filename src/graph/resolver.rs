use std::collections::{BTreeSet, HashMap};

use rayon::prelude::*;

use crate::index::{Symbol, SymbolKey, SymbolTable};

/// Fills `transitive_deps` for every record; returns the total number of indirect edges.
///
/// Closures are computed against an unchanged table and written back afterwards,
/// so the result does not depend on record order.
pub fn resolve_transitive(table: &mut SymbolTable, parallel: bool) -> usize {
    let closures: Vec<BTreeSet<String>> = if parallel {
        let view = &*table;
        view.symbols()
            .par_iter()
            .map(|symbol| transitive_closure(view, symbol))
            .collect()
    } else {
        table
            .symbols()
            .iter()
            .map(|symbol| transitive_closure(table, symbol))
            .collect()
    };

    let mut total = 0;
    for (symbol, closure) in table.iter_mut().zip(closures) {
        total += closure.len();
        symbol.transitive_deps = closure;
    }
    total
}

/// Names reachable from `symbol` that are not already direct dependencies.
///
/// Lookups stay within the symbol's own language. The result may contain the
/// symbol itself when it sits on a cycle.
pub fn transitive_closure(table: &SymbolTable, symbol: &Symbol) -> BTreeSet<String> {
    let mut worklist: Vec<&str> = symbol.type_deps.iter().map(String::as_str).collect();
    if symbol.kind.is_callable() {
        worklist.extend(symbol.call_deps.iter().map(String::as_str));
    }

    let mut seen: BTreeSet<String> = BTreeSet::new();
    while let Some(name) = worklist.pop() {
        if seen.contains(name) {
            continue;
        }
        seen.insert(name.to_string());

        if let Some(dep) = table.get(name, symbol.language) {
            worklist.extend(
                dep.type_deps
                    .iter()
                    .map(String::as_str)
                    .filter(|n| !seen.contains(*n)),
            );
        }
        if let Some(calls) = table.callees(name, symbol.language) {
            worklist.extend(calls.iter().map(String::as_str).filter(|n| !seen.contains(*n)));
        }
    }

    seen.retain(|name| !symbol.type_deps.contains(name) && !symbol.call_deps.contains(name));
    seen
}

/// Sets each record's `reference_count` to the number of distinct
/// same-language records that name it as a direct dependency.
pub fn count_references(table: &mut SymbolTable) {
    let mut counts: HashMap<SymbolKey, u32> = HashMap::new();
    for symbol in table.iter() {
        for dep in symbol.direct_dependencies() {
            if dep != symbol.name && table.contains(&dep, symbol.language) {
                *counts.entry(SymbolKey::new(dep, symbol.language)).or_default() += 1;
            }
        }
    }

    for symbol in table.iter_mut() {
        let key = SymbolKey::from(&*symbol);
        symbol.reference_count = counts.get(&key).copied().unwrap_or(0);
    }
}
