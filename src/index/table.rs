use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use super::models::{MergeConflict, SourceLanguage, Symbol, SymbolKey};

/// What `add_or_merge` did with an incoming record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted,
    Merged,
    /// Kind-incompatible duplicate; the incoming record was ignored.
    Conflict(MergeConflict),
}

/// One record per `(name, language)`, in insertion order.
///
/// Append/merge-only: records are never removed within a build.
#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    records: Vec<Symbol>,
    by_key: HashMap<SymbolKey, usize>,
    by_name: HashMap<String, Vec<usize>>,
    call_graph: BTreeMap<SymbolKey, BTreeSet<String>>,
    aliases: HashMap<SymbolKey, String>,
    conflicts: Vec<MergeConflict>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_or_merge(&mut self, symbol: Symbol) -> MergeOutcome {
        let key = SymbolKey::from(&symbol);

        let Some(&idx) = self.by_key.get(&key) else {
            self.record_calls(&key, &symbol);
            let idx = self.records.len();
            self.by_name.entry(symbol.name.clone()).or_default().push(idx);
            self.by_key.insert(key, idx);
            self.records.push(symbol);
            return MergeOutcome::Inserted;
        };

        let existing_kind = self.records[idx].kind;
        if !existing_kind.is_compatible(symbol.kind) {
            let conflict = MergeConflict {
                name: symbol.name.clone(),
                language: symbol.language,
                existing_kind,
                ignored_kind: symbol.kind,
                file: symbol.file_path().map(|p| p.to_path_buf()),
            };
            tracing::debug!(
                "Ignoring {} {} ({}): already recorded as {}",
                conflict.ignored_kind,
                conflict.name,
                conflict.language,
                conflict.existing_kind
            );
            self.conflicts.push(conflict.clone());
            return MergeOutcome::Conflict(conflict);
        }

        self.record_calls(&key, &symbol);
        self.records[idx].merge_from(symbol);
        MergeOutcome::Merged
    }

    fn record_calls(&mut self, key: &SymbolKey, symbol: &Symbol) {
        if symbol.kind.is_callable() && !symbol.call_deps.is_empty() {
            self.call_graph
                .entry(key.clone())
                .or_default()
                .extend(symbol.call_deps.iter().cloned());
        }
    }

    /// Registers `alias` as another spelling of `canonical` (typedef names, pointer typedefs).
    pub fn add_alias(&mut self, alias: &str, canonical: &str, language: SourceLanguage) {
        if alias != canonical {
            self.aliases
                .insert(SymbolKey::new(alias, language), canonical.to_string());
        }
    }

    /// The name `name` stands for after following alias chains.
    ///
    /// A name that is itself a record is never rewritten.
    pub fn canonical_name(&self, name: &str, language: SourceLanguage) -> String {
        let mut current = name.to_string();
        let mut visited = HashSet::new();
        loop {
            let key = SymbolKey::new(current.as_str(), language);
            if self.by_key.contains_key(&key) || !visited.insert(current.clone()) {
                return current;
            }
            match self.aliases.get(&key) {
                Some(next) => current = next.clone(),
                None => return current,
            }
        }
    }

    /// Rewrites aliased names in every dependency set; returns how many were rewritten.
    ///
    /// A rewrite that lands on a name `skip` rejects removes the dependency instead.
    pub fn resolve_aliases(&mut self, skip: impl Fn(&str, SourceLanguage) -> bool) -> usize {
        if self.aliases.is_empty() {
            return 0;
        }

        let mut rewritten = 0;
        for idx in 0..self.records.len() {
            let language = self.records[idx].language;
            let type_deps = std::mem::take(&mut self.records[idx].type_deps);
            let call_deps = std::mem::take(&mut self.records[idx].call_deps);
            let (type_deps, a) = self.canonicalize(type_deps, language, &skip);
            let (call_deps, b) = self.canonicalize(call_deps, language, &skip);
            self.records[idx].type_deps = type_deps;
            self.records[idx].call_deps = call_deps;
            rewritten += a + b;
        }

        let call_graph = std::mem::take(&mut self.call_graph);
        for (key, calls) in call_graph {
            let (calls, _) = self.canonicalize(calls, key.language, &skip);
            self.call_graph.insert(key, calls);
        }

        rewritten
    }

    fn canonicalize(
        &self,
        names: BTreeSet<String>,
        language: SourceLanguage,
        skip: &impl Fn(&str, SourceLanguage) -> bool,
    ) -> (BTreeSet<String>, usize) {
        let mut rewritten = 0;
        let resolved = names
            .into_iter()
            .filter_map(|name| {
                let canonical = self.canonical_name(&name, language);
                if canonical == name {
                    return Some(name);
                }
                if skip(&canonical, language) {
                    tracing::debug!("Dropping {} ({}): alias of skipped {}", name, language, canonical);
                    return None;
                }
                rewritten += 1;
                Some(canonical)
            })
            .collect();
        (resolved, rewritten)
    }

    pub fn get(&self, name: &str, language: SourceLanguage) -> Option<&Symbol> {
        self.by_key
            .get(&SymbolKey::new(name, language))
            .map(|&idx| &self.records[idx])
    }

    pub fn get_mut(&mut self, name: &str, language: SourceLanguage) -> Option<&mut Symbol> {
        match self.by_key.get(&SymbolKey::new(name, language)) {
            Some(&idx) => self.records.get_mut(idx),
            None => None,
        }
    }

    pub fn contains(&self, name: &str, language: SourceLanguage) -> bool {
        self.by_key.contains_key(&SymbolKey::new(name, language))
    }

    /// Every record with this name, across languages.
    pub fn named(&self, name: &str) -> Vec<&Symbol> {
        self.by_name
            .get(name)
            .map(|ids| ids.iter().map(|&idx| &self.records[idx]).collect())
            .unwrap_or_default()
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.records.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Symbol> {
        self.records.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn callees(&self, name: &str, language: SourceLanguage) -> Option<&BTreeSet<String>> {
        self.call_graph.get(&SymbolKey::new(name, language))
    }

    pub fn call_graph(&self) -> &BTreeMap<SymbolKey, BTreeSet<String>> {
        &self.call_graph
    }

    pub fn conflicts(&self) -> &[MergeConflict] {
        &self.conflicts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::models::{SourceLocation, SourceSpan, SymbolKind};

    fn span(file: &str, line: u32) -> SourceSpan {
        SourceSpan {
            file: file.into(),
            start_byte: 0,
            end_byte: 1,
            start_line: line,
            end_line: line,
        }
    }

    fn c_symbol(name: &str, kind: SymbolKind) -> Symbol {
        Symbol::new(name, kind, SourceLanguage::C, "")
    }

    #[test]
    fn test_declaration_and_definition_merge() {
        let mut table = SymbolTable::new();

        let mut decl = c_symbol("visit", SymbolKind::Function)
            .with_declaration(SourceLocation::new("tree.h", 2), span("tree.h", 2));
        decl.type_deps.insert("Node".into());
        let mut def = c_symbol("visit", SymbolKind::Function)
            .with_definition(SourceLocation::new("tree.c", 10), span("tree.c", 10));
        def.call_deps.insert("helper".into());

        assert_eq!(table.add_or_merge(decl), MergeOutcome::Inserted);
        assert_eq!(table.add_or_merge(def), MergeOutcome::Merged);
        assert_eq!(table.len(), 1);

        let visit = table.get("visit", SourceLanguage::C).unwrap();
        assert!(visit.declaration.is_some());
        assert!(visit.definition.is_some());
        assert!(visit.type_deps.contains("Node"));
        assert!(visit.call_deps.contains("helper"));
        assert!(table.callees("visit", SourceLanguage::C).unwrap().contains("helper"));
    }

    #[test]
    fn test_incompatible_kind_is_reported_and_ignored() {
        let mut table = SymbolTable::new();
        table.add_or_merge(c_symbol("Color", SymbolKind::Enum));
        let outcome = table.add_or_merge(
            c_symbol("Color", SymbolKind::Typedef)
                .with_declaration(SourceLocation::new("color.h", 1), span("color.h", 1)),
        );

        match outcome {
            MergeOutcome::Conflict(conflict) => {
                assert_eq!(conflict.existing_kind, SymbolKind::Enum);
                assert_eq!(conflict.ignored_kind, SymbolKind::Typedef);
                assert_eq!(conflict.file.unwrap().to_str(), Some("color.h"));
            }
            other => panic!("expected conflict, got {:?}", other),
        }
        assert_eq!(table.get("Color", SourceLanguage::C).unwrap().kind, SymbolKind::Enum);
        assert_eq!(table.conflicts().len(), 1);
    }

    #[test]
    fn test_binding_and_function_collapse() {
        let mut table = SymbolTable::new();
        table.add_or_merge(Symbol::new("deflate", SymbolKind::ForeignFunction, SourceLanguage::Rust, ""));
        let outcome =
            table.add_or_merge(Symbol::new("deflate", SymbolKind::Function, SourceLanguage::Rust, ""));
        assert_eq!(outcome, MergeOutcome::Merged);
        assert_eq!(
            table.get("deflate", SourceLanguage::Rust).unwrap().kind,
            SymbolKind::Function
        );
    }

    #[test]
    fn test_same_name_across_languages_coexists() {
        let mut table = SymbolTable::new();
        table.add_or_merge(c_symbol("deflate", SymbolKind::Function));
        table.add_or_merge(Symbol::new("deflate", SymbolKind::Function, SourceLanguage::Rust, ""));

        assert_eq!(table.len(), 2);
        let named = table.named("deflate");
        assert_eq!(named.len(), 2);
        assert_eq!(named[0].language, SourceLanguage::C);
        assert!(table.named("missing").is_empty());
    }

    #[test]
    fn test_alias_resolution() {
        let mut table = SymbolTable::new();
        let mut tree = c_symbol("Tree", SymbolKind::Struct);
        tree.type_deps.insert("_Tree".into());
        let mut walk = c_symbol("walk", SymbolKind::Function);
        walk.type_deps.insert("TreePtr".into());
        walk.call_deps.insert("visit".into());
        table.add_or_merge(tree);
        table.add_or_merge(walk);

        table.add_alias("_Tree", "Tree", SourceLanguage::C);
        table.add_alias("TreePtr", "_Tree", SourceLanguage::C);
        // aliases never shadow real records
        table.add_alias("walk", "Tree", SourceLanguage::C);

        assert_eq!(table.resolve_aliases(|_, _| false), 2);
        let tree = table.get("Tree", SourceLanguage::C).unwrap();
        assert!(tree.type_deps.contains("Tree"));
        let walk = table.get("walk", SourceLanguage::C).unwrap();
        assert_eq!(walk.type_deps.iter().collect::<Vec<_>>(), vec!["Tree"]);
        assert_eq!(table.canonical_name("walk", SourceLanguage::C), "walk");
        // aliases are per language
        assert_eq!(table.canonical_name("_Tree", SourceLanguage::Rust), "_Tree");
    }

    #[test]
    fn test_alias_to_skipped_name_drops_dependency() {
        let mut table = SymbolTable::new();
        let mut open = c_symbol("open_stream", SymbolKind::Function);
        open.type_deps.insert("StreamPtr".into());
        open.type_deps.insert("Buffer".into());
        table.add_or_merge(open);
        table.add_or_merge(c_symbol("Buffer", SymbolKind::Struct));
        table.add_alias("StreamPtr", "FILE", SourceLanguage::C);

        let rewritten = table.resolve_aliases(|name, _| name == "FILE");
        assert_eq!(rewritten, 0);
        let open = table.get("open_stream", SourceLanguage::C).unwrap();
        assert_eq!(open.type_deps.iter().collect::<Vec<_>>(), vec!["Buffer"]);
    }

    #[test]
    fn test_alias_loop_terminates() {
        let mut table = SymbolTable::new();
        table.add_alias("A_t", "B_t", SourceLanguage::C);
        table.add_alias("B_t", "A_t", SourceLanguage::C);
        let resolved = table.canonical_name("A_t", SourceLanguage::C);
        assert!(resolved == "A_t" || resolved == "B_t");
    }
}
