use tree_sitter::Node;

use super::LanguageGrammar;
use crate::index::{SourceLanguage, Symbol, SymbolKind};
use crate::indexer::extractor::{
    line_count, node_text, signature, DependencyCollector, ExtractionContext, FileExtraction,
};
use crate::indexer::parser::ParsedFile;

pub struct CGrammar;

impl LanguageGrammar for CGrammar {
    fn language(&self) -> SourceLanguage {
        SourceLanguage::C
    }

    fn ts_language(&self) -> tree_sitter::Language {
        tree_sitter_c::LANGUAGE.into()
    }

    fn extract(&self, parsed: &ParsedFile, ctx: &ExtractionContext<'_>) -> FileExtraction {
        let mut visitor = CVisitor {
            source: parsed.source_bytes(),
            ctx,
            out: FileExtraction::default(),
        };
        visitor.visit_items(parsed.root_node());
        visitor.out
    }
}

/// Where a symbol occurrence gets recorded.
#[derive(Clone, Copy)]
enum Occurrence {
    Declaration,
    Definition,
}

struct CVisitor<'a, 'c> {
    source: &'a [u8],
    ctx: &'a ExtractionContext<'c>,
    out: FileExtraction,
}

impl<'a, 'c> CVisitor<'a, 'c> {
    /// Top-level items, looking through preprocessor conditionals.
    fn visit_items(&mut self, container: Node) {
        let mut cursor = container.walk();
        for child in container.named_children(&mut cursor) {
            match child.kind() {
                "function_definition" => self.function_definition(child),
                "declaration" => self.declaration(child),
                "struct_specifier" | "union_specifier" | "enum_specifier" => self.tagged_type(child),
                "type_definition" => self.type_definition(child),
                "preproc_def" => self.object_macro(child),
                "preproc_function_def" => self.function_macro(child),
                "preproc_ifdef" | "preproc_if" | "preproc_else" | "preproc_elif"
                | "preproc_elifdef" | "linkage_specification" | "declaration_list" | "ERROR" => {
                    self.visit_items(child)
                }
                _ => {}
            }
        }
    }

    fn text(&self, node: &Node) -> &'a str {
        node_text(node, self.source)
    }

    fn collector(&self) -> DependencyCollector<'a> {
        DependencyCollector::new(self.source, self.ctx.config, SourceLanguage::C)
    }

    fn type_occurrence(&self) -> Occurrence {
        if self.ctx.is_header {
            Occurrence::Declaration
        } else {
            Occurrence::Definition
        }
    }

    fn place(&self, symbol: Symbol, occurrence: Occurrence, name_node: &Node, span_node: &Node) -> Symbol {
        let location = self.ctx.location(name_node);
        let span = self.ctx.span(span_node);
        match occurrence {
            Occurrence::Declaration => symbol.with_declaration(location, span),
            Occurrence::Definition => symbol
                .with_definition(location, span)
                .with_line_count(line_count(span_node)),
        }
    }

    // =====================================================
    // Functions and globals
    // =====================================================

    fn function_definition(&mut self, node: Node) {
        let Some(name_node) = node.child_by_field_name("declarator").and_then(function_name) else {
            self.out.drop_anonymous(&node, self.ctx);
            return;
        };

        let mut deps = self.collector();
        deps.collect_types(node);
        if let Some(body) = node.child_by_field_name("body") {
            deps.collect_calls(body, c_callee);
        }
        let (type_deps, call_deps) = deps.finish();

        let symbol = Symbol::new(
            self.text(&name_node),
            SymbolKind::Function,
            SourceLanguage::C,
            signature(self.text(&node), true),
        )
        .with_type_deps(type_deps)
        .with_call_deps(call_deps)
        .with_static(has_specifier(&node, "storage_class_specifier", "static", self.source));

        let symbol = self.place(symbol, Occurrence::Definition, &name_node, &node);
        self.out.push(symbol);
    }

    fn declaration(&mut self, node: Node) {
        if let Some(ty) = node.child_by_field_name("type") {
            if matches!(ty.kind(), "struct_specifier" | "union_specifier" | "enum_specifier") {
                self.tagged_type(ty);
            }
        }

        let is_static = has_specifier(&node, "storage_class_specifier", "static", self.source);
        let mut cursor = node.walk();
        let declarators: Vec<Node> = node.children_by_field_name("declarator", &mut cursor).collect();

        for declarator in declarators {
            if let Some(name_node) = function_name(declarator) {
                self.function_declaration(node, declarator, name_node, is_static);
            } else if let Some(name_node) = declarator_name(declarator) {
                self.global_variable(node, declarator, name_node, is_static);
            } else {
                self.out.drop_anonymous(&declarator, self.ctx);
            }
        }
    }

    fn function_declaration(&mut self, node: Node, declarator: Node, name_node: Node, is_static: bool) {
        let mut deps = self.collector();
        if let Some(ty) = node.child_by_field_name("type") {
            deps.collect_types(ty);
        }
        deps.collect_types(declarator);
        let (type_deps, _) = deps.finish();

        let symbol = Symbol::new(
            self.text(&name_node),
            SymbolKind::Function,
            SourceLanguage::C,
            signature(self.text(&node), true),
        )
        .with_type_deps(type_deps)
        .with_static(is_static);

        let symbol = self.place(symbol, Occurrence::Declaration, &name_node, &node);
        self.out.push(symbol);
    }

    fn global_variable(&mut self, node: Node, declarator: Node, name_node: Node, is_static: bool) {
        let kind = if has_specifier(&node, "type_qualifier", "const", self.source) {
            SymbolKind::Const
        } else {
            SymbolKind::Static
        };
        let occurrence = if has_specifier(&node, "storage_class_specifier", "extern", self.source) {
            Occurrence::Declaration
        } else {
            Occurrence::Definition
        };

        let mut deps = self.collector();
        if let Some(ty) = node.child_by_field_name("type") {
            deps.collect_types(ty);
        }
        deps.collect_types(declarator);
        let (type_deps, _) = deps.finish();

        let symbol = Symbol::new(
            self.text(&name_node),
            kind,
            SourceLanguage::C,
            signature(self.text(&node), false),
        )
        .with_type_deps(type_deps)
        .with_static(is_static);

        let symbol = self.place(symbol, occurrence, &name_node, &node);
        self.out.push(symbol);
    }

    // =====================================================
    // Types
    // =====================================================

    fn tagged_type(&mut self, spec: Node) {
        // `struct Foo *p` and friends are references, not symbols
        if spec.child_by_field_name("body").is_none() {
            return;
        }
        let Some(name_node) = spec.child_by_field_name("name") else {
            self.out.drop_anonymous(&spec, self.ctx);
            return;
        };
        let symbol = self.tagged_symbol(spec, self.text(&name_node), &name_node, &spec);
        self.out.push(symbol);
    }

    /// A struct or enum with a body, named `name`, spanning `span_node`.
    fn tagged_symbol(&self, spec: Node, name: &str, name_node: &Node, span_node: &Node) -> Symbol {
        let kind = if spec.kind() == "enum_specifier" {
            SymbolKind::Enum
        } else {
            SymbolKind::Struct
        };

        let mut deps = self.collector().skipping(spec.child_by_field_name("name"));
        deps.collect_types(spec);
        let (type_deps, _) = deps.finish();

        let symbol = Symbol::new(
            name,
            kind,
            SourceLanguage::C,
            signature(self.text(span_node), false),
        )
        .with_type_deps(type_deps);
        self.place(symbol, self.type_occurrence(), name_node, span_node)
    }

    fn type_definition(&mut self, node: Node) {
        let ty = node.child_by_field_name("type");
        let target = node
            .child_by_field_name("declarator")
            .and_then(typedef_declarator);
        let (Some(ty), Some((name_node, plain_pointer))) = (ty, target) else {
            self.out.drop_anonymous(&node, self.ctx);
            return;
        };
        let name = self.text(&name_node);
        let collapse = plain_pointer && self.ctx.config.collapse_pointer_typedefs;

        if matches!(ty.kind(), "struct_specifier" | "union_specifier" | "enum_specifier") {
            let tag_node = ty.child_by_field_name("name");
            let tag = tag_node.map(|t| self.text(&t));
            let has_body = ty.child_by_field_name("body").is_some();

            if has_body && !plain_pointer {
                // typedef struct _Tag { ... } Name;  -> one symbol called Name
                let symbol = self.tagged_symbol(ty, name, &name_node, &node);
                self.out.push(symbol);
                if let Some(tag) = tag.filter(|t| *t != name) {
                    self.out.aliases.push((tag.to_string(), name.to_string()));
                }
                return;
            }
            if has_body {
                self.tagged_type(ty);
            }

            match tag {
                // typedef struct Name Name;
                Some(tag) if tag == name => {
                    tracing::debug!("Skipping forward typedef {} in {}", name, self.ctx.path.display());
                }
                Some(tag) if collapse && !self.ctx.config.should_skip(tag, SourceLanguage::C) => {
                    self.out.aliases.push((name.to_string(), tag.to_string()));
                }
                Some(_) => self.plain_typedef(node, name_node),
                None => self.out.drop_anonymous(&node, self.ctx),
            }
            return;
        }

        if collapse && ty.kind() == "type_identifier" {
            let target = self.text(&ty);
            if !self.ctx.config.should_skip(target, SourceLanguage::C) {
                self.out.aliases.push((name.to_string(), target.to_string()));
                return;
            }
        }
        self.plain_typedef(node, name_node);
    }

    fn plain_typedef(&mut self, node: Node, name_node: Node) {
        let mut deps = self.collector().skipping(Some(name_node));
        deps.collect_types(node);
        let (type_deps, _) = deps.finish();

        let symbol = Symbol::new(
            self.text(&name_node),
            SymbolKind::Typedef,
            SourceLanguage::C,
            signature(self.text(&node), false),
        )
        .with_type_deps(type_deps);
        let symbol = self.place(symbol, self.type_occurrence(), &name_node, &node);
        self.out.push(symbol);
    }

    // =====================================================
    // Macros (headers only)
    // =====================================================

    fn object_macro(&mut self, node: Node) {
        if !self.ctx.is_header {
            return;
        }
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(&name_node);
        let has_value = node
            .child_by_field_name("value")
            .map(|v| !self.text(&v).trim().is_empty())
            .unwrap_or(false);
        if !has_value || is_guard_name(name) {
            return;
        }

        let symbol = Symbol::new(
            name,
            SymbolKind::Const,
            SourceLanguage::C,
            signature(self.text(&node), false),
        );
        let symbol = self.place(symbol, Occurrence::Declaration, &name_node, &node);
        self.out.push(symbol);
    }

    fn function_macro(&mut self, node: Node) {
        if !self.ctx.is_header {
            return;
        }
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(&name_node);
        if is_guard_name(name) {
            return;
        }

        let symbol = Symbol::new(
            name,
            SymbolKind::Function,
            SourceLanguage::C,
            signature(self.text(&node), false),
        )
        .with_line_count(line_count(&node));
        let symbol = self.place(symbol, Occurrence::Declaration, &name_node, &node);
        self.out.push(symbol);
    }
}

// =====================================================
// Declarator helpers
// =====================================================

fn function_declarator(mut node: Node) -> Option<Node> {
    loop {
        match node.kind() {
            "function_declarator" => return Some(node),
            "pointer_declarator" | "attributed_declarator" => {
                node = node.child_by_field_name("declarator")?;
            }
            "parenthesized_declarator" => node = node.named_child(0)?,
            _ => return None,
        }
    }
}

/// Name of a function declarator; `None` for function pointer variables.
fn function_name(declarator: Node) -> Option<Node> {
    let func = function_declarator(declarator)?;
    let inner = func.child_by_field_name("declarator")?;
    match inner.kind() {
        "identifier" => Some(inner),
        _ => function_name(inner),
    }
}

fn declarator_name(mut node: Node) -> Option<Node> {
    loop {
        match node.kind() {
            "identifier" => return Some(node),
            "init_declarator" | "pointer_declarator" | "array_declarator" | "function_declarator"
            | "attributed_declarator" => node = node.child_by_field_name("declarator")?,
            "parenthesized_declarator" => node = node.named_child(0)?,
            _ => return None,
        }
    }
}

/// The typedef name and whether it is a bare `T *Name`.
fn typedef_declarator(mut node: Node) -> Option<(Node, bool)> {
    let mut pointer = false;
    let mut other = false;
    loop {
        match node.kind() {
            "type_identifier" => return Some((node, pointer && !other)),
            "pointer_declarator" => {
                pointer = true;
                node = node.child_by_field_name("declarator")?;
            }
            "function_declarator" | "array_declarator" => {
                other = true;
                node = node.child_by_field_name("declarator")?;
            }
            "attributed_declarator" => node = node.child_by_field_name("declarator")?,
            "parenthesized_declarator" => node = node.named_child(0)?,
            _ => return None,
        }
    }
}

fn has_specifier(node: &Node, kind: &str, keyword: &str, source: &[u8]) -> bool {
    let mut cursor = node.walk();
    let mut children = node.children(&mut cursor);
    children.any(|c| c.kind() == kind && node_text(&c, source) == keyword)
}

fn is_guard_name(name: &str) -> bool {
    const GUARD_SUFFIXES: &[&str] = &["_H", "_H_", "_HPP", "_HPP_", "_INCLUDED", "_INCLUDED_"];
    (name.starts_with("__") && name.ends_with("__"))
        || GUARD_SUFFIXES.iter().any(|s| name.ends_with(s))
}

fn c_callee<'s>(call: &Node<'_>, source: &'s [u8]) -> Option<&'s str> {
    let function = call.child_by_field_name("function")?;
    match function.kind() {
        "identifier" => Some(node_text(&function, source)),
        "field_expression" => function
            .child_by_field_name("field")
            .map(|f| node_text(&f, source)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use crate::config::GraphConfig;
    use crate::indexer::parser::Parser;
    use crate::languages::LanguageRegistry;

    fn extract(source: &str, path: &str) -> FileExtraction {
        extract_with(&GraphConfig::default(), source, path)
    }

    fn extract_with(config: &GraphConfig, source: &str, path: &str) -> FileExtraction {
        let parsed = Parser::new(Arc::new(LanguageRegistry::default()))
            .parse_as(source, SourceLanguage::C)
            .unwrap();
        let ctx = ExtractionContext::new(config, Path::new(path));
        CGrammar.extract(&parsed, &ctx)
    }

    fn find<'a>(result: &'a FileExtraction, name: &str) -> &'a Symbol {
        result
            .symbols
            .iter()
            .find(|s| s.name == name)
            .unwrap_or_else(|| panic!("symbol {} not extracted", name))
    }

    fn names(result: &FileExtraction) -> Vec<&str> {
        result.symbols.iter().map(|s| s.name.as_str()).collect()
    }

    fn deps(set: &std::collections::BTreeSet<String>) -> Vec<&str> {
        set.iter().map(|s| s.as_str()).collect()
    }

    #[test]
    fn test_self_referential_struct_and_prototype() {
        let result = extract(
            "struct Node { struct Node* next; int val; };\nvoid visit(struct Node* n);\n",
            "tree.h",
        );

        let node = find(&result, "Node");
        assert_eq!(node.kind, SymbolKind::Struct);
        assert_eq!(deps(&node.type_deps), vec!["Node"]);
        assert_eq!(node.declaration.as_ref().unwrap().line, 1);
        assert!(node.definition.is_none());

        let visit = find(&result, "visit");
        assert_eq!(visit.kind, SymbolKind::Function);
        assert_eq!(deps(&visit.type_deps), vec!["Node"]);
        assert_eq!(visit.signature, "void visit(struct Node* n)");
        assert_eq!(visit.declaration.as_ref().unwrap().file, PathBuf::from("tree.h"));
        assert_eq!(visit.declaration.as_ref().unwrap().line, 2);
    }

    #[test]
    fn test_function_definition() {
        let source = r#"
static int helper(Tree *t) {
    return count(t) + 1;
}

int walk(Tree *t)
{
    int n = helper(t);
    t->ops->visit(t);
    return n;
}
"#;
        let result = extract(source, "walk.c");

        let helper = find(&result, "helper");
        assert!(helper.is_static);
        assert_eq!(helper.line_count, 3);
        assert_eq!(helper.definition.as_ref().unwrap().line, 2);
        assert_eq!(deps(&helper.call_deps), vec!["count"]);

        let walk = find(&result, "walk");
        assert!(!walk.is_static);
        assert_eq!(walk.signature, "int walk(Tree *t)");
        assert_eq!(deps(&walk.type_deps), vec!["Tree"]);
        assert_eq!(deps(&walk.call_deps), vec!["helper", "visit"]);
        assert!(walk.declaration.is_none());
    }

    #[test]
    fn test_pointer_returning_function() {
        let result = extract("Node *make_node(int v) { return alloc_node(v); }", "n.c");
        let make = find(&result, "make_node");
        assert_eq!(deps(&make.type_deps), vec!["Node"]);
        assert_eq!(deps(&make.call_deps), vec!["alloc_node"]);
    }

    #[test]
    fn test_typedef_struct_unifies_with_tag() {
        let result = extract(
            "typedef struct _Tree { struct _Tree *left; Leaf *leaf; } Tree;",
            "tree.h",
        );
        assert_eq!(names(&result), vec!["Tree"]);
        let tree = find(&result, "Tree");
        assert_eq!(tree.kind, SymbolKind::Struct);
        assert_eq!(deps(&tree.type_deps), vec!["Leaf", "_Tree"]);
        assert_eq!(result.aliases, vec![("_Tree".to_string(), "Tree".to_string())]);
    }

    #[test]
    fn test_typedef_enum() {
        let result = extract("typedef enum { RED, GREEN } Color;", "color.h");
        let color = find(&result, "Color");
        assert_eq!(color.kind, SymbolKind::Enum);
        assert!(result.aliases.is_empty());
    }

    #[test]
    fn test_forward_and_renaming_typedefs() {
        let result = extract(
            "typedef struct Node Node;\ntypedef struct Impl Handle;\ntypedef unsigned int Count;",
            "fwd.h",
        );
        assert_eq!(names(&result), vec!["Handle", "Count"]);
        let handle = find(&result, "Handle");
        assert_eq!(handle.kind, SymbolKind::Typedef);
        assert_eq!(deps(&handle.type_deps), vec!["Impl"]);
        assert!(find(&result, "Count").type_deps.is_empty());
    }

    #[test]
    fn test_pointer_typedef_collapses_to_alias() {
        let source = "typedef Tree *TreePtr;\ntypedef struct Node *NodePtr;";
        let result = extract(source, "ptr.h");
        assert!(result.symbols.is_empty());
        assert_eq!(
            result.aliases,
            vec![
                ("TreePtr".to_string(), "Tree".to_string()),
                ("NodePtr".to_string(), "Node".to_string())
            ]
        );

        let config = GraphConfig {
            collapse_pointer_typedefs: false,
            ..GraphConfig::default()
        };
        let result = extract_with(&config, source, "ptr.h");
        assert_eq!(names(&result), vec!["TreePtr", "NodePtr"]);
        assert_eq!(deps(&find(&result, "TreePtr").type_deps), vec!["Tree"]);
    }

    #[test]
    fn test_pointer_typedef_to_builtin_is_not_an_alias() {
        let result = extract("typedef struct FILE *FilePtr;", "io.h");
        assert!(result.aliases.is_empty());
        let file_ptr = find(&result, "FilePtr");
        assert_eq!(file_ptr.kind, SymbolKind::Typedef);
        assert!(file_ptr.type_deps.is_empty());
    }

    #[test]
    fn test_function_pointer_typedef_is_typedef() {
        let result = extract("typedef void (*Visitor)(Node *n, Context *ctx);", "cb.h");
        let visitor = find(&result, "Visitor");
        assert_eq!(visitor.kind, SymbolKind::Typedef);
        assert_eq!(deps(&visitor.type_deps), vec!["Context", "Node"]);
    }

    #[test]
    fn test_globals() {
        let source = "static const int LIMIT = 4;\nTree *root = 0;\nextern int verbose;\nint (*hook)(int);\n";
        let result = extract(source, "globals.c");

        let limit = find(&result, "LIMIT");
        assert_eq!(limit.kind, SymbolKind::Const);
        assert!(limit.is_static);
        assert!(limit.definition.is_some());

        let root = find(&result, "root");
        assert_eq!(root.kind, SymbolKind::Static);
        assert_eq!(deps(&root.type_deps), vec!["Tree"]);

        let verbose = find(&result, "verbose");
        assert!(verbose.declaration.is_some());
        assert!(verbose.definition.is_none());

        assert_eq!(find(&result, "hook").kind, SymbolKind::Static);
    }

    #[test]
    fn test_header_macros() {
        let source = r#"#ifndef TREE_H
#define TREE_H
#define MAX_DEPTH 16
#define SQUARE(x) ((x) * (x))
#define ENABLE_TRACE
#endif
"#;
        let result = extract(source, "tree.h");
        assert_eq!(names(&result), vec!["MAX_DEPTH", "SQUARE"]);
        assert_eq!(find(&result, "MAX_DEPTH").kind, SymbolKind::Const);
        assert_eq!(find(&result, "SQUARE").kind, SymbolKind::Function);

        let in_source = extract(source, "tree.c");
        assert!(in_source.symbols.is_empty());
    }

    #[test]
    fn test_anonymous_declarations_are_dropped() {
        let result = extract("enum { FIRST = 1 };\nstruct { int a; } anon_var;\n", "anon.c");
        assert_eq!(result.dropped, 2);
        assert_eq!(names(&result), vec!["anon_var"]);
    }

    #[test]
    fn test_struct_in_source_is_definition() {
        let result = extract("struct Point { Coord x; Coord y; };", "point.c");
        let point = find(&result, "Point");
        assert!(point.declaration.is_none());
        assert_eq!(point.definition.as_ref().unwrap().line, 1);
        assert_eq!(deps(&point.type_deps), vec!["Coord"]);
    }

    #[test]
    fn test_guard_names() {
        assert!(is_guard_name("ZOPFLI_DEFLATE_H_"));
        assert!(is_guard_name("TREE_H"));
        assert!(is_guard_name("__STDC__"));
        assert!(!is_guard_name("MAX_HEIGHT"));
    }
}
