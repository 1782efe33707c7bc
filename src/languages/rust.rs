use tree_sitter::Node;

use super::LanguageGrammar;
use crate::index::{SourceLanguage, Symbol, SymbolKind};
use crate::indexer::extractor::{
    line_count, node_text, signature, DependencyCollector, ExtractionContext, FileExtraction,
};
use crate::indexer::parser::ParsedFile;

pub struct RustGrammar;

impl LanguageGrammar for RustGrammar {
    fn language(&self) -> SourceLanguage {
        SourceLanguage::Rust
    }

    fn ts_language(&self) -> tree_sitter::Language {
        tree_sitter_rust::LANGUAGE.into()
    }

    fn extract(&self, parsed: &ParsedFile, ctx: &ExtractionContext<'_>) -> FileExtraction {
        let mut visitor = RustVisitor {
            source: parsed.source_bytes(),
            ctx,
            out: FileExtraction::default(),
        };
        visitor.visit_items(parsed.root_node());
        visitor.out
    }
}

struct RustVisitor<'a, 'c> {
    source: &'a [u8],
    ctx: &'a ExtractionContext<'c>,
    out: FileExtraction,
}

impl<'a, 'c> RustVisitor<'a, 'c> {
    fn visit_items(&mut self, container: Node) {
        let mut cursor = container.walk();
        for child in container.named_children(&mut cursor) {
            match child.kind() {
                "function_item" => self.function(child),
                "foreign_mod_item" => self.foreign_block(child),
                "struct_item" | "union_item" => self.type_item(child, SymbolKind::Struct),
                "enum_item" => self.type_item(child, SymbolKind::Enum),
                "type_item" => self.type_item(child, SymbolKind::TypeAlias),
                "const_item" => self.value_item(child, SymbolKind::Const),
                "static_item" => self.value_item(child, SymbolKind::Static),
                "impl_item" => self.impl_block(child),
                "mod_item" | "ERROR" => {
                    if let Some(body) = child.child_by_field_name("body") {
                        self.visit_items(body);
                    } else if child.kind() == "ERROR" {
                        self.visit_items(child);
                    }
                }
                // trait signatures describe no single implementation
                _ => {}
            }
        }
    }

    fn text(&self, node: &Node) -> &'a str {
        node_text(node, self.source)
    }

    fn collector(&self) -> DependencyCollector<'a> {
        DependencyCollector::new(self.source, self.ctx.config, SourceLanguage::Rust)
    }

    fn function(&mut self, node: Node) {
        let Some(name_node) = node.child_by_field_name("name") else {
            self.out.drop_anonymous(&node, self.ctx);
            return;
        };

        let mut deps = self.collector();
        deps.collect_types(node);
        if let Some(body) = node.child_by_field_name("body") {
            deps.collect_calls(body, rust_callee);
        }
        let (type_deps, call_deps) = deps.finish();

        let symbol = Symbol::new(
            self.text(&name_node),
            SymbolKind::Function,
            SourceLanguage::Rust,
            signature(self.text(&node), true),
        )
        .with_type_deps(type_deps)
        .with_call_deps(call_deps)
        .with_definition(self.ctx.location(&name_node), self.ctx.span(&node))
        .with_line_count(line_count(&node));
        self.out.push(symbol);
    }

    /// `extern "C" { ... }`: every signature is a binding to a foreign implementation.
    fn foreign_block(&mut self, node: Node) {
        let Some(body) = node.child_by_field_name("body") else {
            return;
        };
        let mut cursor = body.walk();
        for item in body.named_children(&mut cursor) {
            match item.kind() {
                "function_signature_item" => self.foreign_function(item),
                "static_item" => {
                    let name_node = item.child_by_field_name("name");
                    if let (Some(symbol), Some(name_node)) =
                        (self.value_symbol(item, SymbolKind::Static), name_node)
                    {
                        let symbol = symbol
                            .with_declaration(self.ctx.location(&name_node), self.ctx.span(&item));
                        self.out.push(symbol);
                    }
                }
                _ => {}
            }
        }
    }

    fn foreign_function(&mut self, node: Node) {
        let Some(name_node) = node.child_by_field_name("name") else {
            self.out.drop_anonymous(&node, self.ctx);
            return;
        };

        let mut deps = self.collector();
        deps.collect_types(node);
        let (type_deps, _) = deps.finish();

        let symbol = Symbol::new(
            self.text(&name_node),
            SymbolKind::ForeignFunction,
            SourceLanguage::Rust,
            signature(self.text(&node), true),
        )
        .with_type_deps(type_deps)
        .with_declaration(self.ctx.location(&name_node), self.ctx.span(&node));
        self.out.push(symbol);
    }

    fn type_item(&mut self, node: Node, kind: SymbolKind) {
        let Some(name_node) = node.child_by_field_name("name") else {
            self.out.drop_anonymous(&node, self.ctx);
            return;
        };

        let mut deps = self.collector().skipping(Some(name_node));
        deps.collect_types(node);
        let (type_deps, _) = deps.finish();

        let symbol = Symbol::new(
            self.text(&name_node),
            kind,
            SourceLanguage::Rust,
            signature(self.text(&node), false),
        )
        .with_type_deps(type_deps)
        .with_definition(self.ctx.location(&name_node), self.ctx.span(&node))
        .with_line_count(line_count(&node));
        self.out.push(symbol);
    }

    fn value_item(&mut self, node: Node, kind: SymbolKind) {
        let Some(symbol) = self.value_symbol(node, kind) else {
            self.out.drop_anonymous(&node, self.ctx);
            return;
        };
        let symbol = match node.child_by_field_name("name") {
            Some(name_node) => symbol.with_definition(self.ctx.location(&name_node), self.ctx.span(&node)),
            None => symbol,
        };
        self.out.push(symbol.with_line_count(line_count(&node)));
    }

    fn value_symbol(&self, node: Node, kind: SymbolKind) -> Option<Symbol> {
        let name_node = node.child_by_field_name("name")?;
        let mut deps = self.collector();
        if let Some(ty) = node.child_by_field_name("type") {
            deps.collect_types(ty);
        }
        if let Some(value) = node.child_by_field_name("value") {
            deps.collect_types(value);
        }
        let (type_deps, _) = deps.finish();

        Some(
            Symbol::new(
                self.text(&name_node),
                kind,
                SourceLanguage::Rust,
                signature(self.text(&node), false),
            )
            .with_type_deps(type_deps),
        )
    }

    /// `impl [Trait for] Type { ... }` becomes `impl_Type`; its methods become functions.
    fn impl_block(&mut self, node: Node) {
        let type_name = node
            .child_by_field_name("type")
            .and_then(|t| base_type_name(t, self.source));
        let Some(type_name) = type_name else {
            self.out.drop_anonymous(&node, self.ctx);
            return;
        };

        let mut deps = self.collector();
        deps.add_type(type_name);
        if let Some(trait_name) = node
            .child_by_field_name("trait")
            .and_then(|t| base_type_name(t, self.source))
        {
            deps.add_type(trait_name);
        }
        let (type_deps, _) = deps.finish();

        let header_end = node
            .child_by_field_name("body")
            .map(|b| b.start_byte())
            .unwrap_or(node.end_byte());
        let header = String::from_utf8_lossy(&self.source[node.start_byte()..header_end]);

        let symbol = Symbol::new(
            format!("impl_{}", type_name),
            SymbolKind::Impl,
            SourceLanguage::Rust,
            signature(&header, true),
        )
        .with_type_deps(type_deps)
        .with_definition(self.ctx.location(&node), self.ctx.span(&node))
        .with_line_count(line_count(&node));
        self.out.push(symbol);

        if let Some(body) = node.child_by_field_name("body") {
            let mut cursor = body.walk();
            let methods: Vec<Node> = body
                .named_children(&mut cursor)
                .filter(|c| c.kind() == "function_item")
                .collect();
            for method in methods {
                self.function(method);
            }
        }
    }
}

/// `Foo`, `Foo<T>`, `a::b::Foo` and `&Foo` all name `Foo`.
fn base_type_name<'s>(node: Node, source: &'s [u8]) -> Option<&'s str> {
    match node.kind() {
        "type_identifier" | "identifier" => Some(node_text(&node, source)),
        "generic_type" => base_type_name(node.child_by_field_name("type")?, source),
        "scoped_type_identifier" | "scoped_identifier" => {
            base_type_name(node.child_by_field_name("name")?, source)
        }
        "reference_type" | "pointer_type" => base_type_name(node.child_by_field_name("type")?, source),
        _ => None,
    }
}

fn rust_callee<'s>(call: &Node<'_>, source: &'s [u8]) -> Option<&'s str> {
    callee_name(call.child_by_field_name("function")?, source)
}

fn callee_name<'s>(function: Node, source: &'s [u8]) -> Option<&'s str> {
    match function.kind() {
        "identifier" => Some(node_text(&function, source)),
        "field_expression" => function
            .child_by_field_name("field")
            .map(|f| node_text(&f, source)),
        "scoped_identifier" => function
            .child_by_field_name("name")
            .map(|n| node_text(&n, source)),
        "generic_function" => callee_name(function.child_by_field_name("function")?, source),
        _ => None,
    }
}
