use std::collections::BTreeSet;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use tree_sitter::Node;

use crate::config::GraphConfig;
use crate::index::{SourceLanguage, SourceLocation, SourceSpan, Symbol};
use crate::indexer::parser::ParsedFile;

/// Non-callable signatures keep at most this many lines
const MAX_SIGNATURE_LINES: usize = 3;

static BLOCK_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("valid block comment regex"));
static LINE_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"//[^\n]*").expect("valid line comment regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Per-file inputs shared by the language visitors.
pub struct ExtractionContext<'a> {
    pub config: &'a GraphConfig,
    /// Root-relative path stored on every emitted location
    pub path: &'a Path,
    pub is_header: bool,
}

impl<'a> ExtractionContext<'a> {
    pub fn new(config: &'a GraphConfig, path: &'a Path) -> Self {
        Self {
            config,
            path,
            is_header: config.is_header(path),
        }
    }

    pub fn location(&self, name_node: &Node) -> SourceLocation {
        SourceLocation::new(self.path, name_node.start_position().row as u32 + 1)
    }

    pub fn span(&self, node: &Node) -> SourceSpan {
        SourceSpan {
            file: self.path.to_path_buf(),
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
            start_line: node.start_position().row as u32 + 1,
            end_line: node.end_position().row as u32 + 1,
        }
    }
}

/// Everything one file contributes to the table.
#[derive(Debug, Default)]
pub struct FileExtraction {
    pub symbols: Vec<Symbol>,
    /// `(alias, canonical)`, e.g. a struct tag and the typedef name that replaces it
    pub aliases: Vec<(String, String)>,
    /// Anonymous declarations that had no resolvable name
    pub dropped: usize,
    pub has_syntax_errors: bool,
}

impl FileExtraction {
    pub fn push(&mut self, symbol: Symbol) {
        self.symbols.push(symbol);
    }

    pub fn drop_anonymous(&mut self, node: &Node, ctx: &ExtractionContext<'_>) {
        tracing::debug!(
            "Dropping anonymous {} at {}:{}",
            node.kind(),
            ctx.path.display(),
            node.start_position().row + 1
        );
        self.dropped += 1;
    }
}

pub struct SymbolExtractor<'a> {
    config: &'a GraphConfig,
}

impl<'a> SymbolExtractor<'a> {
    pub fn new(config: &'a GraphConfig) -> Self {
        Self { config }
    }

    /// Runs the grammar's visitor over an already parsed file.
    pub fn extract(&self, parsed: &ParsedFile, relative_path: &Path) -> FileExtraction {
        let ctx = ExtractionContext::new(self.config, relative_path);
        let mut result = parsed.grammar.extract(parsed, &ctx);
        result.has_syntax_errors = parsed.has_syntax_errors();
        if result.has_syntax_errors {
            tracing::debug!("{} parsed with recoverable errors", relative_path.display());
        }
        result
    }
}

// =====================================================
// Shared node helpers
// =====================================================

pub(crate) fn node_text<'s>(node: &Node, source: &'s [u8]) -> &'s str {
    node.utf8_text(source).unwrap_or("")
}

pub(crate) fn line_count(node: &Node) -> u32 {
    (node.end_position().row - node.start_position().row) as u32 + 1
}

/// Human-readable signature with comments removed.
///
/// Callables are cut at the opening brace and flattened to one line; anything
/// else keeps its first lines and ends with `...` when truncated.
pub(crate) fn signature(text: &str, callable: bool) -> String {
    let without_blocks = BLOCK_COMMENT.replace_all(text, "");
    let stripped = LINE_COMMENT.replace_all(&without_blocks, "");

    if callable {
        let head = stripped.split('{').next().unwrap_or_default();
        let head = head.trim().trim_end_matches(';');
        return WHITESPACE.replace_all(head.trim(), " ").into_owned();
    }

    let lines: Vec<&str> = stripped
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.trim().is_empty())
        .collect();
    if lines.len() > MAX_SIGNATURE_LINES {
        let mut head = lines[..MAX_SIGNATURE_LINES].join("\n");
        head.push_str("\n...");
        head
    } else {
        lines.join("\n")
    }
}

/// Extracts the callee name of a call expression, per language.
pub(crate) type CalleeFn = for<'t, 's> fn(&Node<'t>, &'s [u8]) -> Option<&'s str>;

/// Collects type and call references below a node.
///
/// Traversal uses an explicit stack; the name node of the declaration being
/// collected is excluded so a type never lists itself through its own name.
pub(crate) struct DependencyCollector<'a> {
    source: &'a [u8],
    config: &'a GraphConfig,
    language: SourceLanguage,
    skip_node: Option<usize>,
    pub type_deps: BTreeSet<String>,
    pub call_deps: BTreeSet<String>,
}

impl<'a> DependencyCollector<'a> {
    pub fn new(source: &'a [u8], config: &'a GraphConfig, language: SourceLanguage) -> Self {
        Self {
            source,
            config,
            language,
            skip_node: None,
            type_deps: BTreeSet::new(),
            call_deps: BTreeSet::new(),
        }
    }

    pub fn skipping(mut self, node: Option<Node>) -> Self {
        self.skip_node = node.map(|n| n.id());
        self
    }

    /// Every `type_identifier` below `root`.
    pub fn collect_types(&mut self, root: Node) {
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if node.kind() == "type_identifier" && Some(node.id()) != self.skip_node {
                let name = node_text(&node, self.source);
                self.add_type(name);
            }
            push_children(&node, &mut stack);
        }
    }

    /// Every `call_expression` below `root`, named by `callee`.
    pub fn collect_calls(&mut self, root: Node, callee: CalleeFn) {
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if node.kind() == "call_expression" {
                if let Some(name) = callee(&node, self.source) {
                    if !self.config.should_skip(name, self.language) {
                        self.call_deps.insert(name.to_string());
                    }
                }
            }
            push_children(&node, &mut stack);
        }
    }

    pub fn add_type(&mut self, name: &str) {
        if !name.is_empty() && !self.config.should_skip(name, self.language) {
            self.type_deps.insert(name.to_string());
        }
    }

    pub fn finish(self) -> (BTreeSet<String>, BTreeSet<String>) {
        (self.type_deps, self.call_deps)
    }
}

fn push_children<'t>(node: &Node<'t>, stack: &mut Vec<Node<'t>>) {
    let mut cursor = node.walk();
    // reversed so the stack pops in source order
    let children: Vec<Node<'t>> = node.children(&mut cursor).collect();
    stack.extend(children.into_iter().rev());
}
