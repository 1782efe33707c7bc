use std::path::Path;
use std::sync::Arc;

use crate::error::{GraphError, Result};
use crate::index::SourceLanguage;
use crate::languages::{LanguageGrammar, LanguageRegistry};

pub struct Parser {
    registry: Arc<LanguageRegistry>,
}

impl Parser {
    pub fn new(registry: Arc<LanguageRegistry>) -> Self {
        Self { registry }
    }

    pub fn parse_file(&self, path: &Path) -> Result<ParsedFile> {
        let grammar = self
            .registry
            .get_for_file(path)
            .ok_or_else(|| GraphError::UnsupportedLanguage(path.display().to_string()))?;

        let source = std::fs::read_to_string(path)?;
        self.parse_source(&source, grammar)
    }

    pub fn parse_source(&self, source: &str, grammar: Arc<dyn LanguageGrammar>) -> Result<ParsedFile> {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&grammar.ts_language())
            .map_err(|e| GraphError::Parse(e.to_string()))?;

        let tree = parser
            .parse(source, None)
            .ok_or_else(|| GraphError::Parse("Failed to parse source".to_string()))?;

        Ok(ParsedFile {
            tree,
            source: source.to_string(),
            language: grammar.language(),
            grammar,
        })
    }

    pub fn parse_as(&self, source: &str, language: SourceLanguage) -> Result<ParsedFile> {
        let grammar = self
            .registry
            .get(language)
            .ok_or_else(|| GraphError::UnsupportedLanguage(language.to_string()))?;
        self.parse_source(source, grammar)
    }

    pub fn registry(&self) -> &LanguageRegistry {
        &self.registry
    }
}

pub struct ParsedFile {
    pub tree: tree_sitter::Tree,
    pub source: String,
    pub language: SourceLanguage,
    pub grammar: Arc<dyn LanguageGrammar>,
}

impl ParsedFile {
    pub fn root_node(&self) -> tree_sitter::Node<'_> {
        self.tree.root_node()
    }

    pub fn source_bytes(&self) -> &[u8] {
        self.source.as_bytes()
    }

    pub fn node_text(&self, node: &tree_sitter::Node) -> &str {
        node.utf8_text(self.source_bytes()).unwrap_or("")
    }

    /// Tree-sitter recovers from malformed input; this reports whether it had to.
    pub fn has_syntax_errors(&self) -> bool {
        self.root_node().has_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_parser() -> Parser {
        Parser::new(Arc::new(LanguageRegistry::default()))
    }

    #[test]
    fn test_parse_source_c() {
        let parser = create_parser();
        let parsed = parser
            .parse_as("struct Node { struct Node *next; int val; };", SourceLanguage::C)
            .unwrap();
        assert_eq!(parsed.language, SourceLanguage::C);
        assert_eq!(parsed.root_node().kind(), "translation_unit");
        assert!(!parsed.has_syntax_errors());
    }

    #[test]
    fn test_parse_source_rust() {
        let parser = create_parser();
        let parsed = parser.parse_as("fn test() {}", SourceLanguage::Rust).unwrap();
        assert_eq!(parsed.root_node().kind(), "source_file");
        assert_eq!(parsed.node_text(&parsed.root_node()), "fn test() {}");
    }

    #[test]
    fn test_parse_source_empty() {
        let parser = create_parser();
        let parsed = parser.parse_as("", SourceLanguage::Rust).unwrap();
        assert_eq!(parsed.source, "");
    }

    #[test]
    fn test_malformed_source_still_yields_tree() {
        let parser = create_parser();
        let parsed = parser.parse_as("struct { int ;; void (", SourceLanguage::C).unwrap();
        assert!(parsed.has_syntax_errors());
    }

    #[test]
    fn test_parse_file_unsupported_extension() {
        let parser = create_parser();
        let err = parser.parse_file(Path::new("notes.txt")).err().unwrap();
        assert!(matches!(err, GraphError::UnsupportedLanguage(_)));
    }

    #[test]
    fn test_parse_file_missing() {
        let parser = create_parser();
        let err = parser.parse_file(Path::new("/nonexistent/dir/missing.c")).err().unwrap();
        assert!(matches!(err, GraphError::Io(_)));
    }

    #[test]
    fn test_parse_file_reads_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("lib.rs");
        std::fs::write(&path, "pub struct Point { x: f64 }").unwrap();

        let parser = create_parser();
        let parsed = parser.parse_file(&path).unwrap();
        assert_eq!(parsed.language, SourceLanguage::Rust);
        assert_eq!(parsed.grammar.name(), "rust");
    }
}
