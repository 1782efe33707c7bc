pub mod c;
pub mod rust;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::config::GraphConfig;
use crate::index::SourceLanguage;
use crate::indexer::extractor::{ExtractionContext, FileExtraction};
use crate::indexer::parser::ParsedFile;

/// A tree-sitter grammar plus the visitor that recognizes its declaration shapes.
pub trait LanguageGrammar: Send + Sync {
    fn language(&self) -> SourceLanguage;
    fn ts_language(&self) -> tree_sitter::Language;

    /// Walks the whole tree once and emits candidate symbols.
    fn extract(&self, parsed: &ParsedFile, ctx: &ExtractionContext<'_>) -> FileExtraction;

    fn name(&self) -> &'static str {
        self.language().as_str()
    }
}

pub struct LanguageRegistry {
    languages: HashMap<SourceLanguage, Arc<dyn LanguageGrammar>>,
    extension_map: HashMap<String, SourceLanguage>,
}

impl LanguageRegistry {
    /// Registers both grammars, routing extensions as `config.languages` says.
    pub fn new(config: &GraphConfig) -> Self {
        let mut registry = Self {
            languages: HashMap::new(),
            extension_map: HashMap::new(),
        };

        registry.register(Arc::new(c::CGrammar));
        registry.register(Arc::new(rust::RustGrammar));

        for (language, extensions) in &config.languages {
            for ext in extensions {
                registry.extension_map.insert(ext.clone(), *language);
            }
        }

        registry
    }

    pub fn register(&mut self, grammar: Arc<dyn LanguageGrammar>) {
        self.languages.insert(grammar.language(), grammar);
    }

    pub fn get(&self, language: SourceLanguage) -> Option<Arc<dyn LanguageGrammar>> {
        self.languages.get(&language).cloned()
    }

    pub fn get_by_extension(&self, ext: &str) -> Option<Arc<dyn LanguageGrammar>> {
        self.extension_map
            .get(ext)
            .and_then(|lang| self.languages.get(lang))
            .cloned()
    }

    pub fn get_for_file(&self, path: &Path) -> Option<Arc<dyn LanguageGrammar>> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.get_by_extension(ext))
    }

    pub fn language_for_file(&self, path: &Path) -> Option<SourceLanguage> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.extension_map.get(ext))
            .copied()
    }
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::new(&GraphConfig::default())
    }
}
