pub mod config;
pub mod error;
pub mod graph;
pub mod index;
pub mod indexer;
pub mod languages;

pub use config::{ArtifactRoles, GraphConfig, OrderingPolicy, CONFIG_FILENAME};
pub use error::{GraphError, Result};
pub use graph::{DependencyGraph, FileStats, SourceMap};
pub use index::{
    BuildDiagnostics, MergeConflict, MergeOutcome, OrderedSymbol, SkippedFile, SourceLanguage,
    SourceLocation, SourceSpan, Symbol, SymbolInfo, SymbolKey, SymbolKind, SymbolTable,
};
pub use indexer::{FileWalker, Parser, SymbolExtractor};
pub use languages::{LanguageGrammar, LanguageRegistry};
