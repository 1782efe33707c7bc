//! The built symbol graph and its query surface.
//!
//! A [`SourceMap`] is constructed eagerly: the tree is walked, every file parsed
//! and extracted (in parallel), the records merged in path order, and the
//! closure, cycle and ordering passes run to completion before the value is
//! returned. After that it is read-only; [`SourceMap::rebuild`] discards
//! everything and starts over.
//!
//! ```no_run
//! use symbol_graph::SourceMap;
//!
//! let map = SourceMap::new("/abs/path/to/project")?;
//! for symbol in map.get_ordered_symbols() {
//!     println!("{} {}", symbol.kind, symbol.name);
//! }
//! # Ok::<(), symbol_graph::GraphError>(())
//! ```

pub mod cycles;
pub mod order;
pub mod report;
pub mod resolver;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;

use crate::config::GraphConfig;
use crate::error::{GraphError, Result};
use crate::index::models::has_extension;
use crate::index::{
    BuildDiagnostics, OrderedSymbol, SkippedFile, SourceLanguage, Symbol, SymbolInfo, SymbolKey,
    SymbolTable,
};
use crate::indexer::{FileExtraction, FileWalker, Parser, SymbolExtractor};
use crate::languages::LanguageRegistry;

pub use order::DependencyGraph;
pub use report::FileStats;

/// Lines of context `get_source_context` callers usually want.
pub const DEFAULT_CONTEXT_BEFORE: usize = 2;
pub const DEFAULT_CONTEXT_AFTER: usize = 3;

pub struct SourceMap {
    root: PathBuf,
    config: GraphConfig,
    table: SymbolTable,
    ordered: Vec<OrderedSymbol>,
    file_stats: Vec<FileStats>,
    diagnostics: BuildDiagnostics,
}

struct ParsedOutcome {
    path: PathBuf,
    language: SourceLanguage,
    lines: usize,
    extraction: FileExtraction,
}

impl SourceMap {
    /// Builds the graph for `root`, reading `.symbol-graph.yml` there when present.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = validate_root(root.as_ref())?;
        let config = GraphConfig::discover(&root)?;
        Self::build(root, config)
    }

    pub fn with_config(root: impl AsRef<Path>, config: GraphConfig) -> Result<Self> {
        let root = validate_root(root.as_ref())?;
        config.validate()?;
        Self::build(root, config)
    }

    /// Re-parses the whole tree with the same configuration.
    pub fn rebuild(&mut self) -> Result<()> {
        *self = Self::build(self.root.clone(), self.config.clone())?;
        Ok(())
    }

    fn build(root: PathBuf, config: GraphConfig) -> Result<Self> {
        let started = Instant::now();
        let files = FileWalker::new(&config)?.walk(&root)?;

        let parser = Parser::new(Arc::new(LanguageRegistry::new(&config)));
        let extractor = SymbolExtractor::new(&config);
        let outcomes: Vec<std::result::Result<ParsedOutcome, SkippedFile>> = if config.parallel {
            files
                .par_iter()
                .map(|(path, _)| process_file(&parser, &extractor, &root, path))
                .collect()
        } else {
            files
                .iter()
                .map(|(path, _)| process_file(&parser, &extractor, &root, path))
                .collect()
        };
        let parse_time = started.elapsed();

        let mut diagnostics = BuildDiagnostics {
            files_scanned: files.len(),
            ..BuildDiagnostics::default()
        };
        let mut table = SymbolTable::new();
        let mut file_stats = Vec::new();

        // merge barrier: sequential, in path order
        for outcome in outcomes {
            let parsed = match outcome {
                Ok(parsed) => parsed,
                Err(skipped) => {
                    tracing::warn!("Skipping {}: {}", skipped.path.display(), skipped.reason);
                    diagnostics.files_skipped += 1;
                    diagnostics.skipped_files.push(skipped);
                    continue;
                }
            };

            diagnostics.files_parsed += 1;
            if parsed.extraction.has_syntax_errors {
                diagnostics.files_with_syntax_errors += 1;
            }
            diagnostics.symbols_extracted += parsed.extraction.symbols.len();
            diagnostics.symbols_dropped += parsed.extraction.dropped;

            file_stats.push(FileStats {
                path: parsed.path,
                lines: parsed.lines,
                functions: parsed
                    .extraction
                    .symbols
                    .iter()
                    .filter(|s| s.kind.is_callable())
                    .count(),
            });

            for (alias, canonical) in &parsed.extraction.aliases {
                table.add_alias(alias, canonical, parsed.language);
            }
            for symbol in parsed.extraction.symbols {
                table.add_or_merge(symbol);
            }
        }
        diagnostics.merge_conflicts = table.conflicts().to_vec();

        table.resolve_aliases(|name, language| config.should_skip(name, language));
        resolver::resolve_transitive(&mut table, config.parallel);
        diagnostics.self_cycles = cycles::break_self_cycles(&mut table);
        resolver::count_references(&mut table);

        let graph = DependencyGraph::build(&table, &config.ordering, &config.artifacts);
        let components = cycles::strongly_connected(&graph);
        let cyclic = cycles::cyclic_components(&graph, &components);
        diagnostics.cycle_count = cyclic.len();
        cycles::mark_cycles(&mut table, &cyclic);

        let ordered: Vec<OrderedSymbol> = graph
            .order_with(&components)
            .into_iter()
            .filter_map(|(key, depth)| {
                table.get(&key.name, key.language).map(|symbol| OrderedSymbol {
                    symbol: symbol.clone(),
                    depth,
                })
            })
            .collect();

        tracing::debug!(
            "Parsed {} files in {:?}, graph passes took {:?}",
            diagnostics.files_parsed,
            parse_time,
            started.elapsed() - parse_time
        );
        tracing::info!(
            "Built symbol graph for {}: {} files, {} symbols, {} ordered, {} cycles",
            root.display(),
            diagnostics.files_parsed,
            table.len(),
            ordered.len(),
            diagnostics.cycle_count
        );

        Ok(Self {
            root,
            config,
            table,
            ordered,
            file_stats,
            diagnostics,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn diagnostics(&self) -> &BuildDiagnostics {
        &self.diagnostics
    }

    pub fn file_stats(&self) -> &[FileStats] {
        &self.file_stats
    }

    // =====================================================
    // Symbol lookup
    // =====================================================

    /// Best match for `name`, preferring the primary language when both have one.
    pub fn get_symbol(&self, name: &str) -> Result<&Symbol> {
        let candidates = self.table.named(name);
        candidates
            .iter()
            .find(|s| s.language == self.config.primary_language)
            .or_else(|| candidates.first())
            .copied()
            .ok_or_else(|| GraphError::SymbolNotFound(name.to_string()))
    }

    pub fn get_symbol_in(&self, name: &str, language: SourceLanguage) -> Result<&Symbol> {
        self.table
            .get(name, language)
            .ok_or_else(|| GraphError::SymbolNotFound(format!("{} ({})", name, language)))
    }

    /// Every record called `name`, one per language at most.
    pub fn symbols_named(&self, name: &str) -> Vec<&Symbol> {
        self.table.named(name)
    }

    pub fn symbols(&self) -> &[Symbol] {
        self.table.symbols()
    }

    /// Which artifact files currently hold `name`, classified by role.
    pub fn lookup_symbol(&self, name: &str) -> SymbolInfo {
        let roles = &self.config.artifacts;
        let mut info = SymbolInfo::default();

        for symbol in self.table.named(name) {
            let files = symbol
                .declaration
                .iter()
                .chain(symbol.definition.iter())
                .map(|l| &l.file);
            for file in files {
                let slot = if roles.is_binding_file(file) {
                    &mut info.binding
                } else if has_extension(file, &roles.header_extensions) {
                    &mut info.primary_header
                } else if has_extension(file, &roles.source_extensions) {
                    &mut info.primary_source
                } else if has_extension(file, &roles.target_extensions) {
                    &mut info.target_source
                } else {
                    continue;
                };
                if slot.is_none() {
                    *slot = Some(file.clone());
                }
            }
        }

        if let Some(test_path) = roles.generated_test_path(name) {
            if self.root.join(&test_path).is_file() {
                info.generated_test = Some(test_path);
            }
        }
        info
    }

    pub fn call_graph(&self) -> &BTreeMap<SymbolKey, BTreeSet<String>> {
        self.table.call_graph()
    }

    pub fn callees(&self, name: &str, language: SourceLanguage) -> Option<&BTreeSet<String>> {
        self.table.callees(name, language)
    }

    /// Signature of `name` as found in a file called `file_name` (e.g. `ffi.rs`).
    pub fn find_signature_in(&self, file_name: &str, name: &str) -> Option<&str> {
        self.table
            .named(name)
            .into_iter()
            .find(|symbol| {
                symbol
                    .declaration
                    .iter()
                    .chain(symbol.definition.iter())
                    .any(|l| l.file.file_name().and_then(|n| n.to_str()) == Some(file_name))
            })
            .map(|symbol| symbol.signature.as_str())
    }

    // =====================================================
    // Ordering
    // =====================================================

    /// The processing order: dependencies before dependents, cyclic blocks contiguous.
    pub fn get_ordered_symbols(&self) -> Vec<&Symbol> {
        self.ordered.iter().map(|o| &o.symbol).collect()
    }

    /// The processing order with each symbol's depth.
    pub fn ordered(&self) -> &[OrderedSymbol] {
        &self.ordered
    }

    /// Every known dependency of `name` (same language), sorted the same way as the full order.
    pub fn get_topo_ordered_dependencies(&self, name: &str) -> Result<Vec<&Symbol>> {
        let symbol = self.get_symbol(name)?;
        let language = symbol.language;
        let keys = symbol
            .all_dependencies()
            .into_iter()
            .filter(|dep| *dep != symbol.name)
            .map(|dep| SymbolKey::new(dep, language));

        let subset = DependencyGraph::from_keys(&self.table, keys);
        Ok(subset
            .order()
            .into_iter()
            .filter_map(|(key, _)| self.table.get(&key.name, key.language))
            .collect())
    }

    // =====================================================
    // Source text
    // =====================================================

    /// The symbol's definition (or declaration) text, re-read from disk.
    pub fn get_source_text(&self, symbol: &Symbol) -> Result<String> {
        let span = symbol
            .span()
            .ok_or_else(|| GraphError::SymbolNotFound(format!("{} has no source span", symbol.name)))?;
        let bytes = self.read_span_file(&span.file)?;

        if span.start_byte > span.end_byte || span.end_byte > bytes.len() {
            return Err(GraphError::SymbolNotFound(format!(
                "{} is out of range in {}",
                symbol.name,
                span.file.display()
            )));
        }
        Ok(String::from_utf8_lossy(&bytes[span.start_byte..span.end_byte]).into_owned())
    }

    /// The symbol's lines widened by `before`/`after` lines of context.
    pub fn get_source_context(&self, symbol: &Symbol, before: usize, after: usize) -> Result<String> {
        let span = symbol
            .span()
            .ok_or_else(|| GraphError::SymbolNotFound(format!("{} has no source span", symbol.name)))?;
        let bytes = self.read_span_file(&span.file)?;
        let text = String::from_utf8_lossy(&bytes);
        let lines: Vec<&str> = text.lines().collect();

        let start = (span.start_line as usize).saturating_sub(1);
        // spans of line-terminated nodes (macros) end at column 0 of the next line
        let end = (span.end_line as usize).min(lines.len());
        if start >= lines.len() {
            return Err(GraphError::SymbolNotFound(format!(
                "{} is out of range in {}",
                symbol.name,
                span.file.display()
            )));
        }

        let from = start.saturating_sub(before);
        let to = (end + after).min(lines.len());
        Ok(lines[from..to].join("\n"))
    }

    fn read_span_file(&self, relative: &Path) -> Result<Vec<u8>> {
        let path = self.root.join(relative);
        if !path.is_file() {
            return Err(GraphError::FileNotFound(relative.display().to_string()));
        }
        Ok(std::fs::read(path)?)
    }

    // =====================================================
    // Reports
    // =====================================================

    pub fn generate_repo_map(&self) -> String {
        report::repo_map(self.table.iter())
    }

    pub fn dependency_report(&self) -> String {
        report::dependency_report(&self.ordered, &self.file_stats)
    }
}

fn validate_root(root: &Path) -> Result<PathBuf> {
    if !root.is_absolute() {
        return Err(GraphError::InvalidRoot(format!(
            "{} is not an absolute path",
            root.display()
        )));
    }
    if !root.exists() {
        return Err(GraphError::InvalidRoot(format!("{} does not exist", root.display())));
    }
    if !root.is_dir() {
        return Err(GraphError::InvalidRoot(format!(
            "{} is not a directory",
            root.display()
        )));
    }
    Ok(root.to_path_buf())
}

fn process_file(
    parser: &Parser,
    extractor: &SymbolExtractor<'_>,
    root: &Path,
    path: &Path,
) -> std::result::Result<ParsedOutcome, SkippedFile> {
    let relative = path.strip_prefix(root).unwrap_or(path).to_path_buf();
    let parsed = parser.parse_file(path).map_err(|e| SkippedFile {
        path: relative.clone(),
        reason: e.to_string(),
    })?;

    let extraction = extractor.extract(&parsed, &relative);
    Ok(ParsedOutcome {
        lines: parsed.source.lines().count(),
        language: parsed.language,
        path: relative,
        extraction,
    })
}
