use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// =====================================================
// Languages and kinds
// =====================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceLanguage {
    C,
    Rust,
}

impl SourceLanguage {
    pub const ALL: [SourceLanguage; 2] = [SourceLanguage::C, SourceLanguage::Rust];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceLanguage::C => "c",
            SourceLanguage::Rust => "rust",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "c" => Some(SourceLanguage::C),
            "rust" | "rs" => Some(SourceLanguage::Rust),
            _ => None,
        }
    }
}

impl fmt::Display for SourceLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SymbolKind {
    Function,
    Struct,
    Enum,
    Typedef,
    TypeAlias,
    Const,
    Static,
    Impl,
    ForeignFunction,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Struct => "struct",
            SymbolKind::Enum => "enum",
            SymbolKind::Typedef => "typedef",
            SymbolKind::TypeAlias => "type-alias",
            SymbolKind::Const => "const",
            SymbolKind::Static => "static",
            SymbolKind::Impl => "impl",
            SymbolKind::ForeignFunction => "foreign-function",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "function" => Some(SymbolKind::Function),
            "struct" => Some(SymbolKind::Struct),
            "enum" => Some(SymbolKind::Enum),
            "typedef" => Some(SymbolKind::Typedef),
            "type-alias" | "type_alias" | "type" => Some(SymbolKind::TypeAlias),
            "const" => Some(SymbolKind::Const),
            "static" => Some(SymbolKind::Static),
            "impl" => Some(SymbolKind::Impl),
            "foreign-function" | "ffi_function" => Some(SymbolKind::ForeignFunction),
            _ => None,
        }
    }

    /// Kinds whose call sites are recorded in the call graph.
    pub fn is_callable(&self) -> bool {
        matches!(self, SymbolKind::Function | SymbolKind::ForeignFunction)
    }

    /// Two records with these kinds describe the same logical entity.
    ///
    /// A binding (`foreign-function`) and its declared counterpart collapse into one.
    pub fn is_compatible(&self, other: SymbolKind) -> bool {
        *self == other || (self.is_callable() && other.is_callable())
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =====================================================
// Locations
// =====================================================

/// A file (relative to the project root) and a 1-based line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: PathBuf,
    pub line: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<PathBuf>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.line)
    }
}

/// Byte and line extent of a declaration inside a file.
///
/// Stored instead of a parse-tree node so the tree can be dropped after extraction;
/// the text is re-read from disk on demand.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceSpan {
    pub file: PathBuf,
    pub start_byte: usize,
    pub end_byte: usize,
    /// 1-based, inclusive
    pub start_line: u32,
    /// 1-based, inclusive
    pub end_line: u32,
}

impl SourceSpan {
    pub fn line_count(&self) -> u32 {
        self.end_line.saturating_sub(self.start_line) + 1
    }
}

// =====================================================
// Symbol
// =====================================================

/// A named program entity extracted from C or Rust source.
///
/// Identity is `(name, kind, language)`; every other field is an attribute that
/// the merge step and the graph passes fill in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub language: SourceLanguage,
    pub signature: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub declaration: Option<SourceLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition: Option<SourceLocation>,
    #[serde(skip)]
    pub declaration_span: Option<SourceSpan>,
    #[serde(skip)]
    pub definition_span: Option<SourceSpan>,

    pub type_deps: BTreeSet<String>,
    pub call_deps: BTreeSet<String>,
    /// Indirectly reachable names only; never repeats a direct dependency.
    pub transitive_deps: BTreeSet<String>,

    pub is_cycle: bool,
    pub is_static: bool,
    pub line_count: u32,
    pub reference_count: u32,
}

impl Symbol {
    pub fn new(
        name: impl Into<String>,
        kind: SymbolKind,
        language: SourceLanguage,
        signature: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            language,
            signature: signature.into(),
            declaration: None,
            definition: None,
            declaration_span: None,
            definition_span: None,
            type_deps: BTreeSet::new(),
            call_deps: BTreeSet::new(),
            transitive_deps: BTreeSet::new(),
            is_cycle: false,
            is_static: false,
            line_count: 0,
            reference_count: 0,
        }
    }

    pub fn with_declaration(mut self, location: SourceLocation, span: SourceSpan) -> Self {
        self.declaration = Some(location);
        self.declaration_span = Some(span);
        self
    }

    pub fn with_definition(mut self, location: SourceLocation, span: SourceSpan) -> Self {
        self.definition = Some(location);
        self.definition_span = Some(span);
        self
    }

    pub fn with_type_deps(mut self, deps: BTreeSet<String>) -> Self {
        self.type_deps = deps;
        self
    }

    pub fn with_call_deps(mut self, deps: BTreeSet<String>) -> Self {
        self.call_deps = deps;
        self
    }

    pub fn with_static(mut self, is_static: bool) -> Self {
        self.is_static = is_static;
        self
    }

    pub fn with_line_count(mut self, line_count: u32) -> Self {
        self.line_count = line_count;
        self
    }

    pub fn identity(&self) -> (&str, SymbolKind, SourceLanguage) {
        (&self.name, self.kind, self.language)
    }

    /// `type_deps ∪ call_deps ∪ transitive_deps`
    pub fn all_dependencies(&self) -> BTreeSet<String> {
        self.type_deps
            .iter()
            .chain(&self.call_deps)
            .chain(&self.transitive_deps)
            .cloned()
            .collect()
    }

    /// `type_deps ∪ call_deps`
    pub fn direct_dependencies(&self) -> BTreeSet<String> {
        self.type_deps.iter().chain(&self.call_deps).cloned().collect()
    }

    pub fn depends_on(&self, name: &str) -> bool {
        self.type_deps.contains(name)
            || self.call_deps.contains(name)
            || self.transitive_deps.contains(name)
    }

    /// Drops `name` from every dependency set; returns whether it was present.
    pub fn remove_dependency(&mut self, name: &str) -> bool {
        let a = self.type_deps.remove(name);
        let b = self.call_deps.remove(name);
        let c = self.transitive_deps.remove(name);
        a || b || c
    }

    /// Definition location if present, else the declaration.
    pub fn location(&self) -> Option<&SourceLocation> {
        self.definition.as_ref().or(self.declaration.as_ref())
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.location().map(|l| l.file.as_path())
    }

    pub fn line_number(&self) -> Option<u32> {
        self.location().map(|l| l.line)
    }

    /// Span used for text extraction: the definition when known.
    pub fn span(&self) -> Option<&SourceSpan> {
        self.definition_span.as_ref().or(self.declaration_span.as_ref())
    }

    pub fn is_declared_in(&self, extensions: &[String]) -> bool {
        self.declaration
            .as_ref()
            .map(|l| has_extension(&l.file, extensions))
            .unwrap_or(false)
    }

    /// Folds a second occurrence of the same entity into this record.
    ///
    /// Callers check [`SymbolKind::is_compatible`] first. Locations are only filled
    /// when empty, dependency sets are unioned, `is_static` is OR-ed, `line_count`
    /// takes the max and `reference_count` the sum.
    pub fn merge_from(&mut self, other: Symbol) {
        if self.kind == SymbolKind::ForeignFunction && other.kind == SymbolKind::Function {
            self.kind = SymbolKind::Function;
        }

        if self.declaration.is_none() && other.declaration.is_some() {
            self.declaration = other.declaration;
            self.declaration_span = other.declaration_span;
        }
        if self.definition.is_none() && other.definition.is_some() {
            self.definition = other.definition;
            self.definition_span = other.definition_span;
            // definitions carry the body, so their signature is the more complete one
            if !other.signature.is_empty() {
                self.signature = other.signature.clone();
            }
        }
        if self.signature.is_empty() {
            self.signature = other.signature;
        }

        self.type_deps.extend(other.type_deps);
        self.call_deps.extend(other.call_deps);
        self.transitive_deps.extend(other.transitive_deps);

        self.is_cycle |= other.is_cycle;
        self.is_static |= other.is_static;
        self.line_count = self.line_count.max(other.line_count);
        self.reference_count += other.reference_count;
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for Symbol {}

impl std::hash::Hash for Symbol {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

/// Table key: one record per name and language.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolKey {
    pub name: String,
    pub language: SourceLanguage,
}

impl SymbolKey {
    pub fn new(name: impl Into<String>, language: SourceLanguage) -> Self {
        Self {
            name: name.into(),
            language,
        }
    }
}

impl From<&Symbol> for SymbolKey {
    fn from(symbol: &Symbol) -> Self {
        SymbolKey::new(symbol.name.clone(), symbol.language)
    }
}

// =====================================================
// Derived projections
// =====================================================

/// Which artifact files currently contain a symbol, by role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_header: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_source: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binding: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_source: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_test: Option<PathBuf>,
}

impl SymbolInfo {
    pub fn is_empty(&self) -> bool {
        self.primary_header.is_none()
            && self.primary_source.is_none()
            && self.binding.is_none()
            && self.target_source.is_none()
            && self.generated_test.is_none()
    }
}

/// One entry of the processing order.
#[derive(Debug, Clone, Serialize)]
pub struct OrderedSymbol {
    pub symbol: Symbol,
    /// Longest dependency chain below this symbol within the ordering subset.
    pub depth: u32,
}

/// A kind-incompatible duplicate that the merge step ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeConflict {
    pub name: String,
    pub language: SourceLanguage,
    pub existing_kind: SymbolKind,
    pub ignored_kind: SymbolKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Aggregate counters for a build; parse and merge problems are swallowed,
/// so this is how callers detect a degraded graph.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildDiagnostics {
    pub files_scanned: usize,
    pub files_parsed: usize,
    pub files_skipped: usize,
    pub files_with_syntax_errors: usize,
    pub symbols_extracted: usize,
    pub symbols_dropped: usize,
    pub self_cycles: usize,
    pub cycle_count: usize,
    pub merge_conflicts: Vec<MergeConflict>,
    pub skipped_files: Vec<SkippedFile>,
}

impl BuildDiagnostics {
    pub fn is_degraded(&self) -> bool {
        self.files_skipped > 0 || !self.merge_conflicts.is_empty()
    }
}

pub(crate) fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.iter().any(|x| x == e))
        .unwrap_or(false)
}
