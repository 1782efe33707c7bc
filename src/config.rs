//! Engine configuration.
//!
//! Everything that is a project convention rather than an engine invariant lives
//! here: extension mapping, excludes, the built-in type denylist, the ordering
//! policy and the artifact role table used by `lookup_symbol`.
//!
//! Format (`.symbol-graph.yml` at the project root, every key optional):
//! ```yaml
//! languages:
//!   c: [c, h]
//!   rust: [rs]
//! excludes:
//!   - png
//!   - "third_party/**"
//! ordering:
//!   language: c
//!   include_static: false
//! artifacts:
//!   binding_file_names: [ffi.rs]
//!   generated_test_pattern: "rust/fuzz/fuzz_targets/fuzz_{name}.rs"
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};
use crate::index::{SourceLanguage, SymbolKind};

/// Name of the optional config file looked up at the project root
pub const CONFIG_FILENAME: &str = ".symbol-graph.yml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Language -> file extensions (without the dot)
    pub languages: BTreeMap<SourceLanguage, Vec<String>>,

    /// Substring or glob patterns matched against root-relative paths
    pub excludes: Vec<String>,

    pub respect_gitignore: bool,
    pub include_hidden: bool,

    /// Names never recorded as dependencies, per language
    pub builtin_types: BTreeMap<SourceLanguage, BTreeSet<String>>,

    /// Names shorter than this are treated as noise, per language
    pub min_name_len: BTreeMap<SourceLanguage, usize>,

    /// Preferred language when a name exists in both
    pub primary_language: SourceLanguage,

    pub ordering: OrderingPolicy,
    pub artifacts: ArtifactRoles,

    /// Record `typedef T *TPtr;` as an alias of `T` instead of a symbol
    pub collapse_pointer_typedefs: bool,

    /// Parse files on the rayon pool
    pub parallel: bool,
}

/// Which symbols take part in the topological order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderingPolicy {
    pub language: SourceLanguage,
    pub kinds: Vec<SymbolKind>,
    pub include_static: bool,
    /// Definitions shorter than this are left out unless declared in a header.
    pub min_line_count: u32,
}

/// Path conventions used to classify where a symbol lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactRoles {
    pub header_extensions: Vec<String>,
    pub source_extensions: Vec<String>,
    pub target_extensions: Vec<String>,
    pub binding_file_names: Vec<String>,
    /// Root-relative path template; `{name}` is replaced by the symbol name.
    pub generated_test_pattern: Option<String>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        let mut languages = BTreeMap::new();
        languages.insert(SourceLanguage::C, strings(&["c", "h"]));
        languages.insert(SourceLanguage::Rust, strings(&["rs"]));

        let mut builtin_types = BTreeMap::new();
        builtin_types.insert(SourceLanguage::C, strings(DEFAULT_C_BUILTINS).into_iter().collect());
        builtin_types.insert(
            SourceLanguage::Rust,
            strings(DEFAULT_RUST_BUILTINS).into_iter().collect(),
        );

        // single letters are real type names in C but generic parameters in Rust
        let mut min_name_len = BTreeMap::new();
        min_name_len.insert(SourceLanguage::C, 1);
        min_name_len.insert(SourceLanguage::Rust, 2);

        Self {
            languages,
            excludes: Vec::new(),
            respect_gitignore: true,
            include_hidden: false,
            builtin_types,
            min_name_len,
            primary_language: SourceLanguage::C,
            ordering: OrderingPolicy::default(),
            artifacts: ArtifactRoles::default(),
            collapse_pointer_typedefs: true,
            parallel: true,
        }
    }
}

impl Default for OrderingPolicy {
    fn default() -> Self {
        Self {
            language: SourceLanguage::C,
            kinds: vec![
                SymbolKind::Function,
                SymbolKind::Struct,
                SymbolKind::Enum,
                SymbolKind::Typedef,
                SymbolKind::Const,
            ],
            include_static: false,
            min_line_count: 0,
        }
    }
}

impl Default for ArtifactRoles {
    fn default() -> Self {
        Self {
            header_extensions: strings(&["h"]),
            source_extensions: strings(&["c"]),
            target_extensions: strings(&["rs"]),
            binding_file_names: strings(&["ffi.rs"]),
            generated_test_pattern: Some("rust/fuzz/fuzz_targets/fuzz_{name}.rs".to_string()),
        }
    }
}

impl ArtifactRoles {
    pub fn generated_test_path(&self, symbol_name: &str) -> Option<PathBuf> {
        self.generated_test_pattern
            .as_ref()
            .map(|p| PathBuf::from(p.replace("{name}", symbol_name)))
    }

    pub fn is_binding_file(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .map(|n| self.binding_file_names.iter().any(|b| b == n))
            .unwrap_or(false)
    }
}

impl GraphConfig {
    /// Loads a config file; missing keys fall back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: GraphConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Uses `.symbol-graph.yml` from `root` when it exists, defaults otherwise.
    pub fn discover(root: &Path) -> Result<Self> {
        let candidate = root.join(CONFIG_FILENAME);
        if candidate.is_file() {
            tracing::debug!("Loading config from {}", candidate.display());
            Self::load(&candidate)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen: BTreeMap<&str, SourceLanguage> = BTreeMap::new();
        for (language, extensions) in &self.languages {
            if extensions.is_empty() {
                return Err(GraphError::Config(format!(
                    "no file extensions configured for {}",
                    language
                )));
            }
            for ext in extensions {
                let ext = ext.as_str();
                if let Some(previous) = seen.insert(ext, *language) {
                    if previous != *language {
                        return Err(GraphError::Config(format!(
                            "extension '{}' mapped to both {} and {}",
                            ext, previous, language
                        )));
                    }
                }
            }
        }
        if self.ordering.kinds.is_empty() {
            return Err(GraphError::Config("ordering.kinds is empty".to_string()));
        }
        Ok(())
    }

    pub fn language_for_extension(&self, ext: &str) -> Option<SourceLanguage> {
        self.languages
            .iter()
            .find(|(_, exts)| exts.iter().any(|e| e == ext))
            .map(|(lang, _)| *lang)
    }

    pub fn is_header(&self, path: &Path) -> bool {
        crate::index::models::has_extension(path, &self.artifacts.header_extensions)
    }

    /// Built-ins, keywords, `__x__` macros and too-short names are never dependencies.
    pub fn should_skip(&self, name: &str, language: SourceLanguage) -> bool {
        let min_len = self.min_name_len.get(&language).copied().unwrap_or(1);
        if name.is_empty() || name.len() < min_len {
            return true;
        }
        if name.starts_with("__") && name.ends_with("__") {
            return true;
        }
        self.builtin_types
            .get(&language)
            .map(|set| set.contains(name))
            .unwrap_or(false)
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

const DEFAULT_C_BUILTINS: &[&str] = &[
    // types
    "int", "char", "float", "double", "void", "short", "long", "signed", "unsigned",
    "size_t", "ssize_t", "ptrdiff_t", "wchar_t", "bool", "_Bool", "FILE", "va_list",
    "int8_t", "int16_t", "int32_t", "int64_t", "uint8_t", "uint16_t", "uint32_t", "uint64_t",
    "intptr_t", "uintptr_t",
    // keywords and library macros that parse like calls
    "assert", "sizeof", "auto", "break", "case", "const", "continue", "default", "do",
    "else", "enum", "extern", "for", "goto", "if", "inline", "register", "restrict",
    "return", "static", "struct", "switch", "typedef", "union", "volatile", "while",
    "va_start", "va_end", "va_arg",
];

const DEFAULT_RUST_BUILTINS: &[&str] = &[
    "i8", "i16", "i32", "i64", "i128", "isize", "u8", "u16", "u32", "u64", "u128", "usize",
    "f32", "f64", "bool", "char", "str", "String", "Vec", "Option", "Result", "Box", "Rc",
    "Arc", "Cell", "RefCell", "Self", "Some", "None", "Ok", "Err",
    "c_int", "c_uint", "c_char", "c_uchar", "c_long", "c_ulong", "c_short", "c_ushort",
    "c_double", "c_float", "c_void", "size_t",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = GraphConfig::default();
        config.validate().unwrap();
        assert_eq!(config.language_for_extension("h"), Some(SourceLanguage::C));
        assert_eq!(config.language_for_extension("rs"), Some(SourceLanguage::Rust));
        assert_eq!(config.language_for_extension("py"), None);
    }

    #[test]
    fn test_yaml_overrides_and_defaults() {
        let yaml = r#"
excludes:
  - png
ordering:
  include_static: true
artifacts:
  binding_file_names: [bindings.rs]
"#;
        let config = GraphConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.excludes, vec!["png".to_string()]);
        assert!(config.ordering.include_static);
        assert_eq!(config.ordering.language, SourceLanguage::C);
        assert!(config.artifacts.is_binding_file(Path::new("src/bindings.rs")));
        assert!(!config.artifacts.is_binding_file(Path::new("src/ffi.rs")));
        assert!(config.languages.contains_key(&SourceLanguage::Rust));
    }

    #[test]
    fn test_yaml_min_name_len_per_language() {
        let config = GraphConfig::from_yaml("min_name_len:\n  c: 3\n").unwrap();
        assert!(config.should_skip("ab", SourceLanguage::C));
        assert!(!config.should_skip("abc", SourceLanguage::C));
        // languages left out fall back to keeping every non-empty name
        assert!(!config.should_skip("T", SourceLanguage::Rust));
    }

    #[test]
    fn test_yaml_kinds_use_kebab_case() {
        let yaml = "ordering:\n  kinds: [struct, type-alias, foreign-function]\n";
        let config = GraphConfig::from_yaml(yaml).unwrap();
        assert_eq!(
            config.ordering.kinds,
            vec![SymbolKind::Struct, SymbolKind::TypeAlias, SymbolKind::ForeignFunction]
        );
    }

    #[test]
    fn test_extension_collision_rejected() {
        let yaml = "languages:\n  c: [c, h]\n  rust: [rs, h]\n";
        let err = GraphConfig::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, GraphError::Config(_)));
    }

    #[test]
    fn test_empty_extension_list_rejected() {
        let yaml = "languages:\n  c: []\n";
        assert!(GraphConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_should_skip() {
        let config = GraphConfig::default();
        assert!(config.should_skip("int", SourceLanguage::C));
        assert!(config.should_skip("u8", SourceLanguage::Rust));
        assert!(!config.should_skip("A", SourceLanguage::C));
        assert!(config.should_skip("T", SourceLanguage::Rust));
        assert!(config.should_skip("__attribute__", SourceLanguage::C));
        assert!(!config.should_skip("Node", SourceLanguage::C));
        // denylists are per language
        assert!(!config.should_skip("Vec", SourceLanguage::C));
    }

    #[test]
    fn test_generated_test_path() {
        let roles = ArtifactRoles::default();
        assert_eq!(
            roles.generated_test_path("ZopfliDeflate"),
            Some(PathBuf::from("rust/fuzz/fuzz_targets/fuzz_ZopfliDeflate.rs"))
        );
    }

    #[test]
    fn test_discover_without_file_uses_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = GraphConfig::discover(dir.path()).unwrap();
        assert!(config.parallel);
    }

    #[test]
    fn test_discover_reads_root_file() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILENAME), "parallel: false\n").unwrap();
        let config = GraphConfig::discover(dir.path()).unwrap();
        assert!(!config.parallel);
    }
}
