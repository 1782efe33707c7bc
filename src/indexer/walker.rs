use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use crate::config::GraphConfig;
use crate::error::Result;
use crate::index::SourceLanguage;
use crate::languages::LanguageRegistry;

enum ExcludeRule {
    Glob(glob::Pattern),
    Substring(String),
}

impl ExcludeRule {
    fn parse(pattern: &str) -> Result<Self> {
        if pattern.contains(['*', '?', '[']) {
            Ok(ExcludeRule::Glob(glob::Pattern::new(pattern)?))
        } else {
            Ok(ExcludeRule::Substring(pattern.to_string()))
        }
    }

    fn matches(&self, relative: &str) -> bool {
        match self {
            ExcludeRule::Glob(p) => p.matches(relative),
            ExcludeRule::Substring(s) => relative.contains(s.as_str()),
        }
    }
}

/// Walks a project root and pairs every source file with its language.
pub struct FileWalker {
    registry: LanguageRegistry,
    excludes: Vec<ExcludeRule>,
    respect_gitignore: bool,
    include_hidden: bool,
}

impl FileWalker {
    pub fn new(config: &GraphConfig) -> Result<Self> {
        let excludes = config
            .excludes
            .iter()
            .map(|p| ExcludeRule::parse(p))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            registry: LanguageRegistry::new(config),
            excludes,
            respect_gitignore: config.respect_gitignore,
            include_hidden: config.include_hidden,
        })
    }

    /// Absolute paths, sorted, so downstream merging is deterministic.
    pub fn walk(&self, root: &Path) -> Result<Vec<(PathBuf, SourceLanguage)>> {
        let mut files = Vec::new();

        let walker = WalkBuilder::new(root)
            .hidden(!self.include_hidden)
            .git_ignore(self.respect_gitignore)
            .git_global(self.respect_gitignore)
            .git_exclude(self.respect_gitignore)
            .ignore(self.respect_gitignore)
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                    continue;
                }
            };
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(language) = self.registry.language_for_file(path) else {
                continue;
            };
            if self.is_excluded(root, path) {
                tracing::debug!("Excluded {}", path.display());
                continue;
            }
            files.push((path.to_path_buf(), language));
        }

        files.sort();
        Ok(files)
    }

    pub fn is_excluded(&self, root: &Path, path: &Path) -> bool {
        let relative = path.strip_prefix(root).unwrap_or(path);
        let relative = relative.to_string_lossy();
        self.excludes.iter().any(|rule| rule.matches(&relative))
    }

    pub fn is_supported(&self, path: &Path) -> bool {
        self.registry.language_for_file(path).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::TempDir;

    fn create_walker() -> FileWalker {
        FileWalker::new(&GraphConfig::default()).unwrap()
    }

    fn walker_excluding(patterns: &[&str]) -> FileWalker {
        let config = GraphConfig {
            excludes: patterns.iter().map(|s| s.to_string()).collect(),
            ..GraphConfig::default()
        };
        FileWalker::new(&config).unwrap()
    }

    fn create_file(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut file = File::create(path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    fn names(files: &[(PathBuf, SourceLanguage)], root: &Path) -> Vec<String> {
        files
            .iter()
            .map(|(p, _)| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn test_walk_classifies_languages() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "src/tree.c", "int x;");
        create_file(temp_dir.path(), "src/tree.h", "int y;");
        create_file(temp_dir.path(), "rust/src/lib.rs", "fn f() {}");
        create_file(temp_dir.path(), "README.md", "# readme");

        let files = create_walker().walk(temp_dir.path()).unwrap();

        assert_eq!(files.len(), 3);
        let rust: Vec<_> = files.iter().filter(|(_, l)| *l == SourceLanguage::Rust).collect();
        assert_eq!(rust.len(), 1);
    }

    #[test]
    fn test_walk_is_sorted() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "b.c", "");
        create_file(temp_dir.path(), "a.h", "");
        create_file(temp_dir.path(), "sub/c.c", "");

        let files = create_walker().walk(temp_dir.path()).unwrap();
        assert_eq!(names(&files, temp_dir.path()), vec!["a.h", "b.c", "sub/c.c"]);
    }

    #[test]
    fn test_walk_substring_exclude() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "src/png/decode.c", "");
        create_file(temp_dir.path(), "src/zlib.c", "");

        let files = walker_excluding(&["png"]).walk(temp_dir.path()).unwrap();
        assert_eq!(names(&files, temp_dir.path()), vec!["src/zlib.c"]);
    }

    #[test]
    fn test_walk_glob_exclude() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "src/main.c", "");
        create_file(temp_dir.path(), "tests/test_main.c", "");
        create_file(temp_dir.path(), "rust/fuzz/fuzz_targets/fuzz_a.rs", "");

        let files = walker_excluding(&["tests/*", "rust/fuzz/**"])
            .walk(temp_dir.path())
            .unwrap();
        assert_eq!(names(&files, temp_dir.path()), vec!["src/main.c"]);
    }

    #[test]
    fn test_invalid_glob_is_config_error() {
        let config = GraphConfig {
            excludes: vec!["src/[".to_string()],
            ..GraphConfig::default()
        };
        assert!(FileWalker::new(&config).is_err());
    }

    #[test]
    fn test_walk_hidden_files_ignored() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "visible.c", "");
        create_file(temp_dir.path(), ".hidden.c", "");

        let files = create_walker().walk(temp_dir.path()).unwrap();
        assert_eq!(names(&files, temp_dir.path()), vec!["visible.c"]);
    }

    #[test]
    fn test_walk_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        let files = create_walker().walk(temp_dir.path()).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_is_supported() {
        let walker = create_walker();
        assert!(walker.is_supported(Path::new("deflate.c")));
        assert!(walker.is_supported(Path::new("deflate.h")));
        assert!(walker.is_supported(Path::new("src/lib.rs")));
        assert!(!walker.is_supported(Path::new("main.cpp")));
        assert!(!walker.is_supported(Path::new("Makefile")));
    }
}
