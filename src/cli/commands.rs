use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use symbol_graph::{GraphConfig, SourceLanguage, SourceMap, Symbol};

#[derive(Parser)]
#[command(name = "symbol-graph")]
#[command(about = "Cross-language symbol dependency graph and processing order for C/Rust trees")]
#[command(version)]
#[command(after_long_help = r#"
EXAMPLES:
    # Print the processing order of the current tree as CSV
    symbol-graph order .

    # Same, as JSON, with an explicit config file
    symbol-graph order ./zopfli --config port.yml --format json

    # Show one symbol, where it lives and its source
    symbol-graph show . ZopfliDeflate --language c

    # Markdown overview of every file
    symbol-graph map .

    # Build diagnostics (skipped files, merge conflicts, cycles)
    symbol-graph stats .
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the dependency-ordered symbol report
    Order {
        /// Project root
        #[arg(default_value = ".")]
        root: PathBuf,

        /// Config file (defaults to <root>/.symbol-graph.yml when present)
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long, value_enum, default_value = "csv")]
        format: ReportFormat,
    },
    /// Show a symbol, its artifact locations and its source text
    Show {
        root: PathBuf,

        name: String,

        /// Disambiguate when both languages define the name (c, rust)
        #[arg(long)]
        language: Option<String>,

        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print a Markdown map of the tree
    Map {
        #[arg(default_value = ".")]
        root: PathBuf,

        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print build diagnostics
    Stats {
        #[arg(default_value = ".")]
        root: PathBuf,

        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ReportFormat {
    Csv,
    Json,
}

fn open(root: &Path, config: Option<&PathBuf>) -> Result<SourceMap> {
    let root = std::fs::canonicalize(root)
        .with_context(|| format!("Cannot resolve project root {}", root.display()))?;

    let map = match config {
        Some(path) => {
            let config = GraphConfig::load(path)
                .with_context(|| format!("Cannot load config {}", path.display()))?;
            SourceMap::with_config(&root, config)?
        }
        None => SourceMap::new(&root)?,
    };
    Ok(map)
}

pub fn print_order(root: &Path, config: Option<&PathBuf>, format: ReportFormat) -> Result<()> {
    let map = open(root, config)?;
    match format {
        ReportFormat::Csv => print!("{}", map.dependency_report()),
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(map.ordered())?),
    }
    Ok(())
}

pub fn show_symbol(
    root: &Path,
    name: &str,
    language: Option<&str>,
    config: Option<&PathBuf>,
) -> Result<()> {
    let map = open(root, config)?;

    let symbol = match language {
        Some(lang) => {
            let Some(language) = SourceLanguage::from_str(lang) else {
                bail!("Unknown language '{}', expected c or rust", lang);
            };
            map.get_symbol_in(name, language)?
        }
        None => {
            let matches = map.symbols_named(name);
            if matches.len() > 1 {
                eprintln!(
                    "'{}' exists in {} languages, showing {}; use --language to choose",
                    name,
                    matches.len(),
                    map.config().primary_language
                );
            }
            map.get_symbol(name)?
        }
    };

    print_symbol(symbol);

    let info = map.lookup_symbol(name);
    if !info.is_empty() {
        println!("\nArtifacts:");
        println!("{}", serde_json::to_string_pretty(&info)?);
    }

    match map.get_source_text(symbol) {
        Ok(text) => println!("\nSource:\n{}", text),
        Err(e) => eprintln!("Source unavailable: {}", e),
    }
    Ok(())
}

fn print_symbol(symbol: &Symbol) {
    println!("{} ({}, {})", symbol.name, symbol.kind, symbol.language);
    if let Some(decl) = &symbol.declaration {
        println!("  declared: {}", decl);
    }
    if let Some(def) = &symbol.definition {
        println!("  defined:  {}", def);
    }
    if !symbol.signature.is_empty() {
        println!("  signature: {}", symbol.signature.replace('\n', " "));
    }

    let mut flags = Vec::new();
    if symbol.is_cycle {
        flags.push("cycle");
    }
    if symbol.is_static {
        flags.push("static");
    }
    if !flags.is_empty() {
        println!("  flags: {}", flags.join(", "));
    }
    println!("  referenced by: {}", symbol.reference_count);

    let direct: Vec<String> = symbol.direct_dependencies().into_iter().collect();
    if !direct.is_empty() {
        println!("  depends on: {}", direct.join(", "));
    }
    if !symbol.transitive_deps.is_empty() {
        let transitive: Vec<&str> = symbol.transitive_deps.iter().map(String::as_str).collect();
        println!("  indirectly: {}", transitive.join(", "));
    }
}

pub fn print_map(root: &Path, config: Option<&PathBuf>) -> Result<()> {
    let map = open(root, config)?;
    print!("{}", map.generate_repo_map());
    Ok(())
}

pub fn print_stats(root: &Path, config: Option<&PathBuf>) -> Result<()> {
    let map = open(root, config)?;
    let stats = map.diagnostics();

    println!("Build Statistics:");
    println!("  Files scanned: {}", stats.files_scanned);
    println!("  Files parsed: {}", stats.files_parsed);
    println!("  Files skipped: {}", stats.files_skipped);
    println!("  Files with syntax errors: {}", stats.files_with_syntax_errors);
    println!("  Symbols extracted: {}", stats.symbols_extracted);
    println!("  Anonymous declarations dropped: {}", stats.symbols_dropped);
    println!("  Symbols after merge: {}", map.symbols().len());
    println!("  Ordered symbols: {}", map.ordered().len());
    println!("  Self-referential symbols: {}", stats.self_cycles);
    println!("  Dependency cycles: {}", stats.cycle_count);

    if !stats.skipped_files.is_empty() {
        println!("\n  Skipped files:");
        for skipped in &stats.skipped_files {
            println!("    {}: {}", skipped.path.display(), skipped.reason);
        }
    }

    if !stats.merge_conflicts.is_empty() {
        println!("\n  Merge conflicts:");
        for conflict in &stats.merge_conflicts {
            let file = conflict
                .file
                .as_ref()
                .map(|f| f.display().to_string())
                .unwrap_or_else(|| "?".to_string());
            println!(
                "    {} ({}): kept {}, ignored {} from {}",
                conflict.name, conflict.language, conflict.existing_kind, conflict.ignored_kind, file
            );
        }
    }

    Ok(())
}
