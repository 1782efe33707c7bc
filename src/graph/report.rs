//! Text renderings of a built graph: the Markdown repo map and the CSV
//! dependency report.

use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::index::{OrderedSymbol, Symbol, SymbolKind};

const MAX_MAP_SIGNATURE: usize = 100;

/// Per-file counts collected while parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileStats {
    pub path: PathBuf,
    pub lines: usize,
    pub functions: usize,
}

/// Markdown overview: one section per file, symbols grouped by kind.
pub fn repo_map<'a>(symbols: impl IntoIterator<Item = &'a Symbol>) -> String {
    let mut by_file: BTreeMap<&Path, BTreeMap<SymbolKind, Vec<&Symbol>>> = BTreeMap::new();
    for symbol in symbols {
        if let Some(file) = symbol.file_path() {
            by_file
                .entry(file)
                .or_default()
                .entry(symbol.kind)
                .or_default()
                .push(symbol);
        }
    }

    let mut out = String::from("# Repository Map\n");
    for (file, kinds) in by_file {
        let _ = write!(out, "\n## {}\n", file.display());
        for (kind, mut symbols) in kinds {
            symbols.sort_by(|a, b| {
                a.line_number()
                    .cmp(&b.line_number())
                    .then_with(|| a.name.cmp(&b.name))
            });
            let _ = writeln!(out, "\n### {}", kind);
            for symbol in symbols {
                out.push_str(&map_entry(symbol));
            }
        }
    }
    out
}

fn map_entry(symbol: &Symbol) -> String {
    let mut line = format!(
        "- `{}` (line {}, {} deps)",
        symbol.name,
        symbol.line_number().unwrap_or(0),
        symbol.all_dependencies().len()
    );
    if symbol.is_cycle {
        line.push_str(" [CYCLE]");
    }
    if symbol.is_static {
        line.push_str(" [STATIC]");
    }
    let signature = short_signature(&symbol.signature);
    if !signature.is_empty() {
        let _ = write!(line, ": `{}`", signature);
    }
    line.push('\n');
    line
}

fn short_signature(signature: &str) -> String {
    let first = signature.lines().next().unwrap_or_default().trim();
    if first.chars().count() < MAX_MAP_SIGNATURE {
        return first.to_string();
    }
    let cut: String = first.chars().take(MAX_MAP_SIGNATURE - 4).collect();
    format!("{}...", cut.trim_end())
}

/// CSV of the processing order followed by a per-file statistics table.
pub fn dependency_report(ordered: &[OrderedSymbol], files: &[FileStats]) -> String {
    let mut out = String::from("name,kind,location,is_cycle,is_static,dependencies\n");
    for entry in ordered {
        let symbol = &entry.symbol;
        let location = symbol.location().map(|l| l.to_string()).unwrap_or_default();
        let deps: Vec<String> = symbol.direct_dependencies().into_iter().collect();
        let row = [
            csv_field(&symbol.name),
            csv_field(symbol.kind.as_str()),
            csv_field(&location),
            symbol.is_cycle.to_string(),
            symbol.is_static.to_string(),
            csv_field(&deps.join(";")),
        ];
        out.push_str(&row.join(","));
        out.push('\n');
    }

    out.push_str("\nfile,lines,functions\n");
    for stats in files {
        let _ = writeln!(
            out,
            "{},{},{}",
            csv_field(&stats.path.to_string_lossy()),
            stats.lines,
            stats.functions
        );
    }
    out
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
