pub mod extractor;
pub mod parser;
pub mod walker;

pub use extractor::{ExtractionContext, FileExtraction, SymbolExtractor};
pub use parser::{ParsedFile, Parser};
pub use walker::FileWalker;
