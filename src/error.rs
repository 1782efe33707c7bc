use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config file error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid exclude pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Language not supported: {0}")]
    UnsupportedLanguage(String),

    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid project root: {0}")]
    InvalidRoot(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl GraphError {
    /// True for the typed "not found" failures callers are expected to handle.
    pub fn is_not_found(&self) -> bool {
        matches!(self, GraphError::SymbolNotFound(_) | GraphError::FileNotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;
