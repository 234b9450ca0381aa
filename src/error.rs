//! Error types.

use thiserror::Error;

/// Errors raised while distilling a file.
#[derive(Debug, Error)]
pub enum DistillError {
    #[error("no extractor for {path}")]
    UnsupportedLanguage { path: String },

    #[error("failed to parse {path}: {message}")]
    ParseFailure { path: String, message: String },

    #[error("grammar version mismatch: {0}")]
    Grammar(#[from] tree_sitter::LanguageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DistillError {
    pub fn parse_failure(path: impl Into<String>, message: impl Into<String>) -> Self {
        DistillError::ParseFailure {
            path: path.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DistillError>;
