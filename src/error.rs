use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TokenSniffError {
    #[error("Failed to read file: {path}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid glob pattern: {pattern}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("Failed to fix {path}: {passes} passes without reaching a stable state")]
    FixerNonConvergence { path: PathBuf, passes: u32 },

    #[error("Unknown sniff code: {0}")]
    UnknownSniff(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    JsonSerialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TokenSniffError>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
