use std::path::PathBuf;
use thiserror::Error;

/// Failures surfaced by mutating store operations.
///
/// Read failures never appear here: an unreadable document is logged and
/// treated as an empty collection.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Validation(String),
    #[error("failed to write group document: {0}")]
    Write(#[from] std::io::Error),
    #[error("failed to encode group document: {0}")]
    Encode(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_validation(&self) -> bool {
        matches!(self, StoreError::Validation(_))
    }
}

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("source document not found: {}", .0.display())]
    MissingSource(PathBuf),
    #[error("backup IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("image exceeds the {0} byte limit")]
    TooLarge(usize),
    #[error("request body too large: {0}")]
    BodyTooLarge(String),
    #[error("malformed upload: {0}")]
    Multipart(String),
    #[error("failed to store image: {0}")]
    Io(#[from] std::io::Error),
}
