use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("File not found")]
    NotFound,

    #[error("Invalid stored name: {0:?}")]
    InvalidName(String),
}

/// Metadata about a stored file
#[derive(Debug, Clone)]
pub struct ObjectMeta {
    pub size: u64,
}
