//! Error types for the countdown cache

use std::fmt;

#[derive(Debug)]
pub enum CacheError {
    /// Index file exists but could not be parsed. Recovered internally by
    /// falling back to an empty index; logged rather than returned.
    CorruptStore(String),
    /// Writing the index file failed; the persisted cache state can no
    /// longer be trusted.
    StoreWrite(Box<std::io::Error>),
    /// The renderer failed or timed out.
    Generation(String),
    Io(Box<std::io::Error>),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::CorruptStore(msg) => write!(f, "Corrupt index file: {}", msg),
            CacheError::StoreWrite(err) => write!(f, "Failed to write index file: {}", err),
            CacheError::Generation(msg) => write!(f, "GIF generation failed: {}", msg),
            CacheError::Io(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::StoreWrite(err) => Some(err.as_ref()),
            CacheError::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Io(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
