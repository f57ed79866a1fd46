//! Error types shared by the scan pipeline
//!
//! Only directory-walk failures and bad options abort a scan. Everything
//! else is per-file: logged with the offending path and skipped.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from decoding documents and canonical keys.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed JSON document: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("invalid canonical key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },
}

/// Errors from rewriting a document in place.
#[derive(Debug, Error)]
pub enum MutateError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("document {} is not a JSON object", .path.display())]
    NotAnObject { path: PathBuf },

    #[error("failed to serialize {}: {source}", .path.display())]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors that abort a whole scan.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to walk {}: {source}", .root.display())]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("invalid scan options: {0}")]
    InvalidOptions(String),

    #[error("failed to start scan worker: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("scan worker panicked")]
    WorkerPanicked,
}
