//! Error types for phraseboard
//!
//! Uses thiserror for ergonomic error definitions. Validation failures in
//! the phrase store are NOT represented here; they are structured
//! `SaveResult` values the caller branches on (see `store::SaveError`).
//! These types cover the infrastructure failures: persistence, image
//! blobs, and haptics.

use thiserror::Error;

/// Top-level error type for the phraseboard library
///
/// Haptic failures stay out of this enum: the engine logs and swallows
/// them at the call site, so they never cross a `Result` boundary.
#[derive(Error, Debug)]
pub enum PhraseboardError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Image blob error: {0}")]
    Blob(#[from] BlobError),
}

/// Errors from the persistent key-value backend
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to read key '{key}': {reason}")]
    ReadFailed { key: String, reason: String },

    #[error("Failed to write key '{key}': {reason}")]
    WriteFailed { key: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialize(String),
}

/// Errors from the image blob store
#[derive(Error, Debug)]
pub enum BlobError {
    #[error("Image source not found: '{0}'")]
    SourceMissing(String),

    #[error("Failed to persist image from '{source_uri}': {reason}")]
    CopyFailed { source_uri: String, reason: String },

    #[error("Blob storage directory unavailable: {0}")]
    DirUnavailable(String),
}

/// Errors from the haptic feedback device
///
/// The activation engine logs and swallows these; they never stop a press
/// from progressing or completing.
#[derive(Error, Debug)]
pub enum HapticError {
    #[error("Haptic feedback unavailable: {0}")]
    Unavailable(String),
}

/// Result type alias using PhraseboardError
pub type Result<T> = std::result::Result<T, PhraseboardError>;
