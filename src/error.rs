//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore custom della pipeline.
//!
//! ## Responsabilità:
//! - Definisce `ShrinkError` enum per categorizzare tutti gli errori possibili
//! - Definisce `FailureKind` per taggare i fallimenti per-job nel report
//! - Integra con `thiserror` per automatic error conversion
//!
//! ## Categorie di errori:
//! - `EmptyBatch` / `InvalidQuality` / `Destination`: errori di validazione,
//!   falliscono l'intera invocazione prima che parta qualsiasi job
//! - `UnsupportedFormat` / `Codec` / `OutputCollision`: errori per-job,
//!   catturati come Failure del singolo job senza abortire i fratelli
//! - `DuplicateCodec`: errore di configurazione del registry, fatale
//!   all'inizializzazione ma mai a un batch in esecuzione
//! - `Validation`: errori di configurazione generici
//! - `Io`: errori di I/O generici
//!
//! ## Esempio:
//! ```rust,ignore
//! if quality == 0 || quality > 100 {
//!     return Err(ShrinkError::InvalidQuality(quality));
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Custom error types for the shrink pipeline
#[derive(thiserror::Error, Debug)]
pub enum ShrinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Batch is empty: at least one source path is required")]
    EmptyBatch,

    #[error("Quality must be between 1 and 100, got {0}")]
    InvalidQuality(u8),

    #[error("Destination directory error: {0}")]
    Destination(String),

    #[error("Unsupported image format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Output filename collision: {0}")]
    OutputCollision(String),

    #[error("Codec already registered: {0}")]
    DuplicateCodec(String),

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Classification of a per-job failure, carried inside the batch report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    UnsupportedFormat,
    CodecError,
    OutputCollision,
    Io,
}

impl ShrinkError {
    /// Map an error to the failure kind recorded in a job result.
    ///
    /// Validation and registry errors never reach a job result, so they
    /// collapse to `CodecError` if they ever do.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            ShrinkError::UnsupportedFormat(_) => FailureKind::UnsupportedFormat,
            ShrinkError::OutputCollision(_) => FailureKind::OutputCollision,
            ShrinkError::Io(_) => FailureKind::Io,
            _ => FailureKind::CodecError,
        }
    }
}
