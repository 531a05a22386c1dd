//! # Codec Registry
//!
//! Questo modulo risolve un file sorgente nel codec capace di comprimerlo.
//!
//! ## Responsabilità:
//! - Registrazione dei codec con rilevamento duplicati (`DuplicateCodec`)
//! - Risoluzione deterministica: l'ordine di risoluzione è l'ordine di
//!   registrazione, vince il primo match — stabile e riproducibile tra run
//! - Fallback di content sniffing sui magic byte quando nessun codec
//!   matcha per estensione
//!
//! Il registry è immutabile dopo la fase di inizializzazione e viene
//! condiviso tra i worker come `Arc<CodecRegistry>`; la risoluzione è un
//! puro lookup senza side effect.

use super::{sniff_format, Codec, JpegCodec, PngCodec};
use crate::error::ShrinkError;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Ordered collection of codec strategies, first-registered-wins
#[derive(Default)]
pub struct CodecRegistry {
    codecs: Vec<Arc<dyn Codec>>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in codecs (JPEG, then PNG)
    pub fn with_default_codecs() -> Result<Self, ShrinkError> {
        let mut registry = Self::new();
        registry.register(Arc::new(JpegCodec))?;
        registry.register(Arc::new(PngCodec))?;
        Ok(registry)
    }

    /// Adds a codec. Fails with `DuplicateCodec` if a codec with the same
    /// name is already registered, keeping resolution deterministic.
    pub fn register(&mut self, codec: Arc<dyn Codec>) -> Result<(), ShrinkError> {
        if self.codecs.iter().any(|c| c.name() == codec.name()) {
            return Err(ShrinkError::DuplicateCodec(codec.name().to_string()));
        }
        debug!("Registered codec: {}", codec.name());
        self.codecs.push(codec);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }

    /// Resolves the codec for a source file.
    ///
    /// Extension matching runs first, in registration order. When no codec
    /// claims the extension, the file's magic bytes are sniffed and matched
    /// against each codec's format, again in registration order. Fails with
    /// `UnsupportedFormat` when nothing matches.
    pub async fn resolve(&self, path: &Path) -> Result<Arc<dyn Codec>, ShrinkError> {
        for codec in &self.codecs {
            if codec.matches(path) {
                return Ok(Arc::clone(codec));
            }
        }

        if let Some(format) = sniff_format(path).await {
            for codec in &self.codecs {
                if codec.sniffs(format) {
                    debug!(
                        "Resolved {} by content sniff to codec {}",
                        path.display(),
                        codec.name()
                    );
                    return Ok(Arc::clone(codec));
                }
            }
        }

        Err(ShrinkError::UnsupportedFormat(path.to_path_buf()))
    }
}
