//! # Pipeline Options Module
//!
//! Questo modulo gestisce la configurazione della pipeline.
//!
//! ## Responsabilità:
//! - Definisce la struct `PipelineOptions` con tutti i parametri del batch
//! - Fornisce validazione dei parametri con errori tipizzati
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Fornisce valori di default sensati
//!
//! ## Parametri:
//! - `quality`: Qualità di compressione (1-100, default: 80)
//! - `destination_dir`: Directory di output per i file compressi
//! - `workers`: Override della concorrenza (default: None = parallelismo
//!   hardware disponibile)
//!
//! ## Validazione:
//! - `quality` deve essere 1-100 (`InvalidQuality`)
//! - `workers`, se specificato, deve essere > 0

use crate::error::ShrinkError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for one batch invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOptions {
    /// Compression quality (1-100), semantics are codec-specific
    pub quality: u8,
    /// Directory where shrunk copies are written (created if absent)
    pub destination_dir: PathBuf,
    /// Concurrency override (None = available hardware parallelism)
    pub workers: Option<usize>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            quality: 80,
            destination_dir: default_destination_dir(),
            workers: None,
        }
    }
}

/// The original tool always wrote to a fixed per-user directory
pub fn default_destination_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("imageshrink")
}

impl PipelineOptions {
    pub fn new(quality: u8, destination_dir: impl Into<PathBuf>) -> Self {
        Self {
            quality,
            destination_dir: destination_dir.into(),
            workers: None,
        }
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), ShrinkError> {
        if self.quality == 0 || self.quality > 100 {
            return Err(ShrinkError::InvalidQuality(self.quality));
        }

        if self.workers == Some(0) {
            return Err(ShrinkError::Validation(
                "Number of workers must be greater than 0".to_string(),
            ));
        }

        if self.destination_dir.as_os_str().is_empty() {
            return Err(ShrinkError::Destination(
                "Destination directory must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Effective worker count: the override, or the available parallelism
    pub fn effective_workers(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    /// Load options from a JSON file, falling back to defaults when absent
    pub async fn from_file(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let options: PipelineOptions = serde_json::from_str(&content)?;
        options.validate()?;
        Ok(options)
    }

    /// Save options to a JSON file
    pub async fn save_to_file(&self, path: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}
