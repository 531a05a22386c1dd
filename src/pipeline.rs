//! # Pipeline Facade
//!
//! Questo modulo è l'unico entry point pubblico della pipeline: valida
//! l'input, costruisce i job, guida il `JobRunner` e riassembla il
//! `BatchReport` nell'ordine di sottomissione.
//!
//! ## Responsabilità:
//! - Validazione completa prima che parta qualsiasi job: batch non vuoto,
//!   qualità in [1,100], destination creabile — un errore di validazione
//!   fallisce l'intera invocazione senza alcuna scrittura su filesystem
//! - Creazione della destination directory solo dopo che tutta la
//!   validazione è passata; il contenuto pre-esistente dell'utente non
//!   viene mai cancellato
//! - Nessun side effect oltre le scritture dei codec e la creazione della
//!   directory: niente UI, niente apertura di applicazioni esterne
//!
//! ## Esempio:
//! ```rust,ignore
//! let pipeline = Pipeline::new(PipelineOptions::new(80, "/out"))?;
//! let report = pipeline.run(&paths).await?;
//! println!("{}", report.format_summary());
//! ```

use crate::codec::CodecRegistry;
use crate::error::ShrinkError;
use crate::job::{BatchReport, JobResult, ShrinkJob};
use crate::options::PipelineOptions;
use crate::runner::{JobCompletion, JobRunner};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

/// Single public entry point for batch shrink invocations
pub struct Pipeline {
    registry: Arc<CodecRegistry>,
    options: PipelineOptions,
}

impl Pipeline {
    /// Pipeline with the built-in codecs (JPEG, PNG)
    pub fn new(options: PipelineOptions) -> Result<Self, ShrinkError> {
        Ok(Self::with_registry(
            Arc::new(CodecRegistry::with_default_codecs()?),
            options,
        ))
    }

    /// Pipeline with a caller-supplied codec registry
    pub fn with_registry(registry: Arc<CodecRegistry>, options: PipelineOptions) -> Self {
        Self { registry, options }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Create a cancellation channel usable with the `*_with_cancellation`
    /// entry points.
    pub fn cancellation_channel() -> (broadcast::Sender<()>, broadcast::Receiver<()>) {
        JobRunner::cancellation_channel()
    }

    /// Runs the batch to completion and returns the assembled report.
    pub async fn run(&self, paths: &[PathBuf]) -> Result<BatchReport, ShrinkError> {
        self.run_with_cancellation(paths, None).await
    }

    /// Runs the batch with a cooperative cancellation signal.
    ///
    /// On cancellation the report contains a definite result for every job
    /// that was dispatched before the signal, still in submission order;
    /// jobs never dispatched are absent.
    pub async fn run_with_cancellation(
        &self,
        paths: &[PathBuf],
        cancel: Option<broadcast::Receiver<()>>,
    ) -> Result<BatchReport, ShrinkError> {
        let (_, mut rx) = self.run_streaming(paths, cancel).await?;

        let mut by_index: BTreeMap<usize, JobResult> = BTreeMap::new();
        while let Some(JobCompletion { index, result }) = rx.recv().await {
            by_index.insert(index, result);
        }

        Ok(BatchReport::new(by_index.into_values().collect()))
    }

    /// Validates the batch, starts it, and returns the job count together
    /// with the stream of per-job completion events for progress reporting.
    ///
    /// Events arrive in completion order; `JobCompletion::index` carries the
    /// submission position for reassembly.
    pub async fn run_streaming(
        &self,
        paths: &[PathBuf],
        cancel: Option<broadcast::Receiver<()>>,
    ) -> Result<(usize, mpsc::Receiver<JobCompletion>), ShrinkError> {
        // All validation happens before anything touches the filesystem
        if paths.is_empty() {
            return Err(ShrinkError::EmptyBatch);
        }
        self.options.validate()?;

        self.ensure_destination().await?;

        let jobs: Vec<ShrinkJob> = paths
            .iter()
            .map(|path| {
                ShrinkJob::new(
                    path.clone(),
                    self.options.quality,
                    self.options.destination_dir.clone(),
                )
            })
            .collect();

        info!(
            "Starting batch of {} images -> {} (quality {})",
            jobs.len(),
            self.options.destination_dir.display(),
            self.options.quality
        );

        let runner = JobRunner::new(Arc::clone(&self.registry), self.options.effective_workers());
        let rx = runner.run(jobs, cancel);
        Ok((paths.len(), rx))
    }

    /// Makes sure the destination directory exists and is a directory.
    ///
    /// Pre-existing user content is never deleted; when creation itself
    /// fails nothing has been written.
    async fn ensure_destination(&self) -> Result<(), ShrinkError> {
        let dest = &self.options.destination_dir;

        match tokio::fs::metadata(dest).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(ShrinkError::Destination(format!(
                "destination exists but is not a directory: {}",
                dest.display()
            ))),
            Err(_) => {
                tokio::fs::create_dir_all(dest).await.map_err(|e| {
                    ShrinkError::Destination(format!(
                        "cannot create destination {}: {}",
                        dest.display(),
                        e
                    ))
                })?;
                debug!("Created destination directory: {}", dest.display());
                Ok(())
            }
        }
    }
}
