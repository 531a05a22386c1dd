//! # Job Runner Module
//!
//! Questo modulo esegue un batch di `ShrinkJob` con parallelismo limitato
//! e isolamento completo tra i job.
//!
//! ## Responsabilità:
//! - Concorrenza limitata via `tokio::sync::Semaphore` (mai più di
//!   `concurrency` job in volo)
//! - Emissione incrementale dei risultati man mano che i job completano,
//!   tramite un canale `mpsc` di `JobCompletion` indicizzati
//! - Pre-check delle collisioni sui filename di output derivati
//! - Cancellazione cooperativa via `broadcast::channel` controllata prima
//!   di ogni dispatch; i job in volo finiscono sempre
//!
//! ## Invarianti:
//! - Il fallimento di un job non aborta né corrompe i job fratelli
//! - L'ordine di completamento è libero; l'identità del risultato è sempre
//!   ricostruibile dall'indice di sottomissione
//! - Nessun retry automatico: un job fallito emerge come Failure

use crate::codec::CodecRegistry;
use crate::error::{FailureKind, ShrinkError};
use crate::job::{JobResult, ShrinkJob};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Semaphore};
use tracing::{debug, info, warn};

/// One completed job, tagged with its submission index so the caller can
/// restore submission order without serializing execution
#[derive(Debug, Clone)]
pub struct JobCompletion {
    pub index: usize,
    pub result: JobResult,
}

/// Executes batches of shrink jobs under bounded concurrency
pub struct JobRunner {
    registry: Arc<CodecRegistry>,
    concurrency: usize,
}

impl JobRunner {
    pub fn new(registry: Arc<CodecRegistry>, concurrency: usize) -> Self {
        Self {
            registry,
            concurrency: concurrency.max(1),
        }
    }

    /// Create a cancellation channel for a run.
    ///
    /// Send `()` on the sender to stop dispatching new jobs; jobs already
    /// in flight run to completion so no torn output files are produced.
    pub fn cancellation_channel() -> (broadcast::Sender<()>, broadcast::Receiver<()>) {
        broadcast::channel(1)
    }

    /// Runs the batch and returns a receiver of per-job completion events.
    ///
    /// Events arrive as jobs finish, in arbitrary order. The channel closes
    /// once every dispatched job has reported. Jobs never dispatched because
    /// of cancellation produce no event.
    pub fn run(
        &self,
        jobs: Vec<ShrinkJob>,
        cancel: Option<broadcast::Receiver<()>>,
    ) -> mpsc::Receiver<JobCompletion> {
        let (tx, rx) = mpsc::channel(jobs.len().max(1));
        let registry = Arc::clone(&self.registry);
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let concurrency = self.concurrency;

        tokio::spawn(async move {
            info!("Dispatching {} jobs ({} workers)", jobs.len(), concurrency);

            let mut cancel = cancel;
            let mut claimed_names: HashMap<String, PathBuf> = HashMap::new();

            for (index, job) in jobs.into_iter().enumerate() {
                if should_stop(&mut cancel) {
                    info!("Cancellation received, no further jobs will be dispatched");
                    break;
                }

                // Collision pre-check: derived output filenames must be
                // distinct within a batch, the later job loses.
                let output_name = job.output_file_name();
                if let Some(first_source) = claimed_names.get(&output_name) {
                    warn!(
                        "Output collision for {}: {} already claims {}",
                        job.source_path.display(),
                        first_source.display(),
                        output_name
                    );
                    let result = JobResult::Failure {
                        source_path: job.source_path.clone(),
                        kind: FailureKind::OutputCollision,
                        message: format!(
                            "output filename {} already produced by {}",
                            output_name,
                            first_source.display()
                        ),
                    };
                    if tx.send(JobCompletion { index, result }).await.is_err() {
                        break;
                    }
                    continue;
                }
                claimed_names.insert(output_name, job.source_path.clone());

                let permit = match semaphore.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };

                // The signal may have arrived while waiting for a permit
                if should_stop(&mut cancel) {
                    info!("Cancellation received, no further jobs will be dispatched");
                    break;
                }

                let registry = Arc::clone(&registry);
                let tx = tx.clone();
                tokio::spawn(async move {
                    let _permit = permit;
                    let result = execute_job(&registry, &job).await;
                    let _ = tx.send(JobCompletion { index, result }).await;
                });
            }

            // Receiver observes close once all worker clones are dropped
            drop(tx);
        });

        rx
    }
}

/// Checks the cooperative cancellation signal without blocking
fn should_stop(cancel: &mut Option<broadcast::Receiver<()>>) -> bool {
    let Some(receiver) = cancel else {
        return false;
    };

    match receiver.try_recv() {
        Ok(_) => true,
        Err(broadcast::error::TryRecvError::Empty) => false,
        // Signal was sent but we missed it, treat as stop
        Err(broadcast::error::TryRecvError::Lagged(_)) => true,
        // Sender was dropped, continue processing
        Err(broadcast::error::TryRecvError::Closed) => false,
    }
}

/// Runs one job end to end, capturing every error as that job's Failure.
///
/// Flow: stat the source, resolve the codec, shrink, then verify the output
/// exists and is non-empty before recording Success.
async fn execute_job(registry: &CodecRegistry, job: &ShrinkJob) -> JobResult {
    match try_execute_job(registry, job).await {
        Ok(result) => result,
        Err(err) => {
            warn!("Job failed for {}: {}", job.source_path.display(), err);
            JobResult::Failure {
                source_path: job.source_path.clone(),
                kind: err.failure_kind(),
                message: err.to_string(),
            }
        }
    }
}

async fn try_execute_job(
    registry: &CodecRegistry,
    job: &ShrinkJob,
) -> Result<JobResult, ShrinkError> {
    let bytes_before = tokio::fs::metadata(&job.source_path).await?.len();

    let codec = registry.resolve(&job.source_path).await?;
    debug!(
        "Shrinking {} with codec {} (quality {})",
        job.source_path.display(),
        codec.name(),
        job.quality
    );

    let output_path = job.output_path();
    codec.shrink(job, &output_path).await?;

    // The codec contract requires a valid non-empty output on success;
    // verify it before recording anything.
    let bytes_after = tokio::fs::metadata(&output_path)
        .await
        .map_err(|_| {
            ShrinkError::Codec(format!(
                "codec {} reported success but produced no output at {}",
                codec.name(),
                output_path.display()
            ))
        })?
        .len();

    if bytes_after == 0 {
        return Err(ShrinkError::Codec(format!(
            "codec {} produced an empty output at {}",
            codec.name(),
            output_path.display()
        )));
    }

    debug!(
        "Shrunk {} -> {} ({} -> {} bytes)",
        job.source_path.display(),
        output_path.display(),
        bytes_before,
        bytes_after
    );

    Ok(JobResult::Success {
        source_path: job.source_path.clone(),
        output_path,
        bytes_before,
        bytes_after,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Codec;
    use crate::error::FailureKind;
    use async_trait::async_trait;
    use image::ImageFormat;
    use std::path::Path;
    use tempfile::TempDir;
    use tokio::sync::watch;

    /// Test codec that copies the source file to the output path
    struct CopyCodec;

    #[async_trait]
    impl Codec for CopyCodec {
        fn name(&self) -> &'static str {
            "copy"
        }

        fn matches(&self, path: &Path) -> bool {
            crate::codec::extension_of(path).as_deref() == Some("img")
        }

        fn sniffs(&self, _format: ImageFormat) -> bool {
            false
        }

        async fn shrink(&self, job: &ShrinkJob, output: &Path) -> Result<(), ShrinkError> {
            tokio::fs::copy(&job.source_path, output).await?;
            Ok(())
        }
    }

    /// Test codec that reports when a job enters and holds it until the
    /// gate opens, so tests can control exactly how many jobs are in flight
    struct GateCodec {
        entered: mpsc::UnboundedSender<()>,
        gate: watch::Receiver<bool>,
    }

    #[async_trait]
    impl Codec for GateCodec {
        fn name(&self) -> &'static str {
            "gate"
        }

        fn matches(&self, path: &Path) -> bool {
            crate::codec::extension_of(path).as_deref() == Some("img")
        }

        fn sniffs(&self, _format: ImageFormat) -> bool {
            false
        }

        async fn shrink(&self, job: &ShrinkJob, output: &Path) -> Result<(), ShrinkError> {
            let _ = self.entered.send(());
            let mut gate = self.gate.clone();
            while !*gate.borrow() {
                gate.changed()
                    .await
                    .map_err(|_| ShrinkError::Codec("gate dropped".to_string()))?;
            }
            tokio::fs::copy(&job.source_path, output).await?;
            Ok(())
        }
    }

    /// Test codec that claims success but writes nothing
    struct SilentCodec;

    #[async_trait]
    impl Codec for SilentCodec {
        fn name(&self) -> &'static str {
            "silent"
        }

        fn matches(&self, path: &Path) -> bool {
            crate::codec::extension_of(path).as_deref() == Some("silent")
        }

        fn sniffs(&self, _format: ImageFormat) -> bool {
            false
        }

        async fn shrink(&self, _job: &ShrinkJob, _output: &Path) -> Result<(), ShrinkError> {
            Ok(())
        }
    }

    fn copy_registry() -> Arc<CodecRegistry> {
        let mut registry = CodecRegistry::new();
        registry.register(Arc::new(CopyCodec)).unwrap();
        registry.register(Arc::new(SilentCodec)).unwrap();
        Arc::new(registry)
    }

    async fn write_source(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        tokio::fs::write(&path, format!("payload of {name}"))
            .await
            .unwrap();
        path
    }

    async fn collect_ordered(mut rx: mpsc::Receiver<JobCompletion>) -> Vec<JobCompletion> {
        let mut completions = Vec::new();
        while let Some(completion) = rx.recv().await {
            completions.push(completion);
        }
        completions.sort_by_key(|c| c.index);
        completions
    }

    #[tokio::test]
    async fn test_results_reassemble_in_submission_order() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        tokio::fs::create_dir_all(&out).await.unwrap();

        let mut jobs = Vec::new();
        for name in ["a.img", "b.img", "c.img", "d.img", "e.img"] {
            let source = write_source(dir.path(), name).await;
            jobs.push(ShrinkJob::new(source, 80, out.clone()));
        }

        for concurrency in [1, 8] {
            let runner = JobRunner::new(copy_registry(), concurrency);
            let completions = collect_ordered(runner.run(jobs.clone(), None)).await;

            assert_eq!(completions.len(), jobs.len());
            for (i, completion) in completions.iter().enumerate() {
                assert_eq!(completion.index, i);
                assert_eq!(completion.result.source_path(), jobs[i].source_path);
                assert!(completion.result.is_success(), "job {i} should succeed");
            }
        }
    }

    #[tokio::test]
    async fn test_one_missing_file_does_not_abort_siblings() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        tokio::fs::create_dir_all(&out).await.unwrap();

        let a = write_source(dir.path(), "a.img").await;
        let missing = dir.path().join("missing.img");
        let c = write_source(dir.path(), "c.img").await;

        let jobs = vec![
            ShrinkJob::new(a, 80, out.clone()),
            ShrinkJob::new(missing, 80, out.clone()),
            ShrinkJob::new(c, 80, out.clone()),
        ];

        let runner = JobRunner::new(copy_registry(), 4);
        let completions = collect_ordered(runner.run(jobs, None)).await;

        assert_eq!(completions.len(), 3);
        assert!(completions[0].result.is_success());
        assert!(completions[2].result.is_success());
        match &completions[1].result {
            JobResult::Failure { kind, .. } => assert_eq!(*kind, FailureKind::Io),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unsupported_format_is_that_jobs_failure() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        tokio::fs::create_dir_all(&out).await.unwrap();

        let bmp = write_source(dir.path(), "a.bmp").await;
        let jobs = vec![ShrinkJob::new(bmp.clone(), 80, out)];

        let runner = JobRunner::new(copy_registry(), 2);
        let completions = collect_ordered(runner.run(jobs, None)).await;

        assert_eq!(completions.len(), 1);
        match &completions[0].result {
            JobResult::Failure { source_path, kind, .. } => {
                assert_eq!(source_path, &bmp);
                assert_eq!(*kind, FailureKind::UnsupportedFormat);
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_duplicate_output_names_collide() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        let sub_a = dir.path().join("a");
        let sub_b = dir.path().join("b");
        tokio::fs::create_dir_all(&out).await.unwrap();
        tokio::fs::create_dir_all(&sub_a).await.unwrap();
        tokio::fs::create_dir_all(&sub_b).await.unwrap();

        let first = write_source(&sub_a, "same.img").await;
        let second = write_source(&sub_b, "same.img").await;

        let jobs = vec![
            ShrinkJob::new(first, 80, out.clone()),
            ShrinkJob::new(second.clone(), 80, out.clone()),
        ];

        let runner = JobRunner::new(copy_registry(), 4);
        let completions = collect_ordered(runner.run(jobs, None)).await;

        assert_eq!(completions.len(), 2);
        assert!(completions[0].result.is_success());
        match &completions[1].result {
            JobResult::Failure { source_path, kind, .. } => {
                assert_eq!(source_path, &second);
                assert_eq!(*kind, FailureKind::OutputCollision);
            }
            other => panic!("expected collision failure, got {other:?}"),
        }

        // The first writer's output survived untouched
        let content = tokio::fs::read_to_string(out.join("same.img")).await.unwrap();
        assert!(content.contains("payload"));
    }

    #[tokio::test]
    async fn test_cancellation_before_run_dispatches_nothing() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        tokio::fs::create_dir_all(&out).await.unwrap();

        let mut jobs = Vec::new();
        for name in ["a.img", "b.img", "c.img"] {
            let source = write_source(dir.path(), name).await;
            jobs.push(ShrinkJob::new(source, 80, out.clone()));
        }

        let (cancel_tx, cancel_rx) = JobRunner::cancellation_channel();
        cancel_tx.send(()).unwrap();

        let runner = JobRunner::new(copy_registry(), 2);
        let completions = collect_ordered(runner.run(jobs, Some(cancel_rx))).await;

        assert!(completions.is_empty());
        assert!(!out.join("a.img").exists());
    }

    #[tokio::test]
    async fn test_cancellation_mid_run_stops_further_dispatch() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        tokio::fs::create_dir_all(&out).await.unwrap();

        let mut jobs = Vec::new();
        for name in ["a.img", "b.img", "c.img", "d.img", "e.img", "f.img"] {
            let source = write_source(dir.path(), name).await;
            jobs.push(ShrinkJob::new(source, 80, out.clone()));
        }

        let (entered_tx, mut entered_rx) = mpsc::unbounded_channel();
        let (gate_tx, gate_rx) = watch::channel(false);
        let mut registry = CodecRegistry::new();
        registry
            .register(Arc::new(GateCodec {
                entered: entered_tx,
                gate: gate_rx,
            }))
            .unwrap();

        let (cancel_tx, cancel_rx) = JobRunner::cancellation_channel();
        let runner = JobRunner::new(Arc::new(registry), 2);
        let rx = runner.run(jobs, Some(cancel_rx));

        // Both workers are now inside the codec and the dispatcher is
        // blocked on a permit. Cancel before releasing the gate, so any
        // permit that frees up must be followed by a stop.
        entered_rx.recv().await.unwrap();
        entered_rx.recv().await.unwrap();
        cancel_tx.send(()).unwrap();
        gate_tx.send(true).unwrap();

        let completions = collect_ordered(rx).await;
        assert_eq!(completions.len(), 2, "only the in-flight jobs may report");
        for (i, completion) in completions.iter().enumerate() {
            assert_eq!(completion.index, i);
            assert!(completion.result.is_success(), "in-flight jobs run to completion");
        }
        assert!(out.join("a.img").exists());
        assert!(out.join("b.img").exists());
        assert!(!out.join("c.img").exists());
    }

    #[tokio::test]
    async fn test_silent_codec_output_is_verified() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        tokio::fs::create_dir_all(&out).await.unwrap();

        let source = write_source(dir.path(), "a.silent").await;
        let jobs = vec![ShrinkJob::new(source, 80, out)];

        let runner = JobRunner::new(copy_registry(), 1);
        let completions = collect_ordered(runner.run(jobs, None)).await;

        assert_eq!(completions.len(), 1);
        match &completions[0].result {
            JobResult::Failure { kind, message, .. } => {
                assert_eq!(*kind, FailureKind::CodecError);
                assert!(message.contains("no output"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }
}
