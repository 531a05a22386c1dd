//! # Job and Report Data Model
//!
//! Questo modulo definisce i value object della pipeline.
//!
//! ## Responsabilità:
//! - `ShrinkJob`: descrizione immutabile di una singola unità di lavoro
//! - `JobResult`: esito per-job (Success/Failure), prodotto una sola volta
//! - `BatchReport`: sequenza ordinata di esiti, stesso ordine dei path di input
//!
//! ## Invarianti:
//! - Un `ShrinkJob` non viene mai mutato dopo la costruzione
//! - Il filename di output è derivato deterministicamente dal filename sorgente
//! - I contatori del report sono derivati dalla sequenza, mai memorizzati
//!   separatamente (non possono andare fuori sync)

use crate::error::FailureKind;
use crate::utils::format_size;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One source-image-to-output-image shrink request.
///
/// Immutable once created: constructed by the pipeline facade from the raw
/// path list and consumed exactly once by the job runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShrinkJob {
    /// Absolute path to the input image
    pub source_path: PathBuf,
    /// Quality (1-100), semantics are codec-specific
    pub quality: u8,
    /// Target directory for the shrunk output
    pub destination_dir: PathBuf,
}

impl ShrinkJob {
    pub fn new(source_path: PathBuf, quality: u8, destination_dir: PathBuf) -> Self {
        Self {
            source_path,
            quality,
            destination_dir,
        }
    }

    /// Output filename, derived deterministically from the source filename.
    ///
    /// Two jobs in the same batch with the same source filename therefore
    /// collide; the runner rejects the later one instead of overwriting.
    pub fn output_file_name(&self) -> String {
        self.source_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string())
    }

    /// Full output path inside the destination directory
    pub fn output_path(&self) -> PathBuf {
        self.destination_dir.join(self.output_file_name())
    }
}

/// Outcome of a single job, produced once by the runner and never mutated
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobResult {
    Success {
        source_path: PathBuf,
        output_path: PathBuf,
        bytes_before: u64,
        bytes_after: u64,
    },
    Failure {
        source_path: PathBuf,
        kind: FailureKind,
        message: String,
    },
}

impl JobResult {
    pub fn is_success(&self) -> bool {
        matches!(self, JobResult::Success { .. })
    }

    /// Source path this result belongs to, valid for both variants
    pub fn source_path(&self) -> &Path {
        match self {
            JobResult::Success { source_path, .. } => source_path,
            JobResult::Failure { source_path, .. } => source_path,
        }
    }
}

/// Aggregate result of one batch invocation.
///
/// Results are kept in submission order even though jobs complete out of
/// order internally, so the i-th result always corresponds to the i-th
/// input path. Summary counts are computed from the sequence on demand.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub results: Vec<JobResult>,
}

impl BatchReport {
    pub fn new(results: Vec<JobResult>) -> Self {
        Self { results }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Number of jobs that produced a valid output file
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    /// Number of jobs that failed
    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    /// Total bytes saved across all successful jobs
    pub fn bytes_saved(&self) -> u64 {
        self.results
            .iter()
            .filter_map(|r| match r {
                JobResult::Success {
                    bytes_before,
                    bytes_after,
                    ..
                } => Some(bytes_before.saturating_sub(*bytes_after)),
                JobResult::Failure { .. } => None,
            })
            .sum()
    }

    /// Overall size reduction across successful jobs, in percent
    pub fn overall_reduction_percent(&self) -> f64 {
        let total_before: u64 = self
            .results
            .iter()
            .filter_map(|r| match r {
                JobResult::Success { bytes_before, .. } => Some(*bytes_before),
                JobResult::Failure { .. } => None,
            })
            .sum();

        if total_before > 0 {
            (self.bytes_saved() as f64 / total_before as f64) * 100.0
        } else {
            0.0
        }
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Processed: {} files | Shrunk: {} | Errors: {} | Total saved: {} ({:.2}%)",
            self.len(),
            self.succeeded(),
            self.failed(),
            format_size(self.bytes_saved()),
            self.overall_reduction_percent()
        )
    }
}
