//! # ImageShrink - Main Entry Point
//!
//! Questo è il punto di ingresso della CLI.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Avvio della pipeline e consumo dello stream di completamenti
//!   con progress bar
//! - Presentazione del report (summary testuale o JSON) e apertura
//!   opzionale della destination directory nel file manager
//!
//! ## Esempio di utilizzo:
//! ```bash
//! imageshrink photo1.jpg photo2.png --quality 85 --workers 4 --open
//! ```

use anyhow::Result;
use clap::Parser;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};

use imageshrink::job::{BatchReport, JobResult};
use imageshrink::options::default_destination_dir;
use imageshrink::progress::ProgressManager;
use imageshrink::runner::JobCompletion;
use imageshrink::tools::{check_codec_tools, open_in_file_manager};
use imageshrink::{Pipeline, PipelineOptions};

#[derive(Parser)]
#[command(name = "imageshrink")]
#[command(about = "Shrink images with external JPEG/PNG codecs")]
struct Args {
    /// Image files to shrink
    images: Vec<PathBuf>,

    /// Compression quality (1-100)
    #[arg(short, long, default_value = "80")]
    quality: u8,

    /// Output directory for shrunk files (default: ~/imageshrink)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of parallel workers (default: available parallelism)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Print the batch report as JSON for programmatic use
    #[arg(long)]
    json: bool,

    /// Open the output directory in the file manager when done
    #[arg(long)]
    open: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    check_codec_tools().await?;

    let destination_dir = args.output.unwrap_or_else(default_destination_dir);
    let options = PipelineOptions {
        quality: args.quality,
        destination_dir: destination_dir.clone(),
        workers: args.workers,
    };

    let pipeline = Pipeline::new(options)?;
    let (total, mut rx) = pipeline.run_streaming(&args.images, None).await?;

    let progress = (!args.json).then(|| ProgressManager::new(total as u64));
    let mut by_index: BTreeMap<usize, JobResult> = BTreeMap::new();

    while let Some(JobCompletion { index, result }) = rx.recv().await {
        if let Some(ref progress) = progress {
            let name = result
                .source_path()
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            match &result {
                JobResult::Success { .. } => progress.update(&format!("✅ {name}")),
                JobResult::Failure { .. } => progress.update(&format!("❌ {name}")),
            }
        }
        by_index.insert(index, result);
    }

    let report = BatchReport::new(by_index.into_values().collect());

    if let Some(progress) = progress {
        progress.finish(&report.format_summary());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        info!("{}", report.format_summary());
        for result in &report.results {
            if let JobResult::Failure { source_path, message, .. } = result {
                warn!("Failed: {} ({})", source_path.display(), message);
            }
        }
    }

    if args.open {
        if let Err(e) = open_in_file_manager(&destination_dir).await {
            warn!("Could not open {}: {}", destination_dir.display(), e);
        }
    }

    Ok(())
}
