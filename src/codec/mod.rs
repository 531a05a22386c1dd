//! # Codec Strategies Module
//!
//! Questo modulo definisce il contratto dei codec e le strategie concrete
//! per ogni famiglia di formato. Tutta la compressione effettiva è delegata
//! a tool esterni specializzati; nessun processing pixel-level avviene
//! in-process.
//!
//! ## Responsabilità:
//! - Trait `Codec`: classificazione file + operazione di shrink delegata
//! - Helper condivisi per invocare i tool e scrivere atomicamente
//!   (temp-file-then-rename, mai output parziali leggibili come validi)
//! - Content sniffing dei magic byte per file senza estensione
//!
//! ## Strategia Tool Selection (priorità decrescente):
//! - **JPEG**: mozjpeg, jpegoptim, jpegtran
//! - **PNG**: pngquant, oxipng
//!
//! Il primo tool disponibile che riesce vince; i successivi sono fallback.

pub mod jpeg;
pub mod png;
pub mod registry;

pub use jpeg::JpegCodec;
pub use png::PngCodec;
pub use registry::CodecRegistry;

use crate::error::ShrinkError;
use crate::job::ShrinkJob;
use crate::tools::PlatformCommands;
use async_trait::async_trait;
use image::ImageFormat;
use std::path::Path;
use tempfile::NamedTempFile;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, error, warn};

/// A compression strategy for one file format family.
///
/// Implementations delegate the actual pixel work to external tools and are
/// responsible for writing the output atomically: either a valid non-empty
/// file appears at `output_path`, or an error is returned and nothing
/// readable is left behind.
#[async_trait]
pub trait Codec: Send + Sync {
    /// Stable codec name, used for duplicate detection in the registry
    fn name(&self) -> &'static str;

    /// Extension-based classification predicate
    fn matches(&self, path: &Path) -> bool;

    /// Content-based classification, used as a fallback when the extension
    /// is missing or matched no codec
    fn sniffs(&self, format: ImageFormat) -> bool;

    /// Shrink `job.source_path` into `output_path`
    async fn shrink(&self, job: &ShrinkJob, output_path: &Path) -> Result<(), ShrinkError>;
}

/// Guess the image format from the file's magic bytes
pub async fn sniff_format(path: &Path) -> Option<ImageFormat> {
    let mut file = tokio::fs::File::open(path).await.ok()?;
    let mut header = [0u8; 64];
    let read = file.read(&mut header).await.ok()?;
    image::guess_format(&header[..read]).ok()
}

/// Argument builder for one external tool invocation
pub(crate) type ArgsBuilder = fn(input: &str, output: &str, quality: u8) -> Vec<String>;

/// How a tool delivers its output
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum ToolOutput {
    /// The tool writes the output file itself (path passed in args)
    File,
    /// The tool writes the compressed bytes to stdout
    Stdout,
}

/// One entry in a codec's fallback chain
pub(crate) struct ToolSpec {
    pub name: &'static str,
    pub output: ToolOutput,
    pub args: ArgsBuilder,
}

/// Creates the scratch file the external tool writes into.
///
/// The scratch file lives in the same directory as the final output so the
/// closing rename never crosses a filesystem boundary.
fn make_scratch_file(output_path: &Path) -> Result<NamedTempFile, ShrinkError> {
    let dir = output_path.parent().unwrap_or_else(|| Path::new("."));
    let tempfile = tempfile::Builder::new()
        .prefix(".imageshrink-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    Ok(tempfile)
}

/// Promotes a scratch file to the final output path.
///
/// Fails without renaming when the tool produced an empty file, so a torn
/// or no-op tool run never becomes a visible output.
fn promote_scratch_file(scratch: NamedTempFile, output_path: &Path) -> Result<(), ShrinkError> {
    let written = scratch.path().metadata()?.len();
    if written == 0 {
        return Err(ShrinkError::Codec(format!(
            "tool produced an empty output for {}",
            output_path.display()
        )));
    }

    scratch
        .persist(output_path)
        .map_err(|e| ShrinkError::Io(e.error))?;
    Ok(())
}

/// Tries a codec's tool chain in registration order until one succeeds.
///
/// Mirrors the per-format behavior: a missing tool is skipped, a failing
/// tool falls through to the next one, and the error distinguishes "no
/// tools installed" from "all tools failed".
pub(crate) async fn run_tool_chain(
    tools: &[ToolSpec],
    job: &ShrinkJob,
    output_path: &Path,
    format_name: &str,
) -> Result<(), ShrinkError> {
    let input = job
        .source_path
        .to_str()
        .ok_or_else(|| ShrinkError::Codec(format!("invalid input path: {:?}", job.source_path)))?;

    let platform = PlatformCommands::instance();
    let mut any_tool_available = false;

    for spec in tools {
        if !platform.is_command_available(spec.name).await {
            continue;
        }
        any_tool_available = true;

        let scratch = make_scratch_file(output_path)?;
        let scratch_str = scratch
            .path()
            .to_str()
            .ok_or_else(|| ShrinkError::Codec(format!("invalid scratch path: {:?}", scratch.path())))?
            .to_string();

        let args = (spec.args)(input, &scratch_str, job.quality);
        debug!("Attempting {} shrink with {}: {:?}", format_name, spec.name, args);

        let start_time = std::time::Instant::now();
        let succeeded = match spec.output {
            ToolOutput::File => run_file_tool(spec.name, &args).await?,
            ToolOutput::Stdout => run_stdout_tool(spec.name, &args, scratch.path()).await?,
        };
        let elapsed = start_time.elapsed();

        if succeeded {
            debug!("{} shrunk successfully with {} in {:?}", format_name, spec.name, elapsed);
            return promote_scratch_file(scratch, output_path);
        }

        warn!(
            "{} shrink failed with {} after {:?}, trying next tool",
            format_name, spec.name, elapsed
        );
        // scratch is dropped and removed here
    }

    if !any_tool_available {
        let tool_names: Vec<&str> = tools.iter().map(|spec| spec.name).collect();
        error!("No {} codec tools available ({})", format_name, tool_names.join("/"));
        Err(ShrinkError::Codec(format!(
            "No {} codec tools available. Please install one of: {}",
            format_name,
            tool_names.join(", ")
        )))
    } else {
        error!("All {} codec tools failed for: {}", format_name, input);
        Err(ShrinkError::Codec(format!(
            "All {} codec tools failed to shrink: {}",
            format_name, input
        )))
    }
}

/// Runs a tool that writes its own output file. Returns false on a non-zero
/// exit so the caller can fall through to the next tool.
async fn run_file_tool(tool_name: &str, args: &[String]) -> Result<bool, ShrinkError> {
    let platform = PlatformCommands::instance();
    let status = Command::new(platform.get_command(tool_name))
        .args(args)
        .status()
        .await?;
    Ok(status.success())
}

/// Runs a tool that emits the compressed bytes on stdout (like jpegoptim)
/// and captures them into the scratch file.
async fn run_stdout_tool(
    tool_name: &str,
    args: &[String],
    scratch_path: &Path,
) -> Result<bool, ShrinkError> {
    let platform = PlatformCommands::instance();
    let output = Command::new(platform.get_command(tool_name))
        .args(args)
        .output()
        .await?;

    if output.status.success() {
        tokio::fs::write(scratch_path, output.stdout).await?;
        Ok(true)
    } else {
        Ok(false)
    }
}

/// Lowercased file extension, the basis of all `matches()` predicates
pub(crate) fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of(Path::new("a.JPG")), Some("jpg".to_string()));
        assert_eq!(extension_of(Path::new("a.jpeg")), Some("jpeg".to_string()));
        assert_eq!(extension_of(Path::new("noext")), None);
    }

    #[test]
    fn test_promote_scratch_file_rejects_empty_output() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("out.jpg");
        let scratch = make_scratch_file(&output).unwrap();

        let err = promote_scratch_file(scratch, &output).unwrap_err();
        assert!(matches!(err, ShrinkError::Codec(_)));
        assert!(!output.exists());
    }

    #[test]
    fn test_promote_scratch_file_renames_non_empty_output() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("out.jpg");
        let mut scratch = make_scratch_file(&output).unwrap();
        scratch.write_all(b"compressed bytes").unwrap();

        promote_scratch_file(scratch, &output).unwrap();
        assert_eq!(std::fs::read(&output).unwrap(), b"compressed bytes");
        // no scratch files left behind
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".imageshrink-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_sniff_format_png_magic() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mystery");
        // PNG signature followed by padding
        let mut bytes = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        bytes.extend_from_slice(&[0u8; 16]);
        tokio::fs::write(&path, &bytes).await.unwrap();

        assert_eq!(sniff_format(&path).await, Some(ImageFormat::Png));
    }

    #[tokio::test]
    async fn test_sniff_format_unreadable_file() {
        assert_eq!(sniff_format(Path::new("/no/such/file")).await, None);
    }
}
