//! # PNG Codec
//!
//! Strategia di shrink per PNG, delegata a tool esterni in ordine di
//! priorità decrescente:
//!
//! 1. **pngquant**: quantizzazione lossy, rispetta il parametro qualità
//! 2. **oxipng**: ottimizzazione lossless veloce, ignora la qualità

use super::{extension_of, run_tool_chain, Codec, ToolOutput, ToolSpec};
use crate::args;
use crate::error::ShrinkError;
use crate::job::ShrinkJob;
use async_trait::async_trait;
use image::ImageFormat;
use std::path::Path;

/// External-tool codec for PNG images
#[derive(Debug, Default)]
pub struct PngCodec;

fn pngquant_args(input: &str, output: &str, quality: u8) -> Vec<String> {
    // The 1-100 quality maps to an equal min-max pair, the same range the
    // original pngquant integration used.
    args![
        "--quality",
        &format!("{}-{}", quality, quality),
        "--force",
        "--output",
        output,
        input,
    ]
}

fn oxipng_args(input: &str, output: &str, _quality: u8) -> Vec<String> {
    // Lossless only: the quality parameter does not apply
    args!["-o", "6", "--strip", "safe", "--out", output, input]
}

const TOOL_CHAIN: &[ToolSpec] = &[
    ToolSpec {
        name: "pngquant",
        output: ToolOutput::File,
        args: pngquant_args,
    },
    ToolSpec {
        name: "oxipng",
        output: ToolOutput::File,
        args: oxipng_args,
    },
];

#[async_trait]
impl Codec for PngCodec {
    fn name(&self) -> &'static str {
        "png"
    }

    fn matches(&self, path: &Path) -> bool {
        matches!(extension_of(path).as_deref(), Some("png"))
    }

    fn sniffs(&self, format: ImageFormat) -> bool {
        format == ImageFormat::Png
    }

    async fn shrink(&self, job: &ShrinkJob, output_path: &Path) -> Result<(), ShrinkError> {
        run_tool_chain(TOOL_CHAIN, job, output_path, "PNG").await
    }
}
