//! # JPEG Codec
//!
//! Strategia di shrink per la famiglia JPEG, delegata a tool esterni in
//! ordine di priorità decrescente:
//!
//! 1. **mozjpeg**: migliore compressione, controllo qualità preciso
//! 2. **jpegoptim**: buona compressione, output su stdout
//! 3. **jpegtran**: solo ottimizzazione lossless, ignora la qualità

use super::{extension_of, run_tool_chain, Codec, ToolOutput, ToolSpec};
use crate::args;
use crate::error::ShrinkError;
use crate::job::ShrinkJob;
use async_trait::async_trait;
use image::ImageFormat;
use std::path::Path;

/// External-tool codec for JPEG images
#[derive(Debug, Default)]
pub struct JpegCodec;

fn mozjpeg_args(input: &str, output: &str, quality: u8) -> Vec<String> {
    args![
        "-quality",
        &quality.to_string(),
        "-optimize",
        "-progressive",
        "-outfile",
        output,
        input,
    ]
}

fn jpegoptim_args(input: &str, _output: &str, quality: u8) -> Vec<String> {
    args![&format!("--max={}", quality), "--stdout", input]
}

fn jpegtran_args(input: &str, output: &str, _quality: u8) -> Vec<String> {
    // Lossless only: the quality parameter does not apply
    args!["-optimize", "-progressive", "-outfile", output, input]
}

const TOOL_CHAIN: &[ToolSpec] = &[
    ToolSpec {
        name: "mozjpeg",
        output: ToolOutput::File,
        args: mozjpeg_args,
    },
    ToolSpec {
        name: "jpegoptim",
        output: ToolOutput::Stdout,
        args: jpegoptim_args,
    },
    ToolSpec {
        name: "jpegtran",
        output: ToolOutput::File,
        args: jpegtran_args,
    },
];

#[async_trait]
impl Codec for JpegCodec {
    fn name(&self) -> &'static str {
        "jpeg"
    }

    fn matches(&self, path: &Path) -> bool {
        matches!(extension_of(path).as_deref(), Some("jpg") | Some("jpeg"))
    }

    fn sniffs(&self, format: ImageFormat) -> bool {
        format == ImageFormat::Jpeg
    }

    async fn shrink(&self, job: &ShrinkJob, output_path: &Path) -> Result<(), ShrinkError> {
        run_tool_chain(TOOL_CHAIN, job, output_path, "JPEG").await
    }
}
