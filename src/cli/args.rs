use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::error::ConfigError;

#[derive(Parser, Debug)]
#[command(name = "pdf-compress")]
#[command(
    author,
    version,
    about = "Compress PDF files by downsampling images while preserving text",
    after_help = "Examples:\n  pdf-compress document.pdf\n  pdf-compress document.pdf --target-mb 25\n  pdf-compress document.pdf -o smaller.pdf\n  pdf-compress *.pdf"
)]
pub struct Args {
    /// PDF file(s) to compress
    #[arg(required = true)]
    pub input: Vec<PathBuf>,

    /// Output path (only valid with a single input file).
    /// Defaults to <input>.compressed.pdf
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Target file size in MB [default: 30, or PDF_COMPRESS_TARGET_MB]
    #[arg(short = 't', long)]
    pub target_mb: Option<f64>,

    /// Suppress progress output
    #[arg(short, long)]
    pub quiet: bool,

    /// Recompression backend
    #[arg(short = 'b', long, value_enum, default_value = "auto")]
    pub backend: BackendChoice,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Which recompression backend to use
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum, Default)]
pub enum BackendChoice {
    /// Ghostscript when installed, otherwise the built-in backend
    #[default]
    Auto,
    /// Ghostscript (+ qpdf when available)
    External,
    /// Built-in per-image recompression
    Fallback,
}

impl Args {
    /// Output path for a given input: the explicit `--output` when there is
    /// exactly one input, otherwise `None` (derive per input)
    pub fn output_for_run(&self) -> Option<PathBuf> {
        if self.input.len() == 1 {
            self.output.clone()
        } else {
            None
        }
    }

    /// Reject `--output` combined with several inputs
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output.is_some() && self.input.len() > 1 {
            return Err(ConfigError::OutputWithMultipleInputs);
        }
        Ok(())
    }
}

/// True if the path has a `.pdf` extension (any case)
pub fn is_pdf_path(path: &std::path::Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}
