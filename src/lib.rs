pub mod backend;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod report;
pub mod service;

use std::path::PathBuf;

pub use backend::{Backend, BackendFactory, BackendKind, ToolPaths};
pub use cli::BackendChoice;
pub use config::Settings;
pub use engine::{
    default_output_path, estimate_start, CancelToken, CompressRequest, Compressor, NullSink,
    ProgressSink,
};
pub use error::{BackendError, CompressError, ConfigError, ImageError, ServiceError};
pub use model::{CompressionResult, CompressionStep, LADDER};

/// Compress a PDF toward `target_mb`, probing for Ghostscript and falling
/// back to built-in image recompression when it is not installed.
///
/// This is the recommended entry point for library consumers.
///
/// # Arguments
///
/// * `input` - PDF to compress
/// * `output` - Destination; `None` writes `<input>.compressed.pdf`
/// * `target_mb` - Target size in megabytes
/// * `progress` - Receives status lines as the search proceeds
///
/// # Example
///
/// ```no_run
/// use pdf_compress::compress_pdf;
///
/// let result = compress_pdf("scan.pdf", None, 25.0, &|line: &str| println!("{}", line));
/// if result.success && !result.target_reached {
///     eprintln!("Best effort: {:.2} MB", result.final_size_mb());
/// }
/// ```
pub fn compress_pdf(
    input: impl Into<PathBuf>,
    output: Option<PathBuf>,
    target_mb: f64,
    progress: &dyn ProgressSink,
) -> CompressionResult {
    let request = CompressRequest {
        input: input.into(),
        output,
        target_mb,
    };
    Compressor::auto().compress(&request, progress)
}
