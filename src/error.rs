use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single backend invocation. Recovered by the search engine:
/// the step is discarded and the ladder walk continues.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Failed to launch {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} failed ({status}): {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("Backend produced no output file: {}", .0.display())]
    MissingOutput(PathBuf),

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a single embedded image was left untouched by the fallback backend.
#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Unsupported image: {0}")]
    Unsupported(String),

    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    #[error("Unsupported color space: {0}")]
    UnsupportedColorSpace(String),

    #[error("Unsupported bit depth: {0}")]
    UnsupportedBitDepth(i64),

    #[error("Image data size mismatch: got {got} bytes, expected {expected}")]
    DataSize { got: usize, expected: usize },

    #[error("Invalid image dimensions {width}x{height}")]
    Dimensions { width: i64, height: i64 },

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode JPEG: {0}")]
    Encode(String),

    #[error("Re-encoded image is not smaller")]
    NotSmaller,
}

/// Hard failure of a whole compression run. The `Display` text is what
/// callers see in `CompressionResult::error_message`.
#[derive(Error, Debug)]
pub enum CompressError {
    #[error("Input file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("All compression steps failed.")]
    AllStepsFailed,

    #[error("Compression cancelled.")]
    Cancelled,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid target size: {0} MB (must be a positive number)")]
    InvalidTarget(f64),

    #[error("Worker pool size must be at least 1")]
    InvalidWorkers,

    #[error("--output can only be used with a single input file.")]
    OutputWithMultipleInputs,

    #[error("Invalid value for {key}: {value}")]
    InvalidEnv { key: String, value: String },
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("File too large (max {limit_mb} MB)")]
    TooLarge { limit_mb: u64 },

    #[error("Job pool is shut down")]
    PoolClosed,

    #[error("Worker terminated before reporting a result")]
    WorkerLost,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
