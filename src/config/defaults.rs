use std::time::Duration;

/// Default target output size in MB
pub const DEFAULT_TARGET_MB: f64 = 30.0;

/// Default number of concurrent compressions in the job service
pub const DEFAULT_WORKERS: usize = 2;

/// How often a streaming host drains progress messages
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(150);

/// Largest input the job service accepts
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 500 * 1024 * 1024;

/// How long a completed job's output stays downloadable
pub const DEFAULT_REGISTRY_TTL: Duration = Duration::from_secs(60 * 60);

/// Stem suffix of derived output files
pub const COMPRESSED_SUFFIX: &str = ".compressed";

/// Prefix of per-run scratch directories
pub const SCRATCH_DIR_PREFIX: &str = "pdfcompress_";

/// Environment variable overrides
pub const ENV_TARGET_MB: &str = "PDF_COMPRESS_TARGET_MB";
pub const ENV_WORKERS: &str = "PDF_COMPRESS_WORKERS";
pub const ENV_GHOSTSCRIPT: &str = "PDF_COMPRESS_GS";
pub const ENV_QPDF: &str = "PDF_COMPRESS_QPDF";
