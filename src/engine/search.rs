//! Target-driven compression search.
//!
//! Walks the compression ladder from an estimated starting step toward more
//! aggressive steps, stopping at the first result under the target
//! (first-fit). If no step reaches the target, the smallest result is kept.

use std::fs;
use std::path::{Path, PathBuf};

use super::cancel::CancelToken;
use super::candidate::CandidateSlot;
use super::estimator::estimate_start;
use super::progress::ProgressSink;
use crate::backend::{self, Backend, BackendFactory, ToolPaths};
use crate::cli::BackendChoice;
use crate::config::defaults::{COMPRESSED_SUFFIX, DEFAULT_TARGET_MB, SCRATCH_DIR_PREFIX};
use crate::error::CompressError;
use crate::model::{target_bytes, CompressionResult, LADDER};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// One compression job
#[derive(Debug, Clone, PartialEq)]
pub struct CompressRequest {
    pub input: PathBuf,
    /// Defaults to `<stem>.compressed.pdf` next to the input
    pub output: Option<PathBuf>,
    pub target_mb: f64,
}

impl CompressRequest {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: None,
            target_mb: DEFAULT_TARGET_MB,
        }
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_target_mb(mut self, target_mb: f64) -> Self {
        self.target_mb = target_mb;
        self
    }

    /// The explicit output path, or the derived default
    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| default_output_path(&self.input))
    }
}

/// `<stem>.compressed.pdf` in the input's directory. An existing trailing
/// `.compressed` on the stem is dropped so suffixes do not pile up.
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = stem.strip_suffix(COMPRESSED_SUFFIX).unwrap_or(&stem);

    input
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(format!("{}{}.pdf", stem, COMPRESSED_SUFFIX))
}

/// Runs the ladder search with a backend chosen once per run.
pub struct Compressor {
    factory: BackendFactory,
    cancel: CancelToken,
}

impl Compressor {
    pub fn new(factory: BackendFactory) -> Self {
        Self {
            factory,
            cancel: CancelToken::new(),
        }
    }

    /// Probe for Ghostscript on each run and fall back to the built-in
    /// backend when it is missing
    pub fn auto() -> Self {
        Self::new(backend::factory(BackendChoice::Auto, ToolPaths::default()))
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Compress `request.input` toward `request.target_mb`.
    ///
    /// Never panics or returns an error: every outcome is described by the
    /// returned [`CompressionResult`].
    pub fn compress(&self, request: &CompressRequest, sink: &dyn ProgressSink) -> CompressionResult {
        let progress = Progress(sink);
        let input = &request.input;

        if !input.exists() {
            return CompressionResult::failed(0, &CompressError::InputNotFound(input.clone()));
        }

        let output = request.output_path();
        let original_size = match fs::metadata(input) {
            Ok(meta) => meta.len(),
            Err(e) => return CompressionResult::failed(0, &CompressError::Io(e)),
        };
        let target = target_bytes(request.target_mb);

        progress.line(format!(
            "Input: {}",
            input.file_name().unwrap_or_default().to_string_lossy()
        ));
        progress.line(format!(
            "Original size: {:.2} MB",
            original_size as f64 / BYTES_PER_MB
        ));
        progress.line(format!("Target: {} MB", request.target_mb));

        if original_size <= target {
            progress.line("File already under target size, copying as-is.".to_string());
            // Copying a file onto itself would truncate it
            if !same_file(input, &output) {
                if let Err(e) = fs::copy(input, &output) {
                    return CompressionResult::failed(original_size, &CompressError::Io(e));
                }
            }
            return CompressionResult::already_under_target(output, original_size);
        }

        let backend = (self.factory)();
        for line in backend.announce() {
            progress.line(line);
        }

        let start = estimate_start(original_size, target, backend.kind());
        progress.line(format!(
            "Compression ratio needed: {:.1}x -> starting at step '{}'",
            original_size as f64 / target as f64,
            LADDER[start].name
        ));

        let run = LadderRun {
            backend: backend.as_ref(),
            input,
            output: &output,
            original_size,
            target,
            cancel: &self.cancel,
            progress,
        };
        match run.walk(start) {
            Ok(result) => result,
            Err(e) => {
                log::warn!("Compression of {} failed: {}", input.display(), e);
                CompressionResult::failed(original_size, &e)
            }
        }
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[derive(Clone, Copy)]
struct Progress<'a>(&'a dyn ProgressSink);

impl Progress<'_> {
    fn line(&self, message: String) {
        log::debug!("{}", message);
        self.0.report(&message);
    }
}

/// State of one ladder walk
struct LadderRun<'a> {
    backend: &'a dyn Backend,
    input: &'a Path,
    output: &'a Path,
    original_size: u64,
    target: u64,
    cancel: &'a CancelToken,
    progress: Progress<'a>,
}

impl LadderRun<'_> {
    fn walk(&self, start: usize) -> Result<CompressionResult, CompressError> {
        // Removed on drop, on every exit path
        let scratch = tempfile::Builder::new()
            .prefix(SCRATCH_DIR_PREFIX)
            .tempdir()?;
        let mut slot = CandidateSlot::new(self.original_size);

        for step in &LADDER[start..] {
            if self.cancel.is_cancelled() {
                self.progress.line("Compression cancelled.".to_string());
                return Err(CompressError::Cancelled);
            }

            self.progress.line(format!(
                "Trying step '{}' ({})...",
                step.name,
                self.backend.kind().describe_step(step)
            ));

            let candidate = scratch.path().join(format!("compressed_{}.pdf", step.name));
            let size = match self.backend.recompress(self.input, &candidate, step) {
                Ok(size) => size,
                Err(e) => {
                    self.progress.line(format!("  -> Step failed: {}", e));
                    log::warn!("Step '{}' failed: {}", step.name, e);
                    let _ = fs::remove_file(&candidate);
                    continue;
                }
            };
            self.progress
                .line(format!("  -> {:.2} MB", size as f64 / BYTES_PER_MB));

            slot.offer(&candidate, size, step.name);

            if size <= self.target {
                self.progress.line("Target reached!".to_string());
                // Anything under the target beats every earlier attempt, so
                // this step's file is the one held by the slot.
                return match slot.promote(self.output)? {
                    Some(best) => Ok(CompressionResult::reached(
                        self.output.to_path_buf(),
                        self.original_size,
                        best.size,
                        best.step,
                    )),
                    None => Err(CompressError::AllStepsFailed),
                };
            }
        }

        match slot.promote(self.output)? {
            Some(best) => {
                self.progress.line(format!(
                    "Target not reached. Best result: {:.2} MB (step: {})",
                    best.size as f64 / BYTES_PER_MB,
                    best.step
                ));
                Ok(CompressionResult::best_effort(
                    self.output.to_path_buf(),
                    self.original_size,
                    best.size,
                    best.step,
                ))
            }
            None => Err(CompressError::AllStepsFailed),
        }
    }
}
