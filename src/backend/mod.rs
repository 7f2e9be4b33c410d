//! Image recompression backends
//!
//! Two implementations of [`Backend`]: a whole-document Ghostscript (+ qpdf)
//! pass, and a per-image lopdf pass used when Ghostscript is not installed.
//! One backend is chosen per run and never changes during the ladder walk.

pub mod codec;
pub mod discover;
pub mod fallback;
pub mod ghostscript;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::cli::BackendChoice;
use crate::error::BackendError;
use crate::model::CompressionStep;

pub use discover::{find_ghostscript, find_qpdf, ToolPaths};
pub use fallback::ImageBackend;
pub use ghostscript::GhostscriptBackend;

/// Which family of backend is active. The starting-point estimator tunes its
/// thresholds per kind because the two differ in effectiveness per step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Ghostscript pipeline (more effective per step)
    External,
    /// Library-based per-image recompression (less effective per step)
    Fallback,
}

impl BackendKind {
    /// Short description of what a step means for this backend
    pub fn describe_step(&self, step: &CompressionStep) -> String {
        match self {
            BackendKind::External => format!("DPI {}", step.dpi),
            BackendKind::Fallback => {
                format!("max {}px, quality {}", step.max_dimension, step.quality)
            }
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::External => write!(f, "external"),
            BackendKind::Fallback => write!(f, "fallback"),
        }
    }
}

/// Produces a recompressed copy of a PDF for one ladder step.
pub trait Backend: Send {
    fn kind(&self) -> BackendKind;

    /// Status lines announcing the backend at the start of a run
    fn announce(&self) -> Vec<String> {
        Vec::new()
    }

    /// Write a recompressed copy of `input` to `output` and return its size
    /// in bytes.
    fn recompress(
        &self,
        input: &Path,
        output: &Path,
        step: &CompressionStep,
    ) -> Result<u64, BackendError>;
}

/// Builds the backend for a run. Called once per run, after the
/// already-under-target check, so tool probing is skipped for small files.
pub type BackendFactory = Arc<dyn Fn() -> Box<dyn Backend> + Send + Sync>;

/// Choose a backend from the available tools.
///
/// A missing Ghostscript silently selects the fallback; forcing `External`
/// without Ghostscript also falls back, with a warning.
pub fn select_backend(choice: BackendChoice, tools: &ToolPaths) -> Box<dyn Backend> {
    match (choice, &tools.ghostscript) {
        (BackendChoice::Fallback, _) => Box::new(ImageBackend::new()),
        (_, Some(gs)) => Box::new(GhostscriptBackend::new(gs.clone(), tools.qpdf.clone())),
        (BackendChoice::External, None) => {
            log::warn!("External backend requested but Ghostscript was not found");
            Box::new(ImageBackend::new())
        }
        (BackendChoice::Auto, None) => Box::new(ImageBackend::new()),
    }
}

/// Factory that probes the environment (or uses configured tool paths) each
/// time a run needs a backend.
pub fn factory(choice: BackendChoice, overrides: ToolPaths) -> BackendFactory {
    Arc::new(move || {
        let tools = overrides.clone().or_discover();
        select_backend(choice, &tools)
    })
}
