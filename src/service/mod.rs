//! Transport-free core of the interactive host: a bounded worker pool, a
//! registry of finished outputs, and a tool health report.

pub mod pool;
pub mod registry;

use serde::Serialize;
use std::path::PathBuf;

use crate::backend::ToolPaths;

pub use pool::{JobHandle, JobPool};
pub use registry::JobRegistry;

/// Which external tools a host can use
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub ghostscript: Option<PathBuf>,
    pub qpdf: Option<PathBuf>,
}

impl HealthReport {
    pub fn from_tools(tools: ToolPaths) -> Self {
        Self {
            status: "ok",
            ghostscript: tools.ghostscript,
            qpdf: tools.qpdf,
        }
    }

    /// Probe the environment now
    pub fn probe() -> Self {
        Self::from_tools(ToolPaths::discover())
    }
}
