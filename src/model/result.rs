use serde::Serialize;
use std::path::PathBuf;

use crate::error::CompressError;

/// `step_used` when no backend produced the output
pub const STEP_NONE: &str = "none";

/// `step_used` when the input was copied through unchanged
pub const STEP_ALREADY_UNDER_TARGET: &str = "none (already under target)";

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Outcome of one compression request.
///
/// `success == false` is a hard failure (missing input, every step failed).
/// `success == true` with `target_reached == false` is a soft shortfall: the
/// best attempt was written but is still above the target.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionResult {
    pub success: bool,
    pub output_path: Option<PathBuf>,
    pub original_size_bytes: u64,
    pub final_size_bytes: u64,
    pub target_reached: bool,
    pub step_used: String,
    pub error_message: Option<String>,
}

impl CompressionResult {
    /// Input was already small enough and was copied as-is
    pub fn already_under_target(output_path: PathBuf, size: u64) -> Self {
        Self {
            success: true,
            output_path: Some(output_path),
            original_size_bytes: size,
            final_size_bytes: size,
            target_reached: true,
            step_used: STEP_ALREADY_UNDER_TARGET.to_string(),
            error_message: None,
        }
    }

    /// A ladder step met the target
    pub fn reached(output_path: PathBuf, original: u64, final_size: u64, step: &str) -> Self {
        Self {
            success: true,
            output_path: Some(output_path),
            original_size_bytes: original,
            final_size_bytes: final_size,
            target_reached: true,
            step_used: step.to_string(),
            error_message: None,
        }
    }

    /// The ladder was exhausted; the smallest attempt was kept
    pub fn best_effort(output_path: PathBuf, original: u64, final_size: u64, step: &str) -> Self {
        Self {
            target_reached: false,
            ..Self::reached(output_path, original, final_size, step)
        }
    }

    pub fn failed(original: u64, error: &CompressError) -> Self {
        Self {
            success: false,
            output_path: None,
            original_size_bytes: original,
            final_size_bytes: 0,
            target_reached: false,
            step_used: STEP_NONE.to_string(),
            error_message: Some(error.to_string()),
        }
    }

    pub fn original_size_mb(&self) -> f64 {
        self.original_size_bytes as f64 / BYTES_PER_MB
    }

    pub fn final_size_mb(&self) -> f64 {
        self.final_size_bytes as f64 / BYTES_PER_MB
    }

    /// `original / final`, or 0 when nothing was produced
    pub fn reduction_ratio(&self) -> f64 {
        if self.final_size_bytes == 0 {
            return 0.0;
        }
        self.original_size_bytes as f64 / self.final_size_bytes as f64
    }

    pub fn savings_percent(&self) -> f64 {
        if self.original_size_bytes == 0 {
            return 0.0;
        }
        (1.0 - self.final_size_bytes as f64 / self.original_size_bytes as f64) * 100.0
    }
}

/// Convert a megabyte target to whole bytes (truncating)
pub fn target_bytes(target_mb: f64) -> u64 {
    // `as` saturates: negative and NaN targets become 0
    (target_mb * BYTES_PER_MB).floor() as u64
}

/// Format a byte count as a human-readable string
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
