//! Whole-document recompression through Ghostscript's `pdfwrite` device,
//! optionally followed by a qpdf stream-optimization pass.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use super::{Backend, BackendKind};
use crate::error::BackendError;
use crate::model::CompressionStep;

/// Keep child processes from flashing a console window on Windows
#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

pub struct GhostscriptBackend {
    gs: PathBuf,
    qpdf: Option<PathBuf>,
}

impl GhostscriptBackend {
    pub fn new(gs: PathBuf, qpdf: Option<PathBuf>) -> Self {
        Self { gs, qpdf }
    }

    /// Ghostscript arguments for one step
    pub fn gs_args(input: &Path, output: &Path, step: &CompressionStep) -> Vec<OsString> {
        let dpi = step.dpi;
        let mut args: Vec<OsString> = [
            "-sDEVICE=pdfwrite".to_string(),
            "-dNOPAUSE".to_string(),
            "-dBATCH".to_string(),
            "-dSAFER".to_string(),
            "-dQUIET".to_string(),
            "-dCompatibilityLevel=1.5".to_string(),
            "-dDetectDuplicateImages=true".to_string(),
            // Fonts
            "-dSubsetFonts=true".to_string(),
            "-dCompressFonts=true".to_string(),
            "-dEmbedAllFonts=true".to_string(),
            format!("-dJPEGQ={}", step.quality),
            // Color images
            "-dDownsampleColorImages=true".to_string(),
            format!("-dColorImageResolution={}", dpi),
            "-dColorImageDownsampleType=/Bicubic".to_string(),
            "-dColorImageDownsampleThreshold=1.0".to_string(),
            "-dAutoFilterColorImages=false".to_string(),
            "-dColorImageFilter=/DCTEncode".to_string(),
            // Gray images
            "-dDownsampleGrayImages=true".to_string(),
            format!("-dGrayImageResolution={}", dpi),
            "-dGrayImageDownsampleType=/Bicubic".to_string(),
            "-dGrayImageDownsampleThreshold=1.0".to_string(),
            "-dAutoFilterGrayImages=false".to_string(),
            "-dGrayImageFilter=/DCTEncode".to_string(),
            // Mono images
            "-dDownsampleMonoImages=true".to_string(),
            format!("-dMonoImageResolution={}", step.mono_dpi()),
            "-dMonoImageDownsampleType=/Subsample".to_string(),
        ]
        .into_iter()
        .map(OsString::from)
        .collect();

        let mut output_arg = OsString::from("-sOutputFile=");
        output_arg.push(output);
        args.push(output_arg);
        args.push(input.as_os_str().to_owned());
        args
    }

    /// qpdf arguments for the secondary pass
    pub fn qpdf_args(input: &Path, output: &Path) -> Vec<OsString> {
        vec![
            OsString::from("--compress-streams=y"),
            OsString::from("--recompress-flate"),
            OsString::from("--object-streams=generate"),
            input.as_os_str().to_owned(),
            output.as_os_str().to_owned(),
        ]
    }

    /// Best-effort qpdf pass: on any failure the Ghostscript output is kept.
    fn optimize_streams(&self, qpdf: &Path, output: &Path) {
        let temp = output.with_extension("qpdf.pdf");

        match run_tool(qpdf, &Self::qpdf_args(output, &temp)) {
            Ok(result) if result.status.success() && temp.exists() => {
                if let Err(e) = fs::rename(&temp, output) {
                    log::warn!("Could not replace output with qpdf result: {}", e);
                    let _ = fs::remove_file(&temp);
                }
            }
            Ok(result) => {
                log::debug!(
                    "qpdf exited with {}, keeping Ghostscript output",
                    result.status
                );
                let _ = fs::remove_file(&temp);
            }
            Err(e) => {
                log::debug!("qpdf pass skipped: {}", e);
                let _ = fs::remove_file(&temp);
            }
        }
    }
}

impl Backend for GhostscriptBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::External
    }

    fn announce(&self) -> Vec<String> {
        let mut lines = vec![format!("Using Ghostscript: {}", self.gs.display())];
        if let Some(ref qpdf) = self.qpdf {
            lines.push(format!("Using qpdf: {}", qpdf.display()));
        }
        lines
    }

    fn recompress(
        &self,
        input: &Path,
        output: &Path,
        step: &CompressionStep,
    ) -> Result<u64, BackendError> {
        let result = run_tool(&self.gs, &Self::gs_args(input, output, step))?;

        if !result.status.success() {
            return Err(BackendError::ToolFailed {
                tool: "Ghostscript".to_string(),
                status: result.status.to_string(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }
        if !output.exists() {
            return Err(BackendError::MissingOutput(output.to_path_buf()));
        }

        if let Some(ref qpdf) = self.qpdf {
            self.optimize_streams(qpdf, output);
        }

        Ok(fs::metadata(output)?.len())
    }
}

fn run_tool(program: &Path, args: &[OsString]) -> Result<Output, BackendError> {
    let mut command = Command::new(program);
    command.args(args);

    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        command.creation_flags(CREATE_NO_WINDOW);
    }

    command.output().map_err(|source| BackendError::Spawn {
        tool: program.display().to_string(),
        source,
    })
}
